//! Vendor source cache (fetch, refresh, extract, status, clean).
//!
//! Every component lives under the cache directory, either as a git
//! checkout tracking a branch or as a release tarball plus its extracted
//! tree. Fetching is idempotent: anything already on disk is left alone
//! unless a refresh was requested.

#![allow(clippy::cast_precision_loss)] // File sizes don't need u64 precision for display

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use thiserror::Error;

use super::resolve::{Component, ComponentSpec, ResolvedPlan, Retrieval};

pub const VENDOR_DIR: &str = "vendor";

/// A fetch that could not be satisfied. Fatal for the run: no build stage
/// starts with an incomplete cache.
#[derive(Debug, Error)]
#[error("{component}: {reason}")]
pub struct FetchError {
    pub component: Component,
    pub reason: String,
}

impl FetchError {
    fn new(component: Component, reason: impl Into<String>) -> Self {
        Self {
            component,
            reason: reason.into(),
        }
    }
}

/// What `ensure` actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fetched {
    /// Already satisfied on disk, no network operation performed.
    Cached,
    Cloned,
    Updated,
    Downloaded,
}

/// Checkout or extraction directory for a component.
pub fn source_dir(cache: &Path, component: Component) -> PathBuf {
    cache.join(component.name())
}

/// Tarball path for an archive component.
pub fn tarball_path(cache: &Path, spec: &ComponentSpec) -> PathBuf {
    match &spec.retrieval {
        Retrieval::Archive { url, .. } => {
            let file = url.rsplit('/').next().unwrap_or(url);
            cache.join(file)
        }
        Retrieval::VcsBranch { .. } => source_dir(cache, spec.component),
    }
}

/// Make sure a component's artifact exists in the cache.
///
/// Branch components are cloned on first use and, when `refresh` is set,
/// reset to the remote branch tip. Local modifications are discarded, not
/// merged; the exception is the Linux tree, which is fast-forward merged
/// because its history is append-only while the toolchain branches may be
/// rebased upstream. Archive components are downloaded once.
pub fn ensure(spec: &ComponentSpec, cache: &Path, refresh: bool) -> Result<Fetched, FetchError> {
    match &spec.retrieval {
        Retrieval::VcsBranch { remote, branch } => {
            ensure_checkout(spec.component, remote, branch, cache, refresh)
        }
        Retrieval::Archive { url, .. } => ensure_tarball(spec, url, cache),
    }
}

fn ensure_checkout(
    component: Component,
    remote: &str,
    branch: &str,
    cache: &Path,
    refresh: bool,
) -> Result<Fetched, FetchError> {
    let dest = source_dir(cache, component);

    if dest.exists() {
        if !refresh {
            println!(
                "  {:10} already cached at {}",
                component.name(),
                dest.display()
            );
            return Ok(Fetched::Cached);
        }
        println!("  {:10} refreshing {branch}...", component.name());
        git(component, &dest, &["fetch", "origin", branch])?;
        let tip = format!("origin/{branch}");
        if component == Component::Linux {
            git(component, &dest, &["merge", "--ff-only", &tip])?;
        } else {
            git(component, &dest, &["reset", "--hard", &tip])?;
        }
        return Ok(Fetched::Updated);
    }

    std::fs::create_dir_all(cache)
        .map_err(|e| FetchError::new(component, format!("creating cache dir: {e}")))?;

    println!("  {:10} cloning {remote} @ {branch}...", component.name());
    let dest_str = dest
        .to_str()
        .ok_or_else(|| FetchError::new(component, "destination path contains invalid UTF-8"))?;
    git(
        component,
        cache,
        &["clone", "--branch", branch, remote, dest_str],
    )?;
    Ok(Fetched::Cloned)
}

fn ensure_tarball(spec: &ComponentSpec, url: &str, cache: &Path) -> Result<Fetched, FetchError> {
    let component = spec.component;
    let tarball = tarball_path(cache, spec);

    if tarball.exists() {
        println!(
            "  {:10} already cached at {}",
            component.name(),
            tarball.display()
        );
        return Ok(Fetched::Cached);
    }

    std::fs::create_dir_all(cache)
        .map_err(|e| FetchError::new(component, format!("creating cache dir: {e}")))?;

    println!("  {:10} downloading {url}...", component.name());
    let tarball_str = tarball
        .to_str()
        .ok_or_else(|| FetchError::new(component, "tarball path contains invalid UTF-8"))?;
    let status = Command::new("curl")
        .args(["-L", "--fail", "-o", tarball_str, url])
        .status()
        .map_err(|e| FetchError::new(component, format!("failed to run curl: {e}")))?;
    if !status.success() {
        // Don't leave a truncated tarball behind to satisfy the next run.
        let _ = std::fs::remove_file(&tarball);
        return Err(FetchError::new(component, format!("download failed: {url}")));
    }
    Ok(Fetched::Downloaded)
}

/// Extract an archive component into its source directory.
///
/// Idempotent: an existing directory is assumed to be a previous extraction.
/// The top-level directory is stripped so archives with different internal
/// layouts normalize to the same on-disk shape.
pub fn extract(spec: &ComponentSpec, cache: &Path) -> Result<(), FetchError> {
    let component = spec.component;
    if !matches!(spec.retrieval, Retrieval::Archive { .. }) {
        return Ok(());
    }

    let dest = source_dir(cache, component);
    if dest.exists() {
        return Ok(());
    }

    let tarball = tarball_path(cache, spec);
    std::fs::create_dir_all(&dest)
        .map_err(|e| FetchError::new(component, format!("creating source dir: {e}")))?;

    println!(
        "  {:10} extracting {}...",
        component.name(),
        tarball.display()
    );
    let status = Command::new("tar")
        .arg("xf")
        .arg(&tarball)
        .arg("-C")
        .arg(&dest)
        .arg("--strip-components=1")
        .status();
    let status = match status {
        Ok(status) => status,
        Err(e) => {
            let _ = std::fs::remove_dir_all(&dest);
            return Err(FetchError::new(component, format!("failed to run tar: {e}")));
        }
    };
    if !status.success() {
        // Don't leave a partial tree behind to satisfy the next run's
        // idempotency check.
        let _ = std::fs::remove_dir_all(&dest);
        return Err(FetchError::new(
            component,
            format!("extraction failed: {}", tarball.display()),
        ));
    }
    Ok(())
}

/// Fetch and extract every component of a plan, in plan order.
pub fn fetch_all(plan: &ResolvedPlan, cache: &Path, refresh: bool) -> Result<(), FetchError> {
    println!("=== Fetching sources ===\n");
    for spec in &plan.components {
        ensure(spec, cache, refresh)?;
        extract(spec, cache)?;
    }
    println!();
    Ok(())
}

/// Show cache status for all known components.
pub fn status(cache: &Path) -> Result<()> {
    println!("Cache Status:\n");

    let mut total_size: u64 = 0;
    let mut cached = 0;

    for component in Component::ALL {
        let path = source_dir(cache, component);
        if path.exists() {
            let size = dir_size(&path)?;
            total_size += size;
            cached += 1;
            println!(
                "  {:10} [cached] {:.1} MB",
                component.name(),
                size as f64 / 1_000_000.0
            );
        } else {
            println!("  {:10} [missing]", component.name());
        }
    }

    println!();
    println!(
        "  Total: {}/{} cached ({:.1} MB)",
        cached,
        Component::ALL.len(),
        total_size as f64 / 1_000_000.0
    );

    Ok(())
}

/// Clean cached sources (one component, or everything).
pub fn clean(cache: &Path, name: Option<&str>) -> Result<()> {
    if let Some(name) = name {
        let path = cache.join(name);
        if path.exists() {
            std::fs::remove_dir_all(&path)?;
            println!("Cleaned: {name}");
        } else {
            println!("{name} not in cache");
        }
    } else if cache.exists() {
        std::fs::remove_dir_all(cache)?;
        println!("Cleaned all cached sources");
    }
    Ok(())
}

fn git(component: Component, dir: &Path, args: &[&str]) -> Result<(), FetchError> {
    let status = Command::new("git")
        .args(args)
        .current_dir(dir)
        .status()
        .map_err(|e| FetchError::new(component, format!("failed to run git: {e}")))?;
    if !status.success() {
        return Err(FetchError::new(
            component,
            format!("git {} failed", args.first().unwrap_or(&"")),
        ));
    }
    Ok(())
}

/// Get directory size in bytes.
pub(crate) fn dir_size(path: &Path) -> Result<u64> {
    let path_str = path.to_str().context("Path contains invalid UTF-8")?;

    let output = Command::new("du")
        .args(["-sb", path_str])
        .output()
        .context("Failed to get directory size")?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let size_str = stdout.split_whitespace().next().unwrap_or("0");
    Ok(size_str.parse().unwrap_or(0))
}
