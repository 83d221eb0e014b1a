//! Build workspace preparation.
//!
//! Lays out the scratch build directories and the install prefix, optionally
//! backs the build directories with tmpfs mounts, and links the math
//! libraries into the GCC tree so GCC builds them in-tree (its build system
//! will not find them anywhere else).

use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;

use super::resolve::Component;
use super::vendor;

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("gcc source tree missing at {0} (run `crossgcc fetch` first)")]
    MissingGccSource(PathBuf),
    #[error("failed to mount tmpfs on {dir}: {reason}")]
    MountFailed { dir: PathBuf, reason: String },
    #[error("workspace setup failed: {0}")]
    Io(#[from] std::io::Error),
}

/// On-disk layout for one pipeline run. All paths hang off a single root
/// (the working directory in normal use, a temp dir in tests).
pub struct Workspace {
    pub cache: PathBuf,
    pub prefix: PathBuf,
    pub binutils_build: PathBuf,
    pub gcc_build: PathBuf,
    pub glibc_build: PathBuf,
}

impl Workspace {
    pub fn new(root: &Path, triple: &str) -> Self {
        Self {
            cache: root.join(vendor::VENDOR_DIR),
            prefix: root.join("out").join(triple),
            binutils_build: root.join("build/binutils"),
            gcc_build: root.join("build/gcc"),
            glibc_build: root.join("build/glibc"),
        }
    }

    pub fn build_dirs(&self) -> [&PathBuf; 3] {
        [&self.binutils_build, &self.gcc_build, &self.glibc_build]
    }
}

/// Tmpfs mounts backing the build directories.
///
/// Dropping the guard releases every mount, so the unmount runs on success
/// and on every failure path alike. `release` drains the list, which keeps
/// the unmount a one-shot even when called before drop.
#[derive(Debug, Default)]
pub struct ScratchMounts {
    mounted: Vec<PathBuf>,
}

impl ScratchMounts {
    fn mount(&mut self, dir: &Path) -> Result<(), SetupError> {
        let status = Command::new("sudo")
            .args(["mount", "-t", "tmpfs", "-o", "size=16G", "tmpfs"])
            .arg(dir)
            .status()
            .map_err(|e| SetupError::MountFailed {
                dir: dir.to_path_buf(),
                reason: e.to_string(),
            })?;
        if !status.success() {
            return Err(SetupError::MountFailed {
                dir: dir.to_path_buf(),
                reason: format!("mount exited with {status}"),
            });
        }
        self.mounted.push(dir.to_path_buf());
        Ok(())
    }

    /// Unmount everything this guard acquired. Returns how many mounts were
    /// released; a second call is a no-op.
    pub fn release(&mut self) -> usize {
        let mounted = std::mem::take(&mut self.mounted);
        let count = mounted.len();
        for dir in mounted {
            if !dir.exists() {
                continue;
            }
            println!("  Unmounting {}", dir.display());
            let _ = Command::new("sudo").arg("umount").arg(&dir).status();
        }
        count
    }

    #[cfg(test)]
    fn with_paths(paths: Vec<PathBuf>) -> Self {
        Self { mounted: paths }
    }
}

impl Drop for ScratchMounts {
    fn drop(&mut self) {
        self.release();
    }
}

/// Prepare the workspace for a fresh run.
///
/// Stale build directories are cleaned here, at the start, and only here:
/// after a failed stage they are deliberately left in place for post-mortem
/// inspection.
pub fn prepare(workspace: &Workspace, scratch_mount: bool) -> Result<ScratchMounts, SetupError> {
    let gcc_src = vendor::source_dir(&workspace.cache, Component::Gcc);
    if !gcc_src.exists() {
        return Err(SetupError::MissingGccSource(gcc_src));
    }

    for dir in workspace.build_dirs() {
        if dir.exists() {
            std::fs::remove_dir_all(dir)?;
        }
        std::fs::create_dir_all(dir)?;
    }
    std::fs::create_dir_all(&workspace.prefix)?;

    let mut mounts = ScratchMounts::default();
    if scratch_mount {
        if !sudo_is_passwordless() {
            println!("  Note: mounting scratch space will prompt for a sudo password");
        }
        for dir in workspace.build_dirs() {
            mounts.mount(dir)?;
        }
    }

    link_math_libs(&workspace.cache)?;

    Ok(mounts)
}

/// Symlink gmp/mpfr/mpc/isl into the GCC source tree.
///
/// The links are relative so the vendor cache can be moved as a whole.
fn link_math_libs(cache: &Path) -> Result<(), SetupError> {
    let gcc_src = vendor::source_dir(cache, Component::Gcc);
    for component in [
        Component::Gmp,
        Component::Mpfr,
        Component::Mpc,
        Component::Isl,
    ] {
        let link = gcc_src.join(component.name());
        // symlink_metadata: the link may dangle until the component is
        // extracted, exists() would follow it.
        if link.symlink_metadata().is_ok() {
            continue;
        }
        let target = Path::new("..").join(component.name());
        std::os::unix::fs::symlink(target, &link)?;
    }
    Ok(())
}

fn sudo_is_passwordless() -> bool {
    Command::new("sudo")
        .args(["-n", "true"])
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_workspace() -> (tempfile::TempDir, Workspace) {
        let root = tempfile::tempdir().unwrap();
        let workspace = Workspace::new(root.path(), "aarch64-linux-gnu");
        std::fs::create_dir_all(vendor::source_dir(&workspace.cache, Component::Gcc)).unwrap();
        (root, workspace)
    }

    #[test]
    fn test_prepare_requires_gcc_source() {
        let root = tempfile::tempdir().unwrap();
        let workspace = Workspace::new(root.path(), "aarch64-linux-gnu");
        let err = prepare(&workspace, false).expect_err("missing gcc tree must fail");
        assert!(matches!(err, SetupError::MissingGccSource(_)));
        // Nothing was created before the precondition check.
        assert!(!workspace.binutils_build.exists());
    }

    #[test]
    fn test_prepare_creates_layout() {
        let (_root, workspace) = seeded_workspace();
        let mut mounts = prepare(&workspace, false).unwrap();

        for dir in workspace.build_dirs() {
            assert!(dir.is_dir());
        }
        assert!(workspace.prefix.is_dir());
        assert_eq!(mounts.release(), 0);
    }

    #[test]
    fn test_prepare_cleans_stale_build_dirs() {
        let (_root, workspace) = seeded_workspace();
        std::fs::create_dir_all(&workspace.gcc_build).unwrap();
        std::fs::write(workspace.gcc_build.join("stale.o"), b"junk").unwrap();

        prepare(&workspace, false).unwrap();
        assert!(!workspace.gcc_build.join("stale.o").exists());
    }

    #[test]
    fn test_math_libs_linked_into_gcc_tree() {
        let (_root, workspace) = seeded_workspace();
        prepare(&workspace, false).unwrap();

        let gcc_src = vendor::source_dir(&workspace.cache, Component::Gcc);
        for name in ["gmp", "mpfr", "mpc", "isl"] {
            let link = gcc_src.join(name);
            assert!(link.symlink_metadata().unwrap().file_type().is_symlink());
        }

        // A second prepare leaves the existing links alone.
        prepare(&workspace, false).unwrap();
    }

    #[test]
    fn test_release_is_one_shot() {
        let mut mounts = ScratchMounts::with_paths(vec![PathBuf::from("/nonexistent/scratch/a")]);
        assert_eq!(mounts.release(), 1);
        assert_eq!(mounts.release(), 0);
    }

    #[test]
    fn test_failed_pipeline_releases_mounts_once() {
        use crate::builder::request::{Arch, BuildRequest, Compression, SourceFlavor};
        use crate::builder::resolve;
        use crate::builder::stages::{run_pipeline, Stage, StageContext};

        struct Failing;
        impl Stage for Failing {
            fn name(&self) -> &'static str {
                "failing"
            }
            fn run(&self, _ctx: &StageContext) -> anyhow::Result<()> {
                anyhow::bail!("injected failure")
            }
        }

        let root = tempfile::tempdir().unwrap();
        let request = BuildRequest::new(
            Arch::Arm64,
            SourceFlavor::Gnu,
            7,
            false,
            true,
            false,
            Compression::None,
        )
        .unwrap();
        let plan = resolve::resolve(&request).unwrap();
        let workspace = Workspace::new(root.path(), plan.triple);
        let mut mounts = ScratchMounts::with_paths(vec![PathBuf::from("/nonexistent/scratch/a")]);

        let ctx = StageContext::new(&request, &plan, &workspace);
        let stages: Vec<Box<dyn Stage>> = vec![Box::new(Failing)];
        let run = run_pipeline(&stages, &ctx);
        assert!(run.error.is_some());

        // The explicit release after a failed run drains the mounts; the
        // drop guard that follows finds nothing left to unmount.
        assert_eq!(mounts.release(), 1);
        assert_eq!(mounts.release(), 0);
    }
}
