//! Staged toolchain build pipeline.
//!
//! Stages run strictly in order and each one is gated on every previous
//! stage having succeeded. The first failure stops the pipeline; nothing is
//! retried and partially-built directories stay on disk for post-mortem
//! inspection.
//!
//! Stage order:
//! 1. binutils
//! 2. linux-headers
//! 3. gcc-stage1 (plus the host libgcc in the self-hosting case)
//! 4. glibc-bootstrap (startup objects, stub libc, stub headers)
//! 5. target-libgcc (cross builds only), then full-libc
//! 6. gcc-final

pub mod binutils;
pub mod gcc;
pub mod glibc;
pub mod headers;

use std::ffi::OsStr;
use std::path::Path;
use std::process::Command;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use thiserror::Error;

use super::request::BuildRequest;
use super::resolve::ResolvedPlan;
use super::workspace::Workspace;

/// A build or install step inside a stage reported a non-zero outcome.
#[derive(Debug, Error)]
#[error("stage {stage} failed: {reason}")]
pub struct StageError {
    pub stage: &'static str,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    Failed(String),
}

/// Per-stage record for the final report.
#[derive(Debug, Clone)]
pub struct StageResult {
    pub name: &'static str,
    pub outcome: Outcome,
    pub elapsed: Duration,
}

/// Everything a stage needs to do its work.
pub struct StageContext<'a> {
    pub request: &'a BuildRequest,
    pub plan: &'a ResolvedPlan,
    pub workspace: &'a Workspace,
    /// make -j argument, derived from the host processor count.
    pub jobs: String,
    /// PATH with the install prefix's bin directory prepended, so later
    /// stages pick up the cross tools installed by earlier ones.
    path: String,
}

impl<'a> StageContext<'a> {
    pub fn new(
        request: &'a BuildRequest,
        plan: &'a ResolvedPlan,
        workspace: &'a Workspace,
    ) -> Self {
        let path = match std::env::var("PATH") {
            Ok(path) => format!("{}:{path}", workspace.prefix.join("bin").display()),
            Err(_) => workspace.prefix.join("bin").display().to_string(),
        };
        Self {
            request,
            plan,
            workspace,
            jobs: cpus(),
            path,
        }
    }

    /// Run an external tool in a directory, failing on non-zero exit.
    pub fn run<P, I, S>(&self, dir: &Path, program: P, args: I) -> Result<()>
    where
        P: AsRef<OsStr>,
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let name = program.as_ref().to_string_lossy().into_owned();
        let status = Command::new(&program)
            .args(args)
            .current_dir(dir)
            .env("PATH", &self.path)
            .status()
            .with_context(|| format!("failed to run {name}"))?;
        if !status.success() {
            bail!("{name} exited with {status} in {}", dir.display());
        }
        Ok(())
    }

    pub fn make<I, S>(&self, dir: &Path, args: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.run(dir, "make", args)
    }
}

/// One step of the pipeline.
pub trait Stage {
    fn name(&self) -> &'static str;
    fn run(&self, ctx: &StageContext) -> Result<()>;
}

/// The ordered stage list for a native or cross build.
///
/// Native builds install the full libc in one pass; cross builds must build
/// the target libgcc first (against the stub libc from the bootstrap stage)
/// before the full libc can be built.
pub fn plan_stages(native: bool) -> Vec<Box<dyn Stage>> {
    let mut stages: Vec<Box<dyn Stage>> = vec![
        Box::new(binutils::Binutils),
        Box::new(headers::LinuxHeaders),
        Box::new(gcc::Stage1),
        Box::new(glibc::Bootstrap),
    ];
    if !native {
        stages.push(Box::new(gcc::TargetLibgcc));
    }
    stages.push(Box::new(glibc::FullLibc));
    stages.push(Box::new(gcc::Final));
    stages
}

/// Outcome of a pipeline run: the per-stage results collected so far plus
/// the error that stopped it, if any.
pub struct PipelineRun {
    pub results: Vec<StageResult>,
    pub error: Option<StageError>,
}

/// Execute the stages in order, stopping at the first failure.
pub fn run_pipeline(stages: &[Box<dyn Stage + '_>], ctx: &StageContext) -> PipelineRun {
    let mut results = Vec::new();
    for stage in stages {
        let started = Instant::now();
        match stage.run(ctx) {
            Ok(()) => {
                results.push(StageResult {
                    name: stage.name(),
                    outcome: Outcome::Ok,
                    elapsed: started.elapsed(),
                });
            }
            Err(err) => {
                let reason = format!("{err:#}");
                results.push(StageResult {
                    name: stage.name(),
                    outcome: Outcome::Failed(reason.clone()),
                    elapsed: started.elapsed(),
                });
                return PipelineRun {
                    results,
                    error: Some(StageError {
                        stage: stage.name(),
                        reason,
                    }),
                };
            }
        }
    }
    PipelineRun {
        results,
        error: None,
    }
}

fn cpus() -> String {
    std::thread::available_parallelism()
        .map(std::num::NonZero::get)
        .unwrap_or(1)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_stage_order_skips_target_libgcc() {
        let names: Vec<_> = plan_stages(true).iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            [
                "binutils",
                "linux-headers",
                "gcc-stage1",
                "glibc-bootstrap",
                "full-libc",
                "gcc-final",
            ]
        );
    }

    #[test]
    fn test_cross_stage_order_includes_target_libgcc() {
        let names: Vec<_> = plan_stages(false).iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            [
                "binutils",
                "linux-headers",
                "gcc-stage1",
                "glibc-bootstrap",
                "target-libgcc",
                "full-libc",
                "gcc-final",
            ]
        );
    }
}
