//! GCC build stages: the stage-1 compiler, the target libgcc round trip
//! for cross builds, and the final full build.

use anyhow::Result;

use super::{Stage, StageContext};
use crate::builder::resolve::Component;
use crate::builder::vendor;

fn configure_if_needed(ctx: &StageContext) -> Result<()> {
    let build = &ctx.workspace.gcc_build;
    if build.join("Makefile").exists() {
        return Ok(());
    }
    let src = vendor::source_dir(&ctx.workspace.cache, Component::Gcc);
    ctx.run(
        build,
        src.join("configure"),
        [
            format!("--prefix={}", ctx.workspace.prefix.display()),
            format!("--target={}", ctx.plan.triple),
            "--enable-languages=c,c++".to_string(),
            "--disable-multilib".to_string(),
        ],
    )
}

/// Compiler driver and front end only, no target runtime library yet.
pub struct Stage1;

impl Stage for Stage1 {
    fn name(&self) -> &'static str {
        "gcc-stage1"
    }

    fn run(&self, ctx: &StageContext) -> Result<()> {
        println!("=== Building gcc (stage 1) ===");

        let build = &ctx.workspace.gcc_build;
        configure_if_needed(ctx)?;
        ctx.make(build, ["-j", ctx.jobs.as_str(), "all-gcc"])?;
        ctx.make(build, ["install-gcc"])?;

        if ctx.request.arch.is_native() {
            // Self-hosting: later host-side compilation steps need the
            // support runtime for the host itself.
            println!("  Host matches target, building host libgcc");
            ctx.make(build, ["-j", ctx.jobs.as_str(), "all-target-libgcc"])?;
            ctx.make(build, ["install-target-libgcc"])?;
        }
        Ok(())
    }
}

/// Target-architecture libgcc, buildable only once the stub libc from the
/// glibc bootstrap stage exists. Cross builds only.
pub struct TargetLibgcc;

impl Stage for TargetLibgcc {
    fn name(&self) -> &'static str {
        "target-libgcc"
    }

    fn run(&self, ctx: &StageContext) -> Result<()> {
        println!("=== Building target libgcc ===");

        let build = &ctx.workspace.gcc_build;
        ctx.make(build, ["-j", ctx.jobs.as_str(), "all-target-libgcc"])?;
        ctx.make(build, ["install-target-libgcc"])?;
        Ok(())
    }
}

/// The complete compiler, linked against the real target libc.
pub struct Final;

impl Stage for Final {
    fn name(&self) -> &'static str {
        "gcc-final"
    }

    fn run(&self, ctx: &StageContext) -> Result<()> {
        println!("=== Building gcc (final) ===");

        let build = &ctx.workspace.gcc_build;
        ctx.make(build, ["-j", ctx.jobs.as_str()])?;
        ctx.make(build, ["install"])?;

        println!(
            "  Installed: {}/bin/{}-gcc",
            ctx.workspace.prefix.display(),
            ctx.plan.triple
        );
        Ok(())
    }
}
