//! binutils build stage (assembler and linker for the target).

use anyhow::Result;

use super::{Stage, StageContext};
use crate::builder::resolve::Component;
use crate::builder::vendor;

pub struct Binutils;

impl Stage for Binutils {
    fn name(&self) -> &'static str {
        "binutils"
    }

    fn run(&self, ctx: &StageContext) -> Result<()> {
        println!("=== Building binutils ===");

        let src = vendor::source_dir(&ctx.workspace.cache, Component::Binutils);
        let build = &ctx.workspace.binutils_build;

        if !build.join("Makefile").exists() {
            ctx.run(
                build,
                src.join("configure"),
                [
                    format!("--prefix={}", ctx.workspace.prefix.display()),
                    format!("--target={}", ctx.plan.triple),
                    "--disable-multilib".to_string(),
                ],
            )?;
        }
        ctx.make(build, ["-j", ctx.jobs.as_str()])?;
        ctx.make(build, ["install"])?;

        println!("  Installed: {}/bin", ctx.workspace.prefix.display());
        Ok(())
    }
}
