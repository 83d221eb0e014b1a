//! Sanitized kernel header installation.

use anyhow::Result;

use super::{Stage, StageContext};
use crate::builder::resolve::Component;
use crate::builder::vendor;

pub struct LinuxHeaders;

impl Stage for LinuxHeaders {
    fn name(&self) -> &'static str {
        "linux-headers"
    }

    fn run(&self, ctx: &StageContext) -> Result<()> {
        println!("=== Installing kernel headers ===");

        let src = vendor::source_dir(&ctx.workspace.cache, Component::Linux);
        let hdr_path = ctx.workspace.prefix.join(ctx.plan.triple);

        // headers_install runs inside the kernel source tree.
        ctx.make(
            &src,
            [
                format!("ARCH={}", ctx.request.arch.kernel_arch()),
                format!("INSTALL_HDR_PATH={}", hdr_path.display()),
                "headers_install".to_string(),
            ],
        )?;

        println!("  Installed: {}/include", hdr_path.display());
        Ok(())
    }
}
