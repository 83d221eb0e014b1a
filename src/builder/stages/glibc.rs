//! glibc stages: the bootstrap (headers, startup objects, stub libc) and
//! the full library build.
//!
//! The stub libc is the deliberate break in the circular dependency between
//! GCC's runtime library and glibc: libgcc will not build without a libc to
//! link against, and the real libc cannot be built without libgcc. The
//! bootstrap installs just enough (headers, crt objects, an empty libc.so,
//! an empty stubs header) for libgcc to proceed; the real library replaces
//! it afterwards.

use std::path::PathBuf;

use anyhow::{Context, Result};

use super::{Stage, StageContext};
use crate::builder::resolve::Component;
use crate::builder::vendor;

/// Per-target sysroot inside the install prefix.
fn sysroot(ctx: &StageContext) -> PathBuf {
    ctx.workspace.prefix.join(ctx.plan.triple)
}

/// Minimal glibc installation sufficient to unblock libgcc.
pub struct Bootstrap;

impl Stage for Bootstrap {
    fn name(&self) -> &'static str {
        "glibc-bootstrap"
    }

    fn run(&self, ctx: &StageContext) -> Result<()> {
        println!("=== Bootstrapping glibc ===");

        let src = vendor::source_dir(&ctx.workspace.cache, Component::Glibc);
        let build = &ctx.workspace.glibc_build;
        let sysroot = sysroot(ctx);

        if !build.join("Makefile").exists() {
            ctx.run(
                build,
                src.join("configure"),
                [
                    format!("--prefix={}", sysroot.display()),
                    format!("--host={}", ctx.plan.triple),
                    format!("--target={}", ctx.plan.triple),
                    format!("--with-headers={}", sysroot.join("include").display()),
                    "--disable-multilib".to_string(),
                    "libc_cv_forced_unwind=yes".to_string(),
                ],
            )?;
        }

        // Bootstrap mode: headers only, then just the startup objects.
        ctx.make(build, ["install-bootstrap-headers=yes", "install-headers"])?;
        ctx.make(build, ["-j", ctx.jobs.as_str(), "csu/subdir_lib"])?;

        let lib_dir = sysroot.join("lib");
        std::fs::create_dir_all(&lib_dir)
            .with_context(|| format!("creating {}", lib_dir.display()))?;
        for obj in ["crt1.o", "crti.o", "crtn.o"] {
            std::fs::copy(build.join("csu").join(obj), lib_dir.join(obj))
                .with_context(|| format!("installing startup object {obj}"))?;
        }

        // Empty shared libc so libgcc has something to link against.
        let stub_libc = lib_dir.join("libc.so").display().to_string();
        ctx.run(
            build,
            format!("{}-gcc", ctx.plan.triple),
            [
                "-nostdlib",
                "-nostartfiles",
                "-shared",
                "-x",
                "c",
                "/dev/null",
                "-o",
                stub_libc.as_str(),
            ],
        )?;

        // glibc's install-headers skips gnu/stubs.h; an empty one suffices
        // until the full build replaces it.
        let gnu_include = sysroot.join("include/gnu");
        std::fs::create_dir_all(&gnu_include)
            .with_context(|| format!("creating {}", gnu_include.display()))?;
        std::fs::write(gnu_include.join("stubs.h"), "").context("writing stub gnu/stubs.h")?;

        println!("  Bootstrapped: {}", sysroot.display());
        Ok(())
    }
}

/// The real C library, replacing the bootstrap stubs.
pub struct FullLibc;

impl Stage for FullLibc {
    fn name(&self) -> &'static str {
        "full-libc"
    }

    fn run(&self, ctx: &StageContext) -> Result<()> {
        println!("=== Building glibc ===");

        let build = &ctx.workspace.glibc_build;
        ctx.make(build, ["-j", ctx.jobs.as_str()])?;
        ctx.make(build, ["install"])?;

        println!("  Installed: {}/lib", sysroot(ctx).display());
        Ok(())
    }
}
