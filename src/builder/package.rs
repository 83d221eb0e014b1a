//! Optional compression of the installed toolchain tree.

use std::path::{Path, PathBuf};
use std::process::Command;

use super::request::BuildRequest;
use super::resolve::ResolvedPlan;

/// Archive file name: target triple, GCC version, source flavor, build date.
pub fn archive_name(plan: &ResolvedPlan, date: &str, ext: &str) -> String {
    format!(
        "{}-gcc{}-{}-{date}.tar.{ext}",
        plan.triple, plan.gcc_version, plan.flavor
    )
}

/// Compress the installed prefix if a compression format was requested.
///
/// Packaging is best-effort post-processing: a failure here is reported but
/// does not invalidate the toolchain that was already built.
pub fn package(request: &BuildRequest, plan: &ResolvedPlan, root: &Path) -> Option<PathBuf> {
    let (flag, ext) = request.compression.tar_mode()?;

    let date = chrono::Local::now().format("%Y%m%d").to_string();
    let archive = root.join(archive_name(plan, &date, ext));
    let out_dir = root.join("out");

    println!("=== Packaging toolchain ===");
    let status = Command::new("tar")
        .arg(flag)
        .arg(&archive)
        .arg("-C")
        .arg(&out_dir)
        .arg(plan.triple)
        .status();

    match status {
        Ok(status) if status.success() => {
            println!("  Packaged: {}", archive.display());
            Some(archive)
        }
        Ok(status) => {
            println!("  Warning: tar exited with {status}, toolchain left unpackaged");
            None
        }
        Err(e) => {
            println!("  Warning: failed to run tar ({e}), toolchain left unpackaged");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::request::{Arch, BuildRequest, Compression, SourceFlavor};
    use crate::builder::resolve;

    fn plan() -> ResolvedPlan {
        let request = BuildRequest::new(
            Arch::Arm64,
            SourceFlavor::Linaro,
            7,
            false,
            false,
            false,
            Compression::Gz,
        )
        .unwrap();
        resolve::resolve(&request).unwrap()
    }

    #[test]
    fn test_archive_name_encodes_identity_and_date() {
        assert_eq!(
            archive_name(&plan(), "20180406", "xz"),
            "aarch64-linux-gnu-gcc7-linaro-20180406.tar.xz"
        );
    }

    #[test]
    fn test_no_compression_skips_packaging() {
        let request = BuildRequest::new(
            Arch::Arm64,
            SourceFlavor::Linaro,
            7,
            false,
            false,
            false,
            Compression::None,
        )
        .unwrap();
        let root = tempfile::tempdir().unwrap();
        assert!(package(&request, &plan(), root.path()).is_none());
        // Nothing was written.
        assert!(std::fs::read_dir(root.path()).unwrap().next().is_none());
    }
}
