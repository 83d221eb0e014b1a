//! Build summary: stage outcomes, duration, compiler identity, output size.

#![allow(clippy::cast_precision_loss)] // File sizes don't need u64 precision for display

use std::path::Path;
use std::process::Command;
use std::time::Duration;

use super::stages::{Outcome, StageResult};
use super::vendor;
use super::workspace::Workspace;

/// Print the final summary.
///
/// Success is judged by the existence of the final compiler binary, not by
/// aggregating stage results: a prefix with a working gcc is a success even
/// if this run only repeated stages an earlier run already finished.
pub fn report(
    triple: &str,
    workspace: &Workspace,
    results: &[StageResult],
    elapsed: Duration,
    archive: Option<&Path>,
) {
    if !results.is_empty() {
        println!("\nStages:");
        for result in results {
            let outcome = match &result.outcome {
                Outcome::Ok => "ok".to_string(),
                Outcome::Failed(reason) => format!("FAILED ({reason})"),
            };
            println!(
                "  {:16} {:>8}  {outcome}",
                result.name,
                format_duration(result.elapsed)
            );
        }
    }

    let gcc_bin = workspace.prefix.join("bin").join(format!("{triple}-gcc"));
    if !gcc_bin.exists() {
        println!("\nBuild FAILED after {}", format_duration(elapsed));
        return;
    }

    println!("\nBuild complete in {}", format_duration(elapsed));
    if let Some(version) = compiler_version(&gcc_bin) {
        println!("  Compiler: {version}");
    }
    let size = vendor::dir_size(&workspace.prefix).unwrap_or(0);
    println!(
        "  Output:   {} ({:.1} MB)",
        workspace.prefix.display(),
        size as f64 / 1_000_000.0
    );
    if let Some(archive) = archive {
        println!("  Archive:  {}", archive.display());
    }
}

/// First line of `<triple>-gcc --version`.
pub fn compiler_version(gcc_bin: &Path) -> Option<String> {
    let output = Command::new(gcc_bin).arg("--version").output().ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout.lines().next().map(str::to_string)
}

pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 3600 {
        format!("{}h{:02}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m{:02}s", secs / 60, secs % 60)
    } else {
        format!("{:.1}s", d.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(2500)), "2.5s");
        assert_eq!(format_duration(Duration::from_secs(95)), "1m35s");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h02m");
    }

    #[test]
    fn test_compiler_version_missing_binary() {
        assert!(compiler_version(Path::new("/nonexistent/gcc")).is_none());
    }
}
