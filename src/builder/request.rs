//! Build request parameters.
//!
//! A [`BuildRequest`] is parsed once from the command line and is immutable
//! for the rest of the run. Every invalid parameter is rejected here, before
//! any network or filesystem side effect.

use std::fmt;
use std::str::FromStr;

use clap::Args;
use serde::Serialize;
use thiserror::Error;

use super::resolve::ResolutionError;

/// Invalid or missing invocation parameters. Raised before any I/O.
#[derive(Debug, Error)]
pub enum ParameterError {
    #[error("unsupported GCC version {0} (supported: 4 through 8)")]
    InvalidGccVersion(u32),
    #[error("unknown source flavor: {0} (expected gnu or linaro)")]
    InvalidFlavor(String),
    #[error("unknown compression format: {0} (expected none, gz or xz)")]
    InvalidCompression(String),
}

/// Target architectures we can build a toolchain for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    Arm,
    Arm64,
    I686,
    X86_64,
}

impl Arch {
    pub const ALL: [Arch; 4] = [Arch::Arm, Arch::Arm64, Arch::I686, Arch::X86_64];

    /// Canonical target triple for the architecture.
    pub fn triple(self) -> &'static str {
        match self {
            Arch::Arm => "arm-linux-gnueabi",
            Arch::Arm64 => "aarch64-linux-gnu",
            Arch::I686 => "i686-linux-gnu",
            Arch::X86_64 => "x86_64-linux-gnu",
        }
    }

    /// ARCH= value understood by the kernel's headers_install.
    pub fn kernel_arch(self) -> &'static str {
        match self {
            Arch::Arm => "arm",
            Arch::Arm64 => "arm64",
            Arch::I686 | Arch::X86_64 => "x86",
        }
    }

    /// Architecture name as reported by the Rust host, for the native check.
    fn host_name(self) -> &'static str {
        match self {
            Arch::Arm => "arm",
            Arch::Arm64 => "aarch64",
            Arch::I686 => "x86",
            Arch::X86_64 => "x86_64",
        }
    }

    /// True when the build host already runs this architecture.
    ///
    /// Native builds install the full libc in a single pass; cross builds
    /// need the extra target-libgcc round trip first.
    pub fn is_native(self) -> bool {
        self.host_name() == std::env::consts::ARCH
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Arch::Arm => "arm",
            Arch::Arm64 => "arm64",
            Arch::I686 => "i686",
            Arch::X86_64 => "x86_64",
        };
        f.write_str(name)
    }
}

impl FromStr for Arch {
    type Err = ResolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "arm" => Ok(Arch::Arm),
            "arm64" | "aarch64" => Ok(Arch::Arm64),
            "i686" => Ok(Arch::I686),
            "x86_64" => Ok(Arch::X86_64),
            other => Err(ResolutionError::InvalidArch(other.to_string())),
        }
    }
}

/// Which upstream provides the GCC sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFlavor {
    Gnu,
    Linaro,
}

impl fmt::Display for SourceFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceFlavor::Gnu => f.write_str("gnu"),
            SourceFlavor::Linaro => f.write_str("linaro"),
        }
    }
}

impl FromStr for SourceFlavor {
    type Err = ParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gnu" => Ok(SourceFlavor::Gnu),
            "linaro" => Ok(SourceFlavor::Linaro),
            other => Err(ParameterError::InvalidFlavor(other.to_string())),
        }
    }
}

/// Compression for the packaged toolchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    None,
    Gz,
    Xz,
}

impl Compression {
    /// tar create flag and file extension, or None when packaging is off.
    pub fn tar_mode(self) -> Option<(&'static str, &'static str)> {
        match self {
            Compression::None => None,
            Compression::Gz => Some(("czf", "gz")),
            Compression::Xz => Some(("cJf", "xz")),
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Compression::None => f.write_str("none"),
            Compression::Gz => f.write_str("gz"),
            Compression::Xz => f.write_str("xz"),
        }
    }
}

impl FromStr for Compression {
    type Err = ParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Compression::None),
            "gz" => Ok(Compression::Gz),
            "xz" => Ok(Compression::Xz),
            other => Err(ParameterError::InvalidCompression(other.to_string())),
        }
    }
}

/// Everything a pipeline run needs to know, fixed at invocation time.
#[derive(Debug, Clone, Serialize)]
pub struct BuildRequest {
    pub arch: Arch,
    pub flavor: SourceFlavor,
    pub gcc_version: u32,
    /// Use frozen release tarballs instead of tracking vcs branches.
    pub frozen: bool,
    /// Back the build directories with tmpfs scratch mounts.
    pub scratch_mount: bool,
    /// Refresh already-cloned sources to the branch tip.
    pub refresh_sources: bool,
    pub compression: Compression,
}

impl BuildRequest {
    pub fn new(
        arch: Arch,
        flavor: SourceFlavor,
        gcc_version: u32,
        frozen: bool,
        scratch_mount: bool,
        refresh_sources: bool,
        compression: Compression,
    ) -> Result<Self, ParameterError> {
        if !(4..=8).contains(&gcc_version) {
            return Err(ParameterError::InvalidGccVersion(gcc_version));
        }
        Ok(Self {
            arch,
            flavor,
            gcc_version,
            frozen,
            scratch_mount,
            refresh_sources,
            compression,
        })
    }
}

/// Request parameters shared by the build/resolve/fetch subcommands.
#[derive(Args)]
pub struct RequestArgs {
    /// Target architecture (arm, arm64, i686, x86_64)
    #[arg(long)]
    pub arch: Arch,
    /// Source flavor (gnu, linaro)
    #[arg(long, default_value = "gnu")]
    pub flavor: SourceFlavor,
    /// GCC release series (4 through 8)
    #[arg(long = "gcc")]
    pub gcc_version: u32,
    /// Use frozen release tarballs instead of tracking vcs branches
    #[arg(long)]
    pub frozen: bool,
    /// Keep build directories on disk instead of tmpfs scratch mounts
    #[arg(long)]
    pub no_mount: bool,
    /// Skip refreshing already-cloned sources
    #[arg(long)]
    pub no_refresh: bool,
    /// Compress the installed toolchain (none, gz, xz)
    #[arg(long, default_value = "none")]
    pub compress: Compression,
}

impl RequestArgs {
    pub fn into_request(self) -> Result<BuildRequest, ParameterError> {
        BuildRequest::new(
            self.arch,
            self.flavor,
            self.gcc_version,
            self.frozen,
            !self.no_mount,
            !self.no_refresh,
            self.compress,
        )
    }
}
