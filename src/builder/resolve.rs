//! Component resolution.
//!
//! Maps (architecture, source flavor, GCC version) onto concrete artifact
//! identities for every component the toolchain needs. Pure and
//! deterministic: the same request always resolves to the same plan, and
//! nothing here touches the network or the filesystem, so the resolver is
//! safe to use for display as well as for planning.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use super::request::{Arch, BuildRequest, SourceFlavor};

/// A valid-looking request that cannot be satisfied.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("unknown target architecture: {0} (expected arm, arm64, i686 or x86_64)")]
    InvalidArch(String),
    #[error("unsupported combination {flavor}/gcc-{version}: {reason}")]
    UnsupportedCombination {
        flavor: SourceFlavor,
        version: u32,
        reason: &'static str,
    },
}

/// Every source component that goes into the toolchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Component {
    Binutils,
    Gcc,
    Glibc,
    Linux,
    Isl,
    Gmp,
    Mpfr,
    Mpc,
}

impl Component {
    pub const ALL: [Component; 8] = [
        Component::Binutils,
        Component::Gcc,
        Component::Glibc,
        Component::Linux,
        Component::Isl,
        Component::Gmp,
        Component::Mpfr,
        Component::Mpc,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Component::Binutils => "binutils",
            Component::Gcc => "gcc",
            Component::Glibc => "glibc",
            Component::Linux => "linux",
            Component::Isl => "isl",
            Component::Gmp => "gmp",
            Component::Mpfr => "mpfr",
            Component::Mpc => "mpc",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a component is retrieved into the vendor cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Retrieval {
    /// Track the tip of a branch in a version-control remote.
    VcsBranch { remote: String, branch: String },
    /// A fixed release tarball.
    Archive { url: String, version: String },
}

/// Concrete artifact identity for one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentSpec {
    pub component: Component,
    pub retrieval: Retrieval,
}

impl ComponentSpec {
    fn branch(component: Component, remote: &str, branch: &str) -> Self {
        Self {
            component,
            retrieval: Retrieval::VcsBranch {
                remote: remote.to_string(),
                branch: branch.to_string(),
            },
        }
    }

    fn archive(component: Component, url: String, version: &str) -> Self {
        Self {
            component,
            retrieval: Retrieval::Archive {
                url,
                version: version.to_string(),
            },
        }
    }

    /// Branch name or version string, for display.
    pub fn ident(&self) -> &str {
        match &self.retrieval {
            Retrieval::VcsBranch { branch, .. } => branch,
            Retrieval::Archive { version, .. } => version,
        }
    }
}

/// The fully resolved build plan for a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedPlan {
    pub arch: Arch,
    pub flavor: SourceFlavor,
    pub gcc_version: u32,
    pub frozen: bool,
    pub triple: &'static str,
    pub components: Vec<ComponentSpec>,
}

impl ResolvedPlan {
    pub fn get(&self, component: Component) -> &ComponentSpec {
        // The plan always carries all eight components.
        self.components
            .iter()
            .find(|s| s.component == component)
            .unwrap_or_else(|| unreachable!("plan missing {component}"))
    }

    pub fn print(&self) {
        println!(
            "Plan for {} ({}, gcc {}, {}):\n",
            self.triple,
            self.flavor,
            self.gcc_version,
            if self.frozen {
                "frozen tarballs"
            } else {
                "branch tips"
            },
        );
        for spec in &self.components {
            let kind = match &spec.retrieval {
                Retrieval::VcsBranch { remote, .. } => format!("branch  {remote}"),
                Retrieval::Archive { url, .. } => format!("archive {url}"),
            };
            println!("  {:10} {:32} {kind}", spec.component.name(), spec.ident());
        }
    }
}

const BINUTILS_GIT: &str = "https://sourceware.org/git/binutils-gdb.git";
const GLIBC_GIT: &str = "https://sourceware.org/git/glibc.git";
const LINUX_GIT: &str = "https://github.com/torvalds/linux.git";
const GCC_GIT: &str = "https://gcc.gnu.org/git/gcc.git";
const LINARO_GCC_GIT: &str = "https://git.linaro.org/toolchain/gcc.git";
const ISL_GIT: &str = "https://repo.or.cz/isl.git";

/// Frozen versions used when the request asks for release tarballs.
const FROZEN_BINUTILS: &str = "2.30";
const FROZEN_GLIBC: &str = "2.27";
const FROZEN_LINUX: &str = "4.15.8";

/// ISL pinned for GCC 5 and earlier; 6 and later track the development
/// branch. The pivot is an upstream compatibility boundary, keep it at 5/6.
const PINNED_ISL: &str = "0.14";

/// Resolve a request into a complete component plan.
pub fn resolve(request: &BuildRequest) -> Result<ResolvedPlan, ResolutionError> {
    let gcc = resolve_gcc(request.flavor, request.gcc_version, request.frozen)?;
    let isl = resolve_isl(request.gcc_version);

    let (binutils, glibc, linux) = if request.frozen {
        (
            ComponentSpec::archive(
                Component::Binutils,
                format!(
                    "https://ftpmirror.gnu.org/gnu/binutils/binutils-{FROZEN_BINUTILS}.tar.xz"
                ),
                FROZEN_BINUTILS,
            ),
            ComponentSpec::archive(
                Component::Glibc,
                format!("https://ftpmirror.gnu.org/gnu/glibc/glibc-{FROZEN_GLIBC}.tar.xz"),
                FROZEN_GLIBC,
            ),
            ComponentSpec::archive(
                Component::Linux,
                format!(
                    "https://cdn.kernel.org/pub/linux/kernel/v4.x/linux-{FROZEN_LINUX}.tar.xz"
                ),
                FROZEN_LINUX,
            ),
        )
    } else {
        (
            ComponentSpec::branch(Component::Binutils, BINUTILS_GIT, "master"),
            ComponentSpec::branch(Component::Glibc, GLIBC_GIT, "master"),
            ComponentSpec::branch(Component::Linux, LINUX_GIT, "master"),
        )
    };

    Ok(ResolvedPlan {
        arch: request.arch,
        flavor: request.flavor,
        gcc_version: request.gcc_version,
        frozen: request.frozen,
        triple: request.arch.triple(),
        components: vec![
            binutils,
            gcc,
            glibc,
            linux,
            isl,
            ComponentSpec::archive(
                Component::Gmp,
                "https://ftpmirror.gnu.org/gnu/gmp/gmp-6.1.2.tar.xz".to_string(),
                "6.1.2",
            ),
            ComponentSpec::archive(
                Component::Mpfr,
                "https://ftpmirror.gnu.org/gnu/mpfr/mpfr-4.0.1.tar.xz".to_string(),
                "4.0.1",
            ),
            ComponentSpec::archive(
                Component::Mpc,
                "https://ftpmirror.gnu.org/gnu/mpc/mpc-1.1.0.tar.gz".to_string(),
                "1.1.0",
            ),
        ],
    })
}

fn resolve_gcc(
    flavor: SourceFlavor,
    version: u32,
    frozen: bool,
) -> Result<ComponentSpec, ResolutionError> {
    if frozen {
        let release = match (flavor, version) {
            (SourceFlavor::Gnu, 4) => "4.9.4",
            (SourceFlavor::Gnu, 5) => "5.5.0",
            (SourceFlavor::Gnu, 6) => "6.4.0",
            (SourceFlavor::Gnu, 7) => "7.3.0",
            (SourceFlavor::Gnu, _) => {
                return Err(ResolutionError::UnsupportedCombination {
                    flavor,
                    version,
                    reason: "GCC 8 has not been released as a tarball yet",
                })
            }
            (SourceFlavor::Linaro, 4) => "4.9-2017.01",
            (SourceFlavor::Linaro, 5) => "5.4-2017.05",
            (SourceFlavor::Linaro, 6) => "6.4-2018.05",
            (SourceFlavor::Linaro, 7) => "7.2-2017.11",
            (SourceFlavor::Linaro, _) => {
                return Err(ResolutionError::UnsupportedCombination {
                    flavor,
                    version,
                    reason: "no Linaro variant of this GCC series exists",
                })
            }
        };
        let url = match flavor {
            SourceFlavor::Gnu => {
                format!("https://ftpmirror.gnu.org/gnu/gcc/gcc-{release}/gcc-{release}.tar.xz")
            }
            SourceFlavor::Linaro => format!(
                "https://releases.linaro.org/components/toolchain/gcc-linaro/{release}/gcc-linaro-{release}.tar.xz"
            ),
        };
        return Ok(ComponentSpec::archive(Component::Gcc, url, release));
    }

    let (remote, branch) = match (flavor, version) {
        (SourceFlavor::Gnu, 4) => (GCC_GIT, "gcc-4_9-branch"),
        (SourceFlavor::Gnu, 5) => (GCC_GIT, "gcc-5-branch"),
        (SourceFlavor::Gnu, 6) => (GCC_GIT, "gcc-6-branch"),
        (SourceFlavor::Gnu, 7) => (GCC_GIT, "gcc-7-branch"),
        (SourceFlavor::Gnu, _) => (GCC_GIT, "master"),
        (SourceFlavor::Linaro, 4) => (LINARO_GCC_GIT, "linaro/gcc-4_9-branch"),
        (SourceFlavor::Linaro, 5) => (LINARO_GCC_GIT, "linaro/gcc-5-branch"),
        (SourceFlavor::Linaro, 6) => (LINARO_GCC_GIT, "linaro/gcc-6-branch"),
        (SourceFlavor::Linaro, 7) => (LINARO_GCC_GIT, "linaro/gcc-7-branch"),
        (SourceFlavor::Linaro, _) => {
            return Err(ResolutionError::UnsupportedCombination {
                flavor,
                version,
                reason: "no Linaro variant of this GCC series exists",
            })
        }
    };
    Ok(ComponentSpec::branch(Component::Gcc, remote, branch))
}

fn resolve_isl(gcc_version: u32) -> ComponentSpec {
    if gcc_version <= 5 {
        ComponentSpec::archive(
            Component::Isl,
            format!("https://gcc.gnu.org/pub/gcc/infrastructure/isl-{PINNED_ISL}.tar.bz2"),
            PINNED_ISL,
        )
    } else {
        ComponentSpec::branch(Component::Isl, ISL_GIT, "master")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::request::Compression;

    fn request(arch: Arch, flavor: SourceFlavor, version: u32, frozen: bool) -> BuildRequest {
        BuildRequest::new(arch, flavor, version, frozen, false, false, Compression::None)
            .expect("valid request")
    }

    fn is_valid(flavor: SourceFlavor, version: u32, frozen: bool) -> bool {
        match flavor {
            SourceFlavor::Gnu => !(frozen && version == 8),
            SourceFlavor::Linaro => version != 8,
        }
    }

    #[test]
    fn test_valid_requests_resolve_completely() {
        for arch in Arch::ALL {
            for flavor in [SourceFlavor::Gnu, SourceFlavor::Linaro] {
                for version in 4..=8 {
                    for frozen in [false, true] {
                        if !is_valid(flavor, version, frozen) {
                            continue;
                        }
                        let plan = resolve(&request(arch, flavor, version, frozen))
                            .expect("valid combination must resolve");
                        assert_eq!(plan.components.len(), Component::ALL.len());
                        for component in Component::ALL {
                            assert!(
                                plan.components.iter().any(|s| s.component == component),
                                "{component} missing for {flavor}/{version}"
                            );
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_linaro_gcc8_rejected() {
        for frozen in [false, true] {
            let err = resolve(&request(Arch::Arm64, SourceFlavor::Linaro, 8, frozen))
                .expect_err("linaro gcc 8 must be rejected");
            assert!(matches!(
                err,
                ResolutionError::UnsupportedCombination { version: 8, .. }
            ));
        }
    }

    #[test]
    fn test_frozen_gnu8_rejected_as_unreleased() {
        let err = resolve(&request(Arch::X86_64, SourceFlavor::Gnu, 8, true))
            .expect_err("frozen gnu gcc 8 must be rejected");
        match err {
            ResolutionError::UnsupportedCombination { reason, .. } => {
                assert!(reason.contains("not been released"));
            }
            other => panic!("unexpected error: {other}"),
        }
        // Tracking the branch tip is fine.
        assert!(resolve(&request(Arch::X86_64, SourceFlavor::Gnu, 8, false)).is_ok());
    }

    #[test]
    fn test_isl_pivot_is_between_5_and_6() {
        for flavor in [SourceFlavor::Gnu, SourceFlavor::Linaro] {
            for version in 4..=7 {
                let plan = resolve(&request(Arch::Arm, flavor, version, false)).unwrap();
                let isl = plan.get(Component::Isl);
                if version <= 5 {
                    assert!(
                        matches!(&isl.retrieval, Retrieval::Archive { version, .. } if version == "0.14"),
                        "gcc {version} must pin the isl archive"
                    );
                } else {
                    assert!(
                        matches!(&isl.retrieval, Retrieval::VcsBranch { branch, .. } if branch == "master"),
                        "gcc {version} must track the isl branch"
                    );
                }
            }
        }
    }

    #[test]
    fn test_frozen_pins_binutils_and_kernel() {
        let plan = resolve(&request(Arch::Arm64, SourceFlavor::Gnu, 7, true)).unwrap();
        assert_eq!(plan.get(Component::Binutils).ident(), "2.30");
        assert_eq!(plan.get(Component::Linux).ident(), "4.15.8");
        assert_eq!(plan.get(Component::Glibc).ident(), "2.27");

        let plan = resolve(&request(Arch::Arm64, SourceFlavor::Gnu, 7, false)).unwrap();
        assert_eq!(plan.get(Component::Binutils).ident(), "master");
        assert_eq!(plan.get(Component::Linux).ident(), "master");
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let a = resolve(&request(Arch::Arm, SourceFlavor::Linaro, 6, false)).unwrap();
        let b = resolve(&request(Arch::Arm, SourceFlavor::Linaro, 6, false)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_gcc_branch_table() {
        let plan = resolve(&request(Arch::Arm, SourceFlavor::Gnu, 7, false)).unwrap();
        assert_eq!(plan.get(Component::Gcc).ident(), "gcc-7-branch");
        let plan = resolve(&request(Arch::Arm, SourceFlavor::Linaro, 5, false)).unwrap();
        assert_eq!(plan.get(Component::Gcc).ident(), "linaro/gcc-5-branch");
        let plan = resolve(&request(Arch::Arm, SourceFlavor::Gnu, 7, true)).unwrap();
        assert_eq!(plan.get(Component::Gcc).ident(), "7.3.0");
    }
}
