//! Toolchain build orchestration.
//!
//! Structure:
//! - `request` - invocation parameters, validated before any side effect
//! - `resolve` - architecture/flavor/version to concrete artifact identities
//! - `vendor` - source fetching and the on-disk cache
//! - `workspace` - build directories, scratch mounts, in-tree math libs
//! - `stages/` - the ordered build pipeline
//! - `package` - optional compression of the installed prefix
//! - `report` - final summary

pub mod package;
pub mod report;
pub mod request;
pub mod resolve;
pub mod stages;
pub mod vendor;
pub mod workspace;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Subcommand;

use request::{BuildRequest, RequestArgs};
use resolve::ResolvedPlan;
use workspace::Workspace;

/// Build commands for the CLI.
#[derive(Subcommand)]
pub enum Commands {
    /// Resolve, fetch, prepare and run the full build pipeline
    Build {
        #[command(flatten)]
        request: RequestArgs,
    },
    /// Print the resolved component plan without any side effect
    Resolve {
        #[command(flatten)]
        request: RequestArgs,
        /// Emit the plan as JSON
        #[arg(long)]
        json: bool,
    },
    /// Fetch or refresh sources without building
    Fetch {
        #[command(flatten)]
        request: RequestArgs,
    },
    /// Show vendor cache status
    Status,
    /// Clean cached sources
    Clean {
        /// Component name (omit for all)
        name: Option<String>,
    },
}

pub fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Build { request } => build(request.into_request()?),
        Commands::Resolve { request, json } => {
            let plan = resolve::resolve(&request.into_request()?)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&plan)?);
            } else {
                plan.print();
            }
            Ok(())
        }
        Commands::Fetch { request } => {
            let request = request.into_request()?;
            let plan = resolve::resolve(&request)?;
            let cache = std::env::current_dir()?.join(vendor::VENDOR_DIR);
            vendor::fetch_all(&plan, &cache, request.refresh_sources)?;
            Ok(())
        }
        Commands::Status => vendor::status(&PathBuf::from(vendor::VENDOR_DIR)),
        Commands::Clean { name } => {
            vendor::clean(&PathBuf::from(vendor::VENDOR_DIR), name.as_deref())
        }
    }
}

/// Run the whole pipeline: resolve, fetch, prepare, build, package, report.
fn build(request: BuildRequest) -> Result<()> {
    let started = Instant::now();

    // Resolution happens before anything touches the disk or the network:
    // an unsupported request leaves the workspace untouched.
    let plan = resolve::resolve(&request)?;
    println!(
        "=== Building {} toolchain (gcc {}, {}) ===\n",
        plan.triple, plan.gcc_version, plan.flavor
    );

    let root = std::env::current_dir().context("cannot determine working directory")?;
    let workspace = Workspace::new(&root, plan.triple);

    vendor::fetch_all(&plan, &workspace.cache, request.refresh_sources)?;

    let mut mounts = workspace::prepare(&workspace, request.scratch_mount)?;

    let ctx = stages::StageContext::new(&request, &plan, &workspace);
    let stage_list = stages::plan_stages(request.arch.is_native());
    let run = stages::run_pipeline(&stage_list, &ctx);

    // The guard would also fire on drop; releasing here keeps the output
    // readable and makes the teardown explicit on the success path too.
    mounts.release();

    let archive = if run.error.is_none() {
        write_manifest(&plan, &workspace)?;
        package::package(&request, &plan, &root)
    } else {
        None
    };

    report::report(
        plan.triple,
        &workspace,
        &run.results,
        started.elapsed(),
        archive.as_deref(),
    );

    match run.error {
        None => Ok(()),
        Some(err) => Err(err.into()),
    }
}

/// Record the resolved component identities next to the toolchain.
fn write_manifest(plan: &ResolvedPlan, workspace: &Workspace) -> Result<()> {
    let manifest = serde_json::to_string_pretty(plan)?;
    let path = workspace.prefix.join("build-manifest.json");
    std::fs::write(&path, manifest).with_context(|| format!("writing {}", path.display()))
}
