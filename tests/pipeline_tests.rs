//! Pipeline ordering and failure-gating tests with injected stages.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::bail;
use crossgcc::builder::request::{Arch, BuildRequest, Compression, SourceFlavor};
use crossgcc::builder::resolve::{self, ResolvedPlan};
use crossgcc::builder::stages::{run_pipeline, Outcome, Stage, StageContext};
use crossgcc::builder::workspace::Workspace;

struct FakeStage {
    name: &'static str,
    hits: Arc<AtomicUsize>,
    fail: bool,
}

impl Stage for FakeStage {
    fn name(&self) -> &'static str {
        self.name
    }

    fn run(&self, _ctx: &StageContext) -> anyhow::Result<()> {
        self.hits.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            bail!("injected failure");
        }
        Ok(())
    }
}

fn request() -> BuildRequest {
    BuildRequest::new(
        Arch::Arm64,
        SourceFlavor::Gnu,
        7,
        false,
        false,
        false,
        Compression::None,
    )
    .unwrap()
}

fn plan(request: &BuildRequest) -> ResolvedPlan {
    resolve::resolve(request).unwrap()
}

fn fake_stages(
    names: &[&'static str],
    fail_at: Option<usize>,
) -> (Vec<Box<dyn Stage>>, Vec<Arc<AtomicUsize>>) {
    let mut stages: Vec<Box<dyn Stage>> = Vec::new();
    let mut hits = Vec::new();
    for (i, name) in names.iter().enumerate() {
        let counter = Arc::new(AtomicUsize::new(0));
        hits.push(Arc::clone(&counter));
        stages.push(Box::new(FakeStage {
            name,
            hits: counter,
            fail: fail_at == Some(i),
        }));
    }
    (stages, hits)
}

#[test]
fn test_all_stages_run_in_order() {
    let root = tempfile::tempdir().unwrap();
    let request = request();
    let plan = plan(&request);
    let workspace = Workspace::new(root.path(), plan.triple);
    let ctx = StageContext::new(&request, &plan, &workspace);

    let (stages, hits) = fake_stages(&["a", "b", "c"], None);
    let run = run_pipeline(&stages, &ctx);

    assert!(run.error.is_none());
    let names: Vec<_> = run.results.iter().map(|r| r.name).collect();
    assert_eq!(names, ["a", "b", "c"]);
    for (result, counter) in run.results.iter().zip(&hits) {
        assert_eq!(result.outcome, Outcome::Ok);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}

#[test]
fn test_failure_stops_the_pipeline() {
    let root = tempfile::tempdir().unwrap();
    let request = request();
    let plan = plan(&request);
    let workspace = Workspace::new(root.path(), plan.triple);
    let ctx = StageContext::new(&request, &plan, &workspace);

    let (stages, hits) = fake_stages(&["a", "b", "c"], Some(1));
    let run = run_pipeline(&stages, &ctx);

    let error = run.error.expect("pipeline must report the failed stage");
    assert_eq!(error.stage, "b");
    assert_eq!(run.results.len(), 2);
    assert_eq!(run.results[0].outcome, Outcome::Ok);
    assert!(matches!(run.results[1].outcome, Outcome::Failed(_)));

    // The stage after the failure never started.
    assert_eq!(hits[0].load(Ordering::SeqCst), 1);
    assert_eq!(hits[1].load(Ordering::SeqCst), 1);
    assert_eq!(hits[2].load(Ordering::SeqCst), 0);
}

#[test]
fn test_failure_at_each_stage_runs_exactly_the_prefix() {
    let names = &["one", "two", "three", "four"];
    for fail_at in 0..names.len() {
        let root = tempfile::tempdir().unwrap();
        let request = request();
        let plan = plan(&request);
        let workspace = Workspace::new(root.path(), plan.triple);
        let ctx = StageContext::new(&request, &plan, &workspace);

        let (stages, hits) = fake_stages(names, Some(fail_at));
        let run = run_pipeline(&stages, &ctx);

        assert_eq!(run.results.len(), fail_at + 1);
        assert_eq!(run.error.unwrap().stage, names[fail_at]);
        for (i, counter) in hits.iter().enumerate() {
            let expected = usize::from(i <= fail_at);
            assert_eq!(counter.load(Ordering::SeqCst), expected, "stage {i}");
        }
    }
}
