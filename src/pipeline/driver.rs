//! Pipeline execution.
//!
//! The [`Driver`] turns a [`Requirement`] into a [`Package`] and walks it
//! through the fixed stage sequence, resolving a handler for the init stage
//! and letting each handler nominate its successor from there. Outcomes are
//! plain values; a failing package never aborts the rest of a batch.

use crate::error::{CairnError, Result};
use crate::package::Package;
use crate::pipeline::step::{PipelineStep, StepRegistry};
use crate::pipeline::{Stage, StepControl};
use crate::requirement::Requirement;
use crate::store::InstallStore;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// What a pipeline run amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The package ran all stages and was recorded as installed.
    Installed,

    /// The package was already present, either in the install store or as
    /// reported by a handler mid-run.
    AlreadyInstalled,

    /// The run failed; the message says why.
    Failed(String),
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, RunOutcome::Failed(_))
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Installed => write!(f, "installed"),
            RunOutcome::AlreadyInstalled => write!(f, "already installed"),
            RunOutcome::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Per-package result of a driver run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Display name of the package the report is about.
    pub name: String,
    pub outcome: RunOutcome,
    pub duration: Duration,
}

/// Runs requirements through the stage pipeline.
pub struct Driver {
    registry: StepRegistry,
    store: Option<InstallStore>,
}

impl Driver {
    pub fn new(registry: StepRegistry) -> Self {
        Self {
            registry,
            store: None,
        }
    }

    /// Attach an install store. Recorded installs short-circuit future runs
    /// of requirements they satisfy.
    pub fn with_store(registry: StepRegistry, store: InstallStore) -> Self {
        Self {
            registry,
            store: Some(store),
        }
    }

    pub fn store(&self) -> Option<&InstallStore> {
        self.store.as_ref()
    }

    /// Run one requirement through the pipeline.
    pub fn run(&mut self, requirement: &Requirement) -> RunReport {
        let mut pkg = Package::new(requirement);
        let started = Instant::now();

        debug!(package = %pkg.display_name(), locator = %pkg.locator, "starting pipeline");
        let outcome = match self.drive(&mut pkg) {
            Ok(outcome) => outcome,
            Err(err) => RunOutcome::Failed(err.to_string()),
        };
        let duration = started.elapsed();
        let name = pkg.display_name().to_string();

        match &outcome {
            RunOutcome::Installed => info!(package = %name, "installed"),
            RunOutcome::AlreadyInstalled => debug!(package = %name, "already installed"),
            RunOutcome::Failed(reason) => warn!(package = %name, %reason, "pipeline failed"),
        }

        RunReport {
            name,
            outcome,
            duration,
        }
    }

    /// Run a batch of requirements in order. A failure is confined to its
    /// own report; later requirements still run.
    pub fn run_batch(&mut self, requirements: &[Requirement]) -> Vec<RunReport> {
        requirements.iter().map(|req| self.run(req)).collect()
    }

    fn drive(&mut self, pkg: &mut Package) -> Result<RunOutcome> {
        let mut handler = match self.registry.resolve(Stage::Init, pkg) {
            Some(handler) => handler,
            None => {
                return Ok(RunOutcome::Failed(format!(
                    "no handler claims {:?}",
                    pkg.locator
                )))
            }
        };
        debug!(package = %pkg.display_name(), handler = handler.name(), "handler resolved");

        if let StepControl::AlreadyInstalled = handler.run_stage(Stage::Init, pkg)? {
            return Ok(RunOutcome::AlreadyInstalled);
        }

        if self.already_recorded(pkg) {
            return Ok(RunOutcome::AlreadyInstalled);
        }

        for stage in &Stage::SEQUENCE[1..] {
            if let Some(next) = handler.next_handler(*stage, pkg, &self.registry) {
                handler = next;
            }
            if let StepControl::AlreadyInstalled = handler.run_stage(*stage, pkg)? {
                return Ok(RunOutcome::AlreadyInstalled);
            }
        }

        self.finish(pkg)?;
        Ok(RunOutcome::Installed)
    }

    /// Store consultation after init. Virtual packages and packages with no
    /// name yet never match.
    fn already_recorded(&self, pkg: &Package) -> bool {
        if pkg.is_virtual || pkg.name.is_empty() {
            return false;
        }
        let store = match &self.store {
            Some(store) => store,
            None => return false,
        };
        let record = match store.lookup(&pkg.name) {
            Some(record) => record,
            None => return false,
        };
        if pkg.constraints.is_empty() {
            return true;
        }
        record.provisions.satisfies(&pkg.constraints)
    }

    fn finish(&mut self, pkg: &mut Package) -> Result<()> {
        // A package always provides itself under its own name.
        if !pkg.name.is_empty() && !pkg.provisions.contains(&pkg.name) {
            let name = pkg.name.clone();
            pkg.provisions.insert(name, pkg.version.clone());
        }
        if !pkg.is_virtual && !pkg.name.is_empty() {
            if let Some(store) = &mut self.store {
                store.record(pkg).map_err(|e| {
                    CairnError::pipeline(format!("recording {}: {e}", pkg.name))
                })?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver")
            .field("registry", &self.registry)
            .field("store", &self.store.as_ref().map(|s| s.path()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::step::StepRegistry;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Recorder {
        stages: Arc<AtomicUsize>,
        fail_at: Option<Stage>,
        done_at: Option<Stage>,
    }

    impl PipelineStep for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn run_stage(&mut self, stage: Stage, pkg: &mut Package) -> Result<StepControl> {
            self.stages.fetch_add(1, Ordering::SeqCst);
            if stage == Stage::Init {
                pkg.name = crate::requirement::guess_name(&pkg.locator);
                pkg.version = Some("1.0".parse().unwrap());
            }
            if self.fail_at == Some(stage) {
                return Err(CairnError::pipeline("boom"));
            }
            if self.done_at == Some(stage) {
                return Ok(StepControl::AlreadyInstalled);
            }
            Ok(StepControl::Proceed)
        }
    }

    fn registry(
        stages: Arc<AtomicUsize>,
        fail_at: Option<Stage>,
        done_at: Option<Stage>,
    ) -> StepRegistry {
        let mut registry = StepRegistry::new();
        registry.register("recorder", 0, move |_, _| {
            Some(Box::new(Recorder {
                stages: stages.clone(),
                fail_at,
                done_at,
            }))
        });
        registry
    }

    fn requirement(line: &str) -> Requirement {
        Requirement::parse(line).unwrap()
    }

    #[test]
    fn run_walks_all_stages() {
        let stages = Arc::new(AtomicUsize::new(0));
        let mut driver = Driver::new(registry(stages.clone(), None, None));

        let report = driver.run(&requirement("tool scheme:tool"));
        assert_eq!(report.outcome, RunOutcome::Installed);
        assert_eq!(report.name, "tool");
        assert_eq!(stages.load(Ordering::SeqCst), Stage::SEQUENCE.len());
    }

    #[test]
    fn unclaimed_locator_fails() {
        let mut registry = StepRegistry::new();
        registry.register("never", 0, |_, _| None);
        let mut driver = Driver::new(registry);

        let report = driver.run(&requirement("scheme:tool"));
        assert!(matches!(report.outcome, RunOutcome::Failed(_)));
    }

    #[test]
    fn handler_can_stop_early_as_already_installed() {
        let stages = Arc::new(AtomicUsize::new(0));
        let mut driver = Driver::new(registry(stages.clone(), None, Some(Stage::Fetch)));

        let report = driver.run(&requirement("tool scheme:tool"));
        assert_eq!(report.outcome, RunOutcome::AlreadyInstalled);
        // Init and fetch ran; nothing after.
        assert_eq!(stages.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn batch_isolates_failures() {
        let stages = Arc::new(AtomicUsize::new(0));
        let mut driver = Driver::new(registry(stages, Some(Stage::Build), None));

        let reports = driver.run_batch(&[
            requirement("bad scheme:bad"),
            requirement("alsobad scheme:alsobad"),
        ]);
        assert_eq!(reports.len(), 2);
        assert!(matches!(reports[0].outcome, RunOutcome::Failed(_)));
        assert!(matches!(reports[1].outcome, RunOutcome::Failed(_)));
    }

    #[test]
    fn store_short_circuits_second_run() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = InstallStore::load(dir.path().join("installed.json")).unwrap();
        let stages = Arc::new(AtomicUsize::new(0));
        let mut driver = Driver::with_store(registry(stages.clone(), None, None), store);

        let req = requirement("tool scheme:tool");
        assert_eq!(driver.run(&req).outcome, RunOutcome::Installed);
        assert_eq!(driver.run(&req).outcome, RunOutcome::AlreadyInstalled);
        // Second run stopped after init.
        assert_eq!(stages.load(Ordering::SeqCst), Stage::SEQUENCE.len() + 1);
    }

    #[test]
    fn store_match_respects_constraints() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = InstallStore::load(dir.path().join("installed.json")).unwrap();
        let stages = Arc::new(AtomicUsize::new(0));
        let mut driver = Driver::with_store(registry(stages, None, None), store);

        assert_eq!(
            driver.run(&requirement("tool scheme:tool")).outcome,
            RunOutcome::Installed
        );
        // Recorded version is 1.0; a tighter constraint forces a reinstall.
        assert_eq!(
            driver.run(&requirement("tool scheme:tool>=2.0")).outcome,
            RunOutcome::Installed
        );
        assert_eq!(
            driver.run(&requirement("tool scheme:tool>=1.0")).outcome,
            RunOutcome::AlreadyInstalled
        );
    }

    #[test]
    fn finished_package_provides_itself() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = InstallStore::load(dir.path().join("installed.json")).unwrap();
        let stages = Arc::new(AtomicUsize::new(0));
        let mut driver = Driver::with_store(registry(stages, None, None), store);

        driver.run(&requirement("tool scheme:tool"));
        let record = driver.store().unwrap().lookup("tool").unwrap();
        let version: crate::version::Version = "1.0".parse().unwrap();
        assert_eq!(record.provisions.get("tool"), Some(Some(&version)));
    }
}
