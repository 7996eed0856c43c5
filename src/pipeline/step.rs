//! The pipeline step protocol and handler resolution.
//!
//! Handler resolution is capability dispatch, not subclass branching: the
//! [`StepRegistry`] holds `(name, priority, factory)` entries, and each
//! factory decides purely from `(stage, package)`, typically by matching the
//! locator scheme, whether its handler claims the pair. New source types are
//! added by registering a new entry, never by extending a shared base.

use crate::error::Result;
use crate::package::Package;
use crate::pipeline::{Stage, StepControl};
use std::fmt;

/// A handler driving a package through one or more pipeline stages.
///
/// Stage operations default to no-ops; a handler implements only the stages
/// it cares about. Success is a [`StepControl`]; a stage failure is an `Err`
/// that aborts only the current package's run.
pub trait PipelineStep: Send {
    /// Handler name for logs and diagnostics.
    fn name(&self) -> &'static str;

    fn init(&mut self, _pkg: &mut Package) -> Result<StepControl> {
        Ok(StepControl::Proceed)
    }

    fn fetch(&mut self, _pkg: &mut Package) -> Result<StepControl> {
        Ok(StepControl::Proceed)
    }

    fn inspect(&mut self, _pkg: &mut Package) -> Result<StepControl> {
        Ok(StepControl::Proceed)
    }

    fn extract(&mut self, _pkg: &mut Package) -> Result<StepControl> {
        Ok(StepControl::Proceed)
    }

    fn build(&mut self, _pkg: &mut Package) -> Result<StepControl> {
        Ok(StepControl::Proceed)
    }

    fn install(&mut self, _pkg: &mut Package) -> Result<StepControl> {
        Ok(StepControl::Proceed)
    }

    fn optlink(&mut self, _pkg: &mut Package) -> Result<StepControl> {
        Ok(StepControl::Proceed)
    }

    fn relocate(&mut self, _pkg: &mut Package) -> Result<StepControl> {
        Ok(StepControl::Proceed)
    }

    /// Pick the handler for the following stage.
    ///
    /// The default hands off through registry resolution; a handler that
    /// owns several consecutive stages returns a clone of itself instead.
    fn next_handler(
        &self,
        stage: Stage,
        pkg: &Package,
        registry: &StepRegistry,
    ) -> Option<Box<dyn PipelineStep>> {
        registry.resolve(stage, pkg)
    }

    /// Dispatch one stage operation.
    fn run_stage(&mut self, stage: Stage, pkg: &mut Package) -> Result<StepControl> {
        match stage {
            Stage::Init => self.init(pkg),
            Stage::Fetch => self.fetch(pkg),
            Stage::Inspect => self.inspect(pkg),
            Stage::Extract => self.extract(pkg),
            Stage::Build => self.build(pkg),
            Stage::Install => self.install(pkg),
            Stage::Optlink => self.optlink(pkg),
            Stage::Relocate => self.relocate(pkg),
        }
    }
}

/// Factory producing a handler instance when it claims a (stage, package)
/// pair, else `None`.
pub type StepFactory = Box<dyn Fn(Stage, &Package) -> Option<Box<dyn PipelineStep>> + Send + Sync>;

struct Registration {
    name: &'static str,
    priority: i32,
    factory: StepFactory,
}

/// Registry of handler factories, resolved per (stage, package).
#[derive(Default)]
pub struct StepRegistry {
    registrations: Vec<Registration>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler factory.
    ///
    /// Among factories claiming the same (stage, package) pair the highest
    /// priority wins; ties break by registration order. Assign distinct
    /// priorities rather than leaning on that tiebreak.
    pub fn register<F>(&mut self, name: &'static str, priority: i32, factory: F)
    where
        F: Fn(Stage, &Package) -> Option<Box<dyn PipelineStep>> + Send + Sync + 'static,
    {
        self.registrations.push(Registration {
            name,
            priority,
            factory: Box::new(factory),
        });
    }

    /// Resolve the winning handler for a (stage, package) pair, if any.
    pub fn resolve(&self, stage: Stage, pkg: &Package) -> Option<Box<dyn PipelineStep>> {
        let mut best: Option<(i32, Box<dyn PipelineStep>)> = None;
        for registration in &self.registrations {
            if let Some(handler) = (registration.factory)(stage, pkg) {
                // Strict comparison keeps the earliest registration on ties.
                let claims = match &best {
                    Some((priority, _)) => registration.priority > *priority,
                    None => true,
                };
                if claims {
                    best = Some((registration.priority, handler));
                }
            }
        }
        best.map(|(_, handler)| handler)
    }

    /// Registered factory names, in registration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.registrations.iter().map(|r| r.name).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}

impl fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepRegistry")
            .field("registrations", &self.names())
            .finish()
    }
}
