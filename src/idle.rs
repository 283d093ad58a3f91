//! # Idle-time Diagnostics
//!
//! Runs whenever the executive finds nothing due. It must never block or
//! sleep: the executive parks the core with `wfi` right after it, and any
//! waiting in here would be idle time spent somewhere else.
//!
//! Two checks:
//! - once, a name registry round trip on a resource created for the purpose,
//!   after which the resource is deleted;
//! - every call, a heap telemetry sample (free and lowest-ever free bytes),
//!   kept for the debugger and otherwise not acted upon.
//!
//! A failed registry assertion is fatal: it means the registry is broken, not
//! the test.

use crate::config::TEST_RESOURCE_NAME;
use crate::error::{ConfigError, OrFatal};
use crate::heap::{HeapSample, HeapTelemetry};
use crate::registry::{Registry, ResourceId};

/// Work done by one idle call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IdleReport {
    /// Registry lookups and updates performed. At most
    /// [`ROUND_TRIP_OPS`], and zero once the test resource is gone.
    pub registry_ops: u8,
    pub heap: HeapSample,
}

/// Called by the executive when no activity is due.
pub trait IdleHook {
    fn on_idle(&mut self) -> IdleReport;
}

/// Registry operations in one round trip: lookup, add, lookup, remove, lookup.
pub const ROUND_TRIP_OPS: u8 = 5;

/// Name `id`, check the name reads back, remove it, check it is gone.
pub fn registry_round_trip(
    registry: &Registry,
    id: ResourceId,
    name: &'static str,
) -> Result<(), ConfigError> {
    if registry.name_of(id).is_some() {
        return Err(ConfigError::Diagnostic("resource named before registration"));
    }
    registry.add(id, name)?;
    if registry.name_of(id) != Some(name) {
        return Err(ConfigError::Diagnostic("registered name does not read back"));
    }
    registry.remove(id);
    if registry.name_of(id).is_some() {
        return Err(ConfigError::Diagnostic("name still present after removal"));
    }
    Ok(())
}

pub struct IdleDiagnostics<'a> {
    registry: &'a Registry,
    heap: &'a dyn HeapTelemetry,
    test_resource: Option<ResourceId>,
    last_sample: HeapSample,
}

impl<'a> IdleDiagnostics<'a> {
    /// `test_resource` exists only to be registered, unregistered and
    /// deleted by the first idle call.
    pub fn new(registry: &'a Registry, heap: &'a dyn HeapTelemetry, test_resource: ResourceId) -> Self {
        Self {
            registry,
            heap,
            test_resource: Some(test_resource),
            last_sample: HeapSample::default(),
        }
    }

    pub fn last_sample(&self) -> HeapSample {
        self.last_sample
    }

    /// Whether the test resource has been deleted yet.
    pub fn resource_deleted(&self) -> bool {
        self.test_resource.is_none()
    }
}

impl IdleHook for IdleDiagnostics<'_> {
    fn on_idle(&mut self) -> IdleReport {
        let mut registry_ops = 0;

        // Deleting the resource is taking it out of the Option
        if let Some(id) = self.test_resource.take() {
            registry_round_trip(self.registry, id, TEST_RESOURCE_NAME).or_fatal();
            registry_ops = ROUND_TRIP_OPS;
        }

        self.last_sample = self.heap.sample();
        IdleReport { registry_ops, heap: self.last_sample }
    }
}
