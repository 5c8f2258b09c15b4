//! Cached availability state for the cluster and container runtime.
//!
//! One cache lives inside each engine instance. The first gated validation
//! probes the subsystem and records the answer; later runs reuse it until
//! [`AvailabilityCache::reset`]. A stale `Unavailable` can therefore outlive
//! an environment the user has since fixed - callers reset after the user
//! signals a retry.

use std::sync::{PoisonError, RwLock};

/// Probe state for one subsystem.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Availability {
    #[default]
    Unknown,
    Available,
    Unavailable,
}

/// The two infrastructure subsystems checks can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subsystem {
    Cluster,
    Container,
}

/// Tri-state cells, safe for concurrent reads; a lost update between two
/// concurrent probes is benign since both writers derived the value from a
/// fresh probe.
#[derive(Debug, Default)]
pub struct AvailabilityCache {
    cluster: RwLock<Availability>,
    container: RwLock<Availability>,
}

impl AvailabilityCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn cell(&self, subsystem: Subsystem) -> &RwLock<Availability> {
        match subsystem {
            Subsystem::Cluster => &self.cluster,
            Subsystem::Container => &self.container,
        }
    }

    #[must_use]
    pub fn get(&self, subsystem: Subsystem) -> Availability {
        *self
            .cell(subsystem)
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set(&self, subsystem: Subsystem, available: bool) {
        let state = if available {
            Availability::Available
        } else {
            Availability::Unavailable
        };
        *self
            .cell(subsystem)
            .write()
            .unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Forget both probes, forcing the next gated validation to re-probe.
    pub fn reset(&self) {
        *self
            .cluster
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Availability::Unknown;
        *self
            .container
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Availability::Unknown;
    }
}
