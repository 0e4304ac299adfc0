//! Mix limit admission
//!
//! The registry consults an `AdmissionPolicy` before allocating a new unit.
//! Redirecting an existing unit never goes through admission.

use lull_common::SubscriptionTier;

/// Default concurrent-sound limit for the Free tier
pub const DEFAULT_FREE_LIMIT: usize = 2;

/// Pluggable admission check for new playback units
pub trait AdmissionPolicy: Send + Sync {
    /// Whether a new unit may be allocated given the current active count
    fn can_admit(&self, active: usize, tier: SubscriptionTier) -> bool;

    /// Limit reported when admission is refused
    fn limit(&self) -> usize;
}

/// Tier-based concurrent-sound limit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MixLimitPolicy {
    limit: usize,
    enabled: bool,
}

impl MixLimitPolicy {
    /// Enforced policy with the given Free-tier limit
    pub fn new(limit: usize) -> Self {
        Self { limit, enabled: true }
    }

    /// Turn enforcement on or off; a disabled policy admits everything
    pub fn enforced(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn is_enforced(&self) -> bool {
        self.enabled
    }
}

impl Default for MixLimitPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_FREE_LIMIT)
    }
}

impl AdmissionPolicy for MixLimitPolicy {
    fn can_admit(&self, active: usize, tier: SubscriptionTier) -> bool {
        if !self.enabled {
            return true;
        }
        match tier {
            SubscriptionTier::Premium => true,
            SubscriptionTier::Free => active < self.limit,
        }
    }

    fn limit(&self) -> usize {
        self.limit
    }
}
