//! Container configuration

/// When a settled update is folded back into state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Resolution {
    /// Publish the guess right away and fold the outcome as soon as the
    /// update settles
    #[default]
    Immediate,
    /// Leave settled updates queued until `resolve_updates` runs
    Deferred,
}

/// Optimistic container configuration
#[derive(Clone, Debug)]
pub struct StateConfig {
    /// Resolution used by `push_update`
    pub resolution: Resolution,
    /// When a confirmed update carries a payload, rebuild the speculative
    /// snapshot so the confirmed form replaces the guess (and publish it)
    pub adopt_payload: bool,
}

impl Default for StateConfig {
    fn default() -> Self {
        StateConfig {
            resolution: Resolution::Immediate,
            adopt_payload: true,
        }
    }
}

impl StateConfig {
    /// Batch-oriented setup: every push waits for a manual resolve
    pub fn deferred() -> Self {
        StateConfig {
            resolution: Resolution::Deferred,
            ..StateConfig::default()
        }
    }
}
