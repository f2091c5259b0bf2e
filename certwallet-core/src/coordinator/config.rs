use std::time::Duration;

/// Tunables of the [`WalletCoordinator`](super::WalletCoordinator).
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Validity window of the optimistic success published by a forced verification.
    pub forced_validity: Duration,
    /// Reconcile again after a conversion wrote certificates to the store, so
    /// the new certificates enter verification without an explicit reload.
    pub reload_after_conversion: bool,
    /// A light certificate is only used if it expires after `now + margin`.
    pub light_expiry_margin: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            forced_validity: Duration::from_secs(2 * 24 * 60 * 60),
            reload_after_conversion: true,
            light_expiry_margin: Duration::ZERO,
        }
    }
}
