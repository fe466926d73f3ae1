//! Fee synchronization job settings.
//!
//! - `FEE_SYNC_BATCH_SIZE`: Student fee records written per transaction (default: 500)

pub const DEFAULT_FEE_SYNC_BATCH_SIZE: usize = 500;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeeSyncConfig {
    pub batch_size: usize,
}

impl Default for FeeSyncConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_FEE_SYNC_BATCH_SIZE,
        }
    }
}

impl FeeSyncConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let batch_size = std::env::var("FEE_SYNC_BATCH_SIZE")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_FEE_SYNC_BATCH_SIZE);

        Self { batch_size }
    }
}
