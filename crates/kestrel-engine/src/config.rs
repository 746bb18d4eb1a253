//! Engine configuration.

use crate::error::EngineError;
use crate::search::params::SearchParams;
use crate::search::score::MAX_DEPTH;

/// Largest transposition table accepted, in megabytes.
pub const MAX_HASH_MB: usize = 65_536;

/// Most search threads accepted.
pub const MAX_THREADS: usize = 256;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Transposition table size in megabytes.
    pub hash_mb: usize,
    pub threads: usize,
    /// Ceiling on the iterative deepening depth, whatever the limits ask for.
    pub max_depth: u8,
    pub params: SearchParams,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            hash_mb: 16,
            threads: 1,
            max_depth: MAX_DEPTH,
            params: SearchParams::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.hash_mb == 0 || self.hash_mb > MAX_HASH_MB {
            return Err(EngineError::InvalidConfig(format!(
                "hash size {} MB outside 1..={MAX_HASH_MB}",
                self.hash_mb
            )));
        }
        if self.threads == 0 || self.threads > MAX_THREADS {
            return Err(EngineError::InvalidConfig(format!(
                "thread count {} outside 1..={MAX_THREADS}",
                self.threads
            )));
        }
        if self.max_depth == 0 || self.max_depth > MAX_DEPTH {
            return Err(EngineError::InvalidConfig(format!(
                "max depth {} outside 1..={MAX_DEPTH}",
                self.max_depth
            )));
        }
        self.params.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert_eq!(EngineConfig::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_zero_hash_and_threads() {
        let config = EngineConfig { hash_mb: 0, ..EngineConfig::default() };
        assert!(matches!(config.validate(), Err(EngineError::InvalidConfig(_))));
        let config = EngineConfig { threads: 0, ..EngineConfig::default() };
        assert!(matches!(config.validate(), Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_depth_past_stack() {
        let config = EngineConfig { max_depth: MAX_DEPTH + 1, ..EngineConfig::default() };
        assert!(config.validate().is_err());
    }
}
