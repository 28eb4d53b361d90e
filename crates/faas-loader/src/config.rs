use std::time::Duration;

use faas_circuitbreaker::CircuitBreakerConfig;

/// Loader-recognized configuration, per spec.md §6.
pub struct LoaderConfig {
    pub timeout: Duration,
    pub max_cache_size: usize,
    /// `Duration::ZERO` means entries never expire.
    pub cache_ttl: Duration,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            max_cache_size: 1000,
            cache_ttl: Duration::ZERO,
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}
