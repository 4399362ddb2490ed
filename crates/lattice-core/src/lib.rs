//! Lattice Core
//!
//! This crate contains the shared building blocks of the Lattice scene graph:
//! the stable-handle object pool, math re-exports, logging, profiling and
//! engine-level configuration.

pub mod alloc;
pub mod config;
pub mod logging;
pub mod math;
pub mod profiling;

use config::{BenchmarkMode, Config};

/// Initialize logging and, if requested, profiling for the given configuration.
pub fn init(config: &Config) {
    match config.log_filter.as_deref() {
        Some(filter) => logging::init_with_filter(filter),
        None => logging::init(),
    }

    match config.benchmark {
        BenchmarkMode::Off => {}
        BenchmarkMode::On => puffin::set_scopes_on(true),
        BenchmarkMode::WithWebsever => {
            profiling::init_profiling(profiling::ProfilingBackend::PuffinHttp)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_repeatable() {
        let config = Config {
            log_filter: Some("warn".to_string()),
            ..Config::default()
        };
        init(&config);
        init(&Config::default());
    }
}
