use tracing_subscriber::EnvFilter;

/// Default filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "info,lattice_scene=debug,wgpu_core=info,wgpu_hal=info,naga=info";

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over [`DEFAULT_FILTER`].
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    install(filter);
}

/// Install the global `tracing` subscriber with an explicit filter string.
pub fn init_with_filter(filter: &str) {
    install(EnvFilter::new(filter));
}

fn install(filter: EnvFilter) {
    // A subscriber may already be installed by the host application or another test.
    if tracing_subscriber::fmt().with_env_filter(filter).try_init().is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
