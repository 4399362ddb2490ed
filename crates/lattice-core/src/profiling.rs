//! Profiling utilities based on the `puffin` crate.
//!
//! The scene graph opens a scope on every allocation, frame preparation and
//! garbage collection pass, so a connected `puffin_viewer` shows where the
//! frame budget goes.

use std::sync::OnceLock;

pub use puffin::{GlobalProfiler, profile_function, profile_scope};

/// Address the HTTP profiling server binds to.
pub const PUFFIN_ADDR: &str = "0.0.0.0:8585";

/// Profiling backend options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfilingBackend {
    /// Send profiling data to puffin_viewer via HTTP.
    PuffinHttp,
}

static PROFILING_SERVER: OnceLock<puffin_http::Server> = OnceLock::new();

/// Initialize profiling with the specified backend.
///
/// # Example
/// ```no_run
/// use lattice_core::profiling::{init_profiling, ProfilingBackend};
///
/// init_profiling(ProfilingBackend::PuffinHttp);
/// ```
pub fn init_profiling(backend: ProfilingBackend) {
    match backend {
        ProfilingBackend::PuffinHttp => {
            puffin::set_scopes_on(true);

            match puffin_http::Server::new(PUFFIN_ADDR) {
                Ok(server) => {
                    tracing::info!("Puffin profiler server started on http://{PUFFIN_ADDR}");
                    let _ = PROFILING_SERVER.set(server);
                }
                Err(e) => {
                    tracing::error!("Failed to start puffin server: {}", e);
                }
            }
        }
    }
}

/// Mark the start of a new frame for profiling.
///
/// Call this once per frame, before `prepare_rendering`.
#[inline]
pub fn new_frame() {
    puffin::GlobalProfiler::lock().new_frame();
}
