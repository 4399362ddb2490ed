/// Configurations for the Lattice scene graph runtime
#[derive(Debug, Default)]
pub struct Config {
    pub benchmark: BenchmarkMode,
    /// Overrides the default `tracing` filter directives.
    pub log_filter: Option<String>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum BenchmarkMode {
    /// Benchmarking is disabled
    #[default]
    Off,
    /// Profiling scopes are recorded, but no server is started
    On,
    /// Profiling scopes are recorded and can be viewed using external tools such as
    /// 'puffin_viewer'
    WithWebsever,
}
