use tracing::error;

/// Overrides the default worker count.
pub const ENV_WORKERS: &str = "KVERN_WORKERS";

/// Worker count to use when the caller does not care: the `KVERN_WORKERS`
/// environment variable if set and parseable, otherwise the number of
/// logical CPUs. Never less than 1.
pub fn default_workers() -> usize {
    std::env::var(ENV_WORKERS)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or_else(num_cpus::get)
        .max(1)
}

/// Exit path for infrastructure failures: thread creation/join errors and
/// poisoned sync primitives are not recovered.
pub(crate) fn die(msg: &str) -> ! {
    error!("{msg}");
    std::process::exit(1);
}
