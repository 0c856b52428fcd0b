//! Shared integration-test support.

/// Installs a tracing subscriber routing engine logs through the test
/// harness capture, filtered by `RUST_LOG`.
///
/// Safe to call from every test; only the first call per process wins.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
