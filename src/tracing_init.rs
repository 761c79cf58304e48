//! Tracing setup
//!
//! One place to configure the subscriber for binaries and tests. Filtering
//! is environment-driven through RUST_LOG, e.g.
//! `RUST_LOG=spectype=debug` or `RUST_LOG=spectype::rv=trace`.

#[cfg(test)]
use once_cell::sync::Lazy;

/// Install the test subscriber once per process.
///
/// Safe to call from every test; later calls are no-ops. Output is routed
/// through the test writer so it only shows for failing tests.
#[cfg(test)]
pub fn init_test_tracing() {
    static TRACING: Lazy<()> = Lazy::new(|| {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("spectype=warn"));
        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_test_writer()
            .init();
    });

    Lazy::force(&TRACING);
}

/// Install the subscriber for a binary. Call early in main().
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("spectype=info"));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(true)
        .init();
}
