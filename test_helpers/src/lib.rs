//! Helpers shared by the test suites of the workspace crates.

#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(
    missing_debug_implementations,
    clippy::explicit_iter_loop,
    clippy::use_self,
    clippy::clone_on_ref_ptr
)]

use observability_deps::tracing;
use std::sync::Once;
use tracing_log::LogTracer;
use tracing_subscriber::{fmt, EnvFilter};

static LOG_SETUP: Once = Once::new();

/// Enable tracing output for tests when `RUST_LOG` is set.
///
/// Does nothing when the variable is absent, so test output stays quiet by
/// default. Safe to call from every test; initialization happens once.
pub fn maybe_start_logging() {
    if std::env::var("RUST_LOG").is_ok() {
        start_logging()
    }
}

/// Unconditionally enable tracing output for tests.
pub fn start_logging() {
    LOG_SETUP.call_once(|| {
        let _ = LogTracer::init();

        let subscriber = fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .finish();

        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
