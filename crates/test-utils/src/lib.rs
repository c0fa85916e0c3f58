//! Shared fixtures for the assetdag test suites: builders for configs and
//! registries, a recording executor, and a scripted watch backend.

pub mod builders;
pub mod fake_executor;
pub mod fake_watch;

use std::future::Future;
use std::sync::OnceLock;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

/// Upper bound for any single async test step.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

static TRACING: OnceLock<()> = OnceLock::new();

/// Install a per-test tracing subscriber once per test binary.
///
/// Output goes through the test writer, so it only shows up for failing
/// tests or under `--nocapture`. `ASSETDAG_TEST_LOG` (falling back to
/// `RUST_LOG`) picks the filter; the default is `warn,assetdag=info`.
pub fn init_tracing() {
    TRACING.get_or_init(|| {
        let filter = std::env::var("ASSETDAG_TEST_LOG")
            .ok()
            .and_then(|raw| EnvFilter::try_new(raw).ok())
            .or_else(|| EnvFilter::try_from_default_env().ok())
            .unwrap_or_else(|| EnvFilter::new("warn,assetdag=info"));

        let _ = fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(false)
            .compact()
            .try_init();
    });
}

/// Await `fut`, failing the test if it takes longer than [`TEST_TIMEOUT`].
pub async fn with_timeout<F: Future>(fut: F) -> F::Output {
    match tokio::time::timeout(TEST_TIMEOUT, fut).await {
        Ok(out) => out,
        Err(_) => panic!("test step did not finish within {TEST_TIMEOUT:?}"),
    }
}
