pub mod builders;
pub mod env;
pub mod fake_runner;

pub use builders::TaskConfigBuilder;
pub use env::TestEnv;
pub use fake_runner::{FakeRunner, SeenRequest};

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use scriptrun::logging::LOG_ENV;
use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Capture logs per test; the harness prints them for failing tests only.
///
/// Filter from `SCRIPTRUN_LOG`, then `RUST_LOG`, then `info`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV)
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Upper bound on any single execution driven by a test.
pub const TEST_DEADLINE: Duration = Duration::from_secs(10);

/// Await `f`, panicking if it outlives [`TEST_DEADLINE`].
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(TEST_DEADLINE, f).await {
        Ok(value) => value,
        Err(_) => panic!("execution did not finish within {TEST_DEADLINE:?}"),
    }
}
