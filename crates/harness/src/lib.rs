mod seed;
mod session;

pub use seed::SeedSet;
pub use session::TestSession;

/// Install a test-friendly tracing subscriber once per process. Honours
/// `RUST_LOG`; silent by default.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("off")),
        )
        .with_test_writer()
        .try_init();
}
