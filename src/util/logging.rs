use tracing_subscriber::{fmt, EnvFilter};

/// Initializes tracing from `RUST_LOG`, defaulting the pipeline crates to
/// info so request flow is visible out of the box.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,floatchat=info"));

    fmt().with_env_filter(env_filter).with_target(true).init();
}
