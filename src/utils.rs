/// Install a `tracing` subscriber which prints to stderr, filtered by the
/// `RUST_LOG` environment variable and `info` by default.
#[cfg(feature = "logging")]
pub fn init_logging() -> anyhow::Result<()> {
    use anyhow::Context;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    Ok(())
}
