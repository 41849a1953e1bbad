mod cli;
mod render;
mod repl;

use repl::Repl;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = cli::parse_config();

    let default_level = if config.debug { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let mut repl = Repl::new(config);
    repl.run().await;
    Ok(())
}
