use clap::Parser;
use opsdeck::cli::{self, Cli};
use opsdeck::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Must be set before anything resolves the config directory
    if let Some(dir) = &cli.config_dir {
        std::env::set_var("OPSDECK_CONFIG_DIR_OVERRIDE", dir);
    }

    logging::init(cli.verbose)?;

    cli::run(cli).await
}
