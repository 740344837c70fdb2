use anyhow::{Context, Result};
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use cloud_archive::cli::{dispatch, Command, SettingsArgs};

#[derive(Parser)]
#[command(
    name = "cloud-archive",
    version,
    about = "Back up a directory to a cloud bucket and restore it again",
    long_about = "cloud-archive packs a local directory into a dated .tgz archive, \
                  uploads it to a Google Cloud Storage or Amazon S3 bucket and keeps \
                  the bucket's retention and cold-storage lifecycle rules in line \
                  with the configured limits. Restores fetch the newest archive \
                  (or a named one) and unpack it in place."
)]
struct Cli {
    /// Enable debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(flatten)]
    settings: SettingsArgs,

    #[command(subcommand)]
    command: Command,
}

fn setup_logging(verbose: bool, quiet: bool) -> Result<()> {
    let level = if verbose {
        Level::DEBUG
    } else if quiet {
        Level::ERROR
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).context("Failed to set up logging")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet)?;

    let settings = cli.settings.load()?;
    dispatch(cli.command, settings).await?;

    Ok(())
}
