use anyhow::Context;
use clap::Parser;
use contact_relay::{
    configuration::get_configuration,
    startup::Application,
    telemetry::{get_subscriber, init_subscriber},
};

/// Relay contact-form submissions to a mailbox.
#[derive(Debug, Parser)]
#[clap(version, about)]
struct Cli {
    /// Path prefix the service is mounted under behind a reverse proxy.
    root_path: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    let subscriber = get_subscriber("contact-relay", "info", std::io::stdout);
    init_subscriber(subscriber).map_err(|e| anyhow::anyhow!(e))?;

    let mut configuration = get_configuration().context("failed to read configuration")?;
    if cli.root_path.is_some() {
        configuration.application.root_path = cli.root_path;
    }

    let application = Application::build(configuration)?;
    tracing::info!(
        address = %application.address()?,
        path = application.public_path(),
        "contact relay listening"
    );

    application.run().await?;
    Ok(())
}
