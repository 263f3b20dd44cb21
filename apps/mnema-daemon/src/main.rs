use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	mnema_daemon::run(mnema_daemon::Args::parse()).await
}
