use clap::Parser;
use tracing_subscriber::EnvFilter;
use vendornet::cli::utils::{output_error, output_rejection};
use vendornet::cli::{Cli, OutputFormat};
use vendornet::error::Rejection;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so config overrides and VENDORNET_STATE apply to every command
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let format = OutputFormat::from_cli(&cli);

    if let Err(e) = vendornet::cli::run(cli).await {
        match e.downcast_ref::<Rejection>() {
            Some(rejection) => output_rejection(&format, rejection)?,
            None => match std::env::var("CLI_VERBOSE").as_deref() {
                Ok("true") | Ok("1") => eprintln!("Error: {e:?}"),
                _ => output_error(&format, &e.to_string(), None)?,
            },
        }
        std::process::exit(1);
    }

    Ok(())
}
