use std::{
    fs,
    io::{self, Read, Write},
    path::PathBuf,
};

use clap::Parser;
use color_eyre::eyre::WrapErr;
use wsse_signer::{config::Config, telemetry};

/// Sign a SOAP envelope with the configured X.509 certificate
#[derive(Parser, Debug)]
#[command(name = "wsse-sign")]
#[command(about = "Add a signed WS-Security header to a SOAP envelope")]
struct Args {
    /// Namespace prefix of the envelope's Body element
    #[arg(short, long)]
    prefix: Option<String>,

    /// Envelope to sign, read from stdin when omitted
    input: Option<PathBuf>,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    let args = Args::parse();
    let config = Config::load()?;
    tracing::info!("Loaded configuration: {:?}", config);

    let envelope = match &args.input {
        Some(path) => fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut envelope = String::new();
            io::stdin().read_to_string(&mut envelope)?;
            envelope
        }
    };

    let prefix = args
        .prefix
        .as_deref()
        .unwrap_or(&config.signing.envelope_prefix);

    let mut ctx = config.signing.security_context()?;
    let signed = ctx.post_process(&envelope, prefix)?;

    let mut stdout = io::stdout().lock();
    stdout.write_all(signed.as_bytes())?;
    stdout.flush()?;
    Ok(())
}
