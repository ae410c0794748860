use std::io::{BufRead, Write};

use asasl::{Credentials, Factory, Mechanism};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use clap::Parser;
use color_eyre::eyre;

/// An `asasl` client example, exchanging base64 payloads over the terminal.
///
/// Each line read is a server challenge, lines starting with `success`
/// carry the optional additional data of a successful outcome.
#[derive(Debug, Parser)]
pub struct Args {
    /// The mechanisms offered by the server, the preferred one is negotiated.
    #[arg(short, long, value_delimiter = ',', default_value = "SCRAM-SHA-1")]
    mechanisms: Vec<String>,

    /// The authentication identity.
    #[arg(short, long)]
    username: String,

    /// The password of the authentication identity.
    #[arg(short, long)]
    password: String,

    /// The XMPP domain being authenticated to.
    #[arg(long, default_value = "localhost")]
    host: String,

    /// The identity to act as, if different from the authenticated one.
    #[arg(short, long)]
    authzid: Option<String>,
}

fn exchange(mut mechanism: Box<dyn Mechanism>) -> eyre::Result<()> {
    let mut stdout = std::io::stdout().lock();

    match mechanism.start()? {
        Some(initial) => writeln!(stdout, "{}", BASE64.encode(initial))?,
        None => writeln!(stdout, "=")?,
    }

    for line in std::io::stdin().lock().lines() {
        let line = line?;
        let line = line.trim();

        if let Some(additional) = line.strip_prefix("success") {
            mechanism.success(&BASE64.decode(additional.trim())?)?;

            tracing::info!("Authenticated with `{}`", mechanism.name());
            break;
        }

        let response = mechanism.respond(&BASE64.decode(line)?)?;
        writeln!(stdout, "{}", BASE64.encode(response))?;
    }

    eyre::ensure!(
        mechanism.is_completed(),
        "The exchange ended in the {:?} state",
        mechanism.state()
    );

    Ok(())
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init()
        .ok();

    let args = Args::parse();

    let mut credentials = Credentials::new(args.username, args.password).with_host(args.host);
    if let Some(authzid) = args.authzid {
        credentials = credentials.with_authzid(authzid);
    }

    let mechanism = Factory::default().negotiate(&args.mechanisms, credentials)?;
    tracing::info!("Negotiated the `{}` mechanism", mechanism.name());

    exchange(mechanism)
}
