//! letsacme - get a signed certificate for a CSR from an ACME v1 CA
//! using http-01 challenges served from a web server's document root.

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use clap::Subcommand;
use letsacme::*;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::error;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Get a signed TLS certificate from Let's Encrypt (ACME v1) using
/// http-01 challenges.
///
/// The certificate, followed by the issuer chain, is written to stdout.
#[derive(Parser, Debug)]
#[command(name = "letsacme")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Path to the account private key (PEM, RSA)
  #[arg(long = "account-key", global = true)]
  account_key: Option<String>,

  /// Path to the certificate signing request (PEM or DER)
  #[arg(long)]
  csr: Option<String>,

  /// Configuration JSON string or file
  #[arg(long = "config-json", env = "LETSACME_CONFIG_JSON", global = true)]
  config_json: Option<String>,

  /// Path to the acme challenge directory
  #[arg(long = "acme-dir")]
  acme_dir: Option<String>,

  /// File to write the certificate to, overwritten if it exists
  #[arg(long = "cert-file")]
  cert_file: Option<String>,

  /// File to write the chain to, overwritten if it exists
  #[arg(long = "chain-file")]
  chain_file: Option<String>,

  /// Certificate authority, default is Let's Encrypt
  #[arg(long, global = true)]
  ca: Option<String>,

  /// Suppress output except for errors
  #[arg(long, global = true)]
  quiet: bool,

  /// Enable verbose logging (debug level)
  #[arg(long, global = true, conflicts_with = "quiet")]
  verbose: bool,

  /// Fetch the chain but do not print it on stdout
  #[arg(long = "no-chain")]
  no_chain: bool,

  /// Fetch the certificate but do not print it on stdout
  #[arg(long = "no-cert")]
  no_cert: bool,

  /// Delete a non-empty directory found at a challenge file path
  #[arg(long)]
  force: bool,

  /// Get a test certificate from the staging CA, unless --ca is given
  #[arg(long, global = true)]
  test: bool,

  /// Seconds between challenge status polls
  #[arg(long = "poll-interval", default_value_t = 1)]
  poll_interval: u64,

  /// Maximum number of challenge status polls, 0 polls forever
  #[arg(long = "poll-attempts", default_value_t = 300)]
  poll_attempts: u32,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
  /// Revoke a certificate issued to the account
  Revoke {
    /// Path to the certificate to revoke (PEM or DER)
    #[arg(long)]
    cert: PathBuf,
  },
}

impl Cli {
  fn options(&self) -> Options {
    Options {
      account_key: self.account_key.clone(),
      csr: self.csr.clone(),
      acme_dir: self.acme_dir.clone(),
      cert_file: self.cert_file.clone(),
      chain_file: self.chain_file.clone(),
      ca: self.ca.clone(),
      no_chain: self.no_chain,
      no_cert: self.no_cert,
      test: self.test,
      force: self.force,
      quiet: self.quiet,
      poll: PollPolicy {
        interval: Duration::from_secs(self.poll_interval),
        max_attempts: Some(self.poll_attempts).filter(|max| *max > 0),
      },
    }
  }
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let settings = load_settings(&cli);
  let quiet = match &settings {
    Ok(settings) => settings.quiet,
    Err(_) => cli.quiet,
  };
  init_logging(quiet, cli.verbose);

  let result = settings.and_then(|settings| match &cli.command {
    Some(Commands::Revoke { cert }) => revoke(&settings, cert),
    None => issue(&cli, &settings),
  });

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      error!("{:#}", err);
      ExitCode::FAILURE
    }
  }
}

fn load_settings(cli: &Cli) -> Result<Settings> {
  let file = match &cli.config_json {
    Some(config) => Some(FileConfig::load(config)?),
    None => None,
  };
  Ok(Settings::new(cli.options(), file.as_ref())?)
}

/// Log to stderr, so stdout only ever carries PEM output.
fn init_logging(quiet: bool, verbose: bool) {
  let level = if quiet {
    "error"
  } else if verbose {
    "debug"
  } else {
    "info"
  };
  let filter = EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| EnvFilter::new(level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_target(false)
    .with_writer(std::io::stderr)
    .init();
}

fn connect(
  settings: &Settings,
  options: ChallengeOptions,
) -> Result<AcmeClient<ReqwestClient>> {
  info!("Parsing account key...");
  let key = AccountKey::load(&settings.account_key)
    .context("failed to load account key")?;
  let http = ReqwestClient::new()?;
  let client = AcmeClient::connect(http, &settings.ca, key, options)
    .with_context(|| format!("failed to connect to {}", settings.ca))?;
  Ok(client)
}

fn issue(cli: &Cli, settings: &Settings) -> Result<()> {
  if cli.config_json.is_none() && settings.webroots.is_empty() {
    anyhow::bail!("either --acme-dir or --config-json must be given");
  }
  let csr_path = settings.csr.clone().context("CSR path not specified")?;
  let test_mode = if settings.is_staging() {
    " (test mode)"
  } else {
    ""
  };

  let options = ChallengeOptions {
    webroots: settings.webroots.clone(),
    force: settings.force,
    poll: settings.poll,
  };
  let client = connect(settings, options)?;

  info!("Parsing CSR...");
  let csr = Csr::load(&csr_path).context("failed to load CSR")?;
  let domains = csr.domains()?;

  let agreement = client.agreement_url();
  client.register(&agreement)?;
  client.verify_domains(&domains)?;

  info!("Requesting certificate{}", test_mode);
  let issued = client.issue(&csr)?;
  let print = !settings.no_cert;
  output(&issued.pem, settings.cert_file.as_deref(), print)?;

  if let Some(chain_url) = &issued.chain_url {
    let chain = client.fetch_chain(chain_url)?;
    let print = !settings.no_chain;
    output(&chain, settings.chain_file.as_deref(), print)?;
  }
  info!("Done{}", test_mode);
  Ok(())
}

/// Write `pem` to `path`, if any, and to stdout when `print` is set. A
/// file that can't be written is logged, and the PEM still printed.
fn output(pem: &str, path: Option<&Path>, print: bool) -> Result<()> {
  if let Some(path) = path {
    match std::fs::write(path, pem) {
      Ok(()) => info!("Wrote {}", path.display()),
      Err(err) => error!("{}: {}", path.display(), err),
    }
  }
  if print {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(pem.as_bytes())?;
    stdout.flush()?;
  }
  Ok(())
}

fn revoke(settings: &Settings, cert: &Path) -> Result<()> {
  let cert_der = load_certificate_der(cert)
    .with_context(|| format!("failed to load {}", cert.display()))?;
  let client = connect(settings, ChallengeOptions::default())?;
  client.revoke(&cert_der)?;
  Ok(())
}
