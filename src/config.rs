use crate::client::PollPolicy;
use crate::directory::LETS_ENCRYPT_STAGING_URL;
use crate::directory::LETS_ENCRYPT_URL;
use crate::error::*;
use crate::webroot::WebRoot;
use crate::webroot::WebRoots;
use serde::Deserialize;
use serde::Deserializer;
use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;

/// The `--config-json` document.
///
/// Known keys configure the run. Any other key whose value is an object
/// is taken as a domain name mapping to its `AcmeDir` / `DocumentRoot`.
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
pub struct FileConfig {
  #[serde(rename = "AccountKey")]
  pub account_key: Option<String>,
  #[serde(rename = "CSR")]
  pub csr: Option<String>,
  #[serde(rename = "AcmeDir")]
  pub acme_dir: Option<String>,
  #[serde(rename = "DocumentRoot")]
  pub document_root: Option<String>,
  #[serde(rename = "CertFile")]
  pub cert_file: Option<String>,
  #[serde(rename = "ChainFile")]
  pub chain_file: Option<String>,
  #[serde(rename = "CA")]
  pub ca: Option<String>,
  #[serde(rename = "NoChain", default, deserialize_with = "flag")]
  pub no_chain: bool,
  #[serde(rename = "NoCert", default, deserialize_with = "flag")]
  pub no_cert: bool,
  #[serde(rename = "Test", default, deserialize_with = "flag")]
  pub test: bool,
  #[serde(rename = "Force", default, deserialize_with = "flag")]
  pub force: bool,
  #[serde(rename = "Quiet", default, deserialize_with = "flag")]
  pub quiet: bool,
  #[serde(flatten)]
  pub other: BTreeMap<String, serde_json::Value>,
}

/// Flags are written either as JSON booleans or as the string "true".
fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Flag {
    Bool(bool),
    Text(String),
  }

  Ok(match Flag::deserialize(deserializer)? {
    Flag::Bool(value) => value,
    Flag::Text(text) => text.eq_ignore_ascii_case("true"),
  })
}

/// `""`, `"."` and `".."` are placeholders, not paths.
fn unset(value: Option<String>) -> Option<String> {
  value.filter(|value| !matches!(value.as_str(), "" | "." | ".."))
}

impl FileConfig {
  /// Read the configuration from `arg`, which is either the path of a
  /// JSON file or the JSON document itself.
  pub fn load(arg: &str) -> Result<Self, Error> {
    let path = Path::new(arg);
    let text = if path.is_file() {
      std::fs::read_to_string(path).map_err(io_err(path))?
    } else {
      arg.to_string()
    };
    Self::parse(&text)
  }

  pub fn parse(text: &str) -> Result<Self, Error> {
    serde_json::from_str(text)
      .map_err(|err| Error::Config(format!("failed to parse json: {}", err)))
  }

  /// The per-domain challenge directories.
  pub fn domains(&self) -> Result<BTreeMap<String, WebRoot>, Error> {
    let mut domains = BTreeMap::new();
    for (domain, value) in &self.other {
      if !value.is_object() {
        continue;
      }
      let root: WebRoot = serde_json::from_value(value.clone())
        .map_err(|err| Error::Config(format!("{}: {}", domain, err)))?;
      let root = WebRoot {
        acme_dir: root.acme_dir.filter(|path| !is_placeholder(path)),
        document_root: root.document_root.filter(|path| !is_placeholder(path)),
      };
      domains.insert(domain.clone(), root);
    }
    Ok(domains)
  }
}

fn is_placeholder(path: &Path) -> bool {
  matches!(path.to_str(), Some("" | "." | ".."))
}

/// Values given on the command line. They take priority over the
/// JSON configuration.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Options {
  pub account_key: Option<String>,
  pub csr: Option<String>,
  pub acme_dir: Option<String>,
  pub cert_file: Option<String>,
  pub chain_file: Option<String>,
  pub ca: Option<String>,
  pub no_chain: bool,
  pub no_cert: bool,
  pub test: bool,
  pub force: bool,
  pub quiet: bool,
  pub poll: PollPolicy,
}

/// The settings of one run, after merging the command line with the
/// JSON configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
  pub account_key: PathBuf,
  pub csr: Option<PathBuf>,
  pub webroots: WebRoots,
  pub cert_file: Option<PathBuf>,
  pub chain_file: Option<PathBuf>,
  pub ca: String,
  pub no_chain: bool,
  pub no_cert: bool,
  pub force: bool,
  pub quiet: bool,
  pub poll: PollPolicy,
}

impl Settings {
  pub fn new(
    options: Options,
    file: Option<&FileConfig>,
  ) -> Result<Self, Error> {
    let file = file.cloned().unwrap_or_default();
    let pick =
      |cli: Option<String>, json: Option<String>| unset(cli).or(unset(json));

    let account_key = pick(options.account_key, file.account_key.clone())
      .ok_or_else(|| Error::Config("account key path not specified".into()))?;
    let test = options.test || file.test;
    let ca = pick(options.ca, file.ca.clone()).unwrap_or_else(|| {
      if test {
        LETS_ENCRYPT_STAGING_URL.to_string()
      } else {
        LETS_ENCRYPT_URL.to_string()
      }
    });

    let webroots = WebRoots {
      global: WebRoot {
        acme_dir: pick(options.acme_dir, file.acme_dir.clone())
          .map(PathBuf::from),
        document_root: unset(file.document_root.clone()).map(PathBuf::from),
      },
      domains: file.domains()?,
    };

    Ok(Settings {
      account_key: PathBuf::from(account_key),
      csr: pick(options.csr, file.csr.clone()).map(PathBuf::from),
      webroots,
      cert_file: pick(options.cert_file, file.cert_file.clone())
        .map(PathBuf::from),
      chain_file: pick(options.chain_file, file.chain_file.clone())
        .map(PathBuf::from),
      ca,
      no_chain: options.no_chain || file.no_chain,
      no_cert: options.no_cert || file.no_cert,
      force: options.force || file.force,
      quiet: options.quiet || file.quiet,
      poll: options.poll,
    })
  }

  /// Whether the CA is the Let's Encrypt staging endpoint.
  pub fn is_staging(&self) -> bool {
    self.ca.trim_end_matches('/') == LETS_ENCRYPT_STAGING_URL
  }
}
