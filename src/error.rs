use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("failed to parse account key: {0}")]
  KeyParse(String),

  #[error("failed to sign request: {0}")]
  Signing(#[source] openssl::error::ErrorStack),

  #[error("failed to parse CSR: {0}")]
  CsrParse(String),

  #[error("failed to parse certificate: {0}")]
  CertificateParse(String),

  #[error("error {operation}: {status} {detail}")]
  UnexpectedStatus {
    operation: &'static str,
    status: u16,
    detail: String,
  },

  #[error("no http-01 challenge offered for {0}")]
  NoHttpChallenge(String),

  #[error("invalid and possibly dangerous token: {0:?}")]
  DangerousToken(String),

  #[error("couldn't get DocumentRoot or AcmeDir for domain: {0}")]
  NoChallengeDir(String),

  #[error("{} is a directory, it shouldn't even exist in normal cases; use force if you are sure about deleting it and all of its content", .0.display())]
  ChallengePathOccupied(PathBuf),

  #[error("wrote file to {}, but couldn't download {url}: {reason}", .path.display())]
  SelfCheck {
    path: PathBuf,
    url: String,
    reason: String,
  },

  #[error("{domain} challenge did not pass: {status}")]
  ChallengeFailed { domain: String, status: String },

  #[error("the maximum poll attempts have been exceeded")]
  MaxAttemptsExceeded,

  #[error("{}: {source}", .path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid configuration: {0}")]
  Config(String),

  #[error(transparent)]
  Transport(Box<dyn std::error::Error + Send + Sync>),
}

#[derive(Debug, thiserror::Error)]
#[error("transport error: {0}")]
pub struct TransportError(pub &'static str);

pub fn transport_err(msg: &'static str) -> Error {
  Error::Transport(Box::new(TransportError(msg)))
}

pub fn map_transport_err<T, E: std::error::Error + Send + Sync + 'static>(
  res: Result<T, E>,
) -> Result<T, Error> {
  res.map_err(|err| Error::Transport(Box::new(err)))
}

pub(crate) fn io_err(
  path: impl Into<PathBuf>,
) -> impl FnOnce(std::io::Error) -> Error {
  let path = path.into();
  move |source| Error::Io { path, source }
}

impl From<reqwest::Error> for Error {
  fn from(err: reqwest::Error) -> Self {
    Self::Transport(Box::new(err))
  }
}

impl From<serde_json::Error> for Error {
  fn from(err: serde_json::Error) -> Self {
    Self::Transport(Box::new(err))
  }
}

/// This is an error as returned by the ACME server.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ServerError {
  /// The type of this error.
  pub r#type: Option<String>,
  /// The status code of this error.
  pub status: Option<u16>,
  /// The human readable extra description for this error.
  pub detail: Option<String>,
}

impl std::error::Error for ServerError {}

impl std::fmt::Display for ServerError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(
      f,
      "ServerError({}): {}",
      self.r#type.clone().unwrap_or_default(),
      self.detail.clone().unwrap_or_default()
    )
  }
}

impl ServerError {
  /// Render a response body for an error message, preferring the ACME
  /// problem document when the body is one.
  pub(crate) fn describe(body: &[u8]) -> String {
    match serde_json::from_slice::<ServerError>(body) {
      Ok(err) if err.r#type.is_some() || err.detail.is_some() => {
        err.to_string()
      }
      _ => String::from_utf8_lossy(body).trim().to_string(),
    }
  }
}
