use crate::directory::Directory;
use crate::error::*;
use crate::key::AccountKey;
use crate::transport::HttpClient;
use crate::transport::Transport;
use crate::webroot::WebRoots;
use std::time::Duration;

/// How often and how long to poll a triggered challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
  pub interval: Duration,
  /// `None` polls until the CA reaches a verdict.
  pub max_attempts: Option<u32>,
}

impl Default for PollPolicy {
  fn default() -> Self {
    PollPolicy {
      interval: Duration::from_secs(1),
      max_attempts: Some(300),
    }
  }
}

#[derive(Debug, Clone, Default)]
pub struct ChallengeOptions {
  pub webroots: WebRoots,
  /// Recursively delete non-empty directories found at a challenge
  /// file path.
  pub force: bool,
  pub poll: PollPolicy,
}

/// An ACME client bound to one CA and one account key.
pub struct AcmeClient<C> {
  pub(crate) transport: Transport<C>,
  pub(crate) thumbprint: String,
  pub(crate) options: ChallengeOptions,
}

impl<C: HttpClient> AcmeClient<C> {
  pub fn new(
    http: C,
    directory: Directory,
    key: AccountKey,
    options: ChallengeOptions,
  ) -> Result<Self, Error> {
    let transport = Transport::new(http, directory, key)?;
    let thumbprint = transport.header().jwk.thumbprint()?;
    Ok(AcmeClient {
      transport,
      thumbprint,
      options,
    })
  }

  /// Fetch the directory of `ca` and create a client for it.
  pub fn connect(
    http: C,
    ca: &str,
    key: AccountKey,
    options: ChallengeOptions,
  ) -> Result<Self, Error> {
    let directory = Directory::fetch(&http, ca)?;
    Self::new(http, directory, key, options)
  }

  pub fn thumbprint(&self) -> &str {
    &self.thumbprint
  }

  pub fn directory(&self) -> &Directory {
    self.transport.directory()
  }
}
