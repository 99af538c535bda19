use crate::challenge::*;
use crate::client::AcmeClient;
use crate::error::*;
use crate::helpers::Identifier;
use crate::key::key_authorization;
use crate::transport::expect_status;
use crate::transport::HttpClient;
use crate::webroot::WELL_KNOWN_DIR;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeSet;
use tracing::debug;
use tracing::field;
use tracing::info;
use tracing::instrument;
use tracing::warn;
use tracing::Level;
use tracing::Span;

#[derive(Deserialize, Debug, Eq, PartialEq, Clone, Copy)]
#[serde(rename_all = "camelCase")]
/// The status of an authorization.
pub enum AuthorizationStatus {
  Pending,
  Processing,
  Valid,
  Invalid,
  Revoked,
  Deactivated,
  Expired,
  #[serde(other)]
  Unknown,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
/// An ACME authorization object represents a server's authorization
/// for an account to represent an identifier.
pub struct Authorization {
  /// The identifier that the account is authorized to represent.
  pub identifier: Identifier,
  /// The status of this authorization.
  pub status: Option<AuthorizationStatus>,
  /// The timestamp after which the server will consider this
  /// authorization invalid.
  pub expires: Option<String>,
  /// The challenges that the client can fulfill in order to prove
  /// possession of the identifier.
  pub challenges: Vec<Challenge>,
}

#[derive(Deserialize, Debug, Eq, PartialEq, Clone, Copy)]
#[serde(rename_all = "camelCase")]
/// The status of a challenge. Only `pending` is polled further.
pub enum ChallengeStatus {
  Pending,
  Processing,
  Valid,
  Invalid,
  Revoked,
  #[serde(other)]
  Unknown,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
  #[serde(rename = "type")]
  /// The type of challenge encoded in the object.
  pub typ: String,
  /// The URL to which a response can be posted, and which reports the
  /// status of the challenge.
  #[serde(alias = "url")]
  pub uri: String,
  /// A random value that uniquely identifies the challenge.
  #[serde(default)]
  pub token: String,
  pub status: Option<ChallengeStatus>,
  /// Error that occurred while the server was validating the
  /// challenge, if any.
  pub error: Option<ServerError>,
  pub validation_record: Option<Vec<ValidationRecord>>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ValidationRecord {
  pub url: Option<String>,
}

/// The body of a challenge status poll.
#[derive(Deserialize, Debug)]
struct ChallengeState {
  status: ChallengeStatus,
}

impl Authorization {
  pub fn get_challenge(&self, typ: &str) -> Option<&Challenge> {
    self
      .challenges
      .iter()
      .find(|challenge| challenge.typ == typ)
  }
}

impl Challenge {
  /// The well-known directory and URL announced in a validation record
  /// of the form `<scheme>://{domain}/{dir}/{token}`.
  pub fn well_known_override(
    &self,
    domain: &str,
    token: &str,
  ) -> Option<(String, String)> {
    self
      .validation_record
      .iter()
      .flatten()
      .filter_map(|record| record.url.as_deref())
      .find_map(|url| {
        let (_, rest) = url.split_once("://")?;
        let path = rest.strip_prefix(domain)?.strip_prefix('/')?;
        let dir = path.strip_suffix(token)?.strip_suffix('/')?;
        if dir.split('/').any(|segment| segment == "..") {
          return None;
        }
        Some((dir.to_string(), url.to_string()))
      })
  }
}

impl<C: HttpClient> AcmeClient<C> {
  /// Run the http-01 challenge for every domain, one after another.
  pub fn verify_domains(
    &self,
    domains: &BTreeSet<String>,
  ) -> Result<(), Error> {
    for domain in domains {
      self.verify_domain(domain)?;
    }
    Ok(())
  }

  #[instrument(level = Level::DEBUG, name = "letsacme::AcmeClient::new_authorization", skip(self), fields(status = field::Empty))]
  pub fn new_authorization(
    &self,
    domain: &str,
  ) -> Result<Authorization, Error> {
    let resp = self.transport.post(
      &self.directory().new_authz_url,
      &json!({
        "resource": "new-authz",
        "identifier": Identifier::dns(domain),
      }),
    )?;
    expect_status(&resp, 201, "requesting challenges")?;
    let authorization: Authorization = serde_json::from_slice(&resp.body)?;
    Span::current().record("status", field::debug(&authorization.status));
    Ok(authorization)
  }

  /// Prove control over `domain`: publish the http-01 response, check
  /// it is reachable, have the CA validate it and wait for the verdict.
  /// The challenge file is removed whatever the outcome.
  #[instrument(level = Level::INFO, name = "letsacme::AcmeClient::verify_domain", skip(self))]
  pub fn verify_domain(&self, domain: &str) -> Result<(), Error> {
    info!("Verifying {}...", domain);
    let authorization = self.new_authorization(domain)?;
    let challenge = authorization
      .get_challenge("http-01")
      .ok_or_else(|| Error::NoHttpChallenge(domain.to_string()))?;

    let token = sanitize_token(&challenge.token)?;
    let key_authorization = key_authorization(&token, &self.thumbprint);

    let (well_known_dir, well_known_url) =
      match challenge.well_known_override(domain, &token) {
        Some((dir, url)) => {
          info!("Well known path was parsed: {}", dir);
          (dir, url)
        }
        None => (
          WELL_KNOWN_DIR.to_string(),
          format!("http://{}/{}/{}", domain, WELL_KNOWN_DIR, token),
        ),
      };

    let dir = self.options.webroots.resolve(domain, &well_known_dir)?;
    prepare_dir(&dir)?;
    clear_token_path(&dir.join(&token), self.options.force)?;
    let file = ChallengeFile::write(&dir, &token, &key_authorization)?;

    self.self_check(&file, &well_known_url, &key_authorization)?;
    self.trigger(challenge, &key_authorization)?;
    self.wait_done(challenge, domain)?;

    if let Err(err) = file.remove() {
      warn!(error = %err, "failed to remove challenge file");
    }
    info!("{} verified!", domain);
    Ok(())
  }

  /// Fetch the published response the way the CA will, before
  /// bothering the CA with it.
  fn self_check(
    &self,
    file: &ChallengeFile,
    url: &str,
    expected: &str,
  ) -> Result<(), Error> {
    let failure = |reason: String| Error::SelfCheck {
      path: file.path().to_path_buf(),
      url: url.to_string(),
      reason,
    };

    let resp = self
      .transport
      .get(url)
      .map_err(|err| failure(err.to_string()))?;
    if !resp.is_success() {
      return Err(failure(format!("status {}", resp.status)));
    }
    if resp.text().trim() != expected {
      return Err(failure(
        "content does not match the key authorization".to_string(),
      ));
    }
    debug!(url, "challenge response is reachable");
    Ok(())
  }

  fn trigger(
    &self,
    challenge: &Challenge,
    key_authorization: &str,
  ) -> Result<(), Error> {
    let resp = self.transport.post(
      &challenge.uri,
      &json!({
        "resource": "challenge",
        "keyAuthorization": key_authorization,
      }),
    )?;
    expect_status(&resp, 202, "triggering challenge")
  }

  #[instrument(level = Level::DEBUG, name = "letsacme::AcmeClient::wait_done", skip(self, challenge), fields(uri = %challenge.uri, attempts = field::Empty))]
  fn wait_done(
    &self,
    challenge: &Challenge,
    domain: &str,
  ) -> Result<(), Error> {
    let poll = self.options.poll;
    let mut attempt = 0;

    loop {
      if poll.max_attempts.map_or(false, |max| attempt >= max) {
        return Err(Error::MaxAttemptsExceeded);
      }
      attempt += 1;
      Span::current().record("attempts", attempt);

      let resp = self.transport.get(&challenge.uri)?;
      if !resp.is_success() {
        return Err(Error::UnexpectedStatus {
          operation: "checking challenge",
          status: resp.status,
          detail: ServerError::describe(&resp.body),
        });
      }

      let state: ChallengeState = serde_json::from_slice(&resp.body)?;
      match state.status {
        ChallengeStatus::Pending => {
          debug!(
            { delay = ?poll.interval },
            "Challenge still pending. Waiting to poll."
          );
          std::thread::sleep(poll.interval);
        }
        ChallengeStatus::Valid => return Ok(()),
        _ => {
          return Err(Error::ChallengeFailed {
            domain: domain.to_string(),
            status: resp.text(),
          })
        }
      }
    }
  }
}
