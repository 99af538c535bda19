use crate::client::AcmeClient;
use crate::directory::LETS_ENCRYPT_TERMS_URL;
use crate::error::*;
use crate::transport::HttpClient;
use serde_json::json;
use tracing::field;
use tracing::info;
use tracing::instrument;
use tracing::warn;
use tracing::Level;
use tracing::Span;

/// The outcome of a new-reg request. Both are success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
  Created,
  AlreadyRegistered,
}

/// Follow redirects from `url` and return where they end. On any
/// failure the URL is returned unchanged.
pub fn canonical_url<C: HttpClient>(http: &C, url: &str) -> String {
  match http.get(url) {
    Ok(resp) if resp.is_success() => resp.url,
    Ok(resp) => {
      warn!(
        url,
        status = resp.status,
        "could not resolve terms of service"
      );
      url.to_string()
    }
    Err(err) => {
      warn!(url, error = %err, "could not resolve terms of service");
      url.to_string()
    }
  }
}

impl<C: HttpClient> AcmeClient<C> {
  /// The subscriber agreement to accept: the directory's terms of
  /// service link, or the Let's Encrypt one, with redirects resolved.
  pub fn agreement_url(&self) -> String {
    let terms = self
      .directory()
      .terms_of_service()
      .unwrap_or(LETS_ENCRYPT_TERMS_URL);
    canonical_url(self.transport.http(), terms)
  }

  #[instrument(level = Level::INFO, name = "letsacme::AcmeClient::register", skip(self), fields(registration = field::Empty))]
  pub fn register(&self, agreement: &str) -> Result<Registration, Error> {
    info!("Registering account...");
    let resp = self.transport.post(
      &self.directory().new_reg_url,
      &json!({
        "resource": "new-reg",
        "agreement": agreement,
      }),
    )?;

    let registration = match resp.status {
      201 => {
        info!("Registered!");
        Registration::Created
      }
      409 => {
        info!("Already registered!");
        Registration::AlreadyRegistered
      }
      status => {
        return Err(Error::UnexpectedStatus {
          operation: "registering",
          status,
          detail: ServerError::describe(&resp.body),
        })
      }
    };
    Span::current().record("registration", field::debug(&registration));
    Ok(registration)
  }
}
