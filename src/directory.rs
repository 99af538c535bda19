use crate::error::*;
use crate::transport::HttpClient;
use serde::Deserialize;
use tracing::info;
use tracing::instrument;
use tracing::Level;

pub const LETS_ENCRYPT_URL: &str = "https://acme-v01.api.letsencrypt.org";
pub const LETS_ENCRYPT_STAGING_URL: &str =
  "https://acme-staging.api.letsencrypt.org";
pub const LETS_ENCRYPT_TERMS_URL: &str =
  "https://acme-v01.api.letsencrypt.org/terms";

/// The operation URLs of an ACME CA, fetched once from
/// `{CA}/directory`.
#[derive(Deserialize, Debug, Clone)]
pub struct Directory {
  #[serde(skip)]
  pub url: String,
  #[serde(rename = "new-reg")]
  pub new_reg_url: String,
  #[serde(rename = "new-authz")]
  pub new_authz_url: String,
  #[serde(rename = "new-cert")]
  pub new_cert_url: String,
  #[serde(rename = "revoke-cert")]
  pub revoke_cert_url: Option<String>,
  pub meta: Option<DirectoryMeta>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DirectoryMeta {
  #[serde(rename = "terms-of-service")]
  pub terms_of_service: Option<String>,
  pub website: Option<String>,
}

impl Directory {
  pub fn url_for(ca: &str) -> String {
    format!("{}/directory", ca.trim_end_matches('/'))
  }

  #[instrument(level = Level::INFO, name = "letsacme::Directory::fetch", skip(http))]
  pub fn fetch<C: HttpClient>(http: &C, ca: &str) -> Result<Directory, Error> {
    let url = Self::url_for(ca);
    let resp = http.get(&url)?;
    if !resp.is_success() {
      return Err(Error::UnexpectedStatus {
        operation: "fetching directory",
        status: resp.status,
        detail: ServerError::describe(&resp.body),
      });
    }
    let mut dir: Directory = serde_json::from_slice(&resp.body)?;
    dir.url = url;
    info!(new_reg = %dir.new_reg_url, "fetched directory");
    Ok(dir)
  }

  pub fn terms_of_service(&self) -> Option<&str> {
    self.meta.as_ref()?.terms_of_service.as_deref()
  }
}
