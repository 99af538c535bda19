use crate::client::AcmeClient;
use crate::csr::Csr;
use crate::error::*;
use crate::helpers::*;
use crate::transport::expect_status;
use crate::transport::HttpClient;
use crate::transport::HttpResponse;
use data_encoding::BASE64;
use openssl::x509::X509;
use reqwest::Url;
use serde_json::json;
use std::path::Path;
use tracing::info;
use tracing::instrument;
use tracing::warn;
use tracing::Level;

/// A freshly signed certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCertificate {
  /// The PEM encoded certificate.
  pub pem: String,
  /// Where the issuer certificate can be downloaded, if the CA said so.
  pub chain_url: Option<String>,
}

/// Wrap DER bytes as a PEM `CERTIFICATE` block, 64 columns wide.
pub fn pem_encode(der: &[u8]) -> String {
  let encoded = BASE64.encode(der);
  let lines = encoded
    .as_bytes()
    .chunks(64)
    .map(|chunk| String::from_utf8_lossy(chunk))
    .collect::<Vec<_>>()
    .join("\n");
  format!(
    "-----BEGIN CERTIFICATE-----\n{}\n-----END CERTIFICATE-----\n",
    lines
  )
}

/// The target of the `rel="up"` entry of a Link header value.
fn parse_up_link(value: &str) -> Option<&str> {
  value.split(',').find_map(|link| {
    let mut parts = link.split(';');
    let target = parts.next()?.trim().strip_prefix('<')?.strip_suffix('>')?;
    let is_up = parts.any(|param| match param.split_once('=') {
      Some((key, rel)) => {
        let mut rels = rel.trim().trim_matches('"').split_whitespace();
        key.trim().eq_ignore_ascii_case("rel") && rels.any(|r| r == "up")
      }
      None => false,
    });
    if is_up {
      Some(target)
    } else {
      None
    }
  })
}

/// The issuer chain URL announced by a response, resolved against the
/// response URL.
pub fn chain_url(resp: &HttpResponse) -> Option<String> {
  let target = resp
    .headers
    .get_all(reqwest::header::LINK)
    .iter()
    .filter_map(|value| value.to_str().ok())
    .find_map(parse_up_link)?;
  let base = Url::parse(&resp.url);
  match base.and_then(|base| base.join(target)) {
    Ok(url) => Some(url.to_string()),
    Err(_) => Some(target.to_string()),
  }
}

/// Read a PEM or DER certificate from disk and return it as DER.
pub fn load_certificate_der(path: &Path) -> Result<Vec<u8>, Error> {
  let bytes = std::fs::read(path).map_err(io_err(path))?;
  let cert = X509::from_pem(&bytes)
    .or_else(|_| X509::from_der(&bytes))
    .map_err(|err| Error::CertificateParse(err.to_string()))?;
  cert
    .to_der()
    .map_err(|err| Error::CertificateParse(err.to_string()))
}

impl<C: HttpClient> AcmeClient<C> {
  /// Have the CA sign `csr`. Every domain of the CSR must have been
  /// verified first.
  #[instrument(level = Level::INFO, name = "letsacme::AcmeClient::issue", skip(self, csr))]
  pub fn issue(&self, csr: &Csr) -> Result<IssuedCertificate, Error> {
    info!("Signing certificate...");
    let resp = self.transport.post(
      &self.directory().new_cert_url,
      &json!({
        "resource": "new-cert",
        "csr": b64(csr.der()),
      }),
    )?;
    expect_status(&resp, 201, "signing certificate")?;

    info!("Parsing chain url...");
    let chain_url = chain_url(&resp);
    if chain_url.is_none() {
      warn!("Failed to parse chain url!");
    }
    info!("Signed!");

    Ok(IssuedCertificate {
      pem: pem_encode(&resp.body),
      chain_url,
    })
  }

  /// Download the issuer certificate and return it as PEM.
  #[instrument(level = Level::INFO, name = "letsacme::AcmeClient::fetch_chain", skip(self))]
  pub fn fetch_chain(&self, url: &str) -> Result<String, Error> {
    let resp = self.transport.get(url)?;
    expect_status(&resp, 200, "fetching chain")?;
    Ok(pem_encode(&resp.body))
  }

  /// Revoke a certificate issued to this account.
  #[instrument(level = Level::INFO, name = "letsacme::AcmeClient::revoke", skip(self, cert_der))]
  pub fn revoke(&self, cert_der: &[u8]) -> Result<(), Error> {
    let url = self.directory().revoke_cert_url.clone();
    let url = url.ok_or_else(|| {
      Error::Config("the CA does not support revocation".to_string())
    })?;
    let resp = self.transport.post(
      &url,
      &json!({
        "resource": "revoke-cert",
        "certificate": b64(cert_der),
      }),
    )?;
    expect_status(&resp, 200, "revoking certificate")?;
    info!("Certificate revoked!");
    Ok(())
  }
}
