use crate::error::*;
use crate::helpers::*;
use openssl::pkey::Id;
use openssl::pkey::PKey;
use openssl::pkey::Private;
use openssl::sha::sha256;
use serde::Deserialize;
use serde::Serialize;
use std::path::Path;
use tracing::debug;

/// The account private key. Every request to the CA is signed with it,
/// and its public half identifies the account.
#[derive(Clone)]
pub struct AccountKey {
  pkey: PKey<Private>,
}

impl std::fmt::Debug for AccountKey {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("AccountKey")
      .field("bits", &self.pkey.bits())
      .finish()
  }
}

/// The RSA public parameters of an [`AccountKey`], as big-endian
/// bytes without leading zeros.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicParams {
  pub modulus: Vec<u8>,
  pub exponent: Vec<u8>,
}

impl AccountKey {
  pub fn from_pkey(pkey: PKey<Private>) -> Result<Self, Error> {
    if pkey.id() != Id::RSA {
      return Err(Error::KeyParse(format!(
        "unsupported key type {:?}, only RSA account keys are supported",
        pkey.id()
      )));
    }
    Ok(AccountKey { pkey })
  }

  pub fn from_pem(pem: &[u8]) -> Result<Self, Error> {
    let pkey = PKey::private_key_from_pem(pem)
      .map_err(|err| Error::KeyParse(err.to_string()))?;
    Self::from_pkey(pkey)
  }

  /// Load a PEM encoded RSA private key (PKCS#1 or PKCS#8) from disk.
  pub fn load(path: &Path) -> Result<Self, Error> {
    let pem = std::fs::read(path).map_err(io_err(path))?;
    let key = Self::from_pem(&pem)?;
    let bits = key.pkey.bits();
    debug!(path = %path.display(), bits, "loaded account key");
    Ok(key)
  }

  pub fn public_params(&self) -> Result<PublicParams, Error> {
    let rsa = self
      .pkey
      .rsa()
      .map_err(|err| Error::KeyParse(err.to_string()))?;
    Ok(PublicParams {
      modulus: rsa.n().to_vec(),
      exponent: rsa.e().to_vec(),
    })
  }

  pub(crate) fn pkey(&self) -> &PKey<Private> {
    &self.pkey
  }
}

/// The public JSON Web Key of an RSA account key.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Jwk {
  pub e: String,
  pub kty: String,
  pub n: String,
}

impl Jwk {
  pub fn new(key: &AccountKey) -> Result<Jwk, Error> {
    Ok(Jwk::from_params(&key.public_params()?))
  }

  pub fn from_params(params: &PublicParams) -> Jwk {
    Jwk {
      e: b64(strip_leading_zeros(&params.exponent)),
      kty: "RSA".to_string(),
      n: b64(strip_leading_zeros(&params.modulus)),
    }
  }

  /// The JSON encoding with lexicographically sorted keys and no
  /// whitespace, as required for thumbprints by RFC 7638.
  pub fn canonical_json(&self) -> Result<String, Error> {
    // serde_json::Map is ordered by key.
    let value = serde_json::to_value(self)?;
    Ok(serde_json::to_string(&value)?)
  }

  /// The base64url SHA-256 digest of the canonical JSON encoding.
  pub fn thumbprint(&self) -> Result<String, Error> {
    Ok(b64(&sha256(self.canonical_json()?.as_bytes())))
  }
}

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
  let start = bytes
    .iter()
    .position(|b| *b != 0)
    .unwrap_or(bytes.len().saturating_sub(1));
  &bytes[start..]
}

/// The content served at the well-known challenge path.
pub fn key_authorization(token: &str, thumbprint: &str) -> String {
  format!("{}.{}", token, thumbprint)
}
