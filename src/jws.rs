use crate::error::*;
use crate::helpers::*;
use crate::key::AccountKey;
use crate::key::Jwk;
use openssl::hash::MessageDigest;
use openssl::sign::Signer;
use serde::Deserialize;
use serde::Serialize;

/// The account header sent with every request: the algorithm and the
/// public key of the account. The protected copy additionally carries
/// the nonce.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct JwsHeader {
  pub alg: String,
  pub jwk: Jwk,
}

impl JwsHeader {
  pub fn new(key: &AccountKey) -> Result<JwsHeader, Error> {
    Ok(JwsHeader {
      alg: "RS256".to_string(),
      jwk: Jwk::new(key)?,
    })
  }
}

#[derive(Serialize)]
struct ProtectedHeader<'a> {
  alg: &'a str,
  jwk: &'a Jwk,
  nonce: &'a str,
}

/// A signed request body, ready to be posted to the CA.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SignedRequest {
  pub header: JwsHeader,
  pub protected: String,
  pub payload: String,
  pub signature: String,
}

pub fn sign<T: Serialize + ?Sized>(
  key: &AccountKey,
  header: &JwsHeader,
  nonce: &str,
  payload: &T,
) -> Result<SignedRequest, Error> {
  let payload_b64 = b64(serde_json::to_string(payload)?.as_bytes());

  let protected = ProtectedHeader {
    alg: &header.alg,
    jwk: &header.jwk,
    nonce,
  };
  let protected_b64 = b64(serde_json::to_string(&protected)?.as_bytes());

  let signature_b64 = {
    let mut signer = Signer::new(MessageDigest::sha256(), key.pkey())
      .map_err(Error::Signing)?;
    signer
      .update(format!("{}.{}", protected_b64, payload_b64).as_bytes())
      .map_err(Error::Signing)?;
    b64(&signer.sign_to_vec().map_err(Error::Signing)?)
  };

  Ok(SignedRequest {
    header: header.clone(),
    protected: protected_b64,
    payload: payload_b64,
    signature: signature_b64,
  })
}
