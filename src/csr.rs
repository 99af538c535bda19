use crate::error::*;
use openssl::x509::X509Req;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::info;
use x509_parser::certification_request::X509CertificationRequest;
use x509_parser::extensions::GeneralName;
use x509_parser::extensions::ParsedExtension;
use x509_parser::prelude::FromDer;

/// A certificate signing request, kept in DER form.
#[derive(Debug, Clone)]
pub struct Csr {
  der: Vec<u8>,
}

impl Csr {
  pub fn from_der(der: Vec<u8>) -> Result<Self, Error> {
    X509CertificationRequest::from_der(&der).map_err(csr_err)?;
    Ok(Csr { der })
  }

  pub fn from_pem(pem: &[u8]) -> Result<Self, Error> {
    let req = X509Req::from_pem(pem).map_err(csr_err)?;
    let der = req.to_der().map_err(csr_err)?;
    Self::from_der(der)
  }

  /// Load a PEM or DER encoded CSR from disk.
  pub fn load(path: &Path) -> Result<Self, Error> {
    let bytes = std::fs::read(path).map_err(io_err(path))?;
    if String::from_utf8_lossy(&bytes)
      .trim_start()
      .starts_with("-----BEGIN")
    {
      Self::from_pem(&bytes)
    } else {
      Self::from_der(bytes)
    }
  }

  pub fn der(&self) -> &[u8] {
    &self.der
  }

  /// The subject common name and every DNS subject alternative name.
  pub fn domains(&self) -> Result<BTreeSet<String>, Error> {
    let parsed = X509CertificationRequest::from_der(&self.der);
    let (_, req) = parsed.map_err(csr_err)?;

    let mut domains = BTreeSet::new();
    for cn in req.certification_request_info.subject.iter_common_name() {
      let cn = cn
        .as_str()
        .map_err(|err| Error::CsrParse(format!("common name: {}", err)))?;
      info!("CN: {}", cn);
      domains.insert(cn.to_string());
    }

    if let Some(extensions) = req.requested_extensions() {
      for extension in extensions {
        if let ParsedExtension::SubjectAlternativeName(san) = extension {
          for name in &san.general_names {
            if let GeneralName::DNSName(dns) = name {
              domains.insert(dns.to_string());
            }
          }
        }
      }
    }

    if domains.is_empty() {
      return Err(Error::CsrParse(
        "no common name or DNS subject alternative name".to_string(),
      ));
    }
    Ok(domains)
  }
}

fn csr_err<E: std::fmt::Display>(err: E) -> Error {
  Error::CsrParse(err.to_string())
}
