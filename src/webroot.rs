use crate::error::*;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// The path below a document root where challenge files are served
/// from, unless the CA says otherwise.
pub const WELL_KNOWN_DIR: &str = ".well-known/acme-challenge";

/// Where challenge files for a domain go: either straight into an
/// acme challenge directory, or into the well-known path below a web
/// server's document root. `AcmeDir` wins when both are set.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct WebRoot {
  #[serde(rename = "AcmeDir")]
  pub acme_dir: Option<PathBuf>,
  #[serde(rename = "DocumentRoot")]
  pub document_root: Option<PathBuf>,
}

impl WebRoot {
  pub fn acme_dir(path: impl Into<PathBuf>) -> Self {
    WebRoot {
      acme_dir: Some(path.into()),
      document_root: None,
    }
  }

  pub fn document_root(path: impl Into<PathBuf>) -> Self {
    WebRoot {
      acme_dir: None,
      document_root: Some(path.into()),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.acme_dir.is_none() && self.document_root.is_none()
  }

  fn challenge_dir(&self, well_known_dir: &str) -> Option<PathBuf> {
    if let Some(acme_dir) = &self.acme_dir {
      return Some(acme_dir.clone());
    }
    self
      .document_root
      .as_ref()
      .map(|root| root.join(well_known_dir.trim_matches(&['/', '\\'][..])))
  }
}

/// The configured challenge directories: a global fallback and
/// per-domain overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebRoots {
  pub global: WebRoot,
  pub domains: BTreeMap<String, WebRoot>,
}

impl WebRoots {
  pub fn is_empty(&self) -> bool {
    self.global.is_empty() && self.domains.values().all(WebRoot::is_empty)
  }

  /// The per-domain entry for `domain`, falling back to its www alias
  /// (`www.example.com` for `example.com` and vice versa).
  pub fn lookup(&self, domain: &str) -> Option<&WebRoot> {
    self
      .domains
      .get(domain)
      .or_else(|| self.domains.get(&www_alias(domain)))
  }

  /// The directory the challenge file for `domain` is written to.
  /// `well_known_dir` is joined to document roots.
  pub fn resolve(
    &self,
    domain: &str,
    well_known_dir: &str,
  ) -> Result<PathBuf, Error> {
    self
      .lookup(domain)
      .and_then(|root| root.challenge_dir(well_known_dir))
      .or_else(|| self.global.challenge_dir(well_known_dir))
      .ok_or_else(|| Error::NoChallengeDir(domain.to_string()))
  }
}

fn www_alias(domain: &str) -> String {
  match domain.split_once('.') {
    Some((label, rest)) if label.starts_with("www") => rest.to_string(),
    _ => format!("www.{}", domain),
  }
}
