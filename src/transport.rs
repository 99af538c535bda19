use crate::directory::Directory;
use crate::error::*;
use crate::jws::sign;
use crate::jws::JwsHeader;
use crate::key::AccountKey;
use reqwest::header::HeaderMap;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use tracing::field;
use tracing::instrument;
use tracing::Level;
use tracing::Span;

/// A response from the CA (or any other HTTP endpoint). Non-2xx
/// responses are returned as well, so callers can branch on the status.
#[derive(Debug, Clone)]
pub struct HttpResponse {
  pub status: u16,
  pub headers: HeaderMap,
  pub body: Vec<u8>,
  /// The final URL of the response, after redirects.
  pub url: String,
}

impl HttpResponse {
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }

  pub fn header(&self, name: &str) -> Result<Option<&str>, Error> {
    match self.headers.get(name) {
      Some(value) => Ok(Some(map_transport_err(value.to_str())?)),
      None => Ok(None),
    }
  }

  pub fn text(&self) -> String {
    String::from_utf8_lossy(&self.body).into_owned()
  }
}

/// Blocking HTTP access. Connection level failures are errors, any
/// response the server sends back is an [`HttpResponse`].
pub trait HttpClient {
  fn get(&self, url: &str) -> Result<HttpResponse, Error>;
  fn post(&self, url: &str, body: String) -> Result<HttpResponse, Error>;
}

pub struct ReqwestClient {
  inner: reqwest::blocking::Client,
}

impl ReqwestClient {
  pub fn new() -> Result<Self, Error> {
    let inner = reqwest::blocking::Client::builder()
      .user_agent(concat!("letsacme/", env!("CARGO_PKG_VERSION")))
      .timeout(Duration::from_secs(30))
      .build()?;
    Ok(ReqwestClient { inner })
  }

  fn read(resp: reqwest::blocking::Response) -> Result<HttpResponse, Error> {
    let status = resp.status().as_u16();
    let headers = resp.headers().clone();
    let url = resp.url().to_string();
    let body = resp.bytes()?.to_vec();
    Ok(HttpResponse {
      status,
      headers,
      body,
      url,
    })
  }
}

impl HttpClient for ReqwestClient {
  fn get(&self, url: &str) -> Result<HttpResponse, Error> {
    Self::read(self.inner.get(url).send()?)
  }

  fn post(&self, url: &str, body: String) -> Result<HttpResponse, Error> {
    let resp = self
      .inner
      .post(url)
      .header(reqwest::header::CONTENT_TYPE, "application/jose+json")
      .body(body)
      .send()?;
    Self::read(resp)
  }
}

/// Signs requests with the account key and sends them to the CA. A new
/// nonce is fetched for every signed request.
pub struct Transport<C> {
  http: C,
  directory: Directory,
  key: AccountKey,
  header: JwsHeader,
}

impl<C: HttpClient> Transport<C> {
  pub fn new(
    http: C,
    directory: Directory,
    key: AccountKey,
  ) -> Result<Self, Error> {
    let header = JwsHeader::new(&key)?;
    Ok(Transport {
      http,
      directory,
      key,
      header,
    })
  }

  pub fn directory(&self) -> &Directory {
    &self.directory
  }

  pub fn header(&self) -> &JwsHeader {
    &self.header
  }

  pub fn http(&self) -> &C {
    &self.http
  }

  #[instrument(level = Level::DEBUG, name = "letsacme::Transport::fresh_nonce", skip(self))]
  pub fn fresh_nonce(&self) -> Result<String, Error> {
    let resp = self.http.get(&self.directory.url)?;
    match resp.header("replay-nonce")? {
      Some(nonce) => Ok(nonce.to_string()),
      None => Err(transport_err("directory response must carry a nonce")),
    }
  }

  #[instrument(level = Level::DEBUG, name = "letsacme::Transport::post", skip(self, payload), fields(url = %url, status = field::Empty))]
  pub fn post<T: Serialize + ?Sized>(
    &self,
    url: &str,
    payload: &T,
  ) -> Result<HttpResponse, Error> {
    let nonce = self.fresh_nonce()?;
    let body = sign(&self.key, &self.header, &nonce, payload)?;
    let resp = self.http.post(url, serde_json::to_string(&body)?)?;
    Span::current().record("status", resp.status);
    debug!(status = resp.status, "signed request sent");
    Ok(resp)
  }

  pub fn get(&self, url: &str) -> Result<HttpResponse, Error> {
    self.http.get(url)
  }
}

/// Fail with [`Error::UnexpectedStatus`] unless the response has the
/// expected status.
pub(crate) fn expect_status(
  resp: &HttpResponse,
  expected: u16,
  operation: &'static str,
) -> Result<(), Error> {
  if resp.status == expected {
    Ok(())
  } else {
    Err(Error::UnexpectedStatus {
      operation,
      status: resp.status,
      detail: ServerError::describe(&resp.body),
    })
  }
}
