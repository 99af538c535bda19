use data_encoding::BASE64URL_NOPAD;
use letsacme::*;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderValue;
use serde_json::json;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::rc::Rc;

pub const CA_URL: &str = "https://ca.test";
pub const DIRECTORY_URL: &str = "https://ca.test/directory";
pub const NEW_REG_URL: &str = "https://ca.test/acme/new-reg";
pub const NEW_AUTHZ_URL: &str = "https://ca.test/acme/new-authz";
pub const NEW_CERT_URL: &str = "https://ca.test/acme/new-cert";
pub const REVOKE_CERT_URL: &str = "https://ca.test/acme/revoke-cert";
pub const TERMS_URL: &str = "https://ca.test/terms";
pub const ISSUER_CERT_URL: &str = "https://ca.test/acme/issuer-cert";

/// A request the client sent, with the JWS of POSTs unpacked.
#[derive(Debug, Clone)]
pub struct Request {
  pub method: &'static str,
  pub url: String,
  pub protected: Option<Value>,
  pub payload: Option<Value>,
}

impl Request {
  pub fn nonce(&self) -> Option<&str> {
    self.protected.as_ref()?.get("nonce")?.as_str()
  }
}

enum Reply {
  Canned(HttpResponse),
  /// Serve the current content of a file, as a web server would.
  File(PathBuf),
}

#[derive(Default)]
struct State {
  nonces: u32,
  issued_nonces: Vec<String>,
  routes: HashMap<(&'static str, String), VecDeque<Reply>>,
  requests: Vec<Request>,
}

/// An in-process ACME v1 CA. Every GET of the directory hands out a new
/// nonce. Other URLs answer from scripted reply queues; the last reply
/// of a queue is repeated, unscripted URLs answer 404.
#[derive(Clone, Default)]
pub struct FakeCa {
  state: Rc<RefCell<State>>,
}

pub fn response(status: u16, body: impl Into<Vec<u8>>) -> HttpResponse {
  HttpResponse {
    status,
    headers: HeaderMap::new(),
    body: body.into(),
    url: String::new(),
  }
}

pub fn json_response(status: u16, body: Value) -> HttpResponse {
  response(status, body.to_string())
}

impl FakeCa {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn on(&self, method: &'static str, url: &str, resp: HttpResponse) {
    self.push(method, url, Reply::Canned(resp));
  }

  pub fn on_get(&self, url: &str, resp: HttpResponse) {
    self.on("GET", url, resp);
  }

  pub fn on_post(&self, url: &str, resp: HttpResponse) {
    self.on("POST", url, resp);
  }

  /// Answer GETs of `url` with the content of `path`, or 404 while it
  /// doesn't exist.
  pub fn serve_file(&self, url: &str, path: impl Into<PathBuf>) {
    self.push("GET", url, Reply::File(path.into()));
  }

  fn push(&self, method: &'static str, url: &str, reply: Reply) {
    self
      .state
      .borrow_mut()
      .routes
      .entry((method, url.to_string()))
      .or_default()
      .push_back(reply);
  }

  pub fn requests(&self) -> Vec<Request> {
    self.state.borrow().requests.clone()
  }

  pub fn requests_to(&self, method: &str, url: &str) -> Vec<Request> {
    self
      .requests()
      .into_iter()
      .filter(|req| req.method == method && req.url == url)
      .collect()
  }

  pub fn issued_nonces(&self) -> Vec<String> {
    self.state.borrow().issued_nonces.clone()
  }

  pub fn directory(&self) -> Directory {
    let mut dir: Directory = serde_json::from_value(directory_json()).unwrap();
    dir.url = DIRECTORY_URL.to_string();
    dir
  }

  fn directory_response(&self) -> HttpResponse {
    let mut state = self.state.borrow_mut();
    state.nonces += 1;
    let nonce = format!("nonce-{}", state.nonces);
    state.issued_nonces.push(nonce.clone());

    let mut resp = json_response(200, directory_json());
    resp
      .headers
      .insert("replay-nonce", HeaderValue::from_str(&nonce).unwrap());
    resp.url = DIRECTORY_URL.to_string();
    resp
  }

  fn reply(&self, method: &'static str, url: &str) -> HttpResponse {
    let mut state = self.state.borrow_mut();
    let queue = match state.routes.get_mut(&(method, url.to_string())) {
      Some(queue) => queue,
      None => return response(404, "not found"),
    };
    let popped = if queue.len() > 1 {
      queue.pop_front()
    } else {
      None
    };
    let reply = match &popped {
      Some(reply) => reply,
      None => match queue.front() {
        Some(reply) => reply,
        None => return response(404, "not found"),
      },
    };

    let mut resp = match reply {
      Reply::Canned(resp) => resp.clone(),
      Reply::File(path) => match std::fs::read(path) {
        Ok(content) => response(200, content),
        Err(_) => response(404, "not found"),
      },
    };
    if resp.url.is_empty() {
      resp.url = url.to_string();
    }
    resp
  }
}

fn directory_json() -> Value {
  json!({
    "new-reg": NEW_REG_URL,
    "new-authz": NEW_AUTHZ_URL,
    "new-cert": NEW_CERT_URL,
    "revoke-cert": REVOKE_CERT_URL,
    "meta": { "terms-of-service": TERMS_URL }
  })
}

/// Fails GETs of one URL before they reach the CA, the way a reset
/// connection would. Everything else goes to the wrapped [`FakeCa`].
pub struct FailingGet {
  pub ca: FakeCa,
  pub url: String,
}

impl HttpClient for FailingGet {
  fn get(&self, url: &str) -> Result<HttpResponse, Error> {
    if url == self.url {
      return Err(transport_err("connection reset"));
    }
    self.ca.get(url)
  }

  fn post(&self, url: &str, body: String) -> Result<HttpResponse, Error> {
    self.ca.post(url, body)
  }
}

fn decode_part(body: &Value, name: &str) -> Option<Value> {
  let part = body.get(name)?.as_str()?;
  let raw = BASE64URL_NOPAD.decode(part.as_bytes()).ok()?;
  serde_json::from_slice(&raw).ok()
}

impl HttpClient for FakeCa {
  fn get(&self, url: &str) -> Result<HttpResponse, Error> {
    self.state.borrow_mut().requests.push(Request {
      method: "GET",
      url: url.to_string(),
      protected: None,
      payload: None,
    });
    if url == DIRECTORY_URL {
      return Ok(self.directory_response());
    }
    Ok(self.reply("GET", url))
  }

  fn post(&self, url: &str, body: String) -> Result<HttpResponse, Error> {
    let body: Value = serde_json::from_str(&body)?;
    self.state.borrow_mut().requests.push(Request {
      method: "POST",
      url: url.to_string(),
      protected: decode_part(&body, "protected"),
      payload: decode_part(&body, "payload"),
    });
    Ok(self.reply("POST", url))
  }
}
