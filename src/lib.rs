mod account;
mod authorization;
mod certificate;
mod challenge;
mod client;
mod config;
mod csr;
mod directory;
mod error;
mod helpers;
mod jws;
mod key;
mod transport;
mod webroot;

pub use account::*;
pub use authorization::*;
pub use certificate::*;
pub use challenge::*;
pub use client::*;
pub use config::*;
pub use csr::Csr;
pub use directory::*;
pub use error::*;
pub use helpers::gen_rsa_private_key;
pub use helpers::Identifier;
pub use jws::*;
pub use key::*;
pub use transport::*;
pub use webroot::*;
