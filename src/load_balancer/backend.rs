//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single upstream server and its weight
//! - Derive the normalized address used as the backend identity

use url::Url;

use crate::load_balancer::LbError;

/// A single backend server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backend {
    /// Normalized identity: `scheme://host[:port]/path` without trailing slash.
    address: String,
    /// The URL the backend was registered with.
    url: Url,
    /// Selection weight. Zero keeps the slot but is never selected.
    weight: usize,
}

impl Backend {
    /// Create a new backend. Fails if the URL has no host.
    pub fn new(url: &Url, weight: usize) -> Result<Self, LbError> {
        Ok(Self {
            address: normalize(url)?,
            url: url.clone(),
            weight,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn weight(&self) -> usize {
        self.weight
    }

    pub(crate) fn set_weight(&mut self, weight: usize) {
        self.weight = weight;
    }
}

/// Compute the identity of a backend URL.
///
/// Only scheme, host, port and path take part; credentials, query and
/// fragment are ignored, as is a trailing slash on the path.
pub fn normalize(url: &Url) -> Result<String, LbError> {
    let host = url
        .host_str()
        .filter(|host| !host.is_empty())
        .ok_or_else(|| LbError::InvalidAddress(url.to_string()))?;

    let mut address = format!("{}://{}", url.scheme(), host);
    if let Some(port) = url.port() {
        address.push_str(&format!(":{port}"));
    }
    address.push_str(url.path().trim_end_matches('/'));

    Ok(address)
}
