//! Backend pool management.
//!
//! # Responsibilities
//! - Keep backends in insertion order, unique by normalized address
//! - Insert, reweigh and remove backends
//!
//! The pool itself is not synchronized; [`crate::load_balancer::LoadBalancer`]
//! owns it behind the same lock as the scheduler.

use url::Url;

use crate::load_balancer::{
    backend::{normalize, Backend},
    LbError,
};

/// Ordered set of weighted backends.
#[derive(Debug, Default)]
pub struct Pool {
    backends: Vec<Backend>,
}

impl Pool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a backend, or update its weight if the address is already
    /// present. The slot of an existing backend does not move.
    pub fn upsert(&mut self, url: &Url, weight: usize) -> Result<(), LbError> {
        let address = normalize(url)?;

        if let Some(backend) = self.backends.iter_mut().find(|b| b.address() == address) {
            backend.set_weight(weight);
            return Ok(());
        }

        self.backends.push(Backend::new(url, weight)?);
        Ok(())
    }

    /// Remove a backend, shifting later backends one slot down.
    ///
    /// An address that cannot be normalized was never registered, so it is
    /// reported as not found.
    pub fn remove(&mut self, url: &Url) -> Result<Backend, LbError> {
        let address =
            normalize(url).map_err(|_| LbError::ServerNotFound(url.to_string()))?;
        let index = self
            .position(&address)
            .ok_or(LbError::ServerNotFound(address))?;

        Ok(self.backends.remove(index))
    }

    /// Weight of the backend at `url`, `None` if it isn't registered.
    pub fn weight_of(&self, url: &Url) -> Option<usize> {
        let address = normalize(url).ok()?;
        self.position(&address).map(|i| self.backends[i].weight())
    }

    /// Snapshot of all backend URLs in slot order.
    pub fn urls(&self) -> Vec<Url> {
        self.backends.iter().map(|b| b.url().clone()).collect()
    }

    pub fn backends(&self) -> &[Backend] {
        &self.backends
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    fn position(&self, address: &str) -> Option<usize> {
        self.backends.iter().position(|b| b.address() == address)
    }
}
