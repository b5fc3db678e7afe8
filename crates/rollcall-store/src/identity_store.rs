//! Durable collection of enrolled identities.

use rollcall_core::Identity;

use crate::error::{Result, StoreError};
use crate::kv::KeyValueStore;

/// KV key holding the serialized identity list.
pub const IDENTITIES_KEY: &str = "rollcall/identities";

/// Enrolled identities, persisted as one JSON document in the backing
/// key-value store. Snapshots preserve enrollment (append) order, which is
/// also the uniqueness guard's scan order.
pub struct IdentityStore<S> {
    kv: S,
}

impl<S: KeyValueStore> IdentityStore<S> {
    pub fn new(kv: S) -> Self {
        Self { kv }
    }

    fn load(&self) -> Result<Vec<Identity>> {
        match self.kv.get(IDENTITIES_KEY)? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(Vec::new()),
        }
    }

    fn save(&mut self, identities: &[Identity]) -> Result<()> {
        let bytes = serde_json::to_vec(identities)?;
        self.kv.set(IDENTITIES_KEY, &bytes)
    }

    /// Snapshot of every enrolled identity, in enrollment order.
    pub fn list(&self) -> Result<Vec<Identity>> {
        self.load()
    }

    /// Exact, case-sensitive lookup on the stored canonical name.
    pub fn find_by_name(&self, name: &str) -> Result<Option<Identity>> {
        Ok(self.load()?.into_iter().find(|i| i.name == name))
    }

    /// Append a new identity. Name collisions are checked
    /// case-insensitively.
    pub fn add(&mut self, identity: Identity) -> Result<()> {
        let mut identities = self.load()?;
        let lowered = identity.name.to_lowercase();
        if identities.iter().any(|i| i.name.to_lowercase() == lowered) {
            return Err(StoreError::DuplicateName(identity.name));
        }
        tracing::info!(
            name = %identity.name,
            samples = identity.embeddings.len(),
            "identity enrolled"
        );
        identities.push(identity);
        self.save(&identities)
    }

    /// Apply `mutate` to the named identity and persist. Used to refresh
    /// the derived attendance fields after a ledger mutation.
    pub fn update<F>(&mut self, name: &str, mutate: F) -> Result<Identity>
    where
        F: FnOnce(&mut Identity),
    {
        let mut identities = self.load()?;
        let Some(identity) = identities.iter_mut().find(|i| i.name == name) else {
            return Err(StoreError::NotFound(name.to_string()));
        };
        mutate(identity);
        let updated = identity.clone();
        self.save(&identities)?;
        Ok(updated)
    }

    /// Remove every identity.
    pub fn clear(&mut self) -> Result<()> {
        tracing::info!("identity store cleared");
        self.kv.remove(IDENTITIES_KEY)
    }
}
