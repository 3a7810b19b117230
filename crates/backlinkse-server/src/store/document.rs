use anyhow::{Context, Result};
use rand::RngCore;
use redb::TableDefinition;
use serde::{de::DeserializeOwned, Serialize};

/// A record stored as JSON in its own redb table, keyed by id.
pub trait Document: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Table name. Must be unique across document types.
    const COLLECTION: &'static str;

    fn id(&self) -> &str;

    /// A secondary key that must be unique within the collection, as
    /// `(field name, value)`. Checked inside the write transaction.
    fn unique_key(&self) -> Option<(&'static str, String)> {
        None
    }
}

/// Documents where at most one member of a scope may be selected at a time:
/// the active singleton config, or a user's default payment method.
pub trait Exclusive: Document {
    fn is_selected(&self) -> bool;
    fn set_selected(&mut self, selected: bool);

    /// Documents only compete with others in the same scope.
    fn scope(&self) -> Option<&str> {
        None
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{field} already exists")]
    Duplicate { field: String },
    #[error("Invalid id: {0}")]
    InvalidId(String),
}

impl StoreError {
    pub fn is_duplicate(err: &anyhow::Error) -> bool {
        matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::Duplicate { .. })
        )
    }
}

pub(crate) fn table<D: Document>() -> TableDefinition<'static, &'static str, &'static [u8]> {
    TableDefinition::new(D::COLLECTION)
}

/// 12 random bytes, hex-encoded.
pub fn new_id() -> String {
    let mut bytes = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn is_valid_id(id: &str) -> bool {
    id.len() == 24 && id.bytes().all(|b| b.is_ascii_hexdigit())
}

pub(crate) fn check_id(id: &str) -> Result<()> {
    if is_valid_id(id) {
        Ok(())
    } else {
        Err(StoreError::InvalidId(id.to_owned()).into())
    }
}

pub(crate) fn encode<D: Document>(doc: &D) -> Result<Vec<u8>> {
    serde_json::to_vec(doc).with_context(|| format!("encode {} document", D::COLLECTION))
}

pub(crate) fn decode<D: Document>(bytes: &[u8]) -> Result<D> {
    serde_json::from_slice(bytes).with_context(|| format!("decode {} document", D::COLLECTION))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_24_hex_chars_and_distinct() {
        let a = new_id();
        let b = new_id();
        assert!(is_valid_id(&a));
        assert_ne!(a, b);
    }

    #[test]
    fn rejects_malformed_ids() {
        assert!(!is_valid_id("abc"));
        assert!(!is_valid_id("zzzzzzzzzzzzzzzzzzzzzzzz"));
        assert!(check_id("not-an-id").is_err());
    }
}
