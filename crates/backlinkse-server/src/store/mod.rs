pub mod db;
pub mod document;
pub mod users;

pub use db::{Store, Txn};
pub use document::{is_valid_id, new_id, Document, Exclusive, StoreError};
pub use users::normalize_email;
