//! Document structure: cross-reference loading, encryption and the object
//! store.
//!
//! - `xref`: follows `startxref` and `/Prev`, rebuilds broken indexes
//! - `security`: standard security handler, revisions 2 to 6
//! - `saslprep`: RFC 4013 password normalization for revision 6
//! - `store`: `DocumentStore`, which resolves and decrypts objects

pub mod saslprep;
pub mod security;
pub mod store;
pub mod xref;

pub use security::{CryptMethod, EncryptionEngine, PasswordType};
pub use store::DocumentStore;
pub use xref::{CrossReferenceTable, ObjectLocation, XRefLoader};
