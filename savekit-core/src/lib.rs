//! core functionality for persisting encrypted
//! save profiles to local disk
//!
//! # Modules
//!
//! - `cipher`: AES-CBC encryption with base64 transport text
//! - `key`: key providers for the cipher
//! - `profile`: the `SaveProfile` envelope and `SaveableData` payload capability
//! - `shared`: cycle-tolerant shared references for payload graphs
//! - `manager`: save/load/delete orchestration over one save directory
//! - `asynchronous`: non-blocking forms of the manager operations (feature `async`)
//! - `progress`: milestone progress reporting
//! - `locator`: platform save-directory resolution

pub mod asynchronous;
pub mod cipher;
pub mod error;
pub mod key;
pub mod locator;
mod locks;
pub mod manager;
pub mod profile;
pub mod progress;
pub mod shared;

// Re-export commonly used items
pub use error::{CryptoError, Error, Result};
pub use key::{DEFAULT_KEY, KeyProvider, StaticKey};
pub use locator::SaveLocator;
pub use manager::{LoadOptions, ProfileInfo, SaveManager, SaveOptions};
pub use profile::{SaveProfile, SaveableData};
pub use progress::{NoProgress, Progress};
pub use shared::Shared;
