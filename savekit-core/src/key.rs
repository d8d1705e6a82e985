//! Key material for profile encryption

/// Historical save key. Its 32 UTF-8 bytes select AES-256.
pub const DEFAULT_KEY: &str = "b14ca5898a4e4133bbce2ea2315a1916";

/// Supplies the symmetric key used for every encrypt and decrypt.
///
/// A `SaveManager` asks its provider once per operation, so an implementation
/// backed by a secret store may rotate keys between calls. Keys must be 16, 24
/// or 32 bytes long.
pub trait KeyProvider: Send + Sync {
    fn key(&self) -> Vec<u8>;
}

/// A key fixed for the lifetime of the process
#[derive(Clone, Debug)]
pub struct StaticKey(Vec<u8>);

impl StaticKey {
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self(key.into())
    }
}

impl Default for StaticKey {
    fn default() -> Self {
        Self::new(DEFAULT_KEY)
    }
}

impl KeyProvider for StaticKey {
    fn key(&self) -> Vec<u8> {
        self.0.clone()
    }
}
