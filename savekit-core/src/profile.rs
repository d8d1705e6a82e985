//! The save-profile envelope and the payload capability

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
#[cfg(feature = "async")]
use std::future::Future;

use crate::error::Result;
use crate::manager::{SaveManager, SaveOptions};

/// A named, typed payload. The name doubles as the file name on disk.
///
/// The name is fixed at construction. Loading a profile rebuilds an equal
/// value from its serialized form, never the original instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SaveProfile<T> {
    name: String,
    data: T,
}

impl<T> SaveProfile<T> {
    pub fn new(name: impl Into<String>, data: T) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &T {
        &self.data
    }

    pub fn into_data(self) -> T {
        self.data
    }
}

/// Marker for payloads that can live inside a [`SaveProfile`].
///
/// Nothing is required beyond serde support. Applications opt in with an empty
/// `impl SaveableData for MyData {}` and get the `save_as` helpers, which only
/// wrap `self` in a profile and hand it to the manager.
pub trait SaveableData: Serialize + DeserializeOwned + Send + 'static {
    fn save_as(&self, manager: &SaveManager, name: &str, options: SaveOptions) -> Result<()>
    where
        Self: Sized,
    {
        manager.save_data(name, self, options)
    }

    /// Non-blocking `save_as`; hands the payload back inside its profile
    #[cfg(feature = "async")]
    fn save_as_async(
        self,
        manager: &SaveManager,
        name: impl Into<String>,
        options: SaveOptions,
    ) -> impl Future<Output = Result<SaveProfile<Self>>> + Send
    where
        Self: Sized,
    {
        manager.save_async(SaveProfile::new(name, self), options)
    }
}

/// Untyped JSON payloads, used by the CLI
impl SaveableData for serde_json::Value {}
