#![cfg(feature = "async")]

//! Non-blocking forms of the [`SaveManager`] operations.
//!
//! Each call moves a clone of the manager onto tokio's blocking pool and runs
//! the blocking operation there, so both forms share one implementation.
//! Errors arrive through the returned future; a panicking task surfaces as
//! [`Error::Task`]. There is no cancellation: dropping the future detaches the
//! work, which still runs to completion.
//!
//! [`Error::Task`]: crate::Error::Task

use tokio::task;

use crate::error::Result;
use crate::manager::{LoadOptions, ProfileInfo, SaveManager, SaveOptions};
use crate::profile::{SaveProfile, SaveableData};

impl SaveManager {
    /// Saves a profile and hands it back once it is on disk
    pub async fn save_async<T: SaveableData>(
        &self,
        profile: SaveProfile<T>,
        options: SaveOptions,
    ) -> Result<SaveProfile<T>> {
        let manager = self.clone();
        task::spawn_blocking(move || manager.save(&profile, options).map(|()| profile)).await?
    }

    pub async fn load_async<T: SaveableData>(
        &self,
        name: impl Into<String>,
        options: LoadOptions,
    ) -> Result<SaveProfile<T>> {
        let manager = self.clone();
        let name = name.into();
        task::spawn_blocking(move || manager.load(&name, options)).await?
    }

    pub async fn delete_async(&self, name: impl Into<String>) -> Result<()> {
        let manager = self.clone();
        let name = name.into();
        task::spawn_blocking(move || manager.delete(&name)).await?
    }

    pub async fn exists_async(&self, name: impl Into<String>) -> Result<bool> {
        let manager = self.clone();
        let name = name.into();
        task::spawn_blocking(move || manager.exists(&name)).await?
    }

    pub async fn list_async(&self) -> Result<Vec<ProfileInfo>> {
        let manager = self.clone();
        task::spawn_blocking(move || manager.list()).await?
    }
}
