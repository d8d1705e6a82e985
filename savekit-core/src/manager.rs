//! Save/load orchestration
//!
//! A save runs: name check -> existence check -> serialize -> (encrypt) ->
//! create directory -> write temp file -> rename into place. A load runs the
//! inverse. Every operation holds the per-name lock for its whole duration, so
//! two operations on one profile through the same manager never interleave.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::cipher;
use crate::error::{Error, Result};
use crate::key::{KeyProvider, StaticKey};
use crate::locator::SaveLocator;
use crate::locks::NameLocks;
use crate::profile::{SaveProfile, SaveableData};
use crate::progress::{NoProgress, Progress, ProgressScope};

/// Milestones reported by a save
pub const SAVE_STEPS: u32 = 6;
/// Milestones reported by a load
pub const LOAD_STEPS: u32 = 3;
/// Milestones reported by a delete
pub const DELETE_STEPS: u32 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SaveOptions {
    /// Replace an existing file of the same name. The old data is lost.
    pub overwrite: bool,
    /// Encrypt the serialized profile before writing
    pub encrypt: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            overwrite: false,
            encrypt: true,
        }
    }
}

impl SaveOptions {
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn encrypt(mut self, encrypt: bool) -> Self {
        self.encrypt = encrypt;
        self
    }
}

/// The file carries no marker of whether it is encrypted, so this must match
/// the `encrypt` flag it was saved with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadOptions {
    pub encrypt: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self { encrypt: true }
    }
}

impl LoadOptions {
    pub fn encrypt(mut self, encrypt: bool) -> Self {
        self.encrypt = encrypt;
        self
    }
}

/// A profile file found in the save directory
#[derive(Clone, Debug)]
pub struct ProfileInfo {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    pub modified: DateTime<Local>,
}

/// Serializes exactly like `SaveProfile<T>` without owning the payload
#[derive(Serialize)]
struct ProfileRef<'a, T> {
    name: &'a str,
    data: &'a T,
}

/// Persists [`SaveProfile`]s as files in one save directory.
///
/// Cloning is cheap and clones share the key provider, the progress sink and
/// the per-name locks.
#[derive(Clone)]
pub struct SaveManager {
    dir: PathBuf,
    keys: Arc<dyn KeyProvider>,
    progress: Arc<dyn Progress>,
    locks: Arc<NameLocks>,
}

impl fmt::Debug for SaveManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SaveManager")
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

impl SaveManager {
    /// Manager over `dir` using the default static key and no progress output
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            keys: Arc::new(StaticKey::default()),
            progress: Arc::new(NoProgress),
            locks: Arc::new(NameLocks::default()),
        }
    }

    /// Manager over the platform save directory of an application
    pub fn for_application(company: &str, product: &str) -> Option<Self> {
        SaveLocator::new(company, product)
            .save_directory()
            .map(Self::new)
    }

    pub fn with_key_provider(mut self, keys: impl KeyProvider + 'static) -> Self {
        self.keys = Arc::new(keys);
        self
    }

    pub fn with_progress(mut self, progress: impl Progress + 'static) -> Self {
        self.progress = Arc::new(progress);
        self
    }

    pub fn save_directory(&self) -> &Path {
        &self.dir
    }

    /// Path a profile of this name is stored at
    pub fn profile_path(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.dir.join(name))
    }

    /// Saves a profile under its own name
    pub fn save<T: SaveableData>(&self, profile: &SaveProfile<T>, options: SaveOptions) -> Result<()> {
        self.save_data(profile.name(), profile.data(), options)
    }

    pub(crate) fn save_data<T: Serialize>(
        &self,
        name: &str,
        data: &T,
        options: SaveOptions,
    ) -> Result<()> {
        let result = self.write_profile(name, data, options);
        match &result {
            Ok(()) => info!(profile = name, dir = %self.dir.display(), "saved profile"),
            Err(e) => warn!(profile = name, error = %e, "failed to save profile"),
        }
        result
    }

    fn write_profile<T: Serialize>(&self, name: &str, data: &T, options: SaveOptions) -> Result<()> {
        let path = self.profile_path(name)?;
        let progress = ProgressScope::start(self.progress.as_ref(), SAVE_STEPS);
        let _lock = self.locks.acquire(name);
        progress.step(1);

        // Advisory only; the no-clobber rename below is what guarantees it
        if !options.overwrite && path.exists() {
            return Err(Error::AlreadyExists {
                name: name.to_owned(),
            });
        }
        progress.step(2);

        let mut text = serde_json::to_string_pretty(&ProfileRef { name, data })
            .map_err(Error::Serialization)?;
        debug!(profile = name, len = text.len(), "serialized profile");
        progress.step(3);

        if options.encrypt {
            text = cipher::encrypt(&self.keys.key(), &text)?;
            debug!(profile = name, len = text.len(), "encrypted profile");
        }
        progress.step(4);

        fs::create_dir_all(&self.dir).map_err(|e| Error::io(&self.dir, e))?;
        progress.step(5);

        self.write_atomic(name, &path, text.as_bytes(), options.overwrite)?;
        progress.step(6);

        Ok(())
    }

    /// Writes into a temp file next to the target and renames it into place,
    /// so readers see either the old file or the new one, never a torn write
    fn write_atomic(&self, name: &str, path: &Path, bytes: &[u8], overwrite: bool) -> Result<()> {
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(|e| Error::io(&self.dir, e))?;
        tmp.write_all(bytes).map_err(|e| Error::io(tmp.path(), e))?;
        tmp.as_file().sync_all().map_err(|e| Error::io(tmp.path(), e))?;

        let persisted = if overwrite {
            tmp.persist(path)
        } else {
            tmp.persist_noclobber(path)
        };

        // On failure the temp file is dropped and removed with the error
        persisted.map_err(|e| match e.error.kind() {
            io::ErrorKind::AlreadyExists => Error::AlreadyExists {
                name: name.to_owned(),
            },
            _ => Error::io(path, e.error),
        })?;

        Ok(())
    }

    /// Loads the profile stored under `name`
    pub fn load<T: SaveableData>(&self, name: &str, options: LoadOptions) -> Result<SaveProfile<T>> {
        let result = self.read_profile(name, options);
        match &result {
            Ok(_) => info!(profile = name, "loaded profile"),
            Err(e) => warn!(profile = name, error = %e, "failed to load profile"),
        }
        result
    }

    fn read_profile<T: SaveableData>(&self, name: &str, options: LoadOptions) -> Result<SaveProfile<T>> {
        let path = self.profile_path(name)?;
        let progress = ProgressScope::start(self.progress.as_ref(), LOAD_STEPS);
        let _lock = self.locks.acquire(name);

        if !path.exists() {
            return Err(Error::NotFound {
                name: name.to_owned(),
            });
        }
        progress.step(1);

        let mut text = fs::read_to_string(&path).map_err(|e| not_found_or_io(name, &path, e))?;
        progress.step(2);

        if options.encrypt {
            text = cipher::decrypt(&self.keys.key(), &text)?;
        }
        progress.step(3);

        let profile: SaveProfile<T> =
            serde_json::from_str(&text).map_err(Error::Deserialization)?;

        if profile.name() != name {
            warn!(
                profile = name,
                stored = profile.name(),
                "stored profile name differs from file name"
            );
        }

        Ok(profile)
    }

    /// Removes the file stored under `name`
    pub fn delete(&self, name: &str) -> Result<()> {
        let result = self.remove_profile(name);
        match &result {
            Ok(()) => info!(profile = name, "deleted profile"),
            Err(e) => warn!(profile = name, error = %e, "failed to delete profile"),
        }
        result
    }

    fn remove_profile(&self, name: &str) -> Result<()> {
        let path = self.profile_path(name)?;
        let progress = ProgressScope::start(self.progress.as_ref(), DELETE_STEPS);
        let _lock = self.locks.acquire(name);

        if !path.exists() {
            return Err(Error::NotFound {
                name: name.to_owned(),
            });
        }
        progress.step(1);

        fs::remove_file(&path).map_err(|e| not_found_or_io(name, &path, e))?;
        progress.step(2);

        Ok(())
    }

    /// Checks whether a profile file of this name exists
    pub fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.profile_path(name)?.is_file())
    }

    /// Lists stored profiles sorted by modification time (newest first)
    pub fn list(&self) -> Result<Vec<ProfileInfo>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut profiles = Vec::new();

        for entry in fs::read_dir(&self.dir).map_err(|e| Error::io(&self.dir, e))? {
            let entry = entry.map_err(|e| Error::io(&self.dir, e))?;
            let path = entry.path();

            // Only regular files with usable names; dotfiles are in-flight temps
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if !path.is_file() || validate_name(&name).is_err() {
                continue;
            }

            let metadata = entry.metadata().map_err(|e| Error::io(&path, e))?;
            let modified = metadata.modified().map_err(|e| Error::io(&path, e))?;

            profiles.push(ProfileInfo {
                name,
                path,
                size: metadata.len(),
                modified: modified.into(),
            });
        }

        // Sort by timestamp, newest first
        profiles.sort_by(|a, b| b.modified.cmp(&a.modified));

        Ok(profiles)
    }
}

/// Rejects names that would escape the save directory or clash with temp files
fn validate_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        "name is empty"
    } else if name.starts_with('.') {
        "name must not start with '.'"
    } else if name.contains(['/', '\\']) {
        "name must not contain path separators"
    } else if name.contains('\0') {
        "name must not contain NUL"
    } else {
        return Ok(());
    };

    Err(Error::InvalidName {
        name: name.to_owned(),
        reason,
    })
}

// The file can vanish between the existence check and the syscall when
// another process touches the directory
fn not_found_or_io(name: &str, path: &Path, e: io::Error) -> Error {
    if e.kind() == io::ErrorKind::NotFound {
        Error::NotFound {
            name: name.to_owned(),
        }
    } else {
        Error::io(path, e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::tests::Recorder;
    use crate::shared::Shared;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct PlayerData {
        position: (f32, f32, f32),
        current_level: u32,
        health: f32,
        xp: f32,
    }

    impl SaveableData for PlayerData {}

    fn player() -> PlayerData {
        PlayerData {
            position: (1.0, 2.0, 3.0),
            current_level: 4,
            health: 87.5,
            xp: 1200.0,
        }
    }

    fn manager() -> (TempDir, SaveManager) {
        let temp_dir = TempDir::new().unwrap();
        let manager = SaveManager::new(temp_dir.path().join("gameData"));
        (temp_dir, manager)
    }

    #[test]
    fn test_roundtrip_encrypted_and_plain() {
        let (_tmp, manager) = manager();

        for (name, encrypt) in [("enc", true), ("plain", false)] {
            let profile = SaveProfile::new(name, player());
            manager
                .save(&profile, SaveOptions::default().encrypt(encrypt))
                .unwrap();

            let loaded: SaveProfile<PlayerData> = manager
                .load(name, LoadOptions::default().encrypt(encrypt))
                .unwrap();
            assert_eq!(loaded, profile);
        }
    }

    #[test]
    fn test_plain_file_is_readable_json() {
        let (_tmp, manager) = manager();
        let profile = SaveProfile::new("slot1", player());
        manager
            .save(&profile, SaveOptions::default().encrypt(false))
            .unwrap();

        let text = fs::read_to_string(manager.save_directory().join("slot1")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["name"], "slot1");
        assert_eq!(value["data"]["current_level"], 4);
    }

    #[test]
    fn test_encrypted_file_is_base64_ciphertext() {
        let (_tmp, manager) = manager();
        let profile = SaveProfile::new("slot1", player());
        manager.save(&profile, SaveOptions::default()).unwrap();

        let text = fs::read_to_string(manager.save_directory().join("slot1")).unwrap();
        assert!(!text.contains("current_level"));
        let plain = cipher::decrypt(crate::key::DEFAULT_KEY.as_bytes(), &text).unwrap();
        assert!(plain.contains("current_level"));
    }

    #[test]
    fn test_idempotent_load() {
        let (_tmp, manager) = manager();
        manager
            .save(&SaveProfile::new("slot1", player()), SaveOptions::default())
            .unwrap();

        let a: SaveProfile<PlayerData> = manager.load("slot1", LoadOptions::default()).unwrap();
        let b: SaveProfile<PlayerData> = manager.load("slot1", LoadOptions::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_overwrite_gate() {
        let (_tmp, manager) = manager();
        let first = SaveProfile::new("slot1", player());
        manager.save(&first, SaveOptions::default()).unwrap();

        let mut changed = player();
        changed.health = 1.0;
        let second = SaveProfile::new("slot1", changed);

        let err = manager.save(&second, SaveOptions::default()).unwrap_err();
        assert!(matches!(err, Error::AlreadyExists { ref name } if name == "slot1"));
        let still: SaveProfile<PlayerData> = manager.load("slot1", LoadOptions::default()).unwrap();
        assert_eq!(still, first);

        manager
            .save(&second, SaveOptions::default().overwrite(true))
            .unwrap();
        let now: SaveProfile<PlayerData> = manager.load("slot1", LoadOptions::default()).unwrap();
        assert_eq!(now.data().health, 1.0);
    }

    #[test]
    fn test_missing_profile_errors() {
        let (_tmp, manager) = manager();
        assert!(matches!(
            manager.load::<PlayerData>("nope", LoadOptions::default()),
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(manager.delete("nope"), Err(Error::NotFound { .. })));
    }

    #[test]
    fn test_delete_removes_file() {
        let (_tmp, manager) = manager();
        manager
            .save(&SaveProfile::new("slot1", player()), SaveOptions::default())
            .unwrap();
        assert!(manager.exists("slot1").unwrap());

        manager.delete("slot1").unwrap();
        assert!(!manager.exists("slot1").unwrap());
        assert!(matches!(manager.delete("slot1"), Err(Error::NotFound { .. })));
    }

    #[test]
    fn test_wrong_encrypt_flag_on_load() {
        let (_tmp, manager) = manager();
        manager
            .save(
                &SaveProfile::new("slot1", player()),
                SaveOptions::default().encrypt(false),
            )
            .unwrap();

        // Pretty JSON is not base64
        assert!(matches!(
            manager.load::<PlayerData>("slot1", LoadOptions::default()),
            Err(Error::CryptoFormat(_))
        ));

        manager
            .save(
                &SaveProfile::new("slot2", player()),
                SaveOptions::default(),
            )
            .unwrap();
        assert!(matches!(
            manager.load::<PlayerData>("slot2", LoadOptions::default().encrypt(false)),
            Err(Error::Deserialization(_))
        ));
    }

    #[test]
    fn test_type_mismatch_is_deserialization_error() {
        let (_tmp, manager) = manager();
        let profile = SaveProfile::new("slot1", serde_json::json!({ "unrelated": true }));
        manager.save(&profile, SaveOptions::default()).unwrap();

        assert!(matches!(
            manager.load::<PlayerData>("slot1", LoadOptions::default()),
            Err(Error::Deserialization(_))
        ));
    }

    #[test]
    fn test_different_key_cannot_load() {
        let (tmp, manager) = manager();
        manager
            .save(&SaveProfile::new("slot1", player()), SaveOptions::default())
            .unwrap();

        let other = SaveManager::new(tmp.path().join("gameData"))
            .with_key_provider(StaticKey::new(*b"0123456789abcdef"));
        assert!(matches!(
            other.load::<PlayerData>("slot1", LoadOptions::default()),
            Err(Error::CryptoFormat(_))
        ));
    }

    #[test]
    fn test_invalid_names_rejected_before_io() {
        let (_tmp, manager) = manager();
        for name in ["", ".", "..", ".hidden", "a/b", "a\\b", "nul\0"] {
            let err = manager
                .save(&SaveProfile::new(name, player()), SaveOptions::default())
                .unwrap_err();
            assert!(matches!(err, Error::InvalidName { .. }), "{:?}", name);
        }
        // Nothing was created
        assert!(!manager.save_directory().exists());
    }

    #[test]
    fn test_progress_milestones() {
        let temp_dir = TempDir::new().unwrap();
        let recorder = Arc::new(Recorder::default());
        let manager = SaveManager::new(temp_dir.path()).with_progress(Arc::clone(&recorder));

        manager
            .save(&SaveProfile::new("slot1", player()), SaveOptions::default())
            .unwrap();
        assert_eq!(
            *recorder.events.lock(),
            vec![
                "show 0/6", "report 1", "report 2", "report 3", "report 4", "report 5",
                "report 6", "hide"
            ]
        );

        recorder.events.lock().clear();
        let _ = manager.load::<PlayerData>("missing", LoadOptions::default());
        assert_eq!(*recorder.events.lock(), vec!["show 0/3", "hide"]);
    }

    #[test]
    fn test_list_profiles() {
        let (_tmp, manager) = manager();
        assert!(manager.list().unwrap().is_empty());

        manager
            .save(&SaveProfile::new("a", player()), SaveOptions::default())
            .unwrap();
        manager
            .save(&SaveProfile::new("b", player()), SaveOptions::default())
            .unwrap();
        fs::write(manager.save_directory().join(".tmp123"), b"junk").unwrap();

        let mut names: Vec<_> = manager.list().unwrap().into_iter().map(|p| p.name).collect();
        names.sort();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let (_tmp, manager) = manager();
        let profile = SaveProfile::new("slot1", player());
        manager.save(&profile, SaveOptions::default()).unwrap();
        let _ = manager.save(&profile, SaveOptions::default());

        let entries = fs::read_dir(manager.save_directory()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_unguarded_in_place_writer_exposes_partial_file() {
        // A writer that truncates and rewrites the file in place, the way a
        // save without temp file and rename would, leaves a window where
        // readers see half a document.
        use std::io::Write;
        use std::sync::Barrier;

        let (_tmp, manager) = manager();
        let profile = SaveProfile::new("slot1", player());
        manager
            .save(&profile, SaveOptions::default().encrypt(false))
            .unwrap();

        let path = manager.profile_path("slot1").unwrap();
        let full = fs::read(&path).unwrap();
        let (head, tail) = full.split_at(full.len() / 2);
        let half_written = Barrier::new(2);
        let checked = Barrier::new(2);

        std::thread::scope(|s| {
            s.spawn(|| {
                let mut file = fs::File::create(&path).unwrap();
                file.write_all(head).unwrap();
                half_written.wait();
                checked.wait();
                file.write_all(tail).unwrap();
            });

            half_written.wait();
            let torn = manager.load::<PlayerData>("slot1", LoadOptions::default().encrypt(false));
            assert!(matches!(torn, Err(Error::Deserialization(_))));
            checked.wait();
        });

        let loaded: SaveProfile<PlayerData> = manager
            .load("slot1", LoadOptions::default().encrypt(false))
            .unwrap();
        assert_eq!(loaded, profile);
    }

    #[test]
    fn test_cyclic_payload_saves_and_loads() {
        #[derive(Clone, Serialize, Deserialize)]
        struct Room {
            title: String,
            exit: Option<Shared<Room>>,
        }

        #[derive(Serialize, Deserialize)]
        struct World {
            start: Shared<Room>,
        }

        impl SaveableData for World {}

        let hall = Shared::new(Room {
            title: "hall".into(),
            exit: None,
        });
        let cellar = Shared::new(Room {
            title: "cellar".into(),
            exit: Some(hall.clone()),
        });
        hall.lock().exit = Some(cellar.clone());

        let (_tmp, manager) = manager();
        let world = World { start: hall.clone() };
        world
            .save_as(&manager, "world", SaveOptions::default())
            .unwrap();

        let loaded: SaveProfile<World> = manager.load("world", LoadOptions::default()).unwrap();
        let start = loaded.data().start.lock();
        assert_eq!(start.title, "hall");
        let exit = start.exit.as_ref().unwrap().lock();
        assert_eq!(exit.title, "cellar");
        assert!(exit.exit.is_none());
        drop(exit);
        drop(start);

        hall.lock().exit = None;
    }

    #[test]
    fn test_for_application_uses_locator_path() {
        if let Some(manager) = SaveManager::for_application("Acme", "Platformer") {
            assert!(manager.save_directory().ends_with("gameData"));
        }
    }
}
