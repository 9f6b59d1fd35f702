//! Snapshot persistence for trains and bookings.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::{
    error::PersistenceError,
    models::Booking,
    registry::{BookingRegistry, TrainRegistry},
    reservations::audit,
    train::{ClassSpec, Train},
};

/// Directory under the user's data dir used for snapshots.
pub const DEFAULT_SAVE_DIR: &str = "railway";
/// File name of the snapshot inside the save directory.
pub const SNAPSHOT_FILE: &str = "reservations.json";
const BACKUP_SUFFIX: &str = "backup";
const FORMAT_VERSION: u32 = 1;

/// Storage the booking core saves to and restores from.
pub trait Persistence {
    /// Persist both registries as one unit.
    fn save_all(
        &self,
        trains: &TrainRegistry,
        bookings: &BookingRegistry,
    ) -> Result<(), PersistenceError>;

    /// Restore both registries, or `None` if nothing has been saved.
    fn load_all(&self) -> Result<Option<(TrainRegistry, BookingRegistry)>, PersistenceError>;
}

/// Serialized representation of the snapshot file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavePayload {
    version: u32,
    saved_at: DateTime<Utc>,
    classes: Vec<ClassSpec>,
    #[serde(default)]
    trains: Vec<Train>,
    #[serde(default)]
    bookings: Vec<Booking>,
}

impl SavePayload {
    fn new(trains: &TrainRegistry, bookings: &BookingRegistry) -> Self {
        Self {
            version: FORMAT_VERSION,
            saved_at: Utc::now(),
            classes: trains.classes().to_vec(),
            trains: trains.all().cloned().collect(),
            bookings: bookings.all().cloned().collect(),
        }
    }

    /// When the snapshot was written.
    pub fn saved_at(&self) -> DateTime<Utc> {
        self.saved_at
    }

    fn into_registries(self) -> Result<(TrainRegistry, BookingRegistry), PersistenceError> {
        if self.version != FORMAT_VERSION {
            return Err(PersistenceError::Corrupt(format!(
                "unsupported snapshot version {}",
                self.version
            )));
        }
        let booking_count = self.bookings.len();
        let trains = TrainRegistry::from_parts(self.classes, self.trains);
        let bookings = BookingRegistry::from_bookings(self.bookings);
        if bookings.len() != booking_count {
            return Err(PersistenceError::Corrupt(
                "snapshot contains duplicate PNRs".to_string(),
            ));
        }
        audit(&trains, &bookings).map_err(PersistenceError::Corrupt)?;
        Ok((trains, bookings))
    }
}

/// Presence and size of the snapshot files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Snapshot path.
    pub path: PathBuf,
    /// Snapshot size in bytes, if present.
    pub size: Option<u64>,
    /// Backup size in bytes, if present.
    pub backup_size: Option<u64>,
}

/// Reads and writes the JSON snapshot inside a directory.
#[derive(Debug, Clone)]
pub struct SaveManager {
    root: PathBuf,
}

impl SaveManager {
    /// Create a new manager rooted at the provided directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Default location under the user's data directory.
    pub fn default_root() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DEFAULT_SAVE_DIR)
    }

    /// Directory holding the snapshot.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the snapshot file.
    pub fn snapshot_path(&self) -> PathBuf {
        self.root.join(SNAPSHOT_FILE)
    }

    fn backup_path(&self) -> PathBuf {
        self.root.join(format!("{SNAPSHOT_FILE}.{BACKUP_SUFFIX}"))
    }

    /// Whether a snapshot exists.
    pub fn exists(&self) -> bool {
        self.snapshot_path().is_file()
    }

    /// Read the snapshot without rebuilding registries.
    pub fn read_payload(&self) -> Result<Option<SavePayload>, PersistenceError> {
        let path = self.snapshot_path();
        if !path.exists() {
            return Ok(None);
        }
        let content =
            fs::read_to_string(&path).map_err(|err| PersistenceError::io("read", &path, err))?;
        let payload = serde_json::from_str(&content)
            .map_err(|source| PersistenceError::Format { path, source })?;
        Ok(Some(payload))
    }

    fn write_payload(&self, payload: &SavePayload) -> Result<(), PersistenceError> {
        fs::create_dir_all(&self.root)
            .map_err(|err| PersistenceError::io("create", &self.root, err))?;
        let path = self.snapshot_path();
        let serialised = serde_json::to_vec_pretty(payload).map_err(|source| {
            PersistenceError::Format {
                path: path.clone(),
                source,
            }
        })?;

        let mut staged = NamedTempFile::new_in(&self.root)
            .map_err(|err| PersistenceError::io("stage", &self.root, err))?;
        staged
            .write_all(&serialised)
            .and_then(|_| staged.as_file().sync_all())
            .map_err(|err| PersistenceError::io("write", staged.path(), err))?;
        staged
            .persist(&path)
            .map_err(|err| PersistenceError::io("replace", &path, err.error))?;
        Ok(())
    }

    /// Copy the snapshot next to itself with a `.backup` suffix.
    pub fn backup(&self) -> Result<Option<PathBuf>, PersistenceError> {
        let source = self.snapshot_path();
        if !source.exists() {
            return Ok(None);
        }
        let target = self.backup_path();
        fs::copy(&source, &target).map_err(|err| PersistenceError::io("copy", &source, err))?;
        info!(path = %target.display(), "Snapshot backed up");
        Ok(Some(target))
    }

    /// Sizes of the snapshot and its backup.
    pub fn file_info(&self) -> FileInfo {
        let size_of = |path: PathBuf| fs::metadata(path).ok().map(|meta| meta.len());
        FileInfo {
            path: self.snapshot_path(),
            size: size_of(self.snapshot_path()),
            backup_size: size_of(self.backup_path()),
        }
    }

    /// Delete the snapshot and its backup.
    pub fn clear(&self) -> Result<(), PersistenceError> {
        for path in [self.snapshot_path(), self.backup_path()] {
            if path.exists() {
                fs::remove_file(&path).map_err(|err| PersistenceError::io("delete", &path, err))?;
                warn!(path = %path.display(), "Snapshot file deleted");
            }
        }
        Ok(())
    }
}

impl Persistence for SaveManager {
    fn save_all(
        &self,
        trains: &TrainRegistry,
        bookings: &BookingRegistry,
    ) -> Result<(), PersistenceError> {
        let payload = SavePayload::new(trains, bookings);
        self.write_payload(&payload)?;
        info!(
            path = %self.snapshot_path().display(),
            trains = payload.trains.len(),
            bookings = payload.bookings.len(),
            "Reservations saved"
        );
        Ok(())
    }

    fn load_all(&self) -> Result<Option<(TrainRegistry, BookingRegistry)>, PersistenceError> {
        match self.read_payload()? {
            Some(payload) => payload.into_registries().map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{engine::BookingRequest, reservations::Reservations, train::SLEEPER_CLASS};
    use anyhow::Result;
    use tempfile::tempdir;

    fn busy_state() -> Result<Reservations> {
        let mut state = Reservations::seeded(ClassSpec::defaults());
        state.trains_mut().configure_seats("45678", SLEEPER_CLASS, 1)?;
        let mut engine = state.engine();
        let mut pnrs = Vec::new();
        for name in ["Anil", "Bina", "Chetan", "Divya"] {
            let result = engine.book(&BookingRequest {
                name: name.to_string(),
                age: 25,
                gender: "F".to_string(),
                train: "45678".to_string(),
                class: SLEEPER_CLASS.to_string(),
            })?;
            pnrs.push(result.booking.pnr);
        }
        engine.cancel(&pnrs[1])?;
        Ok(state)
    }

    #[test]
    fn save_round_trip() -> Result<()> {
        let dir = tempdir()?;
        let manager = SaveManager::new(dir.path());
        assert!(manager.load_all()?.is_none());

        let state = busy_state()?;
        state.save(&manager)?;
        assert!(manager.exists());

        let (trains, bookings) = manager.load_all()?.expect("snapshot should exist");
        assert_eq!(
            trains.all().collect::<Vec<_>>(),
            state.trains().all().collect::<Vec<_>>()
        );
        assert_eq!(
            bookings.all().collect::<Vec<_>>(),
            state.bookings().all().collect::<Vec<_>>()
        );
        assert_eq!(trains.classes(), state.trains().classes());

        let sleeper = trains.get("45678")?.seat_class(SLEEPER_CLASS)?;
        assert_eq!(sleeper.available(), 0);
        assert_eq!(sleeper.waitlist_len(), 2);
        Ok(())
    }

    #[test]
    fn overwrite_replaces_whole_snapshot() -> Result<()> {
        let dir = tempdir()?;
        let manager = SaveManager::new(dir.path().join("nested"));
        Reservations::seeded(ClassSpec::defaults()).save(&manager)?;
        let first = manager.read_payload()?.expect("payload");
        assert!(first.bookings.is_empty());

        busy_state()?.save(&manager)?;
        let second = manager.read_payload()?.expect("payload");
        assert_eq!(second.bookings.len(), 4);
        assert!(second.saved_at() >= first.saved_at());

        let leftovers = fs::read_dir(manager.root())?.count();
        assert_eq!(leftovers, 1);
        Ok(())
    }

    #[test]
    fn garbage_snapshot_fails_cleanly() -> Result<()> {
        let dir = tempdir()?;
        let manager = SaveManager::new(dir.path());
        fs::write(manager.snapshot_path(), "{ not json")?;
        assert!(matches!(
            manager.load_all(),
            Err(PersistenceError::Format { .. })
        ));
        Ok(())
    }

    #[test]
    fn inconsistent_snapshot_is_rejected() -> Result<()> {
        let dir = tempdir()?;
        let manager = SaveManager::new(dir.path());
        busy_state()?.save(&manager)?;

        let mut payload = manager.read_payload()?.expect("payload");
        for booking in payload.bookings.iter_mut() {
            booking.cancel();
        }
        let mutated = serde_json::to_string(&payload)?;
        fs::write(manager.snapshot_path(), mutated)?;

        assert!(matches!(
            manager.load_all(),
            Err(PersistenceError::Corrupt(_))
        ));
        Ok(())
    }

    #[test]
    fn backup_info_and_clear() -> Result<()> {
        let dir = tempdir()?;
        let manager = SaveManager::new(dir.path());
        assert_eq!(manager.backup()?, None);
        assert_eq!(manager.file_info().size, None);

        busy_state()?.save(&manager)?;
        let backup = manager.backup()?.expect("backup path");
        assert!(backup.exists());

        let info = manager.file_info();
        assert!(info.size.unwrap_or(0) > 0);
        assert_eq!(info.size, info.backup_size);

        manager.clear()?;
        assert!(!manager.exists());
        assert!(!backup.exists());
        Ok(())
    }
}
