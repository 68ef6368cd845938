//! JSON file backed store.

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::{decode, encode, CarStore};
use crate::error::{Error, Result};
use crate::model::Car;

/// Store that keeps the whole catalog in one JSON file.
///
/// Saves go through a temporary sibling file that is synced and renamed over
/// the target, so readers never observe a partially written store.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    /// Path to the store file.
    path: PathBuf,
}

impl JsonFileStore {
    /// Create a store for the given file. Nothing is touched on disk.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Get the path to the store file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create an empty store if the file does not exist yet.
    ///
    /// Creates the parent directories as needed. Returns `true` if a new
    /// store was written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreWrite`] if the directories or the file cannot be
    /// created.
    pub fn init_if_missing(&self) -> Result<bool> {
        if self.path.exists() {
            return Ok(false);
        }
        info!("Creating empty store at {}", self.path.display());
        self.save(&[])?;
        Ok(true)
    }

    fn write_err(&self, source: std::io::Error) -> Error {
        Error::StoreWrite {
            path: self.path.clone(),
            source,
        }
    }

    fn write_atomic(&self, bytes: &[u8]) -> Result<()> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if !parent.exists() {
            fs::create_dir_all(&parent).map_err(|e| self.write_err(e))?;
        }

        let file_name = self
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("store");
        let tmp = parent.join(format!(".{file_name}.tmp.{}", std::process::id()));

        let written = fs::File::create(&tmp).and_then(|mut f| {
            f.write_all(bytes)?;
            f.sync_all()
        });
        if let Err(e) = written.and_then(|()| fs::rename(&tmp, &self.path)) {
            let _ = fs::remove_file(&tmp);
            return Err(self.write_err(e));
        }

        if let Ok(dir) = fs::File::open(&parent) {
            let _ = dir.sync_all();
        }
        Ok(())
    }
}

impl CarStore for JsonFileStore {
    fn load(&self) -> Result<Vec<Car>> {
        debug!("Loading store from {}", self.path.display());
        let bytes = fs::read(&self.path)
            .map_err(|e| Error::corrupt_store(&self.path, format!("cannot read store: {e}")))?;
        let cars = decode(&self.path, &bytes)?;
        info!("Loaded {} cars from {}", cars.len(), self.path.display());
        Ok(cars)
    }

    fn save(&self, cars: &[Car]) -> Result<()> {
        let bytes = encode(cars)?;
        self.write_atomic(&bytes)?;
        debug!(
            "Saved {} cars ({} bytes) to {}",
            cars.len(),
            bytes.len(),
            self.path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::model::validate_car_input;

    fn car(id: i64, size: &str, doors: i64) -> Car {
        Car::new(
            id,
            validate_car_input(&json!({"size": size, "doors": doors})).unwrap(),
        )
    }

    #[test]
    fn test_load_missing_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("cars.json"));

        let err = store.load().unwrap_err();
        assert!(matches!(err, Error::CorruptStore { .. }));
        assert!(err.to_string().contains("cannot read store"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("cars.json"));

        let cars = vec![car(1, "s", 3), car(2, "m", 5)];
        store.save(&cars).unwrap();

        assert_eq!(store.load().unwrap(), cars);
    }

    #[test]
    fn test_save_load_save_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cars.json");
        fs::write(
            &path,
            r#"[{"id": 1, "size": "s", "doors": 3, "trips": [{"id": 1, "start": 0, "end": 2, "description": "x"}]}]"#,
        )
        .unwrap();
        let store = JsonFileStore::new(&path);

        store.save(&store.load().unwrap()).unwrap();
        let first = fs::read(&path).unwrap();
        store.save(&store.load().unwrap()).unwrap();
        let second = fs::read(&path).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("cars.json"));
        store.save(&[car(1, "l", 5)]).unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["cars.json".to_string()]);
    }

    #[test]
    fn test_save_into_missing_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested/deeper/cars.json"));
        store.save(&[car(1, "s", 3)]).unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn test_save_failure_is_store_write() {
        let dir = tempfile::tempdir().unwrap();
        // The store path is a directory, so the final rename must fail.
        let path = dir.path().join("cars.json");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), "x").unwrap();
        let store = JsonFileStore::new(&path);

        let err = store.save(&[car(1, "s", 3)]).unwrap_err();
        assert!(matches!(err, Error::StoreWrite { .. }));
    }

    #[test]
    fn test_init_if_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("data/cars.json"));

        assert!(store.init_if_missing().unwrap());
        assert!(store.load().unwrap().is_empty());

        store.save(&[car(1, "s", 3)]).unwrap();
        assert!(!store.init_if_missing().unwrap());
        assert_eq!(store.load().unwrap().len(), 1);
    }

    #[test]
    fn test_path() {
        let store = JsonFileStore::new("/tmp/cars.json");
        assert_eq!(store.path(), Path::new("/tmp/cars.json"));
    }
}
