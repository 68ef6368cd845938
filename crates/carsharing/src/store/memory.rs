//! In-memory store.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use super::{decode, encode, CarStore};
use crate::error::{Error, Result};
use crate::model::Car;

const ORIGIN: &str = ":memory:";

/// Store that keeps the encoded collection in memory.
///
/// Goes through the same encoding as [`super::JsonFileStore`], so loads
/// validate exactly like a file would. Writes can be made to fail to exercise
/// error paths.
#[derive(Debug)]
pub struct MemoryStore {
    bytes: Mutex<Vec<u8>>,
    fail_writes: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            bytes: Mutex::new(b"[]\n".to_vec()),
            fail_writes: AtomicBool::new(false),
        }
    }
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `cars`.
    ///
    /// # Errors
    ///
    /// Returns an error if the cars cannot be encoded.
    pub fn with_cars(cars: &[Car]) -> Result<Self> {
        let store = Self::new();
        store.save(cars)?;
        Ok(store)
    }

    /// Make subsequent saves fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// The currently persisted bytes.
    #[must_use]
    pub fn snapshot(&self) -> Vec<u8> {
        self.bytes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CarStore for MemoryStore {
    fn load(&self) -> Result<Vec<Car>> {
        decode(Path::new(ORIGIN), &self.snapshot())
    }

    fn save(&self, cars: &[Car]) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::StoreWrite {
                path: ORIGIN.into(),
                source: std::io::Error::other("writes disabled"),
            });
        }
        let encoded = encode(cars)?;
        *self.bytes.lock().unwrap_or_else(PoisonError::into_inner) = encoded;
        Ok(())
    }
}
