//! Store layer for carsharing.
//!
//! The whole car collection lives in a single JSON array. Every save is a
//! full rewrite of that array; there is no append log and no versioning.
//! [`JsonFileStore`] persists to a file, [`MemoryStore`] keeps the encoded
//! bytes in memory and is mostly useful in tests.

mod file;
mod memory;

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

use crate::error::{Error, Result};
use crate::model::Car;

/// Load/save boundary between the in-memory catalog and its persisted form.
pub trait CarStore: Send + fmt::Debug {
    /// Read and validate the full car collection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CorruptStore`] if the persisted data is missing,
    /// unreadable, or any entry fails validation.
    fn load(&self) -> Result<Vec<Car>>;

    /// Replace the persisted collection with `cars`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreWrite`] if the data cannot be written.
    fn save(&self, cars: &[Car]) -> Result<()>;
}

/// Encode the collection as four-space indented JSON with a trailing newline.
///
/// The output depends only on `cars`, so saving a freshly loaded collection
/// reproduces the same bytes.
///
/// # Errors
///
/// Returns [`Error::Json`] if serialization fails.
pub fn encode(cars: &[Car]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    cars.serialize(&mut ser)?;
    buf.push(b'\n');
    Ok(buf)
}

/// Decode and validate a persisted collection.
///
/// `origin` only labels errors.
///
/// # Errors
///
/// Returns [`Error::CorruptStore`] if the bytes are not a JSON array of valid
/// cars with distinct ids.
pub fn decode(origin: &Path, bytes: &[u8]) -> Result<Vec<Car>> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| Error::corrupt_store(origin, format!("invalid JSON: {e}")))?;

    let Value::Array(entries) = value else {
        return Err(Error::corrupt_store(origin, "expected a JSON array of cars"));
    };

    let mut seen = HashSet::with_capacity(entries.len());
    let mut cars = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let car = Car::from_value(entry)
            .map_err(|e| Error::corrupt_store(origin, format!("entry {i}: {e}")))?;
        if !seen.insert(car.id) {
            return Err(Error::corrupt_store(
                origin,
                format!("entry {i}: duplicate car id {}", car.id),
            ));
        }
        cars.push(car);
    }
    Ok(cars)
}
