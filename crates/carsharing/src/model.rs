//! Record model for cars and trips.
//!
//! Incoming fields arrive as loose JSON (from an HTTP body or from the store
//! file) and are validated into typed records here. Validation collects every
//! offending field instead of stopping at the first one.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Fuel used when a car is created without one.
pub const DEFAULT_FUEL: &str = "ele";

/// Transmission used when a car is created without one.
pub const DEFAULT_TRANSMISSION: &str = "auto";

/// A single trip taken with a car.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trip {
    /// Identifier, unique within the owning car.
    pub id: i64,
    /// Start reading (odometer or timestamp surrogate).
    pub start: i64,
    /// End reading.
    pub end: i64,
    /// Free-form description.
    pub description: String,
}

/// A car in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Car {
    /// Identifier, unique across the catalog.
    pub id: i64,
    /// Short size code such as `s`, `m` or `l`.
    pub size: String,
    /// Fuel type.
    pub fuel: String,
    /// Number of doors.
    pub doors: i64,
    /// Transmission type.
    pub transmission: String,
    /// Trips in insertion order.
    pub trips: Vec<Trip>,
}

/// Validated fields for creating or updating a car.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarInput {
    /// Short size code, never empty.
    pub size: String,
    /// Fuel type, defaulted to [`DEFAULT_FUEL`].
    pub fuel: String,
    /// Number of doors.
    pub doors: i64,
    /// Transmission type, defaulted to [`DEFAULT_TRANSMISSION`].
    pub transmission: String,
}

/// Validated fields for appending a trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripInput {
    /// Start reading.
    pub start: i64,
    /// End reading.
    pub end: i64,
    /// Free-form description.
    pub description: String,
}

/// One rejected field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Field name, dotted for nested fields (`trips[0].end`).
    pub field: String,
    /// Why the field was rejected.
    pub message: String,
}

/// The set of fields that failed validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationError {
    errors: Vec<FieldError>,
}

impl ValidationError {
    /// Record a rejected field.
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Build an error for a single field.
    #[must_use]
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut err = Self::default();
        err.push(field, message);
        err
    }

    /// Absorb another error, prefixing its field names.
    pub fn extend_nested(&mut self, prefix: &str, other: ValidationError) {
        for e in other.errors {
            self.push(format!("{prefix}.{}", e.field), e.message);
        }
    }

    /// The rejected fields in the order they were found.
    #[must_use]
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Names of the rejected fields.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.errors.iter().map(|e| e.field.as_str())
    }

    /// True when no field was rejected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    fn into_result<T>(self, value: impl FnOnce() -> T) -> Result<T, ValidationError> {
        if self.is_empty() {
            Ok(value())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid input")?;
        for (i, e) in self.errors.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{} ({})", e.field, e.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Validate loose fields into a [`CarInput`].
///
/// `size` must be a non-empty string and `doors` an integer (numeric strings
/// and integral floats are coerced). `fuel` and `transmission` fall back to
/// their defaults when absent or null.
///
/// # Errors
///
/// Returns a [`ValidationError`] naming every offending field.
pub fn validate_car_input(fields: &Value) -> Result<CarInput, ValidationError> {
    let mut reader = FieldReader::new(fields)?;
    let size = reader.non_empty_string("size");
    let fuel = reader.string_or("fuel", DEFAULT_FUEL);
    let doors = reader.int("doors");
    let transmission = reader.string_or("transmission", DEFAULT_TRANSMISSION);

    reader.finish(|| CarInput {
        size: size.unwrap_or_default(),
        fuel: fuel.unwrap_or_default(),
        doors: doors.unwrap_or_default(),
        transmission: transmission.unwrap_or_default(),
    })
}

/// Validate loose fields into a [`TripInput`].
///
/// `start` and `end` must be integers and `description` a string. The
/// ordering of `start` and `end` is not checked here; see
/// [`TripInput::check_order`].
///
/// # Errors
///
/// Returns a [`ValidationError`] naming every offending field.
pub fn validate_trip_input(fields: &Value) -> Result<TripInput, ValidationError> {
    let mut reader = FieldReader::new(fields)?;
    let start = reader.int("start");
    let end = reader.int("end");
    let description = reader.string("description");

    reader.finish(|| TripInput {
        start: start.unwrap_or_default(),
        end: end.unwrap_or_default(),
        description: description.unwrap_or_default(),
    })
}

impl TripInput {
    /// Reject trips that end before they start.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] on `end` when `end < start`.
    pub fn check_order(&self) -> Result<(), ValidationError> {
        if self.end < self.start {
            return Err(ValidationError::single(
                "end",
                format!("must be >= start ({})", self.start),
            ));
        }
        Ok(())
    }
}

impl Trip {
    /// Build a trip from validated input.
    #[must_use]
    pub fn new(id: i64, input: TripInput) -> Self {
        Self {
            id,
            start: input.start,
            end: input.end,
            description: input.description,
        }
    }

    /// Validate a persisted trip entry.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the entry is not a valid trip.
    pub fn from_value(value: &Value) -> Result<Self, ValidationError> {
        let mut reader = FieldReader::new(value)?;
        let id = reader.int("id");
        let mut errors = reader.errors;

        match validate_trip_input(value) {
            Ok(input) => match id {
                Some(id) if errors.is_empty() => Ok(Self::new(id, input)),
                _ => Err(errors),
            },
            Err(err) => {
                errors.errors.extend(err.errors);
                Err(errors)
            }
        }
    }
}

impl Car {
    /// Build a car with no trips from validated input.
    #[must_use]
    pub fn new(id: i64, input: CarInput) -> Self {
        Self {
            id,
            size: input.size,
            fuel: input.fuel,
            doors: input.doors,
            transmission: input.transmission,
            trips: Vec::new(),
        }
    }

    /// Overwrite the mutable fields, keeping `id` and `trips`.
    pub fn apply(&mut self, input: CarInput) {
        self.size = input.size;
        self.fuel = input.fuel;
        self.doors = input.doors;
        self.transmission = input.transmission;
    }

    /// Id for the next trip appended to this car, or `None` once the highest
    /// trip id is `i64::MAX`.
    #[must_use]
    pub fn next_trip_id(&self) -> Option<i64> {
        self.trips.iter().map(|t| t.id).max().unwrap_or(0).checked_add(1)
    }

    /// Validate a persisted car entry, including its trips.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the entry or any of its trips is
    /// invalid, or if two trips share an id.
    pub fn from_value(value: &Value) -> Result<Self, ValidationError> {
        let mut reader = FieldReader::new(value)?;
        let id = reader.int("id");
        let mut errors = reader.errors;

        let input = match validate_car_input(value) {
            Ok(input) => Some(input),
            Err(err) => {
                errors.errors.extend(err.errors);
                None
            }
        };

        let mut trips = Vec::new();
        match reader.map.get("trips") {
            None | Some(Value::Null) => {}
            Some(Value::Array(entries)) => {
                let mut seen = HashSet::new();
                for (i, entry) in entries.iter().enumerate() {
                    match Trip::from_value(entry) {
                        Ok(trip) if !seen.insert(trip.id) => {
                            errors.push(
                                format!("trips[{i}].id"),
                                format!("duplicate trip id {}", trip.id),
                            );
                        }
                        Ok(trip) => trips.push(trip),
                        Err(err) => errors.extend_nested(&format!("trips[{i}]"), err),
                    }
                }
            }
            Some(_) => errors.push("trips", "value is not a valid list"),
        }

        match (id, input) {
            (Some(id), Some(input)) if errors.is_empty() => {
                let mut car = Self::new(id, input);
                car.trips = trips;
                Ok(car)
            }
            _ => Err(errors),
        }
    }
}

/// Reads typed fields out of a JSON object, collecting failures.
struct FieldReader<'a> {
    map: &'a Map<String, Value>,
    errors: ValidationError,
}

impl<'a> FieldReader<'a> {
    fn new(value: &'a Value) -> Result<Self, ValidationError> {
        match value {
            Value::Object(map) => Ok(Self {
                map,
                errors: ValidationError::default(),
            }),
            _ => Err(ValidationError::single("body", "value is not a valid object")),
        }
    }

    fn present(&self, name: &str) -> Option<&'a Value> {
        self.map.get(name).filter(|v| !v.is_null())
    }

    fn int(&mut self, name: &str) -> Option<i64> {
        let Some(value) = self.present(name) else {
            self.errors.push(name, "field required");
            return None;
        };
        let coerced = coerce_int(value);
        if coerced.is_none() {
            self.errors.push(name, "value is not a valid integer");
        }
        coerced
    }

    fn string(&mut self, name: &str) -> Option<String> {
        match self.present(name) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                self.errors.push(name, "value is not a valid string");
                None
            }
            None => {
                self.errors.push(name, "field required");
                None
            }
        }
    }

    fn non_empty_string(&mut self, name: &str) -> Option<String> {
        let s = self.string(name)?;
        if s.trim().is_empty() {
            self.errors.push(name, "must not be empty");
            return None;
        }
        Some(s)
    }

    fn string_or(&mut self, name: &str, default: &str) -> Option<String> {
        if self.present(name).is_none() {
            return Some(default.to_string());
        }
        self.string(name)
    }

    fn finish<T>(self, build: impl FnOnce() -> T) -> Result<T, ValidationError> {
        self.errors.into_result(build)
    }
}

/// Coerce a JSON value to an integer the way a lenient form parser would.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
