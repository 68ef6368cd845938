//! Read-only lookups over the car collection.

use crate::error::{Error, Result};
use crate::model::Car;

/// Filters for [`list_cars`]. Unset filters match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CarFilter {
    /// Keep cars with at least this many doors.
    pub doors_min: Option<i64>,
    /// Keep cars with exactly this size code. An empty string is ignored.
    pub size: Option<String>,
}

impl CarFilter {
    /// Filter on size only.
    #[must_use]
    pub fn size(size: impl Into<String>) -> Self {
        Self {
            size: Some(size.into()),
            ..Self::default()
        }
    }

    /// Filter on minimum door count only.
    #[must_use]
    pub fn doors_min(doors_min: i64) -> Self {
        Self {
            doors_min: Some(doors_min),
            ..Self::default()
        }
    }

    /// Check a single car against every set filter.
    #[must_use]
    pub fn matches(&self, car: &Car) -> bool {
        let size_ok = match self.size.as_deref() {
            Some(size) if !size.is_empty() => car.size == size,
            _ => true,
        };
        let doors_ok = self.doors_min.map_or(true, |min| car.doors >= min);
        size_ok && doors_ok
    }
}

/// Cars matching `filter`, in collection order.
#[must_use]
pub fn list_cars(cars: &[Car], filter: &CarFilter) -> Vec<Car> {
    cars.iter().filter(|c| filter.matches(c)).cloned().collect()
}

/// Find a car by id.
///
/// # Errors
///
/// Returns [`Error::CarNotFound`] if no car has this id.
pub fn find_car(cars: &[Car], id: i64) -> Result<&Car> {
    cars.iter()
        .find(|c| c.id == id)
        .ok_or(Error::CarNotFound { id })
}

/// Id for the next car added to the collection.
///
/// One past the highest id in use, so ids stay unique after deletions.
/// `None` once the highest id is `i64::MAX`.
#[must_use]
pub fn next_car_id(cars: &[Car]) -> Option<i64> {
    cars.iter().map(|c| c.id).max().unwrap_or(0).checked_add(1)
}
