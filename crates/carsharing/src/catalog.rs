//! The car catalog: in-memory collection plus its store.
//!
//! Every mutation is staged on a copy of the collection, written to the store,
//! and only then swapped in. A failed save leaves the in-memory catalog as it
//! was, so memory and the persisted store never disagree.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{validate_car_input, validate_trip_input, Car, Trip};
use crate::query::{self, CarFilter};
use crate::store::{CarStore, JsonFileStore};

/// A catalog shared between request handlers.
///
/// The mutex is the single serialization point for load-mutate-save
/// sequences.
pub type SharedCatalog = Arc<Mutex<Catalog>>;

/// Owned car collection backed by a [`CarStore`].
#[derive(Debug)]
pub struct Catalog {
    store: Box<dyn CarStore>,
    cars: Vec<Car>,
    require_trip_order: bool,
}

impl Catalog {
    /// Load the catalog from `store`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CorruptStore`] if the store cannot be loaded.
    pub fn open(store: impl CarStore + 'static) -> Result<Self> {
        let cars = store.load()?;
        Ok(Self {
            store: Box::new(store),
            cars,
            require_trip_order: false,
        })
    }

    /// Open the file store named by `config`, creating it first if allowed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be created or loaded.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = JsonFileStore::new(config.store_path());
        if config.storage.create_if_missing {
            store.init_if_missing()?;
        }
        Ok(Self::open(store)?.with_trip_order_check(config.validation.require_trip_order))
    }

    /// Reject trips whose `end` is before their `start`.
    #[must_use]
    pub fn with_trip_order_check(mut self, enabled: bool) -> Self {
        self.require_trip_order = enabled;
        self
    }

    /// Wrap the catalog for sharing across tasks.
    #[must_use]
    pub fn into_shared(self) -> SharedCatalog {
        Arc::new(Mutex::new(self))
    }

    /// All cars in collection order.
    #[must_use]
    pub fn cars(&self) -> &[Car] {
        &self.cars
    }

    /// Number of cars.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cars.len()
    }

    /// True if the catalog holds no cars.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cars.is_empty()
    }

    /// Cars matching `filter`, in collection order.
    #[must_use]
    pub fn list_cars(&self, filter: &CarFilter) -> Vec<Car> {
        query::list_cars(&self.cars, filter)
    }

    /// Find a car by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CarNotFound`] if no car has this id.
    pub fn find_car(&self, id: i64) -> Result<&Car> {
        query::find_car(&self.cars, id)
    }

    /// Validate `fields` and add a new car.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for bad input, [`Error::IdsExhausted`]
    /// if the highest car id is `i64::MAX`, or [`Error::StoreWrite`] if the
    /// catalog cannot be saved.
    pub fn create_car(&mut self, fields: &Value) -> Result<Car> {
        let input = validate_car_input(fields)?;
        let id = query::next_car_id(&self.cars).ok_or(Error::IdsExhausted { kind: "car" })?;
        let car = Car::new(id, input);

        let mut staged = self.cars.clone();
        staged.push(car.clone());
        self.commit(staged)?;

        info!("Created car {} (size {})", car.id, car.size);
        Ok(car)
    }

    /// Overwrite size, fuel, doors and transmission of an existing car.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CarNotFound`], [`Error::Validation`], or
    /// [`Error::StoreWrite`].
    pub fn update_car(&mut self, id: i64, fields: &Value) -> Result<Car> {
        let index = self.position(id)?;
        let input = validate_car_input(fields)?;

        let mut staged = self.cars.clone();
        staged[index].apply(input);
        let car = staged[index].clone();
        self.commit(staged)?;

        info!("Updated car {}", id);
        Ok(car)
    }

    /// Remove a car and its trips.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CarNotFound`] or [`Error::StoreWrite`].
    pub fn delete_car(&mut self, id: i64) -> Result<()> {
        let index = self.position(id)?;

        let mut staged = self.cars.clone();
        let removed = staged.remove(index);
        self.commit(staged)?;

        info!("Deleted car {} with {} trips", id, removed.trips.len());
        Ok(())
    }

    /// Validate `fields` and append a trip to a car.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CarNotFound`], [`Error::Validation`],
    /// [`Error::IdsExhausted`], or [`Error::StoreWrite`].
    pub fn add_trip(&mut self, car_id: i64, fields: &Value) -> Result<Trip> {
        let index = self.position(car_id)?;
        let input = validate_trip_input(fields)?;
        if self.require_trip_order {
            input.check_order()?;
        }

        let mut staged = self.cars.clone();
        let car = &mut staged[index];
        let id = car.next_trip_id().ok_or(Error::IdsExhausted { kind: "trip" })?;
        let trip = Trip::new(id, input);
        car.trips.push(trip.clone());
        self.commit(staged)?;

        info!("Added trip {} to car {}", trip.id, car_id);
        Ok(trip)
    }

    fn position(&self, id: i64) -> Result<usize> {
        self.cars
            .iter()
            .position(|c| c.id == id)
            .ok_or(Error::CarNotFound { id })
    }

    fn commit(&mut self, staged: Vec<Car>) -> Result<()> {
        self.store.save(&staged)?;
        debug!("Committed {} cars", staged.len());
        self.cars = staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::logging::init_test_logging;
    use crate::store::MemoryStore;

    fn empty_catalog() -> Catalog {
        init_test_logging();
        Catalog::open(MemoryStore::new()).unwrap()
    }

    #[test]
    fn test_create_first_car_gets_id_one() {
        let mut catalog = empty_catalog();
        let car = catalog.create_car(&json!({"size": "m", "doors": 5})).unwrap();

        assert_eq!(car.id, 1);
        assert_eq!(car.fuel, "ele");
        assert_eq!(car.transmission, "auto");
        assert!(car.trips.is_empty());
    }

    #[test]
    fn test_find_after_create_returns_equal_record() {
        let mut catalog = empty_catalog();
        let car = catalog
            .create_car(&json!({"size": "s", "doors": 3, "fuel": "gas"}))
            .unwrap();
        assert_eq!(catalog.find_car(car.id).unwrap(), &car);
    }

    #[test]
    fn test_create_invalid_input() {
        let mut catalog = empty_catalog();
        let err = catalog.create_car(&json!({"size": "m"})).unwrap_err();

        assert!(err.is_validation());
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_delete_then_find_is_not_found() {
        let mut catalog = empty_catalog();
        let car = catalog.create_car(&json!({"size": "m", "doors": 5})).unwrap();

        catalog.delete_car(car.id).unwrap();
        assert!(catalog.find_car(car.id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_delete_missing() {
        let mut catalog = empty_catalog();
        let err = catalog.delete_car(3).unwrap_err();
        assert_eq!(err.to_string(), "No car found with id: 3");
    }

    #[test]
    fn test_ids_stay_unique_after_delete() {
        let mut catalog = empty_catalog();
        for _ in 0..3 {
            catalog.create_car(&json!({"size": "m", "doors": 5})).unwrap();
        }
        catalog.delete_car(2).unwrap();
        let car = catalog.create_car(&json!({"size": "l", "doors": 5})).unwrap();

        assert_eq!(car.id, 4);
        let ids: Vec<_> = catalog.cars().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 3, 4]);
    }

    #[test]
    fn test_create_after_max_id_is_an_error() {
        init_test_logging();
        let top = Car::new(i64::MAX, validate_car_input(&json!({"size": "m", "doors": 5})).unwrap());
        let store = MemoryStore::with_cars(&[top]).unwrap();
        let mut catalog = Catalog::open(store).unwrap();

        let err = catalog
            .create_car(&json!({"size": "s", "doors": 3}))
            .unwrap_err();
        assert!(matches!(err, Error::IdsExhausted { kind: "car" }));
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.store.load().unwrap(), catalog.cars());
    }

    #[test]
    fn test_add_trip_after_max_trip_id_is_an_error() {
        init_test_logging();
        let mut car = Car::new(1, validate_car_input(&json!({"size": "m", "doors": 5})).unwrap());
        car.trips.push(Trip {
            id: i64::MAX,
            start: 0,
            end: 1,
            description: "Last".to_string(),
        });
        let mut catalog = Catalog::open(MemoryStore::with_cars(&[car]).unwrap()).unwrap();

        let err = catalog
            .add_trip(1, &json!({"start": 1, "end": 2, "description": "One more"}))
            .unwrap_err();
        assert!(matches!(err, Error::IdsExhausted { kind: "trip" }));
        assert_eq!(catalog.find_car(1).unwrap().trips.len(), 1);
    }

    #[test]
    fn test_update_preserves_id_and_trips() {
        let store = MemoryStore::with_cars(&[Car {
            id: 1,
            size: "s".to_string(),
            fuel: "ele".to_string(),
            doors: 3,
            transmission: "auto".to_string(),
            trips: vec![Trip {
                id: 1,
                start: 0,
                end: 3,
                description: "Shop".to_string(),
            }],
        }])
        .unwrap();
        let mut catalog = Catalog::open(store).unwrap();

        let car = catalog
            .update_car(
                1,
                &json!({"size": "l", "doors": 5, "fuel": "gas", "transmission": "manual"}),
            )
            .unwrap();

        assert_eq!(car.id, 1);
        assert_eq!(car.size, "l");
        assert_eq!(car.doors, 5);
        assert_eq!(car.fuel, "gas");
        assert_eq!(car.transmission, "manual");
        assert_eq!(car.trips.len(), 1);
    }

    #[test]
    fn test_update_missing_beats_validation() {
        let mut catalog = empty_catalog();
        let err = catalog.update_car(5, &json!({})).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_update_invalid_leaves_car_untouched() {
        let mut catalog = empty_catalog();
        let car = catalog.create_car(&json!({"size": "m", "doors": 5})).unwrap();

        let err = catalog
            .update_car(car.id, &json!({"size": "", "doors": 2}))
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(catalog.find_car(car.id).unwrap(), &car);
    }

    #[test]
    fn test_add_trip_assigns_sequential_ids() {
        let mut catalog = empty_catalog();
        let car = catalog.create_car(&json!({"size": "m", "doors": 5})).unwrap();

        let first = catalog
            .add_trip(car.id, &json!({"start": 0, "end": 5, "description": "Work"}))
            .unwrap();
        let second = catalog
            .add_trip(car.id, &json!({"start": 5, "end": 9, "description": "Home"}))
            .unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        let trips = &catalog.find_car(car.id).unwrap().trips;
        assert_eq!(trips, &vec![first, second]);
    }

    #[test]
    fn test_add_trip_missing_car_does_not_touch_store() {
        init_test_logging();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cars.json");
        let store = JsonFileStore::new(&path);
        store.init_if_missing().unwrap();
        let mut catalog = Catalog::open(store).unwrap();
        catalog.create_car(&json!({"size": "m", "doors": 5})).unwrap();
        let before = std::fs::read(&path).unwrap();

        let err = catalog
            .add_trip(7, &json!({"start": 0, "end": 1, "description": "x"}))
            .unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_trip_order_unchecked_by_default() {
        let mut catalog = empty_catalog();
        let car = catalog.create_car(&json!({"size": "m", "doors": 5})).unwrap();
        let trip = catalog
            .add_trip(car.id, &json!({"start": 9, "end": 1, "description": "odd"}))
            .unwrap();
        assert_eq!(trip.end, 1);
    }

    #[test]
    fn test_trip_order_enforced_when_enabled() {
        let mut catalog = empty_catalog().with_trip_order_check(true);
        let car = catalog.create_car(&json!({"size": "m", "doors": 5})).unwrap();

        let err = catalog
            .add_trip(car.id, &json!({"start": 9, "end": 1, "description": "odd"}))
            .unwrap_err();
        assert!(err.is_validation());
        assert!(catalog.find_car(car.id).unwrap().trips.is_empty());
    }

    #[test]
    fn test_failed_save_keeps_memory_in_sync() {
        init_test_logging();
        let existing = Car::new(1, validate_car_input(&json!({"size": "m", "doors": 5})).unwrap());
        let store = MemoryStore::with_cars(&[existing]).unwrap();
        store.set_fail_writes(true);
        let mut catalog = Catalog::open(store).unwrap();

        let err = catalog
            .create_car(&json!({"size": "l", "doors": 3}))
            .unwrap_err();
        assert!(matches!(err, Error::StoreWrite { .. }));
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.store.load().unwrap(), catalog.cars());

        let err = catalog.delete_car(1).unwrap_err();
        assert!(matches!(err, Error::StoreWrite { .. }));
        assert!(catalog.find_car(1).is_ok());
    }

    #[test]
    fn test_list_cars_through_catalog() {
        let mut catalog = empty_catalog();
        catalog.create_car(&json!({"size": "m", "doors": 5})).unwrap();
        catalog.create_car(&json!({"size": "s", "doors": 3})).unwrap();

        assert_eq!(catalog.list_cars(&CarFilter::size("s")).len(), 1);
        assert_eq!(catalog.list_cars(&CarFilter::default()).len(), 2);
    }

    #[test]
    fn test_from_config_creates_store() {
        init_test_logging();
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.path = Some(dir.path().join("cars.json"));

        let mut catalog = Catalog::from_config(&config).unwrap();
        catalog.create_car(&json!({"size": "m", "doors": 5})).unwrap();

        let reopened = Catalog::from_config(&config).unwrap();
        assert_eq!(reopened.len(), 1);
    }

    #[test]
    fn test_from_config_without_create_fails_on_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.path = Some(dir.path().join("cars.json"));
        config.storage.create_if_missing = false;

        let err = Catalog::from_config(&config).unwrap_err();
        assert!(matches!(err, Error::CorruptStore { .. }));
    }
}
