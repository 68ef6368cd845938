//! HTTP transport for the car catalog.
//!
//! ## Routes
//!
//! - `GET /health` returns `{ "ok": true, "cars": n }`.
//! - `GET /api/cars?doors=&size=` lists cars, optionally filtered.
//! - `GET /api/cars/:id` fetches one car.
//! - `POST /api/cars` creates a car (201).
//! - `PUT /api/cars/:id` replaces a car's attributes.
//! - `DELETE /api/cars/:id` removes a car (204).
//! - `POST /api/cars/:id/trips` appends a trip (201).
//!
//! Errors come back as `{ "detail": ... }`: a message for missing cars (404)
//! and server faults (500), the list of rejected fields for bad input (422).
//! Malformed bodies, query strings and path ids are bad input too.
//!
//! Mutations run on the blocking pool while holding the catalog lock, since a
//! commit fsyncs the store file.

use std::net::SocketAddr;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::catalog::{Catalog, SharedCatalog};
use crate::error::{Error, Result};
use crate::model::{Car, Trip, ValidationError};
use crate::query::CarFilter;

/// Build the axum `Router` serving the catalog.
pub fn router(catalog: SharedCatalog) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/cars", get(list_cars).post(create_car))
        .route(
            "/api/cars/:id",
            get(get_car).put(update_car).delete(delete_car),
        )
        .route("/api/cars/:id/trips", post(add_trip))
        .with_state(catalog)
}

/// Serve the catalog over HTTP until ctrl-c.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(catalog: SharedCatalog, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(catalog))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Query string for `GET /api/cars`.
#[derive(Debug, Default, Deserialize)]
struct ListParams {
    doors: Option<i64>,
    size: Option<String>,
}

/// Catalog error rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn rejected(field: &str, message: String) -> Self {
        Self(ValidationError::single(field, message).into())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::rejected("body", rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::rejected("query", rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::rejected("id", rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self.0 {
            Error::CarNotFound { .. } => (StatusCode::NOT_FOUND, json!(self.0.to_string())),
            Error::Validation(err) => (StatusCode::UNPROCESSABLE_ENTITY, json!(err.errors())),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, json!(self.0.to_string())),
        };
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            warn!("Request rejected: {}", self.0);
        }
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

async fn health(State(catalog): State<SharedCatalog>) -> Json<Value> {
    let cars = catalog.lock().await.len();
    Json(json!({ "ok": true, "cars": cars }))
}

/// Run `op` against the locked catalog on the blocking pool.
async fn mutate<T, F>(catalog: SharedCatalog, op: F) -> ApiResult<T>
where
    F: FnOnce(&mut Catalog) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let mut guard = catalog.lock_owned().await;
    let result = tokio::task::spawn_blocking(move || op(&mut *guard))
        .await
        .map_err(Error::from)?;
    Ok(result?)
}

async fn list_cars(
    State(catalog): State<SharedCatalog>,
    params: std::result::Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Json<Vec<Car>>> {
    let Query(params) = params?;
    let filter = CarFilter {
        doors_min: params.doors,
        size: params.size,
    };
    Ok(Json(catalog.lock().await.list_cars(&filter)))
}

async fn get_car(
    State(catalog): State<SharedCatalog>,
    id: std::result::Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Car>> {
    let Path(id) = id?;
    let car = catalog.lock().await.find_car(id)?.clone();
    Ok(Json(car))
}

async fn create_car(
    State(catalog): State<SharedCatalog>,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Car>)> {
    let Json(fields) = body?;
    let car = mutate(catalog, move |c| c.create_car(&fields)).await?;
    Ok((StatusCode::CREATED, Json(car)))
}

async fn update_car(
    State(catalog): State<SharedCatalog>,
    id: std::result::Result<Path<i64>, PathRejection>,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Car>> {
    let Path(id) = id?;
    let Json(fields) = body?;
    let car = mutate(catalog, move |c| c.update_car(id, &fields)).await?;
    Ok(Json(car))
}

async fn delete_car(
    State(catalog): State<SharedCatalog>,
    id: std::result::Result<Path<i64>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(id) = id?;
    mutate(catalog, move |c| c.delete_car(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_trip(
    State(catalog): State<SharedCatalog>,
    id: std::result::Result<Path<i64>, PathRejection>,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Trip>)> {
    let Path(id) = id?;
    let Json(fields) = body?;
    let trip = mutate(catalog, move |c| c.add_trip(id, &fields)).await?;
    Ok((StatusCode::CREATED, Json(trip)))
}
