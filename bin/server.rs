// Issuance Ledger - Web Server
// REST API over the person store with Axum

use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use issuance_ledger::dates::parse_date;
use issuance_ledger::{
    delete_all_persons, delete_person, enroll_person, list_persons, record_usage, refresh_person,
    setup_database, update_person_attributes, AppConfig, Catalog, EngineError, IssuanceEngine,
    ItemChange, ItemLedgerEntry, Person, PersonInput, StoreError, UsageError,
};

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
    engine: IssuanceEngine,
}

impl AppState {
    fn db(&self) -> Result<MutexGuard<'_, Connection>, ApiError> {
        self.db
            .lock()
            .map_err(|_| ApiError::internal("database lock poisoned"))
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Handler failure carrying the status it maps to
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn internal(message: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.to_string(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        let status = err
            .chain()
            .find_map(|cause| {
                if let Some(store) = cause.downcast_ref::<StoreError>() {
                    return Some(match store {
                        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
                        StoreError::DuplicateName(_) | StoreError::ConcurrentUpdate(_) => {
                            StatusCode::CONFLICT
                        }
                    });
                }
                if let Some(engine) = cause.downcast_ref::<EngineError>() {
                    return Some(match engine {
                        EngineError::ReconciliationRegression { .. } => StatusCode::CONFLICT,
                        _ => StatusCode::UNPROCESSABLE_ENTITY,
                    });
                }
                cause
                    .downcast_ref::<UsageError>()
                    .map(|_| StatusCode::UNPROCESSABLE_ENTITY)
            })
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!("{:#}", err);
        } else {
            tracing::debug!(%status, "{:#}", err);
        }

        Self {
            status,
            message: format!("{:#}", err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(self.message),
        };
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Person summary for listings (ledger omitted)
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PersonSummary {
    id: String,
    name: String,
    gender: String,
    service_start_date: NaiveDate,
    promotion_date: NaiveDate,
    items: usize,
    issuances: usize,
}

impl From<Person> for PersonSummary {
    fn from(person: Person) -> Self {
        Self {
            items: person.ledger.len(),
            issuances: person.ledger.iter().map(|e| e.issuances.len()).sum(),
            id: person.id,
            name: person.name,
            gender: person.attributes.gender.to_string(),
            service_start_date: person.attributes.service_start_date,
            promotion_date: person.attributes.promotion_date,
        }
    }
}

/// Person with the changes the read just applied
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshedPerson {
    #[serde(flatten)]
    person: Person,
    changes: Vec<ItemChange>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnrollRequest {
    name: String,
    #[serde(flatten)]
    person: PersonInput,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageRequest {
    item: String,
    index: usize,
    used_count: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AsOfQuery {
    as_of: Option<String>,
}

impl AsOfQuery {
    /// Evaluation date: `?asOf=` when given, today otherwise
    fn resolve(&self) -> Result<NaiveDate, ApiError> {
        match self.as_of.as_deref() {
            Some(raw) => parse_date("asOf", raw).map_err(|e| anyhow::Error::from(e).into()),
            None => Ok(chrono::Local::now().date_naive()),
        }
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/persons - List persons
async fn get_persons(State(state): State<AppState>) -> ApiResult<Vec<PersonSummary>> {
    let conn = state.db()?;
    let persons = list_persons(&conn)?;

    Ok(Json(ApiResponse::ok(
        persons.into_iter().map(PersonSummary::from).collect(),
    )))
}

/// GET /api/persons/:id - Read a person, extending their ledger to today
async fn get_person_ledger(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<AsOfQuery>,
) -> ApiResult<RefreshedPerson> {
    let now = query.resolve()?;
    let mut conn = state.db()?;
    let (person, report) = refresh_person(&mut conn, &state.engine, &id, now)?;

    Ok(Json(ApiResponse::ok(RefreshedPerson {
        person,
        changes: report.changes,
    })))
}

/// POST /api/schedule - Compute a ledger without storing it
async fn preview_schedule(
    State(state): State<AppState>,
    Query(query): Query<AsOfQuery>,
    Json(input): Json<PersonInput>,
) -> ApiResult<Vec<ItemLedgerEntry>> {
    let now = query.resolve()?;
    let ledger = state
        .engine
        .compute_from_input(&input, now)
        .map_err(anyhow::Error::from)?;

    Ok(Json(ApiResponse::ok(ledger)))
}

/// POST /api/persons - Enroll a person
async fn create_person(
    State(state): State<AppState>,
    Query(query): Query<AsOfQuery>,
    Json(request): Json<EnrollRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Person>>), ApiError> {
    let now = query.resolve()?;
    let conn = state.db()?;
    let person = enroll_person(&conn, &state.engine, &request.name, &request.person, now)?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(person))))
}

/// PUT /api/persons/:id - Replace a person's dates
async fn update_person(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<PersonInput>,
) -> ApiResult<Person> {
    let conn = state.db()?;
    let person = update_person_attributes(&conn, &id, &input)?;

    Ok(Json(ApiResponse::ok(person)))
}

/// PUT /api/persons/:id/usage - Record consumption on one issuance
async fn update_usage(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UsageRequest>,
) -> ApiResult<Person> {
    let mut conn = state.db()?;
    let person = record_usage(&mut conn, &id, &request.item, request.index, request.used_count)?;

    Ok(Json(ApiResponse::ok(person)))
}

/// DELETE /api/persons/:id
async fn remove_person(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<String> {
    let conn = state.db()?;
    delete_person(&conn, &id)?;

    Ok(Json(ApiResponse::ok(id)))
}

/// DELETE /api/persons - Remove everyone
async fn remove_all_persons(State(state): State<AppState>) -> ApiResult<usize> {
    let conn = state.db()?;
    let deleted = delete_all_persons(&conn)?;

    Ok(Json(ApiResponse::ok(deleted)))
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load(None)?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let catalog = Catalog::from_dir(&config.catalog_dir)
        .with_context(|| format!("Failed to load catalog from {:?}", config.catalog_dir))?;
    tracing::info!(dir = ?config.catalog_dir, "catalog loaded");

    let conn = Connection::open(&config.database_path)
        .with_context(|| format!("Failed to open database {:?}", config.database_path))?;
    setup_database(&conn)?;
    tracing::info!(path = ?config.database_path, "database opened");

    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
        engine: IssuanceEngine::new(catalog),
    };

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route(
            "/persons",
            get(get_persons).post(create_person).delete(remove_all_persons),
        )
        .route(
            "/persons/:id",
            get(get_person_ledger).put(update_person).delete(remove_person),
        )
        .route("/persons/:id/usage", put(update_usage))
        .route("/schedule", post(preview_schedule))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.server.bind))?;

    tracing::info!(addr = %config.server.bind, "server running");

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
