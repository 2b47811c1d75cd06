use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    error::{ErrorKind, PredictError},
    service::PredictionService,
    types::{
        CommoditySummary, DistrictSummary, HealthReport, MarketList, PredictionRequest,
        PredictionResult,
    },
};

// ---------- Server state ----------

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PredictionService>,
}

// ---------- Error handling ----------

#[derive(Debug)]
pub enum ApiError {
    Pipeline(PredictError),
    BadRequest(String),
}

impl From<PredictError> for ApiError {
    fn from(err: PredictError) -> Self {
        ApiError::Pipeline(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::Pipeline(err) => {
                let status = match err.kind() {
                    ErrorKind::Validation => StatusCode::BAD_REQUEST,
                    ErrorKind::NotFound => StatusCode::NOT_FOUND,
                    ErrorKind::Incompatible => StatusCode::UNPROCESSABLE_ENTITY,
                    ErrorKind::Prediction => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (
                    status,
                    json!({
                        "status": "error",
                        "error": err.to_string(),
                        "kind": err.kind().as_str(),
                        "options": err.options(),
                    }),
                )
            }
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                json!({
                    "status": "error",
                    "error": msg,
                    "kind": ErrorKind::Validation.as_str(),
                    "options": [],
                }),
            ),
        };
        (status, Json(body)).into_response()
    }
}

// ---------- Handlers ----------

async fn home(State(state): State<AppState>) -> Json<Value> {
    let available = state.service.registry().available();
    Json(json!({
        "message": "MandiNetra Price Prediction API",
        "status": "running",
        "total_commodities": available.len(),
        "available_commodities": available,
    }))
}

#[derive(serde::Serialize)]
struct CommodityList {
    commodities: Vec<CommoditySummary>,
}

async fn commodities(State(state): State<AppState>) -> Json<CommodityList> {
    Json(CommodityList {
        commodities: state.service.list_commodities(),
    })
}

#[derive(serde::Serialize)]
struct DistrictList {
    districts: Vec<DistrictSummary>,
}

async fn districts(
    State(state): State<AppState>,
    Path(commodity): Path<String>,
) -> Result<Json<DistrictList>, ApiError> {
    let districts = state.service.list_districts(&commodity)?;
    Ok(Json(DistrictList { districts }))
}

async fn markets(
    State(state): State<AppState>,
    Path(district): Path<String>,
) -> Result<Json<MarketList>, ApiError> {
    Ok(Json(state.service.list_markets(&district)?))
}

async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<PredictionRequest>, JsonRejection>,
) -> Result<Json<PredictionResult>, ApiError> {
    let Json(req) = payload.map_err(|e| {
        tracing::warn!("rejected prediction body: {}", e.body_text());
        ApiError::BadRequest("No JSON data provided".to_string())
    })?;
    let result = state
        .service
        .predict(&req.commodity, &req.district, &req.market)?;
    Ok(Json(result))
}

async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(state.service.health())
}

async fn not_found() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Endpoint not found" })),
    )
}

// ---------- Router ----------

pub fn router(service: Arc<PredictionService>) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/api/commodities", get(commodities))
        .route("/api/districts/:commodity", get(districts))
        .route("/api/markets/:district", get(markets))
        .route("/api/predict", post(predict))
        .route("/api/health", get(health))
        .fallback(not_found)
        .with_state(AppState { service })
}

/// Router with CORS for a single browser origin and request tracing.
pub fn app(service: Arc<PredictionService>, cors_origin: &str) -> anyhow::Result<Router> {
    let origin: HeaderValue = cors_origin.parse()?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);
    Ok(router(service)
        .layer(cors)
        .layer(TraceLayer::new_for_http()))
}
