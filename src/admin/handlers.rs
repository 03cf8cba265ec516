use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::admin::AdminState;
use crate::load_balancer::LbError;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub servers: usize,
    pub default_weight: usize,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct BackendStatus {
    pub address: String,
    pub weight: usize,
}

#[derive(Debug, Deserialize)]
pub struct UpsertBackend {
    pub address: String,
    #[serde(default)]
    pub weight: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AddressQuery {
    pub address: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct BackendWeight {
    pub address: String,
    pub weight: Option<usize>,
    pub found: bool,
}

#[derive(Debug, Deserialize)]
pub struct DefaultWeight {
    pub weight: i64,
}

/// Registry error mapped to an HTTP status with a JSON body.
pub struct ApiError(LbError);

impl From<LbError> for ApiError {
    fn from(e: LbError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            LbError::InvalidWeight(_) | LbError::InvalidAddress(_) => StatusCode::BAD_REQUEST,
            LbError::ServerNotFound(_) => StatusCode::NOT_FOUND,
            LbError::NoAvailableServers => StatusCode::SERVICE_UNAVAILABLE,
            LbError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, Json(body)).into_response()
    }
}

fn parse_url(address: &str) -> Result<Url, ApiError> {
    Url::parse(address).map_err(|_| ApiError(LbError::InvalidAddress(address.to_string())))
}

pub async fn get_status<F>(State(state): State<AdminState<F>>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        servers: state.lb.servers().len(),
        default_weight: state.lb.default_weight(),
    })
}

pub async fn get_backends<F>(State(state): State<AdminState<F>>) -> Json<Vec<BackendStatus>> {
    let lb = &state.lb;
    let statuses = lb
        .servers()
        .into_iter()
        .map(|url| BackendStatus {
            // A server removed between the two calls reports weight 0.
            weight: lb.server_weight(&url).unwrap_or(0),
            address: url.to_string(),
        })
        .collect();

    Json(statuses)
}

pub async fn upsert_backend<F>(
    State(state): State<AdminState<F>>,
    Json(body): Json<UpsertBackend>,
) -> Result<StatusCode, ApiError> {
    let url = parse_url(&body.address)?;
    state.lb.upsert_server(&url, body.weight)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove_backend<F>(
    State(state): State<AdminState<F>>,
    Query(query): Query<AddressQuery>,
) -> Result<StatusCode, ApiError> {
    let url = parse_url(&query.address)?;
    state.lb.remove_server(&url)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_backend_weight<F>(
    State(state): State<AdminState<F>>,
    Query(query): Query<AddressQuery>,
) -> Result<Json<BackendWeight>, ApiError> {
    let url = parse_url(&query.address)?;
    let weight = state.lb.server_weight(&url);

    Ok(Json(BackendWeight {
        address: query.address,
        weight,
        found: weight.is_some(),
    }))
}

pub async fn set_default_weight<F>(
    State(state): State<AdminState<F>>,
    Json(body): Json<DefaultWeight>,
) -> Result<StatusCode, ApiError> {
    state.lb.set_default_weight(body.weight)?;
    Ok(StatusCode::NO_CONTENT)
}
