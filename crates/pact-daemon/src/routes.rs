//! Axum router and all HTTP handlers for pact-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Handlers translate HTTP to [`ContractService`] calls
//! and publish lifecycle events on the bus after each successful write.
//!
//! [`ContractService`]: pact_service::ContractService

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use pact_db::ContractFilter;
use pact_schemas::{
    BlueprintRequest, ContractCreateRequest, ContractStatus, FieldValuesRequest, TransitionRequest,
};
use pact_service::{ReplaceMode, ServiceError};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::info;

use crate::{
    api_types::{ContractListQuery, ErrorBody, HealthResponse},
    error::{ApiError, ApiJson, ApiPath, ApiQuery},
    state::{AppState, BusMsg},
};

type ApiResult<T> = Result<T, ApiError>;

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/stream", get(stream))
        .route("/v1/blueprints", get(list_blueprints).post(create_blueprint))
        .route(
            "/v1/blueprints/:id",
            get(get_blueprint)
                .put(put_blueprint)
                .patch(patch_blueprint)
                .delete(delete_blueprint),
        )
        .route("/v1/contracts", get(list_contracts).post(create_contract))
        .route(
            "/v1/contracts/:id",
            get(get_contract)
                .put(contract_write_refused)
                .patch(contract_write_refused)
                .delete(delete_contract),
        )
        .route("/v1/contracts/:id/transition", post(transition_contract))
        .route("/v1/contracts/:id/update_fields", post(update_fields))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
            config_hash: st.config_hash.clone(),
        }),
    )
}

// ---------------------------------------------------------------------------
// /v1/blueprints
// ---------------------------------------------------------------------------

pub(crate) async fn list_blueprints(State(st): State<Arc<AppState>>) -> ApiResult<Response> {
    let bps = st.service.list_blueprints().await?;
    Ok(Json(bps).into_response())
}

pub(crate) async fn create_blueprint(
    State(st): State<Arc<AppState>>,
    ApiJson(req): ApiJson<BlueprintRequest>,
) -> ApiResult<Response> {
    let bp = st.service.create_blueprint(req).await?;
    info!(blueprint_id = bp.id, fields = bp.fields.len(), "blueprint/create");
    Ok((StatusCode::CREATED, Json(bp)).into_response())
}

pub(crate) async fn get_blueprint(
    State(st): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Response> {
    let bp = st.service.get_blueprint(id).await?;
    Ok(Json(bp).into_response())
}

pub(crate) async fn put_blueprint(
    State(st): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<BlueprintRequest>,
) -> ApiResult<Response> {
    replace_blueprint(&st, id, req, ReplaceMode::Full).await
}

pub(crate) async fn patch_blueprint(
    State(st): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<BlueprintRequest>,
) -> ApiResult<Response> {
    replace_blueprint(&st, id, req, ReplaceMode::Partial).await
}

async fn replace_blueprint(
    st: &AppState,
    id: i64,
    req: BlueprintRequest,
    mode: ReplaceMode,
) -> ApiResult<Response> {
    let bp = st.service.replace_blueprint(id, req, mode).await?;
    info!(blueprint_id = id, ?mode, "blueprint/replace");
    Ok(Json(bp).into_response())
}

pub(crate) async fn delete_blueprint(
    State(st): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    st.service.delete_blueprint(id).await?;
    info!(blueprint_id = id, "blueprint/delete");
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// /v1/contracts
// ---------------------------------------------------------------------------

/// Comma-separated status list; blanks are ignored, unknown names are a 400.
fn parse_status_filter(raw: Option<&str>) -> Result<ContractFilter, ServiceError> {
    let mut filter = ContractFilter::default();
    for part in raw.unwrap_or_default().split(',').map(str::trim) {
        if part.is_empty() {
            continue;
        }
        let status = ContractStatus::parse(part).ok_or_else(|| {
            ServiceError::invalid(format!("status: \"{part}\" is not a valid choice."))
        })?;
        if !filter.statuses.contains(&status) {
            filter.statuses.push(status);
        }
    }
    Ok(filter)
}

pub(crate) async fn list_contracts(
    State(st): State<Arc<AppState>>,
    ApiQuery(q): ApiQuery<ContractListQuery>,
) -> ApiResult<Response> {
    let filter = parse_status_filter(q.status.as_deref())?;
    let contracts = st.service.list_contracts(&filter).await?;
    Ok(Json(contracts).into_response())
}

pub(crate) async fn create_contract(
    State(st): State<Arc<AppState>>,
    ApiJson(req): ApiJson<ContractCreateRequest>,
) -> ApiResult<Response> {
    let view = st.service.instantiate(req).await?;

    info!(contract_id = view.id, blueprint_id = view.blueprint, "contract/create");
    st.publish(BusMsg::ContractCreated {
        contract_id: view.id,
        blueprint_id: view.blueprint,
    });
    Ok((StatusCode::CREATED, Json(view)).into_response())
}

pub(crate) async fn get_contract(
    State(st): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Response> {
    let view = st.service.get_contract(id).await?;
    Ok(Json(view).into_response())
}

/// Contracts change only through `/transition` and `/update_fields`.
pub(crate) async fn contract_write_refused() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(ErrorBody::detail(
            "Use /transition or /update_fields endpoints.",
        )),
    )
        .into_response()
}

pub(crate) async fn delete_contract(
    State(st): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    st.service.delete_contract(id).await?;

    info!(contract_id = id, "contract/delete");
    st.publish(BusMsg::ContractDeleted { contract_id: id });
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// POST /v1/contracts/:id/transition
// ---------------------------------------------------------------------------

/// The body is decoded only after the contract is known to exist, so an
/// unknown id is a 404 whatever was posted.
pub(crate) async fn transition_contract(
    State(st): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
    body: Result<ApiJson<TransitionRequest>, ApiError>,
) -> ApiResult<Response> {
    let req = match body {
        Ok(ApiJson(req)) => req,
        Err(rejection) => {
            st.service.get_contract(id).await?;
            return Err(rejection);
        }
    };

    let view = st.service.request_transition(id, req).await?;

    info!(contract_id = id, status = %view.status, "contract/transition");
    st.publish(BusMsg::ContractTransitioned {
        contract_id: id,
        status: view.status,
    });
    Ok(Json(view).into_response())
}

// ---------------------------------------------------------------------------
// POST /v1/contracts/:id/update_fields
// ---------------------------------------------------------------------------

/// Missing contract, then frozen status, then the body.
pub(crate) async fn update_fields(
    State(st): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
    body: Result<ApiJson<FieldValuesRequest>, ApiError>,
) -> ApiResult<Response> {
    let req = match body {
        Ok(ApiJson(req)) => req,
        Err(rejection) => {
            st.service.editable_contract(id).await?;
            return Err(rejection);
        }
    };

    let mut field_ids: Vec<i64> = req
        .fields
        .iter()
        .flatten()
        .filter_map(|u| u.id)
        .collect();
    field_ids.sort_unstable();
    field_ids.dedup();

    let view = st.service.update_field_values(id, req).await?;

    info!(contract_id = id, fields = field_ids.len(), "contract/update_fields");
    st.publish(BusMsg::FieldsUpdated {
        contract_id: id,
        field_ids,
    });
    Ok(Json(view).into_response())
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(m.event_name()).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}
