//! Editor API
//!
//! JSON endpoints the GUI front-end uses to build and edit the node graph.
//! Every handler goes through the [`AppManager`]; errors come back as
//! `{"error": "..."}` with the status from [`AppError`].

use crate::app::{AppManager, NameCheck};
use crate::graph::NodeChange;
use crate::websocket;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
};
use nrs_libs::constants::settings;
use nrs_libs::{AppError, Link, NameRules, Node, NodeId, NodeVariable, SyncStatus, VariableId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

// === Request / response bodies ===

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    service: String,
    online: bool,
    nodes: usize,
    names: NameRules,
    args: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct NodeListResponse {
    pub nodes: Vec<Node>,
}

#[derive(Debug, Serialize)]
pub struct NodeDetailsResponse {
    pub node: Node,
    pub variables: Vec<NodeVariable>,
}

#[derive(Debug, Deserialize)]
pub struct CreateNodeRequest {
    pub name: String,
    pub node_type: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct SyncRequest {
    pub status: SyncStatus,
}

#[derive(Debug, Deserialize)]
pub struct CreateVariableRequest {
    pub name: String,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Deserialize)]
pub struct VariableValueRequest {
    pub value: Value,
}

/// Body of attribute and settings reads and writes
#[derive(Debug, Serialize, Deserialize)]
pub struct ValueBody {
    pub value: Value,
}

#[derive(Debug, Serialize)]
pub struct LinkListResponse {
    pub links: Vec<Link>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Only the node with this exact name
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NameQuery {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct OnlineRequest {
    pub online: bool,
}

#[derive(Debug, Serialize)]
pub struct OnlineResponse {
    pub online: bool,
    /// Nodes whose sync status flipped because of the switch
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub changed: Vec<NodeId>,
}

// === Handlers ===

/// Handler for GET /health
async fn health_check(State(app): State<AppManager>) -> Result<Json<HealthResponse>, AppError> {
    let nodes = app.with_graph(|graph| graph.count())?;
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        service: "nrs-gui".to_string(),
        online: app.is_online(),
        nodes,
        names: app.config().names.clone(),
        args: app.args().to_vec(),
    }))
}

/// Handler for GET /nodes
async fn list_nodes(
    State(app): State<AppManager>,
    Query(query): Query<ListQuery>,
) -> Result<Json<NodeListResponse>, AppError> {
    let nodes = match query.name {
        Some(name) => app
            .with_graph(|graph| graph.find_by_name(&name).cloned())?
            .into_iter()
            .collect(),
        None => app.list_nodes()?,
    };
    Ok(Json(NodeListResponse { nodes }))
}

/// Handler for POST /nodes
async fn create_node(
    State(app): State<AppManager>,
    Json(request): Json<CreateNodeRequest>,
) -> Result<(StatusCode, Json<Node>), AppError> {
    info!("Creating node '{}' of type {}", request.name, request.node_type);
    let node = app.create_node(&request.name, &request.node_type, request.attributes)?;
    Ok((StatusCode::CREATED, Json(node)))
}

/// Handler for GET /nodes/:id
async fn get_node(
    State(app): State<AppManager>,
    Path(id): Path<NodeId>,
) -> Result<Json<NodeDetailsResponse>, AppError> {
    let (node, variables) = app.node_details(id)?;
    Ok(Json(NodeDetailsResponse { node, variables }))
}

/// Handler for PATCH /nodes/:id
async fn modify_node(
    State(app): State<AppManager>,
    Path(id): Path<NodeId>,
    Json(change): Json<NodeChange>,
) -> Result<Json<Node>, AppError> {
    Ok(Json(app.modify_node(id, change)?))
}

/// Handler for DELETE /nodes/:id
async fn delete_node(
    State(app): State<AppManager>,
    Path(id): Path<NodeId>,
) -> Result<StatusCode, AppError> {
    app.delete_node(id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for PUT /nodes/:id/sync
async fn set_node_sync(
    State(app): State<AppManager>,
    Path(id): Path<NodeId>,
    Json(request): Json<SyncRequest>,
) -> Result<Json<Node>, AppError> {
    Ok(Json(app.set_node_sync(id, request.status)?))
}

/// Handler for POST /nodes/:id/variables
async fn create_variable(
    State(app): State<AppManager>,
    Path(id): Path<NodeId>,
    Json(request): Json<CreateVariableRequest>,
) -> Result<(StatusCode, Json<NodeVariable>), AppError> {
    let variable = app.add_variable(id, &request.name, request.value)?;
    Ok((StatusCode::CREATED, Json(variable)))
}

/// Handler for PUT /variables/:id
async fn set_variable_value(
    State(app): State<AppManager>,
    Path(id): Path<VariableId>,
    Json(request): Json<VariableValueRequest>,
) -> Result<Json<NodeVariable>, AppError> {
    Ok(Json(app.set_variable_value(id, request.value)?))
}

/// Handler for GET /nodes/:id/attributes/:key
async fn get_attribute(
    State(app): State<AppManager>,
    Path((id, key)): Path<(NodeId, String)>,
) -> Result<Json<ValueBody>, AppError> {
    let delegate = app.attribute_delegate(id, &key)?;
    Ok(Json(ValueBody {
        value: delegate.get(),
    }))
}

/// Handler for PUT /nodes/:id/attributes/:key
///
/// A `null` value removes the attribute. Errors from the write reach the
/// client.
async fn set_attribute(
    State(app): State<AppManager>,
    Path((id, key)): Path<(NodeId, String)>,
    Json(body): Json<ValueBody>,
) -> Result<Json<ValueBody>, AppError> {
    let node = app.set_attribute(id, &key, body.value)?;
    Ok(Json(ValueBody {
        value: node.attribute(&key).cloned().unwrap_or(Value::Null),
    }))
}

/// Handler for GET /links
async fn list_links(State(app): State<AppManager>) -> Result<Json<LinkListResponse>, AppError> {
    let links = app.with_graph(|graph| graph.links())?;
    Ok(Json(LinkListResponse { links }))
}

/// Handler for POST /links
async fn add_link(
    State(app): State<AppManager>,
    Json(link): Json<Link>,
) -> Result<(StatusCode, Json<Link>), AppError> {
    let link = app.add_link(link.source, link.target)?;
    Ok((StatusCode::CREATED, Json(link)))
}

/// Handler for DELETE /links
async fn remove_link(
    State(app): State<AppManager>,
    Json(link): Json<Link>,
) -> Result<StatusCode, AppError> {
    app.remove_link(link.source, link.target)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for GET /names/check?name=
async fn check_name(
    State(app): State<AppManager>,
    Query(query): Query<NameQuery>,
) -> Result<Json<NameCheck>, AppError> {
    Ok(Json(app.validate_name(&query.name)?))
}

/// Handler for GET /settings/online_offline
async fn get_online(State(app): State<AppManager>) -> Json<OnlineResponse> {
    Json(OnlineResponse {
        online: app.is_online(),
        changed: Vec::new(),
    })
}

/// Handler for PUT /settings/online_offline
async fn set_online(
    State(app): State<AppManager>,
    Json(request): Json<OnlineRequest>,
) -> Result<Json<OnlineResponse>, AppError> {
    info!("Switching {}", if request.online { "online" } else { "offline" });
    let changed = app.set_online(request.online)?;
    Ok(Json(OnlineResponse {
        online: request.online,
        changed,
    }))
}

/// Handler for GET /settings/:key
async fn get_setting(State(app): State<AppManager>, Path(key): Path<String>) -> Json<ValueBody> {
    Json(ValueBody {
        value: app.setting_delegate(&key).get(),
    })
}

/// Handler for PUT /settings/:key
async fn set_setting(
    State(app): State<AppManager>,
    Path(key): Path<String>,
    Json(body): Json<ValueBody>,
) -> Json<ValueBody> {
    let delegate = app.setting_delegate(&key);
    delegate.set(body.value);
    Json(ValueBody {
        value: delegate.get(),
    })
}

/// Create the editor router with all endpoints
pub fn create_router(app: AppManager) -> Router {
    let online_path = format!("/settings/{}", settings::ONLINE);

    Router::new()
        .route("/health", get(health_check))
        .route("/nodes", get(list_nodes).post(create_node))
        .route(
            "/nodes/:id",
            get(get_node).patch(modify_node).delete(delete_node),
        )
        .route("/nodes/:id/sync", put(set_node_sync))
        .route(
            "/nodes/:id/attributes/:key",
            get(get_attribute).put(set_attribute),
        )
        .route("/nodes/:id/variables", post(create_variable))
        .route("/variables/:id", put(set_variable_value))
        .route(
            "/links",
            get(list_links).post(add_link).delete(remove_link),
        )
        .route("/names/check", get(check_name))
        .route(&online_path, get(get_online).put(set_online))
        .route("/settings/:key", get(get_setting).put(set_setting))
        .route("/ws", get(websocket::websocket_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app)
}
