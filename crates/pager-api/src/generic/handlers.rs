//! HTTP handlers for discovery and resource requests.
//!
//! Each resource handler resolves `(group, version, resource)` against the
//! installed tables, decodes the body with that version's codec, calls the
//! storage object, and encodes the result back into the request's version.
//! Failures are rendered as `Status` objects.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, Query, Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use pager_core::codec::JSON_MEDIA_TYPE;
use pager_core::meta::{
    ApiGroup, ApiGroupList, ApiResource, ApiResourceList, GroupVersionForDiscovery, ListMeta,
    META_VERSION, Status, TypeMeta,
};
use pager_core::{CodecError, GroupVersion, Object, ParameterCodec, VersionedCodec};
use pager_state::{StateError, Storage, rest};
use serde_json::Value;
use tracing::{debug, warn};

use crate::generic::server::{InstalledGroup, ServingInfo};

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub serving: Arc<ServingInfo>,
    pub groups: Arc<BTreeMap<String, InstalledGroup>>,
    pub paths: Arc<Vec<String>>,
}

/// Build the router for `state`, handing unmatched requests to `delegate`.
pub fn build_router(state: ApiState, delegate: Option<Router>) -> Router {
    let prefix = state.serving.api_group_prefix.clone();
    let timeout = state.serving.request_timeout;
    let body_limit = state.serving.max_request_body_bytes;
    let namespaced = format!("{prefix}/{{group}}/{{version}}/namespaces/{{namespace}}/{{resource}}");

    let router = Router::new()
        .route("/", get(root_paths))
        .route("/healthz", get(healthz))
        .route("/version", get(version))
        .route(&prefix, get(list_groups))
        .route(&format!("{prefix}/{{group}}"), get(get_group))
        .route(&format!("{prefix}/{{group}}/{{version}}"), get(list_resources))
        .route(
            &format!("{prefix}/{{group}}/{{version}}/{{resource}}"),
            get(list_all_namespaces),
        )
        .route(&namespaced, get(list_objects).post(create_object))
        .route(
            &format!("{namespaced}/{{name}}"),
            get(get_object).put(update_object).delete(delete_object),
        )
        .route(
            &format!("{namespaced}/{{name}}/{{subresource}}"),
            get(get_subresource).put(update_subresource),
        )
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(move |req: Request, next: Next| {
            with_timeout(timeout, req, next)
        }));

    match delegate {
        Some(delegate) => router.fallback_service(delegate),
        None => router.fallback(not_found),
    }
}

async fn with_timeout(timeout: Duration, req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    match tokio::time::timeout(timeout, next.run(req)).await {
        Ok(resp) => resp,
        Err(_) => {
            warn!(%path, ?timeout, "request timed out");
            ApiError::new(StatusCode::GATEWAY_TIMEOUT, "Timeout", "request timed out").into_response()
        }
    }
}

// ── Errors ─────────────────────────────────────────────────────────

/// A failed request, rendered as a `Status` body.
#[derive(Debug)]
pub struct ApiError {
    code: StatusCode,
    status: Status,
}

impl ApiError {
    pub fn new(code: StatusCode, reason: &str, message: impl Into<String>) -> Self {
        Self {
            code,
            status: Status::failure(code.as_u16(), reason, message),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NotFound", message)
    }

    fn method_not_allowed(verb: &str, resource: &str) -> Self {
        Self::new(
            StatusCode::METHOD_NOT_ALLOWED,
            "MethodNotAllowed",
            format!("{verb} is not supported on {resource}"),
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.code, Json(self.status)).into_response()
    }
}

impl From<StateError> for ApiError {
    fn from(err: StateError) -> Self {
        let (code, reason) = match &err {
            StateError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound"),
            StateError::AlreadyExists(_) => (StatusCode::CONFLICT, "AlreadyExists"),
            StateError::Conflict { .. } => (StatusCode::CONFLICT, "Conflict"),
            StateError::Invalid(_) => (StatusCode::UNPROCESSABLE_ENTITY, "Invalid"),
            StateError::Selector(_) => (StatusCode::BAD_REQUEST, "BadRequest"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "InternalError"),
        };
        if code.is_server_error() {
            warn!(error = %err, "storage error");
        }
        Self::new(code, reason, err.to_string())
    }
}

impl From<CodecError> for ApiError {
    fn from(err: CodecError) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BadRequest", err.to_string())
    }
}

type ApiResult = Result<Response, ApiError>;

fn json_response(code: StatusCode, body: Vec<u8>) -> Response {
    (code, [(header::CONTENT_TYPE, JSON_MEDIA_TYPE)], body).into_response()
}

fn meta_type(kind: &str) -> TypeMeta {
    TypeMeta {
        api_version: META_VERSION.to_string(),
        kind: kind.to_string(),
    }
}

// ── Resolution ─────────────────────────────────────────────────────

struct Target {
    resource: String,
    storage: Arc<dyn Storage>,
    codec: VersionedCodec,
    parameter_codec: ParameterCodec,
}

impl Target {
    fn respond(&self, code: StatusCode, object: Value) -> ApiResult {
        let body = self.codec.encode(object, self.storage.kind())?;
        Ok(json_response(code, body))
    }

    /// Decode a request body and check it is the kind this resource serves.
    fn decode(&self, body: &[u8]) -> Result<Value, ApiError> {
        let decoded = self.codec.decode(body)?;
        if decoded.gvk.kind != self.storage.kind() {
            return Err(ApiError::new(
                StatusCode::BAD_REQUEST,
                "BadRequest",
                format!(
                    "{} expects kind {}, got {}",
                    self.resource,
                    self.storage.kind(),
                    decoded.gvk.kind
                ),
            ));
        }
        Ok(decoded.object)
    }
}

fn resolve(state: &ApiState, group: &str, version: &str, resource: &str) -> Result<Target, ApiError> {
    let installed = state
        .groups
        .get(group)
        .ok_or_else(|| ApiError::not_found(format!("group {group} is not served")))?;
    let storage = installed
        .versions
        .get(version)
        .ok_or_else(|| ApiError::not_found(format!("version {group}/{version} is not served")))?
        .get(resource)
        .cloned()
        .ok_or_else(|| {
            ApiError::not_found(format!("resource {resource} is not served in {group}/{version}"))
        })?;
    debug!(%group, %version, %resource, "request resolved");
    Ok(Target {
        resource: resource.to_string(),
        storage,
        codec: installed
            .codecs
            .codec_for_version(&GroupVersion::new(group, version)),
        parameter_codec: installed.parameter_codec,
    })
}

// ── Discovery ──────────────────────────────────────────────────────

/// GET /
pub async fn root_paths(State(state): State<ApiState>) -> impl IntoResponse {
    Json(serde_json::json!({ "paths": state.paths.as_slice() }))
}

/// GET /healthz
pub async fn healthz() -> &'static str {
    "ok"
}

/// GET /version
pub async fn version(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.serving.version.clone().unwrap_or_default())
}

fn api_group(name: &str, installed: &InstalledGroup) -> ApiGroup {
    ApiGroup {
        type_meta: meta_type(ApiGroup::KIND),
        name: name.to_string(),
        versions: installed
            .served_versions()
            .iter()
            .map(GroupVersionForDiscovery::from)
            .collect(),
        preferred_version: Some(GroupVersionForDiscovery::from(&installed.meta.group_version)),
    }
}

/// GET /apis
pub async fn list_groups(State(state): State<ApiState>) -> impl IntoResponse {
    Json(ApiGroupList {
        type_meta: meta_type(ApiGroupList::KIND),
        groups: state
            .groups
            .iter()
            .map(|(name, installed)| api_group(name, installed))
            .collect(),
    })
}

/// GET /apis/{group}
pub async fn get_group(State(state): State<ApiState>, Path(group): Path<String>) -> ApiResult {
    let installed = state
        .groups
        .get(&group)
        .ok_or_else(|| ApiError::not_found(format!("group {group} is not served")))?;
    Ok(Json(api_group(&group, installed)).into_response())
}

/// GET /apis/{group}/{version}
pub async fn list_resources(
    State(state): State<ApiState>,
    Path((group, version)): Path<(String, String)>,
) -> ApiResult {
    let table = state
        .groups
        .get(&group)
        .and_then(|installed| installed.versions.get(&version))
        .ok_or_else(|| ApiError::not_found(format!("version {group}/{version} is not served")))?;
    let resources = table
        .iter()
        .map(|(name, storage)| ApiResource {
            name: name.clone(),
            namespaced: storage.namespaced(),
            kind: storage.kind().to_string(),
            verbs: rest::verbs(storage.as_ref()),
        })
        .collect();
    Ok(Json(ApiResourceList {
        type_meta: meta_type(ApiResourceList::KIND),
        group_version: GroupVersion::new(group, version).to_string(),
        resources,
    })
    .into_response())
}

// ── Resources ──────────────────────────────────────────────────────

fn list(
    state: &ApiState,
    (group, version, resource): (&str, &str, &str),
    namespace: Option<&str>,
    query: &HashMap<String, String>,
) -> ApiResult {
    let target = resolve(state, group, version, resource)?;
    let lister = target
        .storage
        .as_lister()
        .ok_or_else(|| ApiError::method_not_allowed("list", resource))?;
    let options = target.parameter_codec.decode_list_options(query)?;
    let list = lister.list(namespace, &options)?;
    let meta = ListMeta {
        resource_version: list.resource_version,
        continue_token: list.continue_token,
    };
    let body = target
        .codec
        .encode_list(list.items, target.storage.kind(), meta)?;
    Ok(json_response(StatusCode::OK, body))
}

/// GET /apis/{group}/{version}/{resource}
pub async fn list_all_namespaces(
    State(state): State<ApiState>,
    Path((group, version, resource)): Path<(String, String, String)>,
    Query(query): Query<HashMap<String, String>>,
) -> ApiResult {
    list(&state, (&group, &version, &resource), None, &query)
}

/// GET /apis/{group}/{version}/namespaces/{namespace}/{resource}
pub async fn list_objects(
    State(state): State<ApiState>,
    Path((group, version, namespace, resource)): Path<(String, String, String, String)>,
    Query(query): Query<HashMap<String, String>>,
) -> ApiResult {
    list(&state, (&group, &version, &resource), Some(&namespace), &query)
}

/// POST /apis/{group}/{version}/namespaces/{namespace}/{resource}
pub async fn create_object(
    State(state): State<ApiState>,
    Path((group, version, namespace, resource)): Path<(String, String, String, String)>,
    body: Bytes,
) -> ApiResult {
    let target = resolve(&state, &group, &version, &resource)?;
    let creater = target
        .storage
        .as_creater()
        .ok_or_else(|| ApiError::method_not_allowed("create", &resource))?;
    let object = target.decode(&body)?;
    let created = creater.create(&namespace, object)?;
    target.respond(StatusCode::CREATED, created)
}

fn get_from(target: &Target, namespace: &str, name: &str) -> ApiResult {
    let getter = target
        .storage
        .as_getter()
        .ok_or_else(|| ApiError::method_not_allowed("get", &target.resource))?;
    let object = getter.get(namespace, name)?;
    target.respond(StatusCode::OK, object)
}

fn update_in(target: &Target, namespace: &str, name: &str, body: &[u8]) -> ApiResult {
    let updater = target
        .storage
        .as_updater()
        .ok_or_else(|| ApiError::method_not_allowed("update", &target.resource))?;
    let object = target.decode(body)?;
    let updated = updater.update(namespace, name, object)?;
    target.respond(StatusCode::OK, updated)
}

/// GET /apis/{group}/{version}/namespaces/{namespace}/{resource}/{name}
pub async fn get_object(
    State(state): State<ApiState>,
    Path((group, version, namespace, resource, name)): Path<(String, String, String, String, String)>,
) -> ApiResult {
    let target = resolve(&state, &group, &version, &resource)?;
    get_from(&target, &namespace, &name)
}

/// PUT /apis/{group}/{version}/namespaces/{namespace}/{resource}/{name}
pub async fn update_object(
    State(state): State<ApiState>,
    Path((group, version, namespace, resource, name)): Path<(String, String, String, String, String)>,
    body: Bytes,
) -> ApiResult {
    let target = resolve(&state, &group, &version, &resource)?;
    update_in(&target, &namespace, &name, &body)
}

/// DELETE /apis/{group}/{version}/namespaces/{namespace}/{resource}/{name}
pub async fn delete_object(
    State(state): State<ApiState>,
    Path((group, version, namespace, resource, name)): Path<(String, String, String, String, String)>,
) -> ApiResult {
    let target = resolve(&state, &group, &version, &resource)?;
    let deleter = target
        .storage
        .as_deleter()
        .ok_or_else(|| ApiError::method_not_allowed("delete", &resource))?;
    let deleted = deleter.delete(&namespace, &name)?;
    target.respond(StatusCode::OK, deleted)
}

/// GET /apis/{group}/{version}/namespaces/{namespace}/{resource}/{name}/{subresource}
pub async fn get_subresource(
    State(state): State<ApiState>,
    Path((group, version, namespace, resource, name, subresource)): Path<(
        String,
        String,
        String,
        String,
        String,
        String,
    )>,
) -> ApiResult {
    let target = resolve(&state, &group, &version, &format!("{resource}/{subresource}"))?;
    get_from(&target, &namespace, &name)
}

/// PUT /apis/{group}/{version}/namespaces/{namespace}/{resource}/{name}/{subresource}
pub async fn update_subresource(
    State(state): State<ApiState>,
    Path((group, version, namespace, resource, name, subresource)): Path<(
        String,
        String,
        String,
        String,
        String,
        String,
    )>,
    body: Bytes,
) -> ApiResult {
    let target = resolve(&state, &group, &version, &format!("{resource}/{subresource}"))?;
    update_in(&target, &namespace, &name, &body)
}

/// Fallback for unmatched paths.
pub async fn not_found() -> ApiError {
    ApiError::not_found("the server could not find the requested resource")
}
