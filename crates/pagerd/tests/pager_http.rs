//! HTTP tests against an assembled pager server.
//!
//! Every test builds the full stack (registry, completed config, server)
//! and drives its router in-process.

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use pager_api::{ApiRegistry, Config, PagerServerError, RecommendedConfig};
use pager_core::GroupResource;
use pager_state::{
    RestOptions, RestOptionsGetter, StateError, StateResult, StorageBackend, StorageFactory,
};
use serde_json::{Value, json};
use tower::ServiceExt;

const ALPHA: &str = "/apis/pager.k8s.co/v1alpha1/namespaces/default/alerts";
const BETA: &str = "/apis/pager.k8s.co/v1beta1/namespaces/default/alerts";

fn router_with(enabled_versions: &str, factory: StorageFactory) -> Router {
    let registry = ApiRegistry::initialize(enabled_versions).unwrap();
    let generic = RecommendedConfig {
        bind_address: "127.0.0.1:0".to_string(),
        ..RecommendedConfig::new(Arc::new(factory))
    };
    Config::new(&registry, generic)
        .complete()
        .unwrap()
        .new()
        .unwrap()
        .router()
}

fn router() -> Router {
    router_with("", StorageFactory::in_memory())
}

async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let body = match body {
        Some(value) => Body::from(serde_json::to_vec(&value).unwrap()),
        None => Body::empty(),
    };
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body)
        .unwrap();
    let resp = router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| json!(String::from_utf8_lossy(&bytes)))
    };
    (status, value)
}

fn alpha_alert(name: &str, message: &str) -> Value {
    json!({
        "apiVersion": "pager.k8s.co/v1alpha1",
        "kind": "Alert",
        "metadata": { "name": name },
        "spec": { "message": message }
    })
}

fn beta_alert(name: &str, message: &str, severity: &str) -> Value {
    json!({
        "apiVersion": "pager.k8s.co/v1beta1",
        "kind": "Alert",
        "metadata": { "name": name },
        "spec": { "message": message, "severity": severity }
    })
}

// ── Discovery ──────────────────────────────────────────────────────

#[tokio::test]
async fn healthz_and_version() {
    let router = router();

    let (status, body) = send(&router, "GET", "/healthz", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("ok"));

    let (status, body) = send(&router, "GET", "/version", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["major"], "1");
    assert_eq!(body["minor"], "0");
}

#[tokio::test]
async fn root_lists_served_paths() {
    let (status, body) = send(&router(), "GET", "/", None).await;
    assert_eq!(status, StatusCode::OK);
    let paths: Vec<&str> = body["paths"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert!(paths.contains(&"/apis/pager.k8s.co/v1alpha1"));
    assert!(paths.contains(&"/apis/pager.k8s.co/v1beta1"));
}

#[tokio::test]
async fn group_discovery_prefers_v1alpha1() {
    let router = router();

    let (status, body) = send(&router, "GET", "/apis", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["kind"], "APIGroupList");
    let group = &body["groups"][0];
    assert_eq!(group["name"], "pager.k8s.co");
    assert_eq!(group["preferredVersion"]["version"], "v1alpha1");
    assert_eq!(group["versions"].as_array().unwrap().len(), 2);

    let (status, body) = send(&router, "GET", "/apis/pager.k8s.co", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["kind"], "APIGroup");
    assert_eq!(body["versions"][0]["groupVersion"], "pager.k8s.co/v1alpha1");
}

#[tokio::test]
async fn resource_discovery_lists_alerts_and_status() {
    let (status, body) = send(&router(), "GET", "/apis/pager.k8s.co/v1beta1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["kind"], "APIResourceList");
    assert_eq!(body["groupVersion"], "pager.k8s.co/v1beta1");

    let resources = body["resources"].as_array().unwrap();
    assert_eq!(resources.len(), 2);
    assert_eq!(resources[0]["name"], "alerts");
    assert_eq!(resources[0]["kind"], "Alert");
    assert_eq!(resources[0]["namespaced"], true);
    assert_eq!(
        resources[0]["verbs"],
        json!(["create", "delete", "get", "list", "update"])
    );
    assert_eq!(resources[1]["name"], "alerts/status");
    assert_eq!(resources[1]["verbs"], json!(["get", "update"]));
}

#[tokio::test]
async fn unknown_paths_return_status() {
    let router = router();

    let (status, body) = send(&router, "GET", "/apis/pager.k8s.co/v2", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "Status");
    assert_eq!(body["reason"], "NotFound");

    let (status, body) = send(&router, "GET", "/nowhere", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 404);
}

// ── Resources across versions ──────────────────────────────────────

#[tokio::test]
async fn create_through_alpha_read_through_beta() {
    let router = router();

    let (status, created) = send(&router, "POST", ALPHA, Some(alpha_alert("disk", "disk full"))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["apiVersion"], "pager.k8s.co/v1alpha1");
    assert_eq!(created["metadata"]["namespace"], "default");
    assert_eq!(created["metadata"]["resourceVersion"], "1");

    let (status, fetched) = send(&router, "GET", &format!("{BETA}/disk"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["apiVersion"], "pager.k8s.co/v1beta1");
    assert_eq!(fetched["kind"], "Alert");
    assert_eq!(fetched["spec"]["message"], "disk full");
    assert_eq!(fetched["metadata"]["resourceVersion"], "1");
}

#[tokio::test]
async fn beta_severity_survives_alpha_round_trip() {
    let router = router();

    let (status, created) = send(&router, "POST", BETA, Some(beta_alert("cpu", "cpu hot", "critical"))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["spec"]["severity"], "critical");

    let (status, alpha) = send(&router, "GET", &format!("{ALPHA}/cpu"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(alpha["spec"].get("severity").is_none());
    assert_eq!(
        alpha["metadata"]["annotations"]["pager.k8s.co/severity"],
        "critical"
    );

    // Writing the alpha form back keeps severity.
    let mut update = alpha.clone();
    update["spec"]["message"] = json!("cpu very hot");
    let (status, _) = send(&router, "PUT", &format!("{ALPHA}/cpu"), Some(update)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, beta) = send(&router, "GET", &format!("{BETA}/cpu"), None).await;
    assert_eq!(beta["spec"]["message"], "cpu very hot");
    assert_eq!(beta["spec"]["severity"], "critical");
}

#[tokio::test]
async fn beta_create_defaults_severity() {
    let router = router();
    let mut alert = beta_alert("mem", "memory low", "");
    alert["spec"].as_object_mut().unwrap().remove("severity");

    let (status, created) = send(&router, "POST", BETA, Some(alert)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["spec"]["severity"], "warning");
}

#[tokio::test]
async fn list_in_each_version() {
    let router = router();
    send(&router, "POST", ALPHA, Some(alpha_alert("a", "one"))).await;
    send(&router, "POST", BETA, Some(beta_alert("b", "two", "info"))).await;
    send(
        &router,
        "POST",
        "/apis/pager.k8s.co/v1beta1/namespaces/ops/alerts",
        Some(beta_alert("c", "three", "info")),
    )
    .await;

    let (status, list) = send(&router, "GET", ALPHA, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["kind"], "AlertList");
    assert_eq!(list["apiVersion"], "pager.k8s.co/v1alpha1");
    assert_eq!(list["items"].as_array().unwrap().len(), 2);
    assert_eq!(list["metadata"]["resourceVersion"], "3");

    let (status, all) = send(&router, "GET", "/apis/pager.k8s.co/v1beta1/alerts", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all["apiVersion"], "pager.k8s.co/v1beta1");
    assert_eq!(all["items"].as_array().unwrap().len(), 3);

    let (_, limited) = send(&router, "GET", &format!("{BETA}?limit=1"), None).await;
    assert_eq!(limited["items"].as_array().unwrap().len(), 1);
    assert_eq!(limited["metadata"]["continue"], "default/a");

    let (_, rest) = send(&router, "GET", &format!("{BETA}?limit=1&continue=default%2Fa"), None).await;
    let items = rest["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["metadata"]["name"], "b");
    assert!(rest["metadata"].get("continue").is_none());
}

#[tokio::test]
async fn list_filters_by_label() {
    let router = router();
    let mut labelled = alpha_alert("labelled", "x");
    labelled["metadata"]["labels"] = json!({ "team": "storage" });
    send(&router, "POST", ALPHA, Some(labelled)).await;
    send(&router, "POST", ALPHA, Some(alpha_alert("plain", "y"))).await;

    let (status, list) = send(&router, "GET", &format!("{ALPHA}?labelSelector=team%3Dstorage"), None).await;
    assert_eq!(status, StatusCode::OK);
    let items = list["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["metadata"]["name"], "labelled");

    let (status, _) = send(&router, "GET", &format!("{ALPHA}?limit=many"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_supports_set_and_negated_label_terms() {
    let router = router();
    for (name, env) in [("prod-db", Some("prod")), ("stage-db", Some("staging")), ("bare", None)] {
        let mut body = alpha_alert(name, "m");
        if let Some(env) = env {
            body["metadata"]["labels"] = json!({ "env": env });
        }
        send(&router, "POST", ALPHA, Some(body)).await;
    }

    let names = |list: &Value| -> Vec<String> {
        list["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|i| i["metadata"]["name"].as_str().unwrap().to_string())
            .collect()
    };

    let (status, list) = send(&router, "GET", &format!("{ALPHA}?labelSelector=env%20in%20(prod%2Cstaging)"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(names(&list), ["prod-db", "stage-db"]);

    let (status, list) = send(&router, "GET", &format!("{ALPHA}?labelSelector=!env"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(names(&list), ["bare"]);

    let (status, body) = send(&router, "GET", &format!("{ALPHA}?labelSelector=env%20in%20(prod"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "BadRequest");
}

#[tokio::test]
async fn list_filters_by_field() {
    let router = router();
    send(&router, "POST", ALPHA, Some(alpha_alert("disk", "m"))).await;
    send(&router, "POST", ALPHA, Some(alpha_alert("cpu", "m"))).await;

    let (status, list) = send(&router, "GET", &format!("{BETA}?fieldSelector=metadata.name%3Dnope"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(list["items"].as_array().unwrap().is_empty());

    let (status, list) = send(&router, "GET", &format!("{BETA}?fieldSelector=metadata.name%3Ddisk"), None).await;
    assert_eq!(status, StatusCode::OK);
    let items = list["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["metadata"]["name"], "disk");

    let (status, body) = send(&router, "GET", &format!("{BETA}?fieldSelector=spec.message%3Dm"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "Status");
}

#[tokio::test]
async fn encoded_slashes_cannot_cross_namespaces() {
    let router = router();
    let team = "/apis/pager.k8s.co/v1alpha1/namespaces/team/alerts";
    let nested = "/apis/pager.k8s.co/v1alpha1/namespaces/team%2Fsecret/alerts";

    let (status, body) = send(&router, "POST", nested, Some(alpha_alert("x", "m"))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["reason"], "Invalid");

    let (status, list) = send(&router, "GET", team, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(list["items"].as_array().unwrap().is_empty());

    let (status, _) = send(&router, "GET", &format!("{nested}/x"), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let (status, _) = send(&router, "GET", &format!("{team}/secret%2Fx"), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let (status, _) = send(&router, "DELETE", &format!("{team}/secret%2Fx"), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let (status, _) = send(&router, "GET", nested, None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

// ── Status subresource ─────────────────────────────────────────────

#[tokio::test]
async fn status_is_only_written_through_subresource() {
    let router = router();
    let (_, created) = send(&router, "POST", BETA, Some(beta_alert("net", "link down", "critical"))).await;
    assert_eq!(created["status"]["sent"], false);

    let mut status_update = created.clone();
    status_update["status"]["sent"] = json!(true);
    status_update["spec"]["message"] = json!("ignored");
    let (status, updated) = send(&router, "PUT", &format!("{BETA}/net/status"), Some(status_update)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"]["sent"], true);
    assert_eq!(updated["spec"]["message"], "link down");

    // Status written through beta is visible through alpha.
    let (status, alpha_status) = send(&router, "GET", &format!("{ALPHA}/net/status"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(alpha_status["status"]["sent"], true);

    // The primary resource keeps the stored status.
    let mut spec_update = updated.clone();
    spec_update["status"]["sent"] = json!(false);
    spec_update["spec"]["message"] = json!("link flapping");
    let (status, updated) = send(&router, "PUT", &format!("{BETA}/net"), Some(spec_update)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"]["sent"], true);
    assert_eq!(updated["spec"]["message"], "link flapping");
}

#[tokio::test]
async fn status_subresource_rejects_delete() {
    let router = router();
    send(&router, "POST", ALPHA, Some(alpha_alert("x", "y"))).await;
    let (status, _) = send(&router, "DELETE", &format!("{ALPHA}/x/status"), None).await;
    assert!(status.is_client_error());
    let (status, _) = send(&router, "GET", &format!("{ALPHA}/x"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&router, "GET", &format!("{ALPHA}/x/scale"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── Errors ─────────────────────────────────────────────────────────

#[tokio::test]
async fn duplicate_create_conflicts() {
    let router = router();
    send(&router, "POST", ALPHA, Some(alpha_alert("dup", "m"))).await;
    let (status, body) = send(&router, "POST", BETA, Some(beta_alert("dup", "m", "info"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["reason"], "AlreadyExists");
}

#[tokio::test]
async fn stale_resource_version_conflicts() {
    let router = router();
    let (_, created) = send(&router, "POST", ALPHA, Some(alpha_alert("rv", "m"))).await;

    let mut first = created.clone();
    first["spec"]["message"] = json!("first");
    let (status, _) = send(&router, "PUT", &format!("{ALPHA}/rv"), Some(first)).await;
    assert_eq!(status, StatusCode::OK);

    let mut stale = created;
    stale["spec"]["message"] = json!("stale");
    let (status, body) = send(&router, "PUT", &format!("{ALPHA}/rv"), Some(stale)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["reason"], "Conflict");
}

#[tokio::test]
async fn invalid_bodies_are_rejected() {
    let router = router();

    let (status, body) = send(&router, "POST", ALPHA, Some(alpha_alert("empty", ""))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["reason"], "Invalid");

    let (status, _) = send(&router, "POST", ALPHA, Some(alpha_alert("Bad_Name", "m"))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let wrong_kind = json!({ "apiVersion": "pager.k8s.co/v1alpha1", "kind": "AlertList" });
    let (status, body) = send(&router, "POST", ALPHA, Some(wrong_kind)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "BadRequest");

    let foreign = json!({ "apiVersion": "other.io/v1", "kind": "Alert" });
    let (status, _) = send(&router, "POST", ALPHA, Some(foreign)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let req = Request::builder()
        .method("POST")
        .uri(ALPHA)
        .body(Body::from("{not json"))
        .unwrap();
    let resp = router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn delete_then_get_is_not_found() {
    let router = router();
    send(&router, "POST", ALPHA, Some(alpha_alert("gone", "m"))).await;

    let (status, deleted) = send(&router, "DELETE", &format!("{BETA}/gone"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["apiVersion"], "pager.k8s.co/v1beta1");

    let (status, body) = send(&router, "GET", &format!("{ALPHA}/gone"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "Status");
}

// ── Assembly variants ──────────────────────────────────────────────

#[tokio::test]
async fn disabled_version_is_not_routed() {
    let router = router_with("pager.k8s.co/v1beta1", StorageFactory::in_memory());

    let (status, _) = send(&router, "POST", ALPHA, Some(alpha_alert("a", "m"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&router, "GET", "/apis/pager.k8s.co", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["preferredVersion"]["version"], "v1beta1");
    assert_eq!(body["versions"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn redb_backed_objects_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let backend = StorageBackend::Redb {
        data_dir: dir.path().to_path_buf(),
    };

    {
        let router = router_with("", StorageFactory::new(backend.clone()));
        let (status, _) = send(&router, "POST", BETA, Some(beta_alert("keep", "m", "info"))).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let router = router_with("", StorageFactory::new(backend));
    let (status, body) = send(&router, "GET", &format!("{ALPHA}/keep"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["spec"]["message"], "m");
}

struct UnreachableBackend;

impl RestOptionsGetter for UnreachableBackend {
    fn get_rest_options(&self, resource: &GroupResource) -> StateResult<RestOptions> {
        Err(StateError::Options(format!("backend for {resource} unreachable")))
    }
}

#[test]
fn storage_failure_leaves_no_server() {
    let registry = ApiRegistry::initialize("").unwrap();
    let generic = RecommendedConfig {
        bind_address: "127.0.0.1:0".to_string(),
        ..RecommendedConfig::new(Arc::new(UnreachableBackend))
    };
    let result = Config::new(&registry, generic).complete().unwrap().new();
    match result {
        Err(PagerServerError::Storage(err)) => assert!(err.to_string().contains("unreachable")),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("server built on unreachable storage"),
    }
}
