//! Storage for `alerts` and its `alerts/status` subresource.
//!
//! Both storage objects share one [`StateStore`]. The primary storage owns
//! metadata and spec; status is only written through the status storage.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use pager_core::apis::pager::{self, ALERTS, Alert};
use pager_core::meta::ListOptions;
use pager_core::{GroupVersionKind, Object, Scheme};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{StateError, StateResult};
use crate::options::RestOptionsGetter;
use crate::rest::{Creater, Deleter, Getter, Lister, ObjectList, Storage, Updater};
use crate::store::StateStore;

/// Build the storage objects for alerts from the configured options.
///
/// Returns the primary storage and the status storage, sharing one store.
pub fn new_rest(
    scheme: Arc<Scheme>,
    options: &dyn RestOptionsGetter,
) -> StateResult<(Arc<AlertStorage>, Arc<AlertStatusStorage>)> {
    let gvk = scheme.gvk_for::<Alert>()?;
    let rest_options = options.get_rest_options(&pager::resource(ALERTS))?;
    let store = rest_options.open_store()?;
    let inner = Arc::new(AlertStore {
        store,
        prefix: rest_options.resource_prefix,
        scheme,
        gvk,
    });
    info!(prefix = %inner.prefix, "alert storage created");

    Ok((
        Arc::new(AlertStorage {
            inner: Arc::clone(&inner),
        }),
        Arc::new(AlertStatusStorage { inner }),
    ))
}

struct AlertStore {
    store: StateStore,
    prefix: String,
    scheme: Arc<Scheme>,
    gvk: GroupVersionKind,
}

impl AlertStore {
    /// Storage key for one alert. Both segments are validated so neither
    /// can reach outside its namespace's key range.
    fn key(&self, namespace: &str, name: &str) -> StateResult<String> {
        validate_namespace(namespace)?;
        validate_name(name)?;
        Ok(format!("{}/{namespace}/{name}", self.prefix))
    }

    fn get(&self, namespace: &str, name: &str) -> StateResult<Value> {
        self.store
            .get(&self.key(namespace, name)?)?
            .ok_or_else(|| StateError::NotFound(format!("{ALERTS} \"{namespace}/{name}\"")))
    }

    fn new_object(&self) -> Value {
        self.scheme.new_object(&self.gvk).unwrap_or(Value::Null)
    }
}

fn decode(value: Value) -> StateResult<Alert> {
    serde_json::from_value(value).map_err(|e| StateError::Deserialize(e.to_string()))
}

fn encode(alert: &Alert) -> StateResult<Value> {
    serde_json::to_value(alert).map_err(|e| StateError::Serialize(e.to_string()))
}

/// Object names follow DNS subdomain rules.
fn validate_name(name: &str) -> StateResult<()> {
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.');
    let valid_ends = name.starts_with(|c: char| c.is_ascii_alphanumeric())
        && name.ends_with(|c: char| c.is_ascii_alphanumeric());
    if name.is_empty() || name.len() > 253 || !valid_chars || !valid_ends {
        return Err(StateError::Invalid(format!("invalid name {name:?}")));
    }
    Ok(())
}

/// Namespaces follow DNS label rules.
fn validate_namespace(namespace: &str) -> StateResult<()> {
    let valid_chars = namespace
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    let valid_ends = namespace.starts_with(|c: char| c.is_ascii_alphanumeric())
        && namespace.ends_with(|c: char| c.is_ascii_alphanumeric());
    if namespace.is_empty() || namespace.len() > 63 || !valid_chars || !valid_ends {
        return Err(StateError::Invalid(format!("invalid namespace {namespace:?}")));
    }
    Ok(())
}

fn validate_alert(alert: &Alert) -> StateResult<()> {
    validate_name(&alert.metadata.name)?;
    if alert.spec.message.trim().is_empty() {
        return Err(StateError::Invalid("spec.message: required".to_string()));
    }
    Ok(())
}

/// Place `alert` in `namespace`, rejecting a body that names another one.
fn bind_namespace(alert: &mut Alert, namespace: &str) -> StateResult<()> {
    validate_namespace(namespace)?;
    if !alert.metadata.namespace.is_empty() && alert.metadata.namespace != namespace {
        return Err(StateError::Invalid(format!(
            "namespace {:?} does not match request namespace {namespace:?}",
            alert.metadata.namespace
        )));
    }
    alert.metadata.namespace = namespace.to_string();
    Ok(())
}

/// Bind `alert` to the name in the request path.
fn bind_name(alert: &mut Alert, name: &str) -> StateResult<()> {
    if alert.metadata.name.is_empty() {
        alert.metadata.name = name.to_string();
    } else if alert.metadata.name != name {
        return Err(StateError::Invalid(format!(
            "name {:?} does not match request name {name:?}",
            alert.metadata.name
        )));
    }
    Ok(())
}

fn check_precondition(key: &str, incoming: &Alert, stored: &Alert) -> StateResult<()> {
    let expected = &incoming.metadata.resource_version;
    if !expected.is_empty() && expected != &stored.metadata.resource_version {
        return Err(StateError::Conflict {
            key: key.to_string(),
            expected: expected.clone(),
            actual: stored.metadata.resource_version.clone(),
        });
    }
    Ok(())
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

// ── Primary storage ────────────────────────────────────────────────

/// Storage for the `alerts` resource.
pub struct AlertStorage {
    inner: Arc<AlertStore>,
}

impl AlertStorage {
    pub fn store(&self) -> &StateStore {
        &self.inner.store
    }
}

impl Storage for AlertStorage {
    fn kind(&self) -> &'static str {
        Alert::KIND
    }

    fn new_object(&self) -> Value {
        self.inner.new_object()
    }

    fn as_getter(&self) -> Option<&dyn Getter> {
        Some(self)
    }

    fn as_lister(&self) -> Option<&dyn Lister> {
        Some(self)
    }

    fn as_creater(&self) -> Option<&dyn Creater> {
        Some(self)
    }

    fn as_updater(&self) -> Option<&dyn Updater> {
        Some(self)
    }

    fn as_deleter(&self) -> Option<&dyn Deleter> {
        Some(self)
    }
}

impl Getter for AlertStorage {
    fn get(&self, namespace: &str, name: &str) -> StateResult<Value> {
        self.inner.get(namespace, name)
    }
}

impl Lister for AlertStorage {
    fn list(&self, namespace: Option<&str>, options: &ListOptions) -> StateResult<ObjectList> {
        let prefix = match namespace {
            Some(ns) => {
                validate_namespace(ns)?;
                format!("{}/{ns}/", self.inner.prefix)
            }
            None => format!("{}/", self.inner.prefix),
        };
        let (labels, fields) = options.selectors()?;
        let limit = options.limit.filter(|l| *l > 0).map(|l| l as usize);
        let resource_version = self.inner.store.current_resource_version()?.to_string();

        // Keys sort by namespace then name, so the continue token is the
        // `namespace/name` of the last item returned.
        let mut items = Vec::new();
        let mut last = String::new();
        let mut continue_token = String::new();
        for value in self.inner.store.list(&prefix)? {
            let alert = decode(value.clone())?;
            let meta = &alert.metadata;
            let position = format!("{}/{}", meta.namespace, meta.name);
            if !options.continue_token.is_empty() && position <= options.continue_token {
                continue;
            }
            if !labels.matches(&meta.labels) || !fields.matches(&meta.name, &meta.namespace) {
                continue;
            }
            if limit.is_some_and(|l| items.len() == l) {
                continue_token = std::mem::take(&mut last);
                break;
            }
            items.push(value);
            last = position;
        }
        debug!(count = items.len(), more = !continue_token.is_empty(), "alerts listed");
        Ok(ObjectList {
            items,
            resource_version,
            continue_token,
        })
    }
}

impl Creater for AlertStorage {
    fn create(&self, namespace: &str, object: Value) -> StateResult<Value> {
        let mut alert = decode(object)?;
        bind_namespace(&mut alert, namespace)?;
        validate_alert(&alert)?;

        // Status is never set on create.
        alert.status = Default::default();
        alert.metadata.resource_version.clear();
        alert.metadata.creation_timestamp = Some(now_secs());

        let key = self.inner.key(namespace, &alert.metadata.name)?;
        let stored = self.inner.store.create(&key, encode(&alert)?)?;
        debug!(%key, "alert created");
        Ok(stored)
    }
}

impl Updater for AlertStorage {
    fn update(&self, namespace: &str, name: &str, object: Value) -> StateResult<Value> {
        let mut incoming = decode(object)?;
        bind_namespace(&mut incoming, namespace)?;
        bind_name(&mut incoming, name)?;
        validate_alert(&incoming)?;

        let key = self.inner.key(namespace, name)?;
        self.inner.store.guaranteed_update(&key, |existing| {
            let stored = decode(existing)?;
            check_precondition(&key, &incoming, &stored)?;
            let mut updated = incoming;
            updated.status = stored.status;
            updated.metadata.creation_timestamp = stored.metadata.creation_timestamp;
            updated.metadata.uid = stored.metadata.uid;
            encode(&updated)
        })
    }
}

impl Deleter for AlertStorage {
    fn delete(&self, namespace: &str, name: &str) -> StateResult<Value> {
        self.inner
            .store
            .delete(&self.inner.key(namespace, name)?)?
            .ok_or_else(|| StateError::NotFound(format!("{ALERTS} \"{namespace}/{name}\"")))
    }
}

// ── Status storage ─────────────────────────────────────────────────

/// Storage for `alerts/status`: reads the whole alert, writes only status.
pub struct AlertStatusStorage {
    inner: Arc<AlertStore>,
}

impl AlertStatusStorage {
    pub fn store(&self) -> &StateStore {
        &self.inner.store
    }
}

impl Storage for AlertStatusStorage {
    fn kind(&self) -> &'static str {
        Alert::KIND
    }

    fn new_object(&self) -> Value {
        self.inner.new_object()
    }

    fn as_getter(&self) -> Option<&dyn Getter> {
        Some(self)
    }

    fn as_updater(&self) -> Option<&dyn Updater> {
        Some(self)
    }
}

impl Getter for AlertStatusStorage {
    fn get(&self, namespace: &str, name: &str) -> StateResult<Value> {
        self.inner.get(namespace, name)
    }
}

impl Updater for AlertStatusStorage {
    fn update(&self, namespace: &str, name: &str, object: Value) -> StateResult<Value> {
        let mut incoming = decode(object)?;
        bind_namespace(&mut incoming, namespace)?;
        bind_name(&mut incoming, name)?;

        let key = self.inner.key(namespace, name)?;
        self.inner.store.guaranteed_update(&key, |existing| {
            let mut stored = decode(existing)?;
            check_precondition(&key, &incoming, &stored)?;
            stored.status = incoming.status;
            encode(&stored)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{RestOptions, StorageFactory};
    use crate::rest::verbs;
    use pager_core::apis::install_all;
    use pager_core::{ApiRegistrationManager, GroupFactoryRegistry, GroupResource};
    use serde_json::json;

    fn scheme() -> Arc<Scheme> {
        let mut scheme = Scheme::new();
        install_all(
            &mut GroupFactoryRegistry::new(),
            &mut ApiRegistrationManager::new("").unwrap(),
            &mut scheme,
        )
        .unwrap();
        Arc::new(scheme)
    }

    fn storages() -> (Arc<AlertStorage>, Arc<AlertStatusStorage>) {
        new_rest(scheme(), &StorageFactory::in_memory()).unwrap()
    }

    fn alert(name: &str, message: &str) -> Value {
        json!({"metadata": {"name": name}, "spec": {"message": message}})
    }

    #[test]
    fn primary_and_status_share_store() {
        let (alerts, status) = storages();
        assert!(alerts.store().same_store(status.store()));
    }

    #[test]
    fn verbs_differ_between_primary_and_status() {
        let (alerts, status) = storages();
        assert_eq!(verbs(alerts.as_ref()), ["create", "delete", "get", "list", "update"]);
        assert_eq!(verbs(status.as_ref()), ["get", "update"]);
    }

    #[test]
    fn create_clears_status_and_sets_namespace() {
        let (alerts, _) = storages();
        let mut body = alert("disk", "disk full");
        body["status"] = json!({"sent": true});

        let stored = alerts.create("default", body).unwrap();
        let stored = decode(stored).unwrap();
        assert!(!stored.status.sent);
        assert_eq!(stored.metadata.namespace, "default");
        assert_eq!(stored.metadata.resource_version, "1");
        assert!(stored.metadata.creation_timestamp.is_some());
    }

    #[test]
    fn create_validates() {
        let (alerts, _) = storages();
        assert!(matches!(
            alerts.create("default", alert("Bad_Name", "m")),
            Err(StateError::Invalid(_))
        ));
        assert!(matches!(
            alerts.create("default", alert("ok", "  ")),
            Err(StateError::Invalid(_))
        ));
        let mut other_ns = alert("ok", "m");
        other_ns["metadata"]["namespace"] = json!("ops");
        assert!(matches!(
            alerts.create("default", other_ns),
            Err(StateError::Invalid(_))
        ));
    }

    #[test]
    fn create_duplicate_fails() {
        let (alerts, _) = storages();
        alerts.create("default", alert("a", "m")).unwrap();
        assert!(matches!(
            alerts.create("default", alert("a", "m")),
            Err(StateError::AlreadyExists(_))
        ));
    }

    #[test]
    fn update_preserves_status() {
        let (alerts, status) = storages();
        alerts.create("default", alert("a", "first")).unwrap();

        let mut sent = alert("a", "ignored");
        sent["status"] = json!({"sent": true});
        status.update("default", "a", sent).unwrap();

        let mut body = alert("a", "second");
        body["status"] = json!({"sent": false});
        let updated = decode(alerts.update("default", "a", body).unwrap()).unwrap();
        assert_eq!(updated.spec.message, "second");
        assert!(updated.status.sent);
    }

    #[test]
    fn status_update_changes_only_status() {
        let (alerts, status) = storages();
        alerts.create("default", alert("a", "original")).unwrap();

        let mut body = alert("a", "rewritten");
        body["status"] = json!({"sent": true});
        status.update("default", "a", body).unwrap();

        let stored = decode(alerts.get("default", "a").unwrap()).unwrap();
        assert_eq!(stored.spec.message, "original");
        assert!(stored.status.sent);
    }

    #[test]
    fn stale_resource_version_conflicts() {
        let (alerts, _) = storages();
        alerts.create("default", alert("a", "m")).unwrap();
        alerts.update("default", "a", alert("a", "m2")).unwrap();

        let mut stale = alert("a", "m3");
        stale["metadata"]["resourceVersion"] = json!("1");
        assert!(matches!(
            alerts.update("default", "a", stale),
            Err(StateError::Conflict { .. })
        ));
    }

    #[test]
    fn update_name_mismatch_rejected() {
        let (alerts, _) = storages();
        alerts.create("default", alert("a", "m")).unwrap();
        assert!(matches!(
            alerts.update("default", "a", alert("b", "m")),
            Err(StateError::Invalid(_))
        ));
    }

    #[test]
    fn list_by_namespace_and_labels() {
        let (alerts, _) = storages();
        let mut labelled = alert("a", "m");
        labelled["metadata"]["labels"] = json!({"team": "ops"});
        alerts.create("default", labelled).unwrap();
        alerts.create("default", alert("b", "m")).unwrap();
        alerts.create("ops", alert("c", "m")).unwrap();

        let all = alerts.list(None, &ListOptions::default()).unwrap();
        assert_eq!(all.items.len(), 3);
        assert_eq!(all.resource_version, "3");

        let ns = alerts.list(Some("default"), &ListOptions::default()).unwrap();
        assert_eq!(ns.items.len(), 2);

        let selected = alerts
            .list(
                Some("default"),
                &ListOptions {
                    label_selector: "team=ops".to_string(),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(selected.items.len(), 1);

        let limited = alerts
            .list(
                None,
                &ListOptions {
                    limit: Some(1),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(limited.items.len(), 1);
        assert_eq!(limited.continue_token, "default/a");
    }

    #[test]
    fn limit_pages_with_continue_token() {
        let (alerts, _) = storages();
        for (ns, name) in [("default", "a"), ("default", "b"), ("ops", "a")] {
            alerts.create(ns, alert(name, "m")).unwrap();
        }

        let mut names = Vec::new();
        let mut options = ListOptions {
            limit: Some(2),
            ..Default::default()
        };
        loop {
            let page = alerts.list(None, &options).unwrap();
            for item in &page.items {
                let alert = decode(item.clone()).unwrap();
                names.push(format!("{}/{}", alert.metadata.namespace, alert.metadata.name));
            }
            if page.continue_token.is_empty() {
                break;
            }
            options.continue_token = page.continue_token;
        }
        assert_eq!(names, ["default/a", "default/b", "ops/a"]);

        // A limit covering every item leaves no token.
        let all = alerts
            .list(
                None,
                &ListOptions {
                    limit: Some(3),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(all.items.len(), 3);
        assert!(all.continue_token.is_empty());
    }

    #[test]
    fn list_by_field_selector() {
        let (alerts, _) = storages();
        alerts.create("default", alert("disk", "m")).unwrap();
        alerts.create("ops", alert("disk", "m")).unwrap();
        alerts.create("ops", alert("cpu", "m")).unwrap();

        let by_name = ListOptions {
            field_selector: "metadata.name=disk".to_string(),
            ..Default::default()
        };
        assert_eq!(alerts.list(None, &by_name).unwrap().items.len(), 2);

        let by_both = ListOptions {
            field_selector: "metadata.name=disk,metadata.namespace!=default".to_string(),
            ..Default::default()
        };
        let listed = alerts.list(None, &by_both).unwrap();
        assert_eq!(listed.items.len(), 1);
        assert_eq!(listed.items[0]["metadata"]["namespace"], "ops");

        let unknown = ListOptions {
            field_selector: "spec.message=m".to_string(),
            ..Default::default()
        };
        assert!(matches!(alerts.list(None, &unknown), Err(StateError::Selector(_))));
    }

    #[test]
    fn path_segments_cannot_escape_namespace() {
        let (alerts, status) = storages();
        alerts.create("team", alert("visible", "m")).unwrap();

        assert!(matches!(
            alerts.create("team/secret", alert("x", "m")),
            Err(StateError::Invalid(_))
        ));
        for (ns, name) in [("team", "secret/x"), ("team/secret", "x"), ("Team", "visible")] {
            assert!(matches!(alerts.get(ns, name), Err(StateError::Invalid(_))), "{ns} {name}");
            assert!(matches!(alerts.delete(ns, name), Err(StateError::Invalid(_))));
            assert!(matches!(
                status.update(ns, name, alert("x", "m")),
                Err(StateError::Invalid(_))
            ));
        }
        assert!(matches!(
            alerts.list(Some("team/"), &ListOptions::default()),
            Err(StateError::Invalid(_))
        ));

        let listed = alerts.list(Some("team"), &ListOptions::default()).unwrap();
        assert_eq!(listed.items.len(), 1);
    }

    #[test]
    fn delete_then_get_not_found() {
        let (alerts, _) = storages();
        alerts.create("default", alert("a", "m")).unwrap();
        alerts.delete("default", "a").unwrap();
        assert!(matches!(alerts.get("default", "a"), Err(StateError::NotFound(_))));
        assert!(matches!(alerts.delete("default", "a"), Err(StateError::NotFound(_))));
    }

    struct FailingOptions;

    impl RestOptionsGetter for FailingOptions {
        fn get_rest_options(&self, resource: &GroupResource) -> StateResult<RestOptions> {
            Err(StateError::Options(format!("no backend for {resource}")))
        }
    }

    #[test]
    fn failing_options_fail_construction() {
        let err = new_rest(scheme(), &FailingOptions).err().unwrap();
        assert!(matches!(err, StateError::Options(_)));
    }

    #[test]
    fn unregistered_scheme_fails_construction() {
        let err = new_rest(Arc::new(Scheme::new()), &StorageFactory::in_memory())
            .err()
            .unwrap();
        assert!(matches!(err, StateError::Scheme(_)));
    }
}
