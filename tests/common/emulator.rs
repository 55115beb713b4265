//! In-memory DuploCloud API backed by a shared fixture store
//!
//! Objects live at their read path. Collections live at their list path and
//! are keyed by one field of each item. POST hooks stand in for endpoints
//! whose effect lands somewhere other than the request path.

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use wiremock::matchers::any;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

type PostFn = Arc<dyn Fn(&FixtureStore, &Value) -> Value + Send + Sync>;

#[derive(Default)]
struct Inner {
    objects: BTreeMap<String, Value>,
    /// list path -> (key field, items)
    collections: BTreeMap<String, (String, Vec<Value>)>,
    hooks: BTreeMap<String, PostFn>,
    calls: Vec<(String, String)>,
}

/// Shared state of the emulated portal
#[derive(Clone, Default)]
pub struct FixtureStore {
    inner: Arc<Mutex<Inner>>,
}

impl FixtureStore {
    pub fn put(&self, path: &str, value: Value) {
        self.lock().objects.insert(path.to_string(), value);
    }

    pub fn get(&self, path: &str) -> Option<Value> {
        self.lock().objects.get(path).cloned()
    }

    pub fn remove(&self, path: &str) -> Option<Value> {
        self.lock().objects.remove(path)
    }

    /// Register a keyed collection served at `path`
    pub fn collection(&self, path: &str, key_field: &str, items: Vec<Value>) {
        self.lock()
            .collections
            .insert(path.to_string(), (key_field.to_string(), items));
    }

    pub fn items(&self, path: &str) -> Vec<Value> {
        self.lock()
            .collections
            .get(path)
            .map(|(_, items)| items.clone())
            .unwrap_or_default()
    }

    /// Insert or replace one item of a registered collection
    pub fn push_item(&self, path: &str, item: Value) {
        let mut inner = self.lock();
        if let Some((key_field, items)) = inner.collections.get_mut(path) {
            let key = item.get(key_field.as_str()).cloned();
            items.retain(|i| i.get(key_field.as_str()) != key.as_ref());
            items.push(item);
        }
    }

    /// POST to `path` runs `f(store, body)` and answers with its result
    pub fn on_post<F>(&self, path: &str, f: F)
    where
        F: Fn(&FixtureStore, &Value) -> Value + Send + Sync + 'static,
    {
        self.lock().hooks.insert(path.to_string(), Arc::new(f));
    }

    /// Requests received so far as (METHOD, decoded path)
    pub fn calls(&self) -> Vec<(String, String)> {
        self.lock().calls.clone()
    }

    pub fn count(&self, method: &str, path: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|(m, p)| m == method && p == path)
            .count()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    fn handle(&self, method: &str, path: &str, body: Option<Value>) -> ResponseTemplate {
        let hook = {
            let mut inner = self.lock();
            inner.calls.push((method.to_string(), path.to_string()));
            inner.hooks.get(path).cloned()
        };
        if let (Some(hook), "POST") = (hook, method) {
            let reply = hook(self, &body.unwrap_or(Value::Null));
            return match reply {
                Value::Null => ResponseTemplate::new(200),
                reply => ResponseTemplate::new(200).set_body_json(reply),
            };
        }

        let mut inner = self.lock();

        match method {
            "GET" => {
                if let Some(obj) = inner.objects.get(path) {
                    return ResponseTemplate::new(200).set_body_json(obj);
                }
                if let Some((_, items)) = inner.collections.get(path) {
                    return ResponseTemplate::new(200).set_body_json(items);
                }
                ResponseTemplate::new(404)
            }
            "POST" => {
                let body = body.unwrap_or(Value::Null);
                if let Some((key_field, items)) = inner.collections.get_mut(path) {
                    let key = body.get(key_field.as_str()).cloned();
                    items.retain(|i| i.get(key_field.as_str()) != key.as_ref());
                    items.push(body);
                    return ResponseTemplate::new(200);
                }
                ResponseTemplate::new(404)
            }
            "PUT" => match inner.objects.get_mut(path) {
                Some(obj) => {
                    if let (Some(existing), Some(Value::Object(update))) =
                        (obj.as_object_mut(), body)
                    {
                        existing.extend(update);
                    }
                    ResponseTemplate::new(200)
                }
                None => ResponseTemplate::new(404),
            },
            "DELETE" => {
                if inner.objects.remove(path).is_some() {
                    return ResponseTemplate::new(200);
                }
                if let Some((parent, key)) = path.rsplit_once('/') {
                    if let Some((key_field, items)) = inner.collections.get_mut(parent) {
                        let before = items.len();
                        items.retain(|i| i.get(key_field.as_str()).and_then(Value::as_str) != Some(key));
                        if items.len() != before {
                            return ResponseTemplate::new(200);
                        }
                    }
                }
                ResponseTemplate::new(404)
            }
            _ => ResponseTemplate::new(405),
        }
    }
}

struct Emulator {
    store: FixtureStore,
}

impl Respond for Emulator {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let raw = request.url.path().trim_start_matches('/');
        let path = urlencoding::decode(raw)
            .map(|p| p.into_owned())
            .unwrap_or_else(|_| raw.to_string());
        let body = serde_json::from_slice::<Value>(&request.body).ok();
        self.store.handle(request.method.as_str(), &path, body)
    }
}

/// Start a mock portal serving `store`
pub async fn start(store: &FixtureStore) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(Emulator {
            store: store.clone(),
        })
        .mount(&server)
        .await;
    server
}
