#![allow(dead_code)]

// Shared helpers for integration tests.
//
// `Client` behaves like a minimal browser: it keeps the cookies a response sets and sends them
// back on the next request, parsing `Set-Cookie` with `tower_cookies::Cookie` so it sees exactly
// what the middleware emitted.
use std::collections::BTreeMap;

use axum::{Router, body::Body, extract::Query, routing::get};
use http::{Request, StatusCode, header};
use http_body_util::BodyExt as _;
use serde::Deserialize;
use tower::ServiceExt as _;
use tower_cookies::Cookie;
use tower_sessions_typed::{
    AesGcm, Codec, CookieOptions, CookieStore, DEFAULT_COOKIE_NAME, DEFAULT_KV_COOKIE_NAME,
    KvStore, MemoryKv, Session, SessionManagerLayer, Store,
};

pub const NOT_FOUND: &str = "not found";

/// A session type that behaves like a string map.
pub trait MapSession: Default + Clone + Send + Sync + 'static {
    fn lookup(&self, key: &str) -> Option<String>;

    fn put(&mut self, key: String, value: String);
}

impl MapSession for BTreeMap<String, String> {
    fn lookup(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }

    fn put(&mut self, key: String, value: String) {
        self.insert(key, value);
    }
}

pub type JsonMap = BTreeMap<String, String>;

#[cfg(feature = "proto")]
#[derive(Clone, PartialEq, prost::Message)]
pub struct ProtoMap {
    #[prost(map = "string, string", tag = "1")]
    pub values: std::collections::HashMap<String, String>,
}

#[cfg(feature = "proto")]
impl prost::Name for ProtoMap {
    const NAME: &'static str = "ProtoMap";
    const PACKAGE: &'static str = "tower_sessions_typed.tests";
}

#[cfg(feature = "proto")]
impl MapSession for ProtoMap {
    fn lookup(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn put(&mut self, key: String, value: String) {
        self.values.insert(key, value);
    }
}

#[derive(Deserialize)]
struct Entry {
    key: String,
    value: Option<String>,
}

async fn set_value<T: MapSession>(session: Session<T>, Query(entry): Query<Entry>) {
    let mut value = session.get();
    value.put(entry.key, entry.value.unwrap_or_default());
    session.save(value);
}

async fn get_value<T: MapSession>(session: Session<T>, Query(entry): Query<Entry>) -> String {
    session
        .get()
        .lookup(&entry.key)
        .unwrap_or_else(|| NOT_FOUND.to_string())
}

async fn reset_value<T: MapSession>(session: Session<T>, Query(entry): Query<Entry>) {
    let mut value = T::default();
    value.put(entry.key, entry.value.unwrap_or_default());
    session.reset(value);
}

async fn clear<T: MapSession>(session: Session<T>) {
    session.delete();
}

/// `/set`, `/get`, `/reset` and `/clear` over a map-like session, behind `layer`.
pub fn app<T, S, C>(layer: SessionManagerLayer<T, S, C>) -> Router
where
    T: MapSession,
    S: Store,
    C: Codec<T>,
{
    Router::new()
        .route("/set", get(set_value::<T>))
        .route("/get", get(get_value::<T>))
        .route("/reset", get(reset_value::<T>))
        .route("/clear", get(clear::<T>))
        .layer(layer)
}

/// Cookie options suitable for plain-HTTP tests.
pub fn insecure(name: &'static str) -> CookieOptions {
    CookieOptions::new(name).with_secure(false)
}

pub fn cookie_store() -> CookieStore {
    CookieStore::new(AesGcm::generate()).with_cookie_options(insecure(DEFAULT_COOKIE_NAME))
}

pub fn kv_store() -> KvStore<MemoryKv> {
    KvStore::memory().with_cookie_options(insecure(DEFAULT_KV_COOKIE_NAME))
}

pub async fn body_string(body: Body) -> String {
    let bytes = body
        .collect()
        .await
        .expect("body collects successfully")
        .to_bytes();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// A cookie-keeping client over a router. Cloning it forks the jar.
#[derive(Clone)]
pub struct Client {
    app: Router,
    jar: BTreeMap<String, String>,
}

impl Client {
    pub fn new(app: Router) -> Self {
        Self {
            app,
            jar: BTreeMap::new(),
        }
    }

    pub async fn request(&mut self, uri: &str) -> (StatusCode, String) {
        let mut builder = Request::builder().uri(uri);
        if !self.jar.is_empty() {
            let cookie_header = self
                .jar
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; ");
            builder = builder.header(header::COOKIE, cookie_header);
        }
        let req = builder
            .body(Body::empty())
            .expect("request builds successfully");

        let res = self
            .app
            .clone()
            .oneshot(req)
            .await
            .expect("service call succeeds");

        for set_cookie in res.headers().get_all(header::SET_COOKIE) {
            let set_cookie = set_cookie
                .to_str()
                .expect("set-cookie header is valid utf-8");
            let cookie = Cookie::parse_encoded(set_cookie)
                .expect("set-cookie parses successfully")
                .into_owned();

            // Removal cookies carry an empty value.
            if cookie.value().is_empty() {
                self.jar.remove(cookie.name());
            } else {
                self.jar
                    .insert(cookie.name().to_string(), cookie.value().to_string());
            }
        }

        let status = res.status();
        (status, body_string(res.into_body()).await)
    }

    /// Like `request`, but the response must be a success.
    pub async fn get(&mut self, uri: &str) -> String {
        let (status, body) = self.request(uri).await;
        assert_eq!(status, StatusCode::OK, "unexpected status for {uri}: {body}");
        body
    }

    pub async fn set(&mut self, key: &str, value: &str) {
        self.get(&format!("/set?key={key}&value={value}")).await;
    }

    pub async fn lookup(&mut self, key: &str) -> String {
        self.get(&format!("/get?key={key}")).await
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.jar.get(name).map(String::as_str)
    }

    pub fn set_cookie(&mut self, name: &str, value: &str) {
        self.jar.insert(name.to_string(), value.to_string());
    }
}
