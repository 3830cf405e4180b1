use std::net::SocketAddr;

use axum::{Router, routing::get};
use serde::{Deserialize, Serialize};
use time::Duration;
use tower_sessions_typed::{
    AesGcm, CookieOptions, CookieStore, DEFAULT_COOKIE_NAME, SameSite, Session, SessionConfig,
    SessionManagerLayer,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Visitor {
    user: Option<String>,
    visits: u64,
}

async fn index(session: Session<Visitor>) -> String {
    let mut visitor = session.get();
    visitor.visits += 1;
    let greeting = match &visitor.user {
        Some(user) => format!("hello {user}, visit {}", visitor.visits),
        None => format!("hello stranger, visit {}", visitor.visits),
    };
    session.save(visitor);
    greeting
}

async fn login(session: Session<Visitor>) -> &'static str {
    // New privileges, new identity.
    session.reset(Visitor {
        user: Some("alice".into()),
        visits: 0,
    });
    "logged in"
}

async fn logout(session: Session<Visitor>) -> &'static str {
    session.delete();
    "logged out"
}

#[tokio::main]
async fn main() {
    let cookie = CookieOptions::new(DEFAULT_COOKIE_NAME)
        // Default: true
        .with_http_only(true)
        // Default: SameSite::Lax
        .with_same_site(SameSite::Lax)
        // Default: true (set to false for local HTTP development)
        .with_secure(false)
        // Default: "/"
        .with_path("/");
    let store = CookieStore::new(AesGcm::generate())
        .with_cookie_options(cookie)
        // Default: 4096
        .with_max_cookie_bytes(4096);
    let config = SessionConfig::<Visitor>::default()
        // Default: 24 hours
        .with_idle_timeout(Duration::minutes(30))
        // Default: none
        .with_max_lifetime(Duration::hours(8));
    let session_layer =
        SessionManagerLayer::new(store, config).expect("session config is valid");

    let app = Router::new()
        .route("/", get(index))
        .route("/login", get(login))
        .route("/logout", get(logout))
        .layer(session_layer);

    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("tcp listener binds successfully");
    let local_addr = listener.local_addr().expect("local address is available");
    println!("listening at http://{local_addr}");

    axum::serve(listener, app)
        .await
        .expect("server runs successfully");
}
