#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use axum::{
    Router,
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
};
use sentinel::{
    api::ApiClient,
    auth::{AuthMachine, LoginFlow, User},
    config::AppConfig,
    routes::Navigator,
    session::{MemoryStorage, SessionStore},
};
use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};
use tokio::net::TcpListener;

pub const PREFIX: &str = "/api/v1";

/// A request as the mock backend received it.
#[derive(Clone, Debug)]
pub struct Seen {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub request_id: Option<String>,
}

type Recorder = Arc<Mutex<Vec<Seen>>>;

async fn record(State(seen): State<Recorder>, request: Request, next: Next) -> Response {
    let entry = {
        let header = |name: &str| {
            request
                .headers()
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };
        Seen {
            method: request.method().to_string(),
            path: request.uri().path().to_string(),
            query: request.uri().query().map(str::to_string),
            authorization: header("authorization"),
            request_id: header("x-request-id"),
        }
    };
    seen.lock().unwrap().push(entry);
    next.run(request).await
}

/// In-process backend plus a client wired to a fresh in-memory session.
pub struct Harness {
    pub base_url: String,
    pub storage: Arc<MemoryStorage>,
    pub machine: Arc<AuthMachine>,
    pub client: ApiClient,
    seen: Recorder,
    visited: Arc<Mutex<Vec<String>>>,
}

impl Harness {
    /// `routes` are mounted under `/api/v1`.
    pub async fn start(routes: Router) -> anyhow::Result<Self> {
        let seen: Recorder = Arc::default();
        let app = Router::new()
            .nest(PREFIX, routes)
            .layer(middleware::from_fn_with_state(seen.clone(), record));

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let base_url = format!("http://{addr}{PREFIX}");
        let config = AppConfig::new(&base_url, PathBuf::from("unused"))?;
        let storage = Arc::new(MemoryStorage::new());
        let session = Arc::new(SessionStore::new(storage.clone()));
        let machine = Arc::new(AuthMachine::new(session));
        machine.hydrate();

        let visited: Arc<Mutex<Vec<String>>> = Arc::default();
        let client = ApiClient::new(&config, machine.clone(), navigator(&visited))?;

        Ok(Self {
            base_url,
            storage,
            machine,
            client,
            seen,
            visited,
        })
    }

    pub fn flow(&self) -> LoginFlow {
        LoginFlow::new(
            self.client.clone(),
            self.machine.clone(),
            navigator(&self.visited),
        )
    }

    /// Signs `user` in directly, bypassing the login endpoints, and publishes
    /// the new state.
    pub fn sign_in(&self, user: User, token: &str) {
        self.machine
            .session()
            .persist(user, Some(token.to_string()))
            .unwrap();
        self.machine.hydrate();
    }

    pub fn visited(&self) -> Vec<String> {
        self.visited.lock().unwrap().clone()
    }

    pub fn last_visit(&self) -> Option<String> {
        self.visited().last().cloned()
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    pub fn seen_path(&self, path: &str) -> Option<Seen> {
        let full = format!("{PREFIX}{path}");
        self.seen().into_iter().rev().find(|seen| seen.path == full)
    }
}

fn navigator(visited: &Arc<Mutex<Vec<String>>>) -> Arc<dyn Navigator> {
    let visited = visited.clone();
    Arc::new(move |path: &str| visited.lock().unwrap().push(path.to_string()))
}

pub fn alice() -> User {
    User::new("7", "alice@obai.io")
}

pub fn root() -> User {
    User::new("1", "root@obai.io").admin()
}
