use crate::actions::ActionClient;
use crate::config::Config;
use crate::types::AppState;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json, Router,
};
use serde_json::Value;
use std::net::{SocketAddr, TcpListener};
use std::sync::{Arc, Mutex};

/// Requests captured by a throwaway test server
#[derive(Clone, Default)]
pub struct Recorded(pub Arc<Mutex<Vec<(HeaderMap, Value)>>>);

impl Recorded {
    pub fn bodies(&self) -> Vec<Value> {
        self.0.lock().unwrap().iter().map(|(_, b)| b.clone()).collect()
    }
}

pub async fn record(
    State(rec): State<Recorded>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> StatusCode {
    rec.0.lock().unwrap().push((headers, body));
    StatusCode::OK
}

/// Serve `app` on an ephemeral localhost port.
pub async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(
        axum::Server::from_tcp(listener)
            .unwrap()
            .serve(app.into_make_service()),
    );
    addr
}

pub fn app_state(config: Config) -> Arc<AppState> {
    let http_client = reqwest::Client::new();
    let actions = ActionClient::new(http_client.clone(), &config);
    Arc::new(AppState {
        config,
        http_client,
        actions,
    })
}
