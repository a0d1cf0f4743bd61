//! Common utilities for reqaudit server integration tests
//!
//! Every test gets its own in-memory store and a fully assembled router, so
//! tests are isolated and need no database.
//!
//! ```no_run
//! mod common;
//! use common::TestApp;
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let app = TestApp::new();
//!     let (status, body) = app.get("/health").await;
//! }
//! ```

#![allow(dead_code)]

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Utc};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use reqaudit_server::{
    api::{create_router, AppState},
    audit::{LogRecord, LogRecordSpec},
    config::Config,
    store::{ExtensionClient, ListOptions, MemoryStore, Sort},
};

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(&Config::default())
    }

    pub fn with_config(config: &Config) -> Self {
        let state = AppState::new(Arc::new(MemoryStore::new()));
        let router = create_router(state.clone(), config).expect("router builds from config");
        Self { router, state }
    }

    pub fn client(&self) -> &ExtensionClient {
        &self.state.client
    }

    /// Send a request and decode the JSON body (Null when empty or not JSON)
    pub async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        self.send_request(request).await
    }

    pub async fn send_request(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(body)).await
    }

    pub async fn put(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::PUT, uri, Some(body)).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, None).await
    }

    pub async fn records(&self) -> Vec<LogRecord> {
        self.client()
            .list_all::<LogRecordSpec>(&ListOptions::new(), &Sort::unsorted())
            .await
            .unwrap()
    }

    /// Audit writes happen on a detached task; poll until `expected` show up
    pub async fn wait_for_records(&self, expected: usize) -> Vec<LogRecord> {
        for _ in 0..100 {
            let found = self.records().await;
            if found.len() >= expected {
                return found;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.records().await
    }

    pub async fn insert_record(&self, username: &str, client_ip: &str, path: &str, at: DateTime<Utc>) -> LogRecord {
        let spec = LogRecordSpec {
            id: Uuid::now_v7().to_string(),
            username: username.to_string(),
            client_ip: client_ip.to_string(),
            path: path.to_string(),
            method: "GET".to_string(),
            access_time: at,
            request_headers: "{}".to_string(),
            request_body: String::new(),
            request_params: BTreeMap::new(),
            response_headers: "{}".to_string(),
            response_body: String::new(),
            response_status: "200".to_string(),
        };
        self.client().create(spec.into_record()).await.unwrap()
    }
}

pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}
