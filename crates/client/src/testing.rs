//! Scripted network used by unit tests across the crate.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use arcade_core::Error;
use async_trait::async_trait;
use reqwest::StatusCode;

use crate::fetch::{FetchResponse, Network, Request};

#[derive(Clone)]
enum Route {
    Respond(u16, String),
    Fail,
}

/// Answers requests from a route table and records every request made.
///
/// Unrouted URLs answer 404. While offline every request fails.
#[derive(Default)]
pub(crate) struct ScriptedNetwork {
    routes: Mutex<HashMap<String, Route>>,
    log: Mutex<Vec<Request>>,
    offline: AtomicBool,
}

impl ScriptedNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(&self, url: &str, status: u16, body: &str) -> &Self {
        self.routes.lock().unwrap().insert(url.to_string(), Route::Respond(status, body.to_string()));
        self
    }

    pub fn fail(&self, url: &str) -> &Self {
        self.routes.lock().unwrap().insert(url.to_string(), Route::Fail);
        self
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// `METHOD url` of every request, in issue order.
    pub fn requests(&self) -> Vec<String> {
        self.log.lock().unwrap().iter().map(|r| format!("{} {}", r.method, r.url)).collect()
    }

    pub fn last_request(&self) -> Option<Request> {
        self.log.lock().unwrap().last().cloned()
    }

    pub fn request_count(&self) -> usize {
        self.log.lock().unwrap().len()
    }
}

#[async_trait]
impl Network for ScriptedNetwork {
    async fn fetch(&self, request: &Request) -> Result<FetchResponse, Error> {
        self.log.lock().unwrap().push(request.clone());
        tokio::task::yield_now().await;

        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::NetworkFailure(format!("offline: {}", request.url)));
        }

        let route = self.routes.lock().unwrap().get(request.url.as_str()).cloned();
        match route {
            Some(Route::Respond(status, body)) => {
                let status = StatusCode::from_u16(status).unwrap();
                let mut response = FetchResponse::new(request.url.clone(), status, body);
                response.headers.push(("content-type".into(), "text/html".into()));
                Ok(response)
            }
            Some(Route::Fail) => Err(Error::NetworkFailure(format!("connection refused: {}", request.url))),
            None => Ok(FetchResponse::new(request.url.clone(), StatusCode::NOT_FOUND, "")),
        }
    }
}
