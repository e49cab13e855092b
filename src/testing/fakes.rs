//! Recording fakes for the runtime's collaborators.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value;
use tokio::sync::Semaphore;

use crate::error::NetworkError;
use crate::net::{HttpClient, HttpFuture, Method, Navigator};

// ---------------------------------------------------------------------------
// FakeHttp
// ---------------------------------------------------------------------------

/// One request seen by [`FakeHttp`]. `method` is `None` for fetches.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: Option<Method>,
    pub url: String,
    pub body: Option<Value>,
}

#[derive(Default)]
struct Routes {
    get: HashMap<String, Result<Value, NetworkError>>,
    send: HashMap<String, Result<Value, NetworkError>>,
}

/// Canned-response HTTP client.
///
/// Requests are recorded when they are made. Unrouted URLs fail with
/// [`NetworkError::Request`]. While [`hold`](FakeHttp::hold) is in effect,
/// responses wait until [`release`](FakeHttp::release).
#[derive(Default)]
pub struct FakeHttp {
    routes: RefCell<Routes>,
    requests: RefCell<Vec<RecordedRequest>>,
    gate: RefCell<Option<Rc<Semaphore>>>,
}

impl FakeHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_get(&self, url: impl Into<String>, response: Value) -> &Self {
        self.routes.borrow_mut().get.insert(url.into(), Ok(response));
        self
    }

    pub fn on_get_error(&self, url: impl Into<String>, error: NetworkError) -> &Self {
        self.routes.borrow_mut().get.insert(url.into(), Err(error));
        self
    }

    pub fn on_send(&self, url: impl Into<String>, response: Value) -> &Self {
        self.routes.borrow_mut().send.insert(url.into(), Ok(response));
        self
    }

    pub fn on_send_error(&self, url: impl Into<String>, error: NetworkError) -> &Self {
        self.routes.borrow_mut().send.insert(url.into(), Err(error));
        self
    }

    /// Make later responses wait for [`release`](Self::release).
    pub fn hold(&self) {
        *self.gate.borrow_mut() = Some(Rc::new(Semaphore::new(0)));
    }

    /// Let every held response through.
    pub fn release(&self) {
        if let Some(gate) = self.gate.borrow_mut().take() {
            gate.close();
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.borrow().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.borrow().len()
    }

    /// Requests with a method, i.e. submits.
    pub fn sent(&self) -> Vec<RecordedRequest> {
        self.requests
            .borrow()
            .iter()
            .filter(|r| r.method.is_some())
            .cloned()
            .collect()
    }

    fn respond<'a>(
        &'a self,
        request: RecordedRequest,
        response: Option<Result<Value, NetworkError>>,
    ) -> HttpFuture<'a> {
        let url = request.url.clone();
        self.requests.borrow_mut().push(request);
        let gate = self.gate.borrow().clone();
        Box::pin(async move {
            if let Some(gate) = gate {
                // Closed on release; the error is the signal to proceed.
                let _ = gate.acquire().await;
            }
            response.unwrap_or_else(|| {
                Err(NetworkError::Request {
                    url,
                    message: "no route".to_string(),
                })
            })
        })
    }
}

impl HttpClient for FakeHttp {
    fn fetch<'a>(&'a self, url: &'a str) -> HttpFuture<'a> {
        let response = self.routes.borrow().get.get(url).cloned();
        self.respond(
            RecordedRequest {
                method: None,
                url: url.to_string(),
                body: None,
            },
            response,
        )
    }

    fn send<'a>(&'a self, method: Method, url: &'a str, body: &'a Value) -> HttpFuture<'a> {
        let response = self.routes.borrow().send.get(url).cloned();
        self.respond(
            RecordedRequest {
                method: Some(method),
                url: url.to_string(),
                body: Some(body.clone()),
            },
            response,
        )
    }
}

// ---------------------------------------------------------------------------
// RecordingNavigator
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visits: RefCell<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visits(&self) -> Vec<String> {
        self.visits.borrow().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, target: &str) {
        self.visits.borrow_mut().push(target.to_string());
    }
}
