//! In-memory exchange answering from scripted routes, for unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use url::Url;

use super::exchange::Exchange;
use super::request::{Method, Request, Response, TransportError};

struct Route {
    method: Method,
    path: String,
    /// The last response is sticky
    responses: VecDeque<Result<Response, TransportError>>,
}

/// Scripted exchange: routes match on method plus URL path
#[derive(Clone, Default)]
pub(crate) struct ScriptedExchange {
    routes: Arc<Mutex<Vec<Route>>>,
    sent: Arc<Mutex<Vec<Request>>>,
}

impl ScriptedExchange {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queue a 200 response with `body` for `method path`
    pub(crate) fn on(self, method: Method, path: &str, body: &str) -> Self {
        self.respond(method, path, Ok(Response::ok("", body)))
    }

    /// Queue an arbitrary outcome for `method path`
    pub(crate) fn respond(self, method: Method, path: &str, outcome: Result<Response, TransportError>) -> Self {
        {
            let mut routes = self.routes.lock().unwrap();
            match routes.iter_mut().find(|r| r.method == method && r.path == path) {
                Some(route) => route.responses.push_back(outcome),
                None => routes.push(Route {
                    method,
                    path: path.to_string(),
                    responses: VecDeque::from([outcome]),
                }),
            }
        }
        self
    }

    /// Every request sent so far
    pub(crate) fn sent(&self) -> Vec<Request> {
        self.sent.lock().unwrap().clone()
    }

    /// Requests sent to a path
    pub(crate) fn sent_to(&self, path: &str) -> Vec<Request> {
        self.sent()
            .into_iter()
            .filter(|r| Url::parse(&r.url).map(|u| u.path() == path).unwrap_or(false))
            .collect()
    }
}

#[async_trait]
impl Exchange for ScriptedExchange {
    async fn send(&self, request: &Request) -> Result<Response, TransportError> {
        self.sent.lock().unwrap().push(request.clone());
        let path = Url::parse(&request.url)
            .map(|u| u.path().to_string())
            .unwrap_or_default();

        let mut routes = self.routes.lock().unwrap();
        let route = routes
            .iter_mut()
            .find(|r| r.method == request.method && r.path == path)
            .ok_or_else(|| TransportError::connection(&request.url, "no scripted response"))?;

        let outcome = if route.responses.len() > 1 {
            route.responses.pop_front()
        } else {
            route.responses.front().cloned()
        };
        match outcome {
            Some(Ok(mut response)) => {
                if response.url.is_empty() {
                    response.url = request.url.clone();
                }
                Ok(response)
            }
            Some(Err(err)) => Err(err),
            None => Err(TransportError::connection(&request.url, "no scripted response")),
        }
    }

    fn paced(&self) -> bool {
        false
    }
}
