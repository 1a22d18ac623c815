//! Read-only data endpoint
//!
//! Framework-agnostic handler for `GET /mp-challenge/v2/get-data`. An HTTP
//! server or any other host maps its request onto [`RequestParams`] and a
//! [`Caller`], then writes the returned status and JSON body.

use log::debug;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::proxy::{DatasetProxy, FetchError};
use crate::request::RequestParams;

/// Route the endpoint is mounted on
pub const ROUTE: &str = "/mp-challenge/v2/get-data";

const FORBIDDEN_MESSAGE: &str = "Sorry, you are not allowed to do that.";

/// Who is calling the endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller {
    Anonymous,
    Authenticated,
}

/// Status code and JSON body to send back
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointResponse {
    pub status: u16,
    pub body: Value,
}

impl EndpointResponse {
    fn error(status: u16, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({
                "code": code,
                "message": message.into(),
                "data": { "status": status },
            }),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl From<FetchError> for EndpointResponse {
    fn from(e: FetchError) -> Self {
        EndpointResponse::error(400, "generic_error", e.to_string())
    }
}

/// Serves the cached dataset as JSON
#[derive(Debug)]
pub struct DataEndpoint {
    proxy: Arc<DatasetProxy>,
    require_login: bool,
}

impl DataEndpoint {
    pub fn new(proxy: Arc<DatasetProxy>) -> Self {
        Self {
            proxy,
            require_login: false,
        }
    }

    /// Rejects anonymous callers when enabled
    pub fn require_login(mut self, require_login: bool) -> Self {
        self.require_login = require_login;
        self
    }

    /// Whether `caller` may read the data
    pub fn permits(&self, caller: Caller) -> bool {
        !self.require_login || caller == Caller::Authenticated
    }

    /// Handles one request
    ///
    /// `reset=1` invalidates then reads, `refresh=1` forces a refetch,
    /// otherwise the cache is used when fresh.
    pub async fn handle(&self, caller: Caller, params: &RequestParams) -> EndpointResponse {
        if !self.permits(caller) {
            debug!("rejected anonymous caller on {}", ROUTE);
            return EndpointResponse::error(401, "rest_forbidden", FORBIDDEN_MESSAGE);
        }

        let result = if params.flag("reset") {
            self.proxy.reset().await
        } else {
            self.proxy.get_or_refresh(params.flag("refresh")).await
        };

        match result {
            Ok(dataset) => match serde_json::to_value(&dataset) {
                Ok(body) => EndpointResponse { status: 200, body },
                Err(e) => EndpointResponse::error(400, "generic_error", e.to_string()),
            },
            Err(e) => e.into(),
        }
    }
}
