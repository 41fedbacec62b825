//! 面向无服务器函数的 HTTP 外壳：方法路由、CORS、JSON 编解码与状态码映射。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::dispatch::{ActionRequest, DispatchResponse, Dispatcher};
use super::store::SessionStore;
use crate::game::ErrorKind;

pub const STATUS_OK: u16 = 200;
pub const STATUS_BAD_REQUEST: u16 = 400;
pub const STATUS_METHOD_NOT_ALLOWED: u16 = 405;
pub const STATUS_INTERNAL_ERROR: u16 = 500;

const CORS_HEADERS: [(&str, &str); 3] = [
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Headers", "Content-Type"),
    ("Access-Control-Allow-Methods", "POST, OPTIONS"),
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    #[serde(default)]
    pub body: String,
}

impl HttpRequest {
    pub fn post(body: impl Into<String>) -> Self {
        Self {
            method: "POST".into(),
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl HttpResponse {
    fn new(status: u16, body: String) -> Self {
        let mut headers: BTreeMap<String, String> = CORS_HEADERS
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        if !body.is_empty() {
            headers.insert("Content-Type".into(), "application/json".into());
        }
        Self {
            status,
            headers,
            body,
        }
    }

    fn error(status: u16, message: &str) -> Self {
        Self::new(
            status,
            json!({ "success": false, "error": message }).to_string(),
        )
    }
}

pub fn status_for(response: &DispatchResponse) -> u16 {
    match response.kind {
        None => STATUS_OK,
        Some(ErrorKind::Internal) => STATUS_INTERNAL_ERROR,
        Some(_) => STATUS_BAD_REQUEST,
    }
}

pub fn handle<S: SessionStore>(dispatcher: &Dispatcher<S>, request: &HttpRequest) -> HttpResponse {
    match request.method.to_ascii_uppercase().as_str() {
        "OPTIONS" => HttpResponse::new(STATUS_OK, String::new()),
        "POST" => handle_post(dispatcher, &request.body),
        other => {
            log::warn!("method {other} not allowed");
            HttpResponse::error(STATUS_METHOD_NOT_ALLOWED, "Method not allowed")
        }
    }
}

fn handle_post<S: SessionStore>(dispatcher: &Dispatcher<S>, body: &str) -> HttpResponse {
    let request: ActionRequest = match serde_json::from_str(body) {
        Ok(request) => request,
        Err(error) => {
            log::warn!("malformed request body: {error}");
            return HttpResponse::error(STATUS_BAD_REQUEST, &format!("Malformed request: {error}"));
        }
    };

    let response = match dispatcher.dispatch(&request) {
        Ok(response) => response,
        Err(error) => {
            log::error!("{error}");
            return HttpResponse::error(STATUS_INTERNAL_ERROR, "Internal server error");
        }
    };

    match serde_json::to_string(&response) {
        Ok(body) => HttpResponse::new(status_for(&response), body),
        Err(error) => {
            log::error!("failed to encode response: {error}");
            HttpResponse::error(STATUS_INTERNAL_ERROR, "Internal server error")
        }
    }
}
