pub mod game;
pub mod session;
pub mod utils;

use std::fmt::Display;
use std::sync::Arc;

use gloo_timers::future::TimeoutFuture;
use once_cell::sync::Lazy;
use serde::Serialize;
use serde_wasm_bindgen::{from_value, Serializer};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use web_sys::js_sys::Promise;

pub use game::{
    ActionEngine, ActionKind, ActionOutcome, ConfigError, EmergencyReport, ErrorKind,
    FixedRoles, GameConfig, IntegrityError, MapTopology, Player, PlayerId, RandomRoles, Role,
    RolePolicy, RuleError, SessionState, SessionStatus, Zone, ZoneDef, ZoneId, ZoneKind,
    DEFAULT_TOPOLOGY,
};
pub use session::{
    ActionRequest, DispatchResponse, Dispatcher, HttpRequest, HttpResponse, InMemoryStore,
    SessionStore, StoreError,
};

#[cfg(all(feature = "wee_alloc", target_arch = "wasm32"))]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

/// 纯状态变换接口使用的默认规则（不使用其存储）。
static STATELESS: Lazy<Dispatcher> = Lazy::new(Dispatcher::default);

#[wasm_bindgen(start)]
pub fn start() {
    set_panic_hook();
    utils::init_logging(log::LevelFilter::Info);
}

fn to_js_error<E: Display>(error: E) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&Serializer::json_compatible())
        .map_err(JsValue::from)
}

#[derive(Serialize)]
struct AppliedAction {
    state: SessionState,
    response: serde_json::Value,
}

/// 持有全部分组会话的进程内入口，供 JS 传输层调用。
#[wasm_bindgen]
pub struct SessionHub {
    dispatcher: Arc<Dispatcher>,
}

#[wasm_bindgen]
impl SessionHub {
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<SessionHub, JsValue> {
        let config = match config_json {
            Some(json) => GameConfig::from_json(&json).map_err(to_js_error)?,
            None => GameConfig::default(),
        };
        Ok(SessionHub {
            dispatcher: Arc::new(Dispatcher::new(config)),
        })
    }

    pub fn dispatch_json(&self, request_json: &str) -> Result<String, JsValue> {
        let request: ActionRequest = serde_json::from_str(request_json).map_err(to_js_error)?;
        let response = self.dispatcher.dispatch(&request).map_err(to_js_error)?;
        serde_json::to_string(&response).map_err(to_js_error)
    }

    /// 返回 `{ status, headers, body }`。
    pub fn handle_http(&self, method: String, body: String) -> Result<JsValue, JsValue> {
        let response = session::handle(&*self.dispatcher, &HttpRequest { method, body });
        to_js(&response)
    }

    pub fn state_json(&self, group_id: &str) -> Result<String, JsValue> {
        let state = self.dispatcher.snapshot(group_id).map_err(to_js_error)?;
        serde_json::to_string(&state).map_err(to_js_error)
    }

    pub fn group_ids(&self) -> Result<JsValue, JsValue> {
        let ids = self.dispatcher.store().group_ids().map_err(to_js_error)?;
        to_js(&ids)
    }

    /// 客户端轮询：等待 `delay_ms` 后返回该分组的状态 JSON。
    pub fn poll_state(&self, group_id: String, delay_ms: Option<u32>) -> Promise {
        let dispatcher = Arc::clone(&self.dispatcher);
        let delay = delay_ms.unwrap_or(0);

        future_to_promise(async move {
            if delay > 0 {
                TimeoutFuture::new(delay).await;
            }
            let state = dispatcher.snapshot(&group_id).map_err(to_js_error)?;
            let json = serde_json::to_string(&state).map_err(to_js_error)?;
            Ok(JsValue::from_str(&json))
        })
    }
}

/// 对调用方持有的状态执行一个动作，返回 `{ state, response }`。
#[wasm_bindgen(js_name = "applyAction")]
pub fn apply_action(state: JsValue, request: JsValue) -> Result<JsValue, JsValue> {
    let mut state: SessionState = from_value(state).map_err(JsValue::from)?;
    let request: ActionRequest = from_value(request).map_err(JsValue::from)?;
    let response = STATELESS.apply_to(&mut state, &request);
    let response = serde_json::to_value(&response).map_err(to_js_error)?;
    to_js(&AppliedAction { state, response })
}

#[wasm_bindgen(js_name = "createSessionState")]
pub fn create_session_state() -> Result<JsValue, JsValue> {
    to_js(&STATELESS.engine().new_session())
}

#[wasm_bindgen(js_name = "validateState")]
pub fn validate_state(state: JsValue) -> Result<(), JsValue> {
    let state: SessionState = from_value(state).map_err(JsValue::from)?;
    state
        .integrity_check()
        .map_err(|error| to_js_error(RuleError::IntegrityViolation { error }))
}

#[wasm_bindgen(js_name = "generateGroupId")]
pub fn generate_group_id() -> String {
    utils::generate_group_id()
}

#[wasm_bindgen(js_name = "defaultTopology")]
pub fn default_topology() -> Result<JsValue, JsValue> {
    to_js(&*DEFAULT_TOPOLOGY)
}

#[cfg(feature = "console_error_panic_hook")]
fn set_panic_hook() {
    console_error_panic_hook::set_once();
}

#[cfg(not(feature = "console_error_panic_hook"))]
fn set_panic_hook() {}
