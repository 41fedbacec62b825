//! 会话存储、动作分发与 HTTP 外壳。

pub mod dispatch;
pub mod store;
pub mod transport;

pub use dispatch::{ActionRequest, DispatchResponse, Dispatcher};
pub use store::{InMemoryStore, SessionStore, SharedSession, StoreError};
pub use transport::{handle, HttpRequest, HttpResponse};
