pub mod action;
pub mod app;
pub mod bind;
pub mod cache;
pub mod config;
pub mod context;
pub mod exception;
pub mod interceptor;
pub mod param;
pub mod render;
pub mod reply;
pub mod request;
pub mod response;
pub mod router;
pub mod scope;
pub mod server;
pub mod session;
pub mod util;

pub use action::{Action, ActionBase, ActionLogger, After, Before, Init, WantsApp, WantsConfig, WantsLogger, WantsSession};
pub use app::{App, AppState, Mapping};
pub use cache::FileCache;
pub use config::{AppConfig, Config, RunMode};
pub use context::Context;
pub use exception::Exception;
pub use interceptor::Interceptor;
pub use param::{HttpEncoding, HttpRequestMethod, HttpVersion};
pub use reply::{abort, AbortError, IntoReply, Reply};
pub use request::Request;
pub use response::{Cookie, ResponseWriter};
pub use scope::Scope;
pub use server::{Server, ServerHandle};
pub use session::{Session, SessionStore};
