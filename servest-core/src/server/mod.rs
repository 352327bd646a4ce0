//! Server building blocks shared by the HTTP layer

mod handlers;
mod listener;

pub use self::handlers::{HandlerResponse, ResponseBody, ServeFile, ServeRequest};
pub use self::listener::{bind_in_range, BindOutcome};
