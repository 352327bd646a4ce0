//! Servest HTTP layer
//!
//! Accepts connections, filters methods, answers CORS preflights and
//! hands resolved files to the static file server.

pub mod dispatcher;
pub mod server;

pub use dispatcher::{Dispatcher, RequestDescriptor};
pub use server::serve;
