//! Step invoker implementations.
//!
//! - `ResolvingInvoker`: resolves a service by name, then calls it under the step deadline
//! - `HttpCaller`: JSON-over-HTTP `Caller` for one service

pub mod http;
pub mod resolving;

pub use http::HttpCaller;
pub use resolving::ResolvingInvoker;
