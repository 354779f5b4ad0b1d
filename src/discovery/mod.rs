//! Service discovery for step dispatch.
//!
//! Workflow steps name a service and a method as plain strings; discovery
//! turns the service name into a `Caller` at runtime.

pub mod static_discovery;

pub use static_discovery::StaticEndpointResolver;
