//! Service runtime: the listener, method table and dispatch each service
//! process embeds.
//!
//! # Architecture
//!
//! - **dispatch**: params string to handler arguments
//! - **methods**: handler trait and method table
//! - **runtime**: builder, accept loop, registration lifecycle

pub mod dispatch;
pub mod methods;
pub mod runtime;

pub use dispatch::{ArgumentError, CallArgs, DispatchStrategy, ParamValue};
pub use methods::{DynMethodHandler, HandlerError, MethodEntry, MethodHandler, MethodTable};
pub use runtime::{ServiceBuilder, ServiceHandle};
