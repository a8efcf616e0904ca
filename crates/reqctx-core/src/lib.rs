//! Request-scoped context propagation.
//!
//! A [`ContextManager`] binds a request/trace [`Context`] to the dynamic
//! extent of a computation so any code running inside it can read the
//! identifiers without having them passed along explicitly.

pub mod context;
pub mod error;
pub mod ids;
pub mod manager;
pub mod scope;

pub use context::{Context, ContextKey};
pub use error::{ContextError, Result};
pub use ids::{RequestId, TraceId};
pub use manager::ContextManager;
pub use scope::{Scope, Scoped};
