//! Request-scoped context manager.

use crate::context::{Context, ContextKey};
use crate::error::{ContextError, Result};
use crate::ids::{RequestId, TraceId};
use crate::scope::{ManagerId, Scope, Scoped, SharedContext};
use std::future::Future;
use tokio::task::JoinHandle;

/// Binds a [`Context`] to the dynamic extent of a computation.
///
/// The bound record is visible to every synchronous call made inside
/// [`run`](Self::run) and across every `.await` of a future wrapped by
/// [`scope`](Self::scope). Work handed to another tokio task keeps the
/// binding only when it goes through [`spawn`](Self::spawn),
/// [`spawn_local`](Self::spawn_local), [`spawn_blocking`](Self::spawn_blocking)
/// or a captured [`Scope`].
///
/// Each manager owns its own bindings. Clones share them; two managers built
/// with [`new`](Self::new) never see each other's contexts.
///
/// # Example
/// ```rust
/// use reqctx_core::{Context, ContextKey, ContextManager};
///
/// # tokio_test::block_on(async {
/// let manager = ContextManager::new();
/// let ctx = Context::new().with_req_id("req-1").with_trace_id("trace-1");
///
/// let req_id = manager
///     .scope(ctx, async {
///         tokio::task::yield_now().await;
///         manager.get_by_key_or_fail(ContextKey::ReqId)
///     })
///     .await?;
///
/// assert_eq!(req_id, "req-1");
/// assert!(manager.get().is_none());
/// # Ok::<(), reqctx_core::ContextError>(())
/// # }).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ContextManager {
    id: ManagerId,
}

impl ContextManager {
    pub fn new() -> Self {
        Self {
            id: ManagerId::next(),
        }
    }

    /// Run `f` with `context` bound, returning whatever `f` returns.
    ///
    /// Nested calls shadow the outer binding until they return. A future
    /// returned from `f` is not polled here and so is not covered; use
    /// [`scope`](Self::scope) or [`bind`](Self::bind) for async work.
    pub fn run<F, R>(&self, context: Context, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        self.enter(context).enter(f)
    }

    /// [`run`](Self::run) with an empty context.
    pub fn run_default<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        self.run(Context::default(), f)
    }

    /// Bind `context` for the whole lifetime of `fut`, across every
    /// suspension point. The output of `fut` is passed through untouched.
    ///
    /// The binding nests inside whatever scope is active each time the
    /// future is polled, so other managers' enclosing bindings stay visible.
    pub fn scope<F>(&self, context: Context, fut: F) -> Scoped<F>
    where
        F: Future,
    {
        self.enter(context).wrap(fut)
    }

    /// [`scope`](Self::scope) with an empty context.
    pub fn scope_default<F>(&self, fut: F) -> Scoped<F>
    where
        F: Future,
    {
        self.scope(Context::default(), fut)
    }

    /// Overwrite a field of the active record. The change is seen by the rest
    /// of the scope and by every descendant sharing the record, including
    /// tasks spawned before the call.
    pub fn set(&self, key: ContextKey, value: impl Into<String>) -> Result<()> {
        let cell = self.active_or_fail()?;
        cell.write().set(key, value.into());
        Ok(())
    }

    /// Snapshot of the active record, or `None` outside any scope.
    pub fn get(&self) -> Option<Context> {
        self.with(Context::clone)
    }

    pub fn get_or_fail(&self) -> Result<Context> {
        self.get().ok_or(ContextError::NotInitialized)
    }

    /// Field value, or `None` when no scope is active or the field is unset.
    pub fn get_by_key(&self, key: ContextKey) -> Option<String> {
        self.with(|ctx| ctx.get(key).map(str::to_owned)).flatten()
    }

    /// Field value; an unset field and an empty string both count as missing.
    pub fn get_by_key_or_fail(&self, key: ContextKey) -> Result<String> {
        let cell = self.active_or_fail()?;
        let ctx = cell.read_recursive();
        match ctx.get(key) {
            Some(value) if !value.is_empty() => Ok(value.to_owned()),
            _ => Err(ContextError::KeyNotFound(key)),
        }
    }

    pub fn req_id(&self) -> Option<RequestId> {
        self.with(|ctx| ctx.req_id.clone()).flatten()
    }

    pub fn trace_id(&self) -> Option<TraceId> {
        self.with(|ctx| ctx.trace_id.clone()).flatten()
    }

    /// Borrow the active record without cloning it.
    ///
    /// Reads from inside `f` are fine even while a writer on another thread
    /// is waiting; calling [`set`](Self::set) from inside `f` deadlocks.
    pub fn with<F, R>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&Context) -> R,
    {
        let cell = self.active()?;
        let guard = cell.read_recursive();
        Some(f(&guard))
    }

    pub fn is_active(&self) -> bool {
        self.active().is_some()
    }

    /// Capture the active binding, if this manager has one, for re-entry
    /// somewhere the task-local slot does not reach.
    pub fn current_scope(&self) -> Option<Scope> {
        let scope = Scope::current();
        scope.binding(self.id).map(|_| scope)
    }

    /// Wrap `fut` in the bindings active right now.
    pub fn bind<F>(&self, fut: F) -> Scoped<F>
    where
        F: Future,
    {
        Scope::current().wrap(fut)
    }

    /// Wrap a deferred callback in the bindings active right now.
    pub fn bind_fn<F, R>(&self, f: F) -> impl FnOnce() -> R + use<F, R>
    where
        F: FnOnce() -> R,
    {
        Scope::current().bind_fn(f)
    }

    /// [`tokio::spawn`] carrying the current bindings into the new task.
    pub fn spawn<F>(&self, fut: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        tokio::spawn(self.bind(fut))
    }

    /// [`tokio::task::spawn_local`] carrying the current bindings.
    ///
    /// Must be called from inside a [`tokio::task::LocalSet`].
    pub fn spawn_local<F>(&self, fut: F) -> JoinHandle<F::Output>
    where
        F: Future + 'static,
        F::Output: 'static,
    {
        tokio::task::spawn_local(self.bind(fut))
    }

    /// [`tokio::task::spawn_blocking`] carrying the current bindings.
    pub fn spawn_blocking<F, R>(&self, f: F) -> JoinHandle<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        tokio::task::spawn_blocking(self.bind_fn(f))
    }

    fn enter(&self, context: Context) -> Scope {
        Scope::single(self.id, context)
    }

    fn active(&self) -> Option<SharedContext> {
        Scope::lookup(self.id)
    }

    fn active_or_fail(&self) -> Result<SharedContext> {
        self.active().ok_or(ContextError::NotInitialized)
    }
}

impl Default for ContextManager {
    fn default() -> Self {
        Self::new()
    }
}
