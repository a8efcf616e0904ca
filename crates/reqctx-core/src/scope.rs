//! Task-local slot holding the active context bindings.
//!
//! One slot is shared by every [`ContextManager`](crate::ContextManager); it
//! maps each manager's identity to the record it bound, so managers never see
//! each other's contexts. Tokio carries the slot across every `.await` of a
//! scoped future but not into newly spawned tasks, which is why a [`Scope`]
//! can be captured and re-entered explicitly.

use crate::context::Context as RequestContext;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

tokio::task_local! {
    static ACTIVE: Scope;
}

static MANAGER_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Record cell shared by a scope and all of its descendants.
pub(crate) type SharedContext = Arc<RwLock<RequestContext>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ManagerId(u64);

impl ManagerId {
    pub(crate) fn next() -> Self {
        Self(MANAGER_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// A captured set of context bindings.
///
/// Entering a scope layers its bindings over whatever is active at that
/// moment: managers it holds a binding for are shadowed, every other
/// manager's binding stays visible.
///
/// Cloning is cheap and clones share the underlying records, so a field set
/// through one clone is visible through all of them.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    bindings: Arc<HashMap<ManagerId, SharedContext>>,
}

impl Scope {
    /// Bindings active on the current task, or an empty scope.
    pub fn current() -> Self {
        ACTIVE.try_with(Scope::clone).unwrap_or_default()
    }

    pub(crate) fn lookup(id: ManagerId) -> Option<SharedContext> {
        ACTIVE.try_with(|scope| scope.binding(id)).ok().flatten()
    }

    /// Scope binding a fresh record for `id` and nothing else.
    pub(crate) fn single(id: ManagerId, context: RequestContext) -> Self {
        let mut bindings = HashMap::with_capacity(1);
        bindings.insert(id, Arc::new(RwLock::new(context)));
        Self {
            bindings: Arc::new(bindings),
        }
    }

    pub(crate) fn binding(&self, id: ManagerId) -> Option<SharedContext> {
        self.bindings.get(&id).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// These bindings on top of `base`; neither input is modified.
    fn layered_over(&self, base: Scope) -> Scope {
        if base.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return base;
        }
        let mut bindings = (*base.bindings).clone();
        bindings.extend(self.bindings.iter().map(|(id, cell)| (*id, cell.clone())));
        Scope {
            bindings: Arc::new(bindings),
        }
    }

    /// Run `f` with these bindings active. The previous bindings come back
    /// when `f` returns or unwinds.
    pub fn enter<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        ACTIVE.sync_scope(self.layered_over(Scope::current()), f)
    }

    /// Make these bindings active every time `fut` is polled.
    pub fn wrap<F>(&self, fut: F) -> Scoped<F>
    where
        F: Future,
    {
        Scoped {
            scope: self.clone(),
            fut: Box::pin(fut),
        }
    }

    /// Turn a callback into one that runs inside these bindings, whenever and
    /// wherever it ends up being called.
    pub fn bind_fn<F, R>(self, f: F) -> impl FnOnce() -> R
    where
        F: FnOnce() -> R,
    {
        move || self.enter(f)
    }
}

/// Future returned by [`Scope::wrap`].
///
/// The bindings are layered over the scope active at each poll, so the
/// future sees enclosing bindings of other managers wherever it is awaited.
#[must_use = "futures do nothing unless polled"]
pub struct Scoped<F> {
    scope: Scope,
    fut: Pin<Box<F>>,
}

impl<F: Future> Future for Scoped<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let fut = this.fut.as_mut();
        this.scope.enter(|| fut.poll(cx))
    }
}

impl<F> fmt::Debug for Scoped<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scoped").field("scope", &self.scope).finish_non_exhaustive()
    }
}
