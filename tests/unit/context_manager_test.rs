//! Tests for the context manager through the crate facade

use reqctx::{Context, ContextError, ContextKey, ContextManager, Scope};
use std::time::Duration;

#[test]
fn test_run_returns_bound_context() {
    let manager = ContextManager::new();
    let ctx = manager.run(Context::new().with_req_id("r1").with_trace_id("t1"), || manager.get());
    assert_eq!(ctx, Some(Context::new().with_req_id("r1").with_trace_id("t1")));
}

#[tokio::test]
async fn test_timer_inside_run_sees_request_id() {
    let manager = ContextManager::new();
    let timer = manager.run(Context::new().with_req_id("r1"), || {
        let m = manager.clone();
        manager.spawn(async move {
            tokio::time::sleep(Duration::from_millis(2)).await;
            m.get().and_then(|ctx| ctx.req_id).map(|id| id.into_string())
        })
    });
    assert_eq!(timer.await.expect("join").as_deref(), Some("r1"));
}

#[test]
fn test_get_by_key_or_fail_without_scope_or_field() {
    let manager = ContextManager::new();
    assert_eq!(
        manager.get_by_key_or_fail(ContextKey::ReqId),
        Err(ContextError::NotInitialized)
    );

    let inside = manager.run(Context::new().with_trace_id("t1"), || {
        manager.get_by_key_or_fail(ContextKey::ReqId)
    });
    assert_eq!(inside, Err(ContextError::KeyNotFound(ContextKey::ReqId)));
}

#[tokio::test]
async fn test_set_then_scheduled_callback_sees_new_value() {
    let manager = ContextManager::new();
    let callback = manager.run(Context::new().with_req_id("r1"), || {
        manager.set(ContextKey::ReqId, "r2").expect("set");
        let m = manager.clone();
        manager.spawn(async move { m.get_by_key(ContextKey::ReqId) })
    });
    assert_eq!(callback.await.expect("join").as_deref(), Some("r2"));
}

#[test]
fn test_captured_scope_crosses_os_thread() {
    let manager = ContextManager::new();
    let scope = manager.run(Context::new().with_req_id("thread-1"), || {
        manager.current_scope().expect("scope is active")
    });

    let m = manager.clone();
    let observed = std::thread::spawn(move || scope.enter(|| m.get_by_key(ContextKey::ReqId)))
        .join()
        .expect("thread");

    assert_eq!(observed.as_deref(), Some("thread-1"));
    assert_eq!(manager.get(), None);
}

#[tokio::test]
async fn test_wrapped_future_keeps_scope_on_plain_spawn() {
    let manager = ContextManager::new();
    let m = manager.clone();
    let fut = async move {
        tokio::task::yield_now().await;
        m.get_by_key(ContextKey::TraceId)
    };

    let wrapped = manager.run(Context::new().with_trace_id("t-wrap"), || manager.bind(fut));
    let observed = tokio::spawn(wrapped).await.expect("join");
    assert_eq!(observed.as_deref(), Some("t-wrap"));
}

#[test]
fn test_scope_outside_run_is_empty() {
    let manager = ContextManager::new();
    assert!(Scope::current().is_empty());
    assert!(manager.current_scope().is_none());

    // Entering an empty scope binds nothing.
    Scope::default().enter(|| assert_eq!(manager.get(), None));
}
