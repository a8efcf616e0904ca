use reqctx::{Context, ContextKey, ContextManager};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Seen = Arc<Mutex<HashMap<String, Vec<(String, Option<String>)>>>>;

async fn handle(manager: ContextManager, seen: Seen, step: Duration) {
    let req_id = manager.get_by_key_or_fail(ContextKey::ReqId).expect("req id");
    let record = |stage: &str| {
        let observed = manager.get_by_key(ContextKey::ReqId);
        let trace = manager.get_by_key(ContextKey::TraceId);
        seen.lock()
            .expect("lock")
            .entry(req_id.clone())
            .or_default()
            .push((format!("{stage}:{}", observed.unwrap_or_default()), trace));
    };

    record("start");
    tokio::time::sleep(step).await;
    manager
        .set(ContextKey::TraceId, format!("{req_id}-trace"))
        .expect("set trace");
    tokio::task::yield_now().await;

    let m = manager.clone();
    let child = manager.spawn_local(async move {
        tokio::task::yield_now().await;
        m.get_by_key(ContextKey::ReqId)
    });
    let child_req_id = child.await.expect("join child");
    assert_eq!(child_req_id.as_deref(), Some(req_id.as_str()));

    record("end");
}

#[tokio::test(flavor = "current_thread")]
async fn test_context_is_task_local_under_concurrency() {
    let manager = ContextManager::new();
    let seen: Seen = Arc::new(Mutex::new(HashMap::new()));
    let req_ids: Vec<String> = (0..8).map(|i| format!("req-conc-{i}")).collect();

    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let mut handles = Vec::new();
            for (idx, req_id) in req_ids.iter().enumerate() {
                let ctx = Context::new().with_req_id(req_id.as_str());
                // Later requests finish first.
                let step = Duration::from_millis(8 - idx as u64);
                let fut = handle(manager.clone(), seen.clone(), step);
                handles.push(tokio::task::spawn_local(manager.scope(ctx, fut)));
            }
            for handle in handles {
                handle.await.expect("join");
            }
        })
        .await;

    let seen = seen.lock().expect("lock");
    assert_eq!(seen.len(), req_ids.len());
    for req_id in &req_ids {
        let stages = &seen[req_id];
        assert_eq!(
            stages,
            &vec![
                (format!("start:{req_id}"), None),
                (format!("end:{req_id}"), Some(format!("{req_id}-trace"))),
            ],
            "unexpected observations for {req_id}"
        );
    }
    assert!(manager.get().is_none());
}

#[tokio::test(flavor = "current_thread")]
async fn test_two_managers_interleave_without_interference() {
    let requests = ContextManager::new();
    let jobs = ContextManager::new();

    let (a, b) = tokio::join!(
        requests.scope(Context::new().with_req_id("request"), async {
            tokio::task::yield_now().await;
            (requests.get_by_key(ContextKey::ReqId), jobs.get())
        }),
        jobs.scope(Context::new().with_req_id("job"), async {
            tokio::task::yield_now().await;
            (jobs.get_by_key(ContextKey::ReqId), requests.get())
        }),
    );

    assert_eq!(a, (Some("request".to_string()), None));
    assert_eq!(b, (Some("job".to_string()), None));
}
