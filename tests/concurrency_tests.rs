// Optimistic concurrency: racing transitions on one service have one winner

mod fixtures;

use fixtures::{service_data, BarrierStore};
use services_cms::domain::{LifecycleItem, LifecycleRuntime};
use services_cms::fsm::FsmRuntime;
use services_cms::{
    lifecycle_table, FileSystemStore, FsmError, InMemoryStore, LifecycleAction, LifecycleState,
    Service, StoreError, VersionedStore,
};
use std::sync::Arc;
use tempfile::TempDir;

fn runtime_over(store: Arc<dyn VersionedStore<LifecycleItem>>) -> LifecycleRuntime {
    FsmRuntime::new(lifecycle_table().unwrap(), store)
}

/// Submit and delete are both legal from draft; run them against the same read
async fn race_submit_and_delete<S>(inner: Arc<S>)
where
    S: VersionedStore<LifecycleItem> + 'static,
{
    let seeding = runtime_over(inner.clone());
    seeding
        .apply(
            "S1",
            LifecycleAction::Create {
                data: service_data("Recycling"),
            },
        )
        .await
        .unwrap();

    let racing = Arc::new(runtime_over(Arc::new(BarrierStore::new(inner.clone(), 2))));
    let submit = {
        let racing = racing.clone();
        tokio::spawn(async move { racing.apply("S1", LifecycleAction::Submit).await })
    };
    let delete = {
        let racing = racing.clone();
        tokio::spawn(async move { racing.apply("S1", LifecycleAction::Delete).await })
    };
    let results = [submit.await.unwrap(), delete.await.unwrap()];

    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1, "exactly one transition commits");
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(FsmError::Conflict { .. }))));

    let stored = inner.fetch("S1").await.unwrap().unwrap();
    assert_eq!(stored.version, winners[0].version);
    assert_eq!(stored.document.state(), winners[0].document.state());
    assert!(matches!(
        stored.document.state(),
        LifecycleState::Submitted | LifecycleState::Deleted
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_in_memory_race_has_one_winner() {
    race_submit_and_delete(Arc::new(InMemoryStore::<LifecycleItem>::new())).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_filesystem_race_has_one_winner() {
    let dir = TempDir::new().unwrap();
    let store = FileSystemStore::<LifecycleItem>::open(dir.path()).unwrap();
    race_submit_and_delete(Arc::new(store)).await;
}

#[tokio::test]
async fn test_concurrent_creation_has_one_winner() {
    let inner = Arc::new(InMemoryStore::<LifecycleItem>::new());
    let racing = Arc::new(runtime_over(Arc::new(BarrierStore::new(inner.clone(), 2))));

    let first = {
        let racing = racing.clone();
        tokio::spawn(async move {
            racing
                .apply("S1", LifecycleAction::Create { data: service_data("First") })
                .await
        })
    };
    let second = {
        let racing = racing.clone();
        tokio::spawn(async move {
            racing
                .apply("S1", LifecycleAction::Create { data: service_data("Second") })
                .await
        })
    };
    let results = [first.await.unwrap(), second.await.unwrap()];

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    let stored = inner.fetch("S1").await.unwrap().unwrap();
    let winner = results.iter().find_map(|r| r.as_ref().ok()).unwrap();
    assert_eq!(stored.document.item.data.name, winner.document.item.data.name);
}

#[tokio::test]
async fn test_conflicting_delete_scenario() {
    // Both callers read S2 at the same version; the delete lands first
    let store = InMemoryStore::<LifecycleItem>::new();
    let mut seed = LifecycleItem::new(
        Service::new("S2", service_data("Parking permits")),
        LifecycleState::Approved,
    );
    let v3 = store.save("S2", seed.clone(), None).await.unwrap();

    let read_by_a = store.fetch("S2").await.unwrap().unwrap();
    let read_by_b = store.fetch("S2").await.unwrap().unwrap();
    assert_eq!(read_by_a.version, v3.version);
    assert_eq!(read_by_b.version, v3.version);

    seed.fsm.state = LifecycleState::Deleted;
    let v4 = store
        .save("S2", seed.clone(), Some(&read_by_a.version))
        .await
        .unwrap();
    assert_ne!(v4.version, v3.version);

    let mut approved = read_by_b.document.clone();
    approved.fsm.state = LifecycleState::Approved;
    let err = store
        .save("S2", approved, Some(&read_by_b.version))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict { .. }));
    assert_eq!(
        FsmError::from(err).kind(),
        "conflict",
        "surfaces to callers as a conflict"
    );

    let stored = store.fetch("S2").await.unwrap().unwrap();
    assert_eq!(stored.document.state(), LifecycleState::Deleted);
    assert_eq!(stored.version, v4.version);
}

#[tokio::test]
async fn test_stale_runtime_read_is_a_conflict_not_an_overwrite() {
    let store = Arc::new(InMemoryStore::<LifecycleItem>::new());
    let runtime = runtime_over(store.clone());
    runtime
        .apply("S3", LifecycleAction::Create { data: service_data("Library") })
        .await
        .unwrap();

    let stale = store.fetch("S3").await.unwrap().unwrap();
    runtime.apply("S3", LifecycleAction::Submit).await.unwrap();

    let mut overwrite = stale.document.clone();
    overwrite.fsm.state = LifecycleState::Deleted;
    let err = store
        .save("S3", overwrite, Some(&stale.version))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict { .. }));
    assert_eq!(
        store.fetch("S3").await.unwrap().unwrap().document.state(),
        LifecycleState::Submitted
    );
}
