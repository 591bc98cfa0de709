//! Integration tests for the MongoDB-backed lease lock.
//!
//! Require a running server; run with `cargo test -- --ignored` and set
//! `MONGODB_URI` if the server is not on localhost.

use std::sync::Arc;
use std::time::Duration;

use lease_lock::{ExitHandler, LeaseLock, LockConfig, MongoLockStore};

mod common;
use common::mock_store::MockExit;

fn get_mongo_uri() -> String {
    std::env::var("MONGODB_URI").unwrap_or_else(|_| "mongodb://localhost:27017".to_string())
}

fn unique_name(prefix: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{prefix}-{}-{nanos}", std::process::id())
}

fn test_config(name: &str, owner: &str) -> LockConfig {
    let mut cfg = LockConfig::new(name);
    cfg.instance_id = owner.to_string();
    cfg.lease = Duration::from_secs(5);
    cfg.heartbeat_interval = Duration::from_secs(1);
    cfg.backoff_min = Duration::from_millis(100);
    cfg.backoff_max = Duration::from_millis(300);
    cfg
}

async fn connect() -> MongoLockStore {
    MongoLockStore::connect(&get_mongo_uri(), "test_lease_locks", None)
        .await
        .expect("failed to connect to MongoDB")
}

#[tokio::test]
#[ignore] // Requires MongoDB server running
async fn mongo_acquire_contend_release() {
    let name = unique_name("acquire-release");
    let store = connect().await;

    let a = LeaseLock::new(store.clone(), test_config(&name, "instance-a"))
        .await
        .expect("prepare failed");
    let b = LeaseLock::new(store.clone(), test_config(&name, "instance-b"))
        .await
        .expect("prepare failed");

    assert!(a.try_acquire_once().await.unwrap());
    assert!(!b.try_acquire_once().await.unwrap());

    // Same-owner re-entrance still succeeds.
    assert!(a.try_acquire_once().await.unwrap());

    a.release().await;
    assert!(b.try_acquire_once().await.unwrap());
    b.release().await;
}

#[tokio::test]
#[ignore] // Requires MongoDB server running
async fn mongo_heartbeat_keeps_holding_past_the_original_lease() {
    let name = unique_name("heartbeat");
    let store = connect().await;

    struct PanicExit;
    impl ExitHandler for PanicExit {
        fn exit(&self, code: i32) {
            panic!("unexpected termination with code {code}");
        }
    }

    let a = LeaseLock::new(store.clone(), test_config(&name, "instance-a"))
        .await
        .expect("prepare failed")
        .with_exit_handler(Arc::new(PanicExit));
    let b = LeaseLock::new(store.clone(), test_config(&name, "instance-b"))
        .await
        .expect("prepare failed");

    assert!(a.try_acquire_once().await.unwrap());
    a.start_heartbeat();

    // Well past the 5s lease: renewals must have kept the competitor out.
    tokio::time::sleep(Duration::from_secs(7)).await;
    assert!(!b.try_acquire_once().await.unwrap());

    a.release().await;
}

#[tokio::test]
#[ignore] // Requires MongoDB server running
async fn mongo_release_frees_the_name_for_a_competitor() {
    let name = unique_name("takeover");
    let store = connect().await;

    let exit = Arc::new(MockExit::new());
    let a = LeaseLock::new(store.clone(), test_config(&name, "instance-a"))
        .await
        .expect("prepare failed")
        .with_exit_handler(exit.clone());

    let mut cfg_b = test_config(&name, "instance-b");
    cfg_b.lease = Duration::from_secs(30);
    let b = LeaseLock::new(store.clone(), cfg_b)
        .await
        .expect("prepare failed");

    assert!(a.try_acquire_once().await.unwrap());
    a.start_heartbeat();
    a.release().await; // stops renewing and drops the record

    // b claims the freed name; a's identity no longer matches and the
    // unexpired record keeps a out.
    assert!(b.try_acquire_once().await.unwrap());
    assert!(!a.try_acquire_once().await.unwrap());

    b.release().await;
    assert_eq!(exit.calls(), 0);
}
