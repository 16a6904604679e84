//! Lock behaviour across simulated processes sharing one in-memory store.
//!
//! Each [`Node`] has its own manager and lock, the way separate processes
//! would, while all of them talk to the same [`MemoryBackend`].

mod common;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::time::Instant;

use leasehold_lock::{
    AcquireOptions, ConnectionManager, DistributedLock, LockError, ManagerSettings, StoreError,
};
use leasehold_state::{ConnectionConfig, StoreConnector};
use leasehold_state_memory::MemoryBackend;

use common::{Node, SlowReleaseConnector, fast_settings, init_tracing};

fn lease(secs: u64) -> AcquireOptions {
    AcquireOptions::new().lease(Duration::from_secs(secs))
}

// -- Mutual Exclusion Tests --

mod exclusion {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn exactly_one_concurrent_acquirer_wins() {
        init_tracing();
        let backend = MemoryBackend::new();
        let mut nodes = Vec::new();
        for _ in 0..10 {
            nodes.push(Arc::new(Node::start(&backend).await));
        }

        let mut tasks = Vec::new();
        for node in &nodes {
            let node = Arc::clone(node);
            tasks.push(tokio::spawn(async move {
                node.lock.try_acquire("shared", lease(30)).await
            }));
        }

        let mut winners = 0;
        for task in tasks {
            if task
                .await
                .expect("task should not panic")
                .expect("store should answer")
            {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn lease_expires_without_renewal() {
        let backend = MemoryBackend::new();
        let a = Node::start(&backend).await;
        let b = Node::start(&backend).await;

        assert!(a.lock.try_acquire("k", lease(2)).await.unwrap());
        assert!(!b.lock.try_acquire("k", lease(2)).await.unwrap());

        tokio::time::sleep(Duration::from_millis(2001)).await;
        assert!(b.lock.try_acquire("k", lease(2)).await.unwrap());

        // A still believes it holds the lock until it tries to release.
        assert!(a.lock.is_locked("k").await);
        assert!(!a.lock.release("k").await);
        assert!(!a.lock.is_locked("k").await);
        assert!(b.lock.release("k").await);
    }

    #[tokio::test(start_paused = true)]
    async fn job_scenario_across_two_instances() {
        let backend = MemoryBackend::new();
        let first = Node::start(&backend).await;
        let second = Node::start(&backend).await;

        let renewing = lease(30).blocking(false).auto_renew(true);
        assert!(first.lock.acquire("job:42", renewing).await.unwrap());
        assert!(!second.lock.try_acquire("job:42", lease(30)).await.unwrap());
        assert!(first.lock.release("job:42").await);
        assert!(second.lock.try_acquire("job:42", lease(30)).await.unwrap());
    }
}

// -- Release Tests --

mod release {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn release_never_removes_a_foreign_value() {
        let backend = MemoryBackend::new();
        let node = Node::start(&backend).await;
        assert!(node.lock.try_acquire("k", lease(30)).await.unwrap());

        let key = node.lock.key_for("k");
        let store = node.manager.primary().unwrap();
        store
            .set(key.as_str(), "intruder", Duration::from_secs(30))
            .await
            .unwrap();

        assert!(!node.lock.release("k").await);
        assert_eq!(
            store.get(key.as_str()).await.unwrap().as_deref(),
            Some("intruder")
        );
        assert!(!node.lock.is_locked("k").await);
    }

    #[tokio::test(start_paused = true)]
    async fn second_release_is_a_no_op() {
        let backend = MemoryBackend::new();
        let node = Node::start(&backend).await;
        assert!(node.lock.try_acquire("k", lease(30)).await.unwrap());

        assert!(node.lock.release("k").await);
        assert!(!node.lock.release("k").await);
    }

    #[tokio::test(start_paused = true)]
    async fn store_failure_keeps_the_lock_for_a_retry() {
        let backend = MemoryBackend::new();
        let node = Node::start(&backend).await;
        assert!(node.lock.try_acquire("k", lease(30)).await.unwrap());

        backend.set_online(false);
        assert!(!node.lock.release("k").await);
        assert!(node.lock.is_locked("k").await);

        backend.set_online(true);
        assert!(node.lock.release("k").await);
        assert!(!node.lock.is_locked("k").await);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_release_does_not_block_other_keys() {
        let connector: Arc<dyn StoreConnector> = Arc::new(SlowReleaseConnector {
            backend: MemoryBackend::new(),
            delay: Duration::from_secs(2),
        });
        let settings = ManagerSettings {
            health_check_interval: Duration::from_secs(60),
            ..fast_settings()
        };
        let manager =
            ConnectionManager::with_connector(ConnectionConfig::default(), settings, connector)
                .await
                .unwrap();
        let lock = Arc::new(DistributedLock::new(Arc::new(manager)));
        assert!(lock.try_acquire("a", lease(30)).await.unwrap());

        let releasing = {
            let lock = Arc::clone(&lock);
            tokio::spawn(async move { lock.release("a").await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!releasing.is_finished());

        let answered = tokio::time::timeout(Duration::from_millis(100), async {
            let other = lock.is_locked("other").await;
            let acquired = lock.try_acquire("b", lease(30)).await.unwrap();
            (other, acquired)
        })
        .await;
        assert_eq!(answered.unwrap(), (false, true));
        assert!(lock.is_locked("a").await);

        assert!(releasing.await.unwrap());
        assert!(!lock.is_locked("a").await);
        assert!(lock.is_locked("b").await);
    }
}

// -- Watchdog Tests --

mod watchdog {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn renewal_keeps_a_short_lease_alive() {
        init_tracing();
        let backend = MemoryBackend::new();
        let a = Node::start(&backend).await;
        let b = Node::start(&backend).await;

        assert!(
            a.lock
                .try_acquire("k", lease(1).auto_renew(true))
                .await
                .unwrap()
        );
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert!(a.lock.is_renewing("k").await);
        assert!(!b.lock.try_acquire("k", lease(1)).await.unwrap());
        assert!(a.lock.release("k").await);
        assert!(!a.lock.is_renewing("k").await);
    }

    #[tokio::test(start_paused = true)]
    async fn renewal_stops_when_ownership_is_lost() {
        let backend = MemoryBackend::new();
        let node = Node::start(&backend).await;
        assert!(
            node.lock
                .try_acquire("k", lease(1).auto_renew(true))
                .await
                .unwrap()
        );
        assert!(node.lock.is_renewing("k").await);

        let key = node.lock.key_for("k");
        node.manager
            .primary()
            .unwrap()
            .set(key.as_str(), "intruder", Duration::from_secs(30))
            .await
            .unwrap();

        // One renewal interval is a third of the lease.
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(!node.lock.is_renewing("k").await);
        assert!(!node.lock.release("k").await);
    }

    #[tokio::test(start_paused = true)]
    async fn reacquire_replaces_a_dead_watchdog() {
        let backend = MemoryBackend::new();
        let node = Node::start(&backend).await;
        let renewing = lease(1).auto_renew(true);
        assert!(node.lock.try_acquire("k", renewing.clone()).await.unwrap());
        let first_holder = node.lock.holder("k").await.unwrap();

        let key = node.lock.key_for("k");
        node.manager
            .primary()
            .unwrap()
            .set(key.as_str(), "intruder", Duration::from_millis(500))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(!node.lock.is_renewing("k").await);

        assert!(node.lock.try_acquire("k", renewing).await.unwrap());
        assert!(node.lock.is_renewing("k").await);
        assert_ne!(node.lock.holder("k").await.unwrap(), first_holder);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(node.lock.release("k").await);
    }
}

// -- Blocking Acquisition Tests --

mod blocking {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn blocking_acquire_gives_up_at_the_timeout() {
        let backend = MemoryBackend::new();
        let a = Node::start(&backend).await;
        let b = Node::start(&backend).await;
        assert!(a.lock.try_acquire("k", lease(30)).await.unwrap());

        let started = Instant::now();
        let acquired = b
            .lock
            .acquire("k", lease(30).timeout(Duration::from_millis(500)))
            .await
            .unwrap();
        let waited = started.elapsed();

        assert!(!acquired);
        assert!(waited >= Duration::from_millis(500));
        assert!(waited < Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn blocking_acquire_succeeds_once_the_lease_expires() {
        let backend = MemoryBackend::new();
        let a = Node::start(&backend).await;
        let b = Node::start(&backend).await;
        assert!(a.lock.try_acquire("k", lease(1)).await.unwrap());

        let started = Instant::now();
        assert!(b.lock.acquire("k", lease(30)).await.unwrap());
        assert!(started.elapsed() >= Duration::from_secs(1));
        assert!(b.lock.is_locked("k").await);
    }
}

// -- Scoped Acquisition Tests --

mod scoped {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn body_runs_and_lock_is_released() {
        let backend = MemoryBackend::new();
        let node = Node::start(&backend).await;
        let key = node.lock.key_for("k");

        let value = node
            .lock
            .scoped("k", lease(30), || async { 7 })
            .await
            .unwrap();

        assert_eq!(value, 7);
        assert!(!node.lock.is_locked("k").await);
        let stored = node.manager.primary().unwrap().get(key.as_str()).await;
        assert_eq!(stored.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn early_error_return_still_releases() {
        let backend = MemoryBackend::new();
        let node = Node::start(&backend).await;

        let outcome: Result<(), &str> = node
            .lock
            .scoped("k", lease(30), || async { Err("bail out") })
            .await
            .unwrap();

        assert_eq!(outcome, Err("bail out"));
        assert!(!node.lock.is_locked("k").await);
    }

    #[tokio::test(start_paused = true)]
    async fn panic_in_body_releases_then_propagates() {
        let backend = MemoryBackend::new();
        let a = Node::start(&backend).await;
        let b = Node::start(&backend).await;

        let result = AssertUnwindSafe(a.lock.scoped::<_, _, ()>(
            "k",
            lease(30).auto_renew(true),
            || async { panic!("critical section failed") },
        ))
        .catch_unwind()
        .await;

        assert!(result.is_err());
        assert!(!a.lock.is_locked("k").await);
        assert!(b.lock.try_acquire("k", lease(30)).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn contention_is_not_acquired() {
        let backend = MemoryBackend::new();
        let a = Node::start(&backend).await;
        let b = Node::start(&backend).await;
        assert!(a.lock.try_acquire("k", lease(30)).await.unwrap());

        let err = b
            .lock
            .scoped::<_, _, ()>("k", lease(30).blocking(false), || async {
                unreachable!("body must not run without the lock")
            })
            .await
            .unwrap_err();

        assert!(matches!(err, LockError::NotAcquired { ref key } if key == "k"));
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_scope_stops_renewal() {
        let backend = MemoryBackend::new();
        let a = Node::start(&backend).await;
        let b = Node::start(&backend).await;

        let scope = a.lock.scoped("k", lease(1).auto_renew(true), || async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        });
        let timed_out = tokio::time::timeout(Duration::from_millis(500), scope).await;
        assert!(timed_out.is_err());

        // Let the cancelled watchdog observe its token.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!a.lock.is_renewing("k").await);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(b.lock.try_acquire("k", lease(30)).await.unwrap());
    }
}

// -- Lifecycle Tests --

mod lifecycle {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn acquire_after_shutdown_reports_closed_store() {
        let backend = MemoryBackend::new();
        let node = Node::start(&backend).await;
        node.manager.shutdown().await;

        let err = node.lock.try_acquire("k", lease(30)).await.unwrap_err();
        assert!(matches!(err, LockError::Store(StoreError::Closed)));
    }

    #[tokio::test(start_paused = true)]
    async fn locks_follow_a_reconnected_manager() {
        let backend = MemoryBackend::new();
        let node = Node::start(&backend).await;
        assert!(node.lock.try_acquire("k", lease(30)).await.unwrap());

        node.manager.primary().unwrap().close().await;
        assert!(node.manager.reconnect().await);

        assert!(node.lock.release("k").await);
    }
}
