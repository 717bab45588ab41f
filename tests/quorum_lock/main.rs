
use redlock_rust::{LockError, LockManager, LockSettings, LockStore, TokenError};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use support::{fast_options, Cluster};

// =============================================================================
// Quorum
// =============================================================================

#[test]
fn quorum_is_majority_of_replicas() {
    assert_eq!(Cluster::new(1, fast_options()).manager.quorum(), 1);
    assert_eq!(Cluster::new(3, fast_options()).manager.quorum(), 2);
    assert_eq!(Cluster::new(5, fast_options()).manager.quorum(), 3);
}

#[test]
fn two_of_three_replicas_is_enough() {
    let cluster = Cluster::new(3, fast_options().with_tries(1));
    cluster.take_offline(1);

    let mut lock = cluster.manager.new_lock("orders");
    lock.lock().unwrap();

    assert!(lock.is_valid());
    assert_eq!(cluster.holders("orders", lock.token().unwrap()), 2);
}

#[test]
fn one_of_three_replicas_fails_and_cleans_up() {
    let cluster = Cluster::new(3, fast_options().with_tries(1));
    cluster.take_offline(2);

    let mut lock = cluster.manager.new_lock("orders");
    let err = lock.lock().unwrap_err();

    assert_eq!(
        err,
        LockError::AcquireFailed {
            name: "orders".into(),
            tries: 1
        }
    );
    assert!(!lock.is_locked());
    // Cleanup reached every replica, and the one live replica no longer holds the key.
    assert!(cluster.replicas.iter().all(|r| r.stats().deletes == 1));
    assert_eq!(cluster.replicas[2].get("orders"), None);
}

// =============================================================================
// Acquire timing
// =============================================================================

#[test]
fn deadline_accounts_for_elapsed_time_and_drift() {
    let options = fast_options()
        .with_expiry(Duration::from_millis(1000))
        .with_drift_factor(0.01)
        .with_tries(1);
    let cluster = Cluster::new(3, options);
    cluster.set_latency(Duration::from_millis(10));

    let mut lock = cluster.manager.new_lock("report");
    let before = Instant::now();
    lock.lock().unwrap();
    let after = Instant::now();

    // until = end + 1000 - elapsed - 10, which is at most end + 980.
    let until = lock.until().unwrap();
    assert!(until <= after + Duration::from_millis(980));
    assert!(until >= before + Duration::from_millis(970));
    assert!(lock.remaining() <= Duration::from_millis(980));
}

#[test]
fn quorum_reached_too_late_is_a_failure() {
    let options = fast_options()
        .with_expiry(Duration::from_millis(100))
        .with_drift_factor(0.5)
        .with_tries(1);
    let cluster = Cluster::new(3, options);
    cluster.set_latency(Duration::from_millis(60));

    let mut lock = cluster.manager.new_lock("slow");
    assert!(matches!(lock.lock(), Err(LockError::AcquireFailed { .. })));

    // Every replica accepted the key, and every replica was cleaned up again.
    assert!(cluster.replicas.iter().all(|r| r.stats().sets == 1));
    assert!(cluster.replicas.iter().all(|r| r.stats().deletes == 1));
    assert!(cluster.replicas.iter().all(|r| r.get("slow").is_none()));
}

#[test]
fn exhausts_every_try_with_delay_between() {
    let delays = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&delays);
    let options = fast_options().with_tries(4).with_retry_delay(move |attempt| {
        recorded.lock().unwrap().push(attempt);
        Duration::from_millis(5)
    });
    let cluster = Cluster::new(3, options);
    cluster.take_offline(3);

    let mut lock = cluster.manager.new_lock("never");
    let start = Instant::now();
    let err = lock.lock().unwrap_err();

    assert_eq!(
        err,
        LockError::AcquireFailed {
            name: "never".into(),
            tries: 4
        }
    );
    assert_eq!(*delays.lock().unwrap(), vec![1, 2, 3]);
    assert!(start.elapsed() >= Duration::from_millis(15));
    for replica in &cluster.replicas {
        assert_eq!(replica.stats().sets, 4);
        assert_eq!(replica.stats().deletes, 4);
    }
}

#[test]
fn retry_succeeds_once_replicas_return() {
    let cluster = Cluster::new(3, fast_options().with_tries(500));
    cluster.take_offline(2);

    let (tx, rx) = mpsc::channel();
    let manager = cluster.manager.clone();
    let handle = thread::spawn(move || {
        let mut lock = manager.new_lock("recovering");
        let result = lock.lock();
        tx.send(()).unwrap();
        (result, lock)
    });

    thread::sleep(Duration::from_millis(10));
    cluster.replicas[0].set_online(true);
    rx.recv_timeout(Duration::from_secs(5))
        .expect("lock never finished");

    let (result, lock) = handle.join().unwrap();
    result.unwrap();
    assert!(lock.is_valid());
    assert!(cluster.replicas[0].stats().sets > 1);
}

#[test]
fn token_generation_failure_surfaces_immediately() {
    let options = fast_options().with_token_generator(|| Err(TokenError("no entropy".into())));
    let cluster = Cluster::new(3, options);

    let mut lock = cluster.manager.new_lock("tokens");
    let err = lock.lock().unwrap_err();

    assert_eq!(err, LockError::Generation(TokenError("no entropy".into())));
    assert!(err.to_string().contains("no entropy"));
    assert!(cluster.replicas.iter().all(|r| r.stats().sets == 0));
}

// =============================================================================
// Mutual exclusion
// =============================================================================

#[test]
fn second_lock_on_same_name_fails_while_held() {
    let cluster = Cluster::new(3, fast_options());

    let mut first = cluster.manager.new_lock("account:7");
    let mut second = cluster.manager.new_lock("account:7");

    first.lock().unwrap();
    assert!(second.lock().is_err());
    assert_eq!(cluster.holders("account:7", first.token().unwrap()), 3);

    assert!(first.unlock());
    second.lock().unwrap();
    assert!(second.is_valid());
}

#[test]
fn different_names_do_not_contend() {
    let cluster = Cluster::new(3, fast_options().with_tries(1));

    let mut a = cluster.manager.new_lock("a");
    let mut b = cluster.manager.new_lock("b");
    a.lock().unwrap();
    b.lock().unwrap();

    assert_ne!(a.token(), b.token());
}

#[test]
fn concurrent_contenders_never_both_win() {
    let cluster = Cluster::new(5, fast_options().with_tries(5));
    let manager = Arc::new(cluster.manager.clone());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let manager = Arc::clone(&manager);
            thread::spawn(move || {
                let mut lock = manager.new_lock("contended");
                lock.lock().ok().map(|_| lock)
            })
        })
        .collect();

    let winners: Vec<_> = handles
        .into_iter()
        .filter_map(|h| h.join().unwrap())
        .collect();

    assert!(winners.len() <= 1);
    if let Some(winner) = winners.first() {
        assert!(cluster.holders("contended", winner.token().unwrap()) >= 3);
    }
}

// =============================================================================
// Fault tolerance
// =============================================================================

#[test]
fn five_replicas_tolerate_two_failures() {
    let cluster = Cluster::new(5, fast_options());
    cluster.take_offline(2);

    let mut lock = cluster.manager.new_lock("ledger");
    lock.lock().unwrap();
    assert!(lock.extend());
    assert!(lock.unlock());
    assert!(cluster.replicas.iter().all(|r| r.get("ledger").is_none()));
}

#[test]
fn five_replicas_do_not_tolerate_three_failures() {
    let cluster = Cluster::new(5, fast_options());
    cluster.take_offline(3);

    let mut lock = cluster.manager.new_lock("ledger");
    assert!(lock.lock().is_err());
}

#[test]
fn replica_losing_its_keys_is_survivable() {
    let cluster = Cluster::new(3, fast_options());
    let mut lock = cluster.manager.new_lock("cache");
    lock.lock().unwrap();

    cluster.replicas[0].clear();
    assert!(lock.extend());

    cluster.replicas[1].clear();
    assert!(!lock.extend());
}

// =============================================================================
// Release and extend
// =============================================================================

#[test]
fn stale_holder_cannot_release_or_extend_new_holder() {
    let short = fast_options().with_expiry(Duration::from_millis(80));
    let cluster = Cluster::new(3, fast_options());

    let mut stale = cluster.manager.new_lock_with("job", short);
    stale.lock().unwrap();
    thread::sleep(Duration::from_millis(120));
    assert!(!stale.is_valid());
    assert!(stale.is_locked());

    let mut current = cluster.manager.new_lock("job");
    current.lock().unwrap();
    let token = current.token().unwrap().to_string();
    let ttls: Vec<_> = cluster.replicas.iter().map(|r| r.ttl("job").unwrap()).collect();

    assert!(!stale.unlock());
    assert!(!stale.extend());

    assert_eq!(cluster.holders("job", &token), 3);
    for (replica, before) in cluster.replicas.iter().zip(ttls) {
        assert!(replica.ttl("job").unwrap() <= before);
    }
}

#[test]
fn mismatched_token_delete_is_noop_on_every_replica() {
    let cluster = Cluster::new(3, fast_options());
    let mut lock = cluster.manager.new_lock("owned");
    lock.lock().unwrap();

    for replica in &cluster.replicas {
        assert!(!replica.conditional_delete("owned", "intruder").unwrap());
        assert!(!replica
            .conditional_extend("owned", "intruder", Duration::from_secs(60))
            .unwrap());
    }
    assert_eq!(cluster.holders("owned", lock.token().unwrap()), 3);
}

#[test]
fn extend_refreshes_replica_ttl_and_local_deadline() {
    let cluster = Cluster::new(3, fast_options().with_expiry(Duration::from_millis(400)));
    let mut lock = cluster.manager.new_lock("lease");
    lock.lock().unwrap();
    let first = lock.until().unwrap();

    thread::sleep(Duration::from_millis(200));
    assert!(lock.extend());

    assert!(lock.until().unwrap() > first);
    for replica in &cluster.replicas {
        assert!(replica.ttl("lease").unwrap() > Duration::from_millis(300));
    }
}

#[test]
fn unlock_clears_local_state() {
    let cluster = Cluster::new(3, fast_options());
    let mut lock = cluster.manager.new_lock("session");
    lock.lock().unwrap();

    assert!(lock.unlock());
    assert!(!lock.is_locked());
    assert_eq!(lock.token(), None);
    assert_eq!(lock.until(), None);

    // A second unlock is a caller error: reported, never sent to replicas.
    assert!(!lock.unlock());
    assert!(cluster.replicas.iter().all(|r| r.stats().deletes == 1));
}

#[test]
fn expired_lock_is_still_locked_but_not_valid() {
    let cluster = Cluster::new(3, fast_options().with_expiry(Duration::from_millis(50)));
    let mut lock = cluster.manager.new_lock("ttl");
    lock.lock().unwrap();

    thread::sleep(Duration::from_millis(80));
    assert!(lock.is_locked());
    assert!(!lock.is_valid());
    assert_eq!(lock.remaining(), Duration::ZERO);
    assert!(cluster.replicas.iter().all(|r| r.get("ttl").is_none()));
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn manager_from_json_settings() {
    let settings =
        LockSettings::from_json(r#"{ "expiry_ms": 1200, "tries": 2, "retry_delay_ms": 1 }"#)
            .unwrap();
    let stores: Vec<Arc<dyn LockStore>> = Cluster::new(3, fast_options())
        .replicas
        .into_iter()
        .map(|r| Arc::new(r) as Arc<dyn LockStore>)
        .collect();
    let manager = LockManager::with_options(stores, settings.into_options());

    let mut lock = manager.new_lock("configured");
    lock.lock().unwrap();
    assert!(lock.remaining() <= Duration::from_millis(1200));
    assert_eq!(lock.options().tries, 2);
}
