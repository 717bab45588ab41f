//! Walk a quorum lock through acquire, extend, replica failure and release
//! against five in-memory replicas.
//!
//! Run with `cargo run --example quorum`.

use redlock_rust::{InMemoryStore, LockManager, LockOptions, LockStore};
use std::sync::Arc;
use std::time::Duration;

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let replicas: Vec<InMemoryStore> = (0..5).map(|_| InMemoryStore::new()).collect();
    let stores: Vec<Arc<dyn LockStore>> = replicas
        .iter()
        .map(|r| Arc::new(r.clone()) as Arc<dyn LockStore>)
        .collect();

    let options = LockOptions::default()
        .with_expiry(Duration::from_secs(2))
        .with_tries(3)
        .with_constant_retry_delay(Duration::from_millis(100));
    let manager = LockManager::with_options(stores, options);
    println!(
        "{} replicas, quorum {}",
        manager.replica_count(),
        manager.quorum()
    );

    let mut lock = manager.new_lock("invoice:1001");
    if let Err(err) = lock.lock() {
        eprintln!("{}", err);
        return;
    }
    println!("acquired, valid for {:?}", lock.remaining());

    replicas[0].set_online(false);
    replicas[1].set_online(false);
    println!("two replicas down, extend: {}", lock.extend());

    let mut rival = manager.new_lock("invoice:1001");
    match rival.lock() {
        Ok(()) => println!("rival acquired the lock (unexpected)"),
        Err(err) => println!("rival: {}", err),
    }

    replicas[2].set_online(false);
    println!("three replicas down, unlock: {}", lock.unlock());

    replicas.iter().for_each(|r| r.set_online(true));
    println!("replicas back, unlock: {}", lock.unlock());
}
