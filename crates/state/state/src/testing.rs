use std::time::Duration;

use crate::error::StoreError;
use crate::store::LeaseStore;

const LEASE: Duration = Duration::from_secs(10);

/// Run the full lease store conformance test suite.
///
/// Call this from your backend's test module with a fresh handle. Every key
/// used is placed under `prefix`, so shared servers can run the suite
/// concurrently with a unique prefix per run.
///
/// # Errors
///
/// Returns an error if the store fails a call outright. Semantic violations
/// panic through `assert!`.
pub async fn run_store_conformance_tests(
    store: &dyn LeaseStore,
    prefix: &str,
) -> Result<(), StoreError> {
    test_ping(store).await?;
    test_get_missing(store, prefix).await?;
    test_set_if_absent_new(store, prefix).await?;
    test_set_if_absent_existing(store, prefix).await?;
    test_compare_and_delete(store, prefix).await?;
    test_compare_and_delete_mismatch(store, prefix).await?;
    test_compare_and_expire(store, prefix).await?;
    test_compare_and_expire_missing(store, prefix).await?;
    test_set_overwrites(store, prefix).await?;
    Ok(())
}

async fn test_ping(store: &dyn LeaseStore) -> Result<(), StoreError> {
    store.ping().await
}

async fn test_get_missing(store: &dyn LeaseStore, prefix: &str) -> Result<(), StoreError> {
    let val = store.get(&format!("{prefix}:missing")).await?;
    assert!(val.is_none(), "get on missing key should return None");
    Ok(())
}

async fn test_set_if_absent_new(store: &dyn LeaseStore, prefix: &str) -> Result<(), StoreError> {
    let key = format!("{prefix}:nx-new");
    let created = store.set_if_absent(&key, "holder-a", LEASE).await?;
    assert!(created, "set_if_absent on new key should return true");
    assert_eq!(store.get(&key).await?.as_deref(), Some("holder-a"));
    Ok(())
}

async fn test_set_if_absent_existing(
    store: &dyn LeaseStore,
    prefix: &str,
) -> Result<(), StoreError> {
    let key = format!("{prefix}:nx-existing");
    assert!(store.set_if_absent(&key, "holder-a", LEASE).await?);
    let created = store.set_if_absent(&key, "holder-b", LEASE).await?;
    assert!(!created, "set_if_absent on held key should return false");
    assert_eq!(
        store.get(&key).await?.as_deref(),
        Some("holder-a"),
        "original holder should remain"
    );
    Ok(())
}

async fn test_compare_and_delete(store: &dyn LeaseStore, prefix: &str) -> Result<(), StoreError> {
    let key = format!("{prefix}:cad");
    assert!(store.set_if_absent(&key, "holder-a", LEASE).await?);
    assert!(store.compare_and_delete(&key, "holder-a").await?);
    assert!(store.get(&key).await?.is_none(), "key should be gone");
    assert!(
        !store.compare_and_delete(&key, "holder-a").await?,
        "second delete should report nothing removed"
    );
    Ok(())
}

async fn test_compare_and_delete_mismatch(
    store: &dyn LeaseStore,
    prefix: &str,
) -> Result<(), StoreError> {
    let key = format!("{prefix}:cad-mismatch");
    store.set(&key, "holder-b", LEASE).await?;
    let removed = store.compare_and_delete(&key, "holder-a").await?;
    assert!(!removed, "delete with a foreign holder must not remove");
    assert_eq!(store.get(&key).await?.as_deref(), Some("holder-b"));
    store.compare_and_delete(&key, "holder-b").await?;
    Ok(())
}

async fn test_compare_and_expire(store: &dyn LeaseStore, prefix: &str) -> Result<(), StoreError> {
    let key = format!("{prefix}:cae");
    assert!(store.set_if_absent(&key, "holder-a", LEASE).await?);
    assert!(
        store
            .compare_and_expire(&key, "holder-a", Duration::from_secs(60))
            .await?
    );
    assert!(
        !store
            .compare_and_expire(&key, "holder-b", Duration::from_secs(60))
            .await?,
        "extend with a foreign holder must fail"
    );
    assert_eq!(store.get(&key).await?.as_deref(), Some("holder-a"));
    store.compare_and_delete(&key, "holder-a").await?;
    Ok(())
}

async fn test_compare_and_expire_missing(
    store: &dyn LeaseStore,
    prefix: &str,
) -> Result<(), StoreError> {
    let key = format!("{prefix}:cae-missing");
    let extended = store.compare_and_expire(&key, "holder-a", LEASE).await?;
    assert!(!extended, "extend on a missing key must fail");
    assert!(store.get(&key).await?.is_none(), "extend must not create the key");
    Ok(())
}

async fn test_set_overwrites(store: &dyn LeaseStore, prefix: &str) -> Result<(), StoreError> {
    let key = format!("{prefix}:overwrite");
    assert!(store.set_if_absent(&key, "holder-a", LEASE).await?);
    store.set(&key, "holder-b", LEASE).await?;
    assert_eq!(store.get(&key).await?.as_deref(), Some("holder-b"));
    store.compare_and_delete(&key, "holder-b").await?;
    Ok(())
}
