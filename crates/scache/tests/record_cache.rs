//! Cache-aside behaviour of `RecordCache` over the local KV backend and the
//! in-memory store.

mod common;

use std::time::Duration;

use common::{
    Commodity, commodity, ids, record_cache, record_cache_on, record_cache_with,
    unreachable_backend, unreachable_options,
};
use scache::{CacheError, Index, OrderBys, UpdatePayload};
use scache_db_memory::StorageAdapter;

#[tokio::test]
async fn test_absent_id_is_negatively_cached() {
    let (storage, cache) = record_cache(vec![]);

    assert_eq!(cache.get(&"404".to_string()).await.unwrap(), None);
    assert_eq!(cache.get(&"404".to_string()).await.unwrap(), None);

    assert_eq!(storage.stats().gets, 1);
}

#[tokio::test]
async fn test_present_id_second_get_hits_cache() {
    let (storage, cache) = record_cache(vec![commodity("1", 1)]);

    let first = cache.get(&"1".to_string()).await.unwrap();
    let second = cache.get(&"1".to_string()).await.unwrap();

    assert_eq!(first, Some(commodity("1", 1)));
    assert_eq!(second, first);
    assert_eq!(storage.stats().gets, 1);
}

#[tokio::test]
async fn test_list_keeps_length_and_positions() {
    let (storage, cache) = record_cache(vec![commodity("1", 1), commodity("3", 3)]);
    let wanted = ids(&["3", "2", "1", "2"]);

    let rows = cache.list(&wanted).await.unwrap();
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0], commodity("3", 3));
    assert_eq!(rows[1], Commodity::default());
    assert_eq!(rows[2], commodity("1", 1));
    assert_eq!(rows[3], Commodity::default());
    assert_eq!(storage.stats().lists, 1);

    // Present and absent ids are now both cached.
    let again = cache.list(&wanted).await.unwrap();
    assert_eq!(again, rows);
    assert_eq!(storage.stats().lists, 1);
    assert_eq!(storage.stats().gets, 0);
}

#[tokio::test]
async fn test_list_only_queries_missed_ids() {
    let (storage, cache) = record_cache(vec![commodity("1", 1), commodity("2", 2)]);

    cache.get(&"1".to_string()).await.unwrap();
    cache.list(&ids(&["1", "2"])).await.unwrap();
    assert_eq!(storage.stats().lists, 1);

    let rows = cache.list(&ids(&["2", "1"])).await.unwrap();
    assert_eq!(rows, vec![commodity("2", 2), commodity("1", 1)]);
    assert_eq!(storage.stats().lists, 1);
}

#[tokio::test]
async fn test_update_moves_unique_index() {
    let (_storage, cache) = record_cache(vec![]);
    let mut copper = commodity("1", 1);
    copper.name = "copper".into();
    cache.create(&mut copper).await.unwrap();

    let found = cache.get_by(&Index::new("name", "copper")).await.unwrap();
    assert_eq!(found.map(|c| c.id), Some("1".to_string()));

    let changes = UpdatePayload::fields([("name", "zinc")]);
    assert_eq!(cache.update(&"1".to_string(), &changes).await.unwrap(), 1);

    assert_eq!(cache.get_by(&Index::new("name", "copper")).await.unwrap(), None);
    let zinc = cache
        .get_by(&Index::new("name", "zinc"))
        .await
        .unwrap()
        .expect("renamed record");
    assert_eq!(zinc.id, "1");
    assert_eq!(zinc.name, "zinc");
}

#[tokio::test]
async fn test_update_unknown_or_null_id_is_noop() {
    let (storage, cache) = record_cache(vec![]);
    let changes = UpdatePayload::fields([("category", 2)]);

    assert_eq!(cache.update(&String::new(), &changes).await.unwrap(), 0);
    assert_eq!(cache.update(&"7".to_string(), &changes).await.unwrap(), 0);
    assert_eq!(storage.stats().updates, 0);
}

#[tokio::test]
async fn test_scenario_get_create_get() {
    let (storage, cache) = record_cache(vec![]);
    let id = "1".to_string();

    assert_eq!(cache.get(&id).await.unwrap(), None);

    let mut record = commodity("1", 1);
    cache.create(&mut record).await.unwrap();

    assert_eq!(cache.get(&id).await.unwrap(), Some(commodity("1", 1)));
    assert_eq!(storage.stats().gets, 2);

    assert_eq!(cache.get(&id).await.unwrap(), Some(commodity("1", 1)));
    assert_eq!(cache.get(&id).await.unwrap(), Some(commodity("1", 1)));
    assert_eq!(storage.stats().gets, 2);
}

#[tokio::test]
async fn test_scenario_index_lookups() {
    let (storage, cache) = record_cache(vec![]);
    cache.create(&mut commodity("1", 1)).await.unwrap();

    let found = cache.get_by(&Index::new("category", 1)).await.unwrap();
    assert_eq!(found, Some(commodity("1", 1)));

    assert_eq!(cache.get_by(&Index::new("category", 100)).await.unwrap(), None);
    assert_eq!(cache.get_by(&Index::new("category", 100)).await.unwrap(), None);
    assert_eq!(storage.stats().get_bys, 2);

    let rows = cache
        .list_by(&Index::new("category", 100), &OrderBys::default())
        .await
        .unwrap();
    assert!(rows.is_empty());
    assert_eq!(storage.stats().list_bys, 0);
}

#[tokio::test]
async fn test_get_by_caches_only_the_id() {
    let (storage, cache) = record_cache(vec![commodity("1", 1)]);

    cache.get_by(&Index::new("category", 1)).await.unwrap();
    assert_eq!(storage.stats().gets, 0);

    // The index hit resolves through get, which still misses once.
    cache.get_by(&Index::new("category", 1)).await.unwrap();
    assert_eq!(storage.stats().get_bys, 1);
    assert_eq!(storage.stats().gets, 1);

    cache.get_by(&Index::new("category", 1)).await.unwrap();
    assert_eq!(storage.stats().gets, 1);
}

#[tokio::test]
async fn test_scenario_delete_then_recreate() {
    let (_storage, cache) = record_cache(vec![commodity("1", 1)]);
    let id = "1".to_string();
    cache.get(&id).await.unwrap();

    assert_eq!(cache.delete(&[id.clone()]).await.unwrap(), 1);
    assert_eq!(cache.get(&id).await.unwrap(), None);

    let mut again = commodity("1", 5);
    cache.create(&mut again).await.unwrap();
    assert_eq!(cache.get(&id).await.unwrap(), Some(commodity("1", 5)));
}

#[tokio::test]
async fn test_list_by_caches_id_order() {
    let mut a = commodity("a", 1);
    a.code = 3;
    let mut b = commodity("b", 1);
    b.code = 9;
    let mut c = commodity("c", 2);
    c.code = 5;
    let (storage, cache) = record_cache(vec![a, b, c]);
    let index = Index::new("category", 1);
    let order = OrderBys::new("code", false);

    let first = cache.list_by(&index, &order).await.unwrap();
    let first_ids: Vec<&str> = first.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(first_ids, vec!["b", "a"]);

    let second = cache.list_by(&index, &order).await.unwrap();
    assert_eq!(second, first);
    assert_eq!(storage.stats().list_bys, 1);
}

#[tokio::test]
async fn test_list_by_unique_ints_is_all_or_nothing() {
    let mut x = commodity("x", 1);
    x.code = 10;
    let mut y = commodity("y", 1);
    y.code = 20;
    let (storage, cache) = record_cache(vec![x.clone(), y.clone()]);
    let code_of = |c: &Commodity| c.code;

    let rows = cache
        .list_by_unique_ints("code", &[10, 20, 30], code_of)
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(storage.stats().list_by_uniques, 1);

    // Every key is cached now, including the negative one for 30.
    let rows = cache
        .list_by_unique_ints("code", &[20, 30, 10], code_of)
        .await
        .unwrap();
    assert_eq!(rows, vec![y.clone(), x.clone()]);
    assert_eq!(storage.stats().list_by_uniques, 1);

    // One unknown value sends the whole batch to the store.
    cache
        .list_by_unique_ints("code", &[10, 40], code_of)
        .await
        .unwrap();
    assert_eq!(storage.stats().list_by_uniques, 2);
}

#[tokio::test]
async fn test_list_by_unique_strs() {
    let (storage, cache) = record_cache(vec![commodity("1", 1), commodity("2", 2)]);
    let names = vec!["commodity-2".to_string(), "missing".to_string()];
    let name_of = |c: &Commodity| c.name.clone();

    let rows = cache
        .list_by_unique_strs("name", &names, name_of)
        .await
        .unwrap();
    assert_eq!(rows, vec![commodity("2", 2)]);

    let rows = cache
        .list_by_unique_strs("name", &names, name_of)
        .await
        .unwrap();
    assert_eq!(rows, vec![commodity("2", 2)]);
    assert_eq!(storage.stats().list_by_uniques, 1);
}

#[tokio::test]
async fn test_save_creates_then_replaces() {
    let (storage, cache) = record_cache(vec![]);
    let mut record = commodity("1", 1);
    cache.save(&mut record).await.unwrap();
    assert_eq!(storage.stats().creates, 1);

    assert!(cache.get_by(&Index::new("category", 1)).await.unwrap().is_some());

    record.category = 2;
    cache.save(&mut record).await.unwrap();
    assert_eq!(storage.stats().saves, 1);

    assert_eq!(cache.get_by(&Index::new("category", 1)).await.unwrap(), None);
    assert_eq!(cache.get(&"1".to_string()).await.unwrap(), Some(commodity("1", 2)));
}

#[tokio::test]
async fn test_delete_counts_only_existing() {
    let (storage, cache) = record_cache(vec![commodity("1", 1)]);

    let deleted = cache.delete(&ids(&["1", "9"])).await.unwrap();
    assert_eq!(deleted, 1);
    assert!(storage.is_empty().await);
}

#[tokio::test]
async fn test_clear_cache_forces_reload() {
    let (storage, cache) = record_cache(vec![commodity("1", 1)]);
    let id = "1".to_string();
    cache.get(&id).await.unwrap();
    cache.get_by(&Index::new("category", 1)).await.unwrap();

    let record = commodity("1", 1);
    let removed = cache.clear_cache(&[record.clone(), record]).await.unwrap();
    assert_eq!(removed, 2);

    cache.get(&id).await.unwrap();
    assert_eq!(storage.stats().gets, 2);
}

#[tokio::test]
async fn test_hits_slide_the_ttl() {
    let (storage, cache) = record_cache_with(vec![commodity("1", 1)], Duration::from_millis(300));
    let id = "1".to_string();

    cache.get(&id).await.unwrap();
    tokio::time::sleep(Duration::from_millis(180)).await;
    cache.get(&id).await.unwrap();
    tokio::time::sleep(Duration::from_millis(180)).await;
    cache.get(&id).await.unwrap();
    assert_eq!(storage.stats().gets, 1);

    tokio::time::sleep(Duration::from_millis(400)).await;
    cache.get(&id).await.unwrap();
    assert_eq!(storage.stats().gets, 2);
}

#[tokio::test]
async fn test_store_failure_is_propagated() {
    let (storage, cache) = record_cache(vec![commodity("1", 1)]);
    storage.set_offline(true);

    let err = cache.get(&"1".to_string()).await.unwrap_err();
    assert!(matches!(err, CacheError::Storage(_)));
    assert!(err.is_transport());
}

#[tokio::test]
async fn test_create_reports_invalidation_failure_after_store_write() {
    let (storage, cache) = record_cache_on(unreachable_backend(), unreachable_options(), vec![]);

    let err = cache.create(&mut commodity("1", 1)).await.unwrap_err();
    assert!(err.is_transport());
    assert_eq!(storage.stats().creates, 1);
    assert_eq!(
        storage.get(&"1".to_string()).await.unwrap(),
        Some(commodity("1", 1))
    );
}

#[tokio::test]
async fn test_update_and_delete_fail_before_store_write_when_kv_is_down() {
    let (storage, cache) = record_cache_on(
        unreachable_backend(),
        unreachable_options(),
        vec![commodity("1", 1)],
    );

    // The pre-image is read through the cache, so the store is never reached.
    let changes = UpdatePayload::fields([("name", "zinc")]);
    let err = cache.update(&"1".to_string(), &changes).await.unwrap_err();
    assert!(err.is_transport());

    let err = cache.delete(&ids(&["1"])).await.unwrap_err();
    assert!(err.is_transport());

    let stats = storage.stats();
    assert_eq!((stats.updates, stats.deletes), (0, 0));
    assert_eq!(
        storage.get(&"1".to_string()).await.unwrap(),
        Some(commodity("1", 1))
    );
}

#[tokio::test]
async fn test_close_delegates_to_store() {
    let (storage, cache) = record_cache(vec![]);
    cache.close().await.unwrap();
    cache.close().await.unwrap();
    assert_eq!(storage.stats().closes, 2);
    assert_eq!(storage.backend_name(), "memory");
}
