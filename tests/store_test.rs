mod common;

use assert2::{check, let_assert};
use common::TempShards;
use std::sync::Arc;
use symbol_search::{ShardId, ShardLoadError, ShardStore};

fn functions(partition: u32) -> ShardId {
    ShardId::new("functions", partition)
}

#[tokio::test]
async fn test_loads_real_shard_from_disk() {
    let shards = TempShards::new();
    shards.write("functions_5", &common::functions_5());
    let store = ShardStore::new(shards.loader());

    let_assert!(Ok(index) = store.get(&functions(5)).await);
    check!(index.len() == 19);
    check!(index.id() == &functions(5));

    let_assert!(Some(fill) = index.get("fill"));
    check!(fill.display_name == "fill");
    check!(fill.occurrences.len() == 14);
    check!(fill.occurrences.iter().all(|o| o.opens_in_parent));
    check!(fill.occurrences[7].scope_label == "Sifteo::Colormap::fill");

    let keys: Vec<&str> = index.lookup_prefix("fix").iter().map(|e| e.key.as_str()).collect();
    check!(keys == ["fixed", "fixedfp"]);

    let_assert!(Some(full) = index.get("full"));
    check!(full.occurrences[0].scope_label == "Sifteo::UsbQueue");
    check!(full.occurrences[0].signature_hint.is_none());
}

#[tokio::test]
async fn test_concurrent_requests_read_the_file_once() {
    let shards = TempShards::new();
    shards.write("functions_5", &common::functions_5());
    let store = ShardStore::new(shards.loader());

    let id = functions(5);
    let results = futures::future::join_all((0..8).map(|_| store.get(&id))).await;
    let first = results[0].as_ref().unwrap();
    check!(results.iter().all(|r| Arc::ptr_eq(r.as_ref().unwrap(), first)));

    let stats = store.stats().await;
    check!(stats.loads == 1);
    check!(stats.cached == 1);
    check!(stats.in_flight == 0);
}

#[tokio::test]
async fn test_missing_and_malformed_shards() {
    let shards = TempShards::new();
    shards.write("functions_1", "var searchData=[['b',['b',['../b.html',1,'B']]];");
    let store = ShardStore::new(shards.loader());

    let_assert!(Err(ShardLoadError::NotFound { shard, .. }) = store.get(&functions(0)).await);
    check!(shard == functions(0));

    let_assert!(Err(ShardLoadError::Parse(_)) = store.get(&functions(1)).await);
    check!(store.cached_ids().await.is_empty());
    check!(store.stats().await.failures == 2);
}

#[tokio::test]
async fn test_preload_warms_every_readable_shard() {
    let shards = TempShards::new();
    shards.write("functions_5", &common::functions_5());
    shards.write("functions_0", "var searchData=\n[\n  ['abs',['abs',['../m.html#a',1,'Sifteo::abs(int x)']]]\n];\n");
    let store = ShardStore::new(shards.loader());

    let ids = common::functions_router().all_shards(&[]);
    store.preload(&ids).await;

    check!(store.cached_ids().await == vec![functions(0), functions(5)]);
    check!(store.stats().await.failures == (ids.len() - 2) as u64);
}

#[tokio::test]
async fn test_deeply_nested_shard_fails_alone() {
    let shards = TempShards::new();
    shards.write("functions_5", &common::functions_5());
    shards.write("functions_6", &format!("var searchData={};", "[".repeat(200_000)));
    let store = ShardStore::new(shards.loader());

    let_assert!(Err(ShardLoadError::Parse(e)) = store.get(&functions(6)).await);
    check!(e.to_string().contains("nesting too deep"));
    let_assert!(Ok(index) = store.get(&functions(5)).await);
    check!(index.len() == 19);
}
