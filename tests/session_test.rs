mod common;

use assert2::{check, let_assert};
use common::{GatedLoader, recording_session};
use std::sync::Arc;
use std::time::Duration;
use symbol_search::config::CategoryConfig;
use symbol_search::{
    MatchKind, SearchSession, SessionOptions, SessionState, ShardId, ShardRouter, ShardStore,
};

fn functions(partition: u32) -> ShardId {
    ShardId::new("functions", partition)
}

#[tokio::test]
async fn test_superseded_revision_is_never_presented() {
    let loader = Arc::new(
        GatedLoader::new()
            .with_shard(functions(5), common::functions_5())
            .with_gate(functions(5)),
    );
    let (session, presenter) = recording_session(loader.clone(), SessionOptions::default());

    let_assert!(Some(first) = session.on_input("fil"));
    let_assert!(Some(second) = session.on_input("fill"));
    check!(session.state() == SessionState::Pending(second));

    loader.release(&functions(5));
    let results = presenter.wait_for(second).await;
    check!(results.query == "fill");
    check!(results.groups[0].display_name == "fill");

    // Both revisions shared one load of the shard.
    tokio::time::sleep(Duration::from_millis(50)).await;
    check!(loader.calls() == 1);
    check!(presenter.presented_ids() == vec![second]);
    check!(!presenter.presented_ids().contains(&first));
}

#[tokio::test]
async fn test_late_result_of_older_query_is_discarded() {
    let loader = Arc::new(
        GatedLoader::new()
            .with_shard(functions(0), "[['abs',['abs',['../m.html#a',1,'Sifteo::abs(int x)']]]]")
            .with_shard(functions(5), common::functions_5())
            .with_gate(functions(0)),
    );
    let (session, presenter) = recording_session(loader.clone(), SessionOptions::default());

    let_assert!(Some(older) = session.on_input("abs"));
    let_assert!(Some(newer) = session.on_input("fixed"));
    let results = presenter.wait_for(newer).await;
    check!(results.groups[0].display_name == "Fixed");

    // Let the older revision finish after the newer one settled.
    loader.release(&functions(0));
    let_assert!(Ok(_) = session.store().get(&functions(0)).await);
    tokio::time::sleep(Duration::from_millis(50)).await;

    check!(presenter.presented_ids() == vec![newer]);
    check!(older < newer);
    let_assert!(SessionState::Settled(id, settled) = session.state());
    check!(id == newer);
    check!(settled.query == "fixed");
}

#[tokio::test]
async fn test_real_shard_ranking() {
    let loader = Arc::new(GatedLoader::new().with_shard(functions(5), common::functions_5()));
    let (session, presenter) = recording_session(loader, SessionOptions::default());

    let_assert!(Some(id) = session.on_input("fill"));
    let results = presenter.wait_for(id).await;

    let names: Vec<&str> = results.groups.iter().map(|g| g.display_name.as_str()).collect();
    check!(names == ["fill", "filled", "fillMask"]);
    check!(results.groups[0].match_kind == MatchKind::Exact);
    check!(results.groups[1].match_kind == MatchKind::Prefix);

    let fill = &results.groups[0];
    check!(fill.occurrences.len() == 14);
    check!(fill.occurrences[0].anchor_url.ends_with("#abbdad115fa1975b04ac99e389836fe8a"));
    check!(fill.occurrences[0].scope_label == "Sifteo::BG0Drawable::fill");
    check!(
        fill.occurrences[0].signature_hint.as_deref()
            == Some("(UInt2 topLeft, UInt2 size, unsigned tileIndex)")
    );

    let_assert!(Some(id) = session.on_input("  FIXED "));
    let results = presenter.wait_for(id).await;
    let names: Vec<&str> = results.groups.iter().map(|g| g.display_name.as_str()).collect();
    check!(names == ["Fixed", "FixedFP"]);
}

#[tokio::test]
async fn test_max_results_truncates_after_ranking() {
    let loader = Arc::new(GatedLoader::new().with_shard(functions(5), common::functions_5()));
    let options = SessionOptions {
        max_results: 2,
        ..SessionOptions::default()
    };
    let (session, presenter) = recording_session(loader, options);

    let_assert!(Some(id) = session.on_input("f"));
    let results = presenter.wait_for(id).await;
    let names: Vec<&str> = results.groups.iter().map(|g| g.display_name.as_str()).collect();
    // Shortest prefix matches win; "ffs" sorts before "fill" at equal length.
    check!(names == ["ffs", "fill"]);
}

#[tokio::test]
async fn test_empty_and_unrouted_queries_settle_empty() {
    let loader = Arc::new(GatedLoader::new());
    let (session, presenter) = recording_session(loader.clone(), SessionOptions::default());

    let_assert!(Some(empty) = session.on_input(""));
    check!(presenter.wait_for(empty).await.groups.is_empty());

    // No function starts with 'j'.
    let_assert!(Some(unrouted) = session.on_input("jump"));
    let results = presenter.wait_for(unrouted).await;
    check!(results.groups.is_empty());
    check!(!results.degraded);
    check!(loader.calls() == 0);
}

fn two_category_session(
    loader: Arc<GatedLoader>,
) -> (SearchSession, Arc<common::RecordingPresenter>) {
    let router = ShardRouter::from_config(&[
        CategoryConfig {
            name: "all".to_string(),
            sections: "_abcdefghijklmnopqrstuvwxyz~".to_string(),
        },
        CategoryConfig {
            name: "functions".to_string(),
            sections: common::FUNCTION_SECTIONS.to_string(),
        },
    ]);
    let presenter = Arc::new(common::RecordingPresenter::default());
    let session = SearchSession::new(
        ShardStore::with_failure_grace(loader, Duration::from_secs(60)),
        router,
        presenter.clone(),
        SessionOptions::default(),
    );
    (session, presenter)
}

#[tokio::test]
async fn test_failed_shard_degrades_results() {
    // all_6 is missing; functions_5 still answers.
    let loader = Arc::new(GatedLoader::new().with_shard(functions(5), common::functions_5()));
    let (session, presenter) = two_category_session(loader.clone());

    let_assert!(Some(id) = session.on_input("fill"));
    let results = presenter.wait_for(id).await;
    check!(results.degraded);
    check!(results.failed_shards == vec![ShardId::new("all", 6)]);
    check!(results.groups[0].display_name == "fill");

    // The failure is remembered: the next query does not reload all_6.
    let calls = loader.calls();
    let_assert!(Some(id) = session.on_input("fixed"));
    let results = presenter.wait_for(id).await;
    check!(results.degraded);
    check!(loader.calls() == calls);
}

#[tokio::test]
async fn test_set_categories_reruns_current_query() {
    let loader = Arc::new(GatedLoader::new().with_shard(functions(5), common::functions_5()));
    let (session, presenter) = two_category_session(loader);

    let_assert!(Some(first) = session.on_input("fill"));
    check!(presenter.wait_for(first).await.degraded);

    let_assert!(Some(rerun) = session.set_categories(vec!["functions".to_string()]));
    check!(rerun > first);
    let results = presenter.wait_for(rerun).await;
    check!(results.query == "fill");
    check!(!results.degraded);
    check!(session.categories() == ["functions"]);
}

#[tokio::test]
async fn test_debounce_skips_loads_of_superseded_queries() {
    let loader = Arc::new(
        GatedLoader::new()
            .with_shard(functions(0), "[['abs',['abs',['../m.html#a',1,'Sifteo::abs(int x)']]]]")
            .with_shard(functions(5), common::functions_5()),
    );
    let options = SessionOptions {
        debounce: Duration::from_millis(30),
        ..SessionOptions::default()
    };
    let (session, presenter) = recording_session(loader.clone(), options);

    let_assert!(Some(_) = session.on_input("abs"));
    let_assert!(Some(last) = session.on_input("fill"));
    presenter.wait_for(last).await;

    check!(loader.calls() == 1);
    check!(presenter.presented_ids() == vec![last]);
}

#[tokio::test]
async fn test_dispose_drops_pending_results() {
    let loader = Arc::new(
        GatedLoader::new()
            .with_shard(functions(5), common::functions_5())
            .with_gate(functions(5)),
    );
    let (session, presenter) = recording_session(loader.clone(), SessionOptions::default());

    let_assert!(Some(_) = session.on_input("fill"));
    session.dispose();
    check!(session.state() == SessionState::Idle);

    loader.release(&functions(5));
    tokio::time::sleep(Duration::from_millis(50)).await;
    check!(presenter.presented_ids().is_empty());
    check!(session.on_input("fixed").is_none());
}

#[tokio::test]
async fn test_dispose_mid_load_still_settles_the_store() {
    let loader = Arc::new(
        GatedLoader::new()
            .with_shard(functions(5), common::functions_5())
            .with_gate(functions(5)),
    );
    let (session, presenter) = recording_session(loader.clone(), SessionOptions::default());
    let store = session.store().clone();

    let_assert!(Some(_) = session.on_input("fill"));
    common::eventually(async || store.is_loading(&functions(5)).await).await;
    session.dispose();

    loader.release(&functions(5));
    common::eventually(async || !store.is_loading(&functions(5)).await).await;
    let stats = store.stats().await;
    check!(stats.in_flight == 0);
    check!(stats.cached == 1);
    check!(presenter.presented_ids().is_empty());

    drop(session);
    drop(store);
    common::eventually(async || Arc::strong_count(&loader) == 1).await;
}
