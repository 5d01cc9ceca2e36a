//! Cache controller lifecycle and fetch policy tests

mod helpers;

use attn_offline::controller::{ControlMessage, FetchOutcome, FetchSource, Intercept, Lifecycle};
use attn_offline::network::NetRequest;
use helpers::{absolute, controller, offline_config, seeded_network};
use reqwest::Url;

async fn fetch(c: &std::sync::Arc<attn_offline::controller::CacheController>, target: &str) -> FetchOutcome {
    let url = Url::parse(&absolute(target)).unwrap();
    match c.handle_fetch(NetRequest::get(url)).await {
        Intercept::Respond(outcome) => outcome,
        Intercept::Bypass(request) => panic!("{} was not intercepted", request.url),
    }
}

fn body(outcome: &FetchOutcome) -> String {
    String::from_utf8(outcome.response.body.to_vec()).unwrap()
}

#[tokio::test]
async fn test_install_precaches_and_activates() {
    let config = offline_config();
    let network = seeded_network(&config);
    let c = controller(config.clone(), &network);

    c.install().await.unwrap();

    assert_eq!(c.lifecycle().await, Lifecycle::Activated);
    assert_eq!(c.generation(), "asistencia-v1.0.0");
    assert_eq!(
        c.storage().entry_count(&c.generation()).await,
        config.precache.len()
    );
}

#[tokio::test]
async fn test_failed_precache_keeps_previous_generation() {
    let config = offline_config();
    let network = seeded_network(&config);
    network.serve("/js/camera.js", 404, "gone");
    let c = controller(config, &network);
    c.storage().open("asistencia-v0.9.0").await;

    assert!(c.install().await.is_err());

    assert_eq!(c.lifecycle().await, Lifecycle::Parsed);
    assert!(c.storage().has("asistencia-v0.9.0").await);
    assert!(!c.storage().has("asistencia-v1.0.0").await);
}

#[tokio::test]
async fn test_activation_deletes_other_generations() {
    let config = offline_config();
    let network = seeded_network(&config);
    let c = controller(config, &network);
    for name in ["asistencia-v0.8.0", "asistencia-v0.9.0", "asistencia-runtime"] {
        c.storage().open(name).await;
    }

    c.install().await.unwrap();

    assert_eq!(
        c.storage().names().await,
        vec!["asistencia-runtime", "asistencia-v1.0.0"]
    );
}

#[tokio::test]
async fn test_cache_hit_refreshes_in_background() {
    let config = offline_config();
    let network = seeded_network(&config);
    let c = controller(config, &network);
    c.install().await.unwrap();

    let key = absolute("/js/app.js");
    let before = c.storage().get(&c.generation(), &key).await.unwrap();
    network.serve("/js/app.js", 200, "/js/app.js v2");

    let outcome = fetch(&c, "/js/app.js").await;
    assert_eq!(outcome.source, FetchSource::Cache);
    assert_eq!(body(&outcome), "/js/app.js v1");

    outcome.refresh.unwrap().await.unwrap();

    let after = c.storage().get(&c.generation(), &key).await.unwrap();
    assert_eq!(after.body, "/js/app.js v2".as_bytes());
    assert!(after.stored_at >= before.stored_at);

    let next = fetch(&c, "/js/app.js").await;
    assert_eq!(body(&next), "/js/app.js v2");
}

#[tokio::test]
async fn test_failed_refresh_keeps_entry() {
    let config = offline_config();
    let network = seeded_network(&config);
    let c = controller(config, &network);
    c.install().await.unwrap();

    network.set_online(false);
    let outcome = fetch(&c, "/css/styles.css").await;
    assert_eq!(outcome.source, FetchSource::Cache);
    outcome.refresh.unwrap().await.unwrap();

    let entry = c
        .storage()
        .get(&c.generation(), &absolute("/css/styles.css"))
        .await
        .unwrap();
    assert_eq!(entry.body, "/css/styles.css v1".as_bytes());
}

#[tokio::test]
async fn test_miss_stores_ok_responses_in_runtime_bucket() {
    let config = offline_config();
    let network = seeded_network(&config);
    network.serve("/img/logo.png", 200, "logo");
    let c = controller(config, &network);
    c.install().await.unwrap();

    let outcome = fetch(&c, "/img/logo.png").await;
    assert_eq!(outcome.source, FetchSource::Network);
    assert!(outcome.refresh.is_none());
    assert!(c
        .storage()
        .get("asistencia-runtime", &absolute("/img/logo.png"))
        .await
        .is_some());

    // Served from the runtime bucket next time
    let again = fetch(&c, "/img/logo.png").await;
    assert_eq!(again.source, FetchSource::Cache);

    let missing = fetch(&c, "/img/none.png").await;
    assert_eq!(missing.response.status, 404);
    assert!(c
        .storage()
        .get("asistencia-runtime", &absolute("/img/none.png"))
        .await
        .is_none());
}

#[tokio::test]
async fn test_offline_miss_falls_back_to_root_document() {
    let config = offline_config();
    let network = seeded_network(&config);
    let c = controller(config, &network);
    c.install().await.unwrap();
    network.set_online(false);

    let outcome = fetch(&c, "/registro/nuevo").await;

    assert_eq!(outcome.source, FetchSource::Fallback);
    assert_eq!(body(&outcome), "/index.html v1");
}

#[tokio::test]
async fn test_api_hosts_are_never_cached() {
    let config = offline_config();
    let network = seeded_network(&config);
    let api = "https://asistencia-api.wavilanuez.workers.dev/";
    network.serve(api, 200, "{\"success\":true}");
    let c = controller(config, &network);
    c.install().await.unwrap();

    let outcome = fetch(&c, api).await;
    assert_eq!(outcome.source, FetchSource::PassThrough);
    assert_eq!(body(&outcome), "{\"success\":true}");

    fetch(&c, api).await;
    assert_eq!(network.fetch_count(api), 2);
    for bucket in c.storage().names().await {
        assert!(c.storage().get(&bucket, api).await.is_none());
    }
}

#[tokio::test]
async fn test_api_host_offline_returns_json_failure() {
    let config = offline_config();
    let network = seeded_network(&config);
    let c = controller(config, &network);
    c.install().await.unwrap();
    network.set_online(false);

    let outcome = fetch(&c, "https://script.google.com/macros/s/abc/exec").await;

    assert_eq!(outcome.source, FetchSource::Offline);
    assert_eq!(outcome.response.status, 503);
    assert_eq!(
        outcome.response.content_type.as_deref(),
        Some("application/json")
    );
    let value: serde_json::Value = serde_json::from_slice(&outcome.response.body).unwrap();
    assert_eq!(value["success"], false);
    assert_eq!(value["message"], attn_common::messages::OFFLINE);
}

#[tokio::test]
async fn test_clear_cache_message() {
    let config = offline_config();
    let network = seeded_network(&config);
    let c = controller(config, &network);
    c.install().await.unwrap();
    fetch(&c, "/favicon.ico").await;

    let reply = c.handle_message(ControlMessage::ClearCache).await;
    assert_eq!(reply.buckets_deleted, 1);
    assert!(c.storage().names().await.is_empty());

    // Still controlling: the next request goes to the network
    let outcome = fetch(&c, "/index.html").await;
    assert_eq!(outcome.source, FetchSource::Network);
    assert!(c
        .storage()
        .get("asistencia-runtime", &absolute("/index.html"))
        .await
        .is_some());
}

#[tokio::test]
async fn test_skip_waiting_after_activation_is_noop() {
    let config = offline_config();
    let network = seeded_network(&config);
    let c = controller(config, &network);
    c.install().await.unwrap();

    let reply = c.handle_message(ControlMessage::SkipWaiting).await;
    assert_eq!(reply.lifecycle, Lifecycle::Activated);
    assert_eq!(reply.buckets_deleted, 0);
}

#[tokio::test]
async fn test_version_bump_replaces_generation() {
    let config = offline_config();
    let network = seeded_network(&config);
    let old = controller(config.clone(), &network);
    old.install().await.unwrap();

    // Same storage, new version tag
    let mut next_config = config;
    next_config.cache_version = "1.1.0".to_string();
    let next = controller(next_config, &network);
    for bucket in old.storage().names().await {
        next.storage().open(&bucket).await;
    }
    next.install().await.unwrap();

    assert_eq!(
        next.storage().names().await,
        vec!["asistencia-v1.1.0"]
    );
}

#[tokio::test]
async fn test_runtime_bucket_is_capped() {
    let mut config = offline_config();
    config.runtime_max_entries = 3;
    let network = seeded_network(&config);
    for i in 0..5 {
        network.serve(&format!("/img/{}.png?v={}", i, i), 200, "img");
    }
    let c = controller(config, &network);
    c.install().await.unwrap();

    for i in 0..5 {
        let outcome = fetch(&c, &format!("/img/{}.png?v={}", i, i)).await;
        assert_eq!(outcome.source, FetchSource::Network);
    }

    assert_eq!(c.storage().entry_count("asistencia-runtime").await, 3);
    assert!(c
        .storage()
        .get("asistencia-runtime", &absolute("/img/0.png?v=0"))
        .await
        .is_none());
    assert!(c
        .storage()
        .get("asistencia-runtime", &absolute("/img/4.png?v=4"))
        .await
        .is_some());

    // The precached generation is never trimmed
    assert_eq!(
        c.storage().entry_count(&c.generation()).await,
        offline_config().precache.len()
    );
}

#[tokio::test]
async fn test_runtime_hit_refreshes_into_runtime_bucket() {
    let config = offline_config();
    let network = seeded_network(&config);
    network.serve("/img/logo.png", 200, "logo v1");
    let c = controller(config, &network);
    c.install().await.unwrap();

    fetch(&c, "/img/logo.png").await;
    network.serve("/img/logo.png", 200, "logo v2");
    let outcome = fetch(&c, "/img/logo.png").await;
    assert_eq!(outcome.source, FetchSource::Cache);
    outcome.refresh.unwrap().await.unwrap();

    let key = absolute("/img/logo.png");
    let entry = c.storage().get("asistencia-runtime", &key).await.unwrap();
    assert_eq!(entry.body, "logo v2".as_bytes());
    assert!(c.storage().get(&c.generation(), &key).await.is_none());
}
