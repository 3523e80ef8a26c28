//! Install / fetch / activate / push / click / sync on a single worker.

mod common;

use bytes::Bytes;
use common::{get, url, worker, worker_config, MockFetcher};
use folio_net::{Request, RequestMode, Response, ResponseType};
use folio_sw::{
    AssetCacheManager, CacheStorage, EventResult, InstallOutcome, LifecycleEvent,
    NotificationPermission, PushMessageData, ServiceWorkerError, WorkerScope, WorkerState,
};
use futures::future::join_all;
use http::{HeaderValue, StatusCode};

// ==================== Install ====================

#[tokio::test]
async fn install_caches_every_manifest_asset() {
    let (_fetcher, worker) = worker(1);

    let outcome = worker.install().await.unwrap();
    assert_eq!(outcome, InstallOutcome::Complete { cached: 12 });
    assert_eq!(worker.state().await, WorkerState::Installed);

    let caches = worker.scope().caches.read().await;
    let bucket = caches.get("rezaul-karim-portfolio-v1").unwrap();
    assert_eq!(bucket.len(), 12);

    for path in &worker.config().asset_manifest {
        let entry = caches.match_request(&get(path)).unwrap();
        assert_eq!(entry.body, path.as_bytes());
        assert_eq!(entry.status, 200);
    }
}

#[tokio::test]
async fn install_with_one_missing_asset_stores_nothing() {
    let (fetcher, worker) = worker(1);
    fetcher.unroute(url("/assets/imgs/header.png").as_str());

    let outcome = worker.install().await.unwrap();
    assert!(matches!(outcome, InstallOutcome::Degraded { .. }));
    assert_eq!(worker.state().await, WorkerState::Installed);

    let caches = worker.scope().caches.read().await;
    assert!(caches.get("rezaul-karim-portfolio-v1").unwrap().is_empty());
}

#[tokio::test]
async fn install_offline_is_degraded_not_fatal() {
    let (fetcher, worker) = worker(1);
    fetcher.set_offline(true);

    let outcome = worker.install().await.unwrap();
    assert!(!outcome.is_complete());

    // The worker can still activate and serve from the network later.
    worker.activate().await.unwrap();
    fetcher.set_offline(false);
    let response = worker.handle_fetch(get("/index.html")).await.unwrap();
    assert!(!response.from_cache);
}

#[tokio::test]
async fn install_runs_once() {
    let (_fetcher, worker) = worker(1);
    worker.install().await.unwrap();

    assert!(matches!(
        worker.install().await,
        Err(ServiceWorkerError::StateError(_))
    ));
}

// ==================== Fetch ====================

#[tokio::test]
async fn cached_asset_is_served_offline() {
    let (fetcher, worker) = worker(1);
    worker.install().await.unwrap();
    worker.activate().await.unwrap();

    fetcher.set_offline(true);
    let calls_before = fetcher.calls();

    let response = worker.handle_fetch(get("/index.html")).await.unwrap();
    assert!(response.from_cache);
    assert_eq!(response.text().unwrap(), "/index.html");
    assert_eq!(fetcher.calls(), calls_before);
}

#[tokio::test]
async fn miss_goes_to_network_and_is_cached() {
    let (fetcher, worker) = worker(1);
    worker.install().await.unwrap();
    worker.activate().await.unwrap();
    fetcher.route_text(url("/projects.html").as_str(), "<h2>Projects</h2>");

    let first = worker.handle_fetch(get("/projects.html")).await.unwrap();
    assert!(!first.from_cache);
    let network_body = first.bytes();

    {
        let caches = worker.scope().caches.read().await;
        let entry = caches
            .get("rezaul-karim-portfolio-v1")
            .unwrap()
            .match_request(&get("/projects.html"))
            .unwrap();
        assert_eq!(entry.body, network_body.to_vec());
    }

    fetcher.set_offline(true);
    let second = worker.handle_fetch(get("/projects.html")).await.unwrap();
    assert!(second.from_cache);
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.bytes(), network_body);
}

#[tokio::test]
async fn non_cacheable_responses_are_passed_through() {
    let (fetcher, worker) = worker(1);
    worker.install().await.unwrap();
    worker.activate().await.unwrap();

    fetcher.route(
        Response::basic(url("/draft.html"), "draft").with_status(StatusCode::ACCEPTED),
    );
    fetcher.route(Response::opaque(
        url::Url::parse("https://cdn.example.com/font.woff2").unwrap(),
    ));
    fetcher.route(
        Response::basic(
            url::Url::parse("https://api.example.com/stats.json").unwrap(),
            "{}",
        )
        .with_type(ResponseType::Cors),
    );

    let requests = vec![
        get("/draft.html"),
        get("/nope.html"),
        Request::parse("https://cdn.example.com/font.woff2")
            .unwrap()
            .mode(RequestMode::NoCors),
        Request::parse("https://api.example.com/stats.json").unwrap(),
        Request::post(url("/contact"), Bytes::from("name=x")),
    ];

    for request in requests {
        let key = request.url.to_string();
        worker.handle_fetch(request).await.unwrap();
        let caches = worker.scope().caches.read().await;
        assert!(
            caches
                .get("rezaul-karim-portfolio-v1")
                .unwrap()
                .match_url(&key)
                .is_none(),
            "{key} should not be cached"
        );
    }
}

#[tokio::test]
async fn network_failure_without_cache_entry_fails() {
    let (fetcher, worker) = worker(1);
    worker.install().await.unwrap();
    worker.activate().await.unwrap();
    fetcher.set_offline(true);

    let result = worker.handle_fetch(get("/not-cached.html")).await;
    assert!(matches!(result, Err(ServiceWorkerError::NetworkError(_))));
}

#[tokio::test]
async fn concurrent_fetches_are_independent() {
    let (fetcher, worker) = worker(1);
    worker.install().await.unwrap();
    worker.activate().await.unwrap();

    let paths: Vec<String> = (0..10).map(|i| format!("/blog/post-{i}.html")).collect();
    for path in &paths {
        fetcher.route_text(url(path).as_str(), path);
    }

    let responses = join_all(paths.iter().map(|p| worker.handle_fetch(get(p)))).await;
    for (path, response) in paths.iter().zip(responses) {
        assert_eq!(response.unwrap().text().unwrap(), *path);
    }

    let caches = worker.scope().caches.read().await;
    assert_eq!(caches.get("rezaul-karim-portfolio-v1").unwrap().len(), 22);
}

#[tokio::test]
async fn cached_headers_match_network_headers() {
    let (fetcher, worker) = worker(1);
    worker.install().await.unwrap();
    worker.activate().await.unwrap();

    let mut page = Response::basic(url("/talks.html"), "talks");
    page.headers.append(
        http::header::LINK,
        HeaderValue::from_static("</assets/css/johndoe.css>; rel=preload"),
    );
    page.headers.append(
        http::header::LINK,
        HeaderValue::from_static("</assets/js/johndoe.js>; rel=preload"),
    );
    page.headers.append(
        http::header::SET_COOKIE,
        HeaderValue::from_bytes(b"k=\xff").unwrap(),
    );
    let expected = page.headers.clone();
    fetcher.route(page);

    let network = worker.handle_fetch(get("/talks.html")).await.unwrap();
    assert!(!network.from_cache);
    assert_eq!(network.headers, expected);

    fetcher.set_offline(true);
    let cached = worker.handle_fetch(get("/talks.html")).await.unwrap();
    assert!(cached.from_cache);
    assert_eq!(cached.headers, expected);
    assert_eq!(cached.headers.get_all(http::header::LINK).iter().count(), 2);

    let dir = tempfile::tempdir().unwrap();
    worker.scope().caches.read().await.save(dir.path()).unwrap();
    let restored = CacheStorage::load(dir.path()).unwrap();
    let reloaded = restored
        .match_request(&get("/talks.html"))
        .unwrap()
        .to_response()
        .unwrap();
    assert_eq!(reloaded.headers, expected);
}

#[tokio::test]
async fn fragment_request_hits_cached_page_offline() {
    let (fetcher, worker) = worker(1);
    worker.install().await.unwrap();
    worker.activate().await.unwrap();
    fetcher.set_offline(true);

    let response = worker.handle_fetch(get("/index.html#about")).await.unwrap();
    assert!(response.from_cache);
    assert_eq!(response.text().unwrap(), "/index.html");
}

// ==================== Activate ====================

#[tokio::test]
async fn activate_leaves_only_current_bucket() {
    let fetcher = MockFetcher::new();
    let config = worker_config(3);
    fetcher.serve_manifest(&config);
    let scope = WorkerScope::new(fetcher.clone());

    {
        let mut caches = scope.caches.write().await;
        for stale in [
            "rezaul-karim-portfolio-v1",
            "rezaul-karim-portfolio-v2",
            "something-else",
        ] {
            caches
                .open(stale)
                .put(&get("/index.html"), Response::basic(url("/index.html"), "old"))
                .unwrap();
        }
    }

    let worker = AssetCacheManager::new(config, scope.clone());
    worker.install().await.unwrap();
    let deleted = worker.activate().await.unwrap();

    assert_eq!(deleted.len(), 3);
    assert_eq!(scope.cache_names().await, vec!["rezaul-karim-portfolio-v3"]);
    assert_eq!(worker.state().await, WorkerState::Active);

    let response = worker.handle_fetch(get("/index.html")).await.unwrap();
    assert_eq!(response.text().unwrap(), "/index.html");
}

#[tokio::test]
async fn activate_before_install_is_rejected() {
    let (_fetcher, worker) = worker(1);
    assert!(matches!(
        worker.activate().await,
        Err(ServiceWorkerError::StateError(_))
    ));
    assert_eq!(worker.state().await, WorkerState::Installing);
}

// ==================== Push ====================

#[tokio::test]
async fn push_without_payload_uses_default_body() {
    let (_fetcher, worker) = worker(1);

    let id = worker.handle_push(None).await.unwrap().unwrap();

    let center = worker.scope().notifications.read().await;
    let notification = center.get(id).unwrap();
    assert_eq!(notification.title, "MD. Rezaul Karim");
    assert_eq!(notification.options.body, "New update from Rezaul Karim");
    assert_eq!(
        notification.options.icon.as_deref(),
        Some("/assets/imgs/avatar.png")
    );
    assert_eq!(notification.options.vibrate, vec![100, 50, 100]);

    let actions: Vec<&str> = notification
        .options
        .actions
        .iter()
        .map(|a| a.action.as_str())
        .collect();
    assert_eq!(actions, vec!["explore", "close"]);
    assert_eq!(notification.options.actions[0].title, "View Portfolio");

    let data = notification.options.data.as_ref().unwrap();
    assert_eq!(data.primary_key, "2");
    assert!(data.date_of_arrival > 0);
}

#[tokio::test]
async fn push_with_payload_uses_payload_text() {
    let (_fetcher, worker) = worker(1);

    let id = worker
        .handle_push(Some(PushMessageData::from("X")))
        .await
        .unwrap()
        .unwrap();

    let center = worker.scope().notifications.read().await;
    assert_eq!(center.get(id).unwrap().options.body, "X");
}

#[tokio::test]
async fn push_without_permission_is_logged_not_fatal() {
    let fetcher = MockFetcher::new();
    let scope = WorkerScope::new(fetcher).with_permission(NotificationPermission::Denied);
    let worker = AssetCacheManager::new(worker_config(1), scope);

    let id = worker.handle_push(Some("hello".into())).await.unwrap();
    assert!(id.is_none());
    assert!(worker.scope().notifications.read().await.active().is_empty());
}

// ==================== Notification click ====================

#[tokio::test]
async fn explore_click_opens_one_window_and_closes() {
    let (_fetcher, worker) = worker(1);
    let id = worker.handle_push(None).await.unwrap().unwrap();

    let outcome = worker
        .handle_notification_click(id, Some("explore"))
        .await
        .unwrap();

    assert!(outcome.closed);
    let client = outcome.opened.unwrap();
    assert_eq!(client.url.as_str(), "https://rksazid.onrender.com/");

    let clients = worker.scope().clients.read().await;
    assert_eq!(clients.match_all().len(), 1);
    assert!(worker.scope().notifications.read().await.get(id).is_none());
}

#[tokio::test]
async fn close_click_only_closes() {
    let (_fetcher, worker) = worker(1);

    for action in [Some("close"), None, Some("unknown")] {
        let id = worker.handle_push(None).await.unwrap().unwrap();
        let outcome = worker.handle_notification_click(id, action).await.unwrap();

        assert!(outcome.closed);
        assert!(outcome.opened.is_none());
    }

    assert!(worker.scope().clients.read().await.is_empty());
    assert!(worker.scope().notifications.read().await.active().is_empty());
}

// ==================== Sync ====================

#[tokio::test]
async fn sync_tag_is_acknowledged_only() {
    let (fetcher, worker) = worker(1);

    assert!(worker.handle_sync("background-sync").await.unwrap());
    assert!(!worker.handle_sync("something-else").await.unwrap());
    assert_eq!(fetcher.calls(), 0);
}

// ==================== Dispatch ====================

#[tokio::test]
async fn dispatch_routes_every_event() {
    let (_fetcher, worker) = worker(1);

    match worker.dispatch(LifecycleEvent::Install).await.unwrap() {
        EventResult::Installed(outcome) => assert!(outcome.is_complete()),
        other => panic!("unexpected {other:?}"),
    }

    match worker.dispatch(LifecycleEvent::Activate).await.unwrap() {
        EventResult::Activated { deleted } => assert!(deleted.is_empty()),
        other => panic!("unexpected {other:?}"),
    }

    match worker
        .dispatch(LifecycleEvent::Fetch(get("/manifest.json")))
        .await
        .unwrap()
    {
        EventResult::Responded(response) => assert!(response.from_cache),
        other => panic!("unexpected {other:?}"),
    }

    let id = match worker.dispatch(LifecycleEvent::Push(None)).await.unwrap() {
        EventResult::Pushed(Some(id)) => id,
        other => panic!("unexpected {other:?}"),
    };

    match worker
        .dispatch(LifecycleEvent::NotificationClick {
            notification: id,
            action: Some("close".to_string()),
        })
        .await
        .unwrap()
    {
        EventResult::Clicked(outcome) => assert!(outcome.closed && outcome.opened.is_none()),
        other => panic!("unexpected {other:?}"),
    }

    match worker
        .dispatch(LifecycleEvent::Sync {
            tag: "background-sync".to_string(),
        })
        .await
        .unwrap()
    {
        EventResult::Synced { recognized } => assert!(recognized),
        other => panic!("unexpected {other:?}"),
    }
}
