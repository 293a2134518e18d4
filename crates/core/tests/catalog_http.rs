//! HTTP-level tests for the catalog clients against in-process fake APIs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use crossfade_core::catalog::{
    AppleMusicClient, CachedCredentialProvider, CatalogError, CredentialProvider,
    DestinationCatalog, SourceCatalog, SpotifyClient, StaticCredentialProvider, TokenSource,
};
use crossfade_core::config::{AppleMusicConfig, SpotifyConfig};
use crossfade_core::resolver::{MatchStrategy, ResolverConfig, TrackQuery};
use crossfade_core::sync::{
    MemorySyncStore, OrchestratorConfig, SyncOrchestrator, SyncRequest, SyncStatus,
    TrackResultStatus,
};
use crossfade_core::testing::fixtures::{playlist, source_track};
use crossfade_core::testing::MockSourceCatalog;

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    (listener, base)
}

fn serve(listener: TcpListener, router: Router) {
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
}

fn apple_client(base_url: &str) -> AppleMusicClient {
    let config = AppleMusicConfig {
        base_url: base_url.to_string(),
        ..AppleMusicConfig::default()
    };
    AppleMusicClient::new(config, Arc::new(StaticCredentialProvider::new("dev-token"))).unwrap()
}

fn song(id: &str, name: &str, artist: &str) -> Value {
    json!({
        "id": id,
        "type": "songs",
        "attributes": {
            "name": name,
            "artistName": artist,
            "albumName": "Album",
            "durationInMillis": 180000,
            "isrc": "USUM71703861",
            "url": format!("https://music.apple.com/us/song/{}", id),
        }
    })
}

fn search_body() -> Value {
    json!({ "results": { "songs": { "data": [song("am1", "Perfect", "Ed Sheeran")] } } })
}

#[derive(Default)]
struct FakeState {
    calls: AtomicUsize,
    headers: Mutex<Vec<HeaderMap>>,
    queries: Mutex<Vec<HashMap<String, String>>>,
    batches: Mutex<Vec<usize>>,
    fail_second_batch: AtomicBool,
    /// Search terms answered with [`search_body`]; anything else is empty.
    hits: Mutex<Vec<String>>,
}

// =============================================================================
// Spotify
// =============================================================================

#[tokio::test]
async fn test_spotify_paginates_playlists_with_absolute_next() {
    let (listener, base) = bind().await;
    let state = Arc::new(FakeState::default());
    let next = format!("{}/me/playlists?offset=1&limit=50", base);

    let router = Router::new()
        .route(
            "/me/playlists",
            get(
                move |State(state): State<Arc<FakeState>>,
                      headers: HeaderMap,
                      Query(query): Query<HashMap<String, String>>| {
                    let next = next.clone();
                    async move {
                        state.calls.fetch_add(1, Ordering::SeqCst);
                        state.headers.lock().unwrap().push(headers);
                        if query.get("offset").map(String::as_str) == Some("1") {
                            Json(json!({
                                "items": [{
                                    "id": "pl2",
                                    "name": "Second",
                                    "owner": { "id": "user1", "display_name": null },
                                    "tracks": { "total": 3 },
                                }],
                                "next": null,
                            }))
                        } else {
                            Json(json!({
                                "items": [{
                                    "id": "pl1",
                                    "name": "First",
                                    "description": "",
                                    "owner": { "id": "user1", "display_name": "Alice" },
                                    "tracks": { "total": 12 },
                                    "public": true,
                                }],
                                "next": next,
                            }))
                        }
                    }
                },
            ),
        )
        .with_state(state.clone());
    serve(listener, router);

    let client = SpotifyClient::new(SpotifyConfig {
        base_url: base,
        ..SpotifyConfig::default()
    })
    .unwrap();

    let playlists = client.list_playlists("sp-token").await.unwrap();

    assert_eq!(state.calls.load(Ordering::SeqCst), 2);
    assert_eq!(playlists.len(), 2);
    assert_eq!(playlists[0].id, "pl1");
    assert_eq!(playlists[0].owner, "Alice");
    assert!(playlists[0].description.is_none());
    assert_eq!(playlists[0].track_count, 12);
    assert_eq!(playlists[1].owner, "user1");

    let headers = state.headers.lock().unwrap();
    assert_eq!(
        headers[0].get("authorization").unwrap().to_str().unwrap(),
        "Bearer sp-token"
    );
}

#[tokio::test]
async fn test_spotify_tracks_skip_non_track_items() {
    let (listener, base) = bind().await;

    let router = Router::new().route(
        "/playlists/{id}/tracks",
        get(|Path(id): Path<String>| async move {
            assert_eq!(id, "pl1");
            Json(json!({
                "items": [
                    {
                        "track": {
                            "id": "s1",
                            "type": "track",
                            "name": "Perfect",
                            "artists": [{ "name": "Ed Sheeran" }, { "name": "Beyoncé" }],
                            "album": { "name": "÷" },
                            "duration_ms": 263400,
                            "external_ids": { "isrc": "GBAHS1700024" },
                            "external_urls": { "spotify": "https://open.spotify.com/track/s1" },
                        }
                    },
                    { "track": null },
                    {
                        "track": {
                            "id": "ep1",
                            "type": "episode",
                            "name": "Some Podcast",
                        }
                    },
                ],
                "next": null,
            }))
        }),
    );
    serve(listener, router);

    let client = SpotifyClient::new(SpotifyConfig {
        base_url: base,
        ..SpotifyConfig::default()
    })
    .unwrap();

    let tracks = client.list_tracks("pl1", "sp-token").await.unwrap();

    assert_eq!(tracks.len(), 1);
    assert_eq!(tracks[0].artist, "Ed Sheeran, Beyoncé");
    assert_eq!(tracks[0].album, "÷");
    assert_eq!(tracks[0].isrc.as_deref(), Some("GBAHS1700024"));
}

#[tokio::test]
async fn test_spotify_unauthorized_is_authentication_error() {
    let (listener, base) = bind().await;
    let router = Router::new().route(
        "/me/playlists",
        get(|| async { (StatusCode::UNAUTHORIZED, "The access token expired") }),
    );
    serve(listener, router);

    let client = SpotifyClient::new(SpotifyConfig {
        base_url: base,
        ..SpotifyConfig::default()
    })
    .unwrap();

    let result = client.list_playlists("expired").await;
    assert!(matches!(result, Err(CatalogError::Authentication(_))));
}

// =============================================================================
// Apple Music: search and retries
// =============================================================================

#[tokio::test]
async fn test_apple_search_sends_expected_request() {
    let (listener, base) = bind().await;
    let state = Arc::new(FakeState::default());

    let router = Router::new()
        .route(
            "/catalog/{storefront}/search",
            get(
                |State(state): State<Arc<FakeState>>,
                 Path(storefront): Path<String>,
                 headers: HeaderMap,
                 Query(query): Query<HashMap<String, String>>| async move {
                    assert_eq!(storefront, "us");
                    state.headers.lock().unwrap().push(headers);
                    state.queries.lock().unwrap().push(query);
                    Json(search_body())
                },
            ),
        )
        .with_state(state.clone());
    serve(listener, router);

    let client = apple_client(&base);
    let results = client
        .search("Ed Sheeran Perfect", 10, Some("music-user"))
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, "am1");
    assert_eq!(results[0].artist, "Ed Sheeran");
    assert_eq!(
        results[0].external_urls.get("apple_music").map(String::as_str),
        Some("https://music.apple.com/us/song/am1")
    );

    let queries = state.queries.lock().unwrap();
    assert_eq!(queries[0].get("term").unwrap(), "Ed Sheeran Perfect");
    assert_eq!(queries[0].get("types").unwrap(), "songs");
    assert_eq!(queries[0].get("limit").unwrap(), "10");

    let headers = state.headers.lock().unwrap();
    assert_eq!(
        headers[0].get("authorization").unwrap().to_str().unwrap(),
        "Bearer dev-token"
    );
    assert_eq!(
        headers[0].get("music-user-token").unwrap().to_str().unwrap(),
        "music-user"
    );
}

#[tokio::test]
async fn test_apple_search_without_songs_is_empty() {
    let (listener, base) = bind().await;
    let router = Router::new().route(
        "/catalog/{storefront}/search",
        get(|| async { Json(json!({ "results": {} })) }),
    );
    serve(listener, router);

    let results = apple_client(&base).search("nothing", 5, None).await.unwrap();
    assert!(results.is_empty());
}

async fn search_by_term(
    State(state): State<Arc<FakeState>>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    let term = query.get("term").cloned().unwrap_or_default();
    state.queries.lock().unwrap().push(query);
    if state.hits.lock().unwrap().contains(&term) {
        Json(search_body())
    } else {
        Json(json!({ "results": {} }))
    }
}

async fn term_server(hits: &[&str]) -> (Arc<FakeState>, String) {
    let (listener, base) = bind().await;
    let state = Arc::new(FakeState::default());
    *state.hits.lock().unwrap() = hits.iter().map(|t| t.to_string()).collect();
    let router = Router::new()
        .route("/catalog/{storefront}/search", get(search_by_term))
        .with_state(state.clone());
    serve(listener, router);
    (state, base)
}

fn searched_terms(state: &FakeState) -> Vec<String> {
    state
        .queries
        .lock()
        .unwrap()
        .iter()
        .map(|q| q.get("term").cloned().unwrap_or_default())
        .collect()
}

#[tokio::test]
async fn test_apple_search_track_by_isrc() {
    let (state, base) = term_server(&["isrc:GBAHS1700024"]).await;
    let client = apple_client(&base);
    let query = TrackQuery {
        artist: "Ed Sheeran".to_string(),
        title: "Perfect".to_string(),
        album: None,
        isrc: Some("gb-ahs-17-00024".to_string()),
    };

    let resolved = client
        .search_track(&query, None, &ResolverConfig::default())
        .await
        .unwrap();

    assert_eq!(resolved.track.id, "am1");
    assert_eq!(resolved.strategy, MatchStrategy::Isrc);
    assert!(resolved.score.is_none());
    assert_eq!(searched_terms(&state), vec!["isrc:GBAHS1700024"]);
    assert_eq!(state.queries.lock().unwrap()[0].get("limit").unwrap(), "1");
    assert_eq!(client.rate_limiter().status().await.used, 1);
}

#[tokio::test]
async fn test_apple_search_track_falls_back_to_title() {
    let (state, base) = term_server(&["Perfect"]).await;
    let client = apple_client(&base);
    let query = TrackQuery {
        artist: "Ed Sheran".to_string(),
        title: "Perfect".to_string(),
        album: None,
        isrc: None,
    };

    let resolved = client
        .search_track(&query, Some("music-user"), &ResolverConfig::default())
        .await
        .unwrap();

    assert_eq!(resolved.track.id, "am1");
    assert_eq!(resolved.strategy, MatchStrategy::TitleOnly);
    assert!(resolved.score.unwrap() > 0.7);
    assert_eq!(
        searched_terms(&state),
        vec!["Ed Sheran Perfect", "Ed Sheran", "Perfect"]
    );
    assert_eq!(client.rate_limiter().status().await.used, 3);
}

#[tokio::test]
async fn test_apple_search_track_not_found() {
    let (state, base) = term_server(&[]).await;
    let client = apple_client(&base);
    let query = TrackQuery {
        artist: "Nobody".to_string(),
        title: "Nothing".to_string(),
        album: None,
        isrc: None,
    };

    match client
        .search_track(&query, None, &ResolverConfig::default())
        .await
    {
        Err(CatalogError::TrackNotFound(label)) => assert_eq!(label, "Nobody - Nothing"),
        other => panic!("expected TrackNotFound, got {:?}", other),
    }
    assert_eq!(searched_terms(&state).len(), 3);
}

async fn throttled_search(State(state): State<Arc<FakeState>>) -> Response {
    let call = state.calls.fetch_add(1, Ordering::SeqCst);
    if call == 0 {
        (StatusCode::TOO_MANY_REQUESTS, [("retry-after", "0")], "slow down").into_response()
    } else {
        Json(search_body()).into_response()
    }
}

#[tokio::test]
async fn test_apple_rate_limit_retries_once_then_succeeds() {
    let (listener, base) = bind().await;
    let state = Arc::new(FakeState::default());
    let router = Router::new()
        .route("/catalog/{storefront}/search", get(throttled_search))
        .with_state(state.clone());
    serve(listener, router);

    let results = apple_client(&base).search("Perfect", 5, None).await.unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(state.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_sync_completes_through_search_rate_limit() {
    let (listener, base) = bind().await;
    let state = Arc::new(FakeState::default());
    let router = Router::new()
        .route("/catalog/{storefront}/search", get(throttled_search))
        .route(
            "/me/library/playlists",
            post(|| async {
                (
                    StatusCode::CREATED,
                    Json(json!({ "data": [{ "id": "p.1", "attributes": { "name": "Mix" } }] })),
                )
            }),
        )
        .route(
            "/me/library/playlists/{id}/tracks",
            post(
                |State(state): State<Arc<FakeState>>, Json(body): Json<Value>| async move {
                    let size = body["data"].as_array().map(Vec::len).unwrap_or(0);
                    state.batches.lock().unwrap().push(size);
                    StatusCode::NO_CONTENT
                },
            ),
        )
        .with_state(state.clone());
    serve(listener, router);

    let source = Arc::new(MockSourceCatalog::new());
    source
        .add_playlist(
            playlist("pl1", "Mix"),
            vec![source_track("s1", "Perfect", "Ed Sheeran", None)],
        )
        .await;
    let mut orchestrator = SyncOrchestrator::new(
        source,
        Arc::new(apple_client(&base)),
        Arc::new(MemorySyncStore::new()),
        ResolverConfig::default(),
        OrchestratorConfig {
            track_delay_ms: 0,
            ..OrchestratorConfig::default()
        },
    );

    let request = SyncRequest::new("user-1", "pl1", "sp-token", "music-user");
    let task_id = orchestrator.start_sync(request).await.unwrap();

    let mut task = orchestrator.get_status(&task_id).unwrap();
    for _ in 0..200 {
        if task.status.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        task = orchestrator.get_status(&task_id).unwrap();
    }
    orchestrator.shutdown().await;

    assert_eq!(task.status, SyncStatus::Completed);
    assert_eq!(task.track_results[0].status, TrackResultStatus::Success);
    assert_eq!(
        task.track_results[0].destination_track.as_ref().unwrap().id,
        "am1"
    );
    assert_eq!(state.calls.load(Ordering::SeqCst), 2);
    assert_eq!(*state.batches.lock().unwrap(), vec![1]);
}

#[tokio::test]
async fn test_apple_repeated_rate_limit_surfaces_error() {
    let (listener, base) = bind().await;
    let state = Arc::new(FakeState::default());
    let router = Router::new()
        .route(
            "/catalog/{storefront}/search",
            get(|State(state): State<Arc<FakeState>>| async move {
                state.calls.fetch_add(1, Ordering::SeqCst);
                (StatusCode::TOO_MANY_REQUESTS, [("retry-after", "0")], "")
            }),
        )
        .with_state(state.clone());
    serve(listener, router);

    let result = apple_client(&base).search("Perfect", 5, None).await;

    match result {
        Err(CatalogError::RateLimited { provider, .. }) => assert_eq!(provider, "Apple Music"),
        other => panic!("expected RateLimited, got {:?}", other),
    }
    assert_eq!(state.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_apple_retry_after_beyond_cap_is_not_slept() {
    let (listener, base) = bind().await;
    let state = Arc::new(FakeState::default());
    let router = Router::new()
        .route(
            "/catalog/{storefront}/search",
            get(|State(state): State<Arc<FakeState>>| async move {
                state.calls.fetch_add(1, Ordering::SeqCst);
                (StatusCode::TOO_MANY_REQUESTS, [("retry-after", "3600")], "")
            }),
        )
        .with_state(state.clone());
    serve(listener, router);

    let result = apple_client(&base).search("Perfect", 5, None).await;

    match result {
        Err(CatalogError::RateLimited { retry_after, .. }) => {
            assert_eq!(retry_after, Duration::from_secs(3600))
        }
        other => panic!("expected RateLimited, got {:?}", other),
    }
    assert_eq!(state.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_apple_status_mapping() {
    let (listener, base) = bind().await;
    let router = Router::new().route(
        "/catalog/{storefront}/search",
        get(|Query(query): Query<HashMap<String, String>>| async move {
            match query.get("term").map(String::as_str) {
                Some("missing") => (StatusCode::NOT_FOUND, "no such resource"),
                _ => (StatusCode::BAD_GATEWAY, ""),
            }
        }),
    );
    serve(listener, router);

    let client = apple_client(&base);

    match client.search("missing", 5, None).await {
        Err(CatalogError::Client { status, message }) => {
            assert_eq!(status, 404);
            assert_eq!(message, "no such resource");
        }
        other => panic!("expected Client error, got {:?}", other),
    }

    match client.search("broken", 5, None).await {
        Err(CatalogError::Server { status, message }) => {
            assert_eq!(status, 502);
            assert_eq!(message, "Bad Gateway");
        }
        other => panic!("expected Server error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_apple_timeout() {
    let (listener, base) = bind().await;
    let router = Router::new().route(
        "/catalog/{storefront}/search",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Json(search_body())
        }),
    );
    serve(listener, router);

    let config = AppleMusicConfig {
        base_url: base,
        timeout_secs: 1,
        ..AppleMusicConfig::default()
    };
    let client =
        AppleMusicClient::new(config, Arc::new(StaticCredentialProvider::new("dev-token")))
            .unwrap();

    let result = client.search("Perfect", 5, None).await;
    assert!(matches!(result, Err(CatalogError::Timeout)));
}

// =============================================================================
// Apple Music: developer token refresh
// =============================================================================

#[derive(Default)]
struct CountingSource {
    mints: AtomicUsize,
}

#[async_trait]
impl TokenSource for CountingSource {
    async fn mint(&self) -> Result<String, CatalogError> {
        let n = self.mints.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("token-{}", n))
    }
}

async fn token_checked_search(headers: HeaderMap) -> Response {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if auth == "Bearer token-2" {
        Json(search_body()).into_response()
    } else {
        (StatusCode::UNAUTHORIZED, "invalid developer token").into_response()
    }
}

#[tokio::test]
async fn test_apple_unauthorized_refreshes_token_once() {
    let (listener, base) = bind().await;
    let router = Router::new().route("/catalog/{storefront}/search", get(token_checked_search));
    serve(listener, router);

    let source = Arc::new(CountingSource::default());
    let credentials: Arc<dyn CredentialProvider> =
        Arc::new(CachedCredentialProvider::new(source.clone()));
    let config = AppleMusicConfig {
        base_url: base,
        ..AppleMusicConfig::default()
    };
    let client = AppleMusicClient::new(config, credentials).unwrap();

    let results = client.search("Perfect", 5, None).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(source.mints.load(Ordering::SeqCst), 2);

    // The refreshed token stays cached.
    client.search("Perfect", 5, None).await.unwrap();
    assert_eq!(source.mints.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_apple_unauthorized_after_refresh_fails() {
    let (listener, base) = bind().await;
    let router = Router::new().route(
        "/catalog/{storefront}/search",
        get(|| async { (StatusCode::UNAUTHORIZED, "revoked") }),
    );
    serve(listener, router);

    let source = Arc::new(CountingSource::default());
    let config = AppleMusicConfig {
        base_url: base,
        ..AppleMusicConfig::default()
    };
    let client =
        AppleMusicClient::new(config, Arc::new(CachedCredentialProvider::new(source.clone())))
            .unwrap();

    match client.search("Perfect", 5, None).await {
        Err(CatalogError::Authentication(message)) => {
            assert!(message.contains("after token refresh"));
            assert!(message.contains("revoked"));
        }
        other => panic!("expected Authentication error, got {:?}", other),
    }
    assert_eq!(source.mints.load(Ordering::SeqCst), 2);
}

// =============================================================================
// Apple Music: library writes
// =============================================================================

#[tokio::test]
async fn test_apple_library_operations_require_user_token() {
    let client = apple_client("http://127.0.0.1:9");

    for result in [
        client.list_playlists(None).await.map(|_| ()),
        client.create_playlist("Mix", None, None).await.map(|_| ()),
        client
            .add_tracks("p.1", &["am1".to_string()], Some(""))
            .await,
    ] {
        match result {
            Err(CatalogError::Authentication(message)) => {
                assert!(message.starts_with("User token required to"))
            }
            other => panic!("expected Authentication error, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_apple_list_playlists_follows_relative_next() {
    let (listener, base) = bind().await;
    let router = Router::new().route(
        "/me/library/playlists",
        get(|Query(query): Query<HashMap<String, String>>| async move {
            if query.contains_key("offset") {
                Json(json!({
                    "data": [{ "id": "p.2", "attributes": { "name": "Second" } }]
                }))
            } else {
                Json(json!({
                    "data": [{
                        "id": "p.1",
                        "attributes": {
                            "name": "First",
                            "description": { "standard": "Morning mix" },
                            "isPublic": true,
                        }
                    }],
                    "next": "/me/library/playlists?offset=1",
                }))
            }
        }),
    );
    serve(listener, router);

    let playlists = apple_client(&base)
        .list_playlists(Some("music-user"))
        .await
        .unwrap();

    let ids: Vec<_> = playlists.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["p.1", "p.2"]);
    assert_eq!(playlists[0].description.as_deref(), Some("Morning mix"));
}

#[tokio::test]
async fn test_apple_create_playlist() {
    let (listener, base) = bind().await;
    let bodies: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
    let captured = bodies.clone();

    let router = Router::new().route(
        "/me/library/playlists",
        post(move |Json(body): Json<Value>| {
            let captured = captured.clone();
            async move {
                captured.lock().unwrap().push(body);
                (
                    StatusCode::CREATED,
                    Json(json!({
                        "data": [{ "id": "p.new", "attributes": { "name": "Road Trip (from Spotify)" } }]
                    })),
                )
            }
        }),
    );
    serve(listener, router);

    let playlist = apple_client(&base)
        .create_playlist("Road Trip (from Spotify)", Some("Summer"), Some("music-user"))
        .await
        .unwrap();

    assert_eq!(playlist.id, "p.new");
    assert_eq!(playlist.name, "Road Trip (from Spotify)");

    let bodies = bodies.lock().unwrap();
    assert_eq!(bodies[0]["attributes"]["name"], "Road Trip (from Spotify)");
    assert_eq!(bodies[0]["attributes"]["description"], "Summer");
}

#[tokio::test]
async fn test_apple_create_playlist_without_data_fails() {
    let (listener, base) = bind().await;
    let router = Router::new().route(
        "/me/library/playlists",
        post(|| async { Json(json!({ "data": [] })) }),
    );
    serve(listener, router);

    let result = apple_client(&base)
        .create_playlist("Mix", None, Some("music-user"))
        .await;

    match result {
        Err(CatalogError::Parse(message)) => {
            assert_eq!(message, "Failed to create playlist: No data returned")
        }
        other => panic!("expected Parse error, got {:?}", other),
    }
}

async fn record_batch(
    State(state): State<Arc<FakeState>>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> StatusCode {
    assert_eq!(id, "p.1");
    let call = state.calls.fetch_add(1, Ordering::SeqCst);
    let size = body["data"].as_array().map(Vec::len).unwrap_or(0);
    state.batches.lock().unwrap().push(size);
    assert!(body["data"]
        .as_array()
        .unwrap()
        .iter()
        .all(|item| item["type"] == "songs"));

    if state.fail_second_batch.load(Ordering::SeqCst) && call == 1 {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::NO_CONTENT
    }
}

fn ids(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("am{}", i)).collect()
}

#[tokio::test]
async fn test_apple_add_tracks_splits_into_batches() {
    let (listener, base) = bind().await;
    let state = Arc::new(FakeState::default());
    let router = Router::new()
        .route("/me/library/playlists/{id}/tracks", post(record_batch))
        .with_state(state.clone());
    serve(listener, router);

    apple_client(&base)
        .add_tracks("p.1", &ids(30), Some("music-user"))
        .await
        .unwrap();

    assert_eq!(*state.batches.lock().unwrap(), vec![25, 5]);
}

#[tokio::test]
async fn test_apple_add_tracks_reports_partial_commit() {
    let (listener, base) = bind().await;
    let state = Arc::new(FakeState::default());
    state.fail_second_batch.store(true, Ordering::SeqCst);
    let router = Router::new()
        .route("/me/library/playlists/{id}/tracks", post(record_batch))
        .with_state(state.clone());
    serve(listener, router);

    let result = apple_client(&base)
        .add_tracks("p.1", &ids(30), Some("music-user"))
        .await;

    match result {
        Err(CatalogError::PartialBatch { committed, source }) => {
            assert_eq!(committed, 25);
            assert!(matches!(*source, CatalogError::Server { status: 500, .. }));
        }
        other => panic!("expected PartialBatch, got {:?}", other),
    }
}

#[tokio::test]
async fn test_apple_add_tracks_first_batch_failure_is_plain_error() {
    let (listener, base) = bind().await;
    let router = Router::new().route(
        "/me/library/playlists/{id}/tracks",
        post(|| async { StatusCode::FORBIDDEN }),
    );
    serve(listener, router);

    let result = apple_client(&base)
        .add_tracks("p.1", &ids(3), Some("music-user"))
        .await;

    assert!(matches!(result, Err(CatalogError::Client { status: 403, .. })));
}
