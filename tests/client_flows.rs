//! End-to-end client flows over a scripted transport.
//!
//! Each test wires a full [`AppContext`] with in-memory storage and a
//! route-based fake transport, then drives the same call sequences a
//! frontend would.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};

use devhub_client::api;
use devhub_client::api::projects::{NewProject, ProjectFilters, ProjectListItem};
use devhub_client::api::tags::Tag;
use devhub_client::api::Page;
use devhub_client::config::Config;
use devhub_client::http::{
    ApiError, ApiRequest, ApiResponse, BoxFuture, Method, Navigator, NoticeLevel, Notifier,
    Transport, SESSION_EXPIRED_MESSAGE,
};
use devhub_client::key;
use devhub_client::routes::LOGIN_PATH;
use devhub_client::session::{EXTERNAL_TOKEN_KEY, SESSION_STORAGE_KEY};
use devhub_client::storage::{MemoryStorage, Storage};
use devhub_client::AppContext;

type Handler =
    Box<dyn Fn(ApiRequest) -> BoxFuture<'static, Result<ApiResponse, ApiError>> + Send + Sync>;

/// Transport that routes requests through a test-provided handler and
/// records everything it sends.
struct RouterTransport {
    handler: Handler,
    requests: Mutex<Vec<ApiRequest>>,
}

impl RouterTransport {
    fn new(
        handler: impl Fn(ApiRequest) -> BoxFuture<'static, Result<ApiResponse, ApiError>>
            + Send
            + Sync
            + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Transport answering every request with the same response.
    fn always(status: u16, body: Value) -> Arc<Self> {
        Self::new(move |_| {
            let response = ApiResponse {
                status,
                body: body.clone(),
            };
            Box::pin(async move { Ok(response) })
        })
    }

    fn recorded(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Transport for RouterTransport {
    fn send(&self, request: ApiRequest) -> BoxFuture<'_, Result<ApiResponse, ApiError>> {
        self.requests.lock().unwrap().push(request.clone());
        (self.handler)(request)
    }
}

#[derive(Default)]
struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl Notifier for RecordingNotifier {
    fn notify(&self, _level: NoticeLevel, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

#[derive(Default)]
struct RecordingNavigator {
    redirects: Mutex<Vec<String>>,
}

impl Navigator for RecordingNavigator {
    fn redirect(&self, path: &str) {
        self.redirects.lock().unwrap().push(path.to_string());
    }
}

struct TestClient {
    ctx: AppContext,
    transport: Arc<RouterTransport>,
    storage: Arc<MemoryStorage>,
    notifier: Arc<RecordingNotifier>,
    navigator: Arc<RecordingNavigator>,
}

fn client(transport: Arc<RouterTransport>) -> TestClient {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let storage = Arc::new(MemoryStorage::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let navigator = Arc::new(RecordingNavigator::default());
    let ctx = AppContext::builder()
        .config(Config::with_base_url("https://api.test/api"))
        .storage(storage.clone())
        .transport(transport.clone())
        .notifier(notifier.clone())
        .navigator(navigator.clone())
        .build()
        .expect("context wiring failed");
    TestClient {
        ctx,
        transport,
        storage,
        notifier,
        navigator,
    }
}

fn page_of(items: Vec<Value>) -> Value {
    let total = items.len();
    json!({
        "items": items,
        "totalCount": total,
        "pageNumber": 1,
        "pageSize": 10
    })
}

fn project_item(id: &str, title: &str) -> Value {
    json!({
        "id": id,
        "title": title,
        "description": "desc",
        "ownerId": "u1",
        "ownerUsername": "ada",
        "ownerProfileImageUrl": null,
        "createdAt": "2024-05-01T12:00:00Z",
        "commentCount": 0,
        "tags": ["rust"]
    })
}

#[tokio::test]
async fn test_login_flow_persists_session() {
    let transport = RouterTransport::always(200, json!({"id": "u1", "token": "tok-1"}));
    let t = client(transport);

    t.ctx.login("ada@example.com", "Sup3r-secret").await.unwrap();

    assert!(t.ctx.session().is_authenticated());
    assert_eq!(t.ctx.session().token().as_deref(), Some("tok-1"));

    // The session survives in storage for the next process start.
    let blob = t.storage.get(SESSION_STORAGE_KEY).unwrap().unwrap();
    assert!(blob.contains("\"token\":\"tok-1\""));

    let requests = t.transport.recorded();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, Method::Post);
    assert_eq!(requests[0].path, "/auth/login");
    assert!(requests[0].bearer.is_none());
}

#[tokio::test]
async fn test_concurrent_tag_reads_share_one_request() {
    // The response is gated so the second read is issued while the first
    // request is still in flight.
    let (release_tx, release_rx) = oneshot::channel::<()>();
    let (started_tx, mut started_rx) = mpsc::unbounded_channel();
    let release_rx = Arc::new(Mutex::new(Some(release_rx)));

    let transport = RouterTransport::new(move |_| {
        let _ = started_tx.send(());
        let gate = release_rx.lock().unwrap().take();
        Box::pin(async move {
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            Ok(ApiResponse {
                status: 200,
                body: json!([{"id": "t1", "name": "rust"}]),
            })
        })
    });
    let t = client(transport);

    let fetch_tags = |t: &TestClient| {
        let http = t.ctx.http().clone();
        let cache = t.ctx.cache().clone();
        async move {
            cache
                .fetch_as::<Vec<Tag>, _, _>(key!["tags"], move || {
                    let http = http.clone();
                    async move {
                        api::tags::list(&http)
                            .await
                            .and_then(|tags| serde_json::to_value(tags).map_err(|err| {
                                ApiError::Unknown {
                                    status: 0,
                                    message: err.to_string(),
                                }
                            }))
                    }
                })
                .await
        }
    };

    let first = tokio::spawn(fetch_tags(&t));
    started_rx.recv().await.unwrap();
    let second = tokio::spawn(fetch_tags(&t));
    tokio::task::yield_now().await;

    release_tx.send(()).unwrap();

    let first = first.await.unwrap().unwrap();
    let second = second.await.unwrap().unwrap();
    assert_eq!(first[0].name, "rust");
    assert_eq!(second[0].name, "rust");
    assert_eq!(t.transport.request_count(), 1);
}

#[tokio::test]
async fn test_project_creation_invalidates_explore_listing() {
    // Stateful routes: the project list grows when a creation lands.
    let projects = Arc::new(Mutex::new(vec![project_item("p1", "First")]));
    let routed = projects.clone();

    let transport = RouterTransport::new(move |request| {
        let projects = routed.clone();
        Box::pin(async move {
            match (request.method, request.path.as_str()) {
                (Method::Get, "/projects") => Ok(ApiResponse {
                    status: 200,
                    body: page_of(projects.lock().unwrap().clone()),
                }),
                (Method::Post, "/projects") => {
                    projects
                        .lock()
                        .unwrap()
                        .push(project_item("p2", "Second"));
                    Ok(ApiResponse {
                        status: 201,
                        body: json!({
                            "id": "p2",
                            "title": "Second",
                            "description": "desc",
                            "gitHubUrl": "https://github.com/org/second",
                            "discordUrl": null,
                            "ownerId": "u1",
                            "ownerUsername": "ada",
                            "createdAt": "2024-05-02T12:00:00Z",
                            "tags": ["rust"],
                            "comments": []
                        }),
                    })
                }
                _ => Ok(ApiResponse {
                    status: 404,
                    body: Value::Null,
                }),
            }
        })
    });
    let t = client(transport);
    t.ctx.session().login("u1", "tok-1").unwrap();

    let explore_key = key!["exploreProjects", 1u32, "", Vec::<String>::new()];
    let list_explore = |t: &TestClient| {
        let http = t.ctx.http().clone();
        move || {
            let http = http.clone();
            async move {
                let page: Page<ProjectListItem> =
                    api::projects::list(&http, Some(1), Some(10), &ProjectFilters::default())
                        .await?;
                serde_json::to_value(page).map_err(|err| ApiError::Unknown {
                    status: 0,
                    message: err.to_string(),
                })
            }
        }
    };

    let before: Page<ProjectListItem> = t
        .ctx
        .cache()
        .fetch_as(explore_key.clone(), list_explore(&t))
        .await
        .unwrap();
    assert_eq!(before.items.len(), 1);

    // A second read is served from cache.
    let cached: Page<ProjectListItem> = t
        .ctx
        .cache()
        .fetch_as(explore_key.clone(), list_explore(&t))
        .await
        .unwrap();
    assert_eq!(cached.items.len(), 1);
    assert_eq!(t.transport.request_count(), 1);

    let new_project = NewProject {
        title: "Second".to_string(),
        description: "desc".to_string(),
        git_hub_url: "https://github.com/org/second".to_string(),
        discord_url: None,
        tags: vec!["rust".to_string()],
    };
    let http = t.ctx.http().clone();
    t.ctx
        .cache()
        .mutate(
            async move { api::projects::create(&http, &new_project).await },
            &[key!["exploreProjects"]],
        )
        .await
        .unwrap();

    // The invalidated listing refetches and includes the new project.
    let after: Page<ProjectListItem> = t
        .ctx
        .cache()
        .fetch_as(explore_key, list_explore(&t))
        .await
        .unwrap();
    assert_eq!(after.items.len(), 2);
    assert_eq!(after.items[1].title, "Second");
}

#[tokio::test]
async fn test_session_expiry_cascades_and_redirects_once() {
    let transport = RouterTransport::always(401, Value::Null);
    let t = client(transport);

    t.ctx.session().login("u1", "tok-1").unwrap();
    t.ctx.session().connect_external("gh-token").unwrap();

    let result = api::auth::get_me(t.ctx.http()).await;
    assert!(matches!(result, Err(ApiError::Unauthorized)));

    assert!(!t.ctx.session().is_authenticated());
    assert!(t.ctx.session().external_token().is_none());
    assert!(t.storage.get(SESSION_STORAGE_KEY).unwrap().is_none());
    assert!(t.storage.get(EXTERNAL_TOKEN_KEY).unwrap().is_none());

    assert_eq!(
        t.notifier.messages.lock().unwrap().as_slice(),
        [SESSION_EXPIRED_MESSAGE.to_string()]
    );
    assert_eq!(
        t.navigator.redirects.lock().unwrap().as_slice(),
        [LOGIN_PATH.to_string()]
    );

    // A second rejected request must not repeat the cascade.
    let again = api::auth::get_me(t.ctx.http()).await;
    assert!(matches!(again, Err(ApiError::Unauthorized)));
    assert_eq!(t.navigator.redirects.lock().unwrap().len(), 1);
    assert_eq!(t.notifier.messages.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_repo_listing_without_provider_token_fails_locally() {
    let counted = Arc::new(AtomicUsize::new(0));
    let counter = counted.clone();
    let transport = RouterTransport::new(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Box::pin(async {
            Ok(ApiResponse {
                status: 200,
                body: json!([]),
            })
        })
    });
    let t = client(transport);
    t.ctx.session().login("u1", "tok-1").unwrap();

    let result = api::github::list_repos(t.ctx.http(), t.ctx.session()).await;
    assert!(matches!(result, Err(ApiError::ExternalCredentialMissing(_))));

    let import = api::github::import_repo(t.ctx.http(), t.ctx.session(), "org", "repo").await;
    assert!(matches!(import, Err(ApiError::ExternalCredentialMissing(_))));

    // No request ever left the client.
    assert_eq!(counted.load(Ordering::SeqCst), 0);
    assert_eq!(t.transport.request_count(), 0);
}

#[tokio::test]
async fn test_provider_connection_enables_import() {
    let transport = RouterTransport::new(move |request| {
        Box::pin(async move {
            match (request.method, request.path.as_str()) {
                (Method::Post, "/auth/github/exchange-code") => Ok(ApiResponse {
                    status: 200,
                    body: json!({"accessToken": "gh-token", "username": "ada"}),
                }),
                (Method::Post, "/auth/github/import") => Ok(ApiResponse {
                    status: 200,
                    body: json!({
                        "id": "p9",
                        "title": "repo",
                        "description": "imported",
                        "gitHubUrl": "https://github.com/org/repo",
                        "discordUrl": null,
                        "ownerId": "u1",
                        "ownerUsername": "ada",
                        "createdAt": "2024-05-03T12:00:00Z",
                        "tags": [],
                        "comments": []
                    }),
                }),
                _ => Ok(ApiResponse {
                    status: 404,
                    body: Value::Null,
                }),
            }
        })
    });
    let t = client(transport);
    t.ctx.session().login("u1", "tok-1").unwrap();

    let username = t.ctx.connect_github("auth-code").await.unwrap();
    assert_eq!(username, "ada");

    let project = api::github::import_repo(t.ctx.http(), t.ctx.session(), "org", "repo")
        .await
        .unwrap();
    assert_eq!(project.id, "p9");

    // The provider token travels as a query parameter, not a header.
    let requests = t.transport.recorded();
    let import = &requests[1];
    assert!(import
        .query
        .iter()
        .any(|(name, value)| name == "token" && value == "gh-token"));
    assert_eq!(import.bearer.as_deref(), Some("tok-1"));
}

#[tokio::test]
async fn test_validation_failure_surfaces_field_errors_and_notice() {
    let transport = RouterTransport::always(
        400,
        json!({
            "message": "Validation failed",
            "errors": {"email": ["Email is already taken"]}
        }),
    );
    let t = client(transport);

    let result = api::auth::register(t.ctx.http(), "ada", "ada@example.com", "Sup3r-secret").await;

    match result {
        Err(ApiError::ValidationFailed { field_errors, .. }) => {
            assert_eq!(
                field_errors.get("email").map(Vec::as_slice),
                Some(["Email is already taken".to_string()].as_slice())
            );
        }
        other => panic!("expected ValidationFailed, got {other:?}"),
    }
    assert_eq!(
        t.notifier.messages.lock().unwrap().as_slice(),
        ["Validation failed".to_string()]
    );
}
