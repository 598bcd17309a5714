#![allow(dead_code)]

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::StagedImageStatus;
use common::storage::memory::MemoryObjectStore;
use common::storage::{ObjectStore, StorageError};
use reqwest::Client;
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde_json::Value;
use tempfile::TempDir;
use uuid::Uuid;

use stagehand_server::config::{
    AppConfig, AuthConfig, DatabaseConfig, GcConfig, ReconcileConfig, ServerConfig,
    StorageBackend, StorageConfig,
};
use stagehand_server::entity::{original_image, staged_image};
use stagehand_server::state::AppState;

pub const ADMIN_TOKEN: &str = "test-admin-token";

pub mod routes {
    pub const ORIGINAL_STATS: &str = "/api/v1/admin/originals/stats";
    pub const ORIGINAL_CLEANUP: &str = "/api/v1/admin/originals/cleanup";
    pub const RECONCILE: &str = "/api/v1/admin/reconcile";
    pub const CLEANUP_STUCK: &str = "/api/v1/admin/staged-images/cleanup-stuck";

    pub fn project_images(project_id: i32) -> String {
        format!("/api/v1/projects/{project_id}/images")
    }

    pub fn image(id: i32) -> String {
        format!("/api/v1/images/{id}")
    }
}

/// In-memory store that counts calls and injects failures on demand.
#[derive(Default)]
pub struct TestStore {
    inner: MemoryObjectStore,
    pub puts: AtomicUsize,
    pub deletes: AtomicUsize,
    pub fail_deletes: AtomicBool,
    failing_exists: Mutex<HashSet<String>>,
    exists_delay: Mutex<Option<Duration>>,
}

impl TestStore {
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Make `exists` fail for this key.
    pub fn fail_exists_for(&self, key: &str) {
        self.failing_exists.lock().unwrap().insert(key.to_string());
    }

    pub fn delay_exists(&self, delay: Duration) {
        *self.exists_delay.lock().unwrap() = Some(delay);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.keys().iter().any(|k| k == key)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Write directly, bypassing the counters.
    pub async fn seed(&self, key: &str, data: &[u8]) {
        self.inner.put(key, data).await.unwrap();
    }

    pub async fn remove(&self, key: &str) {
        self.inner.delete(key).await.unwrap();
    }
}

#[async_trait]
impl ObjectStore for TestStore {
    fn backend_name(&self) -> &'static str {
        "test"
    }

    async fn put(&self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put(key, data).await
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.inner.get(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let delay = *self.exists_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_exists.lock().unwrap().contains(key) {
            return Err(StorageError::Backend(format!("injected failure for {key}")));
        }
        self.inner.exists(key).await
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("injected delete failure".into()));
        }
        self.inner.delete(key).await
    }
}

pub fn test_config(db_url: &str) -> AppConfig {
    AppConfig {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        database: DatabaseConfig {
            max_connections: 5,
            ..DatabaseConfig::with_url(db_url)
        },
        auth: AuthConfig {
            admin_token: Some(ADMIN_TOKEN.to_string()),
        },
        storage: StorageConfig {
            backend: StorageBackend::Memory,
            check_timeout_secs: 5,
            ..Default::default()
        },
        gc: GcConfig {
            enabled: false,
            ..Default::default()
        },
        reconcile: ReconcileConfig::default(),
    }
}

/// Fresh SQLite database and services wired to a [`TestStore`].
pub struct TestContext {
    _dir: TempDir,
    pub db: DatabaseConnection,
    pub store: Arc<TestStore>,
    pub state: AppState,
}

impl TestContext {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let db_url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());
        let config = test_config(&db_url);
        let db = stagehand_server::database::init_db(&config.database)
            .await
            .expect("Failed to initialize test database");

        let store = Arc::new(TestStore::default());
        let state = AppState::new(config, db.clone(), store.clone());

        Self {
            _dir: dir,
            db,
            store,
            state,
        }
    }

    /// Move an original's `updated_at` into the past.
    pub async fn age_original(&self, id: Uuid, age: chrono::Duration) {
        original_image::Entity::update_many()
            .col_expr(
                original_image::Column::UpdatedAt,
                Expr::value(Utc::now() - age),
            )
            .filter(original_image::Column::Id.eq(id))
            .exec(&self.db)
            .await
            .expect("Failed to age original");
    }

    /// Move a staged image's `created_at` into the past.
    pub async fn age_staged(&self, id: i32, age: chrono::Duration) {
        staged_image::Entity::update_many()
            .col_expr(
                staged_image::Column::CreatedAt,
                Expr::value(Utc::now() - age),
            )
            .filter(staged_image::Column::Id.eq(id))
            .exec(&self.db)
            .await
            .expect("Failed to age staged image");
    }

    pub async fn original(&self, id: Uuid) -> Option<original_image::Model> {
        original_image::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .expect("Failed to query original")
    }

    /// Read a staged row regardless of soft deletion.
    pub async fn staged_row(&self, id: i32) -> Option<staged_image::Model> {
        staged_image::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .expect("Failed to query staged image")
    }

    pub async fn original_count(&self) -> u64 {
        use sea_orm::PaginatorTrait;
        original_image::Entity::find()
            .count(&self.db)
            .await
            .expect("Failed to count originals")
    }

    /// Insert a staged row directly, seeding its objects when `present` is set.
    pub async fn insert_staged(&self, row: StagedRow<'_>) -> staged_image::Model {
        if row.original_present {
            self.store.seed(row.original_key, b"original").await;
        }
        if let (Some(key), true) = (row.stored_key, row.stored_present) {
            self.store.seed(key, b"staged").await;
        }

        let now = Utc::now();
        staged_image::ActiveModel {
            project_id: Set(row.project_id),
            original_image_id: Set(None),
            original_key: Set(row.original_key.to_string()),
            status: Set(row.status),
            stored_key: Set(row.stored_key.map(str::to_string)),
            error_message: Set(None),
            deleted_at: Set(row.deleted_at),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .expect("Failed to insert staged image")
    }
}

/// Shape of a staged row inserted by [`TestContext::insert_staged`].
#[derive(Clone, Copy)]
pub struct StagedRow<'a> {
    pub project_id: i32,
    pub status: StagedImageStatus,
    pub original_key: &'a str,
    pub original_present: bool,
    pub stored_key: Option<&'a str>,
    pub stored_present: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl<'a> StagedRow<'a> {
    /// A `ready` row whose objects are all present.
    pub fn healthy(project_id: i32, original_key: &'a str, stored_key: &'a str) -> Self {
        Self {
            project_id,
            status: StagedImageStatus::Ready,
            original_key,
            original_present: true,
            stored_key: Some(stored_key),
            stored_present: true,
            deleted_at: None,
        }
    }
}

/// A running test server.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    pub ctx: TestContext,
}

/// Parsed HTTP response for test assertions.
pub struct TestResponse {
    pub status: u16,
    /// Raw response body as text.
    pub text: String,
    /// Parsed JSON body, or `Null` if the response is not valid JSON.
    pub body: Value,
}

impl TestResponse {
    async fn from_response(res: reqwest::Response) -> Self {
        let status = res.status().as_u16();
        let text = res.text().await.expect("Failed to read response body");
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);
        Self { status, text, body }
    }
}

impl TestApp {
    pub async fn spawn() -> Self {
        let ctx = TestContext::new().await;
        let app = stagehand_server::build_router(ctx.state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            client: Client::new(),
            ctx,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn upload(&self, project_id: i32, file_name: &str, bytes: &[u8]) -> TestResponse {
        let part = reqwest::multipart::Part::bytes(bytes.to_vec())
            .file_name(file_name.to_string())
            .mime_str("image/jpeg")
            .expect("Failed to set MIME type");
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("width", "1920")
            .text("height", "1080");

        let res = self
            .client
            .post(self.url(&routes::project_images(project_id)))
            .multipart(form)
            .send()
            .await
            .expect("Failed to send multipart upload request");

        TestResponse::from_response(res).await
    }

    pub async fn delete(&self, path: &str) -> TestResponse {
        let res = self
            .client
            .delete(self.url(path))
            .send()
            .await
            .expect("Failed to send DELETE request");

        TestResponse::from_response(res).await
    }

    pub async fn get_with_token(&self, path: &str, token: &str) -> TestResponse {
        let res = self
            .client
            .get(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await
            .expect("Failed to send GET request");

        TestResponse::from_response(res).await
    }

    pub async fn get_without_token(&self, path: &str) -> TestResponse {
        let res = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to send GET request");

        TestResponse::from_response(res).await
    }

    pub async fn post_with_token(&self, path: &str, body: &Value, token: &str) -> TestResponse {
        let res = self
            .client
            .post(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .json(body)
            .send()
            .await
            .expect("Failed to send POST request");

        TestResponse::from_response(res).await
    }
}
