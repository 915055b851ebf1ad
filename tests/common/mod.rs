//! Common test utilities for E2E tests

use filmgraph::{config, AppState};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server backed by a fresh SQLite file
    pub async fn new() -> Self {
        // Create temporary directory for test database
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
            },
            database: config::DatabaseConfig {
                backend: config::StoreBackend::Sqlite,
                path: db_path,
            },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        // Initialize app state
        let state = AppState::new(config).await.unwrap();

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let app = filmgraph::build_router(state);

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait a bit for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        Self {
            addr: addr_str,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// POST a JSON body and return the parsed response body.
    ///
    /// Panics if the response status is not 200.
    pub async fn post_ok(&self, path: &str, body: Value) -> Value {
        let response = self
            .client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200, "POST {path} failed");
        response.json().await.unwrap()
    }

    /// Create a film with sensible defaults, returning the response body
    pub async fn create_film(&self, name: &str, release_date: &str) -> Value {
        self.post_ok(
            "/films",
            json!({
                "name": name,
                "description": "a test film",
                "releaseDate": release_date,
                "duration": 120
            }),
        )
        .await
    }

    /// Create a user with the given email, returning the response body
    pub async fn create_user(&self, email: &str, login: &str) -> Value {
        self.post_ok(
            "/users",
            json!({
                "email": email,
                "login": login,
                "name": login,
                "birthday": "1990-05-01"
            }),
        )
        .await
    }
}
