// Shared helpers; each test binary uses a subset.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use blobby::config::Config;
use blobby::error::{AppError, AppResult};
use blobby::mail::{Mailer, OutgoingMail};
use blobby::sanitize::Sanitizer;
use blobby::state::{AppState, DbPool};

/// Records sends for assertions; optionally fails every send.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<OutgoingMail>>,
    pub fail: bool,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: OutgoingMail) -> AppResult<()> {
        if self.fail {
            return Err(AppError::Mail("simulated failure".to_string()));
        }
        self.sent.lock().unwrap().push(mail);
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub pool: DbPool,
    pub mailer: Arc<RecordingMailer>,
    _tmp: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::build(Config::default(), RecordingMailer::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self::build(config, RecordingMailer::default())
    }

    pub fn with_mailer(mailer: RecordingMailer) -> Self {
        Self::build(Config::default(), mailer)
    }

    pub fn build(config: Config, mailer: RecordingMailer) -> Self {
        let tmp = TempDir::new().unwrap();
        let pool = blobby::db::create_pool(&tmp.path().join("test.db")).unwrap();
        blobby::db::run_migrations(&pool).unwrap();

        let mailer = Arc::new(mailer);
        let state = AppState {
            db: pool.clone(),
            config: config.clone(),
            sanitizer: Arc::new(Sanitizer::new(&config.sanitizer)),
            mailer: mailer.clone(),
        };

        Self {
            router: blobby::build_router(state),
            pool,
            mailer,
            _tmp: tmp,
        }
    }

    pub async fn get(&self, path: &str, cookie: Option<&str>) -> Response<Body> {
        let mut request = Request::builder().uri(path);
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        self.router
            .clone()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    pub async fn post_form(
        &self,
        path: &str,
        body: &str,
        cookie: Option<&str>,
    ) -> Response<Body> {
        let mut request = Request::builder()
            .uri(path)
            .method("POST")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        self.router
            .clone()
            .oneshot(request.body(Body::from(body.to_string())).unwrap())
            .await
            .unwrap()
    }

    /// Register a user and return the session cookie pair.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> String {
        let body = format!(
            "username={}&email={}&password={}",
            username, email, password
        );
        let response = self.post_form("/register", &body, None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "register failed");
        session_cookie(&response).expect("no session cookie after registration")
    }

    /// Log in and return the session cookie pair.
    pub async fn login(&self, email: &str, password: &str) -> String {
        let body = format!("email={}&password={}", email, password);
        let response = self.post_form("/login", &body, None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "login failed");
        session_cookie(&response).expect("no session cookie after login")
    }

    /// Create a post as the given session and return its id (from the
    /// redirect location `/post/{id}`).
    pub async fn create_post(&self, cookie: &str, title: &str) -> String {
        let body = format!(
            "title={}&subtitle=sub&img_url=https%3A%2F%2Fexample.com%2Fi.png&body=hello",
            title
        );
        let response = self.post_form("/new-post", &body, Some(cookie)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "create post failed");
        let location = location(&response);
        location
            .strip_prefix("/post/")
            .expect("unexpected redirect target")
            .to_string()
    }
}

/// First cookie pair from the Set-Cookie header.
pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    let value = response.headers().get(header::SET_COOKIE)?.to_str().ok()?;
    let pair = value.split(';').next()?.trim();
    if pair.ends_with('=') {
        None // cleared cookie
    } else {
        Some(pair.to_string())
    }
}

pub fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .expect("no Location header")
        .to_str()
        .unwrap()
        .to_string()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}
