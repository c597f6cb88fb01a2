#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
    Router,
};
use secrecy::Secret;
use site_core::backend::Backend;
use site_core::config::{BackendSettings, MemoryBackendSettings, SeedAccount, SiteSettings, TelemetrySettings};
use site_core::models::{CollectionPath, Post};
use site_frontend::config::{ServerSettings, Settings};
use site_frontend::startup::{build_router, build_state};
use site_frontend::AppState;
use std::time::Duration;
use tower::util::ServiceExt;

pub const ADMIN_EMAIL: &str = "admin@x.com";
pub const ADMIN_PASSWORD: &str = "admin-password";
pub const APP_ID: &str = "router-test";

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
}

pub fn settings(auto_anonymous: bool) -> Settings {
    Settings {
        server: ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
            session_idle_minutes: 60,
            secure_cookies: false,
        },
        site: SiteSettings {
            admin_email: ADMIN_EMAIL.to_string(),
            app_id: APP_ID.to_string(),
            auto_anonymous,
            initial_token: None,
            contact_relay_url: Some("https://relay.example/f/test".to_string()),
        },
        backend: BackendSettings::Memory(MemoryBackendSettings {
            accounts: vec![SeedAccount {
                email: ADMIN_EMAIL.to_string(),
                password: Secret::new(ADMIN_PASSWORD.to_string()),
                disabled: false,
            }],
        }),
        telemetry: TelemetrySettings::default(),
    }
}

impl TestApp {
    pub async fn spawn(auto_anonymous: bool) -> Self {
        let state = build_state(&settings(auto_anonymous)).expect("Failed to build state");
        let router = build_router(state.clone());
        Self { state, router }
    }

    /// A browser with an empty cookie jar.
    pub fn browser(&self) -> Browser {
        Browser {
            router: self.router.clone(),
            cookie: None,
        }
    }

    /// Posts stored in the shared collection, whoever wrote them.
    pub fn documents(&self) -> Vec<Post> {
        match self.state.visitors.backend() {
            Backend::Memory { content, .. } => content.documents(&CollectionPath::public_posts(APP_ID)),
            Backend::Firebase { .. } => panic!("router tests run against the memory backend"),
        }
    }

    pub async fn eventually(&self, check: impl Fn(&Self) -> bool) {
        for _ in 0..400 {
            if check(self) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    pub async fn shutdown(&self) {
        self.state.visitors.shutdown().await;
    }
}

/// Sends requests through the router carrying the session cookie it was given.
pub struct Browser {
    router: Router,
    cookie: Option<String>,
}

impl Browser {
    async fn send(&mut self, request: Request<Body>) -> Response<Body> {
        let response = self.router.clone().oneshot(request).await.unwrap();
        if let Some(set_cookie) = response.headers().get(header::SET_COOKIE) {
            let pair = set_cookie.to_str().unwrap().split(';').next().unwrap();
            self.cookie = Some(pair.to_string());
        }
        response
    }

    fn request(&self, method: &str, uri: &str) -> axum::http::request::Builder {
        let builder = Request::builder().method(method).uri(uri);
        match &self.cookie {
            Some(cookie) => builder.header(header::COOKIE, cookie),
            None => builder,
        }
    }

    pub fn has_cookie(&self) -> bool {
        self.cookie.is_some()
    }

    pub async fn get(&mut self, uri: &str) -> Response<Body> {
        let request = self.request("GET", uri).body(Body::empty()).unwrap();
        self.send(request).await
    }

    pub async fn post_form(&mut self, uri: &str, body: &str) -> Response<Body> {
        let request = self
            .request("POST", uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn page(&mut self, uri: &str) -> String {
        let response = self.get(uri).await;
        assert_eq!(response.status(), StatusCode::OK);
        body_text(response).await
    }

    /// Reloads `uri` until the page satisfies `check`.
    pub async fn eventually_page(&mut self, uri: &str, check: impl Fn(&str) -> bool) -> String {
        for _ in 0..400 {
            let body = self.page(uri).await;
            if check(&body) {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("page {} never matched", uri);
    }

    pub async fn login_as_admin(&mut self) {
        let response = self
            .post_form(
                "/login",
                &format!("email={}&password={}", ADMIN_EMAIL, ADMIN_PASSWORD),
            )
            .await;
        assert_redirect(&response, "/");
        self.eventually_page("/", is_admin_panel).await;
    }
}

pub fn is_admin_panel(body: &str) -> bool {
    body.contains("لوحة تحكم المدير")
}

pub fn is_public_site(body: &str) -> bool {
    body.contains("مقالاتي")
}

pub fn is_login_form(body: &str) -> bool {
    body.contains("تسجيل دخول المدير")
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn assert_redirect(response: &Response<Body>, location: &str) {
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap().to_str().unwrap(),
        location
    );
}
