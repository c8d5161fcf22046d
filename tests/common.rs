#![allow(dead_code)]

use axum::extract::State;
use axum::http::HeaderMap;
use axum::{Json, Router, routing::post};
use clap::Parser;
use serde_json::{Value, json};
use statspro_server::AppBuilder;
use statspro_server::api::{MgmtState, app_router, mgmt_router};
use statspro_server::config::Config;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, Once};
use tokio::net::TcpListener;
use tokio::sync::watch;

static INIT: Once = Once::new();

pub fn setup_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "warn".into())
            .add_directive("statspro_server=debug".parse().unwrap())
            .add_directive("tower=warn".parse().unwrap())
            .add_directive("hyper=warn".parse().unwrap())
            .add_directive("reqwest=warn".parse().unwrap());

        tracing_subscriber::fmt().with_env_filter(filter).init();
    });
}

pub fn get_test_config() -> Config {
    let mut config = Config::parse_from(["statspro-server"]);
    config.server.host = "127.0.0.1".to_string();
    config.server.port = 0;
    config.server.mgmt_port = 0;
    config.rate_limit.per_second = 10000;
    config.rate_limit.burst = 10000;
    config.rate_limit.auth_per_second = 10000;
    config.rate_limit.auth_burst = 10000;
    config.provider.health_timeout_ms = 500;
    config
}

#[derive(Clone, Debug)]
pub struct MockAccount {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub roles: Vec<String>,
}

/// In-process stand-in for a WPGraphQL endpoint with the JWT auth plugin.
#[derive(Debug, Default)]
pub struct MockWordPress {
    accounts: Mutex<Vec<MockAccount>>,
    access_tokens: Mutex<HashMap<String, String>>,
    refresh_tokens: Mutex<HashMap<String, String>>,
    issued: AtomicU32,
    refresh_unsupported: AtomicBool,
    registration_disabled: AtomicBool,
}

impl MockWordPress {
    pub fn add_account(&self, email: &str, password: &str, roles: &[&str]) {
        let mut accounts = self.accounts.lock().unwrap();
        let id = format!("dXNlcjo{}", accounts.len() + 1);
        accounts.push(MockAccount {
            id,
            username: email.split('@').next().unwrap().to_string(),
            email: email.to_string(),
            password: password.to_string(),
            first_name: "Sam".to_string(),
            last_name: "Fan".to_string(),
            roles: roles.iter().map(|r| (*r).to_string()).collect(),
        });
    }

    pub fn set_roles(&self, email: &str, roles: &[&str]) {
        let mut accounts = self.accounts.lock().unwrap();
        let account = accounts.iter_mut().find(|a| a.email == email).unwrap();
        account.roles = roles.iter().map(|r| (*r).to_string()).collect();
    }

    pub fn disable_refresh_mutation(&self) {
        self.refresh_unsupported.store(true, Ordering::SeqCst);
    }

    pub fn disable_registration(&self) {
        self.registration_disabled.store(true, Ordering::SeqCst);
    }

    /// Forgets every issued access token, as if they had all expired upstream.
    pub fn expire_access_tokens(&self) {
        self.access_tokens.lock().unwrap().clear();
    }

    fn account_by_email(&self, email: &str) -> Option<MockAccount> {
        self.accounts.lock().unwrap().iter().find(|a| a.email == email).cloned()
    }

    fn issue_access(&self, email: &str) -> String {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let token = format!("jwt-{n}");
        self.access_tokens.lock().unwrap().insert(token.clone(), email.to_string());
        token
    }

    fn issue_refresh(&self, email: &str) -> String {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let token = format!("refresh-{n}");
        self.refresh_tokens.lock().unwrap().insert(token.clone(), email.to_string());
        token
    }

    fn handle(&self, query: &str, variables: &Value, bearer: Option<&str>) -> Value {
        if query.contains("generalSettings") {
            return json!({ "data": { "generalSettings": { "title": "StatsPro" } } });
        }

        if query.contains("registerUser") {
            if self.registration_disabled.load(Ordering::SeqCst) {
                return graphql_error("User registration is disabled on this site.");
            }
            let email = variables["email"].as_str().unwrap_or_default();
            if self.account_by_email(email).is_some() {
                return graphql_error("This email address is already registered.");
            }
            self.add_account(email, variables["password"].as_str().unwrap_or_default(), &["trial_member"]);
            let account = self.account_by_email(email).unwrap();
            return json!({ "data": { "registerUser": { "user": { "id": account.id } } } });
        }

        if query.contains("refreshJwtAuthToken") {
            if self.refresh_unsupported.load(Ordering::SeqCst) {
                return graphql_error("Cannot query field \"refreshJwtAuthToken\" on type \"RootMutation\".");
            }
            let refresh_token = variables["refreshToken"].as_str().unwrap_or_default();
            let email = self.refresh_tokens.lock().unwrap().get(refresh_token).cloned();
            return match email {
                Some(email) => {
                    json!({ "data": { "refreshJwtAuthToken": { "authToken": self.issue_access(&email) } } })
                }
                None => graphql_error("The provided refresh token is invalid"),
            };
        }

        if query.contains("login(") {
            let username = variables["username"].as_str().unwrap_or_default();
            let password = variables["password"].as_str().unwrap_or_default();
            let account = self
                .accounts
                .lock()
                .unwrap()
                .iter()
                .find(|a| a.email == username || a.username == username)
                .cloned();
            return match account {
                Some(account) if account.password == password => json!({
                    "data": { "login": {
                        "authToken": self.issue_access(&account.email),
                        "refreshToken": self.issue_refresh(&account.email),
                        "user": user_json(&account),
                    } }
                }),
                _ => graphql_error("incorrect_password"),
            };
        }

        if query.contains("viewer") {
            let email = bearer.and_then(|t| self.access_tokens.lock().unwrap().get(t).cloned());
            let viewer = email.and_then(|e| self.account_by_email(&e)).map(|a| user_json(&a));
            return json!({ "data": { "viewer": viewer } });
        }

        graphql_error("Unknown operation")
    }
}

fn graphql_error(message: &str) -> Value {
    json!({ "data": null, "errors": [{ "message": message }] })
}

fn user_json(account: &MockAccount) -> Value {
    json!({
        "id": account.id,
        "username": account.username,
        "email": account.email,
        "firstName": account.first_name,
        "lastName": account.last_name,
        "nicename": account.username,
        "roles": { "nodes": account.roles.iter().map(|r| json!({ "name": r })).collect::<Vec<_>>() },
    })
}

async fn graphql(State(mock): State<Arc<MockWordPress>>, headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    let query = body["query"].as_str().unwrap_or_default();
    let bearer = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    Json(mock.handle(query, &body["variables"], bearer))
}

pub async fn spawn_wordpress() -> (Arc<MockWordPress>, String) {
    let mock = Arc::new(MockWordPress::default());
    let router = Router::new().route("/graphql", post(graphql)).with_state(mock.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (mock, format!("http://{addr}/graphql"))
}

pub struct TestApp {
    pub server_url: String,
    pub mgmt_url: String,
    pub client: reqwest::Client,
    pub config: Config,
    pub wordpress: Arc<MockWordPress>,
    pub shutdown_tx: watch::Sender<bool>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_config(get_test_config()).await
    }

    pub async fn spawn_with_config(config: Config) -> Self {
        Self::spawn_inner(config, None).await
    }

    /// Starts the app against `graphql_url` instead of the mock provider.
    pub async fn spawn_with_provider_url(config: Config, graphql_url: &str) -> Self {
        Self::spawn_inner(config, Some(graphql_url)).await
    }

    async fn spawn_inner(mut config: Config, graphql_url: Option<&str>) -> Self {
        setup_tracing();

        let (wordpress, mock_url) = spawn_wordpress().await;
        config.provider.graphql_url = graphql_url.map_or(mock_url, str::to_string);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let app = AppBuilder::new(config.clone()).build();
        let _workers = app.workers.spawn_all(shutdown_rx.clone());

        let api_router = app_router(config.clone(), app.services);
        let mgmt = mgmt_router(MgmtState { health_service: app.health_service });

        let api_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mgmt_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server_url = format!("http://{}", api_listener.local_addr().unwrap());
        let mgmt_url = format!("http://{}", mgmt_listener.local_addr().unwrap());

        let mut api_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            axum::serve(api_listener, api_router.into_make_service_with_connect_info::<SocketAddr>())
                .with_graceful_shutdown(async move {
                    let _ = api_rx.wait_for(|&s| s).await;
                })
                .await
                .unwrap();
        });

        let mut mgmt_rx = shutdown_rx;
        tokio::spawn(async move {
            axum::serve(mgmt_listener, mgmt.into_make_service_with_connect_info::<SocketAddr>())
                .with_graceful_shutdown(async move {
                    let _ = mgmt_rx.wait_for(|&s| s).await;
                })
                .await
                .unwrap();
        });

        let client = reqwest::Client::builder().redirect(reqwest::redirect::Policy::none()).build().unwrap();

        Self { server_url, mgmt_url, client, config, wordpress, shutdown_tx }
    }

    pub async fn login(&self, email: &str, password: &str) -> Value {
        let resp = self
            .client
            .post(format!("{}/auth/login", self.server_url))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        resp.json().await.unwrap()
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}
