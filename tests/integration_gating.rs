#![allow(clippy::unwrap_used, clippy::panic, clippy::todo, clippy::missing_panics_doc, clippy::must_use_candidate, missing_debug_implementations, clippy::cast_precision_loss, clippy::clone_on_ref_ptr, clippy::match_same_arms, clippy::items_after_statements, unreachable_pub, clippy::print_stdout, clippy::similar_names)]
use reqwest::StatusCode;
use reqwest::header::{COOKIE, LOCATION};

mod common;

#[tokio::test]
async fn test_private_page_redirects_to_login_with_path() {
    let app = common::TestApp::spawn().await;

    let resp = app.client.get(format!("{}/sport/nfl/standings?week=3", app.server_url)).send().await.unwrap();

    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(resp.headers()[LOCATION], "/login?redirect=%2Fsport%2Fnfl%2Fstandings");
}

#[tokio::test]
async fn test_public_pages_pass_the_gate() {
    let app = common::TestApp::spawn().await;

    for path in ["/", "/login", "/register", "/subscribe", "/forgot-password"] {
        let resp = app.client.get(format!("{}{path}", app.server_url)).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{path}");
    }
}

#[tokio::test]
async fn test_public_prefix_is_not_a_wildcard() {
    let app = common::TestApp::spawn().await;

    let resp = app.client.get(format!("{}/login-history", app.server_url)).send().await.unwrap();

    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
}

#[tokio::test]
async fn test_cookie_or_bearer_passes_the_gate() {
    let app = common::TestApp::spawn().await;

    let resp = app
        .client
        .get(format!("{}/sport/nba", app.server_url))
        .header(COOKIE, "authToken=jwt-1")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app.client.get(format!("{}/sport/nba", app.server_url)).bearer_auth("jwt-1").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_empty_cookie_does_not_pass_the_gate() {
    let app = common::TestApp::spawn().await;

    let resp =
        app.client.get(format!("{}/sport/nba", app.server_url)).header(COOKIE, "authToken=").send().await.unwrap();

    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
}

#[tokio::test]
async fn test_auth_api_is_never_redirected() {
    let app = common::TestApp::spawn().await;

    let resp = app.client.get(format!("{}/auth/validate", app.server_url)).send().await.unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}
