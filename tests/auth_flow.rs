mod common;

use axum::http::StatusCode;
use common::{body_text, location, session_cookie, TestApp};

#[tokio::test]
async fn register_login_logout_round_trip() {
    let app = TestApp::new();
    let cookie = app.register("alice", "alice@example.com", "pw1").await;

    // The session resolves to the registered identity
    let response = app.get("/account", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.contains("alice"));
    assert!(body.contains("alice@example.com"));

    // Logout invalidates the server-side session
    let response = app.get("/logout", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    // Replaying the old token never re-resolves to the user
    let response = app.get("/account", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
}

#[tokio::test]
async fn fresh_login_works_after_logout() {
    let app = TestApp::new();
    let cookie = app.register("alice", "alice@example.com", "pw1").await;
    app.get("/logout", Some(&cookie)).await;

    let cookie = app.login("alice@example.com", "pw1").await;
    let response = app.get("/account", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn duplicate_email_registration_creates_no_second_user() {
    let app = TestApp::new();
    app.register("alice", "alice@example.com", "pw1").await;

    let response = app
        .post_form(
            "/register",
            "username=other&email=alice@example.com&password=pw2",
            None,
        )
        .await;

    // Sent to login with the address pre-filled, no session issued
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(location(&response).starts_with("/login?notice=exists"));
    assert!(session_cookie(&response).is_none());

    let conn = app.pool.get().unwrap();
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn login_rejects_wrong_password_and_unknown_email() {
    let app = TestApp::new();
    app.register("alice", "alice@example.com", "pw1").await;

    for body in [
        "email=alice@example.com&password=wrong",
        "email=nobody@example.com&password=pw1",
    ] {
        let response = app.post_form("/login", body, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(session_cookie(&response).is_none());
        let text = body_text(response).await;
        assert!(text.contains("Invalid email or password."));
    }
}

#[tokio::test]
async fn email_comparison_is_case_insensitive() {
    let app = TestApp::new();
    app.register("alice", "Alice@Example.com", "pw1").await;

    // Stored lowercased, and login accepts any casing
    let cookie = app.login("ALICE@example.COM", "pw1").await;
    let response = app.get("/account", Some(&cookie)).await;
    let body = body_text(response).await;
    assert!(body.contains("alice@example.com"));

    // A different casing of the same address cannot register again
    let response = app
        .post_form(
            "/register",
            "username=dup&email=ALICE@EXAMPLE.COM&password=pw",
            None,
        )
        .await;
    assert!(location(&response).starts_with("/login?notice=exists"));
}

#[tokio::test]
async fn passwords_are_stored_hashed() {
    let app = TestApp::new();
    app.register("alice", "alice@example.com", "hunter2").await;

    let conn = app.pool.get().unwrap();
    let stored: String = conn
        .query_row("SELECT password_hash FROM users", [], |r| r.get(0))
        .unwrap();
    assert_ne!(stored, "hunter2");
    assert!(!stored.contains("hunter2"));
    assert!(stored.starts_with("$2")); // bcrypt prefix
}

#[tokio::test]
async fn protected_pages_redirect_anonymous_visitors_to_login() {
    let app = TestApp::new();
    for path in ["/account", "/edit-account", "/new-post", "/logout"] {
        let response = app.get(path, None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "for {path}");
        assert_eq!(location(&response), "/login", "for {path}");
    }
}

#[tokio::test]
async fn edit_account_rejects_email_of_another_user() {
    let app = TestApp::new();
    app.register("alice", "alice@example.com", "pw1").await;
    let bob = app.register("bob", "bob@example.com", "pw2").await;

    let response = app
        .post_form(
            "/edit-account",
            "username=bob&email=alice@example.com",
            Some(&bob),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.contains("already in use"));

    // Nothing changed
    let conn = app.pool.get().unwrap();
    let email: String = conn
        .query_row(
            "SELECT email FROM users WHERE username = 'bob'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(email, "bob@example.com");
}

#[tokio::test]
async fn edit_account_updates_profile() {
    let app = TestApp::new();
    let cookie = app.register("alice", "alice@example.com", "pw1").await;

    let response = app
        .post_form(
            "/edit-account",
            "username=alicia&email=alicia@example.com",
            Some(&cookie),
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/account");

    let response = app.get("/account", Some(&cookie)).await;
    let body = body_text(response).await;
    assert!(body.contains("alicia"));
    assert!(body.contains("alicia@example.com"));
}
