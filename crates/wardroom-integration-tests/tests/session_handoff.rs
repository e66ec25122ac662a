//! Session endpoints and the handoff ceremony over HTTP.

use axum::http::{Method, StatusCode};
use serde_json::json;
use wardroom_gate::{Invitation, LocalProvider};
use wardroom_integration_tests::{
    header_value, json_body, location, request, session_cookie, set_cookies, TestGate,
};
use wardroom_rank::Rank;

#[tokio::test]
async fn first_login_creates_one_crew_user_and_mapping() {
    let gate = TestGate::new();

    let cookie = gate.sign_in("ext-new").await;
    let id = gate.sovereign_id("ext-new");
    let user = gate.state.storage.get_user(&id).unwrap().unwrap();
    assert_eq!(user.rank, Some(Rank::Crew));

    let claims = gate
        .state
        .sessions
        .verify(cookie.trim_start_matches("wardroom_session="))
        .unwrap();
    assert_eq!(claims.fields().rank, Some(Rank::Crew));
    assert_eq!(claims.fields().sovereign_id, id);

    // Same external identity again: no second user, no second mapping
    gate.sign_in("ext-new").await;
    assert_eq!(gate.sovereign_id("ext-new"), id);
    assert_eq!(gate.state.storage.list_users_by_rank(Rank::Crew).unwrap().len(), 1);
    assert_eq!(gate.state.registry.audit().unwrap(), 1);
}

#[tokio::test]
async fn failed_handoff_redirects_without_session() {
    let gate = TestGate::new();

    for path in ["/api/session?ticket=forged.ticket", "/api/session"] {
        let response = gate.get(path, None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response).as_deref(), Some("/sign-in?error=session_failed"));
        assert!(session_cookie(&response).is_none());
    }
    assert!(gate.state.storage.list_users_by_rank(Rank::Crew).unwrap().is_empty());
}

#[tokio::test]
async fn replayed_ticket_is_refused() {
    let gate = TestGate::new();
    let ticket = gate.ticket("ext-1", None);

    let first = gate.get(&format!("/api/session?ticket={ticket}"), None).await;
    assert_eq!(location(&first).as_deref(), Some("/"));

    let second = gate.get(&format!("/api/session?ticket={ticket}"), None).await;
    assert_eq!(location(&second).as_deref(), Some("/sign-in?error=session_failed"));
}

#[tokio::test]
async fn post_session_returns_json() {
    let gate = TestGate::new();

    let response = gate
        .send(request(
            Method::POST,
            "/api/session",
            None,
            Some(json!({ "ticket": gate.ticket("ext-post", None) })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert!(session_cookie(&response).is_some());
    let body = json_body(response).await;
    assert_eq!(body["rank"], "crew");
    assert_eq!(body["effective_rank"], "crew");

    let again = gate
        .send(request(
            Method::POST,
            "/api/session",
            None,
            Some(json!({ "ticket": gate.ticket("ext-post", None) })),
        ))
        .await;
    assert_eq!(again.status(), StatusCode::OK);

    let rejected = gate
        .send(request(
            Method::POST,
            "/api/session",
            None,
            Some(json!({ "ticket": "nope" })),
        ))
        .await;
    assert_eq!(rejected.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(rejected).await, json!({ "error": "session_failed" }));
}

#[tokio::test]
async fn invitation_grants_initial_rank() {
    let gate = TestGate::new();
    gate.state
        .storage
        .put_invitation(&Invitation::new("lead@example.com", Rank::Commodore, None))
        .unwrap();

    let external_id = LocalProvider::external_id_for_email("lead@example.com");
    let cookie = gate
        .sign_in_with_email(&external_id, Some("lead@example.com"))
        .await;

    let response = gate.get("/api/data/me", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["rank"], "commodore");
}

#[tokio::test]
async fn invitation_org_reaches_page_headers() {
    let gate = TestGate::new();
    let invitation = Invitation::new("ops@example.com", Rank::Crew, None)
        .with_org(Some("org_7".into()));
    gate.state.storage.put_invitation(&invitation).unwrap();

    let external_id = LocalProvider::external_id_for_email("ops@example.com");
    let cookie = gate
        .sign_in_with_email(&external_id, Some("ops@example.com"))
        .await;

    let response = gate.get("/crm/contacts", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_value(&response, "x-wardroom-org-id").as_deref(), Some("org_7"));
}

#[tokio::test]
async fn delete_session_clears_cookie() {
    let gate = TestGate::new();
    let cookie = gate.sign_in("ext-1").await;

    let response = gate
        .send(request(Method::DELETE, "/api/session", Some(&cookie), None))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 1);
    assert!(cookies[0].starts_with("wardroom_session=;"));
    assert!(cookies[0].contains("Max-Age=0"));
}

#[tokio::test]
async fn invalidate_clears_session_and_provider_cookies() {
    let gate = TestGate::new();

    let response = gate.get("/api/session/invalidate", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response).as_deref(), Some("/sign-in?session=expired"));

    let cookies = set_cookies(&response);
    assert!(cookies.iter().any(|c| c.starts_with("wardroom_session=;")));
    assert!(cookies.iter().any(|c| c.starts_with("local_provider_session=;")));
}

#[tokio::test]
async fn refresh_picks_up_profile_changes() {
    let gate = TestGate::new();
    let cookie = gate.sign_in("ext-1").await;

    let patched = gate
        .send(request(
            Method::PATCH,
            "/api/data/me/profile",
            Some(&cookie),
            Some(json!({ "theme": { "mode": "dark", "high_contrast": true } })),
        ))
        .await;
    assert_eq!(patched.status(), StatusCode::OK);

    let refreshed = gate.get("/api/session/refresh", Some(&cookie)).await;
    assert_eq!(refreshed.status(), StatusCode::OK);
    let fresh = session_cookie(&refreshed).expect("re-minted cookie");

    let claims = gate
        .state
        .sessions
        .verify(fresh.trim_start_matches("wardroom_session="))
        .unwrap();
    assert!(claims.fields().profile.theme.high_contrast);
    assert_eq!(claims.fields().profile.theme.mode.as_str(), "dark");
}

#[tokio::test]
async fn sign_in_link_targets_own_identity() {
    let gate = TestGate::new();
    let cookie = gate.sign_in("ext-self").await;

    let response = gate
        .send(request(Method::POST, "/api/session/sign-in-link", Some(&cookie), None))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let token = json_body(response).await["token"].as_str().unwrap().to_string();

    let login = gate.get(&format!("/api/session?ticket={token}"), None).await;
    assert_eq!(location(&login).as_deref(), Some("/"));
    assert_eq!(gate.state.registry.audit().unwrap(), 1);
}

#[tokio::test]
async fn session_endpoints_require_a_credential() {
    let gate = TestGate::new();
    for path in ["/api/session/refresh", "/api/session/manifest", "/api/data/me"] {
        let response = gate.get(path, None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{path}");
    }
}
