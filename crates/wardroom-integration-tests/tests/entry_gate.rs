//! Entry gate behavior on page loads.

use axum::http::{header, Method, StatusCode};
use serde_json::json;
use wardroom_gate::Enforcement;
use wardroom_integration_tests::{
    header_value, json_body, location, request, session_cookie, set_cookies, TestGate,
};
use wardroom_rank::Rank;

#[tokio::test]
async fn unauthenticated_page_load_goes_to_sign_in() {
    let gate = TestGate::new();

    let response = gate.get("/dashboard", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response).as_deref(), Some("/sign-in"));

    let garbage = gate.get("/dashboard", Some("wardroom_session=abc.def")).await;
    assert_eq!(location(&garbage).as_deref(), Some("/sign-in"));

    let sign_in = gate.get("/sign-in", None).await;
    assert_eq!(sign_in.status(), StatusCode::OK);
}

#[tokio::test]
async fn allowed_route_renders_with_context_headers() {
    let gate = TestGate::new();
    let cookie = gate.sign_in("ext-1").await;

    let response = gate.get("/crm/contacts", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_value(&response, "x-wardroom-effective-rank").as_deref(), Some("crew"));
    assert_eq!(header_value(&response, "x-wardroom-actual-rank").as_deref(), Some("crew"));
    assert_eq!(header_value(&response, "x-wardroom-theme").as_deref(), Some("system"));
    assert_eq!(header_value(&response, header::VARY.as_str()).as_deref(), Some("Cookie"));
    assert!(set_cookies(&response).is_empty());

    let body = json_body(response).await;
    assert_eq!(body["view"], "/crm/contacts");
    assert_eq!(body["effective_rank"], "crew");
}

#[tokio::test]
async fn root_and_overview_routes_redirect() {
    let gate = TestGate::new();
    let (crew, _) = gate.sign_in_as("ext-crew", Some(Rank::Crew)).await;
    let (admiral, _) = gate.sign_in_as("ext-admiral", Some(Rank::Admiral)).await;

    let response = gate.get("/", Some(&crew)).await;
    assert_eq!(location(&response).as_deref(), Some("/dashboard"));

    let response = gate.get("/", Some(&admiral)).await;
    assert_eq!(location(&response).as_deref(), Some("/admin/users"));

    let response = gate.get("/crm", Some(&crew)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response).as_deref(), Some("/crm/contacts"));
}

#[tokio::test]
async fn hard_mode_redirects_denied_route_home() {
    let gate = TestGate::new();
    let cookie = gate.sign_in("ext-1").await;

    let response = gate.get("/admin/users", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response).as_deref(), Some("/dashboard"));
}

#[tokio::test]
async fn soft_mode_logs_but_passes_denied_route() {
    let gate = TestGate::with_enforcement(Enforcement::Soft);
    let cookie = gate.sign_in("ext-1").await;

    let response = gate.get("/admin/users", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_value(&response, "x-wardroom-effective-rank").as_deref(), Some("crew"));
    assert_eq!(json_body(response).await["view"], "/admin/users");
}

#[tokio::test]
async fn promotion_is_picked_up_on_next_request() {
    let gate = TestGate::new();
    let cookie = gate.sign_in("ext-1").await;
    let id = gate.sovereign_id("ext-1");

    let before = gate.get("/crm/pipeline", Some(&cookie)).await;
    assert_eq!(location(&before).as_deref(), Some("/dashboard"));

    gate.state.storage.set_rank(&id, Some(Rank::Captain)).unwrap();

    let after = gate.get("/crm/pipeline", Some(&cookie)).await;
    assert_eq!(after.status(), StatusCode::OK);
    assert_eq!(header_value(&after, "x-wardroom-actual-rank").as_deref(), Some("captain"));

    let fresh = session_cookie(&after).expect("credential re-minted");
    let claims = gate
        .state
        .sessions
        .verify(fresh.trim_start_matches("wardroom_session="))
        .unwrap();
    assert_eq!(claims.fields().rank, Some(Rank::Captain));

    // The re-minted credential is current, so no further re-mint happens
    let settled = gate.get("/crm/pipeline", Some(&fresh)).await;
    assert_eq!(settled.status(), StatusCode::OK);
    assert!(session_cookie(&settled).is_none());
}

#[tokio::test]
async fn deleted_user_is_sent_to_invalidation() {
    let gate = TestGate::new();
    let cookie = gate.sign_in("ext-1").await;
    let id = gate.sovereign_id("ext-1");

    gate.state.storage.delete_user(&id).unwrap();

    let response = gate.get("/dashboard", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response).as_deref(), Some("/api/session/invalidate"));

    let data = gate.get("/api/data/me", Some(&cookie)).await;
    assert_eq!(data.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(data).await, json!({ "error": "sovereign_user_not_found" }));

    let invalidated = gate.get("/api/session/invalidate", Some(&cookie)).await;
    assert_eq!(location(&invalidated).as_deref(), Some("/sign-in?session=expired"));
}

#[tokio::test]
async fn admiral_view_as_narrows_routes_but_not_data() {
    let gate = TestGate::new();
    let (cookie, _) = gate.sign_in_as("ext-admiral", Some(Rank::Admiral)).await;

    let response = gate
        .send(request(
            Method::POST,
            "/api/session/view-as",
            Some(&cookie),
            Some(json!({ "rank": "crew" })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let viewing = session_cookie(&response).expect("view-as cookie");
    let body = json_body(response).await;
    assert_eq!(body["rank"], "admiral");
    assert_eq!(body["effective_rank"], "crew");

    let page = gate.get("/admin/users", Some(&viewing)).await;
    assert_eq!(location(&page).as_deref(), Some("/dashboard"));

    let home = gate.get("/dashboard", Some(&viewing)).await;
    assert_eq!(header_value(&home, "x-wardroom-effective-rank").as_deref(), Some("crew"));
    assert_eq!(header_value(&home, "x-wardroom-actual-rank").as_deref(), Some("admiral"));

    let manifest = json_body(gate.get("/api/session/manifest", Some(&viewing)).await).await;
    assert_eq!(manifest["id"], "crew");

    let data = gate.get("/api/data/users?rank=crew", Some(&viewing)).await;
    assert_eq!(data.status(), StatusCode::OK);
}

#[tokio::test]
async fn view_as_is_admiral_only() {
    let gate = TestGate::new();
    let (cookie, _) = gate.sign_in_as("ext-commodore", Some(Rank::Commodore)).await;

    let response = gate
        .send(request(
            Method::POST,
            "/api/session/view-as",
            Some(&cookie),
            Some(json!({ "rank": "crew" })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn demoted_admiral_loses_view_as() {
    let gate = TestGate::new();
    let (cookie, id) = gate.sign_in_as("ext-admiral", Some(Rank::Admiral)).await;
    let response = gate
        .send(request(
            Method::POST,
            "/api/session/view-as",
            Some(&cookie),
            Some(json!({ "rank": "captain" })),
        ))
        .await;
    let viewing = session_cookie(&response).unwrap();

    gate.state.storage.set_rank(&id, Some(Rank::Commodore)).unwrap();

    let page = gate.get("/dashboard", Some(&viewing)).await;
    assert_eq!(header_value(&page, "x-wardroom-effective-rank").as_deref(), Some("commodore"));
    let fresh = session_cookie(&page).expect("re-minted");
    let claims = gate
        .state
        .sessions
        .verify(fresh.trim_start_matches("wardroom_session="))
        .unwrap();
    assert_eq!(claims.fields().view_as, None);
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let gate = TestGate::with_enforcement(Enforcement::Soft);
    let cookie = gate.sign_in("ext-1").await;

    let response = gate.get("/no/such/view", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
