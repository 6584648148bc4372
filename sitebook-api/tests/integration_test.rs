/// Integration tests for the SiteBook API
///
/// The first group drives the router over an unreachable database and covers
/// everything decided before a query runs: authentication, validation,
/// routing and response headers.
///
/// The `#[ignore]`d group needs PostgreSQL:
///
/// ```bash
/// DATABASE_URL=postgres://localhost/sitebook_test cargo test -p sitebook-api -- --ignored
/// ```

mod common;

use axum::http::StatusCode;
use common::{
    lazy_app, lazy_app_with, send, test_config, token_for, TestContext, UNREACHABLE_DATABASE_URL,
};
use serde_json::json;
use sitebook_shared::models::{membership::MembershipRole, organization::Organization};
use uuid::Uuid;

#[tokio::test]
async fn test_health_reports_degraded_without_database() {
    let app = lazy_app();

    let (status, body) = send(&app, "GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["database"], "disconnected");
}

#[tokio::test]
async fn test_protected_routes_require_bearer_token() {
    let app = lazy_app();

    for uri in ["/v1/projects", "/v1/invoices", "/v1/changes", "/v1/portal/projects"] {
        let (status, body) = send(&app, "GET", uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
        assert_eq!(body["error"], "unauthorized");
    }
}

#[tokio::test]
async fn test_invalid_token_is_rejected() {
    let app = lazy_app();

    let (status, _) = send(&app, "GET", "/v1/projects", Some("not.a.jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let foreign = sitebook_shared::auth::jwt::issue_token_pair(
        Uuid::new_v4(),
        Uuid::new_v4(),
        "some-other-secret-that-is-32-bytes-long",
    )
    .unwrap()
    .0;
    let (status, _) = send(&app, "GET", "/v1/projects", Some(&foreign), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = lazy_app();

    let (status, _) = send(&app, "GET", "/v1/does-not-exist", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_register_validates_before_touching_database() {
    let app = lazy_app();

    let (status, body) = send(
        &app,
        "POST",
        "/v1/auth/register",
        None,
        Some(json!({
            "email": "not-an-email",
            "password": "Sup3rSecret!",
            "company_name": "Ridgeline Builders"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation_error");
    assert_eq!(body["details"][0]["field"], "email");

    let (status, body) = send(
        &app,
        "POST",
        "/v1/auth/register",
        None,
        Some(json!({
            "email": "dana@example.com",
            "password": "short",
            "company_name": "Ridgeline Builders"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["field"], "password");
}

#[tokio::test]
async fn test_request_bodies_are_validated_before_role_checks() {
    let app = lazy_app();
    let token = token_for(Uuid::new_v4(), Uuid::new_v4());

    let (status, body) = send(
        &app,
        "PUT",
        "/v1/payroll/config",
        Some(&token),
        Some(json!({
            "overtime_threshold_hours": "40",
            "overtime_multiplier": "0.5",
            "pay_period": "weekly",
            "period_anchor": "2024-01-01"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["field"], "config");

    let (status, body) = send(
        &app,
        "POST",
        "/v1/invoices",
        Some(&token),
        Some(json!({ "bill_to_name": "Dana Whitfield", "line_items": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["field"], "line_items");

    let (status, _) = send(
        &app,
        "POST",
        "/v1/time-entries",
        Some(&token),
        Some(json!({ "work_date": "2025-06-12", "hours": "25" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_oversized_amounts_are_rejected() {
    let app = lazy_app();
    let token = token_for(Uuid::new_v4(), Uuid::new_v4());

    let (status, body) = send(
        &app,
        "POST",
        "/v1/invoices",
        Some(&token),
        Some(json!({
            "bill_to_name": "Dana Whitfield",
            "line_items": [{
                "description": "Steel",
                "quantity": "1000000000000000",
                "unit_price": "1000000000000000"
            }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["field"], "line_items");

    let (status, body) = send(
        &app,
        "POST",
        "/v1/payroll/calculate",
        Some(&token),
        Some(json!({ "total_hours": "100000", "hourly_rate": "30" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["field"], "total_hours");

    let (status, body) = send(
        &app,
        "POST",
        "/v1/members",
        Some(&token),
        Some(json!({ "email": "crew@example.com", "hourly_rate": "100000000" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["field"], "hourly_rate");
}

#[tokio::test]
async fn test_change_feed_is_capped() {
    let mut config = test_config(UNREACHABLE_DATABASE_URL);
    config.api.max_change_subscribers = 0;
    let app = lazy_app_with(config);
    let token = token_for(Uuid::new_v4(), Uuid::new_v4());

    let (status, body) = send(&app, "GET", "/v1/changes", Some(&token), None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["message"], "Too many change feed subscribers");
}

#[tokio::test]
async fn test_unknown_document_type_is_not_found() {
    let app = lazy_app();
    let token = token_for(Uuid::new_v4(), Uuid::new_v4());

    let (status, body) = send(&app, "POST", "/v1/numbering/memo/reserve", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_security_headers_are_set() {
    let app = lazy_app();

    let response = {
        use tower::ServiceExt;
        let request = axum::http::Request::builder()
            .uri("/health")
            .body(axum::body::Body::empty())
            .unwrap();
        app.oneshot(request).await.unwrap()
    };

    let headers = response.headers();
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert!(headers.get("strict-transport-security").is_none());
}

// ---------------------------------------------------------------------------
// PostgreSQL-backed flows
// ---------------------------------------------------------------------------

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_register_then_login() {
    let ctx = TestContext::new().await.unwrap();
    let email = format!("founder-{}@example.com", Uuid::new_v4());

    let (status, body) = send(
        &ctx.app,
        "POST",
        "/v1/auth/register",
        None,
        Some(json!({
            "email": email,
            "password": "Sup3rSecret!",
            "name": "Dana Whitfield",
            "company_name": "Whitfield Homes"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let org_id = body["org_id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &ctx.app,
        "POST",
        "/v1/auth/login",
        None,
        Some(json!({ "email": email, "password": "Sup3rSecret!" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["org_id"], org_id.as_str());
    let token = body["access_token"].as_str().unwrap().to_string();

    let (status, body) = send(&ctx.app, "GET", "/v1/organization", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Whitfield Homes");

    let (status, _) = send(
        &ctx.app,
        "POST",
        "/v1/auth/login",
        None,
        Some(json!({ "email": email, "password": "WrongPassword1!" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let deleted = Organization::delete(&ctx.db, org_id.parse().unwrap()).await.unwrap();
    assert!(deleted);
    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_rfis_are_numbered_in_sequence() {
    let ctx = TestContext::new().await.unwrap();
    let token = ctx.owner_token.clone();

    let (status, project) = send(
        &ctx.app,
        "POST",
        "/v1/projects",
        Some(&token),
        Some(json!({ "name": "Maple St. Duplex" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let project_id = project["id"].as_str().unwrap().to_string();

    let mut numbers = Vec::new();
    for subject in ["Footing depth", "Window header size"] {
        let (status, rfi) = send(
            &ctx.app,
            "POST",
            &format!("/v1/projects/{}/rfis", project_id),
            Some(&token),
            Some(json!({ "subject": subject, "question": "Please confirm." })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        numbers.push(rfi["rfi_number"].as_str().unwrap().to_string());
    }
    assert_eq!(numbers, vec!["RFI-00001", "RFI-00002"]);

    let (status, rfis) = send(
        &ctx.app,
        "GET",
        &format!("/v1/projects/{}/rfis?search=window&sort=number&desc=true", project_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rfis.as_array().unwrap().len(), 1);
    assert_eq!(rfis[0]["rfi_number"], "RFI-00002");

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_invoice_uses_default_tax_rate() {
    let ctx = TestContext::new().await.unwrap();
    let token = ctx.owner_token.clone();

    let (status, _) = send(
        &ctx.app,
        "POST",
        "/v1/tax-rates",
        Some(&token),
        Some(json!({ "name": "County", "rate": "8.25", "is_default": true })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, invoice) = send(
        &ctx.app,
        "POST",
        "/v1/invoices",
        Some(&token),
        Some(json!({
            "bill_to_name": "Dana Whitfield",
            "line_items": [
                { "description": "Framing labor", "quantity": "10", "unit_price": "125.50" },
                { "description": "Lumber", "quantity": "1", "unit_price": "400" }
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(invoice["invoice_number"], "INV-00001");
    assert_eq!(invoice["subtotal"], "1655.00");
    assert_eq!(invoice["tax_amount"], "136.54");
    assert_eq!(invoice["total"], "1791.54");

    let id = invoice["id"].as_str().unwrap().to_string();
    let (status, sent) = send(&ctx.app, "POST", &format!("/v1/invoices/{}/send", id), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sent["invoice"]["status"], "sent");
    assert_eq!(sent["emailed"], false);

    let (status, _) = send(
        &ctx.app,
        "PATCH",
        &format!("/v1/invoices/{}", id),
        Some(&token),
        Some(json!({ "notes": "too late" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_role_checks() {
    let ctx = TestContext::new().await.unwrap();
    let (_, worker_token) = ctx.add_member(MembershipRole::Worker, None).await.unwrap();

    let (status, _) = send(&ctx.app, "GET", "/v1/projects", Some(&worker_token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &ctx.app,
        "POST",
        "/v1/projects",
        Some(&worker_token),
        Some(json!({ "name": "Unauthorized build" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&ctx.app, "GET", "/v1/activity", Some(&worker_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Member of another organization
    let outsider = token_for(ctx.owner.id, Uuid::new_v4());
    let (status, _) = send(&ctx.app, "GET", "/v1/projects", Some(&outsider), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_awarding_a_bid_rejects_competitors() {
    let ctx = TestContext::new().await.unwrap();
    let token = ctx.owner_token.clone();

    let (_, project) = send(
        &ctx.app,
        "POST",
        "/v1/projects",
        Some(&token),
        Some(json!({ "name": "Cedar Ridge Clinic" })),
    )
    .await;
    let project_id = project["id"].as_str().unwrap().to_string();

    let mut bid_ids = Vec::new();
    for (company, amount) in [("Volt Bros", "18500"), ("Bright Line Electric", "17250")] {
        let (_, sub) = send(
            &ctx.app,
            "POST",
            "/v1/subcontractors",
            Some(&token),
            Some(json!({ "company_name": company, "trade": "electrical" })),
        )
        .await;

        let (status, bid) = send(
            &ctx.app,
            "POST",
            &format!("/v1/projects/{}/bids", project_id),
            Some(&token),
            Some(json!({ "subcontractor_id": sub["id"], "amount": amount })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        bid_ids.push(bid["id"].as_str().unwrap().to_string());
    }

    let (status, award) = send(
        &ctx.app,
        "POST",
        &format!("/v1/bids/{}/award", bid_ids[1]),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(award["bid"]["status"], "accepted");
    assert_eq!(award["rejected"][0], bid_ids[0].as_str());

    let (status, _) = send(
        &ctx.app,
        "POST",
        &format!("/v1/bids/{}/award", bid_ids[0]),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_portal_client_sees_only_their_projects() {
    let ctx = TestContext::new().await.unwrap();
    let token = ctx.owner_token.clone();
    let (client, client_token) = ctx.add_member(MembershipRole::Client, None).await.unwrap();

    let (_, theirs) = send(
        &ctx.app,
        "POST",
        "/v1/projects",
        Some(&token),
        Some(json!({ "name": "Client kitchen remodel", "client_id": client.id })),
    )
    .await;
    let (_, other) = send(
        &ctx.app,
        "POST",
        "/v1/projects",
        Some(&token),
        Some(json!({ "name": "Someone else's deck" })),
    )
    .await;

    let (status, projects) = send(&ctx.app, "GET", "/v1/portal/projects", Some(&client_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(projects.as_array().unwrap().len(), 1);
    assert_eq!(projects[0]["id"], theirs["id"]);

    let other_id = other["id"].as_str().unwrap();
    let (status, _) = send(
        &ctx.app,
        "GET",
        &format!("/v1/portal/projects/{}/invoices", other_id),
        Some(&client_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let theirs_id = theirs["id"].as_str().unwrap();
    let (status, message) = send(
        &ctx.app,
        "POST",
        &format!("/v1/portal/projects/{}/messages", theirs_id),
        Some(&client_token),
        Some(json!({ "body": "Can we move the island 6 inches?" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(message["body"], "Can we move the island 6 inches?");

    // Staff routes are closed to clients
    let (status, _) = send(&ctx.app, "GET", "/v1/projects", Some(&client_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_feeds_carry_relative_time() {
    let ctx = TestContext::new().await.unwrap();
    let token = ctx.owner_token.clone();

    let (status, _) = send(
        &ctx.app,
        "POST",
        "/v1/projects",
        Some(&token),
        Some(json!({ "name": "Harbor View Remodel" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, activity) = send(&ctx.app, "GET", "/v1/activity", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(activity[0]["when"], "just now");
    assert!(activity[0]["created_at"].is_string());

    let (status, thread) = send(
        &ctx.app,
        "POST",
        "/v1/threads",
        Some(&token),
        Some(json!({ "subject": "Crane delivery" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let thread_id = thread["id"].as_str().unwrap().to_string();

    let (status, message) = send(
        &ctx.app,
        "POST",
        &format!("/v1/threads/{}/messages", thread_id),
        Some(&token),
        Some(json!({ "body": "Arriving Tuesday 7am" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(message["body"], "Arriving Tuesday 7am");
    assert_eq!(message["when"], "just now");

    let (status, messages) = send(
        &ctx.app,
        "GET",
        &format!("/v1/threads/{}/messages", thread_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(messages[0]["when"], "just now");

    ctx.cleanup().await.unwrap();
}
