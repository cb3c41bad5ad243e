mod common;

use anyhow::Result;
use axum::http::StatusCode;

use common::{get, json_body, post_json, test_config, TestApp, SUPREME_SECRET};
use staffgate::database::PrivilegeStore;

const MAKE_BREAK: &str = "/v1/supreme-leader/make-break";

fn secret_body(secret: &str) -> String {
    serde_json::json!({ "secret_key": secret }).to_string()
}

#[tokio::test]
async fn admin_route_denies_non_admin() -> Result<()> {
    let app = TestApp::new();
    let token = app.token_for(10);

    let res = app.send(get("/v1/admin/overview", Some(&token))).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(res).await?["code"], "INSUFFICIENT_PRIVILEGE");
    Ok(())
}

#[tokio::test]
async fn admin_route_admits_admin() -> Result<()> {
    let app = TestApp::new();
    app.db.create_admin(10).await?;
    let token = app.token_for(10);

    let res = app.send(get("/v1/admin/overview", Some(&token))).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = json_body(res).await?;
    assert_eq!(body["data"]["user"]["id"], 10);
    Ok(())
}

#[tokio::test]
async fn admin_route_without_credential_is_unauthorized() -> Result<()> {
    let app = TestApp::new();
    let res = app.send(get("/v1/admin/overview", None)).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(res).await?["code"], "UNAUTHORIZED");
    Ok(())
}

#[tokio::test]
async fn revocation_applies_to_next_request() -> Result<()> {
    let app = TestApp::new();
    app.db.create_admin(11).await?;
    let token = app.token_for(11);

    let res = app.send(get("/v1/admin/overview", Some(&token))).await;
    assert_eq!(res.status(), StatusCode::OK);

    app.db.delete_admin(11).await?;
    let res = app.send(get("/v1/admin/overview", Some(&token))).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn privilege_lookup_failure_fails_closed() -> Result<()> {
    let app = TestApp::new();
    app.db.create_admin(12).await?;
    app.db.set_unavailable(true);
    let token = app.token_for(12);

    let res = app.send(get("/v1/admin/overview", Some(&token))).await;
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(res).await?["message"], "privilege lookup failed");
    Ok(())
}

#[tokio::test]
async fn wrong_secret_is_a_teapot() -> Result<()> {
    let app = TestApp::new();
    let token = app.token_for(20);

    let res = app
        .send(post_json(MAKE_BREAK, Some(&token), &secret_body("guess")))
        .await;
    assert_eq!(res.status(), StatusCode::IM_A_TEAPOT);
    assert!(app.db.get_admin(20).await.is_err());
    Ok(())
}

#[tokio::test]
async fn malformed_secret_body_is_a_decode_denial() -> Result<()> {
    let app = TestApp::new();
    let token = app.token_for(21);

    let res = app
        .send(post_json(MAKE_BREAK, Some(&token), "{not json"))
        .await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(res).await?;
    assert_eq!(body["code"], "INVALID_JSON");
    assert!(body["message"]
        .as_str()
        .unwrap_or_default()
        .starts_with("invalid json"));
    Ok(())
}

#[tokio::test]
async fn oversized_secret_body_is_a_decode_denial() -> Result<()> {
    let app = TestApp::with_config(test_config(&[("SERVER_MAX_BODY_BYTES", "16")]));
    let token = app.token_for(22);

    // The correct secret, but longer than the limit once wrapped in JSON
    let res = app
        .send(post_json(MAKE_BREAK, Some(&token), &secret_body(SUPREME_SECRET)))
        .await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json_body(res).await?["code"], "INVALID_JSON");
    assert!(app.db.get_admin(22).await.is_err());
    Ok(())
}

#[tokio::test]
async fn supreme_route_checks_credential_before_body() -> Result<()> {
    let app = TestApp::new();
    let res = app.send(post_json(MAKE_BREAK, None, "{not json")).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn make_break_toggles_admin() -> Result<()> {
    let app = TestApp::new();
    let token = app.token_for(30);
    let body = secret_body(SUPREME_SECRET);

    let res = app.send(post_json(MAKE_BREAK, Some(&token), &body)).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    assert_eq!(json_body(res).await?["data"], "New Admin Added");

    // Newly granted privilege is visible to the administrator gate
    let res = app.send(get("/v1/admin/overview", Some(&token))).await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = app.send(post_json(MAKE_BREAK, Some(&token), &body)).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await?["data"], "Removed Existing User");

    let res = app.send(get("/v1/admin/overview", Some(&token))).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}
