mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn login_requires_both_fields() -> Result<()> {
    let server = common::start_server().await?;
    let client = reqwest::Client::new();

    for payload in [json!({}), json!({ "username": "ana" }), json!({ "password": "secreto" })] {
        let res = client.post(server.url("/api/auth/login")).json(&payload).send().await?;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "payload: {}", payload);
        let body = res.json::<Value>().await?;
        assert_eq!(body["message"], "Nombre de usuario y contraseña son requeridos.");
    }
    Ok(())
}

#[tokio::test]
async fn login_with_malformed_json_is_bad_request() -> Result<()> {
    let server = common::start_server().await?;
    let res = reqwest::Client::new()
        .post(server.url("/api/auth/login"))
        .header("content-type", "application/json")
        .body("{\"username\":")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(res.json::<Value>().await?["message"].is_string());
    Ok(())
}

#[tokio::test]
async fn refresh_reissues_a_valid_token() -> Result<()> {
    let server = common::start_server().await?;
    let token = common::token_for("Profesor", Some(3), Some(1));

    let res = reqwest::Client::new()
        .post(server.url("/api/auth/refresh-token"))
        .json(&json!({ "token": token }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body = res.json::<Value>().await?;
    assert_eq!(body["message"], "Token refrescado exitosamente.");
    let fresh = body["token"].as_str().unwrap_or_default();
    assert!(!fresh.is_empty());

    // The refreshed token opens the protected surface like the original
    let res = reqwest::Client::new()
        .get(server.url("/api/students/abc"))
        .bearer_auth(fresh)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn refresh_rejects_missing_and_forged_tokens() -> Result<()> {
    let server = common::start_server().await?;
    let client = reqwest::Client::new();

    let res = client.post(server.url("/api/auth/refresh-token")).json(&json!({})).send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .post(server.url("/api/auth/refresh-token"))
        .json(&json!({ "token": "eyJhbGciOiJIUzI1NiJ9.e30.forged" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn protected_routes_need_a_bearer_token() -> Result<()> {
    let server = common::start_server().await?;
    let client = reqwest::Client::new();

    let res = client.get(server.url("/api/districts")).send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client.get(server.url("/api/districts")).bearer_auth("not-a-jwt").send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}
