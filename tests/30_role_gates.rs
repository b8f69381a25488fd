mod common;

use anyhow::Result;
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};

async fn call(
    server: &common::TestServer,
    method: Method,
    path: &str,
    token: &str,
    body: Option<Value>,
) -> Result<reqwest::Response> {
    let mut request = reqwest::Client::new().request(method, server.url(path)).bearer_auth(token);
    if let Some(body) = body {
        request = request.json(&body);
    }
    Ok(request.send().await?)
}

#[tokio::test]
async fn roles_outside_the_allowed_list_are_forbidden() -> Result<()> {
    let server = common::start_server().await?;
    let profesor = common::token_for("Profesor", Some(3), Some(1));
    let cases = [
        (Method::GET, "/api/districts"),
        (Method::GET, "/api/institutions"),
        (Method::GET, "/api/users"),
        (Method::POST, "/api/students"),
        (Method::POST, "/api/student-groups"),
        (Method::DELETE, "/api/biometrics/4"),
        (Method::PUT, "/api/students/4"),
    ];
    for (method, path) in cases {
        let res = call(&server, method.clone(), path, &profesor, Some(json!({}))).await?;
        assert_eq!(res.status(), StatusCode::FORBIDDEN, "{} {}", method, path);
    }
    Ok(())
}

#[tokio::test]
async fn role_names_outside_the_vocabulary_never_pass() -> Result<()> {
    let server = common::start_server().await?;
    let custom = common::token_for("Conserje", Some(3), Some(1));
    for path in ["/api/students", "/api/student-groups", "/api/attendances", "/api/excuses"] {
        let res = call(&server, Method::GET, path, &custom, None).await?;
        assert_eq!(res.status(), StatusCode::FORBIDDEN, "GET {}", path);
    }
    Ok(())
}

#[tokio::test]
async fn only_app_admins_manage_roles() -> Result<()> {
    let server = common::start_server().await?;
    let ministry = common::token_for("AdminMinisterio", None, None);
    let res = call(&server, Method::POST, "/api/roles", &ministry, Some(json!({ "roleName": "Auditor" }))).await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn institution_admin_cannot_create_higher_roles() -> Result<()> {
    let server = common::start_server().await?;
    let admin = common::token_for("AdminInstitucion", Some(3), Some(1));
    for role in ["AdminApp", "AdminMinisterio", "AdminDistrito", "AdminInstitucion"] {
        let body = json!({ "username": "nuevo", "password": "Secreto123", "roleName": role });
        let res = call(&server, Method::POST, "/api/users", &admin, Some(body)).await?;
        assert_eq!(res.status(), StatusCode::FORBIDDEN, "role {}", role);
    }
    Ok(())
}

#[tokio::test]
async fn non_numeric_ids_are_rejected_before_the_database() -> Result<()> {
    let server = common::start_server().await?;
    let admin = common::token_for("AdminInstitucion", Some(3), Some(1));
    for path in ["/api/students/abc", "/api/student-groups/x/members", "/api/excuses/record/uno"] {
        let res = call(&server, Method::GET, path, &admin, None).await?;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "GET {}", path);
        let body = res.json::<Value>().await?;
        assert_eq!(body["message"], "El ID solicitado debe ser un número válido.");
    }
    Ok(())
}

#[tokio::test]
async fn empty_member_list_is_rejected() -> Result<()> {
    let server = common::start_server().await?;
    let admin = common::token_for("AdminInstitucion", Some(3), Some(1));
    let res = call(&server, Method::POST, "/api/student-groups/3/members", &admin, Some(json!({ "studentIds": [] }))).await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}
