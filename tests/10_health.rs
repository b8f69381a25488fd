mod common;

use anyhow::Result;
use reqwest::StatusCode;

#[tokio::test]
async fn root_lists_endpoint_groups() -> Result<()> {
    let server = common::start_server().await?;
    let res = reqwest::get(server.url("/")).await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["name"], "School Attendance API");
    assert_eq!(body["endpoints"]["attendance"], "/api/attendances");
    Ok(())
}

#[tokio::test]
async fn health_reports_database_state() -> Result<()> {
    let server = common::start_server().await?;
    let res = reqwest::get(server.url("/api/health")).await?;

    let status = res.status();
    let body = res.json::<serde_json::Value>().await?;
    if std::env::var("ATTENDANCE_E2E_DATABASE_URL").is_ok() {
        assert_eq!(status, StatusCode::OK, "body: {}", body);
        assert_eq!(body["status"], "OK");
    } else {
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE, "body: {}", body);
        assert_eq!(body["database"], "unavailable");
    }
    assert!(body["timestamp"].is_string());
    Ok(())
}

#[tokio::test]
async fn unknown_route_is_not_found() -> Result<()> {
    let server = common::start_server().await?;
    let res = reqwest::get(server.url("/api/nothing-here")).await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}
