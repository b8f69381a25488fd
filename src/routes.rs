//! Route table. Every protected route declares the roles it admits; the
//! bearer-token layer wraps all of them.

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{delete, get, post, put, MethodRouter},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::auth::Role::{self, *};
use crate::config::{AppConfig, Environment};
use crate::handlers::{protected, public};
use crate::middleware::{admission_middleware, jwt_auth_middleware, require_roles};
use crate::state::AppState;

const APP: &[Role] = &[AdminApp];
const APP_MIN: &[Role] = &[AdminApp, AdminMinisterio];
const APP_MIN_DIS: &[Role] = &[AdminApp, AdminMinisterio, AdminDistrito];
const APP_MIN_DIS_INS: &[Role] = &[AdminApp, AdminMinisterio, AdminDistrito, AdminInstitucion];
const INS: &[Role] = &[AdminInstitucion];
const INS_PRO: &[Role] = &[AdminInstitucion, Profesor];
const INS_PRO_APO: &[Role] = &[AdminInstitucion, Profesor, PersonalApoyo];
const STUDENT_READERS: &[Role] = &[AdminInstitucion, Profesor, AdminDistrito, AdminMinisterio];
const SCOPED_READERS: &[Role] = &[AdminApp, AdminInstitucion, Profesor, AdminDistrito, AdminMinisterio];

/// Admits only `roles` on this method route.
fn only(roles: &'static [Role], route: MethodRouter<AppState>) -> MethodRouter<AppState> {
    route.route_layer(from_fn_with_state(roles, require_roles))
}

pub fn app(state: AppState) -> Router {
    let config = state.config.clone();

    Router::new()
        .merge(public_routes())
        .merge(protected_routes(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config))
        .layer(DefaultBodyLimit::max(config.server.max_request_size_bytes))
        .layer(from_fn_with_state(state.clone(), admission_middleware))
        .with_state(state)
}

fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(public::health::root))
        .route("/api/health", get(public::health::health))
        .route("/api/auth/login", post(public::auth::login))
        .route("/api/auth/refresh-token", post(public::auth::refresh_token))
}

fn protected_routes(state: AppState) -> Router<AppState> {
    use protected::*;

    Router::new()
        // Districts
        .route(
            "/api/districts",
            only(APP_MIN, get(districts::list).post(districts::create)),
        )
        .route(
            "/api/districts/:id",
            only(APP_MIN, get(districts::get).put(districts::update).delete(districts::delete)),
        )
        // Institutions
        .route(
            "/api/institutions",
            only(APP_MIN_DIS, get(institutions::list).post(institutions::create)),
        )
        .route(
            "/api/institutions/:id",
            only(APP_MIN_DIS_INS, get(institutions::get))
                .merge(only(APP_MIN_DIS, put(institutions::update).delete(institutions::delete))),
        )
        // Roles
        .route("/api/roles", only(APP, get(roles::list).post(roles::create)))
        .route(
            "/api/roles/:id",
            only(APP, get(roles::get).put(roles::update).delete(roles::delete)),
        )
        // Users
        .route(
            "/api/users",
            only(APP_MIN_DIS_INS, get(users::list).post(users::create)),
        )
        .route("/api/users/filter", only(APP_MIN_DIS_INS, get(users::list)))
        .route(
            "/api/users/:id",
            only(APP_MIN_DIS_INS, get(users::get).put(users::update)),
        )
        // Students
        .route(
            "/api/students",
            only(STUDENT_READERS, get(students::list)).merge(only(INS, post(students::create))),
        )
        .route(
            "/api/students/students-with-groups",
            only(INS_PRO_APO, get(students::with_groups)),
        )
        .route(
            "/api/students/:id",
            only(STUDENT_READERS, get(students::get)).merge(only(INS, put(students::update))),
        )
        .route("/api/students/:id/group", only(SCOPED_READERS, get(students::group)))
        // Student groups
        .route(
            "/api/student-groups",
            only(APP_MIN_DIS_INS, get(groups::list)).merge(only(INS, post(groups::create))),
        )
        .route(
            "/api/student-groups/:id",
            only(APP_MIN_DIS_INS, get(groups::get)).merge(only(INS, put(groups::update))),
        )
        .route(
            "/api/student-groups/:id/members",
            only(SCOPED_READERS, get(groups::list_members)).merge(only(INS, post(groups::assign_members))),
        )
        .route(
            "/api/student-groups/:id/members/:student_id",
            only(INS, delete(groups::remove_member)),
        )
        // Attendance
        .route(
            "/api/attendances",
            only(SCOPED_READERS, get(attendance::list)).merge(only(INS_PRO, post(attendance::create))),
        )
        .route("/api/attendances/record/:id", only(SCOPED_READERS, get(attendance::get)))
        .route(
            "/api/attendances/:id",
            only(SCOPED_READERS, get(attendance::list_for_student))
                .merge(only(INS_PRO, put(attendance::update).delete(attendance::delete))),
        )
        // Excuses
        .route(
            "/api/excuses",
            only(SCOPED_READERS, get(excuses::list)).merge(only(INS_PRO, post(excuses::create))),
        )
        .route("/api/excuses/record/:id", only(SCOPED_READERS, get(excuses::get)))
        .route(
            "/api/excuses/:id",
            only(SCOPED_READERS, get(excuses::list_for_student))
                .merge(only(INS_PRO, put(excuses::update).delete(excuses::delete))),
        )
        // Biometrics
        .route("/api/biometrics", only(INS, post(biometrics::enroll)))
        .route(
            "/api/biometrics/student/:id",
            only(INS_PRO, get(biometrics::get_for_student)),
        )
        .route("/api/biometrics/:id", only(INS, delete(biometrics::delete)))
        .route_layer(from_fn_with_state(state, jwt_auth_middleware))
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    if !config.security.enable_cors || config.environment == Environment::Development {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new().allow_origin(origins).allow_methods(Any).allow_headers(Any)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::auth::Identity;
    use crate::database::DatabaseManager;
    use crate::middleware::auth::{INVALID_TOKEN, MISSING_TOKEN};
    use crate::middleware::roles::ROLE_FORBIDDEN;

    const SECRET: &str = "router-test-secret";

    // The pool points at a closed port; none of these requests reach it.
    fn state() -> AppState {
        let mut config = AppConfig::development();
        config.database.url = Some("postgres://attendance@127.0.0.1:1/attendance".to_string());
        config.database.acquire_timeout_secs = 1;
        config.security.jwt_secret = SECRET.to_string();
        let pool = DatabaseManager::connect_lazy(&config.database).unwrap();
        AppState::new(pool, config).unwrap()
    }

    fn token(state: &AppState, role_name: &str, institution_id: Option<i64>, district_id: Option<i64>) -> String {
        state
            .tokens
            .issue(Identity {
                user_id: 42,
                role_id: 5,
                role_name: role_name.to_string(),
                institution_id,
                district_id,
                is_ministry_user: false,
            })
            .unwrap()
    }

    async fn send(state: &AppState, method: Method, uri: &str, bearer: Option<&str>, body: Option<&str>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(bearer) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", bearer));
        }
        let body = match body {
            Some(body) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(body.to_string())
            }
            None => Body::empty(),
        };
        app(state.clone()).oneshot(builder.body(body).unwrap()).await.unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn root_describes_the_service() {
        let state = state();
        let response = send(&state, Method::GET, "/", None, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["name"], "School Attendance API");
    }

    #[tokio::test]
    async fn protected_routes_need_a_token() {
        let state = state();
        let response = send(&state, Method::GET, "/api/students", None, None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await, json!({ "message": MISSING_TOKEN }));

        let response = send(&state, Method::GET, "/api/students", Some("not-a-jwt"), None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await, json!({ "message": INVALID_TOKEN }));
    }

    #[tokio::test]
    async fn role_gates_run_per_method() {
        let state = state();
        let profesor = token(&state, "Profesor", Some(7), None);

        let response = send(&state, Method::POST, "/api/students", Some(&profesor), Some("{}")).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(json_body(response).await, json!({ "message": ROLE_FORBIDDEN }));

        let response = send(&state, Method::GET, "/api/districts", Some(&profesor), None).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = send(&state, Method::DELETE, "/api/biometrics/3", Some(&profesor), None).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn profesores_read_group_members_but_not_groups() {
        let state = state();
        let profesor = token(&state, "Profesor", Some(7), None);

        for uri in ["/api/student-groups", "/api/student-groups/5"] {
            let response = send(&state, Method::GET, uri, Some(&profesor), None).await;
            assert_eq!(response.status(), StatusCode::FORBIDDEN, "GET {}", uri);
        }

        // Passes the role gate and stops at the path id
        let response = send(&state, Method::GET, "/api/student-groups/x/members", Some(&profesor), None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_role_names_get_no_access() {
        let state = state();
        let custom = token(&state, "Coordinador", Some(7), None);
        let response = send(&state, Method::GET, "/api/student-groups", Some(&custom), None).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn institution_admin_cannot_create_district_admins() {
        let state = state();
        let admin = token(&state, "AdminInstitucion", Some(7), None);
        for district_id in ["null", "1", "\"99\""] {
            let body = format!(
                r#"{{"username":"dis.nuevo","password":"secreto1","roleName":"AdminDistrito","districtId":{}}}"#,
                district_id
            );
            let response = send(&state, Method::POST, "/api/users", Some(&admin), Some(&body)).await;
            assert_eq!(response.status(), StatusCode::FORBIDDEN, "districtId {}", district_id);
        }
    }

    #[tokio::test]
    async fn non_numeric_ids_are_bad_requests() {
        let state = state();
        let admin = token(&state, "AdminInstitucion", Some(7), None);
        let response = send(&state, Method::GET, "/api/students/abc", Some(&admin), None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["message"].is_string());

        let response = send(&state, Method::DELETE, "/api/student-groups/1/members/x", Some(&admin), None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn out_of_range_pages_are_bad_requests() {
        let state = state();
        let admin = token(&state, "AdminInstitucion", Some(7), None);
        let response = send(&state, Method::GET, "/api/students?page=9223372036854775807", Some(&admin), None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["message"], "El parámetro page está fuera de rango.");
    }

    #[tokio::test]
    async fn malformed_bodies_are_bad_requests() {
        let state = state();
        let admin = token(&state, "AdminInstitucion", Some(7), None);
        let response = send(&state, Method::POST, "/api/students", Some(&admin), Some("{\"firstName\":")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(
            &state,
            Method::POST,
            "/api/student-groups/3/members",
            Some(&admin),
            Some(r#"{"studentIds":[]}"#),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn login_requires_both_fields() {
        let state = state();
        let response = send(&state, Method::POST, "/api/auth/login", None, Some(r#"{"username":"ana"}"#)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn refresh_reissues_the_same_identity() {
        let state = state();
        let original = token(&state, "AdminDistrito", None, Some(3));

        let body = json!({ "token": original }).to_string();
        let response = send(&state, Method::POST, "/api/auth/refresh-token", None, Some(&body)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        let claims = state.tokens.verify(body["token"].as_str().unwrap()).unwrap();
        assert_eq!(claims.identity.role_name, "AdminDistrito");
        assert_eq!(claims.identity.district_id, Some(3));

        let response = send(&state, Method::POST, "/api/auth/refresh-token", None, Some("{}")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(&state, Method::POST, "/api/auth/refresh-token", None, Some(r#"{"token":"junk"}"#)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
