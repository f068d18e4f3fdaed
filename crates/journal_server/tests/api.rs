use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use journal_core::{open_db_in_memory, AccountService, SqliteAccountRepository, TokenService};
use journal_server::{build_router, AppState, CookieSettings};
use serde_json::{json, Value};
use tower::ServiceExt;

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
}

fn app() -> Router {
    let conn = open_db_in_memory().unwrap();
    build_router(AppState::new(
        conn,
        TokenService::new_dev(),
        CookieSettings::default(),
    ))
}

/// App seeded with a staff account `root@example.com` / `correct-horse`.
fn app_with_admin() -> Router {
    let conn = open_db_in_memory().unwrap();
    AccountService::new(
        SqliteAccountRepository::try_new(&conn).unwrap(),
        TokenService::new_dev(),
    )
    .create_superuser("root@example.com", "correct-horse")
    .unwrap();
    build_router(AppState::new(
        conn,
        TokenService::new_dev(),
        CookieSettings::default(),
    ))
}

async fn login(app: &Router, email: &str) -> String {
    let reply = send(
        app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": email, "password": "correct-horse" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    reply.body["access"].as_str().unwrap().to_string()
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Reply {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    dispatch(app, request).await
}

async fn dispatch(app: &Router, request: Request<Body>) -> Reply {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    Reply {
        status,
        headers,
        body,
    }
}

async fn signup(app: &Router, email: &str) -> String {
    let reply = send(
        app,
        Method::POST,
        "/auth/signup",
        None,
        Some(json!({ "email": email, "password": "correct-horse" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
    reply.body["tokens"]["access"].as_str().unwrap().to_string()
}

fn cookie_from(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|cookie| cookie.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

#[tokio::test]
async fn health_reports_status_true() {
    let app = app();
    let reply = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, json!({ "status": true }));
}

#[tokio::test]
async fn habit_entry_shows_up_in_habit_list() {
    let app = app();
    let token = signup(&app, "ada@example.com").await;

    let created = send(
        &app,
        Method::POST,
        "/entries",
        Some(&token),
        Some(json!({ "text": "Drink water", "kind": "habit" })),
    )
    .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["type"], "habit");

    let habits = send(&app, Method::GET, "/habits", Some(&token), None).await;
    assert_eq!(habits.status, StatusCode::OK);
    let habits = habits.body.as_array().unwrap();
    assert_eq!(habits.len(), 1);
    assert_eq!(habits[0]["text"], "Drink water");
    assert_eq!(habits[0]["source_entry"], created.body["id"]);
}

#[tokio::test]
async fn todo_requires_scheduled_for() {
    let app = app();
    let token = signup(&app, "ada@example.com").await;

    let scheduled = send(
        &app,
        Method::POST,
        "/entries",
        Some(&token),
        Some(json!({
            "text": "Pay rent",
            "kind": "todo",
            "scheduled_for": "2025-01-01T00:00:00Z"
        })),
    )
    .await;
    assert_eq!(scheduled.status, StatusCode::CREATED);
    assert_eq!(scheduled.body["type"], "todo");
    assert_eq!(scheduled.body["scheduled_for"], "2025-01-01T00:00:00.000Z");
    assert_eq!(scheduled.body["completed_at"], Value::Null);

    let missing = send(
        &app,
        Method::POST,
        "/entries",
        Some(&token),
        Some(json!({ "text": "Pay rent", "kind": "todo" })),
    )
    .await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
    assert_eq!(missing.body["field"], "scheduled_for");
    assert_eq!(
        missing.body["detail"],
        "Scheduled time is required for todo type"
    );
}

#[tokio::test]
async fn complete_twice_then_habitize() {
    let app = app();
    let token = signup(&app, "ada@example.com").await;

    let created = send(
        &app,
        Method::POST,
        "/entries",
        Some(&token),
        Some(json!({ "text": "Journaled", "type": "log" })),
    )
    .await;
    let id = created.body["id"].as_str().unwrap().to_string();

    let done = send(
        &app,
        Method::POST,
        &format!("/entries/{id}/done"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(done.status, StatusCode::OK);
    assert!(done.body["completed_at"].is_string());

    let again = send(
        &app,
        Method::POST,
        &format!("/entries/{id}/done"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(again.status, StatusCode::BAD_REQUEST);
    assert_eq!(again.body["detail"], "Log is already marked as done.");

    let habitized = send(
        &app,
        Method::POST,
        &format!("/entries/{id}/habitize"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(habitized.status, StatusCode::CREATED);
    let texts = habitized
        .body
        .as_array()
        .unwrap()
        .iter()
        .map(|habit| habit["text"].as_str().unwrap().to_string())
        .collect::<Vec<_>>();
    assert_eq!(texts, vec!["Journaled".to_string()]);

    let twice = send(
        &app,
        Method::POST,
        &format!("/entries/{id}/habitize"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(twice.status, StatusCode::BAD_REQUEST);
    assert_eq!(twice.body["detail"], "This log is already a habit");

    let detail = send(&app, Method::GET, &format!("/entries/{id}"), Some(&token), None).await;
    assert_eq!(detail.body["type"], "habit");
    assert_eq!(detail.body["completed_at"], done.body["completed_at"]);
}

#[tokio::test]
async fn deleted_entries_disappear() {
    let app = app();
    let token = signup(&app, "ada@example.com").await;

    let created = send(
        &app,
        Method::POST,
        "/entries",
        Some(&token),
        Some(json!({ "text": "gone soon" })),
    )
    .await;
    let id = created.body["id"].as_str().unwrap().to_string();

    let deleted = send(&app, Method::DELETE, &format!("/entries/{id}"), Some(&token), None).await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);

    let listed = send(&app, Method::GET, "/entries?type=log", Some(&token), None).await;
    assert_eq!(listed.status, StatusCode::OK);
    assert_eq!(listed.body, json!([]));

    let detail = send(&app, Method::GET, &format!("/entries/{id}"), Some(&token), None).await;
    assert_eq!(detail.status, StatusCode::NOT_FOUND);
    assert_eq!(detail.body["detail"], "Not found.");

    let again = send(&app, Method::DELETE, &format!("/entries/{id}"), Some(&token), None).await;
    assert_eq!(again.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn listing_filters_and_rejects_bad_input() {
    let app = app();
    let token = signup(&app, "ada@example.com").await;
    for body in [
        json!({ "text": "a log" }),
        json!({ "text": "a todo", "type": "todo", "scheduled_for": "2030-06-01T09:00:00Z" }),
    ] {
        let reply = send(&app, Method::POST, "/entries", Some(&token), Some(body)).await;
        assert_eq!(reply.status, StatusCode::CREATED);
    }

    let todos = send(&app, Method::GET, "/entries?type=todo", Some(&token), None).await;
    assert_eq!(todos.body.as_array().unwrap().len(), 1);
    assert_eq!(todos.body[0]["text"], "a todo");

    let today = chrono::Utc::now().date_naive();
    let by_day = send(
        &app,
        Method::GET,
        &format!("/entries?date={today}&limit=1"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(by_day.body.as_array().unwrap().len(), 1);

    let bad_type = send(&app, Method::GET, "/entries?type=chore", Some(&token), None).await;
    assert_eq!(bad_type.status, StatusCode::BAD_REQUEST);

    let bad_date = send(&app, Method::GET, "/entries?date=yesterday", Some(&token), None).await;
    assert_eq!(bad_date.status, StatusCode::BAD_REQUEST);

    let blank = send(
        &app,
        Method::POST,
        "/entries",
        Some(&token),
        Some(json!({ "text": "  " })),
    )
    .await;
    assert_eq!(blank.status, StatusCode::BAD_REQUEST);
    assert_eq!(blank.body["field"], "text");
}

#[tokio::test]
async fn entries_are_private_to_their_owner() {
    let app = app();
    let ada = signup(&app, "ada@example.com").await;
    let eve = signup(&app, "eve@example.com").await;

    let created = send(
        &app,
        Method::POST,
        "/entries",
        Some(&ada),
        Some(json!({ "text": "secret" })),
    )
    .await;
    let id = created.body["id"].as_str().unwrap().to_string();

    for (method, uri) in [
        (Method::GET, format!("/entries/{id}")),
        (Method::POST, format!("/entries/{id}/done")),
        (Method::POST, format!("/entries/{id}/habitize")),
        (Method::DELETE, format!("/entries/{id}")),
    ] {
        let reply = send(&app, method, &uri, Some(&eve), None).await;
        assert_eq!(reply.status, StatusCode::NOT_FOUND, "{uri}");
    }

    let eve_list = send(&app, Method::GET, "/entries", Some(&eve), None).await;
    assert_eq!(eve_list.body, json!([]));

    let malformed = send(&app, Method::GET, "/entries/not-a-uuid", Some(&ada), None).await;
    assert_eq!(malformed.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn requests_without_valid_token_are_unauthorized() {
    let app = app();

    let anonymous = send(&app, Method::GET, "/entries", None, None).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        anonymous.body["detail"],
        "Authentication credentials were not provided."
    );

    let forged = send(&app, Method::GET, "/habits", Some("not.a.jwt"), None).await;
    assert_eq!(forged.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn cookie_session_login_refresh_logout() {
    let app = app();
    signup(&app, "ada@example.com").await;

    let login = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": "ada@example.com", "password": "correct-horse" })),
    )
    .await;
    assert_eq!(login.status, StatusCode::OK);
    assert_eq!(login.body["user"]["email"], "ada@example.com");
    let access = cookie_from(&login.headers, "access_token").unwrap();
    let refresh = cookie_from(&login.headers, "refresh_token").unwrap();
    assert_eq!(
        login.headers.get(AUTHORIZATION).unwrap().to_str().unwrap(),
        format!("Bearer {access}")
    );
    let set_cookie = login.headers.get(SET_COOKIE).unwrap().to_str().unwrap();
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Lax"));

    let me = dispatch(
        &app,
        Request::get("/users/me")
            .header(COOKIE, format!("access_token={access}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["email"], "ada@example.com");
    assert!(me.body.get("password_hash").is_none());

    let refreshed = dispatch(
        &app,
        Request::post("/auth/refresh")
            .header(COOKIE, format!("refresh_token={refresh}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(refreshed.status, StatusCode::OK);
    assert!(refreshed.body["access"].is_string());
    assert!(cookie_from(&refreshed.headers, "access_token").is_some());

    let logout = dispatch(
        &app,
        Request::post("/auth/logout")
            .header(COOKIE, format!("refresh_token={refresh}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(logout.status, StatusCode::OK);
    assert_eq!(logout.body["message"], "Successfully logged out.");
    assert_eq!(cookie_from(&logout.headers, "refresh_token").as_deref(), Some(""));

    let reused = send(
        &app,
        Method::POST,
        "/auth/refresh",
        None,
        Some(json!({ "refresh": refresh })),
    )
    .await;
    assert_eq!(reused.status, StatusCode::UNAUTHORIZED);

    let garbage = send(
        &app,
        Method::POST,
        "/auth/logout",
        None,
        Some(json!({ "refresh": "garbage" })),
    )
    .await;
    assert_eq!(garbage.status, StatusCode::BAD_REQUEST);
    assert_eq!(garbage.body, json!({ "error": "Invalid token" }));
}

#[tokio::test]
async fn login_and_signup_failures() {
    let app = app();
    signup(&app, "ada@example.com").await;

    let duplicate = send(
        &app,
        Method::POST,
        "/auth/signup",
        None,
        Some(json!({ "email": "ADA@example.com", "password": "correct-horse" })),
    )
    .await;
    assert_eq!(duplicate.status, StatusCode::BAD_REQUEST);
    assert_eq!(duplicate.body["field"], "email");

    let wrong = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": "ada@example.com", "password": "nope-nope" })),
    )
    .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);

    let verify = send(
        &app,
        Method::POST,
        "/auth/verify",
        None,
        Some(json!({ "token": "garbage" })),
    )
    .await;
    assert_eq!(verify.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn profile_access_is_same_user_only() {
    let app = app();
    let ada = signup(&app, "ada@example.com").await;
    let eve = signup(&app, "eve@example.com").await;

    let me = send(&app, Method::GET, "/users/me", Some(&ada), None).await;
    let ada_id = me.body["id"].as_str().unwrap().to_string();

    let patched = send(
        &app,
        Method::PATCH,
        &format!("/users/{ada_id}"),
        Some(&ada),
        Some(json!({ "first_name": "Ada", "last_name": "Lovelace", "date_of_birth": "1815-12-10" })),
    )
    .await;
    assert_eq!(patched.status, StatusCode::OK);
    assert_eq!(patched.body["full_name"], "Ada Lovelace");
    assert_eq!(patched.body["date_of_birth"], "1815-12-10");

    let long_phone = send(
        &app,
        Method::PATCH,
        &format!("/users/{ada_id}"),
        Some(&ada),
        Some(json!({ "phone_number": "1234567890123456" })),
    )
    .await;
    assert_eq!(long_phone.status, StatusCode::BAD_REQUEST);
    assert_eq!(long_phone.body["field"], "phone_number");

    let foreign = send(&app, Method::GET, &format!("/users/{ada_id}"), Some(&eve), None).await;
    assert_eq!(foreign.status, StatusCode::FORBIDDEN);

    let deactivate = send(
        &app,
        Method::POST,
        &format!("/users/{ada_id}/deactivate"),
        Some(&ada),
        None,
    )
    .await;
    assert_eq!(deactivate.status, StatusCode::OK);
    assert_eq!(deactivate.body["message"], "User deactivated successfully");

    let after = send(&app, Method::GET, "/users/me", Some(&ada), None).await;
    assert_eq!(after.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_schedule_is_reported_on_its_field() {
    let app = app();
    let token = signup(&app, "ada@example.com").await;

    for raw in ["not-a-date", "", "2025-02-30T10:00:00Z"] {
        let reply = send(
            &app,
            Method::POST,
            "/entries",
            Some(&token),
            Some(json!({ "text": "Pay rent", "type": "todo", "scheduled_for": raw })),
        )
        .await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST, "{raw:?}");
        assert_eq!(reply.body["field"], "scheduled_for", "{raw:?}");
    }

    let naive = send(
        &app,
        Method::POST,
        "/entries",
        Some(&token),
        Some(json!({ "text": "Pay rent", "type": "todo", "scheduled_for": "2025-01-01T00:00:00" })),
    )
    .await;
    assert_eq!(naive.status, StatusCode::CREATED);
    assert_eq!(naive.body["scheduled_for"], "2025-01-01T00:00:00.000Z");

    let entries = send(&app, Method::GET, "/entries", Some(&token), None).await;
    assert_eq!(entries.body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn listing_without_limit_returns_everything() {
    let app = app();
    let token = signup(&app, "ada@example.com").await;

    for index in 0..51 {
        let reply = send(
            &app,
            Method::POST,
            "/entries",
            Some(&token),
            Some(json!({ "text": format!("log {index}") })),
        )
        .await;
        assert_eq!(reply.status, StatusCode::CREATED);
    }

    let all = send(&app, Method::GET, "/entries", Some(&token), None).await;
    assert_eq!(all.body.as_array().unwrap().len(), 51);

    let page = send(&app, Method::GET, "/entries?limit=10&offset=45", Some(&token), None).await;
    assert_eq!(page.body.as_array().unwrap().len(), 6);
}

#[tokio::test]
async fn blank_list_filters_mean_no_filter() {
    let app = app();
    let token = signup(&app, "ada@example.com").await;
    send(
        &app,
        Method::POST,
        "/entries",
        Some(&token),
        Some(json!({ "text": "a log" })),
    )
    .await;

    let reply = send(&app, Method::GET, "/entries?type=&date=", Some(&token), None).await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    assert_eq!(reply.body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn staff_list_and_create_users() {
    let app = app_with_admin();
    let ada = signup(&app, "ada@example.com").await;
    let admin = login(&app, "root@example.com").await;

    let forbidden_list = send(&app, Method::GET, "/users", Some(&ada), None).await;
    assert_eq!(forbidden_list.status, StatusCode::FORBIDDEN);

    let forbidden_create = send(
        &app,
        Method::POST,
        "/users",
        Some(&ada),
        Some(json!({ "email": "bob@example.com", "password": "correct-horse" })),
    )
    .await;
    assert_eq!(forbidden_create.status, StatusCode::FORBIDDEN);

    let anonymous = send(&app, Method::GET, "/users", None, None).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let created = send(
        &app,
        Method::POST,
        "/users",
        Some(&admin),
        Some(json!({ "email": "bob@example.com", "password": "correct-horse", "first_name": "Bob" })),
    )
    .await;
    assert_eq!(created.status, StatusCode::CREATED, "{}", created.body);
    assert_eq!(created.body["email"], "bob@example.com");
    assert_eq!(created.body["is_staff"], false);
    assert!(created.body.get("tokens").is_none());

    let duplicate = send(
        &app,
        Method::POST,
        "/users",
        Some(&admin),
        Some(json!({ "email": "bob@example.com", "password": "correct-horse" })),
    )
    .await;
    assert_eq!(duplicate.status, StatusCode::BAD_REQUEST);
    assert_eq!(duplicate.body["field"], "email");

    let listed = send(&app, Method::GET, "/users", Some(&admin), None).await;
    assert_eq!(listed.status, StatusCode::OK);
    let emails = listed
        .body
        .as_array()
        .unwrap()
        .iter()
        .map(|user| user["email"].as_str().unwrap().to_string())
        .collect::<Vec<_>>();
    assert_eq!(emails.len(), 3);
    assert!(emails.contains(&"bob@example.com".to_string()));

    login(&app, "bob@example.com").await;
}
