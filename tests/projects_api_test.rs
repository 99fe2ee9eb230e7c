use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use sea_orm::DatabaseConnection;
use serde_json::{Value, json};
use tower::util::ServiceExt;
use whattodo::api;
use whattodo::config::{OAuthClientConfig, ProjectsConfig, ServiceConfig, TasksConfig};
use whattodo::db;
use whattodo::infrastructure::{ProjectsState, TasksState};
use wiremock::matchers::{header as header_is, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn setup_test_db() -> DatabaseConnection {
    db::init_db("sqlite::memory:")
        .await
        .expect("Failed to init DB")
}

fn projects_config(tasks_api_url: &str, oauth: OAuthClientConfig) -> ProjectsConfig {
    let mut service = ServiceConfig::local("projects-api");
    service.oauth = oauth;
    ProjectsConfig {
        service,
        tasks_api_url: tasks_api_url.to_string(),
    }
}

/// Projects and tasks routers over one shared database
async fn setup_apps() -> (Router, Router) {
    let db = setup_test_db().await;
    let projects = api::projects_router(ProjectsState::new(
        db.clone(),
        &projects_config("http://127.0.0.1:9/gw/tasks", OAuthClientConfig::default()),
    )
    .unwrap());
    let tasks = api::tasks_router(TasksState::new(
        db,
        &TasksConfig {
            service: ServiceConfig::local("tasks-api"),
            public_gateway_url: "http://localhost:3001".to_string(),
            export_ttl: Duration::from_secs(60),
        },
    )
    .unwrap());
    (projects, tasks)
}

fn request(method: &str, uri: &str, user: &str, roles: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("X-User-ID", user)
        .header("X-User-Roles", roles);
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

const BASE: &str = "/api/v1/projects";

async fn create_project(app: &Router, owner: &str, name: &str) -> String {
    let (status, body) = send(
        app,
        request("POST", BASE, owner, "user", Some(json!({ "name": name }))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "unexpected body: {}", body);
    body["id"].as_str().unwrap().to_string()
}

async fn add_member(app: &Router, project: &str, by: &str, user: &str, role: &str) -> StatusCode {
    let (status, _) = send(
        app,
        request(
            "POST",
            &format!("{}/{}/members", BASE, project),
            by,
            "user",
            Some(json!({ "userId": user, "role": role })),
        ),
    )
    .await;
    status
}

#[tokio::test]
async fn test_health_and_info() {
    let (app, _) = setup_apps().await;

    let (status, body) = send(&app, Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "projects-api");

    let (status, body) = send(&app, request("GET", "/api/v1/projects/info", "u", "user", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Welcome to the projects-api - v1");
}

#[tokio::test]
async fn test_create_project_makes_caller_owner() {
    let (app, _) = setup_apps().await;

    let (status, body) = send(
        &app,
        request(
            "POST",
            BASE,
            "olivia",
            "user",
            Some(json!({ "name": "Garden", "description": "Spring planting", "dueDate": "2026-12-01" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["ownerId"], "olivia");
    assert_eq!(body["members"][0]["userId"], "olivia");
    assert_eq!(body["members"][0]["role"], "OWNER");

    let (status, body) = send(
        &app,
        request("POST", BASE, "olivia", "user", Some(json!({ "name": "ab" }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["field"], "name");
}

#[tokio::test]
async fn test_listing_is_scoped_to_membership() {
    let (app, _) = setup_apps().await;
    let garden = create_project(&app, "olivia", "Garden").await;
    create_project(&app, "bruno", "Garage").await;
    assert_eq!(add_member(&app, &garden, "olivia", "bruno", "VIEWER").await, StatusCode::CREATED);

    let (_, olivia) = send(&app, request("GET", BASE, "olivia", "user", None)).await;
    assert_eq!(olivia.as_array().unwrap().len(), 1);
    assert_eq!(olivia[0]["_count"]["members"], 2);

    let (_, bruno) = send(&app, request("GET", BASE, "bruno", "user", None)).await;
    assert_eq!(bruno.as_array().unwrap().len(), 2);

    let (_, admin) = send(&app, request("GET", BASE, "root", "admin", None)).await;
    assert_eq!(admin.as_array().unwrap().len(), 2);

    let (_, filtered) = send(
        &app,
        request("GET", &format!("{}?userId=bruno", BASE), "root", "admin", None),
    )
    .await;
    assert_eq!(filtered.as_array().unwrap().len(), 1);
    assert_eq!(filtered[0]["name"], "Garage");
}

#[tokio::test]
async fn test_project_permissions_by_role() {
    let (app, _) = setup_apps().await;
    let id = create_project(&app, "olivia", "Garden").await;
    let uri = format!("{}/{}", BASE, id);
    add_member(&app, &id, "olivia", "eddie", "EDITOR").await;
    add_member(&app, &id, "olivia", "vera", "VIEWER").await;

    let (status, _) = send(&app, request("GET", &uri, "stranger", "user", None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = send(&app, request("GET", &uri, "vera", "user", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["members"].as_array().unwrap().len(), 3);

    let rename = json!({ "name": "Vegetable garden" });
    let (status, _) = send(&app, request("PUT", &uri, "vera", "user", Some(rename.clone()))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = send(&app, request("PUT", &uri, "eddie", "user", Some(rename))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Vegetable garden");

    let (status, body) = send(&app, request("PUT", &uri, "eddie", "user", Some(json!({})))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "No valid fields provided for update.");

    let (status, _) = send(&app, request("DELETE", &uri, "eddie", "user", None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, request("DELETE", &uri, "olivia", "user", None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, request("GET", &uri, "olivia", "user", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_membership_rules() {
    let (app, _) = setup_apps().await;
    let id = create_project(&app, "olivia", "Garden").await;
    let members = format!("{}/{}/members", BASE, id);

    assert_eq!(add_member(&app, &id, "olivia", "mia", "OWNER").await, StatusCode::BAD_REQUEST);
    assert_eq!(add_member(&app, &id, "olivia", "mia", "BOSS").await, StatusCode::BAD_REQUEST);
    assert_eq!(add_member(&app, &id, "mia", "mia", "EDITOR").await, StatusCode::FORBIDDEN);
    assert_eq!(add_member(&app, &id, "olivia", "mia", "MEMBER").await, StatusCode::CREATED);
    // Re-adding changes the role
    assert_eq!(add_member(&app, &id, "olivia", "mia", "VIEWER").await, StatusCode::CREATED);

    let (status, list) = send(&app, request("GET", &members, "mia", "user", None)).await;
    assert_eq!(status, StatusCode::OK);
    let mia = list
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["userId"] == "mia")
        .unwrap();
    assert_eq!(mia["role"], "VIEWER");

    let (status, body) = send(
        &app,
        request(
            "PUT",
            &format!("{}/olivia", members),
            "olivia",
            "user",
            Some(json!({ "role": "EDITOR" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        "Project owner's role cannot be changed from OWNER this way."
    );

    let (status, body) = send(
        &app,
        request(
            "PUT",
            &format!("{}/mia", members),
            "olivia",
            "user",
            Some(json!({ "role": "EDITOR" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "EDITOR");

    let (status, _) = send(
        &app,
        request(
            "PUT",
            &format!("{}/nobody", members),
            "olivia",
            "user",
            Some(json!({ "role": "VIEWER" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &app,
        request("DELETE", &format!("{}/olivia", members), "olivia", "user", None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        "Project owner cannot leave the project. Transfer ownership or delete the project."
    );

    // Members may leave on their own
    let (status, _) = send(
        &app,
        request("DELETE", &format!("{}/mia", members), "mia", "user", None),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, request("GET", &members, "mia", "user", None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_project_membership_drives_task_access() {
    let (projects, tasks) = setup_apps().await;
    let id = create_project(&projects, "olivia", "Garden").await;
    add_member(&projects, &id, "olivia", "mia", "MEMBER").await;
    add_member(&projects, &id, "olivia", "vera", "VIEWER").await;

    let new_task = |title: &str| json!({ "title": title, "projectId": id });

    let (status, task) = send(
        &tasks,
        request("POST", "/tasks", "mia", "user", Some(new_task("Plant tomatoes"))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let task_id = task["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &tasks,
        request("POST", "/tasks", "vera", "user", Some(new_task("Watch"))),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Viewers see the project's tasks but cannot change them
    let (status, page) = send(
        &tasks,
        request("GET", &format!("/tasks?projectId={}", id), "vera", "user", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["pagination"]["total"], 1);

    let (status, _) = send(
        &tasks,
        request(
            "PATCH",
            &format!("/tasks/{}/status", task_id),
            "vera",
            "user",
            Some(json!({ "status": "DONE" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // The owner may edit and delete tasks created by members
    let (status, _) = send(
        &tasks,
        request(
            "PATCH",
            &format!("/tasks/{}/status", task_id),
            "olivia",
            "user",
            Some(json!({ "status": "DONE" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &tasks,
        request("GET", &format!("/tasks?projectId={}", id), "stranger", "user", None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, detail) = send(
        &projects,
        request("GET", &format!("{}/{}", BASE, id), "vera", "user", None),
    )
    .await;
    assert_eq!(detail["tasks"][0]["title"], "Plant tomatoes");

    let (status, _) = send(
        &tasks,
        request("DELETE", &format!("/tasks/{}", task_id), "olivia", "user", None),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_deleting_a_project_keeps_its_tasks() {
    let (projects, tasks) = setup_apps().await;
    let id = create_project(&projects, "olivia", "Garden").await;
    add_member(&projects, &id, "olivia", "mia", "MEMBER").await;

    let (status, task) = send(
        &tasks,
        request(
            "POST",
            "/tasks",
            "mia",
            "user",
            Some(json!({ "title": "Plant tomatoes", "projectId": id })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let task_uri = format!("/tasks/{}", task["id"].as_str().unwrap());

    let (status, _) = send(
        &projects,
        request("DELETE", &format!("{}/{}", BASE, id), "olivia", "user", None),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, kept) = send(&tasks, request("GET", &task_uri, "mia", "user", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(kept["title"], "Plant tomatoes");
    assert!(kept["projectId"].is_null());

    // Without the project the former owner no longer reaches the task
    let (status, _) = send(&tasks, request("GET", &task_uri, "olivia", "user", None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_project_tasks_are_relayed_with_service_token() {
    let idp = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/realms/todo/protocol/openid-connect/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "m2m-token",
            "expires_in": 300
        })))
        .mount(&idp)
        .await;

    let db = setup_test_db().await;
    let oauth = OAuthClientConfig {
        url: Some(idp.uri()),
        realm: Some("todo".to_string()),
        client_id: Some("projects-api".to_string()),
        client_secret: Some("s3cret".to_string()),
    };
    let app = api::projects_router(ProjectsState::new(
        db,
        &projects_config(&format!("{}/gw/tasks", idp.uri()), oauth),
    )
    .unwrap());
    let id = create_project(&app, "olivia", "Garden").await;

    Mock::given(method("GET"))
        .and(path("/gw/tasks"))
        .and(query_param("projectId", id.as_str()))
        .and(header_is("authorization", "Bearer m2m-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "id": "t1", "title": "Plant tomatoes" }],
            "pagination": { "page": 1, "limit": 20, "total": 1, "totalPages": 1 }
        })))
        .expect(1)
        .mount(&idp)
        .await;

    let uri = format!("{}/{}/tasks", BASE, id);
    let (status, body) = send(&app, request("GET", &uri, "olivia", "user", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["title"], "Plant tomatoes");

    let (status, body) = send(&app, request("GET", &uri, "stranger", "user", None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body["message"],
        "Forbidden: You do not have access to this project's tasks."
    );
}

#[tokio::test]
async fn test_project_tasks_without_identity_provider_is_bad_gateway() {
    let (app, _) = setup_apps().await;
    let id = create_project(&app, "olivia", "Garden").await;

    let (status, body) = send(
        &app,
        request("GET", &format!("{}/{}/tasks", BASE, id), "olivia", "user", None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(
        body["message"]
            .as_str()
            .unwrap()
            .starts_with("Failed to obtain M2M token")
    );
}
