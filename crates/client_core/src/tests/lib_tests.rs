use super::*;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Clone)]
struct ServerState {
    records: Arc<Mutex<Vec<Value>>>,
    next_id: Arc<Mutex<i64>>,
}

async fn list_customers(State(state): State<ServerState>) -> Json<Vec<Value>> {
    Json(state.records.lock().await.clone())
}

async fn create_customer(
    State(state): State<ServerState>,
    Json(mut body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if body.get("name").and_then(Value::as_str) == Some("reject-me") {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "code": "validation", "message": "name is not allowed" })),
        );
    }

    let mut next_id = state.next_id.lock().await;
    *next_id += 1;
    body["id"] = json!(*next_id);
    state.records.lock().await.push(body.clone());
    (StatusCode::CREATED, Json(body))
}

async fn update_customer(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(mut body): Json<Value>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let mut records = state.records.lock().await;
    let Some(slot) = records
        .iter_mut()
        .find(|record| record["id"].to_string() == id)
    else {
        return Err((StatusCode::NOT_FOUND, String::new()));
    };
    body["id"] = slot["id"].clone();
    *slot = body.clone();
    Ok(Json(body))
}

async fn spawn_customer_server() -> anyhow::Result<(String, ServerState)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = ServerState {
        records: Arc::new(Mutex::new(vec![
            json!({ "id": 1, "name": "Ana", "email": "ana@example.com" }),
            json!({ "id": 2, "name": "Bao", "email": "bao@example.com" }),
        ])),
        next_id: Arc::new(Mutex::new(2)),
    };
    let app = Router::new()
        .route("/customers", get(list_customers).post(create_customer))
        .route("/customers/:id", put(update_customer))
        .route(
            "/broken",
            get(|| async { (StatusCode::BAD_GATEWAY, "upstream exploded") }),
        )
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}"), state))
}

#[tokio::test]
async fn fetch_all_normalises_numeric_ids() {
    let (server_url, _state) = spawn_customer_server().await.expect("spawn server");
    let service = HttpEntityService::new(&server_url, "customers").expect("service");

    let entities = service.fetch_all().await.expect("fetch");

    assert_eq!(entities.len(), 2);
    assert_eq!(entities[0].id, Some(EntityId::new("1")));
    assert_eq!(entities[1].display_label(), "Bao");
    assert_eq!(
        entities[1].attribute("email"),
        Some(&json!("bao@example.com"))
    );
}

#[tokio::test]
async fn create_posts_entity_and_returns_assigned_id() {
    let (server_url, state) = spawn_customer_server().await.expect("spawn server");
    let service = HttpEntityService::new(&server_url, "customers").expect("service");

    let created = service
        .create(Entity::new().with_attribute("name", "Chi"))
        .await
        .expect("create");

    assert_eq!(created.id, Some(EntityId::new("3")));
    assert_eq!(created.display_label(), "Chi");
    let records = state.records.lock().await;
    assert_eq!(records.len(), 3);
    assert_eq!(records[2]["name"], json!("Chi"));
}

#[tokio::test]
async fn update_puts_to_item_url() {
    let (server_url, state) = spawn_customer_server().await.expect("spawn server");
    let service = HttpEntityService::new(&server_url, "customers").expect("service");

    let updated = service
        .update(
            &EntityId::new("2"),
            Entity::new().with_attribute("name", "Bao Tran"),
        )
        .await
        .expect("update");

    assert_eq!(updated.id, Some(EntityId::new("2")));
    let records = state.records.lock().await;
    assert_eq!(records[1]["name"], json!("Bao Tran"));
    assert!(records[1].get("email").is_none());
}

#[tokio::test]
async fn error_envelope_maps_to_status_error() {
    let (server_url, _state) = spawn_customer_server().await.expect("spawn server");
    let service = HttpEntityService::new(&server_url, "customers").expect("service");

    let err = service
        .create(Entity::new().with_attribute("name", "reject-me"))
        .await
        .expect_err("should be rejected");

    match &err {
        ServiceError::Status {
            status,
            code,
            message,
        } => {
            assert_eq!(*status, 422);
            assert_eq!(*code, ErrorCode::Validation);
            assert_eq!(message, "name is not allowed");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!err.is_transient());
}

#[tokio::test]
async fn plain_error_body_guesses_code_from_status() {
    let (server_url, _state) = spawn_customer_server().await.expect("spawn server");
    let service = HttpEntityService::new(&server_url, "broken").expect("service");

    let err = service.fetch_all().await.expect_err("should fail");

    match &err {
        ServiceError::Status {
            status,
            code,
            message,
        } => {
            assert_eq!(*status, 502);
            assert_eq!(*code, ErrorCode::Unavailable);
            assert_eq!(message, "upstream exploded");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.is_transient());
}

#[tokio::test]
async fn missing_item_maps_to_not_found() {
    let (server_url, _state) = spawn_customer_server().await.expect("spawn server");
    let service = HttpEntityService::new(&server_url, "customers").expect("service");

    let err = service
        .update(&EntityId::new("99"), Entity::new())
        .await
        .expect_err("should fail");

    assert!(matches!(
        err,
        ServiceError::Status {
            status: 404,
            code: ErrorCode::NotFound,
            ..
        }
    ));
}

#[tokio::test]
async fn unreachable_server_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let service = HttpEntityService::new(&format!("http://{addr}"), "customers").expect("service");
    let err = service.fetch_all().await.expect_err("should fail");

    assert!(matches!(err, ServiceError::Transport(_)));
    assert!(err.is_transient());
}

#[test]
fn collection_url_appends_resource_segments() {
    let service =
        HttpEntityService::new("http://localhost:3000/api/", "customers").expect("service");
    assert_eq!(
        service.collection_url().as_str(),
        "http://localhost:3000/api/customers"
    );
    assert_eq!(
        service.item_url(&EntityId::new("a b")).as_str(),
        "http://localhost:3000/api/customers/a%20b"
    );
}

#[test]
fn rejects_invalid_service_urls() {
    assert!(matches!(
        HttpEntityService::new("not a url", "customers"),
        Err(ServiceError::InvalidUrl { .. })
    ));
    assert!(matches!(
        HttpEntityService::new("ftp://example.com", "customers"),
        Err(ServiceError::InvalidUrl { .. })
    ));
}

#[tokio::test]
async fn missing_service_reports_unavailable() {
    let err = MissingEntityService
        .fetch_all()
        .await
        .expect_err("should fail");
    assert!(matches!(err, ServiceError::Unavailable(_)));
    assert!(err.is_transient());
}
