//! HTTP 集成测试
//!
//! 通过 `tower::ServiceExt::oneshot` 直接驱动完整路由 (含认证中间件)，
//! 存储使用 redb 内存后端，时钟固定在 2026-02-20T09:00Z。

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use tower::ServiceExt;

use queue_server::api::build_router;
use queue_server::auth::JwtConfig;
use queue_server::notify::{Notification, NotificationKind, Notifier, NotifyError};
use queue_server::utils::time::ManualClock;
use queue_server::{Config, QueueStorage, ServerState};
use shared::models::{Role, ServiceCreate, StaffCreate, StaffRole};

const OPEN: i64 = 1_771_578_000_000;

#[derive(Default)]
struct Recording {
    sent: Mutex<Vec<Notification>>,
}

#[async_trait]
impl Notifier for Recording {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

struct TestApp {
    state: ServerState,
    router: Router,
    notifier: Arc<Recording>,
    barber_id: u64,
    admin_id: u64,
}

impl TestApp {
    fn new() -> Self {
        let config = Config::with_overrides(
            "./unused",
            0,
            JwtConfig {
                secret: "integration-test-secret-at-least-32-bytes".into(),
                expiration_minutes: 60,
                issuer: "queue-server".into(),
                audience: "queue-clients".into(),
            },
        );
        let storage = QueueStorage::open_in_memory().unwrap();
        let notifier = Arc::new(Recording::default());
        let state = ServerState::build(
            config,
            storage,
            Arc::new(ManualClock::new(OPEN)),
            notifier.clone(),
        );

        let barber_id = state
            .staff
            .create(StaffCreate {
                name: "Luis".into(),
                pin: "1234".into(),
                role: StaffRole::Staff,
            })
            .unwrap()
            .id;
        let admin_id = state
            .staff
            .create(StaffCreate {
                name: "Ana".into(),
                pin: "9999".into(),
                role: StaffRole::Admin,
            })
            .unwrap()
            .id;

        Self {
            router: build_router(state.clone()),
            state,
            notifier,
            barber_id,
            admin_id,
        }
    }

    fn barber_token(&self) -> String {
        self.state
            .jwt_service
            .generate_token(self.barber_id, "Luis", Role::Staff)
            .unwrap()
    }

    fn admin_token(&self) -> String {
        self.state
            .jwt_service
            .generate_token(self.admin_id, "Ana", Role::Admin)
            .unwrap()
    }

    fn add_service(&self, name: &str, price: i64) -> u64 {
        self.state
            .catalog
            .create(ServiceCreate {
                name: name.into(),
                price: Decimal::from(price),
            })
            .unwrap()
            .id
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::GET, uri, token, None).await
    }

    async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, token, Some(body)).await
    }

    async fn register(&self, name: &str, phone: &str) -> Value {
        let (status, body) = self
            .post(
                "/api/tickets/register",
                None,
                json!({ "name": name, "phone": phone }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "register failed: {body}");
        body["data"].clone()
    }
}

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new();
    let (status, body) = app.get("/api/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["business_date"], "2026-02-20");
}

#[tokio::test]
async fn test_full_day_over_http() {
    let app = TestApp::new();
    let haircut = app.add_service("Haircut", 15000);
    let barber = app.barber_token();
    let admin = app.admin_token();

    let a = app.register("A", "111").await;
    let b = app.register("B", "222").await;
    assert_eq!(a["daily_sequence"], 1);
    assert_eq!(b["daily_sequence"], 2);

    let (status, body) = app.post("/api/tickets/call", Some(&barber), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], a["id"]);
    assert_eq!(body["data"]["state"], "called");

    let (status, _) = app
        .post("/api/tickets/seat", Some(&barber), json!({ "ticket_id": a["id"] }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .post(
            "/api/tickets/finalize",
            Some(&barber),
            json!({ "ticket_id": a["id"], "service_ids": [haircut] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["state"], "awaiting_payment");
    assert_eq!(body["data"]["total"], "15000");

    let (status, body) = app.get("/api/closings/summary", Some(&barber)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["ticket_count"], 1);

    let (status, body) = app.post("/api/closings/close", Some(&admin), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_collected"], "15000");
    assert_eq!(body["data"]["ticket_count"], 1);
    assert_eq!(body["data"]["closed_by_name"], "Ana");

    let (status, body) = app
        .post("/api/closings/close", Some(&admin), json!({ "date": "2026-02-20" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 5001);

    // B is still waiting
    let (status, body) = app.get("/api/tickets/queue", None).await;
    assert_eq!(status, StatusCode::OK);
    let queue = body["data"].as_array().unwrap();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0]["id"], b["id"]);
}

#[tokio::test]
async fn test_duplicate_registration_returns_conflict_details() {
    let app = TestApp::new();
    let first = app.register("A", "111").await;

    let (status, body) = app
        .post(
            "/api/tickets/register",
            None,
            json!({ "name": "A", "phone": "111" }),
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 4004);
    assert_eq!(body["details"]["ticket_id"], first["id"]);
    assert_eq!(body["details"]["daily_sequence"], 1);
}

#[tokio::test]
async fn test_registration_validation() {
    let app = TestApp::new();
    let (status, body) = app
        .post(
            "/api/tickets/register",
            None,
            json!({ "name": "", "phone": "abc" }),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 2);
    assert!(body["details"]["phone"].is_array());
}

#[tokio::test]
async fn test_role_guards() {
    let app = TestApp::new();
    app.register("A", "111").await;

    let (status, body) = app.post("/api/tickets/call", None, json!({})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], 1001);

    let (status, _) = app
        .post("/api/tickets/call", Some("not-a-token"), json!({}))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let barber = app.barber_token();
    let (status, body) = app
        .post("/api/tickets/settle", Some(&barber), json!({ "ticket_id": 1 }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], 2003);

    let (status, _) = app.get("/api/closings/history", Some(&barber)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.get("/api/closings/history", Some(&app.admin_token())).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_queue_and_invalid_transition() {
    let app = TestApp::new();
    let barber = app.barber_token();

    let (status, body) = app.post("/api/tickets/call", Some(&barber), json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 4003);

    let a = app.register("A", "111").await;
    let (status, body) = app
        .post("/api/tickets/seat", Some(&barber), json!({ "ticket_id": a["id"] }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 4002);
    assert_eq!(body["details"]["state"], "queued");
}

#[tokio::test]
async fn test_client_cancel_and_my_ticket() {
    let app = TestApp::new();
    app.register("A", "111").await;
    app.register("B", "222").await;

    let (status, body) = app.get("/api/tickets/mine/222", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["people_ahead"], 1);

    let (status, body) = app
        .post("/api/tickets/cancel", None, json!({ "phone": "111" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["state"], "closed");

    let (_, body) = app.get("/api/tickets/mine/222", None).await;
    assert_eq!(body["data"]["people_ahead"], 0);

    let (status, body) = app
        .post("/api/tickets/cancel", None, json!({ "phone": "111" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 4005);
}

#[tokio::test]
async fn test_pin_login_and_me() {
    let app = TestApp::new();

    let (status, body) = app
        .post("/api/auth/login", None, json!({ "pin": "1234" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["staff"]["name"], "Luis");
    assert_eq!(body["data"]["expires_in"], 3600);
    let token = body["data"]["token"].as_str().unwrap().to_string();

    let (status, body) = app.get("/api/auth/me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], app.barber_id);

    let (status, body) = app
        .post("/api/auth/login", None, json!({ "pin": "0000" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], 1002);
}

#[tokio::test]
async fn test_staff_availability_and_admin_directory() {
    let app = TestApp::new();
    let barber = app.barber_token();
    let admin = app.admin_token();

    let (_, body) = app.get("/api/staff/available", None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (status, _) = app
        .post(
            "/api/staff/me/availability",
            Some(&barber),
            json!({ "is_available": false }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.get("/api/staff/available", None).await;
    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Ana"]);

    let (status, _) = app.get("/api/staff", Some(&barber)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let uri = format!("/api/staff/{}", app.admin_id);
    let (status, body) = app.send(Method::DELETE, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], 2004);
}

#[tokio::test]
async fn test_service_catalog_admin() {
    let app = TestApp::new();
    let admin = app.admin_token();

    let (status, body) = app
        .post(
            "/api/services",
            Some(&admin),
            json!({ "name": "Beard", "price": "8000" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let id = body["data"]["id"].as_u64().unwrap();

    let (status, _) = app
        .send(
            Method::PUT,
            &format!("/api/services/{}", id),
            Some(&admin),
            Some(json!({ "is_active": false })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.get("/api/services", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].as_array().unwrap().is_empty());

    let (status, _) = app
        .post(
            "/api/services",
            None,
            json!({ "name": "Perm", "price": "30000" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_notifications_reach_the_notifier() {
    let app = TestApp::new();
    let tasks = app.state.start_background_tasks();

    app.register("A", "111").await;
    app.register("B", "222").await;
    let (status, _) = app
        .post("/api/tickets/call", Some(&app.barber_token()), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);

    let mut kinds = Vec::new();
    for _ in 0..50 {
        kinds = app
            .notifier
            .sent
            .lock()
            .unwrap()
            .iter()
            .map(|n| (n.kind, n.daily_sequence))
            .collect();
        if kinds.contains(&(NotificationKind::TurnCalled, 1)) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert!(kinds.contains(&(NotificationKind::TurnCalled, 1)));
    assert!(kinds.contains(&(NotificationKind::NextInLine, 2)));

    tasks.shutdown().await;
}
