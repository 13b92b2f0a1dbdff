use nexus_api::config::ApiConfig;
use nexus_api::middleware::PRINCIPAL_HEADER;
use nexus_auth::{Role, seed};
use nexus_core::UserId;
use reqwest::StatusCode;
use serde_json::json;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, seeded in-memory state, ephemeral port.
        let app = nexus_api::app::build_app(&ApiConfig::default())
            .await
            .expect("failed to build app");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn as_role(role: Role) -> String {
    seed::demo_user_id(role).to_string()
}

async fn decide(
    client: &reqwest::Client,
    srv: &TestServer,
    role: Role,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let res = client
        .post(srv.url("/authz/decide"))
        .header(PRINCIPAL_HEADER, as_role(role))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = res.status();
    (status, res.json().await.unwrap())
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn principal_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(srv.url("/whoami"))
        .header(PRINCIPAL_HEADER, UserId::new().to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "unknown principal");
}

#[tokio::test]
async fn whoami_reports_the_resolved_principal() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(srv.url("/whoami"))
        .header(PRINCIPAL_HEADER, as_role(Role::Finance))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["role"], "FINANCE");
    assert_eq!(body["email"], "finance@nexus.com");
    assert_eq!(body["status"], "active");
}

#[tokio::test]
async fn decide_returns_allow_and_reason() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let (status, body) = decide(
        &client,
        &srv,
        Role::Auditor,
        json!({ "action": "read", "resource": "FINANCIAL" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "allow": true, "reason": "AuditorReadOnly" }));

    let (status, body) = decide(
        &client,
        &srv,
        Role::Manager,
        json!({ "action": "edit", "resource": "EXECUTIVE", "scope": "operation" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "allow": false, "reason": "ExecutiveRestricted" }));

    let (_, body) = decide(
        &client,
        &srv,
        Role::Warehouse,
        json!({ "action": "view_sensitive", "resource": "MATERIAL", "scope": "report" }),
    )
    .await;
    assert_eq!(body, json!({ "allow": false, "reason": "ReportRestricted" }));
}

#[tokio::test]
async fn decide_rejects_unknown_spellings() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let (status, body) = decide(
        &client,
        &srv,
        Role::Owner,
        json!({ "action": "export", "resource": "SALES" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_input");
}

#[tokio::test]
async fn capabilities_hide_and_disable_controls() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(srv.url("/authz/capabilities"))
        .header(PRINCIPAL_HEADER, as_role(Role::Staff))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body: serde_json::Value = res.json().await.unwrap();
    let modules = body["modules"].as_array().unwrap();
    let service = modules.iter().find(|m| m["resource"] == "SERVICE").unwrap();
    assert_eq!(service["operations"]["create"], "enabled");
    assert_eq!(service["operations"]["approve"], "disabled");

    let executive = modules.iter().find(|m| m["resource"] == "EXECUTIVE").unwrap();
    assert_eq!(executive["visible"], false);
}

#[tokio::test]
async fn admin_routes_are_owner_only() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(srv.url("/admin/roles"))
        .header(PRINCIPAL_HEADER, as_role(Role::Manager))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "error": "forbidden", "reason": "ExecutiveRestricted" }));

    let res = client
        .get(srv.url("/admin/roles"))
        .header(PRINCIPAL_HEADER, as_role(Role::Owner))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["roles"].as_array().unwrap().len(), Role::COUNT);
}

#[tokio::test]
async fn grant_and_revoke_take_effect_on_the_next_decision() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let owner = as_role(Role::Owner);
    let body = json!({ "action": "create", "resource": "SALES" });

    let (_, before) = decide(&client, &srv, Role::Staff, body.clone()).await;
    assert_eq!(before, json!({ "allow": false, "reason": "NoGrant" }));

    let res = client
        .post(srv.url("/admin/roles/STAFF/permissions"))
        .header(PRINCIPAL_HEADER, &owner)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let change: serde_json::Value = res.json().await.unwrap();
    assert_eq!(change["changed"], true);

    let (_, granted) = decide(&client, &srv, Role::Staff, body.clone()).await;
    assert_eq!(granted, json!({ "allow": true, "reason": "StoredGrant" }));

    let res = client
        .post(srv.url("/admin/roles/STAFF/permissions/revoke"))
        .header(PRINCIPAL_HEADER, &owner)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let (_, revoked) = decide(&client, &srv, Role::Staff, body).await;
    assert_eq!(revoked, json!({ "allow": false, "reason": "NoGrant" }));
}

#[tokio::test]
async fn role_reassignment_changes_decisions() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .put(srv.url(&format!("/admin/users/{}/role", as_role(Role::Marketing))))
        .header(PRINCIPAL_HEADER, as_role(Role::Owner))
        .json(&json!({ "role": "warehouse" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let (_, body) = decide(
        &client,
        &srv,
        Role::Marketing,
        json!({ "action": "approve", "resource": "MATERIAL" }),
    )
    .await;
    assert_eq!(body, json!({ "allow": true, "reason": "ApprovalRestricted" }));
}

#[tokio::test]
async fn explain_traces_every_rule() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(srv.url(&format!(
            "/admin/explain/{}?action=delete&resource=SALES&scope=operation",
            as_role(Role::Finance)
        )))
        .header(PRINCIPAL_HEADER, as_role(Role::Owner))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body: serde_json::Value = res.json().await.unwrap();
    let explanation = &body["explanation"];
    assert_eq!(explanation["decision"], json!({ "allow": false, "reason": "DeleteRestricted" }));
    assert_eq!(explanation["trace"].as_array().unwrap().len(), 11);

    let res = client
        .get(srv.url(&format!("/admin/explain/{}?action=read&resource=SALES", UserId::new())))
        .header(PRINCIPAL_HEADER, as_role(Role::Owner))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deactivated_principal_is_denied_with_reason() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .put(srv.url(&format!("/admin/users/{}/status", as_role(Role::Staff))))
        .header(PRINCIPAL_HEADER, as_role(Role::Owner))
        .json(&json!({ "status": "inactive" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let (status, body) = decide(
        &client,
        &srv,
        Role::Staff,
        json!({ "action": "read", "resource": "SERVICE" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "allow": false, "reason": "PrincipalInactive" }));

    let res = client
        .put(srv.url(&format!("/admin/users/{}/status", as_role(Role::Staff))))
        .header(PRINCIPAL_HEADER, as_role(Role::Owner))
        .json(&json!({ "status": "retired" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}
