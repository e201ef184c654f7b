use crate::common::{admin_cookie, client, create_test_config, spawn_mock_backend, spawn_server};
use nexus::web::assets::StaticAssets;

fn assets() -> StaticAssets {
    StaticAssets::from_entries([
        ("html/index.html", "<h1>Nexus</h1>"),
        ("server/admin.html", "<h1>Dashboard</h1>"),
        ("css/site.css", "body{margin:0}"),
    ])
}

#[tokio::test]
async fn test_admin_login_and_status() {
    let port = spawn_server(create_test_config(), assets()).await;
    let client = client();
    let cookie = admin_cookie(&client, port).await;
    assert!(cookie.starts_with("nexus_admin="));

    let resp = client
        .get(format!("http://127.0.0.1:{port}/api/admin/status"))
        .header("Cookie", &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["maintenanceMode"], false);
    assert_eq!(json["proxyMethods"]["basic"], true);
}

#[tokio::test]
async fn test_admin_requires_cookie() {
    let port = spawn_server(create_test_config(), assets()).await;

    let resp = client()
        .post(format!("http://127.0.0.1:{port}/api/admin/toggle-maintenance"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "Not authorized.");
}

#[tokio::test]
async fn test_wrong_admin_key() {
    let port = spawn_server(create_test_config(), assets()).await;

    let resp = client()
        .post(format!("http://127.0.0.1:{port}/api/auth/admin"))
        .header("X-Nexus-Admin", "wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
    assert!(resp.headers().get("set-cookie").is_none());
}

#[tokio::test]
async fn test_maintenance_mode_gates_public_routes() {
    let port = spawn_server(create_test_config(), assets()).await;
    let client = client();
    let cookie = admin_cookie(&client, port).await;

    let resp = client
        .post(format!("http://127.0.0.1:{port}/api/admin/toggle-maintenance"))
        .header("Cookie", &cookie)
        .send()
        .await
        .unwrap();
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["message"], "Maintenance mode enabled.");

    let home = client
        .get(format!("http://127.0.0.1:{port}/"))
        .send()
        .await
        .unwrap();
    assert_eq!(home.status(), 503);

    let stats = client
        .get(format!("http://127.0.0.1:{port}/api/admin/stats"))
        .header("Cookie", &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(stats.status(), 200);
    let json: serde_json::Value = stats.json().await.unwrap();
    assert!(json["stats"]["totalRequests"].as_u64().unwrap() >= 2);
}

#[tokio::test]
async fn test_block_ip_via_form_post() {
    let port = spawn_server(create_test_config(), assets()).await;
    let client = client();
    let cookie = admin_cookie(&client, port).await;

    let resp = client
        .post(format!("http://127.0.0.1:{port}/api/admin/block-ip"))
        .header("Cookie", &cookie)
        .header("Content-Type", "application/x-www-form-urlencoded")
        .body("ip=203.0.113.50")
        .send()
        .await
        .unwrap();
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["message"], "IP 203.0.113.50 blocked.");

    let blocked = client
        .get(format!("http://127.0.0.1:{port}/"))
        .header("X-Forwarded-For", "203.0.113.50")
        .send()
        .await
        .unwrap();
    assert_eq!(blocked.status(), 403);

    let events = client
        .get(format!("http://127.0.0.1:{port}/api/admin/security-events"))
        .header("Cookie", &cookie)
        .send()
        .await
        .unwrap();
    let json: serde_json::Value = events.json().await.unwrap();
    assert_eq!(json["events"][0]["message"], "Blocked IP attempt: 203.0.113.50");
    assert_eq!(json["events"][0]["severity"], "warning");
}

#[tokio::test]
async fn test_block_domain_applies_to_relay() {
    let backend_port = spawn_mock_backend().await;
    let port = spawn_server(create_test_config(), assets()).await;
    let client = client();
    let cookie = admin_cookie(&client, port).await;

    client
        .post(format!("http://127.0.0.1:{port}/api/admin/block-domain"))
        .header("Cookie", &cookie)
        .json(&serde_json::json!({ "domain": "127.0.0.1" }))
        .send()
        .await
        .unwrap();

    let resp = client
        .get(format!("http://127.0.0.1:{port}/api/proxy/basic"))
        .query(&[("url", format!("http://127.0.0.1:{backend_port}/"))])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
}

#[tokio::test]
async fn test_logout_invalidates_cookie() {
    let port = spawn_server(create_test_config(), assets()).await;
    let client = client();
    let cookie = admin_cookie(&client, port).await;

    let resp = client
        .post(format!("http://127.0.0.1:{port}/api/admin/logout"))
        .header("Cookie", &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let cleared = resp.headers().get("set-cookie").unwrap().to_str().unwrap();
    assert!(cleared.contains("Max-Age=0"));

    let resp = client
        .get(format!("http://127.0.0.1:{port}/admin"))
        .header("Cookie", &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_admin_page_and_assets() {
    let port = spawn_server(create_test_config(), assets()).await;
    let client = client();
    let cookie = admin_cookie(&client, port).await;

    let page = client
        .get(format!("http://127.0.0.1:{port}/admin"))
        .header("Cookie", &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(page.status(), 200);
    assert_eq!(page.text().await.unwrap(), "<h1>Dashboard</h1>");

    let css = client
        .get(format!("http://127.0.0.1:{port}/css/site.css"))
        .send()
        .await
        .unwrap();
    assert_eq!(css.status(), 200);
    assert_eq!(
        css.headers().get("content-type").unwrap(),
        "text/css; charset=utf-8"
    );

    let missing = client
        .get(format!("http://127.0.0.1:{port}/nothing-here"))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);
}

#[tokio::test]
async fn test_oversized_body_rejected() {
    let port = spawn_server(create_test_config(), assets()).await;
    let client = client();
    let cookie = admin_cookie(&client, port).await;

    let resp = client
        .post(format!("http://127.0.0.1:{port}/api/admin/block-ip"))
        .header("Cookie", &cookie)
        .body(vec![b'a'; 4096])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 413);
}
