use crate::common::{
    BACKEND_PAGE, admin_cookie, client, create_test_config, spawn_mock_backend, spawn_server,
};
use nexus::web::assets::StaticAssets;

#[tokio::test]
async fn test_basic_relay_passes_body_through() {
    let backend_port = spawn_mock_backend().await;
    let port = spawn_server(create_test_config(), StaticAssets::empty()).await;

    let resp = client()
        .get(format!("http://127.0.0.1:{port}/api/proxy/basic"))
        .query(&[("url", format!("http://127.0.0.1:{backend_port}/page"))])
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "text/html; charset=utf-8"
    );
    assert_eq!(resp.headers().get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(resp.text().await.unwrap(), BACKEND_PAGE);
}

#[tokio::test]
async fn test_advanced_relay_strips_ad_script() {
    let backend_port = spawn_mock_backend().await;
    let port = spawn_server(create_test_config(), StaticAssets::empty()).await;

    let resp = client()
        .get(format!("http://127.0.0.1:{port}/api/proxy/advanced"))
        .query(&[("url", format!("http://127.0.0.1:{backend_port}/page"))])
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body = resp.text().await.unwrap();
    assert!(body.contains("<h1>Hello</h1>"));
    assert!(!body.contains("googlesyndication"));
}

#[tokio::test]
async fn test_upstream_error_status_is_reported() {
    let backend_port = spawn_mock_backend().await;
    let port = spawn_server(create_test_config(), StaticAssets::empty()).await;

    let resp = client()
        .get(format!("http://127.0.0.1:{port}/api/proxy/basic"))
        .query(&[("url", format!("http://127.0.0.1:{backend_port}/missing"))])
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 404);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Not Found");
}

#[tokio::test]
async fn test_missing_url_is_rejected() {
    let port = spawn_server(create_test_config(), StaticAssets::empty()).await;

    let resp = client()
        .get(format!("http://127.0.0.1:{port}/api/proxy/basic"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "URL parameter is required");
}

#[tokio::test]
async fn test_unreachable_destination_is_generic_500() {
    let port = spawn_server(create_test_config(), StaticAssets::empty()).await;

    let resp = client()
        .get(format!("http://127.0.0.1:{port}/api/proxy/basic"))
        .query(&[("url", "http://127.0.0.1:1/")])
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 500);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "Internal server error");
}

#[tokio::test]
async fn test_private_targets_refused_by_default() {
    let mut config = (*create_test_config()).clone();
    config.allow_private_targets = false;
    let port = spawn_server(std::sync::Arc::new(config), StaticAssets::empty()).await;

    let resp = client()
        .get(format!("http://127.0.0.1:{port}/api/proxy/basic"))
        .query(&[("url", "http://127.0.0.1:9/")])
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 403);
}

#[tokio::test]
async fn test_ipv4_mapped_loopback_refused() {
    let mut config = (*create_test_config()).clone();
    config.allow_private_targets = false;
    let port = spawn_server(std::sync::Arc::new(config), StaticAssets::empty()).await;

    for url in ["http://[::ffff:127.0.0.1]:9/", "http://[::ffff:169.254.169.254]/"] {
        let resp = client()
            .get(format!("http://127.0.0.1:{port}/api/proxy/basic"))
            .query(&[("url", url)])
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 403, "{url}");
    }
}

#[tokio::test]
async fn test_redirect_to_permitted_host_followed() {
    let backend_port = spawn_mock_backend().await;
    let port = spawn_server(create_test_config(), StaticAssets::empty()).await;

    let resp = client()
        .get(format!("http://127.0.0.1:{port}/api/proxy/basic"))
        .query(&[("url", format!("http://127.0.0.1:{backend_port}/hop"))])
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), BACKEND_PAGE);
}

#[tokio::test]
async fn test_redirect_to_blocked_domain_refused() {
    let backend_port = spawn_mock_backend().await;
    let port = spawn_server(create_test_config(), StaticAssets::empty()).await;
    let client = client();
    let cookie = admin_cookie(&client, port).await;

    client
        .post(format!("http://127.0.0.1:{port}/api/admin/block-domain"))
        .header("Cookie", &cookie)
        .json(&serde_json::json!({ "domain": "localhost" }))
        .send()
        .await
        .unwrap();

    let resp = client
        .get(format!("http://127.0.0.1:{port}/api/proxy/basic"))
        .query(&[("url", format!("http://127.0.0.1:{backend_port}/hop"))])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "Domain localhost is blocked.");
}

#[tokio::test]
async fn test_oversized_destination_body_is_generic_500() {
    let backend_port = spawn_mock_backend().await;
    let port = spawn_server(create_test_config(), StaticAssets::empty()).await;

    let resp = client()
        .get(format!("http://127.0.0.1:{port}/api/proxy/advanced"))
        .query(&[("url", format!("http://127.0.0.1:{backend_port}/large"))])
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 500);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "Internal server error");
}
