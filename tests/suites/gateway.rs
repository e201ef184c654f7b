use crate::common::{StubFetcher, build_gateway, create_test_config};
use nexus::core::proxy::ApiRequest;
use nexus::web::assets::StaticAssets;
use std::sync::Arc;

#[tokio::test]
async fn test_concurrent_requests_are_all_counted() {
    let gateway = build_gateway(&create_test_config(), Arc::new(StubFetcher), StaticAssets::empty());

    let mut handles = Vec::new();
    for i in 0..50 {
        let gw = gateway.clone();
        handles.push(tokio::spawn(async move {
            let req = ApiRequest::new(
                "GET",
                &format!("/api/proxy/basic?url=site{}.example.com", i % 5),
                &format!("10.0.0.{}", i % 10),
            );
            gw.handle(&req).await.status
        }));
    }
    for h in handles {
        assert_eq!(h.await.unwrap(), 200);
    }

    let control = gateway.control();
    assert_eq!(control.total_requests(), 50);
    let report = control.analytics();
    assert_eq!(report.top_sites.len(), 5);
    assert!(report.top_sites.iter().all(|s| s.count == 10));
    assert!(report.bandwidth.total > 0);
}

#[tokio::test]
async fn test_concurrent_toggles_keep_modes_consistent() {
    let gateway = build_gateway(&create_test_config(), Arc::new(StubFetcher), StaticAssets::empty());

    let mut handles = Vec::new();
    for i in 0..40 {
        let gw = gateway.clone();
        handles.push(tokio::spawn(async move {
            let (basic, advanced) = match i % 4 {
                0 => (true, false),
                1 => (false, true),
                2 => (true, true),
                _ => (false, false),
            };
            let _ = gw.control().update_modes(basic, advanced);
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    let modes = gateway.control().modes();
    assert!(modes.basic || modes.advanced);
}

#[tokio::test]
async fn test_search_query_uses_engine_hint() {
    let gateway = build_gateway(&create_test_config(), Arc::new(StubFetcher), StaticAssets::empty());

    let resp = gateway
        .handle(&ApiRequest::new(
            "GET",
            "/api/proxy/basic?url=rust&engine=Bing",
            "10.1.1.1",
        ))
        .await;
    assert_eq!(resp.status, 200);
    assert!(String::from_utf8_lossy(&resp.body).contains("bing.com/search?q=rust"));

    let resp = gateway
        .handle(&ApiRequest::new("GET", "/api/proxy/basic?url=rust", "10.1.1.1"))
        .await;
    assert_eq!(resp.status, 400);
}

#[tokio::test]
async fn test_request_log_is_bounded() {
    let mut config = (*create_test_config()).clone();
    config.request_log_capacity = 10;
    let gateway = build_gateway(&Arc::new(config), Arc::new(StubFetcher), StaticAssets::empty());

    for i in 0..25 {
        gateway
            .handle(&ApiRequest::new("GET", &format!("/page/{i}"), "10.2.2.2"))
            .await;
    }

    let logs = gateway
        .control()
        .query_logs(&nexus::control::LogQuery::default());
    assert_eq!(logs.len(), 10);
    assert_eq!(logs[0].path, "/page/24");
    assert_eq!(logs[9].path, "/page/15");
}
