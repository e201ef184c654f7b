use async_trait::async_trait;
use nexus::config::{Config, Result};
use nexus::control::ControlPlane;
use nexus::core::middleware::SessionStore;
use nexus::core::proxy::{Gateway, NexusProxy};
use nexus::features::webhook::WebhookNotifier;
use nexus::relay::{Fetcher, HttpFetcher, RelayResult, ResolvedTarget};
use nexus::security::sanitizer::PatternSanitizer;
use nexus::web::assets::StaticAssets;
use pingora::proxy::http_proxy_service;
use pingora::server::Server;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

pub const ADMIN_KEY: &str = "integration-admin-key";

pub const BACKEND_PAGE: &str = "<html><body><h1>Hello</h1>\
<script async src=\"https://pagead2.googlesyndication.com/pagead/js/adsbygoogle.js\"></script>\
</body></html>";

/// Size of the `/large` page, above the test relay body limit.
pub const LARGE_PAGE_SIZE: usize = 128 * 1024;

/// Serves `BACKEND_PAGE` for every path except `/missing` (404), `/hop`
/// (302 to `/page` on `localhost`) and `/large` (`LARGE_PAGE_SIZE` bytes).
pub async fn spawn_mock_backend() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        loop {
            if let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = [0u8; 2048];
                    let n = socket.read(&mut buf).await.unwrap_or(0);
                    let request = String::from_utf8_lossy(&buf[..n]);
                    let response = if request.starts_with("GET /missing") {
                        "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                            .to_string()
                    } else if request.starts_with("GET /hop") {
                        format!(
                            "HTTP/1.1 302 Found\r\nLocation: http://localhost:{port}/page\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                        )
                    } else if request.starts_with("GET /large") {
                        format!(
                            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {LARGE_PAGE_SIZE}\r\nConnection: close\r\n\r\n{}",
                            "x".repeat(LARGE_PAGE_SIZE)
                        )
                    } else {
                        format!(
                            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            BACKEND_PAGE.len(),
                            BACKEND_PAGE
                        )
                    };
                    let _ = socket.write_all(response.as_bytes()).await;
                });
            }
        }
    });

    port
}

pub fn create_test_config() -> Arc<Config> {
    Arc::new(Config {
        listen_addr: "127.0.0.1:0".parse().unwrap(),
        admin_keys: vec![ADMIN_KEY.to_string()],
        session_ttl_secs: 3600,
        secure_cookies: false,
        fetch_timeout_secs: 5,
        max_relay_body_size: 64 * 1024,
        relay_spoof_host: None,
        allow_private_targets: true,
        rate_limit_per_min: 1000,
        request_log_capacity: 1000,
        security_log_capacity: 500,
        trust_forwarded_for: true,
        country_header: "cf-ipcountry".to_string(),
        max_body_size: 1024,
        static_dir: None,
        webhook_url: None,
        webhook_token: None,
        app_name: "TestApp".to_string(),
        log_format: "pretty".to_string(),
    })
}

/// Answers every fetch with a fixed page naming the target.
pub struct StubFetcher;

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, target: &ResolvedTarget) -> Result<RelayResult> {
        Ok(RelayResult::body(200, format!("<p>{}</p>", target.url)))
    }
}

pub fn build_control(config: &Arc<Config>) -> Arc<ControlPlane> {
    Arc::new(ControlPlane::new(
        config,
        Arc::new(WebhookNotifier::new(config)),
    ))
}

pub fn build_gateway(
    config: &Arc<Config>,
    fetcher: Arc<dyn Fetcher>,
    assets: StaticAssets,
) -> Arc<Gateway> {
    build_gateway_with(config, build_control(config), fetcher, assets)
}

pub fn build_gateway_with(
    config: &Arc<Config>,
    control: Arc<ControlPlane>,
    fetcher: Arc<dyn Fetcher>,
    assets: StaticAssets,
) -> Arc<Gateway> {
    let sessions = Arc::new(SessionStore::new(&config.admin_keys, config.session_ttl_secs));
    Arc::new(Gateway::new(
        config.clone(),
        control,
        sessions,
        fetcher,
        Arc::new(PatternSanitizer::new()),
        Arc::new(assets),
    ))
}

/// Starts a pingora server with a real fetcher and returns its port.
pub async fn spawn_server(config: Arc<Config>, assets: StaticAssets) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let mut conf_clone = (*config).clone();
    conf_clone.listen_addr = format!("127.0.0.1:{port}").parse().unwrap();
    let config = Arc::new(conf_clone);

    std::thread::spawn(move || {
        let control = build_control(&config);
        let fetcher = Arc::new(HttpFetcher::new(&config, control.clone()).unwrap());
        let gateway = build_gateway_with(&config, control, fetcher, assets);
        let proxy = NexusProxy::new(config.clone(), gateway);

        let server_conf = Arc::new(pingora::server::configuration::ServerConf::default());
        let mut service = http_proxy_service(&server_conf, proxy);
        service.add_tcp(&config.listen_addr.to_string());

        let mut server = Server::new(None).unwrap();
        server.bootstrap();
        server.add_service(service);
        server.run_forever();
    });

    tokio::time::sleep(Duration::from_secs(3)).await;
    port
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// Logs in through `/api/auth/admin` and returns the `name=value` cookie pair.
pub async fn admin_cookie(client: &reqwest::Client, port: u16) -> String {
    let resp = client
        .post(format!("http://127.0.0.1:{port}/api/auth/admin"))
        .header("X-Nexus-Admin", ADMIN_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let cookie = resp
        .headers()
        .get("set-cookie")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    cookie.split(';').next().unwrap().to_string()
}
