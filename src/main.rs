//! `Nexus` - web relay with an admin control plane.
//!
//! SPDX-License-Identifier: AGPL-3.0-only
//!
//! Initializes the application runtime, loads configuration, sets up logging,
//! and launches the HTTP service.

use nexus::{
    Config, ControlPlane, Gateway, HttpFetcher, NexusProxy, PatternSanitizer, SessionStore,
    StaticAssets, WebhookNotifier,
};

use pingora::proxy::http_proxy_service;
use pingora::server::Server;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() {
    dotenvy::dotenv().ok();

    let (non_blocking, _guard) = tracing_appender::non_blocking(std::io::stdout());
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(non_blocking);

    if log_format.eq_ignore_ascii_case("pretty") {
        subscriber.init();
    } else {
        subscriber.json().init();
    }

    let config = Config::from_env();
    info!(
        listen_addr = %config.listen_addr,
        admin_keys = config.admin_keys.len(),
        session_ttl_secs = config.session_ttl_secs,
        rate_limit_per_min = config.rate_limit_per_min,
        allow_private_targets = config.allow_private_targets,
        log_format = %config.log_format,
        "Server initialized"
    );

    let assets = Arc::new(
        config
            .static_dir
            .as_deref()
            .map_or_else(StaticAssets::empty, StaticAssets::load),
    );
    let webhook_notifier = Arc::new(WebhookNotifier::new(&config));
    let control = Arc::new(ControlPlane::new(&config, webhook_notifier));
    let fetcher = Arc::new(
        HttpFetcher::new(&config, control.clone()).expect("Failed to build relay HTTP client"),
    );
    let sessions = Arc::new(SessionStore::new(
        &config.admin_keys,
        config.session_ttl_secs,
    ));

    let purge_sessions = sessions.clone();
    let purge_interval = Duration::from_secs(config.session_ttl_secs.clamp(1, 300));
    std::thread::spawn(move || {
        loop {
            std::thread::sleep(purge_interval);
            purge_sessions.purge_expired();
        }
    });

    let gateway = Arc::new(Gateway::new(
        config.clone(),
        control,
        sessions,
        fetcher,
        Arc::new(PatternSanitizer::new()),
        assets,
    ));

    let mut server = Server::new(None).expect("Failed to create Pingora server");
    server.bootstrap();

    let proxy = NexusProxy::new(config.clone(), gateway);
    let mut proxy_service = http_proxy_service(&server.configuration, proxy);
    proxy_service.add_tcp(&config.listen_addr.to_string());
    server.add_service(proxy_service);

    server.run_forever();
}
