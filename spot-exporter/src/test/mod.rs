//! End-to-end tests: a mocked metadata service scraped through the HTTP surface.

use std::time::Duration;

use chrono::{TimeDelta, Utc};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::Application;
use crate::config::{Config, ProbeConfig};

const INSTANCE_ACTION_PATH: &str = "/latest/meta-data/spot/instance-action";

fn create_test_config(metadata_url: &str) -> Config {
    Config {
        probe: ProbeConfig {
            metadata_url: Url::parse(metadata_url).unwrap(),
            timeout: Duration::from_millis(500),
        },
        ..Default::default()
    }
}

async fn mock_metadata_service(template: ResponseTemplate) -> MockServer {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(INSTANCE_ACTION_PATH))
        .respond_with(template)
        .mount(&mock_server)
        .await;
    mock_server
}

fn series_value(body: &str, series: &str) -> Option<f64> {
    body.lines()
        .filter(|line| !line.starts_with('#'))
        .filter_map(|line| line.rsplit_once(' '))
        .find(|(name, _)| *name == series)
        .map(|(_, value)| value.parse().unwrap())
}

#[test_log::test(tokio::test)]
async fn test_scrape_reports_pending_termination() {
    let time = Utc::now() + TimeDelta::minutes(2);
    let mock_server = mock_metadata_service(ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "action": "terminate",
        "time": time.to_rfc3339(),
    })))
    .await;

    let config = create_test_config(&format!("{}{}", mock_server.uri(), INSTANCE_ACTION_PATH));
    let server = Application::new(config).await.unwrap().into_test_server();

    let response = server.get("/metrics").await;
    assert_eq!(response.status_code().as_u16(), 200);
    assert!(
        response
            .headers()
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("text/plain")
    );

    let body = response.text();
    assert!(body.contains("# TYPE metadata_service_available gauge"));
    assert_eq!(series_value(&body, "metadata_service_available"), Some(1.0));
    assert_eq!(
        series_value(&body, r#"termination_imminent{instance_action="terminate"}"#),
        Some(1.0)
    );
    let remaining = series_value(&body, "termination_in").expect("Countdown should be exposed");
    assert!(remaining > 100.0 && remaining <= 120.0, "unexpected countdown {}", remaining);
}

#[test_log::test(tokio::test)]
async fn test_scrape_without_notice() {
    let mock_server = mock_metadata_service(ResponseTemplate::new(404)).await;

    let config = create_test_config(&format!("{}{}", mock_server.uri(), INSTANCE_ACTION_PATH));
    let server = Application::new(config).await.unwrap().into_test_server();

    let body = server.get("/metrics").await.text();
    assert_eq!(series_value(&body, "metadata_service_available"), Some(1.0));
    assert_eq!(series_value(&body, r#"termination_imminent{instance_action=""}"#), Some(0.0));
    assert_eq!(series_value(&body, "termination_in"), None);
}

#[test_log::test(tokio::test)]
async fn test_every_scrape_probes_again() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(INSTANCE_ACTION_PATH))
        .respond_with(ResponseTemplate::new(404))
        .expect(3)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&format!("{}{}", mock_server.uri(), INSTANCE_ACTION_PATH));
    let server = Application::new(config).await.unwrap().into_test_server();

    for _ in 0..3 {
        let response = server.get("/metrics").await;
        assert_eq!(response.status_code().as_u16(), 200);
    }

    mock_server.verify().await;
}

#[test_log::test(tokio::test)]
async fn test_scrape_with_unreachable_service() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let config = create_test_config(&format!("http://127.0.0.1:{}{}", port, INSTANCE_ACTION_PATH));
    let server = Application::new(config).await.unwrap().into_test_server();

    let response = server.get("/metrics").await;
    // A failed probe never fails the scrape
    assert_eq!(response.status_code().as_u16(), 200);

    let body = response.text();
    assert_eq!(series_value(&body, "metadata_service_available"), Some(0.0));
    assert!(!body.contains("termination_imminent"));
    assert_eq!(series_value(&body, "termination_in"), None);
}

#[test_log::test(tokio::test)]
async fn test_custom_metrics_path_and_health() {
    let mock_server = mock_metadata_service(ResponseTemplate::new(404)).await;

    let mut config = create_test_config(&format!("{}{}", mock_server.uri(), INSTANCE_ACTION_PATH));
    config.metrics_path = "/internal/metrics".to_string();
    let server = Application::new(config).await.unwrap().into_test_server();

    let health = server.get("/healthz").await;
    assert_eq!(health.status_code().as_u16(), 200);
    assert_eq!(health.text(), "OK");

    let metrics = server.get("/internal/metrics").await;
    assert_eq!(metrics.status_code().as_u16(), 200);
    assert_eq!(series_value(&metrics.text(), "metadata_service_available"), Some(1.0));

    let default_path = server.get("/metrics").expect_failure().await;
    assert_eq!(default_path.status_code().as_u16(), 404);
}
