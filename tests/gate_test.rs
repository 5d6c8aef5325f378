//! End-to-end tests: TLS client → gatekeeper → echo upstream.

use std::time::Duration;

use gatekeeper::http::NOT_FOUND_BODY;
use reqwest::{Method, StatusCode, Version};
use serde_json::Value;

mod common;
use common::{ALLOWED_PATH, SECRET};

async fn json_body(res: reqwest::Response) -> Value {
    let bytes = res.bytes().await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_admitted_request_reaches_upstream() {
    let upstream = common::start_echo_upstream().await;
    let gate = common::start_gate(&upstream.url()).await;

    let res = common::client()
        .post(gate.url("/hook?event=push"))
        .header("x-flag", SECRET)
        .body("payload")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers().get("x-upstream").unwrap(), "echo");

    let echoed = json_body(res).await;
    assert_eq!(echoed["method"], "POST");
    assert_eq!(echoed["uri"], "/hook?event=push");
    assert_eq!(echoed["body"], "payload");
    assert_eq!(echoed["host"], upstream.addr.to_string());
    assert_eq!(echoed["x_forwarded_for"], "127.0.0.1");
    assert_eq!(echoed["x_flag"], SECRET);
    assert_eq!(upstream.hits(), 1);
}

#[tokio::test]
async fn test_upstream_status_is_relayed() {
    let upstream = common::start_echo_upstream().await;
    let gate = common::start_gate(&upstream.url()).await;

    let res = common::client()
        .get(gate.url("/hook?status=418"))
        .header("x-flag", SECRET)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::IM_A_TEAPOT);
    assert_eq!(upstream.hits(), 1);
}

#[tokio::test]
async fn test_upstream_base_path_is_joined() {
    let upstream = common::start_echo_upstream().await;
    let base = format!("{}/base?token=abc", upstream.url());
    let gate = common::start_gate(&base).await;

    let res = common::client()
        .get(gate.url("/hook?event=push"))
        .header("x-flag", SECRET)
        .send()
        .await
        .unwrap();

    let echoed = json_body(res).await;
    assert_eq!(echoed["uri"], "/base/hook?token=abc&event=push");
}

#[tokio::test]
async fn test_denied_requests_get_uniform_not_found() {
    let upstream = common::start_echo_upstream().await;
    let gate = common::start_gate(&upstream.url()).await;
    let client = common::client();

    let cases: Vec<(Method, &str, Option<&str>)> = vec![
        (Method::GET, ALLOWED_PATH, None),
        (Method::GET, ALLOWED_PATH, Some("wrong")),
        (Method::POST, ALLOWED_PATH, Some("S3CR3T-VALUE")),
        (Method::GET, "/other", Some(SECRET)),
        (Method::PUT, "/hook/", Some(SECRET)),
        (Method::DELETE, "/hook/extra", Some(SECRET)),
        (Method::PATCH, "/", Some(SECRET)),
    ];

    for (method, path, header) in cases {
        let mut req = client.request(method.clone(), gate.url(path));
        if let Some(value) = header {
            req = req.header("x-flag", value);
        }
        let res = req.send().await.unwrap();

        assert_eq!(res.status(), StatusCode::NOT_FOUND, "{method} {path}");
        assert_eq!(
            res.headers().get("content-type").unwrap(),
            "application/json"
        );
        assert_eq!(res.text().await.unwrap(), NOT_FOUND_BODY);
    }

    assert_eq!(upstream.hits(), 0);
}

#[tokio::test]
async fn test_head_denied_has_no_body() {
    let upstream = common::start_echo_upstream().await;
    let gate = common::start_gate(&upstream.url()).await;

    let res = common::client()
        .head(gate.url("/anything"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert!(res.bytes().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_one_log_line_per_request() {
    let upstream = common::start_echo_upstream().await;
    let gate = common::start_gate(&upstream.url()).await;
    let client = common::client();

    client
        .get(gate.url("/hook?a=1"))
        .header("x-flag", SECRET)
        .header("user-agent", "hook-sender/2.0")
        .send()
        .await
        .unwrap();
    client
        .get(gate.url("/scan"))
        .header("user-agent", "scanner")
        .send()
        .await
        .unwrap();
    client
        .get(gate.url("/hook"))
        .header("x-flag", "guess")
        .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
        .send()
        .await
        .unwrap();

    let lines = gate.log_lines();
    assert_eq!(lines.len(), 3);

    let fields: Vec<&str> = lines[0].split('|').collect();
    assert_eq!(fields.len(), 8);
    assert_eq!(fields[0], "");
    assert_eq!(fields[2], "/hook?a=1");
    assert_eq!(fields[3], "hook-sender/2.0");
    assert_eq!(fields[4], SECRET);
    assert!(fields[5].starts_with("127.0.0.1:"));
    assert_eq!(fields[6], fields[5]);
    assert_eq!(fields[7], "");

    let scan: Vec<&str> = lines[1].split('|').collect();
    assert_eq!(scan[2], "/scan");
    assert_eq!(scan[3], "scanner");
    assert_eq!(scan[4], "");

    let forwarded: Vec<&str> = lines[2].split('|').collect();
    assert_eq!(forwarded[4], "guess");
    assert_eq!(forwarded[6], "203.0.113.9:-");
}

#[tokio::test]
async fn test_configured_header_name() {
    let upstream = common::start_echo_upstream().await;
    let gate = common::start_gate_with(&upstream.url(), |config| {
        config.header_name = "x-gate-token".to_string();
    })
    .await;
    let client = common::client();

    let res = client
        .get(gate.url(ALLOWED_PATH))
        .header("x-flag", SECRET)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .get(gate.url(ALLOWED_PATH))
        .header("x-gate-token", SECRET)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(upstream.hits(), 1);
}

#[tokio::test]
async fn test_empty_secret_admits_requests_without_header() {
    let upstream = common::start_echo_upstream().await;
    let gate = common::start_gate_with(&upstream.url(), |config| {
        config.required_header_value = String::new();
    })
    .await;

    let res = common::client()
        .get(gate.url(ALLOWED_PATH))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(upstream.hits(), 1);
}

#[tokio::test]
async fn test_upstream_down_returns_bad_gateway() {
    let closed = common::closed_port().await;
    let gate = common::start_gate(&format!("http://{closed}")).await;

    let res = common::client()
        .get(gate.url(ALLOWED_PATH))
        .header("x-flag", SECRET)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(gate.log_lines().len(), 1);
}

#[tokio::test]
async fn test_slow_upstream_returns_gateway_timeout() {
    let upstream = common::start_echo_upstream().await;
    let gate = common::start_gate_with(&upstream.url(), |config| {
        config.timeouts.write_secs = 1;
    })
    .await;

    let started = std::time::Instant::now();
    let res = common::client()
        .get(gate.url("/hook?delay_ms=3000"))
        .header("x-flag", SECRET)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::GATEWAY_TIMEOUT);
    assert!(started.elapsed() < Duration::from_millis(2500));
    assert_eq!(upstream.hits(), 1);
}

#[tokio::test]
async fn test_http2_is_negotiated() {
    let upstream = common::start_echo_upstream().await;
    let gate = common::start_gate(&upstream.url()).await;

    let res = common::client()
        .get(gate.url(ALLOWED_PATH))
        .header("x-flag", SECRET)
        .send()
        .await
        .unwrap();

    assert_eq!(res.version(), Version::HTTP_2);
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_http1_only_client_is_served() {
    let upstream = common::start_echo_upstream().await;
    let gate = common::start_gate(&upstream.url()).await;

    let client = reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .no_proxy()
        .http1_only()
        .build()
        .unwrap();

    let res = client.get(gate.url("/nope")).send().await.unwrap();
    assert_eq!(res.version(), Version::HTTP_11);
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_graceful_shutdown_stops_server() {
    let upstream = common::start_echo_upstream().await;
    let gate = common::start_gate(&upstream.url()).await;

    assert_eq!(gate.shutdown.trigger(), 1);

    let result = tokio::time::timeout(Duration::from_secs(15), gate.task)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(result.is_ok());
}
