mod common;

use common::{app, closed_port, payload, spawn_echo_server};
use rest_probe::errors::ToolErrorKind;
use serde_json::json;

#[tokio::test]
async fn relative_endpoint_resolves_against_base_url() {
    let echo = spawn_echo_server().await;
    let app = app(&[("REST_BASE_URL", echo.base_url.as_str())]);

    let result = app
        .api_manager
        .test_request(json!({"method": "GET", "endpoint": "users/"}))
        .await
        .expect("result");
    assert_eq!(result["isError"], false);

    let body = payload(&result);
    assert_eq!(body["request"]["url"], format!("{}/users", echo.base_url));
    assert_eq!(body["request"]["authMethod"], "none");
    assert_eq!(body["response"]["statusCode"], 200);
    assert_eq!(body["response"]["body"]["path"], "/users");
    assert_eq!(body["response"]["body"]["method"], "GET");
    assert!(body["response"]["timing"]
        .as_str()
        .expect("timing")
        .ends_with("ms"));
    assert_eq!(body["validation"]["messages"][0], "Request completed successfully");
    assert!(body["validation"].get("truncated").is_none());

    echo.stop().await;
}

#[tokio::test]
async fn full_url_is_required_without_base_url() {
    let app = app(&[]);
    let err = app
        .api_manager
        .test_request(json!({"method": "GET", "endpoint": "/users"}))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ToolErrorKind::InvalidParams);
    assert!(err.message.contains("full URL"));
}

#[tokio::test]
async fn full_url_is_rejected_with_base_url_and_points_at_host() {
    let app = app(&[("REST_BASE_URL", "https://api.example.com")]);
    let err = app
        .api_manager
        .test_request(json!({"method": "GET", "endpoint": "https://other.example.com/users?x=1"}))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ToolErrorKind::InvalidParams);
    assert!(err.message.contains("https://api.example.com/users?x=1"));
    assert!(err.hint.as_deref().unwrap_or("").contains("host"));
}

#[tokio::test]
async fn basic_auth_is_injected_and_redacted() {
    let echo = spawn_echo_server().await;
    let app = app(&[
        ("REST_BASE_URL", echo.base_url.as_str()),
        ("AUTH_BASIC_USERNAME", "admin"),
        ("AUTH_BASIC_PASSWORD", "secret"),
    ]);

    let result = app
        .api_manager
        .test_request(json!({"method": "GET", "endpoint": "/whoami"}))
        .await
        .expect("result");
    let body = payload(&result);
    assert_eq!(
        body["response"]["body"]["headers"]["authorization"],
        "Basic YWRtaW46c2VjcmV0"
    );
    assert_eq!(body["request"]["headers"]["Authorization"], "[REDACTED]");
    assert_eq!(body["request"]["authMethod"], "basic");

    echo.stop().await;
}

#[tokio::test]
async fn api_key_header_wins_over_caller_header() {
    let echo = spawn_echo_server().await;
    let app = app(&[
        ("REST_BASE_URL", echo.base_url.as_str()),
        ("AUTH_APIKEY_HEADER_NAME", "X-Service-Key"),
        ("AUTH_APIKEY_VALUE", "configured-key"),
    ]);

    let result = app
        .api_manager
        .test_request(json!({
            "method": "GET",
            "endpoint": "/keys",
            "headers": {"x-service-key": "caller-key"}
        }))
        .await
        .expect("result");
    let body = payload(&result);
    assert_eq!(
        body["response"]["body"]["headers"]["x-service-key"],
        "configured-key"
    );
    assert_eq!(body["request"]["authMethod"], "apikey");
    assert_eq!(body["request"]["headers"]["X-Service-Key"], "[REDACTED]");

    echo.stop().await;
}

#[tokio::test]
async fn caller_headers_override_custom_headers() {
    let echo = spawn_echo_server().await;
    let app = app(&[
        ("REST_BASE_URL", echo.base_url.as_str()),
        ("HEADER_X-Tenant", "configured"),
        ("header_X-Api-Version", "2"),
    ]);

    let result = app
        .api_manager
        .test_request(json!({
            "method": "GET",
            "endpoint": "/tenants",
            "headers": {"X-Tenant": "caller"}
        }))
        .await
        .expect("result");
    let body = payload(&result);
    let seen = &body["response"]["body"]["headers"];
    assert_eq!(seen["x-tenant"], "caller");
    assert_eq!(seen["x-api-version"], "2");
    // The caller sees their own value; the configured one stays hidden.
    assert_eq!(body["request"]["headers"]["X-Tenant"], "caller");
    assert_eq!(body["request"]["headers"]["X-Api-Version"], "[REDACTED]");

    echo.stop().await;
}

#[tokio::test]
async fn large_body_is_truncated_to_the_limit() {
    let echo = spawn_echo_server().await;
    let app = app(&[
        ("REST_BASE_URL", echo.base_url.as_str()),
        ("REST_RESPONSE_SIZE_LIMIT", "10"),
    ]);

    let result = app
        .api_manager
        .test_request(json!({"method": "GET", "endpoint": "/text/0123456789ABCDEF"}))
        .await
        .expect("result");
    let body = payload(&result);
    assert_eq!(body["response"]["body"], "0123456789");
    let truncated = &body["validation"]["truncated"];
    assert_eq!(truncated["originalSize"], 16);
    assert_eq!(truncated["returnedSize"], 10);
    assert_eq!(truncated["truncationPoint"], 10);
    assert_eq!(truncated["sizeLimit"], 10);
    assert_eq!(
        body["validation"]["messages"][1],
        "Response truncated: 10 of 16 bytes returned due to size limit (10 bytes)"
    );

    echo.stop().await;
}

#[tokio::test]
async fn host_override_is_normalized_and_joined() {
    let echo = spawn_echo_server().await;
    let app = app(&[
        ("REST_BASE_URL", "https://unused.example.com"),
        ("REST_ALLOW_PRIVATE_NETWORKS", "true"),
    ]);
    let host = format!("{}/v1/", echo.base_url);

    let result = app
        .api_manager
        .test_request(json!({"method": "GET", "endpoint": "/users", "host": host}))
        .await
        .expect("result");
    let body = payload(&result);
    assert_eq!(body["request"]["url"], format!("{}/v1/users", echo.base_url));
    assert_eq!(body["response"]["body"]["path"], "/v1/users");

    echo.stop().await;
}

#[tokio::test]
async fn private_host_is_blocked_in_production() {
    let app = app(&[]);
    let err = app
        .api_manager
        .test_request(json!({
            "method": "GET",
            "endpoint": "/admin",
            "host": "http://192.168.1.10:8080"
        }))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ToolErrorKind::InvalidParams);
    assert_eq!(err.code, "PRIVATE_NETWORK_BLOCKED");
}

#[tokio::test]
async fn body_is_sent_for_post_and_dropped_for_get() {
    let echo = spawn_echo_server().await;
    let app = app(&[("REST_BASE_URL", echo.base_url.as_str())]);

    let posted = payload(
        &app.api_manager
            .test_request(json!({"method": "POST", "endpoint": "/items", "body": {"name": "widget"}}))
            .await
            .expect("post"),
    );
    assert_eq!(posted["response"]["body"]["body"], r#"{"name":"widget"}"#);
    assert_eq!(
        posted["response"]["body"]["headers"]["content-type"],
        "application/json"
    );
    assert_eq!(posted["request"]["body"]["name"], "widget");

    let fetched = payload(
        &app.api_manager
            .test_request(json!({"method": "GET", "endpoint": "/items", "body": {"name": "widget"}}))
            .await
            .expect("get"),
    );
    assert_eq!(fetched["response"]["body"]["body"], "");
    assert!(fetched["request"]["body"].is_null());

    echo.stop().await;
}

#[tokio::test]
async fn error_statuses_are_observed_not_raised() {
    let echo = spawn_echo_server().await;
    let app = app(&[("REST_BASE_URL", echo.base_url.as_str())]);

    let result = app
        .api_manager
        .test_request(json!({"method": "DELETE", "endpoint": "/status/404"}))
        .await
        .expect("result");
    assert_eq!(result["isError"], false);
    let body = payload(&result);
    assert_eq!(body["response"]["statusCode"], 404);
    assert_eq!(body["response"]["statusText"], "Not Found");
    assert_eq!(body["validation"]["isError"], true);
    assert_eq!(body["validation"]["messages"][0], "Request failed with status 404");

    echo.stop().await;
}

#[tokio::test]
async fn connection_failure_returns_error_envelope() {
    let port = closed_port().await;
    let base = format!("http://127.0.0.1:{port}");
    let app = app(&[("REST_BASE_URL", base.as_str()), ("REST_DETAILED_ERRORS", "true")]);

    let result = app
        .api_manager
        .test_request(json!({"method": "GET", "endpoint": "/down"}))
        .await
        .expect("result");
    assert_eq!(result["isError"], true);
    let body = payload(&result);
    assert_eq!(body["error"]["code"], "CONNECTION_FAILED");
    assert_eq!(body["error"]["retryable"], true);
    assert_eq!(body["error"]["request"]["url"], format!("{base}/down"));
    assert_eq!(body["error"]["request"]["method"], "GET");
}

#[tokio::test]
async fn connection_failure_hides_details_in_production() {
    let port = closed_port().await;
    let base = format!("http://127.0.0.1:{port}");
    let app = app(&[("REST_BASE_URL", base.as_str())]);

    let body = payload(
        &app.api_manager
            .test_request(json!({"method": "GET", "endpoint": "/down"}))
            .await
            .expect("result"),
    );
    assert_eq!(body["error"]["request"]["url"], "[REDACTED]");
    assert_eq!(
        body["error"]["message"],
        "An error occurred while processing the request"
    );
    assert_eq!(body["error"]["code"], "CONNECTION_FAILED");
}

#[tokio::test]
async fn rate_limit_rejection_is_a_tool_error_result() {
    let echo = spawn_echo_server().await;
    let app = app(&[
        ("REST_BASE_URL", echo.base_url.as_str()),
        ("REST_RATE_LIMIT_MAX", "1"),
    ]);

    let first = app
        .api_manager
        .test_request(json!({"method": "GET", "endpoint": "/one"}))
        .await
        .expect("first");
    assert_eq!(first["isError"], false);

    let second = app
        .api_manager
        .test_request(json!({"method": "GET", "endpoint": "/two"}))
        .await
        .expect("second");
    assert_eq!(second["isError"], true);
    assert_eq!(payload(&second)["error"]["code"], "RATE_LIMITED");

    echo.stop().await;
}

#[cfg(unix)]
#[tokio::test]
async fn dynamic_token_comes_from_the_provider_command() {
    let echo = spawn_echo_server().await;
    let app = app(&[
        ("REST_BASE_URL", echo.base_url.as_str()),
        ("AUTH_TOKEN_PROVIDER", "echo dyn-token-123"),
    ]);

    let body = payload(
        &app.api_manager
            .test_request(json!({"method": "GET", "endpoint": "/secure"}))
            .await
            .expect("result"),
    );
    assert_eq!(body["request"]["authMethod"], "dynamic");
    assert_eq!(
        body["response"]["body"]["headers"]["authorization"],
        "Bearer dyn-token-123"
    );
    assert_eq!(body["request"]["headers"]["Authorization"], "[REDACTED]");

    echo.stop().await;
}

#[tokio::test]
async fn failing_token_provider_is_reported_per_call() {
    let echo = spawn_echo_server().await;
    let app = app(&[
        ("REST_BASE_URL", echo.base_url.as_str()),
        ("AUTH_TOKEN_PROVIDER", "/nonexistent/token-provider"),
        ("REST_DETAILED_ERRORS", "true"),
    ]);

    let result = app
        .api_manager
        .test_request(json!({"method": "GET", "endpoint": "/secure"}))
        .await
        .expect("result");
    assert_eq!(result["isError"], true);
    assert_eq!(payload(&result)["error"]["code"], "AUTH_PROVIDER_FAILED");

    echo.stop().await;
}
