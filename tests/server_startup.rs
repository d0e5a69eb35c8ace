//! HTTP surface: health, call init and authentication

mod fixtures;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use serde_json::Value;
use tower::ServiceExt;

use fixtures::*;
use voicebot_gateway::config::AuthApiSecret;
use voicebot_gateway::{AppState, ServerConfig, create_app};

fn app(config: ServerConfig) -> axum::Router {
    let doubles = Doubles::default();
    create_app(AppState::with_collaborators(config, doubles.collaborators()))
}

fn public_config() -> ServerConfig {
    let mut config = test_config();
    config.public_url = Some("wss://bot.example.com/".to_string());
    config
}

async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let response = app(test_config())
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "OK");
    assert_eq!(body["active_sessions"], 0);
}

#[tokio::test]
async fn test_init_from_query() {
    let response = app(public_config())
        .oneshot(
            Request::builder()
                .uri("/voicebot/init?call_sid=CA1&from=%2B15550001&to=%2B15550002")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await["websocket_url"],
        "wss://bot.example.com/was?sample-rate=16000&call_sid=CA1&from=%2B15550001&to=%2B15550002"
    );
}

#[tokio::test]
async fn test_init_from_json_body() {
    let response = app(public_config())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/voicebot/init")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"callLogId":"log-7","from":"100"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await["websocket_url"],
        "wss://bot.example.com/was?sample-rate=16000&call_sid=log-7&from=100"
    );
}

#[tokio::test]
async fn test_init_from_form_body() {
    let response = app(public_config())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/voicebot/init")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("CallSid=CA9&From=%2B1555&To=%2B1666"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await["websocket_url"],
        "wss://bot.example.com/was?sample-rate=16000&call_sid=CA9&from=%2B1555&to=%2B1666"
    );
}

#[tokio::test]
async fn test_init_without_call_id_is_rejected() {
    let response = app(public_config())
        .oneshot(
            Request::builder()
                .uri("/voicebot/init?from=100")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(
        json_body(response).await["error"]
            .as_str()
            .unwrap()
            .contains("call_sid")
    );
}

#[tokio::test]
async fn test_init_requires_auth_when_enabled() {
    let mut config = public_config();
    config.auth_required = true;
    config.auth_api_secrets = vec![AuthApiSecret {
        id: "carrier".to_string(),
        secret: "s3cret".to_string(),
    }];
    let app = app(config);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/voicebot/init?call_sid=CA1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/voicebot/init?call_sid=CA1")
                .header(header::AUTHORIZATION, "Bearer s3cret")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Health stays public
    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_upgrade_route_rejects_plain_get() {
    let response = app(test_config())
        .oneshot(
            Request::builder()
                .uri("/was?call_sid=CA1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(response.status().is_client_error());
}
