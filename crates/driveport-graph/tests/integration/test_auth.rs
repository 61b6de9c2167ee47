//! Integration tests for the interactive login
//!
//! Drives GraphDriveClient::authenticate() through a scripted presentation
//! context against a mock token endpoint.

use std::sync::Arc;

use chrono::Duration;
use driveport_core::{domain::DriveError, ports::IPresentationContext};
use driveport_graph::auth::AuthState;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{self, LoggingResponder};

async fn mount_code_exchange(server: &wiremock::MockServer) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=abc"))
        .and(body_string_contains("redirect_uri=driveport%3A%2F%2Fauth"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "token_type": "Bearer",
            "access_token": "T1",
            "expires_in": 3600,
            "refresh_token": "R1"
        })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_login_then_list_after_refresh_threshold() {
    let env = common::setup_graph_mock().await;
    mount_code_exchange(&env.server).await;
    common::mount_refresh(&env.server, "R1", "T2", "R2", 1).await;

    Mock::given(method("GET"))
        .and(path(common::children_path("")))
        .and(header("authorization", "Bearer T2"))
        .respond_with(LoggingResponder {
            label: "list",
            log: env.events.clone(),
            template: ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "value": [common::file_item("01A", "notes.txt", 12)]
            })),
        })
        .expect(1)
        .mount(&env.server)
        .await;

    let context: Arc<dyn IPresentationContext> = common::ScriptedPresentation::redirecting("code=abc");
    let t1 = env
        .client
        .authenticate(&context, false)
        .await
        .expect("login should succeed");
    assert_eq!(t1.access_token(), "T1");
    assert_eq!(t1.refresh_token(), "R1");
    assert_eq!(t1.acquired(), common::start());
    assert_eq!(env.client.authenticator().state(), AuthState::Authenticated);

    env.clock.advance(Duration::seconds(4000));
    let items = env
        .client
        .list_folder(&t1, &driveport_core::domain::RemotePath::root())
        .await
        .expect("listing should succeed");

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].item_path.as_str(), "/notes.txt");

    let updates = env.updates();
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0].access_token(), "T1");
    assert_eq!(updates[1].access_token(), "T2");
    assert_eq!(updates[1].acquired(), common::start() + Duration::seconds(4000));

    // The replacement is reported before the listing request is served
    assert_eq!(
        env.events(),
        vec!["token_updated:T1", "token_updated:T2", "list"]
    );
}

#[tokio::test]
async fn test_authorization_request_contents() {
    let env = common::setup_graph_mock().await;
    mount_code_exchange(&env.server).await;

    let scripted = common::ScriptedPresentation::redirecting("code=abc");
    let context: Arc<dyn IPresentationContext> = scripted.clone();
    env.client.authenticate(&context, true).await.unwrap();

    let requests = scripted.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert!(request.ephemeral);
    assert_eq!(request.callback_scheme, "driveport");

    let pairs: std::collections::HashMap<String, String> =
        request.url.query_pairs().into_owned().collect();
    assert_eq!(pairs["response_type"], "code");
    assert_eq!(pairs["redirect_uri"], "driveport://auth");
    assert_eq!(pairs["scope"], "user.read files.readwrite offline_access");
    assert!(!pairs["state"].is_empty());
}

#[tokio::test]
async fn test_login_cancelled_by_user() {
    let env = common::setup_graph_mock().await;
    common::forbid_token_endpoint(&env.server).await;

    let context: Arc<dyn IPresentationContext> = common::ScriptedPresentation::dismissing();
    let err = env.client.authenticate(&context, false).await.unwrap_err();

    assert!(matches!(err, DriveError::CancelledByUser));
    assert_eq!(env.client.authenticator().state(), AuthState::CancelledByUser);
    assert!(env.updates().is_empty());
    assert!(env.client.authenticator().sessions().is_empty());
}

#[tokio::test]
async fn test_login_denied_by_provider() {
    let env = common::setup_graph_mock().await;
    common::forbid_token_endpoint(&env.server).await;

    let context: Arc<dyn IPresentationContext> = common::ScriptedPresentation::redirecting(
        "error=access_denied&error_description=The+user+has+denied+access",
    );
    let err = env.client.authenticate(&context, false).await.unwrap_err();

    assert!(matches!(err, DriveError::ServerSide(msg) if msg == "The user has denied access"));
    assert_eq!(env.client.authenticator().state(), AuthState::Failed);
}

#[tokio::test]
async fn test_code_exchange_rejected() {
    let env = common::setup_graph_mock().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "AADSTS54005: OAuth2 Authorization code was already redeemed"
        })))
        .expect(1)
        .mount(&env.server)
        .await;

    let context: Arc<dyn IPresentationContext> = common::ScriptedPresentation::redirecting("code=abc");
    let err = env.client.authenticate(&context, false).await.unwrap_err();

    assert!(matches!(err, DriveError::ServerSide(msg) if msg.starts_with("AADSTS54005")));
    assert!(env.updates().is_empty());
}
