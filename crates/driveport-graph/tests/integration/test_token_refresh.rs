//! Integration tests for the silent refresh in front of every operation

use chrono::Duration;
use driveport_core::domain::{DriveError, RemotePath};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{self, LoggingResponder};

#[tokio::test]
async fn test_fresh_token_is_used_as_is() {
    let env = common::setup_graph_mock().await;
    common::forbid_token_endpoint(&env.server).await;

    Mock::given(method("GET"))
        .and(path(common::children_path("/Docs")))
        .and(header("authorization", "Bearer T0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": []
        })))
        .expect(1)
        .mount(&env.server)
        .await;

    env.clock.advance(Duration::seconds(1799));
    let items = env
        .client
        .list_folder(&common::token("T0", "R0"), &RemotePath::new("/Docs").unwrap())
        .await
        .unwrap();

    assert!(items.is_empty());
    assert!(env.updates().is_empty());
}

#[tokio::test]
async fn test_fresh_token_check_returns_input_unchanged() {
    let env = common::setup_graph_mock().await;
    common::forbid_token_endpoint(&env.server).await;

    let original = common::token("T0", "R0");
    let fresh = env.client.fresh_token(&original).await.unwrap();
    assert_eq!(fresh, original);
}

#[tokio::test]
async fn test_stale_token_is_refreshed_exactly_once() {
    let env = common::setup_graph_mock().await;
    common::mount_refresh(&env.server, "R0", "T1", "R1", 1).await;

    Mock::given(method("GET"))
        .and(path(common::DRIVE_ROOT))
        .and(header("authorization", "Bearer T1"))
        .respond_with(LoggingResponder {
            label: "drive",
            log: env.events.clone(),
            template: ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "drive-001",
                "name": "OneDrive",
                "driveType": "personal"
            })),
        })
        .expect(1)
        .mount(&env.server)
        .await;

    env.clock.advance(Duration::seconds(1800));
    let info = env
        .client
        .get_drive_info(&common::token("T0", "R0"))
        .await
        .unwrap();
    assert_eq!(info.id, "drive-001");

    let updates = env.updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].access_token(), "T1");
    assert_eq!(updates[0].refresh_token(), "R1");
    assert_eq!(updates[0].acquired(), common::start() + Duration::seconds(1800));
    assert_eq!(env.events(), vec!["token_updated:T1", "drive"]);
}

#[tokio::test]
async fn test_stale_token_without_refresh_token() {
    let env = common::setup_graph_mock().await;
    common::forbid_token_endpoint(&env.server).await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&env.server)
        .await;

    env.clock.advance(Duration::seconds(4000));
    let err = env
        .client
        .get_item_metadata(&common::token("T0", ""), &RemotePath::new("/a.txt").unwrap())
        .await
        .unwrap_err();

    assert!(matches!(err, DriveError::CannotRefreshToken));
    assert!(err.requires_login());
    assert!(env.updates().is_empty());
}

#[tokio::test]
async fn test_refresh_failure_stops_the_call() {
    let env = common::setup_graph_mock().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "The refresh token has expired due to inactivity."
        })))
        .expect(1)
        .mount(&env.server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&env.server)
        .await;

    env.clock.advance(Duration::seconds(4000));
    let err = env
        .client
        .download_file(&common::token("T0", "R0"), &RemotePath::new("/a.txt").unwrap())
        .await
        .unwrap_err();

    assert!(
        matches!(err, DriveError::ServerSide(msg) if msg == "The refresh token has expired due to inactivity.")
    );
    assert!(env.updates().is_empty());
}
