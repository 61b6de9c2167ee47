//! Integration tests for listings, metadata, downloads and drive info

use driveport_core::domain::{DriveError, DriveType, RemotePath};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common;

fn remote(p: &str) -> RemotePath {
    RemotePath::new(p).unwrap()
}

// ============================================================================
// list_folder
// ============================================================================

#[tokio::test]
async fn test_list_root() {
    let env = common::setup_graph_mock().await;
    common::mount_children(
        &env.server,
        "",
        serde_json::json!([
            common::folder_item("F1", "Documents"),
            common::file_item("01A", "photo.jpg", 2_048_576),
        ]),
    )
    .await;

    let items = env
        .client
        .list_folder(&common::token("T0", "R0"), &RemotePath::root())
        .await
        .unwrap();

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].item_id, "F1");
    assert_eq!(items[0].item_path.as_str(), "/Documents");
    assert!(items[0].is_folder);
    assert_eq!(items[0].file_info.size, None);

    assert_eq!(items[1].name(), "photo.jpg");
    assert_eq!(items[1].item_path.as_str(), "/photo.jpg");
    assert!(!items[1].is_folder);
    assert_eq!(items[1].file_info.size, Some(2_048_576));
    assert!(items[1].file_info.created.is_some());
    assert!(items[1].file_info.modified.is_some());
}

#[tokio::test]
async fn test_list_drops_only_entries_without_id_or_name() {
    let env = common::setup_graph_mock().await;
    common::mount_children(
        &env.server,
        "/Docs",
        serde_json::json!([
            common::file_item("01A", "a.txt", 1),
            {"name": "no-id.txt", "size": 5},
            {"id": "01C"},
            common::file_item("01D", "d.txt", 4),
        ]),
    )
    .await;

    let items = env
        .client
        .list_folder(&common::token("T0", "R0"), &remote("/Docs"))
        .await
        .unwrap();

    let names: Vec<&str> = items.iter().map(|i| i.name()).collect();
    assert_eq!(names, vec!["a.txt", "d.txt"]);
    assert_eq!(items[1].item_path.as_str(), "/Docs/d.txt");
}

#[tokio::test]
async fn test_list_encodes_path_segments() {
    let env = common::setup_graph_mock().await;
    Mock::given(method("GET"))
        .and(path("/me/drive/root:/My%20Files/Q%231:/children"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [common::file_item("01A", "plan v2.docx", 10)]
        })))
        .expect(1)
        .mount(&env.server)
        .await;

    let items = env
        .client
        .list_folder(&common::token("T0", "R0"), &remote("/My Files/Q#1"))
        .await
        .unwrap();

    assert_eq!(items[0].item_path.as_str(), "/My Files/Q#1/plan v2.docx");
}

#[tokio::test]
async fn test_list_follows_next_link() {
    let env = common::setup_graph_mock().await;
    Mock::given(method("GET"))
        .and(path(common::children_path("/Big")))
        .and(query_param("$skiptoken", "page2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [common::file_item("02", "second.txt", 2)]
        })))
        .expect(1)
        .mount(&env.server)
        .await;
    Mock::given(method("GET"))
        .and(path(common::children_path("/Big")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [common::file_item("01", "first.txt", 1)],
            "@odata.nextLink": format!(
                "{}{}?$skiptoken=page2",
                env.server.uri(),
                common::children_path("/Big")
            )
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&env.server)
        .await;

    let items = env
        .client
        .list_folder(&common::token("T0", "R0"), &remote("/Big"))
        .await
        .unwrap();

    let ids: Vec<&str> = items.iter().map(|i| i.item_id.as_str()).collect();
    assert_eq!(ids, vec!["01", "02"]);
}

#[tokio::test]
async fn test_list_stops_on_repeating_next_link() {
    let env = common::setup_graph_mock().await;
    let page2 = format!(
        "{}{}?$skiptoken=page2",
        env.server.uri(),
        common::children_path("/Loop")
    );
    Mock::given(method("GET"))
        .and(path(common::children_path("/Loop")))
        .and(query_param("$skiptoken", "page2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [common::file_item("02", "second.txt", 2)],
            "@odata.nextLink": page2
        })))
        .expect(1)
        .mount(&env.server)
        .await;
    Mock::given(method("GET"))
        .and(path(common::children_path("/Loop")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [common::file_item("01", "first.txt", 1)],
            "@odata.nextLink": page2
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&env.server)
        .await;

    let err = env
        .client
        .list_folder(&common::token("T0", "R0"), &remote("/Loop"))
        .await
        .unwrap_err();

    assert!(matches!(err, DriveError::MisformattedResponse(_)));
}

#[tokio::test]
async fn test_list_refuses_next_link_on_foreign_host() {
    let env = common::setup_graph_mock().await;
    let foreign = MockServer::start().await;
    Mock::given(wiremock::matchers::any())
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": []
        })))
        .expect(0)
        .mount(&foreign)
        .await;

    Mock::given(method("GET"))
        .and(path(common::children_path("/Docs")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [common::file_item("01", "first.txt", 1)],
            "@odata.nextLink": format!("{}/me/drive/root:/Docs:/children?$skiptoken=x", foreign.uri())
        })))
        .expect(1)
        .mount(&env.server)
        .await;

    let err = env
        .client
        .list_folder(&common::token("T0", "R0"), &remote("/Docs"))
        .await
        .unwrap_err();

    assert!(matches!(err, DriveError::MisformattedResponse(_)));
}

#[tokio::test]
async fn test_list_error_payload() {
    let env = common::setup_graph_mock().await;
    Mock::given(method("GET"))
        .and(path(common::children_path("/Missing")))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "error": {"code": "itemNotFound", "message": "The resource could not be found."}
        })))
        .mount(&env.server)
        .await;

    let err = env
        .client
        .list_folder(&common::token("T0", "R0"), &remote("/Missing"))
        .await
        .unwrap_err();

    assert!(matches!(err, DriveError::ServerSide(msg) if msg == "The resource could not be found."));
}

#[tokio::test]
async fn test_list_without_value_is_misformatted() {
    let env = common::setup_graph_mock().await;
    Mock::given(method("GET"))
        .and(path(common::children_path("")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": []
        })))
        .mount(&env.server)
        .await;

    let err = env
        .client
        .list_folder(&common::token("T0", "R0"), &RemotePath::root())
        .await
        .unwrap_err();
    assert!(matches!(err, DriveError::MisformattedResponse(_)));
}

#[tokio::test]
async fn test_list_empty_body() {
    let env = common::setup_graph_mock().await;
    Mock::given(method("GET"))
        .and(path(common::children_path("")))
        .respond_with(ResponseTemplate::new(200))
        .mount(&env.server)
        .await;

    let err = env
        .client
        .list_folder(&common::token("T0", "R0"), &RemotePath::root())
        .await
        .unwrap_err();
    assert!(matches!(err, DriveError::EmptyResponse));
}

// ============================================================================
// get_item_metadata
// ============================================================================

#[tokio::test]
async fn test_metadata() {
    let env = common::setup_graph_mock().await;
    Mock::given(method("GET"))
        .and(path("/me/drive/root:/Docs/report.pdf"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(common::file_item("01R", "report.pdf", 4096)),
        )
        .expect(1)
        .mount(&env.server)
        .await;

    let item = env
        .client
        .get_item_metadata(&common::token("T0", "R0"), &remote("/Docs/report.pdf"))
        .await
        .unwrap();

    assert_eq!(item.item_id, "01R");
    assert_eq!(item.item_path.as_str(), "/Docs/report.pdf");
    assert_eq!(item.file_info.size, Some(4096));
}

#[tokio::test]
async fn test_metadata_of_root() {
    let env = common::setup_graph_mock().await;
    Mock::given(method("GET"))
        .and(path("/me/drive/root"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "ROOT",
            "name": "root",
            "folder": {"childCount": 4}
        })))
        .expect(1)
        .mount(&env.server)
        .await;

    let item = env
        .client
        .get_item_metadata(&common::token("T0", "R0"), &RemotePath::root())
        .await
        .unwrap();
    assert!(item.is_folder);
    assert!(item.item_path.is_root());
}

#[tokio::test]
async fn test_metadata_missing_id_or_name_is_misformatted() {
    let env = common::setup_graph_mock().await;
    Mock::given(method("GET"))
        .and(path("/me/drive/root:/no-id.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "no-id.txt"
        })))
        .mount(&env.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me/drive/root:/no-name.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "01X"
        })))
        .mount(&env.server)
        .await;

    let token = common::token("T0", "R0");
    let err = env
        .client
        .get_item_metadata(&token, &remote("/no-id.txt"))
        .await
        .unwrap_err();
    assert!(matches!(err, DriveError::MisformattedResponse(_)));

    let err = env
        .client
        .get_item_metadata(&token, &remote("/no-name.txt"))
        .await
        .unwrap_err();
    assert!(matches!(err, DriveError::MisformattedResponse(_)));
}

// ============================================================================
// download_file
// ============================================================================

#[tokio::test]
async fn test_download_binary() {
    let env = common::setup_graph_mock().await;
    Mock::given(method("GET"))
        .and(path("/me/drive/root:/photo.jpg:/content"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(vec![0xFF, 0xD8, 0xFF, 0xE0])
                .append_header("Content-Type", "image/jpeg"),
        )
        .expect(1)
        .mount(&env.server)
        .await;

    let bytes = env
        .client
        .download_file(&common::token("T0", "R0"), &remote("/photo.jpg"))
        .await
        .unwrap();
    assert_eq!(bytes, vec![0xFF, 0xD8, 0xFF, 0xE0]);
}

#[tokio::test]
async fn test_download_json_error_payload() {
    let env = common::setup_graph_mock().await;
    Mock::given(method("GET"))
        .and(path("/me/drive/root:/big.bin:/content"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"error":{"message":"quota exceeded"}}"#)
                .append_header("Content-Type", "application/json"),
        )
        .mount(&env.server)
        .await;

    let err = env
        .client
        .download_file(&common::token("T0", "R0"), &remote("/big.bin"))
        .await
        .unwrap_err();
    assert!(matches!(err, DriveError::ServerSide(msg) if msg == "quota exceeded"));
}

#[tokio::test]
async fn test_download_plain_json_file() {
    let env = common::setup_graph_mock().await;
    let content = br#"{"theme":"dark","fontSize":12}"#.to_vec();
    Mock::given(method("GET"))
        .and(path("/me/drive/root:/settings.json:/content"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(content.clone())
                .append_header("Content-Type", "application/json"),
        )
        .mount(&env.server)
        .await;

    let bytes = env
        .client
        .download_file(&common::token("T0", "R0"), &remote("/settings.json"))
        .await
        .unwrap();
    assert_eq!(bytes, content);
}

#[tokio::test]
async fn test_download_empty_file() {
    let env = common::setup_graph_mock().await;
    Mock::given(method("GET"))
        .and(path("/me/drive/root:/empty.txt:/content"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&env.server)
        .await;

    let bytes = env
        .client
        .download_file(&common::token("T0", "R0"), &remote("/empty.txt"))
        .await
        .unwrap();
    assert!(bytes.is_empty());
}

#[tokio::test]
async fn test_download_not_found() {
    let env = common::setup_graph_mock().await;
    Mock::given(method("GET"))
        .and(path("/me/drive/root:/gone.txt:/content"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "error": {"code": "itemNotFound", "message": "Item does not exist"}
        })))
        .mount(&env.server)
        .await;

    let err = env
        .client
        .download_file(&common::token("T0", "R0"), &remote("/gone.txt"))
        .await
        .unwrap_err();
    assert!(matches!(err, DriveError::ServerSide(msg) if msg == "Item does not exist"));
}

// ============================================================================
// get_drive_info
// ============================================================================

#[tokio::test]
async fn test_drive_info() {
    let env = common::setup_graph_mock().await;
    Mock::given(method("GET"))
        .and(path(common::DRIVE_ROOT))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "b!drive-001",
            "name": "OneDrive - Contoso",
            "driveType": "business",
            "owner": {"user": {"displayName": "Test User", "email": "test@contoso.com"}},
            "quota": {"total": 1099511627776_u64, "used": 1073741824_u64}
        })))
        .expect(1)
        .mount(&env.server)
        .await;

    let info = env
        .client
        .get_drive_info(&common::token("T0", "R0"))
        .await
        .unwrap();

    assert_eq!(info.id, "b!drive-001");
    assert_eq!(info.name, "OneDrive - Contoso");
    assert_eq!(info.drive_type, DriveType::Business);
    assert_eq!(info.owner_email.as_deref(), Some("test@contoso.com"));
}

#[tokio::test]
async fn test_drive_info_missing_id() {
    let env = common::setup_graph_mock().await;
    Mock::given(method("GET"))
        .and(path(common::DRIVE_ROOT))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "OneDrive"
        })))
        .mount(&env.server)
        .await;

    let err = env
        .client
        .get_drive_info(&common::token("T0", "R0"))
        .await
        .unwrap_err();
    assert!(matches!(err, DriveError::MisformattedResponse(_)));
}
