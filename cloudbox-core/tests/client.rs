use cloudbox_core::{
    CloudboxClient, CloudboxError, ContextSync, CreateSessionRequest, PersistenceData, SyncMode,
    SyncPolicy, decode_context_status,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn get_session_includes_bearer_header() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/sessions/sess-1"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "requestId": "req-1",
            "success": true,
            "data": { "sessionId": "sess-1", "status": "RUNNING" }
        })))
        .mount(&server)
        .await;

    let client = CloudboxClient::with_base_url(&server.uri(), "test-key").unwrap();
    let response = client.get_session("sess-1").await.unwrap();

    assert!(response.success);
    assert_eq!(response.request_id, "req-1");
    assert_eq!(response.http_status_code, Some(200));
    let data = response.data.expect("session data");
    assert_eq!(data.session_id, "sess-1");
    assert_eq!(data.status, "RUNNING");
}

#[tokio::test]
async fn pause_session_decodes_failure_envelope_on_error_status() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/sessions/missing/pause"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "requestId": "req-404",
            "success": false,
            "code": "InvalidSession",
            "message": "Session not found"
        })))
        .mount(&server)
        .await;

    let client = CloudboxClient::with_base_url(&server.uri(), "test-key").unwrap();
    let response = client.pause_session_async("missing").await.unwrap();

    assert!(!response.success);
    assert_eq!(response.code.as_deref(), Some("InvalidSession"));
    assert_eq!(response.http_status_code, Some(404));
    assert_eq!(response.error_message(), "InvalidSession: Session not found");
}

#[tokio::test]
async fn resume_session_keeps_reported_http_status_code() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/sessions/sess-1/resume"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "requestId": "req-2",
            "success": false,
            "code": "Throttled",
            "message": "slow down",
            "httpStatusCode": 429
        })))
        .mount(&server)
        .await;

    let client = CloudboxClient::with_base_url(&server.uri(), "test-key").unwrap();
    let response = client.resume_session_async("sess-1").await.unwrap();

    assert_eq!(response.http_status_code, Some(429));
}

#[tokio::test]
async fn non_envelope_error_is_api_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/sessions/sess-1/pause"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    let client = CloudboxClient::with_base_url(&server.uri(), "test-key").unwrap();
    let err = client.pause_session_async("sess-1").await.unwrap_err();

    assert!(matches!(err, CloudboxError::Api { .. }));
    assert!(err.to_string().contains("upstream unavailable"));
}

#[tokio::test]
async fn json_error_without_code_or_message_keeps_raw_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/sessions/sess-1/pause"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({ "error": "database down" })),
        )
        .mount(&server)
        .await;

    let client = CloudboxClient::with_base_url(&server.uri(), "test-key").unwrap();
    let err = client.pause_session_async("sess-1").await.unwrap_err();

    match &err {
        CloudboxError::Api { status, body } => {
            assert_eq!(status.as_u16(), 500);
            assert!(body.contains("database down"));
        }
        other => panic!("expected api error, got {other:?}"),
    }
    assert!(err.to_string().contains("database down"));
}

#[tokio::test]
async fn sync_context_sends_optional_filters() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/sessions/sess-1/context/sync"))
        .and(query_param("contextId", "ctx-1"))
        .and(query_param("path", "/home/user/data"))
        .and(query_param("mode", "upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "requestId": "req-sync",
            "success": true
        })))
        .mount(&server)
        .await;

    let client = CloudboxClient::with_base_url(&server.uri(), "test-key").unwrap();
    let response = client
        .sync_context(
            "sess-1",
            Some("ctx-1"),
            Some("/home/user/data"),
            Some(SyncMode::Upload),
        )
        .await
        .unwrap();

    assert!(response.success);
    assert_eq!(response.request_id, "req-sync");
}

#[tokio::test]
async fn get_context_info_returns_raw_status_string() {
    let server = MockServer::start().await;
    let items = json!([{
        "contextId": "ctx-1",
        "path": "/home/user",
        "taskType": "download",
        "status": "Success",
        "startTime": 1,
        "finishTime": 2
    }]);

    Mock::given(method("GET"))
        .and(path("/v1/sessions/sess-1/context/info"))
        .and(query_param("taskType", "download"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "requestId": "req-info",
            "success": true,
            "data": {
                "contextStatus": json!([{ "type": "data", "data": items.to_string() }]).to_string()
            }
        })))
        .mount(&server)
        .await;

    let client = CloudboxClient::with_base_url(&server.uri(), "test-key").unwrap();
    let response = client
        .get_context_info("sess-1", None, None, Some("download"))
        .await
        .unwrap();

    let raw = response.data.and_then(|data| data.context_status);
    let decoded = decode_context_status(raw.as_deref()).into_items();
    assert_eq!(decoded.len(), 1);
    assert_eq!(decoded[0].task_type, "download");
}

#[tokio::test]
async fn create_session_serializes_context_policies() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/sessions"))
        .and(body_partial_json(json!({
            "imageId": "linux_latest",
            "persistenceDataList": [{ "contextId": "ctx-1", "path": "/home/user" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "requestId": "req-create",
            "success": true,
            "data": { "sessionId": "sess-new", "status": "RUNNING" }
        })))
        .mount(&server)
        .await;

    let sync = ContextSync::new("ctx-1", "/home/user", Some(SyncPolicy::default())).unwrap();
    let persistence = PersistenceData::try_from(&sync).unwrap();
    let policy: SyncPolicy =
        serde_json::from_str(persistence.policy.as_deref().expect("policy string")).unwrap();
    assert_eq!(policy, SyncPolicy::default());

    let request = CreateSessionRequest {
        image_id: Some("linux_latest".to_string()),
        persistence_data_list: vec![persistence],
        ..Default::default()
    };
    let client = CloudboxClient::with_base_url(&server.uri(), "test-key").unwrap();
    let response = client.create_session(&request).await.unwrap();

    assert_eq!(response.data.unwrap().session_id, "sess-new");
}

#[tokio::test]
async fn delete_session_uses_delete() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/v1/sessions/sess-1"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "requestId": "req-del",
            "success": true
        })))
        .mount(&server)
        .await;

    let client = CloudboxClient::with_base_url(&server.uri(), "test-key").unwrap();
    let response = client.delete_session("sess-1").await.unwrap();

    assert!(response.success);
}
