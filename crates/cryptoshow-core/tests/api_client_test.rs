//! Integration tests for job submission and status channels against mock servers.

use cryptoshow_core::{
    ApiClient, ChannelError, Job, JobKind, JobRequest, JobResult, JobStatus, SubmitError,
};
use futures::SinkExt;
use mockito::{Matcher, Server};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

#[tokio::test]
async fn test_submit_pdb_returns_pending_job() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/calculate")
        .match_body(Matcher::Json(serde_json::json!({ "pdb": "2RFC" })))
        .with_status(200)
        .with_body(r#"{"task_id":"task-2rfc"}"#)
        .create();

    let client = ApiClient::new(server.url());
    let job = client.submit(&JobRequest::AnalyzePdb { pdb_id: "2RFC".to_string() }).await.unwrap();

    assert_eq!(job.job_id, "task-2rfc");
    assert_eq!(job.kind, JobKind::Analysis);
    assert_eq!(job.status, JobStatus::Pending);
    mock.assert();
}

#[tokio::test]
async fn test_submit_unknown_pdb_is_rejected_verbatim() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/calculate")
        .with_status(404)
        .with_body(r#"{"error":"PDB ID 9ZZZ not found"}"#)
        .create();

    let client = ApiClient::new(server.url());
    let err = client
        .submit(&JobRequest::AnalyzePdb { pdb_id: "9ZZZ".to_string() })
        .await
        .unwrap_err();

    match err {
        SubmitError::Rejected(text) => assert_eq!(text, "PDB ID 9ZZZ not found"),
        other => panic!("Expected Rejected, got {:?}", other),
    }
}

#[tokio::test]
async fn test_submit_unexpected_status() {
    let mut server = Server::new_async().await;
    let _mock = server.mock("POST", "/calculate").with_status(502).with_body("bad gateway").create();

    let client = ApiClient::new(server.url());
    let err = client
        .submit(&JobRequest::AnalyzePdb { pdb_id: "2RFC".to_string() })
        .await
        .unwrap_err();
    assert!(matches!(err, SubmitError::UnexpectedStatus(502)));
}

#[tokio::test]
async fn test_submit_malformed_body() {
    let mut server = Server::new_async().await;
    let _mock = server.mock("POST", "/calculate").with_status(200).with_body("<html>").create();

    let client = ApiClient::new(server.url());
    let err = client
        .submit(&JobRequest::AnalyzePdb { pdb_id: "2RFC".to_string() })
        .await
        .unwrap_err();
    assert!(matches!(err, SubmitError::Malformed(_)));
}

#[tokio::test]
async fn test_submit_upload_uses_multipart() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/calculate-custom")
        .match_header("content-type", Matcher::Regex("multipart/form-data".to_string()))
        .with_status(200)
        .with_body(r#"{"task_id":"upload-1"}"#)
        .create();

    let client = ApiClient::new(server.url());
    let job = client
        .submit(&JobRequest::AnalyzeUpload {
            file_name: "mine.pdb".to_string(),
            contents: b"ATOM".to_vec(),
        })
        .await
        .unwrap();

    assert_eq!(job.job_id, "upload-1");
    mock.assert();
}

#[tokio::test]
async fn test_submit_comparison_and_animation() {
    let mut server = Server::new_async().await;
    let compare = server
        .mock("POST", "/proxy/ahoj/job")
        .with_status(200)
        .with_body(r#"{"job_id":"ahoj-7"}"#)
        .create();
    let animate = server
        .mock("GET", "/animate/hash1/5xyz.cif/A,B")
        .with_status(200)
        .with_body(r#"{"task_id":"anim-3"}"#)
        .create();

    let client = ApiClient::new(server.url());

    let comparison = client
        .submit(&JobRequest::Compare {
            file_hash: "hash1".to_string(),
            configuration: serde_json::json!({ "queries": "2RFC A LEU 10" }),
        })
        .await
        .unwrap();
    assert_eq!(comparison.job_id, "ahoj-7");
    assert_eq!(comparison.kind, JobKind::Comparison);
    assert_eq!(comparison.file_hash.as_deref(), Some("hash1"));

    let animation = client
        .submit(&JobRequest::Animate {
            file_hash: "hash1".to_string(),
            structure_file: "5xyz.cif".to_string(),
            target_chains: vec!["A".to_string(), "B".to_string()],
        })
        .await
        .unwrap();
    assert_eq!(animation.job_id, "anim-3");
    assert_eq!(animation.kind, JobKind::Animation);

    compare.assert();
    animate.assert();
}

#[tokio::test]
async fn test_animation_submit_requires_success_status() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/animate/hash1/5xyz.cif/A")
        .with_status(500)
        .with_body(r#"{"error":"worker down"}"#)
        .create();

    let client = ApiClient::new(server.url());
    let err = client
        .submit(&JobRequest::Animate {
            file_hash: "hash1".to_string(),
            structure_file: "5xyz.cif".to_string(),
            target_chains: vec!["A".to_string()],
        })
        .await
        .unwrap_err();
    assert!(matches!(err, SubmitError::UnexpectedStatus(500)));
}

#[tokio::test]
async fn test_task_status_decodes_success() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/task-status/t1")
        .with_status(200)
        .with_body(r#"{"status":"SUCCESS","result":{"task_id":"t1","file_hash":"h"}}"#)
        .create();

    let client = ApiClient::new(server.url());
    let update = client.task_status(JobKind::Analysis, "t1").await.unwrap();
    assert_eq!(update.status, JobStatus::Success);
    assert!(matches!(update.result, Some(JobResult::Analysis(_))));
}

#[tokio::test]
async fn test_prime_proxy_tolerates_error_status() {
    let mut server = Server::new_async().await;
    let mock = server.mock("GET", "/proxy/ahoj/hash1/files/5xyz.cif").with_status(404).create();

    let client = ApiClient::new(server.url());
    assert!(client.prime_proxy("hash1", "files/5xyz.cif").await.is_ok());
    mock.assert();
}

#[tokio::test]
async fn test_websocket_channel_end_to_end() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        for frame in [
            r#"{"status":"PENDING"}"#,
            r#"{"status":"PROGRESS","result":{"status":"Predicting"}}"#,
            r#"{"status":"SUCCESS","result":{"trimmed_pdb":"t.pdb","trajectory":"t.xtc"}}"#,
        ] {
            ws.send(Message::Text(frame.into())).await.unwrap();
        }
        // the client closes after the terminal frame; wait for it
        let _ = futures::StreamExt::next(&mut ws).await;
    });

    let client = ApiClient::new("http://localhost/api").with_ws_base(format!("ws://{}", addr));
    let job = Job::new("anim-1", JobKind::Animation);
    let mut channel = client.open_channel(&job).unwrap();

    let mut messages = Vec::new();
    let terminal = loop {
        let update = channel.next().await.unwrap();
        if update.status.is_terminal() {
            break update;
        }
        messages.push(update.message);
    };

    assert_eq!(messages, vec![None, Some("Predicting".to_string())]);
    match terminal.result {
        Some(JobResult::Animation(result)) => {
            assert_eq!(result.trimmed_pdb, "t.pdb");
            assert_eq!(result.trajectory, "t.xtc");
        }
        other => panic!("Expected animation result, got {:?}", other),
    }
    assert!(channel.next().await.is_none());
    assert!(matches!(channel.wait_terminal().await, Err(ChannelError::Closed(_))));
}

#[tokio::test]
async fn test_one_open_channel_per_job() {
    let client = ApiClient::new("http://localhost/api").with_poll_interval(Duration::from_secs(60));
    let job = Job::new("ahoj-7", JobKind::Comparison).with_file_hash("hash1");

    let first = client.open_channel(&job).unwrap();
    assert!(matches!(client.open_channel(&job), Err(ChannelError::AlreadyOpen(ref id)) if id == "ahoj-7"));
    // Clones share the registry
    assert!(matches!(client.clone().open_channel(&job), Err(ChannelError::AlreadyOpen(_))));

    let other = Job::new("ahoj-8", JobKind::Comparison).with_file_hash("hash1");
    let second = client.open_channel(&other).unwrap();

    first.close();
    let reopened = client.open_channel(&job).unwrap();
    assert!(!reopened.is_closed());

    drop(second);
    assert!(client.open_channel(&other).is_ok());
}
