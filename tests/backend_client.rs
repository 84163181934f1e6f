mod support;

use std::sync::mpsc;
use std::time::Duration;

use covermap::backend::{BackendClient, BackendError, TaskStatus};
use covermap::tasks::{PollSettings, TaskPollMessage, spawn_poll};
use covermap::uploads::{FiberFilingForm, FilingCommon, FilingForm, UploadQueue};
use support::http::{json, serve_sequence};

#[test]
fn get_requests_retry_server_errors() {
    let (base_url, requests) = serve_sequence(vec![
        json("503 Service Unavailable", "{}"),
        json(
            "200 OK",
            r#"[{"id":3,"filename":"fabric.csv","type":"fabric"}]"#,
        ),
    ]);
    let client = BackendClient::new(&base_url).unwrap().with_max_attempts(2);

    let files = client.list_files().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].name, "fabric.csv");
    assert_eq!(files[0].kind.as_deref(), Some("fabric"));
    for _ in 0..2 {
        let request = requests.recv_timeout(Duration::from_secs(1)).unwrap();
        assert!(request.starts_with("GET /api/files"));
    }
}

#[test]
fn unauthorized_is_never_retried() {
    let (base_url, requests) = serve_sequence(vec![json("401 Unauthorized", "{}")]);
    let client = BackendClient::new(&base_url).unwrap();

    let err = client.list_user_tasks().unwrap_err();
    assert!(matches!(err, BackendError::SessionExpired));
    assert_eq!(err.user_message("Load tasks"), "Load tasks failed, please retry (401)");
    requests.recv_timeout(Duration::from_secs(1)).unwrap();
    assert!(requests.recv_timeout(Duration::from_millis(300)).is_err());
}

#[test]
fn task_poll_follows_backend_until_done() {
    let (base_url, _requests) = serve_sequence(vec![
        json("200 OK", r#"[{"id":7,"task_name":"export","status":"running"}]"#),
        json("200 OK", r#"[{"id":7,"task_name":"export","status":"completed"}]"#),
    ]);
    let client = BackendClient::new(&base_url).unwrap().with_max_attempts(1);
    let (tx, rx) = mpsc::channel::<TaskPollMessage>();
    let settings = PollSettings {
        interval: Duration::from_millis(10),
        max_attempts: 5,
    };

    let _handle = spawn_poll(client, 7, settings, tx);
    let first = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(matches!(
        first,
        TaskPollMessage::Progress {
            task_id: 7,
            attempt: 1,
            status: TaskStatus::Running
        }
    ));
    let second = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(matches!(
        second,
        TaskPollMessage::Finished {
            task_id: 7,
            status: TaskStatus::Completed
        }
    ));
}

#[test]
fn fiber_filing_posts_fields_and_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("locations.csv");
    std::fs::write(&path, "location_id,served\n42,true\n").unwrap();
    let mut queue = UploadQueue::new();
    queue.push_path(&path).unwrap();
    let form = FilingForm::Fiber(FiberFilingForm {
        common: FilingCommon {
            provider_id: "130077".to_string(),
            filing_period: "2024-06".to_string(),
            technology_code: "50".to_string(),
            max_download_mbps: 1000,
            max_upload_mbps: 1000,
            low_latency: true,
        },
    });
    let submission = queue.build_submission(&form).unwrap();
    let (base_url, requests) =
        serve_sequence(vec![json("200 OK", r#"{"message":"Filing queued"}"#)]);
    let client = BackendClient::new(&base_url).unwrap();

    let message = client.submit_fiber_form(&submission).unwrap();
    assert_eq!(message, "Filing queued");
    let request = requests.recv_timeout(Duration::from_secs(1)).unwrap();
    assert!(request.starts_with("POST /submit-fiber-form"));
    assert!(request.contains("multipart/form-data; boundary="));
    assert!(request.contains(r#"name="provider_id""#));
    assert!(request.contains("130077"));
    assert!(request.contains(r#"filename="locations.csv""#));
    assert!(request.contains("42,true"));
}
