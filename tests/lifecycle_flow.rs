
use backend_harness::{MockBackendServer, TestResult, client_for, find_free_port};
use event_status::core::client::{EventBackend, EventStatus};
use event_status::core::jobs::process_events;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const PENDING_START: &str = "/events/api/events-status/pending-start/";
const PENDING_FINISH: &str = "/events/api/events-status/pending-finish/";
const COMPLETION: &str = "/analysis/process-event-completion/";

fn accepted(status: &str) -> serde_json::Value {
    json!({"success": true, "status": status, "message": "ok"})
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn full_sweep_starts_finishes_and_requests_completion_in_order() -> TestResult<()> {
    let server = MockBackendServer::start().await?;
    server
        .reply(
            "GET",
            PENDING_START,
            200,
            json!({"results": [
                {"id": 101, "status": "scheduled", "start_date": "2025-03-01T10:00:00"},
                {"id": 102, "status": "scheduled", "start_date": "2025-03-01T10:05:00"}
            ]}),
        )
        .reply("POST", "/events/api/events-status/101/start/", 200, accepted("in_progress"))
        .reply("POST", "/events/api/events-status/102/start/", 200, accepted("in_progress"))
        .reply(
            "GET",
            PENDING_FINISH,
            200,
            json!({"results": [{"id": 201, "status": "in_progress", "end_date": "2025-03-01T09:00:00"}]}),
        )
        .reply("POST", "/events/api/events-status/201/finish/", 200, accepted("completed"))
        .reply(
            "POST",
            COMPLETION,
            200,
            json!({"message": "processing started", "total_participants": 2, "successful": 2, "failed": 0, "results": []}),
        );

    let backend: Arc<dyn EventBackend> = Arc::new(server.client(None, None, Some("tok"))?);
    let report = process_events(backend).await;

    assert_eq!(
        server.request_lines(),
        vec![
            format!("GET {}", PENDING_START),
            "POST /events/api/events-status/101/start/".to_string(),
            "POST /events/api/events-status/102/start/".to_string(),
            format!("GET {}", PENDING_FINISH),
            "POST /events/api/events-status/201/finish/".to_string(),
            format!("POST {}", COMPLETION),
        ]
    );

    let requests = server.requests();
    assert_eq!(requests[5].body, json!({"event_id": 201}));
    assert!(
        requests
            .iter()
            .all(|r| r.authorization.as_deref() == Some("Bearer tok"))
    );

    let start = report.start.expect("start phase ran");
    assert_eq!((start.found, start.succeeded, start.failed), (2, 2, 0));
    let finish = report.finish.expect("finish phase ran");
    assert_eq!((finish.found, finish.succeeded, finish.completion_triggered), (1, 1, 1));

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rejected_finish_skips_completion_processing() -> TestResult<()> {
    let server = MockBackendServer::start().await?;
    server
        .reply("GET", PENDING_START, 200, json!({"results": []}))
        .reply("GET", PENDING_FINISH, 200, json!({"results": [{"id": 7}]}))
        .reply(
            "POST",
            "/events/api/events-status/7/finish/",
            200,
            json!({"success": false, "error": "event is not in progress"}),
        );

    let backend: Arc<dyn EventBackend> = Arc::new(server.client(None, None, None)?);
    let report = process_events(backend).await;

    assert!(!server.request_lines().iter().any(|l| l.contains(COMPLETION)));
    let finish = report.finish.expect("finish phase ran");
    assert_eq!((finish.failed, finish.completion_triggered), (1, 0));

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn listing_failures_yield_empty_batches() -> TestResult<()> {
    let server = MockBackendServer::start().await?;
    server
        .reply("GET", PENDING_START, 500, json!({"detail": "database unavailable"}))
        .reply_raw("GET", PENDING_FINISH, 200, "<html>maintenance</html>");

    let client = server.client(None, None, None)?;
    assert!(client.fetch_due_to_start().await.is_empty());
    assert!(client.fetch_due_to_finish().await.is_empty());

    let backend: Arc<dyn EventBackend> = Arc::new(client);
    let report = process_events(backend).await;
    assert_eq!(report.start.map(|r| r.found), Some(0));
    assert_eq!(report.finish.map(|r| r.found), Some(0));
    assert!(server.request_lines().iter().all(|l| l.starts_with("GET ")));

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn listing_parses_statuses_and_skips_entries_without_id() -> TestResult<()> {
    let server = MockBackendServer::start().await?;
    server.reply(
        "GET",
        PENDING_START,
        200,
        json!({"count": 3, "results": [
            {"id": 1, "status": "programado", "start_date": "2025-03-01T10:00:00"},
            {"title": "no id"},
            {"id": 3, "status": "archived"}
        ]}),
    );

    let client = server.client(None, None, None)?;
    let events = client.fetch_due_to_start().await;
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].id, 1);
    assert_eq!(events[0].status, Some(EventStatus::Scheduled));
    assert_eq!(events[1].id, 3);
    assert_eq!(events[1].status, Some(EventStatus::Unknown));

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn transitions_need_explicit_success() -> TestResult<()> {
    let server = MockBackendServer::start().await?;
    server
        .reply("POST", "/events/api/events-status/1/start/", 200, accepted("in_progress"))
        .reply("POST", "/events/api/events-status/2/start/", 200, json!({"success": false}))
        .reply("POST", "/events/api/events-status/3/start/", 200, json!({"status": "in_progress"}))
        .reply("POST", "/events/api/events-status/4/start/", 400, json!({"error": "bad state"}));

    let client = server.client(None, None, None)?;
    assert!(client.start(1).await);
    assert!(!client.start(2).await);
    assert!(!client.start(3).await);
    assert!(!client.start(4).await);

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn completion_needs_an_acknowledgement_message() -> TestResult<()> {
    let server = MockBackendServer::start().await?;
    server.reply("POST", COMPLETION, 200, json!({"status": "queued"}));

    let client = server.client(None, None, None)?;
    assert!(!client.trigger_completion_processing(9).await);

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn completion_with_participant_failures_still_counts_as_started() -> TestResult<()> {
    let server = MockBackendServer::start().await?;
    server.reply(
        "POST",
        COMPLETION,
        200,
        json!({
            "message": "processing started",
            "total_participants": 2,
            "successful": 1,
            "failed": 1,
            "results": [
                {"success": true, "participant_name": "Ana"},
                {"success": false, "participant_name": "Luis", "error": "no video"}
            ]
        }),
    );

    let client = server.client(None, None, None)?;
    assert!(client.trigger_completion_processing(9).await);
    assert_eq!(server.requests()[0].body, json!({"event_id": 9}));

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unreachable_backend_collapses_to_sentinels() -> TestResult<()> {
    // Nothing listens on a port that was just released.
    let port = find_free_port()?;
    let client = client_for(
        &format!("http://127.0.0.1:{}", port),
        Duration::from_secs(2),
        Some("tok"),
    )?;

    assert!(client.fetch_due_to_start().await.is_empty());
    assert!(client.fetch_due_to_finish().await.is_empty());
    assert!(client.fetch_expired().await.is_empty());
    assert!(!client.start(1).await);
    assert!(!client.finish(1).await);
    assert!(!client.delete(1).await);
    assert!(!client.trigger_completion_processing(1).await);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn slow_backend_times_out_like_any_transport_failure() -> TestResult<()> {
    let server = MockBackendServer::start().await?;
    let slow = Duration::from_millis(1500);
    server
        .reply_after("GET", PENDING_START, slow, 200, r#"{"results": [{"id": 1}]}"#)
        .reply_after(
            "POST",
            "/events/api/events-status/1/start/",
            slow,
            200,
            r#"{"success": true}"#,
        )
        .reply_after("DELETE", "/events/api/events/1", slow, 200, r#"{"success": true}"#)
        .reply_after("POST", COMPLETION, slow, 200, r#"{"message": "ok"}"#);

    let client = server.client_with_timeout(Duration::from_millis(200), Some("tok"))?;
    assert!(client.fetch_due_to_start().await.is_empty());
    assert!(!client.start(1).await);
    assert!(!client.delete(1).await);
    assert!(!client.trigger_completion_processing(1).await);
    assert_eq!(server.requests().len(), 4);

    server.shutdown().await;
    Ok(())
}
