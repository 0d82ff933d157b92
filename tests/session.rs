mod common;

use futures::FutureExt;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use common::{analysis_payload, report, FakeBackend};
use inspection_analysis::services::cache::CachedAnalysis;
use inspection_analysis::services::session::{
    JOB_FAILED_MESSAGE, NO_FILE_KEY_NOTICE, NO_RESULT_MESSAGE, TIMEOUT_MESSAGE,
};
use inspection_analysis::{
    normalize, AnalysisSession, AnalysisSubject, SessionConfig, SessionState, SessionStatus,
};

fn session(backend: &Arc<FakeBackend>) -> AnalysisSession {
    AnalysisSession::new(backend.clone(), SessionConfig::default())
}

fn subject(id: &str) -> Option<AnalysisSubject> {
    Some(AnalysisSubject::from(id))
}

#[tokio::test]
async fn test_load_without_subject_is_empty() {
    let backend = Arc::new(FakeBackend::new().with_documents(vec![report("a.pdf", "2024-01-01")]));
    let session = session(&backend);

    let state = session.load(None).await;
    assert_eq!(state.status(), SessionStatus::Empty);
    assert!(state.data().is_none());
    assert!(state.error().is_none());

    let state = session.load(subject("   ")).await;
    assert_eq!(state.status(), SessionStatus::Empty);

    assert_eq!(backend.total_calls(), 0);
}

#[tokio::test]
async fn test_cached_subject_resolves_synchronously() {
    let backend = Arc::new(FakeBackend::new());
    let session = session(&backend);
    let cached = normalize(&analysis_payload("Cached")).unwrap();
    session
        .cache()
        .insert(&AnalysisSubject::from("42"), CachedAnalysis::new(cached.clone(), None));

    let state = session
        .load(Some(AnalysisSubject::from(42i64)))
        .now_or_never()
        .expect("cache hit needs no suspension");

    assert_eq!(state.status(), SessionStatus::Ready);
    assert_eq!(state.data(), Some(&cached));
    assert_eq!(backend.total_calls(), 0);
}

#[tokio::test]
async fn test_existing_analysis_skips_job_submission() {
    let backend = Arc::new(
        FakeBackend::new()
            .with_existing(analysis_payload("Existing"))
            .with_documents(vec![report("reports/1.pdf", "2024-03-01")]),
    );
    let session = session(&backend);

    let state = session.load(subject("7")).await;

    assert_eq!(state.status(), SessionStatus::Ready);
    assert_eq!(state.data().unwrap().summary, "Existing");
    assert!(state.error().is_none());
    assert_eq!(state.source().unwrap().storage_key.as_deref(), Some("reports/1.pdf"));
    assert_eq!(backend.submits(), 0);
    assert_eq!(backend.polls(), 0);

    let cached = session.cache().get(&AnalysisSubject::from("7")).unwrap();
    assert_eq!(cached.analysis.summary, "Existing");
}

#[tokio::test(start_paused = true)]
async fn test_job_completes_after_polling() {
    let result = analysis_payload("Fresh analysis");
    let backend = Arc::new(
        FakeBackend::new()
            .with_documents(vec![report("reports/2.pdf", "2024-05-01")])
            .with_polls(vec![
                json!({ "status": "queued" }),
                json!({ "status": "processing", "progress": "Reading page 4" }),
                json!({ "status": "completed", "result": result.clone() }),
            ]),
    );
    let session = session(&backend);

    let state = session.load(subject("9")).await;

    assert_eq!(state.status(), SessionStatus::Ready);
    assert_eq!(state.data(), Some(&normalize(&result).unwrap()));
    assert_eq!(backend.submits(), 1);
    assert_eq!(backend.polls(), 3);
    assert!(session.cache().get(&AnalysisSubject::from("9")).is_some());
}

#[tokio::test(start_paused = true)]
async fn test_job_stuck_processing_times_out() {
    let backend = Arc::new(
        FakeBackend::new()
            .with_documents(vec![report("reports/3.pdf", "2024-05-01")])
            .with_polls(vec![json!({ "status": "processing" })]),
    );
    let session = session(&backend);
    let started = Instant::now();

    let state = session.load(subject("11")).await;

    assert_eq!(state.error(), Some(TIMEOUT_MESSAGE));
    assert!(state.data().is_none());
    assert!(started.elapsed() >= Duration::from_secs(60));
    assert!(started.elapsed() < Duration::from_secs(61));

    // 2.5s cadence inside a 60s window
    let polls = backend.polls();
    assert!((23..=25).contains(&polls), "unexpected poll count {polls}");

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(backend.polls(), polls);
    assert_eq!(session.state(), state);
}

#[tokio::test(start_paused = true)]
async fn test_selects_most_recent_document() {
    let backend = Arc::new(
        FakeBackend::new()
            .with_documents(vec![
                report("reports/january.pdf", "2024-01-01"),
                report("reports/june.pdf", "2024-06-01"),
            ])
            .with_polls(vec![json!({ "status": "completed", "result": analysis_payload("June") })]),
    );
    let session = session(&backend);

    let state = session.load(subject("12")).await;

    assert_eq!(state.status(), SessionStatus::Ready);
    let submitted = backend.submitted.lock();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].storage_key(), Some("reports/june.pdf"));
    assert_eq!(state.source().unwrap().storage_key.as_deref(), Some("reports/june.pdf"));
}

#[tokio::test]
async fn test_document_without_storage_key_is_degraded_empty() {
    let backend = Arc::new(
        FakeBackend::new()
            .with_existing(analysis_payload("Ignored"))
            .with_documents(vec![report("", "2024-06-01")]),
    );
    let session = session(&backend);

    let state = session.load(subject("13")).await;

    assert_eq!(state.status(), SessionStatus::Empty);
    assert_eq!(state.error(), Some(NO_FILE_KEY_NOTICE));
    assert!(state.data().is_none());
    assert_eq!(backend.submits(), 0);
    assert!(session.cache().is_empty());
}

#[tokio::test]
async fn test_no_eligible_document_is_empty() {
    let mut invoice = report("billing/1.pdf", "2024-06-01");
    invoice.category = Some("invoice".to_string());
    let backend = Arc::new(FakeBackend::new().with_documents(vec![invoice]));
    let session = session(&backend);

    let state = session.load(subject("14")).await;

    assert_eq!(
        state,
        SessionState::Empty {
            notice: None,
            source: None
        }
    );
    assert_eq!(backend.submits(), 0);
}

#[tokio::test]
async fn test_refresh_evicts_and_fetches_again() {
    let backend = Arc::new(
        FakeBackend::new()
            .with_existing(analysis_payload("Same"))
            .with_documents(vec![report("reports/4.pdf", "2024-02-01")]),
    );
    let session = session(&backend);

    let first = session.load(subject("15")).await;
    assert_eq!(first.status(), SessionStatus::Ready);
    assert_eq!(backend.fetches(), 1);

    let cached = session.load(subject("15")).await;
    assert_eq!(cached, first);
    assert_eq!(backend.fetches(), 1);

    let refreshed = session.refresh(subject("15")).await;
    assert_eq!(refreshed.status(), SessionStatus::Ready);
    assert_eq!(refreshed.data(), first.data());
    assert_eq!(backend.fetches(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_mid_poll_freezes_state() {
    let backend = Arc::new(
        FakeBackend::new()
            .with_documents(vec![report("reports/5.pdf", "2024-02-01")])
            .with_polls(vec![
                json!({ "status": "processing", "progress": 0.25 }),
                json!({ "status": "processing", "progress": 0.5 }),
                json!({ "status": "completed", "result": analysis_payload("Too late") }),
            ]),
    );
    let session = session(&backend);

    let handle = tokio::spawn({
        let session = session.clone();
        async move { session.load(subject("16")).await }
    });

    tokio::time::sleep(Duration::from_millis(3000)).await;
    session.cancel();
    let frozen = session.state();
    let polls = backend.polls();
    assert_eq!(frozen.status(), SessionStatus::Loading);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(session.state(), frozen);
    assert_eq!(backend.polls(), polls);
    assert!(session.cache().is_empty());

    assert_eq!(handle.await.unwrap(), frozen);
}

#[tokio::test(start_paused = true)]
async fn test_newer_load_supersedes_in_flight_poll() {
    let backend = Arc::new(
        FakeBackend::new()
            .with_documents(vec![report("reports/6.pdf", "2024-02-01")])
            .with_polls(vec![
                json!({ "status": "processing" }),
                json!({ "status": "completed", "result": analysis_payload("Stale") }),
            ]),
    );
    let session = session(&backend);
    session.cache().insert(
        &AnalysisSubject::from("b"),
        CachedAnalysis::new(normalize(&analysis_payload("Subject B")).unwrap(), None),
    );

    let handle = tokio::spawn({
        let session = session.clone();
        async move { session.load(subject("a")).await }
    });
    tokio::time::sleep(Duration::from_secs(1)).await;

    let state = session.load(subject("b")).await;
    assert_eq!(state.data().unwrap().summary, "Subject B");

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(session.state().data().unwrap().summary, "Subject B");
    assert!(session.cache().get(&AnalysisSubject::from("a")).is_none());
    assert_eq!(backend.polls(), 1);

    // The superseded load resolves with the state the newer flow settled in
    let superseded = handle.await.unwrap();
    assert_eq!(superseded.data().unwrap().summary, "Subject B");
}

#[tokio::test(start_paused = true)]
async fn test_refresh_supersedes_same_subject_poll() {
    let backend = Arc::new(
        FakeBackend::new()
            .with_documents(vec![report("reports/16.pdf", "2024-02-01")])
            .with_polls(vec![
                json!({ "status": "processing", "progress": "first flow" }),
                json!({ "status": "processing", "progress": "refreshed flow" }),
                json!({ "status": "completed", "result": analysis_payload("Refreshed") }),
            ]),
    );
    let session = session(&backend);

    let handle = tokio::spawn({
        let session = session.clone();
        async move { session.load(subject("1")).await }
    });
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(backend.polls(), 1);

    // First flow sleeps until 2.5s; the refreshed one polls at 1s and 3.5s
    let refreshed = session.refresh(subject("1")).await;

    assert_eq!(refreshed.data().unwrap().summary, "Refreshed");
    assert_eq!(backend.submits(), 2);
    assert_eq!(backend.polls(), 3);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(backend.polls(), 3);
    assert_eq!(session.state(), refreshed);
    let cached = session.cache().get(&AnalysisSubject::from("1")).unwrap();
    assert_eq!(cached.analysis.summary, "Refreshed");

    assert_eq!(handle.await.unwrap(), refreshed);
}

#[tokio::test(start_paused = true)]
async fn test_loading_state_reports_progress() {
    let backend = Arc::new(
        FakeBackend::new()
            .with_documents(vec![report("reports/7.pdf", "2024-02-01")])
            .with_polls(vec![
                json!({ "status": "processing", "progress": "Reading page 2" }),
                json!({ "status": "completed", "result": analysis_payload("Done") }),
            ]),
    );
    let session = session(&backend);
    let mut updates = session.subscribe();

    let handle = tokio::spawn({
        let session = session.clone();
        async move { session.load(subject("17")).await }
    });
    tokio::time::sleep(Duration::from_secs(1)).await;

    match session.state() {
        SessionState::Loading { job_id, progress } => {
            assert_eq!(job_id.unwrap().as_str(), "job-1");
            assert_eq!(progress.as_deref(), Some("Reading page 2"));
        }
        other => panic!("expected loading, got {other:?}"),
    }
    assert!(updates.has_changed().unwrap());

    let state = handle.await.unwrap();
    assert_eq!(state.status(), SessionStatus::Ready);
    assert_eq!(updates.borrow_and_update().status(), SessionStatus::Ready);
}

#[tokio::test]
async fn test_failed_job_surfaces_its_message() {
    let backend = Arc::new(
        FakeBackend::new()
            .with_documents(vec![report("reports/8.pdf", "2024-02-01")])
            .with_polls(vec![json!({ "status": "failed", "error_message": "PDF is encrypted" })]),
    );
    let state = session(&backend).load(subject("18")).await;

    assert_eq!(state.error(), Some("PDF is encrypted"));
    assert!(state.data().is_none());
}

#[tokio::test]
async fn test_failed_job_without_message_uses_fallback() {
    let backend = Arc::new(
        FakeBackend::new()
            .with_documents(vec![report("reports/9.pdf", "2024-02-01")])
            .with_polls(vec![json!({ "status": "failed" })]),
    );
    let session = session(&backend);

    let state = session.load(subject("19")).await;

    assert_eq!(state.error(), Some(JOB_FAILED_MESSAGE));
    assert!(session.cache().is_empty());
}

#[tokio::test]
async fn test_existing_lookup_failure_still_submits() {
    let backend = Arc::new(
        FakeBackend::new()
            .failing_existing()
            .with_documents(vec![report("reports/10.pdf", "2024-02-01")])
            .with_polls(vec![json!({ "status": "completed", "result": analysis_payload("Recovered") })]),
    );
    let state = session(&backend).load(subject("20")).await;

    assert_eq!(state.status(), SessionStatus::Ready);
    assert_eq!(backend.submits(), 1);
}

#[tokio::test]
async fn test_listing_failure_is_empty_not_error() {
    let backend = Arc::new(
        FakeBackend::new()
            .with_existing(analysis_payload("Unreachable"))
            .failing_documents(),
    );
    let state = session(&backend).load(subject("21")).await;

    assert_eq!(state.status(), SessionStatus::Empty);
    assert!(state.error().is_none());
}

#[tokio::test]
async fn test_submit_failure_is_error() {
    let backend = Arc::new(
        FakeBackend::new()
            .with_documents(vec![report("reports/11.pdf", "2024-02-01")])
            .failing_submit("queue is full"),
    );
    let state = session(&backend).load(subject("22")).await;

    assert_eq!(state.status(), SessionStatus::Error);
    assert!(state.error().unwrap().contains("queue is full"));
    assert_eq!(backend.polls(), 0);
}

#[tokio::test]
async fn test_malformed_result_is_error() {
    let backend = Arc::new(
        FakeBackend::new()
            .with_documents(vec![report("reports/12.pdf", "2024-02-01")])
            .with_polls(vec![json!({ "status": "completed", "result": ["not", "an", "object"] })]),
    );
    let session = session(&backend);

    let state = session.load(subject("23")).await;

    assert_eq!(state.status(), SessionStatus::Error);
    assert!(state.error().unwrap().contains("JSON object"));
    assert!(session.cache().is_empty());
}

#[tokio::test]
async fn test_completed_without_result_fetches_existing() {
    let backend = Arc::new(
        FakeBackend::new()
            .with_existing_after_submit(analysis_payload("Stored by job"))
            .with_documents(vec![report("reports/13.pdf", "2024-02-01")])
            .with_polls(vec![json!({ "status": "completed" })]),
    );
    let state = session(&backend).load(subject("24")).await;

    assert_eq!(state.data().unwrap().summary, "Stored by job");
    assert_eq!(backend.fetches(), 2);
}

#[tokio::test]
async fn test_completed_without_any_result_is_error() {
    let backend = Arc::new(
        FakeBackend::new()
            .with_documents(vec![report("reports/14.pdf", "2024-02-01")])
            .with_polls(vec![json!({ "status": "completed" })]),
    );
    let state = session(&backend).load(subject("25")).await;

    assert_eq!(state.error(), Some(NO_RESULT_MESSAGE));
}

#[tokio::test]
async fn test_sessions_sharing_a_cache() {
    let backend = Arc::new(
        FakeBackend::new()
            .with_existing(analysis_payload("Shared"))
            .with_documents(vec![report("reports/15.pdf", "2024-02-01")]),
    );
    let first = session(&backend);
    let second = AnalysisSession::with_cache(
        backend.clone(),
        first.cache().clone(),
        SessionConfig::default(),
    );

    first.load(subject("26")).await;
    let state = second.load(subject("26")).await;

    assert_eq!(state.status(), SessionStatus::Ready);
    assert_eq!(backend.fetches(), 1);
}
