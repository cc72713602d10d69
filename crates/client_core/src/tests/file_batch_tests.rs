use super::*;
use crate::{
    error::ClientError,
    test_support::{FakeApi, Scripted},
};

fn pdfs(names: &[&str]) -> Vec<PendingFile> {
    names
        .iter()
        .map(|name| PendingFile::new(*name, name.as_bytes().to_vec()))
        .collect()
}

fn manager(api: &Arc<FakeApi>) -> (FileBatchManager, BusyGate) {
    let gate = BusyGate::new();
    api.watch_gate(&gate);
    let manager = FileBatchManager::new(
        Arc::clone(api) as Arc<dyn AssistantApi>,
        gate.clone(),
        EventSink::new(),
    );
    (manager, gate)
}

fn overflow(result: Result<usize, WorkflowError>) -> BatchError {
    match result {
        Err(WorkflowError::Batch(err)) => err,
        other => panic!("expected overflow, got {other:?}"),
    }
}

#[test]
fn starts_empty_with_selection_prompt() {
    let (batch, _gate) = manager(&FakeApi::new());
    assert!(batch.is_empty());
    assert_eq!(batch.status(), INITIAL_BATCH_STATUS);
}

#[test]
fn additions_append_in_order() {
    let (batch, _gate) = manager(&FakeApi::new());

    assert_eq!(batch.add_files(pdfs(&["a.pdf", "b.pdf"])).expect("add"), 2);
    assert_eq!(batch.add_files(pdfs(&["c.pdf"])).expect("add"), 3);

    assert_eq!(batch.file_names(), vec!["a.pdf", "b.pdf", "c.pdf"]);
    assert_eq!(batch.status(), "Selected 3 file(s).");
}

#[test]
fn duplicates_are_kept() {
    let (batch, _gate) = manager(&FakeApi::new());
    batch
        .add_files(pdfs(&["same.pdf", "same.pdf"]))
        .expect("duplicates allowed");
    assert_eq!(batch.len(), 2);
}

#[test]
fn six_files_on_empty_batch_are_rejected_whole() {
    let (batch, _gate) = manager(&FakeApi::new());

    let err = overflow(
        batch.add_files(pdfs(&["1.pdf", "2.pdf", "3.pdf", "4.pdf", "5.pdf", "6.pdf"])),
    );

    assert_eq!(
        err,
        BatchError {
            current: 0,
            attempted: 6,
            excess: 1,
            max: MAX_BATCH,
        }
    );
    assert!(batch.is_empty());
    assert_eq!(
        batch.status(),
        "You can only upload a maximum of 5 PDFs. You tried to add 1 more."
    );
}

#[test]
fn overflow_on_partial_batch_mutates_nothing() {
    let (batch, _gate) = manager(&FakeApi::new());
    batch
        .add_files(pdfs(&["a.pdf", "b.pdf", "c.pdf"]))
        .expect("three fit");

    let err = overflow(batch.add_files(pdfs(&["d.pdf", "e.pdf", "f.pdf", "g.pdf"])));

    assert_eq!(err.current, 3);
    assert_eq!(err.attempted, 4);
    assert_eq!(err.excess, 2);
    assert_eq!(batch.file_names(), vec!["a.pdf", "b.pdf", "c.pdf"]);
    assert_eq!(
        batch.status(),
        "You can only upload a maximum of 5 PDFs. You tried to add 2 more."
    );
}

#[test]
fn batch_never_exceeds_cap_across_additions() {
    let (batch, _gate) = manager(&FakeApi::new());
    for round in 0..10 {
        let names: Vec<String> = (0..(round % 3 + 1))
            .map(|i| format!("r{round}-{i}.pdf"))
            .collect();
        let files = names
            .iter()
            .map(|name| PendingFile::new(name.clone(), Vec::new()))
            .collect();
        let before = batch.file_names();
        match batch.add_files(files) {
            Ok(total) => assert_eq!(total, before.len() + names.len()),
            Err(_) => assert_eq!(batch.file_names(), before),
        }
        assert!(batch.len() <= MAX_BATCH);
    }
}

#[test]
fn removal_preserves_order_for_every_index() {
    let names = ["a.pdf", "b.pdf", "c.pdf", "d.pdf", "e.pdf"];
    for index in 0..names.len() {
        let (batch, _gate) = manager(&FakeApi::new());
        batch.add_files(pdfs(&names)).expect("fill");

        let removed = batch
            .remove_file(index)
            .expect("idle")
            .expect("in range");

        let mut expected: Vec<&str> = names.to_vec();
        expected.remove(index);
        assert_eq!(removed.name(), names[index]);
        assert_eq!(batch.file_names(), expected);
        assert_eq!(batch.status(), "Selected 4 file(s).");
    }
}

#[test]
fn out_of_range_removal_is_a_silent_no_op() {
    let (batch, _gate) = manager(&FakeApi::new());
    batch.add_files(pdfs(&["a.pdf"])).expect("add");
    let status = batch.status();

    assert!(batch.remove_file(1).expect("idle").is_none());
    assert_eq!(batch.file_names(), vec!["a.pdf"]);
    assert_eq!(batch.status(), status);
}

#[tokio::test]
async fn empty_submit_fails_fast_without_touching_the_gate() {
    let api = FakeApi::new();
    let (batch, gate) = manager(&api);
    let mut busy_rx = gate.subscribe();

    let err = batch.submit().await.expect_err("nothing staged");

    assert!(matches!(err, WorkflowError::Validation(NO_FILES_SELECTED)));
    assert_eq!(batch.status(), "No files selected!");
    assert_eq!(api.calls(), 0);
    assert!(!busy_rx.has_changed().expect("gate alive"));
}

#[tokio::test]
async fn successful_submit_sends_whole_batch_and_clears_it() {
    let api = FakeApi::new();
    api.script_upload(Scripted::Ok(IngestResponse {
        message: "Successfully processed and added 2 PDFs (a.pdf, b.pdf) to the database."
            .into(),
        chunks_loaded: 17,
    }));
    let (batch, gate) = manager(&api);
    batch.add_files(pdfs(&["a.pdf", "b.pdf"])).expect("add");

    let response = batch.submit().await.expect("upload");

    assert_eq!(response.chunks_loaded, 17);
    assert_eq!(api.uploaded_batches(), vec![vec!["a.pdf", "b.pdf"]]);
    assert!(batch.is_empty());
    assert_eq!(
        batch.status(),
        "Successfully processed and added 2 PDFs (a.pdf, b.pdf) to the database."
    );
    assert!(api.gate_was_held_on_every_call());
    assert!(!gate.is_busy());
}

#[tokio::test]
async fn failed_submit_keeps_batch_and_reports_detail() {
    let api = FakeApi::new();
    api.script_upload(Scripted::Detail(
        400,
        "You can upload a maximum of 5 PDFs at once.",
    ));
    let (batch, gate) = manager(&api);
    batch.add_files(pdfs(&["a.pdf", "b.pdf"])).expect("add");

    let err = batch.submit().await.expect_err("server rejects");

    assert!(matches!(
        err,
        WorkflowError::Request(ClientError::Server { status: 400, .. })
    ));
    assert_eq!(batch.file_names(), vec!["a.pdf", "b.pdf"]);
    assert_eq!(
        batch.status(),
        "Error: You can upload a maximum of 5 PDFs at once."
    );
    assert!(!gate.is_busy());
}

#[tokio::test]
async fn unparseable_failure_reports_unknown_error() {
    let api = FakeApi::new();
    api.script_upload(Scripted::Unparseable(502));
    let (batch, gate) = manager(&api);
    batch.add_files(pdfs(&["a.pdf"])).expect("add");

    assert!(batch.submit().await.is_err());
    assert_eq!(batch.status(), "Error: An unknown error occurred");
    assert_eq!(batch.len(), 1);
    assert!(!gate.is_busy());
}

#[tokio::test]
async fn status_shows_progress_while_upload_is_in_flight() {
    let api = FakeApi::new();
    let release = api.hold_upload();
    let (batch, gate) = manager(&api);
    let batch = Arc::new(batch);
    batch.add_files(pdfs(&["a.pdf"])).expect("add");

    let task = tokio::spawn({
        let batch = Arc::clone(&batch);
        async move { batch.submit().await }
    });
    api.call_started().await;

    assert!(gate.is_busy());
    assert_eq!(batch.status(), "Uploading and processing...");

    let _ = release.send(Scripted::NoDetail(500));
    let outcome = task.await.expect("join");

    assert!(outcome.is_err());
    assert_eq!(batch.status(), "Error: Upload failed");
    assert!(!gate.is_busy());
}

#[tokio::test]
async fn batch_is_frozen_while_upload_is_in_flight() {
    let api = FakeApi::new();
    let release = api.hold_upload();
    let (batch, gate) = manager(&api);
    let batch = Arc::new(batch);
    batch.add_files(pdfs(&["a.pdf"])).expect("add");

    let task = tokio::spawn({
        let batch = Arc::clone(&batch);
        async move { batch.submit().await }
    });
    api.call_started().await;

    assert!(matches!(
        batch.add_files(pdfs(&["late.pdf"])),
        Err(WorkflowError::Busy(_))
    ));
    assert!(matches!(batch.remove_file(0), Err(WorkflowError::Busy(_))));
    assert_eq!(batch.file_names(), vec!["a.pdf"]);

    let _ = release.send(Scripted::Ok(IngestResponse {
        message: "Successfully processed and added 1 PDFs (a.pdf) to the database.".into(),
        chunks_loaded: 3,
    }));
    task.await.expect("join").expect("upload");

    assert_eq!(api.uploaded_batches(), vec![vec!["a.pdf"]]);
    assert!(batch.is_empty());
    assert!(!gate.is_busy());
    assert_eq!(batch.add_files(pdfs(&["late.pdf"])).expect("idle again"), 1);
}

#[tokio::test]
async fn pending_file_reads_name_and_bytes_from_disk() {
    let dir = std::env::temp_dir().join(format!("pending_file_{}", std::process::id()));
    tokio::fs::create_dir_all(&dir).await.expect("dir");
    let path = dir.join("chapter-1.pdf");
    tokio::fs::write(&path, b"%PDF-1.7").await.expect("write");

    let file = PendingFile::from_path(&path).await.expect("read");

    assert_eq!(file.name(), "chapter-1.pdf");
    assert_eq!(file.mime_type(), "application/pdf");
    assert_eq!(file.bytes(), b"%PDF-1.7");
    assert!(PendingFile::from_path(dir.join("missing.pdf")).await.is_err());

    tokio::fs::remove_dir_all(&dir).await.expect("cleanup");
}
