mod support;

use std::collections::HashMap;

use chrono::{Duration, NaiveDate, Utc};
use uuid::Uuid;
use windcrew_parser::EntryKind;

use support::{parse_result, parsed_row, MemoryStore};
use windcrew_core::import::{
    run_import, sweep_stale_batches, DuplicatePolicy, ImportRequest,
};
use windcrew_core::store::TimesheetStore;
use windcrew_core::types::{BatchStatus, PersonnelStatus};

fn day(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
}

fn request(policy: DuplicatePolicy, mappings: HashMap<String, Uuid>) -> ImportRequest {
    ImportRequest {
        org_id: Uuid::from_u128(1),
        uploaded_by: None,
        file_name: "puantaj-mart.xlsx".to_string(),
        policy,
        mappings,
    }
}

#[tokio::test]
async fn imports_rows_and_creates_personnel() {
    let store = MemoryStore::new();
    let parse = parse_result(vec![
        parsed_row("E100", "Ali Veli", day(5), EntryKind::OnSite, "ODO-042"),
        parsed_row("E100", "Ali Veli", day(6), EntryKind::OnSite, "ODO-042"),
        parsed_row("E101", "Ayşe Kaya", day(5), EntryKind::Standby, ""),
    ]);

    let summary = run_import(&store, &parse, request(DuplicatePolicy::Skip, HashMap::new()))
        .await
        .expect("import runs");

    assert_eq!(summary.total_rows, 3);
    assert_eq!(summary.imported_rows, 3);
    assert_eq!(summary.new_personnel, 2);
    assert_eq!(summary.skipped_rows, 0);
    assert_eq!(summary.status, BatchStatus::Completed);
    assert!(summary.errors.is_empty());

    assert_eq!(store.entry_count(), 3);
    assert_eq!(store.personnel().len(), 2);

    let batch = store.batch(summary.batch_id).expect("batch persisted");
    assert_eq!(batch.status, BatchStatus::Completed);
    assert_eq!(batch.imported_rows, 3);
    assert_eq!(batch.period_start, Some(day(5)));
    assert_eq!(batch.period_end, Some(day(6)));
}

#[tokio::test]
async fn reimport_with_skip_policy_is_idempotent() {
    let store = MemoryStore::new();
    let parse = parse_result(vec![
        parsed_row("E100", "Ali Veli", day(5), EntryKind::OnSite, ""),
        parsed_row("E101", "Ayşe Kaya", day(5), EntryKind::OnSite, ""),
    ]);

    run_import(&store, &parse, request(DuplicatePolicy::Skip, HashMap::new()))
        .await
        .expect("first import");
    let before = store.entry_count();

    let second = run_import(&store, &parse, request(DuplicatePolicy::Skip, HashMap::new()))
        .await
        .expect("second import");

    assert_eq!(store.entry_count(), before);
    assert_eq!(second.imported_rows, 0);
    assert_eq!(second.skipped_rows, 2);
    assert_eq!(second.new_personnel, 0);
    assert_eq!(second.status, BatchStatus::Completed);
}

#[tokio::test]
async fn reimport_with_overwrite_leaves_one_entry_per_person_day() {
    let store = MemoryStore::new();
    let parse = parse_result(vec![
        parsed_row("E100", "Ali Veli", day(5), EntryKind::OnSite, ""),
        parsed_row("E100", "Ali Veli", day(6), EntryKind::Travel, ""),
    ]);

    run_import(&store, &parse, request(DuplicatePolicy::Overwrite, HashMap::new()))
        .await
        .expect("first import");
    let second = run_import(&store, &parse, request(DuplicatePolicy::Overwrite, HashMap::new()))
        .await
        .expect("second import");

    assert_eq!(second.imported_rows, 2);
    assert_eq!(store.entry_count(), 2);

    // Every surviving entry belongs to the second batch.
    for (_, entry) in store.entries() {
        assert_eq!(entry.import_batch_id, second.batch_id);
    }
}

#[tokio::test]
async fn unmapped_project_rows_import_without_project() {
    let store = MemoryStore::new();
    let parse = parse_result(vec![parsed_row(
        "E100",
        "Ali Veli",
        day(5),
        EntryKind::OnSite,
        "ODO-UNMAPPED",
    )]);

    let summary = run_import(&store, &parse, request(DuplicatePolicy::Skip, HashMap::new()))
        .await
        .expect("import runs");

    assert_eq!(summary.imported_rows, 1);
    let entries = store.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].1.project_id, None);
    assert_eq!(
        entries[0].1.source_project_code.as_deref(),
        Some("ODO-UNMAPPED")
    );
}

#[tokio::test]
async fn confirmed_mappings_are_upserted_and_applied() {
    let store = MemoryStore::new();
    let project_id = Uuid::from_u128(42);
    let parse = parse_result(vec![parsed_row(
        "E100",
        "Ali Veli",
        day(5),
        EntryKind::OnSite,
        "ODO-042",
    )]);

    let mappings = HashMap::from([("ODO-042".to_string(), project_id)]);
    run_import(&store, &parse, request(DuplicatePolicy::Skip, mappings))
        .await
        .expect("import runs");

    let entries = store.entries();
    assert_eq!(entries[0].1.project_id, Some(project_id));

    let stored_mappings = store.mappings();
    assert_eq!(stored_mappings.len(), 1);
    assert_eq!(stored_mappings[0].source_code, "ODO-042");
    assert_eq!(stored_mappings[0].source_name, "Project ODO-042");
    assert_eq!(stored_mappings[0].project_id, project_id);
}

#[tokio::test]
async fn row_errors_are_bounded_and_majority_failure_fails_the_batch() {
    let store = MemoryStore::new();
    let rows: Vec<_> = (1..=25)
        .map(|n| parsed_row("E100", "Ali Veli", day(n), EntryKind::OnSite, ""))
        .collect();
    for n in 1..=25 {
        store.fail_inserts_on(day(n));
    }
    let parse = parse_result(rows);

    let summary = run_import(&store, &parse, request(DuplicatePolicy::Skip, HashMap::new()))
        .await
        .expect("import completes despite row failures");

    assert_eq!(summary.imported_rows, 0);
    assert_eq!(summary.skipped_rows, 25);
    assert_eq!(summary.errors.len(), 20);
    assert_eq!(summary.status, BatchStatus::Failed);

    let batch = store.batch(summary.batch_id).expect("batch persisted");
    assert_eq!(batch.status, BatchStatus::Failed);
    assert_eq!(batch.errors.len(), 20);
}

#[tokio::test]
async fn majority_success_completes_with_errors() {
    let store = MemoryStore::new();
    store.fail_inserts_on(day(9));
    let parse = parse_result(vec![
        parsed_row("E100", "Ali Veli", day(5), EntryKind::OnSite, ""),
        parsed_row("E100", "Ali Veli", day(6), EntryKind::OnSite, ""),
        parsed_row("E100", "Ali Veli", day(9), EntryKind::OnSite, ""),
    ]);

    let summary = run_import(&store, &parse, request(DuplicatePolicy::Skip, HashMap::new()))
        .await
        .expect("import runs");

    assert_eq!(summary.imported_rows, 2);
    assert_eq!(summary.skipped_rows, 1);
    assert_eq!(summary.errors.len(), 1);
    assert!(summary.errors[0].contains("Ali Veli"));
    assert_eq!(summary.status, BatchStatus::Completed);
}

#[tokio::test]
async fn status_derives_from_latest_entry_by_date() {
    let store = MemoryStore::new();
    let org_id = Uuid::from_u128(1);
    let project_id = Uuid::from_u128(42);

    // Recent on-site entry first.
    let recent = parse_result(vec![parsed_row(
        "E100",
        "Ali Veli",
        day(10),
        EntryKind::OnSite,
        "ODO-042",
    )]);
    let mappings = HashMap::from([("ODO-042".to_string(), project_id)]);
    run_import(&store, &recent, request(DuplicatePolicy::Skip, mappings))
        .await
        .expect("recent import");

    let person = store
        .find_personnel(org_id, "E100")
        .await
        .expect("lookup works")
        .expect("person exists");
    assert_eq!(person.status, PersonnelStatus::OnSite);
    assert_eq!(person.current_project_id, Some(project_id));

    // Importing strictly older data must not change the derived status.
    let historical = parse_result(vec![parsed_row(
        "E100",
        "Ali Veli",
        day(1),
        EntryKind::DayOff,
        "",
    )]);
    run_import(&store, &historical, request(DuplicatePolicy::Skip, HashMap::new()))
        .await
        .expect("historical import");

    let person = store
        .find_personnel(org_id, "E100")
        .await
        .expect("lookup works")
        .expect("person exists");
    assert_eq!(person.status, PersonnelStatus::OnSite);

    // A newer leave entry does supersede it.
    let newer = parse_result(vec![parsed_row(
        "E100",
        "Ali Veli",
        day(20),
        EntryKind::AnnualLeave,
        "",
    )]);
    run_import(&store, &newer, request(DuplicatePolicy::Skip, HashMap::new()))
        .await
        .expect("newer import");

    let person = store
        .find_personnel(org_id, "E100")
        .await
        .expect("lookup works")
        .expect("person exists");
    assert_eq!(person.status, PersonnelStatus::Leave);
}

#[tokio::test]
async fn sweep_finalizes_only_stale_processing_batches() {
    let store = MemoryStore::new();

    // A finished import: terminal, must not be touched.
    let parse = parse_result(vec![parsed_row(
        "E100",
        "Ali Veli",
        day(5),
        EntryKind::OnSite,
        "",
    )]);
    let done = run_import(&store, &parse, request(DuplicatePolicy::Skip, HashMap::new()))
        .await
        .expect("import runs");
    store.backdate_batch(done.batch_id, Utc::now() - Duration::hours(48));

    // An orphan stuck in processing.
    let orphan_id = store
        .create_import_batch(&windcrew_core::types::NewImportBatch {
            org_id: Uuid::from_u128(1),
            uploaded_by: None,
            file_name: "crashed.xlsx".to_string(),
            period_start: None,
            period_end: None,
            total_rows: 10,
        })
        .await
        .expect("batch created");
    store.backdate_batch(orphan_id, Utc::now() - Duration::hours(48));

    // A fresh import still running: too young to sweep.
    let fresh_id = store
        .create_import_batch(&windcrew_core::types::NewImportBatch {
            org_id: Uuid::from_u128(1),
            uploaded_by: None,
            file_name: "running.xlsx".to_string(),
            period_start: None,
            period_end: None,
            total_rows: 10,
        })
        .await
        .expect("batch created");

    let swept = sweep_stale_batches(&store, Duration::hours(24))
        .await
        .expect("sweep runs");

    assert_eq!(swept, 1);
    assert_eq!(
        store.batch(orphan_id).unwrap().status,
        BatchStatus::Failed
    );
    assert_eq!(
        store.batch(fresh_id).unwrap().status,
        BatchStatus::Processing
    );
    assert_eq!(
        store.batch(done.batch_id).unwrap().status,
        BatchStatus::Completed
    );
}

#[tokio::test]
async fn deleting_a_batch_removes_exactly_its_entries() {
    let store = MemoryStore::new();
    let first = parse_result(vec![parsed_row(
        "E100",
        "Ali Veli",
        day(5),
        EntryKind::OnSite,
        "",
    )]);
    let second = parse_result(vec![parsed_row(
        "E101",
        "Ayşe Kaya",
        day(6),
        EntryKind::OnSite,
        "",
    )]);

    let first_summary = run_import(&store, &first, request(DuplicatePolicy::Skip, HashMap::new()))
        .await
        .expect("first import");
    run_import(&store, &second, request(DuplicatePolicy::Skip, HashMap::new()))
        .await
        .expect("second import");
    assert_eq!(store.entry_count(), 2);

    store
        .delete_import_batch(first_summary.batch_id)
        .await
        .expect("delete batch");

    let remaining = store.entries();
    assert_eq!(remaining.len(), 1);
    assert_ne!(remaining[0].1.import_batch_id, first_summary.batch_id);
    assert!(store.batch(first_summary.batch_id).is_none());
}
