use super::common::Fixture;
use pathfingerprint::catalog::{CatalogStore, EntityKind};
use pathfingerprint::changes::ReportDestination;
use pathfingerprint::engine::scan;
use pathfingerprint::error::ExitCode;

fn seed(fx: &Fixture) {
    fx.write("a", b"alpha", 1_000);
    fx.write("sub/b", b"beta", 1_000);
    fx.write("other/c", b"gamma", 1_000);
}

#[test]
fn test_cold_run_reports_creates_in_walk_order() {
    let fx = Fixture::new();
    seed(&fx);

    let (outcome, lines) = fx.scan_reporting(100, true);
    assert_eq!(
        lines,
        vec![
            "create path .",
            "create file a",
            "create path other",
            "create file other/c",
            "create path sub",
            "create file sub/b",
        ]
    );
    let report = outcome.report.unwrap();
    assert_eq!(report.written, 6);
    assert_eq!(report.failed, 0);
}

#[test]
fn test_unchanged_tree_reports_nothing() {
    let fx = Fixture::new();
    seed(&fx);
    fx.scan(100);

    let (_, lines) = fx.scan_reporting(200, true);
    assert!(lines.is_empty(), "unexpected changes: {lines:?}");
}

#[test]
fn test_update_reports_file_and_ancestors_only() {
    let fx = Fixture::new();
    seed(&fx);
    fx.write("sub/deeper/d", b"delta", 1_000);
    fx.scan(100);

    fx.write("sub/deeper/d", b"DELTA", 2_000);
    let (_, lines) = fx.scan_reporting(200, true);
    assert_eq!(
        lines,
        vec![
            "update file sub/deeper/d",
            "update path sub/deeper",
            "update path sub",
            "update path .",
        ]
    );
}

#[test]
fn test_new_file_in_existing_directory() {
    let fx = Fixture::new();
    seed(&fx);
    fx.scan(100);

    fx.write("other/new", b"fresh", 1_000);
    let (_, lines) = fx.scan_reporting(200, true);
    assert_eq!(
        lines,
        vec!["create file other/new", "update path other", "update path ."]
    );
}

#[test]
fn test_deleted_file_reported_and_pruned() {
    let fx = Fixture::new();
    seed(&fx);
    fx.scan(100);

    fx.remove("a");
    let (outcome, lines) = fx.scan_reporting(200, true);
    assert_eq!(lines, vec!["update path .", "delete file a"]);
    assert_eq!(outcome.pruned.files, 1);
    assert_eq!(outcome.pruned.paths, 0);

    let (third, lines) = fx.scan_reporting(300, true);
    assert!(lines.is_empty(), "deleted file resurfaced: {lines:?}");
    assert_eq!(third.digest, outcome.digest);

    let mut store = CatalogStore::new(&fx.catalog(), fx.algorithm).with_updates(false);
    store.open().unwrap();
    assert_eq!(store.count(EntityKind::File).unwrap(), 2);
}

#[test]
fn test_deleted_directory_reports_files_then_paths() {
    let fx = Fixture::new();
    seed(&fx);
    fx.write("sub/inner/e", b"epsilon", 1_000);
    fx.scan(100);

    fx.remove("sub");
    let (outcome, lines) = fx.scan_reporting(200, true);
    assert_eq!(
        lines,
        vec![
            "update path .",
            "delete file sub/b",
            "delete file sub/inner/e",
            "delete path sub",
            "delete path sub/inner",
        ]
    );
    assert_eq!(outcome.pruned.files, 2);
    assert_eq!(outcome.pruned.paths, 2);
}

#[test]
fn test_file_replaced_by_directory() {
    let fx = Fixture::new();
    fx.write("x", b"file", 1_000);
    fx.scan(100);

    fx.remove("x");
    fx.write("x/y", b"nested", 1_000);
    let (_, lines) = fx.scan_reporting(200, true);
    assert_eq!(
        lines,
        vec![
            "create path x",
            "create file x/y",
            "update path .",
            "delete file x",
        ]
    );
}

#[test]
fn test_no_report_means_no_summary() {
    let fx = Fixture::new();
    seed(&fx);
    assert!(fx.scan(100).report.is_none());
}

#[test]
fn test_unopenable_report_is_fatal() {
    let fx = Fixture::new();
    seed(&fx);
    let report = fx.state.path().join("missing-dir").join("changes.txt");

    let options = fx
        .options(100, true)
        .with_report(ReportDestination::File(report));
    let err = scan(&options).unwrap_err();
    assert_eq!(err.exit_code(), ExitCode::ReportFailed);
}

#[test]
fn test_small_queue_applies_backpressure_without_loss() {
    let fx = Fixture::new();
    for i in 0..50 {
        fx.write(&format!("f{i:02}"), format!("{i}").as_bytes(), 1_000);
    }

    let report = fx.state.path().join("changes.txt");
    let mut options = fx
        .options(100, true)
        .with_report(ReportDestination::File(report.clone()));
    options.report_queue_depth = 1;
    let outcome = scan(&options).unwrap();

    let content = std::fs::read_to_string(report).unwrap();
    assert_eq!(content.lines().count(), 51);
    assert_eq!(outcome.report.unwrap().written, 51);
    assert_eq!(content.lines().last(), Some("create file f49"));
}
