use super::common::{mtime_of, set_mtime, Fixture};
use pathfingerprint::catalog::{CatalogStore, EntityKind, PathDescriptor};
use pathfingerprint::digest::DigestAlgorithm;
use pathfingerprint::error::ExitCode;

fn open(fx: &Fixture) -> CatalogStore {
    let mut store = CatalogStore::new(&fx.catalog(), fx.algorithm).with_updates(false);
    store.open().unwrap();
    store
}

#[test]
fn test_warm_scan_reads_nothing() {
    let fx = Fixture::new();
    fx.write("a", b"alpha", 1_000);
    fx.write("d/b", b"beta", 1_000);
    fx.write("d/e/c", b"gamma", 1_000);

    let cold = fx.scan(100);
    assert_eq!(cold.summary.files_hashed, 3);
    assert_eq!(cold.summary.files_reused, 0);

    let warm = fx.scan(200);
    assert_eq!(warm.digest, cold.digest);
    assert_eq!(warm.summary.files_hashed, 0);
    assert_eq!(warm.summary.files_reused, 3);
    assert_eq!(warm.summary.bytes_read, 0);
}

#[test]
fn test_catalog_is_trusted_while_mtime_matches() {
    let fx = Fixture::new();
    fx.write("f", b"original", 1_000);
    let first = fx.scan(100);

    // Same mtime, different bytes: the stored digest wins.
    fx.write("f", b"tampered", 1_000);
    let second = fx.scan(200);
    assert_eq!(second.digest, first.digest);
    assert_eq!(second.summary.files_hashed, 0);

    set_mtime(&fx.root().join("f"), 1_001);
    let third = fx.scan(300);
    assert_ne!(third.digest, first.digest);
    assert_eq!(third.summary.files_hashed, 1);
}

#[test]
fn test_mtime_only_change_refreshes_record() {
    let fx = Fixture::new();
    fx.write("f", b"same", 1_000);
    let first = fx.scan(100);

    set_mtime(&fx.root().join("f"), 2_000);
    let (second, lines) = fx.scan_reporting(200, true);
    assert_eq!(second.digest, first.digest);
    assert_eq!(second.summary.files_hashed, 1);
    assert!(lines.is_empty(), "unexpected changes: {lines:?}");

    let store = open(&fx);
    let root = store.lookup_path("").unwrap().record.unwrap();
    let file = store
        .lookup_file(&PathDescriptor::recorded("", root.path_id), "f")
        .unwrap()
        .record
        .unwrap();
    assert_eq!(file.mtime_epoch, 2_000);

    let third = fx.scan(300);
    assert_eq!(third.summary.files_hashed, 0);
}

#[test]
fn test_records_match_tree() {
    let fx = Fixture::new();
    fx.write("a", b"1", 1_000);
    fx.write("x/b", b"2", 1_000);
    fx.write("x/y/c", b"3", 1_000);
    fx.mkdir("empty");
    let outcome = fx.scan(100);

    let store = open(&fx);
    assert_eq!(store.count(EntityKind::Path).unwrap(), 4);
    assert_eq!(store.count(EntityKind::File).unwrap(), 3);

    let root = store.lookup_path("").unwrap().record.unwrap();
    assert_eq!(root.hash.as_deref(), Some(outcome.digest.as_str()));
    assert_eq!(root.last_check_epoch, 100);
    assert!(store.lookup_path("x/y").unwrap().was_found());
}

#[test]
fn test_every_record_touched_each_run() {
    let fx = Fixture::new();
    fx.write("a", b"1", 1_000);
    fx.write("x/b", b"2", 1_000);
    fx.scan(100);
    fx.scan(250);

    let store = open(&fx);
    let x = store.lookup_path("x").unwrap().record.unwrap();
    assert_eq!(x.last_check_epoch, 250);
    let b = store
        .lookup_file(&PathDescriptor::recorded("x", x.path_id), "b")
        .unwrap()
        .record
        .unwrap();
    assert_eq!(b.last_check_epoch, 250);
}

#[test]
fn test_catalog_file_stamped_with_epoch() {
    let fx = Fixture::new();
    fx.write("a", b"1", 1_000);
    fx.scan(1_500_000_000);

    assert_eq!(mtime_of(&fx.catalog()), 1_500_000_000);
}

#[test]
fn test_catalog_inside_scanned_tree_converges() {
    let fx = Fixture::new();
    fx.write("a", b"1", 1_000);
    let catalog = fx.root().join("catalog.sqlite");

    let run = |epoch: i64| {
        let options = pathfingerprint::engine::ScanOptions::new(fx.root(), &catalog)
            .with_epoch(pathfingerprint::catalog::RunEpoch::from_unix(epoch));
        pathfingerprint::engine::scan(&options).unwrap()
    };

    let first = run(100);
    assert_eq!(first.summary.files(), 2);
    assert_eq!(mtime_of(&catalog), 100);

    let second = run(200);
    assert_eq!(second.summary.files(), 2);
    assert_eq!(second.pruned.files + second.pruned.paths, 0);
    assert_eq!(mtime_of(&catalog), 200);
}

#[test]
fn test_algorithm_is_pinned() {
    let fx = Fixture::new();
    fx.write("a", b"1", 1_000);
    fx.scan(100);

    let options = pathfingerprint::engine::ScanOptions::new(fx.root(), fx.catalog())
        .with_algorithm(DigestAlgorithm::Sha256);
    let err = pathfingerprint::engine::scan(&options).unwrap_err();

    assert_eq!(err.exit_code(), ExitCode::CatalogOpen);
    assert!(err.to_string().contains("sha1"));
}
