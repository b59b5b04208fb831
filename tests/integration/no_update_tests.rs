use super::common::{mtime_of, Fixture};
use std::fs;

fn seed(fx: &Fixture) {
    fx.write("a", b"alpha", 1_000);
    fx.write("sub/b", b"beta", 1_000);
    fx.write("sub/c", b"gamma", 1_000);
}

#[test]
fn test_catalog_bytes_unchanged_and_events_match() {
    let fx = Fixture::new();
    seed(&fx);
    fx.scan(100);

    fx.write("sub/b", b"BETA", 2_000);
    fx.write("sub/new", b"new", 2_000);
    fx.write("fresh/d", b"delta", 2_000);

    let before = fs::read(fx.catalog()).unwrap();
    let stamp_before = mtime_of(&fx.catalog());

    let (dry, dry_lines) = fx.scan_reporting(200, false);

    assert_eq!(fs::read(fx.catalog()).unwrap(), before);
    assert_eq!(mtime_of(&fx.catalog()), stamp_before);

    let (real, real_lines) = fx.scan_reporting(300, true);
    assert_eq!(dry.digest, real.digest);
    assert_eq!(dry_lines, real_lines);
    assert_eq!(
        real_lines,
        vec![
            "create path fresh",
            "create file fresh/d",
            "update file sub/b",
            "create file sub/new",
            "update path sub",
            "update path .",
        ]
    );
}

#[test]
fn test_dry_run_repeats_identically() {
    let fx = Fixture::new();
    seed(&fx);
    fx.scan(100);
    fx.write("a", b"ALPHA", 2_000);

    let (first, first_lines) = fx.scan_reporting(200, false);
    let (second, second_lines) = fx.scan_reporting(300, false);
    assert_eq!(first.digest, second.digest);
    assert_eq!(first_lines, second_lines);
    assert_eq!(first_lines, vec!["update file a", "update path ."]);
}

#[test]
fn test_missing_catalog_is_not_created() {
    let fx = Fixture::new();
    seed(&fx);

    let (dry, lines) = fx.scan_reporting(100, false);
    assert!(!fx.catalog().exists());
    assert_eq!(
        lines,
        vec![
            "create path .",
            "create file a",
            "create path sub",
            "create file sub/b",
            "create file sub/c",
        ]
    );
    assert_eq!(dry.summary.files_hashed, 3);

    let (real, real_lines) = fx.scan_reporting(200, true);
    assert_eq!(real.digest, dry.digest);
    assert_eq!(real_lines, lines);
}

#[test]
fn test_missing_catalog_directory_is_not_created() {
    let fx = Fixture::new();
    seed(&fx);
    let catalog = fx.state.path().join("nested").join("catalog.sqlite");

    let options = pathfingerprint::engine::ScanOptions::new(fx.root(), &catalog).with_updates(false);
    pathfingerprint::engine::scan(&options).unwrap();
    assert!(!catalog.parent().unwrap().exists());
}

#[test]
fn test_deletions_not_reported_without_updates() {
    let fx = Fixture::new();
    seed(&fx);
    fx.scan(100);
    let before = fs::read(fx.catalog()).unwrap();

    fx.remove("sub");
    let (dry, lines) = fx.scan_reporting(200, false);
    assert_eq!(lines, vec!["update path ."]);
    assert_eq!(dry.pruned.files + dry.pruned.paths, 0);
    assert_eq!(fs::read(fx.catalog()).unwrap(), before);

    let (_, lines) = fx.scan_reporting(300, true);
    assert_eq!(
        lines,
        vec![
            "update path .",
            "delete file sub/b",
            "delete file sub/c",
            "delete path sub",
        ]
    );
}

#[test]
fn test_dry_run_still_reuses_catalog() {
    let fx = Fixture::new();
    seed(&fx);
    let cold = fx.scan(100);

    let (dry, _) = fx.scan_reporting(200, false);
    assert_eq!(dry.digest, cold.digest);
    assert_eq!(dry.summary.files_hashed, 0);
    assert_eq!(dry.summary.files_reused, 3);
}
