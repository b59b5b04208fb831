use super::common::Fixture;
use pathfingerprint::digest::DigestAlgorithm;
use pathfingerprint::error::ExitCode;
use std::fs;

const THREE_EMPTY_SHA1: &str = "7de9894aa603d20dae695e2a9bccf02d465979cb";
const THREE_EMPTY_SHA256: &str =
    "dabbfb3a9ee37be03de47c274a5939d8b97b6a8914b204390e898460758a4f62";

fn compose(algorithm: DigestAlgorithm, children: &[(&str, &str)]) -> String {
    let mut acc = algorithm.accumulator();
    for (rel, digest) in children {
        acc.write(rel.as_bytes());
        acc.write(&[0]);
        acc.write(digest.as_bytes());
        acc.write(&[0]);
    }
    acc.finalize()
}

#[test]
fn test_three_empty_files_sha1() {
    let fx = Fixture::new();
    for name in ["aa", "bb", "cc"] {
        fx.write(name, b"", 1_000);
    }

    let first = fx.scan(100);
    assert_eq!(first.digest, THREE_EMPTY_SHA1);

    let second = fx.scan(200);
    assert_eq!(second.digest, THREE_EMPTY_SHA1);
}

#[test]
fn test_three_empty_files_sha256() {
    let mut fx = Fixture::new();
    fx.algorithm = DigestAlgorithm::Sha256;
    for name in ["cc", "bb", "aa"] {
        fx.write(name, b"", 1_000);
    }

    assert_eq!(fx.scan(100).digest, THREE_EMPTY_SHA256);
}

#[test]
fn test_three_empty_files_matches_composition() {
    let mut fx = Fixture::new();
    fx.algorithm = DigestAlgorithm::Blake3;
    for name in ["aa", "bb", "cc"] {
        fx.write(name, b"", 1_000);
    }

    let empty = DigestAlgorithm::Blake3.digest(b"");
    let expected = compose(
        DigestAlgorithm::Blake3,
        &[("aa", &empty), ("bb", &empty), ("cc", &empty)],
    );
    let outcome = fx.scan(100);
    assert_eq!(outcome.digest, expected);
    assert_eq!(outcome.digest.len(), 64);
}

#[test]
fn test_nested_directories_use_relative_paths() {
    let fx = Fixture::new();
    fx.write("top.txt", b"top", 1_000);
    fx.write("sub/inner/deep.txt", b"deep", 1_000);

    let alg = DigestAlgorithm::Sha1;
    let inner = compose(alg, &[("sub/inner/deep.txt", &alg.digest(b"deep"))]);
    let sub = compose(alg, &[("sub/inner", &inner)]);
    let root = compose(alg, &[("sub", &sub), ("top.txt", &alg.digest(b"top"))]);

    let outcome = fx.scan(100);
    assert_eq!(outcome.digest, root);
    assert_eq!(outcome.summary.directories, 3);
    assert_eq!(outcome.summary.files_hashed, 2);
    assert_eq!(outcome.summary.bytes_read, 7);
}

#[test]
fn test_empty_directory_digest() {
    let fx = Fixture::new();
    assert_eq!(fx.scan(100).digest, DigestAlgorithm::Sha1.digest(b""));
}

#[test]
fn test_empty_subdirectory_contributes() {
    let with_empty = Fixture::new();
    with_empty.write("f", b"x", 1_000);
    with_empty.mkdir("empty");

    let without = Fixture::new();
    without.write("f", b"x", 1_000);

    assert_ne!(with_empty.scan(100).digest, without.scan(100).digest);
}

#[test]
fn test_separator_prevents_collisions() {
    let left = Fixture::new();
    left.write("a", b"x", 1_000);

    let right = Fixture::new();
    right.write("ax", b"", 1_000);

    assert_ne!(left.scan(100).digest, right.scan(100).digest);
}

#[test]
fn test_rename_changes_digest() {
    let fx = Fixture::new();
    fx.write("before", b"same", 1_000);
    let first = fx.scan(100).digest;

    fs::rename(fx.root().join("before"), fx.root().join("after")).unwrap();
    let second = fx.scan(200).digest;

    assert_ne!(first, second);
}

#[test]
fn test_cold_scans_with_separate_catalogs_agree() {
    let a = Fixture::new();
    let b = Fixture::new();
    for fx in [&a, &b] {
        fx.write("x/1", b"one", 1_000);
        fx.write("x/2", b"two", 2_000);
        fx.write("y", b"why", 3_000);
    }

    assert_eq!(a.scan(100).digest, b.scan(500).digest);
}

#[test]
fn test_content_independent_of_mtime() {
    let a = Fixture::new();
    a.write("f", b"content", 1_000);
    let b = Fixture::new();
    b.write("f", b"content", 9_000);

    assert_eq!(a.scan(100).digest, b.scan(100).digest);
}

#[test]
fn test_missing_root_is_fatal() {
    let fx = Fixture::new();
    let missing = fx.root().join("missing");
    let options = pathfingerprint::engine::ScanOptions::new(&missing, fx.catalog());

    let err = pathfingerprint::engine::scan(&options).unwrap_err();
    assert_eq!(err.exit_code(), ExitCode::HashFailed);
    assert!(err.to_string().contains("missing"));
}

#[test]
fn test_root_must_be_a_directory() {
    let fx = Fixture::new();
    fx.write("file", b"", 1_000);
    let options = pathfingerprint::engine::ScanOptions::new(fx.root().join("file"), fx.catalog());

    let err = pathfingerprint::engine::scan(&options).unwrap_err();
    assert_eq!(err.exit_code(), ExitCode::HashFailed);
}

#[test]
fn test_large_file_streams_across_chunks() {
    let fx = Fixture::new();
    let content: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
    fx.write("big.bin", &content, 1_000);

    let mut options = fx.options(100, true);
    options.read_buffer_size = 4096;
    let outcome = pathfingerprint::engine::scan(&options).unwrap();

    let expected = compose(
        DigestAlgorithm::Sha1,
        &[("big.bin", &DigestAlgorithm::Sha1.digest(&content))],
    );
    assert_eq!(outcome.digest, expected);
    assert_eq!(outcome.summary.bytes_read, 200_000);
}
