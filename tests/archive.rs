use std::fs;
use std::path::{Path, PathBuf};

use assert_matches::assert_matches;
use runtar::tar::BLOCK_SIZE;
use runtar::{CreateOptions, Error, ExtractOptions, NamePolicy, TarReader, TarWriter};

fn write_file(path: &Path, contents: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn rooted(root: &Path) -> CreateOptions {
    CreateOptions {
        root: Some(root.to_path_buf()),
        ..Default::default()
    }
}

/// Deterministic, non-repeating-per-block test content.
fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

fn sorted_names(report: &runtar::CreateReport) -> Vec<String> {
    let mut names: Vec<_> = report.archived.iter().map(|e| e.name.clone()).collect();
    names.sort();
    names
}

async fn archive_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = TarWriter::new(Vec::new(), PathBuf::from("/"));
    for (name, data) in entries {
        writer.append_data(name, data.len() as u64, *data).await.unwrap();
    }
    writer.finish().await.unwrap()
}

#[tokio::test]
async fn archives_and_restores_directory_tree() {
    let tmp = tempfile::tempdir().unwrap();
    write_file(&tmp.path().join("d/a.txt"), b"abc");
    write_file(&tmp.path().join("d/sub/b.txt"), b"");
    let archive = tmp.path().join("out.tar");

    let report = runtar::create_with(&archive, &[tmp.path().join("d")], &rooted(tmp.path()))
        .await
        .unwrap();
    assert!(report.is_complete());
    assert_eq!(sorted_names(&report), ["d/a.txt", "d/sub/b.txt"]);

    // a.txt: header + one payload block; b.txt: header only; terminator.
    let bytes = fs::read(&archive).unwrap();
    assert_eq!(bytes.len(), 3 * BLOCK_SIZE + 2 * BLOCK_SIZE);
    assert!(bytes[bytes.len() - 2 * BLOCK_SIZE..].iter().all(|&b| b == 0));

    let mut listed = runtar::list(&archive).await.unwrap();
    listed.sort_by(|a, b| a.name.cmp(&b.name));
    assert_eq!(listed[0].name, "d/a.txt");
    assert_eq!(listed[0].size, 3);
    assert_eq!(listed[1].name, "d/sub/b.txt");
    assert_eq!(listed[1].size, 0);

    let out = tmp.path().join("restored");
    let files = runtar::extract(&archive, &out).await.unwrap();
    assert_eq!(files.len(), 2);
    assert_eq!(fs::read(out.join("d/a.txt")).unwrap(), b"abc");
    assert_eq!(fs::read(out.join("d/sub/b.txt")).unwrap(), b"");
}

#[tokio::test]
async fn round_trips_sizes_around_block_boundaries() {
    let tmp = tempfile::tempdir().unwrap();
    let sizes = [0usize, 1, 511, 512, 513, 1024, 5000];
    let src = tmp.path().join("src");
    for size in sizes {
        write_file(&src.join(format!("f{size}.bin")), &pattern(size));
    }
    let archive = tmp.path().join("sizes.tar");

    let report = runtar::create_with(&archive, &[&src], &rooted(tmp.path()))
        .await
        .unwrap();
    assert_eq!(report.archived.len(), sizes.len());

    let expected_len: usize = sizes
        .iter()
        .map(|s| BLOCK_SIZE + s.div_ceil(BLOCK_SIZE) * BLOCK_SIZE)
        .sum::<usize>()
        + 2 * BLOCK_SIZE;
    assert_eq!(fs::metadata(&archive).unwrap().len(), expected_len as u64);

    let out = tmp.path().join("out");
    runtar::extract(&archive, &out).await.unwrap();
    for size in sizes {
        let name = format!("src/f{size}.bin");
        assert_eq!(fs::read(out.join(&name)).unwrap(), pattern(size), "{name}");
    }
}

#[tokio::test]
async fn archives_every_file_regardless_of_depth() {
    let tmp = tempfile::tempdir().unwrap();
    let mut dir = tmp.path().join("deep");
    for level in 0..7 {
        write_file(&dir.join(format!("file{level}")), level.to_string().as_bytes());
        dir = dir.join(format!("level{level}"));
    }
    // Empty directories contribute nothing.
    fs::create_dir_all(tmp.path().join("deep/empty/nested")).unwrap();
    let archive = tmp.path().join("deep.tar");

    runtar::create_with(&archive, &[tmp.path().join("deep")], &rooted(tmp.path()))
        .await
        .unwrap();

    let entries = runtar::list(&archive).await.unwrap();
    assert_eq!(entries.len(), 7);
    assert!(entries.iter().any(|e| e.name
        == "deep/level0/level1/level2/level3/level4/level5/file6"));
}

#[tokio::test]
async fn single_files_and_directories_mix() {
    let tmp = tempfile::tempdir().unwrap();
    write_file(&tmp.path().join("notes.txt"), b"notes");
    write_file(&tmp.path().join("docs/guide.md"), b"# guide");
    let archive = tmp.path().join("mix.tar");

    let report = runtar::create_with(
        &archive,
        &[tmp.path().join("notes.txt"), tmp.path().join("docs")],
        &rooted(tmp.path()),
    )
    .await
    .unwrap();

    // Input order is preserved across paths.
    let names: Vec<_> = report.archived.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["notes.txt", "docs/guide.md"]);
}

#[tokio::test]
async fn terminator_only_archive_extracts_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let archive = tmp.path().join("empty.tar");
    fs::write(&archive, [0u8; 2 * BLOCK_SIZE]).unwrap();

    let out = tmp.path().join("out");
    let files = runtar::extract(&archive, &out).await.unwrap();
    assert!(files.is_empty());
    assert!(out.is_dir());
    assert_eq!(fs::read_dir(&out).unwrap().count(), 0);
}

#[tokio::test]
async fn stops_at_clean_end_of_stream() {
    // No terminator at all: the entry is still read and the reader stops.
    let mut bytes = archive_bytes(&[("a.txt", &b"hello"[..])]).await;
    bytes.truncate(2 * BLOCK_SIZE);

    let entries = TarReader::new(bytes.as_slice()).list().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "a.txt");

    assert!(TarReader::new(&b""[..]).list().await.unwrap().is_empty());
}

#[tokio::test]
async fn strips_parent_refs_from_names() {
    let tmp = tempfile::tempdir().unwrap();
    write_file(&tmp.path().join("a../b/f.txt"), b"quirk");
    let archive = tmp.path().join("quirk.tar");

    let report = runtar::create_with(&archive, &[tmp.path().join("a..")], &rooted(tmp.path()))
        .await
        .unwrap();

    assert_eq!(sorted_names(&report), ["ab/f.txt"]);
}

#[tokio::test]
async fn sources_outside_root_are_stripped_or_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("inner");
    fs::create_dir_all(&root).unwrap();
    let outside = tmp.path().join("outside.txt");
    write_file(&outside, b"x");
    let archive = tmp.path().join("out.tar");

    let report = runtar::create_with(&archive, &[&outside], &rooted(&root))
        .await
        .unwrap();
    assert_eq!(sorted_names(&report), ["outside.txt"]);

    let options = CreateOptions {
        root: Some(root),
        name_policy: NamePolicy::RejectOutsideRoot,
    };
    let report = runtar::create_with(&archive, &[&outside], &options).await.unwrap();
    assert!(report.archived.is_empty());
    assert_matches!(&report.skipped[..], [skipped] => {
        assert_eq!(skipped.path, outside);
        assert_matches!(skipped.error, Error::OutsideRoot(_));
    });
    assert_eq!(runtar::list(&archive).await.unwrap().len(), 0);
}

#[tokio::test]
async fn invalid_paths_are_skipped_and_processing_continues() {
    let tmp = tempfile::tempdir().unwrap();
    write_file(&tmp.path().join("ok.txt"), b"fine");
    let missing = tmp.path().join("missing.txt");
    let archive = tmp.path().join("out.tar");

    let report = runtar::create_with(
        &archive,
        &[missing.clone(), tmp.path().join("ok.txt")],
        &rooted(tmp.path()),
    )
    .await
    .unwrap();

    assert!(!report.is_complete());
    assert_eq!(sorted_names(&report), ["ok.txt"]);
    assert_matches!(&report.skipped[..], [skipped] => {
        assert_eq!(skipped.path, missing);
        assert_matches!(skipped.error, Error::Metadata { .. });
    });
}

#[tokio::test]
async fn missing_archive_is_a_hard_failure() {
    let tmp = tempfile::tempdir().unwrap();
    let result = runtar::extract(&tmp.path().join("nope.tar"), &tmp.path().join("out")).await;
    assert_matches!(result, Err(Error::OpenArchive { .. }));

    let result = runtar::create(&tmp.path().join("no/such/dir/out.tar"), &["x"]).await;
    assert_matches!(result, Err(Error::OpenArchive { .. }));
}

#[tokio::test]
async fn refuses_entries_escaping_output_dir() {
    let tmp = tempfile::tempdir().unwrap();
    let archive = tmp.path().join("evil.tar");
    fs::write(&archive, archive_bytes(&[("../evil.txt", &b"pwned"[..])]).await).unwrap();

    let out = tmp.path().join("out");
    let result = runtar::extract(&archive, &out).await;

    assert_matches!(result, Err(Error::PathTraversal(name)) if name == "../evil.txt");
    assert!(!tmp.path().join("evil.txt").exists());
}

#[tokio::test]
async fn truncated_payload_is_reported() {
    let tmp = tempfile::tempdir().unwrap();
    let mut bytes = archive_bytes(&[("short.bin", pattern(100).as_slice())]).await;
    bytes.truncate(BLOCK_SIZE + 10);
    let archive = tmp.path().join("short.tar");
    fs::write(&archive, &bytes).unwrap();

    let out = tmp.path().join("out");
    let result = runtar::extract(&archive, &out).await;

    assert_matches!(
        result,
        Err(Error::TruncatedArchive { name, expected: 100, actual: 10 }) if name == "short.bin"
    );
    assert_eq!(fs::read(out.join("short.bin")).unwrap(), pattern(10));
}

#[tokio::test]
async fn truncated_header_is_reported() {
    let bytes = archive_bytes(&[("a", &b"a"[..])]).await;
    let result = TarReader::new(&bytes[..100]).list().await;
    assert_matches!(result, Err(Error::TruncatedArchive { expected: 512, actual: 100, .. }));
}

#[tokio::test]
async fn checksum_verification_is_opt_in() {
    let tmp = tempfile::tempdir().unwrap();
    let mut bytes = archive_bytes(&[("a.txt", &b"abc"[..])]).await;
    // Flip a byte in the reserved area of the header.
    bytes[300] = b'!';
    let archive = tmp.path().join("corrupt.tar");
    fs::write(&archive, &bytes).unwrap();

    let entries = runtar::list(&archive).await.unwrap();
    assert_eq!(entries.len(), 1);

    let options = ExtractOptions {
        verify_checksums: true,
    };
    let result = runtar::extract_with(&archive, &tmp.path().join("out"), &options).await;
    assert_matches!(result, Err(Error::ChecksumMismatch { name, .. }) if name == "a.txt");
}

#[tokio::test]
async fn verified_archive_extracts_cleanly() {
    let tmp = tempfile::tempdir().unwrap();
    let archive = tmp.path().join("ok.tar");
    fs::write(&archive, archive_bytes(&[("x/y.txt", &b"payload"[..])]).await).unwrap();

    let options = ExtractOptions {
        verify_checksums: true,
    };
    let out = tmp.path().join("out");
    runtar::extract_with(&archive, &out, &options).await.unwrap();
    assert_eq!(fs::read(out.join("x/y.txt")).unwrap(), b"payload");
}

#[tokio::test]
async fn unreadable_mtime_does_not_block_extraction() {
    let tmp = tempfile::tempdir().unwrap();
    let mut bytes = archive_bytes(&[("a.txt", &b"abc"[..])]).await;
    bytes[136] = 0x80;
    let archive = tmp.path().join("mtime.tar");
    fs::write(&archive, &bytes).unwrap();

    let out = tmp.path().join("out");
    let files = runtar::extract(&archive, &out).await.unwrap();
    assert_eq!(files, [out.join("a.txt")]);
    assert_eq!(fs::read(out.join("a.txt")).unwrap(), b"abc");

    let entries = runtar::list(&archive).await.unwrap();
    assert_eq!(entries[0].mtime, None);
}

#[cfg(unix)]
#[tokio::test]
async fn symlinked_directories_resolve_to_physical_names() {
    let tmp = tempfile::tempdir().unwrap();
    let real = tmp.path().join("real");
    write_file(&real.join("d/f.txt"), b"linked");
    std::os::unix::fs::symlink(&real, tmp.path().join("link")).unwrap();
    let archive = tmp.path().join("link.tar");

    let report = runtar::create_with(&archive, &[tmp.path().join("link/d")], &rooted(&real))
        .await
        .unwrap();

    assert_eq!(sorted_names(&report), ["d/f.txt"]);
}
