//! Integration tests for the fetch pipeline against a stub extractor
//!
//! A small shell script stands in for yt-dlp: it parses the `-o` output
//! template to find the scratch directory, emits progress lines and the
//! metadata JSON the way `--print-json` does, and drops (or withholds)
//! output files. This exercises the full fetch contract without network
//! access: cancellation at progress points, file relocation, error
//! taxonomy and unconditional scratch cleanup.
//!
//! Run with: cargo test --test fetch_test

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tubefetch::download::{fetch, CancelFlag, DownloadError, FetchOptions, Mode};
use url::Url;

/// Shared stub preamble: recover the scratch directory from the -o template.
const STUB_PREAMBLE: &str = r#"#!/bin/sh
out=""
prev=""
for a in "$@"; do
  if [ "$prev" = "-o" ]; then out="$a"; fi
  prev="$a"
done
dir=$(dirname "$out")
"#;

struct TestEnv {
    _root: tempfile::TempDir,
    stub: PathBuf,
    output_dir: PathBuf,
    scratch_parent: PathBuf,
}

impl TestEnv {
    /// Set up an isolated stub extractor plus output/scratch directories.
    fn new(stub_body: &str) -> Self {
        let root = tempfile::tempdir().unwrap();
        let stub = root.path().join("yt-dlp-stub");
        fs::write(&stub, format!("{}{}", STUB_PREAMBLE, stub_body)).unwrap();
        fs::set_permissions(&stub, fs::Permissions::from_mode(0o755)).unwrap();

        let output_dir = root.path().join("downloads");
        let scratch_parent = root.path().join("scratch");

        Self {
            _root: root,
            stub,
            output_dir,
            scratch_parent,
        }
    }

    fn options(&self, mode: Mode) -> FetchOptions {
        FetchOptions::new(mode)
            .ytdl_bin(self.stub.to_string_lossy().into_owned())
            .output_dir(&self.output_dir)
            .scratch_parent(&self.scratch_parent)
            .cookies_file("/nonexistent/cookies.txt")
    }

    /// Every fetch must leave the scratch parent empty, success or not.
    fn assert_scratch_cleaned(&self) {
        let leftovers: Vec<_> = fs::read_dir(&self.scratch_parent)
            .unwrap()
            .filter_map(Result::ok)
            .collect();
        assert!(
            leftovers.is_empty(),
            "scratch directories left behind: {:?}",
            leftovers.iter().map(|e| e.path()).collect::<Vec<_>>()
        );
    }
}

fn test_url() -> Url {
    Url::parse("https://www.youtube.com/watch?v=abcd1234").unwrap()
}

fn file_names(dir: &Path) -> Vec<String> {
    fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default()
}

#[tokio::test]
async fn successful_audio_fetch_lands_in_output_dir() {
    let env = TestEnv::new(
        r#"echo "[download]   0.0% of 3.00MiB"
echo "[download] 100.0% of 3.00MiB"
echo "{\"id\": \"abcd1234\", \"title\": \"My: Song? <Test>\", \"duration\": 212}"
printf audio-bytes > "$dir/raw output.mp3"
"#,
    );

    let result = fetch(test_url(), CancelFlag::new(), env.options(Mode::Audio))
        .await
        .unwrap();

    assert!(result.path.extension().is_some_and(|e| e == "mp3"));
    assert!(result.path.starts_with(&env.output_dir));
    assert!(result.path.exists());
    // Title is reported raw; only the filename is sanitized.
    assert_eq!(result.title, "My: Song? <Test>");
    assert_eq!(file_names(&env.output_dir), vec!["My Song Test.mp3".to_string()]);
    assert!(result.elapsed_secs >= 0.0);

    env.assert_scratch_cleaned();
}

#[tokio::test]
async fn successful_video_fetch_produces_mp4() {
    let env = TestEnv::new(
        r#"echo "{\"title\": \"Clip\"}"
printf video-bytes > "$dir/Clip.mp4"
"#,
    );

    let result = fetch(test_url(), CancelFlag::new(), env.options(Mode::Video))
        .await
        .unwrap();

    assert!(result.path.extension().is_some_and(|e| e == "mp4"));
    assert_eq!(fs::read(&result.path).unwrap(), b"video-bytes");
    env.assert_scratch_cleaned();
}

#[tokio::test]
async fn audio_fallback_extension_is_renamed_to_mp3() {
    // The mp3 postprocessor can be skipped; the located .webm still lands
    // under the mode extension, matching the output contract.
    let env = TestEnv::new(
        r#"echo "{\"title\": \"Raw\"}"
printf opus-bytes > "$dir/Raw.webm"
"#,
    );

    let result = fetch(test_url(), CancelFlag::new(), env.options(Mode::Audio))
        .await
        .unwrap();

    assert!(result.path.extension().is_some_and(|e| e == "mp3"));
    assert_eq!(file_names(&env.output_dir), vec!["Raw.mp3".to_string()]);
    env.assert_scratch_cleaned();
}

#[tokio::test]
async fn preset_cancel_flag_aborts_at_first_progress_line() {
    // exec replaces the shell so killing the child reliably closes the pipes.
    let env = TestEnv::new(
        r#"echo "[download]   0.0% of 10.00MiB"
exec sleep 30
"#,
    );

    let cancel = CancelFlag::new();
    cancel.cancel();

    let started = std::time::Instant::now();
    let err = fetch(test_url(), cancel, env.options(Mode::Audio)).await.unwrap_err();

    assert!(matches!(err, DownloadError::Cancelled), "got {:?}", err);
    assert!(
        started.elapsed().as_secs() < 10,
        "cancellation should not wait out the extractor"
    );
    assert!(file_names(&env.output_dir).is_empty());
    env.assert_scratch_cleaned();
}

#[tokio::test]
async fn missing_output_file_is_a_not_found_error() {
    // Extractor "succeeds" and reports metadata but produces nothing.
    let env = TestEnv::new(
        r#"echo "{\"title\": \"Ghost\"}"
"#,
    );

    let err = fetch(test_url(), CancelFlag::new(), env.options(Mode::Audio))
        .await
        .unwrap_err();

    assert!(matches!(err, DownloadError::FileNotFound(_)), "got {:?}", err);
    env.assert_scratch_cleaned();
}

#[tokio::test]
async fn extractor_failure_reports_stderr_tail() {
    let env = TestEnv::new(
        r#"echo "ERROR: unable to download video data" >&2
exit 1
"#,
    );

    let err = fetch(test_url(), CancelFlag::new(), env.options(Mode::Audio))
        .await
        .unwrap_err();

    match err {
        DownloadError::Extraction(msg) => assert!(msg.contains("unable to download"), "msg: {}", msg),
        other => panic!("expected Extraction, got {:?}", other),
    }
    env.assert_scratch_cleaned();
}

#[tokio::test]
async fn missing_metadata_is_an_extraction_error() {
    let env = TestEnv::new(
        r#"echo "[download] 100.0% of 1.00MiB"
printf audio-bytes > "$dir/silent.mp3"
"#,
    );

    let err = fetch(test_url(), CancelFlag::new(), env.options(Mode::Audio))
        .await
        .unwrap_err();

    assert!(matches!(err, DownloadError::Extraction(_)), "got {:?}", err);
    env.assert_scratch_cleaned();
}

#[tokio::test]
async fn missing_extractor_binary_is_a_spawn_error() {
    let env = TestEnv::new("true\n");
    let options = env.options(Mode::Audio).ytdl_bin("/nonexistent/yt-dlp");

    let err = fetch(test_url(), CancelFlag::new(), options).await.unwrap_err();
    assert!(matches!(err, DownloadError::Spawn { .. }), "got {:?}", err);
}

#[tokio::test]
async fn empty_title_falls_back_to_generic_name() {
    let env = TestEnv::new(
        r#"echo "{\"title\": \"\"}"
printf audio-bytes > "$dir/x.mp3"
"#,
    );

    let result = fetch(test_url(), CancelFlag::new(), env.options(Mode::Audio))
        .await
        .unwrap();

    // Empty extractor title falls back to the mode default before sanitizing.
    assert_eq!(result.title, "audio");
    assert_eq!(file_names(&env.output_dir), vec!["audio.mp3".to_string()]);
    env.assert_scratch_cleaned();
}
