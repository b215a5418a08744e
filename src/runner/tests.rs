use super::*;
use loadwire_compiler::{emit, CompileOptions};
use loadwire_core::{LoadProfile, RequestSpec, Scenario};
use loadwire_decoders::RawRecord;
use std::io::Write;

const SAMPLE: &str = r#"{"StartTS":1000,"Status":200,"ErrorStr":"","Concurrency":1,"Elapsed":250000000,"ConnectTime":1000000,"SentTime":1000000,"FirstByteTime":5000000,"ReadTime":1000000,"Worker":0,"Label":"home","SentBytesCount":10,"RespBytesCount":20}"#;

fn artifacts(dir: &Path) -> Artifacts {
    artifacts_in(dir, OutputFormat::Ldjson)
}

fn artifacts_in(dir: &Path, format: OutputFormat) -> Artifacts {
    let scenario = Scenario::with_requests([RequestSpec::get("http://localhost/").with_label("home")]);
    emit(
        &scenario,
        &LoadProfile::default(),
        dir,
        format,
        CompileOptions::default(),
    )
    .unwrap()
}

#[cfg(unix)]
fn script(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-generator.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[test]
fn test_file_tail_keeps_last_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.txt");
    let mut file = File::create(&path).unwrap();
    write!(file, "{}", "a".repeat(5000)).unwrap();
    write!(file, "panic: boom").unwrap();

    assert_eq!(file_tail(&path, 16), "aaaaapanic: boom");
}

#[test]
fn test_file_tail_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(file_tail(&dir.path().join("absent"), 16).starts_with("<unavailable"));
}

#[test]
fn test_logs_next_to_config() {
    let dir = tempfile::tempdir().unwrap();
    let controller = RunController::new("generator", artifacts(dir.path()), OutputFormat::Ldjson);
    assert_eq!(controller.health_log(), dir.path().join("generator.err"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_successful_run_decodes_results() {
    let dir = tempfile::tempdir().unwrap();
    let artifacts = artifacts(dir.path());
    let results = artifacts.paths.results.clone();
    let tool = script(
        dir.path(),
        &format!(
            "printf '%s\\n' '{SAMPLE}' '{SAMPLE}' > '{}'\n\
             echo 'time=x level=info msg=\"Workers: waiting: 0, working: 1, sleeping: 0, busy: 1, lag: 0s, reqs: 2\"' >&2",
            results.display()
        ),
    );

    let summary = RunController::new(tool, artifacts, OutputFormat::Ldjson)
        .run()
        .await
        .unwrap();

    assert_eq!(summary.samples, 2);
    assert_eq!(summary.bytes, 60);
    assert_eq!(summary.labels["home"].samples, 2);
    assert_eq!(summary.health.working, 1);
    assert!(summary.finished_at.is_some());
}

#[cfg(unix)]
#[tokio::test]
async fn test_failed_process_reports_output_tails() {
    let dir = tempfile::tempdir().unwrap();
    let tool = script(dir.path(), "echo 'config rejected' >&2\nexit 3");

    let err = RunController::new(tool, artifacts(dir.path()), OutputFormat::Ldjson)
        .run()
        .await
        .unwrap_err();

    match err {
        RunError::ProcessFailed { status, stderr, .. } => {
            assert_eq!(status.code(), Some(3));
            assert_eq!(stderr, "config rejected");
        }
        other => panic!("expected ProcessFailed, got {other}"),
    }
}

#[cfg(unix)]
#[tokio::test]
async fn test_corrupt_results_stop_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let artifacts = artifacts(dir.path());
    let results = artifacts.paths.results.clone();
    let tool = script(
        dir.path(),
        &format!("echo '{{\"Status\":200}}' > '{}'\nsleep 30", results.display()),
    );

    let err = RunController::new(tool, artifacts, OutputFormat::Ldjson)
        .run()
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RunError::Decode(DecodeError::MissingField { field: "Elapsed", .. })
    ));
}

#[cfg(unix)]
#[tokio::test]
async fn test_crash_before_strings_reports_process_failure() {
    let dir = tempfile::tempdir().unwrap();
    let artifacts = artifacts_in(dir.path(), OutputFormat::Binary);
    let results = artifacts.paths.results.clone();

    // A record naming label 1 whose strings file never gets written
    let record = RawRecord {
        start_ts: 1000,
        status: 200,
        error_idx: 0,
        concurrency: 1,
        elapsed: 0.25,
        connect: 0.01,
        sent: 0.001,
        first_byte: 0.05,
        read: 0.02,
        worker: 0,
        label_idx: 1,
        sent_bytes: 10,
        recv_bytes: 20,
    };
    let staged = dir.path().join("staged.bin");
    std::fs::write(&staged, record.to_bytes()).unwrap();
    let tool = script(
        dir.path(),
        &format!(
            "cp '{}' '{}'
echo 'panic: out of memory' >&2
exit 2",
            staged.display(),
            results.display()
        ),
    );

    let err = RunController::new(tool, artifacts, OutputFormat::Binary)
        .run()
        .await
        .unwrap_err();

    match err {
        RunError::ProcessFailed { status, stderr, .. } => {
            assert_eq!(status.code(), Some(2));
            assert_eq!(stderr, "panic: out of memory");
        }
        other => panic!("expected ProcessFailed, got {other}"),
    }
}
