use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Run the binary inside `dir` with a private config file so nothing leaks into the user's setup
fn video2audio(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("video2audio").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(dir.path().join("config.yaml"));
    cmd
}

#[test]
fn test_help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    video2audio(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("convert"))
        .stdout(predicate::str::contains("batch"))
        .stdout(predicate::str::contains("formats"));
}

#[test]
fn test_formats_lists_inputs_and_codecs() {
    let dir = TempDir::new().unwrap();
    video2audio(&dir)
        .arg("formats")
        .assert()
        .success()
        .stdout(predicate::str::contains("mp4"))
        .stdout(predicate::str::contains("3gp"))
        .stdout(predicate::str::contains("pcm_s16le"))
        .stdout(predicate::str::contains("libmp3lame"));
}

#[test]
fn test_config_file_is_created_with_defaults() {
    let dir = TempDir::new().unwrap();
    video2audio(&dir)
        .args(["config", "--show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Format: wav"))
        .stdout(predicate::str::contains("Sample Rate: 44100 Hz"));

    assert!(dir.path().join("config.yaml").exists());
}

#[test]
fn test_convert_missing_source_fails() {
    let dir = TempDir::new().unwrap();
    video2audio(&dir)
        .args(["--quiet", "convert"])
        .arg(dir.path().join("nope.mp4"))
        .assert()
        .failure()
        .stdout(predicate::str::contains("Source file not found"));

    assert!(!dir.path().join("nope.wav").exists());
}

#[test]
fn test_convert_unsupported_extension_fails() {
    let dir = TempDir::new().unwrap();
    let notes = dir.path().join("notes.txt");
    std::fs::write(&notes, b"not a video").unwrap();

    video2audio(&dir)
        .args(["--quiet", "convert"])
        .arg(&notes)
        .assert()
        .failure()
        .stdout(predicate::str::contains("Unsupported video format"));
}

#[test]
fn test_batch_on_empty_directory_succeeds() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("videos");
    std::fs::create_dir(&input).unwrap();
    std::fs::write(input.join("readme.txt"), b"hi").unwrap();

    video2audio(&dir)
        .args(["--quiet", "batch"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("No video files were converted"));
}

#[test]
fn test_batch_on_missing_directory_succeeds_with_nothing_done() {
    let dir = TempDir::new().unwrap();
    video2audio(&dir)
        .args(["--quiet", "batch"])
        .arg(dir.path().join("missing"))
        .assert()
        .success()
        .stdout(predicate::str::contains("No video files were converted"));
}

#[test]
fn test_log_file_is_written() {
    let dir = TempDir::new().unwrap();
    video2audio(&dir)
        .args(["--quiet", "convert"])
        .arg(dir.path().join("gone.avi"))
        .assert()
        .failure();

    let log = std::fs::read_to_string(dir.path().join("conversion.log")).unwrap();
    assert!(log.contains("gone.avi"));
}

#[test]
fn test_rejects_invalid_channel_count() {
    let dir = TempDir::new().unwrap();
    video2audio(&dir)
        .args(["convert", "a.mp4", "--channels", "5"])
        .assert()
        .failure();
}
