use std::process::Command;

#[test]
fn dotenv_settings_reach_the_logger() {
    let dir = tempfile::tempdir().expect("tempdir");
    let log_file = dir.path().join("from-dotenv.log");
    std::fs::write(
        dir.path().join(".env"),
        format!("RUST_LOG=debug\nCIVICWATCH_LOG_FILE={}\n", log_file.display()),
    )
    .expect("write .env");

    let output = Command::new(env!("CARGO_BIN_EXE_civicwatch"))
        .current_dir(dir.path())
        .env_remove("RUST_LOG")
        .env_remove("CIVICWATCH_LOG_FILE")
        .args(["chunk", "--mock", "--storage-dir"])
        .arg(dir.path().join("storage"))
        .output()
        .expect("run civicwatch");

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(log_file.exists(), "log file named in .env was not opened");
    assert!(!dir.path().join("logs").exists());
}
