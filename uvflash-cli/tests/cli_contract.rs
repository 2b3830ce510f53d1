//! Integration tests for core CLI contract behavior.

use {predicates::prelude::*, std::fs, tempfile::tempdir};

fn cli_cmd() -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("uvflash");
    // Keep user/global configuration out of the tests.
    cmd.env_remove("UVFLASH_IMAGE")
        .env_remove("UVFLASH_PORT")
        .env_remove("UVFLASH_TIMESTAMP")
        .env("NO_COLOR", "1");
    cmd
}

fn init_image(dir: &std::path::Path) -> std::path::PathBuf {
    let image = dir.join("radio.bin");
    cli_cmd()
        .current_dir(dir)
        .arg("--image")
        .arg(&image)
        .arg("init")
        .assert()
        .success();
    image
}

#[test]
fn help_exits_zero_and_writes_stdout_only() {
    cli_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("uvflash"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn version_exits_zero_and_writes_stdout_only() {
    cli_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("uvflash"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn init_creates_two_mebibyte_image() {
    let dir = tempdir().expect("tempdir should be created");
    let image = init_image(dir.path());
    let bytes = fs::read(&image).expect("image should exist");
    assert_eq!(bytes.len(), 0x20_0000);
    assert!(bytes.iter().all(|&b| b == 0xFF));
}

#[test]
fn init_twice_is_usage_error() {
    let dir = tempdir().expect("tempdir should be created");
    let image = init_image(dir.path());
    cli_cmd()
        .arg("--image")
        .arg(&image)
        .arg("init")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn write_then_read_json() {
    let dir = tempdir().expect("tempdir should be created");
    let image = init_image(dir.path());

    cli_cmd()
        .arg("--image")
        .arg(&image)
        .args(["--timestamp", "0x12345678"])
        .args(["write", "--address", "0x1000", "--data", "0102030405060708", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\": \"Ok\""));

    let output = cli_cmd()
        .arg("--image")
        .arg(&image)
        .args(["read", "--address", "0x1000", "--size", "8", "--json"])
        .output()
        .expect("command should execute");
    assert!(output.status.success());

    let reply: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(reply["address"], 0x1000);
    assert_eq!(reply["size"], 8);
    assert_eq!(reply["data"], serde_json::json!([1, 2, 3, 4, 5, 6, 7, 8]));
}

#[test]
fn oversized_read_returns_zeros() {
    let dir = tempdir().expect("tempdir should be created");
    let image = init_image(dir.path());

    let output = cli_cmd()
        .arg("--image")
        .arg(&image)
        .args(["read", "--address", "0", "--size", "200", "--json"])
        .output()
        .expect("command should execute");
    assert!(output.status.success());

    let reply: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(reply["size"], 200);
    let data = reply["data"].as_array().expect("data should be an array");
    assert_eq!(data.len(), 200);
    assert!(data.iter().all(|b| b == 0));
}

#[test]
fn misaligned_write_fails_and_keeps_image() {
    let dir = tempdir().expect("tempdir should be created");
    let image = init_image(dir.path());

    cli_cmd()
        .arg("--image")
        .arg(&image)
        .args(["write", "--address", "0x1000", "--data", "010203"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("status:  1"))
        .stderr(predicate::str::contains("rejected"));

    let bytes = fs::read(&image).expect("image should exist");
    assert!(bytes.iter().all(|&b| b == 0xFF));
}

#[test]
fn load_and_dump_roundtrip() {
    let dir = tempdir().expect("tempdir should be created");
    let image = init_image(dir.path());
    let input = dir.path().join("payload.bin");
    let payload: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
    fs::write(&input, &payload).expect("write payload");
    let output = dir.path().join("dump.bin");

    cli_cmd()
        .arg("--image")
        .arg(&image)
        .arg("load")
        .arg(&input)
        .args(["--address", "0x10000"])
        .assert()
        .success();

    cli_cmd()
        .arg("--image")
        .arg(&image)
        .args(["dump", "--address", "0x10000", "--length", "1000", "--output"])
        .arg(&output)
        .assert()
        .success();

    assert_eq!(fs::read(&output).expect("dump should exist"), payload);
}

#[test]
fn disabled_port_from_config_is_usage_error() {
    let dir = tempdir().expect("tempdir should be created");
    let image = init_image(dir.path());
    let config = dir.path().join("cfg.toml");
    fs::write(&config, "[device]\nports = [\"vcp\"]\n").expect("write config");

    cli_cmd()
        .arg("--config")
        .arg(&config)
        .arg("--image")
        .arg(&image)
        .args(["--port", "uart", "read", "--address", "0", "--size", "8"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("not enabled"));
}

#[test]
fn decode_reply_frame() {
    cli_cmd()
        .args(["decode", "39540800001000000100 0000"])
        .assert()
        .success()
        .stdout(predicate::str::contains("flash write reply"))
        .stdout(predicate::str::contains("1 (error)"));
}

#[test]
fn decode_unknown_frame_fails() {
    cli_cmd()
        .args(["decode", "14050400"])
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn missing_image_fails_with_hint() {
    let dir = tempdir().expect("tempdir should be created");
    cli_cmd()
        .current_dir(dir.path())
        .args(["read", "--address", "0", "--size", "8"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("uvflash init"));
}

/// Exit code 2: usage error (unknown command, invalid arguments)
#[test]
fn exit_code_two_on_usage_error() {
    cli_cmd()
        .arg("frobnicate")
        .assert()
        .code(2);

    cli_cmd()
        .args(["read", "--address", "0", "--size", "999"])
        .assert()
        .code(2);
}
