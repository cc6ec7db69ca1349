#![cfg(all(unix, feature = "cli"))]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/sigcli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn sigprims() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_sigprims"));
    cmd.arg("--log-level").arg("error");
    cmd
}

fn send_to_stdout(args: &[&str]) -> Vec<u8> {
    let output = sigprims()
        .arg("send")
        .args(args)
        .output()
        .expect("send should run");
    assert!(output.status.success(), "send failed: {output:?}");
    output.stdout
}

fn listen_stdin(args: &[&str], input: &[u8]) -> Output {
    let mut child = sigprims()
        .arg("--format")
        .arg("json")
        .arg("listen")
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("listen should start");
    child
        .stdin
        .take()
        .expect("stdin should be piped")
        .write_all(input)
        .expect("frames should be written");
    child.wait_with_output().expect("listen should finish")
}

fn send_with_retry(path: &Path, args: &[&str], timeout: Duration) {
    let start = Instant::now();
    loop {
        let status = sigprims()
            .arg("send")
            .arg(path)
            .args(args)
            .stderr(Stdio::null())
            .status()
            .expect("send should run");
        if status.success() {
            return;
        }
        if start.elapsed() >= timeout {
            panic!("send never connected");
        }
        thread::sleep(Duration::from_millis(25));
    }
}

#[test]
fn version_prints_package_version() {
    let output = sigprims().arg("version").output().expect("version should run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn send_writes_framed_values() {
    let out = send_to_stdout(&["--kind", "i32", "--id", "100", "--value", "7", "--value", "-3"]);

    assert_eq!(out.len(), 34);
    assert_eq!(&out[..4], b"SUB0");
    assert_eq!(&out[4..8], &100u32.to_le_bytes());
    assert_eq!(&out[12..16], &7i32.to_le_bytes());
    assert_eq!(out[16], b'\n');
    assert_eq!(&out[29..33], &(-3i32).to_le_bytes());
}

#[test]
fn send_bare_omits_prefix_and_postfix() {
    let out = send_to_stdout(&["--kind", "u8", "--id", "1", "--value", "5", "--bare"]);
    assert_eq!(out, vec![1, 0, 0, 0, 1, 0, 0, 0, 5]);
}

#[test]
fn send_rejects_unparsable_value() {
    let output = sigprims()
        .args(["send", "--kind", "u8", "--value", "300"])
        .output()
        .expect("send should run");
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn listen_decodes_piped_frames() {
    let mut frames = send_to_stdout(&["--kind", "i32", "--id", "100", "--value", "7"]);
    frames.extend(send_to_stdout(&[
        "--kind",
        "f64",
        "--name",
        "Altitude",
        "--value",
        "12.5",
    ]));

    let output = listen_stdin(&["--signal", "100:i32", "--signal", "Altitude:f64"], &frames);

    assert!(output.status.success(), "listen failed: {output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line should be json"))
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["type_id"], 100);
    assert_eq!(lines[0]["value"], 7);
    assert_eq!(lines[1]["signal"], "Altitude");
    assert_eq!(lines[1]["kind"], "f64");
    assert_eq!(lines[1]["value"], 12.5);
}

#[test]
fn listen_skips_garbage_by_default() {
    let mut frames = b"xyz".to_vec();
    frames.extend(send_to_stdout(&["--kind", "u16", "--id", "9", "--value", "513"]));

    let output = listen_stdin(&["--signal", "9:u16"], &frames);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"value\":513"));
}

#[test]
fn listen_halt_policy_fails_on_garbage() {
    let mut frames = b"junk".to_vec();
    frames.extend(send_to_stdout(&["--kind", "u16", "--id", "9", "--value", "513"]));

    let output = listen_stdin(&["--signal", "9:u16", "--policy", "halt"], &frames);

    assert_eq!(output.status.code(), Some(60));
    assert!(output.stdout.is_empty());
}

#[test]
fn listen_over_socket_stops_after_count() {
    let dir = unique_temp_dir("listen");
    let sock_path = dir.join("signals.sock");

    let child = sigprims()
        .arg("--format")
        .arg("json")
        .arg("listen")
        .arg(&sock_path)
        .args(["--signal", "Speed:f32", "--count", "2"])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("listen should start");

    send_with_retry(
        &sock_path,
        &["--kind", "f32", "--name", "Speed", "--value", "1.5", "--value", "2.5"],
        Duration::from_secs(3),
    );

    let output = child.wait_with_output().expect("listen should finish");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().count(), 2);
    assert!(stdout.contains("\"value\":2.5"));
    assert!(!sock_path.exists());

    let _ = std::fs::remove_dir_all(&dir);
}
