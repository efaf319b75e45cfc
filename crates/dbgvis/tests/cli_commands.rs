#![cfg(feature = "cli")]

use std::net::TcpListener;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use dbgvis::primitive::{Command as Op, DebugPrimitive, DisplayType, NullRenderer};
use dbgvis::session::{RunMode, Session, SessionConfig};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "dbgvis-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("loopback bind should succeed")
        .local_addr()
        .expect("bound socket should have an address")
        .port()
}

/// Record `frames` frames through a file-mode session.
fn write_recording(path: &PathBuf, frames: u32) {
    let config = SessionConfig {
        mode: RunMode::File,
        stream_file: Some(path.clone()),
        ..SessionConfig::default()
    };
    let mut session = Session::start(config, None).expect("file session should start");
    for counter in 0..frames {
        let batches = vec![
            (
                DisplayType::WorldZ,
                vec![
                    DebugPrimitive::from_words(Op::SET_COLOR, &[0xFF]),
                    DebugPrimitive::from_floats(Op::LINE, &[0.0, 0.0, 0.0, 1.0, 1.0, 1.0]),
                ],
            ),
            (
                DisplayType::Screen,
                vec![DebugPrimitive::with_text(Op::TEXT, &[0, 0], &format!("f{counter}"))],
            ),
        ];
        assert!(session.send_frame(counter, &batches, &mut NullRenderer));
    }
}

fn dbgvis() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_dbgvis"));
    command.arg("--log-level").arg("error");
    command
}

#[test]
fn version_prints_package_version() {
    let output = dbgvis().arg("version").output().expect("version should run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), format!("dbgvis {}", env!("CARGO_PKG_VERSION")));
}

#[test]
fn info_reports_frame_index() {
    let dir = unique_temp_dir("info");
    let path = dir.join("run.dbgr");
    write_recording(&path, 3);

    let output = dbgvis()
        .arg("--format")
        .arg("json")
        .arg("info")
        .arg(&path)
        .output()
        .expect("info should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"frame_count\":3"));
    assert!(stdout.contains("\"batches\":2"));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn play_prints_requested_frames() {
    let dir = unique_temp_dir("play");
    let path = dir.join("run.dbgr");
    write_recording(&path, 4);

    let output = dbgvis()
        .arg("--format")
        .arg("json")
        .arg("play")
        .arg(&path)
        .arg("--from")
        .arg("1")
        .arg("--count")
        .arg("2")
        .output()
        .expect("play should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("{\"frame\":1,"));
    assert!(lines[1].starts_with("{\"frame\":2,"));
    assert!(lines[0].contains("\"primitive_count\":3"));
    assert!(lines[0].contains("\"LINE\""));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn play_out_of_range_returns_64() {
    let dir = unique_temp_dir("play-range");
    let path = dir.join("run.dbgr");
    write_recording(&path, 2);

    let output = dbgvis()
        .arg("play")
        .arg(&path)
        .arg("--from")
        .arg("5")
        .output()
        .expect("play should run");

    assert_eq!(output.status.code(), Some(64));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn info_missing_file_returns_66() {
    let dir = unique_temp_dir("missing");
    let output = dbgvis()
        .arg("info")
        .arg(dir.join("absent.dbgr"))
        .output()
        .expect("info should run");

    assert_eq!(output.status.code(), Some(66));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn info_rejects_non_recording() {
    let dir = unique_temp_dir("garbage");
    let path = dir.join("notes.txt");
    std::fs::write(&path, "definitely not a recording").expect("file should be writable");

    let output = dbgvis().arg("info").arg(&path).output().expect("info should run");

    assert_eq!(output.status.code(), Some(60));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn view_without_producer_times_out_with_124() {
    let output = dbgvis()
        .arg("view")
        .arg("--host")
        .arg("127.0.0.1")
        .arg("--port")
        .arg(free_port().to_string())
        .arg("--timeout")
        .arg("1s")
        .output()
        .expect("view should run");

    assert_eq!(output.status.code(), Some(124));
}

#[test]
fn view_prints_frames_served_by_serve() {
    let dir = unique_temp_dir("serve-view");
    let stream = dir.join("served.dbgr");
    let port = free_port().to_string();

    let mut producer = dbgvis()
        .arg("--format")
        .arg("json")
        .arg("serve")
        .arg("--host")
        .arg("127.0.0.1")
        .arg("--port")
        .arg(&port)
        .arg("--frames")
        .arg("3")
        .arg("--interval-ms")
        .arg("5")
        .arg("--stream-file")
        .arg(&stream)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("serve should start");

    let viewer = dbgvis()
        .arg("--format")
        .arg("json")
        .arg("view")
        .arg("--host")
        .arg("127.0.0.1")
        .arg("--port")
        .arg(&port)
        .arg("--count")
        .arg("3")
        .arg("--timeout")
        .arg("5s")
        .output()
        .expect("view should run");

    assert!(viewer.status.success());
    let stdout = String::from_utf8_lossy(&viewer.stdout);
    let frames: Vec<&str> = stdout.lines().collect();
    assert_eq!(frames.len(), 3);
    assert!(frames.iter().all(|line| line.contains("\"world-z\"")));

    let summary = producer.wait_with_output().expect("serve should exit");
    assert!(summary.status.success());
    let summary = String::from_utf8_lossy(&summary.stdout);
    assert!(summary.contains("\"frames_acknowledged\":3"));

    let recorded = dbgvis()
        .arg("--format")
        .arg("json")
        .arg("info")
        .arg(&stream)
        .output()
        .expect("info should run");
    assert!(String::from_utf8_lossy(&recorded.stdout).contains("\"frame_count\":3"));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn viewer_command_stops_serve() {
    let port = free_port().to_string();

    let mut producer = dbgvis()
        .arg("--format")
        .arg("json")
        .arg("serve")
        .arg("--host")
        .arg("127.0.0.1")
        .arg("--port")
        .arg(&port)
        .arg("--interval-ms")
        .arg("5")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("serve should start");

    let viewer = dbgvis()
        .arg("--format")
        .arg("json")
        .arg("view")
        .arg("--host")
        .arg("127.0.0.1")
        .arg("--port")
        .arg(&port)
        .arg("--count")
        .arg("2")
        .arg("--command")
        .arg("quit now")
        .output()
        .expect("view should run");
    assert!(viewer.status.success());

    let summary = producer.wait_with_output().expect("serve should exit");
    assert!(summary.status.success());
    assert!(String::from_utf8_lossy(&summary.stdout).contains("\"frames_produced\""));
}
