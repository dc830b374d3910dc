use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn stevedore_bin_path() -> PathBuf {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_stevedore") {
        return PathBuf::from(path);
    }

    let this_test = std::env::current_exe().expect("current_exe");
    let deps_dir = this_test.parent().expect("deps dir");
    let debug_dir = deps_dir.parent().expect("debug dir");

    let direct = {
        #[cfg(windows)]
        {
            debug_dir.join("stevedore.exe")
        }
        #[cfg(not(windows))]
        {
            debug_dir.join("stevedore")
        }
    };
    if direct.exists() {
        return direct;
    }

    let mut candidates: Vec<_> = std::fs::read_dir(deps_dir)
        .expect("read deps dir")
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            let Some(name) = p.file_name().and_then(|n| n.to_str()) else {
                return false;
            };
            name.starts_with("stevedore-") && !name.ends_with(".d") && p.is_file()
        })
        .collect();
    candidates.sort();
    candidates
        .into_iter()
        .next()
        .expect("unable to locate stevedore binary in target/debug or target/debug/deps")
}

struct DaemonProcess {
    child: Child,
}

impl DaemonProcess {
    fn start(binary: &Path, root: &Path, socket: &Path, engine: &Path) -> Self {
        let child = Command::new(binary)
            .env("STEVEDORE_ROOT", root)
            .env("STEVEDORE_SOCKET", socket)
            .env("STEVEDORE_ENGINE_SOCKET", engine)
            .args(["daemon", "start"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn daemon");

        Self { child }
    }

    /// Starts the daemon under a lowered file-descriptor limit so accept
    /// failures can be provoked from the outside.
    fn start_with_fd_limit(
        binary: &Path,
        root: &Path,
        socket: &Path,
        engine: &Path,
        limit: u32,
    ) -> Self {
        let child = Command::new("sh")
            .env("STEVEDORE_ROOT", root)
            .env("STEVEDORE_SOCKET", socket)
            .env("STEVEDORE_ENGINE_SOCKET", engine)
            .arg("-c")
            .arg(format!("ulimit -n {limit}; exec \"$0\" daemon start"))
            .arg(binary)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn daemon with fd limit");

        Self { child }
    }

    fn stop(&mut self) {
        // No stop verb on the control protocol; the daemon answers to signals.
        let _ = self.child.kill();

        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if let Ok(Some(_)) = self.child.try_wait() {
                return;
            }
            sleep(Duration::from_millis(50));
        }

        let _ = self.child.wait();
    }
}

impl Drop for DaemonProcess {
    fn drop(&mut self) {
        self.stop();
    }
}

fn list_services(binary: &Path, socket: &Path) -> Option<serde_json::Value> {
    let output = Command::new(binary)
        .env("STEVEDORE_SOCKET", socket)
        .args(["list", "--json"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    serde_json::from_slice(&output.stdout).ok()
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        sleep(Duration::from_millis(100));
    }
    false
}

fn wait_for_exit(child: &mut Child, timeout: Duration) -> Option<std::process::ExitStatus> {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Ok(Some(status)) = child.try_wait() {
            return Some(status);
        }
        sleep(Duration::from_millis(50));
    }
    None
}

#[test]
fn daemon_answers_the_control_protocol() {
    let dir = TempDir::new().expect("tempdir");
    let root = dir.path().join("services");
    let socket = dir.path().join("stevedore.sock");
    // Never bound; nothing in this test reaches the container engine.
    let engine = dir.path().join("engine.sock");

    let web = root.join("web");
    std::fs::create_dir_all(&web).expect("mkdir service dir");
    std::fs::write(
        web.join("service.yaml"),
        "name: Web\ncontainer:\n  image: nginx:latest\n",
    )
    .expect("write manifest");

    let binary = stevedore_bin_path();
    let mut daemon = DaemonProcess::start(&binary, &root, &socket, &engine);
    assert!(
        wait_until(Duration::from_secs(5), || list_services(&binary, &socket)
            .is_some()),
        "daemon did not answer on the control socket in time",
    );

    let services = list_services(&binary, &socket).expect("list services");
    assert_eq!(services.as_array().map(Vec::len), Some(1));
    assert_eq!(services[0]["id"], "web");
    assert_eq!(services[0]["status"], "stopped");

    let start = Command::new(&binary)
        .env("STEVEDORE_SOCKET", &socket)
        .args(["start", "web"])
        .output()
        .expect("run start");
    assert!(
        !start.status.success(),
        "starting an uninstalled service must fail"
    );
    assert!(
        String::from_utf8_lossy(&start.stderr).contains("not installed"),
        "stderr should carry the daemon's verdict: {}",
        String::from_utf8_lossy(&start.stderr),
    );

    let stop = Command::new(&binary)
        .env("STEVEDORE_SOCKET", &socket)
        .args(["stop", "web"])
        .output()
        .expect("run stop");
    assert!(
        !stop.status.success(),
        "stopping a stopped service must fail"
    );
    assert!(
        String::from_utf8_lossy(&stop.stderr).contains("is not running"),
        "stderr should carry the daemon's verdict: {}",
        String::from_utf8_lossy(&stop.stderr),
    );

    let reload = Command::new(&binary)
        .env("STEVEDORE_SOCKET", &socket)
        .args(["load", "web"])
        .output()
        .expect("run load");
    assert!(!reload.status.success(), "loading twice must fail");
    assert!(
        String::from_utf8_lossy(&reload.stderr).contains("could not load"),
        "stderr should carry the daemon's verdict: {}",
        String::from_utf8_lossy(&reload.stderr),
    );

    let logs = Command::new(&binary)
        .env("STEVEDORE_ROOT", &root)
        .args(["logs", "web"])
        .output()
        .expect("run logs");
    assert!(
        logs.status.success(),
        "logs must succeed for a loaded service: {}",
        String::from_utf8_lossy(&logs.stderr),
    );

    daemon.stop();
}

#[test]
fn sigterm_shutdown_removes_the_control_socket() {
    let dir = TempDir::new().expect("tempdir");
    let root = dir.path().join("services");
    let socket = dir.path().join("stevedore.sock");
    let engine = dir.path().join("engine.sock");
    std::fs::create_dir_all(&root).expect("mkdir services root");

    let binary = stevedore_bin_path();
    let mut daemon = DaemonProcess::start(&binary, &root, &socket, &engine);
    assert!(
        wait_until(Duration::from_secs(5), || list_services(&binary, &socket)
            .is_some()),
        "daemon did not answer on the control socket in time",
    );
    assert!(socket.exists(), "control socket file should exist while serving");

    let pid = daemon.child.id().to_string();
    let killed = Command::new("sh")
        .args(["-c", &format!("kill -TERM {pid}")])
        .status()
        .expect("send SIGTERM");
    assert!(killed.success(), "kill -TERM failed");

    let status = wait_for_exit(&mut daemon.child, Duration::from_secs(5))
        .expect("daemon did not exit after SIGTERM");
    assert!(status.success(), "signal shutdown must exit cleanly: {status}");
    assert!(
        !socket.exists(),
        "control socket file must be removed on shutdown"
    );
}

#[test]
fn accept_fault_still_removes_the_control_socket() {
    let dir = TempDir::new().expect("tempdir");
    let root = dir.path().join("services");
    let socket = dir.path().join("stevedore.sock");
    let engine = dir.path().join("engine.sock");
    std::fs::create_dir_all(&root).expect("mkdir services root");

    let binary = stevedore_bin_path();
    let mut daemon = DaemonProcess::start_with_fd_limit(&binary, &root, &socket, &engine, 32);
    assert!(
        wait_until(Duration::from_secs(5), || list_services(&binary, &socket)
            .is_some()),
        "daemon did not answer on the control socket in time",
    );

    // Hold idle connections until the daemon runs out of descriptors; the
    // next accept then fails and faults the server task.
    let mut held = Vec::new();
    for _ in 0..48 {
        if let Ok(stream) = std::os::unix::net::UnixStream::connect(&socket) {
            held.push(stream);
        }
    }

    let status = wait_for_exit(&mut daemon.child, Duration::from_secs(10))
        .expect("daemon did not exit after the accept fault");
    assert!(!status.success(), "a fault exit must be reported as failure");
    assert!(
        !socket.exists(),
        "control socket file must be removed on a fault exit too"
    );
    drop(held);
}

#[test]
fn verbs_fail_cleanly_without_a_daemon() {
    let dir = TempDir::new().expect("tempdir");
    let socket = dir.path().join("missing.sock");

    Command::new(assert_cmd::cargo::cargo_bin!("stevedore"))
        .env("STEVEDORE_SOCKET", &socket)
        .arg("list")
        .assert()
        .failure()
        .stderr(contains("daemon is not running"));
}
