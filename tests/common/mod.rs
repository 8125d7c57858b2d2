use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn resolve_bin_path() -> PathBuf {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_fsyncer") {
        return PathBuf::from(path);
    }

    let exe_name = if cfg!(windows) {
        "fsyncer.exe"
    } else {
        "fsyncer"
    };
    let fallback = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .and_then(|deps| deps.parent().map(PathBuf::from))
        .map(|debug_dir| debug_dir.join(exe_name));

    match fallback {
        Some(path) if path.exists() => path,
        _ => panic!("unable to resolve fsyncer binary path for integration test"),
    }
}

/// Command with an isolated environment: no user config file, no
/// `FSYNCER_*` overrides leaking in from the caller.
fn isolated_command(home: &Path, args: &[&str]) -> Command {
    let mut command = Command::new(resolve_bin_path());
    command
        .args(args)
        .env("HOME", home)
        .env("NO_COLOR", "1")
        .env("RUST_BACKTRACE", "1");
    for (key, _) in std::env::vars() {
        if key.starts_with("FSYNCER_") {
            command.env_remove(key);
        }
    }
    command
}

fn case_root() -> PathBuf {
    let root = std::env::temp_dir().join("fsyncer-test-logs");
    fs::create_dir_all(&root).expect("create temp test log dir");
    root
}

/// Run the binary to completion and keep a per-case transcript.
pub fn run_cli_case(case_name: &str, args: &[&str]) -> CmdResult {
    let root = case_root();
    let log_path = root.join(format!("{}-{}.log", sanitize(case_name), now_millis()));
    let home = root.join("home");

    let output = isolated_command(&home, args)
        .output()
        .expect("execute fsyncer command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let mut log_content = String::new();
    log_content.push_str(&format!("case={case_name}\n"));
    log_content.push_str(&format!("bin={}\n", resolve_bin_path().display()));
    log_content.push_str(&format!("args={args:?}\n"));
    log_content.push_str(&format!("status={}\n", output.status));
    log_content.push_str("----- stdout -----\n");
    log_content.push_str(&stdout);
    log_content.push('\n');
    log_content.push_str("----- stderr -----\n");
    log_content.push_str(&stderr);
    log_content.push('\n');
    fs::write(&log_path, log_content).expect("write test log");

    CmdResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}

/// Start the binary in the background with stdout/stderr discarded.
pub fn spawn_cli(args: &[&str]) -> Child {
    let home = case_root().join("home");
    isolated_command(&home, args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn fsyncer command")
}

/// Path argument as `&str` for `run_cli_case`.
pub fn arg(path: &Path) -> &str {
    path.to_str().expect("test paths are valid UTF-8")
}
