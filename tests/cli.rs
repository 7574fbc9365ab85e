mod common;

use common::{read_json, write_credential};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

const ALPHA_EMAIL: &str = "alpha@example.com";
const BETA_EMAIL: &str = "beta@example.com";
const GAMMA_EMAIL: &str = "gamma@example.com";

struct TestEnv {
    home: PathBuf,
}

impl TestEnv {
    fn new() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time")
            .as_nanos();
        let home = env::temp_dir().join(format!(
            "codex-switch-test-{}-{nanos}",
            std::process::id()
        ));
        fs::create_dir_all(home.join(".codex")).expect("create codex dir");
        Self { home }
    }

    fn source_dir(&self) -> PathBuf {
        self.home.join(".cli-proxy-api")
    }

    fn target_file(&self) -> PathBuf {
        self.home.join(".codex").join("auth.json")
    }

    fn app_dir(&self) -> PathBuf {
        self.home.join(".codex-switch")
    }

    fn seed_credentials(&self) {
        let dir = self.source_dir();
        write_credential(&dir, "codex-plus-alpha@example.com.json", ALPHA_EMAIL, "plus");
        write_credential(&dir, "codex-team-beta@example.com.json", BETA_EMAIL, "team");
        write_credential(&dir, "codex-team-gamma@example.com.json", GAMMA_EMAIL, "team");
    }

    fn write_target(&self) {
        let value = serde_json::json!({
            "OPENAI_API_KEY": null,
            "tokens": {
                "id_token": "old-id",
                "access_token": "old-access",
                "refresh_token": "old-refresh",
                "account_id": "old-account",
            },
            "last_refresh": "2020-01-01T00:00:00Z",
        });
        fs::write(
            self.target_file(),
            serde_json::to_string_pretty(&value).expect("serialize target"),
        )
        .expect("write target");
    }

    fn read_target(&self) -> serde_json::Value {
        read_json(&self.target_file())
    }

    fn read_state(&self) -> serde_json::Value {
        read_json(&self.app_dir().join("state.json"))
    }

    fn cached_key(&self, position: usize) -> String {
        let cache = read_json(&self.app_dir().join("cache.json"));
        cache[position]["key"]
            .as_str()
            .expect("cached key")
            .to_string()
    }

    fn run(&self, args: &[&str]) -> String {
        let output = self.run_output(args);
        self.assert_success(args, output)
    }

    fn run_expect_error(&self, args: &[&str]) -> String {
        let output = self.run_output(args);
        if output.status.success() {
            panic!(
                "command unexpectedly succeeded: {:?}\nstdout:\n{}",
                args,
                String::from_utf8_lossy(&output.stdout)
            );
        }
        ascii_only(String::from_utf8_lossy(&output.stderr).as_ref())
    }

    fn run_output(&self, args: &[&str]) -> Output {
        let bin = resolve_bin_path();
        let mut cmd = Command::new(bin);
        cmd.args(args)
            .env("HOME", &self.home)
            .env("CODEX_SWITCH_HOME", &self.home)
            .env("CODEX_SWITCH_COMMAND", "codex-switch")
            .env_remove("CODEX_SWITCH_LOG")
            .env("NO_COLOR", "1")
            .env("LANG", "C")
            .env("LC_ALL", "C")
            .stdin(Stdio::null());
        cmd.output().expect("run command")
    }

    fn assert_success(&self, args: &[&str], output: Output) -> String {
        if !output.status.success() {
            panic!(
                "command failed: {:?}\nstdout:\n{}\nstderr:\n{}",
                args,
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            );
        }
        ascii_only(String::from_utf8_lossy(&output.stdout).as_ref())
    }
}

impl Drop for TestEnv {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.home);
    }
}

fn ascii_only(raw: &str) -> String {
    let output = raw.replace('\r', "");
    let filtered: String = output.chars().filter(|ch| ch.is_ascii()).collect();
    filtered
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

fn resolve_bin_path() -> PathBuf {
    if let Ok(path) = env::var("CARGO_BIN_EXE_codex-switch") {
        return PathBuf::from(path);
    }
    let exe = env::current_exe().expect("current exe");
    let target_dir = exe
        .parent()
        .and_then(|path| path.parent())
        .expect("target dir");
    let bin_name = if cfg!(windows) {
        "codex-switch.exe"
    } else {
        "codex-switch"
    };
    target_dir.join(bin_name)
}

fn backups(env: &TestEnv) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = fs::read_dir(env.home.join(".codex"))
        .expect("read codex dir")
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.to_string_lossy().ends_with(".bak"))
        .collect();
    found.sort();
    found
}

#[test]
fn ls_reports_empty_source() {
    let env = TestEnv::new();
    let out = env.run(&["ls"]);
    assert!(out.contains("Credentials: 0"));
    assert!(out.contains("No credentials found in ~/.cli-proxy-api"));
    assert!(out.contains("codex-switch login"));
}

#[test]
fn ls_lists_credentials_in_path_order() {
    let env = TestEnv::new();
    env.seed_credentials();
    fs::write(env.source_dir().join("notes.txt"), "ignore me").unwrap();
    fs::write(env.source_dir().join("broken.json"), "{ nope").unwrap();

    let out = env.run(&["ls"]);
    assert!(out.contains("Credentials: 3"));
    let rows: Vec<&str> = out
        .lines()
        .filter(|line| line.contains("@example.com"))
        .collect();
    assert_eq!(rows.len(), 3);
    assert!(rows[0].trim_start().starts_with("1 "));
    assert!(rows[0].contains(ALPHA_EMAIL));
    assert!(rows[1].contains(BETA_EMAIL));
    assert!(rows[2].contains(GAMMA_EMAIL));
    assert!(!out.contains("access-"));

    let cache = read_json(&env.app_dir().join("cache.json"));
    assert_eq!(cache.as_array().map(Vec::len), Some(3));
    assert_eq!(cache[2]["index"], "3");
}

#[test]
fn ls_exports_csv() {
    let env = TestEnv::new();
    env.seed_credentials();
    let out = env.run(&["ls", "--csv", "~/export/creds.csv"]);
    assert!(out.contains("Exported CSV to ~/export/creds.csv"));
    let csv = fs::read_to_string(env.home.join("export").join("creds.csv")).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "index,plan,team_space,email,type");
    assert_eq!(lines[1], "1,plus,,alpha@example.com,codex");
    assert_eq!(lines.len(), 4);
}

#[test]
fn use_by_index_updates_target_and_state() {
    let env = TestEnv::new();
    env.seed_credentials();
    env.write_target();
    env.run(&["ls"]);

    let out = env.run(&["use", "2"]);
    assert!(out.contains("Switched to [2] [TEAM] beta@example.com"));
    assert!(out.contains("tokens.access_token"));
    assert!(out.contains("Backup: ~/.codex/auth.json."));

    let target = env.read_target();
    assert_eq!(target["tokens"]["access_token"], "access-beta@example.com");
    assert_eq!(target["tokens"]["account_id"], "acct-beta@example.com");
    assert_eq!(target["tokens"]["refresh_token"], "old-refresh");
    assert_eq!(target["last_refresh"], "2024-05-01T10:00:00.000Z");
    assert!(target["OPENAI_API_KEY"].is_null());

    let saved = backups(&env);
    assert_eq!(saved.len(), 1);
    let backup = read_json(&saved[0]);
    assert_eq!(backup["tokens"]["access_token"], "old-access");

    let state = env.read_state();
    assert_eq!(state["current_index"], "2");
    assert!(state["updated_at"].as_str().is_some());
}

#[test]
fn use_by_key_without_backup() {
    let env = TestEnv::new();
    env.seed_credentials();
    env.write_target();
    env.run(&["ls"]);
    let key = env.cached_key(2);

    env.run(&["use", "--key", &key, "--no-backup"]);
    let target = env.read_target();
    assert_eq!(target["tokens"]["access_token"], "access-gamma@example.com");
    assert!(backups(&env).is_empty());
    assert_eq!(env.read_state()["current_index"], "3");
}

#[test]
fn use_unknown_index_fails() {
    let env = TestEnv::new();
    env.seed_credentials();
    env.write_target();
    env.run(&["ls"]);
    let err = env.run_expect_error(&["use", "9"]);
    assert!(err.contains("No credential with index 9"));
    assert_eq!(env.read_target()["tokens"]["access_token"], "old-access");
}

#[test]
fn use_requires_a_scanned_cache() {
    let env = TestEnv::new();
    env.seed_credentials();
    env.write_target();
    let err = env.run_expect_error(&["use", "1"]);
    assert!(err.contains("No credential with index 1"));
    assert!(err.contains("codex-switch ls"));
}

#[test]
fn use_with_invalid_target_keeps_state() {
    let env = TestEnv::new();
    env.seed_credentials();
    env.write_target();
    env.run(&["ls"]);
    env.run(&["use", "1"]);
    fs::write(env.target_file(), "{ not json").unwrap();

    let err = env.run_expect_error(&["use", "2"]);
    assert!(err.contains("cannot read target file"));
    assert_eq!(fs::read_to_string(env.target_file()).unwrap(), "{ not json");
    assert_eq!(env.read_state()["current_index"], "1");
}

#[test]
fn use_with_missing_target_does_not_create_it() {
    let env = TestEnv::new();
    env.seed_credentials();
    env.run(&["ls"]);
    let err = env.run_expect_error(&["use", "1"]);
    assert!(err.contains("cannot read target file"));
    assert!(!env.target_file().exists());
}

#[test]
fn delete_current_clears_active_state() {
    let env = TestEnv::new();
    env.seed_credentials();
    env.write_target();
    env.run(&["ls"]);
    env.run(&["use", "2"]);

    let out = env.run(&["delete", "2", "--yes"]);
    assert!(out.contains("Deleted [2] [TEAM] beta@example.com"));
    assert!(out.contains("active state cleared"));
    assert!(out.contains("Remaining credentials: 2"));
    assert!(
        !env.source_dir()
            .join("codex-team-beta@example.com.json")
            .exists()
    );
    assert!(env.read_state()["current_index"].is_null());

    let out = env.run(&["whoami"]);
    assert!(out.contains("none selected"));

    let out = env.run(&["ls"]);
    let rows: Vec<&str> = out
        .lines()
        .filter(|line| line.contains("@example.com"))
        .collect();
    assert!(rows[1].contains(GAMMA_EMAIL));
    assert!(rows[1].trim_start().starts_with("2 "));
}

#[test]
fn delete_other_keeps_active_state() {
    let env = TestEnv::new();
    env.seed_credentials();
    env.write_target();
    env.run(&["ls"]);
    env.run(&["use", "1"]);
    let before = env.read_state();

    env.run(&["delete", "3", "--yes"]);
    assert_eq!(env.read_state(), before);
}

#[test]
fn delete_without_yes_requires_tty() {
    let env = TestEnv::new();
    env.seed_credentials();
    env.run(&["ls"]);
    let err = env.run_expect_error(&["delete", "1"]);
    assert!(err.contains("requires confirmation"));
    assert!(
        env.source_dir()
            .join("codex-plus-alpha@example.com.json")
            .exists()
    );
}

#[test]
fn switch_requires_tty() {
    let env = TestEnv::new();
    env.seed_credentials();
    env.write_target();
    env.run(&["ls"]);
    let err = env.run_expect_error(&["switch"]);
    assert!(err.contains("requires a TTY"));
}

#[test]
fn whoami_reports_active_credential() {
    let env = TestEnv::new();
    env.seed_credentials();
    env.write_target();
    let out = env.run(&["whoami"]);
    assert!(out.contains("Source: ~/.cli-proxy-api"));
    assert!(out.contains("Target: ~/.codex/auth.json"));
    assert!(out.contains("No credential selected"));

    env.run(&["ls"]);
    env.run(&["use", "3"]);
    let out = env.run(&["whoami"]);
    assert!(out.contains("Index: 3"));
    assert!(out.contains("Email: gamma@example.com"));
    assert!(out.contains("Plan: team"));
}

#[test]
fn whoami_flags_stale_index() {
    let env = TestEnv::new();
    env.seed_credentials();
    env.write_target();
    env.run(&["ls"]);
    env.run(&["use", "3"]);
    fs::remove_file(
        env.source_dir()
            .join("codex-team-gamma@example.com.json"),
    )
    .unwrap();
    env.run(&["ls"]);

    let out = env.run(&["whoami"]);
    assert!(out.contains("Active index 3 is no longer valid"));
}

#[test]
fn config_updates_source_and_rescans() {
    let env = TestEnv::new();
    let other = env.home.join("creds");
    write_credential(&other.join("nested"), "deep.json", ALPHA_EMAIL, "plus");
    write_credential(&other, "top.json", BETA_EMAIL, "team");

    let out = env.run(&["config", "--source-dir", "~/creds"]);
    assert!(out.contains("Config saved"));
    assert!(out.contains("Source: ~/creds"));
    assert!(out.contains("Credentials: 1"));

    let out = env.run(&["config", "--recursive", "true"]);
    assert!(out.contains("Recursive scan: yes"));
    assert!(out.contains("Credentials: 2"));

    let config = read_json(&env.app_dir().join("config.json"));
    assert_eq!(config["recursive_scan"], true);

    let out = env.run(&["config"]);
    assert!(out.contains("Source: ~/creds"));
}

#[test]
fn config_rejects_missing_source() {
    let env = TestEnv::new();
    let err = env.run_expect_error(&["config", "--source-dir", "~/absent"]);
    assert!(err.contains("does not exist"));
    assert!(!env.app_dir().join("config.json").exists());
}

#[test]
fn plain_output_is_not_indented() {
    let env = TestEnv::new();
    let out = env.run(&["--plain", "ls"]);
    assert!(out.lines().any(|line| line == "Credentials: 0"));
    assert!(out.contains("Info: Run `codex-switch login`"));
}
