use crate::{Paths, is_plain, set_plain};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use std::cell::Cell;
use std::env;
use std::fs;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, mpsc};
use std::thread;

pub(crate) static ENV_MUTEX: Mutex<()> = Mutex::new(());
pub(crate) static PLAIN_MUTEX: Mutex<()> = Mutex::new(());

const PROXY_VARS: [&str; 6] = [
    "HTTPS_PROXY",
    "https_proxy",
    "HTTP_PROXY",
    "http_proxy",
    "ALL_PROXY",
    "all_proxy",
];

thread_local! {
    static PLAIN_DEPTH: Cell<usize> = const { Cell::new(0) };
}

pub(crate) struct EnvVarGuard {
    key: String,
    prev: Option<String>,
}

pub(crate) struct PlainGuard {
    prev: bool,
    _lock: Option<MutexGuard<'static, ()>>,
}

fn set_env(key: &str, value: Option<&str>) -> Option<String> {
    let prev = env::var(key).ok();
    restore_env(key, value.map(str::to_string));
    prev
}

pub(crate) fn set_env_guard(key: &str, value: Option<&str>) -> EnvVarGuard {
    EnvVarGuard {
        key: key.to_string(),
        prev: set_env(key, value),
    }
}

pub(crate) fn clear_proxy_env() -> Vec<EnvVarGuard> {
    PROXY_VARS
        .iter()
        .map(|key| set_env_guard(key, None))
        .collect()
}

pub(crate) fn set_proxy_env(proxy: &str) -> Vec<EnvVarGuard> {
    let mut guards: Vec<EnvVarGuard> = PROXY_VARS
        .iter()
        .map(|key| set_env_guard(key, Some(proxy)))
        .collect();
    guards.push(set_env_guard("NO_PROXY", None));
    guards.push(set_env_guard("no_proxy", None));
    guards
}

pub(crate) fn set_plain_guard(value: bool) -> PlainGuard {
    let lock = PLAIN_DEPTH.with(|depth| {
        let current = depth.get();
        depth.set(current + 1);
        if current == 0 {
            Some(PLAIN_MUTEX.lock().unwrap_or_else(|err| err.into_inner()))
        } else {
            None
        }
    });
    let prev = is_plain();
    set_plain(value);
    PlainGuard { prev, _lock: lock }
}

fn restore_env(key: &str, value: Option<String>) {
    if let Some(value) = value {
        unsafe {
            env::set_var(key, value);
        }
    } else {
        unsafe {
            env::remove_var(key);
        }
    }
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        let prev = self.prev.take();
        restore_env(&self.key, prev);
    }
}

impl Drop for PlainGuard {
    fn drop(&mut self) {
        set_plain(self.prev);
        PLAIN_DEPTH.with(|depth| {
            let current = depth.get();
            depth.set(current.saturating_sub(1));
        });
    }
}

pub(crate) fn spawn_server(response: String) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");
    thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            let mut buf = [0u8; 8192];
            let _ = stream.read(&mut buf);
            let _ = stream.write_all(response.as_bytes());
        }
    });
    format!("http://{}", addr)
}

pub(crate) fn spawn_recording_server(response: String) -> (String, mpsc::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            let mut buf = [0u8; 8192];
            let read = stream.read(&mut buf).unwrap_or(0);
            let _ = tx.send(String::from_utf8_lossy(&buf[..read]).into_owned());
            let _ = stream.write_all(response.as_bytes());
        }
    });
    (format!("http://{}", addr), rx)
}

pub(crate) fn http_response(status: u16, body: &str, content_type: &str) -> String {
    let reason = match status {
        200 => "OK",
        400 => "Bad Request",
        401 => "Unauthorized",
        502 => "Bad Gateway",
        _ => "Status",
    };
    format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len(),
    )
}

pub(crate) fn build_id_token(email: &str, plan: &str) -> String {
    build_id_token_with(email, Some(plan), Some("acct-test"))
}

pub(crate) fn build_id_token_with(
    email: &str,
    plan: Option<&str>,
    account_id: Option<&str>,
) -> String {
    let header = serde_json::json!({
        "alg": "none",
        "typ": "JWT",
    });
    let mut auth = serde_json::Map::new();
    if let Some(plan) = plan {
        auth.insert("chatgpt_plan_type".to_string(), serde_json::json!(plan));
    }
    if let Some(account_id) = account_id {
        auth.insert("chatgpt_account_id".to_string(), serde_json::json!(account_id));
    }
    let payload = serde_json::json!({
        "email": email,
        "https://api.openai.com/auth": auth,
    });
    let header = URL_SAFE_NO_PAD.encode(serde_json::to_string(&header).unwrap());
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_string(&payload).unwrap());
    format!("{header}.{payload}.sig")
}

pub(crate) fn make_paths(root: &Path) -> Paths {
    Paths::under_home(root)
}

pub(crate) fn write_credential(dir: &Path, name: &str, email: &str, plan: &str) -> PathBuf {
    fs::create_dir_all(dir).expect("create source dir");
    let path = dir.join(name);
    let value = serde_json::json!({
        "id_token": build_id_token(email, plan),
        "access_token": format!("access-{email}"),
        "refresh_token": null,
        "account_id": format!("acct-{email}"),
        "email": email,
        "type": "codex",
        "plan": plan,
        "last_refresh": "2024-01-01T00:00:00.000Z",
        "expired": null,
    });
    fs::write(&path, serde_json::to_string_pretty(&value).unwrap()).expect("write credential");
    path
}
