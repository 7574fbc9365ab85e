#![allow(dead_code)]

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use std::fs;
use std::path::{Path, PathBuf};

pub(crate) fn build_id_token(email: &str, plan: &str, account_id: &str) -> String {
    let header = serde_json::json!({
        "alg": "none",
        "typ": "JWT",
    });
    let auth = serde_json::json!({
        "chatgpt_plan_type": plan,
        "chatgpt_account_id": account_id,
    });
    let payload = serde_json::json!({
        "email": email,
        "https://api.openai.com/auth": auth,
    });
    let header = URL_SAFE_NO_PAD.encode(serde_json::to_string(&header).unwrap());
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_string(&payload).unwrap());
    format!("{header}.{payload}.")
}

/// Writes a credential file the way a login would, with predictable tokens.
pub(crate) fn write_credential(dir: &Path, name: &str, email: &str, plan: &str) -> PathBuf {
    let account_id = format!("acct-{email}");
    let value = serde_json::json!({
        "id_token": build_id_token(email, plan, &account_id),
        "access_token": format!("access-{email}"),
        "refresh_token": format!("refresh-{email}"),
        "account_id": account_id,
        "email": email,
        "type": "codex",
        "plan": plan,
        "last_refresh": "2024-05-01T10:00:00.000Z",
    });
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create credential dir");
    }
    fs::write(&path, serde_json::to_string_pretty(&value).unwrap()).expect("write credential");
    path
}

pub(crate) fn read_json(path: &Path) -> serde_json::Value {
    let contents = fs::read_to_string(path).expect("read json");
    serde_json::from_str(&contents).expect("parse json")
}
