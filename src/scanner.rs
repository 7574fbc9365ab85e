use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::{SCAN_ERR_NOT_DIR, SCAN_ERR_READ_DIR, redact_opt};

pub const CREDENTIAL_TYPE: &str = "codex";
const KEY_LEN: usize = 12;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub index: String,
    #[serde(default)]
    pub key: String,
    pub path: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(default)]
    pub team_space: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub last_refresh: Option<String>,
}

impl Credential {
    fn from_value(index: usize, path: String, value: &serde_json::Value) -> Self {
        let field = |name: &str| {
            value
                .get(name)
                .and_then(serde_json::Value::as_str)
                .filter(|text| !text.is_empty())
                .map(str::to_string)
        };
        Credential {
            index: index.to_string(),
            key: credential_key(&path),
            path,
            email: field("email"),
            kind: field("type"),
            plan: field("plan"),
            team_space: field("team_space"),
            id_token: field("id_token"),
            access_token: field("access_token"),
            account_id: field("account_id"),
            last_refresh: field("last_refresh"),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("index", &self.index)
            .field("key", &self.key)
            .field("path", &self.path)
            .field("email", &self.email)
            .field("type", &self.kind)
            .field("plan", &self.plan)
            .field("team_space", &self.team_space)
            .field("id_token", &redact_opt(&self.id_token))
            .field("access_token", &redact_opt(&self.access_token))
            .field("account_id", &self.account_id)
            .field("last_refresh", &self.last_refresh)
            .finish()
    }
}

pub fn credential_key(relative_path: &str) -> String {
    let mut key = hex::encode(Sha256::digest(relative_path.as_bytes()));
    key.truncate(KEY_LEN);
    key
}

pub fn scan(dir: &Path, recursive: bool) -> Result<Vec<Credential>, String> {
    if !dir.exists() {
        debug!(dir = %dir.display(), "source directory does not exist");
        return Ok(Vec::new());
    }
    if !dir.is_dir() {
        return Err(crate::msg1(SCAN_ERR_NOT_DIR, dir.display()));
    }

    let mut credentials = Vec::new();
    let mut skipped = 0usize;
    for relative in credential_files(dir, recursive)? {
        let path = dir.join(&relative);
        let value = match read_json(&path) {
            Ok(value) => value,
            Err(reason) => {
                debug!(file = %relative, %reason, "skipping unreadable credential file");
                skipped += 1;
                continue;
            }
        };
        if value.get("type").and_then(serde_json::Value::as_str) != Some(CREDENTIAL_TYPE) {
            debug!(file = %relative, "skipping file that is not a codex credential");
            skipped += 1;
            continue;
        }
        credentials.push(Credential::from_value(credentials.len() + 1, relative, &value));
    }
    debug!(
        dir = %dir.display(),
        found = credentials.len(),
        skipped,
        "scan complete"
    );
    Ok(credentials)
}

fn credential_files(dir: &Path, recursive: bool) -> Result<Vec<String>, String> {
    let max_depth = if recursive { usize::MAX } else { 1 };
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(max_depth)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => {
                return Err(crate::msg2(SCAN_ERR_READ_DIR, dir.display(), err));
            }
            Err(err) => {
                debug!(error = %err, "skipping unreadable directory entry");
                continue;
            }
        };
        let path = entry.path();
        if !path.extension().is_some_and(|ext| ext == "json") || !path.is_file() {
            continue;
        }
        if let Ok(relative) = path.strip_prefix(dir) {
            files.push(relative_key(relative));
        }
    }
    files.sort();
    Ok(files)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'))
}

fn relative_key(relative: &Path) -> String {
    relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn read_json(path: &Path) -> Result<serde_json::Value, String> {
    let contents = fs::read_to_string(path).map_err(|err| err.to_string())?;
    serde_json::from_str(&contents).map_err(|err| err.to_string())
}
