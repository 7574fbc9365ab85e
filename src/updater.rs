use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::{UpdateError, copy_atomic, format_timestamp, write_atomic_verified};

/// Source field to target path. Nothing outside this table is ever written.
pub const FIELD_MAPPING: [(&str, &[&str]); 4] = [
    ("id_token", &["tokens", "id_token"]),
    ("access_token", &["tokens", "access_token"]),
    ("account_id", &["tokens", "account_id"]),
    ("last_refresh", &["last_refresh"]),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub updated_fields: Vec<String>,
    pub backup_path: Option<PathBuf>,
}

pub fn update_target(
    target: &Path,
    source: &Value,
    make_backup: bool,
) -> Result<UpdateOutcome, UpdateError> {
    let mut document = read_target(target)?;

    let backup_path = if make_backup {
        let backup = backup_path_for(target, Utc::now());
        copy_atomic(target, &backup).map_err(|reason| UpdateError::Backup {
            path: backup.clone(),
            reason,
        })?;
        debug!(backup = %backup.display(), "backed up target file");
        Some(backup)
    } else {
        None
    };

    let updated_fields = apply_mapping(&mut document, source);

    if !document.get("tokens").is_some_and(Value::is_object) {
        return Err(UpdateError::TargetValidationFailed {
            path: target.to_path_buf(),
        });
    }

    let json = serde_json::to_string_pretty(&Value::Object(document)).map_err(|err| {
        UpdateError::Write {
            path: target.to_path_buf(),
            reason: err.to_string(),
        }
    })?;
    write_atomic_verified(target, format!("{json}\n").as_bytes(), verify_json).map_err(
        |reason| UpdateError::Write {
            path: target.to_path_buf(),
            reason,
        },
    )?;
    debug!(
        target = %target.display(),
        fields = ?updated_fields,
        "target file updated"
    );

    Ok(UpdateOutcome {
        updated_fields,
        backup_path,
    })
}

pub fn backup_path_for(target: &Path, time: DateTime<Utc>) -> PathBuf {
    let stamp = format_timestamp(time).replace([':', '.'], "-");
    let mut name = OsString::from(target.as_os_str());
    name.push(format!(".{stamp}.bak"));
    PathBuf::from(name)
}

fn read_target(target: &Path) -> Result<Map<String, Value>, UpdateError> {
    let unreadable = |reason: String| UpdateError::TargetUnreadable {
        path: target.to_path_buf(),
        reason,
    };
    let contents = fs::read_to_string(target).map_err(|err| unreadable(err.to_string()))?;
    match serde_json::from_str(&contents).map_err(|err| unreadable(err.to_string()))? {
        Value::Object(map) => Ok(map),
        _ => Err(unreadable("expected a JSON object".to_string())),
    }
}

fn apply_mapping(document: &mut Map<String, Value>, source: &Value) -> Vec<String> {
    let mut updated = Vec::new();
    for (field, target_path) in FIELD_MAPPING {
        let Some(value) = source
            .get(field)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
        else {
            continue;
        };
        set_nested(document, target_path, Value::String(value.to_string()));
        updated.push(target_path.join("."));
    }
    updated
}

fn set_nested(root: &mut Map<String, Value>, path: &[&str], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut current = root;
    for key in parents {
        let entry = current
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        let Value::Object(next) = entry else {
            return;
        };
        current = next;
    }
    current.insert(last.to_string(), value);
}

fn verify_json(path: &Path) -> Result<(), String> {
    let contents = fs::read_to_string(path).map_err(|err| err.to_string())?;
    serde_json::from_str::<Value>(&contents)
        .map(|_| ())
        .map_err(|err| err.to_string())
}
