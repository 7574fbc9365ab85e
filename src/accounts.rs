use inquire::{Confirm, Select};
use std::fmt;
use std::fs;
use std::io::{self, IsTerminal};
use std::path::Path;
use tracing::debug;

use crate::{
    ACCOUNTS_ERR_DELETE, ACCOUNTS_ERR_DELETE_CONFIRM_REQUIRED, ACCOUNTS_ERR_FILE_MISSING,
    ACCOUNTS_ERR_INDEX_NOT_FOUND, ACCOUNTS_ERR_INVALID_SOURCE, ACCOUNTS_ERR_KEY_NOT_FOUND,
    ACCOUNTS_ERR_PROMPT_DELETE, ACCOUNTS_ERR_READ_SOURCE, ACCOUNTS_ERR_TTY_REQUIRED,
    ACCOUNTS_ERR_UPDATE, ACCOUNTS_ERR_WRITE_CSV, ACCOUNTS_MSG_ALREADY_ACTIVE,
    ACCOUNTS_MSG_CLEARED_ACTIVE, ACCOUNTS_MSG_CONFIG_SAVED, ACCOUNTS_MSG_COUNT,
    ACCOUNTS_MSG_CSV_WRITTEN, ACCOUNTS_MSG_DELETED, ACCOUNTS_MSG_NONE_FOUND,
    ACCOUNTS_MSG_REMAINING, ACCOUNTS_MSG_SWITCHED, ACCOUNTS_PROMPT_DELETE,
    ACCOUNTS_STATUS_NONE_SELECTED, ACCOUNTS_STATUS_STALE, ACCOUNTS_SWITCH_HELP,
    ACCOUNTS_SWITCH_TITLE, ActiveState, CANCELLED_MESSAGE, CacheStore, Config, ConfigUpdate,
    Credential, JsonCacheStore, JsonStateStore, Paths, StateStore, StateTracker, UpdateOutcome,
    apply_config_update, command_name, expand_path, find_by_index, find_by_key, format_action,
    format_credential_label, format_credential_table, format_list_hint, format_login_hint,
    format_path, format_section, handle_inquire_result, inquire_select_render_config,
    is_inquire_cancel, load_config_or_default, print_output_block, save_config, scan,
    update_target, use_color_stderr, use_color_stdout, write_atomic,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Index(String),
    Key(String),
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Index(index) => write!(f, "index {index}"),
            Selector::Key(key) => write!(f, "key {key}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub cleared_active: bool,
    pub remaining: usize,
}

pub fn list_credentials(paths: &Paths, csv: Option<String>) -> Result<(), String> {
    let config = load_config_or_default(paths)?;
    let cache = JsonCacheStore::for_paths(paths);
    let credentials = refresh_catalog(&config, &cache)?;
    let active = StateTracker::new(JsonStateStore::for_paths(paths)).current_index()?;
    let use_color = use_color_stdout();

    let mut message = crate::msg1(ACCOUNTS_MSG_COUNT, credentials.len());
    if credentials.is_empty() {
        message.push('\n');
        message.push_str(&crate::msg2(
            ACCOUNTS_MSG_NONE_FOUND,
            format_path(&config.source_dir, &paths.home),
            format_login_hint(use_color),
        ));
    } else {
        message.push_str("\n\n");
        message.push_str(&format_credential_table(
            &credentials,
            active.as_deref(),
            use_color,
        ));
    }

    if let Some(csv) = csv {
        let csv_path = expand_path(&csv, &paths.home);
        write_atomic(&csv_path, render_csv(&credentials).as_bytes())
            .map_err(|err| crate::msg1(ACCOUNTS_ERR_WRITE_CSV, err))?;
        message.push_str("\n\n");
        message.push_str(&format_action(
            &crate::msg1(ACCOUNTS_MSG_CSV_WRITTEN, format_path(&csv_path, &paths.home)),
            use_color,
        ));
    }

    print_output_block(&message);
    Ok(())
}

pub fn use_credential(paths: &Paths, selector: Selector, make_backup: bool) -> Result<(), String> {
    let config = load_config_or_default(paths)?;
    let credentials = JsonCacheStore::for_paths(paths).load()?;
    let credential = lookup(&credentials, &selector)?;
    let tracker = StateTracker::new(JsonStateStore::for_paths(paths));
    let outcome = apply_credential(&config, credential, make_backup, &tracker)?;
    print_output_block(&format_switch_result(
        credential,
        &config,
        &outcome,
        &paths.home,
    ));
    Ok(())
}

pub fn delete_credential(paths: &Paths, selector: Selector, yes: bool) -> Result<(), String> {
    let config = load_config_or_default(paths)?;
    let cache = JsonCacheStore::for_paths(paths);
    let credentials = cache.load()?;
    let credential = lookup(&credentials, &selector)?;
    if !yes && !confirm_delete(credential)? {
        return Err(CANCELLED_MESSAGE.to_string());
    }

    let tracker = StateTracker::new(JsonStateStore::for_paths(paths));
    let outcome = remove_credential(&config, credential, &cache, &tracker)?;

    let use_color = use_color_stdout();
    let mut message = format_action(
        &crate::msg1(
            ACCOUNTS_MSG_DELETED,
            format_credential_label(credential, false, false),
        ),
        use_color,
    );
    if outcome.cleared_active {
        message.push('\n');
        message.push_str(ACCOUNTS_MSG_CLEARED_ACTIVE);
    }
    message.push('\n');
    message.push_str(&crate::msg1(ACCOUNTS_MSG_REMAINING, outcome.remaining));
    print_output_block(&message);
    Ok(())
}

pub fn switch_credential(paths: &Paths) -> Result<(), String> {
    let config = load_config_or_default(paths)?;
    let credentials = JsonCacheStore::for_paths(paths).load()?;
    let use_color = use_color_stdout();
    if credentials.is_empty() {
        let message = crate::msg2(
            ACCOUNTS_MSG_NONE_FOUND,
            format_path(&config.source_dir, &paths.home),
            format_login_hint(use_color),
        );
        print_output_block(&message);
        return Ok(());
    }
    require_tty("switch")?;

    let tracker = StateTracker::new(JsonStateStore::for_paths(paths));
    let active = tracker.current_index()?;
    let selected = select_credential(&credentials, active.as_deref())?;
    if active.as_deref() == Some(selected.index.as_str()) {
        let message = crate::msg1(
            ACCOUNTS_MSG_ALREADY_ACTIVE,
            format_credential_label(selected, true, false),
        );
        print_output_block(&message);
        return Ok(());
    }
    let outcome = apply_credential(&config, selected, true, &tracker)?;
    print_output_block(&format_switch_result(
        selected,
        &config,
        &outcome,
        &paths.home,
    ));
    Ok(())
}

pub fn whoami(paths: &Paths) -> Result<(), String> {
    let config = load_config_or_default(paths)?;
    let credentials = JsonCacheStore::for_paths(paths).load()?;
    let state = StateTracker::new(JsonStateStore::for_paths(paths)).get_active()?;
    let use_color = use_color_stdout();
    let mut message = format_config(&config, &paths.home, use_color);
    message.push_str("\n\n");
    message.push_str(&format_active(state.as_ref(), &credentials, use_color));
    print_output_block(&message);
    Ok(())
}

pub fn configure(paths: &Paths, update: ConfigUpdate) -> Result<(), String> {
    let config = load_config_or_default(paths)?;
    let use_color = use_color_stdout();
    if update.is_empty() {
        print_output_block(&format_config(&config, &paths.home, use_color));
        return Ok(());
    }
    let next = apply_config_update(paths, &config, &update)?;
    save_config(paths, &next)?;
    let credentials = refresh_catalog(&next, &JsonCacheStore::for_paths(paths))?;
    let mut message = format_action(ACCOUNTS_MSG_CONFIG_SAVED, use_color);
    message.push_str("\n\n");
    message.push_str(&format_config(&next, &paths.home, use_color));
    message.push_str("\n\n");
    message.push_str(&crate::msg1(ACCOUNTS_MSG_COUNT, credentials.len()));
    print_output_block(&message);
    Ok(())
}

pub fn refresh_catalog<C: CacheStore>(config: &Config, cache: &C) -> Result<Vec<Credential>, String> {
    let credentials = scan(&config.source_dir, config.recursive_scan)?;
    cache.save(&credentials)?;
    Ok(credentials)
}

pub fn lookup<'a>(credentials: &'a [Credential], selector: &Selector) -> Result<&'a Credential, String> {
    let hint = format_list_hint(use_color_stderr());
    match selector {
        Selector::Index(index) => find_by_index(credentials, index.trim())
            .ok_or_else(|| crate::msg2(ACCOUNTS_ERR_INDEX_NOT_FOUND, index, hint)),
        Selector::Key(key) => find_by_key(credentials, key.trim())
            .ok_or_else(|| crate::msg2(ACCOUNTS_ERR_KEY_NOT_FOUND, key, hint)),
    }
}

pub fn apply_credential<S: StateStore>(
    config: &Config,
    credential: &Credential,
    make_backup: bool,
    tracker: &StateTracker<S>,
) -> Result<UpdateOutcome, String> {
    let source_path = config.source_dir.join(&credential.path);
    let contents = fs::read_to_string(&source_path)
        .map_err(|err| crate::msg2(ACCOUNTS_ERR_READ_SOURCE, source_path.display(), err))?;
    let source: serde_json::Value = serde_json::from_str(&contents)
        .map_err(|err| crate::msg2(ACCOUNTS_ERR_INVALID_SOURCE, source_path.display(), err))?;
    let outcome = update_target(&config.target_file, &source, make_backup)
        .map_err(|err| crate::msg1(ACCOUNTS_ERR_UPDATE, err))?;
    tracker.set_active(&credential.index)?;
    debug!(index = %credential.index, key = %credential.key, "switched active credential");
    Ok(outcome)
}

pub fn remove_credential<C: CacheStore, S: StateStore>(
    config: &Config,
    credential: &Credential,
    cache: &C,
    tracker: &StateTracker<S>,
) -> Result<DeleteOutcome, String> {
    let path = config.source_dir.join(&credential.path);
    if !path.is_file() {
        return Err(crate::msg2(
            ACCOUNTS_ERR_FILE_MISSING,
            path.display(),
            format_list_hint(use_color_stderr()),
        ));
    }
    fs::remove_file(&path).map_err(|err| crate::msg2(ACCOUNTS_ERR_DELETE, path.display(), err))?;
    debug!(file = %path.display(), "credential file removed");

    let cleared_active = tracker.current_index()?.as_deref() == Some(credential.index.as_str());
    if cleared_active {
        tracker.clear()?;
    }
    let remaining = refresh_catalog(config, cache)?.len();
    Ok(DeleteOutcome {
        cleared_active,
        remaining,
    })
}

pub fn render_csv(credentials: &[Credential]) -> String {
    let mut out = String::from("index,plan,team_space,email,type\n");
    for credential in credentials {
        let fields = [
            Some(credential.index.as_str()),
            credential.plan.as_deref(),
            credential.team_space.as_deref(),
            credential.email.as_deref(),
            credential.kind.as_deref(),
        ];
        let row: Vec<String> = fields
            .iter()
            .map(|field| csv_field(field.unwrap_or_default()))
            .collect();
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn format_switch_result(
    credential: &Credential,
    config: &Config,
    outcome: &UpdateOutcome,
    home: &Path,
) -> String {
    let use_color = use_color_stdout();
    let mut lines = vec![format_action(
        &crate::msg1(
            ACCOUNTS_MSG_SWITCHED,
            format_credential_label(credential, false, false),
        ),
        use_color,
    )];
    lines.push(String::new());
    lines.push("Updated fields:".to_string());
    for field in &outcome.updated_fields {
        lines.push(format!("  - {field}"));
    }
    lines.push(format!("Target: {}", format_path(&config.target_file, home)));
    if let Some(backup) = outcome.backup_path.as_deref() {
        lines.push(format!("Backup: {}", format_path(backup, home)));
    }
    lines.join("\n")
}

fn format_config(config: &Config, home: &Path, use_color: bool) -> String {
    [
        format_section("Config", use_color),
        format!("Source: {}", format_path(&config.source_dir, home)),
        format!("Target: {}", format_path(&config.target_file, home)),
        format!(
            "Recursive scan: {}",
            if config.recursive_scan { "yes" } else { "no" }
        ),
    ]
    .join("\n")
}

fn format_active(state: Option<&ActiveState>, credentials: &[Credential], use_color: bool) -> String {
    let title = format_section("Active credential", use_color);
    let Some(index) = state.and_then(|state| state.current_index.as_deref()) else {
        return format!("{title}\n{ACCOUNTS_STATUS_NONE_SELECTED}");
    };
    let Some(credential) = find_by_index(credentials, index) else {
        return format!(
            "{title}\n{}",
            crate::msg2(ACCOUNTS_STATUS_STALE, index, format_list_hint(use_color))
        );
    };
    let mut lines = vec![title, format!("Index: {}", credential.index)];
    if let Some(plan) = credential.plan.as_deref() {
        lines.push(format!("Plan: {plan}"));
    }
    if let Some(space) = credential.team_space.as_deref() {
        lines.push(format!("Team space: {space}"));
    }
    lines.push(format!(
        "Email: {}",
        credential.email.as_deref().unwrap_or("-")
    ));
    lines.push(format!(
        "Updated: {}",
        state
            .and_then(|state| state.updated_at.as_deref())
            .unwrap_or("-")
    ));
    lines.join("\n")
}

struct Choice<'a> {
    credential: &'a Credential,
    label: String,
}

impl fmt::Display for Choice<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

fn select_credential<'a>(
    credentials: &'a [Credential],
    active: Option<&str>,
) -> Result<&'a Credential, String> {
    let use_color = use_color_stderr();
    let mut starting = 0;
    let options: Vec<Choice<'a>> = credentials
        .iter()
        .enumerate()
        .map(|(position, credential)| {
            let is_current = active == Some(credential.index.as_str());
            if is_current {
                starting = position;
            }
            Choice {
                credential,
                label: format_credential_label(credential, is_current, use_color),
            }
        })
        .collect();
    let prompt = Select::new(ACCOUNTS_SWITCH_TITLE, options)
        .with_starting_cursor(starting)
        .with_help_message(ACCOUNTS_SWITCH_HELP)
        .with_render_config(inquire_select_render_config())
        .prompt();
    handle_inquire_result(prompt, "selection").map(|choice| choice.credential)
}

fn require_tty(action: &str) -> Result<(), String> {
    require_tty_with(io::stdin().is_terminal(), action)
}

fn require_tty_with(is_tty: bool, action: &str) -> Result<(), String> {
    if is_tty {
        Ok(())
    } else {
        Err(crate::msg3(
            ACCOUNTS_ERR_TTY_REQUIRED,
            action,
            command_name(),
            action,
        ))
    }
}

fn confirm_delete(credential: &Credential) -> Result<bool, String> {
    let is_tty = io::stdin().is_terminal();
    if !is_tty {
        return Err(ACCOUNTS_ERR_DELETE_CONFIRM_REQUIRED.to_string());
    }
    let prompt = crate::msg1(
        ACCOUNTS_PROMPT_DELETE,
        format_credential_label(credential, false, false),
    );
    let selection = Confirm::new(&prompt)
        .with_default(false)
        .with_render_config(inquire_select_render_config())
        .prompt();
    confirm_delete_with(is_tty, selection)
}

fn confirm_delete_with(
    is_tty: bool,
    selection: Result<bool, inquire::error::InquireError>,
) -> Result<bool, String> {
    if !is_tty {
        return Err(ACCOUNTS_ERR_DELETE_CONFIRM_REQUIRED.to_string());
    }
    match selection {
        Ok(value) => Ok(value),
        Err(err) if is_inquire_cancel(&err) => Err(CANCELLED_MESSAGE.to_string()),
        Err(err) => Err(crate::msg1(ACCOUNTS_ERR_PROMPT_DELETE, err)),
    }
}
