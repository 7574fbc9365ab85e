use colored::Colorize;
use inquire::{Select, Text};
use serde::Serialize;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::{
    CREDENTIAL_TYPE, CacheStore, CallbackListener, Config, JsonCacheStore, LOGIN_BROWSER_HINT,
    LOGIN_ERR_MISSING_ACCOUNT, LOGIN_ERR_MISSING_EMAIL, LOGIN_ERR_MISSING_ID_TOKEN,
    LOGIN_ERR_OAUTH, LOGIN_ERR_SERIALIZE, LOGIN_ERR_SOURCE_NOT_DIR, LOGIN_ERR_WRITE,
    LOGIN_MSG_SUCCESS, LOGIN_OPEN_URL, LOGIN_PLAN_OPTIONS, LOGIN_PROMPT_PLAN,
    LOGIN_PROMPT_TEAM_SPACE, LOGIN_WAITING, LOGIN_WARN_BROWSER, LOGIN_WARN_RESCAN,
    COMMON_ERR_CREATE_DIR, OAuthConfig, OAuthError, OAuthSession, Paths, TokenResponse,
    build_authorization_url, ensure_private_dir, exchange_code_for_tokens, extract_user_info,
    format_action, format_path, format_warning, handle_inquire_result,
    inquire_select_render_config, load_config_or_default, now_timestamp, parse_jwt_claims,
    print_output_block, scan, style_text, use_color_stderr, use_color_stdout,
    write_atomic_with_mode,
};

pub const DEFAULT_LOGIN_TIMEOUT: Duration = crate::DEFAULT_CALLBACK_TIMEOUT;
const TEAM_PLAN: &str = "team";
const CREDENTIAL_FILE_MODE: u32 = 0o600;

#[derive(Debug, Clone)]
pub struct LoginOptions {
    pub plan: Option<String>,
    pub team_space: Option<String>,
    pub open_browser: bool,
    pub timeout: Duration,
}

impl Default for LoginOptions {
    fn default() -> Self {
        LoginOptions {
            plan: None,
            team_space: None,
            open_browser: true,
            timeout: DEFAULT_LOGIN_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginSummary {
    pub email: String,
    pub plan: String,
    pub team_space: Option<String>,
    pub file: PathBuf,
    pub index: Option<String>,
}

#[derive(Serialize)]
pub struct CredentialRecord {
    id_token: String,
    access_token: Option<String>,
    refresh_token: Option<String>,
    account_id: String,
    email: String,
    #[serde(rename = "type")]
    kind: &'static str,
    plan: String,
    last_refresh: String,
    expired: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    team_space: Option<String>,
}

pub fn login(paths: &Paths, options: LoginOptions) -> Result<(), String> {
    let config = load_config_or_default(paths)?;
    let is_tty = io::stdin().is_terminal();
    let plan = match options.plan.as_deref().map(str::trim) {
        Some(plan) if !plan.is_empty() => Some(plan.to_ascii_lowercase()),
        _ if is_tty => Some(prompt_plan()?),
        _ => None,
    };
    let team_space = match (plan.as_deref(), options.team_space) {
        (_, Some(space)) => Some(space),
        (Some(TEAM_PLAN), None) if is_tty => Some(prompt_team_space()?),
        _ => None,
    };

    let oauth = OAuthConfig::from_env();
    let open_browser = options.open_browser;
    let tokens = authorize(&oauth, options.timeout, |url, _port| {
        present_authorization_url(url, open_browser)
    })
    .map_err(|err| crate::msg1(LOGIN_ERR_OAUTH, err))?;

    let cache = JsonCacheStore::for_paths(paths);
    let summary = complete_login(
        &tokens,
        &config,
        plan.as_deref(),
        team_space.as_deref(),
        &cache,
    )?;
    print_output_block(&format_login_summary(&summary, &paths.home));
    Ok(())
}

pub fn authorize<F>(
    oauth: &OAuthConfig,
    timeout: Duration,
    present: F,
) -> Result<TokenResponse, OAuthError>
where
    F: FnOnce(&str, u16),
{
    let session = OAuthSession::new(oauth.callback_port);
    let listener = CallbackListener::start(&session.state, session.listener_port)?;
    let url = build_authorization_url(oauth, &session.state, &session.pkce.challenge);
    present(&url, listener.port());
    let code = listener.wait_for_code(timeout);
    drop(listener);
    exchange_code_for_tokens(oauth, &code?, &session.pkce.verifier)
}

pub fn complete_login<C: CacheStore>(
    tokens: &TokenResponse,
    config: &Config,
    plan: Option<&str>,
    team_space: Option<&str>,
    cache: &C,
) -> Result<LoginSummary, String> {
    let Some(id_token) = tokens.id_token.as_deref() else {
        return Err(LOGIN_ERR_MISSING_ID_TOKEN.to_string());
    };
    let claims = parse_jwt_claims(id_token).map_err(|err| crate::msg1(LOGIN_ERR_OAUTH, err))?;
    let info = extract_user_info(&claims);
    let email = info
        .email
        .ok_or_else(|| LOGIN_ERR_MISSING_EMAIL.to_string())?;
    let account_id = info
        .account_id
        .ok_or_else(|| LOGIN_ERR_MISSING_ACCOUNT.to_string())?;
    let plan = plan
        .map(str::to_string)
        .unwrap_or_else(|| info.plan_type.to_ascii_lowercase());
    let team_space = team_space
        .map(str::trim)
        .filter(|space| plan == TEAM_PLAN && !space.is_empty())
        .map(str::to_string);

    let file_name = credential_file_name(&plan, team_space.as_deref(), &email);
    let record = CredentialRecord::new(
        tokens,
        email.clone(),
        account_id,
        plan.clone(),
        team_space.clone(),
    );
    let file = save_credential(&config.source_dir, &file_name, &record)?;

    let index = match scan(&config.source_dir, config.recursive_scan)
        .and_then(|credentials| cache.save(&credentials).map(|_| credentials))
    {
        Ok(credentials) => credentials
            .into_iter()
            .find(|credential| credential.path == file_name)
            .map(|credential| credential.index),
        Err(err) => {
            let warning = format_warning(&crate::msg1(LOGIN_WARN_RESCAN, err), use_color_stderr());
            eprintln!("{warning}");
            None
        }
    };

    Ok(LoginSummary {
        email,
        plan,
        team_space,
        file,
        index,
    })
}

impl CredentialRecord {
    fn new(
        tokens: &TokenResponse,
        email: String,
        account_id: String,
        plan: String,
        team_space: Option<String>,
    ) -> Self {
        let now = chrono::Utc::now();
        let expired = tokens
            .expires_in
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(chrono::TimeDelta::try_seconds)
            .and_then(|delta| now.checked_add_signed(delta))
            .map(crate::format_timestamp);
        CredentialRecord {
            id_token: tokens.id_token.clone().unwrap_or_default(),
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
            account_id,
            email,
            kind: CREDENTIAL_TYPE,
            plan,
            last_refresh: crate::format_timestamp(now),
            expired,
            team_space,
        }
    }
}

pub fn credential_file_name(plan: &str, team_space: Option<&str>, email: &str) -> String {
    let plan = sanitize_filename_part(plan);
    let mut parts = vec![CREDENTIAL_TYPE.to_string(), plan.clone()];
    if plan == TEAM_PLAN
        && let Some(space) = team_space.map(sanitize_filename_part)
        && !space.is_empty()
    {
        parts.push(space);
    }
    let email = sanitize_filename_part(email);
    parts.push(if email.is_empty() {
        "unknown".to_string()
    } else {
        email
    });
    format!("{}.json", parts.join("-"))
}

pub fn sanitize_filename_part(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.trim().chars() {
        let ch = if matches!(ch, '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|')
            || ch.is_whitespace()
        {
            '_'
        } else {
            ch
        };
        if ch == '_' && out.ends_with('_') {
            continue;
        }
        out.extend(ch.to_lowercase());
    }
    out.trim_matches('_').to_string()
}

pub fn save_credential(
    dir: &Path,
    file_name: &str,
    record: &CredentialRecord,
) -> Result<PathBuf, String> {
    if !dir.exists() {
        ensure_private_dir(dir, COMMON_ERR_CREATE_DIR)?;
    } else if !dir.is_dir() {
        return Err(crate::msg1(LOGIN_ERR_SOURCE_NOT_DIR, dir.display()));
    }
    let path = dir.join(file_name);
    let json =
        serde_json::to_string_pretty(record).map_err(|err| crate::msg1(LOGIN_ERR_SERIALIZE, err))?;
    write_atomic_with_mode(&path, format!("{json}\n").as_bytes(), CREDENTIAL_FILE_MODE)
        .map_err(|err| crate::msg1(LOGIN_ERR_WRITE, err))?;
    debug!(file = %path.display(), "credential file written");
    Ok(path)
}

fn prompt_plan() -> Result<String, String> {
    let prompt = Select::new(LOGIN_PROMPT_PLAN, LOGIN_PLAN_OPTIONS.to_vec())
        .with_render_config(inquire_select_render_config())
        .prompt();
    handle_inquire_result(prompt, "plan").map(str::to_string)
}

fn prompt_team_space() -> Result<String, String> {
    let prompt = Text::new(LOGIN_PROMPT_TEAM_SPACE)
        .with_render_config(inquire_select_render_config())
        .prompt();
    handle_inquire_result(prompt, "team space").map(|space| space.trim().to_string())
}

fn present_authorization_url(url: &str, open_browser: bool) {
    let message = authorization_prompt(url, open_browser, |url| open::that(url));
    print_output_block(&message);
}

fn authorization_prompt<F>(url: &str, open_browser: bool, opener: F) -> String
where
    F: FnOnce(&str) -> io::Result<()>,
{
    let use_color = use_color_stdout();
    let mut message = format!("{LOGIN_OPEN_URL}\n{url}");
    if open_browser {
        match opener(url) {
            Ok(()) => {
                message.push('\n');
                message.push_str(&style_text(LOGIN_BROWSER_HINT, use_color, |text| {
                    text.dimmed().italic()
                }));
            }
            Err(err) => {
                warn!(error = %err, "could not launch a browser");
                let warning =
                    format_warning(&crate::msg1(LOGIN_WARN_BROWSER, err), use_color_stderr());
                eprintln!("{warning}");
            }
        }
    }
    message.push('\n');
    message.push_str(&style_text(LOGIN_WAITING, use_color, |text| text.dimmed()));
    message
}

fn format_login_summary(summary: &LoginSummary, home: &Path) -> String {
    let use_color = use_color_stdout();
    let mut lines = vec![format_action(
        &crate::msg1(LOGIN_MSG_SUCCESS, &summary.email),
        use_color,
    )];
    lines.push(format!("Plan: {}", summary.plan));
    if let Some(space) = summary.team_space.as_deref() {
        lines.push(format!("Team space: {space}"));
    }
    lines.push(format!("File: {}", format_path(&summary.file, home)));
    if let Some(index) = summary.index.as_deref() {
        lines.push(format!("Index: {index}"));
    }
    lines.join("\n")
}
