pub const CANCELLED_MESSAGE: &str = "Cancelled.";

pub const COMMON_ERR_RESOLVE_HOME: &str = "Error: Could not resolve home directory.";
pub const COMMON_ERR_CREATE_APP_DIR: &str = "Error: Cannot create app directory {}: {}";
pub const COMMON_ERR_CREATE_DIR: &str = "Error: Cannot create directory {}: {}";
pub const COMMON_ERR_EXISTS_NOT_DIR: &str = "Error: {} exists and is not a directory";
pub const COMMON_ERR_EXISTS_NOT_FILE: &str = "Error: {} exists and is not a file";
pub const COMMON_ERR_SET_PERMISSIONS: &str = "Error: Cannot set permissions on {}: {}";
pub const COMMON_ERR_RESOLVE_PARENT: &str = "Error: Cannot resolve parent directory for {}";
pub const COMMON_ERR_INVALID_FILE_NAME: &str = "Error: Invalid file name {}";
pub const COMMON_ERR_GET_TIME: &str = "Error: Failed to get time: {}";
pub const COMMON_ERR_CREATE_TEMP: &str = "Error: Failed to create temp file for {}: {}";
pub const COMMON_ERR_WRITE_TEMP: &str = "Error: Failed to write temp file for {}: {}";
pub const COMMON_ERR_SET_TEMP_PERMISSIONS: &str =
    "Error: Failed to set temp file permissions for {}: {}";
pub const COMMON_ERR_VERIFY_TEMP: &str = "Error: Failed to verify temp file for {}: {}";
pub const COMMON_ERR_REPLACE_FILE: &str = "Error: Failed to replace {}: {}";
pub const COMMON_ERR_READ_METADATA: &str = "Error: Failed to read metadata for {}: {}";
pub const COMMON_ERR_READ_FILE: &str = "Error: Could not read {}: {}";

pub const SCAN_ERR_NOT_DIR: &str = "Error: {} is not a directory";
pub const SCAN_ERR_READ_DIR: &str = "Error: Cannot read credentials directory {}: {}";

pub const STORE_ERR_READ_CACHE: &str = "Error: Cannot read credential cache {}: {}";
pub const STORE_ERR_READ_STATE: &str = "Error: Cannot read active state {}: {}";
pub const STORE_ERR_SERIALIZE_CACHE: &str = "Error: Could not serialize credential cache: {}";
pub const STORE_ERR_SERIALIZE_STATE: &str = "Error: Could not serialize active state: {}";
pub const STORE_ERR_WRITE_CACHE: &str = "Error: Could not write credential cache: {}";
pub const STORE_ERR_WRITE_STATE: &str = "Error: Could not write active state: {}";

pub const CONFIG_ERR_READ: &str = "Error: Could not read config file {}: {}";
pub const CONFIG_ERR_INVALID_JSON: &str = "Error: Invalid config file {}: {}";
pub const CONFIG_ERR_SERIALIZE: &str = "Error: Could not serialize config: {}";
pub const CONFIG_ERR_WRITE: &str = "Error: Could not write config: {}";
pub const CONFIG_ERR_SOURCE_MISSING: &str = "Error: Source directory {} does not exist";
pub const CONFIG_ERR_SOURCE_NOT_DIR: &str = "Error: {} is not a directory";

pub const LOGIN_PROMPT_PLAN: &str = "Select a plan";
pub const LOGIN_PLAN_OPTIONS: [&str; 2] = ["plus", "team"];
pub const LOGIN_PROMPT_TEAM_SPACE: &str = "Team space name (leave empty to skip)";
pub const LOGIN_OPEN_URL: &str = "Open this URL to sign in:";
pub const LOGIN_BROWSER_HINT: &str = "A browser window should open automatically.";
pub const LOGIN_WAITING: &str = "Waiting for the sign-in to finish...";
pub const LOGIN_WARN_BROWSER: &str = "Could not open a browser: {}";
pub const LOGIN_WARN_RESCAN: &str = "Credential saved, but the cache could not be refreshed: {}";
pub const LOGIN_MSG_SUCCESS: &str = "Logged in as {}";
pub const LOGIN_ERR_OAUTH: &str = "Error: Login failed: {}";
pub const LOGIN_ERR_MISSING_ID_TOKEN: &str =
    "Error: Login failed: the token response did not include an id token.";
pub const LOGIN_ERR_MISSING_EMAIL: &str = "Error: Login failed: the id token has no email claim.";
pub const LOGIN_ERR_MISSING_ACCOUNT: &str =
    "Error: Login failed: the id token has no account id claim.";
pub const LOGIN_ERR_SOURCE_NOT_DIR: &str = "Error: Source directory {} is not a directory";
pub const LOGIN_ERR_SERIALIZE: &str = "Error: Could not serialize credential: {}";
pub const LOGIN_ERR_WRITE: &str = "Error: Could not write credential file: {}";

pub const ACCOUNTS_MSG_COUNT: &str = "Credentials: {}";
pub const ACCOUNTS_MSG_NONE_FOUND: &str = "No credentials found in {}. {}";
pub const ACCOUNTS_MSG_CSV_WRITTEN: &str = "Exported CSV to {}";
pub const ACCOUNTS_MSG_SWITCHED: &str = "Switched to {}";
pub const ACCOUNTS_MSG_ALREADY_ACTIVE: &str = "{} is already active. Nothing to do.";
pub const ACCOUNTS_MSG_DELETED: &str = "Deleted {}";
pub const ACCOUNTS_MSG_CLEARED_ACTIVE: &str = "It was the active credential; active state cleared.";
pub const ACCOUNTS_MSG_REMAINING: &str = "Remaining credentials: {}";
pub const ACCOUNTS_MSG_CONFIG_SAVED: &str = "Config saved";
pub const ACCOUNTS_STATUS_NONE_SELECTED: &str = "No credential selected (none selected).";
pub const ACCOUNTS_STATUS_STALE: &str = "Active index {} is no longer valid. {}";
pub const ACCOUNTS_SWITCH_TITLE: &str = "Select a credential";
pub const ACCOUNTS_SWITCH_HELP: &str = "↑/↓ to move, enter to switch, esc to cancel";
pub const ACCOUNTS_PROMPT_DELETE: &str = "Delete {}? This cannot be undone.";
pub const ACCOUNTS_ERR_INDEX_NOT_FOUND: &str = "Error: No credential with index {}. {}";
pub const ACCOUNTS_ERR_KEY_NOT_FOUND: &str = "Error: No credential with key {}. {}";
pub const ACCOUNTS_ERR_READ_SOURCE: &str = "Error: Could not read credential file {}: {}";
pub const ACCOUNTS_ERR_INVALID_SOURCE: &str = "Error: Invalid JSON in credential file {}: {}";
pub const ACCOUNTS_ERR_UPDATE: &str = "Error: Could not switch credential: {}";
pub const ACCOUNTS_ERR_FILE_MISSING: &str = "Error: Credential file {} no longer exists. {}";
pub const ACCOUNTS_ERR_DELETE: &str = "Error: Could not delete {}: {}";
pub const ACCOUNTS_ERR_WRITE_CSV: &str = "Error: Could not write CSV export: {}";
pub const ACCOUNTS_ERR_TTY_REQUIRED: &str =
    "Error: {} selection requires a TTY. Run `{} {}` interactively.";
pub const ACCOUNTS_ERR_DELETE_CONFIRM_REQUIRED: &str =
    "Error: Deletion requires confirmation. Re-run with `--yes` to skip the prompt.";
pub const ACCOUNTS_ERR_PROMPT_DELETE: &str = "Error: Could not prompt for delete: {}";

pub const CLI_ERR_SELECTOR_REQUIRED: &str = "Error: Pass an index or `--key`.";

pub const PROMPT_ERR_CONTEXT: &str = "Error: Could not prompt for {}: {}";

pub const UI_WARNING_PREFIX: &str = "Warning: ";
pub const UI_INFO_PREFIX: &str = "Info: {}";
pub const UI_HINT_LIST: &str = "Run {list} to see available credentials.";
pub const UI_HINT_LOGIN: &str = "Run {login} to add one.";
pub const UI_CURRENT_MARKER: &str = " (current)";
pub const UI_UNKNOWN_EMAIL: &str = "<unknown email>";

pub fn msg1(template: &str, a: impl std::fmt::Display) -> String {
    template.replacen("{}", &a.to_string(), 1)
}

pub fn msg2(template: &str, a: impl std::fmt::Display, b: impl std::fmt::Display) -> String {
    let out = template.replacen("{}", &a.to_string(), 1);
    out.replacen("{}", &b.to_string(), 1)
}

pub fn msg3(
    template: &str,
    a: impl std::fmt::Display,
    b: impl std::fmt::Display,
    c: impl std::fmt::Display,
) -> String {
    let out = template.replacen("{}", &a.to_string(), 1);
    let out = out.replacen("{}", &b.to_string(), 1);
    out.replacen("{}", &c.to_string(), 1)
}
