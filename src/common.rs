use chrono::{DateTime, SecondsFormat, Utc};
use directories::BaseDirs;
use std::env;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

#[cfg(test)]
use std::cell::Cell;
#[cfg(test)]
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::{
    COMMON_ERR_CREATE_APP_DIR, COMMON_ERR_CREATE_DIR, COMMON_ERR_CREATE_TEMP,
    COMMON_ERR_EXISTS_NOT_DIR, COMMON_ERR_EXISTS_NOT_FILE, COMMON_ERR_GET_TIME,
    COMMON_ERR_INVALID_FILE_NAME, COMMON_ERR_READ_FILE, COMMON_ERR_READ_METADATA,
    COMMON_ERR_REPLACE_FILE, COMMON_ERR_RESOLVE_HOME, COMMON_ERR_RESOLVE_PARENT,
    COMMON_ERR_SET_PERMISSIONS, COMMON_ERR_SET_TEMP_PERMISSIONS, COMMON_ERR_VERIFY_TEMP,
    COMMON_ERR_WRITE_TEMP,
};

pub const APP_DIR_NAME: &str = ".codex-switch";
pub const DEFAULT_SOURCE_DIR: &str = ".cli-proxy-api";
pub const DEFAULT_TARGET_FILE: &str = ".codex/auth.json";

#[derive(Clone, Debug)]
pub struct Paths {
    pub home: PathBuf,
    pub app: PathBuf,
    pub config: PathBuf,
    pub cache: PathBuf,
    pub state: PathBuf,
}

impl Paths {
    pub fn under_home(home: &Path) -> Self {
        let app = home.join(APP_DIR_NAME);
        Paths {
            home: home.to_path_buf(),
            config: app.join("config.json"),
            cache: app.join("cache.json"),
            state: app.join("state.json"),
            app,
        }
    }

    pub fn default_source_dir(&self) -> PathBuf {
        self.home.join(DEFAULT_SOURCE_DIR)
    }

    pub fn default_target_file(&self) -> PathBuf {
        self.home.join(DEFAULT_TARGET_FILE)
    }
}

pub fn command_name() -> &'static str {
    static COMMAND_NAME: OnceLock<String> = OnceLock::new();
    COMMAND_NAME
        .get_or_init(|| {
            let env_value = env::var("CODEX_SWITCH_COMMAND").ok();
            compute_command_name_from(env_value, env::args_os())
        })
        .as_str()
}

fn compute_command_name_from<I>(env_value: Option<String>, mut args: I) -> String
where
    I: Iterator<Item = std::ffi::OsString>,
{
    if let Some(value) = env_value {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    args.next()
        .and_then(|arg| {
            Path::new(&arg)
                .file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.to_string())
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| package_command_name().to_string())
}

pub fn package_command_name() -> &'static str {
    "codex-switch"
}

#[cfg(unix)]
const FAIL_SET_PERMISSIONS: usize = 1;
pub(crate) const FAIL_WRITE_OPEN: usize = 2;
pub(crate) const FAIL_WRITE_WRITE: usize = 3;
pub(crate) const FAIL_WRITE_PERMS: usize = 4;
pub(crate) const FAIL_WRITE_SYNC: usize = 5;
pub(crate) const FAIL_WRITE_VERIFY: usize = 6;
pub(crate) const FAIL_WRITE_RENAME: usize = 7;

#[cfg(test)]
thread_local! {
    static FAILPOINT: Cell<usize> = const { Cell::new(0) };
}
#[cfg(test)]
static FAILPOINT_LOCK: Mutex<()> = Mutex::new(());

#[cfg(test)]
fn maybe_fail(step: usize) -> std::io::Result<()> {
    if FAILPOINT.with(|failpoint| failpoint.get()) == step {
        return Err(std::io::Error::other("failpoint"));
    }
    Ok(())
}

#[cfg(not(test))]
fn maybe_fail(_step: usize) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
pub(crate) fn with_failpoint<F: FnOnce()>(step: usize, f: F) {
    let _guard = FAILPOINT_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let prev = FAILPOINT.with(|failpoint| {
        let prev = failpoint.get();
        failpoint.set(step);
        prev
    });
    f();
    FAILPOINT.with(|failpoint| failpoint.set(prev));
}

pub fn resolve_paths() -> Result<Paths, String> {
    let home_dir = resolve_home_dir().ok_or_else(|| COMMON_ERR_RESOLVE_HOME.to_string())?;
    Ok(Paths::under_home(&home_dir))
}

fn resolve_home_dir() -> Option<PathBuf> {
    let switch_home = env::var_os("CODEX_SWITCH_HOME").map(PathBuf::from);
    let base_home = BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf());
    let home = env::var_os("HOME").map(PathBuf::from);
    let userprofile = env::var_os("USERPROFILE").map(PathBuf::from);
    let homedrive = env::var_os("HOMEDRIVE").map(PathBuf::from);
    let homepath = env::var_os("HOMEPATH").map(PathBuf::from);
    resolve_home_dir_with(
        switch_home,
        base_home,
        home,
        userprofile,
        homedrive,
        homepath,
    )
}

fn resolve_home_dir_with(
    switch_home: Option<PathBuf>,
    base_home: Option<PathBuf>,
    home: Option<PathBuf>,
    userprofile: Option<PathBuf>,
    homedrive: Option<PathBuf>,
    homepath: Option<PathBuf>,
) -> Option<PathBuf> {
    if let Some(path) = non_empty_path(switch_home) {
        return Some(path);
    }
    if let Some(path) = base_home {
        return Some(path);
    }
    if let Some(path) = non_empty_path(home) {
        return Some(path);
    }
    if let Some(path) = non_empty_path(userprofile) {
        return Some(path);
    }
    match (homedrive, homepath) {
        (Some(drive), Some(path)) => {
            let mut out = drive;
            out.push(path);
            if out.as_os_str().is_empty() {
                None
            } else {
                Some(out)
            }
        }
        _ => None,
    }
}

fn non_empty_path(path: Option<PathBuf>) -> Option<PathBuf> {
    path.filter(|path| !path.as_os_str().is_empty())
}

pub fn ensure_paths(paths: &Paths) -> Result<(), String> {
    ensure_private_dir(&paths.app, COMMON_ERR_CREATE_APP_DIR)?;
    ensure_file_or_absent(&paths.config)?;
    ensure_file_or_absent(&paths.cache)?;
    ensure_file_or_absent(&paths.state)?;
    Ok(())
}

pub fn ensure_private_dir(dir: &Path, create_err: &str) -> Result<(), String> {
    if dir.exists() && !dir.is_dir() {
        return Err(crate::msg1(COMMON_ERR_EXISTS_NOT_DIR, dir.display()));
    }
    fs::create_dir_all(dir).map_err(|err| crate::msg2(create_err, dir.display(), err))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = fs::Permissions::from_mode(0o700);
        if let Err(err) = set_dir_permissions(dir, perms) {
            return Err(crate::msg2(COMMON_ERR_SET_PERMISSIONS, dir.display(), err));
        }
    }
    Ok(())
}

pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), String> {
    let permissions = fs::metadata(path).ok().map(|meta| meta.permissions());
    write_atomic_inner(path, contents, permissions, None)
}

pub fn write_atomic_with_mode(path: &Path, contents: &[u8], mode: u32) -> Result<(), String> {
    write_atomic_inner(path, contents, permissions_from_mode(mode), None)
}

pub fn write_atomic_verified<F>(path: &Path, contents: &[u8], verify: F) -> Result<(), String>
where
    F: Fn(&Path) -> Result<(), String>,
{
    let permissions = fs::metadata(path).ok().map(|meta| meta.permissions());
    write_atomic_inner(path, contents, permissions, Some(&verify))
}

#[cfg(unix)]
fn permissions_from_mode(mode: u32) -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn permissions_from_mode(_mode: u32) -> Option<fs::Permissions> {
    None
}

type Verify<'a> = &'a dyn Fn(&Path) -> Result<(), String>;

fn write_atomic_inner(
    path: &Path,
    contents: &[u8],
    permissions: Option<fs::Permissions>,
    verify: Option<Verify<'_>>,
) -> Result<(), String> {
    let parent = path
        .parent()
        .ok_or_else(|| crate::msg1(COMMON_ERR_RESOLVE_PARENT, path.display()))?;
    if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent)
            .map_err(|err| crate::msg2(COMMON_ERR_CREATE_DIR, parent.display(), err))?;
    }

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| crate::msg1(COMMON_ERR_INVALID_FILE_NAME, path.display()))?;
    let (tmp_path, tmp_file) = create_temp(path, parent, file_name, permissions.as_ref())?;
    let result = finish_temp(path, &tmp_path, tmp_file, contents, permissions, verify);
    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

fn create_temp(
    path: &Path,
    parent: &Path,
    file_name: &str,
    permissions: Option<&fs::Permissions>,
) -> Result<(PathBuf, File), String> {
    let pid = std::process::id();
    let mut attempt = 0u32;
    loop {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|err| crate::msg1(COMMON_ERR_GET_TIME, err))?
            .as_nanos();
        let tmp_path = parent.join(format!(".{file_name}.tmp-{pid}-{nanos}-{attempt}"));
        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        if let Some(permissions) = permissions {
            use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
            options.mode(permissions.mode());
        }
        #[cfg(not(unix))]
        let _ = permissions;
        match options.open(&tmp_path) {
            Ok(file) => {
                if let Err(err) = maybe_fail(FAIL_WRITE_OPEN) {
                    drop(file);
                    let _ = fs::remove_file(&tmp_path);
                    return Err(crate::msg2(COMMON_ERR_CREATE_TEMP, path.display(), err));
                }
                return Ok((tmp_path, file));
            }
            Err(err) => {
                attempt += 1;
                if attempt < 5 {
                    continue;
                }
                return Err(crate::msg2(COMMON_ERR_CREATE_TEMP, path.display(), err));
            }
        }
    }
}

fn finish_temp(
    path: &Path,
    tmp_path: &Path,
    mut tmp_file: File,
    contents: &[u8],
    permissions: Option<fs::Permissions>,
    verify: Option<Verify<'_>>,
) -> Result<(), String> {
    maybe_fail(FAIL_WRITE_WRITE)
        .and_then(|_| tmp_file.write_all(contents))
        .map_err(|err| crate::msg2(COMMON_ERR_WRITE_TEMP, path.display(), err))?;

    if let Some(permissions) = permissions {
        maybe_fail(FAIL_WRITE_PERMS)
            .and_then(|_| fs::set_permissions(tmp_path, permissions))
            .map_err(|err| crate::msg2(COMMON_ERR_SET_TEMP_PERMISSIONS, path.display(), err))?;
    }

    maybe_fail(FAIL_WRITE_SYNC)
        .and_then(|_| tmp_file.sync_all())
        .map_err(|err| crate::msg2(COMMON_ERR_WRITE_TEMP, path.display(), err))?;
    drop(tmp_file);

    if let Some(verify) = verify {
        maybe_fail(FAIL_WRITE_VERIFY)
            .map_err(|err| crate::msg2(COMMON_ERR_VERIFY_TEMP, path.display(), err))?;
        verify(tmp_path)?;
    }

    let rename_result = maybe_fail(FAIL_WRITE_RENAME).and_then(|_| fs::rename(tmp_path, path));
    match rename_result {
        Ok(()) => Ok(()),
        Err(err) => {
            #[cfg(windows)]
            {
                if path.exists() {
                    let _ = fs::remove_file(path);
                }
                if fs::rename(tmp_path, path).is_ok() {
                    return Ok(());
                }
            }
            Err(crate::msg2(COMMON_ERR_REPLACE_FILE, path.display(), err))
        }
    }
}

pub fn copy_atomic(source: &Path, dest: &Path) -> Result<(), String> {
    let permissions = fs::metadata(source)
        .map_err(|err| crate::msg2(COMMON_ERR_READ_METADATA, source.display(), err))?
        .permissions();
    let contents =
        fs::read(source).map_err(|err| crate::msg2(COMMON_ERR_READ_FILE, source.display(), err))?;
    write_atomic_inner(dest, &contents, Some(permissions), None)
}

fn ensure_file_or_absent(path: &Path) -> Result<(), String> {
    if path.exists() && !path.is_file() {
        return Err(crate::msg1(COMMON_ERR_EXISTS_NOT_FILE, path.display()));
    }
    Ok(())
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path, perms: fs::Permissions) -> std::io::Result<()> {
    maybe_fail(FAIL_SET_PERMISSIONS)?;
    fs::set_permissions(path, perms)
}

pub fn expand_path(input: &str, home: &Path) -> PathBuf {
    let trimmed = input.trim();
    let expanded = if trimmed == "~" {
        home.to_path_buf()
    } else if let Some(rest) = trimmed
        .strip_prefix("~/")
        .or_else(|| trimmed.strip_prefix("~\\"))
    {
        home.join(rest)
    } else {
        PathBuf::from(trimmed)
    };
    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        env::current_dir()
            .map(|cwd| cwd.join(&expanded))
            .unwrap_or(expanded)
    };
    normalize_lexically(&absolute)
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component.as_os_str());
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

pub fn format_path(path: &Path, home: &Path) -> String {
    match path.strip_prefix(home) {
        Ok(rest) if rest.as_os_str().is_empty() => "~".to_string(),
        Ok(rest) => format!("~/{}", rest.display()),
        Err(_) => path.display().to_string(),
    }
}

pub fn format_timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// Stand-in for secrets in logs and `Debug` output.
pub fn redact(secret: &str) -> String {
    format!("<redacted:{} chars>", secret.chars().count())
}

pub(crate) fn redact_opt(secret: &Option<String>) -> Option<String> {
    secret.as_deref().map(redact)
}
