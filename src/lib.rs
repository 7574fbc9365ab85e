use clap::{FromArgMatches, error::ErrorKind};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands, command_with_examples};

const LOG_ENV: &str = "CODEX_SWITCH_LOG";
const VERBOSE_FILTER: &str = "codex_switch=debug";

pub fn run_cli() {
    let args: Vec<std::ffi::OsString> = std::env::args_os().collect();
    if let Err(message) = run_cli_with_args(args) {
        eprintln!("{message}");
        std::process::exit(1);
    }
}

fn run_cli_with_args(args: Vec<std::ffi::OsString>) -> Result<(), String> {
    if args.len() == 1 {
        let name = package_command_name();
        println!("{name} {}", env!("CARGO_PKG_VERSION"));
        println!();
        let mut cmd = command_with_examples();
        let _ = cmd.print_help();
        println!();
        return Ok(());
    }
    let cmd = command_with_examples();
    let matches = match cmd.clone().try_get_matches_from(args) {
        Ok(matches) => matches,
        Err(err) => {
            if err.kind() == ErrorKind::DisplayHelp {
                let name = package_command_name();
                println!("{name} {}", env!("CARGO_PKG_VERSION"));
                println!();
                let _ = err.print();
                println!();
                return Ok(());
            }
            return Err(err.to_string());
        }
    };
    let cli = Cli::from_arg_matches(&matches).map_err(|err| err.to_string())?;
    init_tracing(cli.verbose);
    set_plain(cli.plain);
    if let Err(message) = run(cli) {
        if message == CANCELLED_MESSAGE {
            let message = format_cancel(use_color_stdout());
            print_output_block(&message);
            return Ok(());
        }
        return Err(message);
    }
    Ok(())
}

fn log_filter(verbose: bool) -> EnvFilter {
    if verbose {
        return EnvFilter::new(VERBOSE_FILTER);
    }
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
}

fn init_tracing(verbose: bool) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(log_filter(verbose))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run(cli: Cli) -> Result<(), String> {
    let paths = resolve_paths()?;
    ensure_paths(&paths)?;

    match cli.command {
        Commands::Login {
            plan,
            team_space,
            no_browser,
        } => login(
            &paths,
            LoginOptions {
                plan,
                team_space,
                open_browser: !no_browser,
                ..LoginOptions::default()
            },
        ),
        Commands::Ls { csv } => list_credentials(&paths, csv),
        Commands::Use {
            selector,
            no_backup,
        } => use_credential(&paths, required_selector(selector)?, !no_backup),
        Commands::Delete { selector, yes } => {
            delete_credential(&paths, required_selector(selector)?, yes)
        }
        Commands::Switch => switch_credential(&paths),
        Commands::Whoami => whoami(&paths),
        Commands::Config {
            source_dir,
            target_file,
            recursive,
        } => configure(
            &paths,
            ConfigUpdate {
                source_dir,
                target_file,
                recursive_scan: recursive,
            },
        ),
    }
}

fn required_selector(args: cli::SelectorArgs) -> Result<Selector, String> {
    args.into_selector()
        .ok_or_else(|| CLI_ERR_SELECTOR_REQUIRED.to_string())
}

mod accounts;
mod callback;
mod cli;
mod common;
mod config;
mod error;
mod login;
mod messages;
mod pkce;
mod scanner;
mod store;
#[cfg(test)]
mod test_utils;
mod ui;
mod updater;

pub(crate) use accounts::*;
pub(crate) use callback::*;
pub(crate) use common::*;
pub(crate) use config::*;
pub(crate) use login::*;
pub(crate) use messages::*;
pub(crate) use pkce::*;
pub(crate) use scanner::*;
pub(crate) use store::*;
pub(crate) use ui::*;
pub(crate) use updater::*;

pub use accounts::{Selector, apply_credential, lookup, refresh_catalog, remove_credential};
pub use callback::{CALLBACK_PATHS, CallbackListener, DEFAULT_CALLBACK_TIMEOUT};
pub use common::{Paths, expand_path, format_path, write_atomic};
pub use config::{Config, ConfigUpdate, apply_config_update, load_config, save_config};
pub use error::{OAuthError, UpdateError};
pub use login::{CredentialRecord, authorize, complete_login, credential_file_name};
pub use pkce::{
    OAuthConfig, OAuthSession, PkceCodes, TokenResponse, UserInfo, build_authorization_url,
    exchange_code_for_tokens, extract_user_info, generate_pkce, generate_state, parse_jwt_claims,
    pkce_challenge,
};
pub use scanner::{CREDENTIAL_TYPE, Credential, credential_key, scan};
pub use store::{
    ActiveState, CacheStore, JsonCacheStore, JsonStateStore, MemoryCacheStore, MemoryStateStore,
    StateStore, StateTracker, find_by_index, find_by_key,
};
pub use updater::{FIELD_MAPPING, UpdateOutcome, backup_path_for, update_target};
