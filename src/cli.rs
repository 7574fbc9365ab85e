use clap::{Args, Command, CommandFactory, Parser, Subcommand};

use crate::{Selector, command_name};

#[derive(Parser)]
#[command(author, version, about, color = clap::ColorChoice::Never)]
pub struct Cli {
    /// Disable styling and separators
    #[arg(long, global = true)]
    pub plain: bool,
    /// Log debug details to stderr
    #[arg(long, short, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in through the browser and save a new credential
    Login {
        /// Plan to record for the credential (plus or team)
        #[arg(long, value_name = "plan")]
        plan: Option<String>,
        /// Team space name, recorded for team plans only
        #[arg(long, value_name = "name")]
        team_space: Option<String>,
        /// Print the sign-in URL without opening a browser
        #[arg(long)]
        no_browser: bool,
    },
    /// Rescan the source directory and list credentials
    Ls {
        /// Also export the list as CSV to this file
        #[arg(long, value_name = "file")]
        csv: Option<String>,
    },
    /// Write a credential into the target auth file
    Use {
        #[command(flatten)]
        selector: SelectorArgs,
        /// Skip the backup of the target file
        #[arg(long)]
        no_backup: bool,
    },
    /// Delete a credential file
    Delete {
        #[command(flatten)]
        selector: SelectorArgs,
        /// Skip delete confirmation
        #[arg(long)]
        yes: bool,
    },
    /// Pick a credential from the interactive list
    Switch,
    /// Show the configuration and the active credential
    Whoami,
    /// Show or change the configuration
    Config {
        /// Directory holding credential files
        #[arg(long, value_name = "dir")]
        source_dir: Option<String>,
        /// Auth file that receives the selected credential
        #[arg(long, value_name = "file")]
        target_file: Option<String>,
        /// Scan subdirectories of the source directory
        #[arg(long, value_name = "bool")]
        recursive: Option<bool>,
    },
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct SelectorArgs {
    /// Select by list index
    #[arg(value_name = "index")]
    pub index: Option<String>,
    /// Select by stable key
    #[arg(long, value_name = "key")]
    pub key: Option<String>,
}

impl SelectorArgs {
    pub fn into_selector(self) -> Option<Selector> {
        match (self.index, self.key) {
            (Some(index), _) => Some(Selector::Index(index)),
            (None, Some(key)) => Some(Selector::Key(key)),
            (None, None) => None,
        }
    }
}

pub fn command_with_examples() -> Command {
    let name = command_name();
    let mut cmd = Cli::command();
    cmd.set_bin_name(name);
    cmd = cmd.after_help(examples_root(name));
    cmd
}

fn examples_root(name: &str) -> String {
    format!(
        "Examples:\n  {name} login --plan team --team-space core\n  {name} ls\n  {name} ls --csv ~/credentials.csv\n  {name} use 2\n  {name} use --key 3f2a9c1b7d4e\n  {name} delete 2 --yes\n  {name} switch\n  {name} whoami\n  {name} config --source-dir ~/.cli-proxy-api --recursive true"
    )
}
