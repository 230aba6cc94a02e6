//! CLI command definitions

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "aura")]
#[command(author, version, about = "Chat with the Aura assistant from the terminal")]
#[command(long_about = r#"
Aura keeps your conversations with the assistant on the server and lets you
browse, continue, rename and delete them from the terminal.

Settings are resolved in priority order:
1. Command line flags (--api-url, --timeout)
2. Environment (AURA_API_URL, AURA_REQUEST_TIMEOUT)
3. Stored settings (see `aura config`)

Example:
  aura login --email sam@example.com
  aura send "Recommend a movie for a rainy evening"
  aura chat
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Assistant API base URL
    #[arg(long, value_name = "URL", global = true)]
    pub api_url: Option<String>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS", global = true)]
    pub timeout: Option<u64>,

    /// Keep the session token in the local database instead of the
    /// Secret Service
    #[arg(long, global = true)]
    pub no_keyring: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Sign in and remember the session
    Login {
        #[arg(long)]
        email: Option<String>,

        #[arg(long, env = "AURA_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Create an account and sign in
    Register {
        #[arg(long)]
        username: Option<String>,

        #[arg(long)]
        email: Option<String>,

        #[arg(long, env = "AURA_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Forget the stored session
    Logout,

    /// List conversations, most recent first
    List {
        /// Only show conversations whose title contains this text
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Print a conversation
    Show { id: String },

    /// Create an empty conversation
    New { title: String },

    /// Rename a conversation
    Rename { id: String, title: String },

    /// Delete a conversation
    Delete {
        id: String,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Send one message and print the reply
    Send {
        /// Conversation to continue; a new one is created when omitted
        #[arg(long, value_name = "ID")]
        chat: Option<String>,

        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Export a conversation as Markdown
    Export {
        id: String,

        /// Write to a file instead of stdout
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// Interactive chat (the default)
    Chat {
        /// Conversation to open on start
        id: Option<String>,
    },

    /// Show or change stored settings. --api-url and --timeout given with
    /// this command are saved.
    Config {
        #[arg(long, value_name = "BOOL")]
        render_markdown: Option<bool>,

        #[arg(long, value_name = "BOOL")]
        confirm_delete: Option<bool>,
    },
}
