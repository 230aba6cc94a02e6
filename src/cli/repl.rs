//! REPL (Read-Eval-Print Loop) for interactive chat

use std::borrow::Cow::{self, Borrowed, Owned};
use std::path::PathBuf;

use anyhow::Result;
use colored::Colorize;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};

use aura::services::conversation::truncate_title;
use aura::services::{
    Confirmation, Dispatch, SessionController, SessionError, SessionEvent, SessionMsg,
};
use aura::services::AppSettings;

use super::render;

const COMMANDS: &[&str] = &[
    "/new", "/open", "/list", "/show", "/rename", "/delete", "/help", "/quit",
];

/// Completion and hints for slash commands.
struct ReplHelper;

impl Helper for ReplHelper {}

impl Completer for ReplHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];
        if !line.starts_with('/') || line.contains(' ') {
            return Ok((0, vec![]));
        }
        let candidates = COMMANDS
            .iter()
            .filter(|cmd| cmd.starts_with(line))
            .map(|cmd| Pair {
                display: cmd.to_string(),
                replacement: cmd.to_string(),
            })
            .collect();
        Ok((0, candidates))
    }
}

impl Highlighter for ReplHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.starts_with('/') {
            Owned(line.bright_cyan().to_string())
        } else {
            Borrowed(line)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Hinter for ReplHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let line = &line[..pos];
        if !line.starts_with('/') || line.contains(' ') {
            return None;
        }
        COMMANDS
            .iter()
            .find(|cmd| cmd.starts_with(line) && cmd.len() > line.len())
            .map(|cmd| cmd[line.len()..].to_string())
    }
}

impl Validator for ReplHelper {}

/// A slash command typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ReplCommand {
    New(Option<String>),
    Open(String),
    List,
    Show,
    Rename(String),
    Delete,
    Help,
    Quit,
    Unknown(String),
}

fn parse_command(line: &str) -> ReplCommand {
    let (name, arg) = match line.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (line, ""),
    };
    let arg = Some(arg.to_string()).filter(|a| !a.is_empty());
    match (name, arg) {
        ("/new", title) => ReplCommand::New(title),
        ("/open", Some(id)) => ReplCommand::Open(id),
        ("/list" | "/ls", _) => ReplCommand::List,
        ("/show", _) => ReplCommand::Show,
        ("/rename", Some(title)) => ReplCommand::Rename(title),
        ("/delete", _) => ReplCommand::Delete,
        ("/help" | "/h" | "/?", _) => ReplCommand::Help,
        ("/quit" | "/exit" | "/q", _) => ReplCommand::Quit,
        _ => ReplCommand::Unknown(line.to_string()),
    }
}

pub struct ChatRepl {
    ctl: SessionController,
    settings: AppSettings,
    history_path: Option<PathBuf>,
}

impl ChatRepl {
    pub fn new(ctl: SessionController, settings: AppSettings) -> Self {
        Self {
            ctl,
            settings,
            history_path: None,
        }
    }

    pub fn with_history(mut self, path: PathBuf) -> Self {
        self.history_path = Some(path);
        self
    }

    /// Run the interactive REPL, optionally opening `initial` first.
    pub async fn run(&mut self, initial: Option<String>) -> Result<()> {
        let mut rl: Editor<ReplHelper, DefaultHistory> = Editor::new()?;
        rl.set_helper(Some(ReplHelper));
        if let Some(path) = &self.history_path {
            let _ = rl.load_history(path);
        }

        self.print_welcome();
        self.exec(SessionMsg::List).await;
        match initial {
            Some(id) => {
                if self.exec(SessionMsg::Open(id)).await {
                    self.print_messages();
                }
            }
            None => self.print_list(),
        }

        loop {
            let readline = rl.readline(&self.prompt());
            match readline {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(line);

                    if line.starts_with('/') {
                        if self.handle_command(&mut rl, line).await {
                            break;
                        }
                        continue;
                    }
                    self.send(line).await;
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!("Bye!");
                    break;
                }
                Err(err) => {
                    eprintln!("{}", render::error(&anyhow::anyhow!("{}", err)));
                    break;
                }
            }
        }

        if let Some(path) = &self.history_path {
            let _ = rl.save_history(path);
        }
        Ok(())
    }

    fn prompt(&self) -> String {
        match self.ctl.state().active_conversation() {
            Some(conv) => format!("{}> ", truncate_title(&conv.title)),
            None => "new> ".to_string(),
        }
    }

    fn print_welcome(&self) {
        println!();
        println!("{}", format!("Aura - {}", self.settings.api_base_url).bold());
        println!(
            "{}",
            render::notice("Type a message to chat, /help for commands, Ctrl-C while waiting to stop.")
        );
        println!();
        print!("{}", render::greeting(self.settings.render_markdown));
        println!();
    }

    fn print_help(&self) {
        println!();
        println!("Commands:");
        println!("  /new [title]      - Start a new conversation");
        println!("  /open <id>        - Open a conversation");
        println!("  /list             - List conversations");
        println!("  /show             - Print the current conversation");
        println!("  /rename <title>   - Rename the current conversation");
        println!("  /delete           - Delete the current conversation");
        println!("  /quit, /exit, /q  - Exit chat");
        println!();
    }

    fn print_list(&self) {
        print!(
            "{}",
            render::conversation_list(&self.ctl.state().conversations(), self.ctl.state().active_id())
        );
    }

    fn print_messages(&self) {
        let state = self.ctl.state();
        if let Some(conv) = state.active_conversation() {
            print!("{}", render::conversation_header(conv));
        }
        if state.messages().is_empty() {
            println!("{}", render::notice("No messages yet."));
        } else {
            println!(
                "{}",
                render::messages(state.messages(), self.settings.render_markdown)
            );
        }
    }

    /// Handle slash commands. Returns true if should exit.
    async fn handle_command(&mut self, rl: &mut Editor<ReplHelper, DefaultHistory>, line: &str) -> bool {
        match parse_command(line) {
            ReplCommand::Quit => {
                println!("Bye!");
                return true;
            }
            ReplCommand::Help => self.print_help(),
            ReplCommand::New(None) => {
                self.exec(SessionMsg::Compose).await;
                println!("{}", render::notice("Your next message starts a new conversation."));
            }
            ReplCommand::New(Some(title)) => {
                self.exec(SessionMsg::Create(title)).await;
            }
            ReplCommand::Open(id) => {
                if self.exec(SessionMsg::Open(id)).await {
                    self.print_messages();
                }
            }
            ReplCommand::List => {
                self.exec(SessionMsg::List).await;
                self.print_list();
            }
            ReplCommand::Show => self.print_messages(),
            ReplCommand::Rename(title) => match self.ctl.state().active_id() {
                Some(id) => {
                    let id = id.to_string();
                    self.exec(SessionMsg::Rename { id, title }).await;
                }
                None => println!("{}", render::notice("No conversation is open.")),
            },
            ReplCommand::Delete => {
                let Some(conv) = self.ctl.state().active_conversation() else {
                    println!("{}", render::notice("No conversation is open."));
                    return false;
                };
                let (id, title) = (conv.id.clone(), conv.title.clone());
                let confirmation = if self.settings.confirm_delete {
                    confirm(rl, &format!("Delete \"{}\"? [y/N] ", title))
                } else {
                    Confirmation::Confirmed
                };
                self.exec(SessionMsg::Delete { id, confirmation }).await;
            }
            ReplCommand::Unknown(cmd) => {
                println!("Unknown command: {}", cmd);
                println!("Type /help for available commands");
            }
        }
        false
    }

    async fn send(&mut self, text: &str) {
        match self.ctl.update(SessionMsg::Send(text.to_string())) {
            Ok(_) => {}
            Err(e) => {
                self.report(e);
                return;
            }
        }
        match self.wait().await {
            Ok(SessionEvent::ReplyReceived { .. }) => {
                if let Some(reply) = self.ctl.state().messages().last() {
                    println!("{}", render::message(reply, self.settings.render_markdown));
                }
            }
            Ok(SessionEvent::SendCancelled) => {
                println!("{}", render::notice("Stopped. The message was not delivered."));
            }
            Ok(other) => self.announce(&other),
            Err(e) => {
                self.report(e);
                println!("{}", render::notice("The message was not delivered; send it again to retry."));
            }
        }
    }

    /// Apply `msg` and wait for its completion. Returns false on error,
    /// which has already been reported.
    async fn exec(&mut self, msg: SessionMsg) -> bool {
        let outcome = match self.ctl.update(msg) {
            Ok(Dispatch::Issued) => self.wait().await.map(Some),
            Ok(Dispatch::Applied | Dispatch::Skipped) => Ok(None),
            Err(e) => Err(e),
        };
        match outcome {
            Ok(Some(event)) => {
                self.announce(&event);
                true
            }
            Ok(None) => true,
            Err(e) => {
                self.report(e);
                false
            }
        }
    }

    /// Wait for the next completion. Ctrl-C stops an in-flight send.
    async fn wait(&mut self) -> Result<SessionEvent, SessionError> {
        loop {
            let next = tokio::select! {
                cmd = self.ctl.next_cmd() => Some(cmd),
                _ = tokio::signal::ctrl_c() => None,
            };
            match next {
                Some(Some(cmd)) => return self.ctl.update_cmd(cmd),
                Some(None) => {
                    return Err(SessionError::Unavailable("session closed".to_string()))
                }
                None => {
                    self.ctl.update(SessionMsg::Stop)?;
                }
            }
        }
    }

    fn announce(&self, event: &SessionEvent) {
        let text = match event {
            SessionEvent::ConversationCreated(id) => format!("Created conversation {}.", id),
            SessionEvent::ConversationRenamed(id) => format!("Renamed conversation {}.", id),
            SessionEvent::ConversationDeleted(id) => format!("Deleted conversation {}.", id),
            SessionEvent::ReplyDiscarded { conversation_id } => {
                format!("A reply arrived for conversation {}.", conversation_id)
            }
            _ => return,
        };
        println!("{}", render::notice(&text));
    }

    fn report(&self, err: SessionError) {
        let hint = matches!(err, SessionError::Unauthorized);
        eprintln!("{}", render::error(&err.into()));
        if hint {
            eprintln!("{}", render::notice("Run `aura login` to sign in."));
        }
    }
}

fn confirm(rl: &mut Editor<ReplHelper, DefaultHistory>, question: &str) -> Confirmation {
    match rl.readline(question) {
        Ok(answer) if matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") => {
            Confirmation::Confirmed
        }
        _ => Confirmation::Declined,
    }
}
