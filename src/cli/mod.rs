pub mod commands;
pub mod render;
pub mod repl;

use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use rustyline::DefaultEditor;

use aura::api::{ApiError, AssistantApi, HttpAssistantApi};
use aura::services::conversation::filter_by_title;
use aura::services::export::export_to_markdown;
use aura::services::{
    AppSettings, AuthService, Confirmation, CredentialStore, Database, KeyringService,
    SessionController, SessionError, SessionMsg, SettingsCredentialStore, SettingsOverrides,
    SettingsService,
};

pub use commands::{Cli, Command};
use repl::ChatRepl;

/// Everything a command needs: resolved settings and where the session
/// token lives.
pub struct App {
    db: Database,
    /// Flags given on this command line, before environment and storage.
    flags: SettingsOverrides,
    settings: AppSettings,
    credentials: Arc<dyn CredentialStore>,
}

impl App {
    pub async fn init(cli: &Cli) -> Result<Self> {
        let db = Database::new().await?;
        let flags = SettingsOverrides {
            api_base_url: cli.api_url.clone(),
            request_timeout_secs: cli.timeout,
        };
        let settings = SettingsService::load(&db)
            .await
            .with_overrides(&flags.clone().or(SettingsOverrides::from_env()));
        tracing::debug!(api = %settings.api_base_url, "settings resolved");

        let credentials: Arc<dyn CredentialStore> = if cli.no_keyring {
            Arc::new(SettingsCredentialStore::new(db.clone(), &settings.api_base_url))
        } else {
            match KeyringService::new(&settings.api_base_url).await {
                Ok(keyring) => Arc::new(keyring),
                Err(e) => {
                    tracing::warn!("Secret Service unavailable, using local storage: {:#}", e);
                    Arc::new(SettingsCredentialStore::new(db.clone(), &settings.api_base_url))
                }
            }
        };

        Ok(Self {
            db,
            flags,
            settings,
            credentials,
        })
    }

    fn auth(&self) -> Result<AuthService> {
        let api = HttpAssistantApi::new(&self.settings.api_base_url)?;
        Ok(AuthService::new(Arc::new(api), self.credentials.clone()))
    }

    /// A controller authenticated with the stored credential.
    async fn session(&self) -> Result<SessionController> {
        let credential = self
            .credentials
            .load()
            .await?
            .ok_or(SessionError::Unauthorized)?;
        tracing::debug!(username = %credential.account.username, "using stored session");
        let api = HttpAssistantApi::new(&self.settings.api_base_url)?.with_credential(credential);
        let api: Arc<dyn AssistantApi> = Arc::new(api);
        Ok(SessionController::new(api, self.settings.request_timeout()))
    }

    /// A controller with the conversation list loaded, so ids can be opened.
    async fn listed_session(&self) -> Result<SessionController> {
        let mut ctl = self.session().await?;
        ctl.run(SessionMsg::List).await?;
        Ok(ctl)
    }

    pub async fn run(&self, command: Command) -> Result<()> {
        match command {
            Command::Login { email, password } => {
                let email = field(email, "Email: ")?;
                let password = field(password, "Password: ")?;
                let credential = self.auth()?.login(&email, &password).await?;
                println!("Signed in as {}.", credential.account.username.bold());
            }
            Command::Register {
                username,
                email,
                password,
            } => {
                let username = field(username, "Username: ")?;
                let email = field(email, "Email: ")?;
                let password = field(password, "Password: ")?;
                let credential = self
                    .auth()?
                    .register(&username, &email, &password)
                    .await?;
                println!("Registered and signed in as {}.", credential.account.username.bold());
            }
            Command::Logout => {
                self.auth()?.logout().await?;
                println!("Signed out.");
            }
            Command::List { search } => {
                let ctl = self.listed_session().await?;
                let all = ctl.state().conversations();
                let shown = filter_by_title(&all, search.as_deref().unwrap_or_default());
                print!("{}", render::conversation_list(&shown, None));
            }
            Command::Show { id } => {
                let mut ctl = self.listed_session().await?;
                ctl.run(SessionMsg::Open(id)).await?;
                let state = ctl.state();
                if let Some(conv) = state.active_conversation() {
                    print!("{}", render::conversation_header(conv));
                }
                println!(
                    "{}",
                    render::messages(state.messages(), self.settings.render_markdown)
                );
            }
            Command::New { title } => {
                let mut ctl = self.session().await?;
                ctl.run(SessionMsg::Create(title)).await?;
                if let Some(conv) = ctl.state().active_conversation() {
                    println!("Created conversation {} \"{}\".", conv.id.bold(), conv.title);
                }
            }
            Command::Rename { id, title } => {
                let mut ctl = self.listed_session().await?;
                let outcome = ctl
                    .run(SessionMsg::Rename {
                        id: id.clone(),
                        title,
                    })
                    .await?;
                match outcome {
                    Some(_) => println!("Renamed conversation {}.", id.bold()),
                    None => println!("{}", render::notice("Title is empty; nothing changed.")),
                }
            }
            Command::Delete { id, yes } => {
                let mut ctl = self.listed_session().await?;
                let title = ctl
                    .state()
                    .conversation(&id)
                    .map(|c| c.title.clone())
                    .ok_or_else(|| SessionError::NotFound(id.clone()))?;
                let confirmation = if yes || !self.settings.confirm_delete {
                    Confirmation::Confirmed
                } else {
                    ask(&format!("Delete \"{}\"? [y/N] ", title))?
                };
                match ctl.run(SessionMsg::Delete { id: id.clone(), confirmation }).await? {
                    Some(_) => println!("Deleted conversation {}.", id.bold()),
                    None => println!("{}", render::notice("Kept.")),
                }
            }
            Command::Send { chat, text } => {
                let mut ctl = match chat {
                    Some(id) => {
                        let mut ctl = self.listed_session().await?;
                        ctl.run(SessionMsg::Open(id)).await?;
                        ctl
                    }
                    None => self.session().await?,
                };
                ctl.run(SessionMsg::Send(text.join(" "))).await?;
                let state = ctl.state();
                if let Some(reply) = state.messages().last() {
                    print!("{}", render::message(reply, self.settings.render_markdown));
                }
                if let Some(id) = state.active_id() {
                    println!("{}", render::notice(&format!("conversation {}", id)));
                }
            }
            Command::Export { id, output } => {
                let mut ctl = self.listed_session().await?;
                ctl.run(SessionMsg::Open(id.clone())).await?;
                let state = ctl.state();
                let conv = state
                    .active_conversation()
                    .ok_or(SessionError::NotFound(id))?;
                let markdown = export_to_markdown(conv, state.messages());
                match output {
                    Some(path) => {
                        tokio::fs::write(&path, markdown)
                            .await
                            .with_context(|| format!("Failed to write {}", path.display()))?;
                        println!("Exported to {}.", path.display());
                    }
                    None => print!("{}", markdown),
                }
            }
            Command::Chat { id } => {
                let ctl = self.session().await?;
                let mut repl = ChatRepl::new(ctl, self.settings.clone());
                if let Ok(path) = Database::db_path() {
                    repl = repl.with_history(path.with_file_name("history.txt"));
                }
                repl.run(id).await?;
            }
            Command::Config {
                render_markdown,
                confirm_delete,
            } => self.config(render_markdown, confirm_delete).await?,
        }
        Ok(())
    }

    /// Persist the flags given with `aura config`; print the result.
    async fn config(&self, render_markdown: Option<bool>, confirm_delete: Option<bool>) -> Result<()> {
        let mut stored = SettingsService::load(&self.db).await;
        let flags = &self.flags;
        let changed = flags.api_base_url.is_some()
            || flags.request_timeout_secs.is_some()
            || render_markdown.is_some()
            || confirm_delete.is_some();

        if changed {
            stored = stored.with_overrides(flags);
            if let Some(v) = render_markdown {
                stored.render_markdown = v;
            }
            if let Some(v) = confirm_delete {
                stored.confirm_delete = v;
            }
            // Refuse to store a URL the client cannot use.
            HttpAssistantApi::new(&stored.api_base_url)?;
            SettingsService::save(&self.db, &stored).await?;
            println!("{}", render::notice("Settings saved."));
        }

        println!("{} {}", "api_base_url:".cyan(), stored.api_base_url);
        println!("{} {}", "request_timeout_secs:".cyan(), stored.request_timeout_secs);
        println!("{} {}", "render_markdown:".cyan(), stored.render_markdown);
        println!("{} {}", "confirm_delete:".cyan(), stored.confirm_delete);
        if stored.api_base_url != self.settings.api_base_url {
            println!(
                "{}",
                render::notice(&format!("(overridden for this run: {})", self.settings.api_base_url))
            );
        }
        Ok(())
    }
}

/// Use `value` if given, otherwise prompt for it.
fn field(value: Option<String>, prompt: &str) -> Result<String> {
    match value {
        Some(v) => Ok(v),
        None => {
            let mut rl = DefaultEditor::new()?;
            Ok(rl.readline(prompt)?)
        }
    }
}

fn ask(question: &str) -> Result<Confirmation> {
    let mut rl = DefaultEditor::new()?;
    let answer = rl.readline(question)?;
    Ok(match answer.trim().to_lowercase().as_str() {
        "y" | "yes" => Confirmation::Confirmed,
        _ => Confirmation::Declined,
    })
}

/// Whether `err` means the stored session is missing or was rejected.
pub fn needs_login(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(cause.downcast_ref::<SessionError>(), Some(SessionError::Unauthorized))
            || matches!(cause.downcast_ref::<ApiError>(), Some(ApiError::Unauthorized(_)))
    })
}

