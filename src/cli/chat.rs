use std::borrow::Cow::{self, Borrowed, Owned};
use std::io::Write;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use rustyline::completion::Completer;
use rustyline::config::Configurer;
use rustyline::error::ReadlineError;
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{ColorMode, Editor, Helper};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::auth::{Authenticator, CredentialStore};
use crate::chat::{Attachment, ChatEvent, Session, SessionBuilder, mentions_file};
use crate::core::{AppConfig, init_tracing};
use crate::openai::OpenAiClient;
use crate::profiles::{GrantTable, ProfileRegistry, resolve};

/// Hides what is typed while `masking` is set
#[derive(Default)]
struct MaskingHelper {
    masking: bool,
}

impl MaskingHelper {
    fn mask<'l>(&self, line: &'l str) -> Cow<'l, str> {
        if self.masking {
            Owned("*".repeat(line.chars().count()))
        } else {
            Borrowed(line)
        }
    }
}

impl Helper for MaskingHelper {}

impl Completer for MaskingHelper {
    type Candidate = String;
}

impl Hinter for MaskingHelper {
    type Hint = String;
}

impl Validator for MaskingHelper {}

impl Highlighter for MaskingHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        self.mask(line)
    }

    // Every keystroke has to go through `highlight` or the raw
    // character is echoed
    fn highlight_char(&self, _line: &str, _pos: usize, kind: CmdKind) -> bool {
        match kind {
            CmdKind::MoveCursor => false,
            _ => self.masking,
        }
    }
}

type Prompt = Editor<MaskingHelper, DefaultHistory>;

/// Print events as they arrive, tokens on one line
fn spawn_printer(mut rx: mpsc::UnboundedReceiver<ChatEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut stdout = std::io::stdout();
        while let Some(event) = rx.recv().await {
            match event {
                ChatEvent::Message(text) | ChatEvent::Error(text) => println!("{}", text),
                ChatEvent::Token(token) => {
                    print!("{}", token);
                    let _ = stdout.flush();
                }
                ChatEvent::Done(_) => println!(),
            }
        }
    })
}

fn read_line(rl: &mut Prompt, prompt: &str) -> Result<Option<String>> {
    match rl.readline(prompt) {
        Ok(line) => Ok(Some(line.trim().to_string())),
        Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(None),
        Err(err) => Err(anyhow!("Error: {:?}", err)),
    }
}

fn read_password(rl: &mut Prompt, prompt: &str) -> Result<Option<String>> {
    if let Some(helper) = rl.helper_mut() {
        helper.masking = true;
    }
    rl.set_color_mode(ColorMode::Forced);
    let cursor = rl.set_cursor_visibility(false)?;

    let password = read_line(rl, prompt);

    drop(cursor);
    rl.set_color_mode(ColorMode::Enabled);
    if let Some(helper) = rl.helper_mut() {
        helper.masking = false;
    }
    password
}

/// Ask which profile to use. An empty answer picks the first one.
fn select_profile(rl: &mut Prompt, session: &Session) -> Result<Option<String>> {
    if session.profiles().len() < 2 {
        return Ok(None);
    }

    for (idx, profile) in session.profiles().iter().enumerate() {
        println!("{}. {}: {}", idx + 1, profile.name, profile.markdown_description);
    }
    let Some(answer) = read_line(rl, "Chat profile: ")? else {
        return Ok(None);
    };

    let selected = answer
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|idx| session.profiles().get(idx))
        .map(|p| p.name.clone())
        .or_else(|| (!answer.is_empty()).then_some(answer));
    Ok(selected)
}

pub async fn run(config: AppConfig) -> Result<()> {
    init_tracing(&format!("{}=warn", env!("CARGO_CRATE_NAME")));

    let mut rl: Prompt = Editor::new()?;
    rl.set_helper(Some(MaskingHelper::default()));

    let authenticator = Authenticator::new(CredentialStore::new(&config.user_data_path));
    let Some(username) = read_line(&mut rl, "Username: ")? else {
        return Ok(());
    };
    let Some(password) = read_password(&mut rl, "Password: ")? else {
        return Ok(());
    };
    let Some(identity) = authenticator.authenticate(&username, &password) else {
        return Err(anyhow!("Invalid credentials"));
    };

    let registry = Arc::new(ProfileRegistry::default());
    let grants = GrantTable::from_registry(&registry);
    let profiles = resolve(&identity, &registry, &grants);
    let mut session = SessionBuilder::new(identity, Arc::clone(&registry))
        .profiles(profiles)
        .system_message(&config.system_message)
        .max_tokens(config.max_tokens)
        .build();

    let selected = select_profile(&mut rl, &session)?;
    let (tx, rx) = mpsc::unbounded_channel();
    let printer = spawn_printer(rx);
    let started = session.start(selected.as_deref(), &tx);
    drop(tx);
    printer.await?;
    started?;

    let api = OpenAiClient::new(&config.openai_api_hostname, &config.openai_api_key);

    loop {
        let Some(line) = read_line(&mut rl, ">>> ")? else {
            break;
        };
        if line.is_empty() {
            continue;
        }
        let _ = rl.add_history_entry(line.as_str());

        // An empty path means no file
        let mut attachment = if mentions_file(&line) {
            read_line(&mut rl, "File path: ")?
                .filter(|path| !path.is_empty())
                .map(Attachment::from_path)
        } else {
            None
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let printer = spawn_printer(rx);
        session
            .handle_message(&line, &mut attachment, &api, &tx)
            .await;
        drop(tx);
        printer.await?;
    }

    Ok(())
}
