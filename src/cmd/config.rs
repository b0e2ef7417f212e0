use std::io::{self, BufRead, Write};

use clap::{Args, Subcommand};

use crate::config::{StoredConfig, config_file_path};
use crate::error::AppResult;

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    /// Run the interactive configuration wizard.
    Init,
    /// Show the stored configuration (secrets masked).
    Show,
}

/// One editable entry of the stored config file.
struct Setting {
    label: &'static str,
    secret: bool,
    slot: fn(&mut StoredConfig) -> &mut Option<String>,
}

fn settings() -> [Setting; 13] {
    [
        Setting { label: "Database path", secret: false, slot: |c| &mut c.database_path },
        Setting { label: "LLM provider (gemini/custom)", secret: false, slot: |c| &mut c.llm_provider },
        Setting { label: "Gemini API key", secret: true, slot: |c| &mut c.gemini_api_key },
        Setting { label: "Gemini model", secret: false, slot: |c| &mut c.gemini_model },
        Setting { label: "Gemini base URL", secret: false, slot: |c| &mut c.gemini_base_url },
        Setting { label: "SMTP host", secret: false, slot: |c| &mut c.smtp_host },
        Setting { label: "SMTP port", secret: false, slot: |c| &mut c.smtp_port },
        Setting { label: "SMTP username", secret: false, slot: |c| &mut c.smtp_username },
        Setting { label: "SMTP password", secret: true, slot: |c| &mut c.smtp_password },
        Setting {
            label: "Sender address (e.g., Support <support@example.com>)",
            secret: false,
            slot: |c| &mut c.smtp_from,
        },
        Setting { label: "Use STARTTLS (true/false)", secret: false, slot: |c| &mut c.smtp_starttls },
        Setting { label: "Retries per workflow step", secret: false, slot: |c| &mut c.step_retries },
        Setting { label: "Initial retry delay (ms)", secret: false, slot: |c| &mut c.retry_delay_ms },
    ]
}

pub fn run(command: ConfigCommand) -> AppResult<()> {
    match command {
        ConfigCommand::Init => run_init(),
        ConfigCommand::Show => run_show(),
    }
}

fn run_init() -> AppResult<()> {
    let mut cfg = StoredConfig::load()?;

    println!("Configuring the triage worker.");
    println!("Press Enter to keep the current value, '-' to clear it.");
    println!("Secrets are stored in the local config file; protect your filesystem accordingly.");
    println!();

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut out = io::stdout();
    for setting in settings() {
        let slot = (setting.slot)(&mut cfg);
        write!(out, "{}: ", question(&setting, slot.as_deref()))?;
        out.flush()?;

        let mut line = String::new();
        input.read_line(&mut line)?;
        Answer::parse(&line).apply(slot);
    }

    cfg.save()?;
    println!("\nConfiguration saved to {}", config_file_path()?.display());
    Ok(())
}

fn run_show() -> AppResult<()> {
    let mut cfg = StoredConfig::load()?;

    println!("Configuration file: {}", config_file_path()?.display());
    for setting in settings() {
        let value = (setting.slot)(&mut cfg).as_deref();
        println!("{}: {}", setting.label, shown(value, setting.secret));
    }
    Ok(())
}

fn question(setting: &Setting, current: Option<&str>) -> String {
    match current {
        Some(_) if setting.secret => format!("{} [****] (Enter to keep, '-' to clear)", setting.label),
        Some(value) => format!("{} [{value}] (Enter to keep, '-' to clear)", setting.label),
        None => format!("{} (Enter to skip)", setting.label),
    }
}

#[derive(Debug, PartialEq)]
enum Answer {
    Keep,
    Clear,
    Set(String),
}

impl Answer {
    fn parse(line: &str) -> Self {
        match line.trim() {
            "" => Answer::Keep,
            "-" => Answer::Clear,
            value => Answer::Set(value.to_string()),
        }
    }

    fn apply(self, slot: &mut Option<String>) {
        match self {
            Answer::Keep => {}
            Answer::Clear => *slot = None,
            Answer::Set(value) => *slot = Some(value),
        }
    }
}

fn shown(value: Option<&str>, secret: bool) -> String {
    match value.filter(|value| !value.is_empty()) {
        None => "<not set>".to_string(),
        Some(value) if secret => mask_secret(value),
        Some(value) => value.to_string(),
    }
}

fn mask_secret(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 6 {
        return "***".to_string();
    }
    let prefix: String = chars[..3].iter().collect();
    let suffix: String = chars[chars.len() - 3..].iter().collect();
    format!("{prefix}***{suffix}")
}
