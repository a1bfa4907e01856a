//! token-insight - chat with a model and see how sure it was of every token.
//!
//! Replies are colored by confidence tier. Step mode walks through a reply
//! one token at a time and charts the candidates the model weighed there.

mod render;

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use tracing::info;

use ti_session::{
    ChatSession, ClientConfig, CompletionSource, HttpRelay, HybridSource, SingleSource,
    ThresholdPreset, ThresholdSetting,
};

use crate::render::Palette;

const DEFAULT_CONFIG_FILE: &str = "token-insight.toml";

#[derive(Parser)]
#[command(name = "token-insight")]
#[command(about = "Chat client that shows the probability behind every token")]
struct Cli {
    /// Path to config file (default: ./token-insight.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Relay endpoint for completions
    #[arg(long)]
    relay: Option<String>,

    /// Second relay used only for log-probabilities (enables hybrid mode)
    #[arg(long)]
    probe_relay: Option<String>,

    /// Sampling temperature in [0, 1]
    #[arg(short, long)]
    temperature: Option<f32>,

    /// Use the strict confidence thresholds (0.7 / 0.3)
    #[arg(long, conflicts_with = "standard")]
    strict: bool,

    /// Use the standard confidence thresholds (0.5 / 0.2)
    #[arg(long)]
    standard: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::from_file(path)
                .with_context(|| format!("failed to load {}", path.display()))?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                ClientConfig::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => ClientConfig::default(),
        };

        if let Some(relay) = &self.relay {
            config.relay_url = relay.clone();
        }
        if let Some(probe) = &self.probe_relay {
            config.probe_relay_url = Some(probe.clone());
        }
        if let Some(temperature) = self.temperature {
            config.temperature = temperature;
        }
        if self.strict {
            config.thresholds = ThresholdSetting::Preset(ThresholdPreset::Strict);
        } else if self.standard {
            config.thresholds = ThresholdSetting::Preset(ThresholdPreset::Standard);
        }
        config.validate()?;
        Ok(config)
    }
}

fn build_source(config: &ClientConfig) -> anyhow::Result<Box<dyn CompletionSource>> {
    let relay = HttpRelay::new(
        config.relay_url.clone(),
        config.request_timeout(),
        config.record_builder(),
    )?;

    let source: Box<dyn CompletionSource> = match &config.probe_relay_url {
        Some(probe_url) => {
            let probe = HttpRelay::new(
                probe_url.clone(),
                config.request_timeout(),
                config.record_builder(),
            )?
            .with_name("probe");
            Box::new(HybridSource::new(
                relay.with_name("text"),
                probe,
                config.top_logprobs,
                config.marker(),
            ))
        }
        None => Box::new(SingleSource::new(relay, config.top_logprobs, config.marker())),
    };
    Ok(source)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ti_session=info".parse()?),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.load_config()?;
    let palette = Palette::new(!cli.no_color && std::env::var_os("NO_COLOR").is_none());

    let source = build_source(&config)?;
    info!(source = source.name(), relay = %config.relay_url, "starting session");
    let mut session = ChatSession::new(source, &config)?;

    run_repl(&mut session, &config, palette).await
}

async fn run_repl<S: CompletionSource>(
    session: &mut ChatSession<S>,
    config: &ClientConfig,
    palette: Palette,
) -> anyhow::Result<()> {
    println!("token-insight v{}", env!("CARGO_PKG_VERSION"));
    println!("Relay: {}", config.relay_url);
    if let Some(probe) = &config.probe_relay_url {
        println!("Probe: {probe}");
    }
    println!("{}", render::legend(config.thresholds.thresholds(), palette));
    println!("\nType a message, or /help for commands.\n");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if !line.starts_with('/') {
            println!("{}", render::thinking(palette));
            match session.submit(line).await.map(|_| ()) {
                Ok(()) => show_reply(session, palette),
                Err(e) => println!("Error: {e}"),
            }
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        let cmd = parts.first().copied().unwrap_or("");
        let arg = parts.get(1).copied();

        match cmd {
            "/quit" | "/exit" | "/q" => break,
            "/step" => {
                let enabled = match arg {
                    Some("on") => true,
                    Some("off") => false,
                    None => !session.step_mode(),
                    Some(other) => {
                        println!("Usage: /step [on|off] (got {other})");
                        continue;
                    }
                };
                session.set_step_mode(enabled);
                println!("Step mode {}", if enabled { "on" } else { "off" });
                show_reply(session, palette);
            }
            "/next" | "/n" => {
                session.next_step();
                show_step(session, palette);
            }
            "/prev" | "/p" => {
                session.previous_step();
                show_step(session, palette);
            }
            "/jump" => {
                let Some(index) = arg.and_then(parse_step) else {
                    println!("Usage: /jump <step>  (steps start at 1)");
                    continue;
                };
                match session.jump_to_step(index) {
                    Ok(_) => show_step(session, palette),
                    Err(e) => println!("Error: {e}"),
                }
            }
            "/temp" => match arg.map(str::parse::<f32>) {
                Some(Ok(t)) => match session.set_temperature(t) {
                    Ok(()) => println!("Temperature set to {t}"),
                    Err(e) => println!("Error: {e}"),
                },
                _ => println!("Temperature: {}  (usage: /temp <0..1>)", session.temperature()),
            },
            "/words" => {
                if session.last_assistant().is_none() {
                    println!("No reply yet.");
                } else {
                    println!("{}", render::words(session, palette));
                }
            }
            "/chart" => show_chart(session, palette),
            "/help" | "/?" => {
                println!("Commands:");
                println!("  /step [on|off] - Toggle step-by-step mode");
                println!("  /next, /prev   - Move one token forward or back");
                println!("  /jump <n>      - Go to token n");
                println!("  /chart         - Candidates at the current token");
                println!("  /words         - Word-level confidence");
                println!("  /temp <t>      - Set temperature (0 to 1)");
                println!("  /quit          - Exit");
            }
            _ => println!("Unknown command: {cmd}. Type /help for available commands."),
        }
    }

    Ok(())
}

/// Parse a one-based step number into a zero-based index.
fn parse_step(arg: &str) -> Option<usize> {
    arg.parse::<usize>().ok()?.checked_sub(1)
}

fn show_reply<S: CompletionSource>(session: &ChatSession<S>, palette: Palette) {
    if let Some(text) = render::reply(session, palette) {
        println!("{text}\n");
    }
}

fn show_step<S: CompletionSource>(session: &ChatSession<S>, palette: Palette) {
    if session.last_assistant().is_none() {
        println!("No reply to step through.");
        return;
    }
    if session.step_mode() {
        show_reply(session, palette);
    }
    show_chart(session, palette);
}

fn show_chart<S: CompletionSource>(session: &ChatSession<S>, palette: Palette) {
    let Some(candidates) = session.current_candidates() else {
        println!("No reply yet.");
        return;
    };
    println!(
        "Step {}\n{}\n",
        session.cursor().label(),
        render::chart(
            &candidates,
            session.marker(),
            |p| session.tier(p),
            palette
        )
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_step() {
        assert_eq!(parse_step("1"), Some(0));
        assert_eq!(parse_step("12"), Some(11));
        assert_eq!(parse_step("0"), None);
        assert_eq!(parse_step("-3"), None);
        assert_eq!(parse_step("two"), None);
    }
}
