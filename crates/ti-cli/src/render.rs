//! Terminal rendering of replies, word groups, and candidate charts.

use owo_colors::{OwoColorize, Style};

use ti_session::{ChatSession, CompletionSource};
use ti_tokens::{Alternative, ConfidenceTier, SubwordMarker, TierThresholds, WordGroup};

const BAR_WIDTH: usize = 30;

/// Turns colors on or off for everything rendered.
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    color: bool,
}

impl Palette {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn paint(&self, text: &str, style: Style) -> String {
        if self.color {
            text.style(style).to_string()
        } else {
            text.to_string()
        }
    }

    fn tier(&self, text: &str, tier: ConfidenceTier) -> String {
        self.paint(text, tier_style(tier))
    }

    fn dim(&self, text: &str) -> String {
        self.paint(text, Style::new().dimmed())
    }
}

/// The latest reply, one colored span per token.
///
/// Tokens with a strong alternative are followed by `*`. In step mode only
/// the revealed prefix is printed, the current token is underlined, and a
/// step label follows.
pub fn reply<S: CompletionSource>(session: &ChatSession<S>, palette: Palette) -> Option<String> {
    let tokens = session.visible_tokens()?;
    let marker = session.marker();
    let current = session.step_mode().then(|| session.cursor().position()).flatten();

    let mut out = String::new();
    for (i, record) in tokens.iter().enumerate() {
        let text = record.display_text(marker);
        let tier = session.tier(record.probability);
        if current == Some(i) && palette.color {
            out.push_str(&palette.paint(&text, tier_style(tier).underline()));
        } else {
            out.push_str(&palette.tier(&text, tier));
        }
        if session.has_strong_alternative(record) {
            out.push_str(&palette.dim("*"));
        }
    }

    if session.step_mode() {
        out.push_str(&palette.dim(&format!("  [step {}]", session.cursor().label())));
    }
    Some(out)
}

fn tier_style(tier: ConfidenceTier) -> Style {
    match tier {
        ConfidenceTier::High => Style::new().green(),
        ConfidenceTier::Medium => Style::new().yellow(),
        ConfidenceTier::Low => Style::new().red(),
    }
}

/// Word groups of the latest reply with their mean probabilities.
pub fn words<S: CompletionSource>(session: &ChatSession<S>, palette: Palette) -> String {
    let groups: Vec<WordGroup> = session.word_groups();
    groups
        .iter()
        .map(|g| {
            let tier = g.tier(session.normalizer());
            let label = format!("{} {:.0}%", g.text, g.average_probability * 100.0);
            palette.tier(&label, tier)
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

/// A bar of `width` cells filled in proportion to `probability`.
pub fn bar(probability: f64, width: usize) -> String {
    let filled = (probability.clamp(0.0, 1.0) * width as f64).round() as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

/// Horizontal bar chart of the candidates at one step, most likely first.
pub fn chart(
    candidates: &[(Alternative, bool)],
    marker: &SubwordMarker,
    tier_of: impl Fn(f64) -> ConfidenceTier,
    palette: Palette,
) -> String {
    let labels: Vec<String> = candidates
        .iter()
        .map(|(alt, _)| format!("{:?}", marker.display(&alt.token)))
        .collect();
    let width = labels.iter().map(|l| l.chars().count()).max().unwrap_or(0);

    candidates
        .iter()
        .zip(&labels)
        .map(|((alt, chosen), label)| {
            let pointer = if *chosen { ">" } else { " " };
            let line = format!(
                "{pointer} {label:<width$} {} {:>6.2}%",
                bar(alt.probability, BAR_WIDTH),
                alt.probability * 100.0
            );
            palette.tier(&line, tier_of(alt.probability))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn thinking(palette: Palette) -> String {
    palette.dim("...")
}

/// One-line key for the colors and markers.
pub fn legend(thresholds: TierThresholds, palette: Palette) -> String {
    let TierThresholds { high, medium } = thresholds;
    format!(
        "{}  {}  {}  {}",
        palette.tier(&format!("high >= {high}"), ConfidenceTier::High),
        palette.tier(&format!("medium >= {medium}"), ConfidenceTier::Medium),
        palette.tier("low", ConfidenceTier::Low),
        palette.dim("* strong alternative"),
    )
}
