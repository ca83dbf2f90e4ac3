//! Interactive terminal chat over the classifier

use anyhow::{Context, Result};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

use smart_recycle::config::defaults::MIN_QUERY_CHARS;
use smart_recycle::{Classifier, Decision, DecisionOutcome};

const EXIT_WORDS: [&str; 4] = [":exit", "exit", ":q", "quit"];
const PROMPT: &str = "🧐 Was möchten Sie entsorgen? ";
const FAREWELL: &str = "👋 Danke fürs Recycling!";
const TOO_SHORT: &str = "❌ Bitte genauer beschreiben (z.B. 'Teebeutel' statt 'Tee').";
const NO_ANSWER: &str =
    "❌ Ich weiß nicht, wie man diesen Gegenstand entsorgt. Bitte offizielle Quellen konsultieren.";

/// What the loop does with one line of input.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Exit,
    TooShort,
    Query(&'a str),
}

fn parse_input(line: &str) -> Input<'_> {
    let trimmed = line.trim();
    if EXIT_WORDS.contains(&trimmed.to_lowercase().as_str()) {
        Input::Exit
    } else if trimmed.chars().count() < MIN_QUERY_CHARS {
        Input::TooShort
    } else {
        Input::Query(trimmed)
    }
}

/// Human-readable advice block for one decision.
fn render_advice(decision: &Decision) -> String {
    if matches!(
        decision.outcome,
        DecisionOutcome::NoMatch | DecisionOutcome::Degraded | DecisionOutcome::Rejected
    ) {
        return NO_ANSWER.to_string();
    }
    let example = decision.similar_items.first().map(String::as_str).unwrap_or_default();
    [
        format!("🚮 **{}**", decision.item),
        format!(
            "📦 **Kategorie:** {} ({})",
            decision.category,
            decision.category.label_de()
        ),
        format!("📝 **Anleitung:** {}", decision.instructions),
        format!("💡 **Beispiel:** {example}"),
        format!("(Ähnlichkeits-Score: {:.3})", decision.confidence),
    ]
    .join("\n\n")
}

fn prompt() -> Result<()> {
    let mut stdout = std::io::stdout();
    write!(stdout, "{PROMPT}").context("Failed to write prompt")?;
    stdout.flush().context("Failed to flush stdout")
}

/// Read descriptions from stdin until an exit word, EOF or Ctrl+C.
pub async fn run_chat(classifier: &Classifier) -> Result<()> {
    println!("🚮 Smart Recycle Bot - Ihr Assistent für Mülltrennung!");
    println!("Beschreiben Sie einen Gegenstand und ich sage Ihnen, wie man ihn entsorgt.");
    println!("':exit' zum Beenden\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt()?;
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read from stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            println!("\n{FAREWELL}");
            break;
        };

        match parse_input(&line) {
            Input::Exit => {
                println!("{FAREWELL}");
                break;
            }
            Input::TooShort => println!("{TOO_SHORT}"),
            Input::Query(item) => {
                let decision = classifier.classify(item).await;
                println!("\n{}", render_advice(&decision));
                println!("{}", "-".repeat(60));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use smart_recycle::Category;

    fn decision(outcome: DecisionOutcome) -> Decision {
        Decision {
            item: "Zeitung".to_string(),
            category: Category::Paper,
            confidence: 0.91234,
            instructions: "Blaue Tonne".to_string(),
            similar_items: vec!["Zeitung".to_string(), "Karton".to_string()],
            environmental_note: String::new(),
            outcome,
        }
    }

    #[test]
    fn test_parse_input() {
        assert_eq!(parse_input("  QUIT "), Input::Exit);
        assert_eq!(parse_input(":q"), Input::Exit);
        assert_eq!(parse_input("Tee"), Input::Query("Tee"));
        assert_eq!(parse_input(" ab "), Input::TooShort);
        assert_eq!(parse_input("Öl"), Input::TooShort);
        assert_eq!(parse_input(" Teebeutel\n"), Input::Query("Teebeutel"));
    }

    #[test]
    fn test_render_confident() {
        let text = render_advice(&decision(DecisionOutcome::Confident));
        assert!(text.contains("📦 **Kategorie:** PAPER (Papier / Pappe)"));
        assert!(text.contains("💡 **Beispiel:** Zeitung"));
        assert!(text.ends_with("(Ähnlichkeits-Score: 0.912)"));
    }

    #[test]
    fn test_render_unknown() {
        let mut d = decision(DecisionOutcome::Degraded);
        d.category = Category::Unknown;
        assert_eq!(render_advice(&d), NO_ANSWER);
    }

    #[test]
    fn test_render_rejected() {
        let mut d = decision(DecisionOutcome::Rejected);
        d.category = Category::Unknown;
        assert_eq!(render_advice(&d), NO_ANSWER);
    }
}
