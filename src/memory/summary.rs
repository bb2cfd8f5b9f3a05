// src/memory/summary.rs
// Rolling summary digest builder

use super::types::ConversationEvent;

/// Build the bounded recency digest: one bullet per event, content collapsed
/// to a single line and cut at 100 characters, capped at `max_chars` total.
///
/// Lossy-by-design: full history stays queryable in chat_messages; this is
/// the fixed-length view the orchestrator budgets against.
pub fn build_digest(events: &[ConversationEvent], max_chars: usize) -> String {
    let mut bullets = Vec::with_capacity(events.len());

    for event in events {
        let flat = event.content.trim().replace('\n', " ");
        let content = if flat.chars().count() > 100 {
            let cut: String = flat.chars().take(100).collect();
            format!("{cut}\u{2026}")
        } else {
            flat
        };

        let model_info = event
            .model
            .as_deref()
            .map(|m| format!(" [{m}]"))
            .unwrap_or_default();

        bullets.push(format!("- {}{}: {}", event.role.as_str(), model_info, content));
    }

    let summary = format!("Recent conversation:\n{}", bullets.join("\n"));
    if summary.chars().count() > max_chars {
        let cut: String = summary.chars().take(max_chars.saturating_sub(1)).collect();
        format!("{cut}\u{2026}")
    } else {
        summary
    }
}
