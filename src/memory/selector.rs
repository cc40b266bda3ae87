use super::embedding::embed;
use super::similarity::cosine;
use super::store::ConversationStore;
use crate::models::chat::ConversationMessage;
use log::debug;
use std::collections::HashSet;

pub const DEFAULT_CONTEXT_CHARS: usize = 3000;

const SIMILARITY_WEIGHT: f64 = 0.7;
const RECENCY_WEIGHT: f64 = 0.3;

struct Candidate<'a> {
    index: usize,
    message: &'a ConversationMessage,
    similarity: f64,
    score: f64,
}

fn line_len(line: &str) -> usize {
    line.chars().count()
}

/// Position of `timestamp` between the oldest turn (0.0) and `now` (1.0).
fn normalized_recency(timestamp: i64, earliest: i64, now: i64) -> f64 {
    let span = now - earliest;
    if span <= 0 {
        return 0.0;
    }
    ((timestamp - earliest) as f64 / span as f64).clamp(0.0, 1.0)
}

/// Builds the context block for `query` within a `max_chars` budget.
///
/// The recency window (newest first) is admitted until the first turn that
/// would overflow the budget. Remaining turns are ranked by
/// `0.7 * similarity + 0.3 * recency` and admitted while their similarity
/// exceeds the configured threshold and they still fit. The result is in
/// chronological order, one `"<role>: <content>"` line per turn.
pub fn get_relevant_context(
    store: &ConversationStore,
    query: &str,
    max_chars: usize,
    now: i64
) -> String {
    let messages = store.messages();
    let earliest = match messages.first() {
        Some(first) => first.timestamp,
        None => {
            return String::new();
        }
    };
    let config = store.config();
    let query_embedding = embed(query);

    let mut selected: Vec<usize> = Vec::new();
    let mut selected_timestamps: HashSet<i64> = HashSet::new();
    let mut total_len = 0usize;

    let window_start = messages.len().saturating_sub(config.max_recent_messages);
    for index in (window_start..messages.len()).rev() {
        let len = line_len(&messages[index].format_line());
        if total_len + len > max_chars {
            break;
        }
        total_len += len;
        selected.push(index);
        selected_timestamps.insert(messages[index].timestamp);
    }
    let recent_count = selected.len();

    let mut candidates: Vec<Candidate> = messages
        .iter()
        .enumerate()
        .filter(|(_, msg)| !selected_timestamps.contains(&msg.timestamp))
        .map(|(index, message)| {
            let similarity = cosine(&query_embedding, &message.embedding);
            let recency = normalized_recency(message.timestamp, earliest, now);
            Candidate {
                index,
                message,
                similarity,
                score: SIMILARITY_WEIGHT * similarity + RECENCY_WEIGHT * recency,
            }
        })
        .collect();
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    for candidate in &candidates {
        if candidate.similarity <= config.similarity_threshold {
            continue;
        }
        let len = line_len(&candidate.message.format_line());
        if total_len + len > max_chars {
            continue;
        }
        total_len += len;
        selected.push(candidate.index);
    }

    debug!(
        "Context selection: {} recent + {} similar of {} turns, {}/{} chars",
        recent_count,
        selected.len() - recent_count,
        messages.len(),
        total_len,
        max_chars
    );

    selected.sort_unstable();
    selected
        .into_iter()
        .map(|index| messages[index].format_line())
        .collect::<Vec<_>>()
        .join("\n")
}
