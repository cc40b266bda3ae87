use super::store::ConversationStore;
use std::collections::HashMap;

pub const MIN_MESSAGES_FOR_SUMMARY: usize = 20;
const TOPIC_COUNT: usize = 5;
const MIN_TOPIC_CHARS: usize = 4;

/// Topic digest of the whole log, or `None` while it holds fewer than
/// [`MIN_MESSAGES_FOR_SUMMARY`] turns.
///
/// Topics are the most frequent lowercase whitespace tokens of at least four
/// characters; equal counts keep the order in which the tokens first appeared.
pub fn summarize(store: &ConversationStore) -> Option<String> {
    let messages = store.messages();
    if messages.len() < MIN_MESSAGES_FOR_SUMMARY {
        return None;
    }

    let mut first_seen: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();
    for msg in messages {
        for word in msg.content.to_lowercase().split_whitespace() {
            if word.chars().count() < MIN_TOPIC_CHARS {
                continue;
            }
            let count = counts.entry(word.to_string()).or_insert(0);
            if *count == 0 {
                first_seen.push(word.to_string());
            }
            *count += 1;
        }
    }

    // Stable sort: ties stay in first-seen order.
    first_seen.sort_by(|a, b| counts[b].cmp(&counts[a]));
    first_seen.truncate(TOPIC_COUNT);

    Some(format!("Key topics discussed: {}", first_seen.join(", ")))
}
