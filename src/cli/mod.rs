use crate::memory::{ DEFAULT_CONTEXT_CHARS, DEFAULT_RECENT_COUNT };
use clap::Parser;

/// Accepts a finite cosine threshold in `[0, 1]`.
fn parse_similarity_threshold(s: &str) -> Result<f64, String> {
    let value: f64 = s.trim().parse().map_err(|e| format!("'{}' is not a number: {}", s, e))?;
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(format!("similarity threshold must be between 0.0 and 1.0, got '{}'", s));
    }
    Ok(value)
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- History Store Args ---
    /// History chat store type (file, redis, memory)
    #[arg(long, env = "HISTORY_TYPE", default_value = "file")]
    pub history_type: String,

    /// Directory holding the history blob for the file store.
    #[arg(long, env = "HISTORY_PATH", default_value = "data")]
    pub history_path: String,

    /// History chat store host endpoint for the redis store (e.g., redis://127.0.0.1:6379)
    #[arg(long, env = "HISTORY_HOST", default_value = "redis://127.0.0.1:6379")]
    pub history_host: String,

    /// Key under which the whole conversation log is persisted.
    #[arg(long, env = "HISTORY_KEY", default_value = "vectorChatHistory")]
    pub history_key: String,

    // --- Conversation Memory Args ---
    /// Hard cap, in characters, on the context block injected into a prompt.
    #[arg(long, env = "MAX_CONTEXT_LENGTH", default_value = "4000")]
    pub max_context_length: usize,

    /// Number of most recent turns always preferred as context.
    #[arg(long, env = "MAX_RECENT_MESSAGES", default_value = "10")]
    pub max_recent_messages: usize,

    /// Cosine similarity an older turn must exceed to be re-injected (0.0 to 1.0).
    #[arg(long, env = "SIMILARITY_THRESHOLD", default_value = "0.3", value_parser = parse_similarity_threshold)]
    pub similarity_threshold: f64,

    /// Character budget requested for each relevant-context lookup.
    #[arg(long, env = "CONTEXT_MAX_CHARS", default_value_t = DEFAULT_CONTEXT_CHARS)]
    pub context_max_chars: usize,

    /// Number of turns returned by a plain recent-context lookup.
    #[arg(long, env = "RECENT_CONTEXT_COUNT", default_value_t = DEFAULT_RECENT_COUNT)]
    pub recent_context_count: usize,

    // --- Chat LLM Provider Args ---
    /// Type of LLM provider for chat completion (ollama, openai, anthropic, gemini, deepseek, xai, groq)
    #[arg(long, env = "CHAT_LLM_TYPE", default_value = "gemini")]
    pub chat_llm_type: String,

    /// Base URL for the Chat LLM provider API (e.g., http://localhost:11434 for Ollama)
    #[arg(long, env = "CHAT_BASE_URL")] // No default, let adapters handle defaults if None
    pub chat_base_url: Option<String>,

    /// API Key for the Chat LLM provider
    #[arg(long, env = "CHAT_API_KEY", default_value = "")]
    pub chat_api_key: String,

    /// Model name for chat completion (e.g., gemini-2.5-flash, gpt-4o, llama3)
    #[arg(long, env = "CHAT_MODEL")] // No default, rely on adapter defaults if None
    pub chat_model: Option<String>,

    // --- General App Args ---
    /// Path to the prompt configuration file. Built-in prompts are used when unset.
    #[arg(long, env = "PROMPTS_PATH")]
    pub prompts_path: Option<String>,

    /// Host address and port for the server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,

    /// Optional API Key required for clients to connect to the WebSocket server. If set, clients must provide this key.
    #[arg(long, env = "SERVER_API_KEY")]
    pub server_api_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_memory_constants() {
        let args = Args::parse_from(["vector-chat"]);
        assert_eq!(args.context_max_chars, DEFAULT_CONTEXT_CHARS);
        assert_eq!(args.recent_context_count, DEFAULT_RECENT_COUNT);
    }

    #[test]
    fn similarity_threshold_must_be_a_unit_fraction() {
        let args = Args::try_parse_from(["vector-chat", "--similarity-threshold", "0.45"]).unwrap();
        assert_eq!(args.similarity_threshold, 0.45);

        for bad in ["NaN", "inf", "-0.1", "1.5", "high"] {
            assert!(
                Args::try_parse_from(["vector-chat", "--similarity-threshold", bad]).is_err(),
                "{} should be rejected",
                bad
            );
        }
    }
}
