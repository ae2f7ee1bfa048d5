//! Prompt templating and reply extraction.
//!
//! The model sees a fixed instruction preamble, the user's message on a
//! `User:` line, and an open `AI:` turn. The generator returns the prompt
//! followed by its continuation, so the reply is whatever follows the last
//! `AI:` marker.

/// Instruction line placed before every user turn.
pub const SYSTEM_PREAMBLE: &str = "You are an AI legal assistant. Answer clearly and factually.";

/// Label that opens the assistant turn and delimits the reply.
pub const REPLY_MARKER: &str = "AI:";

/// Returned instead of a generation when the message is empty.
pub const EMPTY_MESSAGE_REPLY: &str = "Please provide a valid message.";

/// Trim whitespace from both ends, counting the ASCII information
/// separators (U+001C..=U+001F) as whitespace too.
pub fn trim_message(text: &str) -> &str {
    text.trim_matches(|c: char| c.is_whitespace() || ('\u{1c}'..='\u{1f}').contains(&c))
}

/// Build the full prompt for an already-trimmed, non-empty message.
pub fn build_prompt(message: &str) -> String {
    format!("{SYSTEM_PREAMBLE}\nUser: {message}\n{REPLY_MARKER}")
}

/// Isolate the model's reply from a generation that echoes the prompt.
///
/// Keeps the text after the **last** `AI:` and trims it; with no marker the
/// whole text is trimmed. Known limitation: a reply that itself contains
/// `AI:` loses everything up to its final occurrence.
pub fn extract_reply(generated: &str) -> &str {
    let reply = generated
        .rsplit_once(REPLY_MARKER)
        .map_or(generated, |(_, reply)| reply);
    trim_message(reply)
}
