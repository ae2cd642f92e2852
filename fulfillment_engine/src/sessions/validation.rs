//! Buyer input validation.
//!
//! Friend links arrive as free-form chat messages, frequently with extra text around them, sometimes copied straight
//! from the bot's own instructions. Validation extracts the first recognized link and rejects placeholder links and
//! bot-authored prompts, so an invalid message never consumes the state-machine slot.

use regex::Regex;

use super::messages;

/// Why a buyer message was not accepted as a friend link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkRejection {
    /// No recognizable Steam link in the message at all.
    NotALink,
    /// A link matching the documented example patterns, e.g. `https://s.team/p/xxxx-xxxx/xxxxx`.
    Placeholder,
    /// The message quotes one of the bot's own prompts.
    BotPrompt,
}

pub struct LinkValidator {
    patterns: Vec<Regex>,
}

impl Default for LinkValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkValidator {
    pub fn new() -> Self {
        // Known friend-link shapes: vanity profile, numeric profile, short invite, long invite.
        let patterns = [
            r"https?://steamcommunity\.com/id/[A-Za-z0-9_-]+/?",
            r"https?://steamcommunity\.com/profiles/\d+/?",
            r"https?://s\.team/p/[A-Za-z0-9-]+(?:/[A-Za-z0-9]+)?",
            r"https?://steamcommunity\.com/user/[A-Za-z0-9-]+(?:/[A-Za-z0-9]+)?",
        ]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect();
        Self { patterns }
    }

    /// Extracts and validates a friend link from a buyer message. Returns the bare link on success.
    pub fn validate_friend_link(&self, text: &str) -> Result<String, LinkRejection> {
        if messages::is_bot_prompt(text) {
            return Err(LinkRejection::BotPrompt);
        }
        let link = self
            .patterns
            .iter()
            .find_map(|p| p.find(text))
            .map(|m| m.as_str().to_string())
            .ok_or(LinkRejection::NotALink)?;
        if is_placeholder(&link) {
            return Err(LinkRejection::Placeholder);
        }
        Ok(link)
    }
}

/// Placeholder links are the ones people copy from instructions: all-x codes or literal "example" hosts/paths.
fn is_placeholder(link: &str) -> bool {
    let lower = link.to_lowercase();
    if lower.contains("example") {
        return true;
    }
    // Any path segment consisting solely of x's (with optional dashes) is a template, not a code.
    lower.split('/').skip(3).any(|segment| {
        !segment.is_empty() && segment.chars().all(|c| c == 'x' || c == '-')
    })
}
