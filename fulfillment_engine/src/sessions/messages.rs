//! The fixed catalog of buyer-facing chat messages.
//!
//! Every message the bot sends comes from here, for two reasons: vendor error codes must map onto a fixed set of
//! human messages, and the link validator needs to recognize the bot's own prompts so the bot never replies to
//! itself.

use vendor_tools::{FieldSpec, VendorErrorCode};

pub const FRIEND_LINK_FIELD: &str = "friend_link";

/// Prompt phrases that identify a message as bot-authored. Checked by the validator before any buyer input is
/// accepted.
pub const PROMPT_MARKERS: &[&str] = &[
    "Please send your Steam friend invite link",
    "Please send your",
    "Thank you for your purchase",
    "Your order could not be completed",
    "The seller has been notified",
];

pub fn prompt_for(field: &FieldSpec) -> String {
    if field.name == FRIEND_LINK_FIELD {
        "Please send your Steam friend invite link (Steam → Friends → Add a Friend → copy the invite link). It looks \
         like https://s.team/p/abcd-efgh/XYZW."
            .to_string()
    } else {
        format!("Please send your {}.", field.label)
    }
}

pub fn invalid_input(field: &FieldSpec) -> String {
    format!("That doesn't look like a valid {}. {}", field.label, prompt_for(field))
}

pub fn placeholder_link(field: &FieldSpec) -> String {
    format!(
        "That looks like the example link from the instructions, not your own. Please copy your personal invite link \
         from the Steam client. {}",
        prompt_for(field)
    )
}

pub fn delivery_success(game_name: &str, transaction_id: Option<&str>) -> String {
    match transaction_id {
        Some(tx) => format!("Thank you for your purchase! {game_name} has been sent (transaction {tx}). Please accept the gift."),
        None => format!("Thank you for your purchase! {game_name} has been sent. Please accept the gift."),
    }
}

/// One fixed human message per vendor error code.
pub fn delivery_failure(code: VendorErrorCode) -> String {
    let reason = match code {
        VendorErrorCode::InsufficientFunds => "the seller's balance is being topped up right now",
        VendorErrorCode::InvalidInviteLink => "the friend link you sent was not accepted",
        VendorErrorCode::UnknownApp => "this game is temporarily unavailable from the supplier",
        VendorErrorCode::RegionUnavailable => "this game cannot be gifted to your region at the moment",
        VendorErrorCode::PositionUnavailable => "this top-up denomination is temporarily unavailable",
        VendorErrorCode::DuplicateReference => "this order appears to have been delivered already",
        VendorErrorCode::Other(_) => "the supplier rejected the delivery",
    };
    format!("Your order could not be completed: {reason}. The seller has been notified; please wait or contact them with !callAdmin.")
}

pub fn transport_failure() -> String {
    "Your order could not be completed right now due to a technical problem. The seller has been notified; please \
     wait or contact them with !callAdmin."
        .to_string()
}

pub fn resolution_failure() -> String {
    "Your order could not be matched to a deliverable item. The seller has been notified and will deliver manually."
        .to_string()
}

pub fn redeem_unknown() -> String {
    "Unknown or expired code. Please check the code and try again.".to_string()
}

pub fn call_admin_ack() -> String {
    "The seller has been notified and will reply here as soon as possible.".to_string()
}

/// True when the text is (or quotes) one of the bot's own prompts.
pub fn is_bot_prompt(text: &str) -> bool {
    PROMPT_MARKERS.iter().any(|marker| text.contains(marker))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn bot_prompts_are_recognized() {
        let field = FieldSpec { name: FRIEND_LINK_FIELD.to_string(), label: "Steam friend invite link".to_string() };
        assert!(is_bot_prompt(&prompt_for(&field)));
        assert!(is_bot_prompt(&invalid_input(&field)));
        assert!(is_bot_prompt(&delivery_success("Elden Ring", None)));
        assert!(is_bot_prompt(&delivery_failure(VendorErrorCode::RegionUnavailable)));
        assert!(!is_bot_prompt("https://s.team/p/abcd-efgh/xyzw"));
    }
}
