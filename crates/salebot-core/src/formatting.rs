//! Text rendering for moderation and publish messages, plus parsing of what
//! moderators reply to.

use crate::{
    domain::{PostId, UserId},
    i18n::TITLE_LABELS,
};

const POST_TAG: &str = "#post";

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Usernames made only of `[A-Za-z0-9_]` can be mentioned as `@name` verbatim.
pub fn is_safe_username(username: &str) -> bool {
    !username.is_empty()
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// HTML "posted by" value for the publish message.
pub fn posted_by_html(user_id: UserId, username: Option<&str>) -> String {
    match username {
        Some(name) if is_safe_username(name) => format!("@{name}"),
        _ => format!("<a href=\"tg://user?id={}\">user</a>", user_id.0),
    }
}

pub fn post_tag(id: PostId) -> String {
    format!("{POST_TAG}{}", id.0)
}

/// First `#post<digits>` tag in the text.
pub fn parse_post_tag(text: &str) -> Option<PostId> {
    let mut rest = text;
    while let Some(idx) = rest.find(POST_TAG) {
        let after = &rest[idx + POST_TAG.len()..];
        let digits: String = after.chars().take_while(|c| c.is_ascii_digit()).collect();
        if let Ok(id) = digits.parse::<i64>() {
            return Some(PostId(id));
        }
        rest = after;
    }
    None
}

/// Title from a moderation preview: the rest of the first line that starts
/// with a known title label.
pub fn extract_title(text: &str) -> Option<String> {
    text.lines().find_map(|line| {
        let line = line.trim_start();
        TITLE_LABELS
            .iter()
            .find_map(|label| line.strip_prefix(label))
            .map(|t| t.trim_end().to_string())
            .filter(|t| !t.is_empty())
    })
}
