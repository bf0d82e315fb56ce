//! Deny-by-default chat allow-list, applied at ingress before an inbound
//! event ever reaches the agent pipeline.

use crate::types::ChatId;

/// Return `true` if `chat_id` may talk to the bot.
///
/// An empty `allow_list` denies everyone. A single `"*"` entry allows
/// everyone. Otherwise `chat_id` must match an entry exactly.
pub fn is_allowed(allow_list: &[String], chat_id: &ChatId) -> bool {
    if allow_list.is_empty() {
        return false;
    }
    if allow_list.iter().any(|e| e == "*") {
        return true;
    }
    allow_list.iter().any(|e| e == chat_id.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat(id: &str) -> ChatId {
        ChatId::from(id)
    }

    #[test]
    fn empty_list_denies_everyone() {
        assert!(!is_allowed(&[], &chat("123")));
    }

    #[test]
    fn wildcard_allows_everyone() {
        let list = vec!["*".to_string()];
        assert!(is_allowed(&list, &chat("123")));
        assert!(is_allowed(&list, &chat("anything")));
    }

    #[test]
    fn exact_match_allowed() {
        let list = vec!["123".to_string(), "456".to_string()];
        assert!(is_allowed(&list, &chat("123")));
        assert!(is_allowed(&list, &chat("456")));
    }

    #[test]
    fn non_member_denied() {
        let list = vec!["123".to_string()];
        assert!(!is_allowed(&list, &chat("999")));
    }

    #[test]
    fn wildcard_mixed_with_entries_still_allows_all() {
        let list = vec!["123".to_string(), "*".to_string()];
        assert!(is_allowed(&list, &chat("anything")));
    }
}
