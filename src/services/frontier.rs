// src/services/frontier.rs

//! Frontier extraction: channel references found in message content.
//!
//! Two kinds of references are recognized:
//!
//! - `@name` mentions, 5-32 characters, letter first, where the `@` does
//!   not follow a word character (e-mail addresses are ignored)
//! - public links on `t.me`, `telegram.me` and `telegram.dog`, including
//!   `t.me/s/<name>` previews, found in the text or in hidden link targets
//!
//! Results are usernames without the `@`, deduplicated case-insensitively
//! in first-seen order.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::models::{Message, PeerRef};

static MENTION: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?:^|[^\w@])@([A-Za-z][A-Za-z0-9_]{4,31})\b").ok());

/// The host must start the link, so `chat.me/...` is not read as `t.me/...`.
static LINK: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:^|[^\w.@/-])((?:https?://)?(?:www\.)?(?:t\.me|telegram\.me|telegram\.dog)/[^\s<>()\[\]]+)",
    )
    .ok()
});

const LINK_HOSTS: &[&str] = &["t.me", "telegram.me", "telegram.dog"];

/// First path segments that never name a public channel.
const RESERVED_PATHS: &[&str] = &[
    "joinchat",
    "addstickers",
    "addemoji",
    "addtheme",
    "share",
    "proxy",
    "socks",
    "c",
    "iv",
    "login",
];

const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', '"', '\'', '»'];

/// Usernames mentioned with `@` in `text`.
pub fn mentions(text: &str) -> Vec<String> {
    let Some(mention) = MENTION.as_ref() else {
        return Vec::new();
    };
    mention
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Username a platform link points at, if it is a public channel link.
pub fn username_from_link(link: &str) -> Option<String> {
    let with_scheme = if link.contains("://") {
        link.to_string()
    } else {
        format!("https://{link}")
    };
    let url = Url::parse(&with_scheme).ok()?;
    let host = url.host_str()?.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    if !LINK_HOSTS.contains(&host) {
        return None;
    }

    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
    let mut first = segments.next()?;
    if first.eq_ignore_ascii_case("s") {
        first = segments.next()?;
    }

    if first.starts_with('+') || RESERVED_PATHS.contains(&first.to_lowercase().as_str()) {
        return None;
    }
    is_username(first).then(|| first.to_string())
}

fn is_username(name: &str) -> bool {
    let len = name.chars().count();
    (5..=32).contains(&len)
        && name.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Usernames linked from `text`.
pub fn links(text: &str) -> Vec<String> {
    let Some(link) = LINK.as_ref() else {
        return Vec::new();
    };
    link.captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim_end_matches(TRAILING_PUNCTUATION))
        .filter_map(username_from_link)
        .collect()
}

/// Every channel reference in a message: text mentions, text links and
/// hidden link targets.
pub fn extract_references(message: &Message) -> Vec<PeerRef> {
    let text = message.text();
    let candidates = mentions(text)
        .into_iter()
        .chain(links(text))
        .chain(
            message
                .text_urls
                .iter()
                .filter_map(|url| username_from_link(url)),
        );

    let mut seen = HashSet::new();
    candidates
        .filter(|name| seen.insert(name.to_lowercase()))
        .map(PeerRef::Username)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(message: &Message) -> Vec<String> {
        extract_references(message)
            .into_iter()
            .map(|r| r.to_string())
            .collect()
    }

    #[test]
    fn mentions_need_five_chars_and_a_leading_letter() {
        assert_eq!(
            mentions("join @somechannel and @abc and @1channel"),
            vec!["somechannel"]
        );
    }

    #[test]
    fn email_addresses_are_not_mentions() {
        assert!(mentions("mail sales@shopfront.com now").is_empty());
        assert_eq!(mentions("(@shopfront)"), vec!["shopfront"]);
    }

    #[test]
    fn public_links_yield_usernames() {
        assert_eq!(
            username_from_link("https://t.me/night_market"),
            Some("night_market".into())
        );
        assert_eq!(
            username_from_link("t.me/s/night_market/123"),
            Some("night_market".into())
        );
        assert_eq!(
            username_from_link("https://telegram.me/bazaar_news"),
            Some("bazaar_news".into())
        );
        assert_eq!(username_from_link("https://example.com/bazaar_news"), None);
    }

    #[test]
    fn trailing_punctuation_is_not_part_of_the_link() {
        assert_eq!(
            links("see t.me/night_market, or https://t.me/bazaar_news."),
            vec!["night_market", "bazaar_news"]
        );
    }

    #[test]
    fn hosts_ending_in_t_me_are_not_links() {
        assert!(links("photos at https://chat.me/summer_pics").is_empty());
        assert!(links("gallery: reddit.me/gallery_one").is_empty());
        assert!(links("art.me/painter_joe").is_empty());
        assert_eq!(
            links("mirror https://chat.me/summer_pics or (t.me/summer_pics)"),
            vec!["summer_pics"]
        );
    }

    #[test]
    fn reserved_and_invite_links_are_ignored() {
        assert_eq!(username_from_link("https://t.me/joinchat/AbCdEf"), None);
        assert_eq!(username_from_link("https://t.me/+AbCdEfGh"), None);
        assert_eq!(username_from_link("https://t.me/addstickers/packname"), None);
        assert_eq!(username_from_link("https://t.me/c/12345/6"), None);
    }

    #[test]
    fn references_are_deduplicated_across_sources() {
        let mut message = Message::new(
            1,
            "follow @NightMarket or https://t.me/nightmarket, also @other_shop",
        );
        message.text_urls = vec![
            "https://t.me/hidden_shop".into(),
            "https://t.me/Other_Shop".into(),
        ];

        assert_eq!(
            names(&message),
            vec!["@NightMarket", "@other_shop", "@hidden_shop"]
        );
    }

    #[test]
    fn message_without_text_can_still_link() {
        let mut message = Message::new(2, "");
        message.text = None;
        message.text_urls = vec!["https://t.me/s/preview_only".into()];
        assert_eq!(names(&message), vec!["@preview_only"]);
    }
}
