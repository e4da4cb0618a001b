/// Domain filtering: which URLs may be saved, and edits to the domain lists
use log::warn;

use crate::domain::{hostname, is_own_page, normalize_domain_input};
use crate::settings::{DomainList, FilterMode, Settings};

/// Decide whether a tab with this URL is eligible for saving
///
/// Non-http(s) URLs are never saved. In deny-list mode everything except the
/// listed hostnames is saved; in allow-list mode only the listed hostnames
/// are. A mode this build does not recognize lets everything through.
pub fn should_save(url: &str, settings: &Settings) -> bool {
    let Some(host) = hostname(url) else {
        return false;
    };

    match settings.mode {
        FilterMode::Blacklist => !settings.blacklist.contains(&host),
        FilterMode::Whitelist => settings.whitelist.contains(&host),
        FilterMode::Unrecognized => {
            warn!("Unrecognized filter mode, saving {}", host);
            true
        }
    }
}

/// `should_save`, additionally refusing the extension's own pages
pub fn should_save_from(url: &str, settings: &Settings, own_origin: &str) -> bool {
    !is_own_page(url, own_origin) && should_save(url, settings)
}

/// Add the hostname to the list selected by the current mode, or remove it
/// if it is already there
///
/// Returns the updated list. Empty hostnames and unrecognized modes leave the
/// settings untouched.
pub fn toggle_domain(host: &str, settings: &mut Settings) -> Vec<String> {
    let Some(which) = settings.mode.active_list() else {
        return Vec::new();
    };

    let host = host.trim().to_lowercase();
    let list = settings.list_mut(which);
    if host.is_empty() {
        return list.clone();
    }

    if let Some(pos) = list.iter().position(|d| *d == host) {
        list.remove(pos);
    } else {
        list.push(host);
        list.sort();
    }

    list.clone()
}

/// Add a user-typed domain to a list; returns false if nothing changed
pub fn add_domain(input: &str, which: DomainList, settings: &mut Settings) -> bool {
    let Some(host) = normalize_domain_input(input) else {
        return false;
    };

    let list = settings.list_mut(which);
    if list.contains(&host) {
        return false;
    }

    list.push(host);
    list.sort();
    true
}

/// Remove a domain from a list; returns false if it was not listed
pub fn remove_domain(domain: &str, which: DomainList, settings: &mut Settings) -> bool {
    let list = settings.list_mut(which);
    let original_len = list.len();
    list.retain(|d| d != domain);
    list.len() < original_len
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_with(mode: FilterMode, deny: &[&str], allow: &[&str]) -> Settings {
        Settings {
            mode,
            blacklist: deny.iter().map(|d| d.to_string()).collect(),
            whitelist: allow.iter().map(|d| d.to_string()).collect(),
            ..Settings::default()
        }
    }

    #[test]
    fn test_deny_list_mode() {
        let settings = settings_with(FilterMode::Blacklist, &["mail.google.com"], &[]);

        assert!(!should_save("https://mail.google.com/inbox", &settings));
        assert!(should_save("https://www.google.com", &settings));
        assert!(should_save("http://example.org/page", &settings));
    }

    #[test]
    fn test_allow_list_mode() {
        let settings = settings_with(FilterMode::Whitelist, &[], &["docs.rs"]);

        assert!(should_save("https://docs.rs/serde", &settings));
        assert!(!should_save("https://crates.io", &settings));
    }

    #[test]
    fn test_deny_list_ignores_allow_list() {
        let settings = settings_with(FilterMode::Blacklist, &[], &["docs.rs"]);
        assert!(should_save("https://crates.io", &settings));
    }

    #[test]
    fn test_non_http_urls_never_saved() {
        for mode in [FilterMode::Blacklist, FilterMode::Whitelist, FilterMode::Unrecognized] {
            let settings = settings_with(mode, &[], &["about"]);
            assert!(!should_save("about:blank", &settings));
            assert!(!should_save("chrome://settings", &settings));
            assert!(!should_save("", &settings));
        }
    }

    #[test]
    fn test_unrecognized_mode_fails_open() {
        let settings = settings_with(FilterMode::Unrecognized, &["a.com"], &[]);
        assert!(should_save("https://a.com", &settings));
    }

    #[test]
    fn test_own_pages_rejected_in_every_mode() {
        let origin = "https://shelf.example/";
        let settings = settings_with(FilterMode::Whitelist, &[], &["shelf.example"]);

        assert!(!should_save_from("https://shelf.example/options.html", &settings, origin));
        assert!(should_save("https://shelf.example/options.html", &settings));
    }

    #[test]
    fn test_toggle_domain_adds_then_removes() {
        let mut settings = settings_with(FilterMode::Blacklist, &["a.com"], &[]);

        assert_eq!(toggle_domain("b.com", &mut settings), vec!["a.com", "b.com"]);
        assert_eq!(settings.blacklist, vec!["a.com", "b.com"]);

        assert_eq!(toggle_domain("b.com", &mut settings), vec!["a.com"]);
        assert_eq!(settings.blacklist, vec!["a.com"]);
    }

    #[test]
    fn test_toggle_domain_keeps_sorted() {
        let mut settings = settings_with(FilterMode::Whitelist, &[], &["m.com", "z.com"]);

        toggle_domain("a.com", &mut settings);

        assert_eq!(settings.whitelist, vec!["a.com", "m.com", "z.com"]);
        assert!(settings.blacklist.is_empty());
    }

    #[test]
    fn test_toggle_domain_empty_is_noop() {
        let mut settings = settings_with(FilterMode::Blacklist, &["a.com"], &[]);

        assert_eq!(toggle_domain("", &mut settings), vec!["a.com"]);
        assert_eq!(settings.blacklist, vec!["a.com"]);
    }

    #[test]
    fn test_add_domain_normalizes_and_dedupes() {
        let mut settings = Settings::default();

        assert!(add_domain("https://z.com/path", DomainList::Deny, &mut settings));
        assert!(add_domain("b.com", DomainList::Deny, &mut settings));
        assert!(!add_domain("http://b.com", DomainList::Deny, &mut settings));

        assert_eq!(settings.blacklist, vec!["b.com", "z.com"]);
    }

    #[test]
    fn test_remove_domain() {
        let mut settings = settings_with(FilterMode::Whitelist, &[], &["a.com", "b.com"]);

        assert!(remove_domain("a.com", DomainList::Allow, &mut settings));
        assert!(!remove_domain("a.com", DomainList::Allow, &mut settings));
        assert_eq!(settings.whitelist, vec!["b.com"]);
    }

    #[test]
    fn test_toggle_domain_lowercases() {
        let mut settings = Settings::default();

        assert_eq!(toggle_domain(" Example.COM ", &mut settings), vec!["example.com"]);
        assert!(!should_save("https://example.com/page", &settings));

        assert!(toggle_domain("EXAMPLE.com", &mut settings).is_empty());
        assert!(should_save("https://example.com/page", &settings));
    }
}
