/// Hostname extraction and domain-list input handling
use url::Url;

/// Extract the hostname from a saveable URL
///
/// Only absolute `http` / `https` URLs qualify. Browser-internal pages
/// (`about:`, `chrome://`, `moz-extension://`, ...) and anything that fails
/// to parse yield `None`, which keeps them out of saved groups.
///
/// Examples:
/// - https://www.google.com/search → www.google.com
/// - http://localhost:3000/app → localhost
/// - about:blank → None
pub fn hostname(url: &str) -> Option<String> {
    let url = url.trim();
    if !url.starts_with("http") {
        return None;
    }

    let parsed = Url::parse(url).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }

    parsed
        .host_str()
        .filter(|host| !host.is_empty())
        .map(|host| host.to_lowercase())
}

/// Normalize what a user typed into a domain list field
///
/// Accepts a full URL ("https://news.ycombinator.com/item?id=1"), a bare host
/// ("news.ycombinator.com") or, failing both, the raw trimmed text.
pub fn normalize_domain_input(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    hostname(input)
        .or_else(|| hostname(&format!("http://{}", input)))
        .or_else(|| Some(input.to_lowercase()))
}

/// Whether `url` points at one of the extension's own pages
pub fn is_own_page(url: &str, own_origin: &str) -> bool {
    let origin = own_origin.trim_end_matches('/');
    !origin.is_empty() && url.trim().starts_with(origin)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hostname_basic() {
        assert_eq!(hostname("https://www.google.com"), Some("www.google.com".to_string()));
        assert_eq!(hostname("http://google.com"), Some("google.com".to_string()));
        assert_eq!(
            hostname("https://github.com/rust-lang/rust?tab=readme"),
            Some("github.com".to_string())
        );
    }

    #[test]
    fn test_hostname_keeps_subdomains() {
        assert_eq!(hostname("https://ai.microsoft.com"), Some("ai.microsoft.com".to_string()));
        assert_eq!(hostname("https://news.bbc.co.uk/article"), Some("news.bbc.co.uk".to_string()));
    }

    #[test]
    fn test_hostname_strips_port_and_case() {
        assert_eq!(hostname("http://localhost:3000"), Some("localhost".to_string()));
        assert_eq!(hostname("http://127.0.0.1:8080/x"), Some("127.0.0.1".to_string()));
        assert_eq!(hostname("https://GitHub.COM"), Some("github.com".to_string()));
    }

    #[test]
    fn test_hostname_rejects_internal_pages() {
        assert_eq!(hostname("about:blank"), None);
        assert_eq!(hostname("chrome://extensions"), None);
        assert_eq!(hostname("moz-extension://abc/options.html"), None);
        assert_eq!(hostname("file:///home/user/a.html"), None);
        assert_eq!(hostname("ftp://files.example.com"), None);
    }

    #[test]
    fn test_hostname_edge_cases() {
        assert_eq!(hostname(""), None);
        assert_eq!(hostname("not-a-url"), None);
        assert_eq!(hostname("https://"), None);
        assert_eq!(hostname("httpfoo"), None);
    }

    #[test]
    fn test_normalize_domain_input() {
        assert_eq!(
            normalize_domain_input("https://news.ycombinator.com/item?id=1"),
            Some("news.ycombinator.com".to_string())
        );
        assert_eq!(normalize_domain_input("  Example.com "), Some("example.com".to_string()));
        assert_eq!(normalize_domain_input("   "), None);
    }

    #[test]
    fn test_is_own_page() {
        let origin = "moz-extension://1234-abcd/";
        assert!(is_own_page("moz-extension://1234-abcd/options.html", origin));
        assert!(!is_own_page("moz-extension://other/options.html", origin));
        assert!(!is_own_page("https://example.com", origin));
        assert!(!is_own_page("https://example.com", ""));
    }
}
