use url::Url;

/// Hostname of `value`, accepting bare domains such as `example.com/login`.
pub fn hostname(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    let parsed = match Url::parse(value) {
        Ok(url) => url,
        Err(_) if !value.contains("://") && value.contains('.') => {
            Url::parse(&format!("http://{}", value)).ok()?
        }
        Err(_) => return None,
    };
    parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .map(|h| h.trim_end_matches('.').to_ascii_lowercase())
}

/// True when the URL's host is one of `list` or a subdomain of one.
///
/// Matching is on label boundaries: `sub.example.com` is in `["example.com"]`,
/// `badexample.com` is not. Unparsable URLs are never in the list.
pub fn is_url_in_list<S: AsRef<str>>(url: &str, list: &[S]) -> bool {
    if list.is_empty() {
        return false;
    }
    let Some(host) = hostname(url) else {
        return false;
    };
    list.iter().any(|entry| {
        let entry = entry.as_ref().trim().trim_end_matches('.').to_ascii_lowercase();
        !entry.is_empty()
            && (host == entry
                || host
                    .strip_suffix(entry.as_str())
                    .is_some_and(|rest| rest.ends_with('.')))
    })
}

/// Display name for a URL: its host without a leading `www.`.
pub fn name_from_url(value: &str) -> Option<String> {
    let host = hostname(value)?;
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_match_on_label_boundary() {
        let list = ["bitwarden.com"];
        assert!(is_url_in_list("https://sub.bitwarden.com/x", &list));
        assert!(is_url_in_list("https://bitwarden.com", &list));
        assert!(is_url_in_list("https://a.b.BITWARDEN.com:8443/", &list));
        assert!(!is_url_in_list("https://evil-bitwarden.com", &list));
        assert!(!is_url_in_list("https://bitwarden.com.evil.net", &list));
    }

    #[test]
    fn invalid_or_empty_inputs() {
        let list = ["example.com"];
        let empty: [&str; 0] = [];
        assert!(!is_url_in_list("", &list));
        assert!(!is_url_in_list("not a url", &list));
        assert!(!is_url_in_list("https://example.com", &empty));
        assert!(!is_url_in_list("https://example.com", &[""]));
    }

    #[test]
    fn bare_domains_get_a_scheme() {
        assert_eq!(hostname("example.com/login"), Some("example.com".to_string()));
        assert_eq!(hostname("localhost"), None);
        assert_eq!(name_from_url("https://www.example.com/a"), Some("example.com".to_string()));
    }
}
