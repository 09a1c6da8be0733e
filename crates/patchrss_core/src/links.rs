use url::Url;

/// True iff `s` is a syntactically valid absolute URL with scheme http or https.
pub fn is_valid_http_url(s: &str) -> bool {
    match Url::parse(s) {
        Ok(url) => matches!(url.scheme(), "http" | "https"),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_and_https_accepted() {
        assert!(is_valid_http_url("http://example.com"));
        assert!(is_valid_http_url("https://example.com/p/1?x=y#z"));
        assert!(is_valid_http_url("HTTPS://EXAMPLE.COM/"));
    }

    #[test]
    fn test_other_schemes_rejected() {
        assert!(!is_valid_http_url("ftp://example.com/feed"));
        assert!(!is_valid_http_url("mailto:someone@example.com"));
        assert!(!is_valid_http_url("urn:uuid:1234"));
    }

    #[test]
    fn test_non_urls_rejected() {
        assert!(!is_valid_http_url(""));
        assert!(!is_valid_http_url("not-a-url"));
        assert!(!is_valid_http_url("abc-123"));
        assert!(!is_valid_http_url("/relative/path"));
    }
}
