//! Detection of link-like tokens in user text.

const PREFIXES: [&str; 3] = ["http://", "https://", "www."];
const SUFFIXES: [&str; 3] = [".com", ".net", ".kr"];

/// Whitespace-separated tokens that look like links: they start with
/// `http://`, `https://` or `www.`, or end with `.com`, `.net` or `.kr`
/// (case-insensitive). Order is preserved; duplicates are kept.
pub fn detect_urls(text: &str) -> Vec<&str> {
    text.split_whitespace()
        .filter(|token| {
            let lower = token.to_lowercase();
            PREFIXES.iter().any(|p| lower.starts_with(p)) || SUFFIXES.iter().any(|s| lower.ends_with(s))
        })
        .collect()
}

/// Prefix `https://` when the token carries no http(s) scheme.
pub fn normalize_url(token: &str) -> String {
    if token.starts_with("http://") || token.starts_with("https://") {
        token.to_string()
    } else {
        format!("https://{token}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_prefixed_and_suffixed_tokens() {
        let found = detect_urls("see https://a.io and www.b.org or naver.com not foo.org");
        assert_eq!(found, vec!["https://a.io", "www.b.org", "naver.com"]);
    }

    #[test]
    fn trailing_punctuation_defeats_suffix_match() {
        assert!(detect_urls("visit naver.com,").is_empty());
    }

    #[test]
    fn suffix_match_ignores_case() {
        assert_eq!(detect_urls("EXAMPLE.KR"), vec!["EXAMPLE.KR"]);
    }

    #[test]
    fn normalize_adds_scheme() {
        assert_eq!(normalize_url("www.daum.net"), "https://www.daum.net");
        assert_eq!(normalize_url("http://x.com"), "http://x.com");
    }

    #[test]
    fn plain_text_has_no_urls() {
        assert!(detect_urls("hello there").is_empty());
    }
}
