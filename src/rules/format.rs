//! Email and URL format checks behind the `email` and `url` rules.
use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_LOCAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+(\.[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+)*$")
        .expect("static email local-part regex")
});

static HOST_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9\u{00a1}-\u{ffff}]([A-Za-z0-9\u{00a1}-\u{ffff}-]{0,61}[A-Za-z0-9\u{00a1}-\u{ffff}])?$")
        .expect("static host label regex")
});

static TLD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z\u{00a1}-\u{ffff}]{2,}|xn--[A-Za-z0-9-]{2,})$").expect("static tld regex")
});

const URL_SCHEMES: [&str; 3] = ["http", "https", "ftp"];

/// `local@domain` with a dotted domain ending in an alphabetic TLD.
pub fn is_email(s: &str) -> bool {
    if s.len() > 254 || s.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = s.rsplit_once('@') else {
        return false;
    };
    if local.is_empty() || local.len() > 64 || !EMAIL_LOCAL.is_match(local) {
        return false;
    }
    is_fqdn(domain, true)
}

fn is_fqdn(domain: &str, require_tld: bool) -> bool {
    let domain = domain.strip_suffix('.').unwrap_or(domain);
    if domain.is_empty() || domain.len() > 253 {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if require_tld {
        if labels.len() < 2 {
            return false;
        }
        if !labels.last().is_some_and(|tld| TLD.is_match(tld)) {
            return false;
        }
    }
    labels.iter().all(|l| HOST_LABEL.is_match(l))
}

/// http(s)/ftp URL with a host; the scheme may be omitted and no TLD is required.
pub fn is_url(s: &str) -> bool {
    if s.is_empty() || s.len() > 2083 || s.chars().any(char::is_whitespace) || s.starts_with("mailto:") {
        return false;
    }
    let candidate = if s.contains("://") { s.to_string() } else { format!("http://{s}") };
    let Ok(parsed) = url::Url::parse(&candidate) else {
        return false;
    };
    if !URL_SCHEMES.contains(&parsed.scheme()) {
        return false;
    }
    match parsed.host() {
        Some(url::Host::Domain(d)) => is_fqdn(d, false),
        Some(url::Host::Ipv4(_)) | Some(url::Host::Ipv6(_)) => true,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails() {
        assert!(is_email("test@test.com"));
        assert!(is_email("first.last+tag@sub.example.co.jp"));
        assert!(!is_email("no-at-sign.com"));
        assert!(!is_email("user@localhost"));
        assert!(!is_email("user@@example.com"));
        assert!(!is_email("us er@example.com"));
        assert!(!is_email(".user@example.com"));
    }

    #[test]
    fn urls() {
        assert!(is_url("https://example.com/a?b=c"));
        assert!(is_url("http://localhost:3000/path"));
        assert!(is_url("example.com"));
        assert!(is_url("ftp://10.0.0.1/file"));
        assert!(!is_url("javascript://alert"));
        assert!(!is_url("not a url"));
        assert!(!is_url(""));
    }
}
