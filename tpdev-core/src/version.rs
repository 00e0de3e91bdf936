//! Telepresence client version parsing

/// Extract the client version from `telepresence version` output.
///
/// Output looks like:
/// ```text
/// Client: v2.24.0 (api v3)
/// Root Daemon: not running
/// User Daemon: not running
/// ```
/// Returns the first `vMAJOR.MINOR.PATCH` token after a `Client:` label
/// (label matched case-insensitively), or None.
pub fn parse_client_version(text: &str) -> Option<String> {
    let lower = text.to_ascii_lowercase();
    let mut search_from = 0;

    while let Some(found) = lower[search_from..].find("client:") {
        let after_label = search_from + found + "client:".len();
        let rest = text[after_label..].trim_start();
        if let Some(version) = leading_semver(rest) {
            return Some(version);
        }
        search_from = after_label;
    }
    None
}

/// Match `v<digits>.<digits>.<digits>` at the start of `s`.
fn leading_semver(s: &str) -> Option<String> {
    let body = s.strip_prefix('v').or_else(|| s.strip_prefix('V'))?;

    let mut end = 0;
    let mut groups = 0;
    let bytes = body.as_bytes();
    while groups < 3 {
        let start = end;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
        if end == start {
            return None;
        }
        groups += 1;
        if groups < 3 {
            if end < bytes.len() && bytes[end] == b'.' {
                end += 1;
            } else {
                return None;
            }
        }
    }
    Some(format!("v{}", &body[..end]))
}

/// Strip a single leading `v`/`V` so `v2.24.0` and `2.24.0` compare equal.
pub fn normalize(version: &str) -> &str {
    let trimmed = version.trim();
    trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed)
}

pub fn versions_match(reported: &str, pinned: &str) -> bool {
    normalize(reported) == normalize(pinned)
}

/// Release tag shape: `vMAJOR.MINOR.PATCH` with an optional `-prerelease`
/// of ASCII alphanumerics, dots and dashes. Such a tag is a single safe
/// path component and URL segment.
pub fn is_release_tag(tag: &str) -> bool {
    if !tag.starts_with('v') {
        return false;
    }
    let Some(core) = leading_semver(tag) else {
        return false;
    };
    match &tag[core.len()..] {
        "" => true,
        rest => rest.strip_prefix('-').is_some_and(|pre| {
            !pre.is_empty()
                && pre
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'-')
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_client_line() {
        let text = "Client: v2.24.0 (api v3)\nRoot Daemon: not running\nUser Daemon: not running";
        assert_eq!(parse_client_version(text), Some("v2.24.0".to_string()));
    }

    #[test]
    fn test_parse_label_case_insensitive() {
        assert_eq!(
            parse_client_version("OSS Client:   v2.19.1"),
            Some("v2.19.1".to_string())
        );
        assert_eq!(parse_client_version("client: v1.2.3"), Some("v1.2.3".to_string()));
    }

    #[test]
    fn test_parse_missing_or_malformed() {
        assert_eq!(parse_client_version(""), None);
        assert_eq!(parse_client_version("Root Daemon: v2.24.0"), None);
        assert_eq!(parse_client_version("Client: 2.24.0"), None);
        assert_eq!(parse_client_version("Client: v2.24"), None);
        assert_eq!(parse_client_version("Client: not available"), None);
    }

    #[test]
    fn test_parse_skips_to_later_label() {
        let text = "Client: unknown\nClient: v2.20.3";
        assert_eq!(parse_client_version(text), Some("v2.20.3".to_string()));
    }

    #[test]
    fn test_prerelease_suffix_ignored() {
        assert_eq!(
            parse_client_version("Client: v2.25.0-rc.1 (api v3)"),
            Some("v2.25.0".to_string())
        );
    }

    #[test]
    fn test_versions_match_normalizes_leading_v() {
        assert!(versions_match("v2.24.0", "v2.24.0"));
        assert!(versions_match("2.24.0", "v2.24.0"));
        assert!(versions_match("v2.24.0", "2.24.0"));
        assert!(!versions_match("v2.24.1", "v2.24.0"));
        assert!(!versions_match("v2.24.0", "vv2.24.0"));
    }

    #[test]
    fn test_release_tag_shape() {
        assert!(is_release_tag("v2.24.0"));
        assert!(is_release_tag("v2.25.0-rc.1"));
        assert!(!is_release_tag("2.24.0"));
        assert!(!is_release_tag("v2.24"));
        assert!(!is_release_tag("../x"));
        assert!(!is_release_tag("v2.24.0/../../x"));
        assert!(!is_release_tag("v2.24.0-"));
        assert!(!is_release_tag(""));
    }
}
