//! Share-link recognition.
//!
//! Links are matched against a table of named patterns; the first pattern
//! that captures an identifier wins.

use once_cell::sync::Lazy;
use regex::Regex;

/// A named share-link shape.
pub struct LinkPattern {
    pub name: &'static str,
    /// Recognizes the link shape.
    detect: Regex,
    /// Captures the file identifier in group 1.
    id: Regex,
}

impl LinkPattern {
    fn new(name: &'static str, detect: &str, id: &str) -> Self {
        Self {
            name,
            detect: Regex::new(detect).expect("share-link detect pattern must compile"),
            id: Regex::new(id).expect("share-link id pattern must compile"),
        }
    }

    pub fn matches(&self, url: &str) -> bool {
        self.detect.is_match(url)
    }

    pub fn file_id(&self, url: &str) -> Option<String> {
        if !self.matches(url) {
            return None;
        }
        self.id
            .captures(url)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }
}

static SHARE_LINK_PATTERNS: Lazy<Vec<LinkPattern>> = Lazy::new(|| {
    vec![
        // https://drive.google.com/file/d/<id>/view
        LinkPattern::new(
            "drive-file",
            r"drive\.google\.com/file/d/",
            r"/d/([a-zA-Z0-9_-]+)",
        ),
        // https://drive.google.com/open?id=<id>
        LinkPattern::new(
            "drive-open",
            r"drive\.google\.com/open\?id=",
            r"[?&]id=([a-zA-Z0-9_-]+)",
        ),
        // https://docs.google.com/<kind>/d/<id>/edit
        LinkPattern::new(
            "docs-path",
            r"docs\.google\.com/.*/d/",
            r"/d/([a-zA-Z0-9_-]+)",
        ),
        // https://docs.google.com/uc?export=download&id=<id>
        LinkPattern::new(
            "docs-query",
            r"docs\.google\.com/.*[?&]id=",
            r"[?&]id=([a-zA-Z0-9_-]+)",
        ),
    ]
});

/// Large-file interstitial pages carry the confirmation token in a link or form.
static CONFIRM_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"confirm=([0-9A-Za-z_-]+)|name="confirm"\s+value="([0-9A-Za-z_-]+)""#)
        .expect("confirm token pattern must compile")
});

/// All known share-link patterns, in match order.
pub fn share_link_patterns() -> &'static [LinkPattern] {
    &SHARE_LINK_PATTERNS
}

/// Whether `url` is a recognized share link.
pub fn is_remote_link(url: &str) -> bool {
    SHARE_LINK_PATTERNS.iter().any(|p| p.matches(url))
}

/// Stable file identifier of a share link.
pub fn extract_file_id(url: &str) -> Option<String> {
    SHARE_LINK_PATTERNS.iter().find_map(|p| p.file_id(url))
}

/// Confirmation token from a download interstitial page.
pub fn confirm_token(html: &str) -> Option<String> {
    CONFIRM_TOKEN.captures(html).and_then(|caps| {
        caps.get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str().to_string())
    })
}
