//! Wildcard patterns for message content that is never captured.

use regex::RegexSet;

use crate::base::types::Res;

/// A set of whole-content wildcard patterns.
///
/// `*` matches any run of characters (including none) and `?` matches exactly one.
#[derive(Debug, Clone)]
pub struct IgnoredWords {
    patterns: RegexSet,
}

impl IgnoredWords {
    pub fn new<I, S>(patterns: I) -> Res<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = RegexSet::new(patterns.into_iter().map(|p| wildcard_to_regex(p.as_ref())))?;

        Ok(Self { patterns })
    }

    pub fn is_ignored(&self, content: &str) -> bool {
        self.patterns.is_match(content)
    }
}

fn wildcard_to_regex(pattern: &str) -> String {
    let mut regex = String::from("(?s)^");

    for c in pattern.chars() {
        match c {
            '*' => regex.push_str(".*"),
            '?' => regex.push('.'),
            c => regex.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }

    regex.push('$');
    regex
}
