use crate::error::StoreError;
use regex::Regex;

/// A compiled glob over store keys.
///
/// `*` matches any run of characters, `?` exactly one character and `\`
/// makes the next character literal. The literal text before the first
/// wildcard is exposed so ordered stores can narrow the scan to it.
#[derive(Debug, Clone)]
pub struct KeyPattern {
    prefix: String,
    matcher: Matcher,
}

#[derive(Debug, Clone)]
enum Matcher {
    Exact,
    Prefix,
    Glob(Regex),
}

impl KeyPattern {
    pub fn parse(pattern: &str) -> Result<Self, StoreError> {
        let invalid = |reason: &str| StoreError::InvalidPattern { pattern: pattern.to_string(), reason: reason.to_string() };

        let mut prefix = String::new();
        let mut re = String::from("(?s)^");
        let mut wildcards = 0usize;
        let mut trailing_star = false;
        let mut chars = pattern.chars();
        while let Some(c) = chars.next() {
            trailing_star = false;
            match c {
                '*' => {
                    wildcards += 1;
                    trailing_star = true;
                    re.push_str(".*");
                }
                '?' => {
                    wildcards += 1;
                    re.push('.');
                }
                '\\' => {
                    let lit = chars.next().ok_or_else(|| invalid("dangling escape"))?;
                    if wildcards == 0 { prefix.push(lit); }
                    re.push_str(&regex::escape(&lit.to_string()));
                }
                _ => {
                    if wildcards == 0 { prefix.push(c); }
                    re.push_str(&regex::escape(&c.to_string()));
                }
            }
        }
        re.push('$');

        let matcher = match wildcards {
            0 => Matcher::Exact,
            1 if trailing_star => Matcher::Prefix,
            _ => Matcher::Glob(Regex::new(&re).map_err(|e| invalid(&e.to_string()))?),
        };
        Ok(Self { prefix, matcher })
    }

    /// Every matching key starts with this.
    pub fn prefix(&self) -> &str { &self.prefix }

    pub fn matches(&self, key: &str) -> bool {
        match &self.matcher {
            Matcher::Exact => key == self.prefix,
            Matcher::Prefix => key.starts_with(&self.prefix),
            Matcher::Glob(re) => re.is_match(key),
        }
    }
}
