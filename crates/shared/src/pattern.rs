//! Schema and table name patterns.
//!
//! A filter expression is either a literal name or a SQL `LIKE`-style pattern
//! containing `%` or `_`. Patterns are compiled to an anchored regex where `%`
//! becomes `.*` and `_` becomes a single-character wildcard. Other characters
//! are passed through, so a pattern may also carry regex classes such as
//! `[0-9]`. A name with underscores still matches itself.
//!
//! Only `%` makes an expression a wildcard in the sense of
//! [`NamePattern::is_wildcard`]: such an expression stands for many names and
//! cannot be renamed or used to scope table filters.

use regex::Regex;
use std::fmt;
use thiserror::Error;

/// Error type for pattern compilation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("Invalid filter '{pattern}': {reason}")]
    Invalid { pattern: String, reason: String },
}

#[derive(Debug, Clone)]
enum Matcher {
    Exact,
    Like(Regex),
}

/// A single compiled filter expression.
#[derive(Debug, Clone)]
pub struct NamePattern {
    raw: String,
    matcher: Matcher,
}

impl NamePattern {
    /// Compile a filter expression.
    pub fn parse(expression: &str) -> Result<Self, PatternError> {
        let raw = expression.trim().to_string();
        if !raw.contains(['%', '_']) {
            return Ok(Self {
                raw,
                matcher: Matcher::Exact,
            });
        }

        let translated = raw.replace('%', ".*").replace('_', ".");
        let regex = Regex::new(&format!("^(?:{})$", translated)).map_err(|e| {
            PatternError::Invalid {
                pattern: raw.clone(),
                reason: e.to_string(),
            }
        })?;

        Ok(Self {
            raw,
            matcher: Matcher::Like(regex),
        })
    }

    /// Returns true when the expression contains `%`.
    pub fn is_wildcard(&self) -> bool {
        matches!(self.matcher, Matcher::Like(_)) && self.raw.contains('%')
    }

    pub fn matches(&self, name: &str) -> bool {
        match &self.matcher {
            Matcher::Exact => self.raw == name,
            Matcher::Like(regex) => regex.is_match(name),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for NamePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// An ordered set of filter expressions. An empty set matches nothing on its
/// own; callers decide whether "empty" means "everything" (include filters) or
/// "nothing" (exclude filters).
#[derive(Debug, Clone, Default)]
pub struct NamePatternSet {
    patterns: Vec<NamePattern>,
}

impl NamePatternSet {
    /// Compile every expression, stopping at the first invalid one.
    pub fn parse_all<I, S>(expressions: I) -> Result<Self, PatternError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = expressions
            .into_iter()
            .filter(|e| !e.as_ref().trim().is_empty())
            .map(|e| NamePattern::parse(e.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Build a set of literal names. Names are never compiled, so this cannot fail.
    pub fn literals<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns = names
            .into_iter()
            .map(|n| NamePattern {
                raw: n.into(),
                matcher: Matcher::Exact,
            })
            .collect();
        Self { patterns }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn has_wildcard(&self) -> bool {
        self.patterns.iter().any(NamePattern::is_wildcard)
    }

    pub fn matches_any(&self, name: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &NamePattern> {
        self.patterns.iter()
    }
}
