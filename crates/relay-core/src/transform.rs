//! Chat message transformation
//!
//! Turns raw game chat into relay-ready text in two passes:
//! 1. Formatting codes (the marker character plus the one styling character
//!    after it) are stripped wherever they occur.
//! 2. A literal substitution map is applied in a single left-to-right scan.
//!    At each position the first token that matches wins and the
//!    replacement is never rescanned.

/// Formatting marker used by the game's chat (`§c` = red, `§l` = bold, ...)
pub const DEFAULT_MARKER: char = '§';

/// Pure, deterministic chat text transformer
#[derive(Debug, Clone)]
pub struct MessageTransformer {
    marker: char,
    substitutions: Vec<(String, String)>,
}

impl Default for MessageTransformer {
    fn default() -> Self {
        Self::new(DEFAULT_MARKER)
    }
}

impl MessageTransformer {
    /// Create a transformer with no substitutions
    pub fn new(marker: char) -> Self {
        Self {
            marker,
            substitutions: Vec::new(),
        }
    }

    /// Add literal substitutions, tried in the order given
    ///
    /// Empty tokens are ignored.
    pub fn with_substitutions<I, K, V>(mut self, substitutions: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.substitutions.extend(
            substitutions
                .into_iter()
                .map(|(token, replacement)| (token.into(), replacement.into()))
                .filter(|(token, _)| !token.is_empty()),
        );
        self
    }

    /// Map raw chat text to relay text
    pub fn relay(&self, raw: &str) -> String {
        let stripped = self.strip_formatting(raw);
        self.substitute(&stripped)
    }

    /// Remove every marker and the character following it
    ///
    /// A marker at the very end of the text has no styling character and is
    /// dropped on its own.
    pub fn strip_formatting(&self, raw: &str) -> String {
        let mut out = String::with_capacity(raw.len());
        let mut chars = raw.chars();
        while let Some(c) = chars.next() {
            if c == self.marker {
                chars.next();
            } else {
                out.push(c);
            }
        }
        out
    }

    fn substitute(&self, text: &str) -> String {
        if self.substitutions.is_empty() {
            return text.to_string();
        }

        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        'scan: while !rest.is_empty() {
            for (token, replacement) in &self.substitutions {
                if let Some(tail) = rest.strip_prefix(token.as_str()) {
                    out.push_str(replacement);
                    rest = tail;
                    continue 'scan;
                }
            }
            // Advance one whole char so multi-byte text stays intact
            let mut chars = rest.chars();
            if let Some(c) = chars.next() {
                out.push(c);
            }
            rest = chars.as_str();
        }
        out
    }
}
