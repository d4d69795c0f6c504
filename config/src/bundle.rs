//! Bootstrap schema text
//!
//! The schema is read once at initialization and handed to the connection
//! layer as an immutable value. There is no reload path.

use std::path::Path;
use std::sync::Arc;

use crate::ConfigError;

/// Ordered, immutable list of SQL statements applied when a connection opens
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaBundle {
    statements: Arc<[String]>,
}

impl SchemaBundle {
    /// Split schema text into statements on `;`
    ///
    /// Semicolons inside quotes, dollar-quoted bodies and comments do not
    /// split. Neither do those inside the `BEGIN ... END` body of a
    /// `CREATE TRIGGER`, `PROCEDURE` or `FUNCTION`. `--` comments are dropped.
    pub fn parse(text: &str) -> Self {
        let chars: Vec<char> = text.chars().collect();
        let mut splitter = Splitter::default();
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            let next = chars.get(i + 1).copied();
            let end = match c {
                '-' if next == Some('-') => {
                    let end = find(&chars, i, &['\n']).unwrap_or(chars.len());
                    i = end;
                    continue;
                }
                '/' if next == Some('*') => {
                    find(&chars, i + 2, &['*', '/']).map_or(chars.len(), |at| at + 2)
                }
                '\'' | '"' | '`' => closing_quote(&chars, i),
                '$' => match dollar_tag(&chars, i) {
                    Some(tag) => find(&chars, i + tag.len(), &tag)
                        .map_or(chars.len(), |at| at + tag.len()),
                    None => i + 1,
                },
                ';' => {
                    splitter.semicolon();
                    i += 1;
                    continue;
                }
                c if is_word_char(c) => {
                    let end = (i..chars.len())
                        .find(|&at| !is_word_char(chars[at]))
                        .unwrap_or(chars.len());
                    let word: String = chars[i..end].iter().collect();
                    splitter.word(&word);
                    i = end;
                    continue;
                }
                _ => i + 1,
            };
            splitter.current.extend(&chars[i..end]);
            i = end;
        }

        Self {
            statements: splitter.finish().into(),
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::parse(&text))
    }

    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }
}

/// Statement accumulator for [`SchemaBundle::parse`]
#[derive(Debug, Default)]
struct Splitter {
    statements: Vec<String>,
    current: String,
    words: usize,
    creating: bool,
    routine: bool,
    depth: usize,
    pending_end: bool,
}

impl Splitter {
    fn word(&mut self, word: &str) {
        self.current.push_str(word);
        self.words += 1;
        let upper = word.to_ascii_uppercase();

        if self.words == 1 {
            self.creating = upper == "CREATE";
        }
        if self.creating
            && self.depth == 0
            && matches!(upper.as_str(), "TRIGGER" | "PROCEDURE" | "FUNCTION")
        {
            self.routine = true;
        }
        if !self.routine {
            return;
        }

        // `END IF`, `END LOOP` and friends close blocks that never opened one
        if self.pending_end {
            self.pending_end = false;
            if !matches!(upper.as_str(), "IF" | "LOOP" | "WHILE" | "REPEAT") {
                self.depth = self.depth.saturating_sub(1);
            }
            if matches!(upper.as_str(), "IF" | "LOOP" | "WHILE" | "REPEAT" | "CASE") {
                return;
            }
        }

        match upper.as_str() {
            "BEGIN" => self.depth += 1,
            "CASE" if self.depth > 0 => self.depth += 1,
            "END" if self.depth > 0 => self.pending_end = true,
            _ => {}
        }
    }

    fn semicolon(&mut self) {
        self.close_pending();
        if self.depth > 0 {
            self.current.push(';');
        } else {
            self.flush();
        }
    }

    fn close_pending(&mut self) {
        if self.pending_end {
            self.pending_end = false;
            self.depth = self.depth.saturating_sub(1);
        }
    }

    fn flush(&mut self) {
        let statement = self.current.trim();
        if !statement.is_empty() {
            self.statements.push(statement.to_string());
        }
        self.current.clear();
        self.words = 0;
        self.creating = false;
        self.routine = false;
        self.depth = 0;
    }

    fn finish(mut self) -> Vec<String> {
        self.close_pending();
        self.flush();
        self.statements
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Index of the first occurrence of `needle` at or after `from`
fn find(chars: &[char], from: usize, needle: &[char]) -> Option<usize> {
    if needle.is_empty() || from >= chars.len() {
        return None;
    }
    chars[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|at| from + at)
}

/// One past the quote closing the one at `open`; a doubled quote is an escape
fn closing_quote(chars: &[char], open: usize) -> usize {
    let quote = chars[open];
    let mut at = open + 1;
    while at < chars.len() {
        if chars[at] == quote {
            if chars.get(at + 1) == Some(&quote) {
                at += 2;
                continue;
            }
            return at + 1;
        }
        at += 1;
    }
    chars.len()
}

/// `$$` or `$tag$` opening a PostgreSQL dollar-quoted body at `at`
///
/// `$1` style placeholders and `$` inside identifiers are not tags.
fn dollar_tag(chars: &[char], at: usize) -> Option<Vec<char>> {
    if at > 0 && is_word_char(chars[at - 1]) {
        return None;
    }
    if chars.get(at + 1).is_some_and(|c| c.is_ascii_digit()) {
        return None;
    }
    let close = (at + 1..chars.len()).find(|&i| !is_word_char(chars[i]))?;
    (chars[close] == '$').then(|| chars[at..=close].to_vec())
}
