//! Line reader, macro preprocessor and tokenizer for Kconfig files.

use lazy_static::lazy_static;
use log::{info, warn};
use regex::Regex;
use std::collections::HashMap;

use super::RelOp;
use crate::error::KconfigError;

lazy_static! {
    /// `NAME := value`, `NAME = value` or `NAME += value`
    static ref ASSIGNMENT_REGEX: Regex =
        Regex::new(r"^\s*([A-Za-z0-9_-]+)\s*(:=|\+=|=)\s*(.*)$").unwrap();
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    /// Unquoted word: keyword or symbol name.
    Name(String),
    /// Quoted string, escapes already resolved.
    Str(String),
    And,
    Or,
    Not,
    OpenParen,
    CloseParen,
    Rel(RelOp),
}

impl Token {
    pub(crate) fn is_name(&self, name: &str) -> bool {
        matches!(self, Token::Name(n) if n == name)
    }
}

/// Physical lines of one Kconfig file plus a read position.
pub(crate) struct FileCursor {
    pub(crate) filename: String,
    lines: Vec<String>,
    pos: usize,
    pushback: Option<(usize, Vec<Token>)>,
}

impl FileCursor {
    pub(crate) fn new(filename: &str, content: &str) -> Self {
        Self {
            filename: filename.to_string(),
            lines: content.lines().map(str::to_string).collect(),
            pos: 0,
            pushback: None,
        }
    }

    /// Next logical line (backslash continuations joined) and the 1-based
    /// number of its first physical line.
    pub(crate) fn next_line(&mut self) -> Option<(usize, String)> {
        if self.pos >= self.lines.len() {
            return None;
        }
        let linenr = self.pos + 1;
        let mut line = String::new();
        while self.pos < self.lines.len() {
            let physical = &self.lines[self.pos];
            self.pos += 1;
            match physical.strip_suffix('\\') {
                Some(head) => line.push_str(head),
                None => {
                    line.push_str(physical);
                    break;
                }
            }
        }
        Some((linenr, line))
    }

    pub(crate) fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub(crate) fn push_back(&mut self, linenr: usize, tokens: Vec<Token>) {
        self.pushback = Some((linenr, tokens));
    }

    pub(crate) fn take_pushback(&mut self) -> Option<(usize, Vec<Token>)> {
        self.pushback.take()
    }

    /// Reads a help block starting at the line after the `help` keyword.
    ///
    /// The first non-blank line fixes the indentation; the block runs until
    /// a non-blank line with less indentation, which is left unread.
    pub(crate) fn read_help(&mut self) -> String {
        while self.pos < self.lines.len() && self.lines[self.pos].trim().is_empty() {
            self.pos += 1;
        }
        let Some(first) = self.lines.get(self.pos) else {
            return String::new();
        };
        let first = expand_tabs(first);
        let indent = indentation(&first);
        if indent == 0 {
            return String::new();
        }

        let mut text = String::new();
        text.push_str(strip_columns(&first, indent));
        text.push('\n');
        self.pos += 1;

        while self.pos < self.lines.len() {
            let line = &self.lines[self.pos];
            if line.trim().is_empty() {
                text.push('\n');
                self.pos += 1;
                continue;
            }
            let expanded = expand_tabs(line);
            if indentation(&expanded) < indent {
                break;
            }
            text.push_str(strip_columns(&expanded, indent));
            text.push('\n');
            self.pos += 1;
        }

        text.trim_end().to_string()
    }
}

/// Leading whitespace, counted in characters.
fn indentation(line: &str) -> usize {
    line.chars().take_while(|c| c.is_whitespace()).count()
}

/// `line` without its first `columns` characters.
fn strip_columns(line: &str, columns: usize) -> &str {
    match line.char_indices().nth(columns) {
        Some((start, _)) => &line[start..],
        None => "",
    }
}

fn expand_tabs(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut column = 0;
    for c in line.chars() {
        if c == '\t' {
            let spaces = 8 - column % 8;
            out.extend(std::iter::repeat(' ').take(spaces));
            column += spaces;
        } else {
            out.push(c);
            column += 1;
        }
    }
    out
}

#[derive(Debug, Clone)]
struct Variable {
    value: String,
    /// `=` variables are expanded at each use, `:=` ones when assigned.
    recursive: bool,
}

/// Kconfig macro language: variable assignments and `$(...)` references.
#[derive(Debug, Default)]
pub(crate) struct Preprocessor {
    variables: HashMap<String, Variable>,
}

impl Preprocessor {
    /// Handles `line` if it is a variable assignment. Returns `Ok(false)`
    /// for any other line.
    pub(crate) fn try_assignment(
        &mut self,
        line: &str,
        filename: &str,
        linenr: usize,
    ) -> Result<bool, KconfigError> {
        let Some(caps) = ASSIGNMENT_REGEX.captures(line) else {
            return Ok(false);
        };
        let name = caps[1].to_string();
        let op = &caps[2];
        let raw = caps[3].trim_end();

        match op {
            ":=" => {
                let value = self.expand(raw, filename, linenr)?;
                self.variables.insert(name, Variable { value, recursive: false });
            }
            "=" => {
                self.variables.insert(
                    name,
                    Variable {
                        value: raw.to_string(),
                        recursive: true,
                    },
                );
            }
            _ => {
                let existing = self.variables.get(&name).cloned();
                let variable = match existing {
                    Some(var) if var.recursive => Variable {
                        value: format!("{} {}", var.value, raw),
                        recursive: true,
                    },
                    Some(var) => Variable {
                        value: format!("{} {}", var.value, self.expand(raw, filename, linenr)?),
                        recursive: false,
                    },
                    None => Variable {
                        value: self.expand(raw, filename, linenr)?,
                        recursive: false,
                    },
                };
                self.variables.insert(name, variable);
            }
        }
        Ok(true)
    }

    /// Expands every `$(...)` reference in `s`.
    pub(crate) fn expand(&self, s: &str, filename: &str, linenr: usize) -> Result<String, KconfigError> {
        self.expand_depth(s, filename, linenr, 0)
    }

    fn expand_depth(
        &self,
        s: &str,
        filename: &str,
        linenr: usize,
        depth: usize,
    ) -> Result<String, KconfigError> {
        if depth > 100 {
            return Err(KconfigError::syntax(filename, linenr, "preprocessor recursion limit exceeded"));
        }
        if !s.contains("$(") {
            return Ok(s.to_string());
        }

        let mut out = String::new();
        let mut rest = s;
        while let Some(start) = rest.find("$(") {
            out.push_str(&rest[..start]);
            let body_start = start + 2;
            let end = matching_paren(&rest[body_start..]).ok_or_else(|| {
                KconfigError::syntax(filename, linenr, "missing end parenthesis in macro expansion")
            })?;
            let body = &rest[body_start..body_start + end];
            out.push_str(&self.expand_call(body, filename, linenr, depth)?);
            rest = &rest[body_start + end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }

    fn expand_call(
        &self,
        body: &str,
        filename: &str,
        linenr: usize,
        depth: usize,
    ) -> Result<String, KconfigError> {
        let mut args = Vec::new();
        for arg in split_top_level_commas(body) {
            args.push(self.expand_depth(arg, filename, linenr, depth + 1)?);
        }
        let name = args.first().map(|s| s.trim().to_string()).unwrap_or_default();

        match name.as_str() {
            "filename" => return Ok(filename.to_string()),
            "lineno" => return Ok(linenr.to_string()),
            "info" => {
                info!("{}:{}: {}", filename, linenr, args[1..].join(","));
                return Ok(String::new());
            }
            "warning-if" => {
                if args.get(1).map(|a| a.trim()) == Some("y") {
                    warn!("{}:{}: {}", filename, linenr, args[2..].join(","));
                }
                return Ok(String::new());
            }
            "error-if" => {
                if args.get(1).map(|a| a.trim()) == Some("y") {
                    return Err(KconfigError::syntax(filename, linenr, args[2..].join(",")));
                }
                return Ok(String::new());
            }
            _ => {}
        }

        if args.len() == 1 {
            if let Some(var) = self.variables.get(&name) {
                return if var.recursive {
                    self.expand_depth(&var.value, filename, linenr, depth + 1)
                } else {
                    Ok(var.value.clone())
                };
            }
            if let Ok(value) = std::env::var(&name) {
                return Ok(value);
            }
            return Ok(String::new());
        }

        warn!(
            "{}:{}: unknown preprocessor function '{}', expanding to nothing",
            filename, linenr, name
        );
        Ok(String::new())
    }
}

/// Byte offset of the `)` closing an already-opened parenthesis.
fn matching_paren(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' if depth == 0 => return Some(i),
            ')' => depth -= 1,
            _ => {}
        }
    }
    None
}

fn split_top_level_commas(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '/' | '.' | '-')
}

/// Splits one logical line into tokens. `#` starts a comment outside of
/// quoted strings.
pub(crate) fn tokenize(line: &str, filename: &str, linenr: usize) -> Result<Vec<Token>, KconfigError> {
    let chars: Vec<char> = line.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c == '#' {
            break;
        }
        if c == '"' || c == '\'' {
            let quote = c;
            let mut value = String::new();
            i += 1;
            loop {
                match chars.get(i) {
                    None => {
                        return Err(KconfigError::syntax(filename, linenr, "unterminated string"));
                    }
                    Some('\\') => {
                        if let Some(escaped) = chars.get(i + 1) {
                            value.push(*escaped);
                        }
                        i += 2;
                    }
                    Some(ch) if *ch == quote => {
                        i += 1;
                        break;
                    }
                    Some(ch) => {
                        value.push(*ch);
                        i += 1;
                    }
                }
            }
            tokens.push(Token::Str(value));
            continue;
        }
        if is_name_char(c) {
            let start = i;
            while i < chars.len() && is_name_char(chars[i]) {
                i += 1;
            }
            tokens.push(Token::Name(chars[start..i].iter().collect()));
            continue;
        }

        let next = chars.get(i + 1).copied();
        let (token, width) = match (c, next) {
            ('&', Some('&')) => (Token::And, 2),
            ('|', Some('|')) => (Token::Or, 2),
            ('!', Some('=')) => (Token::Rel(RelOp::Unequal), 2),
            ('!', _) => (Token::Not, 1),
            ('(', _) => (Token::OpenParen, 1),
            (')', _) => (Token::CloseParen, 1),
            ('=', _) => (Token::Rel(RelOp::Equal), 1),
            ('<', Some('=')) => (Token::Rel(RelOp::LessEqual), 2),
            ('<', _) => (Token::Rel(RelOp::Less), 1),
            ('>', Some('=')) => (Token::Rel(RelOp::GreaterEqual), 2),
            ('>', _) => (Token::Rel(RelOp::Greater), 1),
            _ => {
                return Err(KconfigError::syntax(
                    filename,
                    linenr,
                    format!("unexpected character '{}'", c),
                ));
            }
        };
        tokens.push(token);
        i += width;
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_config_line() {
        let tokens = tokenize("depends on FOO && !(BAR || BAZ=y) # trailing", "Kconfig", 1).unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Name("depends".into()),
                Token::Name("on".into()),
                Token::Name("FOO".into()),
                Token::And,
                Token::Not,
                Token::OpenParen,
                Token::Name("BAR".into()),
                Token::Or,
                Token::Name("BAZ".into()),
                Token::Rel(RelOp::Equal),
                Token::Name("y".into()),
                Token::CloseParen,
            ]
        );
    }

    #[test]
    fn test_tokenize_strings_keep_hashes_and_escapes() {
        let tokens = tokenize(r##"prompt "Use \"#\" here" if A"##, "Kconfig", 3).unwrap();
        assert_eq!(tokens[1], Token::Str("Use \"#\" here".into()));
        assert!(tokens[2].is_name("if"));
    }

    #[test]
    fn test_tokenize_rejects_stray_characters() {
        let err = tokenize("config FOO @", "Kconfig", 7).unwrap_err();
        assert!(err.to_string().contains("Kconfig:7"));
    }

    #[test]
    fn test_continuation_lines_are_joined() {
        let mut cursor = FileCursor::new("Kconfig", "depends on A && \\\n   B\nconfig C\n");
        assert_eq!(cursor.next_line(), Some((1, "depends on A &&    B".to_string())));
        assert_eq!(cursor.next_line(), Some((3, "config C".to_string())));
        assert_eq!(cursor.next_line(), None);
    }

    #[test]
    fn test_read_help_dedents_and_stops_at_outdent() {
        let content = "\n\t  First line\n\t    indented\n\n\t  last\nconfig NEXT\n";
        let mut cursor = FileCursor::new("Kconfig", content);
        let help = cursor.read_help();
        assert_eq!(help, "First line\n  indented\n\nlast");
        assert_eq!(cursor.next_line(), Some((6, "config NEXT".to_string())));
    }

    #[test]
    fn test_read_help_with_multibyte_indentation() {
        let mut cursor = FileCursor::new("Kconfig", "\t  first\n\t \u{00A0}second\nconfig NEXT\n");
        assert_eq!(cursor.read_help(), "first\nsecond");
        assert_eq!(cursor.next_line(), Some((3, "config NEXT".to_string())));

        let mut cursor = FileCursor::new("Kconfig", "\t\u{00A0}\u{00A0}wide\n\t  \u{00A0}more\n");
        assert_eq!(cursor.read_help(), "wide\n\u{00A0}more");
    }

    #[test]
    fn test_preprocessor_variables() {
        let mut pp = Preprocessor::default();
        assert!(pp.try_assignment("ARCH := arm", "Kconfig", 1).unwrap());
        assert!(pp.try_assignment("DIR = arch/$(ARCH)", "Kconfig", 2).unwrap());
        assert!(pp.try_assignment("ARCH := riscv", "Kconfig", 3).unwrap());
        assert!(!pp.try_assignment("config FOO", "Kconfig", 4).unwrap());

        assert_eq!(pp.expand("source \"$(DIR)/Kconfig\"", "Kconfig", 5).unwrap(), "source \"arch/riscv/Kconfig\"");
        assert_eq!(pp.expand("$(filename):$(lineno)", "Kconfig", 9).unwrap(), "Kconfig:9");
        assert_eq!(pp.expand("$(dt_has_compat,foo)", "Kconfig", 9).unwrap(), "");
    }

    #[test]
    fn test_preprocessor_error_if() {
        let pp = Preprocessor::default();
        assert!(pp.expand("$(error-if,y,boom)", "Kconfig", 2).is_err());
        assert!(pp.expand("$(error-if,n,boom)", "Kconfig", 2).is_ok());
    }
}
