//! Line-based reStructuredText reader.
//!
//! Covers the block constructs documentation pages around the options
//! search use: section titles, paragraphs, bullet lists, literal blocks,
//! comments/targets and directives. Directives are kept as
//! [`Node::Directive`] and run later by the builder.

use std::collections::HashMap;

use lazy_static::lazy_static;
use log::debug;
use regex::Regex;

use crate::directives::{ParsedDirective, SourceLocation};
use crate::nodes::{Doctree, Node};
use crate::roles::parse_inline;

lazy_static! {
    /// `.. name:: arguments`, names may carry a domain prefix
    static ref DIRECTIVE_REGEX: Regex =
        Regex::new(r"^\.\.\s+([a-zA-Z][a-zA-Z0-9_-]*(?::[a-zA-Z][a-zA-Z0-9_-]*)?)::\s*(.*?)\s*$").unwrap();

    /// `:name: value` inside a directive block
    static ref OPTION_REGEX: Regex = Regex::new(r"^\s+:([a-zA-Z][a-zA-Z0-9_-]*):\s?(.*?)\s*$").unwrap();
}

const ADORNMENT_CHARS: &str = "=-~^\"'*+#<>`:._";

#[derive(Default)]
pub struct Parser;

impl Parser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, docname: &str, source_file: &str, content: &str) -> Doctree {
        let mut doctree = Doctree::new(docname);
        let lines: Vec<&str> = content.lines().collect();
        let mut title_styles: Vec<char> = Vec::new();

        let mut i = 0;
        while i < lines.len() {
            let line = lines[i];
            let trimmed = line.trim();

            if trimmed.is_empty() {
                i += 1;
                continue;
            }

            if let Some(captures) = DIRECTIVE_REGEX.captures(line) {
                let location = SourceLocation {
                    file: source_file.to_string(),
                    line: i + 1,
                    column: 1,
                };
                let mut directive = ParsedDirective::new(&captures[1], location);
                if !captures[2].is_empty() {
                    directive.arguments = captures[2].split_whitespace().map(str::to_string).collect();
                }
                let (options, body, consumed) = self.parse_directive_body(&lines[i + 1..]);
                directive.options = options;
                directive.content = body;

                debug!("{}:{}: directive '{}'", source_file, i + 1, directive.name);
                doctree.children.push(Node::Directive(directive));
                i += consumed + 1;
                continue;
            }

            // Comments and hyperlink targets
            if trimmed == ".." || trimmed.starts_with(".. ") {
                i += 1 + self.indented_block_len(&lines[i + 1..]);
                continue;
            }

            // Overlined title
            if is_adornment(trimmed) && i + 2 < lines.len() && is_adornment(lines[i + 2].trim()) {
                let text = lines[i + 1].trim();
                if !text.is_empty() {
                    let style = trimmed.chars().next().unwrap_or('=');
                    doctree.children.push(self.title(text, style, &mut title_styles));
                    i += 3;
                    continue;
                }
            }

            // Underlined title
            if i + 1 < lines.len() && !line.starts_with(char::is_whitespace) {
                let underline = lines[i + 1].trim();
                if is_adornment(underline) && underline.chars().count() >= trimmed.chars().count() {
                    let style = underline.chars().next().unwrap_or('=');
                    doctree.children.push(self.title(trimmed, style, &mut title_styles));
                    i += 2;
                    continue;
                }
            }

            if is_bullet(trimmed) {
                let (items, consumed) = self.parse_bullet_list(&lines[i..]);
                doctree.children.push(Node::BulletList(items));
                i += consumed;
                continue;
            }

            // Indented text outside a literal block is read as a paragraph
            let (text, consumed) = self.parse_paragraph(&lines[i..]);
            i += consumed;

            if let Some(before) = text.strip_suffix("::") {
                let before = before.trim_end();
                if !before.is_empty() {
                    doctree.children.push(Node::Paragraph(parse_inline(&format!("{}:", before))));
                }
                let (code, consumed) = self.parse_literal_block(&lines[i..]);
                if !code.is_empty() {
                    doctree.children.push(Node::LiteralBlock(code));
                }
                i += consumed;
            } else {
                doctree.children.push(Node::Paragraph(parse_inline(&text)));
            }
        }

        debug!("Parsed document: {} ({} nodes)", docname, doctree.children.len());
        doctree
    }

    fn title(&self, text: &str, style: char, styles: &mut Vec<char>) -> Node {
        let level = match styles.iter().position(|s| *s == style) {
            Some(pos) => pos + 1,
            None => {
                styles.push(style);
                styles.len()
            }
        };
        Node::Title {
            text: parse_inline(text),
            level,
            id: slugify(text),
        }
    }

    /// Reads the options and content following a directive line.
    /// Returns `(options, content, consumed lines)`.
    fn parse_directive_body(&self, lines: &[&str]) -> (HashMap<String, String>, String, usize) {
        let mut options = HashMap::new();
        let mut i = 0;

        while i < lines.len() {
            match OPTION_REGEX.captures(lines[i]) {
                Some(captures) => {
                    options.insert(captures[1].to_string(), captures[2].to_string());
                    i += 1;
                }
                None => break,
            }
        }

        let consumed = self.indented_block_len(&lines[i..]);
        let block = &lines[i..i + consumed];
        let indent = block
            .iter()
            .filter(|line| !line.trim().is_empty())
            .map(|line| line.len() - line.trim_start().len())
            .min()
            .unwrap_or(0);
        let content = block
            .iter()
            .map(|line| line.get(indent..).unwrap_or("").trim_end())
            .collect::<Vec<_>>()
            .join("\n")
            .trim_matches('\n')
            .to_string();

        (options, content, i + consumed)
    }

    /// Number of lines of the indented (or blank) block at the start of
    /// `lines`, trailing blank lines excluded.
    fn indented_block_len(&self, lines: &[&str]) -> usize {
        let mut len = 0;
        let mut last_text = 0;
        for line in lines {
            if line.trim().is_empty() {
                len += 1;
            } else if line.starts_with(char::is_whitespace) {
                len += 1;
                last_text = len;
            } else {
                break;
            }
        }
        last_text
    }

    fn parse_literal_block(&self, lines: &[&str]) -> (String, usize) {
        let consumed = self.indented_block_len(lines);
        let block = &lines[..consumed];
        let indent = block
            .iter()
            .filter(|line| !line.trim().is_empty())
            .map(|line| line.len() - line.trim_start().len())
            .min()
            .unwrap_or(0);
        let code = block
            .iter()
            .map(|line| line.get(indent..).unwrap_or("").trim_end())
            .collect::<Vec<_>>()
            .join("\n")
            .trim_matches('\n')
            .to_string();
        (code, consumed)
    }

    fn parse_paragraph(&self, lines: &[&str]) -> (String, usize) {
        let mut content = String::new();
        let mut consumed_lines = 0;

        for line in lines {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                break;
            }

            content.push_str(trimmed);
            content.push(' ');
            consumed_lines += 1;
        }

        (content.trim().to_string(), consumed_lines)
    }

    fn parse_bullet_list(&self, lines: &[&str]) -> (Vec<Vec<crate::nodes::Inline>>, usize) {
        let mut items = Vec::new();
        let mut current: Option<String> = None;
        let mut i = 0;

        while i < lines.len() {
            let line = lines[i];
            let trimmed = line.trim();

            if is_bullet(trimmed) && !line.starts_with(char::is_whitespace) {
                if let Some(text) = current.take() {
                    items.push(parse_inline(&text));
                }
                current = Some(trimmed[2..].trim().to_string());
            } else if !trimmed.is_empty() && line.starts_with(char::is_whitespace) {
                if let Some(text) = current.as_mut() {
                    text.push(' ');
                    text.push_str(trimmed);
                }
            } else if trimmed.is_empty() {
                // a blank line only continues the list if another item follows
                match lines.get(i + 1) {
                    Some(next) if is_bullet(next.trim()) && !next.starts_with(char::is_whitespace) => {}
                    _ => break,
                }
            } else {
                break;
            }
            i += 1;
        }

        if let Some(text) = current {
            items.push(parse_inline(&text));
        }
        (items, i)
    }
}

fn is_adornment(line: &str) -> bool {
    let mut chars = line.chars();
    match chars.next() {
        Some(first) if ADORNMENT_CHARS.contains(first) => line.chars().count() >= 2 && chars.all(|c| c == first),
        _ => false,
    }
}

fn is_bullet(line: &str) -> bool {
    line.starts_with("- ") || line.starts_with("* ") || line.starts_with("+ ")
}

/// Convert text to a URL-safe slug for anchor IDs.
pub fn slugify(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c
            } else if c.is_whitespace() || c == '-' || c == '_' || c == '.' {
                '-'
            } else {
                '\0'
            }
        })
        .filter(|c| *c != '\0')
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::Inline;

    fn parse(content: &str) -> Doctree {
        Parser::new().parse("index", "index.rst", content)
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("Kconfig Reference"), "kconfig-reference");
        assert_eq!(slugify("foo_bar-baz"), "foo-bar-baz");
    }

    #[test]
    fn test_titles_get_levels_in_order_of_appearance() {
        let doctree = parse("Options\n=======\n\nGeneral\n-------\n\nMore\n----\n");
        let levels: Vec<_> = doctree
            .children
            .iter()
            .filter_map(|node| match node {
                Node::Title { level, id, .. } => Some((*level, id.as_str())),
                _ => None,
            })
            .collect();
        assert_eq!(levels, vec![(1, "options"), (2, "general"), (2, "more")]);
        assert_eq!(doctree.title().as_deref(), Some("Options"));
    }

    #[test]
    fn test_search_directive_is_collected() {
        let doctree = parse("Kconfig\n#######\n\n.. kconfig:search::\n\nAfter.\n");
        match &doctree.children[1] {
            Node::Directive(directive) => {
                assert_eq!(directive.name, "kconfig:search");
                assert!(directive.arguments.is_empty());
                assert!(directive.options.is_empty());
                assert!(directive.content.is_empty());
                assert_eq!(directive.location.line, 4);
            }
            other => panic!("expected directive, got {:?}", other),
        }
        assert_eq!(doctree.children[2], Node::Paragraph(vec![Inline::Text("After.".into())]));
    }

    #[test]
    fn test_directive_options_and_content() {
        let doctree = parse(".. kconfig:search:: extra\n   :filter: net\n\n   Some body\n   text\n\nNext\n");
        let Node::Directive(directive) = &doctree.children[0] else {
            panic!("expected directive");
        };
        assert_eq!(directive.arguments, vec!["extra".to_string()]);
        assert_eq!(directive.options.get("filter").map(String::as_str), Some("net"));
        assert_eq!(directive.content, "Some body\ntext");
        assert!(matches!(doctree.children[1], Node::Paragraph(_)));
    }

    #[test]
    fn test_literal_block_and_comment() {
        let doctree = parse(".. a comment\n   spanning lines\n\nExample::\n\n    CONFIG_FOO=y\n    CONFIG_BAR=n\n\nDone.\n");
        assert_eq!(doctree.children[0], Node::Paragraph(vec![Inline::Text("Example:".into())]));
        assert_eq!(doctree.children[1], Node::LiteralBlock("CONFIG_FOO=y\nCONFIG_BAR=n".into()));
        assert_eq!(doctree.children.len(), 3);
    }

    #[test]
    fn test_bullet_list() {
        let doctree = parse("- first\n  continued\n- second\n\nText\n");
        match &doctree.children[0] {
            Node::BulletList(items) => {
                assert_eq!(items.len(), 2);
                assert_eq!(items[0], vec![Inline::Text("first continued".into())]);
            }
            other => panic!("expected list, got {:?}", other),
        }
    }
}
