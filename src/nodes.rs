//! Document tree produced by the reader and consumed by the writers.

use crate::directives::ParsedDirective;

/// A cross-reference waiting for domain resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingXref {
    pub refdomain: String,
    pub reftype: String,
    pub reftarget: String,
    /// Text shown for the reference
    pub title: String,
    /// Whether the title was written explicitly (`title <target>`)
    pub explicit: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Text(String),
    Emphasis(String),
    Strong(String),
    Literal(String),
    PendingXref(PendingXref),
    /// A resolved link
    Reference {
        refuri: String,
        reftitle: String,
        text: String,
        /// `true` when the link points into a different project
        external: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Title {
        text: Vec<Inline>,
        level: usize,
        id: String,
    },
    Paragraph(Vec<Inline>),
    LiteralBlock(String),
    BulletList(Vec<Vec<Inline>>),
    /// A directive not yet run
    Directive(ParsedDirective),
    /// Placeholder the client-side options search mounts on
    KconfigSearch,
}

/// Return value of [`NodeVisitor::visit`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitAction {
    Continue,
    Stop,
}

pub trait NodeVisitor {
    fn visit(&mut self, node: &Node) -> VisitAction;
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Doctree {
    pub docname: String,
    pub children: Vec<Node>,
}

impl Doctree {
    pub fn new(docname: impl Into<String>) -> Self {
        Self {
            docname: docname.into(),
            children: Vec::new(),
        }
    }

    /// Visits the nodes in document order until the visitor stops.
    pub fn walk<V: NodeVisitor>(&self, visitor: &mut V) {
        for node in &self.children {
            if visitor.visit(node) == VisitAction::Stop {
                break;
            }
        }
    }

    /// Text of the first title, if any
    pub fn title(&self) -> Option<String> {
        self.children.iter().find_map(|node| match node {
            Node::Title { text, .. } => Some(text.iter().map(inline_text).collect()),
            _ => None,
        })
    }

    pub fn contains_kconfig_search(&self) -> bool {
        let mut visitor = FindKconfigSearch::default();
        self.walk(&mut visitor);
        visitor.found
    }

    /// Calls `f` on every inline element, mutably.
    pub fn for_each_inline_mut<F: FnMut(&mut Inline)>(&mut self, mut f: F) {
        for node in &mut self.children {
            match node {
                Node::Title { text, .. } | Node::Paragraph(text) => text.iter_mut().for_each(&mut f),
                Node::BulletList(items) => items.iter_mut().flatten().for_each(&mut f),
                Node::LiteralBlock(_) | Node::Directive(_) | Node::KconfigSearch => {}
            }
        }
    }
}

/// Plain text of an inline element
pub fn inline_text(inline: &Inline) -> &str {
    match inline {
        Inline::Text(text) | Inline::Emphasis(text) | Inline::Strong(text) | Inline::Literal(text) => text,
        Inline::PendingXref(xref) => &xref.title,
        Inline::Reference { text, .. } => text,
    }
}

/// Finds the search marker node
#[derive(Debug, Default)]
pub struct FindKconfigSearch {
    pub found: bool,
}

impl NodeVisitor for FindKconfigSearch {
    fn visit(&mut self, node: &Node) -> VisitAction {
        if matches!(node, Node::KconfigSearch) {
            self.found = true;
            VisitAction::Stop
        } else {
            VisitAction::Continue
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_marker() {
        let mut doctree = Doctree::new("index");
        doctree.children.push(Node::Paragraph(vec![Inline::Text("Hello".into())]));
        assert!(!doctree.contains_kconfig_search());

        doctree.children.push(Node::KconfigSearch);
        assert!(doctree.contains_kconfig_search());
    }

    #[test]
    fn test_title_and_inline_walk() {
        let mut doctree = Doctree::new("index");
        doctree.children.push(Node::Title {
            text: vec![Inline::Text("Options ".into()), Inline::Literal("A".into())],
            level: 1,
            id: "options-a".into(),
        });
        doctree.children.push(Node::BulletList(vec![vec![Inline::Text("x".into())]]));

        assert_eq!(doctree.title().as_deref(), Some("Options A"));

        let mut count = 0;
        doctree.for_each_inline_mut(|_| count += 1);
        assert_eq!(count, 3);
    }
}
