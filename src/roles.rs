//! Inline markup and cross-reference roles.
//!
//! `:kconfig:option:` creates a pending cross-reference that is resolved
//! once every document has been read and the domain data merged.

use std::path::Path;

use lazy_static::lazy_static;
use log::{debug, warn};
use regex::Regex;

use crate::domains::{Domain, KconfigDomain};
use crate::inventory::Inventory;
use crate::nodes::{Doctree, Inline, PendingXref};

lazy_static! {
    /// Interpreted text with a role, literals, strong and emphasis, in
    /// priority order
    static ref INLINE_REGEX: Regex = Regex::new(
        r"(?x)
        :(?P<role>[a-zA-Z][a-zA-Z0-9_-]*(?::[a-zA-Z][a-zA-Z0-9_-]*)?):`(?P<content>[^`]+)`
        | ``(?P<literal>[^`]+)``
        | `(?P<default>[^`]+)`
        | \*\*(?P<strong>[^*]+)\*\*
        | \*(?P<emphasis>[^*]+)\*
        "
    ).unwrap();

    /// `title <target>`
    static ref EXPLICIT_TITLE_REGEX: Regex = Regex::new(r"(?s)^(.+?)\s*<([^<]*?)>$").unwrap();
}

/// A role occurrence split into its parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRole {
    /// Role name, domain prefix included (e.g. "kconfig:option")
    pub name: String,
    pub target: String,
    /// Display text (if different from target)
    pub display_text: Option<String>,
}

impl ParsedRole {
    pub fn parse(name: &str, content: &str) -> Self {
        match EXPLICIT_TITLE_REGEX.captures(content) {
            Some(caps) => Self {
                name: name.to_string(),
                target: caps[2].trim().to_string(),
                display_text: Some(caps[1].to_string()),
            },
            None => Self {
                name: name.to_string(),
                target: content.trim().to_string(),
                display_text: None,
            },
        }
    }
}

/// Cross-reference role bound to a domain object type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XRefRole {
    pub domain: &'static str,
    pub role: &'static str,
}

impl XRefRole {
    pub const KCONFIG_OPTION: XRefRole = XRefRole {
        domain: KconfigDomain::NAME,
        role: "option",
    };

    pub fn lookup(name: &str) -> Option<Self> {
        let role = Self::KCONFIG_OPTION;
        (name == format!("{}:{}", role.domain, role.role)).then_some(role)
    }

    /// Builds the node for one occurrence. A leading `!` suppresses the link.
    pub fn run(&self, parsed: &ParsedRole) -> Inline {
        if let Some(target) = parsed.target.strip_prefix('!') {
            let text = parsed.display_text.clone().unwrap_or_else(|| target.to_string());
            return Inline::Literal(text);
        }

        Inline::PendingXref(PendingXref {
            refdomain: self.domain.to_string(),
            reftype: self.role.to_string(),
            reftarget: parsed.target.clone(),
            title: parsed.display_text.clone().unwrap_or_else(|| parsed.target.clone()),
            explicit: parsed.display_text.is_some(),
        })
    }
}

/// Splits a paragraph's text into inline elements.
pub fn parse_inline(text: &str) -> Vec<Inline> {
    let mut inlines = Vec::new();
    let mut last = 0;

    for caps in INLINE_REGEX.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        if whole.start() > last {
            inlines.push(Inline::Text(text[last..whole.start()].to_string()));
        }
        last = whole.end();

        if let (Some(role), Some(content)) = (caps.name("role"), caps.name("content")) {
            let parsed = ParsedRole::parse(role.as_str(), content.as_str());
            match XRefRole::lookup(&parsed.name) {
                Some(xref) => inlines.push(xref.run(&parsed)),
                None => {
                    warn!("Unknown interpreted text role \"{}\"", parsed.name);
                    inlines.push(Inline::Literal(content.as_str().to_string()));
                }
            }
        } else if let Some(literal) = caps.name("literal") {
            inlines.push(Inline::Literal(literal.as_str().to_string()));
        } else if let Some(default) = caps.name("default") {
            inlines.push(Inline::Emphasis(default.as_str().to_string()));
        } else if let Some(strong) = caps.name("strong") {
            inlines.push(Inline::Strong(strong.as_str().to_string()));
        } else if let Some(emphasis) = caps.name("emphasis") {
            inlines.push(Inline::Emphasis(emphasis.as_str().to_string()));
        }
    }

    if last < text.len() {
        inlines.push(Inline::Text(text[last..].to_string()));
    }
    inlines
}

/// URI of `todoc` relative to the page of `fromdoc`
pub fn relative_uri(fromdoc: &str, todoc: &str, suffix: &str) -> String {
    let target = format!("{}{}", todoc, suffix);
    let base = Path::new(fromdoc).parent().unwrap_or_else(|| Path::new(""));
    pathdiff::diff_paths(&target, base)
        .map(|path| path.to_string_lossy().replace('\\', "/"))
        .unwrap_or(target)
}

/// Outcome counts of a resolution pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveCounts {
    pub resolved: usize,
    pub external: usize,
    pub unresolved: usize,
}

/// Resolves pending references against the domain, then against the
/// inventories of other projects.
pub struct ReferenceResolver<'a> {
    domain: &'a KconfigDomain,
    inventories: &'a [Inventory],
    suffix: &'a str,
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(domain: &'a KconfigDomain, inventories: &'a [Inventory], suffix: &'a str) -> Self {
        Self {
            domain,
            inventories,
            suffix,
        }
    }

    pub fn resolve(&self, doctree: &mut Doctree) -> ResolveCounts {
        let fromdoc = doctree.docname.clone();
        let mut counts = ResolveCounts::default();

        doctree.for_each_inline_mut(|inline| {
            let Inline::PendingXref(xref) = &*inline else {
                return;
            };
            match self.resolve_one(&fromdoc, xref) {
                Some(resolved) => {
                    if matches!(resolved, Inline::Reference { external: true, .. }) {
                        counts.external += 1;
                    } else {
                        counts.resolved += 1;
                    }
                    *inline = resolved;
                }
                None => {
                    debug!("{}: unresolved reference '{}'", fromdoc, xref.reftarget);
                    counts.unresolved += 1;
                    *inline = Inline::Literal(xref.title.clone());
                }
            }
        });

        counts
    }

    fn resolve_one(&self, fromdoc: &str, xref: &PendingXref) -> Option<Inline> {
        if xref.refdomain != self.domain.name() {
            return None;
        }

        if let Some(found) = self.domain.resolve_xref(fromdoc, &xref.reftype, &xref.reftarget) {
            let refuri = if found.docname == fromdoc {
                format!("#{}", found.anchor)
            } else {
                format!("{}#{}", relative_uri(fromdoc, &found.docname, self.suffix), found.anchor)
            };
            return Some(Inline::Reference {
                refuri,
                reftitle: found.title,
                text: xref.title.clone(),
                external: false,
            });
        }

        let objtype = format!("{}:{}", xref.refdomain, xref.reftype);
        self.inventories.iter().find_map(|inventory| {
            let item = inventory.get(&objtype, &xref.reftarget)?;
            let text = if xref.explicit {
                xref.title.clone()
            } else {
                item.dispname.clone()
            };
            Some(Inline::Reference {
                refuri: item.uri.clone(),
                reftitle: format!("(in {} v{})", item.project, item.version),
                text,
                external: true,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::ObjectEntry;
    use crate::nodes::Node;

    #[test]
    fn test_parse_inline_markup() {
        let inlines = parse_inline("Enable **this** and ``that`` via :kconfig:option:`CONFIG_FOO`.");
        assert_eq!(inlines[0], Inline::Text("Enable ".into()));
        assert_eq!(inlines[1], Inline::Strong("this".into()));
        assert_eq!(inlines[3], Inline::Literal("that".into()));
        match &inlines[5] {
            Inline::PendingXref(xref) => {
                assert_eq!(xref.refdomain, "kconfig");
                assert_eq!(xref.reftype, "option");
                assert_eq!(xref.reftarget, "CONFIG_FOO");
                assert_eq!(xref.title, "CONFIG_FOO");
                assert!(!xref.explicit);
            }
            other => panic!("expected pending xref, got {:?}", other),
        }
        assert_eq!(inlines[6], Inline::Text(".".into()));
    }

    #[test]
    fn test_explicit_title_and_suppressed_link() {
        let parsed = ParsedRole::parse("kconfig:option", "the foo option <CONFIG_FOO>");
        assert_eq!(parsed.target, "CONFIG_FOO");
        assert_eq!(parsed.display_text.as_deref(), Some("the foo option"));

        let inlines = parse_inline(":kconfig:option:`!CONFIG_FOO`");
        assert_eq!(inlines, vec![Inline::Literal("CONFIG_FOO".into())]);
    }

    #[test]
    fn test_unknown_role_is_literal() {
        let inlines = parse_inline(":py:func:`main`");
        assert_eq!(inlines, vec![Inline::Literal("main".into())]);
    }

    #[test]
    fn test_relative_uri() {
        assert_eq!(relative_uri("index", "kconfig", ".html"), "kconfig.html");
        assert_eq!(relative_uri("guide/intro", "kconfig", ".html"), "../kconfig.html");
        assert_eq!(relative_uri("index", "ref/kconfig", ".html"), "ref/kconfig.html");
    }

    #[test]
    fn test_resolve_local_external_and_missing() {
        let mut domain = KconfigDomain::new();
        domain.add_option("CONFIG_FOO", "kconfig");

        let mut inventory = Inventory::new("Other", "2.0");
        let remote = [ObjectEntry {
            name: "CONFIG_REMOTE".into(),
            dispname: "CONFIG_REMOTE".into(),
            objtype: "option".into(),
            docname: "kconfig".into(),
            anchor: "CONFIG_REMOTE".into(),
            priority: -1,
        }];
        for (objtype, name, item) in Inventory::from_objects("Other", "2.0", "kconfig", ".html", &remote).iter() {
            let mut item = item.clone();
            item.uri = format!("https://other.example.org/{}", item.uri);
            inventory.insert(objtype, name, item);
        }
        let inventories = [inventory];

        let mut doctree = Doctree::new("guide/usage");
        doctree.children.push(Node::Paragraph(parse_inline(
            ":kconfig:option:`CONFIG_FOO` :kconfig:option:`CONFIG_REMOTE` :kconfig:option:`CONFIG_NONE`",
        )));

        let counts = ReferenceResolver::new(&domain, &inventories, ".html").resolve(&mut doctree);
        assert_eq!(counts, ResolveCounts { resolved: 1, external: 1, unresolved: 1 });

        let Node::Paragraph(inlines) = &doctree.children[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(
            inlines[0],
            Inline::Reference {
                refuri: "../kconfig.html#CONFIG_FOO".into(),
                reftitle: "CONFIG_FOO".into(),
                text: "CONFIG_FOO".into(),
                external: false,
            }
        );
        match &inlines[2] {
            Inline::Reference { refuri, reftitle, external, .. } => {
                assert_eq!(refuri, "https://other.example.org/kconfig.html#CONFIG_REMOTE");
                assert_eq!(reftitle, "(in Other v2.0)");
                assert!(*external);
            }
            other => panic!("expected external reference, got {:?}", other),
        }
        assert_eq!(inlines[4], Inline::Literal("CONFIG_NONE".into()));
    }
}
