use log::debug;
use serde::{Deserialize, Serialize};

use crate::domains::{Domain, ObjType, ObjectEntry, ResolvedReference};

/// Kconfig domain
///
/// Options are not described by document content: the search directive
/// registers every known option to the page it is placed on, so all
/// `:kconfig:option:` references land on that single page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KconfigDomain {
    options: Vec<ObjectEntry>,
}

const OBJECT_TYPES: &[ObjType] = &[ObjType {
    name: "option",
    roles: &["option"],
}];

impl KconfigDomain {
    pub const NAME: &'static str = "kconfig";

    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new Kconfig option located in `docname`, anchored at its
    /// own name.
    pub fn add_option(&mut self, option: &str, docname: &str) {
        self.options.push(ObjectEntry {
            name: option.to_string(),
            dispname: option.to_string(),
            objtype: "option".to_string(),
            docname: docname.to_string(),
            anchor: option.to_string(),
            priority: -1,
        });
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}

impl Domain for KconfigDomain {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn label(&self) -> &'static str {
        "Kconfig"
    }

    fn object_types(&self) -> &'static [ObjType] {
        OBJECT_TYPES
    }

    fn roles(&self) -> &'static [&'static str] {
        &["option"]
    }

    fn directives(&self) -> &'static [&'static str] {
        &["search"]
    }

    fn get_objects(&self) -> Box<dyn Iterator<Item = &ObjectEntry> + '_> {
        Box::new(self.options.iter())
    }

    fn merge_domaindata(&mut self, _docnames: &[String], other: &Self) {
        self.options.extend(other.options.iter().cloned());
    }

    fn clear_doc(&mut self, docname: &str) {
        self.options.retain(|entry| entry.docname != docname);
    }

    fn resolve_xref(&self, fromdocname: &str, _typ: &str, target: &str) -> Option<ResolvedReference> {
        let entry = self.get_objects().find(|entry| entry.name == target)?;
        debug!(
            "Resolved kconfig:option '{}' from {} to {}#{}",
            target, fromdocname, entry.docname, entry.anchor
        );
        Some(ResolvedReference {
            docname: entry.docname.clone(),
            anchor: entry.anchor.clone(),
            title: entry.anchor.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kconfig_domain_creation() {
        let domain = KconfigDomain::new();
        assert_eq!(domain.name(), "kconfig");
        assert_eq!(domain.label(), "Kconfig");
        assert_eq!(domain.object_types()[0].name, "option");
        assert!(domain.roles().contains(&"option"));
        assert!(domain.directives().contains(&"search"));
        assert!(domain.is_empty());
    }

    #[test]
    fn test_add_option_entry_shape() {
        let mut domain = KconfigDomain::new();
        domain.add_option("CONFIG_FOO", "reference/kconfig");

        let entry = domain.get_objects().next().unwrap();
        assert_eq!(entry.name, "CONFIG_FOO");
        assert_eq!(entry.dispname, "CONFIG_FOO");
        assert_eq!(entry.objtype, "option");
        assert_eq!(entry.docname, "reference/kconfig");
        assert_eq!(entry.anchor, "CONFIG_FOO");
        assert_eq!(entry.priority, -1);
    }

    #[test]
    fn test_resolve_registered_and_unknown_names() {
        let mut domain = KconfigDomain::new();
        domain.add_option("CONFIG_FOO", "kconfig");

        let resolved = domain.resolve_xref("index", "option", "CONFIG_FOO").unwrap();
        assert_eq!(resolved.docname, "kconfig");
        assert_eq!(resolved.anchor, "CONFIG_FOO");

        assert!(domain.resolve_xref("index", "option", "CONFIG_BAR").is_none());
    }

    #[test]
    fn test_merge_concatenates_without_dedup() {
        let mut main = KconfigDomain::new();
        main.add_option("a", "doc1");

        let mut worker = KconfigDomain::new();
        worker.add_option("b", "doc2");
        worker.add_option("a", "doc2");

        main.merge_domaindata(&["doc2".to_string()], &worker);
        let names: Vec<_> = main.get_objects().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "a"]);

        // first match wins
        assert_eq!(main.resolve_xref("x", "option", "a").unwrap().docname, "doc1");
    }

    #[test]
    fn test_clear_doc() {
        let mut domain = KconfigDomain::new();
        domain.add_option("a", "doc1");
        domain.add_option("b", "doc2");
        domain.clear_doc("doc1");
        assert_eq!(domain.len(), 1);
        assert!(domain.resolve_xref("x", "option", "a").is_none());
    }
}
