/// Domain System & Cross-Reference Resolution
///
/// This module defines the seam between the build and a documentation domain:
/// - Object registry entries exported to the inventory
/// - Merging of registries collected by parallel readers
/// - Resolution of role targets to document anchors
pub mod kconfig;

use serde::{Deserialize, Serialize};

pub use kconfig::KconfigDomain;

/// An object type a domain can register, with the roles that refer to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjType {
    pub name: &'static str,
    pub roles: &'static [&'static str],
}

/// A registered domain object.
///
/// Mirrors the inventory tuple `(name, dispname, type, docname, anchor,
/// priority)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectEntry {
    /// Name used to look the object up
    pub name: String,
    /// Name shown to readers
    pub dispname: String,
    /// Object type (e.g. "option")
    pub objtype: String,
    /// Document that holds the object's description
    pub docname: String,
    /// Anchor inside `docname`
    pub anchor: String,
    /// Search weight; `-1` keeps the object out of full-text search results
    pub priority: i32,
}

/// Where a cross-reference points to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedReference {
    pub docname: String,
    pub anchor: String,
    /// Hover title for the generated link
    pub title: String,
}

/// Core trait for documentation domains
pub trait Domain {
    /// Short name used as the role/directive prefix (`kconfig` in `:kconfig:option:`)
    fn name(&self) -> &'static str;

    /// Human-readable name
    fn label(&self) -> &'static str;

    fn object_types(&self) -> &'static [ObjType];

    /// Role names handled by this domain
    fn roles(&self) -> &'static [&'static str];

    /// Directive names handled by this domain
    fn directives(&self) -> &'static [&'static str];

    /// All registered objects, in registration order
    fn get_objects(&self) -> Box<dyn Iterator<Item = &ObjectEntry> + '_>;

    /// Adds the objects collected by another reader for `docnames`.
    fn merge_domaindata(&mut self, docnames: &[String], other: &Self)
    where
        Self: Sized;

    /// Forgets everything registered from `docname` (for rebuilds)
    fn clear_doc(&mut self, docname: &str);

    /// Resolves `target` referenced through role `typ` from `fromdocname`.
    /// `None` means the target is unknown to this domain.
    fn resolve_xref(&self, fromdocname: &str, typ: &str, target: &str) -> Option<ResolvedReference>;
}
