//! Sphinx Kconfig
//!
//! Kconfig option reference support for documentation builds: a Kconfig
//! tree loader, the JSON options database, the `kconfig` cross-reference
//! domain and the `kconfig:search` directive with its client assets.

pub mod builder;
pub mod config;
pub mod database;
pub mod directives;
pub mod domains;
pub mod environment;
pub mod error;
pub mod extension;
pub mod inventory;
pub mod kconfig;
pub mod nodes;
pub mod parser;
pub mod renderer;
pub mod roles;
pub mod template;

pub use builder::{BuildStats, SphinxBuilder};
pub use config::{BuildConfig, IntersphinxTarget};
pub use database::{KconfigDatabase, KconfigRecord};
pub use directives::{
    DirectiveRegistry, DirectiveValidationResult, DirectiveValidator, KconfigSearch, KconfigSearchValidator,
    ParsedDirective, SourceLocation,
};
pub use domains::{Domain, KconfigDomain, ObjectEntry, ResolvedReference};
pub use environment::{BuildContext, OutputFormat};
pub use error::{BuildError, KconfigError};
pub use extension::{Extension, ExtensionMetadata, KconfigExtension};
pub use inventory::{Inventory, InventoryItem};
pub use kconfig::Kconfig;
pub use nodes::{Doctree, Inline, Node};
pub use parser::Parser;
pub use roles::{ReferenceResolver, ResolveCounts, XRefRole};
pub use template::{PageContext, TemplateEngine};
