//! Directives handled by the reader.

pub mod search;
pub mod validation;

pub use search::{KconfigSearch, KconfigSearchValidator};
pub use validation::{
    DirectiveRegistry, DirectiveValidationResult, DirectiveValidator, ParsedDirective, SourceLocation,
};
