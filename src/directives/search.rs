//! `.. kconfig:search::` directive

use log::debug;

use super::validation::{DirectiveValidationResult, DirectiveValidator, ParsedDirective};
use crate::domains::KconfigDomain;
use crate::environment::{BuildContext, OutputFormat};
use crate::error::BuildError;
use crate::nodes::Node;

/// Markup the client-side search mounts on
pub const SEARCH_HTML: &str = r#"<div id="__kconfig-search"></div>"#;

/// Text written in place of the search on non-HTML output
pub const SEARCH_UNAVAILABLE: &str = "Kconfig search is only available on HTML output";

/// Kconfig search directive
pub struct KconfigSearch;

impl KconfigSearch {
    pub const NAME: &'static str = "kconfig:search";

    /// Places the search on `docname`.
    ///
    /// Every option of the database is registered to `docname`, so all
    /// option references resolve to this page.
    pub fn run(ctx: &BuildContext, domain: &mut KconfigDomain, docname: &str) -> Result<Vec<Node>, BuildError> {
        let database = match &ctx.database {
            Some(database) if ctx.config.kconfig_generate_db => database,
            _ => {
                return Err(BuildError::ExtensionError(
                    "Kconfig search directive can not be used without database".to_string(),
                ))
            }
        };

        if !ctx.claim_search() {
            return Err(BuildError::ExtensionError(
                "Kconfig search directive can only be used once".to_string(),
            ));
        }

        let names = database.option_names();
        debug!("Registering {} Kconfig options to {}", names.len(), docname);
        for name in names {
            domain.add_option(name, docname);
        }

        Ok(vec![Node::KconfigSearch])
    }

    /// Output of the search node for `format`
    pub fn render(format: OutputFormat) -> &'static str {
        match format {
            OutputFormat::Html => SEARCH_HTML,
            _ => SEARCH_UNAVAILABLE,
        }
    }
}

/// Validator for the search directive: it takes nothing
#[derive(Default)]
pub struct KconfigSearchValidator;

impl KconfigSearchValidator {
    pub fn new() -> Self {
        Self
    }
}

impl DirectiveValidator for KconfigSearchValidator {
    fn name(&self) -> &str {
        KconfigSearch::NAME
    }

    fn validate(&self, directive: &ParsedDirective) -> DirectiveValidationResult {
        if !directive.arguments.is_empty() {
            return DirectiveValidationResult::Error(
                "kconfig:search directive takes no arguments".to_string(),
            );
        }

        if let Some(option) = directive.options.keys().next() {
            return DirectiveValidationResult::Error(format!(
                "Unknown option '{}' for kconfig:search directive",
                option
            ));
        }

        if !directive.content.trim().is_empty() {
            return DirectiveValidationResult::Error(
                "kconfig:search directive does not allow content".to_string(),
            );
        }

        DirectiveValidationResult::Valid
    }

    fn valid_options(&self) -> Vec<String> {
        Vec::new()
    }

    fn requires_content(&self) -> bool {
        false
    }

    fn allows_content(&self) -> bool {
        false
    }
}
