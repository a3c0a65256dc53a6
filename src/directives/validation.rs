//! Directive Validation System
//!
//! Checks a parsed directive's arguments, options and content against what
//! its handler accepts before the directive is run.

use std::collections::HashMap;

/// Source location information for diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceLocation {
    /// File path where the directive was found
    pub file: String,
    /// Line number (1-based)
    pub line: usize,
    /// Column number (1-based)
    pub column: usize,
}

/// Represents a parsed directive with validation context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDirective {
    /// The directive name, domain prefix included (e.g. "kconfig:search")
    pub name: String,
    /// Arguments provided to the directive
    pub arguments: Vec<String>,
    /// Options specified for the directive (key-value pairs)
    pub options: HashMap<String, String>,
    /// The content body of the directive
    pub content: String,
    /// Source location information
    pub location: SourceLocation,
}

impl ParsedDirective {
    pub fn new(name: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            name: name.into(),
            arguments: Vec::new(),
            options: HashMap::new(),
            content: String::new(),
            location,
        }
    }
}

/// Result of directive validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectiveValidationResult {
    /// Directive is valid
    Valid,
    /// Directive has warnings but is acceptable
    Warning(String),
    /// Directive has errors and should be fixed
    Error(String),
    /// Directive is unknown/unregistered
    Unknown,
}

/// Trait for implementing directive validators
pub trait DirectiveValidator: Send + Sync {
    /// Returns the name of the directive this validator handles
    fn name(&self) -> &str;

    /// Validates a parsed directive
    fn validate(&self, directive: &ParsedDirective) -> DirectiveValidationResult;

    /// Returns valid options for this directive
    fn valid_options(&self) -> Vec<String>;

    /// Returns whether this directive requires content
    fn requires_content(&self) -> bool;

    /// Returns whether this directive allows content
    fn allows_content(&self) -> bool;

    /// Provides suggestions for fixing directive issues
    fn get_suggestions(&self, directive: &ParsedDirective) -> Vec<String> {
        let mut suggestions = Vec::new();

        if directive.content.is_empty() && self.requires_content() {
            suggestions.push(format!("The '{}' directive requires content", self.name()));
        }

        if !directive.content.is_empty() && !self.allows_content() {
            suggestions.push(format!(
                "The '{}' directive does not allow content",
                self.name()
            ));
        }

        let valid_options = self.valid_options();
        for option in directive.options.keys() {
            if !valid_options.contains(option) {
                suggestions.push(format!(
                    "Unknown option '{}' for directive '{}'",
                    option,
                    self.name()
                ));
            }
        }

        suggestions
    }
}

/// Registry for managing directive validators
#[derive(Default)]
pub struct DirectiveRegistry {
    validators: HashMap<String, Box<dyn DirectiveValidator>>,
}

impl DirectiveRegistry {
    /// Creates a new directive registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a directive validator
    pub fn register_validator(&mut self, validator: Box<dyn DirectiveValidator>) {
        let name = validator.name().to_string();
        self.validators.insert(name, validator);
    }

    /// Validates a directive
    pub fn validate_directive(&self, directive: &ParsedDirective) -> DirectiveValidationResult {
        match self.validators.get(&directive.name) {
            Some(validator) => validator.validate(directive),
            None => DirectiveValidationResult::Unknown,
        }
    }

    /// Gets suggestions for a directive
    pub fn get_directive_suggestions(&self, directive: &ParsedDirective) -> Vec<String> {
        match self.validators.get(&directive.name) {
            Some(validator) => validator.get_suggestions(directive),
            None => {
                let mut suggestions = vec![format!("Unknown directive '{}'", directive.name)];

                for validator_name in self.validators.keys() {
                    if validator_name.contains(&directive.name)
                        || directive.name.contains(validator_name.as_str())
                    {
                        suggestions.push(format!("Did you mean '{}'?", validator_name));
                    }
                }

                suggestions
            }
        }
    }

    /// Returns all registered directive names
    pub fn get_registered_directives(&self) -> Vec<String> {
        self.validators.keys().cloned().collect()
    }

    /// Checks if a directive is registered
    pub fn is_directive_registered(&self, name: &str) -> bool {
        self.validators.contains_key(name)
    }
}
