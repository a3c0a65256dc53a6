//! Shared build state handed to directives and lifecycle hooks.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::BuildConfig;
use crate::database::KconfigDatabase;
use crate::domains::KconfigDomain;
use crate::error::BuildError;

/// Output written by the active builder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Html,
    Latex,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Html => "html",
            OutputFormat::Latex => "latex",
        }
    }

    /// Extension of the page files written for this format
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Html => "html",
            OutputFormat::Latex => "tex",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "html" => Ok(OutputFormat::Html),
            "latex" => Ok(OutputFormat::Latex),
            other => Err(BuildError::ValidationError(format!("Unknown builder format '{}'", other))),
        }
    }
}

/// Build context
///
/// Holds what hooks and directives need to share across one build: the
/// configuration (mutable until reading starts), the generated database, the
/// merged domain data and the search directive's one-shot flag.
#[derive(Debug)]
pub struct BuildContext {
    pub config: BuildConfig,
    pub srcdir: PathBuf,
    pub outdir: PathBuf,
    pub format: OutputFormat,
    pub database: Option<KconfigDatabase>,
    pub domain: KconfigDomain,
    search_inserted: AtomicBool,
}

impl BuildContext {
    pub fn new(config: BuildConfig, srcdir: impl Into<PathBuf>, outdir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            srcdir: srcdir.into(),
            outdir: outdir.into(),
            format: OutputFormat::default(),
            database: None,
            domain: KconfigDomain::new(),
            search_inserted: AtomicBool::new(false),
        }
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn srcdir(&self) -> &Path {
        &self.srcdir
    }

    pub fn outdir(&self) -> &Path {
        &self.outdir
    }

    /// Marks the search directive as placed. Returns `false` if it already was.
    pub(crate) fn claim_search(&self) -> bool {
        !self.search_inserted.swap(true, Ordering::SeqCst)
    }

    pub fn search_inserted(&self) -> bool {
        self.search_inserted.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_search_once() {
        let ctx = BuildContext::new(BuildConfig::default(), "docs", "_build");
        assert!(!ctx.search_inserted());
        assert!(ctx.claim_search());
        assert!(!ctx.claim_search());
        assert!(ctx.search_inserted());
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("html".parse::<OutputFormat>().unwrap(), OutputFormat::Html);
        assert_eq!("latex".parse::<OutputFormat>().unwrap().extension(), "tex");
        assert!("epub".parse::<OutputFormat>().is_err());
    }
}
