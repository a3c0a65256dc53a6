//! Build lifecycle hooks.
//!
//! The Kconfig extension builds the options database when the builder is
//! initialized and attaches the search assets to the page that carries the
//! search directive.

use std::path::{Path, PathBuf};

use log::{debug, info};
use serde_json::json;

use crate::database::{KconfigDatabase, DATABASE_DIR};
use crate::directives::{DirectiveRegistry, KconfigSearchValidator};
use crate::environment::{BuildContext, OutputFormat};
use crate::error::{BuildError, KconfigError};
use crate::kconfig::Kconfig;
use crate::nodes::Doctree;
use crate::template::PageContext;

pub const VERSION: &str = "0.1.0";

const KCONFIG_CSS: &str = include_str!("../static/kconfig.css");
const KCONFIG_JS: &str = include_str!("../static/kconfig.js");

/// What an extension declares about itself at setup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionMetadata {
    pub version: &'static str,
    pub parallel_read_safe: bool,
    pub parallel_write_safe: bool,
}

/// A configuration value an extension adds, with its default
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValue {
    pub name: &'static str,
    pub default: serde_json::Value,
    /// What has to be rebuilt when the value changes
    pub rebuild: &'static str,
}

pub trait Extension: Send + Sync {
    fn name(&self) -> &'static str;

    fn config_values(&self) -> Vec<ConfigValue> {
        Vec::new()
    }

    /// Registers the extension's directives.
    fn setup(&self, directives: &mut DirectiveRegistry) -> ExtensionMetadata;

    /// Runs once the configuration is final, before any document is read.
    fn builder_inited(&self, _ctx: &mut BuildContext) -> Result<(), BuildError> {
        Ok(())
    }

    /// Runs for every page about to be rendered.
    fn html_page_context(&self, _ctx: &BuildContext, _page: &mut PageContext, _doctree: Option<&Doctree>) {}
}

pub struct KconfigExtension;

impl KconfigExtension {
    pub fn new() -> Self {
        Self
    }
}

impl Default for KconfigExtension {
    fn default() -> Self {
        Self::new()
    }
}

impl Extension for KconfigExtension {
    fn name(&self) -> &'static str {
        "sphinx_kconfig"
    }

    fn config_values(&self) -> Vec<ConfigValue> {
        vec![
            ConfigValue {
                name: "kconfig_generate_db",
                default: json!(false),
                rebuild: "env",
            },
            ConfigValue {
                name: "kconfig_root_path",
                default: json!("../Kconfig"),
                rebuild: "env",
            },
        ]
    }

    fn setup(&self, directives: &mut DirectiveRegistry) -> ExtensionMetadata {
        directives.register_validator(Box::new(KconfigSearchValidator::new()));
        ExtensionMetadata {
            version: VERSION,
            parallel_read_safe: true,
            parallel_write_safe: true,
        }
    }

    fn builder_inited(&self, ctx: &mut BuildContext) -> Result<(), BuildError> {
        if !ctx.config.kconfig_generate_db {
            return Ok(());
        }

        let root = ctx.config.kconfig_root(&ctx.srcdir);
        let root = root
            .canonicalize()
            .map_err(|source| KconfigError::Io { path: root.clone(), source })?;
        info!("Loading Kconfig tree from {}", root.display());
        let kconfig = Kconfig::load(&root)?;
        info!("Loaded Kconfig tree '{}'", kconfig.mainmenu_text());
        let database = KconfigDatabase::build(&kconfig);

        let outdir = absolute(&ctx.outdir)?;
        let database_file = database.write(&outdir)?;
        let resources = resources_dir(&outdir)?;
        info!(
            "Kconfig database with {} entries written to {}",
            database.len(),
            database_file.display()
        );

        ctx.config.html_extra_path.push(database_file);
        ctx.config.html_static_path.push(resources);
        ctx.database = Some(database);
        Ok(())
    }

    fn html_page_context(&self, ctx: &BuildContext, page: &mut PageContext, doctree: Option<&Doctree>) {
        if !ctx.config.kconfig_generate_db || ctx.format != OutputFormat::Html {
            return;
        }
        let Some(doctree) = doctree else {
            return;
        };

        if doctree.contains_kconfig_search() {
            debug!("Installing Kconfig search assets on {}", page.pagename);
            page.add_css_file("kconfig.css");
            page.add_js_file("kconfig.js", Some("module"));
        }
    }
}

fn absolute(path: &Path) -> Result<PathBuf, BuildError> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Writes the search's client assets under `<outdir>/kconfig/static` and
/// returns that directory.
pub fn resources_dir(outdir: &Path) -> Result<PathBuf, BuildError> {
    let dir = outdir.join(DATABASE_DIR).join("static");
    std::fs::create_dir_all(&dir)?;
    std::fs::write(dir.join("kconfig.css"), KCONFIG_CSS)?;
    std::fs::write(dir.join("kconfig.js"), KCONFIG_JS)?;
    debug!("Wrote Kconfig assets to {}", dir.display());
    Ok(dir)
}
