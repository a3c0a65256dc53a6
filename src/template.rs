//! Page templates.

use minijinja::{context, Environment};
use serde::Serialize;

use crate::environment::OutputFormat;
use crate::error::BuildError;

const PAGE_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1.0" />
    <title>{{ title }}</title>
{%- for css in css_files %}
    <link rel="stylesheet" href="{{ static_root | safe }}{{ css | safe }}" />
{%- endfor %}
{%- for script in script_files %}
    <script{% if script.type %} type="{{ script.type }}"{% endif %} src="{{ static_root | safe }}{{ script.filename | safe }}"></script>
{%- endfor %}
</head>
<body>
{{ body | safe }}
</body>
</html>
"#;

const PAGE_TEX: &str = r#"% {{ title }}
{{ body }}
"#;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptFile {
    pub filename: String,
    /// `type` attribute (`module` for ES modules)
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// Values available to a page template. Hooks may add assets before the
/// page is rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageContext {
    pub pagename: String,
    pub title: String,
    pub body: String,
    pub css_files: Vec<String>,
    pub script_files: Vec<ScriptFile>,
    /// Prefix from the page to the `_static` directory
    pub static_root: String,
}

impl PageContext {
    pub fn new(pagename: &str, title: impl Into<String>, body: impl Into<String>) -> Self {
        let depth = pagename.matches('/').count();
        Self {
            pagename: pagename.to_string(),
            title: title.into(),
            body: body.into(),
            css_files: Vec::new(),
            script_files: Vec::new(),
            static_root: format!("{}_static/", "../".repeat(depth)),
        }
    }

    pub fn add_css_file(&mut self, filename: &str) {
        if !self.css_files.iter().any(|css| css == filename) {
            self.css_files.push(filename.to_string());
        }
    }

    pub fn add_js_file(&mut self, filename: &str, kind: Option<&str>) {
        if !self.script_files.iter().any(|script| script.filename == filename) {
            self.script_files.push(ScriptFile {
                filename: filename.to_string(),
                kind: kind.map(str::to_string),
            });
        }
    }
}

pub struct TemplateEngine {
    env: Environment<'static>,
}

impl TemplateEngine {
    pub fn new() -> Result<Self, BuildError> {
        let mut env = Environment::new();
        env.add_template("page.html", PAGE_HTML)?;
        env.add_template("page.tex", PAGE_TEX)?;
        Ok(Self { env })
    }

    pub fn render_page(&self, format: OutputFormat, page: &PageContext) -> Result<String, BuildError> {
        let name = match format {
            OutputFormat::Html => "page.html",
            OutputFormat::Latex => "page.tex",
        };
        let template = self.env.get_template(name)?;
        Ok(template.render(context! {
            pagename => &page.pagename,
            title => &page.title,
            body => &page.body,
            css_files => &page.css_files,
            script_files => &page.script_files,
            static_root => &page.static_root,
        })?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_with_assets() {
        let engine = TemplateEngine::new().unwrap();
        let mut page = PageContext::new("reference/kconfig", "Kconfig <options>", "<p>body</p>");
        page.add_css_file("kconfig.css");
        page.add_js_file("kconfig.js", Some("module"));
        page.add_js_file("kconfig.js", Some("module"));

        let html = engine.render_page(OutputFormat::Html, &page).unwrap();
        assert!(html.contains("<title>Kconfig &lt;options&gt;</title>"));
        assert!(html.contains(r#"<link rel="stylesheet" href="../_static/kconfig.css" />"#));
        assert!(html.contains(r#"<script type="module" src="../_static/kconfig.js"></script>"#));
        assert_eq!(html.matches("kconfig.js").count(), 1);
        assert!(html.contains("<p>body</p>"));
    }

    #[test]
    fn test_page_without_assets() {
        let engine = TemplateEngine::new().unwrap();
        let page = PageContext::new("index", "Home", "");
        let html = engine.render_page(OutputFormat::Html, &page).unwrap();
        assert!(!html.contains("<link"));
        assert!(!html.contains("<script"));
    }
}
