//! Doctree-to-output translators.

use crate::directives::KconfigSearch;
use crate::environment::OutputFormat;
use crate::nodes::{Doctree, Inline, Node};

/// Writes the body of a page for one output format.
pub trait Translator {
    fn visit_node(&mut self, node: &Node);

    /// The accumulated output
    fn astext(&self) -> String;

    fn translate(&mut self, doctree: &Doctree) -> String {
        for node in &doctree.children {
            self.visit_node(node);
        }
        self.astext()
    }
}

/// Renders the body of `doctree` for `format`.
pub fn render_body(doctree: &Doctree, format: OutputFormat) -> String {
    match format {
        OutputFormat::Html => HtmlTranslator::new().translate(doctree),
        OutputFormat::Latex => LatexTranslator::new().translate(doctree),
    }
}

#[derive(Default)]
pub struct HtmlTranslator {
    body: Vec<String>,
}

impl HtmlTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render_inlines(inlines: &[Inline]) -> String {
        inlines.iter().map(Self::render_inline).collect()
    }

    fn render_inline(inline: &Inline) -> String {
        match inline {
            Inline::Text(text) => html_escape::encode_text(text).to_string(),
            Inline::Emphasis(text) => format!("<em>{}</em>", html_escape::encode_text(text)),
            Inline::Strong(text) => format!("<strong>{}</strong>", html_escape::encode_text(text)),
            Inline::Literal(text) => literal(text, "docutils literal notranslate"),
            Inline::PendingXref(xref) => literal(
                &xref.title,
                &format!("xref {0} {0}-{1} docutils literal notranslate", xref.refdomain, xref.reftype),
            ),
            Inline::Reference {
                refuri,
                reftitle,
                text,
                external,
            } => format!(
                r#"<a class="reference {}" href="{}" title="{}">{}</a>"#,
                if *external { "external" } else { "internal" },
                html_escape::encode_double_quoted_attribute(refuri),
                html_escape::encode_double_quoted_attribute(reftitle),
                literal(text, "xref kconfig kconfig-option docutils literal notranslate"),
            ),
        }
    }
}

fn literal(text: &str, classes: &str) -> String {
    format!(
        r#"<code class="{}"><span class="pre">{}</span></code>"#,
        classes,
        html_escape::encode_text(text)
    )
}

impl Translator for HtmlTranslator {
    fn visit_node(&mut self, node: &Node) {
        match node {
            Node::Title { text, level, id } => {
                let level = (*level).min(6);
                self.body.push(format!(
                    "<h{level} id=\"{id}\">{}<a class=\"headerlink\" href=\"#{id}\" title=\"Link to this heading\">¶</a></h{level}>",
                    Self::render_inlines(text),
                    level = level,
                    id = html_escape::encode_double_quoted_attribute(id),
                ));
            }
            Node::Paragraph(inlines) => {
                self.body.push(format!("<p>{}</p>", Self::render_inlines(inlines)));
            }
            Node::LiteralBlock(code) => {
                self.body.push(format!(
                    "<div class=\"highlight\"><pre>{}</pre></div>",
                    html_escape::encode_text(code)
                ));
            }
            Node::BulletList(items) => {
                let items: String = items
                    .iter()
                    .map(|item| format!("<li><p>{}</p></li>", Self::render_inlines(item)))
                    .collect();
                self.body.push(format!("<ul class=\"simple\">{}</ul>", items));
            }
            Node::KconfigSearch => self.body.push(KconfigSearch::render(OutputFormat::Html).to_string()),
            Node::Directive(_) => {}
        }
    }

    fn astext(&self) -> String {
        self.body.join("\n")
    }
}

#[derive(Default)]
pub struct LatexTranslator {
    body: Vec<String>,
}

const LATEX_SECTIONS: [&str; 5] = ["chapter", "section", "subsection", "subsubsection", "paragraph"];

impl LatexTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    fn render_inlines(inlines: &[Inline]) -> String {
        inlines
            .iter()
            .map(|inline| match inline {
                Inline::Text(text) => escape_latex(text),
                Inline::Emphasis(text) => format!("\\sphinxstyleemphasis{{{}}}", escape_latex(text)),
                Inline::Strong(text) => format!("\\sphinxstylestrong{{{}}}", escape_latex(text)),
                Inline::Literal(text) => format!("\\sphinxcode{{\\sphinxupquote{{{}}}}}", escape_latex(text)),
                Inline::PendingXref(xref) => {
                    format!("\\sphinxcode{{\\sphinxupquote{{{}}}}}", escape_latex(&xref.title))
                }
                Inline::Reference {
                    refuri,
                    text,
                    external: true,
                    ..
                } => format!(
                    "\\sphinxhref{{{}}}{{\\sphinxcode{{\\sphinxupquote{{{}}}}}}}",
                    refuri,
                    escape_latex(text)
                ),
                Inline::Reference { text, .. } => {
                    format!("\\sphinxcode{{\\sphinxupquote{{{}}}}}", escape_latex(text))
                }
            })
            .collect()
    }
}

impl Translator for LatexTranslator {
    fn visit_node(&mut self, node: &Node) {
        match node {
            Node::Title { text, level, id } => {
                let command = LATEX_SECTIONS[level.saturating_sub(1).min(LATEX_SECTIONS.len() - 1)];
                self.body.push(format!(
                    "\\{}{{{}}}\\label{{\\detokenize{{{}}}}}",
                    command,
                    Self::render_inlines(text),
                    id
                ));
            }
            Node::Paragraph(inlines) => self.body.push(Self::render_inlines(inlines)),
            Node::LiteralBlock(code) => {
                self.body
                    .push(format!("\\begin{{sphinxVerbatim}}\n{}\n\\end{{sphinxVerbatim}}", code));
            }
            Node::BulletList(items) => {
                let mut out = String::from("\\begin{itemize}\n");
                for item in items {
                    out.push_str(&format!("\\item {}\n", Self::render_inlines(item)));
                }
                out.push_str("\\end{itemize}");
                self.body.push(out);
            }
            Node::KconfigSearch => self.body.push(KconfigSearch::render(OutputFormat::Latex).to_string()),
            Node::Directive(_) => {}
        }
    }

    fn astext(&self) -> String {
        self.body.join("\n\n")
    }
}

pub fn escape_latex(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\textbackslash{}"),
            '{' | '}' | '$' | '&' | '#' | '_' | '%' => {
                out.push('\\');
                out.push(c);
            }
            '^' => out.push_str("\\textasciicircum{}"),
            '~' => out.push_str("\\textasciitilde{}"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::parse_inline;

    fn doctree(children: Vec<Node>) -> Doctree {
        Doctree {
            docname: "index".into(),
            children,
        }
    }

    #[test]
    fn test_search_node_per_format() {
        let tree = doctree(vec![Node::KconfigSearch]);
        assert_eq!(
            render_body(&tree, OutputFormat::Html),
            r#"<div id="__kconfig-search"></div>"#
        );
        assert_eq!(
            render_body(&tree, OutputFormat::Latex),
            "Kconfig search is only available on HTML output"
        );
    }

    #[test]
    fn test_html_title_and_paragraph() {
        let tree = doctree(vec![
            Node::Title {
                text: vec![Inline::Text("Options".into())],
                level: 1,
                id: "options".into(),
            },
            Node::Paragraph(parse_inline("Use <b> **carefully**")),
        ]);
        let html = render_body(&tree, OutputFormat::Html);
        assert!(html.starts_with("<h1 id=\"options\">Options<a class=\"headerlink\""));
        assert!(html.contains("<p>Use &lt;b&gt; <strong>carefully</strong></p>"));
    }

    #[test]
    fn test_html_references() {
        let tree = doctree(vec![Node::Paragraph(vec![
            Inline::Reference {
                refuri: "kconfig.html#CONFIG_FOO".into(),
                reftitle: "CONFIG_FOO".into(),
                text: "CONFIG_FOO".into(),
                external: false,
            },
            Inline::Literal("CONFIG_BAR".into()),
        ])]);
        let html = render_body(&tree, OutputFormat::Html);
        assert!(html.contains(r#"<a class="reference internal" href="kconfig.html#CONFIG_FOO" title="CONFIG_FOO">"#));
        assert!(html.contains(r#"<span class="pre">CONFIG_FOO</span></code></a>"#));
        assert!(html.contains(r#"<code class="docutils literal notranslate"><span class="pre">CONFIG_BAR</span></code>"#));
    }

    #[test]
    fn test_latex_escaping() {
        assert_eq!(escape_latex("CONFIG_FOO & 50%"), "CONFIG\\_FOO \\& 50\\%");
        let tree = doctree(vec![Node::Title {
            text: vec![Inline::Text("Kconfig".into())],
            level: 2,
            id: "kconfig".into(),
        }]);
        assert_eq!(
            render_body(&tree, OutputFormat::Latex),
            "\\section{Kconfig}\\label{\\detokenize{kconfig}}"
        );
    }
}
