//! Kconfig option database.
//!
//! Flattens every declaration site of every named symbol and choice into a
//! display-ready [`KconfigRecord`]. The search page loads the resulting
//! JSON array on the client side.

use indexmap::IndexSet;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::BuildError;
use crate::kconfig::{expr_str, split_expr, standard_sc_expr_str, Expr, ExprOp, Item, Kconfig, NodeId};

/// Prefix prepended to every option name.
pub const OPTION_PREFIX: &str = "CONFIG_";

/// Declaration sites in files whose name contains this marker are board or
/// sample default files: they contribute `alt_defaults` only.
pub const DEFCONFIG_MARKER: &str = "defconfig";

/// Directory (under the output directory) and file name of the database.
pub const DATABASE_DIR: &str = "kconfig";
pub const DATABASE_FILE: &str = "kconfig.json";

/// One declaration site of one symbol or choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KconfigRecord {
    pub name: String,
    pub prompt: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub help: Option<String>,
    pub dependencies: Option<String>,
    pub defaults: Vec<String>,
    /// `(default, filename)` pairs from default files.
    pub alt_defaults: Vec<(String, String)>,
    pub selects: Vec<String>,
    pub selected_by: Vec<String>,
    pub implies: Vec<String>,
    pub implied_by: Vec<String>,
    pub ranges: Vec<String>,
    pub choices: Vec<String>,
    pub filename: String,
    pub linenr: usize,
    pub menupath: String,
}

/// The ordered list of records built for one build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KconfigDatabase {
    records: Vec<KconfigRecord>,
}

impl KconfigDatabase {
    pub fn new(records: Vec<KconfigRecord>) -> Self {
        Self { records }
    }

    /// Builds the database for every named symbol and choice of `kconfig`.
    pub fn build(kconfig: &Kconfig) -> Self {
        Self::new(build_records(kconfig))
    }

    pub fn records(&self) -> &[KconfigRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct option names, in database order.
    pub fn option_names(&self) -> IndexSet<&str> {
        self.records.iter().map(|r| r.name.as_str()).collect()
    }

    /// Writes the database to `<outdir>/kconfig/kconfig.json` and returns the
    /// file path.
    pub fn write(&self, outdir: &Path) -> Result<PathBuf, BuildError> {
        let dir = outdir.join(DATABASE_DIR);
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(DATABASE_FILE);
        let json = serde_json::to_vec(&self.records)?;
        std::fs::write(&path, json)?;
        debug!("Wrote {} records to {}", self.records.len(), path.display());
        Ok(path)
    }
}

/// Leaf renderer used for every field of the database: defined symbols and
/// named choices become links to their entry on the search page.
pub fn sc_fmt(kconfig: &Kconfig, item: Item) -> String {
    match item {
        Item::Symbol(id) => {
            let sym = kconfig.symbol(id);
            if !sym.nodes.is_empty() {
                return format!(
                    "<a href=\"#{prefix}{name}\">{prefix}{name}</a>",
                    prefix = OPTION_PREFIX,
                    name = sym.name
                );
            }
            standard_sc_expr_str(kconfig, item)
        }
        Item::Choice(id) => match &kconfig.choice(id).name {
            None => "&ltchoice&gt".to_string(),
            Some(name) => format!(
                "&ltchoice <a href=\"#{prefix}{name}\">{prefix}{name}</a>&gt",
                prefix = OPTION_PREFIX,
                name = name
            ),
        },
    }
}

struct Formatter<'k> {
    kconfig: &'k Kconfig,
}

impl<'k> Formatter<'k> {
    fn expr(&self, expr: &Expr) -> String {
        expr_str(expr, &|item| sc_fmt(self.kconfig, item))
    }

    /// `value` optionally followed by ` if <cond>`.
    fn conditional(&self, value: String, cond: &Expr) -> String {
        if cond.is_y() {
            value
        } else {
            format!("{} if {}", value, self.expr(cond))
        }
    }

    /// Names of the symbols forcing `expr` on: the first `&&` term of each
    /// `||` term. Conditions attached to the forward edge are not kept.
    fn reverse_deps(&self, expr: &Expr) -> Vec<String> {
        if expr.is_n() {
            return Vec::new();
        }
        split_expr(expr, ExprOp::Or)
            .into_iter()
            .filter_map(|term| split_expr(term, ExprOp::And).first().copied())
            .filter_map(|first| first.as_item())
            .filter_map(|item| self.kconfig.item_name(item))
            .map(|name| format!("{}{}", OPTION_PREFIX, name))
            .collect()
    }

    fn menupath(&self, node: NodeId) -> String {
        let top = self.kconfig.top_node();
        let mut segments = Vec::new();
        let mut current = self.kconfig.node(node);
        while let Some(parent) = current.parent {
            if parent == top {
                break;
            }
            current = self.kconfig.node(parent);
            let title = match current.prompt_text() {
                Some(text) => text.to_string(),
                None => current
                    .item
                    .as_item()
                    .map(|item| standard_sc_expr_str(self.kconfig, item))
                    .unwrap_or_default(),
            };
            segments.push(title);
        }

        let mut path = String::from("(Top)");
        for title in segments.iter().rev() {
            path.push_str(" > ");
            path.push_str(title);
        }
        path
    }
}

fn build_records(kconfig: &Kconfig) -> Vec<KconfigRecord> {
    info!("Building Kconfig database...");
    let fmt = Formatter { kconfig };

    let mut items: Vec<Item> = kconfig
        .unique_defined_syms()
        .map(Item::Symbol)
        .chain(kconfig.unique_choices().map(Item::Choice))
        .collect();
    items.sort_by(|a, b| {
        let a = kconfig.item_name(*a).unwrap_or("");
        let b = kconfig.item_name(*b).unwrap_or("");
        a.cmp(b)
    });

    let mut records = Vec::new();
    for item in items {
        let Some(name) = kconfig.item_name(item).filter(|name| !name.is_empty()) else {
            continue;
        };
        let nodes = kconfig.item_nodes(item);

        let mut alt_defaults = Vec::new();
        for node in nodes.iter().map(|id| kconfig.node(*id)) {
            if !node.filename.contains(DEFCONFIG_MARKER) {
                continue;
            }
            for (value, cond) in &node.orig_defaults {
                let text = fmt.conditional(fmt.expr(value), cond);
                alt_defaults.push((text, node.filename.clone()));
            }
        }

        let (selected_by, implied_by) = match item {
            Item::Symbol(id) => {
                let sym = kconfig.symbol(id);
                (fmt.reverse_deps(&sym.rev_dep), fmt.reverse_deps(&sym.weak_rev_dep))
            }
            Item::Choice(_) => (Vec::new(), Vec::new()),
        };

        let choices: Vec<String> = match item {
            Item::Choice(id) => kconfig
                .choice(id)
                .syms
                .iter()
                .map(|sym| fmt.expr(&Expr::symbol(*sym)))
                .collect(),
            Item::Symbol(_) => Vec::new(),
        };

        let mut inserted_paths = HashSet::new();
        for &node_id in nodes {
            let node = kconfig.node(node_id);
            if node.filename.contains(DEFCONFIG_MARKER) {
                continue;
            }
            let has_help = node.help.as_deref().is_some_and(|help| !help.is_empty());
            if node.prompt.is_none() && !has_help {
                continue;
            }

            // Symbols re-declared with `depends on n` tricks show up as
            // several sites at the same location.
            if !inserted_paths.insert((node.filename.as_str(), node.linenr)) {
                continue;
            }

            let dependencies = (!node.dep.is_y()).then(|| fmt.expr(&node.dep));

            let defaults = node
                .orig_defaults
                .iter()
                .map(|(value, cond)| fmt.conditional(fmt.expr(value), cond))
                .collect();
            let selects = node
                .orig_selects
                .iter()
                .map(|(target, cond)| fmt.conditional(fmt.expr(&Expr::symbol(*target)), cond))
                .collect();
            let implies = node
                .orig_implies
                .iter()
                .map(|(target, cond)| fmt.conditional(fmt.expr(&Expr::symbol(*target)), cond))
                .collect();
            let ranges = node
                .orig_ranges
                .iter()
                .map(|(low, high, cond)| {
                    let range = format!(
                        "[{}, {}]",
                        fmt.expr(&Expr::symbol(*low)),
                        fmt.expr(&Expr::symbol(*high))
                    );
                    fmt.conditional(range, cond)
                })
                .collect();

            records.push(KconfigRecord {
                name: format!("{}{}", OPTION_PREFIX, name),
                prompt: node.prompt_text().map(str::to_string),
                kind: kconfig.item_type(item).as_str().to_string(),
                help: node.help.clone(),
                dependencies,
                defaults,
                alt_defaults: alt_defaults.clone(),
                selects,
                selected_by: selected_by.clone(),
                implies,
                implied_by: implied_by.clone(),
                ranges,
                choices: choices.clone(),
                filename: node.filename.clone(),
                linenr: node.linenr,
                menupath: fmt.menupath(node_id),
            });
        }
    }

    info!("Built Kconfig database with {} entries", records.len());
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn database(files: &[(&str, &str)]) -> KconfigDatabase {
        let dir = TempDir::new().unwrap();
        for (name, content) in files {
            let path = dir.path().join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, content).unwrap();
        }
        let kconfig = Kconfig::load(&dir.path().join(files[0].0)).unwrap();
        KconfigDatabase::build(&kconfig)
    }

    fn record<'a>(db: &'a KconfigDatabase, name: &str) -> &'a KconfigRecord {
        db.records().iter().find(|r| r.name == name).unwrap()
    }

    #[test]
    fn test_simple_symbol_has_no_dependencies() {
        let db = database(&[("Kconfig", "config A\n\tbool \"Enable A\"\n")]);
        assert_eq!(db.len(), 1);
        let a = &db.records()[0];
        assert_eq!(a.name, "CONFIG_A");
        assert_eq!(a.prompt.as_deref(), Some("Enable A"));
        assert_eq!(a.kind, "bool");
        assert_eq!(a.dependencies, None);
        assert_eq!(a.menupath, "(Top)");
        assert_eq!(a.linenr, 1);
    }

    #[test]
    fn test_records_sorted_by_name_and_promptless_sites_skipped() {
        let db = database(&[(
            "Kconfig",
            "config ZED\n\tbool \"Zed\"\n\nconfig HIDDEN\n\tbool\n\nconfig ALPHA\n\tint \"Alpha\"\n\trange 0 10\n",
        )]);
        let names: Vec<_> = db.records().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["CONFIG_ALPHA", "CONFIG_ZED"]);
        assert_eq!(record(&db, "CONFIG_ALPHA").ranges, vec!["[0, 10]"]);
    }

    #[test]
    fn test_links_and_conditions_render_with_sc_fmt() {
        let db = database(&[(
            "Kconfig",
            "config A\n\tbool \"A\"\n\tdefault y if B && UNDEFINED\n\tdefault \"x\"\n\nconfig B\n\tbool \"B\"\n\tdepends on A || !C\n\nconfig C\n\tbool \"C\"\n",
        )]);
        let a = record(&db, "CONFIG_A");
        assert_eq!(
            a.defaults,
            vec![
                "y if <a href=\"#CONFIG_B\">CONFIG_B</a> && UNDEFINED".to_string(),
                "\"x\"".to_string(),
            ]
        );
        let b = record(&db, "CONFIG_B");
        assert_eq!(
            b.dependencies.as_deref(),
            Some("<a href=\"#CONFIG_A\">CONFIG_A</a> || !<a href=\"#CONFIG_C\">CONFIG_C</a>")
        );
    }

    #[test]
    fn test_selected_by_drops_condition() {
        let db = database(&[(
            "Kconfig",
            "config A\n\tbool \"A\"\n\nconfig B\n\tbool \"B\"\n\tselect A if C\n\timply A\n\nconfig C\n\tbool \"C\"\n",
        )]);
        let a = record(&db, "CONFIG_A");
        assert_eq!(a.selected_by, vec!["CONFIG_B"]);
        assert_eq!(a.implied_by, vec!["CONFIG_B"]);
        let b = record(&db, "CONFIG_B");
        assert_eq!(
            b.selects,
            vec!["<a href=\"#CONFIG_A\">CONFIG_A</a> if <a href=\"#CONFIG_C\">CONFIG_C</a>"]
        );
        assert_eq!(b.implies, vec!["<a href=\"#CONFIG_A\">CONFIG_A</a>"]);
    }

    #[test]
    fn test_choices_and_choice_dependency() {
        let db = database(&[(
            "Kconfig",
            "choice MODE\n\tprompt \"Mode\"\n\tdefault MODE_A\n\nconfig MODE_A\n\tbool \"A\"\n\nconfig MODE_B\n\tbool \"B\"\n\nendchoice\n\nchoice\n\tprompt \"Anonymous\"\n\nconfig ANON_X\n\tbool \"X\"\n\nendchoice\n",
        )]);
        let mode = record(&db, "CONFIG_MODE");
        assert_eq!(mode.kind, "bool");
        assert_eq!(
            mode.choices,
            vec![
                "<a href=\"#CONFIG_MODE_A\">CONFIG_MODE_A</a>",
                "<a href=\"#CONFIG_MODE_B\">CONFIG_MODE_B</a>",
            ]
        );
        assert_eq!(mode.defaults, vec!["<a href=\"#CONFIG_MODE_A\">CONFIG_MODE_A</a>"]);

        let a = record(&db, "CONFIG_MODE_A");
        assert_eq!(
            a.dependencies.as_deref(),
            Some("&ltchoice <a href=\"#CONFIG_MODE\">CONFIG_MODE</a>&gt")
        );
        assert_eq!(a.menupath, "(Top) > Mode");

        let x = record(&db, "CONFIG_ANON_X");
        assert_eq!(x.dependencies.as_deref(), Some("&ltchoice&gt"));
        assert!(db.records().iter().all(|r| r.name != "CONFIG_"));
    }

    #[test]
    fn test_menupath_and_defconfig_alt_defaults() {
        let db = database(&[
            (
                "Kconfig",
                "menu \"Drivers\"\n\nmenu \"Serial\"\n\nconfig UART\n\tbool \"UART\"\n\tdefault n\n\nendmenu\nendmenu\n\nsource \"boards/Kconfig.defconfig\"\n",
            ),
            ("boards/Kconfig.defconfig", "config UART\n\tdefault y if BOARD_X\n"),
        ]);
        assert_eq!(db.len(), 1);
        let uart = &db.records()[0];
        assert_eq!(uart.menupath, "(Top) > Drivers > Serial");
        assert_eq!(
            uart.alt_defaults,
            vec![("y if BOARD_X".to_string(), "boards/Kconfig.defconfig".to_string())]
        );
        assert_eq!(uart.defaults, vec!["n"]);
    }

    #[test]
    fn test_write_creates_json_array() {
        let db = database(&[("Kconfig", "config A\n\tbool \"A\"\n\thelp\n\t  Some help.\n")]);
        let out = TempDir::new().unwrap();
        let path = db.write(out.path()).unwrap();
        assert_eq!(path, out.path().join("kconfig").join("kconfig.json"));

        let value: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        let entry = &value.as_array().unwrap()[0];
        assert_eq!(entry["name"], "CONFIG_A");
        assert_eq!(entry["type"], "bool");
        assert_eq!(entry["help"], "Some help.");
        assert_eq!(entry["dependencies"], serde_json::Value::Null);
        assert!(entry["alt_defaults"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_same_site_sourced_twice_gives_one_record() {
        let db = database(&[
            ("Kconfig", "source \"a/Kconfig\"\nsource \"a/Kconfig\"\n"),
            ("a/Kconfig", "config A\n\tbool \"A\"\n"),
        ]);
        let sites: Vec<_> = db
            .records()
            .iter()
            .map(|r| (r.name.as_str(), r.filename.as_str(), r.linenr))
            .collect();
        assert_eq!(sites, vec![("CONFIG_A", "a/Kconfig", 1)]);
    }

    #[test]
    fn test_tristate_reported_as_bool_without_modules() {
        let tree = "config DRV\n\ttristate \"Driver\"\n\nchoice MODE\n\ttristate \"Mode\"\n\nconfig MODE_A\n\ttristate \"A\"\n\nendchoice\n";
        let db = database(&[("Kconfig", tree)]);
        assert_eq!(record(&db, "CONFIG_DRV").kind, "bool");
        assert_eq!(record(&db, "CONFIG_MODE").kind, "bool");
        assert_eq!(record(&db, "CONFIG_MODE_A").kind, "bool");

        let with_modules = format!("config MODULES\n\tbool \"Modules\"\n\n{}", tree);
        let db = database(&[("Kconfig", with_modules.as_str())]);
        assert_eq!(record(&db, "CONFIG_DRV").kind, "tristate");
        assert_eq!(record(&db, "CONFIG_MODE").kind, "tristate");
    }

    #[test]
    fn test_option_modules_selects_modules_symbol() {
        let db = database(&[(
            "Kconfig",
            "config LOADABLE\n\tbool \"Loadable modules\"\n\toption modules\n\nconfig DRV\n\ttristate \"Driver\"\n",
        )]);
        assert_eq!(record(&db, "CONFIG_DRV").kind, "tristate");
        assert_eq!(record(&db, "CONFIG_LOADABLE").kind, "bool");
    }
}
