//! Kconfig declaration graph.
//!
//! This module reads a Kconfig tree into symbols, choices and menu nodes.
//! It resolves dependencies the way the Kconfig tools do (parent
//! dependencies, implicit submenus, reverse dependencies from `select` and
//! `imply`) but never evaluates symbol values: that is all the option
//! database needs.
pub mod expr;
mod finalize;
mod lexer;
mod parser;

use indexmap::IndexSet;
use log::{debug, info};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::KconfigError;
pub use expr::{expr_str, split_expr, standard_sc_expr_str, Expr, ExprOp, Item, RelOp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub(crate) usize);

impl SymbolId {
    pub const N: SymbolId = SymbolId(0);
    pub const M: SymbolId = SymbolId(1);
    pub const Y: SymbolId = SymbolId(2);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChoiceId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

/// Declared value type of a symbol or choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SymbolType {
    #[default]
    Unknown,
    Bool,
    Tristate,
    String,
    Int,
    Hex,
}

impl SymbolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolType::Unknown => "unknown",
            SymbolType::Bool => "bool",
            SymbolType::Tristate => "tristate",
            SymbolType::String => "string",
            SymbolType::Int => "int",
            SymbolType::Hex => "hex",
        }
    }

    pub(crate) fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "bool" | "boolean" | "def_bool" => Some(SymbolType::Bool),
            "tristate" | "def_tristate" => Some(SymbolType::Tristate),
            "string" => Some(SymbolType::String),
            "int" => Some(SymbolType::Int),
            "hex" => Some(SymbolType::Hex),
            _ => None,
        }
    }
}

impl std::fmt::Display for SymbolType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    /// Constants are `y`, `m`, `n` and every quoted string literal.
    pub is_constant: bool,
    pub orig_type: SymbolType,
    /// Declaration sites, in parse order.
    pub nodes: Vec<NodeId>,
    /// OR of `selector && condition` for every `select` targeting this symbol.
    pub rev_dep: Expr,
    /// Same as `rev_dep`, for `imply`.
    pub weak_rev_dep: Expr,
    pub choice: Option<ChoiceId>,
}

impl Symbol {
    fn new(name: &str, is_constant: bool) -> Self {
        Self {
            name: name.to_string(),
            is_constant,
            orig_type: SymbolType::Unknown,
            nodes: Vec::new(),
            rev_dep: Expr::n(),
            weak_rev_dep: Expr::n(),
            choice: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Choice {
    pub name: Option<String>,
    pub orig_type: SymbolType,
    pub nodes: Vec<NodeId>,
    /// Member symbols, in menu order.
    pub syms: Vec<SymbolId>,
}

/// What a menu node stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuItem {
    Symbol(SymbolId),
    Choice(ChoiceId),
    Menu,
    Comment,
    /// `if` blocks only exist until the tree is finalized.
    If,
}

impl MenuItem {
    pub fn as_item(&self) -> Option<Item> {
        match self {
            MenuItem::Symbol(id) => Some(Item::Symbol(*id)),
            MenuItem::Choice(id) => Some(Item::Choice(*id)),
            _ => None,
        }
    }
}

/// One textual definition of a symbol, choice, menu or comment.
///
/// `orig_*` lists hold conditions as written in the source, without the
/// dependencies inherited from enclosing menus and `if` blocks.
#[derive(Debug, Clone)]
pub struct MenuNode {
    pub item: MenuItem,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Prompt text and its (fully propagated) condition.
    pub prompt: Option<(String, Expr)>,
    pub help: Option<String>,
    /// Dependencies of this node, including inherited ones.
    pub dep: Expr,
    /// `visible if` condition, menus only.
    pub visibility: Expr,
    pub orig_defaults: Vec<(Expr, Expr)>,
    pub orig_selects: Vec<(SymbolId, Expr)>,
    pub orig_implies: Vec<(SymbolId, Expr)>,
    pub orig_ranges: Vec<(SymbolId, SymbolId, Expr)>,
    pub filename: String,
    pub linenr: usize,
}

impl MenuNode {
    pub(crate) fn new(item: MenuItem, parent: Option<NodeId>, filename: &str, linenr: usize) -> Self {
        Self {
            item,
            parent,
            children: Vec::new(),
            prompt: None,
            help: None,
            dep: Expr::y(),
            visibility: Expr::y(),
            orig_defaults: Vec::new(),
            orig_selects: Vec::new(),
            orig_implies: Vec::new(),
            orig_ranges: Vec::new(),
            filename: filename.to_string(),
            linenr,
        }
    }

    pub fn prompt_text(&self) -> Option<&str> {
        self.prompt.as_ref().map(|(text, _)| text.as_str())
    }
}

/// A parsed and finalized Kconfig tree.
#[derive(Debug, Clone)]
pub struct Kconfig {
    symbols: Vec<Symbol>,
    /// Non-constant symbols by name.
    syms_by_name: HashMap<String, SymbolId>,
    const_syms: HashMap<String, SymbolId>,
    choices: Vec<Choice>,
    named_choices: HashMap<String, ChoiceId>,
    nodes: Vec<MenuNode>,
    top_node: NodeId,
    /// Symbols in order of their first definition.
    defined_syms: IndexSet<SymbolId>,
    /// Symbol flagged with `option modules`, if any.
    modules: Option<SymbolId>,
    srctree: PathBuf,
    filename: String,
}

impl Kconfig {
    /// Parses `root`, resolving `source` statements relative to the
    /// directory that contains it.
    pub fn load(root: &Path) -> Result<Self, KconfigError> {
        let srctree = root
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::load_with_srctree(root, &srctree)
    }

    /// Parses `root`, resolving `source` statements relative to `srctree`.
    pub fn load_with_srctree(root: &Path, srctree: &Path) -> Result<Self, KconfigError> {
        let filename = root
            .strip_prefix(srctree)
            .unwrap_or(root)
            .to_string_lossy()
            .into_owned();
        info!("Parsing Kconfig tree rooted at {}", root.display());

        let mut kconfig = Self::empty(srctree.to_path_buf(), filename.clone());
        let top = kconfig.top_node;
        let children = parser::KconfigParser::new(&mut kconfig).parse_root(root, &filename, top)?;
        kconfig.nodes[top.0].children = children;
        kconfig.finalize();

        debug!(
            "Loaded {} symbols, {} choices, {} menu nodes",
            kconfig.defined_syms.len(),
            kconfig.choices.len(),
            kconfig.nodes.len()
        );
        Ok(kconfig)
    }

    fn empty(srctree: PathBuf, filename: String) -> Self {
        let mut kconfig = Self {
            symbols: Vec::new(),
            syms_by_name: HashMap::new(),
            const_syms: HashMap::new(),
            choices: Vec::new(),
            named_choices: HashMap::new(),
            nodes: Vec::new(),
            top_node: NodeId(0),
            defined_syms: IndexSet::new(),
            modules: None,
            srctree,
            filename,
        };

        // Order must match SymbolId::{N, M, Y}.
        for name in ["n", "m", "y"] {
            let id = SymbolId(kconfig.symbols.len());
            let mut sym = Symbol::new(name, true);
            sym.orig_type = SymbolType::Tristate;
            kconfig.symbols.push(sym);
            kconfig.const_syms.insert(name.to_string(), id);
        }

        let mut top = MenuNode::new(MenuItem::Menu, None, &kconfig.filename, 1);
        top.prompt = Some(("Main menu".to_string(), Expr::y()));
        kconfig.nodes.push(top);
        kconfig
    }

    pub fn y(&self) -> SymbolId {
        SymbolId::Y
    }

    pub fn m(&self) -> SymbolId {
        SymbolId::M
    }

    pub fn n(&self) -> SymbolId {
        SymbolId::N
    }

    pub fn srctree(&self) -> &Path {
        &self.srctree
    }

    /// Name of the root file, relative to the source tree.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn top_node(&self) -> NodeId {
        self.top_node
    }

    pub fn mainmenu_text(&self) -> &str {
        self.node(self.top_node).prompt_text().unwrap_or("Main menu")
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0]
    }

    pub fn choice(&self, id: ChoiceId) -> &Choice {
        &self.choices[id.0]
    }

    pub fn node(&self, id: NodeId) -> &MenuNode {
        &self.nodes[id.0]
    }

    /// Looks up a (non-constant) symbol by name.
    pub fn symbol_by_name(&self, name: &str) -> Option<SymbolId> {
        self.syms_by_name.get(name).copied()
    }

    pub fn choice_by_name(&self, name: &str) -> Option<ChoiceId> {
        self.named_choices.get(name).copied()
    }

    /// Symbols with at least one definition, each once, in definition order.
    pub fn unique_defined_syms(&self) -> impl Iterator<Item = SymbolId> + '_ {
        self.defined_syms.iter().copied()
    }

    /// Every choice, each once, in definition order.
    pub fn unique_choices(&self) -> impl Iterator<Item = ChoiceId> {
        (0..self.choices.len()).map(ChoiceId)
    }

    /// Name of a symbol or choice; `None` for nameless choices.
    pub fn item_name(&self, item: Item) -> Option<&str> {
        match item {
            Item::Symbol(id) => Some(self.symbol(id).name.as_str()),
            Item::Choice(id) => self.choice(id).name.as_deref(),
        }
    }

    /// Declaration sites of a symbol or choice.
    pub fn item_nodes(&self, item: Item) -> &[NodeId] {
        match item {
            Item::Symbol(id) => &self.symbol(id).nodes,
            Item::Choice(id) => &self.choice(id).nodes,
        }
    }

    /// The modules symbol: the one flagged `option modules`, else `MODULES`.
    pub fn modules_sym(&self) -> Option<SymbolId> {
        self.modules.or_else(|| self.symbol_by_name("MODULES"))
    }

    /// Whether the tree defines a modules symbol at all.
    pub fn has_modules(&self) -> bool {
        self.modules_sym()
            .is_some_and(|sym| !self.symbol(sym).nodes.is_empty())
    }

    /// Reported type of a symbol or choice. Without modules support
    /// `tristate` degrades to `bool`.
    pub fn item_type(&self, item: Item) -> SymbolType {
        let declared = match item {
            Item::Symbol(id) => self.symbol(id).orig_type,
            Item::Choice(id) => self.choice(id).orig_type,
        };
        if declared == SymbolType::Tristate && !self.has_modules() {
            SymbolType::Bool
        } else {
            declared
        }
    }

    pub(crate) fn lookup_sym(&mut self, name: &str) -> SymbolId {
        if let Some(id) = self.syms_by_name.get(name) {
            return *id;
        }
        let id = SymbolId(self.symbols.len());
        self.symbols.push(Symbol::new(name, false));
        self.syms_by_name.insert(name.to_string(), id);
        id
    }

    pub(crate) fn lookup_const_sym(&mut self, value: &str) -> SymbolId {
        if let Some(id) = self.const_syms.get(value) {
            return *id;
        }
        let id = SymbolId(self.symbols.len());
        self.symbols.push(Symbol::new(value, true));
        self.const_syms.insert(value.to_string(), id);
        id
    }

    /// Returns the named choice, creating it on first use. Nameless choices
    /// are always new.
    pub(crate) fn lookup_choice(&mut self, name: Option<&str>) -> ChoiceId {
        if let Some(id) = name.and_then(|n| self.named_choices.get(n)) {
            return *id;
        }
        let id = ChoiceId(self.choices.len());
        self.choices.push(Choice {
            name: name.map(str::to_string),
            orig_type: SymbolType::Unknown,
            nodes: Vec::new(),
            syms: Vec::new(),
        });
        if let Some(name) = name {
            self.named_choices.insert(name.to_string(), id);
        }
        id
    }

    pub(crate) fn add_node(&mut self, node: MenuNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        match node.item {
            MenuItem::Symbol(sym) => {
                self.symbols[sym.0].nodes.push(id);
                self.defined_syms.insert(sym);
            }
            MenuItem::Choice(choice) => self.choices[choice.0].nodes.push(id),
            _ => {}
        }
        self.nodes.push(node);
        id
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut MenuNode {
        &mut self.nodes[id.0]
    }

    pub(crate) fn symbol_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id.0]
    }

    pub(crate) fn choice_mut(&mut self, id: ChoiceId) -> &mut Choice {
        &mut self.choices[id.0]
    }

    pub(crate) fn set_modules(&mut self, sym: SymbolId) {
        self.modules = Some(sym);
    }

    pub(crate) fn set_mainmenu(&mut self, text: String) {
        let top = self.top_node;
        self.nodes[top.0].prompt = Some((text, Expr::y()));
    }
}
