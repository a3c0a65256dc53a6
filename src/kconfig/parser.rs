//! Block and property parser building the raw menu tree.

use log::debug;
use std::path::{Path, PathBuf};

use super::lexer::{tokenize, FileCursor, Preprocessor, Token};
use super::{expr::make_and, Expr, Kconfig, MenuItem, MenuNode, NodeId, SymbolId, SymbolType};
use crate::error::KconfigError;

pub(crate) struct KconfigParser<'a> {
    kconfig: &'a mut Kconfig,
    preprocessor: Preprocessor,
    /// Files currently being parsed, outermost first.
    include_stack: Vec<String>,
}

/// Tokens of one logical line with a read position.
struct TokenStream<'t> {
    tokens: &'t [Token],
    pos: usize,
    filename: &'t str,
    linenr: usize,
}

impl<'t> TokenStream<'t> {
    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&'t Token> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn error(&self, message: impl Into<String>) -> KconfigError {
        KconfigError::syntax(self.filename, self.linenr, message)
    }

    fn expect_name(&mut self) -> Result<&'t str, KconfigError> {
        match self.next() {
            Some(Token::Name(name)) => Ok(name),
            _ => Err(self.error("expected a name")),
        }
    }

    fn expect_str(&mut self) -> Result<&'t str, KconfigError> {
        match self.next() {
            Some(Token::Str(value)) => Ok(value),
            _ => Err(self.error("expected a quoted string")),
        }
    }

    fn expect_end(&self) -> Result<(), KconfigError> {
        if self.at_end() {
            Ok(())
        } else {
            Err(self.error("extra tokens at end of line"))
        }
    }
}

impl<'a> KconfigParser<'a> {
    pub(crate) fn new(kconfig: &'a mut Kconfig) -> Self {
        Self {
            kconfig,
            preprocessor: Preprocessor::default(),
            include_stack: Vec::new(),
        }
    }

    pub(crate) fn parse_root(
        &mut self,
        path: &Path,
        filename: &str,
        parent: NodeId,
    ) -> Result<Vec<NodeId>, KconfigError> {
        self.parse_file(path, filename, parent)
    }

    fn parse_file(&mut self, path: &Path, filename: &str, parent: NodeId) -> Result<Vec<NodeId>, KconfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| KconfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Parsing {}", filename);

        self.include_stack.push(filename.to_string());
        let mut cursor = FileCursor::new(filename, &content);
        let result = self.parse_block(&mut cursor, None, parent);
        self.include_stack.pop();
        result
    }

    /// Next non-empty token line, with assignments consumed and macros
    /// expanded.
    fn next_tokens(&mut self, cursor: &mut FileCursor) -> Result<Option<(usize, Vec<Token>)>, KconfigError> {
        if let Some(pending) = cursor.take_pushback() {
            return Ok(Some(pending));
        }
        while let Some((linenr, line)) = cursor.next_line() {
            if self.preprocessor.try_assignment(&line, &cursor.filename, linenr)? {
                continue;
            }
            let expanded = self.preprocessor.expand(&line, &cursor.filename, linenr)?;
            let tokens = tokenize(&expanded, &cursor.filename, linenr)?;
            if !tokens.is_empty() {
                return Ok(Some((linenr, tokens)));
            }
        }
        Ok(None)
    }

    fn parse_block(
        &mut self,
        cursor: &mut FileCursor,
        end_token: Option<&str>,
        parent: NodeId,
    ) -> Result<Vec<NodeId>, KconfigError> {
        let mut list = Vec::new();

        while let Some((linenr, tokens)) = self.next_tokens(cursor)? {
            let filename = cursor.filename.clone();
            let mut ts = TokenStream {
                tokens: &tokens,
                pos: 0,
                filename: &filename,
                linenr,
            };
            let keyword = match ts.next() {
                Some(Token::Name(keyword)) => keyword.as_str(),
                _ => return Err(ts.error("expected a keyword")),
            };

            match keyword {
                "config" | "menuconfig" => {
                    let name = ts.expect_name()?;
                    ts.expect_end()?;
                    let sym = self.kconfig.lookup_sym(name);
                    let node = MenuNode::new(MenuItem::Symbol(sym), Some(parent), &filename, linenr);
                    let id = self.kconfig.add_node(node);
                    self.parse_props(cursor, id)?;
                    list.push(id);
                }
                "source" | "rsource" | "osource" | "orsource" => {
                    let pattern = ts.expect_str()?;
                    ts.expect_end()?;
                    let relative = matches!(keyword, "rsource" | "orsource");
                    let optional = matches!(keyword, "osource" | "orsource");
                    list.extend(self.parse_source(pattern, relative, optional, &filename, linenr, parent)?);
                }
                "choice" => {
                    let name = match ts.next() {
                        Some(Token::Name(name)) => Some(name.as_str()),
                        None => None,
                        _ => return Err(ts.error("expected a choice name")),
                    };
                    ts.expect_end()?;
                    let choice = self.kconfig.lookup_choice(name);
                    let node = MenuNode::new(MenuItem::Choice(choice), Some(parent), &filename, linenr);
                    let id = self.kconfig.add_node(node);
                    self.parse_props(cursor, id)?;
                    let children = self.parse_block(cursor, Some("endchoice"), id)?;
                    self.kconfig.node_mut(id).children = children;
                    list.push(id);
                }
                "menu" => {
                    let title = ts.expect_str()?.to_string();
                    ts.expect_end()?;
                    let mut node = MenuNode::new(MenuItem::Menu, Some(parent), &filename, linenr);
                    node.prompt = Some((title, Expr::y()));
                    let id = self.kconfig.add_node(node);
                    self.parse_props(cursor, id)?;
                    let children = self.parse_block(cursor, Some("endmenu"), id)?;
                    self.kconfig.node_mut(id).children = children;
                    list.push(id);
                }
                "comment" => {
                    let text = ts.expect_str()?.to_string();
                    ts.expect_end()?;
                    let mut node = MenuNode::new(MenuItem::Comment, Some(parent), &filename, linenr);
                    node.prompt = Some((text, Expr::y()));
                    let id = self.kconfig.add_node(node);
                    self.parse_props(cursor, id)?;
                    list.push(id);
                }
                "if" => {
                    let dep = self.parse_expr(&mut ts)?;
                    ts.expect_end()?;
                    let mut node = MenuNode::new(MenuItem::If, Some(parent), &filename, linenr);
                    node.dep = dep;
                    let id = self.kconfig.add_node(node);
                    let children = self.parse_block(cursor, Some("endif"), id)?;
                    self.kconfig.node_mut(id).children = children;
                    list.push(id);
                }
                "mainmenu" => {
                    let title = ts.expect_str()?.to_string();
                    ts.expect_end()?;
                    self.kconfig.set_mainmenu(title);
                }
                keyword if Some(keyword) == end_token => {
                    ts.expect_end()?;
                    return Ok(list);
                }
                "endmenu" | "endchoice" | "endif" => {
                    return Err(ts.error(format!("unexpected '{}'", keyword)));
                }
                other => {
                    return Err(ts.error(format!("unrecognized construct '{}'", other)));
                }
            }
        }

        match end_token {
            Some(end) => Err(KconfigError::syntax(
                &cursor.filename,
                cursor.line_count(),
                format!("missing '{}'", end),
            )),
            None => Ok(list),
        }
    }

    fn parse_source(
        &mut self,
        pattern: &str,
        relative: bool,
        optional: bool,
        filename: &str,
        linenr: usize,
        parent: NodeId,
    ) -> Result<Vec<NodeId>, KconfigError> {
        let pattern = if relative {
            match Path::new(filename).parent() {
                Some(dir) => dir.join(pattern).to_string_lossy().into_owned(),
                None => pattern.to_string(),
            }
        } else {
            pattern.to_string()
        };

        let srctree = self.kconfig.srctree().to_path_buf();
        let full_pattern = srctree.join(&pattern);
        let mut matches: Vec<PathBuf> = glob::glob(&full_pattern.to_string_lossy())
            .map_err(|e| KconfigError::Pattern(pattern.clone(), e.to_string()))?
            .filter_map(Result::ok)
            .filter(|p| p.is_file())
            .collect();
        matches.sort();

        if matches.is_empty() && !optional {
            return Err(KconfigError::SourceNotFound {
                filename: filename.to_string(),
                linenr,
                pattern,
            });
        }

        let mut nodes = Vec::new();
        for path in matches {
            let display = path
                .strip_prefix(&srctree)
                .unwrap_or(&path)
                .to_string_lossy()
                .into_owned();
            if self.include_stack.contains(&display) {
                return Err(KconfigError::RecursiveSource {
                    filename: filename.to_string(),
                    linenr,
                    target: display,
                });
            }
            nodes.extend(self.parse_file(&path, &display, parent)?);
        }
        Ok(nodes)
    }

    /// Parses the property lines following a `config`, `choice`, `menu` or
    /// `comment` header. Stops at (and pushes back) the first line that is
    /// not a property.
    fn parse_props(&mut self, cursor: &mut FileCursor, id: NodeId) -> Result<(), KconfigError> {
        while let Some((linenr, tokens)) = self.next_tokens(cursor)? {
            let filename = cursor.filename.clone();
            let mut ts = TokenStream {
                tokens: &tokens,
                pos: 0,
                filename: &filename,
                linenr,
            };
            let keyword = match ts.peek() {
                Some(Token::Name(keyword)) => keyword.as_str(),
                _ => return Err(ts.error("expected a property")),
            };

            match keyword {
                "bool" | "boolean" | "tristate" | "string" | "int" | "hex" => {
                    ts.next();
                    self.set_type(id, keyword);
                    if let Some(Token::Str(_)) = ts.peek() {
                        self.parse_prompt(&mut ts, id)?;
                    }
                    ts.expect_end()?;
                }
                "def_bool" | "def_tristate" => {
                    ts.next();
                    self.set_type(id, keyword);
                    let value = self.parse_expr(&mut ts)?;
                    let cond = self.parse_cond(&mut ts)?;
                    self.kconfig.node_mut(id).orig_defaults.push((value, cond));
                }
                "prompt" => {
                    ts.next();
                    self.parse_prompt(&mut ts, id)?;
                    ts.expect_end()?;
                }
                "default" => {
                    ts.next();
                    let value = self.parse_expr(&mut ts)?;
                    let cond = self.parse_cond(&mut ts)?;
                    self.kconfig.node_mut(id).orig_defaults.push((value, cond));
                }
                "depends" => {
                    ts.next();
                    if !ts.next().is_some_and(|t| t.is_name("on")) {
                        return Err(ts.error("expected 'on' after 'depends'"));
                    }
                    let dep = self.parse_expr(&mut ts)?;
                    ts.expect_end()?;
                    let node = self.kconfig.node_mut(id);
                    node.dep = make_and(node.dep.clone(), dep);
                }
                "select" | "imply" => {
                    ts.next();
                    if !matches!(self.kconfig.node(id).item, MenuItem::Symbol(_)) {
                        return Err(ts.error(format!("only symbols can {}", keyword)));
                    }
                    let target_name = ts.expect_name()?;
                    let target = self.kconfig.lookup_sym(target_name);
                    let cond = self.parse_cond(&mut ts)?;
                    let node = self.kconfig.node_mut(id);
                    if keyword == "select" {
                        node.orig_selects.push((target, cond));
                    } else {
                        node.orig_implies.push((target, cond));
                    }
                }
                "range" => {
                    ts.next();
                    let low = self.parse_symbol(&mut ts)?;
                    let high = self.parse_symbol(&mut ts)?;
                    let cond = self.parse_cond(&mut ts)?;
                    self.kconfig.node_mut(id).orig_ranges.push((low, high, cond));
                }
                "visible" => {
                    ts.next();
                    if !ts.next().is_some_and(|t| t.is_name("if")) {
                        return Err(ts.error("expected 'if' after 'visible'"));
                    }
                    let cond = self.parse_expr(&mut ts)?;
                    ts.expect_end()?;
                    let node = self.kconfig.node_mut(id);
                    node.visibility = make_and(node.visibility.clone(), cond);
                }
                "help" | "---help---" => {
                    ts.next();
                    ts.expect_end()?;
                    let help = cursor.read_help();
                    self.kconfig.node_mut(id).help = Some(help);
                }
                "optional" => {
                    ts.next();
                    ts.expect_end()?;
                    if !matches!(self.kconfig.node(id).item, MenuItem::Choice(_)) {
                        return Err(ts.error("'optional' is only valid for choices"));
                    }
                }
                "modules" => {
                    ts.next();
                    self.mark_modules(id);
                }
                "option" => {
                    ts.next();
                    if ts.next().is_some_and(|t| t.is_name("modules")) {
                        self.mark_modules(id);
                    }
                }
                "transitional" => {}
                _ => {
                    cursor.push_back(linenr, tokens.clone());
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    fn mark_modules(&mut self, id: NodeId) {
        if let MenuItem::Symbol(sym) = self.kconfig.node(id).item {
            debug!("Modules symbol: {}", self.kconfig.symbol(sym).name);
            self.kconfig.set_modules(sym);
        }
    }

    fn set_type(&mut self, id: NodeId, keyword: &str) {
        let Some(new_type) = SymbolType::from_keyword(keyword) else {
            return;
        };
        match self.kconfig.node(id).item {
            MenuItem::Symbol(sym) => self.kconfig.symbol_mut(sym).orig_type = new_type,
            MenuItem::Choice(choice) => self.kconfig.choice_mut(choice).orig_type = new_type,
            _ => {}
        }
    }

    fn parse_prompt(&mut self, ts: &mut TokenStream<'_>, id: NodeId) -> Result<(), KconfigError> {
        let text = ts.expect_str()?.to_string();
        let cond = self.parse_cond(ts)?;
        self.kconfig.node_mut(id).prompt = Some((text, cond));
        Ok(())
    }

    /// Optional trailing `if <expr>`; `y` when absent.
    fn parse_cond(&mut self, ts: &mut TokenStream<'_>) -> Result<Expr, KconfigError> {
        if ts.at_end() {
            return Ok(Expr::y());
        }
        if !ts.next().is_some_and(|t| t.is_name("if")) {
            return Err(ts.error("expected 'if' or end of line"));
        }
        let cond = self.parse_expr(ts)?;
        ts.expect_end()?;
        Ok(cond)
    }

    fn parse_expr(&mut self, ts: &mut TokenStream<'_>) -> Result<Expr, KconfigError> {
        let lhs = self.parse_and_expr(ts)?;
        if matches!(ts.peek(), Some(Token::Or)) {
            ts.next();
            let rhs = self.parse_expr(ts)?;
            return Ok(Expr::Or(Box::new(lhs), Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn parse_and_expr(&mut self, ts: &mut TokenStream<'_>) -> Result<Expr, KconfigError> {
        let lhs = self.parse_factor(ts)?;
        if matches!(ts.peek(), Some(Token::And)) {
            ts.next();
            let rhs = self.parse_and_expr(ts)?;
            return Ok(Expr::And(Box::new(lhs), Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn parse_factor(&mut self, ts: &mut TokenStream<'_>) -> Result<Expr, KconfigError> {
        match ts.peek() {
            Some(Token::Not) => {
                ts.next();
                Ok(Expr::Not(Box::new(self.parse_factor(ts)?)))
            }
            Some(Token::OpenParen) => {
                ts.next();
                let inner = self.parse_expr(ts)?;
                match ts.next() {
                    Some(Token::CloseParen) => Ok(inner),
                    _ => Err(ts.error("missing ')' in expression")),
                }
            }
            Some(Token::Name(_)) | Some(Token::Str(_)) => {
                let lhs = self.parse_symbol(ts)?;
                if let Some(Token::Rel(op)) = ts.peek() {
                    ts.next();
                    let rhs = self.parse_symbol(ts)?;
                    return Ok(Expr::Rel(*op, lhs, rhs));
                }
                Ok(Expr::symbol(lhs))
            }
            _ => Err(ts.error("malformed expression")),
        }
    }

    fn parse_symbol(&mut self, ts: &mut TokenStream<'_>) -> Result<SymbolId, KconfigError> {
        match ts.next() {
            Some(Token::Name(name)) if matches!(name.as_str(), "n" | "m" | "y") => {
                Ok(self.kconfig.lookup_const_sym(name))
            }
            Some(Token::Name(name)) => Ok(self.kconfig.lookup_sym(name)),
            Some(Token::Str(value)) => Ok(self.kconfig.lookup_const_sym(value)),
            _ => Err(ts.error("expected a symbol")),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use tempfile::TempDir;

    use crate::error::KconfigError;
    use crate::kconfig::Kconfig;

    fn load(files: &[(&str, &str)]) -> Result<Kconfig, KconfigError> {
        let dir = TempDir::new().unwrap();
        for (name, content) in files {
            let path = dir.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        Kconfig::load(&dir.path().join(files[0].0))
    }

    #[test]
    fn test_missing_source_is_an_error() {
        let err = load(&[("Kconfig", "config A\n\tbool \"A\"\n\nsource \"missing/Kconfig\"\n")]).unwrap_err();
        match err {
            KconfigError::SourceNotFound {
                filename,
                linenr,
                pattern,
            } => {
                assert_eq!(filename, "Kconfig");
                assert_eq!(linenr, 4);
                assert_eq!(pattern, "missing/Kconfig");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_recursive_source_is_an_error() {
        let err = load(&[
            ("Kconfig", "source \"sub/Kconfig\"\n"),
            ("sub/Kconfig", "config A\n\tbool \"A\"\n\nsource \"Kconfig\"\n"),
        ])
        .unwrap_err();
        match err {
            KconfigError::RecursiveSource {
                filename,
                linenr,
                target,
            } => {
                assert_eq!(filename, "sub/Kconfig");
                assert_eq!(linenr, 4);
                assert_eq!(target, "Kconfig");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_optional_sources_tolerate_no_match() {
        let kconfig = load(&[
            ("Kconfig", "osource \"nothere/Kconfig\"\norsource \"boards/*/Kconfig\"\nconfig A\n\tbool \"A\"\n"),
        ])
        .unwrap();
        assert!(kconfig.symbol_by_name("A").is_some());
        assert_eq!(kconfig.unique_defined_syms().count(), 1);
    }

    #[test]
    fn test_glob_source_includes_every_match_in_order() {
        let kconfig = load(&[
            ("Kconfig", "rsource \"boards/*/Kconfig\"\n"),
            ("boards/b/Kconfig", "config BOARD_B\n\tbool \"B\"\n"),
            ("boards/a/Kconfig", "config BOARD_A\n\tbool \"A\"\n"),
        ])
        .unwrap();
        let names: Vec<_> = kconfig
            .unique_defined_syms()
            .map(|sym| kconfig.symbol(sym).name.clone())
            .collect();
        assert_eq!(names, vec!["BOARD_A", "BOARD_B"]);
    }

    #[test]
    fn test_unterminated_menu() {
        let err = load(&[("Kconfig", "menu \"Drivers\"\n\nconfig A\n\tbool \"A\"\n")]).unwrap_err();
        assert!(matches!(err, KconfigError::Syntax { .. }));
        let message = err.to_string();
        assert!(message.starts_with("Kconfig:"), "{}", message);
        assert!(message.contains("missing 'endmenu'"), "{}", message);
    }

    #[test]
    fn test_syntax_error_reports_file_and_line() {
        let err = load(&[
            ("Kconfig", "rsource \"sub/Kconfig\"\n"),
            ("sub/Kconfig", "config A\n\tbogus_property\n"),
        ])
        .unwrap_err();
        assert_eq!(err.to_string(), "sub/Kconfig:2: unrecognized construct 'bogus_property'");
    }

    #[test]
    fn test_modules_option_marks_symbol() {
        let kconfig = load(&[("Kconfig", "config LOADABLE\n\tbool \"Loadable\"\n\toption modules\n")]).unwrap();
        assert_eq!(kconfig.modules_sym(), kconfig.symbol_by_name("LOADABLE"));
        assert!(kconfig.has_modules());
    }
}
