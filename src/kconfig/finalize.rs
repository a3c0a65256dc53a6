//! Post-parse pass over the menu tree.
//!
//! Propagates dependencies from parents to children, builds reverse
//! dependencies, creates implicit submenus under symbols, flattens
//! promptless nodes, drops `if` nodes and settles choice members and types.

use super::expr::{expr_depends_on, make_and, make_or, Expr};
use super::{Kconfig, MenuItem, NodeId, SymbolType};

impl Kconfig {
    pub(crate) fn finalize(&mut self) {
        let top = [self.top_node];
        let mut pos = 0;
        self.finalize_node(&top, &mut pos, &Expr::y());
    }

    /// Finalizes `list[*pos]` and advances `pos` past it and past any
    /// following siblings it absorbs as an implicit submenu.
    fn finalize_node(&mut self, list: &[NodeId], pos: &mut usize, visible_if: &Expr) -> NodeId {
        let id = list[*pos];
        *pos += 1;

        let item = self.node(id).item;
        match item {
            MenuItem::Symbol(_) => {
                self.add_props_to_sym(id);

                let mut submenu = Vec::new();
                while *pos < list.len() && self.auto_menu_dep(id, list[*pos]) {
                    let child = self.finalize_node(list, pos, visible_if);
                    self.node_mut(child).parent = Some(id);
                    submenu.push(child);
                }
                if !submenu.is_empty() {
                    self.node_mut(id).children = submenu;
                }
            }
            _ if !self.node(id).children.is_empty() => {
                let visible_if = if item == MenuItem::Menu {
                    make_and(visible_if.clone(), self.node(id).visibility.clone())
                } else {
                    visible_if.clone()
                };

                // Must run before the children are finalized so implicit
                // submenu detection sees the inherited dependencies.
                self.propagate_deps(id, &visible_if);

                let children = std::mem::take(&mut self.node_mut(id).children);
                let mut child_pos = 0;
                let mut finalized = Vec::with_capacity(children.len());
                while child_pos < children.len() {
                    finalized.push(self.finalize_node(&children, &mut child_pos, &visible_if));
                }
                self.node_mut(id).children = finalized;
            }
            _ => {}
        }

        if !self.node(id).children.is_empty() {
            self.flatten_children(id);
            self.remove_ifs(id);
        }

        if let MenuItem::Choice(_) = item {
            self.finalize_choice(id);
        }

        id
    }

    fn propagate_deps(&mut self, id: NodeId, visible_if: &Expr) {
        let parent = self.node(id);
        let basedep = match parent.item {
            MenuItem::Choice(choice) => Expr::choice(choice),
            _ => parent.dep.clone(),
        };

        for child in self.node(id).children.clone() {
            let node = self.node_mut(child);
            node.dep = make_and(node.dep.clone(), basedep.clone());
            let dep = node.dep.clone();
            let is_sym_or_choice = matches!(node.item, MenuItem::Symbol(_) | MenuItem::Choice(_));

            if let Some((text, cond)) = node.prompt.take() {
                let cond = if is_sym_or_choice {
                    make_and(cond, make_and(visible_if.clone(), dep))
                } else {
                    make_and(cond, dep)
                };
                node.prompt = Some((text, cond));
            }
        }
    }

    fn add_props_to_sym(&mut self, id: NodeId) {
        let MenuItem::Symbol(sym) = self.node(id).item else {
            return;
        };
        let node = self.node(id);
        let dep = node.dep.clone();
        let selects = node.orig_selects.clone();
        let implies = node.orig_implies.clone();

        for (target, cond) in selects {
            let term = make_and(Expr::symbol(sym), make_and(cond, dep.clone()));
            let rev_dep = self.symbol(target).rev_dep.clone();
            self.symbol_mut(target).rev_dep = make_or(rev_dep, term);
        }
        for (target, cond) in implies {
            let term = make_and(Expr::symbol(sym), make_and(cond, dep.clone()));
            let weak_rev_dep = self.symbol(target).weak_rev_dep.clone();
            self.symbol_mut(target).weak_rev_dep = make_or(weak_rev_dep, term);
        }
    }

    /// Whether `next` belongs in an implicit submenu rooted at symbol node `id`.
    fn auto_menu_dep(&self, id: NodeId, next: NodeId) -> bool {
        let MenuItem::Symbol(sym) = self.node(id).item else {
            return false;
        };
        let next = self.node(next);
        let expr = match &next.prompt {
            Some((_, cond)) => cond,
            None => &next.dep,
        };
        expr_depends_on(expr, sym)
    }

    /// Splices the children of promptless, non-choice child nodes in after
    /// them, repeatedly.
    fn flatten_children(&mut self, id: NodeId) {
        let mut list = std::mem::take(&mut self.node_mut(id).children);
        let mut i = 0;
        while i < list.len() {
            let child = list[i];
            let node = self.node(child);
            let flatten = !node.children.is_empty()
                && node.prompt.is_none()
                && !matches!(node.item, MenuItem::Choice(_));
            if flatten {
                let grandchildren = std::mem::take(&mut self.node_mut(child).children);
                for grandchild in &grandchildren {
                    self.node_mut(*grandchild).parent = Some(id);
                }
                list.splice(i + 1..i + 1, grandchildren);
            }
            i += 1;
        }
        self.node_mut(id).children = list;
    }

    fn remove_ifs(&mut self, id: NodeId) {
        let children = std::mem::take(&mut self.node_mut(id).children);
        let kept: Vec<NodeId> = children
            .into_iter()
            .filter(|child| self.node(*child).item != MenuItem::If)
            .collect();
        self.node_mut(id).children = kept;
    }

    fn finalize_choice(&mut self, id: NodeId) {
        let MenuItem::Choice(choice) = self.node(id).item else {
            return;
        };

        for child in self.node(id).children.clone() {
            let child_item = self.node(child).item;
            if let MenuItem::Symbol(sym) = child_item {
                self.symbol_mut(sym).choice = Some(choice);
                self.choice_mut(choice).syms.push(sym);
            }
        }

        if self.choice(choice).orig_type == SymbolType::Unknown {
            let inferred = self
                .choice(choice)
                .syms
                .iter()
                .map(|sym| self.symbol(*sym).orig_type)
                .find(|t| *t != SymbolType::Unknown);
            if let Some(inferred) = inferred {
                self.choice_mut(choice).orig_type = inferred;
            }
        }

        let choice_type = self.choice(choice).orig_type;
        for sym in self.choice(choice).syms.clone() {
            if self.symbol(sym).orig_type == SymbolType::Unknown {
                self.symbol_mut(sym).orig_type = choice_type;
            }
        }
    }
}
