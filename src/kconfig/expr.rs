//! Kconfig expressions and the helpers used to take them apart and print them.

use super::{ChoiceId, Kconfig, SymbolId};

/// A leaf of an expression: either a symbol (including constants) or a choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Item {
    Symbol(SymbolId),
    Choice(ChoiceId),
}

/// Relational operators allowed between two symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelOp {
    Equal,
    Unequal,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl RelOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelOp::Equal => "=",
            RelOp::Unequal => "!=",
            RelOp::Less => "<",
            RelOp::LessEqual => "<=",
            RelOp::Greater => ">",
            RelOp::GreaterEqual => ">=",
        }
    }
}

/// Binary operator selector for [`split_expr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprOp {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    Item(Item),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Rel(RelOp, SymbolId, SymbolId),
}

impl Expr {
    pub fn y() -> Self {
        Expr::Item(Item::Symbol(SymbolId::Y))
    }

    pub fn n() -> Self {
        Expr::Item(Item::Symbol(SymbolId::N))
    }

    pub fn symbol(id: SymbolId) -> Self {
        Expr::Item(Item::Symbol(id))
    }

    pub fn choice(id: ChoiceId) -> Self {
        Expr::Item(Item::Choice(id))
    }

    /// True when the expression is the constant `y` itself (not merely
    /// something that evaluates to it).
    pub fn is_y(&self) -> bool {
        matches!(self, Expr::Item(Item::Symbol(id)) if *id == SymbolId::Y)
    }

    pub fn is_n(&self) -> bool {
        matches!(self, Expr::Item(Item::Symbol(id)) if *id == SymbolId::N)
    }

    /// The leaf item, if this expression is a bare symbol or choice.
    pub fn as_item(&self) -> Option<Item> {
        match self {
            Expr::Item(item) => Some(*item),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<SymbolId> {
        match self {
            Expr::Item(Item::Symbol(id)) => Some(*id),
            _ => None,
        }
    }
}

/// `a && b` with the trivial `y`/`n` simplifications.
pub fn make_and(a: Expr, b: Expr) -> Expr {
    if a.is_y() {
        return b;
    }
    if b.is_y() {
        return a;
    }
    if a.is_n() || b.is_n() {
        return Expr::n();
    }
    Expr::And(Box::new(a), Box::new(b))
}

/// `a || b` with the trivial `y`/`n` simplifications.
pub fn make_or(a: Expr, b: Expr) -> Expr {
    if a.is_n() {
        return b;
    }
    if b.is_n() {
        return a;
    }
    if a.is_y() || b.is_y() {
        return Expr::y();
    }
    Expr::Or(Box::new(a), Box::new(b))
}

/// Flattens nested applications of `op` into their operands, left to right.
///
/// `split_expr(A || (B && C) || D, Or)` yields `[A, B && C, D]`; an
/// expression whose top level is not `op` yields itself.
pub fn split_expr(expr: &Expr, op: ExprOp) -> Vec<&Expr> {
    fn rec<'a>(expr: &'a Expr, op: ExprOp, out: &mut Vec<&'a Expr>) {
        match (expr, op) {
            (Expr::And(l, r), ExprOp::And) | (Expr::Or(l, r), ExprOp::Or) => {
                rec(l, op, out);
                rec(r, op, out);
            }
            _ => out.push(expr),
        }
    }

    let mut out = Vec::new();
    rec(expr, op, &mut out);
    out
}

/// Renders an expression, delegating every leaf to `sc_fmt`.
///
/// Operands of `&&` are parenthesized when they are `||` expressions and
/// vice versa, so `A && B || C && D` prints as `(A && B) || (C && D)`.
pub fn expr_str<F>(expr: &Expr, sc_fmt: &F) -> String
where
    F: Fn(Item) -> String,
{
    match expr {
        Expr::Item(item) => sc_fmt(*item),
        Expr::And(l, r) => format!(
            "{} && {}",
            parenthesize(l, ExprOp::Or, sc_fmt),
            parenthesize(r, ExprOp::Or, sc_fmt)
        ),
        Expr::Or(l, r) => format!(
            "{} || {}",
            parenthesize(l, ExprOp::And, sc_fmt),
            parenthesize(r, ExprOp::And, sc_fmt)
        ),
        Expr::Not(inner) => match inner.as_ref() {
            Expr::Item(item) => format!("!{}", sc_fmt(*item)),
            other => format!("!({})", expr_str(other, sc_fmt)),
        },
        Expr::Rel(op, l, r) => format!(
            "{} {} {}",
            sc_fmt(Item::Symbol(*l)),
            op.as_str(),
            sc_fmt(Item::Symbol(*r))
        ),
    }
}

fn parenthesize<F>(expr: &Expr, op: ExprOp, sc_fmt: &F) -> String
where
    F: Fn(Item) -> String,
{
    let matches_op = matches!(
        (expr, op),
        (Expr::And(..), ExprOp::And) | (Expr::Or(..), ExprOp::Or)
    );
    if matches_op {
        format!("({})", expr_str(expr, sc_fmt))
    } else {
        expr_str(expr, sc_fmt)
    }
}

/// Default leaf renderer: symbol names, quoted constants and choice markers.
pub fn standard_sc_expr_str(kconfig: &Kconfig, item: Item) -> String {
    match item {
        Item::Symbol(id) => {
            let sym = kconfig.symbol(id);
            if sym.is_constant && !matches!(sym.name.as_str(), "n" | "m" | "y") {
                format!("\"{}\"", escape(&sym.name))
            } else {
                sym.name.clone()
            }
        }
        Item::Choice(id) => match &kconfig.choice(id).name {
            Some(name) => format!("<choice {}>", name),
            None => "<choice>".to_string(),
        },
    }
}

/// Escapes backslashes and double quotes for display inside a quoted string.
pub fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Whether `expr` makes its owner depend on `sym` in the way that turns the
/// owner into an implicit child of `sym` in the menu tree.
///
/// Accepted shapes: `sym`, `sym = y`, `sym = m`, `sym != n` (either operand
/// order), or any of those inside a `&&` chain.
pub(crate) fn expr_depends_on(expr: &Expr, sym: SymbolId) -> bool {
    match expr {
        Expr::Item(Item::Symbol(id)) => *id == sym,
        Expr::Item(Item::Choice(_)) => false,
        Expr::Rel(op @ (RelOp::Equal | RelOp::Unequal), l, r) => {
            let other = if *r == sym {
                *l
            } else if *l == sym {
                *r
            } else {
                return false;
            };
            match op {
                RelOp::Equal => other == SymbolId::M || other == SymbolId::Y,
                _ => other == SymbolId::N,
            }
        }
        Expr::And(l, r) => expr_depends_on(l, sym) || expr_depends_on(r, sym),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sym(n: usize) -> Expr {
        Expr::symbol(SymbolId(n))
    }

    fn fmt(item: Item) -> String {
        match item {
            Item::Symbol(id) => format!("S{}", id.0),
            Item::Choice(id) => format!("<C{}>", id.0),
        }
    }

    #[test]
    fn test_make_and_simplifies_constants() {
        assert_eq!(make_and(Expr::y(), sym(5)), sym(5));
        assert_eq!(make_and(sym(5), Expr::y()), sym(5));
        assert!(make_and(sym(5), Expr::n()).is_n());
        assert_eq!(
            make_and(sym(5), sym(6)),
            Expr::And(Box::new(sym(5)), Box::new(sym(6)))
        );
    }

    #[test]
    fn test_make_or_simplifies_constants() {
        assert_eq!(make_or(Expr::n(), sym(5)), sym(5));
        assert!(make_or(sym(5), Expr::y()).is_y());
        assert_eq!(
            make_or(sym(5), sym(6)),
            Expr::Or(Box::new(sym(5)), Box::new(sym(6)))
        );
    }

    #[test]
    fn test_expr_str_parenthesizes_mixed_operators() {
        let and1 = Expr::And(Box::new(sym(3)), Box::new(sym(4)));
        let and2 = Expr::And(Box::new(sym(5)), Box::new(sym(6)));
        let or = Expr::Or(Box::new(and1), Box::new(and2));
        assert_eq!(expr_str(&or, &fmt), "(S3 && S4) || (S5 && S6)");

        let or_inner = Expr::Or(Box::new(sym(3)), Box::new(sym(4)));
        let and = Expr::And(Box::new(or_inner), Box::new(sym(5)));
        assert_eq!(expr_str(&and, &fmt), "(S3 || S4) && S5");
    }

    #[test]
    fn test_expr_str_not_and_relations() {
        let not_sym = Expr::Not(Box::new(sym(3)));
        assert_eq!(expr_str(&not_sym, &fmt), "!S3");

        let not_and = Expr::Not(Box::new(Expr::And(Box::new(sym(3)), Box::new(sym(4)))));
        assert_eq!(expr_str(&not_and, &fmt), "!(S3 && S4)");

        let rel = Expr::Rel(RelOp::GreaterEqual, SymbolId(3), SymbolId(4));
        assert_eq!(expr_str(&rel, &fmt), "S3 >= S4");

        assert_eq!(expr_str(&Expr::choice(ChoiceId(1)), &fmt), "<C1>");
    }

    #[test]
    fn test_split_expr_keeps_other_operators_whole() {
        let and = Expr::And(Box::new(sym(4)), Box::new(sym(5)));
        let or = Expr::Or(
            Box::new(sym(3)),
            Box::new(Expr::Or(Box::new(and.clone()), Box::new(sym(6)))),
        );
        let parts = split_expr(&or, ExprOp::Or);
        assert_eq!(parts, vec![&sym(3), &and, &sym(6)]);

        let terms = split_expr(parts[1], ExprOp::And);
        assert_eq!(terms, vec![&sym(4), &sym(5)]);

        assert_eq!(split_expr(&sym(3), ExprOp::Or), vec![&sym(3)]);
    }

    #[test]
    fn test_expr_depends_on() {
        let target = SymbolId(7);
        assert!(expr_depends_on(&Expr::symbol(target), target));
        assert!(expr_depends_on(
            &Expr::Rel(RelOp::Equal, target, SymbolId::Y),
            target
        ));
        assert!(expr_depends_on(
            &Expr::Rel(RelOp::Unequal, SymbolId::N, target),
            target
        ));
        assert!(!expr_depends_on(
            &Expr::Rel(RelOp::Equal, target, SymbolId::N),
            target
        ));
        assert!(expr_depends_on(
            &Expr::And(Box::new(sym(3)), Box::new(Expr::symbol(target))),
            target
        ));
        assert!(!expr_depends_on(
            &Expr::Or(Box::new(sym(3)), Box::new(Expr::symbol(target))),
            target
        ));
        assert!(!expr_depends_on(&Expr::Not(Box::new(Expr::symbol(target))), target));
    }

    fn or_chain(ids: &[usize]) -> Expr {
        let mut iter = ids.iter().rev();
        let mut expr = sym(*iter.next().unwrap());
        for id in iter {
            expr = Expr::Or(Box::new(sym(*id)), Box::new(expr));
        }
        expr
    }

    proptest! {
        #[test]
        fn split_recovers_or_operands_in_order(ids in prop::collection::vec(3usize..100, 1..12)) {
            let expr = or_chain(&ids);
            let parts: Vec<usize> = split_expr(&expr, ExprOp::Or)
                .into_iter()
                .map(|e| e.as_symbol().unwrap().0)
                .collect();
            prop_assert_eq!(parts, ids);
        }
    }
}
