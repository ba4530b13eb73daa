//! Structured IR for generated modules.
//!
//! Only the slice of the target grammar the generator needs: names, string
//! and verbatim literals, collections, attribute access, calls, one
//! comparison, plus assignment / expression / `if` statements and
//! function and class definitions.

/// An expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Name(String),
    /// Quoted string literal
    Str(String),
    /// Token emitted verbatim (numbers, booleans)
    Literal(String),
    List(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
    Tuple(Vec<Expr>),
    Attr(Box<Expr>, String),
    Call { func: Box<Expr>, args: Vec<Arg> },
    Eq(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    pub fn str(s: impl Into<String>) -> Self {
        Self::Str(s.into())
    }

    pub fn literal(token: impl Into<String>) -> Self {
        Self::Literal(token.into())
    }

    pub fn attr(self, field: impl Into<String>) -> Self {
        Self::Attr(Box::new(self), field.into())
    }

    pub fn call(self, args: Vec<Arg>) -> Self {
        Self::Call {
            func: Box::new(self),
            args,
        }
    }

    /// `self.<field>.<method>(args)` and similar chains.
    pub fn method(self, method: impl Into<String>, args: Vec<Arg>) -> Self {
        self.attr(method).call(args)
    }

    /// Whether this expression contains a non-empty list or dict.
    pub fn has_block(&self) -> bool {
        match self {
            Self::List(items) => !items.is_empty(),
            Self::Dict(entries) => !entries.is_empty(),
            Self::Tuple(items) => items.iter().any(Self::has_block),
            Self::Attr(base, _) => base.has_block(),
            Self::Call { func, args } => func.has_block() || args.iter().any(Arg::has_block),
            Self::Eq(l, r) => l.has_block() || r.has_block(),
            Self::Name(_) | Self::Str(_) | Self::Literal(_) => false,
        }
    }
}

/// A call argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Positional(Expr),
    Keyword(String, Expr),
    /// `**name`
    Splat(String),
}

impl Arg {
    pub fn keyword(name: impl Into<String>, value: Expr) -> Self {
        Self::Keyword(name.into(), value)
    }

    fn has_block(&self) -> bool {
        match self {
            Self::Positional(e) | Self::Keyword(_, e) => e.has_block(),
            Self::Splat(_) => false,
        }
    }
}

/// A statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Comment(String),
    Assign { target: String, value: Expr },
    Expr(Expr),
    Blank,
    If { cond: Expr, body: Vec<Stmt> },
    Def(FunctionDef),
    Class(ClassDef),
}

impl Stmt {
    pub fn assign(target: impl Into<String>, value: Expr) -> Self {
        Self::Assign {
            target: target.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDef {
    pub name: String,
    pub bases: Vec<String>,
    pub methods: Vec<FunctionDef>,
}

/// `from <module> import <symbols>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub module: String,
    pub symbols: Vec<String>,
}

/// A whole generated source file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Module {
    pub docstring: Option<String>,
    pub imports: Vec<Import>,
    pub body: Vec<Stmt>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders() {
        let e = Expr::name("self")
            .attr("orchestrator")
            .method("add", vec![Arg::Positional(Expr::name("x"))]);
        match e {
            Expr::Call { func, args } => {
                assert_eq!(args.len(), 1);
                assert!(matches!(*func, Expr::Attr(_, ref m) if m == "add"));
            }
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_has_block() {
        assert!(!Expr::List(vec![]).has_block());
        assert!(Expr::List(vec![Expr::str("a")]).has_block());
        let call = Expr::name("f").call(vec![Arg::keyword(
            "m",
            Expr::Dict(vec![(Expr::str("k"), Expr::str("v"))]),
        )]);
        assert!(call.has_block());
        let flat = Expr::name("f").call(vec![Arg::keyword("n", Expr::literal("1"))]);
        assert!(!flat.has_block());
    }
}
