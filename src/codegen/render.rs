//! Text renderer for the IR.
//!
//! Calls fit on one line when they are short enough and carry no non-empty
//! list or dict; otherwise every argument goes on its own line with a
//! trailing comma. Collections with entries are always broken out.

use super::ir::{Arg, ClassDef, Expr, FunctionDef, Import, Module, Stmt};
use crate::core::types::GeneratorConfig;

/// Renders IR with a fixed indentation unit and line width.
#[derive(Debug, Clone)]
pub struct Renderer {
    indent: String,
    line_width: usize,
}

impl Renderer {
    pub fn new(config: &GeneratorConfig) -> Self {
        Self {
            indent: config.indent.clone(),
            line_width: config.line_width,
        }
    }

    pub fn module(&self, module: &Module) -> String {
        let mut out = String::new();
        if let Some(doc) = &module.docstring {
            out.push_str(&format!("\"\"\" {} \"\"\"\n\n", doc));
        }
        if !module.imports.is_empty() {
            for import in &module.imports {
                out.push_str(&render_import(import));
                out.push('\n');
            }
            out.push('\n');
        }
        for stmt in &module.body {
            self.stmt(stmt, 0, &mut out);
        }
        out
    }

    /// Render one statement (and its children) at the given depth.
    pub fn stmt(&self, stmt: &Stmt, level: usize, out: &mut String) {
        let pad = self.indent.repeat(level);
        match stmt {
            Stmt::Blank => out.push('\n'),
            Stmt::Comment(text) => {
                for line in text.lines() {
                    out.push_str(&format!("{}# {}\n", pad, line));
                }
            }
            Stmt::Assign { target, value } => {
                let lead = target.len() + 3;
                out.push_str(&format!("{}{} = {}\n", pad, target, self.expr(value, level, lead)));
            }
            Stmt::Expr(e) => {
                out.push_str(&format!("{}{}\n", pad, self.expr(e, level, 0)));
            }
            Stmt::If { cond, body } => {
                out.push_str(&format!("{}if {}:\n", pad, self.expr(cond, level, 3)));
                self.block(body, level + 1, out);
            }
            Stmt::Def(def) => self.function(def, level, out),
            Stmt::Class(class) => self.class(class, level, out),
        }
    }

    fn block(&self, body: &[Stmt], level: usize, out: &mut String) {
        if body.iter().all(|s| matches!(s, Stmt::Blank | Stmt::Comment(_))) {
            for stmt in body {
                self.stmt(stmt, level, out);
            }
            out.push_str(&format!("{}pass\n", self.indent.repeat(level)));
            return;
        }
        for stmt in body {
            self.stmt(stmt, level, out);
        }
    }

    fn function(&self, def: &FunctionDef, level: usize, out: &mut String) {
        out.push_str(&format!(
            "{}def {}({}):\n",
            self.indent.repeat(level),
            def.name,
            def.params.join(", ")
        ));
        self.block(&def.body, level + 1, out);
    }

    fn class(&self, class: &ClassDef, level: usize, out: &mut String) {
        let pad = self.indent.repeat(level);
        if class.bases.is_empty() {
            out.push_str(&format!("{}class {}:\n", pad, class.name));
        } else {
            out.push_str(&format!("{}class {}({}):\n", pad, class.name, class.bases.join(", ")));
        }
        if class.methods.is_empty() {
            out.push_str(&format!("{}{}pass\n", pad, self.indent));
        }
        for (i, method) in class.methods.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            self.function(method, level + 1, out);
        }
    }

    /// Render an expression whose first line starts `lead` columns after the
    /// indentation of `level`.
    pub fn expr(&self, expr: &Expr, level: usize, lead: usize) -> String {
        match expr {
            Expr::Name(name) => name.clone(),
            Expr::Str(s) => quote(s),
            Expr::Literal(token) => token.clone(),
            Expr::Attr(base, field) => format!("{}.{}", self.expr(base, level, lead), field),
            Expr::Eq(l, r) => format!(
                "{} == {}",
                self.expr(l, level, lead),
                self.expr(r, level, lead)
            ),
            Expr::Tuple(items) => {
                let parts: Vec<String> = items.iter().map(|e| self.expr(e, level, lead)).collect();
                match parts.len() {
                    1 => format!("({},)", parts[0]),
                    _ => format!("({})", parts.join(", ")),
                }
            }
            Expr::List(items) if items.is_empty() => "[]".to_string(),
            Expr::List(items) => {
                let entries = items
                    .iter()
                    .map(|e| self.expr(e, level + 1, 0))
                    .collect::<Vec<_>>();
                self.broken("[", &entries, "]", level)
            }
            Expr::Dict(entries) if entries.is_empty() => "{}".to_string(),
            Expr::Dict(entries) => {
                let entries = entries
                    .iter()
                    .map(|(k, v)| {
                        let key = self.expr(k, level + 1, 0);
                        let lead = key.len() + 2;
                        format!("{}: {}", key, self.expr(v, level + 1, lead))
                    })
                    .collect::<Vec<_>>();
                self.broken("{", &entries, "}", level)
            }
            Expr::Call { func, args } => {
                let callee = self.expr(func, level, lead);
                if !expr.has_block() {
                    let inline = format!("{}({})", callee, self.args_inline(args, level));
                    if self.indent.len() * level + lead + inline.len() <= self.line_width {
                        return inline;
                    }
                }
                if args.is_empty() {
                    return format!("{}()", callee);
                }
                let entries = args
                    .iter()
                    .map(|a| self.arg(a, level + 1))
                    .collect::<Vec<_>>();
                self.broken(&format!("{}(", callee), &entries, ")", level)
            }
        }
    }

    fn args_inline(&self, args: &[Arg], level: usize) -> String {
        args.iter()
            .map(|a| self.arg(a, level))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn arg(&self, arg: &Arg, level: usize) -> String {
        match arg {
            Arg::Positional(e) => self.expr(e, level, 0),
            Arg::Keyword(name, e) => format!("{} = {}", name, self.expr(e, level, name.len() + 3)),
            Arg::Splat(name) => format!("**{}", name),
        }
    }

    /// `open` + one entry per line with trailing commas + `close`.
    fn broken(&self, open: &str, entries: &[String], close: &str, level: usize) -> String {
        let inner = self.indent.repeat(level + 1);
        let mut out = format!("{}\n", open);
        for entry in entries {
            out.push_str(&format!("{}{},\n", inner, entry));
        }
        out.push_str(&format!("{}{}", self.indent.repeat(level), close));
        out
    }
}

/// Single-quoted string literal.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

fn render_import(import: &Import) -> String {
    format!("from {} import {}", import.module, import.symbols.join(", "))
}
