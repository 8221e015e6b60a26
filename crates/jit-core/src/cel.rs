//! # CEL Engine: Compile, Evaluate, Render
//!
//! Process-wide handle on the Common Expression Language toolchain used for
//! policy conditions. Parsing is done by `cel-parser`, execution by
//! `cel-interpreter`.
//!
//! The engine is lazily initialized once and immutable afterwards; it holds
//! only the declared environment (variables and functions), so it is safe
//! to share across concurrent callers without locking.
//!
//! ## Environment
//!
//! - Variable `request`: a map whose `time` entry is the evaluation instant.
//! - Functions: the CEL standard library subset below. References to any
//!   other function or variable are rejected at compile time, mirroring a
//!   type-checking CEL compiler.

use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use cel_interpreter::{Context, Program, Value};
pub use cel_parser::{ArithmeticOp, Atom, Expression, Member, RelationOp, UnaryOp};

use crate::error::JitError;
use crate::temporal::Timestamp;

/// Name of the request variable.
pub const REQUEST_VARIABLE: &str = "request";

const STANDARD_FUNCTIONS: &[&str] = &[
    "all", "bool", "bytes", "contains", "double", "duration", "dyn", "endsWith",
    "exists", "exists_one", "filter", "getDate", "getDayOfMonth", "getDayOfWeek",
    "getDayOfYear", "getFullYear", "getHours", "getMilliseconds", "getMinutes",
    "getMonth", "getSeconds", "has", "int", "map", "matches", "max", "min", "size",
    "startsWith", "string", "timestamp", "type", "uint",
];

/// Macros whose first argument binds a loop variable.
const COMPREHENSIONS: &[&str] = &["all", "exists", "exists_one", "filter", "map"];

static ENGINE: LazyLock<CelEngine> = LazyLock::new(CelEngine::standard);

/// Return the process-wide engine.
pub fn engine() -> &'static CelEngine {
    &ENGINE
}

/// Declared CEL environment for policy conditions.
#[derive(Debug)]
pub struct CelEngine {
    variables: BTreeSet<&'static str>,
    functions: BTreeSet<&'static str>,
}

impl CelEngine {
    fn standard() -> Self {
        Self {
            variables: [REQUEST_VARIABLE].into_iter().collect(),
            functions: STANDARD_FUNCTIONS.iter().copied().collect(),
        }
    }

    /// Parse and check an expression against the declared environment.
    pub fn compile(&self, text: &str) -> Result<Expression, JitError> {
        let ast = cel_parser::parse(text)
            .map_err(|e| JitError::InvalidExpression(format!("syntax error: {e}")))?;
        let mut scope = Vec::new();
        self.check(&ast, &mut scope)?;
        Ok(ast)
    }

    /// Compile and evaluate an expression with `request.time` bound to `time`.
    pub fn evaluate(&self, text: &str, time: Timestamp) -> Result<bool, JitError> {
        self.compile(text)?;

        let program = Program::compile(text)
            .map_err(|e| JitError::InvalidExpression(format!("compilation failed: {e}")))?;

        let mut request = HashMap::new();
        request.insert("time".to_string(), Value::Timestamp((*time.as_datetime()).into()));

        let mut context = Context::default();
        context
            .add_variable(REQUEST_VARIABLE, Value::Map(request.into()))
            .map_err(|e| JitError::InvalidExpression(format!("failed to bind request: {e}")))?;

        match program.execute(&context) {
            Ok(Value::Bool(b)) => Ok(b),
            Ok(other) => Err(JitError::InvalidExpression(format!(
                "expression must return bool, got {other:?}"
            ))),
            Err(e) => Err(JitError::InvalidExpression(format!("execution failed: {e}"))),
        }
    }

    fn check(&self, expr: &Expression, scope: &mut Vec<String>) -> Result<(), JitError> {
        match expr {
            Expression::Arithmetic(l, _, r)
            | Expression::Relation(l, _, r)
            | Expression::Or(l, r)
            | Expression::And(l, r) => {
                self.check(l, scope)?;
                self.check(r, scope)
            }
            Expression::Ternary(c, a, b) => {
                self.check(c, scope)?;
                self.check(a, scope)?;
                self.check(b, scope)
            }
            Expression::Unary(_, e) => self.check(e, scope),
            Expression::Member(target, member) => {
                self.check(target, scope)?;
                match member.as_ref() {
                    Member::Attribute(_) => Ok(()),
                    Member::Index(index) => self.check(index, scope),
                    Member::Fields(fields) => {
                        fields.iter().try_for_each(|(_, value)| self.check(value, scope))
                    }
                }
            }
            Expression::FunctionCall(func, target, args) => {
                let name = match func.as_ref() {
                    Expression::Ident(name) => name.as_str(),
                    other => {
                        self.check(other, scope)?;
                        return args.iter().try_for_each(|arg| self.check(arg, scope));
                    }
                };
                if !self.functions.contains(name) {
                    return Err(JitError::InvalidExpression(format!(
                        "undeclared reference to function '{name}'"
                    )));
                }
                if let Some(target) = target {
                    self.check(target, scope)?;
                }
                match (COMPREHENSIONS.contains(&name), target, args.split_first()) {
                    (true, Some(_), Some((Expression::Ident(var), rest))) => {
                        scope.push(var.to_string());
                        let result = rest.iter().try_for_each(|arg| self.check(arg, scope));
                        scope.pop();
                        result
                    }
                    _ => args.iter().try_for_each(|arg| self.check(arg, scope)),
                }
            }
            Expression::List(items) => items.iter().try_for_each(|item| self.check(item, scope)),
            Expression::Map(entries) => entries.iter().try_for_each(|(k, v)| {
                self.check(k, scope)?;
                self.check(v, scope)
            }),
            Expression::Atom(_) => Ok(()),
            Expression::Ident(name) => {
                if self.variables.contains(name.as_str()) || scope.iter().any(|s| s == name.as_str()) {
                    Ok(())
                } else {
                    Err(JitError::InvalidExpression(format!(
                        "undeclared reference to '{name}'"
                    )))
                }
            }
        }
    }

    /// Render an expression in canonical form.
    ///
    /// Binary operators are surrounded by single spaces, parentheses are
    /// emitted only where precedence requires them, and string literals use
    /// double quotes. Rendering a parsed rendering yields the same text.
    pub fn unparse(&self, expr: &Expression) -> String {
        let mut out = String::new();
        render(expr, &mut out);
        out
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

const PREC_TERNARY: u8 = 1;
const PREC_OR: u8 = 2;
const PREC_AND: u8 = 3;
const PREC_RELATION: u8 = 4;
const PREC_ADD: u8 = 5;
const PREC_MUL: u8 = 6;
const PREC_UNARY: u8 = 7;
const PREC_PRIMARY: u8 = 8;

fn precedence(expr: &Expression) -> u8 {
    match expr {
        Expression::Ternary(..) => PREC_TERNARY,
        Expression::Or(..) => PREC_OR,
        Expression::And(..) => PREC_AND,
        Expression::Relation(..) => PREC_RELATION,
        Expression::Arithmetic(_, ArithmeticOp::Add | ArithmeticOp::Subtract, _) => PREC_ADD,
        Expression::Arithmetic(..) => PREC_MUL,
        Expression::Unary(..) => PREC_UNARY,
        _ => PREC_PRIMARY,
    }
}

/// Render `expr`, parenthesized when its precedence is below `min`.
fn render_operand(expr: &Expression, min: u8, out: &mut String) {
    if precedence(expr) < min {
        out.push('(');
        render(expr, out);
        out.push(')');
    } else {
        render(expr, out);
    }
}

fn render_binary(l: &Expression, op: &str, r: &Expression, prec: u8, out: &mut String) {
    render_operand(l, prec, out);
    out.push(' ');
    out.push_str(op);
    out.push(' ');
    render_operand(r, prec + 1, out);
}

fn render_list<'a>(items: impl Iterator<Item = &'a Expression>, out: &mut String) {
    for (i, item) in items.enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        render(item, out);
    }
}

fn render(expr: &Expression, out: &mut String) {
    match expr {
        Expression::Ternary(c, a, b) => {
            render_operand(c, PREC_TERNARY + 1, out);
            out.push_str(" ? ");
            render_operand(a, PREC_TERNARY + 1, out);
            out.push_str(" : ");
            render_operand(b, PREC_TERNARY, out);
        }
        Expression::Or(l, r) => render_binary(l, "||", r, PREC_OR, out),
        Expression::And(l, r) => render_binary(l, "&&", r, PREC_AND, out),
        Expression::Relation(l, op, r) => {
            let op = match op {
                RelationOp::LessThan => "<",
                RelationOp::LessThanEq => "<=",
                RelationOp::GreaterThan => ">",
                RelationOp::GreaterThanEq => ">=",
                RelationOp::Equals => "==",
                RelationOp::NotEquals => "!=",
                RelationOp::In => "in",
            };
            render_binary(l, op, r, PREC_RELATION, out);
        }
        Expression::Arithmetic(l, op, r) => {
            let (op, prec) = match op {
                ArithmeticOp::Add => ("+", PREC_ADD),
                ArithmeticOp::Subtract => ("-", PREC_ADD),
                ArithmeticOp::Multiply => ("*", PREC_MUL),
                ArithmeticOp::Divide => ("/", PREC_MUL),
                ArithmeticOp::Modulus => ("%", PREC_MUL),
            };
            render_binary(l, op, r, prec, out);
        }
        Expression::Unary(op, e) => {
            out.push_str(match op {
                UnaryOp::Not => "!",
                UnaryOp::DoubleNot => "!!",
                UnaryOp::Minus => "-",
                UnaryOp::DoubleMinus => "--",
            });
            render_operand(e, PREC_UNARY, out);
        }
        Expression::Member(target, member) => {
            render_operand(target, PREC_PRIMARY, out);
            match member.as_ref() {
                Member::Attribute(name) => {
                    out.push('.');
                    out.push_str(name);
                }
                Member::Index(index) => {
                    out.push('[');
                    render(index, out);
                    out.push(']');
                }
                Member::Fields(fields) => {
                    out.push('{');
                    for (i, (name, value)) in fields.iter().enumerate() {
                        if i > 0 {
                            out.push_str(", ");
                        }
                        out.push_str(name);
                        out.push_str(": ");
                        render(value, out);
                    }
                    out.push('}');
                }
            }
        }
        Expression::FunctionCall(func, target, args) => {
            if let Some(target) = target {
                render_operand(target, PREC_PRIMARY, out);
                out.push('.');
            }
            render(func, out);
            out.push('(');
            render_list(args.iter(), out);
            out.push(')');
        }
        Expression::List(items) => {
            out.push('[');
            render_list(items.iter(), out);
            out.push(']');
        }
        Expression::Map(entries) => {
            out.push('{');
            for (i, (k, v)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                render(k, out);
                out.push_str(": ");
                render(v, out);
            }
            out.push('}');
        }
        Expression::Atom(atom) => render_atom(atom, out),
        Expression::Ident(name) => out.push_str(name),
    }
}

fn render_atom(atom: &Atom, out: &mut String) {
    match atom {
        Atom::Int(i) => out.push_str(&i.to_string()),
        Atom::UInt(u) => {
            out.push_str(&u.to_string());
            out.push('u');
        }
        Atom::Float(f) => out.push_str(&format!("{f:?}")),
        Atom::String(s) => push_quoted(s.chars(), out),
        Atom::Bytes(b) => {
            out.push('b');
            push_quoted_bytes(b, out);
        }
        Atom::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Atom::Null => out.push_str("null"),
    }
}

fn push_quoted(chars: impl Iterator<Item = char>, out: &mut String) {
    out.push('"');
    for c in chars {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Bytes outside printable ASCII are written as `\xNN` so that re-parsing
/// yields the same bytes rather than their UTF-8 encoding.
fn push_quoted_bytes(bytes: &[u8], out: &mut String) {
    out.push('"');
    for &byte in bytes {
        match byte {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            0x20..=0x7e => out.push(char::from(byte)),
            _ => out.push_str(&format!("\\x{byte:02x}")),
        }
    }
    out.push('"');
}
