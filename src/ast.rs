//! Abstract syntax tree for CybroScript.
//!
//! The node set is closed: every stage (resolver, interpreter, printer)
//! dispatches with a `match` over [`Expr`] and [`Stmt`].  Nodes are immutable
//! once the parser builds them.
//!
//! Nodes whose binding the resolver records (variable reads, assignments,
//! `this`, `super`) carry a [`NodeId`].  The id is only a key into side tables
//! such as [`crate::resolver::Locals`]; it never owns or points at anything.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::token::Token;

static NEXT_NODE_ID: AtomicUsize = AtomicUsize::new(0);

/// Process‑unique identity of an AST node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Allocate an id no other node in this process has.
    pub fn fresh() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A **literal constant** that appears directly in the source code.
///
/// The parser copies the value out of the token so the tree does not depend
/// on the token stream.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    /// Numeric literal ‑ stored as IEEE‑754 `f64`.
    Number(f64),

    /// String literal without surrounding quotes.
    Str(String),

    True,

    False,

    Nil,
}

/// Every kind of *expression*.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A literal constant: number, string, `true`, `false`, or `nil`.
    Literal(LiteralValue),

    /// Prefix unary operator expression: `!ready`, `-42`.
    Unary {
        /// The operator token (`!` or `-`).
        operator: Token,
        right: Box<Expr>,
    },

    /// Infix arithmetic, comparison or equality: `a + b`, `x ~ y`.
    Binary {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },

    /// Parenthesised sub‑expression.
    Grouping(Box<Expr>),

    /// Variable access.
    Variable { id: NodeId, name: Token },

    /// Assignment to a variable: `name = value`.
    Assign {
        id: NodeId,
        name: Token,
        value: Box<Expr>,
    },

    /// Short‑circuiting `and` / `or`.
    Logical {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },

    /// Call expression: `clock()`, `add(1, 2)`.
    Call {
        callee: Box<Expr>,
        /// The closing `)` token ‑ retained for error reporting.
        paren: Token,
        arguments: Vec<Expr>,
    },

    /// object.property
    Get { object: Box<Expr>, name: Token },

    /// object.property = value
    Set {
        object: Box<Expr>,
        name: Token,
        value: Box<Expr>,
    },

    /// `super.method`
    Super {
        id: NodeId,
        keyword: Token,
        method: Token,
    },

    /// The implicit receiver inside a method.
    This { id: NodeId, keyword: Token },
}

/// A named function or method: `name(params) { body }`.
///
/// Shared behind `Rc` so every closure created from the same declaration
/// points at one body.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: Token,

    /// Parameter name tokens.
    pub params: Vec<Token>,

    pub body: Vec<Stmt>,
}

/// Every kind of *statement*.  A program is a `Vec<Stmt>`.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Stand‑alone expression terminated by a semicolon.
    Expression(Expr),

    /// `print value;`
    Print(Expr),

    /// `var name (= initializer)?;`
    Var {
        name: Token,
        initializer: Option<Expr>,
    },

    /// `let name = initializer;` ‑ single assignment.
    Let { name: Token, initializer: Expr },

    /// Braced scope containing zero or more declarations/statements.
    Block(Vec<Stmt>),

    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },

    /// `while` loop.  `for` loops are desugared into this.
    While { condition: Expr, body: Box<Stmt> },

    /// Function declaration.
    Function(Rc<FunctionDecl>),

    /// `return value?;`
    Return {
        /// The `return` keyword token (for error locations).
        keyword: Token,

        /// Absent ⇒ `nil` is returned.
        value: Option<Expr>,
    },

    /// `break;` ‑ leaves the innermost loop.
    Break { keyword: Token },

    /// `class Name (< Superclass)? { methods }`
    Class {
        name: Token,

        /// Always an [`Expr::Variable`] when present.
        superclass: Option<Expr>,

        methods: Vec<Rc<FunctionDecl>>,
    },
}
