//! Static resolver pass for CybroScript.
//!
//! This resolver does three things in one AST walk:
//! 1. Build lexical scopes (stack of `HashMap<String, bool>` tracking
//!    declared/defined), mirroring the scopes the interpreter will create.
//! 2. Report static errors (misplaced `return`/`break`/`this`/`super`,
//!    redeclaration, self‑inheritance) and warnings (reading a local in its
//!    own initializer).  The walk never stops early; every problem is
//!    collected.
//! 3. Record, for each variable occurrence, how many scopes up its binding
//!    lives.  Occurrences missing from the table are globals.
//!
//! The result is returned by value as a [`Resolution`].

use std::collections::HashMap;
use std::rc::Rc;

use log::{debug, info, warn};

use crate::ast::{Expr, FunctionDecl, NodeId, Stmt};
use crate::callable::INITIALIZER;
use crate::error::CybroError;
use crate::token::Token;

/// Hop distance of every locally bound variable occurrence.
pub type Locals = HashMap<NodeId, usize>;

/// Output of a successful resolve pass.
#[derive(Debug, Default)]
pub struct Resolution {
    pub locals: Locals,

    /// Problems that do not prevent execution.
    pub warnings: Vec<CybroError>,
}

/// What kind of function body are we in?  Used to validate `return`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
    Initializer,
    Method,
}

/// What kind of class body are we in?  Used to validate `this` and `super`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

pub struct Resolver {
    scopes: Vec<HashMap<String, bool>>, // false=declared, true=defined
    locals: Locals,
    errors: Vec<CybroError>,
    warnings: Vec<CybroError>,
    current_function: FunctionType,
    current_class: ClassType,
    loop_depth: usize,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    pub fn new() -> Self {
        Resolver {
            scopes: Vec::new(),
            locals: HashMap::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
            loop_depth: 0,
        }
    }

    /// Walk all top‑level statements.
    pub fn resolve(mut self, statements: &[Stmt]) -> Result<Resolution, Vec<CybroError>> {
        info!(
            "Beginning resolve pass over {} statement(s)",
            statements.len()
        );

        for stmt in statements {
            self.resolve_stmt(stmt);
        }

        if !self.errors.is_empty() {
            info!("Resolve pass found {} error(s)", self.errors.len());
            return Err(self.errors);
        }

        info!(
            "Resolve pass done: {} local(s), {} warning(s)",
            self.locals.len(),
            self.warnings.len()
        );

        Ok(Resolution {
            locals: self.locals,
            warnings: self.warnings,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statement resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block(statements) => {
                self.begin_scope();
                self.resolve_stmts(statements);
                self.end_scope();
            }

            Stmt::Var { name, initializer } => {
                // declare → resolve initializer → define
                self.declare(name);
                if let Some(expr) = initializer {
                    self.resolve_expr(expr);
                }
                self.define(name);
            }

            Stmt::Let { name, initializer } => {
                self.declare(name);
                self.resolve_expr(initializer);
                self.define(name);
            }

            Stmt::Function(declaration) => {
                // The name is visible inside its own body.
                self.declare(&declaration.name);
                self.define(&declaration.name);
                self.resolve_function(declaration, FunctionType::Function);
            }

            Stmt::Expression(expr) | Stmt::Print(expr) => self.resolve_expr(expr),

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);
                if let Some(else_stmt) = else_branch {
                    self.resolve_stmt(else_stmt);
                }
            }

            Stmt::While { condition, body } => {
                self.resolve_expr(condition);

                self.loop_depth += 1;
                self.resolve_stmt(body);
                self.loop_depth -= 1;
            }

            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    self.error(keyword, "Can't return from top-level code");
                }

                if let Some(expr) = value {
                    if self.current_function == FunctionType::Initializer {
                        self.error(keyword, "Can't return a value from an initializer");
                    }
                    self.resolve_expr(expr);
                }
            }

            Stmt::Break { keyword } => {
                if self.loop_depth == 0 {
                    self.error(keyword, "Can't use 'break' outside of a loop");
                }
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.resolve_class(name, superclass.as_ref(), methods),
        }
    }

    fn resolve_stmts(&mut self, statements: &[Stmt]) {
        for stmt in statements {
            self.resolve_stmt(stmt);
        }
    }

    fn resolve_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Rc<FunctionDecl>],
    ) {
        let enclosing_class: ClassType = self.current_class;
        self.current_class = ClassType::Class;

        self.declare(name);
        self.define(name);

        if let Some(superclass) = superclass {
            if let Expr::Variable {
                name: super_name, ..
            } = superclass
            {
                if super_name.lexeme == name.lexeme {
                    self.error(super_name, "A class can't inherit from itself");
                }
            }

            self.current_class = ClassType::Subclass;
            self.resolve_expr(superclass);

            self.begin_scope();
            self.define_name("super");
        }

        self.begin_scope();
        self.define_name("this");

        for method in methods {
            let kind: FunctionType = if method.name.lexeme == INITIALIZER {
                FunctionType::Initializer
            } else {
                FunctionType::Method
            };

            self.resolve_function(method, kind);
        }

        self.end_scope();

        if superclass.is_some() {
            self.end_scope();
        }

        self.current_class = enclosing_class;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expression resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal(_) => {}

            Expr::Grouping(inner) => self.resolve_expr(inner),

            Expr::Unary { right, .. } => self.resolve_expr(right),

            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }

            Expr::Variable { id, name } => {
                if self.scopes.last().and_then(|scope| scope.get(&name.lexeme)) == Some(&false) {
                    let warning = CybroError::resolve(
                        name,
                        "Can't read local variable in its own initializer",
                    );
                    warn!("{}", warning);
                    self.warnings.push(warning);
                }

                self.resolve_local(*id, name);
            }

            Expr::Assign { id, name, value } => {
                // RHS first, then bind LHS
                self.resolve_expr(value);
                self.resolve_local(*id, name);
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);
                for arg in arguments {
                    self.resolve_expr(arg);
                }
            }

            Expr::Get { object, .. } => self.resolve_expr(object),

            Expr::Set { object, value, .. } => {
                self.resolve_expr(value);
                self.resolve_expr(object);
            }

            Expr::This { id, keyword } => {
                if self.current_class == ClassType::None {
                    self.error(keyword, "Can't use 'this' outside of a class");
                    return;
                }

                self.resolve_local(*id, keyword);
            }

            Expr::Super { id, keyword, .. } => {
                match self.current_class {
                    ClassType::None => {
                        self.error(keyword, "Can't use 'super' outside of a class");
                        return;
                    }
                    ClassType::Class => {
                        self.error(keyword, "Can't use 'super' in a class with no superclass");
                        return;
                    }
                    ClassType::Subclass => {}
                }

                self.resolve_local(*id, keyword);
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Function helper
    // ─────────────────────────────────────────────────────────────────────────

    /// One fresh scope for a function's parameters and body.
    fn resolve_function(&mut self, declaration: &FunctionDecl, kind: FunctionType) {
        let enclosing_function: FunctionType = self.current_function;
        let enclosing_loops: usize = self.loop_depth;

        self.current_function = kind;
        self.loop_depth = 0;

        self.begin_scope();
        for param in &declaration.params {
            self.declare(param);
            self.define(param);
        }
        self.resolve_stmts(&declaration.body);
        self.end_scope();

        self.current_function = enclosing_function;
        self.loop_depth = enclosing_loops;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scope management
    // ─────────────────────────────────────────────────────────────────────────

    #[inline]
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    #[inline]
    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &Token) {
        let Some(scope) = self.scopes.last_mut() else {
            return;
        };

        if scope.contains_key(&name.lexeme) {
            self.error(name, "Already a variable with this name in this scope");
            return;
        }

        scope.insert(name.lexeme.clone(), false);
    }

    fn define(&mut self, name: &Token) {
        self.define_name(&name.lexeme);
    }

    fn define_name(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), true);
        }
    }

    fn error(&mut self, token: &Token, message: &str) {
        self.errors.push(CybroError::resolve(token, message));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Binding‑distance helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Record `id` as a local at the innermost scope that has *finished*
    /// defining `name`, or leave it out (global) when there is none.
    fn resolve_local(&mut self, id: NodeId, name: &Token) {
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.get(&name.lexeme) == Some(&true) {
                debug!("Resolved '{}' {} at depth {}", name.lexeme, id, depth);
                self.locals.insert(id, depth);
                return;
            }
        }

        debug!("Resolved '{}' {} as global", name.lexeme, id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::scanner::scan;

    fn resolve_source(src: &str) -> Result<Resolution, Vec<CybroError>> {
        let (tokens, lex_errors) = scan(src);
        assert!(lex_errors.is_empty(), "lex errors: {:?}", lex_errors);

        let program: Vec<Stmt> = Parser::new(&tokens).parse().unwrap();

        Resolver::new().resolve(&program)
    }

    fn messages(src: &str) -> Vec<String> {
        resolve_source(src)
            .unwrap_err()
            .iter()
            .map(CybroError::message)
            .collect()
    }

    #[test]
    fn globals_are_not_recorded() {
        let resolution = resolve_source("var a = 1; print a; a = 2;").unwrap();

        assert!(resolution.locals.is_empty());
        assert!(resolution.warnings.is_empty());
    }

    #[test]
    fn distances_count_scopes_outward() {
        let resolution =
            resolve_source("{ var a = 1; { var b = 2; print a; print b; } }").unwrap();

        let mut depths: Vec<usize> = resolution.locals.values().copied().collect();
        depths.sort();

        assert_eq!(depths, vec![0, 1]);
    }

    #[test]
    fn self_initializer_is_a_warning_and_resolves_outward() {
        let resolution = resolve_source("{ var a = 1; { var a = a + 1; } }").unwrap();

        assert_eq!(resolution.warnings.len(), 1);
        assert!(resolution.warnings[0]
            .message()
            .contains("its own initializer"));

        // The read binds to the outer `a`, one scope up.
        assert_eq!(resolution.locals.values().copied().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn misplaced_control_flow_is_reported() {
        let errors: Vec<String> = messages("return 1; break;");

        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("top-level"));
        assert!(errors[1].contains("'break' outside of a loop"));
    }

    #[test]
    fn break_inside_a_function_inside_a_loop_is_rejected() {
        let errors: Vec<String> = messages("while (true) { fun f() { break; } }");

        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("'break'"));
    }

    #[test]
    fn initializer_cannot_return_a_value() {
        let errors: Vec<String> = messages("class A { init() { return 1; } }");
        assert_eq!(errors, vec!["Can't return a value from an initializer".to_string()]);

        assert!(resolve_source("class A { init() { return; } }").is_ok());
    }

    #[test]
    fn this_and_super_need_a_class() {
        let errors: Vec<String> = messages(
            "print this; print super.x; class A { m() { return super.m(); } }",
        );

        assert_eq!(
            errors,
            vec![
                "Can't use 'this' outside of a class".to_string(),
                "Can't use 'super' outside of a class".to_string(),
                "Can't use 'super' in a class with no superclass".to_string(),
            ]
        );
    }

    #[test]
    fn class_cannot_inherit_from_itself() {
        let errors: Vec<String> = messages("class A < A {}");
        assert_eq!(errors, vec!["A class can't inherit from itself".to_string()]);
    }

    #[test]
    fn local_redeclaration_is_an_error_but_global_is_not() {
        let errors: Vec<String> = messages("{ var a = 1; let a = 2; }");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Already a variable"));

        assert!(resolve_source("var a = 1; var a = 2;").is_ok());
    }

    #[test]
    fn method_bodies_see_this_and_super() {
        let resolution = resolve_source(
            "class A { m() { return 1; } } class B < A { m() { return super.m() + this.x; } }",
        )
        .unwrap();

        // `super` is two scopes out of the method body, `this` one.
        let mut depths: Vec<usize> = resolution.locals.values().copied().collect();
        depths.sort();
        assert_eq!(depths, vec![1, 2]);
    }
}
