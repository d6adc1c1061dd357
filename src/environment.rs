//! Runtime scope chain.
//!
//! Each scope maps names to bindings and links to the scope it was created
//! in.  Scopes are shared through `Rc<RefCell<_>>`: a closure that captures a
//! scope keeps it (and its ancestors) alive.  Links only ever point towards
//! the global scope.  A function stored in the scope it closes over forms an
//! `Rc` cycle; such scopes live until the process exits.

use crate::error::{CybroError, Result};
use crate::token::Token;
use crate::value::Value;
use log::debug;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Shared handle to a scope.
pub type EnvRef = Rc<RefCell<Environment>>;

#[derive(Debug, Clone)]
struct Binding {
    value: Value,
    mutable: bool,
}

#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Binding>,
    enclosing: Option<EnvRef>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: EnvRef) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Wrap in a shared handle.
    pub fn into_ref(self) -> EnvRef {
        Rc::new(RefCell::new(self))
    }

    /// Bind a mutable (`var`) name in this scope.
    pub fn define(&mut self, name: &Token, value: Value) -> Result<()> {
        self.insert(name, value, true)
    }

    /// Bind a single‑assignment (`let`) name in this scope.
    pub fn define_immutable(&mut self, name: &Token, value: Value) -> Result<()> {
        self.insert(name, value, false)
    }

    /// Bind a host‑provided global, replacing any previous binding.
    pub fn define_native(&mut self, name: &str, value: Value) {
        self.values.insert(
            name.to_string(),
            Binding {
                value,
                mutable: true,
            },
        );
    }

    fn insert(&mut self, name: &Token, value: Value, mutable: bool) -> Result<()> {
        if self.values.contains_key(&name.lexeme) {
            return Err(CybroError::runtime(
                name,
                format!("Variable '{}' is already declared in this scope", name.lexeme),
            ));
        }

        debug!("Defining '{}' (mutable={})", name.lexeme, mutable);

        self.values.insert(name.lexeme.clone(), Binding { value, mutable });

        Ok(())
    }

    /// Look `name` up, walking outward through enclosing scopes.
    pub fn get(&self, name: &Token) -> Result<Value> {
        if let Some(binding) = self.values.get(&name.lexeme) {
            Ok(binding.value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name)
        } else {
            Err(undefined(name))
        }
    }

    /// Reassign an existing binding, walking outward through enclosing scopes.
    pub fn assign(&mut self, name: &Token, value: Value) -> Result<()> {
        if let Some(binding) = self.values.get_mut(&name.lexeme) {
            return store(binding, name, value);
        }

        match &self.enclosing {
            Some(enclosing) => enclosing.borrow_mut().assign(name, value),
            None => Err(undefined(name)),
        }
    }

    /// The scope `distance` links up the chain from `env` (0 is `env`).
    pub fn ancestor(env: &EnvRef, distance: usize) -> EnvRef {
        let mut current: EnvRef = Rc::clone(env);

        for _ in 0..distance {
            let next: Option<EnvRef> = current.borrow().enclosing.clone();

            match next {
                Some(next) => current = next,
                None => break,
            }
        }

        current
    }

    /// Read `name` from exactly the scope `distance` hops up.
    pub fn get_at(env: &EnvRef, distance: usize, name: &Token) -> Result<Value> {
        let scope: EnvRef = Self::ancestor(env, distance);
        let scope = scope.borrow();

        scope
            .values
            .get(&name.lexeme)
            .map(|binding| binding.value.clone())
            .ok_or_else(|| undefined(name))
    }

    /// Reassign `name` in exactly the scope `distance` hops up.
    pub fn assign_at(env: &EnvRef, distance: usize, name: &Token, value: Value) -> Result<()> {
        let scope: EnvRef = Self::ancestor(env, distance);
        let mut scope = scope.borrow_mut();

        match scope.values.get_mut(&name.lexeme) {
            Some(binding) => store(binding, name, value),
            None => Err(undefined(name)),
        }
    }
}

fn store(binding: &mut Binding, name: &Token, value: Value) -> Result<()> {
    if !binding.mutable {
        return Err(CybroError::runtime(
            name,
            format!("Cannot assign to constant '{}'", name.lexeme),
        ));
    }

    binding.value = value;

    Ok(())
}

fn undefined(name: &Token) -> CybroError {
    CybroError::runtime(name, format!("Undefined variable '{}'", name.lexeme))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenType;

    fn ident(name: &str) -> Token {
        Token::new(TokenType::IDENTIFIER, name, 1)
    }

    #[test]
    fn define_rejects_redeclaration_in_same_scope() {
        let mut env = Environment::new();

        env.define(&ident("a"), Value::Number(1.0)).unwrap();

        assert!(env.define(&ident("a"), Value::Number(2.0)).is_err());
        assert!(env.define_immutable(&ident("a"), Value::Nil).is_err());
    }

    #[test]
    fn immutable_binding_rejects_assignment() {
        let mut env = Environment::new();

        env.define_immutable(&ident("k"), Value::Number(1.0)).unwrap();

        let err = env.assign(&ident("k"), Value::Number(2.0)).unwrap_err();
        assert!(err.message().contains("constant"));
        assert_eq!(env.get(&ident("k")).unwrap(), Value::Number(1.0));
    }

    #[test]
    fn assign_walks_outward() {
        let global: EnvRef = Environment::new().into_ref();
        global
            .borrow_mut()
            .define(&ident("x"), Value::Number(1.0))
            .unwrap();

        let inner: EnvRef = Environment::with_enclosing(Rc::clone(&global)).into_ref();
        inner
            .borrow_mut()
            .assign(&ident("x"), Value::Number(5.0))
            .unwrap();

        assert_eq!(global.borrow().get(&ident("x")).unwrap(), Value::Number(5.0));
        assert!(inner.borrow().get(&ident("missing")).is_err());
    }

    #[test]
    fn indexed_access_skips_shadowing_scopes() {
        let outer: EnvRef = Environment::new().into_ref();
        outer
            .borrow_mut()
            .define(&ident("v"), Value::String("outer".into()))
            .unwrap();

        let inner: EnvRef = Environment::with_enclosing(Rc::clone(&outer)).into_ref();
        inner
            .borrow_mut()
            .define(&ident("v"), Value::String("inner".into()))
            .unwrap();

        assert_eq!(
            Environment::get_at(&inner, 1, &ident("v")).unwrap(),
            Value::String("outer".into())
        );

        Environment::assign_at(&inner, 1, &ident("v"), Value::Nil).unwrap();

        assert_eq!(outer.borrow().get(&ident("v")).unwrap(), Value::Nil);
        assert_eq!(
            Environment::get_at(&inner, 0, &ident("v")).unwrap(),
            Value::String("inner".into())
        );
    }
}
