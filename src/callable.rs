//! Callable objects: native functions, user functions (closures), classes,
//! and the instances classes produce.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use log::debug;

use crate::ast::FunctionDecl;
use crate::environment::{EnvRef, Environment};
use crate::error::{CybroError, Result};
use crate::interpreter::{Flow, Interpreter};
use crate::token::{Token, TokenType};
use crate::value::Value;

/// Name of the method run when a class is called.
pub const INITIALIZER: &str = "init";

/// Anything that can appear before `(...)`.
pub trait Callable {
    /// Exact number of arguments the callable accepts.
    fn arity(&self) -> usize;

    /// Invoke with already evaluated arguments.  The interpreter has checked
    /// `arguments.len() == self.arity()`.
    fn call(&self, interpreter: &mut Interpreter, arguments: Vec<Value>) -> Result<Value>;
}

/// Host implementation of a native function.
pub type NativeFn = fn(&mut Interpreter, &[Value]) -> Result<Value>;

/// A function implemented in Rust and exposed to scripts.
pub struct NativeFunction {
    pub name: String,
    pub arity: usize,
    pub func: NativeFn,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFunction({}/{})", self.name, self.arity)
    }
}

impl Callable for NativeFunction {
    fn arity(&self) -> usize {
        self.arity
    }

    fn call(&self, interpreter: &mut Interpreter, arguments: Vec<Value>) -> Result<Value> {
        debug!("Calling native function '{}'", self.name);
        (self.func)(interpreter, &arguments)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// User functions
// ─────────────────────────────────────────────────────────────────────────────

/// A function declaration paired with the scope it was declared in.
pub struct UserFunction {
    declaration: Rc<FunctionDecl>,
    closure: EnvRef,
    is_initializer: bool,
}

impl fmt::Debug for UserFunction {
    // The closure may (indirectly) contain this function; print the name only.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserFunction({})", self.declaration.name.lexeme)
    }
}

impl UserFunction {
    pub fn new(declaration: Rc<FunctionDecl>, closure: EnvRef, is_initializer: bool) -> Self {
        Self {
            declaration,
            closure,
            is_initializer,
        }
    }

    pub fn name(&self) -> &str {
        &self.declaration.name.lexeme
    }

    /// A copy of this method whose closure defines `this` as `instance`.
    pub fn bind(&self, instance: Rc<RefCell<Instance>>) -> UserFunction {
        let mut env: Environment = Environment::with_enclosing(Rc::clone(&self.closure));
        env.define_native("this", Value::Instance(instance));

        UserFunction {
            declaration: Rc::clone(&self.declaration),
            closure: env.into_ref(),
            is_initializer: self.is_initializer,
        }
    }

    fn this_token(&self) -> Token {
        Token::synthetic(TokenType::THIS, "this", self.declaration.name.line)
    }
}

impl Callable for UserFunction {
    fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    fn call(&self, interpreter: &mut Interpreter, arguments: Vec<Value>) -> Result<Value> {
        debug!("Calling user-defined function '{}'", self.name());

        // Chained to the *captured* scope, not the caller's.
        let mut env: Environment = Environment::with_enclosing(Rc::clone(&self.closure));

        for (param, argument) in self.declaration.params.iter().zip(arguments) {
            env.define(param, argument)?;
        }

        let flow: Flow = interpreter.execute_block(&self.declaration.body, env.into_ref())?;

        if self.is_initializer {
            return Environment::get_at(&self.closure, 0, &self.this_token());
        }

        match flow {
            Flow::Return(value) => Ok(value),
            Flow::Normal | Flow::Break => Ok(Value::Nil),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Classes and instances
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Class {
    pub name: String,
    superclass: Option<Rc<Class>>,
    methods: HashMap<String, Rc<UserFunction>>,
}

impl Class {
    pub fn new(
        name: String,
        superclass: Option<Rc<Class>>,
        methods: HashMap<String, Rc<UserFunction>>,
    ) -> Self {
        Self {
            name,
            superclass,
            methods,
        }
    }

    /// Own methods first, then up the superclass chain.
    pub fn find_method(&self, name: &str) -> Option<Rc<UserFunction>> {
        if let Some(method) = self.methods.get(name) {
            return Some(Rc::clone(method));
        }

        self.superclass
            .as_ref()
            .and_then(|superclass| superclass.find_method(name))
    }
}

impl Callable for Rc<Class> {
    fn arity(&self) -> usize {
        self.find_method(INITIALIZER)
            .map_or(0, |initializer| initializer.arity())
    }

    fn call(&self, interpreter: &mut Interpreter, arguments: Vec<Value>) -> Result<Value> {
        debug!("Instantiating class '{}'", self.name);

        let instance: Rc<RefCell<Instance>> = Rc::new(RefCell::new(Instance::new(Rc::clone(self))));

        if let Some(initializer) = self.find_method(INITIALIZER) {
            initializer
                .bind(Rc::clone(&instance))
                .call(interpreter, arguments)?;
        }

        Ok(Value::Instance(instance))
    }
}

pub struct Instance {
    class: Rc<Class>,
    fields: HashMap<String, Value>,
}

impl fmt::Debug for Instance {
    // Fields may refer back to the instance itself.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut fields: Vec<&String> = self.fields.keys().collect();
        fields.sort();

        write!(f, "Instance({} {:?})", self.class.name, fields)
    }
}

impl Instance {
    pub fn new(class: Rc<Class>) -> Self {
        Self {
            class,
            fields: HashMap::new(),
        }
    }

    pub fn class_name(&self) -> &str {
        &self.class.name
    }

    /// Field if present, else a method bound to `instance`.
    pub fn get(instance: &Rc<RefCell<Instance>>, name: &Token) -> Result<Value> {
        if let Some(value) = instance.borrow().fields.get(&name.lexeme) {
            return Ok(value.clone());
        }

        let class: Rc<Class> = Rc::clone(&instance.borrow().class);

        match class.find_method(&name.lexeme) {
            Some(method) => Ok(Value::Function(Rc::new(method.bind(Rc::clone(instance))))),
            None => Err(CybroError::runtime(
                name,
                format!("Undefined property '{}'", name.lexeme),
            )),
        }
    }

    pub fn set(&mut self, name: &Token, value: Value) {
        self.fields.insert(name.lexeme.clone(), value);
    }
}
