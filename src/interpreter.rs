//! Tree‑walking evaluator.
//!
//! Executes statements against a chain of [`Environment`]s rooted at one
//! global scope.  Variable references the resolver bound to a local scope are
//! read with an exact hop count (`get_at`); everything else is global.
//!
//! `return` and `break` are not errors: [`Interpreter::execute`] reports them
//! as a [`Flow`] which calls and loops consume.

use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;

use log::{debug, info};

use crate::ast::{Expr, FunctionDecl, LiteralValue, NodeId, Stmt};
use crate::callable::{Callable, Class, Instance, NativeFn, NativeFunction, UserFunction, INITIALIZER};
use crate::environment::{EnvRef, Environment};
use crate::error::{CybroError, Result};
use crate::resolver::Locals;
use crate::token::{Token, TokenType};
use crate::value::Value;

/// How a statement finished.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    /// Ran to completion; continue with the next statement.
    Normal,

    /// A `return` is unwinding to the nearest call.
    Return(Value),

    /// A `break` is unwinding to the nearest loop.
    Break,
}

pub struct Interpreter {
    globals: EnvRef,
    environment: EnvRef,
    locals: Locals,
    output: Box<dyn Write>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Creates a new Interpreter writing to stdout.
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    /// Creates a new Interpreter writing program output to `output`, and
    /// defines the native functions `clock` and `println`.
    pub fn with_output(output: Box<dyn Write>) -> Self {
        info!("Initializing Interpreter");

        let globals: EnvRef = Environment::new().into_ref();

        let mut interpreter = Self {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            output,
        };

        interpreter.define_native("clock", 0, native_clock);
        interpreter.define_native("println", 1, native_println);

        interpreter
    }

    /// Expose a host function to scripts as a global.
    pub fn define_native(&mut self, name: &str, arity: usize, func: NativeFn) {
        debug!("Defining native function '{}'", name);

        let native = NativeFunction {
            name: name.to_string(),
            arity,
            func,
        };

        self.globals
            .borrow_mut()
            .define_native(name, Value::Native(Rc::new(native)));
    }

    /// Write one line of program output.
    pub fn write_line(&mut self, text: &str) -> Result<()> {
        writeln!(self.output, "{}", text)?;
        Ok(())
    }

    /// Interprets a program.  `locals` is the resolver's table for exactly
    /// these statements; it is merged into the tables of earlier runs.
    pub fn interpret(&mut self, statements: &[Stmt], locals: Locals) -> Result<()> {
        debug!(
            "Interpreting {} statements with {} resolved locals",
            statements.len(),
            locals.len()
        );

        // Never pruned: closures from earlier runs still look up their own ids.
        self.locals.extend(locals);

        let result: Result<()> = statements.iter().try_for_each(|stmt| {
            // The resolver rejects top‑level `return` and `break`.
            self.execute(stmt).map(|_| ())
        });

        self.output.flush()?;

        if result.is_ok() {
            info!("Interpretation completed successfully");
        }

        result
    }

    /// Executes a single statement.
    pub fn execute(&mut self, stmt: &Stmt) -> Result<Flow> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(Flow::Normal)
            }

            Stmt::Print(expr) => {
                let value: Value = self.evaluate(expr)?;
                self.write_line(&value.to_string())?;
                Ok(Flow::Normal)
            }

            Stmt::Var { name, initializer } => {
                let value: Value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                debug!("Defining variable '{}' = {}", name.lexeme, value);

                self.environment.borrow_mut().define(name, value)?;
                Ok(Flow::Normal)
            }

            Stmt::Let { name, initializer } => {
                let value: Value = self.evaluate(initializer)?;

                debug!("Defining constant '{}' = {}", name.lexeme, value);

                self.environment.borrow_mut().define_immutable(name, value)?;
                Ok(Flow::Normal)
            }

            Stmt::Block(statements) => {
                let env: EnvRef = Environment::with_enclosing(Rc::clone(&self.environment)).into_ref();
                self.execute_block(statements, env)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_stmt) = else_branch {
                    self.execute(else_stmt)
                } else {
                    Ok(Flow::Normal)
                }
            }

            Stmt::While { condition, body } => {
                debug!("Entering while loop");

                while self.evaluate(condition)?.is_truthy() {
                    match self.execute(body)? {
                        Flow::Normal => {}
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                    }
                }

                debug!("Exited while loop");
                Ok(Flow::Normal)
            }

            Stmt::Function(declaration) => {
                debug!("Defining function '{}'", declaration.name.lexeme);

                let function = UserFunction::new(
                    Rc::clone(declaration),
                    Rc::clone(&self.environment),
                    false,
                );

                self.environment
                    .borrow_mut()
                    .define(&declaration.name, Value::Function(Rc::new(function)))?;
                Ok(Flow::Normal)
            }

            Stmt::Return { value, .. } => {
                let value: Value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                debug!("Returning value: {}", value);
                Ok(Flow::Return(value))
            }

            Stmt::Break { .. } => Ok(Flow::Break),

            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.execute_class(name, superclass.as_ref(), methods),
        }
    }

    /// Run `statements` in `env`, restoring the current scope afterwards on
    /// every path (normal, `return`, `break`, error).
    pub fn execute_block(&mut self, statements: &[Stmt], env: EnvRef) -> Result<Flow> {
        let previous: EnvRef = std::mem::replace(&mut self.environment, env);

        let mut result: Result<Flow> = Ok(Flow::Normal);

        for stmt in statements {
            match self.execute(stmt) {
                Ok(Flow::Normal) => {}
                other => {
                    result = other;
                    break;
                }
            }
        }

        self.environment = previous;
        result
    }

    fn execute_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Rc<FunctionDecl>],
    ) -> Result<Flow> {
        debug!("Defining class '{}'", name.lexeme);

        let superclass: Option<Rc<Class>> = match superclass {
            Some(expr) => match self.evaluate(expr)? {
                Value::Class(class) => Some(class),
                _ => {
                    let location: &Token = match expr {
                        Expr::Variable { name, .. } => name,
                        _ => name,
                    };

                    return Err(CybroError::runtime(location, "Superclass must be a class"));
                }
            },
            None => None,
        };

        // Declared first so methods can refer to the class by name.
        self.environment.borrow_mut().define(name, Value::Nil)?;

        let method_env: EnvRef = match &superclass {
            Some(superclass) => {
                let mut env = Environment::with_enclosing(Rc::clone(&self.environment));
                env.define_native("super", Value::Class(Rc::clone(superclass)));
                env.into_ref()
            }
            None => Rc::clone(&self.environment),
        };

        let methods: HashMap<String, Rc<UserFunction>> = methods
            .iter()
            .map(|method| {
                let is_initializer: bool = method.name.lexeme == INITIALIZER;
                let function =
                    UserFunction::new(Rc::clone(method), Rc::clone(&method_env), is_initializer);

                (method.name.lexeme.clone(), Rc::new(function))
            })
            .collect();

        let class = Class::new(name.lexeme.clone(), superclass, methods);

        self.environment
            .borrow_mut()
            .assign(name, Value::Class(Rc::new(class)))?;

        info!("Class '{}' defined", name.lexeme);
        Ok(Flow::Normal)
    }

    /// Evaluates an expression and returns a Value.
    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::String(s.clone()),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => self.evaluate_unary(operator, right),

            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left_val: Value = self.evaluate(left)?;

                let decided: bool = match operator.token_type {
                    TokenType::OR => left_val.is_truthy(),
                    _ => !left_val.is_truthy(),
                };

                if decided {
                    Ok(left_val)
                } else {
                    self.evaluate(right)
                }
            }

            Expr::Variable { id, name } => self.look_up_variable(*id, name),

            Expr::Assign { id, name, value } => {
                let value: Value = self.evaluate(value)?;

                match self.locals.get(id) {
                    Some(&distance) => {
                        Environment::assign_at(&self.environment, distance, name, value.clone())?
                    }
                    None => self.globals.borrow_mut().assign(name, value.clone())?,
                }

                debug!("Assigned {} to '{}'", value, name.lexeme);
                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee_val: Value = self.evaluate(callee)?;

                let mut arg_values: Vec<Value> = Vec::with_capacity(arguments.len());
                for arg in arguments {
                    arg_values.push(self.evaluate(arg)?);
                }

                self.invoke_callable(&callee_val, paren, arg_values)
            }

            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => Instance::get(&instance, name),
                other => Err(CybroError::runtime(
                    name,
                    format!("Only instances have properties, got {}", other.type_name()),
                )),
            },

            Expr::Set {
                object,
                name,
                value,
            } => {
                let Value::Instance(instance) = self.evaluate(object)? else {
                    return Err(CybroError::runtime(name, "Only instances have fields"));
                };

                let value: Value = self.evaluate(value)?;
                instance.borrow_mut().set(name, value.clone());
                Ok(value)
            }

            Expr::This { id, keyword } => self.look_up_variable(*id, keyword),

            Expr::Super {
                id,
                keyword,
                method,
            } => self.evaluate_super(*id, keyword, method),
        }
    }

    /// Evaluates a unary expression.
    fn evaluate_unary(&mut self, op: &Token, expr: &Expr) -> Result<Value> {
        let right_val: Value = self.evaluate(expr)?;

        match op.token_type {
            TokenType::MINUS => match right_val {
                Value::Number(n) => Ok(Value::Number(-n)),
                _ => Err(CybroError::runtime(op, "Operand must be a number")),
            },
            TokenType::BANG => Ok(Value::Bool(!right_val.is_truthy())),
            _ => Err(CybroError::runtime(op, "Invalid unary operator")),
        }
    }

    /// Evaluates a binary expression.
    fn evaluate_binary(&mut self, left: &Expr, op: &Token, right: &Expr) -> Result<Value> {
        let left_val: Value = self.evaluate(left)?;
        let right_val: Value = self.evaluate(right)?;

        debug!(
            "Binary '{}': left={}, right={}",
            op.lexeme, left_val, right_val
        );

        match op.token_type {
            TokenType::PLUS => match (left_val, right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (a, b) => Ok(Value::String(format!("{}{}", a, b))),
            },
            TokenType::EQUAL_EQUAL => Ok(Value::Bool(left_val == right_val)),
            TokenType::BANG_EQUAL => Ok(Value::Bool(left_val != right_val)),
            _ => {
                let (Value::Number(a), Value::Number(b)) = (&left_val, &right_val) else {
                    return Err(CybroError::runtime(
                        op,
                        format!(
                            "Operands must be numbers, got {} and {}",
                            left_val.type_name(),
                            right_val.type_name()
                        ),
                    ));
                };

                let (a, b) = (*a, *b);

                match op.token_type {
                    TokenType::MINUS => Ok(Value::Number(a - b)),
                    TokenType::STAR => Ok(Value::Number(a * b)),
                    TokenType::SLASH => Ok(Value::Number(a / b)),
                    TokenType::MIN => Ok(Value::Number(a.min(b))),
                    TokenType::MAX => Ok(Value::Number(a.max(b))),
                    TokenType::LESS => Ok(Value::Bool(a < b)),
                    TokenType::LESS_EQUAL => Ok(Value::Bool(a <= b)),
                    TokenType::GREATER => Ok(Value::Bool(a > b)),
                    TokenType::GREATER_EQUAL => Ok(Value::Bool(a >= b)),
                    _ => Err(CybroError::runtime(op, "Invalid binary operator")),
                }
            }
        }
    }

    fn evaluate_super(&mut self, id: NodeId, keyword: &Token, method: &Token) -> Result<Value> {
        let Some(&distance) = self.locals.get(&id) else {
            return Err(CybroError::runtime(keyword, "Can't use 'super' here"));
        };

        let Value::Class(superclass) = Environment::get_at(&self.environment, distance, keyword)?
        else {
            return Err(CybroError::runtime(keyword, "'super' is not a class"));
        };

        // `this` always sits one scope inside `super`.
        let this_token = Token::synthetic(TokenType::THIS, "this", keyword.line);
        let Value::Instance(instance) =
            Environment::get_at(&self.environment, distance.saturating_sub(1), &this_token)?
        else {
            return Err(CybroError::runtime(keyword, "'this' is not an instance"));
        };

        match superclass.find_method(&method.lexeme) {
            Some(found) => Ok(Value::Function(Rc::new(found.bind(instance)))),
            None => Err(CybroError::runtime(
                method,
                format!("Undefined property '{}'", method.lexeme),
            )),
        }
    }

    fn look_up_variable(&self, id: NodeId, name: &Token) -> Result<Value> {
        match self.locals.get(&id) {
            Some(&distance) => Environment::get_at(&self.environment, distance, name),
            None => self.globals.borrow().get(name),
        }
    }

    /// Invokes a callable (native function, user function or class).
    fn invoke_callable(
        &mut self,
        callee_val: &Value,
        paren_token: &Token,
        arg_values: Vec<Value>,
    ) -> Result<Value> {
        let Some(callable): Option<&dyn Callable> = callee_val.as_callable() else {
            return Err(CybroError::runtime(
                paren_token,
                format!(
                    "Can only call functions and classes, got {}",
                    callee_val.type_name()
                ),
            ));
        };

        if arg_values.len() != callable.arity() {
            return Err(CybroError::runtime(
                paren_token,
                format!(
                    "Expected {} arguments but got {}",
                    callable.arity(),
                    arg_values.len()
                ),
            ));
        }

        let result: Value = callable.call(self, arg_values)?;

        debug!("Call to {} returned: {}", callee_val, result);
        Ok(result)
    }
}

/// `clock()` ‑ seconds since the Unix epoch.
fn native_clock(_interpreter: &mut Interpreter, _args: &[Value]) -> Result<Value> {
    let now = chrono::Utc::now();
    let seconds: f64 = now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1e6;

    Ok(Value::Number(seconds))
}

/// `println(value)` ‑ write the display form of `value`.  Callables print
/// their signature; they are never invoked.
fn native_println(interpreter: &mut Interpreter, args: &[Value]) -> Result<Value> {
    let text: String = args.first().map_or_else(|| "nil".to_string(), Value::to_string);

    interpreter.write_line(&text)?;

    Ok(Value::Nil)
}
