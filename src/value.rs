use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::callable::{Callable, Class, Instance, NativeFunction, UserFunction};

/// A dynamically typed runtime value.
///
/// Heap objects (functions, classes, instances) are shared through `Rc`;
/// cloning a `Value` never copies an object.
#[derive(Debug, Clone)]
pub enum Value {
    Native(Rc<NativeFunction>),
    Function(Rc<UserFunction>),
    Class(Rc<Class>),
    Instance(Rc<RefCell<Instance>>),
    Number(f64),
    String(String),
    Bool(bool),
    Nil,
}

impl Value {
    /// Truthiness: `nil` and `false` are false, so are the strings
    /// `false`/`False`/`FALSE` and the number zero.  Everything else is true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::String(s) => !matches!(s.as_str(), "false" | "False" | "FALSE"),
            Value::Number(n) => *n != 0.0,
            _ => true,
        }
    }

    /// The value as something that can be called, if it is one.
    pub fn as_callable(&self) -> Option<&dyn Callable> {
        match self {
            Value::Native(native) => Some(native.as_ref()),
            Value::Function(function) => Some(function.as_ref()),
            Value::Class(class) => Some(class),
            _ => None,
        }
    }

    /// Short type name for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Native(_) | Value::Function(_) => "function",
            Value::Class(_) => "class",
            Value::Instance(_) => "instance",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Bool(_) => "boolean",
            Value::Nil => "nil",
        }
    }
}

/// Strict equality: values of different types are never equal; objects
/// compare by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Native(native) => write!(f, "<native fn {}>", native.name),

            Value::Function(function) => {
                write!(f, "<fn {}/{}>", function.name(), function.arity())
            }

            Value::Class(class) => write!(f, "{}", class.name),

            Value::Instance(instance) => write!(f, "{} instance", instance.borrow().class_name()),

            Value::Number(n) => {
                if n.fract() == 0.0 {
                    write!(f, "{:.0}", n)
                } else {
                    write!(f, "{}", n)
                }
            }

            Value::String(s) => write!(f, "{}", s),

            Value::Bool(b) => write!(f, "{}", b),

            Value::Nil => write!(f, "nil"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_numbers_display_without_fraction() {
        assert_eq!(Value::Number(3.0).to_string(), "3");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
        assert_eq!(Value::Number(-4.0).to_string(), "-4");
        assert_eq!(Value::Number(1.0 / 0.0).to_string(), "inf");
    }

    #[test]
    fn truthiness_table() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Bool(true).is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(Value::Number(-1.5).is_truthy());
        assert!(!Value::String("false".into()).is_truthy());
        assert!(!Value::String("FALSE".into()).is_truthy());
        assert!(Value::String("true".into()).is_truthy());
        assert!(Value::String("".into()).is_truthy());
    }

    #[test]
    fn equality_is_strict_across_types() {
        assert_eq!(Value::Nil, Value::Nil);
        assert_eq!(Value::Number(1.0), Value::Number(1.0));
        assert_ne!(Value::Number(1.0), Value::String("1".into()));
        assert_ne!(Value::Nil, Value::Bool(false));
        assert_ne!(Value::Number(f64::NAN), Value::Number(f64::NAN));
    }
}
