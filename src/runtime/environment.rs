use crate::runtime::{
    error::{RuntimeError, RuntimeResult},
    value::Value,
};
use std::{
    cell::RefCell,
    collections::HashMap,
    rc::Rc,
};

#[derive(Clone)]
struct Binding {
    cell: Rc<RefCell<Value>>,
    mutable: bool,
}

/// One lexical scope. Scopes form a chain through `parent`, and closures keep
/// the chain they were created in alive.
#[derive(Default)]
pub struct Activation {
    bindings: RefCell<HashMap<String, Binding>>,
    parent: Option<Rc<Activation>>,
}

impl Activation {
    pub fn root() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn child(parent: Rc<Activation>) -> Rc<Self> {
        Rc::new(Self {
            bindings: RefCell::default(),
            parent: Some(parent),
        })
    }

    fn find(&self, name: &str) -> Option<Binding> {
        if let Some(binding) = self.bindings.borrow().get(name) {
            return Some(binding.clone());
        }
        self.parent.as_ref().and_then(|parent| parent.find(name))
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        self.find(name).map(|binding| binding.cell.borrow().clone())
    }

    pub fn declare(&self, name: &str, value: Value, mutable: bool) {
        self.bindings.borrow_mut().insert(
            name.to_string(),
            Binding {
                cell: Rc::new(RefCell::new(value)),
                mutable,
            },
        );
    }
}

/// The scope chain the interpreter is currently executing in.
pub struct Environment {
    current: Rc<Activation>,
}

impl Environment {
    pub fn new(root: Rc<Activation>) -> Self {
        Self { current: root }
    }

    pub fn push_scope(&mut self) {
        self.current = Activation::child(Rc::clone(&self.current));
    }

    pub fn pop_scope(&mut self) {
        if let Some(parent) = self.current.parent.clone() {
            self.current = parent;
        }
    }

    /// The current chain, for closures to capture.
    pub fn capture(&self) -> Rc<Activation> {
        Rc::clone(&self.current)
    }

    pub fn declare(&mut self, name: &str, value: Value, mutable: bool) {
        self.current.declare(name, value, mutable);
    }

    pub fn assign(&mut self, name: &str, value: Value) -> RuntimeResult<()> {
        let binding = self.current.find(name).ok_or_else(|| RuntimeError::NotDeclared {
            name: name.to_string(),
        })?;
        if !binding.mutable {
            return Err(RuntimeError::unreachable(format!("constant `{name}` was reassigned")));
        }
        *binding.cell.borrow_mut() = value;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.current
            .find(name)
            .map(|binding| binding.cell.borrow().clone())
    }

    /// Moves the value out of `name`, leaving [`Value::Moved`] behind.
    pub fn take(&mut self, name: &str) -> RuntimeResult<Value> {
        let binding = self.current.find(name).ok_or_else(|| RuntimeError::NotDeclared {
            name: name.to_string(),
        })?;
        let value = std::mem::replace(&mut *binding.cell.borrow_mut(), Value::Moved);
        match value {
            Value::Moved => Err(RuntimeError::InvalidatedResource {
                name: name.to_string(),
            }),
            value => Ok(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_scopes_shadow_and_release() {
        let mut env = Environment::new(Activation::root());
        env.declare("x", Value::int(1), true);
        env.push_scope();
        env.declare("x", Value::int(2), false);
        assert_eq!(env.get("x").map(|value| value.to_string()).as_deref(), Some("2"));
        env.pop_scope();
        env.assign("x", Value::int(3)).unwrap();
        assert_eq!(env.get("x").map(|value| value.to_string()).as_deref(), Some("3"));
    }

    #[test]
    fn captured_scopes_outlive_the_environment() {
        let mut env = Environment::new(Activation::root());
        env.push_scope();
        env.declare("captured", Value::Bool(true), false);
        let captured = env.capture();
        env.pop_scope();
        assert!(env.get("captured").is_none());
        assert!(Environment::new(captured).get("captured").is_some());
    }

    #[test]
    fn taking_twice_is_an_internal_error() {
        let mut env = Environment::new(Activation::root());
        env.declare("r", Value::int(1), false);
        env.take("r").unwrap();
        let err = env.take("r").unwrap_err();
        assert!(err.is_internal());
    }
}
