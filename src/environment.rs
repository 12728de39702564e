use crate::types::Value;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;
use thiserror::Error;
use tracing::trace;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EnvError {
    #[error("Unbound variable: '{0}'")]
    UnboundVariable(String),
    #[error("Arity mismatch: expected {expected} argument(s), got {found}")]
    Arity { expected: usize, found: usize },
}

/// Shared handle to a frame. Closures keep frames alive past the call that
/// created them, so frames are reference counted rather than stack owned.
pub type EnvRef = Rc<RefCell<Environment>>;

pub struct Environment {
    // Fixed at construction
    outer: Option<EnvRef>,
    bindings: HashMap<String, Value>,
}

impl Environment {
    /// Creates a global environment pre-populated with an injected builtin table.
    pub fn new_global<I, S>(builtins: I) -> EnvRef
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        Rc::new(RefCell::new(Environment {
            outer: None,
            bindings: builtins
                .into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
        }))
    }

    /// Builds a call frame binding `params` to `args` positionally.
    pub fn bind(params: &[String], args: Vec<Value>, outer: EnvRef) -> Result<EnvRef, EnvError> {
        if params.len() != args.len() {
            return Err(EnvError::Arity {
                expected: params.len(),
                found: args.len(),
            });
        }
        trace!(?params, "binding call frame");
        Ok(Rc::new(RefCell::new(Environment {
            outer: Some(outer),
            bindings: params.iter().cloned().zip(args).collect(),
        })))
    }

    /// Returns the innermost frame, starting at `env`, that binds `name`.
    pub fn find(env: &EnvRef, name: &str) -> Result<EnvRef, EnvError> {
        let mut frame = Rc::clone(env);
        loop {
            if frame.borrow().bindings.contains_key(name) {
                return Ok(frame);
            }
            let outer = frame.borrow().outer.clone();
            match outer {
                Some(outer) => frame = outer,
                None => return Err(EnvError::UnboundVariable(name.to_string())),
            }
        }
    }

    /// Reads a binding from this frame only.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.bindings.get(name).cloned()
    }

    /// Writes a binding into this frame only, shadowing any outer binding.
    pub fn set(&mut self, name: String, value: Value) {
        self.bindings.insert(name, value);
    }

    /// Lexical lookup: the value bound to `name` in the innermost frame that has it.
    pub fn lookup(env: &EnvRef, name: &str) -> Result<Value, EnvError> {
        Environment::find(env, name)?
            .borrow()
            .get(name)
            .ok_or_else(|| EnvError::UnboundVariable(name.to_string()))
    }

    pub fn define(env: &EnvRef, name: &str, value: Value) {
        env.borrow_mut().set(name.to_string(), value);
    }

    /// Overwrites an existing binding in the frame that owns `name`.
    pub fn assign(env: &EnvRef, name: &str, value: Value) -> Result<(), EnvError> {
        Environment::find(env, name)?
            .borrow_mut()
            .set(name.to_string(), value);
        Ok(())
    }

    /// All names visible from this frame.
    pub fn identifiers(&self) -> HashSet<String> {
        let mut identifiers: HashSet<String> = self.bindings.keys().cloned().collect();
        let mut outer = self.outer.clone();
        while let Some(frame) = outer {
            let frame = frame.borrow();
            identifiers.extend(frame.bindings.keys().cloned());
            outer = frame.outer.clone();
        }
        identifiers
    }

    pub fn is_global(&self) -> bool {
        self.outer.is_none()
    }
}

impl fmt::Debug for Environment {
    // Bindings may hold closures over this frame, so only names are shown
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.bindings.keys().collect();
        names.sort();
        f.debug_struct("Environment")
            .field("bindings", &names)
            .field("global", &self.is_global())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn empty_global() -> EnvRef {
        Environment::new_global(Vec::<(String, Value)>::new())
    }

    fn empty_frame(outer: EnvRef) -> EnvRef {
        Environment::bind(&[], vec![], outer).unwrap()
    }

    #[test]
    fn test_set_and_get_global() {
        let env = empty_global();
        env.borrow_mut().set("x".to_string(), Value::int(10));
        assert_eq!(env.borrow().get("x"), Some(Value::int(10)));
        assert_eq!(Environment::lookup(&env, "x"), Ok(Value::int(10)));
    }

    #[test]
    fn test_lookup_unbound() {
        let env = empty_global();
        assert_eq!(
            Environment::lookup(&env, "y"),
            Err(EnvError::UnboundVariable("y".to_string()))
        );
    }

    #[test]
    fn test_new_global_with_table() {
        let env = Environment::new_global([("pi", Value::float(3.5)), ("one", Value::int(1))]);
        assert!(env.borrow().is_global());
        assert_eq!(Environment::lookup(&env, "one"), Ok(Value::int(1)));
        assert_eq!(Environment::lookup(&env, "pi"), Ok(Value::float(3.5)));
    }

    #[test]
    fn test_find_returns_owning_frame() {
        let global = empty_global();
        global.borrow_mut().set("x".to_string(), Value::int(1));
        let local = empty_frame(global.clone());
        local.borrow_mut().set("y".to_string(), Value::int(2));
        let inner = empty_frame(local.clone());

        assert!(Rc::ptr_eq(&Environment::find(&inner, "x").unwrap(), &global));
        assert!(Rc::ptr_eq(&Environment::find(&inner, "y").unwrap(), &local));
        assert!(matches!(
            Environment::find(&inner, "z"),
            Err(EnvError::UnboundVariable(name)) if name == "z"
        ));
    }

    #[test]
    fn test_get_only_reads_own_frame() {
        let global = empty_global();
        global.borrow_mut().set("x".to_string(), Value::int(1));
        let local = empty_frame(global);
        assert_eq!(local.borrow().get("x"), None);
        assert_eq!(Environment::lookup(&local, "x"), Ok(Value::int(1)));
    }

    #[test]
    fn test_shadowing() {
        let global = empty_global();
        global.borrow_mut().set("x".to_string(), Value::int(10));
        let local = empty_frame(global.clone());
        local.borrow_mut().set("x".to_string(), Value::int(50));

        assert_eq!(Environment::lookup(&local, "x"), Ok(Value::int(50)));
        assert_eq!(Environment::lookup(&global, "x"), Ok(Value::int(10)));
    }

    #[test]
    fn test_assign_updates_owning_frame() {
        let global = empty_global();
        global.borrow_mut().set("x".to_string(), Value::int(10));
        let local = empty_frame(global.clone());

        Environment::assign(&local, "x", Value::int(11)).unwrap();
        assert_eq!(global.borrow().get("x"), Some(Value::int(11)));
        assert_eq!(local.borrow().get("x"), None);
    }

    #[test]
    fn test_assign_unbound() {
        let env = empty_global();
        assert_eq!(
            Environment::assign(&env, "nope", Value::int(1)),
            Err(EnvError::UnboundVariable("nope".to_string()))
        );
        assert_eq!(env.borrow().get("nope"), None);
    }

    #[test]
    fn test_bind_positional() {
        let global = empty_global();
        let frame =
            Environment::bind(&names(&["a", "b"]), vec![Value::int(1), Value::int(2)], global)
                .unwrap();
        assert_eq!(frame.borrow().get("a"), Some(Value::int(1)));
        assert_eq!(frame.borrow().get("b"), Some(Value::int(2)));
        assert!(!frame.borrow().is_global());
    }

    #[test]
    fn test_bind_arity_mismatch() {
        let global = empty_global();
        assert!(matches!(
            Environment::bind(&names(&["a", "b"]), vec![Value::int(1)], global.clone()),
            Err(EnvError::Arity { expected: 2, found: 1 })
        ));
        assert!(matches!(
            Environment::bind(&names(&[]), vec![Value::int(1)], global),
            Err(EnvError::Arity { expected: 0, found: 1 })
        ));
    }

    #[test]
    fn test_identifiers_walk_chain() {
        let global = Environment::new_global([("car", Value::nil())]);
        let local = empty_frame(global);
        Environment::define(&local, "x", Value::int(1));
        let ids = local.borrow().identifiers();
        assert!(ids.contains("car"));
        assert!(ids.contains("x"));
        assert_eq!(ids.len(), 2);
    }
}
