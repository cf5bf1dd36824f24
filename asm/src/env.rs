//! Lexically scoped environments for the evaluator.

use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
    rc::Rc,
};

use crate::{
    keyword,
    value::Value,
};


/// What kind of syntactic construct opened a scope. Function scopes are what
/// `shift` and the argument variables attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Parent,
    Function,
    Repeat,
    If,
}

/// One scope of variables, chained to its parent. Declarations always go to
/// the innermost scope; resolution walks outwards.
pub struct Env<'p> {
    parent: Option<&'p Env<'p>>,
    scope: Scope,
    variables: RefCell<HashMap<String, Rc<Value>>>,
    constants: RefCell<HashSet<String>>,
}

impl<'p> Env<'p> {
    /// Creates the root scope, pre-populated with `true`, `false` and the
    /// native intrinsics.
    pub fn global() -> Env<'static> {
        let env = Env {
            parent: None,
            scope: Scope::Parent,
            variables: RefCell::new(HashMap::new()),
            constants: RefCell::new(HashSet::new()),
        };

        crate::builtins::install(&env);
        env
    }

    /// Creates a child scope.
    pub fn child(parent: &'p Env<'p>, scope: Scope) -> Env<'p> {
        Env {
            parent: Some(parent),
            scope,
            variables: RefCell::new(HashMap::new()),
            constants: RefCell::new(HashSet::new()),
        }
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Declares (or re-declares) a variable in this scope. Fails for blank
    /// or reserved names and for re-declared constants.
    pub fn declare_variable(&self, key: &str, value: Rc<Value>, constant: bool) -> bool {
        if key.is_empty() {
            eprintln!("[environment] Variable name is blank.");
            return false;
        } else if keyword::lookup(key).is_some() {
            eprintln!("[environment] Variable name '{}' is a reserved keyword.", key);
            return false;
        } else if self.constants.borrow().contains(key) {
            eprintln!(
                "[environment] Variable name '{}' is a constant and cannot be re-declared.",
                key,
            );
            return false;
        }

        self.variables.borrow_mut().insert(key.to_string(), value);
        if constant {
            self.constants.borrow_mut().insert(key.to_string());
        }

        true
    }

    /// Resolves a variable, walking outwards through the scope chain.
    /// Returns `None` without a diagnostic; callers report unresolved names
    /// where they know the context.
    pub fn resolve_variable(&self, key: &str) -> Option<Rc<Value>> {
        if let Some(value) = self.variables.borrow().get(key) {
            return Some(Rc::clone(value));
        }

        self.parent.and_then(|parent| parent.resolve_variable(key))
    }

    /// The root scope, for `global` declarations.
    pub fn root<'s>(&'s self) -> &'s Env<'p> {
        match self.parent {
            Some(parent) => parent.root(),
            None => self,
        }
    }

    /// The innermost function scope, if the evaluator is inside a call.
    pub fn function_scope<'s>(&'s self) -> Option<&'s Env<'p>> {
        if self.scope == Scope::Function {
            Some(self)
        } else {
            self.parent.and_then(|parent| parent.function_scope())
        }
    }

    /// Resolves the numbered argument variable `_<index>` of a call scope.
    pub fn arg(&self, index: u64) -> Option<Rc<Value>> {
        self.resolve_variable(&format!("_{}", index))
    }

    /// Shifts the numbered argument variables down by `count` places and
    /// decrements `_count`. Only meaningful directly on a function scope.
    pub fn shift_arguments(&self, count: u64) -> bool {
        if self.scope != Scope::Function {
            return false;
        }

        let old_count = match self.resolve_variable("_count") {
            Some(value) => match &*value {
                Value::Number(n) => n.integer(),
                _ => return false,
            },
            None => return false,
        };

        if !self.declare_variable(
            "_count",
            Value::number(old_count.saturating_sub(count) as f64),
            false,
        ) {
            return false;
        }

        for _ in 0..count {
            let mut index = 1u64;
            while let Some(src) = self.arg(index) {
                if !self.declare_variable(&format!("_{}", index - 1), src, false) {
                    return false;
                }
                index += 1;
            }
        }

        true
    }
}
