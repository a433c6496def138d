//! Chained variable scopes.
//!
//! A [`Scope`] is a stack of immutable frames. Lookups search the innermost
//! frame first; [`Scope::with`] pushes a new frame without touching the
//! parent, so dropping a child scope never affects its ancestors. Clones share
//! their frames.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

#[derive(Debug)]
struct Frame {
    vars: HashMap<String, String>,
    parent: Option<Arc<Frame>>,
}

/// Variable bindings visible to template and path expansion.
#[derive(Debug, Clone)]
pub struct Scope {
    frame: Arc<Frame>,
}

impl Default for Scope {
    fn default() -> Self {
        Self::new(HashMap::new())
    }
}

impl Scope {
    /// Create a root scope.
    pub fn new(vars: HashMap<String, String>) -> Self {
        Self {
            frame: Arc::new(Frame { vars, parent: None }),
        }
    }

    /// Create a child scope whose bindings shadow this one.
    pub fn with(&self, vars: HashMap<String, String>) -> Self {
        Self {
            frame: Arc::new(Frame {
                vars,
                parent: Some(Arc::clone(&self.frame)),
            }),
        }
    }

    /// Look up a variable, innermost frame first.
    pub fn lookup(&self, name: &str) -> Option<&str> {
        let mut frame = Some(&self.frame);
        while let Some(f) = frame {
            if let Some(value) = f.vars.get(name) {
                return Some(value.as_str());
            }
            frame = f.parent.as_ref();
        }
        None
    }

    /// All visible bindings, with shadowed values resolved.
    pub fn all(&self) -> BTreeMap<String, String> {
        let mut frames = Vec::new();
        let mut frame = Some(&self.frame);
        while let Some(f) = frame {
            frames.push(f);
            frame = f.parent.as_ref();
        }

        let mut out = BTreeMap::new();
        for f in frames.into_iter().rev() {
            for (k, v) in &f.vars {
                out.insert(k.clone(), v.clone());
            }
        }
        out
    }

    /// Sorted names of all visible variables.
    pub fn names(&self) -> Vec<String> {
        self.all().into_keys().collect()
    }
}
