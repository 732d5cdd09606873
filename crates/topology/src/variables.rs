//! Named variables and `${name}` template rendering
//!
//! Every instance owns a [`Variables`] set. Variables are registered in two
//! phases (see [`crate::service_vars`]) and then built: each value is resolved
//! once, with references to other variables substituted recursively. An
//! undefined reference or a reference cycle fails the build; there is no
//! iteration towards a fixed point.

use crate::error::{Error, Result};
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

/// `${name}` placeholder
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^${}]+)\}").expect("placeholder pattern is valid"));

/// Closure producing a variable value at build time
pub type ResolveFn = Arc<dyn Fn() -> String + Send + Sync>;

/// Source of a variable's value
#[derive(Clone)]
pub enum VariableValue {
    Literal(String),
    Computed(ResolveFn),
}

impl fmt::Debug for VariableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(s) => f.debug_tuple("Literal").field(s).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// A named value that may reference other variables
#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub description: String,
    pub value: VariableValue,
    resolved: Option<String>,
}

impl Variable {
    pub fn literal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            value: VariableValue::Literal(value.into()),
            resolved: None,
        }
    }

    pub fn computed(
        name: impl Into<String>,
        resolve: impl Fn() -> String + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            value: VariableValue::Computed(Arc::new(resolve)),
            resolved: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// An ordered set of variables owned by one instance
#[derive(Debug, Clone, Default)]
pub struct Variables {
    vars: Vec<Variable>,
    index: HashMap<String, usize>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a variable; names are unique
    pub fn register(&mut self, var: Variable) -> Result<()> {
        if self.index.contains_key(&var.name) {
            return Err(Error::DuplicateVariable(var.name));
        }
        self.index.insert(var.name.clone(), self.vars.len());
        self.vars.push(var);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Resolved value of a variable, `None` when unknown or not yet built
    pub fn get(&self, name: &str) -> Option<&str> {
        self.index
            .get(name)
            .and_then(|&i| self.vars[i].resolved.as_deref())
    }

    /// Iterate `(name, resolved value)` in registration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.vars
            .iter()
            .map(|v| (v.name.as_str(), v.resolved.as_deref()))
    }

    /// Resolve every registered variable
    ///
    /// Already resolved variables keep their value, so building again after
    /// registering more variables only resolves the new ones.
    pub fn build(&mut self) -> Result<()> {
        let mut visiting = vec![false; self.vars.len()];
        for i in 0..self.vars.len() {
            self.resolve(i, &mut visiting)?;
        }
        Ok(())
    }

    /// Resolve one variable and whatever it references, leaving the rest
    pub fn resolve_named(&mut self, name: &str) -> Result<String> {
        let i = *self
            .index
            .get(name)
            .ok_or_else(|| Error::UndefinedVariable(name.to_string()))?;
        let mut visiting = vec![false; self.vars.len()];
        self.resolve(i, &mut visiting)
    }

    fn resolve(&mut self, i: usize, visiting: &mut [bool]) -> Result<String> {
        if let Some(value) = &self.vars[i].resolved {
            return Ok(value.clone());
        }
        if visiting[i] {
            return Err(Error::VariableCycle(self.vars[i].name.clone()));
        }
        visiting[i] = true;

        let raw = match &self.vars[i].value {
            VariableValue::Literal(s) => s.clone(),
            VariableValue::Computed(f) => f(),
        };

        let refs: Vec<(std::ops::Range<usize>, String)> = PLACEHOLDER
            .captures_iter(&raw)
            .filter_map(|c| Some((c.get(0)?.range(), c.get(1)?.as_str().to_string())))
            .collect();

        let mut out = String::with_capacity(raw.len());
        let mut last = 0;
        for (range, name) in refs {
            let j = *self
                .index
                .get(&name)
                .ok_or_else(|| Error::UndefinedVariable(name.clone()))?;
            let value = self.resolve(j, visiting)?;
            out.push_str(&raw[last..range.start]);
            out.push_str(&value);
            last = range.end;
        }
        out.push_str(&raw[last..]);

        visiting[i] = false;
        self.vars[i].resolved = Some(out.clone());
        Ok(out)
    }

    /// Substitute every `${name}` in `text` with its resolved value
    ///
    /// Inserted values are not scanned again.
    pub fn render(&self, text: &str) -> Result<String> {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for caps in PLACEHOLDER.captures_iter(text) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let value = self
                .get(name.as_str())
                .ok_or_else(|| Error::UndefinedVariable(name.as_str().to_string()))?;
            out.push_str(&text[last..whole.start()]);
            out.push_str(value);
            last = whole.end();
        }
        out.push_str(&text[last..]);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn built(vars: &[(&str, &str)]) -> Variables {
        let mut v = Variables::new();
        for (name, value) in vars {
            v.register(Variable::literal(*name, *value)).unwrap();
        }
        v.build().unwrap();
        v
    }

    #[test]
    fn test_register_duplicate() {
        let mut v = Variables::new();
        v.register(Variable::literal("a", "1")).unwrap();
        assert!(matches!(
            v.register(Variable::literal("a", "2")),
            Err(Error::DuplicateVariable(n)) if n == "a"
        ));
    }

    #[test]
    fn test_build_resolves_references_in_any_order() {
        let v = built(&[("url", "http://${host}:${port}"), ("host", "10.0.0.1"), ("port", "80")]);
        assert_eq!(v.get("url"), Some("http://10.0.0.1:80"));
    }

    #[test]
    fn test_build_undefined_reference() {
        let mut v = Variables::new();
        v.register(Variable::literal("a", "${missing}")).unwrap();
        assert!(matches!(v.build(), Err(Error::UndefinedVariable(n)) if n == "missing"));
    }

    #[test]
    fn test_build_cycle() {
        let mut v = Variables::new();
        v.register(Variable::literal("a", "${b}")).unwrap();
        v.register(Variable::literal("b", "${a}")).unwrap();
        assert!(matches!(v.build(), Err(Error::VariableCycle(_))));
    }

    #[test]
    fn test_build_is_incremental() {
        let mut v = built(&[("a", "1")]);
        v.register(Variable::literal("b", "${a}2")).unwrap();
        v.build().unwrap();
        assert_eq!(v.get("b"), Some("12"));
    }

    #[test]
    fn test_resolve_named_leaves_others_pending() {
        let mut v = Variables::new();
        v.register(Variable::literal("port", "65${seq}")).unwrap();
        v.register(Variable::literal("seq", "01")).unwrap();
        v.register(Variable::literal("peers", "${later}")).unwrap();

        assert_eq!(v.resolve_named("port").unwrap(), "6501");
        assert_eq!(v.get("port"), Some("6501"));
        assert_eq!(v.get("peers"), None);

        v.register(Variable::literal("later", "a,b")).unwrap();
        v.build().unwrap();
        assert_eq!(v.get("peers"), Some("a,b"));
        assert!(matches!(
            v.resolve_named("nope"),
            Err(Error::UndefinedVariable(n)) if n == "nope"
        ));
    }

    #[test]
    fn test_computed_variable() {
        let mut v = Variables::new();
        v.register(Variable::computed("answer", || "42".to_string()))
            .unwrap();
        v.build().unwrap();
        assert_eq!(v.get("answer"), Some("42"));
    }

    #[test]
    fn test_render_two_placeholders() {
        let v = built(&[("ip", "10.0.0.1"), ("port", "2379")]);
        assert_eq!(v.render("${ip}:${port}").unwrap(), "10.0.0.1:2379");
    }

    #[test]
    fn test_render_no_double_substitution() {
        // the two halves form a placeholder only after insertion
        let v = built(&[("a", "${"), ("b", "b}")]);
        assert_eq!(v.render("${a}${b}").unwrap(), "${b}");
    }

    #[test]
    fn test_render_undefined() {
        let v = built(&[("a", "1")]);
        assert!(matches!(
            v.render("x=${nope}"),
            Err(Error::UndefinedVariable(n)) if n == "nope"
        ));
    }

    #[test]
    fn test_render_without_placeholders() {
        let v = Variables::new();
        assert_eq!(v.render("plain $ text {}").unwrap(), "plain $ text {}");
    }
}
