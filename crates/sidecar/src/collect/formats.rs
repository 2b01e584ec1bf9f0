//! Format domain — per-format property validation.
//!
//! A registry maps format names to validation functions. Each validator
//! enforces an allow-list of property keys (the children of the `format`
//! node) and returns the accepted properties. Adding a format means
//! registering one function; the registry is built once at startup and
//! never mutated afterwards.

use std::collections::{BTreeMap, HashMap};

use super::tree::TreeNode;
use super::CompileError;

type Validator = Box<dyn Fn(&TreeNode) -> Result<BTreeMap<String, String>, CompileError> + Send + Sync>;

pub struct FormatRegistry {
    validators: HashMap<&'static str, Validator>,
}

impl FormatRegistry {
    /// The built-in format set.
    pub fn standard() -> Self {
        let mut registry = Self {
            validators: HashMap::new(),
        };
        registry.register_simple("nonex", &[]);
        registry.register_simple("csv", &["time_key", "time_format", "keys"]);
        registry.register_simple("json", &["time_key", "time_format"]);
        registry.register_simple("apache2", &[]);
        registry.register_simple("apache_error", &[]);
        registry.register_simple("nginx", &[]);
        registry.register(
            "regexp",
            Box::new(|node| {
                let props = collect_props(node, "regexp", &["pattern", "time_key", "time_format"])?;
                match props.get("pattern") {
                    Some(pattern) if !pattern.is_empty() => Ok(props),
                    _ => Err(CompileError::MissingPattern),
                }
            }),
        );
        registry
    }

    pub fn register(&mut self, format: &'static str, validator: Validator) {
        self.validators.insert(format, validator);
    }

    /// Register an allow-list-only validator.
    pub fn register_simple(&mut self, format: &'static str, allowed: &'static [&'static str]) {
        self.register(format, Box::new(move |node| collect_props(node, format, allowed)));
    }

    /// Validate the `format` node's children for the named format.
    pub fn validate(
        &self,
        format: &str,
        node: &TreeNode,
    ) -> Result<BTreeMap<String, String>, CompileError> {
        let validator = self
            .validators
            .get(format)
            .ok_or_else(|| CompileError::UnknownFormat(format.to_string()))?;
        validator(node)
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

fn collect_props(
    node: &TreeNode,
    format: &str,
    allowed: &[&str],
) -> Result<BTreeMap<String, String>, CompileError> {
    let mut props = BTreeMap::new();
    for (key, child) in &node.children {
        if !allowed.contains(&key.as_str()) {
            return Err(CompileError::InvalidProperty {
                property: key.clone(),
                format: format.to_string(),
            });
        }
        props.insert(key.clone(), child.value.clone());
    }
    Ok(props)
}
