/// Call arguments as passed by the caller, and the bound mapping a task body sees
use anyhow::{anyhow, Context as _};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::PathBuf;

use super::signature::{CLEAN_FLAG, FORCE_RUN_FLAG};

/// Positional and keyword values given at call time
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    pub positional: Vec<Value>,
    pub keyword: Vec<(String, Value)>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional value
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Append a keyword value
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keyword.push((name.into(), value.into()));
        self
    }

    /// Request cleaning of outputs and cached state
    pub fn clean(self) -> Self {
        self.kwarg(CLEAN_FLAG, true)
    }

    /// Request a run even when the task could be skipped
    pub fn force_run(self) -> Self {
        self.kwarg(FORCE_RUN_FLAG, true)
    }

    /// Remove the orchestration-only keywords and return them
    pub fn take_overrides(&mut self) -> RunOverrides {
        let mut overrides = RunOverrides::default();
        self.keyword.retain(|(name, value)| match name.as_str() {
            CLEAN_FLAG => {
                overrides.clean = is_truthy(value);
                false
            }
            FORCE_RUN_FLAG => {
                overrides.force_run = is_truthy(value);
                false
            }
            _ => true,
        });
        overrides
    }
}

/// Orchestration flags stripped from a call before binding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOverrides {
    pub clean: bool,
    pub force_run: bool,
}

/// Final argument mapping, in declaration order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    values: Vec<(String, Value)>,
}

impl Arguments {
    pub(crate) fn from_pairs(values: Vec<(String, Value)>) -> Self {
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Deserialize an argument into a concrete type
    pub fn value<T: DeserializeOwned>(&self, name: &str) -> anyhow::Result<T> {
        let raw = self
            .get(name)
            .ok_or_else(|| anyhow!("No argument named '{name}'"))?;
        serde_json::from_value(raw.clone())
            .with_context(|| format!("Argument '{name}' has unexpected type: {raw}"))
    }

    pub fn str(&self, name: &str) -> anyhow::Result<&str> {
        self.get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("Argument '{name}' is not a string"))
    }

    pub fn path(&self, name: &str) -> anyhow::Result<PathBuf> {
        self.str(name).map(PathBuf::from)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Truthiness of a loosely typed value (null, false, 0, "" and empty containers are false)
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_take_overrides_strips_keywords() {
        let mut args = CallArgs::new()
            .arg("in.txt")
            .kwarg("level", 2)
            .clean()
            .kwarg(FORCE_RUN_FLAG, "yes");

        let overrides = args.take_overrides();
        assert!(overrides.clean);
        assert!(overrides.force_run);
        assert_eq!(args.keyword, vec![("level".to_string(), json!(2))]);
        assert_eq!(args.positional, vec![json!("in.txt")]);
    }

    #[test]
    fn test_arguments_accessors() {
        let args = Arguments::from_pairs(vec![
            ("input_path".to_string(), json!("in.txt")),
            ("count".to_string(), json!(3)),
        ]);
        assert_eq!(args.path("input_path").unwrap(), PathBuf::from("in.txt"));
        assert_eq!(args.value::<u32>("count").unwrap(), 3);
        assert!(args.str("count").is_err());
        assert!(args.value::<u32>("missing").is_err());
    }

    #[test]
    fn test_truthiness() {
        for falsy in [json!(null), json!(false), json!(0), json!(""), json!([]), json!({})] {
            assert!(!is_truthy(&falsy), "{falsy} should be falsy");
        }
        for truthy in [json!(true), json!(1), json!("x"), json!([0]), json!({"a": 1})] {
            assert!(is_truthy(&truthy), "{truthy} should be truthy");
        }
    }
}
