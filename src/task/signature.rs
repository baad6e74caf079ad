/// Parameter descriptors for tasks
///
/// Rust has no runtime reflection over closures, so every task declares its
/// call contract explicitly: ordered parameter names, defaults, and optional
/// type tags used by the classifier.
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::context::Context;

/// Keyword override that cleans outputs and cached state
pub const CLEAN_FLAG: &str = "_clean";
/// Keyword override that runs the task even when it could be skipped
pub const FORCE_RUN_FLAG: &str = "_force_run";

/// Default computed from the context at call time
pub type DynamicDefault = Arc<dyn Fn(&Context) -> anyhow::Result<Value> + Send + Sync>;

/// Declared default of a parameter
#[derive(Clone)]
pub enum ParamDefault {
    /// No default; the value must be passed or derived
    Required,
    /// Plain value
    Value(Value),
    /// Computed by calling a function with the context
    Dynamic(DynamicDefault),
    /// Looked up at a dotted context path (`ctx.people.names_path`)
    Lazy(String),
    /// Explicit "nothing given" marker used by relaxed descriptors
    Absent,
}

impl ParamDefault {
    /// True when the default must be evaluated against a context
    pub fn is_callable(&self) -> bool {
        matches!(self, ParamDefault::Dynamic(_) | ParamDefault::Lazy(_))
    }

    /// The plain default value, if there is one
    pub fn plain(&self) -> Option<&Value> {
        match self {
            ParamDefault::Value(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Debug for ParamDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamDefault::Required => f.write_str("Required"),
            ParamDefault::Value(value) => write!(f, "Value({value})"),
            ParamDefault::Dynamic(_) => f.write_str("Dynamic(<fn>)"),
            ParamDefault::Lazy(path) => write!(f, "Lazy({path:?})"),
            ParamDefault::Absent => f.write_str("Absent"),
        }
    }
}

/// Optional type tag for a parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeTag {
    InputPath,
    OutputPath,
    /// List of values of the inner tag (`[InputPath]`)
    List(Box<TypeTag>),
    Named(String),
}

impl TypeTag {
    pub fn list_of(inner: TypeTag) -> Self {
        TypeTag::List(Box::new(inner))
    }

    /// True when the tag is `other` or a list of `other`
    pub fn contains(&self, other: &TypeTag) -> bool {
        match self {
            TypeTag::List(inner) => inner.contains(other),
            tag => tag == other,
        }
    }
}

/// One declared parameter
#[derive(Debug, Clone)]
pub struct Param {
    name: String,
    default: ParamDefault,
    tag: Option<TypeTag>,
}

impl Param {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: ParamDefault::Required,
            tag: None,
        }
    }

    pub fn with_default(name: impl Into<String>, default: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            default: ParamDefault::Value(default.into()),
            tag: None,
        }
    }

    pub fn dynamic<F>(name: impl Into<String>, default: F) -> Self
    where
        F: Fn(&Context) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            default: ParamDefault::Dynamic(Arc::new(default)),
            tag: None,
        }
    }

    pub fn lazy(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: ParamDefault::Lazy(path.into()),
            tag: None,
        }
    }

    /// Attach a type tag
    pub fn tagged(mut self, tag: TypeTag) -> Self {
        self.tag = Some(tag);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default(&self) -> &ParamDefault {
        &self.default
    }

    pub fn tag(&self) -> Option<&TypeTag> {
        self.tag.as_ref()
    }

    /// Parameters starting with `_` never count as behavior flags
    pub fn is_insignificant(&self) -> bool {
        self.name.starts_with('_')
    }
}

/// Ordered call contract of a task
#[derive(Debug, Clone)]
pub struct Signature {
    params: Vec<Param>,
    takes_context: bool,
}

impl Signature {
    /// Signature of a task whose first argument is the context
    pub fn new(params: Vec<Param>) -> Self {
        Self {
            params,
            takes_context: true,
        }
    }

    /// Signature of a plain function without a context argument
    pub fn without_context(params: Vec<Param>) -> Self {
        Self {
            params,
            takes_context: false,
        }
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&Param> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn takes_context(&self) -> bool {
        self.takes_context
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Check names are unique, non-empty and not reserved
    pub fn validate(&self) -> std::result::Result<(), String> {
        let mut seen = std::collections::HashSet::new();
        for param in &self.params {
            if param.name.is_empty() {
                return Err("parameter names can't be empty".to_string());
            }
            if param.name == CLEAN_FLAG || param.name == FORCE_RUN_FLAG {
                return Err(format!("parameter name '{}' is reserved", param.name));
            }
            if !seen.insert(param.name.as_str()) {
                return Err(format!("duplicate parameter '{}'", param.name));
            }
        }
        Ok(())
    }

    /// Descriptor exposed to CLI generation
    ///
    /// Required parameters become optional with an `Absent` default. When
    /// `with_overrides` is set, boolean `_clean` and `_force_run` parameters
    /// are appended.
    pub fn relaxed(&self, with_overrides: bool) -> Signature {
        let mut params: Vec<Param> = self
            .params
            .iter()
            .map(|p| match p.default {
                ParamDefault::Required => Param {
                    default: ParamDefault::Absent,
                    ..p.clone()
                },
                _ => p.clone(),
            })
            .collect();

        if with_overrides {
            for flag in [CLEAN_FLAG, FORCE_RUN_FLAG] {
                params.push(
                    Param::with_default(flag, false).tagged(TypeTag::Named("bool".to_string())),
                );
            }
        }

        Signature {
            params,
            takes_context: self.takes_context,
        }
    }
}
