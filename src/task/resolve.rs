/// Argument resolution
///
/// Each declared parameter is looked up through an ordered cascade; the first
/// step that produces a value wins:
///
/// 1. directly passed (positional or keyword)
/// 2. the context configuration table at the task's config path
/// 3. the task's `derive_kwargs` callback (called at most once per call)
/// 4. a callable default (`Dynamic` or `Lazy`) evaluated with the context
///
/// Plain defaults fill whatever is left. Parameters still without a value
/// are reported together in declaration order.
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::args::{Arguments, CallArgs};
use super::signature::{ParamDefault, Signature};
use crate::context::{Context, CtxPath};
use crate::error::{Error, Result};

/// Callback deriving a table of argument values from the context
pub type DeriveFn = Arc<dyn Fn(&Context) -> anyhow::Result<Map<String, Value>> + Send + Sync>;

/// Where configuration values for a task come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// No configuration lookup
    Disabled,
    /// Default path derived from the task name; missing keys are ignored
    Implicit(CtxPath),
    /// Path given by the user; missing keys are errors
    Explicit(CtxPath),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    DirectlyPassed,
    Config,
    DeriveKwargs,
    CallableDefault,
}

impl Step {
    fn as_str(self) -> &'static str {
        match self {
            Step::DirectlyPassed => "directly_passed",
            Step::Config => "config",
            Step::DeriveKwargs => "derive_kwargs",
            Step::CallableDefault => "callable_default",
        }
    }
}

/// Resolves the final argument mapping for one task
pub struct Resolver<'a> {
    task: &'a str,
    signature: &'a Signature,
    source: &'a ConfigSource,
    derive: Option<&'a DeriveFn>,
}

/// Per-call memo of the config table and the derive callback result
#[derive(Default)]
struct CallMemo {
    config_table: Option<Map<String, Value>>,
    derived: Option<Map<String, Value>>,
}

impl<'a> Resolver<'a> {
    pub fn new(
        task: &'a str,
        signature: &'a Signature,
        source: &'a ConfigSource,
        derive: Option<&'a DeriveFn>,
    ) -> Self {
        Self {
            task,
            signature,
            source,
            derive,
        }
    }

    /// Run the cascade for every parameter
    pub fn resolve(&self, ctx: Option<&Context>, args: CallArgs) -> Result<Arguments> {
        let mut direct = bind_direct(self.task, self.signature, args)?;
        let mut memo = CallMemo::default();
        let mut resolved = Vec::with_capacity(self.signature.len());
        let mut missing = Vec::new();

        for param in self.signature.params() {
            let name = param.name();

            let found = if let Some(value) = direct.remove(name) {
                Some((Step::DirectlyPassed, value))
            } else if let Some(value) = self.from_config(ctx, &mut memo, name)? {
                Some((Step::Config, value))
            } else if let Some(value) = self.from_derive(ctx, &mut memo, name)? {
                Some((Step::DeriveKwargs, value))
            } else if let Some(value) = self.from_callable_default(ctx, name, param.default())? {
                Some((Step::CallableDefault, value))
            } else {
                None
            };

            match found {
                Some((step, value)) => {
                    debug!(
                        task = self.task,
                        param = name,
                        step = step.as_str(),
                        value = %truncate(&value.to_string(), 25),
                        "found value"
                    );
                    resolved.push((name.to_string(), value));
                }
                None => match param.default().plain() {
                    Some(value) => resolved.push((name.to_string(), value.clone())),
                    None => missing.push(name.to_string()),
                },
            }
        }

        if !missing.is_empty() {
            return Err(Error::MissingRequiredArguments {
                task: self.task.to_string(),
                missing,
            });
        }

        Ok(Arguments::from_pairs(resolved))
    }

    fn from_config(
        &self,
        ctx: Option<&Context>,
        memo: &mut CallMemo,
        name: &str,
    ) -> Result<Option<Value>> {
        if memo.config_table.is_none() {
            memo.config_table = Some(self.traverse_config(ctx)?);
        }
        Ok(memo
            .config_table
            .as_ref()
            .and_then(|table| table.get(name))
            .cloned())
    }

    /// Find the configuration table for this task
    fn traverse_config(&self, ctx: Option<&Context>) -> Result<Map<String, Value>> {
        let (path, explicit) = match self.source {
            ConfigSource::Disabled => return Ok(Map::new()),
            ConfigSource::Implicit(path) => (path, false),
            ConfigSource::Explicit(path) => (path, true),
        };

        let Some(ctx) = ctx else {
            if explicit {
                return Err(Error::derivation(
                    self.task,
                    format!(
                        "No context was given. Cannot get table from {path} for args of {}()",
                        self.task
                    ),
                ));
            }
            return Ok(Map::new());
        };

        let message = format!(
            "in {} step while traversing path {path} for {}() args",
            Step::Config.as_str(),
            self.task
        );

        match ctx.config().lookup(path) {
            Ok(Value::Object(table)) => Ok(table.clone()),
            Ok(other) if explicit => Err(Error::derivation(
                self.task,
                format!("{message}: expected a table, found {other}"),
            )),
            Ok(_) => Ok(Map::new()),
            Err(e) if explicit => Err(Error::derivation_from(self.task, message, e)),
            Err(e) => {
                debug!(task = self.task, error = %e, "ignoring missing config path");
                Ok(Map::new())
            }
        }
    }

    fn from_derive(
        &self,
        ctx: Option<&Context>,
        memo: &mut CallMemo,
        name: &str,
    ) -> Result<Option<Value>> {
        let Some(derive) = self.derive else {
            return Ok(None);
        };

        if memo.derived.is_none() {
            let ctx = ctx.ok_or_else(|| self.step_error(Step::DeriveKwargs, name, "no context"))?;
            let derived = derive(ctx).map_err(|e| {
                Error::derivation_from(self.task, self.step_message(Step::DeriveKwargs, name), e)
            })?;
            memo.derived = Some(derived);
        }

        Ok(memo.derived.as_ref().and_then(|d| d.get(name)).cloned())
    }

    fn from_callable_default(
        &self,
        ctx: Option<&Context>,
        name: &str,
        default: &ParamDefault,
    ) -> Result<Option<Value>> {
        if !default.is_callable() {
            return Ok(None);
        }
        let ctx =
            ctx.ok_or_else(|| self.step_error(Step::CallableDefault, name, "no context"))?;

        let value = match default {
            ParamDefault::Dynamic(f) => f(ctx),
            ParamDefault::Lazy(path) => ctx.get(path),
            _ => return Ok(None),
        };

        value.map(Some).map_err(|e| {
            Error::derivation_from(self.task, self.step_message(Step::CallableDefault, name), e)
        })
    }

    fn step_message(&self, step: Step, name: &str) -> String {
        format!(
            "in {:?} step of deriving args for param {:?} of {}()",
            step.as_str(),
            name,
            self.task
        )
    }

    fn step_error(&self, step: Step, name: &str, reason: &str) -> Error {
        Error::derivation(
            self.task,
            format!("{}: {reason}", self.step_message(step, name)),
        )
    }
}

/// Match positional and keyword values to declared parameter names
pub fn bind_direct(
    task: &str,
    signature: &Signature,
    args: CallArgs,
) -> Result<HashMap<String, Value>> {
    let CallArgs {
        positional,
        keyword,
    } = args;

    if positional.len() > signature.len() {
        return Err(Error::ArgumentCount {
            task: task.to_string(),
            accepted: signature.len(),
            received: positional.len() + keyword.len(),
        });
    }

    let mut bound: HashMap<String, Value> = signature
        .params()
        .iter()
        .zip(positional)
        .map(|(param, value)| (param.name().to_string(), value))
        .collect();

    for (name, value) in keyword {
        if signature.param(&name).is_none() {
            return Err(Error::UnexpectedKeyword {
                task: task.to_string(),
                name,
            });
        }
        if bound.contains_key(&name) {
            return Err(Error::DuplicateArgument {
                task: task.to_string(),
                name,
            });
        }
        bound.insert(name, value);
    }

    Ok(bound)
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Config;
    use crate::task::signature::Param;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ctx(value: Value) -> Context {
        Context::new(Config::from_value(value).unwrap())
    }

    fn explicit(path: &str) -> ConfigSource {
        ConfigSource::Explicit(CtxPath::parse(path).unwrap())
    }

    fn implicit(path: &str) -> ConfigSource {
        ConfigSource::Implicit(CtxPath::parse(path).unwrap())
    }

    fn x_signature() -> Signature {
        Signature::new(vec![Param::dynamic("x", |_| Ok(json!(99)))])
    }

    #[test]
    fn test_precedence_direct_config_default() {
        let sig = x_signature();
        let source = explicit("ctx");
        let resolver = Resolver::new("t", &sig, &source, None);
        let with_config = ctx(json!({"x": 1}));

        let args = resolver
            .resolve(Some(&with_config), CallArgs::new().kwarg("x", 2))
            .unwrap();
        assert_eq!(args.get("x"), Some(&json!(2)));

        let args = resolver.resolve(Some(&with_config), CallArgs::new()).unwrap();
        assert_eq!(args.get("x"), Some(&json!(1)));

        let source = implicit("ctx.nothing.here");
        let resolver = Resolver::new("t", &sig, &source, None);
        let args = resolver.resolve(Some(&with_config), CallArgs::new()).unwrap();
        assert_eq!(args.get("x"), Some(&json!(99)));
    }

    #[test]
    fn test_config_beats_derive_beats_callable_default() {
        let sig = Signature::new(vec![
            Param::dynamic("a", |_| Ok(json!("default"))),
            Param::dynamic("b", |_| Ok(json!("default"))),
            Param::dynamic("c", |_| Ok(json!("default"))),
        ]);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let derive: DeriveFn = Arc::new(move |_: &Context| {
            counter.fetch_add(1, Ordering::SeqCst);
            let mut m = Map::new();
            m.insert("a".to_string(), json!("derived"));
            m.insert("b".to_string(), json!("derived"));
            Ok(m)
        });
        let source = explicit("ctx.t");
        let resolver = Resolver::new("t", &sig, &source, Some(&derive));

        let args = resolver
            .resolve(Some(&ctx(json!({"t": {"a": "config"}}))), CallArgs::new())
            .unwrap();
        assert_eq!(args.get("a"), Some(&json!("config")));
        assert_eq!(args.get("b"), Some(&json!("derived")));
        assert_eq!(args.get("c"), Some(&json!("default")));
        // Memoized within the call even though two params consulted it
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failing_derive_callback_is_wrapped() {
        let sig = Signature::new(vec![Param::required("x")]);
        let derive: DeriveFn = Arc::new(|_: &Context| -> anyhow::Result<Map<String, Value>> {
            Err(anyhow::anyhow!("lookup service down"))
        });
        let source = ConfigSource::Disabled;
        let resolver = Resolver::new("t", &sig, &source, Some(&derive));

        let err = resolver
            .resolve(Some(&Context::default()), CallArgs::new())
            .unwrap_err();
        assert!(matches!(err, Error::Derivation { .. }));
        assert!(err.to_string().contains("derive_kwargs"));
        assert!(err.to_string().contains("\"x\""));
        assert_eq!(
            std::error::Error::source(&err).unwrap().to_string(),
            "lookup service down"
        );

        let err = resolver.resolve(None, CallArgs::new()).unwrap_err();
        assert!(matches!(err, Error::Derivation { .. }));
        assert!(err.to_string().contains("no context"));

        // A directly passed value never consults the callback
        let args = resolver.resolve(None, CallArgs::new().arg(5)).unwrap();
        assert_eq!(args.get("x"), Some(&json!(5)));
    }

    #[test]
    fn test_config_false_is_a_value() {
        let sig = Signature::new(vec![Param::with_default("x", true)]);
        let source = explicit("ctx");
        let resolver = Resolver::new("t", &sig, &source, None);
        let args = resolver
            .resolve(Some(&ctx(json!({"x": false}))), CallArgs::new())
            .unwrap();
        assert_eq!(args.get("x"), Some(&json!(false)));
    }

    #[test]
    fn test_missing_lists_all_names_in_order() {
        let sig = Signature::new(vec![
            Param::required("a"),
            Param::with_default("ok", 1),
            Param::required("b"),
            Param::required("c"),
        ]);
        let source = implicit("ctx.t");
        let resolver = Resolver::new("t", &sig, &source, None);

        match resolver.resolve(Some(&Context::default()), CallArgs::new()) {
            Err(Error::MissingRequiredArguments { missing, .. }) => {
                assert_eq!(missing, vec!["a", "b", "c"]);
            }
            other => panic!("expected missing arguments, got {other:?}"),
        }
    }

    #[test]
    fn test_binding_errors() {
        let sig = Signature::new(vec![Param::required("a"), Param::with_default("b", 1)]);

        let err = bind_direct("t", &sig, CallArgs::new().arg(1).arg(2).arg(3)).unwrap_err();
        assert!(matches!(
            err,
            Error::ArgumentCount {
                accepted: 2,
                received: 3,
                ..
            }
        ));

        let err = bind_direct("t", &sig, CallArgs::new().kwarg("zzz", 1)).unwrap_err();
        assert!(matches!(err, Error::UnexpectedKeyword { ref name, .. } if name == "zzz"));

        let err = bind_direct("t", &sig, CallArgs::new().arg(1).kwarg("a", 2)).unwrap_err();
        assert!(matches!(err, Error::DuplicateArgument { .. }));

        let bound = bind_direct("t", &sig, CallArgs::new().arg(1).kwarg("b", 5)).unwrap();
        assert_eq!(bound["a"], json!(1));
        assert_eq!(bound["b"], json!(5));
    }

    #[test]
    fn test_explicit_path_missing_is_fatal() {
        let sig = Signature::new(vec![Param::with_default("x", 1)]);
        let source = explicit("ctx.random.task");
        let resolver = Resolver::new("t", &sig, &source, None);

        let err = resolver
            .resolve(Some(&ctx(json!({"random": {}}))), CallArgs::new())
            .unwrap_err();
        assert!(matches!(err, Error::Derivation { .. }));
        assert!(err.to_string().contains("ctx.random.task"));
        assert!(std::error::Error::source(&err).is_some());

        let err = resolver.resolve(None, CallArgs::new()).unwrap_err();
        assert!(err.to_string().contains("No context"));
    }

    #[test]
    fn test_implicit_path_missing_falls_through() {
        let sig = Signature::new(vec![Param::with_default("x", 1)]);
        let source = implicit("ctx.tasks.t");
        let resolver = Resolver::new("t", &sig, &source, None);

        let args = resolver.resolve(None, CallArgs::new()).unwrap();
        assert_eq!(args.get("x"), Some(&json!(1)));
        let args = resolver
            .resolve(Some(&ctx(json!({"tasks": 3}))), CallArgs::new())
            .unwrap();
        assert_eq!(args.get("x"), Some(&json!(1)));
    }

    #[test]
    fn test_failing_default_is_wrapped() {
        let sig = Signature::new(vec![Param::dynamic("x", |_| {
            Err(anyhow::anyhow!("boom"))
        })]);
        let source = ConfigSource::Disabled;
        let resolver = Resolver::new("t", &sig, &source, None);

        let err = resolver
            .resolve(Some(&Context::default()), CallArgs::new())
            .unwrap_err();
        assert!(err.to_string().contains("callable_default"));
        assert!(err.to_string().contains("\"x\""));
        assert_eq!(std::error::Error::source(&err).unwrap().to_string(), "boom");
    }

    #[test]
    fn test_lazy_default() {
        let sig = Signature::new(vec![Param::lazy("out_path", "ctx.people.out")]);
        let source = ConfigSource::Disabled;
        let resolver = Resolver::new("t", &sig, &source, None);

        let args = resolver
            .resolve(
                Some(&ctx(json!({"people": {"out": "ages.txt"}}))),
                CallArgs::new(),
            )
            .unwrap();
        assert_eq!(args.get("out_path"), Some(&json!("ages.txt")));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("abc", 5), "abc");
        assert_eq!(truncate("abcdef", 3), "abc...");
    }
}
