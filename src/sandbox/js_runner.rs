use std::time::{Duration, Instant};

use boa_engine::{Context, Source};

use crate::catalog::EntryPoint;
use crate::codec::{self, Value};
use crate::config::LimitsConfig;

use super::{CandidateRunner, CaseInvoker, ExecFailure};

/// Executes candidate JavaScript with an embedded interpreter.
///
/// Each invocation gets a fresh `Context` (shared-instance exercises get
/// one per run), so candidate code sees only the language built-ins: no
/// host bindings, no filesystem, no network, no timers. Referencing
/// anything else by name is a plain `ReferenceError`.
///
/// The interpreter cannot be preempted mid-eval, so termination is
/// guaranteed by runtime limits (loop iteration, recursion and stack
/// ceilings) rather than by a watchdog; the wall clock only classifies a
/// finished invocation. A loop-ceiling hit is reported as a timeout,
/// since that ceiling is the time budget's deterministic proxy.
pub struct JsRunner {
    limits: LimitsConfig,
}

impl JsRunner {
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }
}

impl CandidateRunner for JsRunner {
    fn check_source(&self, source: &str) -> Result<(), ExecFailure> {
        let mut context = fresh_context(&self.limits);
        context
            .eval(Source::from_bytes(source))
            .map(|_| ())
            .map_err(|e| ExecFailure::Syntax(e.to_string()))
    }

    fn start_run(&self, source: &str, entry: &EntryPoint) -> Box<dyn CaseInvoker> {
        Box::new(JsInvoker {
            limits: self.limits,
            source: source.to_string(),
            entry: entry.clone(),
            shared: None,
        })
    }
}

struct JsInvoker {
    limits: LimitsConfig,
    source: String,
    entry: EntryPoint,
    /// Long-lived context for shared-instance exercises, created on the
    /// first invocation.
    shared: Option<Context>,
}

impl CaseInvoker for JsInvoker {
    fn invoke(&mut self, args: &[Value]) -> Result<Value, ExecFailure> {
        match &self.entry {
            EntryPoint::Class {
                shared_instance: true,
                ..
            } => self.invoke_shared(args),
            _ => self.invoke_fresh(args),
        }
    }
}

const INSTANCE_VAR: &str = "__grading_instance";

impl JsInvoker {
    /// Default mode: fresh context per test case, so cases cannot leak
    /// state into each other through module-level variables.
    fn invoke_fresh(&self, args: &[Value]) -> Result<Value, ExecFailure> {
        let call = match &self.entry {
            EntryPoint::Function { name } => format!("{name}({})", js_argument_list(args)),
            EntryPoint::Class {
                name,
                ctor_args,
                method,
                ..
            } => {
                let split = (*ctor_args).min(args.len());
                format!(
                    "new {name}({}).{method}({})",
                    js_argument_list(&args[..split]),
                    js_argument_list(&args[split..]),
                )
            }
        };
        let script = format!(
            "{}\n;JSON.stringify((function () {{ return {call}; }})())",
            self.source
        );

        let mut context = fresh_context(&self.limits);
        bounded_eval(&mut context, &script, &self.limits)
    }

    /// Shared-instance mode: one context and one instance for the whole
    /// run. The instance is constructed from the first case's leading
    /// arguments; later cases only supply method arguments.
    fn invoke_shared(&mut self, args: &[Value]) -> Result<Value, ExecFailure> {
        let EntryPoint::Class {
            name,
            ctor_args,
            method,
            ..
        } = &self.entry
        else {
            return self.invoke_fresh(args);
        };

        let split = (*ctor_args).min(args.len());
        let script = if self.shared.is_none() {
            let mut context = fresh_context(&self.limits);
            context
                .eval(Source::from_bytes(&self.source))
                .map_err(|e| ExecFailure::Syntax(e.to_string()))?;
            self.shared = Some(context);
            format!(
                "var {INSTANCE_VAR} = new {name}({});\nJSON.stringify({INSTANCE_VAR}.{method}({}))",
                js_argument_list(&args[..split]),
                js_argument_list(&args[split..]),
            )
        } else {
            format!(
                "JSON.stringify({INSTANCE_VAR}.{method}({}))",
                js_argument_list(&args[split..])
            )
        };

        let context = self.shared.as_mut().unwrap();
        bounded_eval(context, &script, &self.limits)
    }
}

fn fresh_context(limits: &LimitsConfig) -> Context {
    let mut context = Context::default();
    let runtime_limits = context.runtime_limits_mut();
    runtime_limits.set_loop_iteration_limit(limits.loop_iteration_limit);
    runtime_limits.set_recursion_limit(limits.recursion_limit);
    runtime_limits.set_stack_size_limit(limits.stack_size_limit);
    context
}

/// Evaluates one script, classifying failures against the limits.
fn bounded_eval(
    context: &mut Context,
    script: &str,
    limits: &LimitsConfig,
) -> Result<Value, ExecFailure> {
    let budget = Duration::from_millis(limits.time_limit.0);
    let start = Instant::now();
    let evaluated = context.eval(Source::from_bytes(script));
    let elapsed = start.elapsed();

    let value = evaluated.map_err(|e| classify_failure(&e.to_string(), elapsed, budget))?;

    if elapsed > budget {
        return Err(ExecFailure::Timeout);
    }

    // JSON.stringify(undefined) is undefined: a candidate that returns
    // nothing serializes as the absent value.
    if value.is_undefined() {
        return Ok(Value::Null);
    }

    let text = value
        .to_string(context)
        .map_err(|e| ExecFailure::Runtime(e.to_string()))?
        .to_std_string_escaped();
    let json: serde_json::Value = serde_json::from_str(&text).map_err(|_| {
        ExecFailure::Runtime(format!("candidate returned a non-serializable value: {text}"))
    })?;

    Ok(codec::from_json(&json))
}

fn classify_failure(message: &str, elapsed: Duration, budget: Duration) -> ExecFailure {
    if message.contains("loop iteration limit") {
        return ExecFailure::Timeout;
    }
    if message.contains("recursive calls") || message.contains("call stack") {
        return ExecFailure::ResourceExceeded(message.to_string());
    }
    if elapsed > budget {
        return ExecFailure::Timeout;
    }
    ExecFailure::Runtime(message.to_string())
}

fn js_argument_list(args: &[Value]) -> String {
    args.iter().map(js_literal).collect::<Vec<_>>().join(", ")
}

/// Renders a codec value as a JavaScript expression.
fn js_literal(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            if n.fract() == 0.0 && n.abs() < 1e15 {
                format!("{}", *n as i64)
            } else {
                format!("{n}")
            }
        }
        // A JSON string literal is a valid JS string literal
        Value::Text(s) => serde_json::to_string(s).unwrap_or_default(),
        Value::Seq(items) => format!("[{}]", js_argument_list(items)),
        Value::Record(fields) => {
            let body = fields
                .iter()
                .map(|(k, v)| {
                    format!(
                        "{}: {}",
                        serde_json::to_string(k).unwrap_or_default(),
                        js_literal(v)
                    )
                })
                .collect::<Vec<_>>()
                .join(", ");
            format!("{{{body}}}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn runner() -> JsRunner {
        JsRunner::new(LimitsConfig::default())
    }

    fn function_entry(name: &str) -> EntryPoint {
        EntryPoint::Function {
            name: name.to_string(),
        }
    }

    #[test]
    fn test_function_invocation() {
        let source = "function add(a, b) { return a + b; }";
        let mut invoker = runner().start_run(source, &function_entry("add"));
        let result = invoker
            .invoke(&[Value::Number(2.0), Value::Number(3.0)])
            .unwrap();
        assert_eq!(result, Value::Number(5.0));
    }

    #[test]
    fn test_string_and_sequence_arguments() {
        let source = "function describe(name, nums) { return name + ':' + nums.length; }";
        let mut invoker = runner().start_run(source, &function_entry("describe"));
        let result = invoker
            .invoke(&[
                Value::Text("xs".to_string()),
                Value::Seq(vec![Value::Number(1.0), Value::Number(2.0)]),
            ])
            .unwrap();
        assert_eq!(result, Value::Text("xs:2".to_string()));
    }

    #[test]
    fn test_syntax_error_detected_at_load() {
        let err = runner().check_source("function broken( {").unwrap_err();
        assert!(matches!(err, ExecFailure::Syntax(_)));
    }

    #[test]
    fn test_thrown_error_becomes_runtime_failure() {
        let source = "function boom() { throw new Error('nope'); }";
        let mut invoker = runner().start_run(source, &function_entry("boom"));
        let err = invoker.invoke(&[]).unwrap_err();
        match err {
            ExecFailure::Runtime(message) => assert!(message.contains("nope")),
            other => panic!("expected runtime failure, got {other:?}"),
        }
    }

    #[test]
    fn test_undefined_reference_is_runtime_failure() {
        // Isolation: host/session symbols simply do not exist in scope.
        let source = "function sneaky() { return sessionController.catalog; }";
        let mut invoker = runner().start_run(source, &function_entry("sneaky"));
        assert!(matches!(
            invoker.invoke(&[]),
            Err(ExecFailure::Runtime(_))
        ));
    }

    #[test]
    fn test_infinite_loop_hits_timeout() {
        let source = "function spin() { while (true) {} }";
        let tight = JsRunner::new(LimitsConfig {
            loop_iteration_limit: 200_000,
            ..LimitsConfig::default()
        });
        let start = Instant::now();
        let mut invoker = tight.start_run(source, &function_entry("spin"));
        let err = invoker.invoke(&[]).unwrap_err();
        assert_eq!(err, ExecFailure::Timeout);
        assert!(start.elapsed() < Duration::from_millis(1500));
    }

    #[test]
    fn test_runaway_recursion_hits_resource_limit() {
        let source = "function deep(n) { return deep(n + 1); }";
        let mut invoker = runner().start_run(source, &function_entry("deep"));
        let err = invoker.invoke(&[Value::Number(0.0)]).unwrap_err();
        assert!(matches!(err, ExecFailure::ResourceExceeded(_)));
    }

    #[test]
    fn test_fresh_context_per_case_shares_no_state() {
        let source = "var count = 0;\nfunction bump() { count += 1; return count; }";
        let mut invoker = runner().start_run(source, &function_entry("bump"));
        assert_eq!(invoker.invoke(&[]).unwrap(), Value::Number(1.0));
        assert_eq!(invoker.invoke(&[]).unwrap(), Value::Number(1.0));
    }

    #[test]
    fn test_shared_instance_keeps_state_across_cases() {
        let source = "class Counter {\n  constructor(start) { this.n = start; }\n  next() { this.n += 1; return this.n; }\n}";
        let entry = EntryPoint::Class {
            name: "Counter".to_string(),
            ctor_args: 1,
            method: "next".to_string(),
            shared_instance: true,
        };
        let mut invoker = runner().start_run(source, &entry);
        assert_eq!(invoker.invoke(&[Value::Number(5.0)]).unwrap(), Value::Number(6.0));
        assert_eq!(invoker.invoke(&[Value::Number(5.0)]).unwrap(), Value::Number(7.0));
    }

    #[test]
    fn test_class_entry_splits_ctor_and_method_args() {
        let source = "class Rectangle {\n  constructor(w, h) { this.w = w; this.h = h; }\n  scaledArea(k) { return this.w * this.h * k; }\n}";
        let entry = EntryPoint::Class {
            name: "Rectangle".to_string(),
            ctor_args: 2,
            method: "scaledArea".to_string(),
            shared_instance: false,
        };
        let mut invoker = runner().start_run(source, &entry);
        let result = invoker
            .invoke(&[Value::Number(4.0), Value::Number(5.0), Value::Number(2.0)])
            .unwrap();
        assert_eq!(result, Value::Number(40.0));
    }

    #[test]
    fn test_record_result_round_trips_in_declared_order() {
        let source = "function maxMin() { return { max: 8, min: 1 }; }";
        let mut invoker = runner().start_run(source, &function_entry("maxMin"));
        let result = invoker.invoke(&[]).unwrap();
        assert_eq!(codec::serialize_value(&result), "8,1");
    }
}
