//! Ordered default-rule engine
//!
//! An [`OptionsDefaulter`] holds an append-only list of rules and evaluates
//! them strictly in registration order against a copy of the raw options.
//!
//! ## Ordering contract
//!
//! Registration order is also dependency order. A compute rule may read any
//! field of the working options, but a field whose rule is registered *after*
//! the reader is still undefined when the reader runs. Readers declare the
//! paths they read so [`OptionsDefaulter::ordering_hazards`] can report such
//! reads when the rule set is assembled. Evaluation itself does not check.

use std::sync::Arc;
use std::time::Instant;

use crate::errors::{PackrigError, Result};
use crate::value::{lookup_segments, OptionMap, OptionValue, Shape};
use crate::{log_op_end, log_op_error, log_op_start};

type TransformFn = dyn for<'a> Fn(Shape<'a>, &'a OptionMap) -> anyhow::Result<Option<OptionValue>>
    + Send
    + Sync;
type ComputeFn = dyn Fn(&OptionMap) -> anyhow::Result<OptionValue> + Send + Sync;

/// How a rule produces its value
#[derive(Clone)]
pub enum RuleKind {
    /// Fills the path with a copy of the value when it is undefined
    Literal(OptionValue),
    /// Replaces the path unconditionally; returning `None` leaves it undefined
    Transform(Arc<TransformFn>),
    /// Fills the path from the working options when it is undefined
    Compute(Arc<ComputeFn>),
}

impl RuleKind {
    pub fn label(&self) -> &'static str {
        match self {
            RuleKind::Literal(_) => "literal",
            RuleKind::Transform(_) => "transform",
            RuleKind::Compute(_) => "compute",
        }
    }
}

/// One default rule
#[derive(Clone)]
pub struct Rule {
    path: Vec<String>,
    reads: Vec<Vec<String>>,
    kind: RuleKind,
}

fn split_path(path: &str) -> Vec<String> {
    path.split('.').map(str::to_string).collect()
}

impl Rule {
    pub fn new(path: &str, kind: RuleKind) -> Self {
        Self {
            path: split_path(path),
            reads: Vec::new(),
            kind,
        }
    }

    /// Declare the paths this rule reads from the working options
    pub fn reading(mut self, reads: &[&str]) -> Self {
        self.reads = reads.iter().map(|r| split_path(r)).collect();
        self
    }

    pub fn path(&self) -> String {
        self.path.join(".")
    }

    pub fn reads(&self) -> Vec<String> {
        self.reads.iter().map(|r| r.join(".")).collect()
    }

    pub fn kind(&self) -> &RuleKind {
        &self.kind
    }
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("path", &self.path())
            .field("kind", &self.kind.label())
            .field("reads", &self.reads())
            .finish()
    }
}

/// A declared read that observes a path registered after its reader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderingHazard {
    pub rule_path: String,
    pub rule_index: usize,
    pub read_path: String,
    pub writer_index: usize,
}

impl std::fmt::Display for OrderingHazard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "rule #{} '{}' reads '{}', which rule #{} writes later",
            self.rule_index, self.rule_path, self.read_path, self.writer_index
        )
    }
}

/// Two paths overlap when one is a prefix of the other
fn overlaps(a: &[String], b: &[String]) -> bool {
    let n = a.len().min(b.len());
    a[..n] == b[..n]
}

/// Ordered rule store and evaluator
#[derive(Clone, Default)]
pub struct OptionsDefaulter {
    rules: Vec<Rule>,
}

impl OptionsDefaulter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule; duplicate paths are allowed and simply run later
    pub fn register(&mut self, rule: Rule) -> &mut Self {
        self.rules.push(rule);
        self
    }

    pub fn set_literal(&mut self, path: &str, value: impl Into<OptionValue>) -> &mut Self {
        self.register(Rule::new(path, RuleKind::Literal(value.into())))
    }

    pub fn set_transform<F>(&mut self, path: &str, reads: &[&str], transform: F) -> &mut Self
    where
        F: for<'a> Fn(Shape<'a>, &'a OptionMap) -> anyhow::Result<Option<OptionValue>>
            + Send
            + Sync
            + 'static,
    {
        self.register(Rule::new(path, RuleKind::Transform(Arc::new(transform))).reading(reads))
    }

    pub fn set_compute<F>(&mut self, path: &str, reads: &[&str], compute: F) -> &mut Self
    where
        F: Fn(&OptionMap) -> anyhow::Result<OptionValue> + Send + Sync + 'static,
    {
        self.register(Rule::new(path, RuleKind::Compute(Arc::new(compute))).reading(reads))
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Report every declared read of a path that a later rule writes
    ///
    /// Reads of paths no rule writes (pure input fields such as `mode`) are
    /// not hazards.
    pub fn ordering_hazards(&self) -> Vec<OrderingHazard> {
        let mut hazards = Vec::new();
        for (rule_index, rule) in self.rules.iter().enumerate() {
            for read in &rule.reads {
                let later_writer = self.rules[rule_index + 1..]
                    .iter()
                    .position(|other| overlaps(&other.path, read));
                if let Some(offset) = later_writer {
                    hazards.push(OrderingHazard {
                        rule_path: rule.path(),
                        rule_index,
                        read_path: read.join("."),
                        writer_index: rule_index + 1 + offset,
                    });
                }
            }
        }
        hazards
    }

    /// Resolve defaults for `raw`, returning a new option tree
    ///
    /// `raw` is never modified. The first failing rule aborts evaluation and
    /// no partial result is returned.
    pub fn apply(&self, raw: &OptionMap) -> Result<OptionMap> {
        let start = Instant::now();
        log_op_start!("apply_defaults", rule_count = self.rules.len());

        let mut working = raw.clone();
        for rule in &self.rules {
            if let Err(err) = apply_rule(rule, &mut working) {
                log_op_error!(
                    "apply_defaults",
                    err,
                    duration_ms = start.elapsed().as_millis() as u64,
                    rule_path = %rule.path()
                );
                return Err(err);
            }
        }

        log_op_end!(
            "apply_defaults",
            duration_ms = start.elapsed().as_millis() as u64
        );
        Ok(working)
    }
}

fn apply_rule(rule: &Rule, working: &mut OptionMap) -> Result<()> {
    let current = lookup_segments(working, &rule.path);
    match &rule.kind {
        RuleKind::Literal(value) => {
            if current.is_none() {
                assign(working, &rule.path, Some(value.clone()));
            }
        }
        RuleKind::Compute(compute) => {
            if current.is_none() {
                let value = compute(working).map_err(|source| PackrigError::RuleEvaluation {
                    path: rule.path(),
                    source,
                })?;
                assign(working, &rule.path, Some(value));
            }
        }
        RuleKind::Transform(transform) => {
            let value = transform(Shape::of(current), working).map_err(|source| {
                PackrigError::RuleEvaluation {
                    path: rule.path(),
                    source,
                }
            })?;
            assign(working, &rule.path, value);
        }
    }
    Ok(())
}

/// Write `value` at `path`, creating intermediate objects
///
/// An intermediate that is defined but not an object (`false`, a string, an
/// array) blocks the write; a `null` intermediate is replaced by an object.
/// `None` removes the key. Returns whether the tree was reached.
fn assign(root: &mut OptionMap, path: &[String], value: Option<OptionValue>) -> bool {
    let Some((last, parents)) = path.split_last() else {
        return false;
    };

    let mut current = root;
    for segment in parents {
        let slot = current
            .entry(segment.clone())
            .or_insert_with(|| OptionValue::Object(OptionMap::new()));
        if matches!(slot, OptionValue::Null) {
            *slot = OptionValue::Object(OptionMap::new());
        }
        match slot {
            OptionValue::Object(map) => current = map,
            _ => {
                tracing::trace!(rule_path = %path.join("."), "parent is not an object, skipping");
                return false;
            }
        }
    }

    match value {
        Some(value) => {
            current.insert(last.clone(), value);
        }
        None => {
            current.remove(last);
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::lookup;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn raw(json: serde_json::Value) -> OptionMap {
        match OptionValue::from(json) {
            OptionValue::Object(map) => map,
            _ => unreachable!("test input must be an object"),
        }
    }

    #[test]
    fn test_literal_fills_only_undefined() {
        let mut engine = OptionsDefaulter::new();
        engine.set_literal("target", "web");
        engine.set_literal("output.filename", "[name].js");

        let resolved = engine
            .apply(&raw(serde_json::json!({"target": "node"})))
            .unwrap();
        assert_eq!(resolved["target"], OptionValue::from("node"));
        assert_eq!(
            lookup(&resolved, "output.filename"),
            Some(&OptionValue::from("[name].js"))
        );
    }

    #[test]
    fn test_null_counts_as_defined_leaf() {
        let mut engine = OptionsDefaulter::new();
        engine.set_literal("devtool", "eval");

        let resolved = engine.apply(&raw(serde_json::json!({"devtool": null}))).unwrap();
        assert_eq!(resolved["devtool"], OptionValue::Null);
    }

    #[test]
    fn test_transform_always_runs() {
        let mut engine = OptionsDefaulter::new();
        engine.set_transform("name", &[], |shape, _| {
            Ok(Some(match shape {
                Shape::Scalar(OptionValue::String(s)) => OptionValue::from(s.to_uppercase()),
                _ => OptionValue::from("DEFAULT"),
            }))
        });

        let given = engine.apply(&raw(serde_json::json!({"name": "app"}))).unwrap();
        assert_eq!(given["name"], OptionValue::from("APP"));
        let absent = engine.apply(&OptionMap::new()).unwrap();
        assert_eq!(absent["name"], OptionValue::from("DEFAULT"));
    }

    #[test]
    fn test_transform_returning_none_leaves_undefined() {
        let mut engine = OptionsDefaulter::new();
        engine.set_transform("maybe", &[], |_, _| Ok(None));
        let resolved = engine.apply(&raw(serde_json::json!({"maybe": 1}))).unwrap();
        assert!(!resolved.contains_key("maybe"));
    }

    #[test]
    fn test_non_object_parent_blocks_children() {
        let mut engine = OptionsDefaulter::new();
        engine.set_literal("node.process", true);

        let resolved = engine.apply(&raw(serde_json::json!({"node": false}))).unwrap();
        assert_eq!(resolved["node"], OptionValue::Bool(false));
    }

    #[test]
    fn test_null_parent_replaced_by_object() {
        let mut engine = OptionsDefaulter::new();
        engine.set_literal("resolve.unsafeCache", true);

        let resolved = engine.apply(&raw(serde_json::json!({"resolve": null}))).unwrap();
        assert_eq!(
            lookup(&resolved, "resolve.unsafeCache"),
            Some(&OptionValue::Bool(true))
        );
    }

    #[test]
    fn test_failing_rule_aborts_with_path() {
        let mut engine = OptionsDefaulter::new();
        engine.set_compute("broken", &[], |_| Err(anyhow::anyhow!("cannot compute")));
        engine.set_literal("after", true);

        let err = engine.apply(&OptionMap::new()).unwrap_err();
        match err {
            PackrigError::RuleEvaluation { path, source } => {
                assert_eq!(path, "broken");
                assert_eq!(source.to_string(), "cannot compute");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_failing_transform_stops_later_rules() {
        let later_runs = Arc::new(AtomicUsize::new(0));
        let counter = later_runs.clone();
        let mut engine = OptionsDefaulter::new();
        engine.set_transform("output.library", &[], |_, _| anyhow::bail!("bad library"));
        engine.set_literal("after", true);
        engine.set_compute("counted", &[], move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(OptionValue::Bool(true))
        });

        let err = engine
            .apply(&raw(serde_json::json!({"output": {"library": "lib"}})))
            .unwrap_err();
        match err {
            PackrigError::RuleEvaluation { path, source } => {
                assert_eq!(path, "output.library");
                assert_eq!(source.to_string(), "bad library");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(later_runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_duplicate_path_later_rule_sees_defined_value() {
        let mut engine = OptionsDefaulter::new();
        engine.set_literal("target", "web");
        engine.set_literal("target", "node");

        let resolved = engine.apply(&OptionMap::new()).unwrap();
        assert_eq!(resolved["target"], OptionValue::from("web"));
    }

    #[test]
    fn test_ordering_hazard_reported() {
        let mut engine = OptionsDefaulter::new();
        engine.set_literal("output", OptionValue::Object(OptionMap::new()));
        engine.set_compute("output.chunkFilename", &["output.filename"], |_| {
            Ok(OptionValue::from("[id].js"))
        });
        engine.set_literal("output.filename", "[name].js");
        engine.set_compute("cache", &["mode"], |_| Ok(OptionValue::Bool(false)));

        let hazards = engine.ordering_hazards();
        assert_eq!(hazards.len(), 1);
        assert_eq!(hazards[0].rule_path, "output.chunkFilename");
        assert_eq!(hazards[0].read_path, "output.filename");
        assert_eq!(hazards[0].writer_index, 2);
    }

    #[test]
    fn test_overlap_covers_ancestors_and_descendants() {
        let a = split_path("output");
        let b = split_path("output.filename");
        let c = split_path("outputs");
        assert!(overlaps(&a, &b));
        assert!(overlaps(&b, &a));
        assert!(!overlaps(&a, &c));
    }
}
