use super::error::SchemaError;
use super::types::*;
use crate::rules::RuleExpr;
use serde::{Serialize, Deserialize};
use smallvec::SmallVec;
use std::collections::HashMap;

/// Inputs of a rule; almost always a single triggering parameter.
pub type RuleInputs = SmallVec<[ParamId; 2]>;

/// A task-parameter schema: typed descriptors plus the gating rules that
/// drive conditional activation.
///
/// Storage is columnar and id-indexed; declaration order is the storage
/// order, which makes snapshot and recomputation order deterministic.
/// Every mutating operation validates fully before touching any column, so
/// a failed call leaves the registry unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaRegistry {
    // Columnar parameter arrays (declaration order)
    names: Vec<String>,
    kinds: Vec<ParamKind>,
    defaults: Vec<ParamValue>,
    values: Vec<ParamValue>,
    comments: Vec<Option<String>>,
    triggers: Vec<Option<RuleId>>,
    gates: Vec<Option<(RuleId, GateMode)>>,
    active: Vec<bool>,

    // Columnar rule arrays (declaration order)
    rule_names: Vec<String>,
    rule_inputs: Vec<RuleInputs>,
    rule_exprs: Vec<RuleExpr>,
    rule_when: Vec<RecomputeWhen>,
    rule_outputs: Vec<bool>,

    // Name indices (not serialized, rebuilt on load)
    #[serde(skip)]
    param_index: HashMap<String, ParamId>,
    #[serde(skip)]
    rule_index: HashMap<String, RuleId>,
}

impl SchemaRegistry {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.names.len() }
    pub fn is_empty(&self) -> bool { self.names.is_empty() }
    pub fn rule_count(&self) -> usize { self.rule_names.len() }

    /// Rebuilds the name indices after deserialization.
    pub fn rebuild_name_cache(&mut self) {
        self.param_index = self
            .names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), ParamId::new(i)))
            .collect();
        self.rule_index = self
            .rule_names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), RuleId::new(i)))
            .collect();
    }

    /// Registers a parameter descriptor. The default is validated against
    /// the kind before anything is stored.
    pub fn define(
        &mut self,
        name: &str,
        kind: ParamKind,
        default: ParamValue,
        comment: Option<&str>,
    ) -> Result<ParamId, SchemaError> {
        // Parameter and rule names share one namespace.
        if self.param_index.contains_key(name) || self.rule_index.contains_key(name) {
            return Err(SchemaError::DuplicateParameter(name.to_string()));
        }
        if !kind.matches(&default) {
            return Err(SchemaError::InvalidDefault {
                name: name.to_string(),
                msg: format!("expected a {} value, got {}", kind.name(), default.kind_name()),
            });
        }
        if let ParamKind::Choice { allowed } = &kind {
            if allowed.is_empty() {
                return Err(SchemaError::InvalidDefault {
                    name: name.to_string(),
                    msg: "option parameter declares no choices".to_string(),
                });
            }
            if let ParamValue::Str(d) = &default {
                if !allowed.iter().any(|a| a == d) {
                    return Err(SchemaError::InvalidDefault {
                        name: name.to_string(),
                        msg: format!("'{}' is not among the declared choices", d),
                    });
                }
            }
        }

        let id = ParamId::new(self.names.len());
        self.param_index.insert(name.to_string(), id);
        self.names.push(name.to_string());
        self.kinds.push(kind);
        self.values.push(default.clone());
        self.defaults.push(default);
        self.comments.push(comment.map(str::to_string));
        self.triggers.push(None);
        self.gates.push(None);
        self.active.push(true);
        Ok(id)
    }

    /// Registers a rule fed by the named input parameters. Each input gets
    /// its `triggers` back-link set to the new rule.
    ///
    /// When the rule's `when` contexts include default load, its output is
    /// computed immediately from the inputs' current values; otherwise it
    /// starts false and stays so until the first qualifying `set_value`.
    pub fn define_rule(
        &mut self,
        name: &str,
        inputs: &[&str],
        expr: RuleExpr,
        when: RecomputeWhen,
    ) -> Result<RuleId, SchemaError> {
        if self.rule_index.contains_key(name) || self.param_index.contains_key(name) {
            return Err(SchemaError::DuplicateRule(name.to_string()));
        }
        let mut input_ids: RuleInputs = SmallVec::new();
        for input in inputs {
            let pid = self.param_id(input)?;
            input_ids.push(pid);
        }

        let id = RuleId::new(self.rule_names.len());
        for &pid in &input_ids {
            self.triggers[pid.index()] = Some(id);
        }
        let output = if when.on_defaults {
            Self::eval_rule(&expr, &input_ids, &self.values)
        } else {
            false
        };
        self.rule_index.insert(name.to_string(), id);
        self.rule_names.push(name.to_string());
        self.rule_inputs.push(input_ids);
        self.rule_exprs.push(expr);
        self.rule_when.push(when);
        self.rule_outputs.push(output);
        Ok(id)
    }

    /// Links a parameter's activation state to a rule's output. A second
    /// gate on the same parameter replaces the first.
    pub fn attach_gate(
        &mut self,
        parameter: &str,
        rule: &str,
        mode: GateMode,
    ) -> Result<(), SchemaError> {
        let pid = self.param_id(parameter)?;
        let rid = self.rule_id(rule)?;
        self.gates[pid.index()] = Some((rid, mode));
        self.refresh_activation(pid);
        Ok(())
    }

    /// Validates and records a user-supplied value, then recomputes exactly
    /// the rules reading this parameter and the activation of exactly the
    /// parameters they gate, in declaration order.
    pub fn set_value(&mut self, parameter: &str, value: ParamValue) -> Result<(), SchemaError> {
        let pid = self.param_id(parameter)?;
        let idx = pid.index();
        let kind = &self.kinds[idx];
        if !kind.matches(&value) {
            return Err(SchemaError::TypeMismatch {
                name: parameter.to_string(),
                expected: kind.name(),
                got: value.kind_name(),
            });
        }
        if let (ParamKind::Choice { allowed }, ParamValue::Str(v)) = (kind, &value) {
            if !allowed.iter().any(|a| a == v) {
                return Err(SchemaError::ValueNotAllowed {
                    name: parameter.to_string(),
                    value: v.clone(),
                    allowed: allowed.join(", "),
                });
            }
        }
        self.values[idx] = value;

        // Recompute the affected rules, then the parameters they gate.
        let mut affected: SmallVec<[RuleId; 4]> = SmallVec::new();
        for rid in 0..self.rule_names.len() {
            if !self.rule_when[rid].on_entry {
                continue;
            }
            if self.rule_inputs[rid].contains(&pid) {
                self.rule_outputs[rid] =
                    Self::eval_rule(&self.rule_exprs[rid], &self.rule_inputs[rid], &self.values);
                affected.push(RuleId::new(rid));
            }
        }
        for p in 0..self.names.len() {
            if let Some((rid, _)) = self.gates[p] {
                if affected.contains(&rid) {
                    self.refresh_activation(ParamId::new(p));
                }
            }
        }
        Ok(())
    }

    pub fn is_active(&self, parameter: &str) -> Result<bool, SchemaError> {
        Ok(self.active[self.param_id(parameter)?.index()])
    }

    /// True when a `RequiredIf` gate's rule currently evaluates true.
    pub fn is_required(&self, parameter: &str) -> Result<bool, SchemaError> {
        let pid = self.param_id(parameter)?;
        Ok(match self.gates[pid.index()] {
            Some((rid, GateMode::RequiredIf)) => self.rule_outputs[rid.index()],
            _ => false,
        })
    }

    pub fn value(&self, parameter: &str) -> Result<&ParamValue, SchemaError> {
        Ok(&self.values[self.param_id(parameter)?.index()])
    }

    /// Current boolean output of a named rule.
    pub fn rule_output(&self, rule: &str) -> Result<bool, SchemaError> {
        Ok(self.rule_outputs[self.rule_id(rule)?.index()])
    }

    pub fn descriptor(&self, parameter: &str) -> Result<ParameterDescriptor<'_>, SchemaError> {
        let idx = self.param_id(parameter)?.index();
        Ok(ParameterDescriptor {
            name: &self.names[idx],
            kind: &self.kinds[idx],
            default: &self.defaults[idx],
            value: &self.values[idx],
            comment: self.comments[idx].as_deref(),
            triggers: self.triggers[idx],
            gate: self.gates[idx],
        })
    }

    /// All descriptors in declaration order.
    pub fn descriptors(&self) -> impl Iterator<Item = ParameterDescriptor<'_>> {
        (0..self.names.len()).map(move |idx| ParameterDescriptor {
            name: &self.names[idx],
            kind: &self.kinds[idx],
            default: &self.defaults[idx],
            value: &self.values[idx],
            comment: self.comments[idx].as_deref(),
            triggers: self.triggers[idx],
            gate: self.gates[idx],
        })
    }

    /// Rule declarations in declaration order: (name, expr, when, inputs).
    pub fn rule_declarations(
        &self,
    ) -> impl Iterator<Item = (&str, &RuleExpr, RecomputeWhen, &[ParamId])> {
        (0..self.rule_names.len()).map(move |idx| {
            (
                self.rule_names[idx].as_str(),
                &self.rule_exprs[idx],
                self.rule_when[idx],
                self.rule_inputs[idx].as_slice(),
            )
        })
    }

    pub fn param_name(&self, id: ParamId) -> &str { &self.names[id.index()] }
    pub fn rule_name(&self, id: RuleId) -> &str { &self.rule_names[id.index()] }

    /// Owned, immutable view of every parameter's value and activation, in
    /// declaration order. Safe to hand to other threads.
    pub fn snapshot(&self) -> SchemaSnapshot {
        SchemaSnapshot {
            entries: (0..self.names.len())
                .map(|i| SnapshotEntry {
                    name: self.names[i].clone(),
                    value: self.values[i].clone(),
                    active: self.active[i],
                })
                .collect(),
        }
    }

    fn param_id(&self, name: &str) -> Result<ParamId, SchemaError> {
        self.param_index
            .get(name)
            .copied()
            .ok_or_else(|| SchemaError::UnknownParameter(name.to_string()))
    }

    fn rule_id(&self, name: &str) -> Result<RuleId, SchemaError> {
        self.rule_index
            .get(name)
            .copied()
            .ok_or_else(|| SchemaError::UnknownRule(name.to_string()))
    }

    /// A rule with several inputs is true when its expression holds for any
    /// of them; the single-input case is the overwhelmingly common one.
    fn eval_rule(expr: &RuleExpr, inputs: &RuleInputs, values: &[ParamValue]) -> bool {
        inputs.iter().any(|pid| expr.eval(&values[pid.index()]))
    }

    fn refresh_activation(&mut self, pid: ParamId) {
        let idx = pid.index();
        self.active[idx] = match self.gates[idx] {
            Some((rid, GateMode::InactiveIf)) => !self.rule_outputs[rid.index()],
            // RequiredIf never suppresses; absence of a gate never does.
            _ => true,
        };
    }
}

/// Immutable capture of (name, value, active) for every parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    entries: Vec<SnapshotEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub name: String,
    pub value: ParamValue,
    pub active: bool,
}

impl SchemaSnapshot {
    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = &SnapshotEntry> {
        self.entries.iter()
    }

    pub fn get(&self, name: &str) -> Option<&SnapshotEntry> {
        self.entries.iter().find(|e| e.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blot_like_schema() -> SchemaRegistry {
        let mut reg = SchemaRegistry::new();
        reg.define("addsky", ParamKind::Bool, ParamValue::Bool(true), Some("Add back a sky value?"))
            .unwrap();
        reg.define(
            "skyval",
            ParamKind::FloatOrNone,
            ParamValue::MaybeFloat(None),
            Some("Custom sky value to add"),
        )
        .unwrap();
        reg.define_rule("_rule5_", &["addsky"], RuleExpr::negation(), RecomputeWhen::default())
            .unwrap();
        reg.attach_gate("skyval", "_rule5_", GateMode::InactiveIf).unwrap();
        reg
    }

    #[test]
    fn test_define_reflects_default_and_active() {
        let mut reg = SchemaRegistry::new();
        reg.define("scale", ParamKind::Float, ParamValue::Float(1.0), None).unwrap();
        let snap = reg.snapshot();
        let entry = snap.get("scale").unwrap();
        assert_eq!(entry.value, ParamValue::Float(1.0));
        assert!(entry.active);
    }

    #[test]
    fn test_duplicate_parameter_rejected() {
        let mut reg = SchemaRegistry::new();
        reg.define("scale", ParamKind::Float, ParamValue::Float(1.0), None).unwrap();
        let err = reg.define("scale", ParamKind::Float, ParamValue::Float(2.0), None).unwrap_err();
        assert_eq!(err, SchemaError::DuplicateParameter("scale".to_string()));
        // Failed define leaves the registry unchanged.
        assert_eq!(reg.len(), 1);
        assert_eq!(*reg.value("scale").unwrap(), ParamValue::Float(1.0));
    }

    #[test]
    fn test_invalid_default_rejected() {
        let mut reg = SchemaRegistry::new();
        let err = reg
            .define("coeffs", ParamKind::Bool, ParamValue::Float(1.0), None)
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidDefault { .. }));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_option_default_must_be_among_choices() {
        let mut reg = SchemaRegistry::new();
        let kind = ParamKind::Choice {
            allowed: vec!["cps".to_string(), "counts".to_string()],
        };
        let err = reg
            .define("in_units", kind, ParamValue::Str("electrons".to_string()), None)
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidDefault { .. }));
    }

    #[test]
    fn test_interpol_rejects_value_outside_choices() {
        let mut reg = SchemaRegistry::new();
        let kind = ParamKind::Choice {
            allowed: ["nearest", "linear", "poly3", "poly5", "spline3", "sinc"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        };
        reg.define("interpol", kind, ParamValue::Str("poly5".to_string()), None).unwrap();

        let err = reg
            .set_value("interpol", ParamValue::Str("bicubic".to_string()))
            .unwrap_err();
        assert!(matches!(err, SchemaError::ValueNotAllowed { .. }));
        // Prior value untouched.
        assert_eq!(*reg.value("interpol").unwrap(), ParamValue::Str("poly5".to_string()));
    }

    #[test]
    fn test_set_value_type_mismatch() {
        let mut reg = SchemaRegistry::new();
        reg.define("scale", ParamKind::Float, ParamValue::Float(1.0), None).unwrap();
        let err = reg.set_value("scale", ParamValue::Bool(true)).unwrap_err();
        assert_eq!(
            err,
            SchemaError::TypeMismatch { name: "scale".to_string(), expected: "float", got: "boolean" }
        );
        assert_eq!(*reg.value("scale").unwrap(), ParamValue::Float(1.0));
    }

    #[test]
    fn test_addsky_negation_gates_skyval() {
        let mut reg = blot_like_schema();

        // Default addsky=yes: rule maps yes -> false, so skyval stays active.
        assert!(!reg.rule_output("_rule5_").unwrap());
        assert!(reg.is_active("skyval").unwrap());

        // addsky=no: rule true, skyval suppressed.
        reg.set_value("addsky", ParamValue::Bool(false)).unwrap();
        assert!(reg.rule_output("_rule5_").unwrap());
        assert!(!reg.is_active("skyval").unwrap());

        // Back to yes: skyval reappears.
        reg.set_value("addsky", ParamValue::Bool(true)).unwrap();
        assert!(reg.is_active("skyval").unwrap());
    }

    #[test]
    fn test_snapshot_tracks_activation() {
        let mut reg = blot_like_schema();
        reg.set_value("addsky", ParamValue::Bool(false)).unwrap();
        let snap = reg.snapshot();
        assert!(!snap.get("skyval").unwrap().active);
        assert!(snap.get("addsky").unwrap().active);

        // Snapshot is a detached copy: later mutation does not leak in.
        reg.set_value("addsky", ParamValue::Bool(true)).unwrap();
        assert!(!snap.get("skyval").unwrap().active);
    }

    #[test]
    fn test_unrelated_set_does_not_touch_rules() {
        let mut reg = blot_like_schema();
        reg.define("scale", ParamKind::Float, ParamValue::Float(1.0), None).unwrap();
        reg.set_value("addsky", ParamValue::Bool(false)).unwrap();
        assert!(!reg.is_active("skyval").unwrap());

        // scale feeds no rule; skyval's suppression must survive.
        reg.set_value("scale", ParamValue::Float(0.5)).unwrap();
        assert!(!reg.is_active("skyval").unwrap());
    }

    #[test]
    fn test_required_if_never_deactivates() {
        let mut reg = SchemaRegistry::new();
        reg.define("expout", ParamKind::Str, ParamValue::Str(String::new()), None).unwrap();
        reg.define("expkey", ParamKind::Str, ParamValue::Str("exptime".to_string()), None)
            .unwrap();
        reg.define_rule(
            "_rule1_",
            &["expout"],
            RuleExpr::Equals("compute".to_string()),
            RecomputeWhen::default(),
        )
        .unwrap();
        reg.attach_gate("expkey", "_rule1_", GateMode::RequiredIf).unwrap();

        assert!(reg.is_active("expkey").unwrap());
        assert!(!reg.is_required("expkey").unwrap());

        reg.set_value("expout", ParamValue::Str("compute".to_string())).unwrap();
        assert!(reg.is_active("expkey").unwrap());
        assert!(reg.is_required("expkey").unwrap());
    }

    #[test]
    fn test_rule_name_collisions() {
        let mut reg = blot_like_schema();
        let err = reg
            .define_rule("_rule5_", &["addsky"], RuleExpr::negation(), RecomputeWhen::default())
            .unwrap_err();
        assert_eq!(err, SchemaError::DuplicateRule("_rule5_".to_string()));

        // Rule names and parameter names share a namespace.
        let err = reg
            .define_rule("addsky", &["addsky"], RuleExpr::negation(), RecomputeWhen::default())
            .unwrap_err();
        assert_eq!(err, SchemaError::DuplicateRule("addsky".to_string()));
        let err = reg
            .define("_rule5_", ParamKind::Bool, ParamValue::Bool(true), None)
            .unwrap_err();
        assert_eq!(err, SchemaError::DuplicateParameter("_rule5_".to_string()));
    }

    #[test]
    fn test_rule_with_unknown_input() {
        let mut reg = SchemaRegistry::new();
        let err = reg
            .define_rule("_rule5_", &["addsky"], RuleExpr::negation(), RecomputeWhen::default())
            .unwrap_err();
        assert_eq!(err, SchemaError::UnknownParameter("addsky".to_string()));
        assert_eq!(reg.rule_count(), 0);
    }

    #[test]
    fn test_gate_bad_references() {
        let mut reg = blot_like_schema();
        assert_eq!(
            reg.attach_gate("nosuch", "_rule5_", GateMode::InactiveIf).unwrap_err(),
            SchemaError::UnknownParameter("nosuch".to_string())
        );
        assert_eq!(
            reg.attach_gate("skyval", "_rule9_", GateMode::InactiveIf).unwrap_err(),
            SchemaError::UnknownRule("_rule9_".to_string())
        );
    }

    #[test]
    fn test_entry_only_rule_skips_default_load() {
        let mut reg = SchemaRegistry::new();
        reg.define("addsky", ParamKind::Bool, ParamValue::Bool(false), None).unwrap();
        reg.define("skyval", ParamKind::Float, ParamValue::Float(0.0), None).unwrap();
        // Not recomputed on defaults: starts false even though addsky=no.
        reg.define_rule(
            "_rule5_",
            &["addsky"],
            RuleExpr::negation(),
            RecomputeWhen { on_defaults: false, on_entry: true },
        )
        .unwrap();
        reg.attach_gate("skyval", "_rule5_", GateMode::InactiveIf).unwrap();
        assert!(reg.is_active("skyval").unwrap());

        // First user entry recomputes it.
        reg.set_value("addsky", ParamValue::Bool(false)).unwrap();
        assert!(!reg.is_active("skyval").unwrap());
    }

    #[test]
    fn test_serde_round_trip_with_cache_rebuild() {
        let reg = blot_like_schema();
        let json = serde_json::to_string(&reg).unwrap();
        let mut restored: SchemaRegistry = serde_json::from_str(&json).unwrap();
        restored.rebuild_name_cache();
        assert!(restored.is_active("skyval").unwrap());
        assert_eq!(restored.snapshot(), reg.snapshot());
    }
}
