//! The closed set of gating-rule expressions.
//!
//! The cfgspc `code` clause is deliberately not an open expression language.
//! Every rule is one of three data-driven forms, so evaluation is a pure
//! lookup with no interpreter behind it.

use crate::schema::ParamValue;
use serde::{Serialize, Deserialize};
use std::collections::BTreeMap;

/// A pure boolean function over one parameter value's canonical text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleExpr {
    /// Lookup table keyed by canonical value text. A key with no entry
    /// evaluates false, which keeps `inactive_if`-gated parameters active.
    Truth(BTreeMap<String, bool>),
    /// True when the canonical text equals the operand.
    Equals(String),
    /// True when the canonical text is one of the operands.
    OneOf(Vec<String>),
}

impl RuleExpr {
    /// The yes/no negation table, the most common rule in task schemas:
    /// `{"yes": False, "no": True}`.
    pub fn negation() -> Self {
        let mut table = BTreeMap::new();
        table.insert("yes".to_string(), false);
        table.insert("no".to_string(), true);
        RuleExpr::Truth(table)
    }

    pub fn eval(&self, value: &ParamValue) -> bool {
        let key = value.rule_key();
        match self {
            RuleExpr::Truth(table) => table.get(&key).copied().unwrap_or(false),
            RuleExpr::Equals(expected) => key == *expected,
            RuleExpr::OneOf(allowed) => allowed.iter().any(|a| *a == key),
        }
    }
}
