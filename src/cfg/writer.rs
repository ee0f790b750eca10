//! Serializes a registry back to cfgspc text.
//!
//! The writer flattens sections: parameters are emitted in declaration
//! order, then one `[_RULES_]` section. Re-parsing the output yields an
//! identical set of names, kinds, defaults, rules and gates.

use crate::rules::RuleExpr;
use crate::schema::{ParamKind, ParamValue, SchemaRegistry};
use std::fmt::Write;

pub fn to_cfg_string(registry: &SchemaRegistry) -> String {
    let mut out = String::new();
    for d in registry.descriptors() {
        let _ = write!(out, "{} = {}(", d.name, d.kind.constructor());
        if let ParamKind::Choice { allowed } = d.kind {
            for choice in allowed {
                let _ = write!(out, "{}, ", choice);
            }
        }
        let _ = write!(out, "default={}", default_text(d.kind, d.default));
        if let Some(rid) = d.triggers {
            let _ = write!(out, ", triggers={}", quote(registry.rule_name(rid)));
        }
        if let Some((rid, mode)) = d.gate {
            let _ = write!(out, ", {}={}", mode.keyword(), quote(registry.rule_name(rid)));
        }
        if let Some(comment) = d.comment {
            let _ = write!(out, ", comment={}", quote(comment));
        }
        let _ = writeln!(out, ")");
    }

    if registry.rule_count() > 0 {
        let _ = writeln!(out, "\n[_RULES_]");
        for (name, expr, when, _) in registry.rule_declarations() {
            let _ = writeln!(
                out,
                "{} = string_kw(default='', when={}, code={})",
                name,
                quote(&when_text(when)),
                quote(&code_text(expr)),
            );
        }
    }
    out
}

fn default_text(kind: &ParamKind, value: &ParamValue) -> String {
    match kind {
        // Bare text would re-parse with surrounding whitespace or commas
        // lost, so plain strings are always quoted.
        ParamKind::Str => quote(&value.cfg_text()),
        _ => value.cfg_text(),
    }
}

fn when_text(when: crate::schema::RecomputeWhen) -> String {
    let mut contexts = Vec::new();
    if when.on_defaults {
        contexts.push("defaults");
    }
    if when.on_entry {
        contexts.push("entry");
    }
    contexts.join(",")
}

/// Inner quoting is always double so the clause nests inside the
/// single-quoted `code` argument.
fn code_text(expr: &RuleExpr) -> String {
    match expr {
        RuleExpr::Truth(table) => {
            let entries: Vec<String> = table
                .iter()
                .map(|(k, v)| format!("\"{}\": {}", k, if *v { "True" } else { "False" }))
                .collect();
            format!("{{{}}}", entries.join(", "))
        }
        RuleExpr::Equals(expected) => format!("value == \"{}\"", expected),
        RuleExpr::OneOf(allowed) => {
            let items: Vec<String> = allowed.iter().map(|a| format!("\"{}\"", a)).collect();
            format!("value in ({})", items.join(", "))
        }
    }
}

fn quote(s: &str) -> String {
    if s.contains('\'') {
        format!("\"{}\"", s)
    } else {
        format!("'{}'", s)
    }
}
