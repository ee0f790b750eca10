//! Parser for the sectioned cfgspc text format.
//!
//! Declarations take the form `key = type_constructor(args…)`, grouped under
//! `[section]` headers that are purely organizational except for the
//! reserved `[_RULES_]` section. Quoting uses single or double quotes with
//! no escape sequences; commas inside quotes do not split arguments.
//!
//! Loading is two-phase: every declaration is read first, then parameters,
//! rules, and gate links are registered in that order. Forward references
//! within one file are therefore legal, and any failure aborts the load.

use super::error::ParseError;
use crate::rules::RuleExpr;
use crate::schema::{GateMode, ParamKind, RecomputeWhen, SchemaError, SchemaRegistry};
use std::collections::BTreeMap;

const RULES_SECTION: &str = "_RULES_";

/// One `key = ctor(args…)` line, before any semantic checks.
#[derive(Debug, Clone)]
struct RawDecl {
    line: usize,
    name: String,
    ctor: String,
    positional: Vec<String>,
    kwargs: Vec<(String, String)>,
}

impl RawDecl {
    fn kwarg(&self, key: &str) -> Option<&str> {
        self.kwargs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Parses a complete cfgspc document into a ready-to-use registry.
pub fn parse_schema(text: &str) -> Result<SchemaRegistry, ParseError> {
    let mut params: Vec<RawDecl> = Vec::new();
    let mut rules: Vec<RawDecl> = Vec::new();
    let mut in_rules = false;

    for (i, raw_line) in text.lines().enumerate() {
        let line_no = i + 1;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line.starts_with('[') {
            if !line.ends_with(']') || line.len() < 3 {
                return Err(ParseError::Syntax {
                    line: line_no,
                    msg: format!("malformed section header '{}'", line),
                });
            }
            in_rules = line[1..line.len() - 1].trim() == RULES_SECTION;
            continue;
        }
        let decl = parse_decl(line, line_no)?;
        if in_rules {
            rules.push(decl);
        } else {
            params.push(decl);
        }
    }

    let mut registry = SchemaRegistry::new();

    // Phase 1: parameters.
    for decl in &params {
        register_param(&mut registry, decl)?;
    }

    // Phase 2: rules, with inputs taken from the parameters' `triggers`
    // declarations.
    for decl in &rules {
        register_rule(&mut registry, decl, &params)?;
    }

    // Phase 3: dangling trigger references, then gate links.
    for decl in &params {
        if let Some(rule) = decl.kwarg("triggers") {
            if !rules.iter().any(|r| r.name == rule) {
                return Err(SchemaError::UnknownRule(rule.to_string()).into());
            }
        }
    }
    for decl in &params {
        for mode in [GateMode::InactiveIf, GateMode::RequiredIf] {
            if let Some(rule) = decl.kwarg(mode.keyword()) {
                registry.attach_gate(&decl.name, rule, mode)?;
            }
        }
    }

    Ok(registry)
}

fn register_param(registry: &mut SchemaRegistry, decl: &RawDecl) -> Result<(), ParseError> {
    let kind = match decl.ctor.as_str() {
        "string_kw" => ParamKind::Str,
        "boolean_kw" => ParamKind::Bool,
        "float_kw" => ParamKind::Float,
        "integer_or_none_kw" => ParamKind::IntOrNone,
        "float_or_none_kw" => ParamKind::FloatOrNone,
        "option_kw" => {
            if decl.positional.is_empty() {
                return Err(ParseError::Syntax {
                    line: decl.line,
                    msg: format!("option parameter '{}' declares no choices", decl.name),
                });
            }
            ParamKind::Choice { allowed: decl.positional.clone() }
        }
        other => {
            return Err(ParseError::UnknownConstructor {
                line: decl.line,
                ctor: other.to_string(),
            })
        }
    };
    if !matches!(kind, ParamKind::Choice { .. }) && !decl.positional.is_empty() {
        return Err(ParseError::Syntax {
            line: decl.line,
            msg: format!("'{}' takes no positional arguments", decl.ctor),
        });
    }
    for (key, _) in &decl.kwargs {
        if !matches!(key.as_str(), "default" | "comment" | "triggers" | "inactive_if" | "required_if")
        {
            return Err(ParseError::Syntax {
                line: decl.line,
                msg: format!("unexpected argument '{}' for parameter '{}'", key, decl.name),
            });
        }
    }

    let default_text = decl.kwarg("default").ok_or_else(|| ParseError::Syntax {
        line: decl.line,
        msg: format!("parameter '{}' has no default", decl.name),
    })?;
    let default = kind
        .parse_value(default_text)
        .map_err(|msg| ParseError::Syntax { line: decl.line, msg })?;

    registry.define(&decl.name, kind, default, decl.kwarg("comment"))?;
    Ok(())
}

fn register_rule(
    registry: &mut SchemaRegistry,
    decl: &RawDecl,
    params: &[RawDecl],
) -> Result<(), ParseError> {
    // Rule declarations reuse the string_kw constructor shell.
    if decl.ctor != "string_kw" {
        return Err(ParseError::UnknownConstructor {
            line: decl.line,
            ctor: decl.ctor.clone(),
        });
    }

    let inputs: Vec<&str> = params
        .iter()
        .filter(|p| p.kwarg("triggers") == Some(decl.name.as_str()))
        .map(|p| p.name.as_str())
        .collect();
    if inputs.is_empty() {
        return Err(ParseError::Syntax {
            line: decl.line,
            msg: format!("rule '{}' has no triggering parameter", decl.name),
        });
    }

    let when = match decl.kwarg("when") {
        Some(text) => parse_when(text, decl.line)?,
        None => RecomputeWhen::default(),
    };
    let code = decl.kwarg("code").ok_or_else(|| ParseError::Syntax {
        line: decl.line,
        msg: format!("rule '{}' has no code clause", decl.name),
    })?;
    let expr = parse_rule_code(code).ok_or_else(|| ParseError::BadCode {
        line: decl.line,
        code: code.to_string(),
    })?;

    registry.define_rule(&decl.name, &inputs, expr, when)?;
    Ok(())
}

fn parse_when(text: &str, line: usize) -> Result<RecomputeWhen, ParseError> {
    let mut when = RecomputeWhen { on_defaults: false, on_entry: false };
    for context in text.split(',') {
        match context.trim() {
            "defaults" => when.on_defaults = true,
            "entry" => when.on_entry = true,
            other => {
                return Err(ParseError::UnknownContext {
                    line,
                    context: other.to_string(),
                })
            }
        }
    }
    Ok(when)
}

/// Recognizes the three closed code forms: a truth table
/// `{"yes": False, "no": True}`, an equality test `value == "x"`, and a
/// membership test `value in ("a", "b")`.
fn parse_rule_code(code: &str) -> Option<RuleExpr> {
    let code = code.trim();
    if let Some(body) = code.strip_prefix('{').and_then(|c| c.strip_suffix('}')) {
        let mut table = BTreeMap::new();
        for entry in split_args(body) {
            if entry.is_empty() {
                continue;
            }
            let (key, value) = entry.split_once(':')?;
            let key = strip_quotes(key.trim()).to_string();
            let value = match value.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" => true,
                "false" | "no" => false,
                _ => return None,
            };
            table.insert(key, value);
        }
        if table.is_empty() {
            return None;
        }
        return Some(RuleExpr::Truth(table));
    }
    if let Some(rest) = code.strip_prefix("value") {
        let rest = rest.trim_start();
        if let Some(operand) = rest.strip_prefix("==") {
            return Some(RuleExpr::Equals(strip_quotes(operand.trim()).to_string()));
        }
        if let Some(tuple) = rest.strip_prefix("in") {
            let body = tuple.trim().strip_prefix('(')?.strip_suffix(')')?;
            let items: Vec<String> = split_args(body)
                .into_iter()
                .filter(|s| !s.is_empty())
                .map(|s| strip_quotes(&s).to_string())
                .collect();
            if items.is_empty() {
                return None;
            }
            return Some(RuleExpr::OneOf(items));
        }
    }
    None
}

fn parse_decl(line: &str, line_no: usize) -> Result<RawDecl, ParseError> {
    let (name, rhs) = line.split_once('=').ok_or_else(|| ParseError::Syntax {
        line: line_no,
        msg: format!("expected 'key = constructor(…)', got '{}'", line),
    })?;
    let name = name.trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return Err(ParseError::Syntax {
            line: line_no,
            msg: format!("invalid key '{}'", name),
        });
    }
    let rhs = rhs.trim();
    let paren = rhs.find('(').ok_or_else(|| ParseError::Syntax {
        line: line_no,
        msg: format!("declaration of '{}' is not a constructor call", name),
    })?;
    if !rhs.ends_with(')') {
        return Err(ParseError::Syntax {
            line: line_no,
            msg: format!("unterminated constructor call for '{}'", name),
        });
    }
    let ctor = rhs[..paren].trim().to_string();
    let args = &rhs[paren + 1..rhs.len() - 1];

    let mut positional = Vec::new();
    let mut kwargs = Vec::new();
    for arg in split_args(args) {
        if arg.is_empty() {
            continue;
        }
        match split_kwarg(&arg) {
            Some((key, value)) => kwargs.push((key, strip_quotes(&value).to_string())),
            None => positional.push(strip_quotes(&arg).to_string()),
        }
    }
    Ok(RawDecl { line: line_no, name: name.to_string(), ctor, positional, kwargs })
}

/// Splits on commas that sit outside quoted spans.
fn split_args(args: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    for c in args.chars() {
        match quote {
            Some(q) => {
                current.push(c);
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    current.push(c);
                }
                ',' => {
                    out.push(current.trim().to_string());
                    current.clear();
                }
                _ => current.push(c),
            },
        }
    }
    if !current.trim().is_empty() {
        out.push(current.trim().to_string());
    }
    out
}

/// Splits `key=value` at the first '=' outside quotes. `==` never splits,
/// so a bare `value == 'x'` stays positional.
fn split_kwarg(arg: &str) -> Option<(String, String)> {
    let mut quote: Option<char> = None;
    let chars: Vec<char> = arg.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' => quote = Some(c),
                '=' => {
                    if chars.get(i + 1) == Some(&'=') || (i > 0 && chars[i - 1] == '=') {
                        return None;
                    }
                    let key = arg[..i].trim();
                    if key.is_empty() || !key.chars().all(|k| k.is_alphanumeric() || k == '_') {
                        return None;
                    }
                    return Some((key.to_string(), arg[i + 1..].trim().to_string()));
                }
                _ => {}
            },
        }
    }
    None
}

fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    if s.len() >= 2 {
        let bytes = s.as_bytes();
        if (bytes[0] == b'\'' && bytes[s.len() - 1] == b'\'')
            || (bytes[0] == b'"' && bytes[s.len() - 1] == b'"')
        {
            return &s[1..s.len() - 1];
        }
    }
    s
}
