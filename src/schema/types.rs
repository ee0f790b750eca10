use serde::{Serialize, Deserialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct ParamId(pub u32);

impl ParamId {
    #[inline(always)]
    pub fn index(&self) -> usize { self.0 as usize }
    pub fn new(idx: usize) -> Self { Self(idx as u32) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct RuleId(pub u32);

impl RuleId {
    #[inline(always)]
    pub fn index(&self) -> usize { self.0 as usize }
    pub fn new(idx: usize) -> Self { Self(idx as u32) }
}

/// The type of a parameter, matching the cfgspc constructor set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamKind {
    Str,
    Bool,
    Float,
    IntOrNone,
    FloatOrNone,
    /// Enumerated choice; `allowed` keeps declaration order.
    Choice { allowed: Vec<String> },
}

impl ParamKind {
    /// Human-readable kind name, used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            ParamKind::Str => "string",
            ParamKind::Bool => "boolean",
            ParamKind::Float => "float",
            ParamKind::IntOrNone => "integer-or-none",
            ParamKind::FloatOrNone => "float-or-none",
            ParamKind::Choice { .. } => "option",
        }
    }

    /// The cfgspc constructor this kind serializes as.
    pub fn constructor(&self) -> &'static str {
        match self {
            ParamKind::Str => "string_kw",
            ParamKind::Bool => "boolean_kw",
            ParamKind::Float => "float_kw",
            ParamKind::IntOrNone => "integer_or_none_kw",
            ParamKind::FloatOrNone => "float_or_none_kw",
            ParamKind::Choice { .. } => "option_kw",
        }
    }

    /// Shape check only. Choice membership is enforced by the registry so it
    /// can distinguish `TypeMismatch` from `ValueNotAllowed`.
    pub fn matches(&self, value: &ParamValue) -> bool {
        matches!(
            (self, value),
            (ParamKind::Str, ParamValue::Str(_))
                | (ParamKind::Choice { .. }, ParamValue::Str(_))
                | (ParamKind::Bool, ParamValue::Bool(_))
                | (ParamKind::Float, ParamValue::Float(_))
                | (ParamKind::IntOrNone, ParamValue::MaybeInt(_))
                | (ParamKind::FloatOrNone, ParamValue::MaybeFloat(_))
        )
    }

    /// Parses the textual form a cfgspc file (or a loosely-typed caller)
    /// supplies for this kind. Membership for `Choice` is not checked here.
    pub fn parse_value(&self, text: &str) -> Result<ParamValue, String> {
        let text = text.trim();
        match self {
            ParamKind::Str | ParamKind::Choice { .. } => Ok(ParamValue::Str(text.to_string())),
            ParamKind::Bool => match text.to_ascii_lowercase().as_str() {
                "yes" | "true" => Ok(ParamValue::Bool(true)),
                "no" | "false" => Ok(ParamValue::Bool(false)),
                _ => Err(format!("'{}' is not a boolean (yes/no)", text)),
            },
            ParamKind::Float => text
                .parse::<f64>()
                .map(ParamValue::Float)
                .map_err(|_| format!("'{}' is not a float", text)),
            ParamKind::IntOrNone => {
                if is_none_text(text) {
                    Ok(ParamValue::MaybeInt(None))
                } else {
                    text.parse::<i64>()
                        .map(|i| ParamValue::MaybeInt(Some(i)))
                        .map_err(|_| format!("'{}' is not an integer or None", text))
                }
            }
            ParamKind::FloatOrNone => {
                if is_none_text(text) {
                    Ok(ParamValue::MaybeFloat(None))
                } else {
                    text.parse::<f64>()
                        .map(|f| ParamValue::MaybeFloat(Some(f)))
                        .map_err(|_| format!("'{}' is not a float or None", text))
                }
            }
        }
    }
}

fn is_none_text(text: &str) -> bool {
    text.eq_ignore_ascii_case("none") || text.eq_ignore_ascii_case("indef")
}

/// A parameter's current (or default) value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Str(String),
    Bool(bool),
    Float(f64),
    MaybeInt(Option<i64>),
    MaybeFloat(Option<f64>),
}

impl ParamValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            ParamValue::Str(_) => "string",
            ParamValue::Bool(_) => "boolean",
            ParamValue::Float(_) => "float",
            ParamValue::MaybeInt(_) => "integer-or-none",
            ParamValue::MaybeFloat(_) => "float-or-none",
        }
    }

    /// Canonical text used as the key into rule expressions.
    ///
    /// Booleans follow the TEAL `yes`/`no` convention; absent values
    /// canonicalize to `INDEF`.
    pub fn rule_key(&self) -> String {
        match self {
            ParamValue::Str(s) => s.clone(),
            ParamValue::Bool(true) => "yes".to_string(),
            ParamValue::Bool(false) => "no".to_string(),
            ParamValue::Float(f) => format!("{}", f),
            ParamValue::MaybeInt(Some(i)) => format!("{}", i),
            ParamValue::MaybeFloat(Some(f)) => format!("{}", f),
            ParamValue::MaybeInt(None) | ParamValue::MaybeFloat(None) => "INDEF".to_string(),
        }
    }

    /// Textual form as written back to a cfgspc file.
    pub fn cfg_text(&self) -> String {
        match self {
            ParamValue::MaybeInt(None) | ParamValue::MaybeFloat(None) => "None".to_string(),
            other => other.rule_key(),
        }
    }
}

/// How a gate's rule output acts on the gated parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateMode {
    /// Parameter is suppressed while the rule evaluates true.
    InactiveIf,
    /// Parameter becomes required while the rule evaluates true; it is
    /// never deactivated by this mode.
    RequiredIf,
}

impl GateMode {
    pub fn keyword(&self) -> &'static str {
        match self {
            GateMode::InactiveIf => "inactive_if",
            GateMode::RequiredIf => "required_if",
        }
    }
}

/// Lifecycle contexts at which a rule recomputes (the cfgspc `when` clause).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecomputeWhen {
    pub on_defaults: bool,
    pub on_entry: bool,
}

impl Default for RecomputeWhen {
    fn default() -> Self {
        Self { on_defaults: true, on_entry: true }
    }
}

/// Borrowed, read-only view of one registered parameter.
#[derive(Debug, Clone, Copy)]
pub struct ParameterDescriptor<'a> {
    pub name: &'a str,
    pub kind: &'a ParamKind,
    pub default: &'a ParamValue,
    pub value: &'a ParamValue,
    pub comment: Option<&'a str>,
    pub triggers: Option<RuleId>,
    pub gate: Option<(RuleId, GateMode)>,
}
