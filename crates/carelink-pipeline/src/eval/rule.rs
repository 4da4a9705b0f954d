//! Eval rule grammar.
//!
//! Textual form is `kind:body`; a rule without a known prefix is a
//! `contains` rule over the whole string.
//!
//! | kind        | body                    | true when                                      |
//! |-------------|-------------------------|------------------------------------------------|
//! | `contains`  | literal                 | payload contains the literal                   |
//! | `regex`     | pattern                 | payload matches the pattern                    |
//! | `field`     | `path=value`            | JSON scalar at dotted `path` renders as `value`|
//! | `threshold` | `path` op number        | JSON number at `path` satisfies `op`           |
//!
//! `op` is one of `>=`, `<=`, `==`, `>`, `<`. Path segments index objects by
//! key and arrays by position (`segments.0`). Whitespace around `path` and
//! `value` is ignored.
//!
//! Adding a kind means a new `Rule` variant, its prefix in `Rule::parse` and
//! its arm in `Rule::matches`. Evaluation must stay a pure function of the
//! payload. A rule that cannot apply (payload not JSON, path missing) is
//! `false`, never an error.

use regex::Regex;
use serde_json::Value;

use carelink_core::error::{CarelinkError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Ge,
    Le,
    Eq,
    Gt,
    Lt,
}

// Two-character operators first so `>=` is not read as `>`.
const OPERATORS: [(&str, Comparison); 5] = [
    (">=", Comparison::Ge),
    ("<=", Comparison::Le),
    ("==", Comparison::Eq),
    (">", Comparison::Gt),
    ("<", Comparison::Lt),
];

impl Comparison {
    fn holds(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Comparison::Ge => lhs >= rhs,
            Comparison::Le => lhs <= rhs,
            Comparison::Eq => lhs == rhs,
            Comparison::Gt => lhs > rhs,
            Comparison::Lt => lhs < rhs,
        }
    }
}

/// Compiled rule.
#[derive(Debug, Clone)]
pub enum Rule {
    Contains(String),
    Regex(Regex),
    FieldEquals { path: String, value: String },
    Threshold { path: String, cmp: Comparison, value: f64 },
}

/// Payload under evaluation; JSON is parsed once, on construction.
#[derive(Debug, Clone)]
pub struct Payload {
    text: String,
    json: Option<Value>,
}

impl Payload {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let json = serde_json::from_str(&text).ok();
        Self { text, json }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_json(&self) -> bool {
        self.json.is_some()
    }

    fn lookup(&self, path: &str) -> Option<&Value> {
        let mut cur = self.json.as_ref()?;
        for seg in path.split('.') {
            cur = match cur {
                Value::Object(map) => map.get(seg)?,
                Value::Array(items) => items.get(seg.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(cur)
    }
}

impl Rule {
    pub fn parse(src: &str) -> Result<Self> {
        let Some((kind, body)) = src.split_once(':') else {
            return Ok(Rule::Contains(src.to_string()));
        };

        match kind {
            "contains" => Ok(Rule::Contains(body.to_string())),
            "regex" => Regex::new(body)
                .map(Rule::Regex)
                .map_err(|e| CarelinkError::Config(format!("invalid regex rule {src:?}: {e}"))),
            "field" => {
                let (path, value) = body.split_once('=').ok_or_else(|| {
                    CarelinkError::Config(format!("invalid field rule {src:?} (expected field:path=value)"))
                })?;
                let path = path.trim();
                if path.is_empty() {
                    return Err(CarelinkError::Config(format!("invalid field rule {src:?}: empty path")));
                }
                Ok(Rule::FieldEquals {
                    path: path.to_string(),
                    value: value.trim().to_string(),
                })
            }
            "threshold" => parse_threshold(src, body),
            // Unknown prefix: the colon is part of the literal.
            _ => Ok(Rule::Contains(src.to_string())),
        }
    }

    pub fn matches(&self, payload: &Payload) -> bool {
        match self {
            Rule::Contains(lit) => payload.text.contains(lit.as_str()),
            Rule::Regex(re) => re.is_match(&payload.text),
            Rule::FieldEquals { path, value } => match payload.lookup(path) {
                Some(Value::String(s)) => s == value,
                Some(v @ (Value::Number(_) | Value::Bool(_) | Value::Null)) => v.to_string() == *value,
                _ => false,
            },
            Rule::Threshold { path, cmp, value } => {
                let lhs = match payload.lookup(path) {
                    Some(Value::Number(n)) => n.as_f64(),
                    Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
                    _ => None,
                };
                lhs.is_some_and(|l| cmp.holds(l, *value))
            }
        }
    }
}

fn parse_threshold(src: &str, body: &str) -> Result<Rule> {
    for (tok, cmp) in OPERATORS {
        if let Some((path, num)) = body.split_once(tok) {
            let path = path.trim();
            if path.is_empty() {
                return Err(CarelinkError::Config(format!("invalid threshold rule {src:?}: empty path")));
            }
            let value: f64 = num.trim().parse().map_err(|_| {
                CarelinkError::Config(format!("invalid threshold rule {src:?}: {num:?} is not a number"))
            })?;
            return Ok(Rule::Threshold {
                path: path.to_string(),
                cmp,
                value,
            });
        }
    }
    Err(CarelinkError::Config(format!(
        "invalid threshold rule {src:?} (expected threshold:path<op>number)"
    )))
}
