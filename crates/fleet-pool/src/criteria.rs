//! Criteria evaluation for pool requests.
//!
//! A request's criteria map attribute names to filter expressions:
//!
//! - a bare value is an exact match (`arch = "x86_64"`)
//! - `<op><value>` compares, with `>`, `>=`, `<`, `<=` for numeric keys and
//!   `!=`, `!~`, `=~` for pattern keys
//! - `tags` is a comma list; each entry must appear in the node's user
//!   comment, or must not appear if it starts with `-`
//!
//! [`CriteriaEvaluator::compile`] turns the map into a [`CompiledFilter`]
//! up front and rejects anything it does not understand.

use std::collections::BTreeMap;

use fleet_core::{AttrMap, attr_at, scalar_string};
use fleet_inventory::EffectiveConfig;
use regex::Regex;

use crate::error::{PoolError, PoolResult};

/// Criteria as supplied by a caller: attribute name → filter expression.
pub type Criteria = BTreeMap<String, String>;

/// Key that expands into one predicate per listed tag.
pub const TAGS_KEY: &str = "tags";

/// Which operators a criteria key accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyClass {
    /// `> >= < <=` or a bare number.
    Numeric,
    /// `!= !~ =~` or a bare value.
    Pattern,
    /// Bare value only.
    Identity,
    /// Comma list of tags.
    Tags,
}

/// Where a criteria key reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    NodeName,
    Attribute(String),
}

/// Recognized criteria keys with their class and default attribute path.
const KNOWN_KEYS: [(&str, KeyClass, &str); 11] = [
    ("disksize", KeyClass::Numeric, "device_info.disksize"),
    ("memory", KeyClass::Numeric, "device_info.memory"),
    ("cpucount", KeyClass::Numeric, "device_info.cpucount"),
    ("cputype", KeyClass::Pattern, "device_info.cputype"),
    ("machinetype", KeyClass::Identity, "device_info.mtm"),
    ("name", KeyClass::Identity, ""),
    ("rack", KeyClass::Identity, "position.rack"),
    ("unit", KeyClass::Identity, "position.unit"),
    ("room", KeyClass::Identity, "position.room"),
    ("arch", KeyClass::Identity, "device_info.arch"),
    (TAGS_KEY, KeyClass::Tags, "obj_info.usercomment"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericOp {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
}

impl NumericOp {
    fn holds(self, actual: f64, expected: f64) -> bool {
        match self {
            NumericOp::Gt => actual > expected,
            NumericOp::Ge => actual >= expected,
            NumericOp::Lt => actual < expected,
            NumericOp::Le => actual <= expected,
            NumericOp::Eq => actual == expected,
        }
    }
}

#[derive(Debug, Clone)]
pub enum PatternOp {
    NotEqual(String),
    Matches(Regex),
    NotMatches(Regex),
}

/// One compiled condition on a node.
#[derive(Debug, Clone)]
pub enum Predicate {
    Numeric {
        source: Source,
        op: NumericOp,
        value: f64,
    },
    Pattern {
        source: Source,
        op: PatternOp,
    },
    Exact {
        source: Source,
        value: String,
    },
    Tag {
        source: Source,
        tag: String,
        include: bool,
    },
}

impl Predicate {
    fn matches(&self, config: &EffectiveConfig) -> bool {
        match self {
            Predicate::Numeric { source, op, value } => read(source, config)
                .and_then(|v| parse_number(&v))
                .is_some_and(|actual| op.holds(actual, *value)),
            Predicate::Pattern { source, op } => {
                let actual = read(source, config);
                match op {
                    PatternOp::NotEqual(value) => actual.as_deref() != Some(value.as_str()),
                    PatternOp::Matches(re) => actual.is_some_and(|a| re.is_match(&a)),
                    PatternOp::NotMatches(re) => !actual.is_some_and(|a| re.is_match(&a)),
                }
            }
            Predicate::Exact { source, value } => {
                read(source, config).is_some_and(|actual| actual == *value)
            }
            Predicate::Tag {
                source,
                tag,
                include,
            } => {
                let present = read(source, config).is_some_and(|comment| comment.contains(tag.as_str()));
                present == *include
            }
        }
    }
}

fn read(source: &Source, config: &EffectiveConfig) -> Option<String> {
    match source {
        Source::NodeName => Some(config.name.clone()),
        Source::Attribute(path) => attr_at(&config.attributes, path).and_then(scalar_string),
    }
}

/// Parse a number with an optional unit suffix: `"64"`, `"-5"`, `"1e3"`,
/// `"64G"`, `"2.5 TB"`. Used for both the attribute and the expected value.
fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if let Ok(n) = trimmed.parse() {
        return Some(n);
    }
    let digits = trimmed
        .trim_end_matches(|c: char| c.is_ascii_alphabetic())
        .trim_end();
    if digits.is_empty() || digits.len() == trimmed.len() {
        return None;
    }
    digits.parse().ok()
}

/// A validated set of predicates; a node must satisfy all of them.
#[derive(Debug, Clone, Default)]
pub struct CompiledFilter {
    predicates: Vec<Predicate>,
}

impl CompiledFilter {
    pub fn matches(&self, config: &EffectiveConfig) -> bool {
        self.predicates.iter().all(|p| p.matches(config))
    }

    /// Matches every node.
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }
}

/// Compiles criteria maps, resolving each key to its attribute path.
#[derive(Debug, Clone, Default)]
pub struct CriteriaEvaluator {
    paths: BTreeMap<String, String>,
}

impl CriteriaEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the attribute path read for some keys.
    ///
    /// Overrides for keys outside the recognized set are ignored.
    pub fn with_paths(mut self, paths: BTreeMap<String, String>) -> Self {
        self.paths = paths;
        self
    }

    /// Class of a recognized key, `None` for anything else.
    pub fn key_class(key: &str) -> Option<KeyClass> {
        KNOWN_KEYS
            .iter()
            .find(|(k, _, _)| *k == key)
            .map(|(_, class, _)| *class)
    }

    fn source(&self, key: &str, default_path: &str) -> Source {
        match self.paths.get(key) {
            Some(path) => Source::Attribute(path.clone()),
            None if default_path.is_empty() => Source::NodeName,
            None => Source::Attribute(default_path.to_string()),
        }
    }

    /// Compile `criteria`. Fails on the first key that is unknown or whose
    /// expression does not fit the key.
    pub fn compile(&self, criteria: &Criteria) -> PoolResult<CompiledFilter> {
        let mut predicates = Vec::with_capacity(criteria.len());
        for (key, expr) in criteria {
            let (_, class, default_path) = KNOWN_KEYS
                .iter()
                .find(|(k, _, _)| k == key)
                .ok_or_else(|| PoolError::UnsupportedCriteria(key.clone()))?;
            let source = self.source(key, default_path);

            match class {
                KeyClass::Tags => compile_tags(key, expr, &source, &mut predicates)?,
                _ => predicates.push(compile_expr(key, *class, expr, source)?),
            }
        }
        Ok(CompiledFilter { predicates })
    }

    /// Compile then evaluate against a single attribute map.
    pub fn matches(&self, criteria: &Criteria, name: &str, attributes: &AttrMap) -> PoolResult<bool> {
        let filter = self.compile(criteria)?;
        let config = EffectiveConfig {
            name: name.to_string(),
            attributes: attributes.clone(),
        };
        Ok(filter.matches(&config))
    }
}

/// Operators, longest first so `>=` is not read as `>`.
const OPERATORS: [&str; 7] = [">=", "<=", "!=", "!~", "=~", ">", "<"];

fn split_operator(expr: &str) -> (Option<&'static str>, &str) {
    for op in OPERATORS {
        if let Some(rest) = expr.strip_prefix(op) {
            return (Some(op), rest);
        }
    }
    (None, expr)
}

fn compile_expr(key: &str, class: KeyClass, expr: &str, source: Source) -> PoolResult<Predicate> {
    let (op, value) = split_operator(expr);
    let value = value.trim();
    if value.is_empty() {
        return Err(PoolError::malformed(key, "empty value"));
    }

    match (class, op) {
        (KeyClass::Numeric, op) => {
            let op = match op {
                None => NumericOp::Eq,
                Some(">") => NumericOp::Gt,
                Some(">=") => NumericOp::Ge,
                Some("<") => NumericOp::Lt,
                Some("<=") => NumericOp::Le,
                Some(other) => {
                    return Err(PoolError::malformed(key, format!("operator {other} not supported")));
                }
            };
            let value = parse_number(value)
                .ok_or_else(|| PoolError::malformed(key, format!("{value} is not a number")))?;
            Ok(Predicate::Numeric { source, op, value })
        }
        (KeyClass::Pattern, None) => Ok(Predicate::Exact {
            source,
            value: value.to_string(),
        }),
        (KeyClass::Pattern, Some("!=")) => Ok(Predicate::Pattern {
            source,
            op: PatternOp::NotEqual(value.to_string()),
        }),
        (KeyClass::Pattern, Some(op @ ("=~" | "!~"))) => {
            let re = Regex::new(value)
                .map_err(|e| PoolError::malformed(key, format!("bad pattern: {e}")))?;
            let op = if op == "=~" {
                PatternOp::Matches(re)
            } else {
                PatternOp::NotMatches(re)
            };
            Ok(Predicate::Pattern { source, op })
        }
        (KeyClass::Identity, None) => Ok(Predicate::Exact {
            source,
            value: value.to_string(),
        }),
        (_, Some(op)) => Err(PoolError::malformed(key, format!("operator {op} not supported"))),
        (KeyClass::Tags, None) => unreachable!("tags are compiled by compile_tags"),
    }
}

fn compile_tags(key: &str, expr: &str, source: &Source, out: &mut Vec<Predicate>) -> PoolResult<()> {
    for raw in expr.split(',') {
        let raw = raw.trim();
        let (tag, include) = match raw.strip_prefix('-') {
            Some(rest) => (rest, false),
            None => (raw, true),
        };
        if tag.is_empty() {
            return Err(PoolError::malformed(key, format!("empty tag in {expr:?}")));
        }
        out.push(Predicate::Tag {
            source: source.clone(),
            tag: tag.to_string(),
            include,
        });
    }
    Ok(())
}
