//! Label and field selectors carried by list requests.
//!
//! Label selectors accept the equality forms (`k=v`, `k==v`, `k!=v`), the
//! set forms (`k in (a,b)`, `k notin (a,b)`) and existence (`k`, `!k`).
//! Field selectors accept equality forms over a fixed set of fields.
//! Anything else is a parse error so callers can reject the request.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

/// Fields a [`FieldSelector`] may name.
pub const SELECTABLE_FIELDS: &[&str] = &["metadata.name", "metadata.namespace"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid selector {selector:?}: {reason}")]
pub struct SelectorError {
    pub selector: String,
    pub reason: String,
}

impl SelectorError {
    fn new(selector: &str, reason: impl Into<String>) -> Self {
        Self {
            selector: selector.to_string(),
            reason: reason.into(),
        }
    }
}

/// Split on commas outside parentheses, so `k in (a,b)` stays one term.
fn split_terms(selector: &str) -> Result<Vec<&str>, SelectorError> {
    let mut terms = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in selector.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| SelectorError::new(selector, "unbalanced ')'"))?;
            }
            ',' if depth == 0 => {
                terms.push(selector[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(SelectorError::new(selector, "unbalanced '('"));
    }
    terms.push(selector[start..].trim());
    if terms.iter().any(|t| t.is_empty()) {
        return Err(SelectorError::new(selector, "empty term"));
    }
    Ok(terms)
}

/// An equality operator shared by label and field terms.
fn split_equality(term: &str) -> Option<(&str, &str, bool)> {
    if let Some((k, v)) = term.split_once("!=") {
        return Some((k.trim(), v.trim(), false));
    }
    let (k, v) = term.split_once('=')?;
    let v = v.strip_prefix('=').unwrap_or(v);
    Some((k.trim(), v.trim(), true))
}

fn valid_key(key: &str) -> bool {
    let (prefix, name) = match key.split_once('/') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, key),
    };
    let prefix_ok = prefix.is_none_or(|p| {
        !p.is_empty()
            && p.len() <= 253
            && p.chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
    });
    prefix_ok && !name.is_empty() && valid_value(name)
}

fn valid_value(value: &str) -> bool {
    value.len() <= 63
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        && value.starts_with(|c: char| c.is_ascii_alphanumeric()) == !value.is_empty()
        && value.ends_with(|c: char| c.is_ascii_alphanumeric()) == !value.is_empty()
}

// ── Labels ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    Exists(String),
    NotExists(String),
    Equals(String, String),
    NotEquals(String, String),
    In(String, BTreeSet<String>),
    NotIn(String, BTreeSet<String>),
}

impl Requirement {
    fn parse(selector: &str, term: &str) -> Result<Self, SelectorError> {
        let check_key = |key: &str| {
            if valid_key(key) {
                Ok(key.to_string())
            } else {
                Err(SelectorError::new(selector, format!("invalid label key {key:?}")))
            }
        };
        let check_value = |value: &str| {
            if valid_value(value) {
                Ok(value.to_string())
            } else {
                Err(SelectorError::new(selector, format!("invalid label value {value:?}")))
            }
        };

        if let Some(key) = term.strip_prefix('!') {
            return Ok(Self::NotExists(check_key(key.trim())?));
        }

        if let Some(open) = term.find('(') {
            let body = term[open + 1..]
                .strip_suffix(')')
                .ok_or_else(|| SelectorError::new(selector, format!("malformed term {term:?}")))?;
            let mut head = term[..open].split_whitespace();
            let (Some(key), Some(op), None) = (head.next(), head.next(), head.next()) else {
                return Err(SelectorError::new(selector, format!("malformed term {term:?}")));
            };
            let key = check_key(key)?;
            let values = body
                .split(',')
                .map(|v| check_value(v.trim()))
                .collect::<Result<BTreeSet<_>, _>>()?;
            if values.iter().all(String::is_empty) {
                return Err(SelectorError::new(selector, format!("empty value set in {term:?}")));
            }
            return match op {
                "in" => Ok(Self::In(key, values)),
                "notin" => Ok(Self::NotIn(key, values)),
                other => Err(SelectorError::new(selector, format!("unknown operator {other:?}"))),
            };
        }

        match split_equality(term) {
            Some((key, value, true)) => Ok(Self::Equals(check_key(key)?, check_value(value)?)),
            Some((key, value, false)) => Ok(Self::NotEquals(check_key(key)?, check_value(value)?)),
            None => Ok(Self::Exists(check_key(term)?)),
        }
    }

    fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        match self {
            Self::Exists(k) => labels.contains_key(k),
            Self::NotExists(k) => !labels.contains_key(k),
            Self::Equals(k, v) => labels.get(k) == Some(v),
            Self::NotEquals(k, v) => labels.get(k) != Some(v),
            Self::In(k, vs) => labels.get(k).is_some_and(|v| vs.contains(v)),
            Self::NotIn(k, vs) => labels.get(k).is_none_or(|v| !vs.contains(v)),
        }
    }
}

/// A parsed label selector. The empty selector matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    requirements: Vec<Requirement>,
}

impl LabelSelector {
    pub fn parse(selector: &str) -> Result<Self, SelectorError> {
        if selector.trim().is_empty() {
            return Ok(Self::default());
        }
        let requirements = split_terms(selector)?
            .into_iter()
            .map(|term| Requirement::parse(selector, term))
            .collect::<Result<_, _>>()?;
        Ok(Self { requirements })
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }
}

// ── Fields ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
struct FieldRequirement {
    field: &'static str,
    value: String,
    equals: bool,
}

/// A parsed field selector over [`SELECTABLE_FIELDS`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSelector {
    requirements: Vec<FieldRequirement>,
}

impl FieldSelector {
    pub fn parse(selector: &str) -> Result<Self, SelectorError> {
        if selector.trim().is_empty() {
            return Ok(Self::default());
        }
        let mut requirements = Vec::new();
        for term in split_terms(selector)? {
            let (field, value, equals) = split_equality(term)
                .ok_or_else(|| SelectorError::new(selector, format!("malformed term {term:?}")))?;
            let field = SELECTABLE_FIELDS
                .iter()
                .copied()
                .find(|f| *f == field)
                .ok_or_else(|| {
                    SelectorError::new(selector, format!("field {field:?} is not selectable"))
                })?;
            requirements.push(FieldRequirement {
                field,
                value: value.to_string(),
                equals,
            });
        }
        Ok(Self { requirements })
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    /// Evaluate against an object's name and namespace.
    pub fn matches(&self, name: &str, namespace: &str) -> bool {
        self.requirements.iter().all(|r| {
            let actual = match r.field {
                "metadata.name" => name,
                _ => namespace,
            };
            (actual == r.value) == r.equals
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn selector(s: &str) -> LabelSelector {
        LabelSelector::parse(s).unwrap()
    }

    #[test]
    fn empty_selector_matches_everything() {
        assert!(selector("").matches(&BTreeMap::new()));
        assert!(FieldSelector::parse("  ").unwrap().is_empty());
    }

    #[test]
    fn equality_and_inequality() {
        let s = selector("team=ops,env!=prod,tier==web");
        assert!(s.matches(&labels(&[("team", "ops"), ("env", "dev"), ("tier", "web")])));
        assert!(!s.matches(&labels(&[("team", "ops"), ("env", "prod"), ("tier", "web")])));
        assert!(!s.matches(&labels(&[("team", "dev"), ("tier", "web")])));
    }

    #[test]
    fn existence_and_absence() {
        let present = selector("oncall");
        assert!(present.matches(&labels(&[("oncall", "yes")])));
        assert!(!present.matches(&labels(&[])));

        let absent = selector("!muted");
        assert_eq!(absent.requirements(), [Requirement::NotExists("muted".to_string())]);
        assert!(absent.matches(&labels(&[("oncall", "yes")])));
        assert!(!absent.matches(&labels(&[("muted", "true")])));
    }

    #[test]
    fn set_terms_keep_their_commas() {
        let s = selector("env in (prod, staging),team notin (qa),oncall");
        assert_eq!(s.requirements().len(), 3);
        assert!(s.matches(&labels(&[("env", "staging"), ("team", "ops"), ("oncall", "a")])));
        assert!(!s.matches(&labels(&[("env", "dev"), ("team", "ops"), ("oncall", "a")])));
        assert!(!s.matches(&labels(&[("env", "prod"), ("team", "qa"), ("oncall", "a")])));

        // notin also matches objects without the key.
        assert!(selector("team notin (qa)").matches(&labels(&[])));
    }

    #[test]
    fn prefixed_keys_are_accepted() {
        let s = selector("pager.k8s.co/severity=critical");
        assert!(s.matches(&labels(&[("pager.k8s.co/severity", "critical")])));
    }

    #[test]
    fn malformed_label_selectors_are_rejected() {
        for bad in [
            "env in (a,b",
            "env in a,b)",
            "env within (a)",
            "env in ()",
            "a,,b",
            "!",
            "team=o/ps",
            "Bad Key=x",
            "team=ops=x",
        ] {
            assert!(LabelSelector::parse(bad).is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn field_selector_by_name_and_namespace() {
        let s = FieldSelector::parse("metadata.name=disk,metadata.namespace!=ops").unwrap();
        assert!(s.matches("disk", "default"));
        assert!(!s.matches("disk", "ops"));
        assert!(!s.matches("cpu", "default"));
    }

    #[test]
    fn unknown_field_is_rejected() {
        let err = FieldSelector::parse("spec.message=down").unwrap_err();
        assert!(err.reason.contains("spec.message"));
        assert!(FieldSelector::parse("metadata.name").is_err());
    }
}
