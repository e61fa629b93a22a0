use std::{fs::read_to_string, io, path::Path};

use log::{debug, trace};
use serde::Deserialize;
use thiserror::Error;

use super::{Field, Predicate, Rule, Value};

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("rule file {path} is not readable: {source}")]
    Unreadable { path: String, source: io::Error },
    #[error("rule file is not valid TOML: {0}")]
    Malformed(#[from] toml::de::Error),
    #[error("rule {rule}: {predicate} only applies to received_at, not {field}")]
    DatePredicateOnTextField {
        rule: String,
        predicate: Predicate,
        field: Field,
    },
    #[error("rule {rule}: {predicate} on {field} needs a whole number of days")]
    ExpectedDays {
        rule: String,
        predicate: Predicate,
        field: Field,
    },
    #[error("rule {rule}: {predicate} on {field} needs a string value")]
    ExpectedText {
        rule: String,
        predicate: Predicate,
        field: Field,
    },
    #[error("rule {rule}: unit {unit:?} is not understood, only \"days\" is")]
    UnknownUnit { rule: String, unit: String },
    #[error("rule {rule} has no actions")]
    EmptyActions { rule: String },
}

#[derive(Deserialize)]
struct RuleFile {
    #[serde(default)]
    rule: Vec<Rule>,
}

/// The validated, ordered rule collection. Loaded once at startup and
/// passed into the reconciler by reference.
#[derive(Debug)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn load(path: &Path) -> Result<Self, RuleError> {
        let contents = read_to_string(path).map_err(|source| RuleError::Unreadable {
            path: path.to_string_lossy().into_owned(),
            source,
        })?;
        let set = Self::parse(&contents)?;
        debug!(
            "loaded {} rules from {}",
            set.rules.len(),
            path.to_string_lossy()
        );
        Ok(set)
    }

    pub fn parse(contents: &str) -> Result<Self, RuleError> {
        let file: RuleFile = toml::from_str(contents)?;
        for rule in &file.rule {
            validate(rule)?;
            trace!(
                "rule {} ({})",
                rule.name(),
                rule.description().unwrap_or("no description")
            );
        }
        Ok(Self { rules: file.rule })
    }

    /// Rules in declaration order. Evaluation walks all of them; a match
    /// never stops the walk.
    pub fn ordered(&self) -> &[Rule] {
        &self.rules
    }
}

fn validate(rule: &Rule) -> Result<(), RuleError> {
    for condition in rule.conditions() {
        let field = condition.field();
        let predicate = condition.predicate();
        if predicate.is_relative_date() {
            if field != Field::ReceivedAt {
                return Err(RuleError::DatePredicateOnTextField {
                    rule: rule.name().to_string(),
                    predicate,
                    field,
                });
            }
            if !matches!(condition.value(), Value::Days(_)) {
                return Err(RuleError::ExpectedDays {
                    rule: rule.name().to_string(),
                    predicate,
                    field,
                });
            }
        } else if !matches!(condition.value(), Value::Text(_)) {
            return Err(RuleError::ExpectedText {
                rule: rule.name().to_string(),
                predicate,
                field,
            });
        }
        if let Some(unit) = condition.unit() {
            if unit != "days" {
                return Err(RuleError::UnknownUnit {
                    rule: rule.name().to_string(),
                    unit: unit.to_string(),
                });
            }
        }
    }
    if rule.actions().is_empty() {
        return Err(RuleError::EmptyActions {
            rule: rule.name().to_string(),
        });
    }
    Ok(())
}
