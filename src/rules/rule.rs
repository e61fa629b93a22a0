use std::fmt::Display;

use serde::Deserialize;

/// Message field a condition inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Sender,
    Subject,
    ReceivedAt,
    Snippet,
}

impl Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Sender => "sender",
            Self::Subject => "subject",
            Self::ReceivedAt => "received_at",
            Self::Snippet => "snippet",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    Contains,
    DoesNotContain,
    Equals,
    DoesNotEqual,
    LessThanDays,
    GreaterThanDays,
}

impl Predicate {
    /// The date predicates compare the message age, everything else
    /// compares text.
    pub fn is_relative_date(self) -> bool {
        matches!(self, Self::LessThanDays | Self::GreaterThanDays)
    }
}

impl Display for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Contains => "contains",
            Self::DoesNotContain => "does_not_contain",
            Self::Equals => "equals",
            Self::DoesNotEqual => "does_not_equal",
            Self::LessThanDays => "less_than_days",
            Self::GreaterThanDays => "greater_than_days",
        };
        f.write_str(name)
    }
}

/// Comparison value of a condition. TOML integers become day counts,
/// strings become text to match.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Days(i64),
    Text(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum MatchMode {
    #[default]
    All,
    Any,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Condition {
    field: Field,
    predicate: Predicate,
    value: Value,
    #[serde(default)]
    unit: Option<String>,
}

impl Condition {
    pub fn field(&self) -> Field {
        self.field
    }

    pub fn predicate(&self) -> Predicate {
        self.predicate
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActionSpec {
    #[serde(default)]
    mark_as_read: Option<bool>,
    #[serde(default)]
    label: Option<String>,
}

impl ActionSpec {
    pub fn mark_as_read(&self) -> Option<bool> {
        self.mark_as_read
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// A rule that can do nothing is a configuration error, not a no-op.
    pub fn is_empty(&self) -> bool {
        self.mark_as_read.is_none() && self.label.is_none()
    }
}

/// One declarative matcher + action pair. Immutable after load; the
/// position in the rule file decides evaluation order.
#[derive(Debug, Clone, Deserialize)]
pub struct Rule {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    conditions: Vec<Condition>,
    #[serde(default, rename = "predicate")]
    match_mode: MatchMode,
    actions: ActionSpec,
}

impl Rule {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn match_mode(&self) -> MatchMode {
        self.match_mode
    }

    pub fn actions(&self) -> &ActionSpec {
        &self.actions
    }
}
