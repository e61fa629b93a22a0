use std::borrow::Cow;

use jiff::Timestamp;
use log::warn;

use crate::{
    rules::{Condition, Field, MatchMode, Predicate, Rule, Value},
    store::Message,
};

const SECONDS_PER_DAY: i64 = 86_400;

/// Decides whether one condition holds for one message at the given time.
///
/// Never fails: anything that cannot be evaluated (missing date, value of
/// the wrong shape) logs a warning and counts as not matching.
pub fn evaluate(message: &Message, condition: &Condition, now: Timestamp) -> bool {
    match condition.predicate() {
        Predicate::Contains => text_holds(message, condition, false, false),
        Predicate::DoesNotContain => text_holds(message, condition, false, true),
        Predicate::Equals => text_holds(message, condition, true, false),
        Predicate::DoesNotEqual => text_holds(message, condition, true, true),
        Predicate::LessThanDays => age_holds(message, condition, now, true),
        Predicate::GreaterThanDays => age_holds(message, condition, now, false),
    }
}

/// Evaluates all conditions of a rule under its match mode. A rule with
/// no conditions matches everything and acts as a catch-all.
pub fn matches_rule(message: &Message, rule: &Rule, now: Timestamp) -> bool {
    if rule.conditions().is_empty() {
        return true;
    }
    match rule.match_mode() {
        MatchMode::All => rule
            .conditions()
            .iter()
            .all(|condition| evaluate(message, condition, now)),
        MatchMode::Any => rule
            .conditions()
            .iter()
            .any(|condition| evaluate(message, condition, now)),
    }
}

fn text_field(message: &Message, field: Field) -> Option<Cow<'_, str>> {
    match field {
        Field::Sender => Some(Cow::Borrowed(message.sender())),
        Field::Subject => Some(Cow::Borrowed(message.subject())),
        Field::Snippet => Some(Cow::Borrowed(message.snippet())),
        Field::ReceivedAt => message
            .received_at()
            .map(|timestamp| Cow::Owned(timestamp.to_string())),
    }
}

fn text_holds(message: &Message, condition: &Condition, check_equality: bool, negated: bool) -> bool {
    let Value::Text(expected) = condition.value() else {
        warn!(
            "condition {} on {} needs a string value, treating as unmatched",
            condition.predicate(),
            condition.field()
        );
        return false;
    };
    // An empty or absent field always yields the "not found" outcome.
    let Some(actual) = text_field(message, condition.field()) else {
        return negated;
    };
    if actual.is_empty() {
        return negated;
    }
    let actual = actual.to_lowercase();
    let expected = expected.to_lowercase();
    let found = if check_equality {
        actual == expected
    } else {
        actual.contains(&expected)
    };
    found != negated
}

fn age_holds(message: &Message, condition: &Condition, now: Timestamp, newer_than: bool) -> bool {
    let Value::Days(days) = condition.value() else {
        warn!(
            "condition {} on {} needs a number of days, treating as unmatched",
            condition.predicate(),
            condition.field()
        );
        return false;
    };
    let Some(received_at) = message.received_at() else {
        warn!(
            "message {} has no usable received_at, condition {} cannot match",
            message.id(),
            condition.predicate()
        );
        return false;
    };
    let age = now.as_second() - received_at.as_second();
    let bound = days * SECONDS_PER_DAY;
    if newer_than { age < bound } else { age > bound }
}
