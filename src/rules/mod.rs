mod rule;
mod ruleset;

pub use rule::ActionSpec;
pub use rule::Condition;
pub use rule::Field;
pub use rule::MatchMode;
pub use rule::Predicate;
pub use rule::Rule;
pub use rule::Value;
pub use ruleset::RuleError;
pub use ruleset::RuleSet;
