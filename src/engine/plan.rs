use std::collections::BTreeSet;

use log::trace;

use crate::{
    gmail::{MailboxClient, RemoteError, UNREAD_LABEL},
    rules::Rule,
    store::Message,
};

/// The computed, idempotent set of remote changes for one message.
/// `add_labels` and `remove_labels` hold remote label ids and are always
/// disjoint.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MutationPlan {
    add_labels: BTreeSet<String>,
    remove_labels: BTreeSet<String>,
    read_state: Option<bool>,
}

impl MutationPlan {
    pub fn add_labels(&self) -> &BTreeSet<String> {
        &self.add_labels
    }

    pub fn remove_labels(&self) -> &BTreeSet<String> {
        &self.remove_labels
    }

    pub fn read_state(&self) -> Option<bool> {
        self.read_state
    }

    /// A no-op plan never causes a remote call; the message is still
    /// marked processed since a rule did match.
    pub fn is_noop(&self) -> bool {
        self.add_labels.is_empty() && self.remove_labels.is_empty() && self.read_state.is_none()
    }

    #[cfg(test)]
    pub fn for_tests(
        add_labels: BTreeSet<String>,
        remove_labels: BTreeSet<String>,
        read_state: Option<bool>,
    ) -> Self {
        Self {
            add_labels,
            remove_labels,
            read_state,
        }
    }
}

/// Merges the action blocks of all matched rules, in rule order. Labels
/// accumulate in first-mention order; for the read-state the last rule
/// wins.
fn fold_actions(matched: &[&Rule]) -> (Vec<String>, Option<bool>) {
    let mut label_names: Vec<String> = Vec::new();
    let mut read_state = None;
    for rule in matched {
        if let Some(label) = rule.actions().label() {
            if !label_names.iter().any(|known| known.as_str() == label) {
                label_names.push(label.to_string());
            }
        }
        if let Some(mark_as_read) = rule.actions().mark_as_read() {
            read_state = Some(mark_as_read);
        }
    }
    (label_names, read_state)
}

/// Translates the matched rules into the minimal remote mutation for one
/// message. Label names resolve to remote ids through the client; labels
/// the message already carries and a read-state it already has are
/// dropped from the plan.
pub async fn plan<C: MailboxClient>(
    message: &Message,
    matched: &[&Rule],
    client: &mut C,
) -> Result<MutationPlan, RemoteError> {
    let (label_names, read_state) = fold_actions(matched);
    let mut plan = MutationPlan::default();
    for name in label_names {
        let label_id = client.get_or_create_label(&name).await?;
        if !message.labels().contains(&label_id) {
            plan.add_labels.insert(label_id);
        }
    }
    match read_state {
        Some(true) => {
            // The read-state override keeps the label sets disjoint.
            plan.add_labels.remove(UNREAD_LABEL);
            if message.labels().contains(UNREAD_LABEL) {
                plan.remove_labels.insert(UNREAD_LABEL.to_string());
            }
        }
        Some(false) => {
            if !message.labels().contains(UNREAD_LABEL) {
                plan.add_labels.insert(UNREAD_LABEL.to_string());
            }
        }
        None => {}
    }
    plan.read_state = read_state.filter(|&read| read != message.is_read());
    trace!("planned mutation for message {}: {plan:?}", message.id());
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use assertables::*;
    use jiff::Timestamp;
    use rstest::*;

    use super::*;
    use crate::{gmail::MockMailbox, rules::RuleSet};

    fn message(labels: &[&str], is_read: bool) -> Message {
        Message::new(
            "m1".to_string(),
            "alice@x.com".to_string(),
            "Invoice #1".to_string(),
            String::new(),
            Some(Timestamp::UNIX_EPOCH),
            labels.iter().map(ToString::to_string).collect(),
            is_read,
        )
    }

    fn rules(contents: &str) -> RuleSet {
        assert_ok!(RuleSet::parse(contents))
    }

    async fn plan_all(message: &Message, set: &RuleSet, client: &mut MockMailbox) -> MutationPlan {
        let matched: Vec<&Rule> = set.ordered().iter().collect();
        assert_ok!(plan(message, &matched, client).await)
    }

    #[rstest]
    #[tokio::test]
    async fn resolves_label_names_to_remote_ids() {
        let set = rules(
            r#"
            [[rule]]
            name = "finance"
            [rule.actions]
            label = "Finance"
            "#,
        );
        let mut client = MockMailbox::default();

        let plan = plan_all(&message(&["INBOX"], true), &set, &mut client).await;

        assert_eq!(
            plan.add_labels().iter().collect::<Vec<_>>(),
            vec!["Finance-label-id"]
        );
        assert!(plan.remove_labels().is_empty());
        assert_eq!(plan.read_state(), None);
    }

    #[rstest]
    #[tokio::test]
    async fn later_read_state_wins_over_earlier_one() {
        let set = rules(
            r#"
            [[rule]]
            name = "first"
            [rule.actions]
            mark_as_read = true

            [[rule]]
            name = "second"
            [rule.actions]
            mark_as_read = false
            "#,
        );
        let mut client = MockMailbox::default();

        let plan = plan_all(&message(&["INBOX"], true), &set, &mut client).await;

        assert_eq!(plan.read_state(), Some(false));
        assert_contains!(plan.add_labels(), &UNREAD_LABEL.to_string());
        assert!(plan.remove_labels().is_empty());
    }

    #[rstest]
    #[tokio::test]
    async fn marking_read_removes_the_unread_label() {
        let set = rules(
            r#"
            [[rule]]
            name = "seen"
            [rule.actions]
            mark_as_read = true
            "#,
        );
        let mut client = MockMailbox::default();

        let plan = plan_all(&message(&["INBOX", "UNREAD"], false), &set, &mut client).await;

        assert_contains!(plan.remove_labels(), &UNREAD_LABEL.to_string());
        assert!(plan.add_labels().is_empty());
        assert_eq!(plan.read_state(), Some(true));
    }

    #[rstest]
    #[tokio::test]
    async fn read_state_override_keeps_label_sets_disjoint() {
        let set = rules(
            r#"
            [[rule]]
            name = "mislabel"
            [rule.actions]
            label = "unread"

            [[rule]]
            name = "seen"
            [rule.actions]
            mark_as_read = true
            "#,
        );
        let mut client = MockMailbox::default().with_label("UNREAD", UNREAD_LABEL);

        let plan = plan_all(&message(&["INBOX", "UNREAD"], false), &set, &mut client).await;

        assert!(plan.add_labels().is_disjoint(plan.remove_labels()));
        assert_contains!(plan.remove_labels(), &UNREAD_LABEL.to_string());
    }

    #[rstest]
    #[tokio::test]
    async fn already_applied_actions_plan_to_a_noop() {
        let set = rules(
            r#"
            [[rule]]
            name = "finance"
            [rule.actions]
            label = "Finance"
            mark_as_read = true
            "#,
        );
        let mut client = MockMailbox::default();
        let labeled = message(&["INBOX", "Finance-label-id"], true);

        let plan = plan_all(&labeled, &set, &mut client).await;

        assert!(plan.is_noop());
    }

    #[rstest]
    #[tokio::test]
    async fn duplicate_labels_resolve_once() {
        let set = rules(
            r#"
            [[rule]]
            name = "first"
            [rule.actions]
            label = "Finance"

            [[rule]]
            name = "second"
            [rule.actions]
            label = "Finance"
            "#,
        );
        let mut client = MockMailbox::default();

        let plan = plan_all(&message(&["INBOX"], true), &set, &mut client).await;

        assert_eq!(plan.add_labels().len(), 1);
        assert_eq!(client.created_labels, vec!["Finance"]);
    }
}
