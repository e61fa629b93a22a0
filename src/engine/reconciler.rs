use jiff::Timestamp;
use log::{debug, error, info, trace};

use crate::{
    engine::{eval, plan},
    gmail::MailboxClient,
    rules::{Rule, RuleSet},
    store::{Message, MessageStore, StoreError},
};

/// Outcome counts of one reconciliation run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub matched: usize,
    pub unmatched: usize,
    pub failed: usize,
}

/// Runs every unprocessed message in the store through the rule set and
/// applies the resulting mutations remotely and locally.
pub struct Reconciler<'a, C: MailboxClient> {
    store: &'a mut MessageStore,
    rules: &'a RuleSet,
    client: &'a mut C,
}

impl<'a, C: MailboxClient> Reconciler<'a, C> {
    pub fn new(store: &'a mut MessageStore, rules: &'a RuleSet, client: &'a mut C) -> Self {
        Self {
            store,
            rules,
            client,
        }
    }

    /// One sequential pass over the unprocessed snapshot.
    ///
    /// A message is marked processed only after its remote mutation (if
    /// any) succeeded, so an interrupted run picks up exactly where it
    /// left off. Remote failures stay contained to the message they hit;
    /// only storage failures abort the run.
    pub async fn run(&mut self) -> Result<RunSummary, StoreError> {
        let messages = self.store.select_unprocessed()?;
        debug!("reconciling {} unprocessed messages", messages.len());
        let now = Timestamp::now();
        let mut summary = RunSummary::default();

        for message in &messages {
            let matched: Vec<&Rule> = self
                .rules
                .ordered()
                .iter()
                .filter(|rule| eval::matches_rule(message, rule, now))
                .collect();

            if matched.is_empty() {
                // Stays unprocessed: an edited rule set picks it up on a
                // later run.
                debug!("no rule matched message {}", message.id());
                summary.unmatched += 1;
                continue;
            }
            for rule in &matched {
                trace!("message {} matched rule {}", message.id(), rule.name());
            }

            if self.apply(message, &matched).await? {
                summary.matched += 1;
            } else {
                summary.failed += 1;
            }
        }

        info!(
            "run complete: {} matched, {} unmatched, {} failed",
            summary.matched, summary.unmatched, summary.failed
        );
        Ok(summary)
    }

    /// Applies the matched rules to one message. Returns whether the
    /// message was finalized; a remote failure is logged and reported as
    /// `false` so the caller can move on.
    async fn apply(&mut self, message: &Message, matched: &[&Rule]) -> Result<bool, StoreError> {
        let plan = match plan::plan(message, matched, self.client).await {
            Ok(plan) => plan,
            Err(err) => {
                error!("resolving labels for message {} failed: {err}", message.id());
                return Ok(false);
            }
        };

        if plan.is_noop() {
            trace!("nothing to change for message {}", message.id());
        } else {
            let add: Vec<String> = plan.add_labels().iter().cloned().collect();
            let remove: Vec<String> = plan.remove_labels().iter().cloned().collect();
            if let Err(err) = self.client.modify_message(message.id(), &add, &remove).await {
                error!("remote mutation of message {} failed: {err}", message.id());
                return Ok(false);
            }
        }

        let new_read_state = plan.read_state().unwrap_or(message.is_read());
        self.store
            .apply_mutation(message.id(), &plan, new_read_state)?;
        Ok(true)
    }
}
