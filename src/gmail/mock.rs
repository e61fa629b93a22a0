use std::collections::{HashMap, HashSet};

use super::{MailboxClient, RemoteError};
use crate::store::Message;

/// Scripted stand-in for the Gmail API used by engine and cli tests.
/// Records every mutation so tests can assert on the exact remote calls.
#[derive(Default)]
pub struct MockMailbox {
    inbox: Vec<Message>,
    labels: HashMap<String, String>,
    fail_modify: HashSet<String>,
    pub created_labels: Vec<String>,
    pub modify_calls: Vec<ModifyCall>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifyCall {
    pub id: String,
    pub add: Vec<String>,
    pub remove: Vec<String>,
}

impl MockMailbox {
    pub fn with_messages(inbox: Vec<Message>) -> Self {
        Self {
            inbox,
            ..Self::default()
        }
    }

    pub fn with_label(mut self, name: &str, id: &str) -> Self {
        self.labels.insert(name.to_lowercase(), id.to_string());
        self
    }

    pub fn fail_modify_of(&mut self, id: &str) {
        self.fail_modify.insert(id.to_string());
    }
}

impl MailboxClient for MockMailbox {
    async fn list_recent_message_ids(&mut self, limit: u32) -> Result<Vec<String>, RemoteError> {
        Ok(self
            .inbox
            .iter()
            .take(limit as usize)
            .map(|message| message.id().to_string())
            .collect())
    }

    async fn get_message(&mut self, id: &str) -> Result<Message, RemoteError> {
        self.inbox
            .iter()
            .find(|message| message.id() == id)
            .cloned()
            .ok_or_else(|| RemoteError::UnknownMessage(id.to_string()))
    }

    async fn get_or_create_label(&mut self, name: &str) -> Result<String, RemoteError> {
        let key = name.to_lowercase();
        if let Some(id) = self.labels.get(&key) {
            return Ok(id.clone());
        }
        let id = format!("{name}-label-id");
        self.labels.insert(key, id.clone());
        self.created_labels.push(name.to_string());
        Ok(id)
    }

    async fn modify_message(
        &mut self,
        id: &str,
        add_label_ids: &[String],
        remove_label_ids: &[String],
    ) -> Result<(), RemoteError> {
        if self.fail_modify.contains(id) {
            return Err(RemoteError::Rejected(format!("simulated outage for {id}")));
        }
        self.modify_calls.push(ModifyCall {
            id: id.to_string(),
            add: add_label_ids.to_vec(),
            remove: remove_label_ids.to_vec(),
        });
        Ok(())
    }
}
