mod client;
#[cfg(test)]
mod mock;

pub use client::GmailClient;
#[cfg(test)]
pub use mock::MockMailbox;
#[cfg(test)]
pub use mock::ModifyCall;

use thiserror::Error;

use crate::store::Message;

/// Gmail models the read state as absence of this system label.
pub const UNREAD_LABEL: &str = "UNREAD";

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("mailbox request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("mailbox rejected the request: {0}")]
    Rejected(String),
    #[error("message {0} is not known to the mailbox")]
    UnknownMessage(String),
}

/// The remote mailbox operations the rest of the crate needs.
/// `GmailClient` talks to the real service; tests script a mock.
pub trait MailboxClient {
    async fn list_recent_message_ids(&mut self, limit: u32) -> Result<Vec<String>, RemoteError>;

    async fn get_message(&mut self, id: &str) -> Result<Message, RemoteError>;

    /// Resolves a label name to its remote id, matching case-insensitively
    /// against existing labels and creating the label if there is none.
    async fn get_or_create_label(&mut self, name: &str) -> Result<String, RemoteError>;

    async fn modify_message(
        &mut self,
        id: &str,
        add_label_ids: &[String],
        remove_label_ids: &[String],
    ) -> Result<(), RemoteError>;
}
