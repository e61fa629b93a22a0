use std::collections::{BTreeSet, HashMap};

use jiff::Timestamp;
use log::{debug, info, trace, warn};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::{MailboxClient, RemoteError, UNREAD_LABEL};
use crate::store::Message;

const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1";

/// Client for the Gmail v1 REST API, authenticated with a bearer token
/// obtained at startup. The label directory is fetched once per run and
/// cached; serial processing keeps the cache trivially consistent.
pub struct GmailClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    labels: Option<HashMap<String, String>>,
}

impl GmailClient {
    pub fn new(token: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: GMAIL_API_BASE.to_string(),
            token,
            labels: None,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/users/me/{path}", self.base_url)
    }

    async fn ensure_labels(&mut self) -> Result<(), RemoteError> {
        if self.labels.is_some() {
            return Ok(());
        }
        debug!("fetching label directory");
        let listing: LabelListing = self
            .http
            .get(self.url("labels"))
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        self.labels = Some(
            listing
                .labels
                .into_iter()
                .map(|label| (label.name.to_lowercase(), label.id))
                .collect(),
        );
        Ok(())
    }
}

impl MailboxClient for GmailClient {
    async fn list_recent_message_ids(&mut self, limit: u32) -> Result<Vec<String>, RemoteError> {
        trace!("listing {limit} most recent inbox messages");
        let listing: MessageListing = self
            .http
            .get(self.url("messages"))
            .query(&[
                ("maxResults", limit.to_string().as_str()),
                ("labelIds", "INBOX"),
            ])
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(listing
            .messages
            .unwrap_or_default()
            .into_iter()
            .map(|reference| reference.id)
            .collect())
    }

    async fn get_message(&mut self, id: &str) -> Result<Message, RemoteError> {
        trace!("fetching message {id}");
        let response = self
            .http
            .get(self.url(&format!("messages/{id}")))
            .query(&[
                ("format", "metadata"),
                ("metadataHeaders", "From"),
                ("metadataHeaders", "Subject"),
            ])
            .bearer_auth(&self.token)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(RemoteError::UnknownMessage(id.to_string()));
        }
        let payload: MessagePayload = response.error_for_status()?.json().await?;
        Ok(payload.into_message())
    }

    async fn get_or_create_label(&mut self, name: &str) -> Result<String, RemoteError> {
        self.ensure_labels().await?;
        if let Some(id) = self
            .labels
            .as_ref()
            .and_then(|labels| labels.get(&name.to_lowercase()))
        {
            return Ok(id.clone());
        }

        info!("creating label {name}");
        let response = self
            .http
            .post(self.url("labels"))
            .bearer_auth(&self.token)
            .json(&NewLabel::named(name))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(RemoteError::Rejected(format!(
                "creating label {name}: {}",
                response.status()
            )));
        }
        let label: LabelRef = response.json().await?;
        let id = label.id.clone();
        self.labels
            .as_mut()
            .expect("label cache is filled before creation")
            .insert(label.name.to_lowercase(), label.id);
        Ok(id)
    }

    async fn modify_message(
        &mut self,
        id: &str,
        add_label_ids: &[String],
        remove_label_ids: &[String],
    ) -> Result<(), RemoteError> {
        debug!("modifying message {id}: +{add_label_ids:?} -{remove_label_ids:?}");
        let response = self
            .http
            .post(self.url(&format!("messages/{id}/modify")))
            .bearer_auth(&self.token)
            .json(&ModifyRequest {
                add_label_ids,
                remove_label_ids,
            })
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(RemoteError::UnknownMessage(id.to_string()));
        }
        if !response.status().is_success() {
            return Err(RemoteError::Rejected(format!(
                "modifying message {id}: {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct MessageListing {
    messages: Option<Vec<MessageRef>>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Deserialize, Default)]
struct MessageMeta {
    #[serde(default)]
    headers: Vec<Header>,
}

#[derive(Debug, Deserialize)]
struct Header {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessagePayload {
    id: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    label_ids: Vec<String>,
    #[serde(default)]
    internal_date: Option<String>,
    #[serde(default)]
    payload: MessageMeta,
}

impl MessagePayload {
    fn header(&self, name: &str) -> String {
        self.payload
            .headers
            .iter()
            .find(|header| header.name.eq_ignore_ascii_case(name))
            .map(|header| header.value.clone())
            .unwrap_or_default()
    }

    fn into_message(self) -> Message {
        let received_at = self.internal_date.as_deref().and_then(parse_internal_date);
        let labels: BTreeSet<String> = self.label_ids.iter().cloned().collect();
        let is_read = !labels.contains(UNREAD_LABEL);
        Message::new(
            self.id.clone(),
            self.header("From"),
            self.header("Subject"),
            self.snippet.clone(),
            received_at,
            labels,
            is_read,
        )
    }
}

/// `internalDate` is milliseconds since the epoch, as a string.
fn parse_internal_date(raw: &str) -> Option<Timestamp> {
    let timestamp = raw
        .parse::<i64>()
        .ok()
        .and_then(|millis| Timestamp::from_millisecond(millis).ok());
    if timestamp.is_none() {
        warn!("message internalDate {raw:?} is not a millisecond timestamp");
    }
    timestamp
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewLabel<'a> {
    name: &'a str,
    label_list_visibility: &'static str,
    message_list_visibility: &'static str,
}

impl<'a> NewLabel<'a> {
    fn named(name: &'a str) -> Self {
        Self {
            name,
            label_list_visibility: "labelShow",
            message_list_visibility: "show",
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ModifyRequest<'a> {
    add_label_ids: &'a [String],
    remove_label_ids: &'a [String],
}

#[derive(Deserialize)]
struct LabelListing {
    #[serde(default)]
    labels: Vec<LabelRef>,
}

#[derive(Deserialize)]
struct LabelRef {
    id: String,
    name: String,
}
