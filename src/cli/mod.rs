use anyhow::{Context, Result};
use log::{info, warn};

use crate::{
    Args,
    config::Config,
    engine::Reconciler,
    gmail::{GmailClient, MailboxClient, RemoteError},
    rules::RuleSet,
    store::{Message, MessageStore},
};

pub async fn run(args: &Args, config: &Config) -> Result<()> {
    let rules_file = args.rules.clone().unwrap_or_else(|| config.rules().clone());
    let rules = RuleSet::load(&rules_file).context("rule configuration is unusable")?;

    let mut store = MessageStore::open(config.statedir()).context("message store is unavailable")?;
    let mut client = GmailClient::new(config.auth().access_token());

    let limit = args.limit.unwrap_or(config.fetch_limit());
    match fetch_recent(&mut client, limit).await {
        Ok(fetched) => {
            let inserted = store.upsert_new(&fetched)?;
            info!("fetched {} messages, {inserted} of them new", fetched.len());
        }
        Err(err) => {
            warn!("fetching new messages failed, processing the stored snapshot only: {err}");
        }
    }

    Reconciler::new(&mut store, &rules, &mut client)
        .run()
        .await?;

    Ok(())
}

/// Pulls the most recent inbox messages. One message failing to load is
/// skipped with a warning; only the listing itself failing aborts the
/// fetch.
async fn fetch_recent<C: MailboxClient>(
    client: &mut C,
    limit: u32,
) -> Result<Vec<Message>, RemoteError> {
    let ids = client.list_recent_message_ids(limit).await?;
    let mut fetched = Vec::with_capacity(ids.len());
    for id in ids {
        match client.get_message(&id).await {
            Ok(message) => fetched.push(message),
            Err(err) => warn!("skipping message {id}: {err}"),
        }
    }
    Ok(fetched)
}
