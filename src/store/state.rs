use std::{
    fs::create_dir_all,
    io,
    path::{Path, PathBuf},
};

use log::{debug, trace, warn};
use rusqlite::{Connection, OptionalExtension};
use thiserror::Error;

use super::message::{Message, labels_from_json, labels_to_json};
use crate::engine::MutationPlan;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("message store is unavailable: {0}")]
    Unavailable(#[from] rusqlite::Error),
    #[error("message store directory cannot be prepared: {0}")]
    Io(#[from] io::Error),
    #[error("message store schema version {0} is not supported")]
    Version(u32),
    #[error("message {0} does not exist in the store")]
    NotFound(String),
}

const CURRENT_VERSION: u32 = 1;

/// Durable snapshot of known messages, keyed by their remote id.
///
/// Owns the sqlite connection for the whole run; nothing else touches the
/// database file while a store is open.
#[derive(Debug)]
pub struct MessageStore {
    db: Connection,
}

impl MessageStore {
    pub fn open(state_dir: &Path) -> Result<Self, StoreError> {
        let state_file = Self::prepare_state_file(state_dir)?;
        debug!("opening message store {}", state_file.to_string_lossy());
        let db = Connection::open(state_file)?;
        match get_schema_version(&db)? {
            0 => init_schema(&db)?,
            CURRENT_VERSION => {}
            other => return Err(StoreError::Version(other)),
        }
        Ok(Self { db })
    }

    /// Inserts messages whose id is not yet known and returns how many
    /// were new. Existing rows are left untouched, so `processed` (and
    /// everything else already recorded) survives a re-fetch.
    pub fn upsert_new(&mut self, messages: &[Message]) -> Result<usize, StoreError> {
        let tx = self.db.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare_cached(
                "insert or ignore into messages
                (id, sender, subject, snippet, labels, received_at, is_read, processed)
                values (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for message in messages {
                inserted += stmt.execute((
                    message.id(),
                    message.sender(),
                    message.subject(),
                    message.snippet(),
                    labels_to_json(message.labels()),
                    message.received_at().map(|timestamp| timestamp.to_string()),
                    message.is_read(),
                    message.processed(),
                ))?;
            }
        }
        tx.commit()?;
        trace!("{inserted} new messages stored");
        Ok(inserted)
    }

    /// All messages still awaiting rule evaluation, in insertion order.
    /// Insertion order is the de facto processing order; there is no
    /// other sort key.
    pub fn select_unprocessed(&self) -> Result<Vec<Message>, StoreError> {
        let mut stmt = self.db.prepare_cached(
            "select id, sender, subject, snippet, labels, received_at, is_read, processed
            from messages where processed = 0 order by rowid",
        )?;
        let messages = stmt
            .query_map([], |row| Message::try_from(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(messages)
    }

    /// Applies a mutation plan to the stored message and marks it
    /// processed, atomically.
    pub fn apply_mutation(
        &mut self,
        id: &str,
        plan: &MutationPlan,
        new_read_state: bool,
    ) -> Result<(), StoreError> {
        trace!("recording mutation of message {id}");
        let tx = self.db.transaction()?;
        let stored: Option<String> = tx
            .query_one("select labels from messages where id = ?1", [id], |row| {
                row.get(0)
            })
            .optional()?;
        let Some(stored) = stored else {
            return Err(StoreError::NotFound(id.to_string()));
        };
        let mut labels = labels_from_json(&stored);
        for label in plan.remove_labels() {
            labels.remove(label);
        }
        for label in plan.add_labels() {
            labels.insert(label.clone());
        }
        tx.execute(
            "update messages set labels = ?1, is_read = ?2, processed = 1 where id = ?3",
            (labels_to_json(&labels), new_read_state, id),
        )?;
        tx.commit()?;
        Ok(())
    }

    fn prepare_state_file(state_dir: &Path) -> io::Result<PathBuf> {
        create_dir_all(state_dir)?;

        Ok(state_dir.join("mailrules.db"))
    }
}

impl Drop for MessageStore {
    fn drop(&mut self) {
        if let Err(err) = self.db.execute("pragma optimize;", []) {
            warn!("optimizing message store on close failed: {err}");
        }
    }
}

fn get_schema_version(db: &Connection) -> Result<u32, StoreError> {
    Ok(db.query_one("select * from pragma_user_version", [], |row| row.get(0))?)
}

fn init_schema(db: &Connection) -> Result<(), StoreError> {
    debug!("creating message store schema");
    db.execute_batch(
        "pragma journal_mode=wal;
        pragma user_version=1;
        pragma synchronous=1;
        create table messages (
            id text primary key,
            sender text not null,
            subject text not null,
            snippet text not null,
            labels text not null,
            received_at text,
            is_read integer not null,
            processed integer not null
        ) strict;
        pragma optimize;",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{collections::BTreeSet, fs};

    use assertables::*;
    use jiff::Timestamp;
    use rstest::*;
    use tempfile::{TempDir, tempdir};

    use super::*;

    struct TestStore {
        dir: TempDir,
        store: MessageStore,
    }

    #[fixture]
    fn store() -> TestStore {
        let dir = assert_ok!(tempdir());
        let store = assert_ok!(MessageStore::open(dir.path()));
        TestStore { dir, store }
    }

    fn message(id: &str, sender: &str, subject: &str) -> Message {
        Message::new(
            id.to_string(),
            sender.to_string(),
            subject.to_string(),
            "snippet".to_string(),
            Some(Timestamp::UNIX_EPOCH),
            BTreeSet::from(["INBOX".to_string(), "UNREAD".to_string()]),
            false,
        )
    }

    fn raw_row(test: &TestStore, id: &str) -> (String, String, bool, bool) {
        let db = assert_ok!(Connection::open(test.dir.path().join("mailrules.db")));
        assert_ok!(db.query_one(
            "select subject, labels, is_read, processed from messages where id = ?1",
            [id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        ))
    }

    #[rstest]
    fn open_initializes_db_with_write_ahead_log(store: TestStore) {
        assert!(assert_ok!(fs::exists(
            store.dir.path().join("mailrules.db")
        )));
        assert!(assert_ok!(fs::exists(
            store.dir.path().join("mailrules.db-wal")
        )));
    }

    #[rstest]
    fn reopening_existing_store_succeeds(store: TestStore) {
        let TestStore { dir, store } = store;
        drop(store);
        assert_ok!(MessageStore::open(dir.path()));
    }

    #[rstest]
    fn upsert_counts_only_new_messages(mut store: TestStore) {
        let first = vec![message("m1", "alice@x.com", "Hello")];
        assert_eq!(assert_ok!(store.store.upsert_new(&first)), 1);

        let second = vec![
            message("m1", "alice@x.com", "Hello"),
            message("m2", "bob@x.com", "Hi"),
        ];
        assert_eq!(assert_ok!(store.store.upsert_new(&second)), 1);
    }

    #[rstest]
    fn upsert_leaves_existing_rows_untouched(mut store: TestStore) {
        assert_ok!(
            store
                .store
                .upsert_new(&[message("m1", "alice@x.com", "Hello")])
        );
        assert_ok!(
            store
                .store
                .apply_mutation("m1", &MutationPlan::default(), true)
        );

        assert_ok!(
            store
                .store
                .upsert_new(&[message("m1", "alice@x.com", "Different subject")])
        );

        let (subject, _, is_read, processed) = raw_row(&store, "m1");
        assert_eq!(subject, "Hello");
        assert!(is_read);
        assert!(processed);
    }

    #[rstest]
    fn select_unprocessed_returns_insertion_order(mut store: TestStore) {
        let messages = vec![
            message("m2", "bob@x.com", "second"),
            message("m1", "alice@x.com", "first"),
            message("m3", "carol@x.com", "third"),
        ];
        assert_ok!(store.store.upsert_new(&messages));

        let unprocessed = assert_ok!(store.store.select_unprocessed());
        let ids: Vec<&str> = unprocessed.iter().map(Message::id).collect();
        assert_eq!(ids, vec!["m2", "m1", "m3"]);
    }

    #[rstest]
    fn select_unprocessed_skips_processed_messages(mut store: TestStore) {
        assert_ok!(store.store.upsert_new(&[
            message("m1", "alice@x.com", "first"),
            message("m2", "bob@x.com", "second"),
        ]));
        assert_ok!(
            store
                .store
                .apply_mutation("m1", &MutationPlan::default(), false)
        );

        let unprocessed = assert_ok!(store.store.select_unprocessed());
        assert_eq!(unprocessed.len(), 1);
        assert_eq!(unprocessed[0].id(), "m2");
    }

    #[rstest]
    fn apply_mutation_rewrites_labels_and_read_state(mut store: TestStore) {
        assert_ok!(
            store
                .store
                .upsert_new(&[message("m1", "alice@x.com", "Hello")])
        );
        let plan = MutationPlan::for_tests(
            BTreeSet::from(["Label_7".to_string()]),
            BTreeSet::from(["UNREAD".to_string()]),
            Some(true),
        );

        assert_ok!(store.store.apply_mutation("m1", &plan, true));

        let (_, labels, is_read, processed) = raw_row(&store, "m1");
        assert_eq!(labels, r#"["INBOX","Label_7"]"#);
        assert!(is_read);
        assert!(processed);
    }

    #[rstest]
    fn apply_mutation_to_unknown_id_is_an_error(mut store: TestStore) {
        let error = assert_err!(store.store.apply_mutation(
            "ghost",
            &MutationPlan::default(),
            true
        ));
        assert!(matches!(error, StoreError::NotFound(id) if id == "ghost"));
    }

    #[rstest]
    fn round_trips_message_fields(mut store: TestStore) {
        let original = message("m1", "alice@x.com", "Hello");
        assert_ok!(store.store.upsert_new(std::slice::from_ref(&original)));

        let loaded = assert_ok!(store.store.select_unprocessed());
        assert_eq!(loaded, vec![original]);
    }
}
