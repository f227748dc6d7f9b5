//! Crowd-sourced facts with auto-reply.
//!
//! Each guild's facts are stored as one map keyed by lowercased subject.
//! Two caches per guild sit in front of the store: the subject list used for
//! autocomplete, and the subject -> body map of auto-reply facts. Both are
//! rebuilt after every mutation and lazily on first use.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use wager_common::{Collection, KvBackend, StoreError};

use crate::bet::lock::KeyedLocks;
use crate::bet::render::{Embed, EmbedFooter, COLOR_OPEN};

/// Store namespace for facts.
pub const FACTS_NAMESPACE: &str = "facts";

/// Most subjects returned by autocomplete.
pub const AUTOCOMPLETE_LIMIT: usize = 25;

/// Facts per list page.
pub const LIST_PAGE_SIZE: usize = 15;

/// Body that deletes the fact instead of saving it.
pub const REMOVE_KEYWORD: &str = "REMOVE";

#[derive(Debug, Error)]
pub enum FactError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("No fact about \"{0}\"")]
    NotFound(String),

    #[error("Not allowed to edit \"{0}\"")]
    NotPermitted(String),

    #[error("Subject must not be empty")]
    EmptySubject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactRecord {
    pub author_id: String,
    pub subject: String,
    pub body: String,
    pub edited_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub auto_reply: bool,
}

impl FactRecord {
    /// Message showing the fact.
    pub fn render(&self) -> String {
        format!(
            "**{}** *(added by <@{}>)*\n\n{}",
            self.subject.to_uppercase(),
            self.author_id,
            self.body
        )
    }
}

/// Who is editing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactEditor {
    pub user_id: String,
    /// Holds the manage-messages permission.
    pub is_moderator: bool,
}

impl FactEditor {
    fn may_edit(&self, fact: &FactRecord) -> bool {
        self.is_moderator || fact.author_id == self.user_id
    }
}

/// Result of an edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FactEdit {
    Saved(FactRecord),
    Removed(FactRecord),
}

/// One page of the fact list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactPage {
    /// Zero-based, already clamped.
    pub page: usize,
    pub page_count: usize,
    pub auto_reply_only: bool,
    /// (1-based position, subject, auto-reply)
    pub entries: Vec<(usize, String, bool)>,
}

impl FactPage {
    pub fn has_previous(&self) -> bool {
        self.page > 0
    }

    pub fn has_next(&self) -> bool {
        self.page + 1 < self.page_count
    }

    pub fn render(&self) -> Embed {
        let description = self
            .entries
            .iter()
            .map(|(position, subject, auto_reply)| {
                if *auto_reply {
                    format!("{}. **{}** `(R)`", position, subject)
                } else {
                    format!("{}. **{}**", position, subject)
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
        let footer = self
            .entries
            .iter()
            .any(|(_, _, auto_reply)| *auto_reply)
            .then(|| EmbedFooter {
                text: "(R): auto-reply on".to_string(),
                icon_url: None,
            });

        Embed {
            title: Some(format!("Page {}/{}", self.page + 1, self.page_count)),
            description: Some(description),
            fields: Vec::new(),
            color: Some(COLOR_OPEN),
            footer,
        }
    }
}

type GuildFacts = BTreeMap<String, FactRecord>;

/// Lowercased, trimmed lookup key.
pub fn subject_key(subject: &str) -> String {
    subject.trim().to_lowercase()
}

/// Facts of every guild.
pub struct FactBook {
    facts: Collection<GuildFacts>,
    locks: KeyedLocks,
    subjects: DashMap<String, Arc<Vec<String>>>,
    auto_replies: DashMap<String, Arc<HashMap<String, String>>>,
}

impl FactBook {
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self {
            facts: Collection::new(backend, FACTS_NAMESPACE),
            locks: KeyedLocks::new(),
            subjects: DashMap::new(),
            auto_replies: DashMap::new(),
        }
    }

    async fn guild_facts(&self, guild_id: &str) -> Result<GuildFacts, FactError> {
        Ok(self.facts.get(guild_id).await?.unwrap_or_default())
    }

    pub async fn get(
        &self,
        guild_id: &str,
        subject: &str,
    ) -> Result<Option<FactRecord>, FactError> {
        Ok(self.guild_facts(guild_id).await?.remove(&subject_key(subject)))
    }

    /// A random fact of the guild.
    pub async fn random(&self, guild_id: &str) -> Result<Option<FactRecord>, FactError> {
        let facts: Vec<FactRecord> = self.guild_facts(guild_id).await?.into_values().collect();
        Ok(facts.choose(&mut rand::thread_rng()).cloned())
    }

    /// Subjects containing `query`, at most [`AUTOCOMPLETE_LIMIT`].
    pub async fn autocomplete(
        &self,
        guild_id: &str,
        query: &str,
    ) -> Result<Vec<String>, FactError> {
        let subjects = match self.subjects.get(guild_id) {
            Some(cached) => Arc::clone(cached.value()),
            None => self.rebuild_caches(guild_id).await?,
        };
        let query = subject_key(query);
        Ok(subjects
            .iter()
            .filter(|subject| subject.contains(&query))
            .take(AUTOCOMPLETE_LIMIT)
            .cloned()
            .collect())
    }

    /// Create or replace a fact. A body of [`REMOVE_KEYWORD`] removes it.
    ///
    /// Only the author or a moderator may touch an existing fact. The
    /// auto-reply flag survives edits.
    pub async fn upsert(
        &self,
        guild_id: &str,
        editor: &FactEditor,
        subject: &str,
        body: &str,
    ) -> Result<FactEdit, FactError> {
        if body.trim() == REMOVE_KEYWORD {
            return self.remove(guild_id, editor, subject).await.map(FactEdit::Removed);
        }

        let key = subject_key(subject);
        if key.is_empty() {
            return Err(FactError::EmptySubject);
        }

        let record = {
            let _guard = self.locks.lock(guild_id).await;
            let mut facts = self.guild_facts(guild_id).await?;

            let auto_reply = match facts.get(&key) {
                Some(existing) if !editor.may_edit(existing) => {
                    return Err(FactError::NotPermitted(key));
                }
                Some(existing) => existing.auto_reply,
                None => false,
            };

            let record = FactRecord {
                author_id: editor.user_id.clone(),
                subject: key.clone(),
                body: body.to_string(),
                edited_at: Utc::now(),
                auto_reply,
            };
            facts.insert(key, record.clone());
            self.facts.set(guild_id, &facts).await?;
            record
        };

        info!(
            guild_id = %guild_id,
            subject = %record.subject,
            user_id = %editor.user_id,
            "Fact edited"
        );
        self.rebuild_caches(guild_id).await?;
        Ok(FactEdit::Saved(record))
    }

    /// Delete a fact. Returns the removed record.
    pub async fn remove(
        &self,
        guild_id: &str,
        editor: &FactEditor,
        subject: &str,
    ) -> Result<FactRecord, FactError> {
        let key = subject_key(subject);
        let removed = {
            let _guard = self.locks.lock(guild_id).await;
            let mut facts = self.guild_facts(guild_id).await?;
            match facts.get(&key) {
                None => return Err(FactError::NotFound(key)),
                Some(existing) if !editor.may_edit(existing) => {
                    return Err(FactError::NotPermitted(key))
                }
                Some(_) => {}
            }
            let removed = facts.remove(&key).ok_or_else(|| FactError::NotFound(key.clone()))?;
            self.facts.set(guild_id, &facts).await?;
            removed
        };

        info!(
            guild_id = %guild_id,
            subject = %removed.subject,
            user_id = %editor.user_id,
            "Fact deleted"
        );
        self.rebuild_caches(guild_id).await?;
        Ok(removed)
    }

    /// Turn auto-reply on or off for a fact.
    pub async fn set_auto_reply(
        &self,
        guild_id: &str,
        subject: &str,
        enabled: bool,
    ) -> Result<FactRecord, FactError> {
        let key = subject_key(subject);
        let record = {
            let _guard = self.locks.lock(guild_id).await;
            let mut facts = self.guild_facts(guild_id).await?;
            let fact = facts
                .get_mut(&key)
                .ok_or_else(|| FactError::NotFound(key.clone()))?;
            fact.auto_reply = enabled;
            let record = fact.clone();
            self.facts.set(guild_id, &facts).await?;
            record
        };

        info!(guild_id = %guild_id, subject = %record.subject, enabled, "Auto-reply toggled");
        self.rebuild_caches(guild_id).await?;
        Ok(record)
    }

    /// A page of the fact list; `page` is zero-based and clamped into range.
    pub async fn list_page(
        &self,
        guild_id: &str,
        page: i64,
        auto_reply_only: bool,
    ) -> Result<FactPage, FactError> {
        let facts: Vec<FactRecord> = self
            .guild_facts(guild_id)
            .await?
            .into_values()
            .filter(|fact| !auto_reply_only || fact.auto_reply)
            .collect();

        let page_count = facts.len().div_ceil(LIST_PAGE_SIZE).max(1);
        let page = page.clamp(0, page_count as i64 - 1) as usize;
        let entries = facts
            .into_iter()
            .enumerate()
            .skip(page * LIST_PAGE_SIZE)
            .take(LIST_PAGE_SIZE)
            .map(|(i, fact)| (i + 1, fact.subject, fact.auto_reply))
            .collect();

        Ok(FactPage {
            page,
            page_count,
            auto_reply_only,
            entries,
        })
    }

    /// Body to reply with when a message exactly matches an auto-reply
    /// subject.
    pub async fn auto_reply_for(
        &self,
        guild_id: &str,
        message: &str,
    ) -> Result<Option<String>, FactError> {
        let replies = match self.auto_replies.get(guild_id) {
            Some(cached) => Arc::clone(cached.value()),
            None => {
                debug!(guild_id = %guild_id, "No auto-reply cache");
                self.rebuild_caches(guild_id).await?;
                self.auto_replies
                    .get(guild_id)
                    .map(|cached| Arc::clone(cached.value()))
                    .unwrap_or_default()
            }
        };
        Ok(replies.get(&subject_key(message)).cloned())
    }

    /// Reload both caches from the store. Returns the subject list.
    async fn rebuild_caches(&self, guild_id: &str) -> Result<Arc<Vec<String>>, FactError> {
        let facts = self.guild_facts(guild_id).await?;

        let subjects: Arc<Vec<String>> = Arc::new(facts.keys().cloned().collect());
        let replies: HashMap<String, String> = facts
            .into_iter()
            .filter(|(_, fact)| fact.auto_reply)
            .map(|(key, fact)| (key, fact.body))
            .collect();

        self.subjects.insert(guild_id.to_string(), Arc::clone(&subjects));
        self.auto_replies.insert(guild_id.to_string(), Arc::new(replies));
        debug!(guild_id = %guild_id, subjects = subjects.len(), "Fact caches rebuilt");
        Ok(subjects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wager_common::MemoryBackend;

    fn book() -> FactBook {
        FactBook::new(Arc::new(MemoryBackend::new()))
    }

    fn member(id: &str) -> FactEditor {
        FactEditor {
            user_id: id.to_string(),
            is_moderator: false,
        }
    }

    #[tokio::test]
    async fn test_subject_is_case_insensitive() {
        let book = book();
        book.upsert("g1", &member("u1"), "Rust", "A language").await.unwrap();

        let fact = book.get("g1", "  RUST ").await.unwrap().unwrap();
        assert_eq!(fact.subject, "rust");
        assert_eq!(fact.render(), "**RUST** *(added by <@u1>)*\n\nA language");
    }

    #[tokio::test]
    async fn test_only_author_or_moderator_edits() {
        let book = book();
        book.upsert("g1", &member("u1"), "rust", "v1").await.unwrap();

        let denied = book.upsert("g1", &member("u2"), "rust", "v2").await;
        assert!(matches!(denied, Err(FactError::NotPermitted(_))));

        let moderator = FactEditor {
            user_id: "m1".to_string(),
            is_moderator: true,
        };
        let saved = book.upsert("g1", &moderator, "rust", "v3").await.unwrap();
        assert!(matches!(saved, FactEdit::Saved(ref f) if f.body == "v3" && f.author_id == "m1"));
    }

    #[tokio::test]
    async fn test_remove_keyword_deletes() {
        let book = book();
        book.upsert("g1", &member("u1"), "rust", "v1").await.unwrap();

        let edit = book.upsert("g1", &member("u1"), "rust", "REMOVE").await.unwrap();
        assert!(matches!(edit, FactEdit::Removed(ref f) if f.author_id == "u1"));
        assert!(book.get("g1", "rust").await.unwrap().is_none());
        assert!(book.autocomplete("g1", "").await.unwrap().is_empty());

        let missing = book.upsert("g1", &member("u1"), "rust", "REMOVE").await;
        assert!(matches!(missing, Err(FactError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_autocomplete_substring_and_limit() {
        let book = book();
        for i in 0..30 {
            book.upsert("g1", &member("u1"), &format!("topic {:02}", i), "x")
                .await
                .unwrap();
        }
        book.upsert("g1", &member("u1"), "other", "x").await.unwrap();

        assert_eq!(book.autocomplete("g1", "TOPIC").await.unwrap().len(), 25);
        assert_eq!(book.autocomplete("g1", "ic 2").await.unwrap().len(), 10);
        assert_eq!(book.autocomplete("g1", "oth").await.unwrap(), vec!["other"]);
        assert!(book.autocomplete("g2", "").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_auto_reply_survives_edit() {
        let book = book();
        book.upsert("g1", &member("u1"), "ping", "pong").await.unwrap();
        assert_eq!(book.auto_reply_for("g1", "ping").await.unwrap(), None);

        book.set_auto_reply("g1", "PING", true).await.unwrap();
        assert_eq!(
            book.auto_reply_for("g1", "Ping").await.unwrap().as_deref(),
            Some("pong")
        );
        assert_eq!(book.auto_reply_for("g1", "ping please").await.unwrap(), None);

        book.upsert("g1", &member("u1"), "ping", "PONG").await.unwrap();
        assert_eq!(
            book.auto_reply_for("g1", "ping").await.unwrap().as_deref(),
            Some("PONG")
        );

        book.set_auto_reply("g1", "ping", false).await.unwrap();
        assert_eq!(book.auto_reply_for("g1", "ping").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_auto_reply_unknown_subject() {
        let book = book();
        let result = book.set_auto_reply("g1", "nothing", true).await;
        assert!(matches!(result, Err(FactError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_pages_clamped() {
        let book = book();
        for i in 0..20 {
            book.upsert("g1", &member("u1"), &format!("fact {:02}", i), "x")
                .await
                .unwrap();
        }
        book.set_auto_reply("g1", "fact 17", true).await.unwrap();

        let first = book.list_page("g1", -3, false).await.unwrap();
        assert_eq!(first.page, 0);
        assert_eq!(first.page_count, 2);
        assert_eq!(first.entries.len(), 15);
        assert!(!first.has_previous());
        assert!(first.has_next());

        let last = book.list_page("g1", 9, false).await.unwrap();
        assert_eq!(last.page, 1);
        assert_eq!(last.entries.len(), 5);
        assert_eq!(last.entries[0].0, 16);
        let embed = last.render();
        assert_eq!(embed.title.as_deref(), Some("Page 2/2"));
        assert!(embed.footer.is_some());

        let auto = book.list_page("g1", 0, true).await.unwrap();
        assert_eq!(auto.page_count, 1);
        assert_eq!(auto.entries, vec![(1, "fact 17".to_string(), true)]);

        let empty = book.list_page("g2", 0, false).await.unwrap();
        assert_eq!(empty.page_count, 1);
        assert!(empty.entries.is_empty());
    }

    #[tokio::test]
    async fn test_random_fact() {
        let book = book();
        assert!(book.random("g1").await.unwrap().is_none());
        book.upsert("g1", &member("u1"), "only", "one").await.unwrap();
        assert_eq!(book.random("g1").await.unwrap().unwrap().subject, "only");
    }
}
