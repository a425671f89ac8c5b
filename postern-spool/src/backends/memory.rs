use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;

use crate::{
    Result, SpoolError,
    store::{MessageStore, PATCH_SIZE, SENTINEL},
    types::MessageId,
};

/// A message as held by [`MemorySpool`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredMessage {
    /// Bytes as a consumer would read them from disk.
    pub content: Vec<u8>,
    pub committed: bool,
}

#[derive(Debug, Default)]
struct Faults {
    open: bool,
    store_after: Option<usize>,
    commit: bool,
}

#[derive(Debug, Default)]
struct State {
    messages: BTreeMap<MessageId, StoredMessage>,
    open: Option<(MessageId, Option<[u8; PATCH_SIZE]>)>,
    stored_lines: usize,
    faults: Faults,
}

/// In-memory spool
///
/// Mirrors the on-disk behaviour of [`crate::FileSpool`], including the
/// in-progress marker, so tests can inspect exactly what a consumer would see.
/// Clones share the same storage, which lets a test keep a handle while a
/// session owns the boxed store. Failures can be injected at each step.
#[derive(Debug, Clone, Default)]
pub struct MemorySpool {
    state: Arc<Mutex<State>>,
}

impl MemorySpool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every subsequent `open` fail.
    pub fn fail_open(&self, fail: bool) {
        self.state().faults.open = fail;
    }

    /// Allow `lines` more successful `store_line` calls, then fail them all.
    pub fn fail_store_after(&self, lines: usize) {
        let mut state = self.state();
        state.faults.store_after = Some(state.stored_lines + lines);
    }

    /// Make every subsequent `commit` fail.
    pub fn fail_commit(&self, fail: bool) {
        self.state().faults.commit = fail;
    }

    /// Occupy an id as if another process had created it.
    pub fn reserve(&self, id: MessageId) {
        self.state().messages.insert(id, StoredMessage::default());
    }

    #[must_use]
    pub fn get(&self, id: MessageId) -> Option<StoredMessage> {
        self.state().messages.get(&id).cloned()
    }

    /// Committed messages in id order.
    #[must_use]
    pub fn committed(&self) -> Vec<(MessageId, Vec<u8>)> {
        self.state()
            .messages
            .iter()
            .filter(|(_, message)| message.committed)
            .map(|(id, message)| (*id, message.content.clone()))
            .collect()
    }

    /// Ids of messages present but never committed.
    #[must_use]
    pub fn inert(&self) -> Vec<MessageId> {
        self.state()
            .messages
            .iter()
            .filter(|(_, message)| !message.committed)
            .map(|(id, _)| *id)
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state().messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MessageStore for MemorySpool {
    async fn open_at(&mut self, timestamp: u64) -> Result<MessageId> {
        let mut state = self.state();

        if let Some((id, _)) = state.open {
            return Err(SpoolError::AlreadyOpen(id));
        }

        if state.faults.open {
            return Err(SpoolError::Injected("open"));
        }

        let mut candidate = Some(MessageId::first(timestamp));
        while let Some(id) = candidate {
            if !state.messages.contains_key(&id) {
                state.messages.insert(id, StoredMessage::default());
                state.open = Some((id, None));
                return Ok(id);
            }

            candidate = id.next();
        }

        Err(SpoolError::Exhausted { timestamp })
    }

    async fn store_line(&mut self, line: &[u8]) -> Result<()> {
        let mut state = self.state();
        let State {
            messages,
            open,
            stored_lines,
            faults,
        } = &mut *state;

        let (id, patch) = open.as_mut().ok_or(SpoolError::NotOpen)?;

        if faults.store_after.is_some_and(|limit| *stored_lines >= limit) {
            return Err(SpoolError::Injected("store"));
        }

        let content = &mut messages.entry(*id).or_default().content;

        if patch.is_none() {
            let (head, rest) =
                line.split_first_chunk::<PATCH_SIZE>()
                    .ok_or(SpoolError::FirstLineTooShort {
                        len: line.len(),
                        required: PATCH_SIZE,
                    })?;

            content.extend_from_slice(&SENTINEL);
            content.extend_from_slice(rest);
            *patch = Some(*head);
        } else {
            content.extend_from_slice(line);
        }

        *stored_lines += 1;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        let mut state = self.state();
        let (id, patch) = state.open.take().ok_or(SpoolError::NotOpen)?;

        let Some(patch) = patch else {
            state.messages.remove(&id);
            return Err(SpoolError::NothingStored(id));
        };

        if state.faults.commit {
            return Err(SpoolError::Injected("commit"));
        }

        if let Some(message) = state.messages.get_mut(&id) {
            message.content[..PATCH_SIZE].copy_from_slice(&patch);
            message.committed = true;
        }

        Ok(())
    }

    async fn abandon(&mut self) {
        self.state().open = None;
    }

    async fn discard(&mut self) {
        let mut state = self.state();
        if let Some((id, _)) = state.open.take() {
            state.messages.remove(&id);
        }
    }

    fn current(&self) -> Option<MessageId> {
        self.state().open.map(|(id, _)| id)
    }
}
