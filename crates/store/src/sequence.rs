//! Per-key request sequencing.
//!
//! Every mutation takes a token for the key it affects. When its response
//! arrives, the token tells whether a newer mutation on the same key was
//! issued in the meantime, in which case the response no longer owns that
//! part of the store.

use crate::scope::Scope;
use quire_model::EntityRef;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Key {
    /// An ordered collection (reorders, series membership).
    Scope(Scope),
    /// A single entity (updates, archiving, deletes, moves).
    Entity(EntityRef),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Token {
    key: Option<Key>,
    sequence: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Sequencer {
    enabled: bool,
    issued: HashMap<Key, u64>,
}
impl Sequencer {
    pub fn new(enabled: bool) -> Self {
        Self { enabled, issued: HashMap::new() }
    }

    /// Issue the next token for `key`. Operations without a key (creates)
    /// never supersede one another.
    pub fn issue(&mut self, key: Option<Key>) -> Token {
        let Some(key) = key else {
            return Token { key: None, sequence: 0 };
        };
        let sequence = self.issued.entry(key).or_default();
        *sequence += 1;
        Token { key: Some(key), sequence: *sequence }
    }

    /// Whether `token` is still the newest issued for its key.
    pub fn is_current(&self, token: Token) -> bool {
        match token.key {
            _ if !self.enabled => true,
            None => true,
            Some(key) => self.issued.get(&key) == Some(&token.sequence),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_model::{BookId, EntityKind};

    #[test]
    fn test_newer_token_supersedes() {
        let mut sequencer = Sequencer::new(true);
        let key = Key::Scope(Scope::Characters(BookId(1)));
        let first = sequencer.issue(Some(key));
        let second = sequencer.issue(Some(key));
        assert!(!sequencer.is_current(first));
        assert!(sequencer.is_current(second));
    }

    #[test]
    fn test_keys_are_independent() {
        let mut sequencer = Sequencer::new(true);
        let book = sequencer.issue(Some(Key::Entity(EntityRef::new(EntityKind::Book, 1i64))));
        sequencer.issue(Some(Key::Entity(EntityRef::new(EntityKind::Book, 2i64))));
        sequencer.issue(None);
        assert!(sequencer.is_current(book));
    }

    #[test]
    fn test_disabled_never_supersedes() {
        let mut sequencer = Sequencer::new(false);
        let key = Key::Scope(Scope::Books);
        let first = sequencer.issue(Some(key));
        sequencer.issue(Some(key));
        assert!(sequencer.is_current(first));
    }
}
