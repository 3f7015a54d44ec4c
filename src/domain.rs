//! `ChatApp`: registered profiles and the online session registry.
//!
//! Sessions are looked up fresh on every operation rather than holding a
//! borrowed reference to a connection or profile, so the registry never has
//! to outlive or alias the connection table that owns the sockets.

use std::collections::{HashMap, HashSet};

use mio::Token;
use thiserror::Error;

#[derive(Debug, Clone)]
struct UserProfile {
    display_name: String,
    password: String,
}

#[derive(Debug, Clone, Copy)]
struct UserSession {
    conn_token: Token,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DomainError {
    #[error("user is already registered")]
    UserAlreadyRegistered,
    #[error("user does not exist")]
    UserDoesNotExist,
    #[error("incorrect password")]
    IncorrectPassword,
    #[error("cannot message self")]
    CannotMessageSelf,
}

/// Profiles keyed by lowercased name; online sessions keyed by a monotonic
/// session id that is never reused and never zero.
#[derive(Default)]
pub struct ChatApp {
    profiles: HashMap<String, UserProfile>,
    online: HashMap<u64, (String, UserSession)>,
    next_session_id: u64,
}

impl ChatApp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, password: &str) -> Result<(), DomainError> {
        let key = name.to_ascii_lowercase();
        if self.profiles.contains_key(&key) {
            return Err(DomainError::UserAlreadyRegistered);
        }
        self.profiles.insert(
            key,
            UserProfile {
                display_name: name.to_string(),
                password: password.to_string(),
            },
        );
        Ok(())
    }

    /// Logs the named profile in on behalf of `conn_token`, returning the
    /// new session id. Session ids start at 1 and only ever increase.
    pub fn login(&mut self, name: &str, password: &str, conn_token: Token) -> Result<u64, DomainError> {
        let key = name.to_ascii_lowercase();
        let profile = self.profiles.get(&key).ok_or(DomainError::UserDoesNotExist)?;
        if profile.password != password {
            return Err(DomainError::IncorrectPassword);
        }

        self.next_session_id += 1;
        let session_id = self.next_session_id;
        self.online.insert(session_id, (key, UserSession { conn_token }));
        Ok(session_id)
    }

    /// No-op if `session_id` is zero or already logged out.
    pub fn logout(&mut self, session_id: u64) {
        self.online.remove(&session_id);
    }

    /// Repoint an online session's connection handle, used when the
    /// multiplexer's slot compaction moves a live connection to a new
    /// token. No-op if `session_id` is zero or not online.
    pub fn update_session_token(&mut self, session_id: u64, conn_token: Token) {
        if let Some((_, session)) = self.online.get_mut(&session_id) {
            session.conn_token = conn_token;
        }
    }

    pub fn display_name(&self, session_id: u64) -> Option<String> {
        let (key, _) = self.online.get(&session_id)?;
        self.profiles.get(key).map(|p| p.display_name.clone())
    }

    /// Deduplicated, sorted display names of every online user.
    pub fn online_users(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut names = Vec::new();
        for (key, _) in self.online.values() {
            if let Some(profile) = self.profiles.get(key) {
                if seen.insert(profile.display_name.clone()) {
                    names.push(profile.display_name.clone());
                }
            }
        }
        names.sort();
        names
    }

    /// Connection tokens of every online session besides `sender_session_id`.
    pub fn broadcast_targets(&self, sender_session_id: u64) -> Vec<Token> {
        self.online
            .iter()
            .filter(|(id, _)| **id != sender_session_id)
            .map(|(_, (_, session))| session.conn_token)
            .collect()
    }

    /// Connection tokens of every online session whose display name exactly
    /// matches `recipient_name`, excluding the sender. Returns
    /// `CannotMessageSelf` if the recipient name is the sender's own name,
    /// checked before any session lookup.
    pub fn private_targets(
        &self,
        sender_session_id: u64,
        recipient_name: &str,
    ) -> Result<Vec<Token>, DomainError> {
        if self.display_name(sender_session_id).as_deref() == Some(recipient_name) {
            return Err(DomainError::CannotMessageSelf);
        }

        Ok(self
            .online
            .iter()
            .filter(|(id, _)| **id != sender_session_id)
            .filter(|(_, (key, _))| {
                self.profiles.get(key).map(|p| p.display_name.as_str()) == Some(recipient_name)
            })
            .map(|(_, (_, session))| session.conn_token)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(n: usize) -> Token {
        Token(n)
    }

    #[test]
    fn register_rejects_case_insensitive_duplicate() {
        let mut app = ChatApp::new();
        app.register("Alice", "pass1234").unwrap();
        assert_eq!(
            app.register("alice", "other123"),
            Err(DomainError::UserAlreadyRegistered)
        );
    }

    #[test]
    fn login_requires_registration_and_matching_password() {
        let mut app = ChatApp::new();
        app.register("alice", "pass1234").unwrap();
        assert_eq!(
            app.login("bob", "pass1234", token(1)),
            Err(DomainError::UserDoesNotExist)
        );
        assert_eq!(
            app.login("alice", "wrong123", token(1)),
            Err(DomainError::IncorrectPassword)
        );
        let session_id = app.login("alice", "pass1234", token(1)).unwrap();
        assert_eq!(session_id, 1);
    }

    #[test]
    fn session_ids_are_monotonic_and_never_zero() {
        let mut app = ChatApp::new();
        app.register("alice", "pass1234").unwrap();
        app.register("bob", "pass1234").unwrap();
        let s1 = app.login("alice", "pass1234", token(1)).unwrap();
        let s2 = app.login("bob", "pass1234", token(2)).unwrap();
        assert!(s1 > 0 && s2 > s1);
    }

    #[test]
    fn online_users_deduplicates_two_sessions_of_the_same_profile() {
        let mut app = ChatApp::new();
        app.register("alice", "pass1234").unwrap();
        app.login("alice", "pass1234", token(1)).unwrap();
        app.login("alice", "pass1234", token(2)).unwrap();
        assert_eq!(app.online_users(), vec!["alice".to_string()]);
    }

    #[test]
    fn private_targets_rejects_messaging_self_before_lookup() {
        let mut app = ChatApp::new();
        app.register("alice", "pass1234").unwrap();
        let sid = app.login("alice", "pass1234", token(1)).unwrap();
        assert_eq!(
            app.private_targets(sid, "alice"),
            Err(DomainError::CannotMessageSelf)
        );
    }

    #[test]
    fn private_targets_excludes_sender_and_matches_exact_case() {
        let mut app = ChatApp::new();
        app.register("alice", "pass1234").unwrap();
        app.register("Bob", "pass1234").unwrap();
        let sid = app.login("alice", "pass1234", token(1)).unwrap();
        app.login("Bob", "pass1234", token(2)).unwrap();

        assert_eq!(app.private_targets(sid, "bob"), Ok(vec![]));
        assert_eq!(app.private_targets(sid, "Bob"), Ok(vec![token(2)]));
    }

    #[test]
    fn logout_removes_session_but_leaves_profile_registered() {
        let mut app = ChatApp::new();
        app.register("alice", "pass1234").unwrap();
        let sid = app.login("alice", "pass1234", token(1)).unwrap();
        app.logout(sid);
        assert!(app.online_users().is_empty());
        assert_eq!(app.login("alice", "pass1234", token(1)).unwrap(), 2);
    }

    #[test]
    fn update_session_token_repoints_fan_out_after_slot_compaction() {
        let mut app = ChatApp::new();
        app.register("alice", "pass1234").unwrap();
        app.register("bob", "pass1234").unwrap();
        let alice = app.login("alice", "pass1234", token(1)).unwrap();
        let bob = app.login("bob", "pass1234", token(2)).unwrap();

        // Simulate compaction sliding bob's connection into a new slot.
        app.update_session_token(bob, token(7));

        assert_eq!(app.broadcast_targets(alice), vec![token(7)]);
        assert_eq!(app.private_targets(alice, "bob"), Ok(vec![token(7)]));
    }
}
