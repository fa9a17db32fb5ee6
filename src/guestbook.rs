// src/guestbook.rs
use crate::clock::Clock;
use crate::config::{Argon2Params, Config};
use crate::crypto;
use crate::error::{GuestbookError, GuestbookResult};
use crate::models::{find_entry, EntryUpdate, GuestbookEntry};
use crate::store::{BackendStatus, GuestbookBackend};
use log;

/// The guestbook: newest-first entries with id-addressed edits and optional
/// per-entry passwords. Every call reloads from the backend.
pub struct Guestbook {
    backend: Box<dyn GuestbookBackend>,
    clock: Clock,
    argon2_params: Argon2Params,
    legacy_count: usize,
    default_limit: usize,
}

impl Guestbook {
    pub fn new(backend: Box<dyn GuestbookBackend>, config: &Config) -> Self {
        Self {
            backend,
            clock: Clock::new(config.utc_offset_minutes, &config.date_format),
            argon2_params: config.argon2_params.clone(),
            legacy_count: config.legacy_count,
            default_limit: config.list_limit,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Entries newest first. Storage failures read as an empty guestbook.
    pub fn list(&self, limit: Option<usize>) -> Vec<GuestbookEntry> {
        let limit = limit.or(Some(self.default_limit).filter(|cap| *cap > 0));
        match self.backend.fetch(limit) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Listing the {} backend failed: {}. Showing no entries.", self.backend.name(), e);
                Vec::new()
            }
        }
    }

    /// Stored entries plus the legacy offset, for display.
    pub fn total_count(&self) -> usize {
        let stored = match self.backend.fetch(None) {
            Ok(entries) => entries.len(),
            Err(e) => {
                log::warn!("Counting entries failed: {}", e);
                0
            }
        };
        stored + self.legacy_count
    }

    /// Adds an entry at the head. Returns `Ok(None)` without touching storage
    /// when the name or message is blank.
    pub fn append(
        &self,
        name: &str,
        message: &str,
        password: Option<&str>,
    ) -> GuestbookResult<Option<GuestbookEntry>> {
        let name = name.trim();
        let message = message.trim();
        if name.is_empty() || message.is_empty() {
            log::info!("Ignoring guestbook write with empty name or message");
            return Ok(None);
        }

        let password_hash = match password.filter(|pw| !pw.is_empty()) {
            Some(pw) => Some(crypto::hash_entry_password(pw, &self.argon2_params)?),
            None => None,
        };

        let entry = GuestbookEntry::new(name.to_string(), message.to_string(), self.clock.now(), password_hash);
        let stored = self.backend.insert(entry).map_err(|e| {
            log::error!("Appending to the {} backend failed: {}", self.backend.name(), e);
            e
        })?;
        log::info!("Added guestbook entry {} by {:?}", stored.id, stored.name);
        Ok(Some(stored))
    }

    /// Looks up an entry and its position in newest-first order.
    pub fn find(&self, id: &str) -> Option<(usize, GuestbookEntry)> {
        let entries = match self.backend.fetch(None) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Lookup of {} failed: {}", id, e);
                return None;
            }
        };
        find_entry(&entries, id).map(|position| (position, entries[position].clone()))
    }

    /// Replaces the supplied fields and refreshes the date. The entry keeps its position.
    pub fn update(&self, id: &str, update: EntryUpdate, password: Option<&str>) -> GuestbookResult<GuestbookEntry> {
        let now = self.clock.now();
        let mut updated = None;

        self.backend.transact(&mut |entries: &mut Vec<GuestbookEntry>| -> GuestbookResult<()> {
            let position = find_entry(entries, id).ok_or_else(|| GuestbookError::NotFound(id.to_string()))?;
            let entry = &mut entries[position];
            authorize(entry, password)?;

            if let Some(name) = non_blank(update.name.as_deref()) {
                entry.name = name.to_string();
            }
            if let Some(message) = non_blank(update.message.as_deref()) {
                entry.message = message.to_string();
            }
            entry.date = now.clone();
            updated = Some(entry.clone());
            Ok(())
        })?;

        let updated = updated.ok_or_else(|| GuestbookError::NotFound(id.to_string()))?;
        log::info!("Updated guestbook entry {}", id);
        Ok(updated)
    }

    /// Removes an entry, returning what was removed.
    pub fn delete(&self, id: &str, password: Option<&str>) -> GuestbookResult<GuestbookEntry> {
        let mut removed = None;

        self.backend.transact(&mut |entries: &mut Vec<GuestbookEntry>| -> GuestbookResult<()> {
            let position = find_entry(entries, id).ok_or_else(|| GuestbookError::NotFound(id.to_string()))?;
            authorize(&entries[position], password)?;
            removed = Some(entries.remove(position));
            Ok(())
        })?;

        let removed = removed.ok_or_else(|| GuestbookError::NotFound(id.to_string()))?;
        log::info!("Deleted guestbook entry {}", id);
        Ok(removed)
    }

    pub fn status(&self) -> BackendStatus {
        self.backend.status()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// Unprotected entries are open to anyone holding the id.
fn authorize(entry: &GuestbookEntry, password: Option<&str>) -> GuestbookResult<()> {
    let hash = match &entry.password_hash {
        Some(hash) => hash,
        None => return Ok(()),
    };

    let password = match password.filter(|pw| !pw.is_empty()) {
        Some(password) => password,
        None => {
            log::warn!("Rejected change to protected entry {}: no password", entry.id);
            return Err(GuestbookError::Unauthorized(entry.id.clone()));
        }
    };

    match crypto::verify_entry_password(hash, password) {
        Ok(true) => Ok(()),
        Ok(false) => {
            log::warn!("Rejected change to protected entry {}: wrong password", entry.id);
            Err(GuestbookError::Unauthorized(entry.id.clone()))
        }
        Err(e) => {
            log::error!("Stored password hash for entry {} is unusable: {}", entry.id, e);
            Err(GuestbookError::Unauthorized(entry.id.clone()))
        }
    }
}
