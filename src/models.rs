// src/models.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One visitor message.
///
/// Records written by older versions of the site may lack `id` or carry
/// `created_at` instead of `date`; those fields deserialize to empty strings
/// and are repaired by the store on first load.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct GuestbookEntry {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, alias = "created_at")]
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
}

impl GuestbookEntry {
    pub fn new(name: String, message: String, date: String, password_hash: Option<String>) -> Self {
        Self {
            id: new_entry_id(),
            name,
            message,
            date,
            password_hash,
        }
    }

    pub fn is_protected(&self) -> bool {
        self.password_hash.is_some()
    }
}

pub fn new_entry_id() -> String {
    Uuid::new_v4().to_string()
}

/// Fields an edit may replace. `None` or blank values leave the field alone.
#[derive(Debug, Default, Clone)]
pub struct EntryUpdate {
    pub name: Option<String>,
    pub message: Option<String>,
}

/// Position of an entry within the newest-first collection.
pub fn find_entry(entries: &[GuestbookEntry], id: &str) -> Option<usize> {
    if id.is_empty() {
        return None;
    }
    entries.iter().position(|entry| entry.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_record_deserializes_with_defaults() {
        let json = r#"{"name": "가루", "message": "안녕하세요", "created_at": "2024-05-01 10:00"}"#;
        let entry: GuestbookEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.id, "");
        assert_eq!(entry.name, "가루");
        assert_eq!(entry.date, "2024-05-01 10:00");
        assert!(entry.password_hash.is_none());
    }

    #[test]
    fn test_unprotected_entry_omits_password_hash() {
        let entry = GuestbookEntry::new("a".into(), "b".into(), "now".into(), None);
        let json = serde_json::to_string(&entry).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(!entry.id.is_empty());
    }

    #[test]
    fn test_find_entry() {
        let first = GuestbookEntry::new("a".into(), "b".into(), "d".into(), None);
        let second = GuestbookEntry::new("c".into(), "d".into(), "d".into(), None);
        let entries = vec![first.clone(), second.clone()];
        assert_eq!(find_entry(&entries, &second.id), Some(1));
        assert_eq!(find_entry(&entries, "missing"), None);
        assert_eq!(find_entry(&entries, ""), None);
    }
}
