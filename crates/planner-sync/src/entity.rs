//! Entity identity and the [`SyncEntity`] contract
//!
//! The engine is entity-agnostic: any serde record with an immutable id can
//! be synchronized. Patches are applied by overlaying fields on the record's
//! JSON object form, so the same code path serves every entity kind.

use crate::error::PatchError;
use crate::patch::Patch;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Immutable identifier of a remote record
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Wrap an existing id
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random id
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Borrow as string
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A record the engine can load, patch optimistically and flush
pub trait SyncEntity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Short kind name used in logs and notices
    const KIND: &'static str;

    /// Fields a local edit may not touch
    ///
    /// Server responses are still allowed to set them (derived values).
    const READ_ONLY_FIELDS: &'static [&'static str] = &["id"];

    /// Record id
    fn id(&self) -> &EntityId;

    /// Record-level invariants, checked after a local patch is applied
    fn validate(&self) -> Result<(), PatchError> {
        Ok(())
    }

    /// Reject patches that touch read-only fields
    fn check_editable(patch: &Patch) -> Result<(), PatchError> {
        match patch.fields().find(|f| Self::READ_ONLY_FIELDS.contains(f)) {
            Some(field) => Err(PatchError::ReadOnlyField {
                kind: Self::KIND,
                field: field.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Overlay `patch` onto this record
    ///
    /// All-or-nothing: on error `self` is unchanged.
    fn apply_patch(&mut self, patch: &Patch) -> Result<(), PatchError> {
        if patch.is_empty() {
            return Ok(());
        }

        let mut doc = serde_json::to_value(&*self).map_err(|source| PatchError::Type {
            kind: Self::KIND,
            source,
        })?;
        let Value::Object(fields) = &mut doc else {
            return Err(PatchError::NotARecord(Self::KIND));
        };

        for (field, value) in patch.iter() {
            match fields.get_mut(field) {
                Some(slot) => *slot = value.clone(),
                None => {
                    return Err(PatchError::UnknownField {
                        kind: Self::KIND,
                        field: field.clone(),
                    })
                }
            }
        }

        *self = serde_json::from_value(doc).map_err(|source| PatchError::Type {
            kind: Self::KIND,
            source,
        })?;
        Ok(())
    }

    /// Apply a local edit: editability check, overlay, then invariants
    fn apply_local(&mut self, patch: &Patch) -> Result<(), PatchError> {
        Self::check_editable(patch)?;
        let mut next = self.clone();
        next.apply_patch(patch)?;
        next.validate()?;
        *self = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: EntityId,
        title: String,
        words: u32,
        tag: Option<String>,
        score: f64,
    }

    impl SyncEntity for Note {
        const KIND: &'static str = "note";
        const READ_ONLY_FIELDS: &'static [&'static str] = &["id", "score"];

        fn id(&self) -> &EntityId {
            &self.id
        }

        fn validate(&self) -> Result<(), PatchError> {
            if self.title.is_empty() {
                return Err(PatchError::invalid(Self::KIND, "EMPTY_TITLE", "title is required"));
            }
            Ok(())
        }
    }

    fn note() -> Note {
        Note {
            id: EntityId::new("n1"),
            title: "draft".to_string(),
            words: 10,
            tag: None,
            score: 0.0,
        }
    }

    #[test]
    fn entity_id_generate_is_unique() {
        assert_ne!(EntityId::generate(), EntityId::generate());
        assert_eq!(EntityId::from("p1").to_string(), "p1");
    }

    #[test]
    fn apply_patch_overlays_fields() {
        let mut n = note();
        n.apply_patch(&Patch::new().set("words", 42).set("tag", "cs"))
            .unwrap();

        assert_eq!(n.words, 42);
        assert_eq!(n.tag.as_deref(), Some("cs"));
        assert_eq!(n.title, "draft");
    }

    #[test]
    fn apply_patch_sets_optional_to_null() {
        let mut n = note();
        n.tag = Some("x".to_string());
        n.apply_patch(&Patch::new().set("tag", json!(null))).unwrap();
        assert_eq!(n.tag, None);
    }

    #[test]
    fn apply_patch_rejects_unknown_field() {
        let mut n = note();
        let err = n.apply_patch(&Patch::new().set("colour", "red")).unwrap_err();
        assert!(matches!(err, PatchError::UnknownField { field, .. } if field == "colour"));
        assert_eq!(n, note());
    }

    #[test]
    fn apply_patch_rejects_type_mismatch() {
        let mut n = note();
        let err = n
            .apply_patch(&Patch::new().set("title", "ok").set("words", "many"))
            .unwrap_err();
        assert!(matches!(err, PatchError::Type { kind: "note", .. }));
        assert_eq!(n, note());
    }

    #[test]
    fn apply_patch_may_set_read_only_fields() {
        // Server-authoritative data flows through apply_patch
        let mut n = note();
        n.apply_patch(&Patch::new().set("score", 3.5)).unwrap();
        assert_eq!(n.score, 3.5);
    }

    #[test]
    fn apply_local_rejects_read_only() {
        let mut n = note();
        let err = n.apply_local(&Patch::new().set("score", 1.0)).unwrap_err();
        assert!(matches!(err, PatchError::ReadOnlyField { field, .. } if field == "score"));

        let err = n.apply_local(&Patch::new().set("id", "n2")).unwrap_err();
        assert!(matches!(err, PatchError::ReadOnlyField { .. }));
    }

    #[test]
    fn apply_local_checks_invariants() {
        let mut n = note();
        let err = n.apply_local(&Patch::new().set("title", "")).unwrap_err();
        assert!(matches!(err, PatchError::Invalid { code: "EMPTY_TITLE", .. }));
        assert_eq!(n.title, "draft");
    }
}
