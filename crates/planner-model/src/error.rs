//! Widget and tab payload errors

use thiserror::Error;

/// Failure turning a stored widget or tab into its typed form
#[derive(Error, Debug)]
pub enum SettingsError {
    /// Type name not known to the catalog or the tab kinds
    #[error("unknown kind: {0}")]
    UnknownKind(String),

    /// Stored JSON blob could not be parsed
    #[error("malformed {field} for {kind}: {source}")]
    Malformed {
        /// Widget or tab kind
        kind: String,
        /// Blob name (`settings` or `layout_config`)
        field: &'static str,
        /// Parser error
        #[source]
        source: serde_json::Error,
    },

    /// Attached to zero or two parents
    #[error("must belong to exactly one semester or course")]
    Context,

    /// Kind may not be placed in this kind of parent
    #[error("{kind} widget cannot be placed on a {context}")]
    ContextNotAllowed {
        /// Widget kind
        kind: String,
        /// Parent kind
        context: &'static str,
    },

    /// Settings payload belongs to another kind
    #[error("settings for {found} given to {expected} widget")]
    KindMismatch {
        /// Widget kind
        expected: String,
        /// Kind of the supplied settings
        found: String,
    },
}

impl SettingsError {
    /// Check if the stored data itself is bad (as opposed to a catalog gap)
    #[inline]
    #[must_use]
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Malformed { .. } | Self::Context | Self::KindMismatch { .. })
    }
}
