use thiserror::Error;

use crate::index::ItemType;

/// Result type alias using ResolveError
pub type Result<T> = std::result::Result<T, ResolveError>;

/// Error taxonomy of profile resolution
///
/// Every failure is fatal: resolution never produces a partial catalog.
/// Contextual variants (`Import`, `SetParameter`, `Alter`) wrap the failure
/// with the offending location while preserving the root cause, so an error
/// surfacing from a deeply nested import chain still names every hop.
#[derive(Debug, Error)]
pub enum ResolveError {
    // ===== Configuration Errors =====
    /// Profile declares no import statements
    #[error("profile '{profile_uri}' has no imports")]
    NoImports { profile_uri: String },

    /// The structuring directive is intentionally unsupported
    #[error("unsupported structuring directive: {directive}")]
    UnsupportedStructuring { directive: String },

    // ===== Import Errors =====
    /// Resolving an import would revisit a document already being resolved
    #[error("resolving the import would result in the cycle: {}", .cycle.join(" -> "))]
    ImportCycle { cycle: Vec<String> },

    /// A source document could not be loaded
    #[error("unable to load document '{uri}'")]
    DocumentLoad {
        uri: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An internal fragment reference names no back-matter resource
    #[error("unable to find the resource identified by '{href}' used in a profile import")]
    ResourceNotFound { href: String },

    // ===== Modification Errors =====
    /// A set-parameter or alter instruction names an id absent from the
    /// resolved catalog
    #[error("the {item_type} '{identifier}' was not found in the resolved catalog")]
    TargetNotFound {
        item_type: ItemType,
        identifier: String,
    },

    /// A remove or add instruction located no valid target
    #[error("structural edit of control '{control_id}' failed: {reason}")]
    StructuralEdit { control_id: String, reason: String },

    // ===== Context Wrappers =====
    /// Failure while resolving one import statement
    #[error("unable to resolve the import of '{href}'")]
    Import {
        href: String,
        #[source]
        source: Box<ResolveError>,
    },

    /// Failure while applying one set-parameter instruction
    #[error("unable to apply the set-parameter for '{param_id}'")]
    SetParameter {
        param_id: String,
        #[source]
        source: Box<ResolveError>,
    },

    /// Failure while applying one alter instruction
    #[error("unable to apply the alter for control '{control_id}'")]
    Alter {
        control_id: String,
        #[source]
        source: Box<ResolveError>,
    },
}

impl ResolveError {
    /// Wrap this error with the import href it surfaced from
    pub fn in_import(self, href: impl Into<String>) -> Self {
        ResolveError::Import {
            href: href.into(),
            source: Box::new(self),
        }
    }

    /// Walk context wrappers down to the originating error
    pub fn root_cause(&self) -> &ResolveError {
        match self {
            ResolveError::Import { source, .. }
            | ResolveError::SetParameter { source, .. }
            | ResolveError::Alter { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
