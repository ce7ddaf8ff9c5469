use chrono::Utc;
use tracing::debug;
use trellis_model::{Catalog, Document, Link, Profile, Property, TRELLIS_NS};
use uuid::Uuid;

use crate::errors::Result;
use crate::loader::DocumentLoader;
use crate::{import, index, modify, refcount, structure};

/// Value stamped into the resolved catalog's `resolution-tool` property
pub const RESOLUTION_TOOL: &str = "trellis";

/// Orchestrator resolving a profile into a fully resolved catalog
///
/// The resolver is constructed with its collaborators and holds no lazily
/// initialized shared state; use one resolver per concurrent resolution.
/// Resolution is single-threaded and strictly sequential: import
/// resolution, structuring, modification, reference counting and pruning,
/// in that fixed order. Suspension occurs only at the blocking loader
/// boundary.
pub struct ProfileResolver<'a> {
    loader: &'a dyn DocumentLoader,
}

impl<'a> ProfileResolver<'a> {
    /// Create a resolver using the given document loader
    pub fn new(loader: &'a dyn DocumentLoader) -> Self {
        Self { loader }
    }

    pub(crate) fn loader(&self) -> &dyn DocumentLoader {
        self.loader
    }

    /// Load the document at `uri` and resolve it
    ///
    /// # Errors
    ///
    /// Fails on any load failure, import cycle, unsupported structuring
    /// directive, or modification naming a missing target. Every failure is
    /// fatal; no partial catalog is produced.
    pub fn resolve_uri(&self, uri: &str) -> Result<Catalog> {
        let document = self.loader.load(uri)?;
        self.resolve(document, uri)
    }

    /// Resolve a profile-or-catalog document to a catalog
    ///
    /// A catalog input is already resolved and is returned as-is. `uri`
    /// identifies the document for cycle detection and for the
    /// `source-profile` link of the output.
    ///
    /// # Errors
    ///
    /// See [`ProfileResolver::resolve_uri`].
    pub fn resolve(&self, document: Document, uri: &str) -> Result<Catalog> {
        // the originating document heads the import history, so a cycle
        // back to it reports the full chain
        let mut history = vec![uri.to_string()];
        self.resolve_with_history(document, uri, &mut history)
    }

    /// Resolution entry point threading the cycle-detection stack
    ///
    /// Recursive imports re-enter here; the history is the only state
    /// carried across recursion.
    pub(crate) fn resolve_with_history(
        &self,
        document: Document,
        uri: &str,
        history: &mut Vec<String>,
    ) -> Result<Catalog> {
        match document {
            Document::Catalog(catalog) => Ok(catalog),
            Document::Profile(profile) => self.resolve_profile(profile, uri, history),
        }
    }

    fn resolve_profile(
        &self,
        profile: Profile,
        uri: &str,
        history: &mut Vec<String>,
    ) -> Result<Catalog> {
        debug!(profile = %uri, "resolving profile");

        let mut resolved = Catalog::new(Uuid::new_v4());
        generate_metadata(&mut resolved, &profile, uri);

        let import_index = import::resolve_imports(self, &mut resolved, &profile, uri, history)?;

        let directive = structure::structuring_directive(&profile);
        structure::apply_structuring(&mut resolved, directive)?;

        if let Some(instructions) = &profile.modify {
            // the index is rebuilt from the restructured tree, never aliased
            // across phases
            let index = index::index_catalog(&resolved);
            modify::apply_modify(&mut resolved, instructions, &index)?;
        }

        refcount::handle_references(&mut resolved, &profile, &import_index);

        debug!(catalog = %resolved.uuid, "profile resolved");
        Ok(resolved)
    }
}

/// Stamp the resolved catalog's metadata: fresh identity, provenance, and
/// resolution time
fn generate_metadata(resolved: &mut Catalog, profile: &Profile, uri: &str) {
    let metadata = &mut resolved.metadata;
    metadata.title = profile.metadata.title.clone();
    if let Some(version) = &profile.metadata.version {
        metadata.version = Some(version.clone());
    }
    metadata.last_modified = Some(Utc::now());
    metadata
        .props
        .push(Property::new("resolution-tool", RESOLUTION_TOOL).with_ns(TRELLIS_NS));
    metadata.links.push(Link::new(uri).with_rel("source-profile"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::InMemoryLoader;

    #[test]
    fn test_catalog_input_is_returned_as_is() {
        let catalog = Catalog::new(Uuid::new_v4());
        let loader = InMemoryLoader::new();
        let resolver = ProfileResolver::new(&loader);

        let resolved = resolver
            .resolve(Document::from(catalog.clone()), "mem:catalog")
            .unwrap();
        assert_eq!(resolved, catalog);
    }

    #[test]
    fn test_generated_metadata_stamps_provenance() {
        let mut resolved = Catalog::new(Uuid::new_v4());
        let mut profile = Profile::new(Uuid::new_v4());
        profile.metadata.title = Some("Baseline".to_string());
        profile.metadata.version = Some("1.2".to_string());

        generate_metadata(&mut resolved, &profile, "mem:profile");

        let metadata = &resolved.metadata;
        assert_eq!(metadata.title.as_deref(), Some("Baseline"));
        assert_eq!(metadata.version.as_deref(), Some("1.2"));
        assert!(metadata.last_modified.is_some());
        assert!(metadata
            .props
            .iter()
            .any(|p| p.name == "resolution-tool" && p.value == RESOLUTION_TOOL));
        assert!(metadata
            .links
            .iter()
            .any(|l| l.rel.as_deref() == Some("source-profile") && l.href == "mem:profile"));
    }
}
