use trellis_core::{InMemoryLoader, ProfileResolver, Result};
use trellis_model::{
    Catalog, Control, ControlSelection, Group, Profile, ProfileImport,
};
use uuid::Uuid;

/// Initialize test logging from `RUST_LOG`; idempotent across tests
#[allow(dead_code)]
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Create a control with the given nested child controls
#[allow(dead_code)]
pub fn control_with_children(id: &str, children: &[&str]) -> Control {
    let mut control = Control::new(id);
    control.controls = children.iter().map(|child| Control::new(*child)).collect();
    control
}

/// Create a catalog holding the given top-level controls
#[allow(dead_code)]
pub fn catalog_with_controls(controls: Vec<Control>) -> Catalog {
    let mut catalog = Catalog::new(Uuid::new_v4());
    catalog.controls = controls;
    catalog
}

/// Create a group with the given id and controls
#[allow(dead_code)]
pub fn group_with_controls(id: &str, controls: Vec<Control>) -> Group {
    let mut group = Group::new(id);
    group.controls = controls;
    group
}

/// Create a profile importing everything from each of the given hrefs
#[allow(dead_code)]
pub fn profile_importing_all(hrefs: &[&str]) -> Profile {
    let mut profile = Profile::new(Uuid::new_v4());
    profile.imports = hrefs
        .iter()
        .map(|href| ProfileImport::new(*href).with_all())
        .collect();
    profile
}

/// Create an import selecting exactly the given control ids (recursing to
/// children)
#[allow(dead_code)]
pub fn import_selecting(href: &str, ids: &[&str]) -> ProfileImport {
    let mut import = ProfileImport::new(href);
    import.include_controls = vec![ControlSelection::with_ids(ids.iter().copied())];
    import
}

/// Resolve the document registered under `uri`
#[allow(dead_code)]
pub fn resolve(loader: &InMemoryLoader, uri: &str) -> Result<Catalog> {
    ProfileResolver::new(loader).resolve_uri(uri)
}

/// Top-level control ids of a catalog, in order
#[allow(dead_code)]
pub fn control_ids(catalog: &Catalog) -> Vec<String> {
    catalog
        .controls
        .iter()
        .map(|control| control.id.clone())
        .collect()
}
