use tracing::debug;
use trellis_model::{Catalog, Control, Group, Profile, ProfileImport};
use uuid::Uuid;

use crate::errors::{ResolveError, Result};
use crate::filter::ControlFilter;
use crate::index::{EntityIndex, EntityItem, ItemType};
use crate::resolver::ProfileResolver;

/// Resolve every import of a profile into the accumulating catalog
///
/// Returns the running entity index merged from the per-import indices.
/// A profile must declare at least one import; the absence of any is a
/// configuration error, not an empty result.
pub(crate) fn resolve_imports(
    resolver: &ProfileResolver<'_>,
    resolved: &mut Catalog,
    profile: &Profile,
    profile_uri: &str,
    history: &mut Vec<String>,
) -> Result<EntityIndex> {
    if profile.imports.is_empty() {
        return Err(ResolveError::NoImports {
            profile_uri: profile_uri.to_string(),
        });
    }

    let mut running = EntityIndex::new();
    for import in &profile.imports {
        resolve_import(resolver, resolved, profile, import, history, &mut running)
            .map_err(|err| err.in_import(&import.href))?;
    }
    Ok(running)
}

/// Resolve one import statement: source resolution, cycle check, recursive
/// resolution, filtered selection into the accumulating catalog
fn resolve_import(
    resolver: &ProfileResolver<'_>,
    resolved: &mut Catalog,
    profile: &Profile,
    import: &ProfileImport,
    history: &mut Vec<String>,
    running: &mut EntityIndex,
) -> Result<()> {
    let source_uri = resolve_source_uri(import, profile)?;
    debug!(href = %import.href, source = %source_uri, "resolving profile import");

    // cycle check against the in-flight import stack
    if let Some(first) = history.iter().position(|entry| entry == &source_uri) {
        let mut cycle = history[first..].to_vec();
        cycle.push(source_uri);
        return Err(ResolveError::ImportCycle { cycle });
    }

    let imported = {
        let mut guard = ImportHistory::push(history, source_uri.clone());
        let document = resolver.loader().load(&source_uri)?;
        resolver.resolve_with_history(document, &source_uri, guard.stack())?
    };

    let filter = ControlFilter::from_import(import);
    let mut partial = EntityIndex::new();
    select_into(resolved, imported, &filter, &mut partial, running);
    running.append(partial);
    Ok(())
}

/// Resolve an import href to a loadable source URI
///
/// A `#<uuid>` fragment addresses a back-matter resource of the importing
/// profile; the resource's first rlink locates the content, falling back to
/// the fragment itself as an opaque loader key for embedded content.
fn resolve_source_uri(import: &ProfileImport, profile: &Profile) -> Result<String> {
    let Some(fragment) = import.href.strip_prefix('#') else {
        return Ok(import.href.clone());
    };

    let resource = Uuid::parse_str(fragment)
        .ok()
        .and_then(|uuid| profile.back_matter.as_ref()?.resource(uuid))
        .ok_or_else(|| ResolveError::ResourceNotFound {
            href: import.href.clone(),
        })?;

    Ok(resource
        .rlinks
        .first()
        .map(|rlink| rlink.href.clone())
        .unwrap_or_else(|| import.href.clone()))
}

/// Scoped entry on the import history stack
///
/// Pops on drop, so every exit path of an import's resolution - success or
/// failure - leaves sibling cycle checks sound.
struct ImportHistory<'a> {
    stack: &'a mut Vec<String>,
}

impl<'a> ImportHistory<'a> {
    fn push(stack: &'a mut Vec<String>, uri: String) -> Self {
        stack.push(uri);
        Self { stack }
    }

    fn stack(&mut self) -> &mut Vec<String> {
        self.stack
    }
}

impl Drop for ImportHistory<'_> {
    fn drop(&mut self) {
        self.stack.pop();
    }
}

/// Copy the filter-selected portion of an imported catalog into the
/// accumulating resolved catalog, registering everything copied (plus the
/// import's metadata entities) into the per-import index
fn select_into(
    resolved: &mut Catalog,
    imported: Catalog,
    filter: &ControlFilter,
    partial: &mut EntityIndex,
    running: &EntityIndex,
) {
    // catalog-level parameters are shared definitions and travel with their
    // container; later imports replace same-id entries in place
    for param in imported.params {
        partial.insert(EntityItem::node(ItemType::Parameter, &param.id));
        match resolved.params.iter_mut().find(|p| p.id == param.id) {
            Some(slot) => *slot = param,
            None => resolved.params.push(param),
        }
    }

    let mut kept_controls = Vec::new();
    select_controls(imported.controls, filter, false, &mut kept_controls, partial);

    let mut kept_groups = Vec::new();
    select_groups(imported.groups, filter, &mut kept_groups, partial);

    // a later import re-selecting a control displaces the earlier copy,
    // wherever it landed
    let mut incoming_ids = Vec::new();
    collect_control_ids(&kept_controls, &mut incoming_ids);
    for group in &kept_groups {
        collect_group_control_ids(group, &mut incoming_ids);
    }
    for id in &incoming_ids {
        if running.contains(ItemType::Control, id) {
            remove_control(resolved, id);
        }
    }

    resolved.controls.extend(kept_controls);
    resolved.groups.extend(kept_groups);

    for role in &imported.metadata.roles {
        partial.insert(EntityItem::role(role));
    }
    for party in &imported.metadata.parties {
        partial.insert(EntityItem::party(party));
    }
    for location in &imported.metadata.locations {
        partial.insert(EntityItem::location(location));
    }
    if let Some(back_matter) = &imported.back_matter {
        for resource in &back_matter.resources {
            partial.insert(EntityItem::resource(resource));
        }
    }
}

/// Top-down selection walk over a control list
///
/// A matched control keeps its place (with its own children filtered); the
/// matched descendants of an unmatched control are promoted into the
/// nearest surviving container. Children inherit the parent match's
/// `applies_to_children` as their `default_match`.
fn select_controls(
    controls: Vec<Control>,
    filter: &ControlFilter,
    default_match: bool,
    kept: &mut Vec<Control>,
    index: &mut EntityIndex,
) {
    for mut control in controls {
        let outcome = filter.matches(&control.id, default_match);

        let children = std::mem::take(&mut control.controls);
        let mut kept_children = Vec::new();
        select_controls(
            children,
            filter,
            outcome.applies_to_children,
            &mut kept_children,
            index,
        );

        if outcome.matched {
            control.controls = kept_children;
            index.insert(EntityItem::node(ItemType::Control, &control.id));
            for param in &control.params {
                index.insert(EntityItem::node(ItemType::Parameter, &param.id));
            }
            kept.push(control);
        } else {
            kept.extend(kept_children);
        }
    }
}

/// Selection walk over a group list; a group survives iff it contains a
/// matched descendant, and survives as a shell around the kept content
fn select_groups(
    groups: Vec<Group>,
    filter: &ControlFilter,
    kept: &mut Vec<Group>,
    index: &mut EntityIndex,
) {
    for mut group in groups {
        let controls = std::mem::take(&mut group.controls);
        let mut kept_controls = Vec::new();
        select_controls(controls, filter, false, &mut kept_controls, index);

        let subgroups = std::mem::take(&mut group.groups);
        let mut kept_subgroups = Vec::new();
        select_groups(subgroups, filter, &mut kept_subgroups, index);

        if kept_controls.is_empty() && kept_subgroups.is_empty() {
            continue;
        }

        let mut shell = group.clone_shell();
        shell.controls = kept_controls;
        shell.groups = kept_subgroups;
        if let Some(id) = &shell.id {
            index.insert(EntityItem::node(ItemType::Group, id));
        }
        for param in &shell.params {
            index.insert(EntityItem::node(ItemType::Parameter, &param.id));
        }
        kept.push(shell);
    }
}

fn collect_control_ids(controls: &[Control], out: &mut Vec<String>) {
    for control in controls {
        out.push(control.id.clone());
        collect_control_ids(&control.controls, out);
    }
}

fn collect_group_control_ids(group: &Group, out: &mut Vec<String>) {
    collect_control_ids(&group.controls, out);
    for child in &group.groups {
        collect_group_control_ids(child, out);
    }
}

/// Remove a control (at any depth) from the resolved catalog
fn remove_control(catalog: &mut Catalog, id: &str) -> bool {
    remove_control_from_list(&mut catalog.controls, id)
        || catalog
            .groups
            .iter_mut()
            .any(|group| remove_control_from_group(group, id))
}

fn remove_control_from_group(group: &mut Group, id: &str) -> bool {
    remove_control_from_list(&mut group.controls, id)
        || group
            .groups
            .iter_mut()
            .any(|child| remove_control_from_group(child, id))
}

fn remove_control_from_list(controls: &mut Vec<Control>, id: &str) -> bool {
    if let Some(slot) = controls.iter().position(|control| control.id == id) {
        controls.remove(slot);
        return true;
    }
    controls
        .iter_mut()
        .any(|control| remove_control_from_list(&mut control.controls, id))
}
