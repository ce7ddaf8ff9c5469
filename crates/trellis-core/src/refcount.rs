use tracing::debug;
use trellis_model::{
    BackMatter, Catalog, Control, Group, Link, Location, Metadata, Parameter, Part, Party, Profile,
    Role,
};
use uuid::Uuid;

use crate::index::{index_catalog, EntityIndex, EntityInstance, EntityItem, ItemType};
use crate::modify::merge_by;

/// Mark-and-sweep over the resolved catalog's shared entities
///
/// Builds the final index (tree nodes, metadata instances carried from the
/// imports, the profile's own metadata entities), counts live references,
/// then merges the survivors into the final metadata and back-matter
/// lists. Controls and parameters owe their liveness to selection, not to
/// reference counts; only metadata entities are pruned here.
pub(crate) fn handle_references(catalog: &mut Catalog, profile: &Profile, import_index: &EntityIndex) {
    let mut index = index_catalog(catalog);

    for item_type in [
        ItemType::Role,
        ItemType::Party,
        ItemType::Location,
        ItemType::Resource,
    ] {
        for item in import_index.entities_of(item_type) {
            index.insert(item.clone().reset_references());
        }
    }

    // the profile's own metadata entities override imported ones
    for role in &profile.metadata.roles {
        index.insert(EntityItem::role(role));
    }
    for party in &profile.metadata.parties {
        index.insert(EntityItem::party(party));
    }
    for location in &profile.metadata.locations {
        index.insert(EntityItem::location(location));
    }
    if let Some(back_matter) = &profile.back_matter {
        for resource in &back_matter.resources {
            index.insert(EntityItem::resource(resource));
        }
    }

    count_references(catalog, &mut index);
    merge_survivors(catalog, &index);
}

// ===== mark phase =====

/// Count one reference per referencing site, walking the resolved catalog's
/// structural reference edges
fn count_references(catalog: &Catalog, index: &mut EntityIndex) {
    let mut pending: Vec<EntityInstance> = Vec::new();

    count_metadata(&catalog.metadata, index, &mut pending);
    for param in &catalog.params {
        count_parameter(param, index, &mut pending);
    }
    for control in &catalog.controls {
        count_control(control, index, &mut pending);
    }
    for group in &catalog.groups {
        count_group(group, index, &mut pending);
    }

    // transitive liveness: a newly referenced metadata entity's own
    // outgoing edges count as referencing sites
    while let Some(instance) = pending.pop() {
        match instance {
            EntityInstance::Role(role) => count_role_edges(&role, index, &mut pending),
            EntityInstance::Party(party) => count_party_edges(&party, index, &mut pending),
            EntityInstance::Location(location) => {
                count_location_edges(&location, index, &mut pending)
            }
            EntityInstance::Resource(_) => {}
        }
    }
}

fn count_metadata(metadata: &Metadata, index: &mut EntityIndex, pending: &mut Vec<EntityInstance>) {
    for link in &metadata.links {
        count_link(link, index, pending);
    }
    for binding in &metadata.responsible_parties {
        bump(index, pending, ItemType::Role, &binding.role_id);
        for party_uuid in &binding.party_uuids {
            bump(index, pending, ItemType::Party, &party_uuid.to_string());
        }
    }
    for role in &metadata.roles {
        count_role_edges(role, index, pending);
    }
    for party in &metadata.parties {
        count_party_edges(party, index, pending);
    }
    for location in &metadata.locations {
        count_location_edges(location, index, pending);
    }
}

fn count_role_edges(role: &Role, index: &mut EntityIndex, pending: &mut Vec<EntityInstance>) {
    for link in &role.links {
        count_link(link, index, pending);
    }
}

fn count_party_edges(party: &Party, index: &mut EntityIndex, pending: &mut Vec<EntityInstance>) {
    for link in &party.links {
        count_link(link, index, pending);
    }
    for location_uuid in &party.location_uuids {
        bump(index, pending, ItemType::Location, &location_uuid.to_string());
    }
    for organization_uuid in &party.member_of_organizations {
        bump(index, pending, ItemType::Party, &organization_uuid.to_string());
    }
}

fn count_location_edges(
    location: &Location,
    index: &mut EntityIndex,
    pending: &mut Vec<EntityInstance>,
) {
    for link in &location.links {
        count_link(link, index, pending);
    }
}

fn count_control(control: &Control, index: &mut EntityIndex, pending: &mut Vec<EntityInstance>) {
    for link in &control.links {
        count_link(link, index, pending);
    }
    for param in &control.params {
        count_parameter(param, index, pending);
    }
    for part in &control.parts {
        count_part(part, index, pending);
    }
    for child in &control.controls {
        count_control(child, index, pending);
    }
}

fn count_group(group: &Group, index: &mut EntityIndex, pending: &mut Vec<EntityInstance>) {
    for link in &group.links {
        count_link(link, index, pending);
    }
    for param in &group.params {
        count_parameter(param, index, pending);
    }
    for part in &group.parts {
        count_part(part, index, pending);
    }
    for child in &group.groups {
        count_group(child, index, pending);
    }
    for control in &group.controls {
        count_control(control, index, pending);
    }
}

fn count_parameter(param: &Parameter, index: &mut EntityIndex, pending: &mut Vec<EntityInstance>) {
    for link in &param.links {
        count_link(link, index, pending);
    }
    for guideline in &param.guidelines {
        count_prose(&guideline.prose, index, pending);
    }
}

fn count_part(part: &Part, index: &mut EntityIndex, pending: &mut Vec<EntityInstance>) {
    if let Some(prose) = &part.prose {
        count_prose(prose, index, pending);
    }
    for link in &part.links {
        count_link(link, index, pending);
    }
    for child in &part.parts {
        count_part(child, index, pending);
    }
}

/// Resolve an internal link target against the index: UUID fragments try
/// the UUID-keyed types, name fragments the name-keyed ones; the first
/// registered entity takes the count
fn count_link(link: &Link, index: &mut EntityIndex, pending: &mut Vec<EntityInstance>) {
    let Some(fragment) = link.internal_target() else {
        return;
    };

    let candidates: &[ItemType] = if Uuid::parse_str(fragment).is_ok() {
        &[ItemType::Resource, ItemType::Party, ItemType::Location]
    } else {
        &[
            ItemType::Role,
            ItemType::Control,
            ItemType::Parameter,
            ItemType::Group,
        ]
    };

    for &item_type in candidates {
        if index.contains(item_type, fragment) {
            bump(index, pending, item_type, fragment);
            return;
        }
    }
}

/// Scan prose for `{{ insert: param, <id> }}` insertion markers
fn count_prose(prose: &str, index: &mut EntityIndex, pending: &mut Vec<EntityInstance>) {
    let mut rest = prose;
    while let Some(open) = rest.find("{{") {
        let Some(close) = rest[open + 2..].find("}}") else {
            return;
        };
        let inner = rest[open + 2..open + 2 + close].trim();
        if let Some(directive) = inner.strip_prefix("insert:") {
            let mut fields = directive.splitn(2, ',');
            let kind = fields.next().map(str::trim);
            let id = fields.next().map(str::trim);
            if let (Some("param"), Some(id)) = (kind, id) {
                bump(index, pending, ItemType::Parameter, id);
            }
        }
        rest = &rest[open + 2 + close + 2..];
    }
}

/// Count one referencing site; queues the entity's instance for the
/// transitive walk when it first becomes live
fn bump(
    index: &mut EntityIndex,
    pending: &mut Vec<EntityInstance>,
    item_type: ItemType,
    identifier: &str,
) {
    if index.increment(item_type, identifier) == Some(1) {
        if let Some(instance) = index
            .get(item_type, identifier)
            .and_then(EntityItem::instance)
        {
            pending.push(instance.clone());
        }
    }
}

// ===== sweep phase =====

/// Merge surviving indexed entities into the final metadata and back-matter
/// lists, de-duplicating by key with the later entry winning
fn merge_survivors(catalog: &mut Catalog, index: &EntityIndex) {
    let roles = survivors(index, ItemType::Role, |instance| match instance {
        EntityInstance::Role(role) => Some(role.clone()),
        _ => None,
    });
    merge_by(&mut catalog.metadata.roles, roles, |a, b| a.id == b.id);

    let parties = survivors(index, ItemType::Party, |instance| match instance {
        EntityInstance::Party(party) => Some(party.clone()),
        _ => None,
    });
    merge_by(&mut catalog.metadata.parties, parties, |a, b| {
        a.uuid == b.uuid
    });

    let locations = survivors(index, ItemType::Location, |instance| match instance {
        EntityInstance::Location(location) => Some(location.clone()),
        _ => None,
    });
    merge_by(&mut catalog.metadata.locations, locations, |a, b| {
        a.uuid == b.uuid
    });

    let resources = survivors(index, ItemType::Resource, |instance| match instance {
        EntityInstance::Resource(resource) => Some(resource.clone()),
        _ => None,
    });
    if !resources.is_empty() {
        let back_matter = catalog.back_matter.get_or_insert_with(BackMatter::default);
        merge_by(&mut back_matter.resources, resources, |a, b| {
            a.uuid == b.uuid
        });
    }
}

fn survivors<T>(
    index: &EntityIndex,
    item_type: ItemType,
    project: impl Fn(&EntityInstance) -> Option<T>,
) -> Vec<T> {
    index
        .entities_of(item_type)
        .filter_map(|item| {
            if !item.is_live() {
                debug!(
                    item_type = %item.item_type(),
                    identifier = %item.identifier(),
                    "dropping unreferenced entity"
                );
                return None;
            }
            item.instance().and_then(&project)
        })
        .collect()
}
