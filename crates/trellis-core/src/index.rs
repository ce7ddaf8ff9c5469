use std::collections::HashMap;
use std::fmt;

use trellis_model::{
    Catalog, Control, Group, Location, Party, Property, Resource, Role, TRELLIS_NS,
};
use uuid::Uuid;

/// Entity type discriminator of the index
///
/// UUID-keyed types (Party, Location, Resource) canonicalize their
/// identifiers; name-keyed types compare verbatim, case-sensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemType {
    Control,
    Group,
    Parameter,
    Role,
    Party,
    Location,
    Resource,
}

impl ItemType {
    /// True if identifiers of this type are UUIDs
    pub fn is_uuid_keyed(&self) -> bool {
        matches!(self, ItemType::Party | ItemType::Location | ItemType::Resource)
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ItemType::Control => "control",
            ItemType::Group => "group",
            ItemType::Parameter => "parameter",
            ItemType::Role => "role",
            ItemType::Party => "party",
            ItemType::Location => "location",
            ItemType::Resource => "resource",
        };
        f.write_str(name)
    }
}

/// Normalize an identifier for index lookup
///
/// UUID-keyed types canonicalize to the hyphenated lowercase string form;
/// an unparseable identifier is kept verbatim (it can never match a
/// registered entity, which is the correct lookup miss). Name-keyed types
/// are compared verbatim.
pub fn normalize_identifier(item_type: ItemType, identifier: &str) -> String {
    if item_type.is_uuid_keyed() {
        match Uuid::parse_str(identifier) {
            Ok(uuid) => uuid.to_string(),
            Err(_) => identifier.to_string(),
        }
    } else {
        identifier.to_string()
    }
}

/// True if the property list carries the reserved retention marker
/// (`keep = always` in the trellis namespace)
pub fn has_keep_marker(props: &[Property]) -> bool {
    props.iter().any(|prop| {
        prop.name == "keep"
            && prop.value == "always"
            && prop.ns.as_deref().map_or(true, |ns| ns == TRELLIS_NS)
    })
}

/// Detached instance of a metadata-list entity
///
/// Controls, groups, and parameters live in the resolved catalog tree and
/// are located by walk when mutation is needed; metadata entities imported
/// from source documents exist only in the index until the final merge
/// materializes the survivors.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityInstance {
    Role(Role),
    Party(Party),
    Location(Location),
    Resource(Resource),
}

/// One indexed entity: identity, liveness bookkeeping, and (for metadata
/// entities) the detached instance
#[derive(Debug, Clone, PartialEq)]
pub struct EntityItem {
    item_type: ItemType,
    identifier: String,
    reference_count: u32,
    keep: bool,
    instance: Option<EntityInstance>,
}

impl EntityItem {
    /// Register a tree node (control, group, or parameter) by identifier
    pub fn node(item_type: ItemType, identifier: &str) -> Self {
        Self {
            item_type,
            identifier: normalize_identifier(item_type, identifier),
            reference_count: 0,
            keep: false,
            instance: None,
        }
    }

    /// Register a role, capturing its retention marker
    pub fn role(role: &Role) -> Self {
        Self {
            item_type: ItemType::Role,
            identifier: role.id.clone(),
            reference_count: 0,
            keep: has_keep_marker(&role.props),
            instance: Some(EntityInstance::Role(role.clone())),
        }
    }

    /// Register a party, capturing its retention marker
    pub fn party(party: &Party) -> Self {
        Self {
            item_type: ItemType::Party,
            identifier: party.uuid.to_string(),
            reference_count: 0,
            keep: has_keep_marker(&party.props),
            instance: Some(EntityInstance::Party(party.clone())),
        }
    }

    /// Register a location, capturing its retention marker
    pub fn location(location: &Location) -> Self {
        Self {
            item_type: ItemType::Location,
            identifier: location.uuid.to_string(),
            reference_count: 0,
            keep: has_keep_marker(&location.props),
            instance: Some(EntityInstance::Location(location.clone())),
        }
    }

    /// Register a back-matter resource, capturing its retention marker
    pub fn resource(resource: &Resource) -> Self {
        Self {
            item_type: ItemType::Resource,
            identifier: resource.uuid.to_string(),
            reference_count: 0,
            keep: has_keep_marker(&resource.props),
            instance: Some(EntityInstance::Resource(resource.clone())),
        }
    }

    /// The entity type
    pub fn item_type(&self) -> ItemType {
        self.item_type
    }

    /// The normalized identifier
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Number of referencing sites counted so far
    pub fn reference_count(&self) -> u32 {
        self.reference_count
    }

    /// True if the entity carries the retention marker
    pub fn is_kept(&self) -> bool {
        self.keep
    }

    /// True if the entity survives pruning (referenced or keep-marked)
    pub fn is_live(&self) -> bool {
        self.reference_count > 0 || self.keep
    }

    /// The detached instance, if this entity is a metadata entity
    pub fn instance(&self) -> Option<&EntityInstance> {
        self.instance.as_ref()
    }

    /// Reset the reference counter, keeping identity and retention
    pub fn reset_references(mut self) -> Self {
        self.reference_count = 0;
        self
    }
}

/// Identifier-to-entity map of one item type, preserving insertion order
///
/// Replacement on key collision keeps the original position and favors the
/// later entry.
#[derive(Debug, Clone, Default)]
struct ItemGroup {
    entries: Vec<EntityItem>,
    by_id: HashMap<String, usize>,
}

impl ItemGroup {
    fn insert(&mut self, item: EntityItem) -> Option<EntityItem> {
        match self.by_id.get(item.identifier()) {
            Some(&slot) => Some(std::mem::replace(&mut self.entries[slot], item)),
            None => {
                self.by_id.insert(item.identifier().to_string(), self.entries.len());
                self.entries.push(item);
                None
            }
        }
    }

    fn get(&self, identifier: &str) -> Option<&EntityItem> {
        self.by_id.get(identifier).map(|&slot| &self.entries[slot])
    }

    fn get_mut(&mut self, identifier: &str) -> Option<&mut EntityItem> {
        match self.by_id.get(identifier) {
            Some(&slot) => Some(&mut self.entries[slot]),
            None => None,
        }
    }
}

/// Symbol table of the resolution: (entity type, normalized identifier) to
/// entity record
///
/// Created fresh per import and appended into a running cumulative index;
/// never aliased across resolution phases.
#[derive(Debug, Clone, Default)]
pub struct EntityIndex {
    groups: HashMap<ItemType, ItemGroup>,
}

impl EntityIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entity, returning the entry it displaced (same type and
    /// identifier), if any
    pub fn insert(&mut self, item: EntityItem) -> Option<EntityItem> {
        self.groups.entry(item.item_type()).or_default().insert(item)
    }

    /// Look up an entity by type and raw identifier
    pub fn get(&self, item_type: ItemType, identifier: &str) -> Option<&EntityItem> {
        let normalized = normalize_identifier(item_type, identifier);
        self.groups.get(&item_type)?.get(&normalized)
    }

    /// Mutable lookup by type and raw identifier
    pub fn get_mut(&mut self, item_type: ItemType, identifier: &str) -> Option<&mut EntityItem> {
        let normalized = normalize_identifier(item_type, identifier);
        self.groups.get_mut(&item_type)?.get_mut(&normalized)
    }

    /// True if an entity of the given type and identifier is registered
    pub fn contains(&self, item_type: ItemType, identifier: &str) -> bool {
        self.get(item_type, identifier).is_some()
    }

    /// Count one referencing site against an entity
    ///
    /// Returns the new reference count, or None if no such entity is
    /// registered.
    pub fn increment(&mut self, item_type: ItemType, identifier: &str) -> Option<u32> {
        let item = self.get_mut(item_type, identifier)?;
        item.reference_count += 1;
        Some(item.reference_count)
    }

    /// Entities of one type, in insertion order
    pub fn entities_of(&self, item_type: ItemType) -> impl Iterator<Item = &EntityItem> {
        self.groups
            .get(&item_type)
            .map(|group| group.entries.iter())
            .into_iter()
            .flatten()
    }

    /// Merge another index into this one; on identifier collision the
    /// appended (later) entry wins, keeping the original position
    pub fn append(&mut self, other: EntityIndex) {
        for (_, group) in other.groups {
            for item in group.entries {
                self.insert(item);
            }
        }
    }
}

/// Build an index of everything reachable in a catalog: tree nodes
/// (controls, groups, parameters) plus metadata entities and back-matter
/// resources with detached instances
pub fn index_catalog(catalog: &Catalog) -> EntityIndex {
    let mut index = EntityIndex::new();

    for param in &catalog.params {
        index.insert(EntityItem::node(ItemType::Parameter, &param.id));
    }
    for control in &catalog.controls {
        index_control(control, &mut index);
    }
    for group in &catalog.groups {
        index_group(group, &mut index);
    }

    for role in &catalog.metadata.roles {
        index.insert(EntityItem::role(role));
    }
    for party in &catalog.metadata.parties {
        index.insert(EntityItem::party(party));
    }
    for location in &catalog.metadata.locations {
        index.insert(EntityItem::location(location));
    }
    if let Some(back_matter) = &catalog.back_matter {
        for resource in &back_matter.resources {
            index.insert(EntityItem::resource(resource));
        }
    }

    index
}

/// Register a control, its parameters, and its nested sub-controls
pub fn index_control(control: &Control, index: &mut EntityIndex) {
    index.insert(EntityItem::node(ItemType::Control, &control.id));
    for param in &control.params {
        index.insert(EntityItem::node(ItemType::Parameter, &param.id));
    }
    for child in &control.controls {
        index_control(child, index);
    }
}

/// Register a group, its parameters, and its nested content
pub fn index_group(group: &Group, index: &mut EntityIndex) {
    if let Some(id) = &group.id {
        index.insert(EntityItem::node(ItemType::Group, id));
    }
    for param in &group.params {
        index.insert(EntityItem::node(ItemType::Parameter, &param.id));
    }
    for child in &group.groups {
        index_group(child, index);
    }
    for control in &group.controls {
        index_control(control, index);
    }
}
