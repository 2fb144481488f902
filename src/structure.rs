//! Structure registry - the live, user-configurable attribute schema
//!
//! Declares which custom metadata attributes exist per entity type and what
//! datatype each binds as. The serializer consults it on every save/get, so
//! edits made at runtime take effect on the next call; statement text is
//! never cached against it.

use crate::object::EntityType;
use crate::value::DataType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One declared attribute: its column id, display name, and datatype tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDefinition {
    pub id: String,
    pub display_name: String,
    pub data_type: DataType,
}

impl AttributeDefinition {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, data_type: DataType) -> Self {
        Self { id: id.into(), display_name: display_name.into(), data_type }
    }
}

/// Per-entity-type ordered attribute declarations.
///
/// Declaration order is column order: the serializer appends declared
/// attributes to each type's fixed columns in exactly this order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataStructure {
    attributes: HashMap<EntityType, Vec<AttributeDefinition>>,
}

impl MetadataStructure {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an attribute for an entity type. Re-declaring an existing id
    /// replaces its definition in place, keeping its position.
    pub fn declare(&mut self, entity_type: EntityType, definition: AttributeDefinition) {
        let declared = self.attributes.entry(entity_type).or_default();
        if let Some(existing) = declared.iter_mut().find(|d| d.id == definition.id) {
            *existing = definition;
        } else {
            declared.push(definition);
        }
    }

    /// Remove a declaration. The attribute's values stay in memory on the
    /// entities but stop being persisted.
    pub fn undeclare(&mut self, entity_type: EntityType, attribute_id: &str) -> bool {
        match self.attributes.get_mut(&entity_type) {
            Some(declared) => {
                let before = declared.len();
                declared.retain(|d| d.id != attribute_id);
                declared.len() != before
            }
            None => false,
        }
    }

    /// Declared attributes for a type, in declaration order
    pub fn attributes_for(&self, entity_type: EntityType) -> &[AttributeDefinition] {
        self.attributes.get(&entity_type).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn attribute(&self, entity_type: EntityType, attribute_id: &str) -> Option<&AttributeDefinition> {
        self.attributes_for(entity_type).iter().find(|d| d.id == attribute_id)
    }

    pub fn is_declared(&self, entity_type: EntityType, attribute_id: &str) -> bool {
        self.attribute(entity_type, attribute_id).is_some()
    }
}
