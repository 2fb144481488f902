//! Speaker entity

use crate::object::{CorpusObject, EntityType};
use crate::value::AttributeValue;
use serde::{Deserialize, Serialize};

/// A speaker appearing in one or more communications of a corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Speaker {
    object: CorpusObject,
    name: String,
}

impl Speaker {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            object: CorpusObject::new(EntityType::Speaker, id),
            name: String::new(),
        }
    }

    /// Reconstruct from a store row; starts clean
    pub(crate) fn from_store(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            object: CorpusObject::from_store(EntityType::Speaker, id),
            name: name.into(),
        }
    }

    pub fn id(&self) -> &str {
        self.object.id()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        if self.name != name {
            self.name = name;
            self.object.mark_dirty();
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.object.attribute(name)
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<AttributeValue>) {
        self.object.set_attribute(name, value);
    }

    pub fn object(&self) -> &CorpusObject {
        &self.object
    }

    pub(crate) fn object_mut(&mut self) -> &mut CorpusObject {
        &mut self.object
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_setter_short_circuits() {
        let mut speaker = Speaker::new("SPK1");
        speaker.set_name("Alex");
        speaker.object_mut().mark_clean();

        speaker.set_name("Alex");
        assert!(speaker.object().is_clean());

        speaker.set_name("Sam");
        assert!(speaker.object().is_dirty());
    }
}
