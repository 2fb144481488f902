//! Recording entity - a media file attached to a communication

use crate::object::{CorpusObject, EntityType};
use crate::value::AttributeValue;
use serde::{Deserialize, Serialize};

/// A recorded media file belonging to a communication, with its technical
/// descriptor fields (format, duration, channel layout, checksum).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recording {
    object: CorpusObject,
    communication_id: String,
    name: String,
    filename: String,
    format: String,
    /// Duration in nanoseconds
    duration_ns: i64,
    channels: i64,
    sample_rate: i64,
    precision_bits: i64,
    bit_rate: i64,
    encoding: String,
    file_size: i64,
    checksum_md5: String,
}

impl Recording {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            object: CorpusObject::new(EntityType::Recording, id),
            communication_id: String::new(),
            name: String::new(),
            filename: String::new(),
            format: String::new(),
            duration_ns: 0,
            channels: 0,
            sample_rate: 0,
            precision_bits: 0,
            bit_rate: 0,
            encoding: String::new(),
            file_size: 0,
            checksum_md5: String::new(),
        }
    }

    /// Reconstruct from a store row; starts clean
    pub(crate) fn from_store(id: impl Into<String>, communication_id: impl Into<String>) -> Self {
        let id = id.into();
        let mut recording = Self::new(id.clone());
        recording.object = CorpusObject::from_store(EntityType::Recording, id);
        recording.communication_id = communication_id.into();
        recording
    }

    pub fn id(&self) -> &str {
        self.object.id()
    }

    pub fn communication_id(&self) -> &str {
        &self.communication_id
    }

    /// Set by the owning communication when the recording is added or the
    /// parent is renamed.
    pub(crate) fn set_communication_id(&mut self, communication_id: impl Into<String>) {
        let communication_id = communication_id.into();
        if self.communication_id != communication_id {
            self.communication_id = communication_id;
            self.object.mark_dirty();
        }
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

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn set_filename(&mut self, filename: impl Into<String>) {
        let filename = filename.into();
        if self.filename != filename {
            self.filename = filename;
            self.object.mark_dirty();
        }
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn set_format(&mut self, format: impl Into<String>) {
        let format = format.into();
        if self.format != format {
            self.format = format;
            self.object.mark_dirty();
        }
    }

    /// Duration in nanoseconds
    pub fn duration_ns(&self) -> i64 {
        self.duration_ns
    }

    pub fn set_duration_ns(&mut self, duration_ns: i64) {
        if self.duration_ns != duration_ns {
            self.duration_ns = duration_ns;
            self.object.mark_dirty();
        }
    }

    pub fn channels(&self) -> i64 {
        self.channels
    }

    pub fn set_channels(&mut self, channels: i64) {
        if self.channels != channels {
            self.channels = channels;
            self.object.mark_dirty();
        }
    }

    pub fn sample_rate(&self) -> i64 {
        self.sample_rate
    }

    pub fn set_sample_rate(&mut self, sample_rate: i64) {
        if self.sample_rate != sample_rate {
            self.sample_rate = sample_rate;
            self.object.mark_dirty();
        }
    }

    pub fn precision_bits(&self) -> i64 {
        self.precision_bits
    }

    pub fn set_precision_bits(&mut self, precision_bits: i64) {
        if self.precision_bits != precision_bits {
            self.precision_bits = precision_bits;
            self.object.mark_dirty();
        }
    }

    pub fn bit_rate(&self) -> i64 {
        self.bit_rate
    }

    pub fn set_bit_rate(&mut self, bit_rate: i64) {
        if self.bit_rate != bit_rate {
            self.bit_rate = bit_rate;
            self.object.mark_dirty();
        }
    }

    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    pub fn set_encoding(&mut self, encoding: impl Into<String>) {
        let encoding = encoding.into();
        if self.encoding != encoding {
            self.encoding = encoding;
            self.object.mark_dirty();
        }
    }

    pub fn file_size(&self) -> i64 {
        self.file_size
    }

    pub fn set_file_size(&mut self, file_size: i64) {
        if self.file_size != file_size {
            self.file_size = file_size;
            self.object.mark_dirty();
        }
    }

    pub fn checksum_md5(&self) -> &str {
        &self.checksum_md5
    }

    pub fn set_checksum_md5(&mut self, checksum: impl Into<String>) {
        let checksum = checksum.into();
        if self.checksum_md5 != checksum {
            self.checksum_md5 = checksum;
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
    fn test_media_descriptor_setters_detect_change() {
        let mut recording = Recording::new("REC1");
        recording.set_sample_rate(16_000);
        recording.set_channels(1);
        recording.object_mut().mark_clean();

        recording.set_sample_rate(16_000);
        assert!(recording.object().is_clean());

        recording.set_channels(2);
        assert!(recording.object().is_dirty());
    }
}
