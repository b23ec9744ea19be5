//! Header composition: a named set of fields serialized into one byte buffer.

use crate::clock::Clock;
use crate::error::ModelError;
use crate::field::{EncodeContext, Field};
use std::collections::BTreeMap;

/// Named collection of fields forming a message prefix. Field names are unique.
#[derive(Debug, Clone, Default)]
pub struct Header {
    pub name: String,
    fields: BTreeMap<String, Field>,
}

impl Header {
    pub fn new(name: impl Into<String>) -> Self {
        Header {
            name: name.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn add_field(&mut self, field: Field) -> Result<(), ModelError> {
        if self.fields.contains_key(&field.name) {
            return Err(ModelError::Duplicate {
                entity: "field",
                name: format!("{}.{}", self.name, field.name),
            });
        }
        self.fields.insert(field.name.clone(), field);
        Ok(())
    }

    /// Fields in name order.
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.values()
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Header length in bits: the furthest `pos + size` over all fields.
    pub fn bit_len(&self) -> u32 {
        let mut bits = 0;
        for f in self.fields.values() {
            f.update_header_bits(&mut bits);
        }
        bits
    }

    /// Serialize the header for a payload of `payload_bytes` bytes.
    ///
    /// Size fields need the header's own length, which is only known once every
    /// field has been measured, so sizing runs before any field is encoded.
    pub fn compose(&self, payload_bytes: u32, clock: &dyn Clock) -> Vec<u8> {
        let header_bits = self.bit_len();
        let ctx = EncodeContext {
            payload_bytes,
            header_bits,
            clock,
        };
        let mut buf = vec![0u8; header_bits.div_ceil(8) as usize];
        for f in self.fields.values() {
            f.encode(&mut buf, &ctx);
        }
        buf
    }
}
