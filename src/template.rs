//! Exporter-side template model.
//!
//! The transport hands the session one [`Template`] per newly announced
//! template id. Templates are immutable after classification; data
//! records referencing the id are decoded by walking the field list in
//! order.

use crate::elements::ElementKey;

use serde::Serialize;

/// Field length value marking an RFC 7011 variable-length element.
pub const VARLEN: u16 = 0xFFFF;

/// One field of an exporter template: element identity plus the encoded
/// length in the data record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TemplateField {
    pub key: ElementKey,
    pub length: u16,
}

impl TemplateField {
    pub const fn new(enterprise: u32, id: u16, length: u16) -> Self {
        Self {
            key: ElementKey::new(enterprise, id),
            length,
        }
    }

    pub fn is_varlen(&self) -> bool {
        self.length == VARLEN
    }
}

/// An exporter template: 16-bit id, options-scope field count (0 for
/// data templates), and the ordered field list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Template {
    pub id: u16,
    pub scope_count: u16,
    pub fields: Vec<TemplateField>,
}

impl Template {
    pub fn new(id: u16, fields: Vec<TemplateField>) -> Self {
        Self {
            id,
            scope_count: 0,
            fields,
        }
    }

    pub fn new_options(id: u16, scope_count: u16, fields: Vec<TemplateField>) -> Self {
        Self {
            id,
            scope_count,
            fields,
        }
    }

    pub fn is_options(&self) -> bool {
        self.scope_count > 0
    }

    /// Fixed record length, or `None` when any field is variable-length.
    pub fn total_length(&self) -> Option<usize> {
        self.fields.iter().try_fold(0usize, |acc, f| {
            if f.is_varlen() {
                None
            } else {
                Some(acc + f.length as usize)
            }
        })
    }

    pub fn carries(&self, key: ElementKey) -> bool {
        self.fields.iter().any(|f| f.key == key)
    }
}
