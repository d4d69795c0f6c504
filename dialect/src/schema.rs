//! Schema descriptors returned by introspection

use serde::{Deserialize, Serialize};

/// One column of a table as reported by the engine's metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub declared_type: String,
    /// 1-based physical position
    pub ordinal_position: u32,
}

/// An outgoing foreign key edge, discovered from the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyEdge {
    pub source_table: String,
    pub source_column: String,
    pub target_table: String,
    pub target_column: String,
    pub on_update_action: String,
    pub on_delete_action: String,
    pub match_type: String,
}

impl ForeignKeyEdge {
    pub fn is_self_reference(&self) -> bool {
        self.source_table == self.target_table
    }
}
