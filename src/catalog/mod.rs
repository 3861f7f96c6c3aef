use serde::{Deserialize, Serialize};

use crate::common::{IndexId, TableId};

// ============================================================================
// Index / operator-class catalog
// ============================================================================

/// An operator class: the set of operators (and their strategy numbers) that
/// an index type supports for a given key, plus which of those operators are
/// *lossy* and therefore require a recheck of the original qual at the scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorClass {
    pub name: String,
    /// Operator names (e.g. "&&", "@>") that require rechecking the original
    /// clause because the index can return false positives for them.
    pub lossy_operators: Vec<String>,
}

impl OperatorClass {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lossy_operators: Vec::new(),
        }
    }

    pub fn with_lossy(mut self, ops: impl IntoIterator<Item = &'static str>) -> Self {
        self.lossy_operators = ops.into_iter().map(str::to_string).collect();
        self
    }
}

/// An index as seen by the planner: which table it is on, which columns (in
/// order) form its key, and the operator class governing each key column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexDef {
    pub index_id: IndexId,
    pub table_id: TableId,
    pub name: String,
    /// 1-based attribute numbers of the indexed columns, in key order.
    pub index_keys: Vec<u16>,
    /// Operator class governing each entry of `index_keys`, same length.
    pub opclasses: Vec<OperatorClass>,
}

impl IndexDef {
    /// Number of keys in the index.
    pub fn nkeys(&self) -> usize {
        self.index_keys.len()
    }

    /// Resolve the 1-based key position of a base-relation attribute number,
    /// or `None` if this index does not cover that attribute.
    pub fn key_position(&self, varattno: u16) -> Option<usize> {
        self.index_keys.iter().position(|&k| k == varattno).map(|p| p + 1)
    }

    /// Whether `operator`, applied through the opclass of the `key_position`th
    /// (1-based) index key, may produce false positives requiring a recheck.
    pub fn op_requires_recheck(&self, key_position: usize, operator: &str) -> bool {
        self.opclasses
            .get(key_position - 1)
            .map(|oc| oc.lossy_operators.iter().any(|o| o == operator))
            .unwrap_or(false)
    }
}
