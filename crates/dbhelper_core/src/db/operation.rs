//! Statement classification used for tracking and write observers.

use std::fmt::{Display, Formatter};

/// Kind of statement being executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationType {
    Select,
    Insert,
    Update,
    Delete,
    Truncate,
    Drop,
    Transaction,
}

impl OperationType {
    /// Every operation type that modifies data or schema.
    pub const WRITE_TYPES: [OperationType; 5] = [
        Self::Insert,
        Self::Update,
        Self::Delete,
        Self::Truncate,
        Self::Drop,
    ];

    /// Whether statements of this type go through the before-write
    /// observers. Transaction control is tracked but not a write.
    pub fn is_write(self) -> bool {
        Self::WRITE_TYPES.contains(&self)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Truncate => "truncate",
            Self::Drop => "drop",
            Self::Transaction => "transaction",
        }
    }
}

impl Display for OperationType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::OperationType;

    #[test]
    fn write_classification() {
        assert!(!OperationType::Select.is_write());
        assert!(!OperationType::Transaction.is_write());
        for kind in OperationType::WRITE_TYPES {
            assert!(kind.is_write(), "{kind} should be a write");
        }
    }
}
