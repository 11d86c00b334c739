use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a declaration inside a [`DeclGraph`](crate::decl::DeclGraph).
///
/// `DeclId::ROOT` is the synthetic root scope that owns every top-level declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeclId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HeaderId(pub u32);

impl DeclId {
    pub const ROOT: DeclId = DeclId(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn is_root(self) -> bool {
        self == Self::ROOT
    }
}

impl HeaderId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for DeclId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Source position of a declaration, 1-based line and column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    pub header: HeaderId,
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn new(header: HeaderId, line: u32, column: u32) -> Self {
        Self {
            header,
            line,
            column,
        }
    }
}
