//! The fixed set of parallel log tables a batch can be written to.
//!
//! Tables are chosen per request from a URL path segment. The name is
//! resolved here, at the boundary, so that nothing downstream ever sees an
//! unrecognized table and SQL never interpolates user input.

use std::{fmt, str::FromStr};

use crate::AppError;

// ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Partition {
    Log1,
    Log2,
    Log3,
    Log4,
    Log5,
    Log6,
}

/// Path segment name → partition.
const LOOKUP: [(&str, Partition); 6] = [
    ("log1", Partition::Log1),
    ("log2", Partition::Log2),
    ("log3", Partition::Log3),
    ("log4", Partition::Log4),
    ("log5", Partition::Log5),
    ("log6", Partition::Log6),
];

impl Partition {
    pub const ALL: [Partition; 6] = [
        Partition::Log1,
        Partition::Log2,
        Partition::Log3,
        Partition::Log4,
        Partition::Log5,
        Partition::Log6,
    ];

    /// Name used in URLs.
    pub fn name(self) -> &'static str {
        match self {
            Partition::Log1 => "log1",
            Partition::Log2 => "log2",
            Partition::Log3 => "log3",
            Partition::Log4 => "log4",
            Partition::Log5 => "log5",
            Partition::Log6 => "log6",
        }
    }

    /// Backing SQL table.
    pub fn table_name(self) -> &'static str {
        match self {
            Partition::Log1 => "log_1",
            Partition::Log2 => "log_2",
            Partition::Log3 => "log_3",
            Partition::Log4 => "log_4",
            Partition::Log5 => "log_5",
            Partition::Log6 => "log_6",
        }
    }
}

impl FromStr for Partition {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LOOKUP
            .iter()
            .find(|(name, _)| *name == s)
            .map(|(_, partition)| *partition)
            .ok_or_else(|| AppError::invalid(format!("Unknown log table '{}'", s)))
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
