//! Tree Instances and the Level/Type Policy
//!
//! Every hierarchy lives in exactly one tree instance. An instance fixes the
//! depth of the tree, the semantic label of each level, and the backing
//! collection its nodes are stored in. The two shipped instances share shape
//! and rules but never share nodes.
//!
//! # Examples
//!
//! ```rust
//! use syllabus_core::models::{TreeInstance, QUESTION_BANK};
//!
//! assert_eq!(QUESTION_BANK.type_for_level(1), "Year");
//! assert_eq!(QUESTION_BANK.type_for_level(5), "Chapter");
//!
//! let instance: TreeInstance = "previous-papers".parse().unwrap();
//! assert_eq!(instance.config().type_for_level(1), "Exam");
//! ```

use crate::models::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Static description of one tree instance
#[derive(Debug, PartialEq, Eq)]
pub struct TreeInstanceConfig {
    /// Stable key used in events, logs and the CLI (e.g. `question-bank`)
    pub key: &'static str,

    /// Backing collection (SQL table name for the libsql adapter)
    pub table: &'static str,

    /// Semantic label per level; index 0 is level 1
    pub level_types: &'static [&'static str],
}

/// Question bank: Year → Subject → Part → Section → Chapter
pub static QUESTION_BANK: TreeInstanceConfig = TreeInstanceConfig {
    key: "question-bank",
    table: "question_bank_nodes",
    level_types: &["Year", "Subject", "Part", "Section", "Chapter"],
};

/// Previous papers: Exam → Year → Subject → Section → Chapter
pub static PREVIOUS_PAPERS: TreeInstanceConfig = TreeInstanceConfig {
    key: "previous-papers",
    table: "previous_paper_nodes",
    level_types: &["Exam", "Year", "Subject", "Section", "Chapter"],
};

impl TreeInstanceConfig {
    /// Deepest level of this tree (5 for both shipped instances)
    pub fn max_level(&self) -> u8 {
        self.level_types.len() as u8
    }

    /// Level whose nodes carry a `questionCount`
    pub fn question_level(&self) -> u8 {
        self.max_level()
    }

    /// Check that `level` is inside `1..=max_level`
    pub fn validate_level(&self, level: i64) -> Result<u8, ValidationError> {
        if level < 1 || level > i64::from(self.max_level()) {
            return Err(ValidationError::LevelOutOfRange {
                level,
                max: self.max_level(),
            });
        }
        Ok(level as u8)
    }

    /// Semantic label for a level.
    ///
    /// Callers validate the level first; an out-of-range level maps to
    /// `"Unknown"` instead of panicking.
    pub fn type_for_level(&self, level: u8) -> &'static str {
        usize::from(level)
            .checked_sub(1)
            .and_then(|idx| self.level_types.get(idx))
            .copied()
            .unwrap_or("Unknown")
    }

    /// Level the parent of a node at `level` must have, `None` for roots
    pub fn expected_parent_level(&self, level: u8) -> Option<u8> {
        if level > 1 {
            Some(level - 1)
        } else {
            None
        }
    }
}

/// Selector for the shipped tree instances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TreeInstance {
    QuestionBank,
    PreviousPapers,
}

impl TreeInstance {
    pub const ALL: [TreeInstance; 2] = [TreeInstance::QuestionBank, TreeInstance::PreviousPapers];

    pub fn config(self) -> &'static TreeInstanceConfig {
        match self {
            TreeInstance::QuestionBank => &QUESTION_BANK,
            TreeInstance::PreviousPapers => &PREVIOUS_PAPERS,
        }
    }
}

impl fmt::Display for TreeInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.config().key)
    }
}

impl FromStr for TreeInstance {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "question-bank" | "question_bank" => Ok(TreeInstance::QuestionBank),
            "previous-papers" | "previous_papers" => Ok(TreeInstance::PreviousPapers),
            other => Err(ValidationError::UnknownTreeInstance(other.to_string())),
        }
    }
}
