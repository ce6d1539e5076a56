use serde::{Deserialize, Serialize};

/// How a group of sibling tasks becomes actionable.
///
/// The hybrid modes switch discipline across exactly one parent/child
/// boundary: the first half governs the node's own level, the second half
/// governs its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    #[default]
    None,
    Parallel,
    Sequential,
    ParallelSequential,
    SequentialParallel,
}

/// One half of a [`Mode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discipline {
    None,
    Parallel,
    Sequential,
}

impl Mode {
    /// Discipline among the node and its siblings
    pub fn level(self) -> Discipline {
        match self {
            Mode::None => Discipline::None,
            Mode::Parallel | Mode::ParallelSequential => Discipline::Parallel,
            Mode::Sequential | Mode::SequentialParallel => Discipline::Sequential,
        }
    }

    /// Discipline applied to the node's children
    pub fn children(self) -> Discipline {
        match self {
            Mode::None => Discipline::None,
            Mode::Parallel | Mode::SequentialParallel => Discipline::Parallel,
            Mode::Sequential | Mode::ParallelSequential => Discipline::Sequential,
        }
    }

    pub fn is_none(self) -> bool {
        self == Mode::None
    }

    /// Returns `self` unless it is `None`, in which case `fallback`.
    pub fn or(self, fallback: Mode) -> Mode {
        if self.is_none() { fallback } else { self }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::None => "none",
            Mode::Parallel => "parallel",
            Mode::Sequential => "sequential",
            Mode::ParallelSequential => "parallel-sequential",
            Mode::SequentialParallel => "sequential-parallel",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Mode::None),
            "parallel" => Ok(Mode::Parallel),
            "sequential" => Ok(Mode::Sequential),
            "parallel-sequential" => Ok(Mode::ParallelSequential),
            "sequential-parallel" => Ok(Mode::SequentialParallel),
            other => Err(format!("unknown mode: {}", other)),
        }
    }
}
