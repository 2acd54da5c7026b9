use thiserror::Error;

/// Errors produced when parsing a SMARTS pattern. Positions are character
/// offsets into the whole pattern, including inside recursive `$(...)`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SmartsError {
    #[error("empty SMARTS string")]
    EmptyInput,
    #[error("unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { pos: usize, ch: char },
    #[error("unexpected end of pattern at position {pos}")]
    UnexpectedEnd { pos: usize },
    #[error("unclosed bracket atom starting at position {pos}")]
    UnclosedBracket { pos: usize },
    #[error("ring closure {digit} opened at position {pos} is never closed")]
    UnclosedRing { digit: u16, pos: usize },
    #[error("unmatched parenthesis at position {pos}")]
    UnmatchedParen { pos: usize },
    #[error("invalid atomic number at position {pos}")]
    InvalidAtomicNum { pos: usize },
    #[error("invalid range at position {pos}")]
    InvalidRange { pos: usize },
    #[error("number too large at position {pos}")]
    NumberOverflow { pos: usize },
    #[error("recursive SMARTS opened at position {pos} is never closed")]
    UnclosedRecursive { pos: usize },
    #[error("bond without an atom on both sides at position {pos}")]
    DanglingBond { pos: usize },
    #[error("conflicting bond expressions on ring closure {digit} at position {pos}")]
    RingBondConflict { digit: u16, pos: usize },
    #[error("atoms joined twice by the bond at position {pos}")]
    DuplicateBond { pos: usize },
    #[error("ring closure at position {pos} bonds an atom to itself")]
    SelfBond { pos: usize },
}

impl SmartsError {
    /// Character offset of the offending token, when there is one.
    pub fn position(&self) -> Option<usize> {
        match self {
            Self::EmptyInput => None,
            Self::UnexpectedChar { pos, .. }
            | Self::UnexpectedEnd { pos }
            | Self::UnclosedBracket { pos }
            | Self::UnclosedRing { pos, .. }
            | Self::UnmatchedParen { pos }
            | Self::InvalidAtomicNum { pos }
            | Self::InvalidRange { pos }
            | Self::NumberOverflow { pos }
            | Self::UnclosedRecursive { pos }
            | Self::DanglingBond { pos }
            | Self::RingBondConflict { pos, .. }
            | Self::DuplicateBond { pos }
            | Self::SelfBond { pos } => Some(*pos),
        }
    }
}
