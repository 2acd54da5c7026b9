use thiserror::Error;

/// Errors produced when parsing a SMILES string. Positions are character
/// offsets into the input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SmilesError {
    #[error("empty SMILES string")]
    EmptyInput,
    #[error("unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { pos: usize, ch: char },
    #[error("invalid element '{text}' at position {pos}")]
    InvalidElement { pos: usize, text: String },
    #[error("unclosed bracket atom starting at position {pos}")]
    UnclosedBracket { pos: usize },
    #[error("ring closure {digit} opened at position {pos} is never closed")]
    UnclosedRing { digit: u16, pos: usize },
    #[error("unmatched parenthesis at position {pos}")]
    UnmatchedParen { pos: usize },
    #[error("invalid charge at position {pos}")]
    InvalidCharge { pos: usize },
    #[error("invalid hydrogen count at position {pos}")]
    InvalidHCount { pos: usize },
    #[error("isotope overflow at position {pos}")]
    InvalidIsotope { pos: usize },
    #[error("atom class overflow at position {pos}")]
    InvalidAtomClass { pos: usize },
    #[error("bond or ring closure without a preceding atom at position {pos}")]
    DanglingBond { pos: usize },
    #[error("conflicting bond types on ring closure {digit} at position {pos}")]
    RingBondConflict { digit: u16, pos: usize },
    #[error("atoms joined twice by the bond at position {pos}")]
    DuplicateBond { pos: usize },
    #[error("ring closure at position {pos} bonds an atom to itself")]
    SelfBond { pos: usize },
}

impl SmilesError {
    /// Character offset of the offending token, when there is one.
    pub fn position(&self) -> Option<usize> {
        match self {
            Self::EmptyInput => None,
            Self::UnexpectedChar { pos, .. }
            | Self::InvalidElement { pos, .. }
            | Self::UnclosedBracket { pos }
            | Self::UnclosedRing { pos, .. }
            | Self::UnmatchedParen { pos }
            | Self::InvalidCharge { pos }
            | Self::InvalidHCount { pos }
            | Self::InvalidIsotope { pos }
            | Self::InvalidAtomClass { pos }
            | Self::DanglingBond { pos }
            | Self::RingBondConflict { pos, .. }
            | Self::DuplicateBond { pos }
            | Self::SelfBond { pos } => Some(*pos),
        }
    }
}
