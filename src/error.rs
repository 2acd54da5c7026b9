use thiserror::Error;

use crate::aromaticity::AromaticityError;
use crate::fingerprint::FingerprintError;
use crate::kekulize::KekulizeError;
use crate::pickle::PickleError;
use crate::sanitize::SanitizeError;
use crate::smarts::SmartsError;
use crate::smiles::SmilesError;
use crate::valence::ValenceError;

/// Invalid index or dangling reference in a graph operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    #[error("atom index {0} is out of range")]
    InvalidAtomIndex(usize),
    #[error("bond index {0} is out of range")]
    InvalidBondIndex(usize),
    #[error("atom {0} cannot be bonded to itself")]
    SelfBond(usize),
    #[error("atoms {0} and {1} are already bonded")]
    DuplicateBond(usize, usize),
    #[error("no bond between atoms {0} and {1}")]
    NoSuchBond(usize, usize),
    #[error("conformer has {got} positions but the molecule has {expected} atoms")]
    ConformerSize { expected: usize, got: usize },
    #[error("no conformer with id {0}")]
    NoSuchConformer(u32),
    #[error("new atom order is not a permutation of 0..{0}")]
    InvalidPermutation(usize),
    #[error("{0}")]
    Reference(String),
}

/// Top-level error type for every fallible operation in the crate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Structural(#[from] StructuralError),
    #[error(transparent)]
    Valence(#[from] ValenceError),
    #[error(transparent)]
    Aromaticity(#[from] AromaticityError),
    #[error(transparent)]
    Kekulize(#[from] KekulizeError),
    #[error(transparent)]
    Smiles(#[from] SmilesError),
    #[error(transparent)]
    Smarts(#[from] SmartsError),
    #[error(transparent)]
    Pickle(#[from] PickleError),
    #[error(transparent)]
    Fingerprint(#[from] FingerprintError),
    #[error(transparent)]
    Sanitize(Box<SanitizeError>),
    /// A cached derived value was read in strict mode after a mutation.
    #[error("stale {0}: recompute before a strict read")]
    StaleState(&'static str),
}

impl From<SanitizeError> for Error {
    fn from(e: SanitizeError) -> Self {
        Self::Sanitize(Box::new(e))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
