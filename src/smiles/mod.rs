//! SMILES reading and writing.
//!
//! Reading goes tokenizer → parse tree → [`Mol`], then optionally through
//! the full sanitizer. Ring-closure bonds are created when their second
//! digit is read, so they get higher bond indices than the chain bonds
//! around them.

mod builder;
pub mod error;
mod parse_tree;
mod tokenizer;
mod writer;

use serde::{Deserialize, Serialize};

use crate::aromaticity::AromaticityModel;
use crate::error::Result;
use crate::mol::Mol;
use crate::sanitize::{sanitize_with, SanitizeFlags};
pub use error::SmilesError;
pub use writer::{to_canonical_smiles, to_smiles, SmilesWriteParams};

/// Options for [`from_smiles_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmilesParseParams {
    /// Run every sanitizer stage on the parsed molecule.
    pub sanitize: bool,
    pub aromaticity_model: AromaticityModel,
}

impl Default for SmilesParseParams {
    fn default() -> Self {
        Self {
            sanitize: true,
            aromaticity_model: AromaticityModel::Default,
        }
    }
}

/// Parses SMILES into a molecule exactly as written. Nothing is perceived
/// or checked beyond the grammar; cached valences are filled in permissively.
pub fn parse_smiles(s: &str) -> Result<Mol, SmilesError> {
    let tokens = tokenizer::tokenize(s)?;
    if tokens.is_empty() {
        return Err(SmilesError::EmptyInput);
    }
    let tree = parse_tree::build_parse_tree(&tokens)?;
    let mut mol = builder::build_mol(&tree)?;
    mol.fill_property_cache();
    Ok(mol)
}

/// Parses and sanitizes with the default aromaticity model.
///
/// ```
/// use molkit::smiles::from_smiles;
///
/// let benzene = from_smiles("C1=CC=CC=C1").unwrap();
/// assert!(benzene.atoms().all(|a| benzene.atom(a).is_aromatic));
/// ```
pub fn from_smiles(s: &str) -> Result<Mol> {
    from_smiles_with(s, &SmilesParseParams::default())
}

pub fn from_smiles_with(s: &str, params: &SmilesParseParams) -> Result<Mol> {
    let mut mol = parse_smiles(s)?;
    if params.sanitize {
        sanitize_with(&mut mol, SanitizeFlags::ALL, params.aromaticity_model)?;
    }
    Ok(mol)
}
