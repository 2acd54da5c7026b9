//! Removal of counter-ion and solvent fragments.

use std::sync::OnceLock;

use tracing::{debug, warn};

use crate::error::Result;
use crate::graph_ops::num_fragments;
use crate::mol::Mol;
use crate::smarts::{from_smarts, SmartsError};
use crate::substruct::delete_substructs;

const DEFAULT_SALTS: &[&str] = &[
    "[Cl,Br,I]",
    "[Li,Na,K,Ca,Mg]",
    "[O,N]",
    "[N](=O)(O)O",
    "[P](=O)(O)(O)O",
    "[P](F)(F)(F)(F)(F)F",
    "[S](=O)(=O)(O)O",
    "[CH3][S](=O)(=O)(O)",
    "c1cc([CH3])ccc1[S](=O)(=O)(O)",
    "[CH3]C(=O)O",
    "FC(F)(F)C(=O)O",
    "OC(=O)C=CC(=O)O",
    "OC(=O)C(=O)O",
    "OC(=O)C(O)C(O)C(=O)O",
    "C1CCCCC1[NH]C1CCCCC1",
];

/// The built-in salt patterns, parsed once per process.
pub fn default_salt_patterns() -> &'static [Mol] {
    static PATTERNS: OnceLock<Vec<Mol>> = OnceLock::new();
    PATTERNS.get_or_init(|| parse_table(DEFAULT_SALTS))
}

/// Parses a pattern table, logging and skipping any entry that is not valid
/// SMARTS.
fn parse_table(table: &[&str]) -> Vec<Mol> {
    table
        .iter()
        .filter_map(|s| match from_smarts(s) {
            Ok(mol) => Some(mol),
            Err(error) => {
                warn!(pattern = *s, %error, "salt pattern rejected");
                None
            }
        })
        .collect()
}

/// Strips fragments that are entirely matched by a salt pattern.
///
/// A fragment is removed only when one match covers all of its atoms, so a
/// chloride ion goes but the chlorine of chlorobenzene stays.
#[derive(Debug, Clone)]
pub struct SaltRemover {
    patterns: Vec<Mol>,
}

impl Default for SaltRemover {
    fn default() -> Self {
        Self {
            patterns: default_salt_patterns().to_vec(),
        }
    }
}

impl SaltRemover {
    pub fn new(patterns: Vec<Mol>) -> Self {
        Self { patterns }
    }

    pub fn from_smarts<I, S>(patterns: I) -> Result<Self, SmartsError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|s| from_smarts(s.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn patterns(&self) -> &[Mol] {
        &self.patterns
    }

    /// Applies every pattern in turn. With `keep_last`, a pattern whose
    /// removal would leave nothing is skipped.
    pub fn strip(&self, mol: &Mol, keep_last: bool) -> Result<Mol> {
        let mut current = mol.clone();
        for (i, pattern) in self.patterns.iter().enumerate() {
            if current.atom_count() == 0 {
                break;
            }
            let stripped = delete_substructs(&current, pattern, true)?;
            if stripped.atom_count() == current.atom_count() {
                continue;
            }
            if keep_last && stripped.atom_count() == 0 {
                debug!(pattern = i, "salt pattern would remove every fragment, skipped");
                continue;
            }
            debug!(
                pattern = i,
                removed = current.atom_count() - stripped.atom_count(),
                fragments_left = num_fragments(&stripped),
                "stripped salt fragments"
            );
            current = stripped;
        }
        Ok(current)
    }
}
