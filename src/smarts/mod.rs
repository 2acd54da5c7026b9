//! SMARTS query patterns.
//!
//! A pattern is read into an ordinary [`Mol`] whose atoms and bonds carry
//! [`AtomExpr`](crate::query::AtomExpr) and [`BondExpr`](crate::query::BondExpr)
//! predicates; the substructure matcher evaluates them against a target.
//! Unbracketed atoms joined without a bond symbol are connected by a bond
//! that accepts single or aromatic bonds.

mod error;
mod parser;
mod writer;

use crate::mol::Mol;
pub use error::SmartsError;
pub use writer::to_smarts;

/// Parses a SMARTS pattern into a query molecule.
///
/// ```
/// use molkit::smarts::from_smarts;
/// use molkit::smiles::from_smiles;
/// use molkit::substruct::{get_substruct_matches, SubstructMatchParams};
///
/// let halide = from_smarts("[Cl,Br,I]").unwrap();
/// let target = from_smiles("c1ccccc1Cl").unwrap();
/// let matches = get_substruct_matches(&target, &halide, &SubstructMatchParams::default());
/// assert_eq!(matches.len(), 1);
/// ```
pub fn from_smarts(s: &str) -> Result<Mol, SmartsError> {
    parser::parse(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smiles::from_smiles;
    use crate::substruct::{get_substruct_matches, has_substruct_match, SubstructMatchParams};

    fn hits(pattern: &str, smiles: &str) -> usize {
        let query = from_smarts(pattern).unwrap();
        let target = from_smiles(smiles).unwrap();
        get_substruct_matches(&target, &query, &SubstructMatchParams::default()).len()
    }

    fn matches(pattern: &str, smiles: &str) -> bool {
        let query = from_smarts(pattern).unwrap();
        let target = from_smiles(smiles).unwrap();
        has_substruct_match(&target, &query, &SubstructMatchParams::default())
    }

    #[test]
    fn implicit_bond_accepts_single_or_aromatic() {
        assert_eq!(hits("cc", "c1ccccc1"), 6);
        assert!(matches("CC", "CCO"));
        assert!(!matches("CC", "C=C"));
        assert!(matches("C~C", "C=C"));
    }

    #[test]
    fn element_aromaticity() {
        assert!(matches("c", "c1ccccc1"));
        assert!(!matches("C", "c1ccccc1"));
        assert!(matches("[#6]", "c1ccccc1"));
        assert!(matches("a", "c1ccncc1"));
        assert!(!matches("a", "CCN"));
        assert_eq!(hits("[n]", "c1ccncc1"), 1);
    }

    #[test]
    fn hydrogen_and_degree_counts() {
        assert_eq!(hits("[CH3]", "CC(C)O"), 2);
        assert_eq!(hits("[OH]", "CCO"), 1);
        assert_eq!(hits("[D1]", "CC(C)O"), 3);
        assert_eq!(hits("[X4]", "CC(C)O"), 3);
        assert_eq!(hits("[C;D{2-3}]", "CC(C)CC"), 2);
    }

    #[test]
    fn ring_primitives() {
        assert_eq!(hits("[R]", "C1CC1CC"), 3);
        assert_eq!(hits("[R0]", "C1CC1CC"), 2);
        assert_eq!(hits("[r5]", "C1CCCC1C"), 5);
        assert!(matches("C@C", "C1CC1"));
        assert!(!matches("C@C", "CCC"));
    }

    #[test]
    fn charges() {
        assert!(matches("[N+]", "C[N+](C)(C)C"));
        assert!(!matches("[N+]", "CN(C)C"));
        assert!(matches("[O-]", "CC(=O)[O-]"));
    }

    #[test]
    fn negation_and_alternatives() {
        assert_eq!(hits("[!#6]", "CCOCN"), 2);
        assert_eq!(hits("[O,N]", "CCOCN"), 2);
        assert_eq!(hits("C=,#C", "C=CC#C"), 2);
    }

    #[test]
    fn carbonyl_pattern() {
        assert!(matches("[CX3]=[OX1]", "CC(=O)C"));
        assert!(!matches("[CX3]=[OX1]", "CCO"));
    }

    #[test]
    fn recursive_pattern_selects_atoms() {
        // Carbons bonded to an oxygen.
        assert_eq!(hits("[C;$(CO)]", "CCOC"), 2);
    }

    #[test]
    fn written_pattern_matches_the_same_atoms() {
        for pattern in ["[CX3]=[OX1]", "[C,N;H1]", "c1ccccc1[O,N]", "[$(C=O)]O"] {
            let query = from_smarts(pattern).unwrap();
            let again = from_smarts(&to_smarts(&query)).unwrap();
            for smiles in ["CC(=O)O", "c1ccccc1O", "CNC", "c1ccccc1N"] {
                let target = from_smiles(smiles).unwrap();
                let params = SubstructMatchParams::default();
                assert_eq!(
                    get_substruct_matches(&target, &query, &params),
                    get_substruct_matches(&target, &again, &params),
                    "{pattern} on {smiles}"
                );
            }
        }
    }

    #[test]
    fn errors_report_positions() {
        let err = from_smarts("C[C").unwrap_err();
        assert_eq!(err.position(), Some(1));
        assert_eq!(from_smarts("").unwrap_err().position(), None);
        assert_eq!(err.to_string(), "unclosed bracket atom starting at position 1");
    }
}
