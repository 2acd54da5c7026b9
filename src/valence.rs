//! Valence bookkeeping.
//!
//! Bond contributions are summed in half-units so aromatic bonds (1.5) stay
//! exact until the final rounding step.

use petgraph::graph::NodeIndex;
use thiserror::Error;

use crate::bond::BondType;
use crate::element;
use crate::mol::Mol;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "explicit valence for atom {atom_idx} ({symbol}), {valence}, is greater than permitted {allowed:?}"
)]
pub struct ValenceError {
    pub atom_idx: usize,
    pub symbol: &'static str,
    pub formal_charge: i8,
    pub valence: u8,
    pub allowed: Vec<u8>,
}

/// Sum of bond contributions to `idx` in half-units, plus explicit Hs.
fn twice_bond_sum(mol: &Mol, idx: NodeIndex) -> u32 {
    let atom = mol.atom(idx);
    let bonds: u32 = mol
        .bonds_of(idx)
        .map(|e| {
            let bond = mol.bond(e);
            if bond.bond_type == BondType::Dative && mol.end_atom(e) != idx {
                0
            } else {
                bond.bond_type.twice_order() as u32
            }
        })
        .sum();
    bonds + 2 * atom.explicit_h_count as u32
}

/// Explicit valence: bonds plus hydrogens recorded on the atom. Aromatic
/// atoms whose sum overshoots an allowed valence by at most one and a half
/// are pulled back to that valence.
pub fn explicit_valence(mol: &Mol, idx: NodeIndex) -> u8 {
    let atom = mol.atom(idx);
    valence_from_twice(
        atom.atomic_num,
        atom.formal_charge,
        atom.is_aromatic,
        twice_bond_sum(mol, idx),
    )
}

/// Rounds a half-unit bond sum to a valence, applying the aromatic
/// pull-back rule.
pub(crate) fn valence_from_twice(atomic_num: u8, formal_charge: i8, is_aromatic: bool, twice: u32) -> u8 {
    let mut accum = twice;
    let allowed = element::allowed_valences(atomic_num, formal_charge);
    if is_aromatic {
        if let Some(&default) = allowed.first() {
            if accum > 2 * default as u32 {
                let mut pval = default as u32;
                for &v in allowed {
                    if 2 * v as u32 > accum {
                        break;
                    }
                    pval = v as u32;
                }
                if accum - 2 * pval <= 3 {
                    accum = 2 * pval;
                }
            }
        }
    }
    ((accum + 1) / 2).min(u8::MAX as u32) as u8
}

fn check_explicit(mol: &Mol, idx: NodeIndex, valence: u8) -> Result<(), ValenceError> {
    let atom = mol.atom(idx);
    if atom.is_query() {
        return Ok(());
    }
    let allowed = element::allowed_valences(atom.atomic_num, atom.formal_charge);
    match allowed.iter().max() {
        Some(&max) if valence > max => Err(ValenceError {
            atom_idx: idx.index(),
            symbol: element::symbol(atom.atomic_num),
            formal_charge: atom.formal_charge,
            valence,
            allowed: allowed.to_vec(),
        }),
        _ => Ok(()),
    }
}

/// Implicit hydrogens needed to reach the smallest allowed valence at or
/// above `explicit`. Aromatic atoms only ever fill up to their default
/// valence.
pub fn implicit_h_for(mol: &Mol, idx: NodeIndex, explicit: u8) -> u8 {
    let atom = mol.atom(idx);
    if atom.no_implicit || atom.is_query() || atom.atomic_num == 0 {
        return 0;
    }
    implicit_h_from(
        atom.atomic_num,
        atom.formal_charge,
        atom.is_aromatic,
        atom.num_radical_electrons,
        explicit,
    )
}

pub(crate) fn implicit_h_from(
    atomic_num: u8,
    formal_charge: i8,
    is_aromatic: bool,
    radicals: u8,
    explicit: u8,
) -> u8 {
    let allowed = element::allowed_valences(atomic_num, formal_charge);
    let Some(&default) = allowed.first() else {
        return 0;
    };
    if is_aromatic {
        return default.saturating_sub(explicit).saturating_sub(radicals);
    }
    allowed
        .iter()
        .find(|&&v| v >= explicit)
        .map_or(0, |&v| (v - explicit).saturating_sub(radicals))
}

/// Implicit hydrogen count computed from the graph without consulting or
/// updating the cache. Never fails; overfull atoms get zero.
pub fn implicit_h(mol: &Mol, idx: NodeIndex) -> u8 {
    implicit_h_for(mol, idx, explicit_valence(mol, idx))
}

/// Explicit valence plus implicit hydrogens, computed from the graph.
pub fn total_valence(mol: &Mol, idx: NodeIndex) -> u8 {
    let ev = explicit_valence(mol, idx);
    ev + implicit_h_for(mol, idx, ev)
}

/// Graph degree plus every hydrogen carried on the atom.
pub fn total_degree(mol: &Mol, idx: NodeIndex) -> u8 {
    mol.degree(idx) as u8 + mol.atom(idx).explicit_h_count + implicit_h(mol, idx)
}

/// Explicit valence and implicit H count for every atom. In strict mode the
/// first violation is returned as an error.
/// Explicit valence and implicit hydrogen count of every atom, unchecked.
pub(crate) fn valences(mol: &Mol) -> (Vec<u8>, Vec<u8>) {
    mol.atoms()
        .map(|idx| {
            let ev = explicit_valence(mol, idx);
            (ev, implicit_h_for(mol, idx, ev))
        })
        .unzip()
}

/// Like [`valences`], failing on the first atom whose bonding is not allowed.
pub(crate) fn checked_valences(mol: &Mol) -> Result<(Vec<u8>, Vec<u8>), ValenceError> {
    for idx in mol.atoms() {
        check_explicit(mol, idx, explicit_valence(mol, idx))?;
    }
    Ok(valences(mol))
}

/// Every valence violation in the molecule.
pub fn valence_errors(mol: &Mol) -> Vec<ValenceError> {
    mol.atoms()
        .filter_map(|idx| check_explicit(mol, idx, explicit_valence(mol, idx)).err())
        .collect()
}

/// Unpaired electrons implied by the bonding of an atom that may not take
/// implicit hydrogens, e.g. `[CH3]` or `[O]`.
pub fn radicals_for(mol: &Mol, idx: NodeIndex, total_valence: u8) -> u8 {
    let atom = mol.atom(idx);
    let z = atom.atomic_num;
    if element::default_valences(z).is_empty() {
        return 0;
    }
    let n_outer = element::outer_shell_electrons(z) as i32;
    let chg = atom.formal_charge as i32;
    let total = total_valence as i32;
    let base = if z <= 2 { 2 } else { 8 };
    let mut radicals = base - n_outer - total + chg;
    if radicals < 0 {
        radicals = element::allowed_valences(z, atom.formal_charge)
            .iter()
            .map(|&v| v as i32 - total)
            .find(|&r| r >= 0)
            .unwrap_or(0);
    }
    let cap = n_outer - total - chg;
    if cap >= 0 {
        radicals = radicals.min(cap);
    }
    radicals.clamp(0, u8::MAX as i32) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::Atom;
    use crate::cache::ReadMode;
    use crate::smiles::parse_smiles;

    fn n(i: usize) -> NodeIndex {
        NodeIndex::new(i)
    }

    fn implicit_counts(smiles: &str) -> Vec<u8> {
        let mol = parse_smiles(smiles).unwrap();
        mol.atoms().map(|a| implicit_h(&mol, a)).collect()
    }

    #[test]
    fn simple_implicit_counts() {
        assert_eq!(implicit_counts("CCO"), vec![3, 2, 1]);
        assert_eq!(implicit_counts("C=O"), vec![2, 0]);
        assert_eq!(implicit_counts("C#N"), vec![1, 0]);
    }

    #[test]
    fn aromatic_counts() {
        assert_eq!(implicit_counts("c1ccccc1"), vec![1; 6]);
        assert_eq!(implicit_counts("c1ccc2ccccc2c1")[3], 0);
        assert_eq!(implicit_counts("c1cc[nH]c1"), vec![1, 1, 1, 0, 1]);
        assert_eq!(implicit_counts("c1ccncc1")[3], 0);
    }

    #[test]
    fn aromatic_rounding_keeps_default_valence() {
        let mol = parse_smiles("c1ccc2ccccc2c1").unwrap();
        assert_eq!(explicit_valence(&mol, n(3)), 4);
        let pyrrole = parse_smiles("c1cc[nH]c1").unwrap();
        assert_eq!(explicit_valence(&pyrrole, n(3)), 3);
    }

    #[test]
    fn hypervalent_sulfur_picks_next_valence() {
        assert_eq!(implicit_counts("CS(=O)C")[1], 0);
        assert_eq!(implicit_counts("S(=O)C")[0], 1);
    }

    #[test]
    fn bracket_atoms_take_no_implicit() {
        assert_eq!(implicit_counts("[CH3]C"), vec![0, 3]);
        assert_eq!(implicit_counts("[NH4+]"), vec![0]);
    }

    #[test]
    fn charged_atoms_use_shifted_valences() {
        let mut mol = Mol::new();
        let mut n_plus = Atom::new(7);
        n_plus.formal_charge = 1;
        mol.add_atom(n_plus);
        assert_eq!(implicit_h(&mol, n(0)), 4);
    }

    #[test]
    fn pentavalent_carbon_is_reported() {
        let mol = parse_smiles("C(C)(C)(C)(C)C").unwrap();
        let errs = valence_errors(&mol);
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].atom_idx, 0);
        assert_eq!(errs[0].valence, 5);
        assert_eq!(errs[0].allowed, vec![4]);
        assert!(checked_valences(&mol).is_err());
        assert_eq!(valences(&mol).0[0], 5);
    }

    #[test]
    fn filling_the_cache_tolerates_overbonded_atoms() {
        let mut mol = parse_smiles("C(C)(C)(C)(C)C").unwrap();
        assert!(mol.update_property_cache(true).is_err());
        mol.fill_property_cache();
        assert_eq!(mol.explicit_valence(n(0), ReadMode::Strict).unwrap(), 5);
        assert_eq!(mol.implicit_h_count(n(1), ReadMode::Strict).unwrap(), 3);
    }

    #[test]
    fn every_violation_is_listed() {
        let mol = parse_smiles("C(C)(C)(C)(C)C.N(C)(C)(C)C").unwrap();
        assert_eq!(valence_errors(&mol).len(), 2);
    }

    #[test]
    fn dative_bond_counts_for_acceptor_only() {
        let mol = parse_smiles("N->[Cu]").unwrap();
        assert_eq!(explicit_valence(&mol, n(0)), 0);
        assert_eq!(implicit_h(&mol, n(0)), 3);
        assert_eq!(explicit_valence(&mol, n(1)), 1);
    }

    #[test]
    fn radicals() {
        let mol = parse_smiles("[CH3].[O].[Na].[Na+].[NH4+]").unwrap();
        let got: Vec<u8> = mol
            .atoms()
            .map(|a| radicals_for(&mol, a, explicit_valence(&mol, a)))
            .collect();
        assert_eq!(got, vec![1, 2, 1, 0, 0]);
    }
}
