//! Orbital hybridization from steric number.
//!
//! The steric number is the count of sigma partners (hydrogens included)
//! plus lone pairs. A steric number of four is demoted to sp2 when the atom
//! has at most three partners and sits on a conjugated bond, which is what
//! makes amide and pyrrole nitrogens planar.

use petgraph::graph::NodeIndex;

use crate::atom::Hybridization;
use crate::cache::CacheFlags;
use crate::conjugation::assign_conjugation;
use crate::element::outer_shell_electrons;
use crate::mol::Mol;
use crate::valence::{total_degree, total_valence};

fn steric_number(mol: &Mol, idx: NodeIndex) -> i16 {
    let atom = mol.atom(idx);
    let partners = i16::from(total_degree(mol, idx));
    // Hydrogen and the actinides and beyond: partners only.
    if atom.atomic_num <= 1 || atom.atomic_num >= 89 {
        return partners;
    }

    let valence_electrons = i16::from(outer_shell_electrons(atom.atomic_num));
    let bonded = i16::from(total_valence(mol, idx));
    let charge = i16::from(atom.formal_charge);
    let unshared = valence_electrons - bonded - charge;

    if bonded + valence_electrons - charge < 8 {
        let radicals = i16::from(atom.num_radical_electrons);
        partners + (unshared - radicals) / 2 + radicals
    } else {
        partners + unshared / 2
    }
}

/// Hybridization of one atom given whether any of its bonds is conjugated.
pub fn assign_hybridization_atom(
    mol: &Mol,
    idx: NodeIndex,
    has_conjugated_bond: bool,
) -> Hybridization {
    if mol.atom(idx).atomic_num == 0 {
        return Hybridization::Other;
    }
    match steric_number(mol, idx) {
        i16::MIN..=1 => Hybridization::S,
        2 => Hybridization::SP,
        3 => Hybridization::SP2,
        4 if has_conjugated_bond && total_degree(mol, idx) <= 3 => Hybridization::SP2,
        4 => Hybridization::SP3,
        5 => Hybridization::SP3D,
        6 => Hybridization::SP3D2,
        _ => Hybridization::Other,
    }
}

fn hybridization_with(mol: &Mol, conjugated: &[bool]) -> Vec<Hybridization> {
    mol.atoms()
        .map(|idx| {
            let on_conjugated = mol
                .bonds_of(idx)
                .any(|e| conjugated.get(e.index()).copied().unwrap_or(false));
            assign_hybridization_atom(mol, idx, on_conjugated)
        })
        .collect()
}

/// Hybridization of every atom, with conjugation computed afresh.
pub fn assign_hybridization(mol: &Mol) -> Vec<Hybridization> {
    hybridization_with(mol, &assign_conjugation(mol))
}

/// Fills the hybridization slot of the property cache. Conjugation flags on
/// the bonds are trusted when current.
pub fn set_hybridization(mol: &mut Mol) {
    let hyb = if mol.cache().is_stale(CacheFlags::CONJUGATION) {
        assign_hybridization(mol)
    } else {
        let flags: Vec<bool> = mol.bonds().map(|e| mol.bond(e).is_conjugated).collect();
        hybridization_with(mol, &flags)
    };
    mol.cache_mut().set_hybridization(hyb);
}
