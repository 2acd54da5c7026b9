use petgraph::graph::{EdgeIndex, NodeIndex};

use crate::cache::CacheFlags;
use crate::element;
use crate::mol::Mol;
use crate::valence::{total_degree, total_valence};

fn count_atom_elec(mol: &Mol, idx: NodeIndex) -> i16 {
    let atom = mol.atom(idx);
    let anum = atom.atomic_num;

    let dv = element::default_valences(anum);
    if dv.is_empty() || dv[0] <= 1 {
        return -1;
    }
    let default_val = dv[0] as i16;

    let degree = total_degree(mol, idx) as i16;
    if degree > 3 {
        return -1;
    }

    let nouter = element::outer_shell_electrons(anum) as i16;
    let nlp = (nouter - default_val - atom.formal_charge as i16).max(0);

    (default_val - degree) + nlp - atom.num_radical_electrons as i16
}

fn is_conj_candidate(mol: &Mol, idx: NodeIndex) -> bool {
    let atom = mol.atom(idx);
    let anum = atom.atomic_num;

    let dv = element::default_valences(anum);
    if dv.is_empty() || dv[0] <= 1 {
        return false;
    }
    if atom.formal_charge == 0 && total_valence(mol, idx) > dv[0] {
        return false;
    }

    let nouter = element::outer_shell_electrons(anum);
    let row_check = anum <= 10
        || (nouter != 5 && nouter != 6)
        || (nouter == 6 && total_degree(mol, idx) < 2);

    row_check && count_atom_elec(mol, idx) > 0
}

/// Conjugation flag for every bond, indexed by bond index.
///
/// Aromatic bonds are always conjugated. Otherwise a multiple (or aromatic)
/// bond and a neighbouring bond sharing a candidate atom of total degree two
/// or three are conjugated when all three atoms can donate into the pi
/// system.
pub fn assign_conjugation(mol: &Mol) -> Vec<bool> {
    let mut conjugated = vec![false; mol.bond_count()];

    for edge in mol.bonds() {
        if mol.bond(edge).is_aromatic {
            conjugated[edge.index()] = true;
        }
    }

    let candidate: Vec<bool> = mol.atoms().map(|a| is_conj_candidate(mol, a)).collect();

    for atom_idx in mol.atoms() {
        if !candidate[atom_idx.index()] {
            continue;
        }
        if !(2..=3).contains(&total_degree(mol, atom_idx)) {
            continue;
        }

        let bonds: Vec<EdgeIndex> = mol.bonds_of(atom_idx).collect();

        for &bnd1 in &bonds {
            if mol.bond(bnd1).bond_type.twice_order() < 3 {
                continue;
            }
            let other1 = mol.other_atom(bnd1, atom_idx);
            if !candidate[other1.index()] {
                continue;
            }

            for &bnd2 in &bonds {
                if bnd1 == bnd2 {
                    continue;
                }
                let at2 = mol.other_atom(bnd2, atom_idx);
                if total_degree(mol, at2) > 3 {
                    continue;
                }
                if candidate[at2.index()] {
                    conjugated[bnd1.index()] = true;
                    conjugated[bnd2.index()] = true;
                }
            }
        }
    }

    conjugated
}

/// Stores [`assign_conjugation`] on the bonds and marks conjugation current.
pub fn set_conjugation(mol: &mut Mol) {
    let conjugated = assign_conjugation(mol);
    for (i, flag) in conjugated.into_iter().enumerate() {
        mol.bond_mut_raw(EdgeIndex::new(i)).is_conjugated = flag;
    }
    mol.cache_mut().mark_fresh(CacheFlags::CONJUGATION);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ReadMode;
    use crate::smiles::from_smiles;

    fn conj(smiles: &str) -> Vec<bool> {
        let mol = from_smiles(smiles).unwrap();
        assign_conjugation(&mol)
    }

    #[test]
    fn ethane_not_conjugated() {
        assert_eq!(conj("CC"), vec![false]);
    }

    #[test]
    fn lone_double_bond_is_not_conjugated() {
        assert_eq!(conj("C=C"), vec![false]);
        assert_eq!(conj("CC=C"), vec![false, false]);
    }

    #[test]
    fn butadiene_all_conjugated() {
        assert_eq!(conj("C=CC=C"), vec![true, true, true]);
    }

    #[test]
    fn acrolein_conjugated() {
        assert_eq!(conj("C=CC=O"), vec![true, true, true]);
    }

    #[test]
    fn carboxylic_acid() {
        let c = conj("CC(=O)O");
        assert!(!c[0]);
        assert!(c[1]);
        assert!(c[2]);
    }

    #[test]
    fn amide() {
        let c = conj("CC(N)=O");
        assert!(!c[0]);
        assert!(c[1]);
        assert!(c[2]);
    }

    #[test]
    fn cyclohexane_not_conjugated() {
        assert!(conj("C1CCCCC1").iter().all(|&x| !x));
    }

    #[test]
    fn ring_substituents() {
        assert!(conj("Nc1ccccc1")[0]);
        assert!(conj("Oc1ccccc1")[0]);
        assert!(conj("c1ccccc1").iter().all(|&x| x));
    }

    #[test]
    fn stored_flags_become_readable() {
        let mut mol = crate::smiles::parse_smiles("C=CC=C").unwrap();
        assert!(mol.is_conjugated(EdgeIndex::new(0), ReadMode::Strict).is_err());
        set_conjugation(&mut mol);
        assert_eq!(mol.is_conjugated(EdgeIndex::new(1), ReadMode::Strict), Ok(true));
    }
}
