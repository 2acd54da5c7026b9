use std::collections::HashMap;

use petgraph::graph::NodeIndex;
use petgraph::unionfind::UnionFind;

use crate::canonical::canonical_ranks;
use crate::error::StructuralError;
use crate::mol::Mol;

/// Atom sets of the connected components, each sorted, ordered by their
/// lowest atom index.
pub fn fragment_atoms(mol: &Mol) -> Vec<Vec<NodeIndex>> {
    let mut sets = UnionFind::<usize>::new(mol.atom_count());
    for edge in mol.bonds() {
        let (a, b) = mol.bond_atoms(edge);
        sets.union(a.index(), b.index());
    }
    // Atoms are visited in index order, so each component opens at its
    // lowest atom and stays sorted.
    let mut slot_of_root: HashMap<usize, usize> = HashMap::new();
    let mut components: Vec<Vec<NodeIndex>> = Vec::new();
    for atom in mol.atoms() {
        let root = sets.find_mut(atom.index());
        let slot = *slot_of_root.entry(root).or_insert_with(|| {
            components.push(Vec::new());
            components.len() - 1
        });
        components[slot].push(atom);
    }
    components
}

/// Fragment number of every atom, indexed by atom index.
pub fn fragment_ids(mol: &Mol) -> Vec<usize> {
    let mut ids = vec![0; mol.atom_count()];
    for (frag, atoms) in fragment_atoms(mol).iter().enumerate() {
        for a in atoms {
            ids[a.index()] = frag;
        }
    }
    ids
}

pub fn num_fragments(mol: &Mol) -> usize {
    fragment_atoms(mol).len()
}

/// Splits `mol` into one molecule per connected component. Conformers,
/// stereo groups and substance groups that fit inside a fragment go with
/// it; molecule-level properties are copied to every fragment.
pub fn get_fragments(mol: &Mol) -> Vec<Mol> {
    let components = fragment_atoms(mol);
    if components.len() <= 1 {
        return components.iter().map(|_| mol.clone()).collect();
    }
    let ids = fragment_ids(mol);
    let no_bonds = vec![false; mol.bond_count()];
    (0..components.len())
        .map(|frag| {
            let mut piece = mol.clone();
            let drop: Vec<bool> = ids.iter().map(|&id| id != frag).collect();
            piece.remove_marked(&drop, &no_bonds);
            piece
        })
        .collect()
}

/// Copy of `mol` with atoms in canonical rank order.
pub fn renumber_atoms_canonical(mol: &Mol) -> Result<Mol, StructuralError> {
    let ranks = canonical_ranks(mol, true);
    let mut new_order = vec![0usize; ranks.len()];
    for (old_idx, &rank) in ranks.iter().enumerate() {
        new_order[rank] = old_idx;
    }
    mol.renumber_atoms(&new_order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conformer::Conformer;
    use crate::groups::{StereoGroup, StereoGroupType};
    use crate::smiles::{from_smiles, to_canonical_smiles};

    fn n(i: usize) -> NodeIndex {
        NodeIndex::new(i)
    }

    #[test]
    fn components_nacl() {
        let mol = from_smiles("[Na+].[Cl-]").unwrap();
        assert_eq!(fragment_atoms(&mol), vec![vec![n(0)], vec![n(1)]]);
    }

    #[test]
    fn components_single() {
        let mol = from_smiles("CCO").unwrap();
        assert_eq!(num_fragments(&mol), 1);
    }

    #[test]
    fn components_empty() {
        assert_eq!(num_fragments(&Mol::new()), 0);
        assert!(get_fragments(&Mol::new()).is_empty());
    }

    #[test]
    fn fragment_ids_follow_lowest_atom() {
        let mol = from_smiles("O.CC.N").unwrap();
        assert_eq!(fragment_ids(&mol), vec![0, 1, 1, 2]);
    }

    #[test]
    fn fragments_three() {
        let mol = from_smiles("[Na+].[Cl-].O").unwrap();
        let frags = get_fragments(&mol);
        let counts: Vec<usize> = frags.iter().map(|f| f.atom_count()).collect();
        assert_eq!(counts, vec![1, 1, 1]);
        assert_eq!(frags[0].atom(n(0)).atomic_num, 11);
        assert_eq!(frags[2].atom(n(0)).atomic_num, 8);
    }

    #[test]
    fn fragments_single() {
        let mol = from_smiles("CCO").unwrap();
        let frags = get_fragments(&mol);
        assert_eq!(frags.len(), 1);
        assert_eq!(frags[0].atom_count(), mol.atom_count());
        assert_eq!(frags[0].bond_count(), mol.bond_count());
    }

    #[test]
    fn fragments_carry_their_annotations() {
        let mut mol = from_smiles("C[C@H](O)F.N").unwrap();
        let positions = (0..5).map(|i| [i as f64, 0.0, 0.0]).collect();
        mol.add_conformer(Conformer::new(0, positions), false).unwrap();
        mol.add_stereo_group(StereoGroup::new(StereoGroupType::Or, vec![n(1)]))
            .unwrap();
        let frags = get_fragments(&mol);
        assert_eq!(frags[0].stereo_groups().len(), 1);
        assert!(frags[1].stereo_groups().is_empty());
        assert_eq!(frags[1].conformers()[0].position(0), Some([4.0, 0.0, 0.0]));
    }

    #[test]
    fn canonical_renumber_is_order_independent() {
        let a = renumber_atoms_canonical(&from_smiles("OCC").unwrap()).unwrap();
        let b = renumber_atoms_canonical(&from_smiles("CCO").unwrap()).unwrap();
        let za: Vec<u8> = a.atoms().map(|i| a.atom(i).atomic_num).collect();
        let zb: Vec<u8> = b.atoms().map(|i| b.atom(i).atomic_num).collect();
        assert_eq!(za, zb);
        assert_eq!(to_canonical_smiles(&a), to_canonical_smiles(&b));
    }
}
