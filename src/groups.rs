//! Graph-level annotations that refer to atoms and bonds by index.
//!
//! Groups do not own what they reference. Every structural edit of the owning
//! [`Mol`](crate::Mol) passes an old-to-new index map through
//! [`StereoGroup::remap`] and [`SubstanceGroup::remap`], which either rewrite
//! the indices or report that the group is no longer valid.

use petgraph::graph::{EdgeIndex, NodeIndex};
use serde::{Deserialize, Serialize};

use crate::props::PropertyBag;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StereoGroupType {
    Absolute,
    Or,
    And,
}

/// Enhanced-stereo grouping of chiral atoms.
#[derive(Debug, Clone, PartialEq)]
pub struct StereoGroup {
    pub group_type: StereoGroupType,
    pub atoms: Vec<NodeIndex>,
}

impl StereoGroup {
    pub fn new(group_type: StereoGroupType, atoms: Vec<NodeIndex>) -> Self {
        Self { group_type, atoms }
    }

    /// Drops removed atoms and renumbers the rest. Returns `false` once the
    /// group is empty.
    pub(crate) fn remap(&mut self, atom_map: &[Option<usize>]) -> bool {
        self.atoms = self
            .atoms
            .iter()
            .filter_map(|a| atom_map.get(a.index()).copied().flatten())
            .map(NodeIndex::new)
            .collect();
        !self.atoms.is_empty()
    }
}

/// A named grouping of atoms and bonds, e.g. a polymer repeat unit.
#[derive(Debug, Clone, PartialEq)]
pub struct SubstanceGroup {
    pub group_type: String,
    pub atoms: Vec<NodeIndex>,
    pub bonds: Vec<EdgeIndex>,
    pub parent_atoms: Vec<NodeIndex>,
    pub props: PropertyBag,
}

impl SubstanceGroup {
    pub fn new(group_type: impl Into<String>) -> Self {
        Self {
            group_type: group_type.into(),
            atoms: Vec::new(),
            bonds: Vec::new(),
            parent_atoms: Vec::new(),
            props: PropertyBag::new(),
        }
    }

    pub fn with_atoms(mut self, atoms: impl IntoIterator<Item = NodeIndex>) -> Self {
        self.atoms.extend(atoms);
        self
    }

    pub fn with_bonds(mut self, bonds: impl IntoIterator<Item = EdgeIndex>) -> Self {
        self.bonds.extend(bonds);
        self
    }

    /// Renumbers every reference. Returns `false` when any referenced atom or
    /// bond was removed, in which case the group is left untouched and must
    /// be discarded.
    pub(crate) fn remap(&mut self, atom_map: &[Option<usize>], bond_map: &[Option<usize>]) -> bool {
        let map_atoms = |v: &[NodeIndex]| -> Option<Vec<NodeIndex>> {
            v.iter()
                .map(|a| atom_map.get(a.index()).copied().flatten().map(NodeIndex::new))
                .collect()
        };
        let atoms = map_atoms(&self.atoms);
        let parents = map_atoms(&self.parent_atoms);
        let bonds: Option<Vec<EdgeIndex>> = self
            .bonds
            .iter()
            .map(|b| bond_map.get(b.index()).copied().flatten().map(EdgeIndex::new))
            .collect();
        match (atoms, parents, bonds) {
            (Some(atoms), Some(parents), Some(bonds)) => {
                self.atoms = atoms;
                self.parent_atoms = parents;
                self.bonds = bonds;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn references_are_valid(&self, num_atoms: usize, num_bonds: usize) -> bool {
        self.atoms
            .iter()
            .chain(&self.parent_atoms)
            .all(|a| a.index() < num_atoms)
            && self.bonds.iter().all(|b| b.index() < num_bonds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(i: usize) -> NodeIndex {
        NodeIndex::new(i)
    }

    #[test]
    fn stereo_group_loses_removed_atom() {
        let mut g = StereoGroup::new(StereoGroupType::Or, vec![n(1), n(3)]);
        let map = vec![Some(0), None, Some(1), Some(2)];
        assert!(g.remap(&map));
        assert_eq!(g.atoms, vec![n(2)]);
    }

    #[test]
    fn stereo_group_dropped_when_empty() {
        let mut g = StereoGroup::new(StereoGroupType::Absolute, vec![n(1)]);
        assert!(!g.remap(&[Some(0), None]));
    }

    #[test]
    fn substance_group_invalidated_by_removed_bond() {
        let mut g = SubstanceGroup::new("SRU")
            .with_atoms([n(0), n(2)])
            .with_bonds([EdgeIndex::new(1)]);
        let atom_map = vec![Some(0), Some(1), Some(2)];
        assert!(!g.remap(&atom_map, &[Some(0), None]));
        assert_eq!(g.bonds, vec![EdgeIndex::new(1)]);
    }

    #[test]
    fn substance_group_remapped() {
        let mut g = SubstanceGroup::new("SUP").with_atoms([n(2), n(3)]);
        g.parent_atoms.push(n(3));
        let atom_map = vec![None, Some(0), Some(1), Some(2)];
        assert!(g.remap(&atom_map, &[]));
        assert_eq!(g.atoms, vec![n(1), n(2)]);
        assert_eq!(g.parent_atoms, vec![n(2)]);
    }
}
