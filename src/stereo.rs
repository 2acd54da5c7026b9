//! Stereo perception: chirality reference frames, removal of meaningless
//! markers and conversion of SMILES bond directions into double-bond stereo.

use petgraph::graph::{EdgeIndex, NodeIndex};
use tracing::debug;

use crate::atom::{ChiralTag, Hybridization};
use crate::bond::{BondDir, BondStereo, BondType};
use crate::canonical::symmetry_classes;
use crate::hybridization::assign_hybridization;
use crate::mol::{permutation_parity, Mol};
use crate::valence;

/// Double bonds in rings smaller than this carry no E/Z stereo.
const MIN_STEREO_RING_SIZE: usize = 8;

/// One slot of a tetrahedral reference frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StereoNbr {
    /// The hydrogen carried on the atom itself.
    Hydrogen,
    Atom(NodeIndex),
}

/// Reference order for an atom's chiral tag: the hydrogen carried on the
/// atom (if any) first, then graph neighbours by ascending bond index. A
/// three-entry frame has an implicit lone pair in fourth position.
pub fn stereo_neighbors(mol: &Mol, idx: NodeIndex) -> Vec<StereoNbr> {
    let mut out = Vec::with_capacity(4);
    if carried_h(mol, idx) > 0 {
        out.push(StereoNbr::Hydrogen);
    }
    out.extend(
        mol.sorted_bonds_of(idx)
            .into_iter()
            .map(|e| StereoNbr::Atom(mol.other_atom(e, idx))),
    );
    out
}

/// Converts a tetrahedral tag between the order in which `written` lists the
/// neighbours in text and the reference frame of [`stereo_neighbors`]. The
/// conversion is its own inverse. A carried hydrogen, or the lone pair of a
/// three-connected centre, is written right after the preceding atom.
pub(crate) fn translate_tag(
    mol: &Mol,
    idx: NodeIndex,
    written: &[NodeIndex],
    has_prev: bool,
    tag: ChiralTag,
) -> ChiralTag {
    let mut order: Vec<StereoNbr> = written.iter().map(|&a| StereoNbr::Atom(a)).collect();
    let mut frame = stereo_neighbors(mol, idx);
    let has_h = frame.contains(&StereoNbr::Hydrogen);
    if has_h || order.len() == 3 {
        let at = usize::from(has_prev).min(order.len());
        order.insert(at, StereoNbr::Hydrogen);
    }
    if frame.len() == 3 && !has_h {
        frame.push(StereoNbr::Hydrogen);
    }
    if order.len() != frame.len() || permutation_parity(&order, &frame) {
        tag
    } else {
        tag.inverted()
    }
}

fn carried_h(mol: &Mol, idx: NodeIndex) -> u8 {
    mol.atom(idx).explicit_h_count + valence::implicit_h(mol, idx)
}

fn total_h(mol: &Mol, idx: NodeIndex) -> u8 {
    carried_h(mol, idx)
        + mol
            .neighbors(idx)
            .filter(|&nb| mol.atom(nb).atomic_num == 1)
            .count() as u8
}

/// Removes tetrahedral tags from atoms that cannot be tetrahedral centres:
/// fewer than three or more than four connections, two or more hydrogens,
/// or non-sp3 hybridization. Returns how many tags were removed.
pub fn cleanup_chirality(mol: &mut Mol) -> usize {
    let tagged: Vec<NodeIndex> = mol
        .atoms()
        .filter(|&a| mol.atom(a).chiral_tag.is_tetrahedral())
        .collect();
    if tagged.is_empty() {
        return 0;
    }
    let hyb = assign_hybridization(mol);
    let mut removed = 0;
    for idx in tagged {
        let total_degree = mol.degree(idx) + carried_h(mol, idx) as usize;
        let keep = (3..=4).contains(&total_degree)
            && total_h(mol, idx) <= 1
            && hyb[idx.index()] == Hybridization::SP3;
        if !keep {
            mol.atom_mut_raw(idx).chiral_tag = ChiralTag::Unspecified;
            removed += 1;
        }
    }
    if removed > 0 {
        debug!(removed, "cleared impossible chiral tags");
    }
    removed
}

/// Whether the substituent `nb` on double-bond end `end` is drawn above
/// it, from the direction of the single bond between them.
fn neighbor_above(mol: &Mol, single: EdgeIndex, end: NodeIndex) -> Option<bool> {
    let dir = mol.bond(single).dir;
    if dir == BondDir::None {
        return None;
    }
    Some((dir == BondDir::EndUpRight) == (mol.begin_atom(single) == end))
}

/// First directional bond at `end` other than `double`, with the neighbour
/// it leads to.
fn directional_neighbor(mol: &Mol, end: NodeIndex, double: EdgeIndex) -> Option<(NodeIndex, bool)> {
    mol.sorted_bonds_of(end)
        .into_iter()
        .filter(|&e| e != double)
        .find_map(|e| neighbor_above(mol, e, end).map(|up| (mol.other_atom(e, end), up)))
}

fn end_has_distinct_substituents(mol: &Mol, end: NodeIndex, other: NodeIndex, classes: &[usize]) -> bool {
    let subs: Vec<NodeIndex> = mol.neighbors(end).filter(|&nb| nb != other).collect();
    match subs.len() {
        0 => false,
        1 => carried_h(mol, end) <= 1,
        2 => classes[subs[0].index()] != classes[subs[1].index()],
        _ => false,
    }
}

fn can_carry_ez(mol: &Mol, edge: EdgeIndex, classes: &[usize]) -> bool {
    let bond = mol.bond(edge);
    if bond.bond_type != BondType::Double || bond.is_aromatic {
        return false;
    }
    let rings = mol.ring_info_or_sssr();
    if rings
        .min_bond_ring_size(edge)
        .is_some_and(|size| size < MIN_STEREO_RING_SIZE)
    {
        return false;
    }
    let (a, b) = mol.bond_atoms(edge);
    end_has_distinct_substituents(mol, a, b, classes)
        && end_has_distinct_substituents(mol, b, a, classes)
}

/// Tetrahedral tags on atoms whose neighbours are not all distinct are
/// dropped, unless the atom sits in a ring with another tagged atom (ring
/// stereo such as cis/trans-1,4-disubstituted cyclohexanes).
fn drop_symmetric_centres(mol: &mut Mol, classes: &[usize]) {
    let rings = mol.ring_info_or_sssr().into_owned();
    let mut drop = Vec::new();
    for idx in mol.atoms() {
        if !mol.atom(idx).chiral_tag.is_tetrahedral() {
            continue;
        }
        let nbrs: Vec<NodeIndex> = mol.neighbors(idx).collect();
        let mut tied = None;
        for (i, &x) in nbrs.iter().enumerate() {
            for &y in &nbrs[i + 1..] {
                if classes[x.index()] == classes[y.index()] {
                    tied = Some((x, y));
                }
            }
        }
        let Some((x, y)) = tied else {
            continue;
        };
        let ring_bond = |nb: NodeIndex| {
            mol.bond_between(idx, nb)
                .is_some_and(|e| rings.is_ring_bond(e))
        };
        let ring_partner = rings.atom_ring_ids(idx).iter().any(|&r| {
            rings.atom_rings()[r]
                .iter()
                .any(|&other| other != idx && mol.atom(other).chiral_tag.is_tetrahedral())
        });
        if !(ring_bond(x) && ring_bond(y) && ring_partner) {
            drop.push(idx);
        }
    }
    for idx in drop {
        debug!(atom = idx.index(), "chiral tag on symmetric centre dropped");
        mol.atom_mut_raw(idx).chiral_tag = ChiralTag::Unspecified;
    }
}

/// Converts bond directions into `Cis`/`Trans` stereo with reference atoms
/// and drops stereo that the graph cannot support.
///
/// Existing `E`/`Z`/`Cis`/`Trans` marks are kept when both ends still have
/// distinct substituents; directions only fill in bonds without a mark.
pub fn assign_stereochemistry(mol: &mut Mol) {
    let classes = symmetry_classes(mol);
    drop_symmetric_centres(mol, &classes);

    let doubles: Vec<EdgeIndex> = mol
        .bonds()
        .filter(|&e| mol.bond(e).bond_type == BondType::Double)
        .collect();
    for edge in doubles {
        if !can_carry_ez(mol, edge, &classes) {
            let bond = mol.bond_mut_raw(edge);
            if bond.stereo != BondStereo::None && bond.stereo != BondStereo::Any {
                debug!(bond = edge.index(), "double-bond stereo dropped");
            }
            if bond.stereo != BondStereo::Any {
                bond.stereo = BondStereo::None;
                bond.stereo_atoms = None;
            }
            continue;
        }
        if mol.bond(edge).stereo.same_side().is_some() && mol.bond(edge).stereo_atoms.is_some() {
            continue;
        }
        let (a, b) = mol.bond_atoms(edge);
        let (Some((xa, up_a)), Some((xb, up_b))) = (
            directional_neighbor(mol, a, edge),
            directional_neighbor(mol, b, edge),
        ) else {
            continue;
        };
        let bond = mol.bond_mut_raw(edge);
        bond.stereo = if up_a == up_b {
            BondStereo::Cis
        } else {
            BondStereo::Trans
        };
        bond.stereo_atoms = Some((xa, xb));
    }
}

/// Whether two substituents on opposite ends of a stereo double bond lie on
/// the same side. `None` when the bond has no usable stereo or `xa`/`xb` are
/// not substituents of its begin and end atoms.
pub fn substituents_same_side(mol: &Mol, edge: EdgeIndex, xa: NodeIndex, xb: NodeIndex) -> Option<bool> {
    let bond = mol.bond(edge);
    let same = bond.stereo.same_side()?;
    let (ra, rb) = bond.stereo_atoms?;
    let (a, b) = mol.bond_atoms(edge);
    let flip = |end: NodeIndex, other: NodeIndex, reference: NodeIndex, x: NodeIndex| {
        if x == reference {
            Some(false)
        } else if mol.bond_between(end, x).is_some() && x != other {
            Some(true)
        } else {
            None
        }
    };
    let fa = flip(a, b, ra, xa)?;
    let fb = flip(b, a, rb, xb)?;
    Some(same != (fa != fb))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smiles::{from_smiles, parse_smiles};

    fn n(i: usize) -> NodeIndex {
        NodeIndex::new(i)
    }

    #[test]
    fn reference_frame_puts_hydrogen_first() {
        let mol = parse_smiles("F[C@H](Cl)Br").unwrap();
        assert_eq!(
            stereo_neighbors(&mol, n(1)),
            vec![
                StereoNbr::Hydrogen,
                StereoNbr::Atom(n(0)),
                StereoNbr::Atom(n(2)),
                StereoNbr::Atom(n(3)),
            ]
        );
    }

    #[test]
    fn impossible_centres_are_cleared() {
        let mut mol = parse_smiles("[C@H2](F)Cl").unwrap();
        assert_eq!(cleanup_chirality(&mut mol), 1);
        let mut alkene = parse_smiles("[C@H](F)=C").unwrap();
        assert_eq!(cleanup_chirality(&mut alkene), 1);
        let mut real = parse_smiles("F[C@H](Cl)Br").unwrap();
        assert_eq!(cleanup_chirality(&mut real), 0);
    }

    #[test]
    fn symmetric_centre_loses_tag() {
        let mol = from_smiles("C[C@H](C)O").unwrap();
        assert_eq!(mol.atom(n(1)).chiral_tag, ChiralTag::Unspecified);
        let mol = from_smiles("C[C@H](CC)O").unwrap();
        assert!(mol.atom(n(1)).chiral_tag.is_tetrahedral());
    }

    #[test]
    fn ring_stereo_survives() {
        let mol = from_smiles("C[C@H]1CC[C@@H](C)CC1").unwrap();
        assert!(mol.atom(n(1)).chiral_tag.is_tetrahedral());
        assert!(mol.atom(n(4)).chiral_tag.is_tetrahedral());
        let lone = from_smiles("C[C@H]1CCCCC1").unwrap();
        assert_eq!(lone.atom(n(1)).chiral_tag, ChiralTag::Unspecified);
    }

    #[test]
    fn directions_become_cis_trans() {
        let trans = from_smiles("F/C=C/F").unwrap();
        let e = trans.bond_between(n(1), n(2)).unwrap();
        assert_eq!(trans.bond(e).stereo, BondStereo::Trans);
        assert_eq!(trans.bond(e).stereo_atoms, Some((n(0), n(3))));

        let cis = from_smiles("F/C=C\\F").unwrap();
        let e = cis.bond_between(n(1), n(2)).unwrap();
        assert_eq!(cis.bond(e).stereo, BondStereo::Cis);

        let branch = from_smiles("C(/F)=C/F").unwrap();
        let e = branch.bond_between(n(0), n(2)).unwrap();
        assert_eq!(branch.bond(e).stereo, BondStereo::Cis);
    }

    #[test]
    fn equivalent_substituents_drop_ez() {
        let mol = from_smiles("C/C(C)=C/F").unwrap();
        let e = mol.bond_between(n(1), n(3)).unwrap();
        assert_eq!(mol.bond(e).stereo, BondStereo::None);
    }

    #[test]
    fn small_ring_double_bonds_have_no_ez() {
        let mol = from_smiles("C1/C=C/CCC1").unwrap();
        for e in mol.bonds() {
            assert_eq!(mol.bond(e).stereo, BondStereo::None);
        }
    }

    #[test]
    fn same_side_query_for_other_substituent() {
        let mol = from_smiles("F/C(Cl)=C/F").unwrap();
        let e = mol.bond_between(n(1), n(3)).unwrap();
        assert_eq!(substituents_same_side(&mol, e, n(0), n(4)), Some(false));
        assert_eq!(substituents_same_side(&mol, e, n(2), n(4)), Some(true));
    }
}
