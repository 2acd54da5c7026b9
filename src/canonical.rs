//! Canonical atom ranking.
//!
//! Atoms start from a hash of local invariants and are refined by repeated
//! neighbour-rank hashing until the partition stops splitting. In isomeric
//! mode tetrahedral parity and double-bond configuration split classes too.
//! Remaining ties are broken by promoting one member of the first tied
//! class and refining again; among equally good candidates the lowest atom
//! index wins.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use petgraph::graph::{EdgeIndex, NodeIndex};

use crate::atom::ChiralTag;
use crate::bond::BondType;
use crate::mol::{permutation_parity, Mol};
use crate::stereo::{stereo_neighbors, StereoNbr};
use crate::valence;

struct Fnv1aHasher(u64);

impl Fnv1aHasher {
    fn new() -> Self {
        Self(0xcbf29ce484222325)
    }
}

impl Hasher for Fnv1aHasher {
    fn finish(&self) -> u64 {
        self.0
    }

    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(0x100000001b3);
        }
    }
}

#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct AtomInvariant {
    atomic_num: u8,
    degree: u8,
    hydrogen_count: u8,
    formal_charge: i8,
    is_aromatic: bool,
    isotope: u16,
    atom_map: u16,
    singles: u8,
    doubles: u8,
    triples: u8,
    aromatic_bonds: u8,
    other_bonds: u8,
}

fn atom_invariant(mol: &Mol, idx: NodeIndex) -> AtomInvariant {
    let atom = mol.atom(idx);
    let mut inv = AtomInvariant {
        atomic_num: atom.atomic_num,
        degree: mol.degree(idx) as u8,
        hydrogen_count: atom.explicit_h_count + valence::implicit_h(mol, idx),
        formal_charge: atom.formal_charge,
        is_aromatic: atom.is_aromatic,
        isotope: atom.isotope,
        atom_map: atom.atom_map,
        singles: 0,
        doubles: 0,
        triples: 0,
        aromatic_bonds: 0,
        other_bonds: 0,
    };
    for edge in mol.bonds_of(idx) {
        let bond = mol.bond(edge);
        if bond.is_aromatic {
            inv.aromatic_bonds += 1;
            continue;
        }
        match bond.bond_type {
            BondType::Single => inv.singles += 1,
            BondType::Double => inv.doubles += 1,
            BondType::Triple => inv.triples += 1,
            BondType::Aromatic => inv.aromatic_bonds += 1,
            BondType::Dative | BondType::Unspecified => inv.other_bonds += 1,
        }
    }
    inv
}

fn hash_of<T: Hash>(value: &T) -> u64 {
    let mut h = Fnv1aHasher::new();
    value.hash(&mut h);
    h.finish()
}

fn ranks_from_values(values: &[u64]) -> Vec<usize> {
    let n = values.len();
    let mut indices: Vec<usize> = (0..n).collect();
    indices.sort_by_key(|&i| values[i]);
    let mut ranks = vec![0usize; n];
    for i in 1..n {
        ranks[indices[i]] = if values[indices[i]] == values[indices[i - 1]] {
            ranks[indices[i - 1]]
        } else {
            i
        };
    }
    ranks
}

fn count_distinct(ranks: &[usize]) -> usize {
    let mut sorted: Vec<usize> = ranks.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    sorted.len()
}

/// Bond order in half-units, with aromatic-flagged bonds read as 1.5
/// whatever their Kekulé type.
fn bond_code(mol: &Mol, edge: EdgeIndex) -> u8 {
    let bond = mol.bond(edge);
    if bond.is_aromatic {
        3
    } else {
        bond.bond_type.twice_order()
    }
}

fn morgan_refine(mol: &Mol, ranks: &mut Vec<usize>) {
    let mut prev_distinct = count_distinct(ranks);
    loop {
        let new_values: Vec<u64> = mol
            .atoms()
            .map(|node| {
                let mut neighbor_ranks: Vec<(usize, u8)> = mol
                    .bonds_of(node)
                    .map(|e| {
                        let nb = mol.other_atom(e, node);
                        (ranks[nb.index()], bond_code(mol, e))
                    })
                    .collect();
                neighbor_ranks.sort_unstable();
                hash_of(&(ranks[node.index()], neighbor_ranks))
            })
            .collect();
        let new_ranks = ranks_from_values(&new_values);
        let distinct = count_distinct(&new_ranks);
        if distinct <= prev_distinct {
            return;
        }
        *ranks = new_ranks;
        prev_distinct = distinct;
    }
}

/// Ranks of the reference neighbours of a chiral atom. Hydrogen ranks above
/// every atom and a missing fourth neighbour above that.
fn reference_ranks(mol: &Mol, idx: NodeIndex, ranks: &[usize]) -> Vec<usize> {
    let n = ranks.len();
    let mut seq: Vec<usize> = stereo_neighbors(mol, idx)
        .into_iter()
        .map(|nbr| match nbr {
            StereoNbr::Hydrogen => n,
            StereoNbr::Atom(a) => ranks[a.index()],
        })
        .collect();
    if seq.len() == 3 {
        seq.push(n + 1);
    }
    seq
}

/// Hash of a chiral centre's configuration as seen through `ranks`:
/// `1` or `2` for the two handednesses, `3` when neighbours are tied.
fn stereo_value(mol: &Mol, idx: NodeIndex, ranks: &[usize]) -> u64 {
    let tag = mol.atom(idx).chiral_tag;
    let seq = reference_ranks(mol, idx, ranks);
    let mut sorted = seq.clone();
    sorted.sort_unstable();
    if seq.len() != 4 || sorted.windows(2).any(|w| w[0] == w[1]) {
        return 3;
    }
    let even = permutation_parity(&seq, &sorted);
    if even == (tag == ChiralTag::TetrahedralCcw) {
        1
    } else {
        2
    }
}

fn apply_values(ranks: &mut Vec<usize>, values: &mut [u64]) {
    for (i, v) in values.iter_mut().enumerate() {
        *v = hash_of(&(ranks[i], *v));
    }
    *ranks = ranks_from_values(values);
}

fn chirality_refine(mol: &Mol, ranks: &mut Vec<usize>) {
    let mut values = vec![0u64; ranks.len()];
    let mut any = false;
    for idx in mol.atoms() {
        if mol.atom(idx).chiral_tag.is_tetrahedral() {
            values[idx.index()] = stereo_value(mol, idx, ranks);
            any = true;
        }
    }
    if any {
        apply_values(ranks, &mut values);
    }
}

fn ez_refine(mol: &Mol, ranks: &mut Vec<usize>) {
    let mut values = vec![0u64; ranks.len()];
    let mut any = false;
    for edge in mol.bonds() {
        let bond = mol.bond(edge);
        let (Some(same_side), Some((ref_a, ref_b))) = (bond.stereo.same_side(), bond.stereo_atoms)
        else {
            continue;
        };
        let (a, b) = mol.bond_atoms(edge);
        let highest = |end: NodeIndex, other: NodeIndex| {
            mol.neighbors(end)
                .filter(|&nb| nb != other)
                .max_by_key(|nb| (ranks[nb.index()], std::cmp::Reverse(nb.index())))
        };
        let (Some(ca), Some(cb)) = (highest(a, b), highest(b, a)) else {
            continue;
        };
        let canon_same_side = same_side == ((ca == ref_a) == (cb == ref_b));
        let parity: u64 = if canon_same_side { 1 } else { 2 };
        for atom in [a, b] {
            values[atom.index()] = parity;
            any = true;
        }
    }
    if any {
        apply_values(ranks, &mut values);
    }
}

fn refine(mol: &Mol, ranks: &mut Vec<usize>, isomeric: bool) {
    morgan_refine(mol, ranks);
    if !isomeric {
        return;
    }
    loop {
        let prev = count_distinct(ranks);
        chirality_refine(mol, ranks);
        ez_refine(mol, ranks);
        morgan_refine(mol, ranks);
        if count_distinct(ranks) <= prev {
            break;
        }
    }
}

fn initial_ranks(mol: &Mol) -> (Vec<AtomInvariant>, Vec<usize>) {
    let invariants: Vec<AtomInvariant> = mol.atoms().map(|a| atom_invariant(mol, a)).collect();
    let values: Vec<u64> = invariants.iter().map(hash_of).collect();
    let ranks = ranks_from_values(&values);
    (invariants, ranks)
}

/// Graph-invariant equivalence classes: atoms with equal values cannot be
/// told apart by element, charge, hydrogens, bonding or neighbourhood.
/// Stereo is ignored.
pub fn symmetry_classes(mol: &Mol) -> Vec<usize> {
    let (_, mut ranks) = initial_ranks(mol);
    refine(mol, &mut ranks, false);
    ranks
}

/// Canonical rank of every atom, a permutation of `0..atom_count`.
///
/// Two molecules that differ only in atom order get ranks that map onto
/// each other. With `isomeric`, chiral tags and double-bond stereo take
/// part in the ranking.
pub fn canonical_ranks(mol: &Mol, isomeric: bool) -> Vec<usize> {
    let n = mol.atom_count();
    if n == 0 {
        return Vec::new();
    }
    let (invariants, mut ranks) = initial_ranks(mol);
    refine(mol, &mut ranks, isomeric);
    if count_distinct(&ranks) < n {
        break_ties(mol, &mut ranks, &invariants, isomeric);
    }

    let mut indices: Vec<usize> = (0..n).collect();
    indices.sort_by_key(|&i| (ranks[i], i));
    let mut final_ranks = vec![0usize; n];
    for (rank, &atom_idx) in indices.iter().enumerate() {
        final_ranks[atom_idx] = rank;
    }
    final_ranks
}

fn break_ties(mol: &Mol, ranks: &mut Vec<usize>, invariants: &[AtomInvariant], isomeric: bool) {
    let n = ranks.len();

    while count_distinct(ranks) < n {
        let Some(tied_rank) = find_best_tied_rank(mol, ranks) else {
            return;
        };
        let tied_atoms: Vec<usize> = (0..n).filter(|&i| ranks[i] == tied_rank).collect();
        let max_rank = ranks.iter().copied().max().unwrap_or(0);

        // Promote each tied atom in turn and keep the one whose resulting
        // invariant trace is smallest; the trace does not depend on numbering.
        let mut best: Option<(Vec<u64>, Vec<usize>)> = None;
        for &candidate in &tied_atoms {
            let mut trial = ranks.clone();
            trial[candidate] = max_rank + 1;
            refine(mol, &mut trial, isomeric);
            let mut order: Vec<usize> = (0..n).collect();
            order.sort_by_key(|&i| trial[i]);
            let trace: Vec<u64> = order
                .iter()
                .map(|&atom_i| {
                    let node = NodeIndex::new(atom_i);
                    let mut nb_ranks: Vec<usize> =
                        mol.neighbors(node).map(|nb| trial[nb.index()]).collect();
                    nb_ranks.sort_unstable();
                    let stereo = if isomeric && mol.atom(node).chiral_tag.is_tetrahedral() {
                        stereo_value(mol, node, &trial)
                    } else {
                        0
                    };
                    hash_of(&(&invariants[atom_i], nb_ranks, stereo))
                })
                .collect();
            if best.as_ref().is_none_or(|(t, _)| trace < *t) {
                best = Some((trace, trial));
            }
        }
        match best {
            Some((_, trial)) => *ranks = trial,
            None => return,
        }
    }
}

/// The lowest tied rank, preferring classes without chiral centres so
/// stereo can still separate the others.
fn find_best_tied_rank(mol: &Mol, ranks: &[usize]) -> Option<usize> {
    let mut counts: HashMap<usize, usize> = HashMap::new();
    for &r in ranks {
        *counts.entry(r).or_insert(0) += 1;
    }
    let tied: Vec<usize> = counts
        .into_iter()
        .filter(|&(_, count)| count > 1)
        .map(|(rank, _)| rank)
        .collect();
    let has_stereo_at_rank = |r: usize| {
        mol.atoms()
            .any(|a| ranks[a.index()] == r && mol.atom(a).chiral_tag.is_tetrahedral())
    };
    tied.iter()
        .copied()
        .filter(|&r| !has_stereo_at_rank(r))
        .min()
        .or_else(|| tied.iter().copied().min())
}
