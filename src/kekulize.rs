//! Kekulization assigns alternating single and double bonds to aromatic-typed
//! bonds.
//!
//! Each connected system of aromatic bonds is solved independently. Atoms
//! that still need one more unit of bond order receive exactly one double
//! bond; the assignment is a perfect matching on those atoms, found by
//! augmenting paths with a bounded backtracking fallback for systems where
//! the greedy search gets stuck on an odd cycle.

use std::collections::{HashSet, VecDeque};

use petgraph::graph::{EdgeIndex, NodeIndex};
use thiserror::Error;
use tracing::trace;

use crate::bond::BondType;
use crate::element;
use crate::mol::Mol;
use crate::valence;

const BACKTRACK_LIMIT: usize = 100_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KekulizeError {
    /// No alternating assignment gives these atoms their double bond.
    #[error("can't kekulize mol: unmatched atoms {0:?}")]
    Unkekulizable(Vec<usize>),
}

/// Kekulé bond type for every bond: aromatic-typed bonds become single or
/// double, everything else keeps its type. The molecule is not modified.
pub fn kekule_orders(mol: &Mol) -> Result<Vec<BondType>, KekulizeError> {
    let n = mol.atom_count();
    let aromatic_edges: Vec<EdgeIndex> = mol
        .bonds()
        .filter(|&e| mol.bond(e).bond_type == BondType::Aromatic)
        .collect();

    let mut adj: Vec<Vec<(NodeIndex, EdgeIndex)>> = vec![Vec::new(); n];
    for &e in &aromatic_edges {
        let (a, b) = mol.bond_atoms(e);
        adj[a.index()].push((b, e));
        adj[b.index()].push((a, e));
    }

    let components = aromatic_components(mol, &adj);
    let needs_double: Vec<bool> = (0..n)
        .map(|i| !adj[i].is_empty() && needs_double_bond(mol, NodeIndex::new(i)))
        .collect();

    let mut matched: Vec<Option<EdgeIndex>> = vec![None; n];
    for comp in &components {
        let candidates: Vec<NodeIndex> = comp
            .iter()
            .copied()
            .filter(|v| needs_double[v.index()])
            .collect();
        for &start in &candidates {
            if matched[start.index()].is_none() {
                augment(mol, &adj, &needs_double, &mut matched, start);
            }
        }
        if candidates.iter().any(|v| matched[v.index()].is_none()) {
            trace!(atoms = candidates.len(), "augmenting paths stuck, backtracking");
            for &v in &candidates {
                matched[v.index()] = None;
            }
            let mut budget = BACKTRACK_LIMIT;
            if !backtrack(mol, &adj, &needs_double, &candidates, &mut matched, &mut budget) {
                let unmatched: Vec<usize> = candidates
                    .iter()
                    .filter(|v| matched[v.index()].is_none())
                    .map(|v| v.index())
                    .collect();
                let unmatched = if unmatched.is_empty() {
                    candidates.iter().map(|v| v.index()).collect()
                } else {
                    unmatched
                };
                return Err(KekulizeError::Unkekulizable(unmatched));
            }
        }
    }

    let doubles: HashSet<EdgeIndex> = matched.iter().flatten().copied().collect();
    Ok(mol
        .bonds()
        .map(|e| match mol.bond(e).bond_type {
            BondType::Aromatic if doubles.contains(&e) => BondType::Double,
            BondType::Aromatic => BondType::Single,
            other => other,
        })
        .collect())
}

/// Replaces aromatic bond types by a Kekulé assignment in place. With
/// `clear_aromatic_flags` the aromatic flags on atoms and bonds are cleared
/// too; otherwise they are kept so aromaticity stays queryable.
pub fn kekulize(mol: &mut Mol, clear_aromatic_flags: bool) -> Result<(), KekulizeError> {
    let orders = kekule_orders(mol)?;
    let bonds: Vec<EdgeIndex> = mol.bonds().collect();
    for (e, order) in bonds.into_iter().zip(orders) {
        let bond = mol.bond_mut(e);
        bond.bond_type = order;
        if clear_aromatic_flags {
            bond.is_aromatic = false;
        }
    }
    if clear_aromatic_flags {
        let atoms: Vec<NodeIndex> = mol.atoms().collect();
        for a in atoms {
            mol.atom_mut(a).is_aromatic = false;
        }
    }
    Ok(())
}

fn aromatic_components(mol: &Mol, adj: &[Vec<(NodeIndex, EdgeIndex)>]) -> Vec<Vec<NodeIndex>> {
    let mut seen = vec![false; mol.atom_count()];
    let mut components = Vec::new();
    for node in mol.atoms() {
        if adj[node.index()].is_empty() || seen[node.index()] {
            continue;
        }
        let mut stack = vec![node];
        let mut comp = Vec::new();
        while let Some(v) = stack.pop() {
            if seen[v.index()] {
                continue;
            }
            seen[v.index()] = true;
            comp.push(v);
            stack.extend(
                adj[v.index()]
                    .iter()
                    .map(|&(w, _)| w)
                    .filter(|w| !seen[w.index()]),
            );
        }
        comp.sort_unstable();
        components.push(comp);
    }
    components
}

/// An atom needs a double bond when counting its aromatic bonds as single
/// leaves it one short of its target valence. A bare charged atom two short
/// (e.g. `[n+]` with two ring bonds) also takes one.
fn needs_double_bond(mol: &Mol, idx: NodeIndex) -> bool {
    let atom = mol.atom(idx);
    let allowed = element::allowed_valences(atom.atomic_num, atom.formal_charge);
    if allowed.is_empty() {
        return false;
    }
    let bond_sum: u32 = mol
        .bonds_of(idx)
        .map(|e| {
            let bond = mol.bond(e);
            if bond.bond_type == BondType::Dative && mol.end_atom(e) != idx {
                0
            } else {
                bond.bond_type.integral_order() as u32
            }
        })
        .sum();
    let hs = atom.explicit_h_count as u32 + valence::implicit_h(mol, idx) as u32;
    let used = bond_sum + hs + atom.num_radical_electrons as u32;
    let Some(target) = allowed.iter().map(|&v| v as u32).find(|&v| v >= used) else {
        return false;
    };
    let gap = target - used;
    gap == 1 || (gap == 2 && hs == 0 && atom.formal_charge != 0)
}

fn augment(
    mol: &Mol,
    adj: &[Vec<(NodeIndex, EdgeIndex)>],
    needs_double: &[bool],
    matched: &mut [Option<EdgeIndex>],
    start: NodeIndex,
) -> bool {
    let n = mol.atom_count();
    let mut prev: Vec<Option<(NodeIndex, EdgeIndex)>> = vec![None; n];
    let mut visited = vec![false; n];
    let mut queue = VecDeque::from([start]);
    visited[start.index()] = true;

    while let Some(u) = queue.pop_front() {
        for &(v, e) in &adj[u.index()] {
            if !needs_double[v.index()] || visited[v.index()] || Some(e) == matched[u.index()] {
                continue;
            }
            visited[v.index()] = true;
            prev[v.index()] = Some((u, e));

            let Some(matched_e) = matched[v.index()] else {
                flip_path(matched, &prev, start, v);
                return true;
            };
            let w = mol.other_atom(matched_e, v);
            if !visited[w.index()] {
                visited[w.index()] = true;
                prev[w.index()] = Some((v, matched_e));
                queue.push_back(w);
            }
        }
    }
    false
}

fn flip_path(
    matched: &mut [Option<EdgeIndex>],
    prev: &[Option<(NodeIndex, EdgeIndex)>],
    start: NodeIndex,
    end: NodeIndex,
) {
    let mut cur = end;
    let mut take = true;
    while cur != start {
        let Some((p, e)) = prev[cur.index()] else {
            return;
        };
        if take {
            matched[cur.index()] = Some(e);
            matched[p.index()] = Some(e);
        }
        take = !take;
        cur = p;
    }
}

/// Exhaustive matching search: always extend the unmatched atom with the
/// fewest free partners.
fn backtrack(
    mol: &Mol,
    adj: &[Vec<(NodeIndex, EdgeIndex)>],
    needs_double: &[bool],
    candidates: &[NodeIndex],
    matched: &mut [Option<EdgeIndex>],
    budget: &mut usize,
) -> bool {
    if *budget == 0 {
        return false;
    }
    *budget -= 1;

    let free = |v: NodeIndex, matched: &[Option<EdgeIndex>]| -> Vec<(NodeIndex, EdgeIndex)> {
        adj[v.index()]
            .iter()
            .copied()
            .filter(|(w, _)| needs_double[w.index()] && matched[w.index()].is_none())
            .collect()
    };

    let next = candidates
        .iter()
        .copied()
        .filter(|v| matched[v.index()].is_none())
        .min_by_key(|&v| free(v, matched).len());
    let Some(v) = next else {
        return true;
    };
    for (w, e) in free(v, matched) {
        matched[v.index()] = Some(e);
        matched[w.index()] = Some(e);
        if backtrack(mol, adj, needs_double, candidates, matched, budget) {
            return true;
        }
        matched[v.index()] = None;
        matched[w.index()] = None;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smiles::parse_smiles;

    fn n(i: usize) -> NodeIndex {
        NodeIndex::new(i)
    }

    fn kekulized(smiles: &str) -> Mol {
        let mut mol = parse_smiles(smiles).unwrap();
        kekulize(&mut mol, false).unwrap_or_else(|e| panic!("{smiles}: {e}"));
        mol
    }

    fn count_double_bonds(mol: &Mol) -> usize {
        mol.bonds()
            .filter(|&e| mol.bond(e).bond_type == BondType::Double)
            .count()
    }

    fn is_valid_kekulization(mol: &Mol) -> bool {
        mol.atoms().all(|a| {
            let doubles = mol
                .bonds_of(a)
                .filter(|&e| mol.bond(e).bond_type == BondType::Double)
                .count();
            doubles <= 1 || !mol.atom(a).is_aromatic
        }) && mol
            .bonds()
            .all(|e| mol.bond(e).bond_type != BondType::Aromatic)
    }

    #[test]
    fn benzene() {
        let mol = kekulized("c1ccccc1");
        assert_eq!(count_double_bonds(&mol), 3);
        assert!(is_valid_kekulization(&mol));
        assert!(mol.atoms().all(|a| mol.atom(a).is_aromatic));
        assert!(mol.bonds().all(|e| mol.bond(e).is_aromatic));
    }

    #[test]
    fn clearing_flags() {
        let mut mol = parse_smiles("c1ccccc1").unwrap();
        kekulize(&mut mol, true).unwrap();
        assert!(mol.atoms().all(|a| !mol.atom(a).is_aromatic));
        assert!(mol.bonds().all(|e| !mol.bond(e).is_aromatic));
        for a in mol.atoms() {
            assert_eq!(valence::implicit_h(&mol, a), 1);
        }
    }

    #[test]
    fn fused_systems() {
        assert_eq!(count_double_bonds(&kekulized("c1ccc2ccccc2c1")), 5);
        assert_eq!(count_double_bonds(&kekulized("c1ccc2cc3ccccc3cc2c1")), 7);
        assert_eq!(count_double_bonds(&kekulized("c1ccc2[nH+]cccc2c1")), 5);
    }

    #[test]
    fn five_membered_heterocycles() {
        for smi in ["[nH]1cccc1", "o1cccc1", "s1cccc1", "c1c[nH]cn1", "[cH-]1cccc1"] {
            let mol = kekulized(smi);
            assert_eq!(count_double_bonds(&mol), 2, "{smi}");
            assert!(is_valid_kekulization(&mol), "{smi}");
        }
    }

    #[test]
    fn charged_nitrogen() {
        assert_eq!(count_double_bonds(&kekulized("[n+]1ccccc1")), 3);
        assert_eq!(count_double_bonds(&kekulized("C[n+]1ccccc1")), 3);
        assert_eq!(count_double_bonds(&kekulized("C[n+]1cc[nH]c1")), 2);
    }

    #[test]
    fn substituents_stay_single() {
        let mol = kekulized("Oc1ccccc1");
        let e = mol.bond_between(n(0), n(1)).unwrap();
        assert_eq!(mol.bond(e).bond_type, BondType::Single);
        assert_eq!(count_double_bonds(&mol), 3);
    }

    #[test]
    fn exocyclic_carbonyl() {
        let mol = kekulized("O=c1cccc[nH]1");
        assert_eq!(count_double_bonds(&mol), 3);
        assert!(is_valid_kekulization(&mol));
    }

    #[test]
    fn non_aromatic_passthrough() {
        let mol = kekulized("C=CC");
        let orders: Vec<BondType> = mol.bonds().map(|e| mol.bond(e).bond_type).collect();
        assert_eq!(orders, vec![BondType::Double, BondType::Single]);
    }

    #[test]
    fn odd_ring_fails() {
        let mut mol = parse_smiles("c1cccc1").unwrap();
        let err = kekulize(&mut mol, false).unwrap_err();
        let KekulizeError::Unkekulizable(atoms) = err;
        assert!(!atoms.is_empty());
        // nothing was changed
        assert!(mol
            .bonds()
            .all(|e| mol.bond(e).bond_type == BondType::Aromatic));
    }

    #[test]
    fn bare_carbanion_fails() {
        let mut mol = parse_smiles("[c-]1cccc1").unwrap();
        assert!(kekulize(&mut mol, false).is_err());
    }

    #[test]
    fn kekule_orders_leaves_input_alone() {
        let mol = parse_smiles("c1ccccc1C").unwrap();
        let orders = kekule_orders(&mol).unwrap();
        assert_eq!(orders.len(), 7);
        assert_eq!(orders.iter().filter(|&&t| t == BondType::Double).count(), 3);
        assert_eq!(mol.bond(EdgeIndex::new(0)).bond_type, BondType::Aromatic);
    }

    #[test]
    fn pyrene() {
        let mol = kekulized("c1cc2ccc3cccc4ccc(c1)c2c34");
        assert_eq!(mol.atom_count(), 16);
        assert_eq!(count_double_bonds(&mol), 8);
        assert!(is_valid_kekulization(&mol));
    }
}
