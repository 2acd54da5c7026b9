use std::collections::{HashMap, VecDeque};

use petgraph::algo::connected_components;
use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::unionfind::UnionFind;
use tracing::trace;

use crate::mol::Mol;

/// Ring perception result: each ring as an ordered atom cycle and the
/// matching bond cycle, plus per-atom and per-bond membership tables.
///
/// `bond_rings()[i][k]` is the bond between `atom_rings()[i][k]` and
/// `atom_rings()[i][k + 1]` (wrapping).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RingInfo {
    rings: Vec<Vec<NodeIndex>>,
    bond_rings: Vec<Vec<EdgeIndex>>,
    atom_membership: Vec<Vec<usize>>,
    bond_membership: Vec<Vec<usize>>,
}

impl RingInfo {
    /// Smallest Set of Smallest Rings: `M - N + C` independent cycles chosen
    /// smallest-first from the Horton candidate set.
    pub fn sssr(mol: &Mol) -> Self {
        let num_expected = Self::expected_ring_count(mol);
        if num_expected == 0 {
            return Self::from_rings(mol, Vec::new());
        }
        let candidates = horton_candidates(mol);
        let (rings, _) = select_independent_rings(&candidates, num_expected, mol);
        trace!(rings = rings.len(), "sssr");
        Self::from_rings(mol, rings)
    }

    /// SSSR plus every other candidate ring that has the size of an SSSR ring
    /// and is spanned by SSSR rings no larger than itself. This makes the
    /// result independent of which of several equivalent rings the SSSR
    /// happened to pick (all six cubane faces, both bridges of a symmetric
    /// bicycle).
    pub fn symmetrized_sssr(mol: &Mol) -> Self {
        let num_expected = Self::expected_ring_count(mol);
        if num_expected == 0 {
            return Self::from_rings(mol, Vec::new());
        }
        let num_edges = mol.bond_count();
        let candidates = horton_candidates(mol);
        let (mut rings, sssr_bvs) = select_independent_rings(&candidates, num_expected, mol);

        let sizes: Vec<usize> = rings.iter().map(Vec::len).collect();
        let mut seen: Vec<Vec<u64>> = sssr_bvs.clone();
        for ring in &candidates {
            let len = ring.len();
            if !sizes.contains(&len) {
                continue;
            }
            let bv = ring_to_edge_bitvector(ring, num_edges, mol);
            if seen.contains(&bv) {
                continue;
            }
            let mut basis: Vec<Vec<u64>> = Vec::new();
            for (bv_ring, &size) in sssr_bvs.iter().zip(&sizes) {
                if size <= len {
                    try_add_to_basis(&mut basis, bv_ring.clone());
                }
            }
            if is_in_span(&basis, &bv) {
                seen.push(bv);
                rings.push(ring.clone());
            }
        }
        rings.sort_by(ring_order);
        trace!(rings = rings.len(), "symmetrized sssr");
        Self::from_rings(mol, rings)
    }

    /// Builds membership tables for an explicit list of atom cycles.
    pub fn from_rings(mol: &Mol, rings: Vec<Vec<NodeIndex>>) -> Self {
        let mut atom_membership = vec![Vec::new(); mol.atom_count()];
        let mut bond_membership = vec![Vec::new(); mol.bond_count()];
        let mut bond_rings = Vec::with_capacity(rings.len());
        for (ring_id, ring) in rings.iter().enumerate() {
            let len = ring.len();
            let mut bonds = Vec::with_capacity(len);
            for k in 0..len {
                atom_membership[ring[k].index()].push(ring_id);
                if let Some(e) = mol.bond_between(ring[k], ring[(k + 1) % len]) {
                    bond_membership[e.index()].push(ring_id);
                    bonds.push(e);
                }
            }
            bond_rings.push(bonds);
        }
        Self {
            rings,
            bond_rings,
            atom_membership,
            bond_membership,
        }
    }

    pub fn num_rings(&self) -> usize {
        self.rings.len()
    }

    pub fn atom_rings(&self) -> &[Vec<NodeIndex>] {
        &self.rings
    }

    pub fn bond_rings(&self) -> &[Vec<EdgeIndex>] {
        &self.bond_rings
    }

    /// Ids of the rings containing `atom`.
    pub fn atom_ring_ids(&self, atom: NodeIndex) -> &[usize] {
        self.atom_membership
            .get(atom.index())
            .map_or(&[], Vec::as_slice)
    }

    pub fn bond_ring_ids(&self, bond: EdgeIndex) -> &[usize] {
        self.bond_membership
            .get(bond.index())
            .map_or(&[], Vec::as_slice)
    }

    pub fn num_atom_rings(&self, atom: NodeIndex) -> usize {
        self.atom_ring_ids(atom).len()
    }

    pub fn num_bond_rings(&self, bond: EdgeIndex) -> usize {
        self.bond_ring_ids(bond).len()
    }

    pub fn is_ring_atom(&self, atom: NodeIndex) -> bool {
        !self.atom_ring_ids(atom).is_empty()
    }

    pub fn is_ring_bond(&self, bond: EdgeIndex) -> bool {
        !self.bond_ring_ids(bond).is_empty()
    }

    pub fn min_atom_ring_size(&self, atom: NodeIndex) -> Option<usize> {
        self.atom_ring_ids(atom)
            .iter()
            .map(|&r| self.rings[r].len())
            .min()
    }

    pub fn min_bond_ring_size(&self, bond: EdgeIndex) -> Option<usize> {
        self.bond_ring_ids(bond)
            .iter()
            .map(|&r| self.rings[r].len())
            .min()
    }

    pub fn is_atom_in_ring_of_size(&self, atom: NodeIndex, size: usize) -> bool {
        self.atom_ring_ids(atom)
            .iter()
            .any(|&r| self.rings[r].len() == size)
    }

    /// Cyclomatic number `M - N + C`.
    pub fn expected_ring_count(mol: &Mol) -> usize {
        let v = mol.atom_count();
        let e = mol.bond_count();
        let c = connected_components(mol.graph());
        (e + c).saturating_sub(v)
    }
}

fn ring_order(a: &Vec<NodeIndex>, b: &Vec<NodeIndex>) -> std::cmp::Ordering {
    let sum = |r: &Vec<NodeIndex>| r.iter().map(|n| n.index()).sum::<usize>();
    a.len()
        .cmp(&b.len())
        .then_with(|| sum(a).cmp(&sum(b)))
        .then_with(|| a.cmp(b))
}

/// Marks every bond that lies on some cycle, i.e. every bond that is not a
/// bridge (iterative Tarjan low-link).
fn cyclic_bonds(mol: &Mol) -> Vec<bool> {
    const UNSEEN: usize = usize::MAX;
    let mut order = vec![UNSEEN; mol.atom_count()];
    let mut low = vec![0usize; mol.atom_count()];
    let mut cyclic = vec![true; mol.bond_count()];
    let mut counter = 0;
    for root in mol.atoms() {
        if order[root.index()] != UNSEEN {
            continue;
        }
        order[root.index()] = counter;
        low[root.index()] = counter;
        counter += 1;
        // (atom, bond it was entered through, bonds still to explore)
        let mut stack: Vec<(NodeIndex, Option<EdgeIndex>, Vec<EdgeIndex>)> =
            vec![(root, None, mol.bonds_of(root).collect())];
        while let Some(frame) = stack.last_mut() {
            let (atom, via) = (frame.0, frame.1);
            match frame.2.pop() {
                Some(edge) if Some(edge) == via => {}
                Some(edge) => {
                    let next = mol.other_atom(edge, atom);
                    if order[next.index()] == UNSEEN {
                        order[next.index()] = counter;
                        low[next.index()] = counter;
                        counter += 1;
                        stack.push((next, Some(edge), mol.bonds_of(next).collect()));
                    } else {
                        low[atom.index()] = low[atom.index()].min(order[next.index()]);
                    }
                }
                None => {
                    stack.pop();
                    if let (Some(edge), Some(parent)) = (via, stack.last()) {
                        let p = parent.0.index();
                        low[p] = low[p].min(low[atom.index()]);
                        if low[atom.index()] > order[p] {
                            cyclic[edge.index()] = false;
                        }
                    }
                }
            }
        }
    }
    cyclic
}

/// One connected piece of the cyclic bonds. Atoms are renumbered locally in
/// ascending global order, so local and global tie-breaking agree.
#[derive(Default)]
struct RingSystem {
    atoms: Vec<NodeIndex>,
    adjacency: Vec<Vec<usize>>,
    edges: Vec<(usize, usize)>,
}

fn ring_systems(mol: &Mol) -> Vec<RingSystem> {
    let cyclic = cyclic_bonds(mol);
    let ring_bonds: Vec<EdgeIndex> = mol.bonds().filter(|e| cyclic[e.index()]).collect();
    let mut sets = UnionFind::<usize>::new(mol.atom_count());
    for &edge in &ring_bonds {
        let (a, b) = mol.bond_atoms(edge);
        sets.union(a.index(), b.index());
    }

    let mut local = vec![usize::MAX; mol.atom_count()];
    let mut slot_of_root: HashMap<usize, usize> = HashMap::new();
    let mut systems: Vec<RingSystem> = Vec::new();
    for atom in mol.atoms() {
        if !mol.bonds_of(atom).any(|e| cyclic[e.index()]) {
            continue;
        }
        let root = sets.find_mut(atom.index());
        let slot = *slot_of_root.entry(root).or_insert_with(|| {
            systems.push(RingSystem::default());
            systems.len() - 1
        });
        let system = &mut systems[slot];
        local[atom.index()] = system.atoms.len();
        system.atoms.push(atom);
        system.adjacency.push(Vec::new());
    }
    for &edge in &ring_bonds {
        let (a, b) = mol.bond_atoms(edge);
        let Some(&slot) = slot_of_root.get(&sets.find_mut(a.index())) else {
            continue;
        };
        let system = &mut systems[slot];
        let (la, lb) = (local[a.index()], local[b.index()]);
        system.adjacency[la].push(lb);
        system.adjacency[lb].push(la);
        system.edges.push((la, lb));
    }
    for system in &mut systems {
        for nbs in &mut system.adjacency {
            nbs.sort_unstable();
        }
    }
    systems
}

impl RingSystem {
    fn global(&self, ring: &[usize]) -> Vec<NodeIndex> {
        ring.iter().map(|&i| self.atoms[i]).collect()
    }

    /// The only ring of a system with as many bonds as atoms.
    fn single_cycle(&self) -> Vec<usize> {
        let mut ring = vec![0];
        let mut prev = 0;
        let mut cur = self.adjacency[0][0];
        while cur != 0 {
            ring.push(cur);
            let Some(&next) = self.adjacency[cur].iter().find(|&&nb| nb != prev) else {
                break;
            };
            prev = cur;
            cur = next;
        }
        ring
    }

    /// For every bond (u, v) and atom w, the cycle formed by the shortest
    /// paths w..u and w..v plus the bond, when those paths only share w.
    fn push_candidates(&self, out: &mut Vec<Vec<NodeIndex>>) {
        let n = self.atoms.len();
        let pred = self.shortest_path_trees();
        let dist = |w: usize, x: usize| pred[w][x].1;

        for &(u, v) in &self.edges {
            for w in 0..n {
                if dist(w, u) + dist(w, v) + 1 < 3 {
                    continue;
                }
                let path_u = path_from(&pred[w], w, u);
                let path_v = path_from(&pred[w], w, v);
                if paths_share_internal_node(&path_u, &path_v) {
                    continue;
                }
                let mut ring = path_u;
                ring.extend(path_v[1..].iter().rev());
                out.push(normalize_ring(&self.global(&ring)));
            }
        }

        // Even rings whose two halves are equally long are only found reliably
        // by closing through an atom x with two predecessors p and q towards w.
        for w in 0..n {
            for x in 0..n {
                let dx = dist(w, x);
                if dx < 2 {
                    continue;
                }
                let preds: Vec<usize> = self.adjacency[x]
                    .iter()
                    .copied()
                    .filter(|&p| dist(w, p) + 1 == dx)
                    .collect();
                for (i, &p) in preds.iter().enumerate() {
                    for &q in &preds[i + 1..] {
                        let path_p = path_from(&pred[w], w, p);
                        let path_q = path_from(&pred[w], w, q);
                        if paths_share_internal_node(&path_p, &path_q) {
                            continue;
                        }
                        let mut ring = path_p;
                        ring.push(x);
                        ring.extend(path_q[1..].iter().rev());
                        out.push(normalize_ring(&self.global(&ring)));
                    }
                }
            }
        }
    }

    /// BFS tree from every atom: `(predecessor, distance)` per target. The
    /// system is connected, so every entry is reached. Neighbours are visited
    /// in ascending order so the chosen paths are deterministic.
    fn shortest_path_trees(&self) -> Vec<Vec<(usize, usize)>> {
        let n = self.atoms.len();
        (0..n)
            .map(|src| {
                let mut tree = vec![(usize::MAX, usize::MAX); n];
                tree[src] = (src, 0);
                let mut queue = VecDeque::from([src]);
                while let Some(cur) = queue.pop_front() {
                    let d = tree[cur].1;
                    for &nb in &self.adjacency[cur] {
                        if tree[nb].1 == usize::MAX {
                            tree[nb] = (cur, d + 1);
                            queue.push_back(nb);
                        }
                    }
                }
                tree
            })
            .collect()
    }
}

fn path_from(tree: &[(usize, usize)], src: usize, dst: usize) -> Vec<usize> {
    let mut path = vec![dst];
    let mut cur = dst;
    while cur != src {
        cur = tree[cur].0;
        path.push(cur);
    }
    path.reverse();
    path
}

/// Horton candidate rings, sorted smallest first. Only bonds that lie on a
/// cycle take part, one ring system at a time, so chains and bridges between
/// ring systems cost nothing.
fn horton_candidates(mol: &Mol) -> Vec<Vec<NodeIndex>> {
    let mut candidates: Vec<Vec<NodeIndex>> = Vec::new();
    for system in ring_systems(mol) {
        if system.edges.len() == system.atoms.len() {
            candidates.push(normalize_ring(&system.global(&system.single_cycle())));
        } else {
            system.push_candidates(&mut candidates);
        }
    }
    candidates.sort_by(ring_order);
    candidates.dedup();
    candidates
}

fn paths_share_internal_node(path_u: &[usize], path_v: &[usize]) -> bool {
    path_u[1..].iter().any(|node| path_v[1..].contains(node))
}

fn ring_to_edge_bitvector(ring: &[NodeIndex], num_edges: usize, mol: &Mol) -> Vec<u64> {
    let mut bv = vec![0u64; num_edges.div_ceil(64)];
    let len = ring.len();
    for i in 0..len {
        if let Some(edge) = mol.bond_between(ring[i], ring[(i + 1) % len]) {
            let idx = edge.index();
            bv[idx / 64] |= 1u64 << (idx % 64);
        }
    }
    bv
}

/// Greedy GF(2) basis selection over the sorted candidates. Returns the
/// chosen rings and their edge bit vectors.
fn select_independent_rings(
    candidates: &[Vec<NodeIndex>],
    num_needed: usize,
    mol: &Mol,
) -> (Vec<Vec<NodeIndex>>, Vec<Vec<u64>>) {
    let num_edges = mol.bond_count();
    let mut rings = Vec::with_capacity(num_needed);
    let mut bvs = Vec::with_capacity(num_needed);
    let mut basis: Vec<Vec<u64>> = Vec::with_capacity(num_needed);

    for ring in candidates {
        if rings.len() >= num_needed {
            break;
        }
        let bv = ring_to_edge_bitvector(ring, num_edges, mol);
        if bv.iter().all(|&w| w == 0) {
            continue;
        }
        if try_add_to_basis(&mut basis, bv.clone()) {
            rings.push(ring.clone());
            bvs.push(bv);
        }
    }
    (rings, bvs)
}

fn reduce(basis: &[Vec<u64>], v: &mut [u64]) {
    for row in basis {
        if let Some(p) = leading_bit(row) {
            if v[p / 64] & (1u64 << (p % 64)) != 0 {
                xor_into(v, row);
            }
        }
    }
}

/// Rows are kept in reduced form: each row's leading bit is clear in every
/// later row.
fn try_add_to_basis(basis: &mut Vec<Vec<u64>>, candidate: Vec<u64>) -> bool {
    let mut v = candidate;
    reduce(basis, &mut v);
    if v.iter().all(|&w| w == 0) {
        return false;
    }
    basis.push(v);
    true
}

fn is_in_span(basis: &[Vec<u64>], bv: &[u64]) -> bool {
    let mut v = bv.to_vec();
    reduce(basis, &mut v);
    v.iter().all(|&w| w == 0)
}

fn leading_bit(bv: &[u64]) -> Option<usize> {
    bv.iter()
        .enumerate()
        .find(|(_, &w)| w != 0)
        .map(|(i, &w)| i * 64 + w.trailing_zeros() as usize)
}

fn xor_into(a: &mut [u64], b: &[u64]) {
    for (aw, bw) in a.iter_mut().zip(b) {
        *aw ^= *bw;
    }
}

/// Rotates the ring to start at its lowest atom and walks towards the lower
/// of that atom's two ring neighbours.
fn normalize_ring(ring: &[NodeIndex]) -> Vec<NodeIndex> {
    let Some(min_pos) = ring
        .iter()
        .enumerate()
        .min_by_key(|&(_, idx)| idx)
        .map(|(i, _)| i)
    else {
        return Vec::new();
    };
    let len = ring.len();
    let mut normalized: Vec<NodeIndex> = (0..len).map(|i| ring[(min_pos + i) % len]).collect();
    if len > 2 && normalized[1] > normalized[len - 1] {
        normalized[1..].reverse();
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smiles::parse_smiles;

    fn n(i: usize) -> NodeIndex {
        NodeIndex::new(i)
    }

    fn mol(smiles: &str) -> Mol {
        parse_smiles(smiles).unwrap_or_else(|e| panic!("bad SMILES {smiles:?}: {e}"))
    }

    fn sizes(ri: &RingInfo) -> Vec<usize> {
        let mut s: Vec<usize> = ri.atom_rings().iter().map(Vec::len).collect();
        s.sort_unstable();
        s
    }

    #[test]
    fn cyclohexane() {
        let ri = RingInfo::sssr(&mol("C1CCCCC1"));
        assert_eq!(ri.num_rings(), 1);
        assert_eq!(ri.atom_rings()[0].len(), 6);
        assert_eq!(ri.bond_rings()[0].len(), 6);
    }

    #[test]
    fn acyclic() {
        let m = mol("CCCC");
        let ri = RingInfo::sssr(&m);
        assert_eq!(ri.num_rings(), 0);
        assert_eq!(ri.min_atom_ring_size(n(0)), None);
    }

    #[test]
    fn naphthalene() {
        let m = mol("c1ccc2ccccc2c1");
        let ri = RingInfo::sssr(&m);
        assert_eq!(sizes(&ri), vec![6, 6]);
        let shared = m.atoms().filter(|&a| ri.num_atom_rings(a) == 2).count();
        assert_eq!(shared, 2);
        let fusion_bonds = m.bonds().filter(|&b| ri.num_bond_rings(b) == 2).count();
        assert_eq!(fusion_bonds, 1);
    }

    #[test]
    fn anthracene() {
        assert_eq!(RingInfo::sssr(&mol("c1ccc2cc3ccccc3cc2c1")).num_rings(), 3);
    }

    #[test]
    fn spiro() {
        let ri = RingInfo::sssr(&mol("C1CCC2(CC1)CCC2"));
        assert_eq!(sizes(&ri), vec![4, 6]);
    }

    #[test]
    fn bond_cycle_matches_atom_cycle() {
        let m = mol("C1CC2CC1CC2");
        let ri = RingInfo::sssr(&m);
        for (atoms, bonds) in ri.atom_rings().iter().zip(ri.bond_rings()) {
            for (k, &b) in bonds.iter().enumerate() {
                let (x, y) = m.bond_atoms(b);
                let (p, q) = (atoms[k], atoms[(k + 1) % atoms.len()]);
                assert!((x, y) == (p, q) || (x, y) == (q, p));
            }
        }
    }

    #[test]
    fn phenol_oxygen_not_in_ring() {
        let m = mol("Oc1ccccc1");
        let ri = RingInfo::sssr(&m);
        assert!(!ri.is_ring_atom(n(0)));
        assert!(!ri.is_ring_bond(m.bond_between(n(0), n(1)).unwrap()));
        for i in 1..7 {
            assert!(ri.is_ring_atom(n(i)));
        }
    }

    #[test]
    fn cubane_cyclomatic_number() {
        let m = mol("C12C3C4C1C5C3C4C25");
        assert_eq!(RingInfo::expected_ring_count(&m), 5);
        assert_eq!(RingInfo::sssr(&m).num_rings(), 5);
    }

    #[test]
    fn sym_sssr_naphthalene_has_no_envelope() {
        let ri = RingInfo::symmetrized_sssr(&mol("c1ccc2ccccc2c1"));
        assert_eq!(sizes(&ri), vec![6, 6]);
    }

    #[test]
    fn sym_sssr_cubane_has_all_faces() {
        let m = mol("C12C3C4C1C5C3C4C25");
        let ri = RingInfo::symmetrized_sssr(&m);
        assert_eq!(sizes(&ri), vec![4; 6]);
        for a in m.atoms() {
            assert_eq!(ri.num_atom_rings(a), 3);
        }
    }

    #[test]
    fn sym_sssr_bicyclo_222_has_three_rings() {
        // three equivalent six-membered bridges, SSSR keeps two
        let m = mol("C1CC2CCC1CC2");
        assert_eq!(RingInfo::sssr(&m).num_rings(), 2);
        let ri = RingInfo::symmetrized_sssr(&m);
        assert_eq!(sizes(&ri), vec![6, 6, 6]);
    }

    #[test]
    fn sym_sssr_norbornane_keeps_two() {
        let ri = RingInfo::symmetrized_sssr(&mol("C1CC2CC1CC2"));
        assert_eq!(sizes(&ri), vec![5, 5]);
    }

    #[test]
    fn sym_sssr_superset_of_sssr() {
        let m = mol("C12C3C4C1C5C3C4C25");
        let sssr = RingInfo::sssr(&m);
        let sym = RingInfo::symmetrized_sssr(&m);
        for ring in sssr.atom_rings() {
            assert!(sym.atom_rings().contains(ring));
        }
    }

    #[test]
    fn perception_is_idempotent() {
        let m = mol("C1CC2CC3CCCC3CC2C1");
        assert_eq!(RingInfo::sssr(&m), RingInfo::sssr(&m));
        assert_eq!(
            RingInfo::symmetrized_sssr(&m),
            RingInfo::symmetrized_sssr(&m)
        );
    }

    #[test]
    fn ring_size_queries() {
        let m = mol("C1CC1C1CCCC1");
        let ri = RingInfo::sssr(&m);
        assert_eq!(ri.min_atom_ring_size(n(0)), Some(3));
        assert!(ri.is_atom_in_ring_of_size(n(4), 5));
        assert!(!ri.is_atom_in_ring_of_size(n(4), 3));
    }

    #[test]
    fn long_chain_with_pendant_rings_matches_one_unit() {
        let unit = RingInfo::sssr(&mol("CC(c1ccccc1)"));
        let chain = mol(&"CC(c1ccccc1)".repeat(30));
        let ri = RingInfo::sssr(&chain);
        assert_eq!(ri.num_rings(), 30);
        for (i, ring) in ri.atom_rings().iter().enumerate() {
            let shifted: Vec<NodeIndex> = unit.atom_rings()[0]
                .iter()
                .map(|a| n(a.index() + 8 * i))
                .collect();
            assert_eq!(ring, &shifted, "ring {i}");
        }
        assert_eq!(RingInfo::symmetrized_sssr(&chain), ri);
    }

    #[test]
    fn large_macrocycle_is_one_ring() {
        let smiles = format!("C1{}C1", "C(C)".repeat(400));
        let m = mol(&smiles);
        let ri = RingInfo::sssr(&m);
        assert_eq!(ri.num_rings(), 1);
        assert_eq!(ri.atom_rings()[0].len(), 402);
        assert_eq!(ri.bond_rings()[0].len(), 402);
        assert!(!ri.is_ring_atom(n(2)));
    }

    #[test]
    fn bridges_between_ring_systems_are_not_cyclic() {
        let m = mol("C1CC1CCC1CC1");
        let cyclic = cyclic_bonds(&m);
        let bridges = m.bonds().filter(|e| !cyclic[e.index()]).count();
        assert_eq!(bridges, 3);
        assert_eq!(ring_systems(&m).len(), 2);
        assert_eq!(sizes(&RingInfo::sssr(&m)), vec![3, 3]);
    }

    #[test]
    fn fused_system_on_chain() {
        let m = mol("CCCCc1ccc2ccccc2c1CCCC");
        assert_eq!(ring_systems(&m).len(), 1);
        assert_eq!(sizes(&RingInfo::sssr(&m)), vec![6, 6]);
        assert_eq!(sizes(&RingInfo::symmetrized_sssr(&m)), vec![6, 6]);
    }

    #[test]
    fn normalize_starts_low_and_walks_low() {
        let r = normalize_ring(&[n(5), n(2), n(9), n(3)]);
        assert_eq!(r, vec![n(2), n(5), n(3), n(9)]);
    }
}
