use std::borrow::Cow;

use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use tracing::{debug, warn};

use crate::atom::{Atom, Hybridization};
use crate::bond::{Bond, BondStereo};
use crate::cache::{CacheFlags, PropertyCache, ReadMode};
use crate::conformer::Conformer;
use crate::error::{Result, StructuralError};
use crate::groups::{StereoGroup, SubstanceGroup};
use crate::props::PropertyBag;
use crate::rings::RingInfo;
use crate::valence;

/// A molecular graph.
///
/// Atoms and bonds are stored in insertion order and addressed by dense
/// `NodeIndex` / `EdgeIndex` values. Removing anything renumbers everything
/// after it; indices held across a removal are invalid afterwards.
///
/// Derived values (valence, rings, hybridization, conjugation) live in a
/// [`PropertyCache`] and are invalidated by every mutation.
///
/// # Examples
///
/// ```
/// use molkit::{Atom, Bond, Mol};
///
/// let mut mol = Mol::new();
/// let c = mol.add_atom(Atom::new(6));
/// let o = mol.add_atom(Atom::new(8));
/// mol.add_bond(c, o, Bond::double()).unwrap();
/// assert!(mol.bond_between(o, c).is_some());
/// mol.update_property_cache(true).unwrap();
/// assert_eq!(mol.implicit_h_count(c, Default::default()).unwrap(), 2);
/// ```
#[derive(Clone, Default)]
pub struct Mol {
    graph: UnGraph<Atom, Bond>,
    conformers: Vec<Conformer>,
    stereo_groups: Vec<StereoGroup>,
    substance_groups: Vec<SubstanceGroup>,
    props: PropertyBag,
    cache: PropertyCache,
}

impl Mol {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn graph(&self) -> &UnGraph<Atom, Bond> {
        &self.graph
    }

    pub fn atom(&self, idx: NodeIndex) -> &Atom {
        &self.graph[idx]
    }

    pub fn bond(&self, idx: EdgeIndex) -> &Bond {
        &self.graph[idx]
    }

    pub fn try_atom(&self, idx: NodeIndex) -> Result<&Atom, StructuralError> {
        self.graph
            .node_weight(idx)
            .ok_or(StructuralError::InvalidAtomIndex(idx.index()))
    }

    pub fn try_bond(&self, idx: EdgeIndex) -> Result<&Bond, StructuralError> {
        self.graph
            .edge_weight(idx)
            .ok_or(StructuralError::InvalidBondIndex(idx.index()))
    }

    /// Mutable access to an atom. Marks valence, hybridization and
    /// conjugation stale.
    pub fn atom_mut(&mut self, idx: NodeIndex) -> &mut Atom {
        self.cache.mark_stale(CacheFlags::ELEMENT_EDIT);
        &mut self.graph[idx]
    }

    pub fn bond_mut(&mut self, idx: EdgeIndex) -> &mut Bond {
        self.cache.mark_stale(CacheFlags::ELEMENT_EDIT);
        &mut self.graph[idx]
    }

    /// Field edits made by perception stages that keep the cache coherent
    /// themselves.
    pub(crate) fn atom_mut_raw(&mut self, idx: NodeIndex) -> &mut Atom {
        &mut self.graph[idx]
    }

    pub(crate) fn bond_mut_raw(&mut self, idx: EdgeIndex) -> &mut Bond {
        &mut self.graph[idx]
    }

    fn check_atom(&self, idx: NodeIndex) -> Result<(), StructuralError> {
        if idx.index() < self.atom_count() {
            Ok(())
        } else {
            Err(StructuralError::InvalidAtomIndex(idx.index()))
        }
    }

    fn check_bond(&self, idx: EdgeIndex) -> Result<(), StructuralError> {
        if idx.index() < self.bond_count() {
            Ok(())
        } else {
            Err(StructuralError::InvalidBondIndex(idx.index()))
        }
    }

    /// Appends an atom. Every conformer gains a zero position for it.
    pub fn add_atom(&mut self, atom: Atom) -> NodeIndex {
        for conf in &mut self.conformers {
            conf.positions.push([0.0; 3]);
        }
        self.cache.mark_stale(CacheFlags::all());
        self.graph.add_node(atom)
    }

    /// Adds a bond from `begin` to `end`. Self-bonds and a second bond
    /// between the same pair are rejected.
    pub fn add_bond(
        &mut self,
        begin: NodeIndex,
        end: NodeIndex,
        bond: Bond,
    ) -> Result<EdgeIndex, StructuralError> {
        self.check_atom(begin)?;
        self.check_atom(end)?;
        if begin == end {
            return Err(StructuralError::SelfBond(begin.index()));
        }
        if self.graph.find_edge(begin, end).is_some() {
            return Err(StructuralError::DuplicateBond(begin.index(), end.index()));
        }
        self.cache.mark_stale(CacheFlags::all());
        Ok(self.graph.add_edge(begin, end, bond))
    }

    /// Removes an atom and its bonds; later atoms and bonds shift down.
    pub fn remove_atom(&mut self, idx: NodeIndex) -> Result<(), StructuralError> {
        self.check_atom(idx)?;
        let mut atoms = vec![false; self.atom_count()];
        atoms[idx.index()] = true;
        self.remove_marked(&atoms, &vec![false; self.bond_count()]);
        Ok(())
    }

    pub fn remove_bond(&mut self, idx: EdgeIndex) -> Result<(), StructuralError> {
        self.check_bond(idx)?;
        let mut bonds = vec![false; self.bond_count()];
        bonds[idx.index()] = true;
        self.remove_marked(&vec![false; self.atom_count()], &bonds);
        Ok(())
    }

    pub fn remove_bond_between(&mut self, a: NodeIndex, b: NodeIndex) -> Result<(), StructuralError> {
        let e = self
            .bond_between(a, b)
            .ok_or(StructuralError::NoSuchBond(a.index(), b.index()))?;
        self.remove_bond(e)
    }

    /// Rebuilds the graph without the marked atoms and bonds (and without
    /// bonds touching a marked atom), keeping insertion order, then remaps
    /// everything that refers to indices.
    pub(crate) fn remove_marked(&mut self, drop_atoms: &[bool], drop_bonds: &[bool]) {
        let mut atom_map = Vec::with_capacity(drop_atoms.len());
        let mut next = 0;
        for &dropped in drop_atoms {
            if dropped {
                atom_map.push(None);
            } else {
                atom_map.push(Some(next));
                next += 1;
            }
        }
        let mut bond_map = Vec::with_capacity(drop_bonds.len());
        let mut next = 0;
        for e in self.graph.edge_references() {
            let keep = !drop_bonds[e.id().index()]
                && atom_map[e.source().index()].is_some()
                && atom_map[e.target().index()].is_some();
            if keep {
                bond_map.push(Some(next));
                next += 1;
            } else {
                bond_map.push(None);
            }
        }

        let mut graph = self.graph.filter_map(
            |n, atom| atom_map[n.index()].map(|_| atom.clone()),
            |e, bond| bond_map[e.index()].map(|_| bond.clone()),
        );
        for bond in graph.edge_weights_mut() {
            let Some((sa, sb)) = bond.stereo_atoms else {
                continue;
            };
            match (atom_map[sa.index()], atom_map[sb.index()]) {
                (Some(a), Some(b)) => {
                    bond.stereo_atoms = Some((NodeIndex::new(a), NodeIndex::new(b)));
                }
                _ => {
                    warn!("double-bond stereo lost its reference atom");
                    bond.stereo_atoms = None;
                    bond.stereo = BondStereo::None;
                }
            }
        }
        self.graph = graph;

        for conf in &mut self.conformers {
            conf.retain_rows(&drop_atoms.iter().map(|d| !d).collect::<Vec<_>>());
        }
        self.stereo_groups.retain_mut(|g| g.remap(&atom_map));
        let before = self.substance_groups.len();
        self.substance_groups
            .retain_mut(|g| g.remap(&atom_map, &bond_map));
        if self.substance_groups.len() != before {
            debug!(
                dropped = before - self.substance_groups.len(),
                "substance groups invalidated by removal"
            );
        }
        self.cache.reset();
    }

    /// Replaces an atom in place. With `preserve_props` the old atom's user
    /// properties are kept on top of the new ones.
    pub fn replace_atom(
        &mut self,
        idx: NodeIndex,
        atom: Atom,
        preserve_props: bool,
    ) -> Result<(), StructuralError> {
        self.check_atom(idx)?;
        let slot = self.atom_mut(idx);
        if preserve_props {
            slot.replace_preserving_props(atom);
        } else {
            *slot = atom;
        }
        Ok(())
    }

    pub fn replace_bond(
        &mut self,
        idx: EdgeIndex,
        bond: Bond,
        preserve_props: bool,
    ) -> Result<(), StructuralError> {
        self.check_bond(idx)?;
        let slot = self.bond_mut(idx);
        if preserve_props {
            slot.replace_preserving_props(bond);
        } else {
            *slot = bond;
        }
        Ok(())
    }

    pub fn atom_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn bond_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn heavy_atom_count(&self) -> usize {
        self.graph
            .node_weights()
            .filter(|a| a.atomic_num > 1)
            .count()
    }

    pub fn atoms(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices()
    }

    pub fn bonds(&self) -> impl Iterator<Item = EdgeIndex> + '_ {
        self.graph.edge_indices()
    }

    pub fn neighbors(&self, idx: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.neighbors(idx)
    }

    pub fn bonds_of(&self, idx: NodeIndex) -> impl Iterator<Item = EdgeIndex> + '_ {
        self.graph.edges(idx).map(|e| e.id())
    }

    /// Bonds of `idx` in ascending bond-index order.
    pub fn sorted_bonds_of(&self, idx: NodeIndex) -> Vec<EdgeIndex> {
        let mut bonds: Vec<EdgeIndex> = self.bonds_of(idx).collect();
        bonds.sort_unstable();
        bonds
    }

    pub fn degree(&self, idx: NodeIndex) -> usize {
        self.graph.edges(idx).count()
    }

    /// The bond joining `a` and `b`, in either direction.
    pub fn bond_between(&self, a: NodeIndex, b: NodeIndex) -> Option<EdgeIndex> {
        self.graph.find_edge(a, b)
    }

    /// `(begin, end)` atoms of a bond. Panics on an invalid index, like
    /// [`Mol::bond`].
    pub fn bond_atoms(&self, idx: EdgeIndex) -> (NodeIndex, NodeIndex) {
        let e = &self.graph.raw_edges()[idx.index()];
        (e.source(), e.target())
    }

    pub fn bond_endpoints(&self, idx: EdgeIndex) -> Option<(NodeIndex, NodeIndex)> {
        self.graph.edge_endpoints(idx)
    }

    pub fn begin_atom(&self, idx: EdgeIndex) -> NodeIndex {
        self.bond_atoms(idx).0
    }

    pub fn end_atom(&self, idx: EdgeIndex) -> NodeIndex {
        self.bond_atoms(idx).1
    }

    pub fn other_atom(&self, bond: EdgeIndex, atom: NodeIndex) -> NodeIndex {
        let (a, b) = self.bond_atoms(bond);
        if a == atom {
            b
        } else {
            a
        }
    }

    pub fn props(&self) -> &PropertyBag {
        &self.props
    }

    pub fn props_mut(&mut self) -> &mut PropertyBag {
        &mut self.props
    }

    pub fn cache(&self) -> &PropertyCache {
        &self.cache
    }

    pub(crate) fn cache_mut(&mut self) -> &mut PropertyCache {
        &mut self.cache
    }

    /// Recomputes explicit valences and implicit hydrogen counts. In strict
    /// mode the first valence violation is an error and the cache stays stale.
    pub fn update_property_cache(&mut self, strict: bool) -> Result<()> {
        let (explicit, implicit) = if strict {
            valence::checked_valences(self)?
        } else {
            valence::valences(self)
        };
        self.cache.set_valences(explicit, implicit);
        Ok(())
    }

    /// Non-strict [`update_property_cache`](Self::update_property_cache):
    /// valences are stored even when some atom is over-bonded.
    pub fn fill_property_cache(&mut self) {
        let (explicit, implicit) = valence::valences(self);
        self.cache.set_valences(explicit, implicit);
    }

    /// Runs symmetrized SSSR perception and stores the result.
    pub fn perceive_rings(&mut self) -> &RingInfo {
        let info = RingInfo::symmetrized_sssr(self);
        self.cache.set_ring_info(info);
        &self.cache.ring_info
    }

    pub fn explicit_valence(&self, idx: NodeIndex, mode: ReadMode) -> Result<u8> {
        self.cache.explicit_valence(idx, mode)
    }

    pub fn implicit_h_count(&self, idx: NodeIndex, mode: ReadMode) -> Result<u8> {
        self.cache.implicit_h(idx, mode)
    }

    /// Hydrogens on the atom itself plus hydrogen neighbours in the graph.
    pub fn total_h_count(&self, idx: NodeIndex, mode: ReadMode) -> Result<u8> {
        let implicit = self.cache.implicit_h(idx, mode)?;
        let neighbours = self
            .neighbors(idx)
            .filter(|&nb| self.atom(nb).atomic_num == 1)
            .count() as u8;
        Ok(self.atom(idx).explicit_h_count + implicit + neighbours)
    }

    /// Degree counting every hydrogen, in the graph or not.
    pub fn total_degree(&self, idx: NodeIndex, mode: ReadMode) -> Result<u8> {
        let implicit = self.cache.implicit_h(idx, mode)?;
        Ok(self.degree(idx) as u8 + self.atom(idx).explicit_h_count + implicit)
    }

    pub fn hybridization(&self, idx: NodeIndex, mode: ReadMode) -> Result<Hybridization> {
        self.cache.hybridization(idx, mode)
    }

    pub fn is_conjugated(&self, idx: EdgeIndex, mode: ReadMode) -> Result<bool> {
        self.cache.check_conjugation(mode)?;
        Ok(self.bond(idx).is_conjugated)
    }

    pub fn ring_info(&self, mode: ReadMode) -> Result<&RingInfo> {
        self.cache.ring_info(mode)
    }

    /// Cached ring info when it is current, otherwise a freshly computed SSSR.
    pub fn ring_info_or_sssr(&self) -> Cow<'_, RingInfo> {
        if self.cache.is_stale(CacheFlags::RINGS) {
            Cow::Owned(RingInfo::sssr(self))
        } else {
            Cow::Borrowed(&self.cache.ring_info)
        }
    }

    pub fn conformers(&self) -> &[Conformer] {
        &self.conformers
    }

    pub fn conformer(&self, id: u32) -> Result<&Conformer, StructuralError> {
        self.conformers
            .iter()
            .find(|c| c.id == id)
            .ok_or(StructuralError::NoSuchConformer(id))
    }

    pub fn conformer_mut(&mut self, id: u32) -> Result<&mut Conformer, StructuralError> {
        self.conformers
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(StructuralError::NoSuchConformer(id))
    }

    /// Adds a conformer, replacing one with the same id. With `assign_id`
    /// the conformer gets the next free id. Returns the id used.
    pub fn add_conformer(
        &mut self,
        mut conf: Conformer,
        assign_id: bool,
    ) -> Result<u32, StructuralError> {
        if conf.num_atoms() != self.atom_count() {
            return Err(StructuralError::ConformerSize {
                expected: self.atom_count(),
                got: conf.num_atoms(),
            });
        }
        if assign_id {
            conf.id = self.conformers.iter().map(|c| c.id + 1).max().unwrap_or(0);
        }
        let id = conf.id;
        match self.conformers.iter_mut().find(|c| c.id == id) {
            Some(slot) => *slot = conf,
            None => self.conformers.push(conf),
        }
        Ok(id)
    }

    pub fn remove_conformer(&mut self, id: u32) -> Result<Conformer, StructuralError> {
        let pos = self
            .conformers
            .iter()
            .position(|c| c.id == id)
            .ok_or(StructuralError::NoSuchConformer(id))?;
        Ok(self.conformers.remove(pos))
    }

    pub fn clear_conformers(&mut self) {
        self.conformers.clear();
    }

    pub fn stereo_groups(&self) -> &[StereoGroup] {
        &self.stereo_groups
    }

    pub fn add_stereo_group(&mut self, group: StereoGroup) -> Result<(), StructuralError> {
        for a in &group.atoms {
            self.check_atom(*a)?;
        }
        self.stereo_groups.push(group);
        Ok(())
    }

    pub fn clear_stereo_groups(&mut self) {
        self.stereo_groups.clear();
    }

    pub fn substance_groups(&self) -> &[SubstanceGroup] {
        &self.substance_groups
    }

    pub fn add_substance_group(&mut self, group: SubstanceGroup) -> Result<(), StructuralError> {
        if !group.references_are_valid(self.atom_count(), self.bond_count()) {
            return Err(StructuralError::Reference(format!(
                "substance group {:?} refers to a missing atom or bond",
                group.group_type
            )));
        }
        self.substance_groups.push(group);
        Ok(())
    }

    pub fn clear_substance_groups(&mut self) {
        self.substance_groups.clear();
    }

    /// Returns a copy whose atom `i` is atom `new_order[i]` of `self`.
    /// Bonds keep their order and direction; every index-based reference is
    /// remapped.
    pub fn renumber_atoms(&self, new_order: &[usize]) -> Result<Mol, StructuralError> {
        let n = self.atom_count();
        let mut old_to_new = vec![None; n];
        if new_order.len() != n {
            return Err(StructuralError::InvalidPermutation(n));
        }
        for (new, &old) in new_order.iter().enumerate() {
            if old >= n || old_to_new[old].is_some() {
                return Err(StructuralError::InvalidPermutation(n));
            }
            old_to_new[old] = Some(new);
        }
        let map = |a: NodeIndex| NodeIndex::new(old_to_new[a.index()].unwrap_or(0));

        let mut graph = UnGraph::with_capacity(n, self.bond_count());
        for &old in new_order {
            graph.add_node(self.graph[NodeIndex::new(old)].clone());
        }
        for e in self.graph.edge_references() {
            let mut bond = e.weight().clone();
            bond.stereo_atoms = bond.stereo_atoms.map(|(a, b)| (map(a), map(b)));
            graph.add_edge(map(e.source()), map(e.target()), bond);
        }
        let identity: Vec<Option<usize>> = (0..self.bond_count()).map(Some).collect();
        let mut stereo_groups = self.stereo_groups.clone();
        stereo_groups.retain_mut(|g| g.remap(&old_to_new));
        let mut substance_groups = self.substance_groups.clone();
        substance_groups.retain_mut(|g| g.remap(&old_to_new, &identity));

        Ok(Mol {
            graph,
            conformers: self
                .conformers
                .iter()
                .map(|c| c.permuted(new_order))
                .collect(),
            stereo_groups,
            substance_groups,
            props: self.props.clone(),
            cache: PropertyCache::default(),
        })
    }

    /// Starts a batch of removals that is applied in one rebuild on
    /// [`BatchEdit::commit`] and discarded if the guard is dropped first.
    pub fn batch_edit(&mut self) -> BatchEdit<'_> {
        BatchEdit {
            atoms: vec![false; self.atom_count()],
            bonds: vec![false; self.bond_count()],
            mol: self,
            committed: false,
        }
    }

    /// Runs `f` inside a batch edit, committing on `Ok` and rolling back on
    /// `Err`.
    pub fn with_batch_edit<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut BatchEdit<'_>) -> Result<T>,
    {
        let mut batch = self.batch_edit();
        let out = f(&mut batch)?;
        batch.commit();
        Ok(out)
    }
}

/// Guard returned by [`Mol::batch_edit`].
pub struct BatchEdit<'a> {
    mol: &'a mut Mol,
    atoms: Vec<bool>,
    bonds: Vec<bool>,
    committed: bool,
}

impl BatchEdit<'_> {
    /// The molecule as it was when the batch started.
    pub fn mol(&self) -> &Mol {
        self.mol
    }

    pub fn remove_atom(&mut self, idx: NodeIndex) -> Result<(), StructuralError> {
        self.mol.check_atom(idx)?;
        self.atoms[idx.index()] = true;
        Ok(())
    }

    pub fn remove_bond(&mut self, idx: EdgeIndex) -> Result<(), StructuralError> {
        self.mol.check_bond(idx)?;
        self.bonds[idx.index()] = true;
        Ok(())
    }

    pub fn remove_bond_between(&mut self, a: NodeIndex, b: NodeIndex) -> Result<(), StructuralError> {
        let e = self
            .mol
            .bond_between(a, b)
            .ok_or(StructuralError::NoSuchBond(a.index(), b.index()))?;
        self.remove_bond(e)
    }

    pub fn pending(&self) -> usize {
        self.atoms.iter().chain(&self.bonds).filter(|&&x| x).count()
    }

    pub fn commit(mut self) {
        if self.pending() > 0 {
            self.mol.remove_marked(&self.atoms, &self.bonds);
        }
        self.committed = true;
    }
}

impl Drop for BatchEdit<'_> {
    fn drop(&mut self) {
        if !self.committed && self.pending() > 0 {
            debug!(pending = self.pending(), "batch edit rolled back");
        }
    }
}

impl PartialEq for Mol {
    fn eq(&self, other: &Self) -> bool {
        if self.atom_count() != other.atom_count() || self.bond_count() != other.bond_count() {
            return false;
        }
        let atoms_eq = self
            .graph
            .node_weights()
            .zip(other.graph.node_weights())
            .all(|(a, b)| a == b);
        let bonds_eq = self
            .graph
            .edge_references()
            .zip(other.graph.edge_references())
            .all(|(a, b)| {
                a.source() == b.source() && a.target() == b.target() && a.weight() == b.weight()
            });
        atoms_eq
            && bonds_eq
            && self.conformers == other.conformers
            && self.stereo_groups == other.stereo_groups
            && self.substance_groups == other.substance_groups
            && self.props == other.props
    }
}

impl std::fmt::Debug for Mol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mol")
            .field("atom_count", &self.atom_count())
            .field("bond_count", &self.bond_count())
            .field("conformers", &self.conformers.len())
            .field("stale", &self.cache.stale_flags())
            .finish()
    }
}

/// True when `to` is an even permutation of `from`. Both slices must hold
/// the same distinct elements.
pub(crate) fn permutation_parity<T: Eq>(from: &[T], to: &[T]) -> bool {
    let n = from.len();
    if n != to.len() {
        return true;
    }
    let perm: Vec<usize> = from
        .iter()
        .map(|f| to.iter().position(|t| t == f).unwrap_or(0))
        .collect();
    let mut visited = vec![false; n];
    let mut swaps = 0usize;
    for i in 0..n {
        if visited[i] {
            continue;
        }
        let mut cycle_len = 0;
        let mut j = i;
        while !visited[j] {
            visited[j] = true;
            j = perm[j];
            cycle_len += 1;
        }
        swaps += cycle_len - 1;
    }
    swaps % 2 == 0
}
