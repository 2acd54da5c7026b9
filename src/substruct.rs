//! Substructure search.
//!
//! A backtracking search maps query atoms onto target atoms one at a time,
//! visiting query atoms so that each new atom is bonded to one already
//! mapped whenever possible; candidates for such an atom come only from the
//! neighbours of its mapped partner. No match is an empty result, never an
//! error.

use std::collections::HashMap;

use petgraph::graph::NodeIndex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::Result;
use crate::graph_ops::fragment_ids;
use crate::mol::{permutation_parity, Mol};
use crate::query::{atom_matches, bond_matches, AtomExpr, MatchContext};
use crate::stereo::{stereo_neighbors, StereoNbr};

/// `(query atom, target atom)` pairs in query atom order.
pub type AtomMapping = Vec<(NodeIndex, NodeIndex)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubstructMatchParams {
    /// Reject mappings that invert a specified tetrahedral centre.
    pub use_chirality: bool,
    /// Report one mapping per distinct set of target atoms.
    pub uniquify: bool,
    /// Stop after this many mappings; `0` means no limit.
    pub max_matches: usize,
    /// Evaluate recursive (`$(...)`) predicates. When off they never match.
    pub recursion_possible: bool,
}

impl Default for SubstructMatchParams {
    fn default() -> Self {
        Self {
            use_chirality: false,
            uniquify: true,
            max_matches: 1000,
            recursion_possible: true,
        }
    }
}

pub fn has_substruct_match(target: &Mol, query: &Mol, params: &SubstructMatchParams) -> bool {
    get_substruct_match(target, query, params).is_some()
}

pub fn get_substruct_match(
    target: &Mol,
    query: &Mol,
    params: &SubstructMatchParams,
) -> Option<AtomMapping> {
    let params = SubstructMatchParams {
        max_matches: 1,
        uniquify: false,
        ..*params
    };
    get_substruct_matches(target, query, &params).into_iter().next()
}

pub fn get_substruct_matches(
    target: &Mol,
    query: &Mol,
    params: &SubstructMatchParams,
) -> Vec<AtomMapping> {
    let ctx = prepare_context(target, query, params);
    Search::new(&ctx, query, params, None).run()
}

/// Like [`get_substruct_matches`], polling `should_stop` between search
/// steps. Mappings found before the stop are returned.
pub fn get_substruct_matches_with_stop(
    target: &Mol,
    query: &Mol,
    params: &SubstructMatchParams,
    should_stop: &dyn Fn() -> bool,
) -> Vec<AtomMapping> {
    let ctx = prepare_context(target, query, params);
    Search::new(&ctx, query, params, Some(should_stop)).run()
}

/// One query against many targets, searched in parallel. Results are in
/// target order.
pub fn get_substruct_matches_many(
    targets: &[Mol],
    query: &Mol,
    params: &SubstructMatchParams,
) -> Vec<Vec<AtomMapping>> {
    targets
        .par_iter()
        .map(|target| get_substruct_matches(target, query, params))
        .collect()
}

/// Many queries against one target, searched in parallel. Results are in
/// query order.
pub fn get_matches_for_queries(
    target: &Mol,
    queries: &[Mol],
    params: &SubstructMatchParams,
) -> Vec<Vec<AtomMapping>> {
    queries
        .par_iter()
        .map(|query| get_substruct_matches(target, query, params))
        .collect()
}

/// Copy of `mol` without the atoms of any match of `query`. With
/// `only_frags`, a match is removed only when it covers a whole fragment.
pub fn delete_substructs(mol: &Mol, query: &Mol, only_frags: bool) -> Result<Mol> {
    let params = SubstructMatchParams {
        max_matches: 0,
        ..SubstructMatchParams::default()
    };
    let matches = get_substruct_matches(mol, query, &params);
    let mut out = mol.clone();
    if matches.is_empty() {
        return Ok(out);
    }
    let frag_ids = fragment_ids(mol);
    let mut frag_sizes: HashMap<usize, usize> = HashMap::new();
    for &id in &frag_ids {
        *frag_sizes.entry(id).or_default() += 1;
    }
    out.with_batch_edit(|batch| {
        for mapping in &matches {
            if only_frags {
                let frag = frag_ids[mapping[0].1.index()];
                let whole = mapping.len() == frag_sizes[&frag]
                    && mapping.iter().all(|&(_, t)| frag_ids[t.index()] == frag);
                if !whole {
                    continue;
                }
            }
            for &(_, t) in mapping {
                batch.remove_atom(t)?;
            }
        }
        Ok(())
    })?;
    Ok(out)
}

/// Builds the target context and evaluates every recursive predicate of the
/// query, innermost first, so atom predicates can look the results up.
fn prepare_context<'a>(target: &'a Mol, query: &Mol, params: &SubstructMatchParams) -> MatchContext<'a> {
    let mut ctx = MatchContext::new(target);
    if params.recursion_possible {
        for atom in query.atoms() {
            if let Some(expr) = &query.atom(atom).query {
                evaluate_recursive(&mut ctx, expr);
            }
        }
    }
    ctx
}

fn evaluate_recursive(ctx: &mut MatchContext<'_>, expr: &AtomExpr) {
    let mut inner = Vec::new();
    expr.for_each_recursive(&mut |q| inner.push(q));
    for sub in inner {
        if ctx.has_recursive(sub) {
            continue;
        }
        for a in sub.atoms() {
            if let Some(nested) = &sub.atom(a).query {
                evaluate_recursive(ctx, nested);
            }
        }
        let hits = rooted_hits(ctx, sub);
        ctx.set_recursive(sub, hits);
    }
}

/// For every target atom, whether `sub` matches with its first atom there.
fn rooted_hits(ctx: &MatchContext<'_>, sub: &Mol) -> Vec<bool> {
    let n = ctx.mol.atom_count();
    if sub.atom_count() == 0 {
        return vec![false; n];
    }
    let params = SubstructMatchParams {
        max_matches: 1,
        uniquify: false,
        ..SubstructMatchParams::default()
    };
    let root = NodeIndex::new(0);
    (0..n)
        .map(|t| {
            let mut search = Search::new(ctx, sub, &params, None);
            search.pin(root, NodeIndex::new(t));
            !search.run().is_empty()
        })
        .collect()
}

struct Search<'a, 'c> {
    ctx: &'a MatchContext<'c>,
    query: &'a Mol,
    params: &'a SubstructMatchParams,
    should_stop: Option<&'a dyn Fn() -> bool>,
    /// Query atoms in visiting order, each with the already-ordered
    /// neighbour it hangs off (if any).
    order: Vec<(NodeIndex, Option<NodeIndex>)>,
    query_map: Vec<Option<NodeIndex>>,
    target_used: Vec<bool>,
    pinned: Option<(NodeIndex, NodeIndex)>,
    results: Vec<AtomMapping>,
    seen: HashMap<Vec<usize>, usize>,
    stopped: bool,
}

impl<'a, 'c> Search<'a, 'c> {
    fn new(
        ctx: &'a MatchContext<'c>,
        query: &'a Mol,
        params: &'a SubstructMatchParams,
        should_stop: Option<&'a dyn Fn() -> bool>,
    ) -> Self {
        Self {
            ctx,
            query,
            params,
            should_stop,
            order: visit_order(query, None),
            query_map: vec![None; query.atom_count()],
            target_used: vec![false; ctx.mol.atom_count()],
            pinned: None,
            results: Vec::new(),
            seen: HashMap::new(),
            stopped: false,
        }
    }

    /// Forces query atom `q` onto target atom `t`.
    fn pin(&mut self, q: NodeIndex, t: NodeIndex) {
        self.order = visit_order(self.query, Some(q));
        self.pinned = Some((q, t));
    }

    fn run(mut self) -> Vec<AtomMapping> {
        let q_atoms = self.query.atom_count();
        if q_atoms == 0 || q_atoms > self.ctx.mol.atom_count() {
            return Vec::new();
        }
        self.recurse(0);
        trace!(found = self.results.len(), "substructure search finished");
        self.results
    }

    fn full(&self) -> bool {
        self.params.max_matches > 0 && self.results.len() >= self.params.max_matches
    }

    fn recurse(&mut self, depth: usize) {
        if self.stopped || self.full() {
            return;
        }
        if let Some(stop) = self.should_stop {
            if stop() {
                self.stopped = true;
                return;
            }
        }
        if depth == self.order.len() {
            self.record();
            return;
        }

        let (q_node, anchor) = self.order[depth];
        let candidates: Vec<NodeIndex> = match (self.pinned, anchor) {
            (Some((pq, pt)), _) if pq == q_node => vec![pt],
            (_, Some(anchor)) => match self.query_map[anchor.index()] {
                Some(t_anchor) => {
                    let mut nbrs: Vec<NodeIndex> = self.ctx.mol.neighbors(t_anchor).collect();
                    nbrs.sort();
                    nbrs
                }
                None => self.ctx.mol.atoms().collect(),
            },
            (_, None) => self.ctx.mol.atoms().collect(),
        };

        for t_node in candidates {
            if self.target_used[t_node.index()] || !self.is_feasible(q_node, t_node) {
                continue;
            }
            self.query_map[q_node.index()] = Some(t_node);
            self.target_used[t_node.index()] = true;

            self.recurse(depth + 1);

            self.query_map[q_node.index()] = None;
            self.target_used[t_node.index()] = false;
            if self.stopped || self.full() {
                return;
            }
        }
    }

    fn is_feasible(&self, q_node: NodeIndex, t_node: NodeIndex) -> bool {
        let target = self.ctx.mol;
        if target.degree(t_node) < self.query.degree(q_node) {
            return false;
        }
        if !atom_matches(self.query.atom(q_node), self.ctx, t_node) {
            return false;
        }
        for q_edge in self.query.bonds_of(q_node) {
            let q_nb = self.query.other_atom(q_edge, q_node);
            let Some(t_nb) = self.query_map[q_nb.index()] else {
                continue;
            };
            match target.bond_between(t_node, t_nb) {
                Some(t_edge) => {
                    if !bond_matches(self.query.bond(q_edge), self.ctx, t_edge) {
                        return false;
                    }
                }
                None => return false,
            }
        }
        true
    }

    fn record(&mut self) {
        let mapping: AtomMapping = self
            .query
            .atoms()
            .filter_map(|q| self.query_map[q.index()].map(|t| (q, t)))
            .collect();
        if self.params.use_chirality && !chirality_holds(self.query, self.ctx.mol, &self.query_map) {
            return;
        }
        if !self.params.uniquify {
            self.results.push(mapping);
            return;
        }
        let mut key: Vec<usize> = mapping.iter().map(|&(_, t)| t.index()).collect();
        key.sort_unstable();
        match self.seen.get(&key) {
            Some(&slot) => {
                let better = mapping
                    .iter()
                    .map(|&(_, t)| t)
                    .lt(self.results[slot].iter().map(|&(_, t)| t));
                if better {
                    self.results[slot] = mapping;
                }
            }
            None => {
                self.seen.insert(key, self.results.len());
                self.results.push(mapping);
            }
        }
    }
}

/// Query atoms ordered so each one after the first of its component is
/// bonded to an earlier one. Components start at `root` if given, otherwise
/// at their most connected atom; ties go to the lower index.
fn visit_order(query: &Mol, root: Option<NodeIndex>) -> Vec<(NodeIndex, Option<NodeIndex>)> {
    let n = query.atom_count();
    let mut placed = vec![false; n];
    let mut order = Vec::with_capacity(n);
    let mut starts: Vec<NodeIndex> = query.atoms().collect();
    starts.sort_by_key(|&a| (std::cmp::Reverse(query.degree(a)), a.index()));
    if let Some(r) = root {
        starts.retain(|&a| a != r);
        starts.insert(0, r);
    }
    for start in starts {
        if placed[start.index()] {
            continue;
        }
        placed[start.index()] = true;
        order.push((start, None));
        let mut frontier = order.len() - 1;
        while frontier < order.len() {
            let (current, _) = order[frontier];
            let mut next: Vec<NodeIndex> = query
                .neighbors(current)
                .filter(|nb| !placed[nb.index()])
                .collect();
            next.sort_by_key(|&a| (std::cmp::Reverse(query.degree(a)), a.index()));
            for nb in next {
                if !placed[nb.index()] {
                    placed[nb.index()] = true;
                    order.push((nb, Some(current)));
                }
            }
            frontier += 1;
        }
    }
    order
}

/// Every tetrahedral query centre keeps its handedness on the target.
fn chirality_holds(query: &Mol, target: &Mol, query_map: &[Option<NodeIndex>]) -> bool {
    query.atoms().all(|q| {
        let q_tag = query.atom(q).chiral_tag;
        if !q_tag.is_tetrahedral() {
            return true;
        }
        let Some(t) = query_map[q.index()] else {
            return true;
        };
        let q_refs = stereo_neighbors(query, q);
        if q_refs.len() < 3 {
            return true;
        }
        let t_tag = target.atom(t).chiral_tag;
        if !t_tag.is_tetrahedral() {
            return false;
        }
        let t_refs = stereo_neighbors(target, t);
        let mut mapped: Vec<StereoNbr> = q_refs
            .iter()
            .map(|r| match r {
                StereoNbr::Hydrogen => StereoNbr::Hydrogen,
                StereoNbr::Atom(a) => query_map[a.index()].map_or(StereoNbr::Hydrogen, StereoNbr::Atom),
            })
            .collect();
        for r in &t_refs {
            if !mapped.contains(r) {
                mapped.push(*r);
            }
        }
        if mapped.len() != t_refs.len() || !mapped.iter().all(|r| t_refs.contains(r)) {
            return true;
        }
        (q_tag == t_tag) == permutation_parity(&mapped, &t_refs)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smarts::from_smarts;
    use crate::smiles::from_smiles;
    use std::cell::Cell;

    fn mol(smiles: &str) -> Mol {
        from_smiles(smiles).unwrap_or_else(|e| panic!("bad SMILES {smiles:?}: {e}"))
    }

    fn n(i: usize) -> NodeIndex {
        NodeIndex::new(i)
    }

    fn defaults() -> SubstructMatchParams {
        SubstructMatchParams::default()
    }

    fn all() -> SubstructMatchParams {
        SubstructMatchParams {
            uniquify: false,
            max_matches: 0,
            ..defaults()
        }
    }

    #[test]
    fn ethanol_contains_cc() {
        let target = mol("CCO");
        let query = mol("CC");
        assert!(has_substruct_match(&target, &query, &defaults()));
        let m = get_substruct_match(&target, &query, &defaults()).unwrap();
        assert_eq!(m.len(), 2);
    }

    #[test]
    fn methane_does_not_contain_cc() {
        let target = mol("C");
        let query = mol("CC");
        assert!(!has_substruct_match(&target, &query, &defaults()));
        assert_eq!(get_substruct_match(&target, &query, &defaults()), None);
        assert!(get_substruct_matches(&target, &query, &defaults()).is_empty());
    }

    #[test]
    fn uniquify_collapses_symmetric_mappings() {
        let target = mol("c1ccccc1");
        let query = mol("c1ccccc1");
        assert_eq!(get_substruct_matches(&target, &query, &all()).len(), 12);
        let unique = get_substruct_matches(&target, &query, &defaults());
        assert_eq!(unique.len(), 1);
        let targets: Vec<usize> = unique[0].iter().map(|&(_, t)| t.index()).collect();
        assert_eq!(targets, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn uniquify_keeps_lowest_tuple() {
        let target = mol("CCO");
        let query = mol("CC");
        let unique = get_substruct_matches(&target, &query, &defaults());
        assert_eq!(unique, vec![vec![(n(0), n(0)), (n(1), n(1))]]);
        assert_eq!(get_substruct_matches(&target, &query, &all()).len(), 2);
    }

    #[test]
    fn self_match_includes_identity() {
        for smiles in ["CC(=O)Nc1ccc(O)cc1", "C1CC2CCC1C2", "[Na+].[Cl-]"] {
            let m = mol(smiles);
            let matches = get_substruct_matches(&m, &m, &all());
            let identity: AtomMapping = m.atoms().map(|a| (a, a)).collect();
            assert!(matches.contains(&identity), "{smiles}");
        }
    }

    #[test]
    fn aromatic_query_needs_aromatic_target() {
        let query = mol("c1ccccc1");
        assert!(!has_substruct_match(&mol("C1CCCCC1"), &query, &defaults()));
        assert!(has_substruct_match(&mol("Cc1ccccc1"), &query, &defaults()));
    }

    #[test]
    fn bond_order_is_checked() {
        assert!(!has_substruct_match(&mol("CCC"), &mol("C=C"), &defaults()));
        assert!(has_substruct_match(&mol("CC=C"), &mol("C=C"), &defaults()));
    }

    #[test]
    fn smarts_halogen_on_chlorobenzene() {
        let target = mol("c1ccccc1Cl");
        let query = from_smarts("[Cl,Br,I]").unwrap();
        let matches = get_substruct_matches(&target, &query, &defaults());
        assert_eq!(matches, vec![vec![(n(0), n(6))]]);
    }

    #[test]
    fn recursive_predicate() {
        let query = from_smarts("[$(CO)]").unwrap();
        let matches = get_substruct_matches(&mol("CCO"), &query, &defaults());
        assert_eq!(matches, vec![vec![(n(0), n(1))]]);
        let off = SubstructMatchParams {
            recursion_possible: false,
            ..defaults()
        };
        assert!(!has_substruct_match(&mol("CCO"), &query, &off));
    }

    #[test]
    fn nested_recursive_predicate() {
        let query = from_smarts("[$(C[$([OH]),$([NH2])])]").unwrap();
        assert!(has_substruct_match(&mol("CCO"), &query, &defaults()));
        assert!(has_substruct_match(&mol("CCN"), &query, &defaults()));
        assert!(!has_substruct_match(&mol("CCOC"), &query, &defaults()));
    }

    #[test]
    fn chirality_aware_matching() {
        let target = mol("N[C@@H](C)C(=O)O");
        let same = mol("N[C@@H](C)C(=O)O");
        let mirror = mol("N[C@H](C)C(=O)O");
        let chiral = SubstructMatchParams {
            use_chirality: true,
            ..defaults()
        };
        assert!(has_substruct_match(&target, &same, &chiral));
        assert!(!has_substruct_match(&target, &mirror, &chiral));
        assert!(has_substruct_match(&target, &mirror, &defaults()));
    }

    #[test]
    fn chirality_survives_reordered_query() {
        let target = mol("N[C@@H](C)C(=O)O");
        let reordered = mol("C[C@H](N)C(=O)O");
        let chiral = SubstructMatchParams {
            use_chirality: true,
            ..defaults()
        };
        assert!(has_substruct_match(&target, &reordered, &chiral));
    }

    #[test]
    fn chiral_query_rejects_unspecified_target() {
        let chiral = SubstructMatchParams {
            use_chirality: true,
            ..defaults()
        };
        assert!(!has_substruct_match(
            &mol("NC(C)C(=O)O"),
            &mol("N[C@@H](C)C(=O)O"),
            &chiral
        ));
    }

    #[test]
    fn max_matches_caps_results() {
        let params = SubstructMatchParams {
            max_matches: 2,
            uniquify: false,
            ..defaults()
        };
        assert_eq!(get_substruct_matches(&mol("CCCCC"), &mol("C"), &params).len(), 2);
    }

    #[test]
    fn should_stop_ends_search() {
        let calls = Cell::new(0);
        let stop = || {
            calls.set(calls.get() + 1);
            calls.get() > 3
        };
        let found = get_substruct_matches_with_stop(&mol("CCCCCCCC"), &mol("CC"), &all(), &stop);
        assert!(found.len() < 14);
        let never = || false;
        let all_found = get_substruct_matches_with_stop(&mol("CCCCCCCC"), &mol("CC"), &all(), &never);
        assert_eq!(all_found.len(), 14);
    }

    #[test]
    fn parallel_many_targets_preserves_order() {
        let targets = vec![mol("CCO"), mol("CC"), mol("OCCO")];
        let query = mol("O");
        let counts: Vec<usize> = get_substruct_matches_many(&targets, &query, &defaults())
            .iter()
            .map(Vec::len)
            .collect();
        assert_eq!(counts, vec![1, 0, 2]);
    }

    #[test]
    fn parallel_many_queries() {
        let queries = vec![mol("C"), mol("O"), mol("N")];
        let counts: Vec<usize> = get_matches_for_queries(&mol("CCO"), &queries, &defaults())
            .iter()
            .map(Vec::len)
            .collect();
        assert_eq!(counts, vec![2, 1, 0]);
    }

    #[test]
    fn delete_matched_atoms() {
        let out = delete_substructs(&mol("CCOC(=O)C"), &mol("C=O"), false).unwrap();
        assert_eq!(out.atom_count(), 4);
        let untouched = delete_substructs(&mol("CCO"), &mol("N"), false).unwrap();
        assert_eq!(untouched.atom_count(), 3);
    }

    #[test]
    fn delete_only_whole_fragments() {
        let m = mol("CC(=O)O.Cl");
        let out = delete_substructs(&m, &from_smarts("[Cl]").unwrap(), true).unwrap();
        assert_eq!(out.atom_count(), 4);
        let kept = delete_substructs(&mol("ClCC.Cl"), &from_smarts("[Cl]").unwrap(), true).unwrap();
        assert_eq!(kept.atom_count(), 3);
    }

    #[test]
    fn params_round_trip_through_json() {
        let params = SubstructMatchParams {
            use_chirality: true,
            max_matches: 7,
            ..defaults()
        };
        let json = serde_json::to_string(&params).unwrap();
        let back: SubstructMatchParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params);
        let partial: SubstructMatchParams = serde_json::from_str(r#"{"uniquify":false}"#).unwrap();
        assert!(!partial.uniquify);
        assert!(partial.recursion_possible);
    }
}
