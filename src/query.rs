//! Atom and bond predicates for query graphs.
//!
//! A query atom carries an [`AtomExpr`] tree, a query bond a [`BondExpr`]
//! tree. Both are evaluated against a target molecule through a
//! [`MatchContext`], which computes the derived values the predicates need
//! once per target.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::OnceLock;

use petgraph::graph::{EdgeIndex, NodeIndex};

use crate::atom::{Atom, ChiralTag, Hybridization};
use crate::bond::{Bond, BondDir, BondType};
use crate::cache::{CacheFlags, ReadMode};
use crate::hybridization::assign_hybridization;
use crate::mol::Mol;
use crate::rings::RingInfo;
use crate::valence;

/// Property tested by a SMARTS range primitive such as `D{2-3}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RangeKind {
    Degree,
    NonHDegree,
    TotalHCount,
    ImplicitHCount,
    SmallestRingSize,
    RingMembership,
    Valence,
    RingBondCount,
    Connectivity,
    HeteroNeighborCount,
    AliphaticHeteroNeighborCount,
}

/// Predicate over a single target atom.
#[derive(Debug, Clone, PartialEq)]
pub enum AtomExpr {
    /// `*`
    True,
    /// Element by atomic number. `aromatic` is `None` for `#n`,
    /// `Some(true)` for lowercase symbols and `Some(false)` for uppercase.
    Element {
        atomic_num: u8,
        aromatic: Option<bool>,
    },
    /// `a`
    Aromatic,
    /// `A`
    Aliphatic,
    Isotope(u16),
    /// `D`: explicit connections in the graph.
    Degree(u8),
    /// `d`: connections to non-hydrogen atoms.
    NonHDegree(u8),
    /// `v`: total valence including implicit hydrogens.
    Valence(u8),
    /// `X`: connections including every hydrogen.
    Connectivity(u8),
    /// `H`: hydrogens of any kind.
    TotalHCount(u8),
    /// `h`: implicit hydrogens only.
    ImplicitHCount(u8),
    /// `R<n>`: number of SSSR rings containing the atom.
    RingMembership(u8),
    /// `r<n>`: size of the smallest ring containing the atom.
    SmallestRingSize(u8),
    /// `x<n>`: number of ring bonds.
    RingBondCount(u8),
    Charge(i8),
    /// `z<n>`
    HeteroNeighborCount(u8),
    /// `Z<n>`
    AliphaticHeteroNeighborCount(u8),
    /// `^n`
    Hybridization(Hybridization),
    Range {
        kind: RangeKind,
        low: Option<u8>,
        high: Option<u8>,
    },
    /// Bare `R`, `r` or `x`.
    InRing,
    /// `@` / `@@`. Always true at the atom level; the matcher compares
    /// parity once a full mapping exists.
    Chirality(ChiralTag),
    /// Atom-map class; never constrains a match.
    AtomMapClass(u16),
    /// `$(...)`: the target atom must be where the first atom of the
    /// embedded query maps.
    Recursive(Box<Mol>),
    And(Vec<AtomExpr>),
    Or(Vec<AtomExpr>),
    Not(Box<AtomExpr>),
}

/// Predicate over a single target bond.
#[derive(Debug, Clone, PartialEq)]
pub enum BondExpr {
    /// `~`
    True,
    /// `-`: single and not aromatic.
    Single,
    /// `=`: double and not aromatic.
    Double,
    /// `#`
    Triple,
    /// `:`
    Aromatic,
    /// `@`
    Ring,
    /// The implicit bond between adjacent SMARTS atoms.
    SingleOrAromatic,
    /// `/`
    Up,
    /// `\`
    Down,
    And(Vec<BondExpr>),
    Or(Vec<BondExpr>),
    Not(Box<BondExpr>),
}

impl AtomExpr {
    /// The element this expression pins down, if it is a plain element
    /// primitive or a conjunction containing exactly one.
    pub fn single_element(&self) -> Option<(u8, Option<bool>)> {
        match self {
            AtomExpr::Element {
                atomic_num,
                aromatic,
            } => Some((*atomic_num, *aromatic)),
            AtomExpr::And(items) => {
                let mut found = items.iter().filter_map(|e| e.single_element());
                let first = found.next()?;
                match found.next() {
                    None => Some(first),
                    Some(_) => None,
                }
            }
            _ => None,
        }
    }

    /// Calls `f` on every recursive sub-query in this expression.
    pub fn for_each_recursive<'a>(&'a self, f: &mut impl FnMut(&'a Mol)) {
        match self {
            AtomExpr::Recursive(inner) => f(&**inner),
            AtomExpr::And(items) | AtomExpr::Or(items) => {
                for item in items {
                    item.for_each_recursive(f);
                }
            }
            AtomExpr::Not(inner) => inner.for_each_recursive(f),
            _ => {}
        }
    }

    pub fn matches(&self, ctx: &MatchContext<'_>, idx: NodeIndex) -> bool {
        let atom = ctx.mol.atom(idx);
        match self {
            AtomExpr::True | AtomExpr::AtomMapClass(_) | AtomExpr::Chirality(_) => true,
            AtomExpr::Element {
                atomic_num,
                aromatic,
            } => atom.atomic_num == *atomic_num && aromatic.is_none_or(|a| atom.is_aromatic == a),
            AtomExpr::Aromatic => atom.is_aromatic,
            AtomExpr::Aliphatic => !atom.is_aromatic,
            AtomExpr::Isotope(iso) => atom.isotope == *iso,
            AtomExpr::Degree(v) => ctx.value(RangeKind::Degree, idx) == *v,
            AtomExpr::NonHDegree(v) => ctx.value(RangeKind::NonHDegree, idx) == *v,
            AtomExpr::Valence(v) => ctx.value(RangeKind::Valence, idx) == *v,
            AtomExpr::Connectivity(v) => ctx.value(RangeKind::Connectivity, idx) == *v,
            AtomExpr::TotalHCount(v) => ctx.value(RangeKind::TotalHCount, idx) == *v,
            AtomExpr::ImplicitHCount(v) => ctx.value(RangeKind::ImplicitHCount, idx) == *v,
            AtomExpr::RingMembership(v) => ctx.value(RangeKind::RingMembership, idx) == *v,
            AtomExpr::SmallestRingSize(v) => ctx.value(RangeKind::SmallestRingSize, idx) == *v,
            AtomExpr::RingBondCount(v) => ctx.value(RangeKind::RingBondCount, idx) == *v,
            AtomExpr::HeteroNeighborCount(v) => {
                ctx.value(RangeKind::HeteroNeighborCount, idx) == *v
            }
            AtomExpr::AliphaticHeteroNeighborCount(v) => {
                ctx.value(RangeKind::AliphaticHeteroNeighborCount, idx) == *v
            }
            AtomExpr::Charge(c) => atom.formal_charge == *c,
            AtomExpr::Hybridization(h) => ctx.hybridization(idx) == *h,
            AtomExpr::Range { kind, low, high } => {
                let val = ctx.value(*kind, idx);
                low.is_none_or(|lo| val >= lo) && high.is_none_or(|hi| val <= hi)
            }
            AtomExpr::InRing => ctx.ring_info.is_ring_atom(idx),
            AtomExpr::Recursive(inner) => ctx.recursive_hit(inner, idx),
            AtomExpr::And(items) => items.iter().all(|e| e.matches(ctx, idx)),
            AtomExpr::Or(items) => items.iter().any(|e| e.matches(ctx, idx)),
            AtomExpr::Not(inner) => !inner.matches(ctx, idx),
        }
    }
}

impl BondExpr {
    /// The concrete bond type this expression implies, if any.
    pub fn implied_type(&self) -> Option<BondType> {
        match self {
            BondExpr::Single | BondExpr::Up | BondExpr::Down => Some(BondType::Single),
            BondExpr::Double => Some(BondType::Double),
            BondExpr::Triple => Some(BondType::Triple),
            BondExpr::Aromatic => Some(BondType::Aromatic),
            BondExpr::And(items) => items.iter().find_map(|e| e.implied_type()),
            _ => None,
        }
    }

    pub fn matches(&self, ctx: &MatchContext<'_>, edge: EdgeIndex) -> bool {
        let bond = ctx.mol.bond(edge);
        match self {
            BondExpr::True => true,
            BondExpr::Single => bond.bond_type == BondType::Single && !bond.is_aromatic,
            BondExpr::Double => bond.bond_type == BondType::Double && !bond.is_aromatic,
            BondExpr::Triple => bond.bond_type == BondType::Triple,
            BondExpr::Aromatic => bond.is_aromatic,
            BondExpr::Ring => ctx.ring_info.is_ring_bond(edge),
            BondExpr::SingleOrAromatic => bond.bond_type == BondType::Single || bond.is_aromatic,
            BondExpr::Up | BondExpr::Down => {
                bond.bond_type == BondType::Single && !bond.is_aromatic
            }
            BondExpr::And(items) => items.iter().all(|e| e.matches(ctx, edge)),
            BondExpr::Or(items) => items.iter().any(|e| e.matches(ctx, edge)),
            BondExpr::Not(inner) => !inner.matches(ctx, edge),
        }
    }

    /// The same predicate read from the other end of the bond.
    pub fn reversed(&self) -> BondExpr {
        match self {
            BondExpr::Up => BondExpr::Down,
            BondExpr::Down => BondExpr::Up,
            BondExpr::And(items) => BondExpr::And(items.iter().map(|e| e.reversed()).collect()),
            BondExpr::Or(items) => BondExpr::Or(items.iter().map(|e| e.reversed()).collect()),
            BondExpr::Not(inner) => BondExpr::Not(Box::new(inner.reversed())),
            other => other.clone(),
        }
    }

    /// Direction this expression asks for, used for double-bond stereo in
    /// queries.
    pub fn direction(&self) -> BondDir {
        match self {
            BondExpr::Up => BondDir::EndUpRight,
            BondExpr::Down => BondDir::EndDownRight,
            BondExpr::And(items) => items
                .iter()
                .map(|e| e.direction())
                .find(|d| *d != BondDir::None)
                .unwrap_or(BondDir::None),
            _ => BondDir::None,
        }
    }
}

/// Derived values of a target molecule needed to evaluate predicates.
///
/// Values come from the target's property cache when it is current and are
/// computed from the graph otherwise, so unsanitized targets can be searched.
pub struct MatchContext<'a> {
    pub mol: &'a Mol,
    pub ring_info: Cow<'a, RingInfo>,
    implicit_h: Vec<u8>,
    explicit_valence: Vec<u8>,
    hybridization: OnceLock<Vec<Hybridization>>,
    recursive: HashMap<usize, Vec<bool>>,
}

impl<'a> MatchContext<'a> {
    pub fn new(mol: &'a Mol) -> Self {
        let (explicit_valence, implicit_h) = if mol.cache().is_stale(CacheFlags::VALENCE) {
            mol.atoms()
                .map(|a| {
                    let ev = valence::explicit_valence(mol, a);
                    (ev, valence::implicit_h_for(mol, a, ev))
                })
                .unzip()
        } else {
            mol.atoms()
                .map(|a| {
                    (
                        mol.explicit_valence(a, ReadMode::Permissive).unwrap_or(0),
                        mol.implicit_h_count(a, ReadMode::Permissive).unwrap_or(0),
                    )
                })
                .unzip()
        };
        Self {
            mol,
            ring_info: mol.ring_info_or_sssr(),
            implicit_h,
            explicit_valence,
            hybridization: OnceLock::new(),
            recursive: HashMap::new(),
        }
    }

    fn hybridization(&self, idx: NodeIndex) -> Hybridization {
        let values = self.hybridization.get_or_init(|| {
            if self.mol.cache().is_stale(CacheFlags::HYBRIDIZATION) {
                assign_hybridization(self.mol)
            } else {
                self.mol
                    .atoms()
                    .map(|a| {
                        self.mol
                            .hybridization(a, ReadMode::Permissive)
                            .unwrap_or_default()
                    })
                    .collect()
            }
        });
        values.get(idx.index()).copied().unwrap_or_default()
    }

    pub fn implicit_h(&self, idx: NodeIndex) -> u8 {
        self.implicit_h.get(idx.index()).copied().unwrap_or(0)
    }

    fn h_neighbors(&self, idx: NodeIndex) -> u8 {
        self.mol
            .neighbors(idx)
            .filter(|&nb| self.mol.atom(nb).atomic_num == 1)
            .count() as u8
    }

    /// All hydrogens on the atom: recorded, implicit and graph neighbours.
    pub fn total_h(&self, idx: NodeIndex) -> u8 {
        self.mol.atom(idx).explicit_h_count + self.implicit_h(idx) + self.h_neighbors(idx)
    }

    fn hetero_neighbors(&self, idx: NodeIndex, aliphatic_only: bool) -> u8 {
        self.mol
            .neighbors(idx)
            .filter(|&nb| {
                let a = self.mol.atom(nb);
                a.atomic_num != 6 && a.atomic_num != 1 && !(aliphatic_only && a.is_aromatic)
            })
            .count() as u8
    }

    fn value(&self, kind: RangeKind, idx: NodeIndex) -> u8 {
        let atom = self.mol.atom(idx);
        let degree = self.mol.degree(idx) as u8;
        match kind {
            RangeKind::Degree => degree,
            RangeKind::NonHDegree => degree - self.h_neighbors(idx),
            RangeKind::TotalHCount => self.total_h(idx),
            RangeKind::ImplicitHCount => self.implicit_h(idx),
            RangeKind::SmallestRingSize => self
                .ring_info
                .min_atom_ring_size(idx)
                .map_or(0, |s| s as u8),
            RangeKind::RingMembership => self.ring_info.num_atom_rings(idx) as u8,
            RangeKind::Valence => {
                self.explicit_valence.get(idx.index()).copied().unwrap_or(0) + self.implicit_h(idx)
            }
            RangeKind::RingBondCount => self
                .mol
                .bonds_of(idx)
                .filter(|&e| self.ring_info.is_ring_bond(e))
                .count() as u8,
            RangeKind::Connectivity => degree + atom.explicit_h_count + self.implicit_h(idx),
            RangeKind::HeteroNeighborCount => self.hetero_neighbors(idx, false),
            RangeKind::AliphaticHeteroNeighborCount => self.hetero_neighbors(idx, true),
        }
    }

    pub(crate) fn set_recursive(&mut self, query: &Mol, hits: Vec<bool>) {
        self.recursive.insert(query as *const Mol as usize, hits);
    }

    pub(crate) fn has_recursive(&self, query: &Mol) -> bool {
        self.recursive.contains_key(&(query as *const Mol as usize))
    }

    fn recursive_hit(&self, query: &Mol, idx: NodeIndex) -> bool {
        self.recursive
            .get(&(query as *const Mol as usize))
            .and_then(|hits| hits.get(idx.index()).copied())
            .unwrap_or(false)
    }
}

/// Whether query atom `q` accepts target atom `idx`.
///
/// Query atoms evaluate their predicate. Concrete atoms used as queries
/// match on atomic number (`0` matches anything), require an aromatic target
/// when they are aromatic and, when set on the query atom, match formal
/// charge, isotope and radical count.
pub fn atom_matches(q: &Atom, ctx: &MatchContext<'_>, idx: NodeIndex) -> bool {
    if let Some(expr) = &q.query {
        return expr.matches(ctx, idx);
    }
    let t = ctx.mol.atom(idx);
    (q.atomic_num == 0 || q.atomic_num == t.atomic_num)
        && (!q.is_aromatic || t.is_aromatic)
        && (q.formal_charge == 0 || q.formal_charge == t.formal_charge)
        && (q.isotope == 0 || q.isotope == t.isotope)
        && (q.num_radical_electrons == 0 || q.num_radical_electrons == t.num_radical_electrons)
}

/// Whether query bond `q` accepts target bond `edge`.
///
/// Concrete bonds match on equal type; two aromatic-flagged bonds match
/// whatever their Kekulé types, and unspecified bonds match anything.
pub fn bond_matches(q: &Bond, ctx: &MatchContext<'_>, edge: EdgeIndex) -> bool {
    if let Some(expr) = &q.query {
        return expr.matches(ctx, edge);
    }
    let t = ctx.mol.bond(edge);
    q.bond_type == BondType::Unspecified
        || (q.is_aromatic && t.is_aromatic)
        || (q.bond_type == t.bond_type && q.is_aromatic == t.is_aromatic)
        || (q.bond_type == BondType::Aromatic && t.is_aromatic)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smiles::from_smiles;

    fn n(i: usize) -> NodeIndex {
        NodeIndex::new(i)
    }

    #[test]
    fn element_and_aromaticity() {
        let mol = from_smiles("c1ccccc1C").unwrap();
        let ctx = MatchContext::new(&mol);
        let arom_c = AtomExpr::Element {
            atomic_num: 6,
            aromatic: Some(true),
        };
        assert!(arom_c.matches(&ctx, n(0)));
        assert!(!arom_c.matches(&ctx, n(6)));
        let any_c = AtomExpr::Element {
            atomic_num: 6,
            aromatic: None,
        };
        assert!(any_c.matches(&ctx, n(6)));
    }

    #[test]
    fn counts_and_rings() {
        let mol = from_smiles("C1CC1CO").unwrap();
        let ctx = MatchContext::new(&mol);
        assert!(AtomExpr::TotalHCount(2).matches(&ctx, n(0)));
        assert!(AtomExpr::Degree(3).matches(&ctx, n(2)));
        assert!(AtomExpr::Connectivity(4).matches(&ctx, n(2)));
        assert!(AtomExpr::SmallestRingSize(3).matches(&ctx, n(1)));
        assert!(AtomExpr::InRing.matches(&ctx, n(2)));
        assert!(!AtomExpr::InRing.matches(&ctx, n(3)));
        assert!(AtomExpr::RingMembership(0).matches(&ctx, n(4)));
        assert!(AtomExpr::HeteroNeighborCount(1).matches(&ctx, n(3)));
        assert!(AtomExpr::Valence(2).matches(&ctx, n(4)));
        let range = AtomExpr::Range {
            kind: RangeKind::Degree,
            low: Some(2),
            high: None,
        };
        assert!(range.matches(&ctx, n(3)));
        assert!(!range.matches(&ctx, n(4)));
    }

    #[test]
    fn logic_combinators() {
        let mol = from_smiles("CN").unwrap();
        let ctx = MatchContext::new(&mol);
        let not_c = AtomExpr::Not(Box::new(AtomExpr::Element {
            atomic_num: 6,
            aromatic: None,
        }));
        assert!(!not_c.matches(&ctx, n(0)));
        assert!(not_c.matches(&ctx, n(1)));
        let c_or_n = AtomExpr::Or(vec![
            AtomExpr::Element {
                atomic_num: 6,
                aromatic: None,
            },
            AtomExpr::Element {
                atomic_num: 7,
                aromatic: None,
            },
        ]);
        assert!(c_or_n.matches(&ctx, n(0)) && c_or_n.matches(&ctx, n(1)));
    }

    #[test]
    fn single_element_of_conjunction() {
        let expr = AtomExpr::And(vec![
            AtomExpr::Element {
                atomic_num: 7,
                aromatic: Some(false),
            },
            AtomExpr::Charge(1),
        ]);
        assert_eq!(expr.single_element(), Some((7, Some(false))));
        assert_eq!(AtomExpr::Or(vec![]).single_element(), None);
    }

    #[test]
    fn bond_predicates_use_aromatic_flags() {
        let mol = from_smiles("c1ccccc1C=C").unwrap();
        let ctx = MatchContext::new(&mol);
        let ring_bond = mol.bond_between(n(0), n(1)).unwrap();
        let vinyl = mol.bond_between(n(6), n(7)).unwrap();
        assert!(BondExpr::Aromatic.matches(&ctx, ring_bond));
        assert!(!BondExpr::Double.matches(&ctx, ring_bond));
        assert!(!BondExpr::Single.matches(&ctx, ring_bond));
        assert!(BondExpr::SingleOrAromatic.matches(&ctx, ring_bond));
        assert!(BondExpr::Ring.matches(&ctx, ring_bond));
        assert!(BondExpr::Double.matches(&ctx, vinyl));
        assert!(!BondExpr::Ring.matches(&ctx, vinyl));
    }

    #[test]
    fn implicit_counts_on_unsanitized_target() {
        let mol = crate::smiles::parse_smiles("CC=O").unwrap();
        let ctx = MatchContext::new(&mol);
        assert_eq!(ctx.implicit_h(n(0)), 3);
        assert_eq!(ctx.total_h(n(1)), 1);
    }
}
