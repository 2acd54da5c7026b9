//! Hashed structural fingerprints and similarity scores.
//!
//! Two generators are provided: linear bond paths ([`path_fingerprint`]) and
//! circular atom environments ([`morgan_fingerprint`]). Both hash an
//! invariant description of each environment into a 32-bit identifier.
//! Identifiers are either kept as counts in a [`SparseIntVect`] or folded
//! into a fixed-length [`ExplicitBitVect`].

use std::collections::{BTreeMap, HashSet};

use bit_set::BitSet;
use petgraph::graph::{EdgeIndex, NodeIndex};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

use crate::atom::ChiralTag;
use crate::bond::BondType;
use crate::mol::{permutation_parity, Mol};
use crate::stereo::{stereo_neighbors, StereoNbr};
use crate::valence;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FingerprintError {
    #[error("bit {index} is out of range for a vector of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("cannot fold a vector of length {len} by {factor}")]
    InvalidFoldFactor { len: usize, factor: usize },
    #[error("fingerprint lengths differ: {0} and {1}")]
    LengthMismatch(usize, usize),
    #[error("invalid fingerprint parameters: {0}")]
    InvalidParams(&'static str),
}

/// Fixed-length bit vector.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExplicitBitVect {
    len: usize,
    bits: BitSet,
}

impl ExplicitBitVect {
    pub fn new(len: usize) -> Self {
        Self {
            len,
            bits: BitSet::with_capacity(len),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Sets bit `index`, returning whether it was already on.
    pub fn set_bit(&mut self, index: usize) -> Result<bool, FingerprintError> {
        if index >= self.len {
            return Err(FingerprintError::IndexOutOfRange {
                index,
                len: self.len,
            });
        }
        Ok(!self.bits.insert(index))
    }

    pub fn get_bit(&self, index: usize) -> bool {
        self.bits.contains(index)
    }

    pub fn num_on_bits(&self) -> usize {
        self.bits.len()
    }

    pub fn on_bits(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits.iter()
    }

    /// Fraction of bits that are set.
    pub fn density(&self) -> f64 {
        if self.len == 0 {
            0.0
        } else {
            self.num_on_bits() as f64 / self.len as f64
        }
    }

    /// Folds to `len / factor` bits: bit `i` of the result is set when any bit
    /// `j` with `j % (len / factor) == i` is set. Folding by `k` twice equals
    /// folding once by `k * k`.
    pub fn fold(&self, factor: usize) -> Result<Self, FingerprintError> {
        if factor == 0 || self.len % factor != 0 {
            return Err(FingerprintError::InvalidFoldFactor {
                len: self.len,
                factor,
            });
        }
        if factor == 1 {
            return Ok(self.clone());
        }
        let new_len = self.len / factor;
        let mut out = Self::new(new_len);
        for bit in self.bits.iter() {
            out.bits.insert(bit % new_len);
        }
        Ok(out)
    }

    /// Halves the vector while the result stays at or above `min_length`.
    pub fn fold_to_min_length(&self, min_length: usize) -> Self {
        let mut fp = self.clone();
        while fp.len % 2 == 0 && fp.len / 2 >= min_length.max(1) {
            fp = fp.halved();
        }
        fp
    }

    /// Halves the vector until its density reaches `density` or another halving
    /// would drop below `min_length`.
    pub fn fold_to_target_density(&self, density: f64, min_length: usize) -> Self {
        let mut fp = self.clone();
        while fp.density() < density && fp.len % 2 == 0 && fp.len / 2 >= min_length.max(1) {
            fp = fp.halved();
        }
        trace!(len = fp.len, density = fp.density(), "folded to target density");
        fp
    }

    fn halved(&self) -> Self {
        let half = self.len / 2;
        let mut out = Self::new(half);
        for bit in self.bits.iter() {
            out.bits.insert(bit % half);
        }
        out
    }

    fn common_on_bits(&self, other: &Self) -> usize {
        self.bits.intersection(&other.bits).count()
    }
}

/// Sparse count vector over a large identifier space.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SparseIntVect {
    len: u64,
    counts: BTreeMap<u32, u32>,
}

impl SparseIntVect {
    pub fn new(len: u64) -> Self {
        Self {
            len,
            counts: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn increment(&mut self, id: u32) {
        *self.counts.entry(id).or_insert(0) += 1;
    }

    pub fn get(&self, id: u32) -> u32 {
        self.counts.get(&id).copied().unwrap_or(0)
    }

    /// Non-zero entries in ascending identifier order.
    pub fn nonzero(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.counts.iter().map(|(&k, &v)| (k, v))
    }

    pub fn total(&self) -> u64 {
        self.counts.values().map(|&v| u64::from(v)).sum()
    }

    /// Maps every identifier onto `n_bits` by modulo.
    pub fn to_bit_vect(&self, n_bits: usize) -> Result<ExplicitBitVect, FingerprintError> {
        if n_bits == 0 {
            return Err(FingerprintError::InvalidParams("bit vector length must be positive"));
        }
        let mut fp = ExplicitBitVect::new(n_bits);
        for &id in self.counts.keys() {
            fp.bits.insert(id as usize % n_bits);
        }
        Ok(fp)
    }

    fn min_sum(&self, other: &Self) -> u64 {
        self.counts
            .iter()
            .filter_map(|(k, &v)| other.counts.get(k).map(|&w| u64::from(v.min(w))))
            .sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Similarity {
    Tanimoto,
    Dice,
    /// Weights on the features unique to the first and second vector.
    Tversky { a: f64, b: f64 },
}

impl Similarity {
    fn score(self, only_first: f64, only_second: f64, common: f64) -> f64 {
        let denom = match self {
            Self::Tanimoto => only_first + only_second + common,
            Self::Dice => (only_first + only_second) / 2.0 + common,
            Self::Tversky { a, b } => a * only_first + b * only_second + common,
        };
        if denom == 0.0 {
            0.0
        } else {
            common / denom
        }
    }
}

pub fn tanimoto(a: &ExplicitBitVect, b: &ExplicitBitVect) -> Result<f64, FingerprintError> {
    bit_similarity(a, b, Similarity::Tanimoto)
}

pub fn dice(a: &ExplicitBitVect, b: &ExplicitBitVect) -> Result<f64, FingerprintError> {
    bit_similarity(a, b, Similarity::Dice)
}

pub fn tversky(
    a: &ExplicitBitVect,
    b: &ExplicitBitVect,
    alpha: f64,
    beta: f64,
) -> Result<f64, FingerprintError> {
    bit_similarity(a, b, Similarity::Tversky { a: alpha, b: beta })
}

/// Similarity of two vectors of equal length. Two empty vectors score 0.
pub fn bit_similarity(
    a: &ExplicitBitVect,
    b: &ExplicitBitVect,
    metric: Similarity,
) -> Result<f64, FingerprintError> {
    if a.len != b.len {
        return Err(FingerprintError::LengthMismatch(a.len, b.len));
    }
    let common = a.common_on_bits(b);
    Ok(metric.score(
        (a.num_on_bits() - common) as f64,
        (b.num_on_bits() - common) as f64,
        common as f64,
    ))
}

/// Count-based similarity: shared features count `min(a, b)` times.
pub fn count_similarity(
    a: &SparseIntVect,
    b: &SparseIntVect,
    metric: Similarity,
) -> Result<f64, FingerprintError> {
    if a.len != b.len {
        return Err(FingerprintError::LengthMismatch(a.len as usize, b.len as usize));
    }
    let common = a.min_sum(b);
    Ok(metric.score(
        (a.total() - common) as f64,
        (b.total() - common) as f64,
        common as f64,
    ))
}

/// Like [`bit_similarity`], but first folds the longer vector down to the
/// length of the shorter one.
pub fn fingerprint_similarity(
    a: &ExplicitBitVect,
    b: &ExplicitBitVect,
    metric: Similarity,
) -> Result<f64, FingerprintError> {
    match a.len.cmp(&b.len) {
        std::cmp::Ordering::Equal => bit_similarity(a, b, metric),
        std::cmp::Ordering::Greater => {
            let folded = a.fold(fold_factor(a.len, b.len)?)?;
            bit_similarity(&folded, b, metric)
        }
        std::cmp::Ordering::Less => {
            let folded = b.fold(fold_factor(b.len, a.len)?)?;
            bit_similarity(a, &folded, metric)
        }
    }
}

fn fold_factor(long: usize, short: usize) -> Result<usize, FingerprintError> {
    if short == 0 || long % short != 0 {
        return Err(FingerprintError::InvalidFoldFactor {
            len: long,
            factor: if short == 0 { 0 } else { long / short },
        });
    }
    Ok(long / short)
}

/// Similarity of `query` against every target, computed in parallel.
pub fn bulk_similarity(
    query: &ExplicitBitVect,
    targets: &[ExplicitBitVect],
    metric: Similarity,
) -> Result<Vec<f64>, FingerprintError> {
    targets
        .par_iter()
        .map(|t| fingerprint_similarity(query, t, metric))
        .collect()
}

fn hash_combine(seed: &mut u32, value: u32) {
    *seed ^= value
        .wrapping_add(0x9e37_79b9)
        .wrapping_add(*seed << 6)
        .wrapping_add(*seed >> 2);
}

fn bond_code(bond_type: BondType) -> u32 {
    match bond_type {
        BondType::Unspecified => 0,
        BondType::Single => 1,
        BondType::Double => 2,
        BondType::Triple => 3,
        BondType::Aromatic => 4,
        BondType::Dative => 5,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathFingerprintParams {
    /// Shortest path, in bonds.
    pub min_path: usize,
    pub max_path: usize,
    pub fp_size: usize,
    pub bits_per_hash: usize,
    pub use_bond_order: bool,
}

impl Default for PathFingerprintParams {
    fn default() -> Self {
        Self {
            min_path: 1,
            max_path: 7,
            fp_size: 2048,
            bits_per_hash: 2,
            use_bond_order: true,
        }
    }
}

impl PathFingerprintParams {
    fn validate(&self) -> Result<(), FingerprintError> {
        if self.min_path == 0 || self.min_path > self.max_path {
            return Err(FingerprintError::InvalidParams(
                "path lengths must satisfy 1 <= min_path <= max_path",
            ));
        }
        if self.fp_size == 0 || self.bits_per_hash == 0 {
            return Err(FingerprintError::InvalidParams(
                "fp_size and bits_per_hash must be positive",
            ));
        }
        Ok(())
    }
}

/// Sets bits for every simple linear path of `min_path..=max_path` bonds.
/// Each path is described by its atom and bond sequence, read in whichever
/// direction sorts first, so the fingerprint does not depend on atom order.
pub fn path_fingerprint(
    mol: &Mol,
    params: &PathFingerprintParams,
) -> Result<ExplicitBitVect, FingerprintError> {
    params.validate()?;
    let atom_codes: Vec<u32> = mol
        .atoms()
        .map(|a| {
            let atom = mol.atom(a);
            u32::from(atom.atomic_num) << 1 | u32::from(atom.is_aromatic)
        })
        .collect();

    let mut fp = ExplicitBitVect::new(params.fp_size);
    let mut n_paths = 0usize;
    let mut path = Vec::with_capacity(params.max_path + 1);
    for start in mol.atoms() {
        path.clear();
        path.push(start);
        extend_paths(mol, params, &atom_codes, &mut path, &mut |tokens: &[u32]| {
            n_paths += 1;
            set_path_bits(&mut fp, tokens, params);
        });
    }
    trace!(paths = n_paths, on_bits = fp.num_on_bits(), "path fingerprint");
    Ok(fp)
}

fn extend_paths(
    mol: &Mol,
    params: &PathFingerprintParams,
    atom_codes: &[u32],
    path: &mut Vec<NodeIndex>,
    emit: &mut dyn FnMut(&[u32]),
) {
    let n_bonds = path.len() - 1;
    if n_bonds >= params.min_path {
        // Count each path once, from its lower-numbered end.
        if let (Some(&first), Some(&last)) = (path.first(), path.last()) {
            if first < last {
                emit(&path_tokens(mol, params, atom_codes, path));
            }
        }
    }
    if n_bonds == params.max_path {
        return;
    }
    let Some(&tip) = path.last() else {
        return;
    };
    for nb in mol.neighbors(tip).collect::<Vec<_>>() {
        if path.contains(&nb) {
            continue;
        }
        path.push(nb);
        extend_paths(mol, params, atom_codes, path, emit);
        path.pop();
    }
}

fn path_tokens(
    mol: &Mol,
    params: &PathFingerprintParams,
    atom_codes: &[u32],
    path: &[NodeIndex],
) -> Vec<u32> {
    let mut forward = Vec::with_capacity(path.len() * 2);
    for (i, &a) in path.iter().enumerate() {
        forward.push(atom_codes[a.index()]);
        if let Some(&next) = path.get(i + 1) {
            let code = match mol.bond_between(a, next) {
                Some(e) if params.use_bond_order => bond_code(mol.bond(e).bond_type),
                _ => 1,
            };
            forward.push(code);
        }
    }
    let reversed: Vec<u32> = forward.iter().rev().copied().collect();
    forward.min(reversed)
}

fn set_path_bits(fp: &mut ExplicitBitVect, tokens: &[u32], params: &PathFingerprintParams) {
    let mut seed = tokens.len() as u32;
    for &t in tokens {
        hash_combine(&mut seed, t);
    }
    // xorshift seeded by the path hash picks the bits.
    let mut state = u64::from(seed) << 1 | 1;
    for _ in 0..params.bits_per_hash {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        fp.bits.insert((state % params.fp_size as u64) as usize);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MorganFingerprintParams {
    pub radius: usize,
    /// Distinguishes the two hands of tetrahedral centres from radius 1 on.
    pub use_chirality: bool,
    pub use_bond_types: bool,
    pub include_ring_membership: bool,
}

impl Default for MorganFingerprintParams {
    fn default() -> Self {
        Self {
            radius: 2,
            use_chirality: false,
            use_bond_types: true,
            include_ring_membership: true,
        }
    }
}

/// Circular environment identifiers with their counts.
///
/// Radius 0 hashes per-atom invariants. Each further iteration hashes an
/// atom's previous identifier with its sorted `(bond, neighbour identifier)`
/// pairs. An environment covering the same bonds as one already emitted is
/// skipped.
pub fn morgan_fingerprint(mol: &Mol, params: &MorganFingerprintParams) -> SparseIntVect {
    let n = mol.atom_count();
    let rings = mol.ring_info_or_sssr();
    let mut fp = SparseIntVect::new(1 << 32);

    let mut ids: Vec<u32> = mol
        .atoms()
        .map(|a| {
            let atom = mol.atom(a);
            let mut seed = 0u32;
            hash_combine(&mut seed, u32::from(atom.atomic_num));
            hash_combine(&mut seed, u32::from(valence::total_degree(mol, a)));
            hash_combine(&mut seed, u32::from(total_h(mol, a)));
            hash_combine(&mut seed, atom.formal_charge as i32 as u32);
            hash_combine(&mut seed, u32::from(atom.isotope));
            if params.include_ring_membership {
                hash_combine(&mut seed, u32::from(rings.is_ring_atom(a)));
            }
            seed
        })
        .collect();
    for &id in &ids {
        fp.increment(id);
    }

    let bond_inv = |e: EdgeIndex| {
        if params.use_bond_types {
            bond_code(mol.bond(e).bond_type)
        } else {
            1
        }
    };

    let mut envs: Vec<BitSet> = vec![BitSet::new(); n];
    let mut seen: HashSet<BitSet> = HashSet::new();
    let mut alive = vec![true; n];
    for layer in 1..=params.radius {
        let mut candidates: Vec<(BitSet, u32, usize)> = Vec::with_capacity(n);
        let mut next_ids = ids.clone();
        for a in mol.atoms() {
            let i = a.index();
            let mut pairs: Vec<(u32, u32)> = mol
                .bonds_of(a)
                .map(|e| (bond_inv(e), ids[mol.other_atom(e, a).index()]))
                .collect();
            pairs.sort_unstable();

            let mut seed = layer as u32;
            hash_combine(&mut seed, ids[i]);
            for &(b, nb) in &pairs {
                hash_combine(&mut seed, b);
                hash_combine(&mut seed, nb);
            }
            if params.use_chirality {
                if let Some(hand) = handedness(mol, a, &ids, &bond_inv) {
                    hash_combine(&mut seed, u32::from(hand) + 1);
                }
            }
            next_ids[i] = seed;

            if !alive[i] {
                continue;
            }
            let mut env = envs[i].clone();
            for e in mol.bonds_of(a) {
                env.insert(e.index());
                env.union_with(&envs[mol.other_atom(e, a).index()]);
            }
            candidates.push((env, seed, i));
        }

        candidates.sort();
        let mut new_envs = envs.clone();
        for (env, id, i) in candidates {
            if env == envs[i] || !seen.insert(env.clone()) {
                alive[i] = false;
                continue;
            }
            fp.increment(id);
            new_envs[i] = env;
        }
        envs = new_envs;
        ids = next_ids;
        if !alive.iter().any(|&x| x) {
            break;
        }
    }
    trace!(radius = params.radius, features = fp.counts.len(), "morgan fingerprint");
    fp
}

/// Morgan identifiers folded onto `n_bits`.
pub fn morgan_fingerprint_bits(
    mol: &Mol,
    params: &MorganFingerprintParams,
    n_bits: usize,
) -> Result<ExplicitBitVect, FingerprintError> {
    morgan_fingerprint(mol, params).to_bit_vect(n_bits)
}

fn total_h(mol: &Mol, a: NodeIndex) -> u8 {
    mol.atom(a).explicit_h_count
        + valence::implicit_h(mol, a)
        + mol
            .neighbors(a)
            .filter(|&nb| mol.atom(nb).atomic_num == 1)
            .count() as u8
}

/// Hand of a tetrahedral centre relative to its neighbours ordered by
/// identifier. `None` when the centre is untagged or two neighbours tie.
fn handedness(
    mol: &Mol,
    a: NodeIndex,
    ids: &[u32],
    bond_inv: &dyn Fn(EdgeIndex) -> u32,
) -> Option<bool> {
    let tag = mol.atom(a).chiral_tag;
    if !tag.is_tetrahedral() {
        return None;
    }
    let key = |nbr: &StereoNbr| match *nbr {
        StereoNbr::Hydrogen => None,
        StereoNbr::Atom(nb) => {
            let e = mol.bond_between(a, nb)?;
            Some((bond_inv(e), ids[nb.index()]))
        }
    };
    let frame = stereo_neighbors(mol, a);
    let mut ranked = frame.clone();
    ranked.sort_by_key(|n| key(n));
    if ranked.windows(2).any(|w| key(&w[0]) == key(&w[1])) {
        return None;
    }
    let even = permutation_parity(&frame, &ranked);
    Some((tag == ChiralTag::TetrahedralCcw) == even)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smiles::from_smiles;

    fn mol(smiles: &str) -> Mol {
        from_smiles(smiles).unwrap()
    }

    #[test]
    fn identical_molecules_score_one() {
        let a = path_fingerprint(&mol("CCO"), &PathFingerprintParams::default()).unwrap();
        let b = path_fingerprint(&mol("CCO"), &PathFingerprintParams::default()).unwrap();
        assert_eq!(a, b);
        assert_eq!(tanimoto(&a, &b).unwrap(), 1.0);
        assert_eq!(dice(&a, &b).unwrap(), 1.0);

        let params = MorganFingerprintParams::default();
        let ma = morgan_fingerprint(&mol("CCO"), &params);
        let mb = morgan_fingerprint(&mol("OCC"), &params);
        assert_eq!(ma, mb);
        assert_eq!(count_similarity(&ma, &mb, Similarity::Tanimoto).unwrap(), 1.0);
    }

    #[test]
    fn path_fingerprint_ignores_atom_order() {
        let params = PathFingerprintParams::default();
        let a = path_fingerprint(&mol("c1ccccc1CO"), &params).unwrap();
        let b = path_fingerprint(&mol("OCc1ccccc1"), &params).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_molecules_are_less_similar() {
        let params = PathFingerprintParams::default();
        let a = path_fingerprint(&mol("CCO"), &params).unwrap();
        let b = path_fingerprint(&mol("CCN"), &params).unwrap();
        let sim = tanimoto(&a, &b).unwrap();
        assert!(sim > 0.0 && sim < 1.0, "{sim}");
    }

    #[test]
    fn bond_order_toggle() {
        let with = PathFingerprintParams::default();
        let without = PathFingerprintParams {
            use_bond_order: false,
            ..with
        };
        let ethane = mol("CC");
        let ethene = mol("C=C");
        assert_ne!(
            path_fingerprint(&ethane, &with).unwrap(),
            path_fingerprint(&ethene, &with).unwrap()
        );
        assert_eq!(
            path_fingerprint(&ethane, &without).unwrap(),
            path_fingerprint(&ethene, &without).unwrap()
        );
    }

    #[test]
    fn fold_composition_law() {
        let fp = path_fingerprint(&mol("CC(=O)Oc1ccccc1C(=O)O"), &PathFingerprintParams::default())
            .unwrap();
        let twice = fp.fold(4).unwrap().fold(4).unwrap();
        let once = fp.fold(16).unwrap();
        assert_eq!(twice, once);
        assert_eq!(once.len(), 128);
    }

    #[test]
    fn fold_rejects_non_divisors() {
        let fp = ExplicitBitVect::new(100);
        assert!(matches!(
            fp.fold(3),
            Err(FingerprintError::InvalidFoldFactor { len: 100, factor: 3 })
        ));
        assert!(fp.fold(0).is_err());
    }

    #[test]
    fn fold_to_min_length_stops_at_minimum() {
        let mut fp = ExplicitBitVect::new(1024);
        fp.set_bit(1000).unwrap();
        let folded = fp.fold_to_min_length(64);
        assert_eq!(folded.len(), 64);
        assert!(folded.get_bit(1000 % 64));
        assert_eq!(folded.fold_to_min_length(64), folded);
    }

    #[test]
    fn fold_to_target_density() {
        let mut fp = ExplicitBitVect::new(1024);
        for i in 0..32 {
            fp.set_bit(i * 32).unwrap();
        }
        // Density stays at 1/32 under halving, so only the minimum stops it.
        let folded = fp.fold_to_target_density(0.3, 64);
        assert_eq!(folded.len(), 64);
        let dense = fp.fold_to_target_density(0.01, 64);
        assert_eq!(dense.len(), 1024);
    }

    #[test]
    fn auto_fold_on_length_mismatch() {
        let params = PathFingerprintParams::default();
        let long = path_fingerprint(&mol("c1ccccc1O"), &params).unwrap();
        let short = long.fold(2).unwrap();
        assert_eq!(
            fingerprint_similarity(&long, &short, Similarity::Tanimoto).unwrap(),
            1.0
        );
        assert!(tanimoto(&long, &short).is_err());
        let odd = ExplicitBitVect::new(1000);
        assert!(fingerprint_similarity(&long, &odd, Similarity::Tanimoto).is_err());
    }

    #[test]
    fn similarity_metrics() {
        let mut a = ExplicitBitVect::new(8);
        let mut b = ExplicitBitVect::new(8);
        for i in [0, 1, 2, 3] {
            a.set_bit(i).unwrap();
        }
        for i in [2, 3, 4, 5] {
            b.set_bit(i).unwrap();
        }
        assert!((tanimoto(&a, &b).unwrap() - 2.0 / 6.0).abs() < 1e-12);
        assert!((dice(&a, &b).unwrap() - 0.5).abs() < 1e-12);
        // Tversky with a = b = 1 is Tanimoto; a = b = 0.5 is Dice.
        assert!((tversky(&a, &b, 1.0, 1.0).unwrap() - 2.0 / 6.0).abs() < 1e-12);
        assert!((tversky(&a, &b, 0.5, 0.5).unwrap() - 0.5).abs() < 1e-12);
        assert_eq!(tanimoto(&ExplicitBitVect::new(8), &ExplicitBitVect::new(8)).unwrap(), 0.0);
    }

    #[test]
    fn set_bit_bounds() {
        let mut fp = ExplicitBitVect::new(4);
        assert!(!fp.set_bit(3).unwrap());
        assert!(fp.set_bit(3).unwrap());
        assert!(fp.set_bit(4).is_err());
    }

    #[test]
    fn morgan_radius_grows_features() {
        let m = mol("CC(=O)NC1=CC=C(O)C=C1");
        let r0 = morgan_fingerprint(&m, &MorganFingerprintParams { radius: 0, ..Default::default() });
        let r2 = morgan_fingerprint(&m, &MorganFingerprintParams::default());
        assert_eq!(r0.total(), m.atom_count() as u64);
        assert!(r2.total() > r0.total());
    }

    #[test]
    fn morgan_symmetric_atoms_share_identifiers() {
        let fp = morgan_fingerprint(&mol("CC(C)C"), &MorganFingerprintParams::default());
        assert!(fp.nonzero().any(|(_, count)| count == 3));
    }

    #[test]
    fn morgan_chirality() {
        let off = MorganFingerprintParams::default();
        let on = MorganFingerprintParams {
            use_chirality: true,
            ..off
        };
        let r = mol("N[C@@H](C)C(=O)O");
        let s = mol("N[C@H](C)C(=O)O");
        assert_eq!(morgan_fingerprint(&r, &off), morgan_fingerprint(&s, &off));
        assert_ne!(morgan_fingerprint(&r, &on), morgan_fingerprint(&s, &on));
        // Same hand written from another starting atom.
        let r_again = mol("C[C@H](N)C(=O)O");
        assert_eq!(morgan_fingerprint(&r, &on), morgan_fingerprint(&r_again, &on));
    }

    #[test]
    fn morgan_bits_and_bulk() {
        let params = MorganFingerprintParams::default();
        let q = morgan_fingerprint_bits(&mol("c1ccccc1O"), &params, 1024).unwrap();
        let targets: Vec<_> = ["c1ccccc1O", "CCCC", "c1ccccc1N"]
            .iter()
            .map(|s| morgan_fingerprint_bits(&mol(s), &params, 1024).unwrap())
            .collect();
        let scores = bulk_similarity(&q, &targets, Similarity::Tanimoto).unwrap();
        assert_eq!(scores[0], 1.0);
        assert!(scores[2] > scores[1]);
        assert!(morgan_fingerprint_bits(&mol("C"), &params, 0).is_err());
    }

    #[test]
    fn params_deserialize_with_defaults() {
        let params: PathFingerprintParams = serde_json::from_str(r#"{"max_path": 5}"#).unwrap();
        assert_eq!(params.max_path, 5);
        assert_eq!(params.fp_size, 2048);
        let bad = PathFingerprintParams {
            min_path: 3,
            max_path: 2,
            ..Default::default()
        };
        assert!(path_fingerprint(&mol("CC"), &bad).is_err());
    }
}
