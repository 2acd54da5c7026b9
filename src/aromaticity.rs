//! Aromaticity perception.
//!
//! Every model works on a Kekulé view of the molecule, so input written
//! with aromatic bond types and input written in Kekulé form are perceived
//! identically. Ring candidates come from the symmetrized SSSR.

use std::borrow::Cow;

use petgraph::graph::{EdgeIndex, NodeIndex};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::bond::BondType;
use crate::cache::CacheFlags;
use crate::element;
use crate::error::Result;
use crate::kekulize::kekule_orders;
use crate::mol::Mol;
use crate::rings::RingInfo;

/// Rings larger than this are never aromatic.
const MAX_RING_SIZE: usize = 24;

const CANDIDATE_ELEMENTS: [u8; 9] = [
    5,  // B
    6,  // C
    7,  // N
    8,  // O
    15, // P
    16, // S
    33, // As
    34, // Se
    52, // Te
];

const HUCKEL_ELEMENTS: [u8; 5] = [6, 7, 8, 16, 34];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AromaticityError {
    #[error("non-ring atom {0} marked aromatic")]
    AtomNotInRing(usize),
    #[error("non-ring bond {0} marked aromatic")]
    BondNotInRing(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AromaticityModel {
    /// 4n+2 electron counting over single rings and fused pairs and triples.
    #[default]
    Default,
    /// Any ring system whose members each carry one alternating double bond.
    Alternating,
    /// 4n+2 over single rings of C, N, O, S and Se without exocyclic
    /// multiple bonds.
    Huckel,
}

/// Electrons an atom donates to a ring pi system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Donor {
    Vacant,
    One,
    Two,
}

impl Donor {
    fn electrons(self) -> u32 {
        match self {
            Donor::Vacant => 0,
            Donor::One => 1,
            Donor::Two => 2,
        }
    }
}

/// Aromatic flags for atoms and bonds, indexed by atom and bond index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AromaticFlags {
    pub atoms: Vec<bool>,
    pub bonds: Vec<bool>,
}

struct View<'a> {
    mol: &'a Mol,
    orders: &'a [BondType],
    rings: &'a RingInfo,
}

impl View<'_> {
    fn order(&self, e: EdgeIndex) -> BondType {
        self.orders[e.index()]
    }

    /// Implicit hydrogens the atom would carry as a non-aromatic atom with
    /// Kekulé bonds.
    fn implicit_h(&self, idx: NodeIndex) -> u8 {
        let atom = self.mol.atom(idx);
        if atom.no_implicit || atom.is_query() || atom.atomic_num == 0 {
            return 0;
        }
        let ev = self.explicit_valence(idx);
        element::allowed_valences(atom.atomic_num, atom.formal_charge)
            .iter()
            .find(|&&v| v >= ev)
            .map_or(0, |&v| (v - ev).saturating_sub(atom.num_radical_electrons))
    }

    fn explicit_valence(&self, idx: NodeIndex) -> u8 {
        let bonds: u32 = self
            .mol
            .bonds_of(idx)
            .map(|e| match self.order(e) {
                BondType::Dative if self.mol.end_atom(e) != idx => 0,
                t => t.integral_order() as u32,
            })
            .sum();
        (bonds + self.mol.atom(idx).explicit_h_count as u32).min(u8::MAX as u32) as u8
    }

    fn total_degree(&self, idx: NodeIndex) -> u8 {
        self.mol.degree(idx) as u8 + self.mol.atom(idx).explicit_h_count + self.implicit_h(idx)
    }

    fn count_atom_elec(&self, idx: NodeIndex) -> i32 {
        let atom = self.mol.atom(idx);
        let Some(&dv) = element::default_valences(atom.atomic_num).first() else {
            return -1;
        };
        let degree = self.total_degree(idx) as i32;
        if degree > 3 {
            return -1;
        }
        let nouter = element::outer_shell_electrons(atom.atomic_num) as i32;
        let nlp = (nouter - dv as i32 - atom.formal_charge as i32).max(0);
        let mut res = (dv as i32 - degree) + nlp - atom.num_radical_electrons as i32;
        if res > 1 {
            let unsaturations = self.explicit_valence(idx) as i32 - self.mol.degree(idx) as i32;
            if unsaturations > 1 {
                res = 1;
            }
        }
        res
    }

    fn donor(&self, idx: NodeIndex) -> Option<Donor> {
        let atom = self.mol.atom(idx);
        if !CANDIDATE_ELEMENTS.contains(&atom.atomic_num) {
            return None;
        }
        let multiples: Vec<EdgeIndex> = self
            .mol
            .bonds_of(idx)
            .filter(|&e| self.order(e).is_multiple())
            .collect();
        if multiples.len() > 1 || multiples.iter().any(|&e| self.order(e) == BondType::Triple) {
            return None;
        }
        let nelec = self.count_atom_elec(idx);
        match nelec {
            n if n < 0 => None,
            0 => Some(Donor::Vacant),
            1 => {
                let exo_to_electronegative = multiples.iter().any(|&e| {
                    let other = self.mol.atom(self.mol.other_atom(e, idx)).atomic_num;
                    !self.rings.is_ring_bond(e)
                        && element::more_electronegative(other, atom.atomic_num)
                });
                if exo_to_electronegative {
                    Some(Donor::Vacant)
                } else if !multiples.is_empty() {
                    Some(Donor::One)
                } else if atom.formal_charge == 1 {
                    Some(Donor::Vacant)
                } else {
                    None
                }
            }
            _ => {
                if multiples.iter().any(|&e| self.rings.is_ring_bond(e)) {
                    Some(Donor::One)
                } else {
                    Some(Donor::Two)
                }
            }
        }
    }

    fn has_exocyclic_multiple(&self, idx: NodeIndex, members: &[NodeIndex]) -> bool {
        self.mol.bonds_of(idx).any(|e| {
            self.order(e).is_multiple() && !members.contains(&self.mol.other_atom(e, idx))
        })
    }

    /// Members each have exactly one double bond to another member.
    fn alternates(&self, members: &[NodeIndex]) -> bool {
        members.iter().all(|&a| {
            self.mol
                .bonds_of(a)
                .filter(|&e| {
                    self.order(e) == BondType::Double
                        && members.contains(&self.mol.other_atom(e, a))
                })
                .count()
                == 1
        })
    }
}

fn is_huckel(pi_electrons: u32) -> bool {
    pi_electrons >= 2 && (pi_electrons - 2) % 4 == 0
}

fn shares_bond(rings: &RingInfo, i: usize, j: usize) -> bool {
    let bi = &rings.bond_rings()[i];
    rings.bond_rings()[j].iter().any(|b| bi.contains(b))
}

fn ring_info_for(mol: &Mol) -> Cow<'_, RingInfo> {
    match mol.ring_info(crate::cache::ReadMode::Strict) {
        Ok(info) => Cow::Borrowed(info),
        Err(_) => Cow::Owned(RingInfo::symmetrized_sssr(mol)),
    }
}

fn check_marks(mol: &Mol, rings: &RingInfo) -> Result<(), AromaticityError> {
    for a in mol.atoms() {
        if mol.atom(a).is_aromatic && !rings.is_ring_atom(a) {
            return Err(AromaticityError::AtomNotInRing(a.index()));
        }
    }
    for e in mol.bonds() {
        let bond = mol.bond(e);
        if (bond.is_aromatic || bond.bond_type == BondType::Aromatic) && !rings.is_ring_bond(e) {
            return Err(AromaticityError::BondNotInRing(e.index()));
        }
    }
    Ok(())
}

/// Decides which atoms and bonds are aromatic under `model` without
/// modifying the molecule.
pub fn find_aromatic(mol: &Mol, model: AromaticityModel) -> Result<AromaticFlags> {
    let rings = ring_info_for(mol);
    check_marks(mol, &rings)?;
    let orders = kekule_orders(mol)?;
    Ok(perceive(mol, &orders, &rings, model))
}

fn perceive(mol: &Mol, orders: &[BondType], rings: &RingInfo, model: AromaticityModel) -> AromaticFlags {
    let view = View { mol, orders, rings };
    let donors: Vec<Option<Donor>> = mol.atoms().map(|a| view.donor(a)).collect();
    let mut flags = AromaticFlags {
        atoms: vec![false; mol.atom_count()],
        bonds: vec![false; mol.bond_count()],
    };

    let candidates: Vec<usize> = (0..rings.num_rings())
        .filter(|&r| {
            let ring = &rings.atom_rings()[r];
            ring.len() <= MAX_RING_SIZE && ring.iter().all(|a| donors[a.index()].is_some())
        })
        .collect();

    let electrons = |members: &[NodeIndex]| -> u32 {
        members
            .iter()
            .filter_map(|a| donors[a.index()])
            .map(Donor::electrons)
            .sum()
    };

    let accepts = |members: &[NodeIndex]| -> bool {
        match model {
            AromaticityModel::Default => is_huckel(electrons(members)),
            AromaticityModel::Alternating => view.alternates(members),
            AromaticityModel::Huckel => {
                members.iter().all(|&a| {
                    HUCKEL_ELEMENTS.contains(&mol.atom(a).atomic_num)
                        && !view.has_exocyclic_multiple(a, members)
                }) && is_huckel(electrons(members))
            }
        }
    };

    let mark = |ring_ids: &[usize], flags: &mut AromaticFlags| {
        for &r in ring_ids {
            for a in &rings.atom_rings()[r] {
                flags.atoms[a.index()] = true;
            }
            for b in &rings.bond_rings()[r] {
                flags.bonds[b.index()] = true;
            }
        }
    };

    for &r in &candidates {
        if accepts(&rings.atom_rings()[r]) {
            mark(&[r], &mut flags);
        }
    }

    if model == AromaticityModel::Huckel {
        return flags;
    }

    let union = |ids: &[usize]| -> Vec<NodeIndex> {
        let mut members: Vec<NodeIndex> = ids
            .iter()
            .flat_map(|&r| rings.atom_rings()[r].iter().copied())
            .collect();
        members.sort();
        members.dedup();
        members
    };

    let fully_marked = |ids: &[usize], flags: &AromaticFlags| {
        ids.iter()
            .all(|&r| rings.bond_rings()[r].iter().all(|b| flags.bonds[b.index()]))
    };

    for (pi, &i) in candidates.iter().enumerate() {
        for (pj, &j) in candidates.iter().enumerate().skip(pi + 1) {
            if !shares_bond(rings, i, j) {
                continue;
            }
            if !fully_marked(&[i, j], &flags) && accepts(&union(&[i, j])) {
                mark(&[i, j], &mut flags);
            }
            for &k in candidates.iter().skip(pj + 1) {
                if !(shares_bond(rings, i, k) || shares_bond(rings, j, k)) {
                    continue;
                }
                if !fully_marked(&[i, j, k], &flags) && accepts(&union(&[i, j, k])) {
                    mark(&[i, j, k], &mut flags);
                }
            }
        }
    }

    flags
}

/// Perceives aromaticity and writes it to the molecule.
///
/// Aromatic bonds become [`BondType::Aromatic`] and flagged; bonds that were
/// aromatic-typed but are not aromatic under `model` get their Kekulé type.
/// Hydrogens an atom carries in Kekulé form but would lose under the
/// aromatic valence rule are moved to `explicit_h_count`.
pub fn set_aromaticity(mol: &mut Mol, model: AromaticityModel) -> Result<()> {
    let rings = ring_info_for(mol).into_owned();
    check_marks(mol, &rings)?;
    let orders = kekule_orders(mol)?;
    let flags = perceive(mol, &orders, &rings, model);

    let kekule_h: Vec<u8> = {
        let view = View {
            mol,
            orders: &orders,
            rings: &rings,
        };
        mol.atoms().map(|a| view.implicit_h(a)).collect()
    };

    let bonds: Vec<EdgeIndex> = mol.bonds().collect();
    for e in bonds {
        let aromatic = flags.bonds[e.index()];
        let bond = mol.bond_mut_raw(e);
        bond.is_aromatic = aromatic;
        bond.bond_type = if aromatic {
            BondType::Aromatic
        } else {
            orders[e.index()]
        };
    }
    let atoms: Vec<NodeIndex> = mol.atoms().collect();
    for &a in &atoms {
        mol.atom_mut_raw(a).is_aromatic = flags.atoms[a.index()];
    }
    for &a in &atoms {
        if !flags.atoms[a.index()] || mol.atom(a).no_implicit {
            continue;
        }
        let now = crate::valence::implicit_h(mol, a);
        let before = kekule_h[a.index()];
        if before > now {
            mol.atom_mut_raw(a).explicit_h_count += before - now;
        }
    }
    mol.cache_mut().mark_stale(CacheFlags::ELEMENT_EDIT);

    debug!(
        ?model,
        aromatic_atoms = flags.atoms.iter().filter(|&&f| f).count(),
        "aromaticity set"
    );
    Ok(())
}
