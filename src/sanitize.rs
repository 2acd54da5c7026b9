//! The sanitization pipeline.
//!
//! Stages run in the fixed order of [`SanitizeFlags`]; a caller selects a
//! subset with the flag set. The first failing stage aborts the run and the
//! molecule keeps whatever the earlier stages did.

use bitflags::bitflags;
use petgraph::graph::{EdgeIndex, NodeIndex};
use thiserror::Error;
use tracing::debug;

use crate::aromaticity::{self, AromaticityModel};
use crate::bond::BondType;
use crate::cache::CacheFlags;
use crate::conjugation;
use crate::error::{Error, Result};
use crate::hybridization;
use crate::kekulize;
use crate::mol::Mol;
use crate::stereo;
use crate::valence;

bitflags! {
    /// Sanitizer stages, in execution order.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SanitizeFlags: u16 {
        /// Drop computed properties and cached values.
        const CLEAR_COMPUTED = 1;
        /// Rewrite hypervalent nitro and perhalate groups as charge-separated.
        const CLEANUP = 1 << 1;
        /// Check valences and compute implicit hydrogens.
        const PROPERTIES = 1 << 2;
        const SYMM_RINGS = 1 << 3;
        const FIND_RADICALS = 1 << 4;
        const SET_CONJUGATION = 1 << 5;
        const SET_HYBRIDIZATION = 1 << 6;
        const SET_AROMATICITY = 1 << 7;
        const KEKULIZE = 1 << 8;
        const CLEANUP_CHIRALITY = 1 << 9;
        const ASSIGN_STEREOCHEMISTRY = 1 << 10;
        const ADJUST_HS = 1 << 11;

        const ALL = Self::CLEAR_COMPUTED.bits()
            | Self::CLEANUP.bits()
            | Self::PROPERTIES.bits()
            | Self::SYMM_RINGS.bits()
            | Self::FIND_RADICALS.bits()
            | Self::SET_CONJUGATION.bits()
            | Self::SET_HYBRIDIZATION.bits()
            | Self::SET_AROMATICITY.bits()
            | Self::KEKULIZE.bits()
            | Self::CLEANUP_CHIRALITY.bits()
            | Self::ASSIGN_STEREOCHEMISTRY.bits()
            | Self::ADJUST_HS.bits();
    }
}

impl Default for SanitizeFlags {
    fn default() -> Self {
        Self::ALL
    }
}

const STAGES: [(SanitizeFlags, &str); 12] = [
    (SanitizeFlags::CLEAR_COMPUTED, "clear computed"),
    (SanitizeFlags::CLEANUP, "cleanup"),
    (SanitizeFlags::PROPERTIES, "properties"),
    (SanitizeFlags::SYMM_RINGS, "symmetrize rings"),
    (SanitizeFlags::FIND_RADICALS, "find radicals"),
    (SanitizeFlags::SET_CONJUGATION, "set conjugation"),
    (SanitizeFlags::SET_HYBRIDIZATION, "set hybridization"),
    (SanitizeFlags::SET_AROMATICITY, "set aromaticity"),
    (SanitizeFlags::KEKULIZE, "kekulize"),
    (SanitizeFlags::CLEANUP_CHIRALITY, "cleanup chirality"),
    (SanitizeFlags::ASSIGN_STEREOCHEMISTRY, "assign stereochemistry"),
    (SanitizeFlags::ADJUST_HS, "adjust hydrogens"),
];

/// A failed sanitizer stage and the error it raised.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("sanitization failed at {}: {error}", stage_name(.stage))]
pub struct SanitizeError {
    pub stage: SanitizeFlags,
    pub error: Error,
}

fn stage_name(stage: &SanitizeFlags) -> &'static str {
    STAGES
        .iter()
        .find(|(flag, _)| flag == stage)
        .map_or("unknown stage", |(_, name)| name)
}

/// Runs the selected stages with the default aromaticity model.
pub fn sanitize(mol: &mut Mol, flags: SanitizeFlags) -> Result<(), SanitizeError> {
    sanitize_with(mol, flags, AromaticityModel::default())
}

/// Runs the selected stages, stopping at the first failure.
pub fn sanitize_with(
    mol: &mut Mol,
    flags: SanitizeFlags,
    model: AromaticityModel,
) -> Result<(), SanitizeError> {
    for (stage, name) in STAGES {
        if !flags.contains(stage) {
            continue;
        }
        debug!(stage = name, "sanitize");
        run_stage(mol, stage, flags, model).map_err(|error| SanitizeError { stage, error })?;
    }
    Ok(())
}

/// Every problem the selected stages would raise, without touching `mol`.
///
/// Valence problems are all reported rather than just the first; later
/// stages run on a copy whose valence stage was made permissive so they
/// still get a chance to report.
pub fn detect_chemistry_problems(mol: &Mol, flags: SanitizeFlags) -> Vec<SanitizeError> {
    let mut work = mol.clone();
    let mut problems = Vec::new();
    let model = AromaticityModel::default();
    for (stage, _) in STAGES {
        if !flags.contains(stage) {
            continue;
        }
        if stage == SanitizeFlags::PROPERTIES {
            problems.extend(valence::valence_errors(&work).into_iter().map(|e| SanitizeError {
                stage,
                error: e.into(),
            }));
            work.fill_property_cache();
            continue;
        }
        if let Err(error) = run_stage(&mut work, stage, flags, model) {
            problems.push(SanitizeError { stage, error });
            if stage.intersects(SanitizeFlags::SET_AROMATICITY | SanitizeFlags::KEKULIZE) {
                break;
            }
        }
    }
    problems
}

fn run_stage(
    mol: &mut Mol,
    stage: SanitizeFlags,
    flags: SanitizeFlags,
    model: AromaticityModel,
) -> Result<()> {
    if stage == SanitizeFlags::CLEAR_COMPUTED {
        clear_computed(mol);
    } else if stage == SanitizeFlags::CLEANUP {
        let fixed = cleanup(mol);
        if fixed > 0 {
            debug!(fixed, "normalized hypervalent groups");
        }
    } else if stage == SanitizeFlags::PROPERTIES {
        mol.update_property_cache(true)?;
    } else if stage == SanitizeFlags::SYMM_RINGS {
        let rings = mol.perceive_rings().num_rings();
        debug!(rings, "rings perceived");
    } else if stage == SanitizeFlags::FIND_RADICALS {
        find_radicals(mol);
        refresh(mol, SanitizeFlags::empty())?;
    } else if stage == SanitizeFlags::SET_CONJUGATION {
        conjugation::set_conjugation(mol);
    } else if stage == SanitizeFlags::SET_HYBRIDIZATION {
        hybridization::set_hybridization(mol);
    } else if stage == SanitizeFlags::SET_AROMATICITY {
        aromaticity::set_aromaticity(mol, model)?;
        refresh(mol, flags)?;
    } else if stage == SanitizeFlags::KEKULIZE {
        kekulize::kekulize(mol, false)?;
        refresh(mol, flags)?;
    } else if stage == SanitizeFlags::CLEANUP_CHIRALITY {
        stereo::cleanup_chirality(mol);
    } else if stage == SanitizeFlags::ASSIGN_STEREOCHEMISTRY {
        stereo::assign_stereochemistry(mol);
    } else if stage == SanitizeFlags::ADJUST_HS {
        let adjusted = adjust_hs(mol);
        if adjusted > 0 {
            debug!(adjusted, "hydrogens made explicit on aromatic atoms");
            refresh(mol, flags)?;
        }
    }
    Ok(())
}

/// Brings cached values back in line after a stage edited atoms or bonds.
/// Conjugation and hybridization are only recomputed when they were asked
/// for in this run.
fn refresh(mol: &mut Mol, flags: SanitizeFlags) -> Result<()> {
    mol.fill_property_cache();
    if flags.contains(SanitizeFlags::SET_CONJUGATION) {
        conjugation::set_conjugation(mol);
    }
    if flags.contains(SanitizeFlags::SET_HYBRIDIZATION) {
        hybridization::set_hybridization(mol);
    }
    Ok(())
}

fn clear_computed(mol: &mut Mol) {
    mol.props_mut().clear_computed();
    for idx in mol.atoms().collect::<Vec<_>>() {
        mol.atom_mut_raw(idx).props.clear_computed();
    }
    for edge in mol.bonds().collect::<Vec<_>>() {
        mol.bond_mut_raw(edge).props.clear_computed();
    }
    mol.cache_mut().reset();
}

/// Terminal neutral oxygens double-bonded to `idx`.
fn terminal_oxo(mol: &Mol, idx: NodeIndex) -> Vec<(NodeIndex, EdgeIndex)> {
    mol.sorted_bonds_of(idx)
        .into_iter()
        .filter(|&e| mol.bond(e).bond_type == BondType::Double)
        .map(|e| (mol.other_atom(e, idx), e))
        .filter(|&(o, _)| {
            let atom = mol.atom(o);
            atom.atomic_num == 8 && atom.formal_charge == 0 && mol.degree(o) == 1
        })
        .collect()
}

/// Charge-separates `N(=O)=O` style nitrogen and neutral perhalates.
/// Returns the number of groups rewritten.
fn cleanup(mol: &mut Mol) -> usize {
    let mut fixed = 0;
    for idx in mol.atoms().collect::<Vec<_>>() {
        let atom = mol.atom(idx);
        if atom.is_query() || atom.formal_charge != 0 {
            continue;
        }
        let (z, ev) = (atom.atomic_num, valence::explicit_valence(mol, idx));
        let oxo = terminal_oxo(mol, idx);
        let (charge, take) = match z {
            7 if ev == 5 && !oxo.is_empty() => (1, 1),
            17 | 35 | 53 if ev == 7 && oxo.len() == 3 => (3, 3),
            _ => continue,
        };
        for &(o, e) in oxo.iter().take(take) {
            mol.bond_mut(e).bond_type = BondType::Single;
            mol.atom_mut(o).formal_charge = -1;
        }
        let center = mol.atom_mut(idx);
        center.formal_charge = charge;
        center.no_implicit |= z != 7;
        fixed += 1;
    }
    fixed
}

/// Radical electrons on bracket atoms whose bonding leaves them short of a
/// full shell, e.g. `[CH3]` or `[O]`. Aromatic atoms are left alone.
fn find_radicals(mol: &mut Mol) {
    for idx in mol.atoms().collect::<Vec<_>>() {
        let atom = mol.atom(idx);
        if !atom.no_implicit
            || atom.is_query()
            || atom.atomic_num == 0
            || atom.is_aromatic
            || atom.num_radical_electrons > 0
        {
            continue;
        }
        let ev = valence::explicit_valence(mol, idx);
        let radicals = valence::radicals_for(mol, idx, ev);
        if radicals > 0 {
            mol.atom_mut(idx).num_radical_electrons = radicals;
        }
    }
}

/// Aromatic N and P that end up short of their default valence on the
/// Kekulé structure get the missing hydrogens recorded explicitly, so the
/// count no longer depends on aromatic rounding.
fn adjust_hs(mol: &mut Mol) -> usize {
    let mut adjusted = 0;
    for idx in mol.atoms().collect::<Vec<_>>() {
        let atom = mol.atom(idx);
        if !atom.is_aromatic
            || !matches!(atom.atomic_num, 7 | 15)
            || atom.formal_charge != 0
            || atom.explicit_h_count != 0
            || atom.no_implicit
        {
            continue;
        }
        let bond_sum: u8 = mol
            .bonds_of(idx)
            .map(|e| mol.bond(e).bond_type.integral_order())
            .sum();
        let Some(&default) = crate::element::default_valences(atom.atomic_num).first() else {
            continue;
        };
        let implicit = valence::implicit_h(mol, idx);
        if bond_sum < default && implicit > 0 {
            let atom = mol.atom_mut_raw(idx);
            atom.explicit_h_count = implicit;
            atom.no_implicit = true;
            adjusted += 1;
        }
    }
    if adjusted > 0 {
        mol.cache_mut().mark_stale(CacheFlags::VALENCE);
    }
    adjusted
}
