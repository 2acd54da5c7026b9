use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};

use crate::props::PropertyBag;
use crate::query::BondExpr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BondType {
    Unspecified,
    #[default]
    Single,
    Double,
    Triple,
    Aromatic,
    /// Coordinate bond; contributes valence only to its end atom.
    Dative,
}

impl BondType {
    /// Bond order in half-units (aromatic counts 3, i.e. 1.5).
    pub fn twice_order(self) -> u8 {
        match self {
            Self::Unspecified => 0,
            Self::Single | Self::Dative => 2,
            Self::Double => 4,
            Self::Triple => 6,
            Self::Aromatic => 3,
        }
    }

    /// Integral bond order used when counting unsaturation; aromatic counts as 1.
    pub fn integral_order(self) -> u8 {
        match self {
            Self::Unspecified => 0,
            Self::Single | Self::Dative | Self::Aromatic => 1,
            Self::Double => 2,
            Self::Triple => 3,
        }
    }

    pub fn is_multiple(self) -> bool {
        matches!(self, Self::Double | Self::Triple | Self::Aromatic)
    }
}

/// SMILES-style bond direction, recorded relative to the bond's begin atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BondDir {
    #[default]
    None,
    /// `/` written from begin to end atom.
    EndUpRight,
    /// `\` written from begin to end atom.
    EndDownRight,
}

impl BondDir {
    pub fn flipped(self) -> Self {
        match self {
            Self::EndUpRight => Self::EndDownRight,
            Self::EndDownRight => Self::EndUpRight,
            Self::None => Self::None,
        }
    }
}

/// Double-bond stereo descriptor.
///
/// `Cis`/`Trans` and `Z`/`E` are all interpreted relative to the bond's
/// `stereo_atoms`: `Cis`/`Z` put them on the same side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BondStereo {
    #[default]
    None,
    Any,
    Z,
    E,
    Cis,
    Trans,
}

impl BondStereo {
    /// `Some(true)` when the stereo atoms are on the same side.
    pub fn same_side(self) -> Option<bool> {
        match self {
            Self::Z | Self::Cis => Some(true),
            Self::E | Self::Trans => Some(false),
            Self::None | Self::Any => None,
        }
    }
}

/// An edge of a [`Mol`](crate::Mol). The begin and end atoms are the edge
/// endpoints as stored in the graph; their order is significant for dative
/// bonds and for `dir`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bond {
    pub bond_type: BondType,
    pub dir: BondDir,
    pub stereo: BondStereo,
    /// Reference neighbours of the begin and end atom for `stereo`.
    pub stereo_atoms: Option<(NodeIndex, NodeIndex)>,
    pub is_aromatic: bool,
    pub is_conjugated: bool,
    pub query: Option<BondExpr>,
    pub props: PropertyBag,
}

impl Bond {
    pub fn new(bond_type: BondType) -> Self {
        Self {
            bond_type,
            is_aromatic: bond_type == BondType::Aromatic,
            ..Self::default()
        }
    }

    pub fn single() -> Self {
        Self::new(BondType::Single)
    }

    pub fn double() -> Self {
        Self::new(BondType::Double)
    }

    pub fn triple() -> Self {
        Self::new(BondType::Triple)
    }

    pub fn aromatic() -> Self {
        Self::new(BondType::Aromatic)
    }

    pub fn from_query(expr: BondExpr) -> Self {
        let bond_type = expr.implied_type().unwrap_or(BondType::Unspecified);
        Self {
            bond_type,
            is_aromatic: bond_type == BondType::Aromatic,
            query: Some(expr),
            ..Self::default()
        }
    }

    pub fn is_query(&self) -> bool {
        self.query.is_some()
    }

    pub(crate) fn replace_preserving_props(&mut self, other: Bond) {
        let saved = std::mem::take(&mut self.props);
        *self = other;
        self.props.merge_user_from(&saved);
    }
}
