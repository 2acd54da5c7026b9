use serde::{Deserialize, Serialize};

use crate::element;
use crate::props::PropertyBag;
use crate::query::AtomExpr;

/// Tetrahedral chirality tag stored on an atom.
///
/// The tag is interpreted against the atom's reference neighbour order: the
/// implicit hydrogen (if any) first, then neighbours in ascending bond-index
/// order. [`ChiralTag::TetrahedralCcw`] means that, looking from the first
/// reference neighbour, the remaining ones run counter-clockwise (SMILES `@`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ChiralTag {
    #[default]
    Unspecified,
    /// `@@`
    TetrahedralCw,
    /// `@`
    TetrahedralCcw,
    /// Non-tetrahedral marker that this crate preserves but does not perceive.
    Other,
}

impl ChiralTag {
    pub fn is_tetrahedral(self) -> bool {
        matches!(self, Self::TetrahedralCw | Self::TetrahedralCcw)
    }

    pub fn inverted(self) -> Self {
        match self {
            Self::TetrahedralCw => Self::TetrahedralCcw,
            Self::TetrahedralCcw => Self::TetrahedralCw,
            other => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Hybridization {
    #[default]
    Unspecified,
    S,
    SP,
    SP2,
    SP3,
    SP3D,
    SP3D2,
    Other,
}

/// A node of a [`Mol`](crate::Mol).
///
/// `Atom` stores what can be read off a structural formula. Derived values
/// such as explicit valence, implicit hydrogen count and hybridization live in
/// the molecule's property cache and are read through `Mol` accessors.
///
/// An atom is either concrete (`query` is `None`) or a query atom carrying a
/// predicate used by the substructure matcher.
///
/// # Examples
///
/// ```
/// use molkit::Atom;
///
/// let nitrogen = Atom::new(7);
/// assert_eq!(nitrogen.symbol(), "N");
/// assert!(!nitrogen.is_query());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Atom {
    /// Atomic number; `0` is a dummy atom (`*`).
    pub atomic_num: u8,
    pub formal_charge: i8,
    /// Mass number. `0` means natural abundance.
    pub isotope: u16,
    /// Hydrogens recorded on the atom itself, e.g. `[NH2]`.
    pub explicit_h_count: u8,
    /// Forbids implicit hydrogens. Set for bracket atoms.
    pub no_implicit: bool,
    pub num_radical_electrons: u8,
    pub chiral_tag: ChiralTag,
    pub is_aromatic: bool,
    /// SMILES atom class (`[CH3:1]`); `0` means unmapped.
    pub atom_map: u16,
    pub query: Option<AtomExpr>,
    pub props: PropertyBag,
}

impl Atom {
    pub fn new(atomic_num: u8) -> Self {
        Self {
            atomic_num,
            ..Self::default()
        }
    }

    pub fn aromatic(atomic_num: u8) -> Self {
        Self {
            atomic_num,
            is_aromatic: true,
            ..Self::default()
        }
    }

    /// Builds a query atom whose predicate is `expr`. Concrete fields are left
    /// at their defaults except where a primitive pins them down.
    pub fn from_query(expr: AtomExpr) -> Self {
        let mut atom = Self::default();
        if let Some((z, aromatic)) = expr.single_element() {
            atom.atomic_num = z;
            atom.is_aromatic = aromatic.unwrap_or(false);
        }
        atom.query = Some(expr);
        atom
    }

    pub fn is_query(&self) -> bool {
        self.query.is_some()
    }

    pub fn symbol(&self) -> &'static str {
        element::symbol(self.atomic_num)
    }

    pub fn mass(&self) -> f64 {
        if self.isotope > 0 {
            self.isotope as f64
        } else {
            element::atomic_weight(self.atomic_num)
        }
    }

    /// Copies every intrinsic field from `other` but keeps this atom's user
    /// properties merged on top of `other`'s.
    pub(crate) fn replace_preserving_props(&mut self, other: Atom) {
        let saved = std::mem::take(&mut self.props);
        *self = other;
        self.props.merge_user_from(&saved);
    }
}
