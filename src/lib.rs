//! Molecular graph engine.
//!
//! A [`Mol`] is an undirected graph of [`Atom`]s and [`Bond`]s with a
//! property cache for derived values (valence, rings, hybridization,
//! conjugation). Around it sit the sanitizer, aromaticity perception,
//! Kekulization, substructure search, SMILES and SMARTS text, canonical
//! ranking, fingerprints and a binary interchange format.
//!
//! ```
//! use molkit::smiles::{from_smiles, to_canonical_smiles};
//!
//! let mol = from_smiles("OCC").unwrap();
//! assert_eq!(to_canonical_smiles(&mol), to_canonical_smiles(&from_smiles("CCO").unwrap()));
//! ```

pub mod aromaticity;
pub mod atom;
pub mod bond;
pub mod cache;
pub mod canonical;
pub mod conformer;
pub mod conjugation;
pub mod element;
pub mod error;
pub mod fingerprint;
pub mod graph_ops;
pub mod groups;
pub mod hybridization;
pub mod kekulize;
pub mod mol;
pub mod pickle;
pub mod props;
pub mod query;
pub mod rings;
pub mod salts;
pub mod sanitize;
pub mod smarts;
pub mod smiles;
pub mod stereo;
pub mod substruct;
pub mod valence;

pub use aromaticity::AromaticityModel;
pub use atom::{Atom, ChiralTag, Hybridization};
pub use bond::{Bond, BondDir, BondStereo, BondType};
pub use cache::ReadMode;
pub use conformer::Conformer;
pub use error::{Error, Result, StructuralError};
pub use groups::{StereoGroup, StereoGroupType, SubstanceGroup};
pub use mol::{BatchEdit, Mol};
pub use props::{PropValue, PropertyBag};
pub use rings::RingInfo;
pub use sanitize::{detect_chemistry_problems, sanitize, SanitizeError, SanitizeFlags};
pub use smarts::{from_smarts, to_smarts};
pub use smiles::{from_smiles, to_canonical_smiles, to_smiles};
