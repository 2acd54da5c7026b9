//! Compact binary form of a [`Mol`].
//!
//! Layout, all integers little-endian:
//!
//! ```text
//! magic "MKB" version:u8
//! props
//! n_atoms:u32  atom*
//! n_bonds:u32  bond*
//! n_conformers:u32  (id:u32 is_3d:u8 [f64; 3]*n_atoms)*
//! n_stereo_groups:u32  (type:u8 n:u32 atom:u32*)*
//! n_substance_groups:u32  (type:str atoms bonds parent_atoms props)*
//! ```
//!
//! Query atoms and bonds have no binary form. Derived values in the property
//! cache are not stored; a decoded molecule starts with a stale cache.

use petgraph::graph::{EdgeIndex, NodeIndex};
use thiserror::Error;
use tracing::debug;

use crate::atom::{Atom, ChiralTag};
use crate::bond::{Bond, BondDir, BondStereo, BondType};
use crate::conformer::Conformer;
use crate::error::StructuralError;
use crate::groups::{StereoGroup, StereoGroupType, SubstanceGroup};
use crate::mol::Mol;
use crate::props::{PropValue, PropertyBag};

const MAGIC: &[u8; 3] = b"MKB";
const VERSION: u8 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PickleError {
    #[error("not a molecule blob")]
    BadMagic,
    #[error("unsupported blob version {0}")]
    UnsupportedVersion(u8),
    #[error("blob ends early at byte {0}")]
    Truncated(usize),
    #[error("invalid {what} at byte {offset}")]
    InvalidValue { what: &'static str, offset: usize },
    #[error("{what} index {index} is out of range")]
    InvalidIndex { what: &'static str, index: usize },
    #[error("{0} trailing bytes after the molecule")]
    TrailingBytes(usize),
    #[error("query {0} {1} cannot be serialized")]
    QueryNotSerializable(&'static str, usize),
    #[error(transparent)]
    Structural(#[from] StructuralError),
}

impl Mol {
    /// Serializes the molecule. The output depends only on the graph and its
    /// annotations, so equal molecules give equal bytes.
    pub fn to_binary(&self) -> Result<Vec<u8>, PickleError> {
        let mut w = Writer::default();
        w.bytes(MAGIC);
        w.u8(VERSION);
        w.props(self.props());

        w.len(self.atom_count());
        for a in self.atoms() {
            let atom = self.atom(a);
            if atom.is_query() {
                return Err(PickleError::QueryNotSerializable("atom", a.index()));
            }
            w.atom(atom);
        }

        w.len(self.bond_count());
        for e in self.bonds() {
            let bond = self.bond(e);
            if bond.is_query() {
                return Err(PickleError::QueryNotSerializable("bond", e.index()));
            }
            let (begin, end) = self.bond_atoms(e);
            w.index(begin.index());
            w.index(end.index());
            w.bond(bond);
        }

        w.len(self.conformers().len());
        for conf in self.conformers() {
            w.u32(conf.id);
            w.u8(u8::from(conf.is_3d));
            for p in &conf.positions {
                for &x in p {
                    w.f64(x);
                }
            }
        }

        w.len(self.stereo_groups().len());
        for group in self.stereo_groups() {
            w.u8(match group.group_type {
                StereoGroupType::Absolute => 0,
                StereoGroupType::Or => 1,
                StereoGroupType::And => 2,
            });
            w.indices(group.atoms.iter().map(|a| a.index()));
        }

        w.len(self.substance_groups().len());
        for group in self.substance_groups() {
            w.str(&group.group_type);
            w.indices(group.atoms.iter().map(|a| a.index()));
            w.indices(group.bonds.iter().map(|b| b.index()));
            w.indices(group.parent_atoms.iter().map(|a| a.index()));
            w.props(&group.props);
        }

        debug!(
            atoms = self.atom_count(),
            bonds = self.bond_count(),
            bytes = w.buf.len(),
            "serialized molecule"
        );
        Ok(w.buf)
    }

    pub fn from_binary(bytes: &[u8]) -> Result<Mol, PickleError> {
        let mut r = Reader { bytes, pos: 0 };
        if r.take(MAGIC.len()).map_err(|_| PickleError::BadMagic)? != MAGIC {
            return Err(PickleError::BadMagic);
        }
        let version = r.u8()?;
        if version != VERSION {
            return Err(PickleError::UnsupportedVersion(version));
        }

        let mut mol = Mol::new();
        *mol.props_mut() = r.props()?;

        let n_atoms = r.len()?;
        for _ in 0..n_atoms {
            let atom = r.atom()?;
            mol.add_atom(atom);
        }

        let n_bonds = r.len()?;
        for _ in 0..n_bonds {
            let begin = r.atom_index(n_atoms)?;
            let end = r.atom_index(n_atoms)?;
            let bond = r.bond(n_atoms)?;
            mol.add_bond(begin, end, bond)?;
        }

        let n_confs = r.len()?;
        for _ in 0..n_confs {
            let id = r.u32()?;
            let is_3d = r.bool("conformer flag")?;
            let mut positions = Vec::with_capacity(n_atoms);
            for _ in 0..n_atoms {
                positions.push([r.f64()?, r.f64()?, r.f64()?]);
            }
            let mut conf = Conformer::new(id, positions);
            conf.is_3d = is_3d;
            mol.add_conformer(conf, false)?;
        }

        let n_stereo = r.len()?;
        for _ in 0..n_stereo {
            let offset = r.pos;
            let group_type = match r.u8()? {
                0 => StereoGroupType::Absolute,
                1 => StereoGroupType::Or,
                2 => StereoGroupType::And,
                _ => {
                    return Err(PickleError::InvalidValue {
                        what: "stereo group type",
                        offset,
                    })
                }
            };
            let atoms = r.atom_indices(n_atoms)?;
            mol.add_stereo_group(StereoGroup::new(group_type, atoms))?;
        }

        let n_sgroups = r.len()?;
        for _ in 0..n_sgroups {
            let mut group = SubstanceGroup::new(r.str()?);
            group.atoms = r.atom_indices(n_atoms)?;
            group.bonds = r
                .indices("bond", n_bonds)?
                .into_iter()
                .map(EdgeIndex::new)
                .collect();
            group.parent_atoms = r.atom_indices(n_atoms)?;
            group.props = r.props()?;
            mol.add_substance_group(group)?;
        }

        let left = r.bytes.len() - r.pos;
        if left > 0 {
            return Err(PickleError::TrailingBytes(left));
        }
        Ok(mol)
    }
}

#[derive(Default)]
struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn bytes(&mut self, b: &[u8]) {
        self.buf.extend_from_slice(b);
    }

    fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn u16(&mut self, v: u16) {
        self.bytes(&v.to_le_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.bytes(&v.to_le_bytes());
    }

    fn i64(&mut self, v: i64) {
        self.bytes(&v.to_le_bytes());
    }

    fn f64(&mut self, v: f64) {
        self.bytes(&v.to_le_bytes());
    }

    fn len(&mut self, n: usize) {
        self.u32(n as u32);
    }

    fn index(&mut self, i: usize) {
        self.u32(i as u32);
    }

    fn indices(&mut self, it: impl ExactSizeIterator<Item = usize>) {
        self.len(it.len());
        for i in it {
            self.index(i);
        }
    }

    fn str(&mut self, s: &str) {
        self.len(s.len());
        self.bytes(s.as_bytes());
    }

    fn props(&mut self, bag: &PropertyBag) {
        let user: Vec<_> = bag.user_props().collect();
        let computed: Vec<_> = bag.computed_props().collect();
        self.len(user.len() + computed.len());
        for (computed, (key, value)) in user
            .into_iter()
            .map(|kv| (false, kv))
            .chain(computed.into_iter().map(|kv| (true, kv)))
        {
            self.u8(u8::from(computed));
            self.str(key);
            match value {
                PropValue::Bool(b) => {
                    self.u8(0);
                    self.u8(u8::from(*b));
                }
                PropValue::Int(i) => {
                    self.u8(1);
                    self.i64(*i);
                }
                PropValue::Float(f) => {
                    self.u8(2);
                    self.f64(*f);
                }
                PropValue::Str(s) => {
                    self.u8(3);
                    self.str(s);
                }
            }
        }
    }

    fn atom(&mut self, atom: &Atom) {
        self.u8(atom.atomic_num);
        self.u8(atom.formal_charge as u8);
        self.u16(atom.isotope);
        self.u8(atom.explicit_h_count);
        self.u8(atom.num_radical_electrons);
        self.u8(u8::from(atom.no_implicit) | u8::from(atom.is_aromatic) << 1);
        self.u8(match atom.chiral_tag {
            ChiralTag::Unspecified => 0,
            ChiralTag::TetrahedralCw => 1,
            ChiralTag::TetrahedralCcw => 2,
            ChiralTag::Other => 3,
        });
        self.u16(atom.atom_map);
        self.props(&atom.props);
    }

    fn bond(&mut self, bond: &Bond) {
        self.u8(match bond.bond_type {
            BondType::Unspecified => 0,
            BondType::Single => 1,
            BondType::Double => 2,
            BondType::Triple => 3,
            BondType::Aromatic => 4,
            BondType::Dative => 5,
        });
        self.u8(match bond.dir {
            BondDir::None => 0,
            BondDir::EndUpRight => 1,
            BondDir::EndDownRight => 2,
        });
        self.u8(match bond.stereo {
            BondStereo::None => 0,
            BondStereo::Any => 1,
            BondStereo::Z => 2,
            BondStereo::E => 3,
            BondStereo::Cis => 4,
            BondStereo::Trans => 5,
        });
        self.u8(
            u8::from(bond.is_aromatic)
                | u8::from(bond.is_conjugated) << 1
                | u8::from(bond.stereo_atoms.is_some()) << 2,
        );
        if let Some((a, b)) = bond.stereo_atoms {
            self.index(a.index());
            self.index(b.index());
        }
        self.props(&bond.props);
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], PickleError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(PickleError::Truncated(self.pos))?;
        let out = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], PickleError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, PickleError> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16, PickleError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32, PickleError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn i64(&mut self) -> Result<i64, PickleError> {
        Ok(i64::from_le_bytes(self.array()?))
    }

    fn f64(&mut self) -> Result<f64, PickleError> {
        Ok(f64::from_le_bytes(self.array()?))
    }

    fn bool(&mut self, what: &'static str) -> Result<bool, PickleError> {
        let offset = self.pos;
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(PickleError::InvalidValue { what, offset }),
        }
    }

    /// A count, checked against the bytes left so a corrupt length cannot
    /// trigger a huge allocation.
    fn len(&mut self) -> Result<usize, PickleError> {
        let n = self.u32()? as usize;
        if n > self.bytes.len() - self.pos {
            return Err(PickleError::Truncated(self.pos));
        }
        Ok(n)
    }

    fn indices(&mut self, what: &'static str, bound: usize) -> Result<Vec<usize>, PickleError> {
        let n = self.len()?;
        (0..n)
            .map(|_| {
                let i = self.u32()? as usize;
                if i < bound {
                    Ok(i)
                } else {
                    Err(PickleError::InvalidIndex { what, index: i })
                }
            })
            .collect()
    }

    fn atom_index(&mut self, n_atoms: usize) -> Result<NodeIndex, PickleError> {
        let i = self.u32()? as usize;
        if i < n_atoms {
            Ok(NodeIndex::new(i))
        } else {
            Err(PickleError::InvalidIndex {
                what: "atom",
                index: i,
            })
        }
    }

    fn atom_indices(&mut self, n_atoms: usize) -> Result<Vec<NodeIndex>, PickleError> {
        Ok(self
            .indices("atom", n_atoms)?
            .into_iter()
            .map(NodeIndex::new)
            .collect())
    }

    fn str(&mut self) -> Result<String, PickleError> {
        let n = self.len()?;
        let offset = self.pos;
        let raw = self.take(n)?;
        String::from_utf8(raw.to_vec()).map_err(|_| PickleError::InvalidValue {
            what: "string",
            offset,
        })
    }

    fn props(&mut self) -> Result<PropertyBag, PickleError> {
        let mut bag = PropertyBag::new();
        let n = self.len()?;
        for _ in 0..n {
            let computed = self.bool("property partition")?;
            let key = self.str()?;
            let offset = self.pos;
            let value = match self.u8()? {
                0 => PropValue::Bool(self.bool("boolean property")?),
                1 => PropValue::Int(self.i64()?),
                2 => PropValue::Float(self.f64()?),
                3 => PropValue::Str(self.str()?),
                _ => {
                    return Err(PickleError::InvalidValue {
                        what: "property type",
                        offset,
                    })
                }
            };
            if computed {
                bag.set_computed(key, value);
            } else {
                bag.set(key, value);
            }
        }
        Ok(bag)
    }

    fn atom(&mut self) -> Result<Atom, PickleError> {
        let mut atom = Atom::new(self.u8()?);
        atom.formal_charge = self.u8()? as i8;
        atom.isotope = self.u16()?;
        atom.explicit_h_count = self.u8()?;
        atom.num_radical_electrons = self.u8()?;
        let offset = self.pos;
        let flags = self.u8()?;
        if flags & !0b11 != 0 {
            return Err(PickleError::InvalidValue {
                what: "atom flags",
                offset,
            });
        }
        atom.no_implicit = flags & 1 != 0;
        atom.is_aromatic = flags & 2 != 0;
        let offset = self.pos;
        atom.chiral_tag = match self.u8()? {
            0 => ChiralTag::Unspecified,
            1 => ChiralTag::TetrahedralCw,
            2 => ChiralTag::TetrahedralCcw,
            3 => ChiralTag::Other,
            _ => {
                return Err(PickleError::InvalidValue {
                    what: "chiral tag",
                    offset,
                })
            }
        };
        atom.atom_map = self.u16()?;
        atom.props = self.props()?;
        Ok(atom)
    }

    fn bond(&mut self, n_atoms: usize) -> Result<Bond, PickleError> {
        let mut bond = Bond::default();
        let offset = self.pos;
        bond.bond_type = match self.u8()? {
            0 => BondType::Unspecified,
            1 => BondType::Single,
            2 => BondType::Double,
            3 => BondType::Triple,
            4 => BondType::Aromatic,
            5 => BondType::Dative,
            _ => {
                return Err(PickleError::InvalidValue {
                    what: "bond type",
                    offset,
                })
            }
        };
        let offset = self.pos;
        bond.dir = match self.u8()? {
            0 => BondDir::None,
            1 => BondDir::EndUpRight,
            2 => BondDir::EndDownRight,
            _ => {
                return Err(PickleError::InvalidValue {
                    what: "bond direction",
                    offset,
                })
            }
        };
        let offset = self.pos;
        bond.stereo = match self.u8()? {
            0 => BondStereo::None,
            1 => BondStereo::Any,
            2 => BondStereo::Z,
            3 => BondStereo::E,
            4 => BondStereo::Cis,
            5 => BondStereo::Trans,
            _ => {
                return Err(PickleError::InvalidValue {
                    what: "bond stereo",
                    offset,
                })
            }
        };
        let offset = self.pos;
        let flags = self.u8()?;
        if flags & !0b111 != 0 {
            return Err(PickleError::InvalidValue {
                what: "bond flags",
                offset,
            });
        }
        bond.is_aromatic = flags & 1 != 0;
        bond.is_conjugated = flags & 2 != 0;
        if flags & 4 != 0 {
            bond.stereo_atoms = Some((self.atom_index(n_atoms)?, self.atom_index(n_atoms)?));
        }
        bond.props = self.props()?;
        Ok(bond)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smarts::from_smarts;
    use crate::smiles::{from_smiles, to_canonical_smiles};

    fn round_trip(mol: &Mol) -> Mol {
        Mol::from_binary(&mol.to_binary().unwrap()).unwrap()
    }

    #[test]
    fn sanitized_molecule_round_trips() {
        for smiles in ["CCO", "c1ccccc1C(=O)[O-].[Na+]", "F/C=C/F", "N[C@@H](C)C(=O)O", "[13CH4]"] {
            let mol = from_smiles(smiles).unwrap();
            let back = round_trip(&mol);
            assert_eq!(back, mol, "{smiles}");
            assert_eq!(to_canonical_smiles(&back), to_canonical_smiles(&mol));
        }
    }

    #[test]
    fn output_is_deterministic() {
        let a = from_smiles("OC(=O)c1ccccc1").unwrap().to_binary().unwrap();
        let b = from_smiles("OC(=O)c1ccccc1").unwrap().to_binary().unwrap();
        assert_eq!(a, b);
        assert_eq!(&a[..4], b"MKB\x01");
    }

    #[test]
    fn annotations_round_trip() {
        let mut mol = from_smiles("CC(O)CC").unwrap();
        mol.props_mut().set("_Name", "butanol");
        mol.props_mut().set_computed("score", 0.5);
        mol.atom_mut(NodeIndex::new(2)).props.set("label", 7);
        mol.bond_mut(EdgeIndex::new(0)).props.set("flag", true);
        let positions = (0..mol.atom_count()).map(|i| [i as f64, 0.5, -1.0]).collect();
        mol.add_conformer(Conformer::new(4, positions), false).unwrap();
        mol.add_stereo_group(StereoGroup::new(StereoGroupType::Or, vec![NodeIndex::new(1)]))
            .unwrap();
        let mut sgroup = SubstanceGroup::new("SUP")
            .with_atoms([NodeIndex::new(2)])
            .with_bonds([EdgeIndex::new(1)]);
        sgroup.props.set("LABEL", "OH");
        mol.add_substance_group(sgroup).unwrap();

        let back = round_trip(&mol);
        assert_eq!(back, mol);
        assert!(back.props().is_computed("score"));
        assert_eq!(back.conformer(4).unwrap().position(3), Some([3.0, 0.5, -1.0]));
    }

    #[test]
    fn rejects_query_molecules() {
        let query = from_smarts("[C,N]").unwrap();
        assert_eq!(
            query.to_binary(),
            Err(PickleError::QueryNotSerializable("atom", 0))
        );
    }

    #[test]
    fn rejects_corrupt_input() {
        let bytes = from_smiles("CCO").unwrap().to_binary().unwrap();
        assert_eq!(Mol::from_binary(b"XYZ\x01"), Err(PickleError::BadMagic));
        assert_eq!(Mol::from_binary(b"MK"), Err(PickleError::BadMagic));
        assert_eq!(
            Mol::from_binary(b"MKB\x07"),
            Err(PickleError::UnsupportedVersion(7))
        );
        assert!(matches!(
            Mol::from_binary(&bytes[..bytes.len() - 1]),
            Err(PickleError::Truncated(_))
        ));
        let mut long = bytes.clone();
        long.push(0);
        assert_eq!(Mol::from_binary(&long), Err(PickleError::TrailingBytes(1)));
    }

    #[test]
    fn rejects_out_of_range_bond_atoms() {
        let mut mol = Mol::new();
        let a = mol.add_atom(Atom::new(6));
        let b = mol.add_atom(Atom::new(6));
        mol.add_bond(a, b, Bond::single()).unwrap();
        let mut bytes = mol.to_binary().unwrap();
        // magic, version, empty mol props, atom count, two 10-byte atoms with
        // empty props, bond count, then the begin atom.
        let begin = 4 + 4 + 4 + 2 * (10 + 4) + 4;
        bytes[begin] = 9;
        assert_eq!(
            Mol::from_binary(&bytes),
            Err(PickleError::InvalidIndex {
                what: "atom",
                index: 9
            })
        );
    }
}
