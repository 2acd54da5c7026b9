use petgraph::graph::NodeIndex;

use crate::atom::{Atom, ChiralTag};
use crate::bond::{Bond, BondDir, BondType};
use crate::error::StructuralError;
use crate::mol::Mol;
use crate::smiles::error::SmilesError;
use crate::smiles::parse_tree::{ParseAtom, ParseBond, ParseTree};
use crate::smiles::tokenizer::{BondToken, ChiralityToken};
use crate::stereo::translate_tag;

pub fn build_mol(tree: &ParseTree) -> Result<Mol, SmilesError> {
    let mut mol = Mol::new();
    let nodes: Vec<NodeIndex> = tree
        .atoms
        .iter()
        .map(|pa| mol.add_atom(atom_from_token(pa)))
        .collect();

    for pb in &tree.bonds {
        let (bond, reversed) = bond_from_token(pb, &tree.atoms);
        let (begin, end) = if reversed {
            (nodes[pb.end], nodes[pb.begin])
        } else {
            (nodes[pb.begin], nodes[pb.end])
        };
        mol.add_bond(begin, end, bond).map_err(|e| match e {
            StructuralError::SelfBond(_) => SmilesError::SelfBond { pos: pb.pos },
            _ => SmilesError::DuplicateBond { pos: pb.pos },
        })?;
    }

    for (i, pa) in tree.atoms.iter().enumerate() {
        if pa.token.chirality != ChiralityToken::None {
            let tag = chiral_tag(&mol, tree, i, nodes[i]);
            mol.atom_mut_raw(nodes[i]).chiral_tag = tag;
        }
    }

    Ok(mol)
}

fn atom_from_token(pa: &ParseAtom) -> Atom {
    let tok = &pa.token;
    Atom {
        atomic_num: tok.atomic_num,
        formal_charge: tok.charge,
        isotope: tok.isotope,
        explicit_h_count: tok.hcount.unwrap_or(0),
        no_implicit: tok.is_bracket,
        is_aromatic: tok.is_aromatic,
        atom_map: tok.atom_class,
        ..Atom::default()
    }
}

/// Bond for a parsed edge, and whether begin and end must be swapped to put
/// the acceptor of a `<-` dative bond at the end.
fn bond_from_token(pb: &ParseBond, atoms: &[ParseAtom]) -> (Bond, bool) {
    let both_aromatic = atoms[pb.begin].token.is_aromatic && atoms[pb.end].token.is_aromatic;
    match pb.bond {
        None if both_aromatic => (Bond::aromatic(), false),
        None | Some(BondToken::Single) => (Bond::single(), false),
        Some(BondToken::Double) => (Bond::double(), false),
        Some(BondToken::Triple) => (Bond::triple(), false),
        Some(BondToken::Aromatic) => (Bond::aromatic(), false),
        Some(BondToken::Up) => (directional(BondDir::EndUpRight), false),
        Some(BondToken::Down) => (directional(BondDir::EndDownRight), false),
        Some(BondToken::DativeRight) => (Bond::new(BondType::Dative), false),
        Some(BondToken::DativeLeft) => (Bond::new(BondType::Dative), true),
    }
}

fn directional(dir: BondDir) -> Bond {
    Bond {
        dir,
        ..Bond::single()
    }
}

/// Translates the written `@`/`@@` into a tag relative to the atom's
/// reference frame.
fn chiral_tag(mol: &Mol, tree: &ParseTree, i: usize, node: NodeIndex) -> ChiralTag {
    let pa = &tree.atoms[i];
    let written_tag = match pa.token.chirality {
        ChiralityToken::CounterClockwise => ChiralTag::TetrahedralCcw,
        ChiralityToken::Clockwise => ChiralTag::TetrahedralCw,
        ChiralityToken::None => return ChiralTag::Unspecified,
    };
    let written: Vec<NodeIndex> = pa
        .written
        .iter()
        .map(|&b| {
            let pb = &tree.bonds[b];
            NodeIndex::new(if pb.begin == i { pb.end } else { pb.begin })
        })
        .collect();
    translate_tag(mol, node, &written, pa.has_prev, written_tag)
}
