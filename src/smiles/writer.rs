use petgraph::graph::{EdgeIndex, NodeIndex};
use serde::{Deserialize, Serialize};

use crate::atom::ChiralTag;
use crate::bond::BondType;
use crate::canonical::canonical_ranks;
use crate::element;
use crate::error::Result;
use crate::graph_ops::fragment_atoms;
use crate::kekulize::kekule_orders;
use crate::mol::Mol;
use crate::stereo;
use crate::valence;

/// Options for [`to_smiles`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmilesWriteParams {
    /// Write chirality, double-bond directions and isotopes.
    pub isomeric: bool,
    /// Write a Kekulé form with uppercase atoms instead of aromatic symbols.
    pub kekule: bool,
    /// Order the output by canonical atom ranks rather than atom indices.
    pub canonical: bool,
    pub all_bonds_explicit: bool,
    pub all_hs_explicit: bool,
    /// Start the traversal of its fragment at this atom.
    pub root_atom: Option<usize>,
}

impl Default for SmilesWriteParams {
    fn default() -> Self {
        Self {
            isomeric: true,
            kekule: false,
            canonical: true,
            all_bonds_explicit: false,
            all_hs_explicit: false,
            root_atom: None,
        }
    }
}

/// Writes `mol` as SMILES. Only Kekulé output can fail, when the aromatic
/// bonds admit no alternating assignment.
pub fn to_smiles(mol: &Mol, params: &SmilesWriteParams) -> Result<String> {
    let types = if params.kekule {
        kekule_orders(mol)?
    } else {
        mol.bonds()
            .map(|e| {
                let bond = mol.bond(e);
                if bond.is_aromatic {
                    BondType::Aromatic
                } else {
                    bond.bond_type
                }
            })
            .collect()
    };
    Ok(write_smiles(mol, params, types))
}

/// Canonical isomeric SMILES with aromatic symbols.
pub fn to_canonical_smiles(mol: &Mol) -> String {
    let params = SmilesWriteParams::default();
    let types = mol
        .bonds()
        .map(|e| {
            let bond = mol.bond(e);
            if bond.is_aromatic {
                BondType::Aromatic
            } else {
                bond.bond_type
            }
        })
        .collect();
    write_smiles(mol, &params, types)
}

fn write_smiles(mol: &Mol, params: &SmilesWriteParams, types: Vec<BondType>) -> String {
    let ranks: Vec<usize> = if params.canonical {
        canonical_ranks(mol, params.isomeric)
    } else {
        (0..mol.atom_count()).collect()
    };
    let mut fragments = fragment_atoms(mol);
    fragments.sort_by_key(|frag| frag.iter().map(|a| ranks[a.index()]).min());

    let aromatic: Vec<bool> = mol
        .atoms()
        .map(|a| mol.atom(a).is_aromatic && !params.kekule)
        .collect();
    let mut writer = Writer {
        mol,
        params,
        types,
        aromatic,
        layout: Layout::new(mol),
        slashes: vec![None; mol.bond_count()],
        digits: vec![None; mol.bond_count()],
        open_digits: Vec::new(),
    };

    let mut parts = Vec::with_capacity(fragments.len());
    for frag in &fragments {
        let root = params
            .root_atom
            .map(NodeIndex::new)
            .filter(|r| frag.contains(r))
            .or_else(|| frag.iter().copied().min_by_key(|a| ranks[a.index()]));
        let Some(root) = root else { continue };
        writer.layout.traverse(mol, root, &ranks);
    }
    if params.isomeric {
        writer.assign_directions();
    }
    for &root in &writer.layout.roots.clone() {
        let mut out = String::new();
        writer.write_node(root, &mut out);
        parts.push(out);
    }
    parts.join(".")
}

/// Spanning forest of the traversal and the ring closures it leaves over.
struct Layout {
    roots: Vec<NodeIndex>,
    /// Visit order of each atom.
    order: Vec<Option<usize>>,
    parent: Vec<Option<NodeIndex>>,
    children: Vec<Vec<NodeIndex>>,
    /// Ring bonds opened at an atom, partners in writing order.
    ring_opens: Vec<Vec<NodeIndex>>,
    /// Ring bonds closed at an atom, partners in writing order.
    ring_closes: Vec<Vec<NodeIndex>>,
    /// Atom each bond symbol is written from: the parent for tree bonds,
    /// the opening atom for ring bonds.
    written_from: Vec<Option<NodeIndex>>,
}

impl Layout {
    fn new(mol: &Mol) -> Self {
        let n = mol.atom_count();
        Self {
            roots: Vec::new(),
            order: vec![None; n],
            parent: vec![None; n],
            children: vec![Vec::new(); n],
            ring_opens: vec![Vec::new(); n],
            ring_closes: vec![Vec::new(); n],
            written_from: vec![None; mol.bond_count()],
        }
    }

    fn traverse(&mut self, mol: &Mol, root: NodeIndex, ranks: &[usize]) {
        let neighbor_lists = |node: NodeIndex| {
            let mut bonds: Vec<(NodeIndex, EdgeIndex)> = mol
                .bonds_of(node)
                .map(|e| (mol.other_atom(e, node), e))
                .collect();
            bonds.sort_by_key(|(nb, _)| ranks[nb.index()]);
            bonds
        };

        let mut visited_count = self.order.iter().flatten().count();
        self.roots.push(root);
        self.order[root.index()] = Some(visited_count);
        visited_count += 1;
        let mut stack = vec![(root, neighbor_lists(root), 0usize)];

        while let Some((node, nbrs, next)) = stack.last_mut() {
            let node = *node;
            let Some(&(nb, edge)) = nbrs.get(*next) else {
                stack.pop();
                continue;
            };
            *next += 1;
            if self.written_from[edge.index()].is_some() {
                continue;
            }
            if self.order[nb.index()].is_none() {
                self.order[nb.index()] = Some(visited_count);
                visited_count += 1;
                self.parent[nb.index()] = Some(node);
                self.children[node.index()].push(nb);
                self.written_from[edge.index()] = Some(node);
                stack.push((nb, neighbor_lists(nb), 0));
            } else {
                // Non-tree bonds of a depth-first search always reach back to
                // an ancestor, which opens the ring.
                self.ring_opens[nb.index()].push(node);
                self.ring_closes[node.index()].push(nb);
                self.written_from[edge.index()] = Some(nb);
            }
        }

        for opens in &mut self.ring_opens {
            opens.sort_by_key(|a| ranks[a.index()]);
        }
    }

    /// Neighbours in the order a reader meets them in the text: parent,
    /// ring closures, ring openings, then branches and the chain.
    fn written_neighbors(&self, node: NodeIndex) -> Vec<NodeIndex> {
        let i = node.index();
        self.parent[i]
            .iter()
            .chain(&self.ring_closes[i])
            .chain(&self.ring_opens[i])
            .chain(&self.children[i])
            .copied()
            .collect()
    }
}

struct Writer<'a> {
    mol: &'a Mol,
    params: &'a SmilesWriteParams,
    /// Bond type as it will be written.
    types: Vec<BondType>,
    /// Whether each atom is written with an aromatic symbol.
    aromatic: Vec<bool>,
    layout: Layout,
    /// `Some(true)` writes `/`, `Some(false)` writes `\`.
    slashes: Vec<Option<bool>>,
    digits: Vec<Option<u16>>,
    open_digits: Vec<u16>,
}

impl Writer<'_> {
    /// Chooses `/` and `\` marks that reproduce every cis/trans double bond.
    /// A single bond shared by two stereo double bonds keeps the mark the
    /// first one gave it.
    fn assign_directions(&mut self) {
        let mol = self.mol;
        let mut doubles: Vec<(usize, EdgeIndex)> = mol
            .bonds()
            .filter(|&e| {
                self.types[e.index()] == BondType::Double && mol.bond(e).stereo.same_side().is_some()
            })
            .filter_map(|e| {
                let (a, b) = mol.bond_atoms(e);
                let oa = self.layout.order[a.index()]?;
                let ob = self.layout.order[b.index()]?;
                Some((oa.min(ob), e))
            })
            .collect();
        doubles.sort();

        for (_, edge) in doubles {
            let (a, b) = mol.bond_atoms(edge);
            let (first, second) = if self.layout.order[a.index()] <= self.layout.order[b.index()] {
                (a, b)
            } else {
                (b, a)
            };
            let Some((ef, xf)) = self.direction_carrier(first, edge) else {
                continue;
            };
            let Some((es, xs)) = self.direction_carrier(second, edge) else {
                continue;
            };
            let (xa, xb) = if first == a { (xf, xs) } else { (xs, xf) };
            let Some(same) = stereo::substituents_same_side(mol, edge, xa, xb) else {
                continue;
            };

            let slash_f = *self.slashes[ef.index()].get_or_insert(true);
            let above_f = slash_f == (self.layout.written_from[ef.index()] == Some(first));
            let above_s = above_f == same;
            let want = above_s == (self.layout.written_from[es.index()] == Some(second));
            self.slashes[es.index()].get_or_insert(want);
        }
    }

    /// Single bond at `end` that will carry a direction mark for the double
    /// bond `double`, preferring one that is already marked.
    fn direction_carrier(&self, end: NodeIndex, double: EdgeIndex) -> Option<(EdgeIndex, NodeIndex)> {
        let mut candidates: Vec<(EdgeIndex, NodeIndex)> = self
            .mol
            .bonds_of(end)
            .filter(|&e| e != double && self.types[e.index()] == BondType::Single)
            .map(|e| (e, self.mol.other_atom(e, end)))
            .collect();
        candidates.sort_by_key(|(_, x)| self.layout.order[x.index()]);
        candidates
            .iter()
            .find(|(e, _)| self.slashes[e.index()].is_some())
            .or_else(|| candidates.first())
            .copied()
    }

    fn write_node(&mut self, node: NodeIndex, out: &mut String) {
        let tag = self.written_chirality(node);
        self.write_atom(node, tag, out);

        let mut closed = Vec::new();
        for partner in self.layout.ring_closes[node.index()].clone() {
            let Some(edge) = self.mol.bond_between(node, partner) else {
                continue;
            };
            if let Some(d) = self.digits[edge.index()] {
                write_ring_digit(d, out);
                closed.push(d);
            }
        }
        for partner in self.layout.ring_opens[node.index()].clone() {
            let Some(edge) = self.mol.bond_between(node, partner) else {
                continue;
            };
            let d = self.next_digit();
            self.digits[edge.index()] = Some(d);
            self.write_bond(edge, node, partner, out);
            write_ring_digit(d, out);
        }
        self.open_digits.retain(|d| !closed.contains(d));

        let kids = self.layout.children[node.index()].clone();
        let last = kids.len().saturating_sub(1);
        for (i, child) in kids.into_iter().enumerate() {
            let branch = i < last;
            if branch {
                out.push('(');
            }
            if let Some(edge) = self.mol.bond_between(node, child) {
                self.write_bond(edge, node, child, out);
            }
            self.write_node(child, out);
            if branch {
                out.push(')');
            }
        }
    }

    fn next_digit(&mut self) -> u16 {
        let d = (1..)
            .find(|d| !self.open_digits.contains(d))
            .unwrap_or(1);
        self.open_digits.push(d);
        d
    }

    fn write_bond(&self, edge: EdgeIndex, from: NodeIndex, to: NodeIndex, out: &mut String) {
        if let Some(up) = self.slashes[edge.index()] {
            out.push(if up { '/' } else { '\\' });
            return;
        }
        let both_aromatic = self.aromatic[from.index()] && self.aromatic[to.index()];
        let explicit = self.params.all_bonds_explicit;
        match self.types[edge.index()] {
            BondType::Single if both_aromatic || explicit => out.push('-'),
            BondType::Single | BondType::Unspecified => {}
            BondType::Double => out.push('='),
            BondType::Triple => out.push('#'),
            BondType::Aromatic if both_aromatic && !explicit => {}
            BondType::Aromatic => out.push(':'),
            BondType::Dative => {
                if self.mol.begin_atom(edge) == from {
                    out.push_str("->");
                } else {
                    out.push_str("<-");
                }
            }
        }
    }

    /// The tag as it must be written for the neighbour order of the output.
    fn written_chirality(&self, node: NodeIndex) -> ChiralTag {
        let tag = self.mol.atom(node).chiral_tag;
        if !self.params.isomeric || !tag.is_tetrahedral() {
            return ChiralTag::Unspecified;
        }
        let written = self.layout.written_neighbors(node);
        let has_prev = self.layout.parent[node.index()].is_some();
        stereo::translate_tag(self.mol, node, &written, has_prev, tag)
    }

    fn total_h(&self, node: NodeIndex) -> u8 {
        self.mol.atom(node).explicit_h_count + valence::implicit_h(self.mol, node)
    }

    /// Hydrogens a reader infers for `node` written without brackets.
    fn inferred_h(&self, node: NodeIndex) -> u8 {
        let atom = self.mol.atom(node);
        if atom.atomic_num == 0 {
            return 0;
        }
        let twice: u32 = self
            .mol
            .bonds_of(node)
            .map(|e| match self.types[e.index()] {
                BondType::Dative if self.mol.end_atom(e) != node => 0,
                t => t.twice_order() as u32,
            })
            .sum();
        let aromatic = self.aromatic[node.index()];
        let ev = valence::valence_from_twice(atom.atomic_num, atom.formal_charge, aromatic, twice);
        valence::implicit_h_from(atom.atomic_num, atom.formal_charge, aromatic, 0, ev)
    }

    fn needs_bracket(&self, node: NodeIndex, tag: ChiralTag) -> bool {
        let atom = self.mol.atom(node);
        let z = atom.atomic_num;
        let bare_symbol = if self.aromatic[node.index()] {
            matches!(z, 5 | 6 | 7 | 8 | 15 | 16)
        } else {
            z == 0 || element::is_organic_subset(z)
        };
        !bare_symbol
            || atom.formal_charge != 0
            || (self.params.isomeric && atom.isotope != 0)
            || tag != ChiralTag::Unspecified
            || atom.atom_map != 0
            || atom.num_radical_electrons != 0
            || self.params.all_hs_explicit
            || self.total_h(node) != self.inferred_h(node)
    }

    fn write_atom(&self, node: NodeIndex, tag: ChiralTag, out: &mut String) {
        let atom = self.mol.atom(node);
        let symbol = element::symbol(atom.atomic_num);
        let push_symbol = |out: &mut String| {
            if self.aromatic[node.index()] {
                out.push_str(&symbol.to_ascii_lowercase());
            } else {
                out.push_str(symbol);
            }
        };
        if !self.needs_bracket(node, tag) {
            push_symbol(out);
            return;
        }

        out.push('[');
        if self.params.isomeric && atom.isotope != 0 {
            out.push_str(&atom.isotope.to_string());
        }
        push_symbol(out);
        match tag {
            ChiralTag::TetrahedralCcw => out.push('@'),
            ChiralTag::TetrahedralCw => out.push_str("@@"),
            _ => {}
        }
        let h = self.total_h(node);
        if h > 0 {
            out.push('H');
            if h > 1 {
                out.push_str(&h.to_string());
            }
        }
        if atom.formal_charge > 0 {
            out.push('+');
            if atom.formal_charge > 1 {
                out.push_str(&atom.formal_charge.to_string());
            }
        } else if atom.formal_charge < 0 {
            out.push('-');
            if atom.formal_charge < -1 {
                out.push_str(&atom.formal_charge.unsigned_abs().to_string());
            }
        }
        if atom.atom_map != 0 {
            out.push(':');
            out.push_str(&atom.atom_map.to_string());
        }
        out.push(']');
    }
}

fn write_ring_digit(d: u16, out: &mut String) {
    if d <= 9 {
        out.push(char::from(b'0' + d as u8));
    } else {
        out.push('%');
        out.push_str(&format!("{d:02}"));
    }
}
