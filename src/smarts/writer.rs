use petgraph::graph::{EdgeIndex, NodeIndex};

use crate::atom::{Atom, ChiralTag, Hybridization};
use crate::bond::{Bond, BondType};
use crate::element;
use crate::mol::Mol;
use crate::query::{AtomExpr, BondExpr, RangeKind};
use crate::stereo::translate_tag;

use super::parser::{atom_and, bond_and, bond_or};

/// Writes a molecule as SMARTS.
///
/// Atoms are visited in index order and neighbours in bond order, so the
/// text follows the order the query was built in. Concrete atoms and bonds
/// are written as the predicates they match with.
pub fn to_smarts(mol: &Mol) -> String {
    let layout = Layout::new(mol);
    let mut writer = Writer {
        mol,
        layout: &layout,
        digits: vec![None; mol.bond_count()],
        in_use: Vec::new(),
        out: String::new(),
    };
    for (i, &root) in layout.roots.iter().enumerate() {
        if i > 0 {
            writer.out.push('.');
        }
        writer.write_node(root);
    }
    writer.out
}

/// Depth-first spanning forest with its ring-closure bonds.
struct Layout {
    roots: Vec<NodeIndex>,
    parent: Vec<Option<NodeIndex>>,
    children: Vec<Vec<(EdgeIndex, NodeIndex)>>,
    /// Ring bonds whose digit is opened at the atom.
    ring_opens: Vec<Vec<EdgeIndex>>,
    /// Ring bonds whose digit is closed at the atom.
    ring_closes: Vec<Vec<EdgeIndex>>,
}

impl Layout {
    fn new(mol: &Mol) -> Self {
        let n = mol.atom_count();
        let mut layout = Layout {
            roots: Vec::new(),
            parent: vec![None; n],
            children: vec![Vec::new(); n],
            ring_opens: vec![Vec::new(); n],
            ring_closes: vec![Vec::new(); n],
        };
        let mut visited = vec![false; n];
        let mut parent_edge: Vec<Option<EdgeIndex>> = vec![None; n];
        let mut ring_seen = vec![false; mol.bond_count()];

        for start in mol.atoms() {
            if visited[start.index()] {
                continue;
            }
            visited[start.index()] = true;
            layout.roots.push(start);
            let mut stack = vec![(start, mol.sorted_bonds_of(start), 0usize)];
            while let Some((node, bonds, next)) = stack.last_mut() {
                let node = *node;
                let Some(&e) = bonds.get(*next) else {
                    stack.pop();
                    continue;
                };
                *next += 1;
                if parent_edge[node.index()] == Some(e) {
                    continue;
                }
                let nb = mol.other_atom(e, node);
                if !visited[nb.index()] {
                    visited[nb.index()] = true;
                    layout.parent[nb.index()] = Some(node);
                    parent_edge[nb.index()] = Some(e);
                    layout.children[node.index()].push((e, nb));
                    stack.push((nb, mol.sorted_bonds_of(nb), 0));
                } else if !ring_seen[e.index()] {
                    // First seen from the later atom; the earlier one opens it.
                    ring_seen[e.index()] = true;
                    layout.ring_opens[nb.index()].push(e);
                    layout.ring_closes[node.index()].push(e);
                }
            }
        }
        layout
    }

    /// Neighbours in the order the text mentions them.
    fn written_neighbors(&self, mol: &Mol, node: NodeIndex) -> Vec<NodeIndex> {
        let i = node.index();
        self.parent[i]
            .into_iter()
            .chain(self.ring_closes[i].iter().map(|&e| mol.other_atom(e, node)))
            .chain(self.ring_opens[i].iter().map(|&e| mol.other_atom(e, node)))
            .chain(self.children[i].iter().map(|&(_, c)| c))
            .collect()
    }
}

struct Writer<'a> {
    mol: &'a Mol,
    layout: &'a Layout,
    digits: Vec<Option<usize>>,
    in_use: Vec<bool>,
    out: String,
}

impl Writer<'_> {
    fn write_node(&mut self, node: NodeIndex) {
        let layout = self.layout;
        let i = node.index();
        self.write_atom(node);

        let mut freed = Vec::new();
        for &e in &layout.ring_closes[i] {
            if let Some(d) = self.digits[e.index()] {
                write_ring_digit(d, &mut self.out);
                freed.push(d);
            }
        }
        for &e in &layout.ring_opens[i] {
            let text = self.bond_text(e, node);
            self.out.push_str(&text);
            let d = self.take_digit();
            self.digits[e.index()] = Some(d);
            write_ring_digit(d, &mut self.out);
        }
        for d in freed {
            self.in_use[d] = false;
        }

        let kids = &layout.children[i];
        for (k, &(e, child)) in kids.iter().enumerate() {
            let branch = k + 1 < kids.len();
            if branch {
                self.out.push('(');
            }
            let text = self.bond_text(e, node);
            self.out.push_str(&text);
            self.write_node(child);
            if branch {
                self.out.push(')');
            }
        }
    }

    fn take_digit(&mut self) -> usize {
        let d = (1..)
            .find(|&d| !self.in_use.get(d).copied().unwrap_or(false))
            .unwrap_or(1);
        if self.in_use.len() <= d {
            self.in_use.resize(d + 1, false);
        }
        self.in_use[d] = true;
        d
    }

    fn write_atom(&mut self, node: NodeIndex) {
        let atom = self.mol.atom(node);
        let expr = match &atom.query {
            Some(q) => q.clone(),
            None => concrete_atom_expr(atom),
        };
        let tag = if atom.chiral_tag.is_tetrahedral() {
            let written = self.layout.written_neighbors(self.mol, node);
            let has_prev = self.layout.parent[node.index()].is_some();
            translate_tag(self.mol, node, &written, has_prev, atom.chiral_tag)
        } else {
            ChiralTag::Unspecified
        };
        let expr = with_chirality(expr, tag);
        match bare_symbol(&expr) {
            Some(sym) => self.out.push_str(&sym),
            None => {
                self.out.push('[');
                self.out.push_str(&atom_text(&expr));
                self.out.push(']');
            }
        }
    }

    /// The bond written from `from`, empty for the implicit bond.
    fn bond_text(&self, e: EdgeIndex, from: NodeIndex) -> String {
        let bond = self.mol.bond(e);
        let mut expr = match &bond.query {
            Some(q) => q.clone(),
            None => concrete_bond_expr(bond),
        };
        if self.mol.begin_atom(e) != from {
            expr = expr.reversed();
        }
        if expr == BondExpr::SingleOrAromatic {
            String::new()
        } else {
            bond_text(&expr)
        }
    }
}

fn write_ring_digit(d: usize, out: &mut String) {
    if d < 10 {
        out.push_str(&d.to_string());
    } else {
        out.push_str(&format!("%{d:02}"));
    }
}

fn concrete_atom_expr(atom: &Atom) -> AtomExpr {
    let mut parts = Vec::new();
    if atom.isotope != 0 {
        parts.push(AtomExpr::Isotope(atom.isotope));
    }
    parts.push(match atom.atomic_num {
        0 => AtomExpr::True,
        z => AtomExpr::Element {
            atomic_num: z,
            aromatic: atom.is_aromatic.then_some(true),
        },
    });
    if atom.formal_charge != 0 {
        parts.push(AtomExpr::Charge(atom.formal_charge));
    }
    atom_and(parts)
}

fn concrete_bond_expr(bond: &Bond) -> BondExpr {
    if bond.is_aromatic {
        return BondExpr::Aromatic;
    }
    match bond.bond_type {
        BondType::Single => BondExpr::Single,
        BondType::Double => BondExpr::Double,
        BondType::Triple => BondExpr::Triple,
        BondType::Aromatic => BondExpr::Aromatic,
        _ => BondExpr::True,
    }
}

fn with_chirality(mut expr: AtomExpr, tag: ChiralTag) -> AtomExpr {
    if replace_chirality(&mut expr, tag) || !tag.is_tetrahedral() {
        return expr;
    }
    atom_and(vec![expr, AtomExpr::Chirality(tag)])
}

fn replace_chirality(expr: &mut AtomExpr, tag: ChiralTag) -> bool {
    match expr {
        AtomExpr::Chirality(t) => {
            *t = tag;
            true
        }
        AtomExpr::And(items) => items
            .iter_mut()
            .fold(false, |found, e| replace_chirality(e, tag) || found),
        _ => false,
    }
}

fn bare_symbol(expr: &AtomExpr) -> Option<String> {
    match expr {
        AtomExpr::True => Some("*".into()),
        AtomExpr::Aromatic => Some("a".into()),
        AtomExpr::Aliphatic => Some("A".into()),
        AtomExpr::Element {
            atomic_num,
            aromatic: Some(false),
        } if element::is_organic_subset(*atomic_num) => Some(element::symbol(*atomic_num).into()),
        AtomExpr::Element {
            atomic_num: z @ (5 | 6 | 7 | 8 | 15 | 16),
            aromatic: Some(true),
        } => Some(element::symbol(*z).to_ascii_lowercase()),
        _ => None,
    }
}

fn join_nonempty(parts: impl Iterator<Item = String>, sep: &str) -> String {
    parts.filter(|p| !p.is_empty()).collect::<Vec<_>>().join(sep)
}

/// Contents of a bracket atom. `;` joins alternatives, `,` joins the
/// alternatives themselves and `&` the terms inside each one. Anything
/// that does not fit that shape is written as a one-atom recursive query.
fn atom_text(expr: &AtomExpr) -> String {
    let (body, map) = match expr {
        AtomExpr::And(items) => {
            let map = items.iter().find_map(|e| match e {
                AtomExpr::AtomMapClass(m) => Some(*m),
                _ => None,
            });
            let rest: Vec<AtomExpr> = items
                .iter()
                .filter(|e| !matches!(e, AtomExpr::AtomMapClass(_)))
                .cloned()
                .collect();
            (atom_and(rest), map)
        }
        AtomExpr::AtomMapClass(m) => (AtomExpr::True, Some(*m)),
        other => (other.clone(), None),
    };
    let mut text = match &body {
        AtomExpr::And(items) if items.iter().any(|e| matches!(e, AtomExpr::Or(_))) => {
            join_nonempty(items.iter().map(atom_or_text), ";")
        }
        other => atom_or_text(other),
    };
    if text.is_empty() {
        text.push('*');
    }
    if let Some(m) = map {
        text.push_str(&format!(":{m}"));
    }
    text
}

fn atom_or_text(expr: &AtomExpr) -> String {
    match expr {
        AtomExpr::Or(items) => items
            .iter()
            .map(|e| match atom_high_text(e) {
                t if t.is_empty() => "*".to_string(),
                t => t,
            })
            .collect::<Vec<_>>()
            .join(","),
        other => atom_high_text(other),
    }
}

fn atom_high_text(expr: &AtomExpr) -> String {
    match expr {
        AtomExpr::And(items) => join_nonempty(items.iter().map(atom_unary_text), "&"),
        other => atom_unary_text(other),
    }
}

fn atom_unary_text(expr: &AtomExpr) -> String {
    match expr {
        AtomExpr::Not(inner) => match &**inner {
            AtomExpr::Not(x) => atom_unary_text(x),
            AtomExpr::And(_) | AtomExpr::Or(_) => format!("!{}", wrapped(inner)),
            prim => format!("!{}", atom_primitive_text(prim)),
        },
        AtomExpr::And(_) | AtomExpr::Or(_) => wrapped(expr),
        prim => atom_primitive_text(prim),
    }
}

/// `$([...])`: a one-atom recursive query holds exactly where `expr` does.
fn wrapped(expr: &AtomExpr) -> String {
    format!("$([{}])", atom_text(expr))
}

fn atom_primitive_text(expr: &AtomExpr) -> String {
    match expr {
        AtomExpr::True => "*".into(),
        AtomExpr::Element {
            atomic_num: 1, ..
        } => "#1".into(),
        AtomExpr::Element {
            atomic_num,
            aromatic: None,
        } => format!("#{atomic_num}"),
        AtomExpr::Element {
            atomic_num,
            aromatic: Some(false),
        } => element::symbol(*atomic_num).into(),
        AtomExpr::Element {
            atomic_num: z @ (5 | 6 | 7 | 8 | 15 | 16 | 33 | 34 | 52),
            aromatic: Some(true),
        } => element::symbol(*z).to_ascii_lowercase(),
        AtomExpr::Element { atomic_num, .. } => format!("$([#{atomic_num}&a])"),
        AtomExpr::Aromatic => "a".into(),
        AtomExpr::Aliphatic => "A".into(),
        AtomExpr::Isotope(iso) => iso.to_string(),
        AtomExpr::Degree(n) => format!("D{n}"),
        AtomExpr::NonHDegree(n) => format!("d{n}"),
        AtomExpr::Valence(n) => format!("v{n}"),
        AtomExpr::Connectivity(n) => format!("X{n}"),
        AtomExpr::TotalHCount(n) => format!("H{n}"),
        AtomExpr::ImplicitHCount(n) => format!("h{n}"),
        AtomExpr::RingMembership(n) => format!("R{n}"),
        AtomExpr::SmallestRingSize(n) => format!("r{n}"),
        AtomExpr::RingBondCount(n) => format!("x{n}"),
        AtomExpr::HeteroNeighborCount(n) => format!("z{n}"),
        AtomExpr::AliphaticHeteroNeighborCount(n) => format!("Z{n}"),
        AtomExpr::Charge(c) if *c < 0 => format!("-{}", c.unsigned_abs()),
        AtomExpr::Charge(c) => format!("+{c}"),
        AtomExpr::Hybridization(h) => match h {
            Hybridization::S => "^0".into(),
            Hybridization::SP => "^1".into(),
            Hybridization::SP2 => "^2".into(),
            Hybridization::SP3 => "^3".into(),
            Hybridization::SP3D => "^4".into(),
            Hybridization::SP3D2 => "^5".into(),
            // No SMARTS spelling.
            Hybridization::Unspecified | Hybridization::Other => "*".into(),
        },
        AtomExpr::Range { kind, low, high } => {
            let lo = low.map(|v| v.to_string()).unwrap_or_default();
            let hi = high.map(|v| v.to_string()).unwrap_or_default();
            format!("{}{{{lo}-{hi}}}", range_letter(*kind))
        }
        AtomExpr::InRing => "R".into(),
        AtomExpr::Chirality(ChiralTag::TetrahedralCw) => "@@".into(),
        AtomExpr::Chirality(ChiralTag::TetrahedralCcw) => "@".into(),
        AtomExpr::Chirality(_) => String::new(),
        AtomExpr::AtomMapClass(m) => format!(":{m}"),
        AtomExpr::Recursive(inner) => format!("$({})", to_smarts(inner)),
        AtomExpr::And(_) | AtomExpr::Or(_) | AtomExpr::Not(_) => atom_unary_text(expr),
    }
}

fn range_letter(kind: RangeKind) -> char {
    match kind {
        RangeKind::Degree => 'D',
        RangeKind::NonHDegree => 'd',
        RangeKind::TotalHCount => 'H',
        RangeKind::ImplicitHCount => 'h',
        RangeKind::SmallestRingSize => 'r',
        RangeKind::RingMembership => 'R',
        RangeKind::Valence => 'v',
        RangeKind::RingBondCount => 'x',
        RangeKind::Connectivity => 'X',
        RangeKind::HeteroNeighborCount => 'z',
        RangeKind::AliphaticHeteroNeighborCount => 'Z',
    }
}

fn bond_text(expr: &BondExpr) -> String {
    match normalize_bond(expr.clone()) {
        BondExpr::And(items) if items.iter().any(|e| matches!(e, BondExpr::Or(_))) => {
            items.iter().map(bond_or_text).collect::<Vec<_>>().join(";")
        }
        other => bond_or_text(&other),
    }
}

fn bond_or_text(expr: &BondExpr) -> String {
    match expr {
        BondExpr::Or(items) => items.iter().map(bond_high_text).collect::<Vec<_>>().join(","),
        other => bond_high_text(other),
    }
}

fn bond_high_text(expr: &BondExpr) -> String {
    match expr {
        BondExpr::And(items) if items.iter().any(|e| matches!(e, BondExpr::Or(_))) => {
            bond_or_text(&distribute(items))
        }
        BondExpr::And(items) => items.iter().map(bond_high_text).collect::<Vec<_>>().join("&"),
        BondExpr::Or(_) => bond_or_text(expr),
        BondExpr::Not(inner) => format!("!{}", bond_high_text(inner)),
        BondExpr::True => "~".into(),
        BondExpr::Single => "-".into(),
        BondExpr::Double => "=".into(),
        BondExpr::Triple => "#".into(),
        BondExpr::Aromatic => ":".into(),
        BondExpr::Ring => "@".into(),
        BondExpr::Up => "/".into(),
        BondExpr::Down => "\\".into(),
        BondExpr::SingleOrAromatic => "-,:".into(),
    }
}

/// Pushes negation down to primitives and spells out the implicit bond, so
/// that every expression fits the three operator levels.
fn normalize_bond(expr: BondExpr) -> BondExpr {
    match expr {
        BondExpr::SingleOrAromatic => BondExpr::Or(vec![BondExpr::Single, BondExpr::Aromatic]),
        BondExpr::And(items) => bond_and(items.into_iter().map(normalize_bond).collect()),
        BondExpr::Or(items) => bond_or(items.into_iter().map(normalize_bond).collect()),
        BondExpr::Not(inner) => match normalize_bond(*inner) {
            BondExpr::Not(x) => *x,
            BondExpr::And(items) => bond_or(
                items
                    .into_iter()
                    .map(|e| normalize_bond(BondExpr::Not(Box::new(e))))
                    .collect(),
            ),
            BondExpr::Or(items) => bond_and(
                items
                    .into_iter()
                    .map(|e| normalize_bond(BondExpr::Not(Box::new(e))))
                    .collect(),
            ),
            prim => BondExpr::Not(Box::new(prim)),
        },
        prim => prim,
    }
}

/// Rewrites a conjunction containing alternatives as alternatives of
/// conjunctions.
fn distribute(items: &[BondExpr]) -> BondExpr {
    let mut combos: Vec<Vec<BondExpr>> = vec![Vec::new()];
    for item in items {
        match item {
            BondExpr::Or(alts) => {
                combos = combos
                    .iter()
                    .flat_map(|c| {
                        alts.iter().map(move |a| {
                            let mut next = c.clone();
                            next.push(a.clone());
                            next
                        })
                    })
                    .collect();
            }
            other => combos.iter_mut().for_each(|c| c.push(other.clone())),
        }
    }
    bond_or(combos.into_iter().map(bond_and).collect())
}
