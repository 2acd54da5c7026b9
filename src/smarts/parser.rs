use petgraph::graph::NodeIndex;

use crate::atom::{Atom, ChiralTag, Hybridization};
use crate::bond::Bond;
use crate::element;
use crate::error::StructuralError;
use crate::mol::Mol;
use crate::query::{AtomExpr, BondExpr, RangeKind};
use crate::stereo::translate_tag;

use super::error::SmartsError;

const MAX_RING_DIGITS: usize = 100;

/// Placeholder for a ring bond that has been opened but not closed.
const PENDING: usize = usize::MAX;

#[derive(Debug, Clone)]
struct RingOpen {
    atom: NodeIndex,
    bond: Option<BondExpr>,
    pos: usize,
    /// Index of the placeholder in the opener's written list.
    slot: usize,
}

/// Neighbours of one atom in the order they appear in the text.
#[derive(Debug, Default)]
struct Written {
    nbrs: Vec<usize>,
    has_prev: bool,
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    end: usize,
    /// First position inside the innermost bracket atom being read.
    bracket_start: usize,
}

pub fn parse(input: &str) -> Result<Mol, SmartsError> {
    let chars: Vec<char> = input.chars().collect();
    let start = chars
        .iter()
        .position(|c| !c.is_whitespace())
        .ok_or(SmartsError::EmptyInput)?;
    let end = chars
        .iter()
        .rposition(|c| !c.is_whitespace())
        .map_or(start, |i| i + 1);
    let mut parser = Parser {
        chars,
        pos: start,
        end,
        bracket_start: start,
    };
    parser.parse_graph(None)
}

impl Parser {
    fn peek(&self) -> Option<char> {
        if self.pos < self.end {
            Some(self.chars[self.pos])
        } else {
            None
        }
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        let i = self.pos + offset;
        if i < self.end {
            Some(self.chars[i])
        } else {
            None
        }
    }

    fn unexpected(&self) -> SmartsError {
        match self.peek() {
            Some(ch) => SmartsError::UnexpectedChar { pos: self.pos, ch },
            None => SmartsError::UnexpectedEnd { pos: self.pos },
        }
    }

    fn parse_number(&mut self) -> Result<Option<u32>, SmartsError> {
        let start = self.pos;
        let mut value: Option<u32> = None;
        while let Some(d) = self.peek().and_then(|c| c.to_digit(10)) {
            let next = value
                .unwrap_or(0)
                .checked_mul(10)
                .and_then(|v| v.checked_add(d))
                .ok_or(SmartsError::NumberOverflow { pos: start })?;
            value = Some(next);
            self.pos += 1;
        }
        Ok(value)
    }

    fn parse_small(&mut self) -> Result<Option<u8>, SmartsError> {
        let start = self.pos;
        match self.parse_number()? {
            Some(n) => u8::try_from(n)
                .map(Some)
                .map_err(|_| SmartsError::NumberOverflow { pos: start }),
            None => Ok(None),
        }
    }

    /// Reads a connected pattern. Inside `$(...)` (`recursive_at` is the
    /// position of the `$`) reading stops at the unmatched `)`.
    fn parse_graph(&mut self, recursive_at: Option<usize>) -> Result<Mol, SmartsError> {
        let mut mol = Mol::new();
        let mut written: Vec<Written> = Vec::new();
        let mut chiral: Vec<(NodeIndex, ChiralTag)> = Vec::new();
        let mut branches: Vec<(NodeIndex, usize)> = Vec::new();
        let mut current: Option<NodeIndex> = None;
        let mut pending: Option<(BondExpr, usize)> = None;
        let mut rings: Vec<Option<RingOpen>> = vec![None; MAX_RING_DIGITS];

        while let Some(ch) = self.peek() {
            let pos = self.pos;
            match ch {
                '(' => {
                    let cur = current.ok_or(SmartsError::UnmatchedParen { pos })?;
                    if let Some((_, bpos)) = pending {
                        return Err(SmartsError::DanglingBond { pos: bpos });
                    }
                    branches.push((cur, pos));
                    self.pos += 1;
                }
                ')' => {
                    if let Some((_, bpos)) = pending {
                        return Err(SmartsError::DanglingBond { pos: bpos });
                    }
                    match branches.pop() {
                        Some((atom, _)) => {
                            current = Some(atom);
                            self.pos += 1;
                        }
                        None if recursive_at.is_some() => break,
                        None => return Err(SmartsError::UnmatchedParen { pos }),
                    }
                }
                ']' if recursive_at.is_some() => break,
                '.' => {
                    if let Some((_, bpos)) = pending {
                        return Err(SmartsError::DanglingBond { pos: bpos });
                    }
                    current = None;
                    self.pos += 1;
                }
                '0'..='9' | '%' => {
                    let digit = self.parse_ring_digit()?;
                    let cur = current.ok_or(SmartsError::DanglingBond { pos })?;
                    let bond = pending.take().map(|(b, _)| b);
                    match rings[digit as usize].take() {
                        Some(open) => {
                            if open.atom == cur {
                                return Err(SmartsError::SelfBond { pos });
                            }
                            let expr = resolve_ring_bond(open.bond, bond)
                                .ok_or(SmartsError::RingBondConflict { digit, pos })?;
                            connect(&mut mol, open.atom, cur, expr, open.pos)?;
                            written[open.atom.index()].nbrs[open.slot] = cur.index();
                            written[cur.index()].nbrs.push(open.atom.index());
                        }
                        None => {
                            let slot = written[cur.index()].nbrs.len();
                            written[cur.index()].nbrs.push(PENDING);
                            rings[digit as usize] = Some(RingOpen {
                                atom: cur,
                                bond,
                                pos,
                                slot,
                            });
                        }
                    }
                }
                c if starts_bond(c) => {
                    if pending.is_some() || current.is_none() {
                        return Err(SmartsError::DanglingBond { pos });
                    }
                    let expr = self.parse_bond_low()?;
                    pending = Some((expr, pos));
                }
                _ => {
                    let expr = self.parse_atom()?;
                    let mut atom = Atom::from_query(expr);
                    if let Some(query) = &atom.query {
                        atom.explicit_h_count = carried_h(query);
                        if let Some(tag) = written_chirality(query) {
                            chiral.push((NodeIndex::new(mol.atom_count()), tag));
                        }
                    }
                    let idx = mol.add_atom(atom);
                    written.push(Written::default());
                    if let Some(prev) = current {
                        let (expr, bpos) = pending
                            .take()
                            .unwrap_or((BondExpr::SingleOrAromatic, pos));
                        connect(&mut mol, prev, idx, expr, bpos)?;
                        written[prev.index()].nbrs.push(idx.index());
                        written[idx.index()].nbrs.push(prev.index());
                        written[idx.index()].has_prev = true;
                    }
                    current = Some(idx);
                }
            }
        }

        if let Some((_, pos)) = pending {
            return Err(SmartsError::DanglingBond { pos });
        }
        if let Some(&(_, pos)) = branches.last() {
            return Err(SmartsError::UnmatchedParen { pos });
        }
        if let Some((digit, open)) = rings
            .iter()
            .enumerate()
            .filter_map(|(d, o)| o.as_ref().map(|o| (d, o)))
            .min_by_key(|(_, o)| o.pos)
        {
            return Err(SmartsError::UnclosedRing {
                digit: digit as u16,
                pos: open.pos,
            });
        }
        if let Some(at) = recursive_at {
            if self.peek() != Some(')') {
                return Err(SmartsError::UnclosedRecursive { pos: at });
            }
            if mol.atom_count() == 0 {
                return Err(self.unexpected());
            }
            self.pos += 1;
        } else if mol.atom_count() == 0 {
            return Err(SmartsError::EmptyInput);
        }

        for (idx, tag) in chiral {
            let nbrs: Vec<NodeIndex> = written[idx.index()]
                .nbrs
                .iter()
                .map(|&i| NodeIndex::new(i))
                .collect();
            let frame_tag = translate_tag(&mol, idx, &nbrs, written[idx.index()].has_prev, tag);
            let atom = mol.atom_mut_raw(idx);
            atom.chiral_tag = frame_tag;
            if let Some(query) = atom.query.as_mut() {
                set_chirality(query, frame_tag);
            }
        }

        Ok(mol)
    }

    fn parse_ring_digit(&mut self) -> Result<u16, SmartsError> {
        if self.peek() == Some('%') {
            self.pos += 1;
            let tens = self.peek().and_then(|c| c.to_digit(10));
            let ones = self.peek_at(1).and_then(|c| c.to_digit(10));
            return match (tens, ones) {
                (Some(t), Some(o)) => {
                    self.pos += 2;
                    Ok((t * 10 + o) as u16)
                }
                (Some(_), None) => {
                    self.pos += 1;
                    Err(self.unexpected())
                }
                _ => Err(self.unexpected()),
            };
        }
        let d = self.peek().and_then(|c| c.to_digit(10)).ok_or_else(|| self.unexpected())?;
        self.pos += 1;
        Ok(d as u16)
    }

    fn parse_atom(&mut self) -> Result<AtomExpr, SmartsError> {
        let pos = self.pos;
        let Some(ch) = self.peek() else {
            return Err(self.unexpected());
        };
        if ch == '[' {
            return self.parse_bracket();
        }
        self.pos += 1;
        let expr = match ch {
            '*' => AtomExpr::True,
            'a' => AtomExpr::Aromatic,
            'A' => AtomExpr::Aliphatic,
            'b' | 'c' | 'n' | 'o' | 'p' | 's' => {
                let z = element::atomic_num_from_symbol(&ch.to_ascii_uppercase().to_string())
                    .ok_or(SmartsError::UnexpectedChar { pos, ch })?;
                element_expr(z, Some(true))
            }
            'C' if self.peek() == Some('l') => {
                self.pos += 1;
                element_expr(17, Some(false))
            }
            'B' if self.peek() == Some('r') => {
                self.pos += 1;
                element_expr(35, Some(false))
            }
            'B' | 'C' | 'N' | 'O' | 'P' | 'S' | 'F' | 'I' => {
                let z = element::atomic_num_from_symbol(&ch.to_string())
                    .ok_or(SmartsError::UnexpectedChar { pos, ch })?;
                element_expr(z, Some(false))
            }
            _ => return Err(SmartsError::UnexpectedChar { pos, ch }),
        };
        Ok(expr)
    }

    fn parse_bracket(&mut self) -> Result<AtomExpr, SmartsError> {
        let open = self.pos;
        self.pos += 1;
        let outer_start = self.bracket_start;
        self.bracket_start = self.pos;
        let expr = self.parse_atom_low()?;
        self.bracket_start = outer_start;
        match self.peek() {
            Some(']') => {
                self.pos += 1;
                Ok(expr)
            }
            None => Err(SmartsError::UnclosedBracket { pos: open }),
            Some(_) => Err(self.unexpected()),
        }
    }

    /// `;`, the lowest-precedence conjunction.
    fn parse_atom_low(&mut self) -> Result<AtomExpr, SmartsError> {
        let mut parts = vec![self.parse_atom_or()?];
        while self.peek() == Some(';') {
            self.pos += 1;
            parts.push(self.parse_atom_or()?);
        }
        Ok(atom_and(parts))
    }

    fn parse_atom_or(&mut self) -> Result<AtomExpr, SmartsError> {
        let mut parts = vec![self.parse_atom_high()?];
        while self.peek() == Some(',') {
            self.pos += 1;
            parts.push(self.parse_atom_high()?);
        }
        Ok(atom_or(parts))
    }

    /// `&` or adjacency.
    fn parse_atom_high(&mut self) -> Result<AtomExpr, SmartsError> {
        let mut parts = vec![self.parse_atom_not()?];
        loop {
            match self.peek() {
                Some('&') => {
                    self.pos += 1;
                    parts.push(self.parse_atom_not()?);
                }
                Some(']' | ',' | ';') | None => break,
                Some(_) => parts.push(self.parse_atom_not()?),
            }
        }
        Ok(atom_and(parts))
    }

    fn parse_atom_not(&mut self) -> Result<AtomExpr, SmartsError> {
        if self.peek() == Some('!') {
            self.pos += 1;
            let inner = self.parse_atom_not()?;
            return Ok(AtomExpr::Not(Box::new(inner)));
        }
        self.parse_primitive()
    }

    fn parse_primitive(&mut self) -> Result<AtomExpr, SmartsError> {
        let pos = self.pos;
        let Some(ch) = self.peek() else {
            return Err(self.unexpected());
        };

        if ch.is_ascii_digit() {
            let n = self.parse_number()?.unwrap_or(0);
            let iso = u16::try_from(n).map_err(|_| SmartsError::NumberOverflow { pos })?;
            return Ok(AtomExpr::Isotope(iso));
        }

        if ch.is_ascii_uppercase() {
            if let Some(next) = self.peek_at(1).filter(char::is_ascii_lowercase) {
                let two: String = [ch, next].iter().collect();
                if let Some(z) = element::atomic_num_from_symbol(&two) {
                    self.pos += 2;
                    return Ok(element_expr(z, Some(false)));
                }
            }
        }

        self.pos += 1;
        let expr = match ch {
            '*' => AtomExpr::True,
            'a' if self.peek() == Some('s') => {
                self.pos += 1;
                element_expr(33, Some(true))
            }
            's' if self.peek() == Some('e') => {
                self.pos += 1;
                element_expr(34, Some(true))
            }
            't' if self.peek() == Some('e') => {
                self.pos += 1;
                element_expr(52, Some(true))
            }
            'a' => AtomExpr::Aromatic,
            'A' => AtomExpr::Aliphatic,
            'b' | 'c' | 'n' | 'o' | 'p' | 's' => {
                let z = element::atomic_num_from_symbol(&ch.to_ascii_uppercase().to_string())
                    .ok_or(SmartsError::UnexpectedChar { pos, ch })?;
                element_expr(z, Some(true))
            }
            '#' => {
                let z = self
                    .parse_small()?
                    .filter(|&z| z > 0 && z <= element::MAX_ATOMIC_NUM)
                    .ok_or(SmartsError::InvalidAtomicNum { pos })?;
                element_expr(z, None)
            }
            'H' if self.hydrogen_is_element() => element_expr(1, Some(false)),
            'H' => self.counted(RangeKind::TotalHCount, Some(1))?,
            'D' => self.counted(RangeKind::Degree, Some(1))?,
            'd' => self.counted(RangeKind::NonHDegree, Some(1))?,
            'X' => self.counted(RangeKind::Connectivity, Some(1))?,
            'v' => self.counted(RangeKind::Valence, Some(1))?,
            'h' => self.counted(RangeKind::ImplicitHCount, None)?,
            'z' => self.counted(RangeKind::HeteroNeighborCount, None)?,
            'Z' => self.counted(RangeKind::AliphaticHeteroNeighborCount, None)?,
            'R' => self.ring_counted(RangeKind::RingMembership)?,
            'r' => self.ring_counted(RangeKind::SmallestRingSize)?,
            'x' => self.ring_counted(RangeKind::RingBondCount)?,
            '^' => {
                let at = self.pos;
                let hyb = match self.parse_small()? {
                    Some(0) => Hybridization::S,
                    Some(1) => Hybridization::SP,
                    Some(2) => Hybridization::SP2,
                    Some(3) => Hybridization::SP3,
                    Some(4) => Hybridization::SP3D,
                    Some(5) => Hybridization::SP3D2,
                    _ => {
                        self.pos = at;
                        return Err(self.unexpected());
                    }
                };
                AtomExpr::Hybridization(hyb)
            }
            '+' | '-' => self.parse_charge(ch)?,
            '@' => {
                if self.peek() == Some('@') {
                    self.pos += 1;
                    AtomExpr::Chirality(ChiralTag::TetrahedralCw)
                } else {
                    AtomExpr::Chirality(ChiralTag::TetrahedralCcw)
                }
            }
            ':' => {
                let at = self.pos;
                let n = self.parse_number()?.ok_or_else(|| self.unexpected())?;
                let class = u16::try_from(n).map_err(|_| SmartsError::NumberOverflow { pos: at })?;
                AtomExpr::AtomMapClass(class)
            }
            '$' => {
                if self.peek() != Some('(') {
                    return Err(self.unexpected());
                }
                self.pos += 1;
                let outer_start = self.bracket_start;
                let inner = self.parse_graph(Some(pos))?;
                self.bracket_start = outer_start;
                AtomExpr::Recursive(Box::new(inner))
            }
            _ if ch.is_ascii_uppercase() => {
                let z = element::atomic_num_from_symbol(&ch.to_string())
                    .ok_or(SmartsError::UnexpectedChar { pos, ch })?;
                element_expr(z, Some(false))
            }
            _ => return Err(SmartsError::UnexpectedChar { pos, ch }),
        };
        Ok(expr)
    }

    /// `H` names the element when it opens the bracket, after at most an
    /// isotope, and no count follows it.
    fn hydrogen_is_element(&self) -> bool {
        let h_at = self.pos - 1;
        self.chars[self.bracket_start..h_at]
            .iter()
            .all(char::is_ascii_digit)
            && !self.peek().is_some_and(|c| c.is_ascii_digit() || c == '{')
    }

    /// A count primitive with an optional number or `{lo-hi}` range. Without
    /// either it takes `bare` as its value, or means "at least one" when
    /// `bare` is `None`.
    fn counted(&mut self, kind: RangeKind, bare: Option<u8>) -> Result<AtomExpr, SmartsError> {
        if self.peek() == Some('{') {
            return self.parse_range(kind);
        }
        match (self.parse_small()?, bare) {
            (Some(n), _) | (None, Some(n)) => Ok(exact(kind, n)),
            (None, None) => Ok(AtomExpr::Range {
                kind,
                low: Some(1),
                high: None,
            }),
        }
    }

    /// `R`, `r` and `x` on their own mean ring membership.
    fn ring_counted(&mut self, kind: RangeKind) -> Result<AtomExpr, SmartsError> {
        if self.peek() == Some('{') {
            return self.parse_range(kind);
        }
        Ok(match self.parse_small()? {
            Some(n) => exact(kind, n),
            None => AtomExpr::InRing,
        })
    }

    fn parse_range(&mut self, kind: RangeKind) -> Result<AtomExpr, SmartsError> {
        let open = self.pos;
        self.pos += 1;
        let low = self.parse_small()?;
        let high = if self.peek() == Some('-') {
            self.pos += 1;
            self.parse_small()?
        } else {
            if low.is_none() {
                return Err(SmartsError::InvalidRange { pos: open });
            }
            low
        };
        if self.peek() != Some('}') || (low.is_none() && high.is_none()) {
            return Err(SmartsError::InvalidRange { pos: open });
        }
        if let (Some(lo), Some(hi)) = (low, high) {
            if lo > hi {
                return Err(SmartsError::InvalidRange { pos: open });
            }
        }
        self.pos += 1;
        Ok(AtomExpr::Range { kind, low, high })
    }

    fn parse_charge(&mut self, sign: char) -> Result<AtomExpr, SmartsError> {
        let pos = self.pos - 1;
        let mut magnitude: u32 = 1;
        if let Some(n) = self.parse_number()? {
            magnitude = n;
        } else {
            while self.peek() == Some(sign) {
                self.pos += 1;
                magnitude += 1;
            }
        }
        let magnitude = i8::try_from(magnitude).map_err(|_| SmartsError::NumberOverflow { pos })?;
        Ok(AtomExpr::Charge(if sign == '-' { -magnitude } else { magnitude }))
    }

    fn parse_bond_low(&mut self) -> Result<BondExpr, SmartsError> {
        let mut parts = vec![self.parse_bond_or()?];
        while self.peek() == Some(';') {
            self.pos += 1;
            parts.push(self.parse_bond_or()?);
        }
        Ok(bond_and(parts))
    }

    fn parse_bond_or(&mut self) -> Result<BondExpr, SmartsError> {
        let mut parts = vec![self.parse_bond_high()?];
        while self.peek() == Some(',') {
            self.pos += 1;
            parts.push(self.parse_bond_high()?);
        }
        Ok(bond_or(parts))
    }

    fn parse_bond_high(&mut self) -> Result<BondExpr, SmartsError> {
        let mut parts = vec![self.parse_bond_not()?];
        loop {
            match self.peek() {
                Some('&') => {
                    self.pos += 1;
                    parts.push(self.parse_bond_not()?);
                }
                Some(c) if starts_bond(c) => parts.push(self.parse_bond_not()?),
                _ => break,
            }
        }
        Ok(bond_and(parts))
    }

    fn parse_bond_not(&mut self) -> Result<BondExpr, SmartsError> {
        if self.peek() == Some('!') {
            self.pos += 1;
            let inner = self.parse_bond_not()?;
            return Ok(BondExpr::Not(Box::new(inner)));
        }
        let expr = match self.peek() {
            Some('-') => BondExpr::Single,
            Some('=') => BondExpr::Double,
            Some('#') => BondExpr::Triple,
            Some(':') => BondExpr::Aromatic,
            Some('~') => BondExpr::True,
            Some('@') => BondExpr::Ring,
            Some('/') => BondExpr::Up,
            Some('\\') => BondExpr::Down,
            _ => return Err(self.unexpected()),
        };
        self.pos += 1;
        Ok(expr)
    }
}

fn starts_bond(c: char) -> bool {
    matches!(c, '-' | '=' | '#' | ':' | '~' | '@' | '/' | '\\' | '!')
}

fn element_expr(atomic_num: u8, aromatic: Option<bool>) -> AtomExpr {
    AtomExpr::Element {
        atomic_num,
        aromatic,
    }
}

fn exact(kind: RangeKind, n: u8) -> AtomExpr {
    match kind {
        RangeKind::Degree => AtomExpr::Degree(n),
        RangeKind::NonHDegree => AtomExpr::NonHDegree(n),
        RangeKind::TotalHCount => AtomExpr::TotalHCount(n),
        RangeKind::ImplicitHCount => AtomExpr::ImplicitHCount(n),
        RangeKind::SmallestRingSize => AtomExpr::SmallestRingSize(n),
        RangeKind::RingMembership => AtomExpr::RingMembership(n),
        RangeKind::Valence => AtomExpr::Valence(n),
        RangeKind::RingBondCount => AtomExpr::RingBondCount(n),
        RangeKind::Connectivity => AtomExpr::Connectivity(n),
        RangeKind::HeteroNeighborCount => AtomExpr::HeteroNeighborCount(n),
        RangeKind::AliphaticHeteroNeighborCount => AtomExpr::AliphaticHeteroNeighborCount(n),
    }
}

fn connect(
    mol: &mut Mol,
    begin: NodeIndex,
    end: NodeIndex,
    expr: BondExpr,
    pos: usize,
) -> Result<(), SmartsError> {
    let dir = expr.direction();
    let mut bond = Bond::from_query(expr);
    bond.dir = dir;
    mol.add_bond(begin, end, bond).map_err(|e| match e {
        StructuralError::SelfBond(_) => SmartsError::SelfBond { pos },
        _ => SmartsError::DuplicateBond { pos },
    })?;
    Ok(())
}

/// Combines the expressions written at the opening and closing digit into
/// one read from the opener.
fn resolve_ring_bond(open: Option<BondExpr>, close: Option<BondExpr>) -> Option<BondExpr> {
    match (open, close) {
        (None, None) => Some(BondExpr::SingleOrAromatic),
        (Some(o), None) => Some(o),
        (None, Some(c)) => Some(c.reversed()),
        (Some(o), Some(c)) if o == c.reversed() => Some(o),
        _ => None,
    }
}

/// Hydrogen count named at the top level of a bracket atom.
fn carried_h(expr: &AtomExpr) -> u8 {
    match expr {
        AtomExpr::TotalHCount(n) => *n,
        AtomExpr::And(items) => items.iter().map(carried_h).find(|&n| n > 0).unwrap_or(0),
        _ => 0,
    }
}

fn written_chirality(expr: &AtomExpr) -> Option<ChiralTag> {
    match expr {
        AtomExpr::Chirality(tag) if tag.is_tetrahedral() => Some(*tag),
        AtomExpr::And(items) => items.iter().find_map(written_chirality),
        _ => None,
    }
}

fn set_chirality(expr: &mut AtomExpr, tag: ChiralTag) {
    match expr {
        AtomExpr::Chirality(t) => *t = tag,
        AtomExpr::And(items) => items.iter_mut().for_each(|e| set_chirality(e, tag)),
        _ => {}
    }
}

pub(crate) fn atom_and(parts: Vec<AtomExpr>) -> AtomExpr {
    let mut flat = Vec::with_capacity(parts.len());
    for p in parts {
        match p {
            AtomExpr::And(inner) => flat.extend(inner),
            other => flat.push(other),
        }
    }
    match flat.len() {
        1 => flat.swap_remove(0),
        _ => AtomExpr::And(flat),
    }
}

pub(crate) fn atom_or(parts: Vec<AtomExpr>) -> AtomExpr {
    let mut flat = Vec::with_capacity(parts.len());
    for p in parts {
        match p {
            AtomExpr::Or(inner) => flat.extend(inner),
            other => flat.push(other),
        }
    }
    match flat.len() {
        1 => flat.swap_remove(0),
        _ => AtomExpr::Or(flat),
    }
}

pub(crate) fn bond_and(parts: Vec<BondExpr>) -> BondExpr {
    let mut flat = Vec::with_capacity(parts.len());
    for p in parts {
        match p {
            BondExpr::And(inner) => flat.extend(inner),
            other => flat.push(other),
        }
    }
    match flat.len() {
        1 => flat.swap_remove(0),
        _ => BondExpr::And(flat),
    }
}

pub(crate) fn bond_or(parts: Vec<BondExpr>) -> BondExpr {
    let mut flat = Vec::with_capacity(parts.len());
    for p in parts {
        match p {
            BondExpr::Or(inner) => flat.extend(inner),
            other => flat.push(other),
        }
    }
    match flat.len() {
        1 => flat.swap_remove(0),
        _ => BondExpr::Or(flat),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(i: usize) -> NodeIndex {
        NodeIndex::new(i)
    }

    fn query_of(mol: &Mol, i: usize) -> &AtomExpr {
        mol.atom(n(i)).query.as_ref().unwrap()
    }

    #[test]
    fn bare_atoms_and_implicit_bonds() {
        let mol = parse("CCl").unwrap();
        assert_eq!(mol.atom_count(), 2);
        assert_eq!(query_of(&mol, 1), &element_expr(17, Some(false)));
        let e = mol.bond_between(n(0), n(1)).unwrap();
        assert_eq!(mol.bond(e).query, Some(BondExpr::SingleOrAromatic));

        let mol = parse("c*a").unwrap();
        assert_eq!(query_of(&mol, 0), &element_expr(6, Some(true)));
        assert_eq!(query_of(&mol, 1), &AtomExpr::True);
        assert_eq!(query_of(&mol, 2), &AtomExpr::Aromatic);
    }

    #[test]
    fn operator_precedence() {
        let mol = parse("[C,N;H1]").unwrap();
        assert_eq!(
            query_of(&mol, 0),
            &AtomExpr::And(vec![
                AtomExpr::Or(vec![element_expr(6, Some(false)), element_expr(7, Some(false))]),
                AtomExpr::TotalHCount(1),
            ])
        );
        let mol = parse("[C&X4,N]").unwrap();
        assert_eq!(
            query_of(&mol, 0),
            &AtomExpr::Or(vec![
                AtomExpr::And(vec![element_expr(6, Some(false)), AtomExpr::Connectivity(4)]),
                element_expr(7, Some(false)),
            ])
        );
        let mol = parse("[!#6!#1]").unwrap();
        assert_eq!(
            query_of(&mol, 0),
            &AtomExpr::And(vec![
                AtomExpr::Not(Box::new(element_expr(6, None))),
                AtomExpr::Not(Box::new(element_expr(1, None))),
            ])
        );
    }

    #[test]
    fn two_letter_symbols_win() {
        assert_eq!(query_of(&parse("[Cl]").unwrap(), 0), &element_expr(17, Some(false)));
        assert_eq!(query_of(&parse("[Na+]").unwrap(), 0), &AtomExpr::And(vec![
            element_expr(11, Some(false)),
            AtomExpr::Charge(1),
        ]));
        assert_eq!(query_of(&parse("[as]").unwrap(), 0), &element_expr(33, Some(true)));
        assert_eq!(query_of(&parse("[se]").unwrap(), 0), &element_expr(34, Some(true)));
    }

    #[test]
    fn hydrogen_element_versus_count() {
        assert_eq!(query_of(&parse("[H]").unwrap(), 0), &element_expr(1, Some(false)));
        assert_eq!(
            query_of(&parse("[2H]").unwrap(), 0),
            &AtomExpr::And(vec![AtomExpr::Isotope(2), element_expr(1, Some(false))])
        );
        let oh = parse("[OH]").unwrap();
        assert_eq!(
            query_of(&oh, 0),
            &AtomExpr::And(vec![element_expr(8, Some(false)), AtomExpr::TotalHCount(1)])
        );
        assert_eq!(oh.atom(n(0)).explicit_h_count, 1);
        assert_eq!(query_of(&parse("[CH2]").unwrap(), 0), &AtomExpr::And(vec![
            element_expr(6, Some(false)),
            AtomExpr::TotalHCount(2),
        ]));
    }

    #[test]
    fn counts_ranges_and_rings() {
        assert_eq!(query_of(&parse("[D3]").unwrap(), 0), &AtomExpr::Degree(3));
        assert_eq!(query_of(&parse("[R]").unwrap(), 0), &AtomExpr::InRing);
        assert_eq!(query_of(&parse("[R0]").unwrap(), 0), &AtomExpr::RingMembership(0));
        assert_eq!(query_of(&parse("[r6]").unwrap(), 0), &AtomExpr::SmallestRingSize(6));
        assert_eq!(
            query_of(&parse("[z]").unwrap(), 0),
            &AtomExpr::Range {
                kind: RangeKind::HeteroNeighborCount,
                low: Some(1),
                high: None
            }
        );
        assert_eq!(
            query_of(&parse("[D{2-3}]").unwrap(), 0),
            &AtomExpr::Range {
                kind: RangeKind::Degree,
                low: Some(2),
                high: Some(3)
            }
        );
        assert_eq!(
            query_of(&parse("[X{-2}]").unwrap(), 0),
            &AtomExpr::Range {
                kind: RangeKind::Connectivity,
                low: None,
                high: Some(2)
            }
        );
        assert_eq!(query_of(&parse("[^2]").unwrap(), 0), &AtomExpr::Hybridization(Hybridization::SP2));
        assert!(matches!(parse("[D{3-2}]"), Err(SmartsError::InvalidRange { pos: 2 })));
        assert!(matches!(parse("[D{2-3]"), Err(SmartsError::InvalidRange { .. })));
    }

    #[test]
    fn charges_and_classes() {
        assert_eq!(query_of(&parse("[+]").unwrap(), 0), &AtomExpr::Charge(1));
        assert_eq!(query_of(&parse("[--]").unwrap(), 0), &AtomExpr::Charge(-2));
        assert_eq!(query_of(&parse("[-3]").unwrap(), 0), &AtomExpr::Charge(-3));
        assert_eq!(
            query_of(&parse("[C:7]").unwrap(), 0),
            &AtomExpr::And(vec![element_expr(6, Some(false)), AtomExpr::AtomMapClass(7)])
        );
    }

    #[test]
    fn bond_expressions() {
        let mol = parse("C!-N").unwrap();
        let e = mol.bond_between(n(0), n(1)).unwrap();
        assert_eq!(mol.bond(e).query, Some(BondExpr::Not(Box::new(BondExpr::Single))));

        let mol = parse("C-,=N").unwrap();
        let e = mol.bond_between(n(0), n(1)).unwrap();
        assert_eq!(
            mol.bond(e).query,
            Some(BondExpr::Or(vec![BondExpr::Single, BondExpr::Double]))
        );

        let mol = parse("C-@N").unwrap();
        let e = mol.bond_between(n(0), n(1)).unwrap();
        assert_eq!(
            mol.bond(e).query,
            Some(BondExpr::And(vec![BondExpr::Single, BondExpr::Ring]))
        );
    }

    #[test]
    fn rings_and_branches() {
        let mol = parse("C1CC=1").unwrap();
        assert_eq!(mol.bond_count(), 3);
        let ring = mol.bond_between(n(0), n(2)).unwrap();
        assert_eq!(mol.bond(ring).query, Some(BondExpr::Double));
        let mol = parse("C(=O)(O)N").unwrap();
        assert_eq!(mol.degree(n(0)), 3);
        let mol = parse("C%10CC%10").unwrap();
        assert_eq!(mol.bond_count(), 3);
    }

    #[test]
    fn ring_closure_direction_is_read_from_the_opener() {
        let mol = parse("F/C=C1.C\\1").unwrap();
        let e = mol.bond_between(n(2), n(3)).unwrap();
        assert_eq!(mol.bond(e).query, Some(BondExpr::Up));
    }

    #[test]
    fn recursive_queries_nest() {
        let mol = parse("[$(C[$([OH]),$([NH2])])]").unwrap();
        let AtomExpr::Recursive(outer) = query_of(&mol, 0) else {
            panic!("expected a recursive predicate");
        };
        assert_eq!(outer.atom_count(), 2);
        let AtomExpr::Or(alternatives) = outer.atom(n(1)).query.as_ref().unwrap() else {
            panic!("expected alternatives");
        };
        assert_eq!(alternatives.len(), 2);
    }

    #[test]
    fn chirality_is_stored_against_the_reference_frame() {
        let mol = parse("F[C@H](Cl)Br").unwrap();
        assert_eq!(mol.atom(n(1)).chiral_tag, ChiralTag::TetrahedralCw);
        let mol = parse("[C@H](F)(Cl)Br").unwrap();
        assert_eq!(mol.atom(n(0)).chiral_tag, ChiralTag::TetrahedralCcw);
    }

    #[test]
    fn errors_carry_positions() {
        assert_eq!(parse("").unwrap_err(), SmartsError::EmptyInput);
        assert_eq!(parse("  ").unwrap_err(), SmartsError::EmptyInput);
        assert_eq!(parse("[C").unwrap_err(), SmartsError::UnclosedBracket { pos: 0 });
        assert_eq!(parse("C(C").unwrap_err(), SmartsError::UnmatchedParen { pos: 1 });
        assert_eq!(parse("CC)").unwrap_err(), SmartsError::UnmatchedParen { pos: 2 });
        assert_eq!(parse("C1CC").unwrap_err(), SmartsError::UnclosedRing { digit: 1, pos: 1 });
        assert_eq!(parse("C=").unwrap_err(), SmartsError::DanglingBond { pos: 1 });
        assert_eq!(parse("=C").unwrap_err(), SmartsError::DanglingBond { pos: 0 });
        assert_eq!(parse("[#0]").unwrap_err(), SmartsError::InvalidAtomicNum { pos: 1 });
        assert_eq!(parse("[$(CC]").unwrap_err(), SmartsError::UnclosedRecursive { pos: 1 });
        assert_eq!(parse("CQ").unwrap_err(), SmartsError::UnexpectedChar { pos: 1, ch: 'Q' });
        assert_eq!(parse("C1C1").unwrap_err(), SmartsError::DuplicateBond { pos: 1 });
        assert_eq!(parse("[]").unwrap_err(), SmartsError::UnexpectedChar { pos: 1, ch: ']' });
    }
}
