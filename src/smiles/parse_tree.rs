use crate::smiles::error::SmilesError;
use crate::smiles::tokenizer::{AtomToken, BondToken, Token};

const MAX_RING_DIGITS: usize = 100;

#[derive(Debug, Clone)]
pub struct ParseAtom {
    pub token: AtomToken,
    /// Bond ids in the order they appear in the text around this atom. The
    /// bond to the preceding atom, when there is one, comes first.
    pub written: Vec<usize>,
    pub has_prev: bool,
}

#[derive(Debug, Clone)]
pub struct ParseBond {
    /// For ring closures this is the atom that opened the ring digit.
    pub begin: usize,
    pub end: usize,
    /// Written bond symbol, oriented from `begin` to `end`.
    pub bond: Option<BondToken>,
    pub pos: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ParseTree {
    pub atoms: Vec<ParseAtom>,
    pub bonds: Vec<ParseBond>,
}

#[derive(Debug, Clone, Copy)]
struct RingOpen {
    atom: usize,
    bond: Option<BondToken>,
    pos: usize,
    /// Index of the placeholder in the opener's `written` list.
    slot: usize,
}

/// Placeholder for a ring bond that has been opened but not closed.
const PENDING: usize = usize::MAX;

pub fn build_parse_tree(tokens: &[Token]) -> Result<ParseTree, SmilesError> {
    let mut tree = ParseTree::default();
    let mut branches: Vec<(usize, usize)> = Vec::new();
    let mut current: Option<usize> = None;
    let mut pending_bond: Option<(BondToken, usize)> = None;
    let mut ring_opens: Vec<Option<RingOpen>> = vec![None; MAX_RING_DIGITS];

    for token in tokens {
        match token {
            Token::Atom(atom_tok) => {
                let idx = tree.atoms.len();
                tree.atoms.push(ParseAtom {
                    token: atom_tok.clone(),
                    written: Vec::new(),
                    has_prev: false,
                });
                match current {
                    Some(prev) => {
                        let (bond, pos) = match pending_bond.take() {
                            Some((b, pos)) => (Some(b), pos),
                            None => (None, atom_tok.pos),
                        };
                        let id = tree.bonds.len();
                        tree.bonds.push(ParseBond {
                            begin: prev,
                            end: idx,
                            bond,
                            pos,
                        });
                        tree.atoms[prev].written.push(id);
                        tree.atoms[idx].written.push(id);
                        tree.atoms[idx].has_prev = true;
                    }
                    None => {
                        if let Some((_, pos)) = pending_bond {
                            return Err(SmilesError::DanglingBond { pos });
                        }
                    }
                }
                current = Some(idx);
            }
            Token::Bond { bond, pos } => {
                if pending_bond.is_some() || current.is_none() {
                    return Err(SmilesError::DanglingBond { pos: *pos });
                }
                pending_bond = Some((*bond, *pos));
            }
            Token::RingClosure { bond, digit, pos } => {
                let cur = current.ok_or(SmilesError::DanglingBond { pos: *pos })?;
                let d = *digit as usize;
                match ring_opens[d].take() {
                    Some(open) => {
                        if open.atom == cur {
                            return Err(SmilesError::SelfBond { pos: *pos });
                        }
                        let resolved = resolve_ring_bond(open.bond, *bond)
                            .ok_or(SmilesError::RingBondConflict {
                                digit: *digit,
                                pos: *pos,
                            })?;
                        let id = tree.bonds.len();
                        tree.bonds.push(ParseBond {
                            begin: open.atom,
                            end: cur,
                            bond: resolved,
                            pos: open.pos,
                        });
                        tree.atoms[open.atom].written[open.slot] = id;
                        tree.atoms[cur].written.push(id);
                    }
                    None => {
                        let slot = tree.atoms[cur].written.len();
                        tree.atoms[cur].written.push(PENDING);
                        ring_opens[d] = Some(RingOpen {
                            atom: cur,
                            bond: *bond,
                            pos: *pos,
                            slot,
                        });
                    }
                }
            }
            Token::OpenParen(pos) => {
                let cur = current.ok_or(SmilesError::UnmatchedParen { pos: *pos })?;
                if let Some((_, bpos)) = pending_bond {
                    return Err(SmilesError::DanglingBond { pos: bpos });
                }
                branches.push((cur, *pos));
            }
            Token::CloseParen(pos) => {
                if let Some((_, bpos)) = pending_bond {
                    return Err(SmilesError::DanglingBond { pos: bpos });
                }
                let (atom, _) = branches
                    .pop()
                    .ok_or(SmilesError::UnmatchedParen { pos: *pos })?;
                current = Some(atom);
            }
            Token::Dot(pos) => {
                if pending_bond.is_some() {
                    return Err(SmilesError::DanglingBond { pos: *pos });
                }
                current = None;
            }
        }
    }

    if let Some((_, pos)) = pending_bond {
        return Err(SmilesError::DanglingBond { pos });
    }
    if let Some(&(_, pos)) = branches.last() {
        return Err(SmilesError::UnmatchedParen { pos });
    }
    if let Some((digit, open)) = ring_opens
        .iter()
        .enumerate()
        .filter_map(|(d, o)| o.map(|o| (d, o)))
        .min_by_key(|(_, o)| o.pos)
    {
        return Err(SmilesError::UnclosedRing {
            digit: digit as u16,
            pos: open.pos,
        });
    }

    Ok(tree)
}

/// Combines the symbols written at the opening and closing digit, returning
/// the bond as seen from the opener. `None` on a conflict.
fn resolve_ring_bond(
    open: Option<BondToken>,
    close: Option<BondToken>,
) -> Option<Option<BondToken>> {
    match (open, close) {
        (None, None) => Some(None),
        (Some(o), None) => Some(Some(o)),
        (None, Some(c)) => Some(Some(c.reversed())),
        (Some(o), Some(c)) if o == c.reversed() => Some(Some(o)),
        (Some(o), Some(c)) if o == c && !o.is_directional() => Some(Some(o)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smiles::tokenizer::tokenize;

    fn tree(s: &str) -> Result<ParseTree, SmilesError> {
        build_parse_tree(&tokenize(s)?)
    }

    #[test]
    fn chain_bonds_in_order() {
        let t = tree("CCO").unwrap();
        assert_eq!(t.atoms.len(), 3);
        let pairs: Vec<(usize, usize)> = t.bonds.iter().map(|b| (b.begin, b.end)).collect();
        assert_eq!(pairs, vec![(0, 1), (1, 2)]);
        assert!(!t.atoms[0].has_prev);
        assert!(t.atoms[1].has_prev);
    }

    #[test]
    fn branches_return_to_their_atom() {
        let t = tree("CC(C)(C)O").unwrap();
        let pairs: Vec<(usize, usize)> = t.bonds.iter().map(|b| (b.begin, b.end)).collect();
        assert_eq!(pairs, vec![(0, 1), (1, 2), (1, 3), (1, 4)]);
        assert_eq!(t.atoms[1].written, vec![0, 1, 2, 3]);
    }

    #[test]
    fn ring_bond_keeps_written_slot() {
        let t = tree("C1CC1").unwrap();
        assert_eq!(t.bonds.len(), 3);
        let ring = &t.bonds[2];
        assert_eq!((ring.begin, ring.end), (0, 2));
        assert_eq!(t.atoms[0].written, vec![2, 0]);
        assert_eq!(t.atoms[2].written, vec![1, 2]);
    }

    #[test]
    fn ring_bond_symbol_from_either_end() {
        let t = tree("C=1CC1").unwrap();
        assert_eq!(t.bonds[2].bond, Some(BondToken::Double));
        let t = tree("C1CC=1").unwrap();
        assert_eq!(t.bonds[2].bond, Some(BondToken::Double));
        let t = tree("C1CC/1").unwrap();
        assert_eq!(t.bonds[2].bond, Some(BondToken::Down));
    }

    #[test]
    fn ring_digits_are_reused() {
        let t = tree("C1CC1C1CC1").unwrap();
        assert_eq!(t.bonds.len(), 7);
    }

    #[test]
    fn conflicting_ring_bonds() {
        assert_eq!(
            tree("C=1CC#1").unwrap_err(),
            SmilesError::RingBondConflict { digit: 1, pos: 6 }
        );
    }

    #[test]
    fn structural_errors() {
        assert_eq!(tree("C1CC").unwrap_err(), SmilesError::UnclosedRing { digit: 1, pos: 1 });
        assert_eq!(tree("C(C").unwrap_err(), SmilesError::UnmatchedParen { pos: 1 });
        assert_eq!(tree("CC)").unwrap_err(), SmilesError::UnmatchedParen { pos: 2 });
        assert_eq!(tree("CC=").unwrap_err(), SmilesError::DanglingBond { pos: 2 });
        assert_eq!(tree("C11").unwrap_err(), SmilesError::SelfBond { pos: 2 });
        assert_eq!(tree("1C").unwrap_err(), SmilesError::DanglingBond { pos: 0 });
    }

    #[test]
    fn dot_starts_new_fragment() {
        let t = tree("C.C").unwrap();
        assert_eq!(t.atoms.len(), 2);
        assert!(t.bonds.is_empty());
    }

    #[test]
    fn ring_bond_across_dot() {
        let t = tree("C1.C1").unwrap();
        assert_eq!(t.bonds.len(), 1);
    }
}
