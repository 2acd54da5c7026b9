use crate::element;
use crate::smiles::error::SmilesError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Atom(AtomToken),
    Bond { bond: BondToken, pos: usize },
    RingClosure {
        bond: Option<BondToken>,
        digit: u16,
        pos: usize,
    },
    OpenParen(usize),
    CloseParen(usize),
    Dot(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomToken {
    pub atomic_num: u8,
    pub is_aromatic: bool,
    pub isotope: u16,
    pub chirality: ChiralityToken,
    pub hcount: Option<u8>,
    pub charge: i8,
    pub atom_class: u16,
    pub is_bracket: bool,
    pub pos: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChiralityToken {
    None,
    CounterClockwise,
    Clockwise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BondToken {
    Single,
    Double,
    Triple,
    Aromatic,
    Up,
    Down,
    /// `->`: dative bond towards the following atom.
    DativeRight,
    /// `<-`: dative bond towards the preceding atom.
    DativeLeft,
}

impl BondToken {
    pub fn is_directional(self) -> bool {
        matches!(self, Self::Up | Self::Down)
    }

    /// The same bond seen from its other end.
    pub fn reversed(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
            Self::DativeRight => Self::DativeLeft,
            Self::DativeLeft => Self::DativeRight,
            other => other,
        }
    }
}

pub fn tokenize(input: &str) -> Result<Vec<Token>, SmilesError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let next = chars.get(i + 1).copied();
        match chars[i] {
            ' ' | '\t' | '\r' | '\n' => {
                i += 1;
            }
            '[' => {
                let (tok, end) = parse_bracket_atom(&chars, i)?;
                tokens.push(Token::Atom(tok));
                i = end;
            }
            'B' if next == Some('r') => {
                tokens.push(Token::Atom(bare_atom(35, false, i)));
                i += 2;
            }
            'C' if next == Some('l') => {
                tokens.push(Token::Atom(bare_atom(17, false, i)));
                i += 2;
            }
            c @ ('B' | 'C' | 'N' | 'O' | 'P' | 'S' | 'F' | 'I') => {
                let z = element::atomic_num_from_symbol(&c.to_string()).unwrap_or(0);
                tokens.push(Token::Atom(bare_atom(z, false, i)));
                i += 1;
            }
            c @ ('b' | 'c' | 'n' | 'o' | 'p' | 's') => {
                let z = element::atomic_num_from_symbol(&c.to_ascii_uppercase().to_string())
                    .unwrap_or(0);
                tokens.push(Token::Atom(bare_atom(z, true, i)));
                i += 1;
            }
            '*' => {
                tokens.push(Token::Atom(bare_atom(0, false, i)));
                i += 1;
            }
            '-' if next == Some('>') => {
                tokens.push(Token::Bond { bond: BondToken::DativeRight, pos: i });
                i += 2;
            }
            '<' if next == Some('-') => {
                tokens.push(Token::Bond { bond: BondToken::DativeLeft, pos: i });
                i += 2;
            }
            c @ ('-' | '=' | '#' | ':' | '/' | '\\') => {
                let bond = match c {
                    '-' => BondToken::Single,
                    '=' => BondToken::Double,
                    '#' => BondToken::Triple,
                    ':' => BondToken::Aromatic,
                    '/' => BondToken::Up,
                    _ => BondToken::Down,
                };
                if !follows_atom(&tokens) {
                    return Err(SmilesError::DanglingBond { pos: i });
                }
                tokens.push(Token::Bond { bond, pos: i });
                i += 1;
            }
            '(' => {
                tokens.push(Token::OpenParen(i));
                i += 1;
            }
            ')' => {
                tokens.push(Token::CloseParen(i));
                i += 1;
            }
            '.' => {
                tokens.push(Token::Dot(i));
                i += 1;
            }
            '%' => {
                let digit = parse_percent_ring(&chars, i)?;
                let bond = take_pending_bond(&mut tokens);
                tokens.push(Token::RingClosure { bond, digit, pos: i });
                i += 3;
            }
            d @ '0'..='9' => {
                let bond = take_pending_bond(&mut tokens);
                tokens.push(Token::RingClosure {
                    bond,
                    digit: d as u16 - '0' as u16,
                    pos: i,
                });
                i += 1;
            }
            ch => return Err(SmilesError::UnexpectedChar { pos: i, ch }),
        }
    }

    Ok(tokens)
}

fn bare_atom(atomic_num: u8, aromatic: bool, pos: usize) -> AtomToken {
    AtomToken {
        atomic_num,
        is_aromatic: aromatic,
        isotope: 0,
        chirality: ChiralityToken::None,
        hcount: None,
        charge: 0,
        atom_class: 0,
        is_bracket: false,
        pos,
    }
}

fn follows_atom(tokens: &[Token]) -> bool {
    matches!(
        tokens.last(),
        Some(Token::Atom(_)) | Some(Token::RingClosure { .. }) | Some(Token::CloseParen(_)) | Some(Token::OpenParen(_))
    )
}

fn take_pending_bond(tokens: &mut Vec<Token>) -> Option<BondToken> {
    if let Some(Token::Bond { bond, .. }) = tokens.last() {
        let bond = *bond;
        tokens.pop();
        return Some(bond);
    }
    None
}

fn parse_percent_ring(chars: &[char], start: usize) -> Result<u16, SmilesError> {
    let digit = |k: usize| chars.get(k).and_then(|c| c.to_digit(10));
    match (digit(start + 1), digit(start + 2)) {
        (Some(d1), Some(d2)) => Ok((d1 * 10 + d2) as u16),
        _ => Err(SmilesError::UnexpectedChar { pos: start, ch: '%' }),
    }
}

fn parse_bracket_atom(chars: &[char], start: usize) -> Result<(AtomToken, usize), SmilesError> {
    let mut i = start + 1;

    let isotope = parse_number(chars, &mut i)
        .map(|v| u16::try_from(v).map_err(|_| SmilesError::InvalidIsotope { pos: start }))
        .transpose()?
        .unwrap_or(0);
    let (atomic_num, is_aromatic) = parse_bracket_element(chars, &mut i, start)?;
    let chirality = parse_chirality(chars, &mut i);
    let hcount = parse_hcount(chars, &mut i)?;
    let charge = parse_charge(chars, &mut i)?;
    let atom_class = parse_atom_class(chars, &mut i)?;

    if chars.get(i) != Some(&']') {
        return Err(SmilesError::UnclosedBracket { pos: start });
    }
    i += 1;

    Ok((
        AtomToken {
            atomic_num,
            is_aromatic,
            isotope,
            chirality,
            hcount: Some(hcount.unwrap_or(0)),
            charge,
            atom_class,
            is_bracket: true,
            pos: start,
        },
        i,
    ))
}

fn parse_number(chars: &[char], i: &mut usize) -> Option<u32> {
    let mut val: Option<u32> = None;
    while let Some(d) = chars.get(*i).and_then(|c| c.to_digit(10)) {
        val = Some(val.unwrap_or(0).saturating_mul(10).saturating_add(d));
        *i += 1;
    }
    val
}

/// Aromatic symbols allowed inside brackets, two-letter ones first.
const BRACKET_AROMATIC: [(&str, u8); 9] = [
    ("se", 34),
    ("te", 52),
    ("as", 33),
    ("b", 5),
    ("c", 6),
    ("n", 7),
    ("o", 8),
    ("p", 15),
    ("s", 16),
];

fn parse_bracket_element(
    chars: &[char],
    i: &mut usize,
    bracket_start: usize,
) -> Result<(u8, bool), SmilesError> {
    let Some(&first) = chars.get(*i) else {
        return Err(SmilesError::UnclosedBracket { pos: bracket_start });
    };
    if first == '*' {
        *i += 1;
        return Ok((0, false));
    }

    for (pat, z) in BRACKET_AROMATIC {
        let end = *i + pat.len();
        if end <= chars.len() && chars[*i..end].iter().copied().eq(pat.chars()) {
            *i = end;
            return Ok((z, true));
        }
    }

    if first.is_ascii_uppercase() {
        if let Some(&second) = chars.get(*i + 1).filter(|c| c.is_ascii_lowercase()) {
            let sym: String = [first, second].iter().collect();
            if let Some(z) = element::atomic_num_from_symbol(&sym) {
                *i += 2;
                return Ok((z, false));
            }
        }
        if let Some(z) = element::atomic_num_from_symbol(&first.to_string()) {
            *i += 1;
            return Ok((z, false));
        }
    }

    Err(SmilesError::InvalidElement {
        pos: *i,
        text: first.to_string(),
    })
}

fn parse_chirality(chars: &[char], i: &mut usize) -> ChiralityToken {
    if chars.get(*i) != Some(&'@') {
        return ChiralityToken::None;
    }
    *i += 1;
    if chars.get(*i) == Some(&'@') {
        *i += 1;
        ChiralityToken::Clockwise
    } else {
        ChiralityToken::CounterClockwise
    }
}

fn parse_hcount(chars: &[char], i: &mut usize) -> Result<Option<u8>, SmilesError> {
    if chars.get(*i) != Some(&'H') {
        return Ok(None);
    }
    let pos = *i;
    *i += 1;
    match parse_number(chars, i) {
        None => Ok(Some(1)),
        Some(n) => u8::try_from(n)
            .map(Some)
            .map_err(|_| SmilesError::InvalidHCount { pos }),
    }
}

fn parse_charge(chars: &[char], i: &mut usize) -> Result<i8, SmilesError> {
    let sign: i32 = match chars.get(*i) {
        Some('+') => 1,
        Some('-') => -1,
        _ => return Ok(0),
    };
    let pos = *i;
    let symbol = chars[*i];
    *i += 1;
    let magnitude = if let Some(n) = parse_number(chars, i) {
        n as i32
    } else {
        let mut count = 1;
        while chars.get(*i) == Some(&symbol) {
            count += 1;
            *i += 1;
        }
        count
    };
    i8::try_from(sign * magnitude).map_err(|_| SmilesError::InvalidCharge { pos })
}

fn parse_atom_class(chars: &[char], i: &mut usize) -> Result<u16, SmilesError> {
    if chars.get(*i) != Some(&':') {
        return Ok(0);
    }
    let pos = *i;
    *i += 1;
    match parse_number(chars, i) {
        Some(n) => u16::try_from(n).map_err(|_| SmilesError::InvalidAtomClass { pos }),
        None => Err(SmilesError::InvalidAtomClass { pos }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(tokens: &[Token], i: usize) -> &AtomToken {
        match &tokens[i] {
            Token::Atom(a) => a,
            other => panic!("expected atom, got {other:?}"),
        }
    }

    #[test]
    fn tokenize_methane() {
        let tokens = tokenize("C").unwrap();
        assert_eq!(tokens.len(), 1);
        let a = atom(&tokens, 0);
        assert_eq!(a.atomic_num, 6);
        assert!(!a.is_bracket);
        assert!(!a.is_aromatic);
    }

    #[test]
    fn tokenize_two_letter_organic() {
        let tokens = tokenize("ClCBr").unwrap();
        let zs: Vec<u8> = (0..3).map(|i| atom(&tokens, i).atomic_num).collect();
        assert_eq!(zs, vec![17, 6, 35]);
    }

    #[test]
    fn tokenize_bracket_atom() {
        let tokens = tokenize("[NH4+]").unwrap();
        let a = atom(&tokens, 0);
        assert_eq!(a.atomic_num, 7);
        assert!(a.is_bracket);
        assert_eq!(a.hcount, Some(4));
        assert_eq!(a.charge, 1);
    }

    #[test]
    fn tokenize_isotope_and_class() {
        let tokens = tokenize("[13CH3:7]").unwrap();
        let a = atom(&tokens, 0);
        assert_eq!(a.isotope, 13);
        assert_eq!(a.hcount, Some(3));
        assert_eq!(a.atom_class, 7);
    }

    #[test]
    fn tokenize_ring_closures() {
        let tokens = tokenize("C1CC=1").unwrap();
        assert!(matches!(&tokens[1], Token::RingClosure { digit: 1, bond: None, .. }));
        assert!(matches!(
            &tokens[4],
            Token::RingClosure { digit: 1, bond: Some(BondToken::Double), pos: 5 }
        ));
        let tokens = tokenize("C%10CC%10").unwrap();
        assert!(matches!(&tokens[1], Token::RingClosure { digit: 10, .. }));
    }

    #[test]
    fn tokenize_chirality() {
        let a = atom(&tokenize("[C@@H](F)(Cl)Br").unwrap(), 0).clone();
        assert_eq!(a.chirality, ChiralityToken::Clockwise);
        assert_eq!(a.hcount, Some(1));
        let a = atom(&tokenize("[C@](F)(Cl)(Br)I").unwrap(), 0).clone();
        assert_eq!(a.chirality, ChiralityToken::CounterClockwise);
    }

    #[test]
    fn aromatic_bracket_symbols() {
        for (s, z) in [("[se]", 34), ("[te]", 52), ("[as]", 33), ("[nH]", 7)] {
            let a = atom(&tokenize(s).unwrap(), 0).clone();
            assert!(a.is_aromatic, "{s}");
            assert_eq!(a.atomic_num, z, "{s}");
        }
        let a = atom(&tokenize("[Se]").unwrap(), 0).clone();
        assert!(!a.is_aromatic);
        assert_eq!(a.atomic_num, 34);
    }

    #[test]
    fn charge_variants() {
        for (s, q) in [("[O-]", -1), ("[O-2]", -2), ("[O--]", -2), ("[Fe+++]", 3), ("[Cu+2]", 2)] {
            assert_eq!(atom(&tokenize(s).unwrap(), 0).charge, q, "{s}");
        }
    }

    #[test]
    fn dative_and_dummy() {
        let tokens = tokenize("N->[Cu]<-*").unwrap();
        assert!(matches!(tokens[1], Token::Bond { bond: BondToken::DativeRight, pos: 1 }));
        assert!(matches!(tokens[3], Token::Bond { bond: BondToken::DativeLeft, .. }));
        assert_eq!(atom(&tokens, 4).atomic_num, 0);
    }

    #[test]
    fn errors_carry_positions() {
        assert_eq!(
            tokenize("CC?").unwrap_err(),
            SmilesError::UnexpectedChar { pos: 2, ch: '?' }
        );
        assert_eq!(
            tokenize("C[C").unwrap_err(),
            SmilesError::UnclosedBracket { pos: 1 }
        );
        assert_eq!(tokenize("=C").unwrap_err(), SmilesError::DanglingBond { pos: 0 });
        assert!(matches!(
            tokenize("[Xx]").unwrap_err(),
            SmilesError::InvalidElement { pos: 1, .. }
        ));
    }
}
