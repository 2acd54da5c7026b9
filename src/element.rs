//! Process-wide periodic table.
//!
//! The tables are immutable statics; the symbol index is built once on first
//! use and shared by every molecule.

use std::collections::HashMap;
use std::sync::OnceLock;

/// Static data for one element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElementInfo {
    pub symbol: &'static str,
    /// Standard atomic weight (mass number of the longest-lived isotope for
    /// elements without stable isotopes).
    pub atomic_weight: f64,
    pub outer_electrons: u8,
    /// Pauling electronegativity, when defined.
    pub electronegativity: Option<f64>,
}

macro_rules! el {
    ($sym:literal, $weight:literal, $outer:literal, $en:expr) => {
        ElementInfo {
            symbol: $sym,
            atomic_weight: $weight,
            outer_electrons: $outer,
            electronegativity: $en,
        }
    };
}

// Indexed by atomic number - 1.
static ELEMENTS: [ElementInfo; 118] = [
    el!("H", 1.008, 1, Some(2.20)),
    el!("He", 4.002602, 2, None),
    el!("Li", 6.941, 1, Some(0.98)),
    el!("Be", 9.0121831, 2, Some(1.57)),
    el!("B", 10.81, 3, Some(2.04)),
    el!("C", 12.011, 4, Some(2.55)),
    el!("N", 14.007, 5, Some(3.04)),
    el!("O", 15.999, 6, Some(3.44)),
    el!("F", 18.998403163, 7, Some(3.98)),
    el!("Ne", 20.1797, 8, None),
    el!("Na", 22.98976928, 1, Some(0.93)),
    el!("Mg", 24.305, 2, Some(1.31)),
    el!("Al", 26.9815384, 3, Some(1.61)),
    el!("Si", 28.085, 4, Some(1.90)),
    el!("P", 30.973761998, 5, Some(2.19)),
    el!("S", 32.06, 6, Some(2.58)),
    el!("Cl", 35.45, 7, Some(3.16)),
    el!("Ar", 39.948, 8, None),
    el!("K", 39.0983, 1, Some(0.82)),
    el!("Ca", 40.078, 2, Some(1.00)),
    el!("Sc", 44.955908, 3, Some(1.36)),
    el!("Ti", 47.867, 4, Some(1.54)),
    el!("V", 50.9415, 5, Some(1.63)),
    el!("Cr", 51.9961, 6, Some(1.66)),
    el!("Mn", 54.938043, 7, Some(1.55)),
    el!("Fe", 55.845, 8, Some(1.83)),
    el!("Co", 58.933194, 9, Some(1.88)),
    el!("Ni", 58.6934, 10, Some(1.91)),
    el!("Cu", 63.546, 11, Some(1.90)),
    el!("Zn", 65.38, 12, Some(1.65)),
    el!("Ga", 69.723, 3, Some(1.81)),
    el!("Ge", 72.630, 4, Some(2.01)),
    el!("As", 74.921595, 5, Some(2.18)),
    el!("Se", 78.971, 6, Some(2.55)),
    el!("Br", 79.904, 7, Some(2.96)),
    el!("Kr", 83.798, 8, Some(3.00)),
    el!("Rb", 85.4678, 1, Some(0.82)),
    el!("Sr", 87.62, 2, Some(0.95)),
    el!("Y", 88.90584, 3, Some(1.22)),
    el!("Zr", 91.224, 4, Some(1.33)),
    el!("Nb", 92.90637, 5, Some(1.6)),
    el!("Mo", 95.95, 6, Some(2.16)),
    el!("Tc", 97.0, 7, Some(1.9)),
    el!("Ru", 101.07, 8, Some(2.2)),
    el!("Rh", 102.90549, 9, Some(2.28)),
    el!("Pd", 106.42, 10, Some(2.20)),
    el!("Ag", 107.8682, 11, Some(1.93)),
    el!("Cd", 112.414, 12, Some(1.69)),
    el!("In", 114.818, 3, Some(1.78)),
    el!("Sn", 118.710, 4, Some(1.96)),
    el!("Sb", 121.760, 5, Some(2.05)),
    el!("Te", 127.60, 6, Some(2.1)),
    el!("I", 126.90447, 7, Some(2.66)),
    el!("Xe", 131.293, 8, Some(2.60)),
    el!("Cs", 132.90545196, 1, Some(0.79)),
    el!("Ba", 137.327, 2, Some(0.89)),
    el!("La", 138.90547, 3, Some(1.10)),
    el!("Ce", 140.116, 4, Some(1.12)),
    el!("Pr", 140.90766, 3, Some(1.13)),
    el!("Nd", 144.242, 4, Some(1.14)),
    el!("Pm", 145.0, 5, None),
    el!("Sm", 150.36, 6, Some(1.17)),
    el!("Eu", 151.964, 7, None),
    el!("Gd", 157.25, 8, Some(1.20)),
    el!("Tb", 158.925354, 9, None),
    el!("Dy", 162.500, 10, Some(1.22)),
    el!("Ho", 164.930328, 11, Some(1.23)),
    el!("Er", 167.259, 12, Some(1.24)),
    el!("Tm", 168.934218, 13, Some(1.25)),
    el!("Yb", 173.045, 14, None),
    el!("Lu", 174.9668, 3, Some(1.27)),
    el!("Hf", 178.486, 4, Some(1.3)),
    el!("Ta", 180.94788, 5, Some(1.5)),
    el!("W", 183.84, 6, Some(2.36)),
    el!("Re", 186.207, 7, Some(1.9)),
    el!("Os", 190.23, 8, Some(2.2)),
    el!("Ir", 192.217, 9, Some(2.20)),
    el!("Pt", 195.084, 10, Some(2.28)),
    el!("Au", 196.966570, 11, Some(2.54)),
    el!("Hg", 200.592, 12, Some(2.00)),
    el!("Tl", 204.38, 3, Some(1.62)),
    el!("Pb", 207.2, 4, Some(2.33)),
    el!("Bi", 208.98040, 5, Some(2.02)),
    el!("Po", 209.0, 6, Some(2.0)),
    el!("At", 210.0, 7, Some(2.2)),
    el!("Rn", 222.0, 8, None),
    el!("Fr", 223.0, 1, Some(0.7)),
    el!("Ra", 226.0, 2, Some(0.9)),
    el!("Ac", 227.0, 3, Some(1.1)),
    el!("Th", 232.0377, 4, Some(1.3)),
    el!("Pa", 231.03588, 3, Some(1.5)),
    el!("U", 238.02891, 4, Some(1.38)),
    el!("Np", 237.0, 5, Some(1.36)),
    el!("Pu", 244.0, 6, Some(1.28)),
    el!("Am", 243.0, 7, Some(1.3)),
    el!("Cm", 247.0, 8, Some(1.3)),
    el!("Bk", 247.0, 9, Some(1.3)),
    el!("Cf", 251.0, 10, Some(1.3)),
    el!("Es", 252.0, 11, Some(1.3)),
    el!("Fm", 257.0, 12, Some(1.3)),
    el!("Md", 258.0, 13, Some(1.3)),
    el!("No", 259.0, 14, Some(1.3)),
    el!("Lr", 266.0, 3, Some(1.3)),
    el!("Rf", 267.0, 4, None),
    el!("Db", 268.0, 5, None),
    el!("Sg", 269.0, 6, None),
    el!("Bh", 270.0, 7, None),
    el!("Hs", 277.0, 8, None),
    el!("Mt", 278.0, 9, None),
    el!("Ds", 281.0, 10, None),
    el!("Rg", 282.0, 11, None),
    el!("Cn", 285.0, 12, None),
    el!("Nh", 286.0, 3, None),
    el!("Fl", 289.0, 4, None),
    el!("Mc", 290.0, 5, None),
    el!("Lv", 293.0, 6, None),
    el!("Ts", 294.0, 7, None),
    el!("Og", 294.0, 8, None),
];

/// Highest atomic number in the table.
pub const MAX_ATOMIC_NUM: u8 = 118;

pub fn info(atomic_num: u8) -> Option<&'static ElementInfo> {
    if atomic_num == 0 {
        return None;
    }
    ELEMENTS.get(atomic_num as usize - 1)
}

/// Element symbol; `"*"` for the dummy atom (atomic number 0).
pub fn symbol(atomic_num: u8) -> &'static str {
    info(atomic_num).map_or("*", |e| e.symbol)
}

pub fn atomic_num_from_symbol(symbol: &str) -> Option<u8> {
    static INDEX: OnceLock<HashMap<&'static str, u8>> = OnceLock::new();
    INDEX
        .get_or_init(|| {
            ELEMENTS
                .iter()
                .enumerate()
                .map(|(i, e)| (e.symbol, i as u8 + 1))
                .collect()
        })
        .get(symbol)
        .copied()
}

pub fn atomic_weight(atomic_num: u8) -> f64 {
    info(atomic_num).map_or(0.0, |e| e.atomic_weight)
}

pub fn outer_shell_electrons(atomic_num: u8) -> u8 {
    info(atomic_num).map_or(0, |e| e.outer_electrons)
}

/// `true` when `a` is strictly more electronegative than `b`.
pub fn more_electronegative(a: u8, b: u8) -> bool {
    let en = |z| info(z).and_then(|e| e.electronegativity).unwrap_or(0.0);
    en(a) > en(b)
}

/// Allowed valences of the neutral element, lowest first. Empty for
/// elements whose bonding is not checked (transition metals, f-block).
pub fn default_valences(atomic_num: u8) -> &'static [u8] {
    match atomic_num {
        1 => &[1],
        2 | 10 | 18 | 36 | 86 => &[0],
        3 | 11 | 19 | 37 | 55 => &[1],
        4 | 12 | 20 | 38 | 56 => &[2],
        5 | 13 | 31 | 49 => &[3],
        6 | 14 | 32 => &[4],
        7 => &[3],
        8 => &[2],
        9 | 17 | 35 | 85 => &[1],
        15 | 33 | 51 => &[3, 5, 7],
        16 | 34 | 52 | 84 => &[2, 4, 6],
        50 | 82 => &[2, 4],
        53 => &[1, 3, 5],
        54 => &[0, 2, 4, 6],
        81 => &[1, 3],
        83 => &[3, 5],
        _ => &[],
    }
}

/// Allowed valences for an atom carrying `formal_charge`.
///
/// A charged main-group atom takes the valences of its isoelectronic
/// neighbour in the table (N+ behaves like C, O- like F).
pub fn allowed_valences(atomic_num: u8, formal_charge: i8) -> &'static [u8] {
    if formal_charge == 0 || default_valences(atomic_num).is_empty() {
        return default_valences(atomic_num);
    }
    let shifted = atomic_num as i16 - formal_charge as i16;
    if shifted <= 0 || shifted > MAX_ATOMIC_NUM as i16 {
        return &[];
    }
    default_valences(shifted as u8)
}

/// Elements that may be written without brackets in SMILES.
pub fn is_organic_subset(atomic_num: u8) -> bool {
    matches!(atomic_num, 5 | 6 | 7 | 8 | 9 | 15 | 16 | 17 | 35 | 53)
}
