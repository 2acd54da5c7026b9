use serde::Deserialize;

use molkit::fingerprint::{path_fingerprint, tanimoto, PathFingerprintParams};
use molkit::salts::SaltRemover;
use molkit::smiles::parse_smiles;
use molkit::substruct::{get_substruct_matches, SubstructMatchParams};
use molkit::{detect_chemistry_problems, from_smarts, from_smiles, to_canonical_smiles};
use molkit::SanitizeFlags;

fn load<T: for<'de> Deserialize<'de>>(json: &str) -> Vec<T> {
    serde_json::from_str(json).unwrap()
}

fn report(what: &str, failures: &[String]) {
    for f in failures {
        eprintln!("FAIL: {f}");
    }
    assert!(failures.is_empty(), "{} {what} cases failed", failures.len());
}

// ---------------------------------------------------------------------------
// Rings and aromaticity
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RingEntry {
    smiles: String,
    rings: usize,
    aromatic_atoms: usize,
}

const RINGS: &str = r#"[
    {"smiles": "CCO", "rings": 0, "aromatic_atoms": 0},
    {"smiles": "C1CC1", "rings": 1, "aromatic_atoms": 0},
    {"smiles": "c1ccccc1", "rings": 1, "aromatic_atoms": 6},
    {"smiles": "C1=CC=CC=C1", "rings": 1, "aromatic_atoms": 6},
    {"smiles": "c1ccncc1", "rings": 1, "aromatic_atoms": 6},
    {"smiles": "c1ccoc1", "rings": 1, "aromatic_atoms": 5},
    {"smiles": "c1cc[nH]c1", "rings": 1, "aromatic_atoms": 5},
    {"smiles": "c1ccc2ccccc2c1", "rings": 2, "aromatic_atoms": 10},
    {"smiles": "c1ccccc1Cc1ccccc1", "rings": 2, "aromatic_atoms": 12},
    {"smiles": "C1CCC2(CC1)CCCC2", "rings": 2, "aromatic_atoms": 0},
    {"smiles": "C1=CC=CC=CC=C1", "rings": 1, "aromatic_atoms": 0}
]"#;

#[test]
fn approval_rings_and_aromaticity() {
    let mut failures = Vec::new();
    for entry in load::<RingEntry>(RINGS) {
        let mol = from_smiles(&entry.smiles).unwrap();
        let rings = mol.ring_info_or_sssr().num_rings();
        let aromatic = mol.atoms().filter(|&a| mol.atom(a).is_aromatic).count();
        if (rings, aromatic) != (entry.rings, entry.aromatic_atoms) {
            failures.push(format!(
                "{}: expected {} rings / {} aromatic, got {rings} / {aromatic}",
                entry.smiles, entry.rings, entry.aromatic_atoms
            ));
        }
    }
    report("ring", &failures);
}

// ---------------------------------------------------------------------------
// Substructure matching
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct MatchEntry {
    smarts: String,
    smiles: String,
    matches: usize,
}

const MATCHES: &str = r#"[
    {"smarts": "[OX2H]", "smiles": "CCO", "matches": 1},
    {"smarts": "c1ccccc1", "smiles": "c1ccc2ccccc2c1", "matches": 2},
    {"smarts": "[#7]", "smiles": "Nc1ccncc1", "matches": 2},
    {"smarts": "C(=O)[OH]", "smiles": "OC(=O)CC(=O)O", "matches": 2},
    {"smarts": "[Cl,Br]", "smiles": "ClCCBr", "matches": 2},
    {"smarts": "[R]", "smiles": "C1CC1C", "matches": 3},
    {"smarts": "[NX3;H2]", "smiles": "NCCN(C)C", "matches": 1},
    {"smarts": "[$(C=O)]", "smiles": "CC(=O)CC=O", "matches": 2},
    {"smarts": "O", "smiles": "CCCC", "matches": 0}
]"#;

#[test]
fn approval_substructure_counts() {
    let params = SubstructMatchParams::default();
    let mut failures = Vec::new();
    for entry in load::<MatchEntry>(MATCHES) {
        let query = from_smarts(&entry.smarts).unwrap();
        let target = from_smiles(&entry.smiles).unwrap();
        let got = get_substruct_matches(&target, &query, &params).len();
        if got != entry.matches {
            failures.push(format!(
                "{} in {}: expected {}, got {got}",
                entry.smarts, entry.smiles, entry.matches
            ));
        }
    }
    report("substructure", &failures);
}

// ---------------------------------------------------------------------------
// Valence problems
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ProblemEntry {
    smiles: String,
    problems: usize,
}

const PROBLEMS: &str = r#"[
    {"smiles": "CCO", "problems": 0},
    {"smiles": "C(C)(C)(C)(C)C", "problems": 1},
    {"smiles": "CN(C)(C)C", "problems": 1},
    {"smiles": "FC(F)(F)(F)F.O(C)(C)C", "problems": 2},
    {"smiles": "C[N+](C)(C)C", "problems": 0}
]"#;

#[test]
fn approval_valence_problems() {
    let mut failures = Vec::new();
    for entry in load::<ProblemEntry>(PROBLEMS) {
        let mol = parse_smiles(&entry.smiles).unwrap();
        let got = detect_chemistry_problems(&mol, SanitizeFlags::PROPERTIES).len();
        if got != entry.problems {
            failures.push(format!(
                "{}: expected {} problems, got {got}",
                entry.smiles, entry.problems
            ));
        }
        assert_eq!(from_smiles(&entry.smiles).is_ok(), entry.problems == 0, "{}", entry.smiles);
    }
    report("valence", &failures);
}

// ---------------------------------------------------------------------------
// Salt stripping and similarity
// ---------------------------------------------------------------------------

#[test]
fn stripped_salt_matches_parent() {
    let remover = SaltRemover::default();
    for (salt, parent) in [
        ("CC(N)Cc1ccccc1.Cl", "CC(N)Cc1ccccc1"),
        ("C[NH3+].[Br-]", "C[NH3+]"),
        ("OC(=O)CCc1ccccc1.[Na+]", "OC(=O)CCc1ccccc1"),
    ] {
        let stripped = remover.strip(&from_smiles(salt).unwrap(), true).unwrap();
        let parent = from_smiles(parent).unwrap();
        assert_eq!(to_canonical_smiles(&stripped), to_canonical_smiles(&parent), "{salt}");

        let params = PathFingerprintParams::default();
        let a = path_fingerprint(&stripped, &params).unwrap();
        let b = path_fingerprint(&parent, &params).unwrap();
        assert_eq!(tanimoto(&a, &b).unwrap(), 1.0);
    }
}
