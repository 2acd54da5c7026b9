use molkit::fingerprint::{
    morgan_fingerprint, path_fingerprint, MorganFingerprintParams, PathFingerprintParams,
};
use molkit::smiles::{from_smiles, to_canonical_smiles};
use molkit::Mol;

const MOLECULES: &[&str] = &[
    "C",
    "CC",
    "C=C",
    "C#N",
    "[H][H]",
    "CCO",
    "CCCl",
    "CC(C)C",
    "CC(C)(C)C",
    "CC(=O)O",
    "C1CC1",
    "C1CCCCC1",
    "c1ccccc1",
    "c1ccncc1",
    "c1ccoc1",
    "c1cc[nH]c1",
    "c1ccc2ccccc2c1",
    "C1CC2CCCC(C1)C2",
    "[NH4+]",
    "[Na+].[Cl-]",
    "C.C",
    "[O-][N+](=O)c1ccccc1",
    "[2H]C([2H])([2H])[2H]",
    "[13C]c1ccccc1",
    "[C@@H](F)(Cl)Br",
    "[C@](F)(Cl)(Br)I",
    "N[C@@H](C)C(=O)O",
    "OC[C@H]1OC(O)[C@H](O)[C@@H](O)[C@@H]1O",
    "F/C=C/F",
    r"F/C=C\F",
    r"Cl/C=C\Br",
    r"CC/C=C/CC",
    r"F/C=C/[C@@H](Cl)Br",
    "CC(=O)Nc1ccccc1",
    "c1ccc2c(c1)[nH]cc2",
    "CN1C=NC2=C1C(=O)N(C(=O)N2C)C",
    "CC(C)Cc1ccc(cc1)C(C)C(=O)O",
    "Nc1ccc(cc1)S(=O)(=O)Nc1ccccn1",
];

fn parse(smiles: &str) -> Mol {
    from_smiles(smiles).unwrap_or_else(|e| panic!("parse failed for '{smiles}': {e}"))
}

/// Every ordering of `0..n`, in lexicographic order.
fn all_permutations(n: usize) -> Vec<Vec<usize>> {
    fn extend(prefix: &mut Vec<usize>, used: &mut [bool], out: &mut Vec<Vec<usize>>) {
        if prefix.len() == used.len() {
            out.push(prefix.clone());
            return;
        }
        for i in 0..used.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            prefix.push(i);
            extend(prefix, used, out);
            prefix.pop();
            used[i] = false;
        }
    }
    let mut out = Vec::new();
    extend(&mut Vec::with_capacity(n), &mut vec![false; n], &mut out);
    out
}

/// Fisher-Yates shuffles driven by a fixed-seed xorshift generator.
fn random_permutations(n: usize, count: usize) -> Vec<Vec<usize>> {
    let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state
    };
    (0..count)
        .map(|_| {
            let mut perm: Vec<usize> = (0..n).collect();
            for i in (1..n).rev() {
                perm.swap(i, (next() % (i as u64 + 1)) as usize);
            }
            perm
        })
        .collect()
}

const EXHAUSTIVE_UP_TO: usize = 7;
const RANDOM_SAMPLES: usize = 60;

fn permutations_for(n: usize) -> Vec<Vec<usize>> {
    if n <= EXHAUSTIVE_UP_TO {
        all_permutations(n)
    } else {
        random_permutations(n, RANDOM_SAMPLES)
    }
}

#[test]
fn permutation_helpers() {
    assert_eq!(all_permutations(3).len(), 6);
    assert_eq!(all_permutations(0), vec![Vec::<usize>::new()]);
    for perm in random_permutations(10, 5) {
        let mut sorted = perm.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..10).collect::<Vec<_>>());
    }
}

#[test]
fn determinism_and_idempotence() {
    for &smiles in MOLECULES {
        let mol = parse(smiles);
        let first = to_canonical_smiles(&mol);
        assert_eq!(first, to_canonical_smiles(&mol), "determinism: {smiles}");
        let second = to_canonical_smiles(&parse(&first));
        assert_eq!(first, second, "round trip of '{smiles}' via '{first}'");
    }
}

#[test]
fn permutation_invariance() {
    for &smiles in MOLECULES {
        let mol = parse(smiles);
        let expected = to_canonical_smiles(&mol);
        for perm in permutations_for(mol.atom_count()) {
            let renum = mol
                .renumber_atoms(&perm)
                .unwrap_or_else(|e| panic!("renumber failed for '{smiles}' with {perm:?}: {e}"));
            let got = to_canonical_smiles(&renum);
            assert_eq!(expected, got, "'{smiles}' under {perm:?}");
        }
    }
}

#[test]
fn fingerprint_permutation_invariance() {
    let path_params = PathFingerprintParams::default();
    let morgan_params = MorganFingerprintParams {
        use_chirality: true,
        ..Default::default()
    };
    for &smiles in MOLECULES {
        let mol = parse(smiles);
        let path = path_fingerprint(&mol, &path_params).unwrap();
        let morgan = morgan_fingerprint(&mol, &morgan_params);
        for perm in random_permutations(mol.atom_count(), 5) {
            let renum = mol.renumber_atoms(&perm).unwrap();
            assert_eq!(path, path_fingerprint(&renum, &path_params).unwrap(), "{smiles}");
            assert_eq!(morgan, morgan_fingerprint(&renum, &morgan_params), "{smiles}");
        }
    }
}
