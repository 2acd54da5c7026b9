use serde::{Deserialize, Serialize};

/// A coordinate set whose rows run parallel to the owning molecule's atoms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conformer {
    pub id: u32,
    pub positions: Vec<[f64; 3]>,
    pub is_3d: bool,
}

impl Conformer {
    pub fn new(id: u32, positions: Vec<[f64; 3]>) -> Self {
        Self {
            id,
            positions,
            is_3d: true,
        }
    }

    pub fn num_atoms(&self) -> usize {
        self.positions.len()
    }

    pub fn position(&self, atom: usize) -> Option<[f64; 3]> {
        self.positions.get(atom).copied()
    }

    pub fn set_position(&mut self, atom: usize, pos: [f64; 3]) -> bool {
        match self.positions.get_mut(atom) {
            Some(slot) => {
                *slot = pos;
                true
            }
            None => false,
        }
    }

    /// Keeps row `i` iff `keep[i]`; rows keep their relative order.
    pub(crate) fn retain_rows(&mut self, keep: &[bool]) {
        let mut i = 0;
        self.positions.retain(|_| {
            let k = keep.get(i).copied().unwrap_or(false);
            i += 1;
            k
        });
    }

    /// Row `i` of the result is row `new_order[i]` of `self`.
    pub(crate) fn permuted(&self, new_order: &[usize]) -> Self {
        Self {
            id: self.id,
            positions: new_order.iter().map(|&old| self.positions[old]).collect(),
            is_3d: self.is_3d,
        }
    }
}
