use serde::Serialize;
use std::fmt;
use zpin_core::SwitchAddress;

/// Snapshot of every debounced switch state in the matrix.
///
/// Switches are numbered row-major (`row * columns + col`). The snapshot
/// renders as 32-bit words, first switch in the most significant bit of the
/// first word; a trailing partial word is padded with open switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwitchStates {
    rows: usize,
    columns: usize,
    words: Vec<u32>,
}

impl SwitchStates {
    /// All switches open.
    pub fn new(rows: usize, columns: usize) -> Self {
        Self {
            rows,
            columns,
            words: vec![0; (rows * columns).div_ceil(32)],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    fn bit(&self, address: SwitchAddress) -> Option<(usize, u32)> {
        if address.row >= self.rows || address.col >= self.columns {
            return None;
        }
        let index = address.row * self.columns + address.col;
        Some((index / 32, 1 << (31 - index % 32)))
    }

    /// Debounced state, `None` outside the matrix.
    pub fn get(&self, address: SwitchAddress) -> Option<bool> {
        self.bit(address)
            .map(|(word, mask)| self.words[word] & mask != 0)
    }

    pub(crate) fn set(&mut self, address: SwitchAddress, closed: bool) {
        if let Some((word, mask)) = self.bit(address) {
            if closed {
                self.words[word] |= mask;
            } else {
                self.words[word] &= !mask;
            }
        }
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Addresses of closed switches, row-major.
    pub fn closed(&self) -> impl Iterator<Item = SwitchAddress> + '_ {
        (0..self.rows)
            .flat_map(move |row| (0..self.columns).map(move |col| SwitchAddress::new(row, col)))
            .filter(|address| self.get(*address) == Some(true))
    }
}

/// Space-separated decimal words.
impl fmt::Display for SwitchStates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, word) in self.words.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{word}")?;
        }
        Ok(())
    }
}
