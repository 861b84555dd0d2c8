//! Per-bar 0/1 pattern flags aligned with a series.

use serde::{Deserialize, Serialize};

/// One flag per bar; `1` marks a detected pattern at that index.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Signal(Vec<u8>);

impl Signal {
    pub fn zeros(len: usize) -> Self {
        Self(vec![0; len])
    }

    pub(crate) fn set(&mut self, index: usize) {
        self.0[index] = 1;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Flag at `index`, 0 when out of range.
    #[inline]
    pub fn get(&self, index: usize) -> u8 {
        self.0.get(index).copied().unwrap_or(0)
    }

    #[inline]
    pub fn is_set(&self, index: usize) -> bool {
        self.get(index) == 1
    }

    /// Number of bars where the pattern fired.
    pub fn fired_count(&self) -> usize {
        self.0.iter().map(|&s| s as usize).sum()
    }

    pub fn fired_indices(&self) -> Vec<usize> {
        self.0
            .iter()
            .enumerate()
            .filter_map(|(i, &s)| (s == 1).then_some(i))
            .collect()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        self.0.iter().copied()
    }
}

impl From<Vec<u8>> for Signal {
    /// Any non-zero flag is normalised to 1.
    fn from(flags: Vec<u8>) -> Self {
        Self(flags.into_iter().map(|f| u8::from(f != 0)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeros() {
        let signal = Signal::zeros(4);
        assert_eq!(signal.len(), 4);
        assert_eq!(signal.fired_count(), 0);
        assert!(signal.fired_indices().is_empty());
    }

    #[test]
    fn test_from_vec_normalises() {
        let signal = Signal::from(vec![0, 3, 1, 0]);
        assert_eq!(signal.as_slice(), &[0, 1, 1, 0]);
        assert_eq!(signal.fired_count(), 2);
        assert_eq!(signal.fired_indices(), vec![1, 2]);
    }

    #[test]
    fn test_get_out_of_range() {
        let signal = Signal::from(vec![1]);
        assert!(signal.is_set(0));
        assert_eq!(signal.get(5), 0);
    }
}
