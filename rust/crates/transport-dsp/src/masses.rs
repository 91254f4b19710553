//! Spectral mass grouping.
//!
//! Splits one frame into contiguous bin ranges, one per spectral peak.
//! A single scan watches the sign of `freq_reassigned - freq`:
//!
//!   + -> -  (falling)  the energy converges here: mark the mass center
//!   - -> +  (rising)   the energy diverges here: close the mass, open the next
//!
//! Mass weights are `sum |value|` over the range, normalized by the frame
//! total, so the masses of a non-silent frame sum to 1.

use crate::analysis::SpectralPoint;

/// Contiguous bin range `[left_bin, right_bin)` with its energy share.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralMass {
    pub left_bin: usize,
    pub center_bin: usize,
    pub right_bin: usize,
    pub mass: f64,
}

impl SpectralMass {
    fn open(bin: usize) -> Self {
        Self {
            left_bin: bin,
            center_bin: bin,
            right_bin: bin,
            mass: 0.0,
        }
    }

    pub fn bins(&self) -> std::ops::Range<usize> {
        self.left_bin..self.right_bin
    }
}

/// Group one frame into masses covering `[0, N)`.
///
/// Returns an empty sequence for an empty or silent frame. Zero-weight
/// masses inside a non-silent frame are kept so the ranges stay contiguous.
pub fn group_spectrum(points: &[SpectralPoint]) -> Vec<SpectralMass> {
    let n = points.len();
    let total: f64 = points.iter().map(|p| p.value.norm()).sum();
    if n == 0 || total <= 0.0 {
        return Vec::new();
    }

    let weight = |range: std::ops::Range<usize>| -> f64 {
        points[range].iter().map(|p| p.value.norm()).sum::<f64>() / total
    };

    let mut masses = Vec::new();
    let mut current = SpectralMass::open(0);
    let mut sign = is_above(&points[0]);

    for (i, p) in points.iter().enumerate().skip(1) {
        let current_sign = is_above(p);
        if current_sign != sign {
            if sign {
                // Both distances are non-negative here.
                let left_dist = points[i - 1].freq_reassigned - points[i - 1].freq;
                let right_dist = p.freq - p.freq_reassigned;
                current.center_bin = if right_dist < left_dist { i } else { i - 1 };
            } else {
                current.right_bin = i;
                current.mass = weight(current.bins());
                masses.push(current);
                current = SpectralMass::open(i);
            }
        }
        sign = current_sign;
    }

    current.right_bin = n;
    current.mass = weight(current.bins());
    masses.push(current);
    masses
}

#[inline]
fn is_above(p: &SpectralPoint) -> bool {
    p.freq_reassigned > p.freq
}
