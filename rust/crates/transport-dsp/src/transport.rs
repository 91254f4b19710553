//! Exact 1-D optimal transport between two mass sequences.
//!
//! Both sequences are ordered along the frequency axis, so the optimal
//! coupling is the monotone one: sweep both cumulative distributions with
//! two pointers and emit whichever remainder runs out first. O(Mx + My).

use crate::masses::SpectralMass;

/// One coupling entry: move `amount` from source mass `source` to target
/// mass `target`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transfer {
    pub source: usize,
    pub target: usize,
    pub amount: f64,
}

/// Sparse transport plan, ordered by both source and target index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransportPlan {
    transfers: Vec<Transfer>,
}

impl TransportPlan {
    pub fn transfers(&self) -> &[Transfer] {
        &self.transfers
    }

    pub fn len(&self) -> usize {
        self.transfers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transfers.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.transfers.iter().map(|t| t.amount).sum()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Transfer> {
        self.transfers.iter()
    }

    fn emit(&mut self, source: usize, target: usize, amount: f64) {
        // Zero-weight masses and exhausted remainders couple nothing.
        if amount > 0.0 {
            self.transfers.push(Transfer {
                source,
                target,
                amount,
            });
        }
    }
}

impl<'a> IntoIterator for &'a TransportPlan {
    type Item = &'a Transfer;
    type IntoIter = std::slice::Iter<'a, Transfer>;

    fn into_iter(self) -> Self::IntoIter {
        self.transfers.iter()
    }
}

/// Compute the monotone transport plan from `x` to `y`.
///
/// An empty side yields an empty plan.
pub fn transport_plan(x: &[SpectralMass], y: &[SpectralMass]) -> TransportPlan {
    let mut plan = TransportPlan::default();
    if x.is_empty() || y.is_empty() {
        return plan;
    }

    let (mut i, mut j) = (0, 0);
    let mut px = x[0].mass;
    let mut py = y[0].mass;

    loop {
        if px < py {
            plan.emit(i, j, px);
            py -= px;
            i += 1;
            if i == x.len() {
                break;
            }
            px = x[i].mass;
        } else {
            plan.emit(i, j, py);
            px -= py;
            j += 1;
            if j == y.len() {
                break;
            }
            py = y[j].mass;
        }
    }

    plan
}
