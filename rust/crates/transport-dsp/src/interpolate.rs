//! Transport-driven frame interpolation.
//!
//! For each coupling `(i, j, amount)` the two masses meet at a shared
//! bin between their centers. Each side's shape is copied there intact,
//! rotated so its center bin lands on a phase that continues the previous
//! frame (phase vocoder), and scaled so the transported energy is
//! conserved as `k` sweeps 0 -> 1:
//!
//!   X side: (1 - k) * amount / mass_x
//!   Y side:       k * amount / mass_y
//!
//! Where placements overlap, values add but the bin's frequency and next
//! phase come from the single largest contribution.

use crate::analysis::SpectralPoint;
use crate::masses::SpectralMass;
use crate::transport::TransportPlan;
use num_complex::Complex;
use std::f64::consts::PI;

/// Per-bin running phase, carried from one frame to the next.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseState {
    phases: Vec<f64>,
}

impl PhaseState {
    /// All-zero state for a new request.
    pub fn new(num_bins: usize) -> Self {
        Self {
            phases: vec![0.0; num_bins],
        }
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.phases
    }

    /// Phase at a possibly out-of-range bin; outside `[0, N)` reads 0.
    fn at(&self, bin: i64) -> f64 {
        usize::try_from(bin)
            .ok()
            .and_then(|b| self.phases.get(b))
            .copied()
            .unwrap_or(0.0)
    }

    fn replace(&mut self, phases: Vec<f64>) {
        debug_assert_eq!(phases.len(), self.phases.len());
        self.phases = phases;
    }
}

/// One frame's points together with their mass grouping.
#[derive(Debug, Clone, Copy)]
pub struct FrameSide<'a> {
    pub points: &'a [SpectralPoint],
    pub masses: &'a [SpectralMass],
}

/// Interpolator for a fixed window length and morph factor.
#[derive(Debug, Clone, Copy)]
pub struct FrameInterpolator {
    window_length: usize,
    factor: f64,
}

/// Where and how one coupling is rendered.
struct Placement {
    bin: i64,
    freq: f64,
    center_phase: f64,
    next_phase: f64,
}

/// Output buffers shared by every placement of one frame.
struct FrameAccumulator {
    points: Vec<SpectralPoint>,
    amplitudes: Vec<f64>,
    next_phases: Vec<f64>,
}

impl FrameInterpolator {
    pub fn new(window_length: usize, factor: f64) -> Self {
        Self {
            window_length,
            factor,
        }
    }

    /// Build the interpolated frame and advance `phases`.
    ///
    /// Bins no placement reaches come out silent, and their phase resets
    /// to 0 for the next frame.
    pub fn interpolate(
        &self,
        x: FrameSide<'_>,
        y: FrameSide<'_>,
        plan: &TransportPlan,
        phases: &mut PhaseState,
    ) -> Vec<SpectralPoint> {
        let n = x.points.len();
        debug_assert_eq!(n, y.points.len());
        debug_assert_eq!(n, phases.len());

        let k = self.factor;
        let mut acc = FrameAccumulator {
            points: x
                .points
                .iter()
                .map(|p| SpectralPoint::silent(p.time, p.freq))
                .collect(),
            amplitudes: vec![0.0; n],
            next_phases: vec![0.0; n],
        };

        for transfer in plan {
            let mass_x = &x.masses[transfer.source];
            let mass_y = &y.masses[transfer.target];
            let placement = self.placement(x.points, mass_x, y.points, mass_y, phases);

            acc.place(
                mass_x,
                x.points,
                (1.0 - k) * transfer.amount / mass_x.mass,
                &placement,
            );
            acc.place(
                mass_y,
                y.points,
                k * transfer.amount / mass_y.mass,
                &placement,
            );
        }

        phases.replace(acc.next_phases);
        acc.points
    }

    fn placement(
        &self,
        points_x: &[SpectralPoint],
        mass_x: &SpectralMass,
        points_y: &[SpectralPoint],
        mass_y: &SpectralMass,
        phases: &PhaseState,
    ) -> Placement {
        let k = self.factor;
        let cx = mass_x.center_bin as f64;
        let cy = mass_y.center_bin as f64;

        let bin = ((1.0 - k) * cx + k * cy).round_ties_even();

        // Re-derive the blend from the rounded bin so bin and frequency agree.
        let k_local = if mass_x.center_bin != mass_y.center_bin {
            (bin - cx) / (cy - cx)
        } else {
            k
        };
        let freq = (1.0 - k_local) * points_x[mass_x.center_bin].freq_reassigned
            + k_local * points_y[mass_y.center_bin].freq_reassigned;

        let advance = freq * self.window_length as f64 / 4.0;
        let center_phase = phases.at(bin as i64) + advance - PI * bin;
        let next_phase = center_phase + advance + PI * bin;

        Placement {
            bin: bin as i64,
            freq,
            center_phase,
            next_phase,
        }
    }
}

impl FrameAccumulator {
    /// Copy one mass's shape so its center lands on `placement.bin`.
    fn place(
        &mut self,
        mass: &SpectralMass,
        points: &[SpectralPoint],
        scale: f64,
        placement: &Placement,
    ) {
        let n = self.points.len();
        let phase_shift = placement.center_phase - points[mass.center_bin].value.arg();
        let offset = (placement.bin - mass.center_bin as i64) as isize;

        for b in mass.bins() {
            let Some(target) = b.checked_add_signed(offset).filter(|&t| t < n) else {
                continue;
            };
            let value = points[b].value;
            let mag = scale * value.norm();
            self.points[target].value += Complex::from_polar(mag, phase_shift + value.arg());

            if mag > self.amplitudes[target] {
                self.amplitudes[target] = mag;
                self.next_phases[target] = placement.next_phase;
                self.points[target].freq_reassigned = placement.freq;
            }
        }
    }
}

/// Interpolate one frame pair given their masses and coupling.
pub fn interpolate_frame(
    x: FrameSide<'_>,
    y: FrameSide<'_>,
    plan: &TransportPlan,
    phases: &mut PhaseState,
    window_length: usize,
    factor: f64,
) -> Vec<SpectralPoint> {
    FrameInterpolator::new(window_length, factor).interpolate(x, y, plan, phases)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::masses::group_spectrum;
    use crate::transport::transport_plan;

    const N: usize = 32;
    const L: usize = 64;

    /// Single-peak frame centered on `center`: triangular magnitudes that
    /// vanish 4 bins away, reassignment pointing at the center.
    fn peak_frame(center: usize, phase: f64) -> Vec<SpectralPoint> {
        (0..N)
            .map(|n| {
                let dist = (n as f64 - center as f64).abs();
                let mag = (4.0 - dist).max(0.0);
                let mut p = SpectralPoint::new(Complex::from_polar(mag, phase + 0.1 * n as f64), 0.0, n as f64);
                p.freq_reassigned = if n <= center {
                    n as f64 + 0.25
                } else {
                    n as f64 - 0.5
                };
                p
            })
            .collect()
    }

    /// Two-peak frame with valleys between.
    fn two_peak_frame() -> Vec<SpectralPoint> {
        (0..N)
            .map(|n| {
                let mag = 1.0 + (n as f64 * 0.7).sin().abs() * 3.0;
                let mut p = SpectralPoint::new(Complex::from_polar(mag, n as f64), 0.0, n as f64);
                let toward = if n < 8 || (16..24).contains(&n) { 0.3 } else { -0.3 };
                p.freq_reassigned = n as f64 + toward;
                p
            })
            .collect()
    }

    fn run(x: &[SpectralPoint], y: &[SpectralPoint], phases: &mut PhaseState, k: f64) -> Vec<SpectralPoint> {
        let mx = group_spectrum(x);
        let my = group_spectrum(y);
        let plan = transport_plan(&mx, &my);
        interpolate_frame(
            FrameSide { points: x, masses: &mx },
            FrameSide { points: y, masses: &my },
            &plan,
            phases,
            L,
            k,
        )
    }

    fn assert_magnitudes(out: &[SpectralPoint], expected: &[SpectralPoint]) {
        for (n, (o, e)) in out.iter().zip(expected).enumerate() {
            assert!(
                (o.value.norm() - e.value.norm()).abs() < 1e-9,
                "bin {n}: {} vs {}",
                o.value.norm(),
                e.value.norm()
            );
        }
    }

    #[test]
    fn test_identical_frames_keep_magnitudes() {
        let frame = two_peak_frame();
        assert_eq!(group_spectrum(&frame).len(), 2);
        for k in [0.0, 0.3, 0.5, 1.0] {
            let mut phases = PhaseState::new(N);
            let out = run(&frame, &frame, &mut phases, k);
            assert_magnitudes(&out, &frame);
        }
    }

    #[test]
    fn test_endpoints_reproduce_sources() {
        let x = peak_frame(8, 0.0);
        let y = two_peak_frame();

        let mut phases = PhaseState::new(N);
        assert_magnitudes(&run(&x, &y, &mut phases, 0.0), &x);

        let mut phases = PhaseState::new(N);
        assert_magnitudes(&run(&x, &y, &mut phases, 1.0), &y);
    }

    #[test]
    fn test_single_masses_meet_halfway() {
        let x = peak_frame(10, 0.0);
        let y = peak_frame(20, 1.0);
        let mut phases = PhaseState::new(N);
        let out = run(&x, &y, &mut phases, 0.5);

        let peak = out
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.value.norm().total_cmp(&b.1.value.norm()))
            .map(|(n, _)| n)
            .unwrap();
        assert_eq!(peak, 15);
        // both halves land in phase on the shared center
        assert!((out[15].value.norm() - 4.0).abs() < 1e-9);

        let expected_freq = 0.5 * x[10].freq_reassigned + 0.5 * y[20].freq_reassigned;
        assert!((out[15].freq_reassigned - expected_freq).abs() < 1e-12);

        // untouched bins stay silent at their nominal location
        assert_eq!(out[0].value.norm(), 0.0);
        assert_eq!(out[0].freq_reassigned, out[0].freq);
    }

    #[test]
    fn test_phase_state_advances() {
        let x = peak_frame(10, 0.0);
        let y = peak_frame(20, 1.0);
        let mut phases = PhaseState::new(N);

        let out = run(&x, &y, &mut phases, 0.5);
        let advance = out[15].freq_reassigned * L as f64 / 4.0;
        assert!((phases.as_slice()[15] - 2.0 * advance).abs() < 1e-9);
        // bins without contribution reset to zero
        assert_eq!(phases.as_slice()[0], 0.0);
        assert_eq!(phases.as_slice()[N - 1], 0.0);

        run(&x, &y, &mut phases, 0.5);
        assert!((phases.as_slice()[15] - 4.0 * advance).abs() < 1e-9);
    }

    #[test]
    fn test_center_phase_continues_previous_frame() {
        let x = peak_frame(10, 0.0);
        let mut phases = PhaseState::new(N);
        run(&x, &x, &mut phases, 0.0);
        let prev = phases.as_slice()[10];

        let out = run(&x, &x, &mut phases, 0.0);
        let advance = x[10].freq_reassigned * L as f64 / 4.0;
        let expected = prev + advance - PI * 10.0;
        let diff = (out[10].value.arg() - expected).rem_euclid(2.0 * PI);
        assert!(diff < 1e-9 || (2.0 * PI - diff) < 1e-9, "phase off by {diff}");
    }

    #[test]
    fn test_out_of_range_placements_are_dropped() {
        let x = peak_frame(1, 0.0);
        let y = peak_frame(30, 0.0);
        for k in [-0.5, 0.0, 0.5, 1.0, 1.5] {
            let mut phases = PhaseState::new(N);
            let out = run(&x, &y, &mut phases, k);
            assert_eq!(out.len(), N);
            assert!(out.iter().all(|p| p.value.re.is_finite() && p.value.im.is_finite()));
        }
    }

    #[test]
    fn test_empty_plan_gives_silent_frame() {
        let x = peak_frame(10, 0.0);
        let silent: Vec<SpectralPoint> = (0..N)
            .map(|n| SpectralPoint::silent(0.0, n as f64))
            .collect();
        let mut phases = PhaseState::new(N);
        run(&x, &x, &mut phases, 0.5);
        assert!(phases.as_slice().iter().any(|&p| p != 0.0));

        let out = run(&x, &silent, &mut phases, 0.5);
        assert!(out.iter().all(|p| p.value.norm() == 0.0));
        assert!(phases.as_slice().iter().all(|&p| p == 0.0));
    }
}
