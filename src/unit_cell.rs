//! Unit cells as stored in CHARMM frames.
//!
//! A unit cell record holds six `f64` words in the order `[a, γ, b, β, α, c]`. The angles are
//! usually stored as the sine of their complement, `sin(90° - angle)`, but older writers store
//! plain degrees. There is no flag in the format to tell the two apart, so a cell whose three
//! angle words all lie within `[-1, 1]` is taken to be sine-encoded. Cells with genuinely tiny
//! angles (which are not physical) would be misread by this rule.

use std::f64::consts::FRAC_PI_2;

use glam::{DVec3, Mat3, Vec3};
use tracing::trace;

/// Size of a unit cell record payload in bytes.
pub const UNIT_CELL_BYTES: usize = 6 * 8;

const A: usize = 0;
const GAMMA: usize = 1;
const B: usize = 2;
const BETA: usize = 3;
const ALPHA: usize = 4;
const C: usize = 5;

/// The periodic box of a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitCell {
    /// The box lengths `a`, `b`, `c`.
    pub lengths: DVec3,
    /// The angles `α`, `β`, `γ` in degrees.
    pub angles: DVec3,
}

impl UnitCell {
    pub const fn new(lengths: DVec3, angles: DVec3) -> Self {
        Self { lengths, angles }
    }

    /// A rectangular box.
    pub fn orthorhombic(a: f64, b: f64, c: f64) -> Self {
        Self::new(DVec3::new(a, b, c), DVec3::splat(90.0))
    }

    /// Decode the six stored words.
    pub fn decode(words: [f64; 6]) -> Self {
        let stored = [words[ALPHA], words[BETA], words[GAMMA]];
        let encoded = stored.iter().all(|v| (-1.0..=1.0).contains(v));
        let angles = if encoded {
            stored.map(|v| 90.0 - v.asin() * 90.0 / FRAC_PI_2)
        } else {
            trace!(?stored, "unit cell angles are not sine-encoded, taking degrees");
            stored
        };
        Self {
            lengths: DVec3::new(words[A], words[B], words[C]),
            angles: DVec3::from_array(angles),
        }
    }

    /// Encode into the six stored words, with sine-encoded angles.
    pub fn encode(&self) -> [f64; 6] {
        let encode = |angle: f64| (FRAC_PI_2 / 90.0 * (90.0 - angle)).sin();
        let mut words = [0.0; 6];
        words[A] = self.lengths.x;
        words[B] = self.lengths.y;
        words[C] = self.lengths.z;
        words[ALPHA] = encode(self.angles.x);
        words[BETA] = encode(self.angles.y);
        words[GAMMA] = encode(self.angles.z);
        words
    }

    /// The box vectors as the columns of a matrix.
    ///
    /// The first vector lies along the x-axis, the second in the xy-plane.
    pub fn matrix(&self) -> Mat3 {
        let [a, b, c] = self.lengths.to_array();
        let [alpha, beta, gamma] = self.angles.to_array().map(f64::to_radians);
        let (cos_alpha, cos_beta) = (alpha.cos(), beta.cos());
        let (sin_gamma, cos_gamma) = gamma.sin_cos();

        let cx = c * cos_beta;
        let cy = c * (cos_alpha - cos_beta * cos_gamma) / sin_gamma;
        let cz = (c * c - cx * cx - cy * cy).max(0.0).sqrt();

        Mat3::from_cols(
            Vec3::new(a as f32, 0.0, 0.0),
            Vec3::new((b * cos_gamma) as f32, (b * sin_gamma) as f32, 0.0),
            Vec3::new(cx as f32, cy as f32, cz as f32),
        )
    }
}
