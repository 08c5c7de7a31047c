// extensions/easing.rs
//
// Easing table for tween progress remapping.
// Every curve is a free function in EASING_TABLE, addressed by the Easing id,
// so the batch kernel picks per-row behavior with one indexed call.

use std::f32::consts::PI;

use glam::{Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::api::types::Color;

/// Easing selector. The discriminant is the index into [`EASING_TABLE`].
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Easing {
    /// Constant velocity (no easing).
    #[default]
    Linear = 0,
    /// Slow start.
    QuadIn,
    /// Slow end.
    QuadOut,
    /// Slow start and end.
    QuadInOut,
    CubicIn,
    CubicOut,
    CubicInOut,
    QuartIn,
    QuartOut,
    QuartInOut,
    QuintIn,
    QuintOut,
    QuintInOut,
    /// Sine wave easing (smooth).
    SineIn,
    SineOut,
    SineInOut,
    /// Quarter-circle easing.
    CircIn,
    CircOut,
    CircInOut,
    /// Exponential easing (dramatic).
    ExpoIn,
    ExpoOut,
    ExpoInOut,
    /// Elastic spring, overshoots on both sides.
    ElasticIn,
    ElasticOut,
    ElasticInOut,
    /// Overshoot then settle.
    BackIn,
    BackOut,
    BackInOut,
    /// Bouncy finish.
    BounceIn,
    BounceOut,
    BounceInOut,
}

/// Signature shared by every entry of the easing table.
pub type EasingFn = fn(f32) -> f32;

/// Easing functions indexed by `Easing as usize`.
pub static EASING_TABLE: [EasingFn; Easing::COUNT] = [
    linear,
    quad_in,
    quad_out,
    quad_in_out,
    cubic_in,
    cubic_out,
    cubic_in_out,
    quart_in,
    quart_out,
    quart_in_out,
    quint_in,
    quint_out,
    quint_in_out,
    sine_in,
    sine_out,
    sine_in_out,
    circ_in,
    circ_out,
    circ_in_out,
    expo_in,
    expo_out,
    expo_in_out,
    elastic_in,
    elastic_out,
    elastic_in_out,
    back_in,
    back_out,
    back_in_out,
    bounce_in,
    bounce_out,
    bounce_in_out,
];

impl Easing {
    /// Number of easing variants (and table entries).
    pub const COUNT: usize = 31;

    /// Every variant, in id order.
    pub const ALL: [Easing; Easing::COUNT] = [
        Easing::Linear,
        Easing::QuadIn,
        Easing::QuadOut,
        Easing::QuadInOut,
        Easing::CubicIn,
        Easing::CubicOut,
        Easing::CubicInOut,
        Easing::QuartIn,
        Easing::QuartOut,
        Easing::QuartInOut,
        Easing::QuintIn,
        Easing::QuintOut,
        Easing::QuintInOut,
        Easing::SineIn,
        Easing::SineOut,
        Easing::SineInOut,
        Easing::CircIn,
        Easing::CircOut,
        Easing::CircInOut,
        Easing::ExpoIn,
        Easing::ExpoOut,
        Easing::ExpoInOut,
        Easing::ElasticIn,
        Easing::ElasticOut,
        Easing::ElasticInOut,
        Easing::BackIn,
        Easing::BackOut,
        Easing::BackInOut,
        Easing::BounceIn,
        Easing::BounceOut,
        Easing::BounceInOut,
    ];

    /// Small integer id of this selector.
    #[inline]
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Look up a selector by id. Returns `None` for ids past the table.
    pub fn from_id(id: u8) -> Option<Easing> {
        Self::ALL.get(id as usize).copied()
    }

    /// Look up a selector by its variant name (e.g. `"QuadOut"`).
    pub fn from_name(name: &str) -> Option<Easing> {
        Self::ALL.iter().copied().find(|e| e.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Easing::Linear => "Linear",
            Easing::QuadIn => "QuadIn",
            Easing::QuadOut => "QuadOut",
            Easing::QuadInOut => "QuadInOut",
            Easing::CubicIn => "CubicIn",
            Easing::CubicOut => "CubicOut",
            Easing::CubicInOut => "CubicInOut",
            Easing::QuartIn => "QuartIn",
            Easing::QuartOut => "QuartOut",
            Easing::QuartInOut => "QuartInOut",
            Easing::QuintIn => "QuintIn",
            Easing::QuintOut => "QuintOut",
            Easing::QuintInOut => "QuintInOut",
            Easing::SineIn => "SineIn",
            Easing::SineOut => "SineOut",
            Easing::SineInOut => "SineInOut",
            Easing::CircIn => "CircIn",
            Easing::CircOut => "CircOut",
            Easing::CircInOut => "CircInOut",
            Easing::ExpoIn => "ExpoIn",
            Easing::ExpoOut => "ExpoOut",
            Easing::ExpoInOut => "ExpoInOut",
            Easing::ElasticIn => "ElasticIn",
            Easing::ElasticOut => "ElasticOut",
            Easing::ElasticInOut => "ElasticInOut",
            Easing::BackIn => "BackIn",
            Easing::BackOut => "BackOut",
            Easing::BackInOut => "BackInOut",
            Easing::BounceIn => "BounceIn",
            Easing::BounceOut => "BounceOut",
            Easing::BounceInOut => "BounceInOut",
        }
    }

    /// Apply the easing function to a normalized time value `t` in [0, 1].
    /// Returns the eased value, typically in [0, 1] but Back/Elastic/Bounce can overshoot.
    #[inline]
    pub fn apply(self, t: f32) -> f32 {
        EASING_TABLE[self as usize](t.clamp(0.0, 1.0))
    }
}

// ── Table entries ────────────────────────────────────────────────────────

fn linear(t: f32) -> f32 {
    t
}

fn quad_in(t: f32) -> f32 {
    t * t
}

fn quad_out(t: f32) -> f32 {
    1.0 - (1.0 - t) * (1.0 - t)
}

fn quad_in_out(t: f32) -> f32 {
    if t < 0.5 {
        2.0 * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
    }
}

fn cubic_in(t: f32) -> f32 {
    t * t * t
}

fn cubic_out(t: f32) -> f32 {
    1.0 - (1.0 - t).powi(3)
}

fn cubic_in_out(t: f32) -> f32 {
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

fn quart_in(t: f32) -> f32 {
    t * t * t * t
}

fn quart_out(t: f32) -> f32 {
    1.0 - (1.0 - t).powi(4)
}

fn quart_in_out(t: f32) -> f32 {
    if t < 0.5 {
        8.0 * t * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(4) / 2.0
    }
}

fn quint_in(t: f32) -> f32 {
    t * t * t * t * t
}

fn quint_out(t: f32) -> f32 {
    1.0 - (1.0 - t).powi(5)
}

fn quint_in_out(t: f32) -> f32 {
    if t < 0.5 {
        16.0 * t * t * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(5) / 2.0
    }
}

fn sine_in(t: f32) -> f32 {
    1.0 - (t * PI / 2.0).cos()
}

fn sine_out(t: f32) -> f32 {
    (t * PI / 2.0).sin()
}

fn sine_in_out(t: f32) -> f32 {
    -((PI * t).cos() - 1.0) / 2.0
}

fn circ_in(t: f32) -> f32 {
    1.0 - (1.0 - t * t).max(0.0).sqrt()
}

fn circ_out(t: f32) -> f32 {
    (1.0 - (t - 1.0) * (t - 1.0)).max(0.0).sqrt()
}

fn circ_in_out(t: f32) -> f32 {
    if t < 0.5 {
        (1.0 - (1.0 - (2.0 * t).powi(2)).max(0.0).sqrt()) / 2.0
    } else {
        ((1.0 - (-2.0 * t + 2.0).powi(2)).max(0.0).sqrt() + 1.0) / 2.0
    }
}

fn expo_in(t: f32) -> f32 {
    if t == 0.0 { 0.0 } else { 2.0_f32.powf(10.0 * t - 10.0) }
}

fn expo_out(t: f32) -> f32 {
    if t == 1.0 { 1.0 } else { 1.0 - 2.0_f32.powf(-10.0 * t) }
}

fn expo_in_out(t: f32) -> f32 {
    if t == 0.0 {
        0.0
    } else if t == 1.0 {
        1.0
    } else if t < 0.5 {
        2.0_f32.powf(20.0 * t - 10.0) / 2.0
    } else {
        (2.0 - 2.0_f32.powf(-20.0 * t + 10.0)) / 2.0
    }
}

const C4: f32 = (2.0 * PI) / 3.0;
const C5: f32 = (2.0 * PI) / 4.5;

fn elastic_in(t: f32) -> f32 {
    if t == 0.0 {
        0.0
    } else if t == 1.0 {
        1.0
    } else {
        -(2.0_f32.powf(10.0 * t - 10.0)) * ((t * 10.0 - 10.75) * C4).sin()
    }
}

fn elastic_out(t: f32) -> f32 {
    if t == 0.0 {
        0.0
    } else if t == 1.0 {
        1.0
    } else {
        2.0_f32.powf(-10.0 * t) * ((t * 10.0 - 0.75) * C4).sin() + 1.0
    }
}

fn elastic_in_out(t: f32) -> f32 {
    if t == 0.0 {
        0.0
    } else if t == 1.0 {
        1.0
    } else if t < 0.5 {
        -(2.0_f32.powf(20.0 * t - 10.0) * ((20.0 * t - 11.125) * C5).sin()) / 2.0
    } else {
        (2.0_f32.powf(-20.0 * t + 10.0) * ((20.0 * t - 11.125) * C5).sin()) / 2.0 + 1.0
    }
}

const C1: f32 = 1.70158;
const C2: f32 = C1 * 1.525;
const C3: f32 = C1 + 1.0;

fn back_in(t: f32) -> f32 {
    C3 * t * t * t - C1 * t * t
}

fn back_out(t: f32) -> f32 {
    1.0 + C3 * (t - 1.0).powi(3) + C1 * (t - 1.0).powi(2)
}

fn back_in_out(t: f32) -> f32 {
    if t < 0.5 {
        (2.0 * t).powi(2) * ((C2 + 1.0) * 2.0 * t - C2) / 2.0
    } else {
        ((2.0 * t - 2.0).powi(2) * ((C2 + 1.0) * (t * 2.0 - 2.0) + C2) + 2.0) / 2.0
    }
}

fn bounce_in(t: f32) -> f32 {
    1.0 - bounce_out(1.0 - t)
}

fn bounce_out(t: f32) -> f32 {
    const N1: f32 = 7.5625;
    const D1: f32 = 2.75;

    if t < 1.0 / D1 {
        N1 * t * t
    } else if t < 2.0 / D1 {
        let t = t - 1.5 / D1;
        N1 * t * t + 0.75
    } else if t < 2.5 / D1 {
        let t = t - 2.25 / D1;
        N1 * t * t + 0.9375
    } else {
        let t = t - 2.625 / D1;
        N1 * t * t + 0.984375
    }
}

fn bounce_in_out(t: f32) -> f32 {
    if t < 0.5 {
        (1.0 - bounce_out(1.0 - 2.0 * t)) / 2.0
    } else {
        (1.0 + bounce_out(2.0 * t - 1.0)) / 2.0
    }
}

// ── Sampled curves ───────────────────────────────────────────────────────

/// One key of an [`EasingCurve`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveKey {
    pub time: f32,
    pub value: f32,
}

/// Arbitrary progress curve, evaluated piecewise-linearly between keys.
///
/// Only generic interpolation tasks accept curves; the position batch is
/// restricted to [`Easing`] so workers never touch heap data per row.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EasingCurve {
    keys: Vec<CurveKey>,
}

impl EasingCurve {
    /// Build a curve from keys in any order.
    pub fn new(keys: impl IntoIterator<Item = CurveKey>) -> Self {
        let mut keys: Vec<CurveKey> = keys.into_iter().collect();
        keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { keys }
    }

    /// Build a curve from values sampled at evenly spaced times over [0, 1].
    pub fn from_samples(samples: &[f32]) -> Self {
        let last = samples.len().saturating_sub(1).max(1) as f32;
        Self {
            keys: samples
                .iter()
                .enumerate()
                .map(|(i, &value)| CurveKey { time: i as f32 / last, value })
                .collect(),
        }
    }

    pub fn keys(&self) -> &[CurveKey] {
        &self.keys
    }

    /// Evaluate the curve. An empty curve behaves like [`Easing::Linear`];
    /// times outside the key range hold the nearest key's value.
    pub fn sample(&self, t: f32) -> f32 {
        let (first, last) = match (self.keys.first(), self.keys.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return t,
        };
        if t <= first.time {
            return first.value;
        }
        if t >= last.time {
            return last.value;
        }

        let upper = self.keys.partition_point(|k| k.time <= t);
        let a = self.keys[upper - 1];
        let b = self.keys[upper];
        let span = b.time - a.time;
        if span <= 0.0 {
            return b.value;
        }
        lerp(a.value, b.value, (t - a.time) / span)
    }
}

// ── Interpolation helpers ────────────────────────────────────────────────

/// Values a tween can interpolate. Interpolation is unclamped so eased
/// progress outside [0, 1] overshoots the endpoints.
pub trait Lerp: Copy {
    fn lerp(from: Self, to: Self, t: f32) -> Self;
}

impl Lerp for f32 {
    #[inline]
    fn lerp(from: Self, to: Self, t: f32) -> Self {
        from + (to - from) * t
    }
}

impl Lerp for Vec2 {
    #[inline]
    fn lerp(from: Self, to: Self, t: f32) -> Self {
        from + (to - from) * t
    }
}

impl Lerp for Vec3 {
    #[inline]
    fn lerp(from: Self, to: Self, t: f32) -> Self {
        from + (to - from) * t
    }
}

impl Lerp for Vec4 {
    #[inline]
    fn lerp(from: Self, to: Self, t: f32) -> Self {
        from + (to - from) * t
    }
}

impl Lerp for Color {
    #[inline]
    fn lerp(from: Self, to: Self, t: f32) -> Self {
        Color::from_vec4(<Vec4 as Lerp>::lerp(from.to_vec4(), to.to_vec4(), t))
    }
}

/// Linearly interpolate between two values.
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    <f32 as Lerp>::lerp(a, b, t)
}

/// Interpolate with easing.
#[inline]
pub fn ease<V: Lerp>(a: V, b: V, t: f32, easing: Easing) -> V {
    V::lerp(a, b, easing.apply(t))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_matches_selector_ids() {
        assert_eq!(EASING_TABLE.len(), Easing::COUNT);
        for (i, easing) in Easing::ALL.iter().enumerate() {
            assert_eq!(easing.id() as usize, i);
            assert_eq!(Easing::from_id(i as u8), Some(*easing));
            assert_eq!(Easing::from_name(easing.name()), Some(*easing));
        }
        assert_eq!(Easing::from_id(Easing::COUNT as u8), None);
    }

    #[test]
    fn every_curve_hits_endpoints() {
        for easing in Easing::ALL {
            let start = easing.apply(0.0);
            let end = easing.apply(1.0);
            assert!(start.abs() < 1e-4, "{:?} at 0 was {}", easing, start);
            assert!((end - 1.0).abs() < 1e-4, "{:?} at 1 was {}", easing, end);
        }
    }

    #[test]
    fn linear_endpoints() {
        assert_eq!(Easing::Linear.apply(0.0), 0.0);
        assert_eq!(Easing::Linear.apply(1.0), 1.0);
        assert_eq!(Easing::Linear.apply(0.5), 0.5);
    }

    #[test]
    fn quad_out_faster_start() {
        let mid = Easing::QuadOut.apply(0.5);
        assert!(mid > 0.5, "QuadOut at 0.5 should be > 0.5, got {}", mid);
    }

    #[test]
    fn overshoot_families_leave_unit_range() {
        assert!(Easing::BackOut.apply(0.6) > 1.0);
        assert!(Easing::BackIn.apply(0.2) < 0.0);
        assert!(Easing::ElasticOut.apply(0.1) > 1.0);
    }

    #[test]
    fn ease_interpolates_vectors() {
        let result = ease(Vec2::ZERO, Vec2::new(100.0, 50.0), 0.5, Easing::Linear);
        assert!((result - Vec2::new(50.0, 25.0)).length() < 0.001);
    }

    #[test]
    fn lerp_is_unclamped() {
        assert_eq!(lerp(0.0, 10.0, 1.5), 15.0);
        assert_eq!(lerp(0.0, 10.0, -0.5), -5.0);
    }

    #[test]
    fn curve_samples_between_keys() {
        let curve = EasingCurve::new([
            CurveKey { time: 1.0, value: 1.0 },
            CurveKey { time: 0.0, value: 0.0 },
            CurveKey { time: 0.5, value: 0.8 },
        ]);
        assert_eq!(curve.keys()[1].time, 0.5);
        assert!((curve.sample(0.25) - 0.4).abs() < 1e-6);
        assert!((curve.sample(0.75) - 0.9).abs() < 1e-6);
        assert_eq!(curve.sample(-1.0), 0.0);
        assert_eq!(curve.sample(2.0), 1.0);
    }

    #[test]
    fn curve_from_samples_is_evenly_spaced() {
        let curve = EasingCurve::from_samples(&[0.0, 0.25, 1.0]);
        assert_eq!(curve.keys()[1].time, 0.5);
        assert!((curve.sample(0.5) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn empty_curve_is_linear() {
        let curve = EasingCurve::default();
        assert_eq!(curve.sample(0.3), 0.3);
    }

    #[test]
    fn color_lerps_per_channel() {
        let c = Color::lerp(Color::BLACK, Color::WHITE, 0.5);
        assert_eq!(c, Color::new(0.5, 0.5, 0.5, 1.0));
    }
}
