//! Pheromone trails.
//!
//! A trail records the path a returning robot walked from a food-rich site back to
//! the nest. Trails fade exponentially and are shared by the whole swarm through a
//! single `PheromoneField`.

use serde::Serialize;
use tracing::debug;

use super::rng::RandomSource;
use crate::core::math::{exponential_decay, Vec2};
use crate::core::{CpfaError, CpfaResult};

pub const DEFAULT_STRENGTH_THRESHOLD: f64 = 0.001;

/// A decaying waypoint sequence from a discovery site to the nest.
///
/// `waypoints[0]` is the first position recorded after the pickup and the last
/// waypoint is the nest. A trail with no waypoints is never active.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PheromoneTrail {
    origin: Vec2,
    waypoints: Vec<Vec2>,
    polarity: Vec<u8>,
    last_update: u64,
    decay_rate: f64,
    strength: f64,
    threshold: f64,
}

impl PheromoneTrail {
    /// New trail at full strength (1.0) with the default threshold.
    pub fn new(
        origin: Vec2,
        waypoints: Vec<Vec2>,
        polarity: Vec<u8>,
        created_at: u64,
        decay_rate: f64,
    ) -> CpfaResult<Self> {
        Self::with_strength(
            origin,
            waypoints,
            polarity,
            created_at,
            decay_rate,
            1.0,
            DEFAULT_STRENGTH_THRESHOLD,
        )
    }

    pub fn with_strength(
        origin: Vec2,
        waypoints: Vec<Vec2>,
        polarity: Vec<u8>,
        created_at: u64,
        decay_rate: f64,
        strength: f64,
        threshold: f64,
    ) -> CpfaResult<Self> {
        if !(decay_rate.is_finite() && decay_rate > 0.0) {
            return Err(CpfaError::InvalidDecayRate(decay_rate));
        }
        Ok(PheromoneTrail {
            origin,
            waypoints,
            polarity,
            last_update: created_at,
            decay_rate,
            strength,
            threshold,
        })
    }

    /// Applies `strength · e^(−rate · (tick − last))` and stamps `tick`.
    ///
    /// Inactive trails are left untouched. A tick earlier than the last update
    /// counts as zero elapsed time.
    pub fn decay_to(&mut self, tick: u64) -> bool {
        if !self.is_active() {
            return false;
        }
        let elapsed = tick.saturating_sub(self.last_update);
        self.strength = exponential_decay(self.strength, elapsed as f64, self.decay_rate);
        self.last_update = self.last_update.max(tick);
        self.is_active()
    }

    pub fn is_active(&self) -> bool {
        !self.waypoints.is_empty() && self.strength >= self.threshold
    }

    pub fn origin(&self) -> Vec2 {
        self.origin
    }

    pub fn waypoints(&self) -> &[Vec2] {
        &self.waypoints
    }

    pub fn polarity(&self) -> &[u8] {
        &self.polarity
    }

    pub fn strength(&self) -> f64 {
        self.strength
    }

    pub fn last_update(&self) -> u64 {
        self.last_update
    }

    /// Nest-side end of the trail.
    pub fn endpoint(&self) -> Option<Vec2> {
        self.waypoints.last().copied()
    }
}

/// The swarm-wide set of trails.
///
/// Trails keep insertion order; selection and lookup walk them in that order so a
/// fixed random stream always gives the same answer.
#[derive(Clone, Debug, Default)]
pub struct PheromoneField {
    trails: Vec<PheromoneTrail>,
}

impl PheromoneField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, trail: PheromoneTrail) {
        self.trails.push(trail);
    }

    /// Decays every trail to `tick` and evicts the ones that faded out.
    /// Returns the number of evicted trails.
    pub fn decay_all(&mut self, tick: u64) -> usize {
        let before = self.trails.len();
        self.trails.retain_mut(|trail| trail.decay_to(tick));
        let evicted = before - self.trails.len();
        if evicted > 0 {
            debug!("[Pheromone] tick {}: {} trail(s) faded out", tick, evicted);
        }
        evicted
    }

    pub fn active(&self) -> impl Iterator<Item = &PheromoneTrail> {
        self.trails.iter().filter(|t| t.is_active())
    }

    pub fn active_count(&self) -> usize {
        self.active().count()
    }

    pub fn total_strength(&self) -> f64 {
        self.active().map(PheromoneTrail::strength).sum()
    }

    /// Strength-weighted pick: draws `w ~ U(0, S)` and walks the active trails,
    /// subtracting each strength until `w` falls under one.
    pub fn select_weighted(&self, rng: &mut dyn RandomSource) -> Option<&PheromoneTrail> {
        let total = self.total_strength();
        if !(total > 0.0) {
            return None;
        }

        let mut w = rng.uniform(0.0, total);
        let mut last = None;
        for trail in self.active() {
            if w < trail.strength() {
                return Some(trail);
            }
            w -= trail.strength();
            last = Some(trail);
        }
        // rounding can leave w a hair above the final strength
        last
    }

    /// First waypoint (trail order, then waypoint order) within `tolerance` of `position`.
    pub fn find_near(&self, position: Vec2, tolerance: f64) -> Option<(&PheromoneTrail, usize)> {
        let tolerance_sq = tolerance * tolerance;
        self.active().find_map(|trail| {
            trail
                .waypoints()
                .iter()
                .position(|w| position.square_distance(*w) <= tolerance_sq)
                .map(|idx| (trail, idx))
        })
    }

    pub fn trails(&self) -> &[PheromoneTrail] {
        &self.trails
    }

    pub fn len(&self) -> usize {
        self.trails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trails.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swarm::rng::testing::ScriptedRng;
    use crate::swarm::rng::SimRng;

    fn trail_at(points: &[(f64, f64)], strength: f64) -> PheromoneTrail {
        let waypoints: Vec<Vec2> = points.iter().map(|&p| p.into()).collect();
        let polarity = (0..waypoints.len()).map(|i| (i % 3) as u8).collect();
        PheromoneTrail::with_strength(
            waypoints.first().copied().unwrap_or_default(),
            waypoints,
            polarity,
            0,
            0.05,
            strength,
            DEFAULT_STRENGTH_THRESHOLD,
        )
        .unwrap()
    }

    #[test]
    fn decay_follows_exponential_law_and_is_monotone() {
        let mut trail = trail_at(&[(1.0, 1.0), (0.0, 0.0)], 1.0);
        let mut prev = trail.strength();
        let mut last_tick = 0;
        for tick in [5u64, 9, 9, 40, 41, 100] {
            let expected = prev * (-0.05 * (tick - last_tick) as f64).exp();
            trail.decay_to(tick);
            assert!((trail.strength() - expected).abs() < 1e-12);
            assert!(trail.strength() <= prev);
            prev = trail.strength();
            last_tick = tick;
        }
    }

    #[test]
    fn empty_trail_is_never_active() {
        let mut trail = trail_at(&[], 1.0);
        assert!(!trail.is_active());
        assert!(!trail.decay_to(0));
        assert!(!trail.decay_to(1_000));
        assert_eq!(trail.strength(), 1.0);
    }

    #[test]
    fn rejects_non_positive_decay_rate() {
        let err = PheromoneTrail::new(Vec2::ZERO, vec![Vec2::ZERO], vec![0], 0, 0.0);
        assert!(matches!(err, Err(CpfaError::InvalidDecayRate(_))));
    }

    #[test]
    fn faded_trail_is_excluded_from_selection_and_lookup() {
        let mut field = PheromoneField::new();
        field.add(trail_at(&[(2.0, 0.0), (0.0, 0.0)], 1.0));
        assert!(field.find_near(Vec2::new(2.0, 0.05), 0.1).is_some());

        // 0.05 * 200 = 10 → e^-10 < 0.001
        field.decay_all(200);
        assert!(field.is_empty());
        assert!(field.find_near(Vec2::new(2.0, 0.05), 0.1).is_none());
        let mut rng = SimRng::seeded(1);
        assert!(field.select_weighted(&mut rng).is_none());
    }

    #[test]
    fn repeated_decay_at_same_tick_is_idempotent() {
        let mut field = PheromoneField::new();
        field.add(trail_at(&[(1.0, 0.0)], 1.0));
        field.decay_all(10);
        let once = field.trails()[0].strength();
        field.decay_all(10);
        assert_eq!(field.trails()[0].strength(), once);
    }

    #[test]
    fn empty_field_never_selects() {
        let field = PheromoneField::new();
        let mut rng = SimRng::seeded(99);
        for _ in 0..1000 {
            assert!(field.select_weighted(&mut rng).is_none());
        }
    }

    #[test]
    fn selection_walks_in_insertion_order() {
        let mut field = PheromoneField::new();
        field.add(trail_at(&[(1.0, 0.0)], 0.2));
        field.add(trail_at(&[(2.0, 0.0)], 0.3));
        field.add(trail_at(&[(3.0, 0.0)], 0.5));

        // w = 0.1 → first, w = 0.45 → second, w = 0.95 → third
        for (u, expected_x) in [(0.1, 1.0), (0.45, 2.0), (0.95, 3.0)] {
            let mut rng = ScriptedRng::constant(u);
            let picked = field.select_weighted(&mut rng).unwrap();
            assert_eq!(picked.origin().x, expected_x);
        }
    }

    #[test]
    fn selection_frequency_tracks_strength() {
        let strengths = [0.1, 0.3, 0.6];
        let mut field = PheromoneField::new();
        for (i, s) in strengths.iter().enumerate() {
            field.add(trail_at(&[(i as f64, 0.0)], *s));
        }

        let mut rng = SimRng::seeded(2024);
        let draws = 60_000;
        let mut hits = [0usize; 3];
        for _ in 0..draws {
            let picked = field.select_weighted(&mut rng).unwrap();
            hits[picked.origin().x as usize] += 1;
        }
        for (i, s) in strengths.iter().enumerate() {
            let freq = hits[i] as f64 / draws as f64;
            assert!((freq - s).abs() < 0.015, "trail {} freq {} vs {}", i, freq, s);
        }
    }

    #[test]
    fn find_near_returns_first_match_in_order() {
        let mut field = PheromoneField::new();
        field.add(trail_at(&[(5.0, 5.0), (1.0, 0.0), (1.02, 0.0)], 1.0));
        field.add(trail_at(&[(1.0, 0.01)], 1.0));

        let (trail, idx) = field.find_near(Vec2::new(1.01, 0.0), 0.05).unwrap();
        assert_eq!(trail.origin(), Vec2::new(5.0, 5.0));
        assert_eq!(idx, 1);
        assert!(field.find_near(Vec2::new(-3.0, 0.0), 0.05).is_none());
    }
}
