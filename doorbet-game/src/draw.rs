use crate::{GameError, Result};
use doorbet_core::{Door, OddsConfig, Outcome};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Probabilities of the two group outcomes. Whatever mass is left is split evenly
/// across the eight individual doors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Odds {
    pub salad_probability: f64,
    pub pizza_probability: f64,
}

impl Default for Odds {
    fn default() -> Self {
        Self {
            salad_probability: 0.05,
            pizza_probability: 0.05,
        }
    }
}

impl From<OddsConfig> for Odds {
    fn from(config: OddsConfig) -> Self {
        Self {
            salad_probability: config.salad,
            pizza_probability: config.pizza,
        }
    }
}

impl Odds {
    pub fn new(salad_probability: f64, pizza_probability: f64) -> Result<Self> {
        let odds = Self {
            salad_probability,
            pizza_probability,
        };
        odds.validate()?;
        Ok(odds)
    }

    /// Fill in whichever side the caller left unset from `self`.
    pub fn with_overrides(self, salad: Option<f64>, pizza: Option<f64>) -> Result<Self> {
        Self::new(
            salad.unwrap_or(self.salad_probability),
            pizza.unwrap_or(self.pizza_probability),
        )
    }

    pub fn validate(&self) -> Result<()> {
        let in_range = |p: f64| p.is_finite() && (0.0..=1.0).contains(&p);
        if !in_range(self.salad_probability) {
            return Err(GameError::InvalidOdds(format!(
                "salad probability {} is outside [0, 1]",
                self.salad_probability
            )));
        }
        if !in_range(self.pizza_probability) {
            return Err(GameError::InvalidOdds(format!(
                "pizza probability {} is outside [0, 1]",
                self.pizza_probability
            )));
        }
        if self.salad_probability + self.pizza_probability > 1.0 {
            return Err(GameError::InvalidOdds(
                "group probabilities sum to more than 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Source of round outcomes. Injected into settlement so draws can be replayed.
pub trait OutcomeDraw: Send + Sync {
    fn draw(&self, odds: &Odds) -> Outcome;
}

/// Map a uniform sample `r` in [0, 1) and a door index to an outcome.
pub fn classify(r: f64, door_index: usize, odds: &Odds) -> Outcome {
    if r < odds.salad_probability {
        Outcome::Salad
    } else if r < odds.salad_probability + odds.pizza_probability {
        Outcome::Pizza
    } else {
        Outcome::Door(Door::ALL[door_index % Door::ALL.len()])
    }
}

pub struct RandomDraw<R> {
    rng: Mutex<R>,
}

impl<R: Rng + Send> RandomDraw<R> {
    pub fn new(rng: R) -> Self {
        Self {
            rng: Mutex::new(rng),
        }
    }
}

impl RandomDraw<StdRng> {
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng + Send> OutcomeDraw for RandomDraw<R> {
    fn draw(&self, odds: &Odds) -> Outcome {
        let mut rng = self.rng.lock();
        let r: f64 = rng.gen();
        let door_index = rng.gen_range(0..Door::ALL.len());
        classify(r, door_index, odds)
    }
}

/// Always yields the same outcome.
#[derive(Debug, Clone, Copy)]
pub struct FixedDraw(pub Outcome);

impl OutcomeDraw for FixedDraw {
    fn draw(&self, _odds: &Odds) -> Outcome {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_classify_boundaries() {
        let odds = Odds::default();
        assert_eq!(classify(0.0, 3, &odds), Outcome::Salad);
        assert_eq!(classify(0.049, 3, &odds), Outcome::Salad);
        assert_eq!(classify(0.05, 3, &odds), Outcome::Pizza);
        assert_eq!(classify(0.099, 0, &odds), Outcome::Pizza);
        assert_eq!(classify(0.1, 0, &odds), Outcome::Door(Door::Chua));
        assert_eq!(classify(0.99, 4, &odds), Outcome::Door(Door::Bo));
    }

    #[test]
    fn test_zero_group_odds_never_draw_groups() {
        let odds = Odds::new(0.0, 0.0).unwrap();
        let draw = RandomDraw::seeded(7);
        for _ in 0..1_000 {
            assert!(matches!(draw.draw(&odds), Outcome::Door(_)));
        }
    }

    #[test]
    fn test_seeded_draws_replay() {
        let odds = Odds::default();
        let first = RandomDraw::seeded(42);
        let second = RandomDraw::seeded(42);
        for _ in 0..50 {
            assert_eq!(first.draw(&odds), second.draw(&odds));
        }
    }

    #[test]
    fn test_door_mass_is_spread_over_all_doors() {
        let odds = Odds::new(0.25, 0.25).unwrap();
        let draw = RandomDraw::seeded(1);
        let mut counts: HashMap<Outcome, u32> = HashMap::new();
        for _ in 0..40_000 {
            *counts.entry(draw.draw(&odds)).or_default() += 1;
        }

        // Expect ~10000 per group and ~2500 per door.
        assert!((9_000..11_000).contains(&counts[&Outcome::Salad]));
        assert!((9_000..11_000).contains(&counts[&Outcome::Pizza]));
        for door in Door::ALL {
            assert!((2_000..3_000).contains(&counts[&Outcome::Door(door)]));
        }
    }

    #[test]
    fn test_odds_validation() {
        assert!(Odds::new(0.5, 0.5).is_ok());
        assert!(matches!(Odds::new(0.6, 0.5), Err(GameError::InvalidOdds(_))));
        assert!(Odds::new(f64::NAN, 0.0).is_err());
        assert!(Odds::new(0.0, 1.5).is_err());

        let odds = Odds::default().with_overrides(Some(0.0), None).unwrap();
        assert_eq!(odds.salad_probability, 0.0);
        assert_eq!(odds.pizza_probability, 0.05);
    }
}
