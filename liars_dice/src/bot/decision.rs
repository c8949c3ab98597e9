//! Bot decision-making logic with difficulty-based behavior.
//!
//! A bot only sees its own dice. Every unseen die shows a given face with
//! probability 1/6, so the expected table count of a face is
//! `own + unseen / 6`. Bets are judged against that expectation, or
//! against the exact count once the bot has peeked.

use rand::{Rng, SeedableRng, rngs::StdRng};
use std::time::Duration;

use super::models::{BotDifficulty, DifficultyParams};
use crate::game::{
    constants::MAX_FACE,
    entities::{Bet, ChallengeAction, Face},
};

/// What a bot does on its turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotDecision {
    Raise(Bet),
    Challenge(ChallengeAction),
}

/// Context for bot decision making
#[derive(Debug, Clone)]
pub struct BotDecisionContext<'a> {
    /// Bot's own dice
    pub own_dice: &'a [Face],

    /// Standing bet (`Bet::NONE` to open)
    pub current_bet: Bet,

    /// Dice held across the whole table, including the bot's
    pub dice_in_play: usize,

    /// Exact table count of the bet's face, if the bot peeked this round
    pub known_count: Option<usize>,
}

impl BotDecisionContext<'_> {
    fn held(&self, face: Face) -> usize {
        self.own_dice.iter().filter(|&&d| d == face).count()
    }

    /// Expected table count of `face` given the bot's own dice
    pub fn expected_count(&self, face: Face) -> f64 {
        let unseen = self.dice_in_play.saturating_sub(self.own_dice.len());
        self.held(face) as f64 + unseen as f64 / f64::from(MAX_FACE)
    }

    /// Face the bot can best back up. Ties go to the higher face.
    fn favourite_face(&self) -> Face {
        let expected = |face: Face| self.expected_count(face);
        (1..=MAX_FACE)
            .max_by(|&a, &b| expected(a).total_cmp(&expected(b)))
            .unwrap_or(MAX_FACE)
    }
}

/// Bot strategy
pub struct BotStrategy {
    rng: StdRng,
    params: DifficultyParams,
}

impl BotStrategy {
    pub fn new(difficulty: BotDifficulty) -> Self {
        Self {
            rng: StdRng::from_os_rng(),
            params: DifficultyParams::from_difficulty(difficulty),
        }
    }

    /// Deterministic strategy for tests and replays
    pub fn with_seed(difficulty: BotDifficulty, seed: u64) -> Self {
        Self::with_params(DifficultyParams::from_difficulty(difficulty), seed)
    }

    pub fn with_params(params: DifficultyParams, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            params,
        }
    }

    pub fn params(&self) -> &DifficultyParams {
        &self.params
    }

    /// Whether the bot wants to peek before deciding
    pub fn wants_peek(&self, ctx: &BotDecisionContext) -> bool {
        self.params.peeks && ctx.current_bet.is_active() && ctx.known_count.is_none()
    }

    /// Randomized pause before acting
    pub fn think_time(&mut self) -> Duration {
        let base = self.params.base_think_time_ms;
        let variance = self.params.think_time_variance_ms;
        let low = base.saturating_sub(variance);
        Duration::from_millis(self.rng.random_range(low..=base + variance))
    }

    /// Decide bot action. Always returns something the rules accept:
    /// a raise strictly above the standing bet within the dice in play,
    /// or a challenge of an active bet.
    pub fn decide(&mut self, ctx: &BotDecisionContext) -> BotDecision {
        let in_play = u32::try_from(ctx.dice_in_play).unwrap_or(u32::MAX);
        let bet = ctx.current_bet;

        if !bet.is_active() {
            let face = ctx.favourite_face();
            // open a little under the expectation
            let quantity = (ctx.expected_count(face).floor() as u32)
                .saturating_sub(1)
                .clamp(1, in_play.max(1));
            return BotDecision::Raise(Bet::new(quantity, face));
        }

        let quantity = f64::from(bet.quantity);
        match ctx.known_count {
            Some(count) if count == bet.quantity as usize => {
                return BotDecision::Challenge(ChallengeAction::Exact);
            }
            Some(count) if count < bet.quantity as usize => {
                return BotDecision::Challenge(ChallengeAction::Liar);
            }
            Some(_) => {}
            None => {
                let believed = ctx.expected_count(bet.face);
                if (believed - quantity).abs() <= self.params.exact_window
                    && self.rng.random_bool(self.params.exact_frequency)
                {
                    return BotDecision::Challenge(ChallengeAction::Exact);
                }
                if quantity > believed + self.params.bluff_tolerance {
                    return BotDecision::Challenge(ChallengeAction::Liar);
                }
            }
        }

        let next = bet.quantity + 1;
        if next > in_play {
            return BotDecision::Challenge(ChallengeAction::Liar);
        }

        // The known count only covers the bet's face, so a peeked bot
        // keeps the face it knows holds up.
        let face = match ctx.known_count {
            Some(_) => bet.face,
            None => ctx.favourite_face(),
        };
        let backed = match ctx.known_count {
            Some(count) => count as f64,
            None => ctx.expected_count(face),
        };
        let bluffing = self.params.bluffs && self.rng.random_bool(self.params.bluff_frequency);
        if backed + self.params.bluff_tolerance >= f64::from(next) || bluffing {
            BotDecision::Raise(Bet::new(next, face))
        } else {
            BotDecision::Challenge(ChallengeAction::Liar)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::validate_escalation;
    use proptest::prelude::*;

    fn ctx(own: &[Face], bet: Bet, in_play: usize) -> BotDecisionContext<'_> {
        BotDecisionContext {
            own_dice: own,
            current_bet: bet,
            dice_in_play: in_play,
            known_count: None,
        }
    }

    #[test]
    fn expected_count_adds_a_sixth_of_the_unseen() {
        let own = [3, 3, 5, 1, 2];
        let c = ctx(&own, Bet::NONE, 17);
        assert!((c.expected_count(3) - 4.0).abs() < 1e-9);
        assert!((c.expected_count(6) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn opens_on_the_best_backed_face() {
        let own = [4, 4, 4, 1, 2];
        let mut bot = BotStrategy::with_seed(BotDifficulty::Standard, 1);
        match bot.decide(&ctx(&own, Bet::NONE, 10)) {
            BotDecision::Raise(bet) => {
                assert_eq!(bet.face, 4);
                assert!(bet.quantity >= 1);
            }
            other => panic!("expected an opening bet, got {other:?}"),
        }
    }

    #[test]
    fn calls_liar_on_an_impossible_looking_bet() {
        let own = [1, 2, 3, 4, 5];
        let mut bot = BotStrategy::with_seed(BotDifficulty::Sharp, 1);
        // nine 6s among ten dice while holding none
        let decision = bot.decide(&ctx(&own, Bet::new(9, 6), 10));
        assert_eq!(decision, BotDecision::Challenge(ChallengeAction::Liar));
    }

    #[test]
    fn challenges_when_no_raise_is_possible() {
        let own = [6, 6];
        let mut bot = BotStrategy::with_seed(BotDifficulty::Easy, 1);
        let decision = bot.decide(&ctx(&own, Bet::new(4, 6), 4));
        assert!(matches!(decision, BotDecision::Challenge(_)));
    }

    #[test]
    fn a_known_exact_count_is_called_exact() {
        let own = [2, 2, 5];
        let mut bot = BotStrategy::with_seed(BotDifficulty::Easy, 1);
        let mut c = ctx(&own, Bet::new(3, 2), 8);
        c.known_count = Some(3);
        assert_eq!(
            bot.decide(&c),
            BotDecision::Challenge(ChallengeAction::Exact)
        );
        c.known_count = Some(2);
        assert_eq!(
            bot.decide(&c),
            BotDecision::Challenge(ChallengeAction::Liar)
        );
    }

    #[test]
    fn think_time_stays_in_range() {
        let mut bot = BotStrategy::with_seed(BotDifficulty::Standard, 5);
        let params = bot.params().clone();
        let base = params.base_think_time_ms;
        let variance = params.think_time_variance_ms;
        for _ in 0..100 {
            let ms = bot.think_time().as_millis() as u64;
            assert!(ms >= base - variance);
            assert!(ms <= base + variance);
        }
    }

    proptest! {
        #[test]
        fn decisions_are_always_legal(
            own in prop::collection::vec(1u8..=6, 1..=5),
            others in 1usize..=30,
            quantity in 0u32..=35,
            face in 1u8..=6,
            seed in any::<u64>(),
        ) {
            let in_play = own.len() + others;
            let bet = if quantity == 0 || quantity as usize > in_play {
                Bet::NONE
            } else {
                Bet::new(quantity, face)
            };
            let mut bot = BotStrategy::with_seed(BotDifficulty::Standard, seed);
            match bot.decide(&ctx(&own, bet, in_play)) {
                BotDecision::Raise(next) => {
                    prop_assert!(validate_escalation(bet, next, in_play).is_ok());
                }
                BotDecision::Challenge(_) => prop_assert!(bet.is_active()),
            }
        }
    }
}
