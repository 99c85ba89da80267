//! Pure scoring engine. Invoked exactly once per round, inside the guarded
//! close transaction; nothing here touches the store or the clock.

use indexmap::IndexMap;

use crate::dao::models::{GuessEntity, PlayerEntity, PlayerId, RoundResultEntity};

/// Base points for a correct guess.
pub const CORRECT_GUESS_POINTS: i32 = 50;
/// Bonus per second left on the clock, decaying linearly to zero at the limit.
pub const SPEED_BONUS_PER_SECOND: i32 = 5;
/// Points deducted for an incorrect guess.
pub const WRONG_GUESS_PENALTY: i32 = 25;

/// Score delta for one player's guess (or lack thereof).
pub fn guess_score_change(guess: Option<&GuessEntity>, time_limit_secs: u64) -> i32 {
    match guess {
        None => 0,
        Some(guess) if guess.correct => {
            let remaining = time_limit_secs.saturating_sub(guess.elapsed_seconds);
            CORRECT_GUESS_POINTS + remaining as i32 * SPEED_BONUS_PER_SECOND
        }
        Some(_) => -WRONG_GUESS_PENALTY,
    }
}

/// Apply a delta to a cumulative score, which never goes negative.
pub fn clamped_score(score: i32, change: i32) -> i32 {
    (score + change).max(0)
}

/// Compute the per-player results of a round from its collected guesses.
pub fn score_round(
    players: &[PlayerEntity],
    guesses: &IndexMap<PlayerId, GuessEntity>,
    time_limit_secs: u64,
) -> IndexMap<PlayerId, RoundResultEntity> {
    players
        .iter()
        .map(|player| {
            let change = guess_score_change(guesses.get(&player.id), time_limit_secs);
            (
                player.id.clone(),
                RoundResultEntity {
                    score_change: change,
                    new_score: clamped_score(player.score, change),
                },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guess(correct: bool, elapsed_seconds: u64) -> GuessEntity {
        GuessEntity {
            language: "Python".into(),
            elapsed_seconds,
            correct,
        }
    }

    fn player(id: &str, score: i32) -> PlayerEntity {
        PlayerEntity {
            id: id.into(),
            name: id.into(),
            score,
            is_host: false,
        }
    }

    #[test]
    fn correct_guess_earns_base_plus_speed_bonus() {
        assert_eq!(guess_score_change(Some(&guess(true, 10)), 30), 150);
    }

    #[test]
    fn correct_guess_at_the_limit_earns_only_the_base() {
        assert_eq!(guess_score_change(Some(&guess(true, 30)), 30), 50);
        assert_eq!(guess_score_change(Some(&guess(true, 45)), 30), 50);
    }

    #[test]
    fn incorrect_guess_costs_a_fixed_penalty() {
        assert_eq!(guess_score_change(Some(&guess(false, 2)), 30), -25);
    }

    #[test]
    fn missing_guess_is_neutral() {
        assert_eq!(guess_score_change(None, 30), 0);
    }

    #[test]
    fn cumulative_score_never_goes_negative() {
        assert_eq!(clamped_score(10, -25), 0);
        assert_eq!(clamped_score(100, -25), 75);
        assert_eq!(clamped_score(0, 0), 0);
    }

    #[test]
    fn round_results_cover_every_player() {
        let players = vec![player("a", 25), player("b", 0), player("c", 40)];
        let mut guesses = IndexMap::new();
        guesses.insert("a".to_string(), guess(true, 4));
        guesses.insert("b".to_string(), guess(false, 9));

        let results = score_round(&players, &guesses, 30);

        assert_eq!(results.len(), 3);
        assert_eq!(results["a"].score_change, 50 + 26 * 5);
        assert_eq!(results["a"].new_score, 25 + 180);
        assert_eq!(results["b"].score_change, -25);
        assert_eq!(results["b"].new_score, 0);
        assert_eq!(results["c"].score_change, 0);
        assert_eq!(results["c"].new_score, 40);
    }
}
