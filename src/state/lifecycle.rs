//! Round lifecycle state machine.
//!
//! Everything here is a pure function of a session snapshot plus wall-clock
//! time, so it can run unchanged on any client observing the document with
//! arbitrary delay. The host controller drives these functions from a single
//! subscription loop plus a periodic tick; the store's optimistic transact
//! primitive provides the atomicity.

use std::time::{Duration, SystemTime};

use thiserror::Error;

use crate::{
    dao::models::{RoundEntity, SessionEntity, SessionStatus},
    state::scoring,
};

/// Lifecycle phase of one round within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    /// No content written yet (the round key is absent).
    Pending,
    /// Content written, results absent: guesses are being collected.
    Active,
    /// Results present: the round is closed and immutable.
    Closed,
}

/// Why an active round qualifies for closing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The round time limit elapsed.
    TimeLimit,
    /// Every player in the roster has guessed.
    AllGuessed,
}

/// Error returned when a transition is attempted from the wrong phase.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot {attempted} round {round} while {phase:?} (session {status:?})")]
pub struct InvalidTransition {
    /// Round number the transition addressed.
    pub round: u32,
    /// Phase the round was in.
    pub phase: RoundPhase,
    /// Session status at the time.
    pub status: SessionStatus,
    /// The transition that was attempted.
    pub attempted: &'static str,
}

/// Phase of the given round as observed in this snapshot.
pub fn round_phase(session: &SessionEntity, round_number: u32) -> RoundPhase {
    match session.round(round_number) {
        None => RoundPhase::Pending,
        Some(round) if round.is_closed() => RoundPhase::Closed,
        Some(_) => RoundPhase::Active,
    }
}

/// Whole seconds elapsed since the round started.
pub fn elapsed_seconds(round: &RoundEntity, now: SystemTime) -> u64 {
    now.duration_since(round.started_at)
        .unwrap_or_default()
        .as_secs()
}

/// Evaluate the termination condition for an active round: time limit
/// reached, or the entire roster has guessed.
pub fn termination_reason(
    session: &SessionEntity,
    round: &RoundEntity,
    now: SystemTime,
    time_limit: Duration,
) -> Option<CloseReason> {
    if !session.players.is_empty()
        && session
            .players
            .iter()
            .all(|player| round.guesses.contains_key(&player.id))
    {
        return Some(CloseReason::AllGuessed);
    }
    if elapsed_seconds(round, now) >= time_limit.as_secs() {
        return Some(CloseReason::TimeLimit);
    }
    None
}

/// Pending -> Active: write the round content.
///
/// Rejects anything but the current round of a playing session with no
/// content yet; writing over an already-active round is an error here and a
/// skip in the guarded mutation wrapping this call.
pub fn start_round(
    mut session: SessionEntity,
    round: RoundEntity,
) -> Result<SessionEntity, InvalidTransition> {
    let number = round.round_number;
    let phase = round_phase(&session, number);
    if session.status != SessionStatus::Playing
        || number != session.current_round
        || phase != RoundPhase::Pending
    {
        return Err(InvalidTransition {
            round: number,
            phase,
            status: session.status,
            attempted: "start",
        });
    }

    session.rounds.insert(number, round);
    Ok(session)
}

/// Active -> Closed: score the round and advance the session.
///
/// Writes the results map, the updated player scores, and either the next
/// round number or the finished status. The caller commits the returned
/// document in a single transaction so all of it lands atomically.
pub fn close_round(
    mut session: SessionEntity,
    round_number: u32,
    time_limit_secs: u64,
) -> Result<SessionEntity, InvalidTransition> {
    let phase = round_phase(&session, round_number);
    if session.status != SessionStatus::Playing
        || round_number != session.current_round
        || phase != RoundPhase::Active
    {
        return Err(InvalidTransition {
            round: round_number,
            phase,
            status: session.status,
            attempted: "close",
        });
    }

    let guesses = match session.rounds.get(&round_number) {
        Some(round) => round.guesses.clone(),
        None => {
            return Err(InvalidTransition {
                round: round_number,
                phase,
                status: session.status,
                attempted: "close",
            });
        }
    };

    let results = scoring::score_round(&session.players, &guesses, time_limit_secs);
    for player in &mut session.players {
        if let Some(result) = results.get(&player.id) {
            player.score = result.new_score;
        }
    }
    if let Some(round) = session.rounds.get_mut(&round_number) {
        round.results = Some(results);
    }

    if round_number < session.settings.round_count {
        session.current_round = round_number + 1;
    } else {
        session.status = SessionStatus::Finished;
    }

    Ok(session)
}
