//! Final ranking of a game.

use crate::state::game::{ParticipantId, Session};

/// Position of one participant in the final ranking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Standing {
    /// Ranked participant.
    pub participant: ParticipantId,
    /// Points accumulated over the game.
    pub points: u32,
    /// Competition rank: tied participants share a rank and the next rank is skipped.
    pub rank: usize,
}

/// Headline result of a game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// One participant holds the top score alone.
    Winner {
        /// The winner.
        participant: ParticipantId,
        /// Their score.
        points: u32,
    },
    /// Several participants share the top score.
    Tie {
        /// Tied participants, in join order.
        participants: Vec<ParticipantId>,
        /// The shared score.
        points: u32,
    },
    /// Nobody joined the game.
    NoParticipants,
}

/// Ordered ranking plus its verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scoreboard {
    /// Every participant, best first; ties keep join order.
    pub standings: Vec<Standing>,
    /// Winner, tie or empty game.
    pub verdict: Verdict,
}

impl Scoreboard {
    /// One-line summary suitable for a chat message.
    pub fn headline(&self) -> String {
        match &self.verdict {
            Verdict::Winner { participant, points } => {
                format!("{participant} wins with {points} {}!", plural_points(*points))
            }
            Verdict::Tie {
                participants,
                points,
            } => {
                let names: Vec<&str> = participants.iter().map(|p| p.0.as_str()).collect();
                format!(
                    "It's a {}-way tie between {} with {points} {}!",
                    names.len(),
                    names.join(", "),
                    plural_points(*points)
                )
            }
            Verdict::NoParticipants => "No one played this game.".to_string(),
        }
    }
}

fn plural_points(points: u32) -> &'static str {
    if points == 1 { "point" } else { "points" }
}

/// Rank every joined participant of `session` by score.
pub fn finalize(session: &Session) -> Scoreboard {
    let mut scored: Vec<(ParticipantId, u32)> = session
        .participants
        .iter()
        .map(|participant| (participant.clone(), session.score_of(participant)))
        .collect();
    // Stable sort keeps join order inside a tie group.
    scored.sort_by(|a, b| b.1.cmp(&a.1));

    let mut standings = Vec::with_capacity(scored.len());
    for (index, (participant, points)) in scored.into_iter().enumerate() {
        let rank = match standings.last() {
            Some(Standing {
                points: previous,
                rank,
                ..
            }) if *previous == points => *rank,
            _ => index + 1,
        };
        standings.push(Standing {
            participant,
            points,
            rank,
        });
    }

    let verdict = verdict_of(&standings);
    Scoreboard { standings, verdict }
}

fn verdict_of(standings: &[Standing]) -> Verdict {
    let Some(top) = standings.first() else {
        return Verdict::NoParticipants;
    };

    let leaders: Vec<ParticipantId> = standings
        .iter()
        .take_while(|standing| standing.rank == 1)
        .map(|standing| standing.participant.clone())
        .collect();

    if leaders.len() == 1 {
        Verdict::Winner {
            participant: top.participant.clone(),
            points: top.points,
        }
    } else {
        Verdict::Tie {
            participants: leaders,
            points: top.points,
        }
    }
}
