//! Assembly of the guessable track pool from every participant's listening.

use std::sync::Arc;

use futures::future::join_all;
use indexmap::IndexMap;
use rand::seq::SliceRandom;
use tracing::{debug, info, warn};

use crate::{
    dao::track_source::TrackSource,
    state::game::{CandidateTrack, ParticipantId, PoolMode, TrackEntry},
};

/// Pool produced by [`build_pool`].
#[derive(Debug, Default)]
pub struct BuiltPool {
    /// Deduplicated entries in shuffled order.
    pub entries: Vec<TrackEntry>,
    /// Participants that contributed at least one entry, in join order.
    pub contributors: Vec<ParticipantId>,
}

/// Fetch up to `limit` candidates per participant, merge them by track id and shuffle.
///
/// Unauthorized participants and failed fetches contribute nothing; they can still guess.
pub async fn build_pool(
    participants: &[ParticipantId],
    source: Option<Arc<dyn TrackSource>>,
    mode: PoolMode,
    limit: usize,
) -> BuiltPool {
    let Some(source) = source else {
        info!("no music service configured; pool is empty");
        return BuiltPool::default();
    };

    let fetches = participants
        .iter()
        .map(|participant| fetch_candidates(source.as_ref(), participant, mode, limit));
    let fetched = join_all(fetches).await;

    let mut pool = merge(participants.iter().zip(fetched), limit);
    pool.entries.shuffle(&mut rand::rng());
    pool
}

async fn fetch_candidates(
    source: &dyn TrackSource,
    participant: &ParticipantId,
    mode: PoolMode,
    limit: usize,
) -> Vec<CandidateTrack> {
    if !source.is_authorized(participant).await {
        info!(participant = %participant, "participant has not linked an account; skipping");
        return Vec::new();
    }

    match source.fetch_tracks(participant, mode, limit).await {
        Ok(tracks) => {
            debug!(participant = %participant, count = tracks.len(), ?mode, "fetched candidate tracks");
            tracks
        }
        Err(err) => {
            warn!(participant = %participant, error = %err, "failed to fetch tracks; skipping");
            Vec::new()
        }
    }
}

/// Merge per-participant candidates in participant order. A repeated track keeps its first
/// position and gains the new owner.
fn merge<'a>(
    fetched: impl Iterator<Item = (&'a ParticipantId, Vec<CandidateTrack>)>,
    limit: usize,
) -> BuiltPool {
    let mut entries: IndexMap<String, TrackEntry> = IndexMap::new();
    let mut contributors = Vec::new();

    for (participant, candidates) in fetched {
        let mut contributed = false;
        for candidate in candidates.into_iter().take(limit) {
            if candidate.id.trim().is_empty() {
                continue;
            }
            contributed = true;
            match entries.get_mut(&candidate.id) {
                Some(entry) => {
                    entry.owners.insert(participant.clone());
                }
                None => {
                    entries.insert(
                        candidate.id.clone(),
                        TrackEntry::from_candidate(candidate, participant.clone()),
                    );
                }
            }
        }
        if contributed {
            contributors.push(participant.clone());
        }
    }

    BuiltPool {
        entries: entries.into_values().collect(),
        contributors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StaticTrackSource, candidate};

    fn ids(values: &[&str]) -> Vec<ParticipantId> {
        values.iter().map(|v| ParticipantId::from(*v)).collect()
    }

    #[test]
    fn shared_tracks_merge_owners_and_keep_first_position() {
        let a = ParticipantId::from("a");
        let b = ParticipantId::from("b");
        let pool = merge(
            [
                (&a, vec![candidate("t1"), candidate("t2")]),
                (&b, vec![candidate("t2"), candidate("t3")]),
            ]
            .into_iter(),
            20,
        );

        let order: Vec<&str> = pool.entries.iter().map(|e| e.track_id.as_str()).collect();
        assert_eq!(order, ["t1", "t2", "t3"]);
        assert_eq!(pool.entries[1].owners.len(), 2);
        assert!(pool.entries[1].is_owned_by(&a) && pool.entries[1].is_owned_by(&b));
        assert_eq!(pool.contributors, [a, b]);
    }

    #[test]
    fn items_without_id_are_dropped() {
        let a = ParticipantId::from("a");
        let pool = merge([(&a, vec![candidate(""), candidate("  ")])].into_iter(), 20);
        assert!(pool.entries.is_empty());
        assert!(pool.contributors.is_empty());
    }

    #[test]
    fn candidates_are_bounded_per_participant() {
        let a = ParticipantId::from("a");
        let candidates = (0..30).map(|i| candidate(&format!("t{i}"))).collect();
        let pool = merge([(&a, candidates)].into_iter(), 20);
        assert_eq!(pool.entries.len(), 20);
    }

    #[tokio::test]
    async fn unauthorized_and_failing_participants_are_skipped() {
        let source = StaticTrackSource::new()
            .with_tracks("a", &["t1", "t2"])
            .with_tracks("b", &["t2"])
            .with_failure("c");
        let participants = ids(&["a", "b", "c", "d"]);

        let pool = build_pool(&participants, Some(Arc::new(source)), PoolMode::Recent, 20).await;

        let mut tracks: Vec<&str> = pool.entries.iter().map(|e| e.track_id.as_str()).collect();
        tracks.sort();
        assert_eq!(tracks, ["t1", "t2"]);
        assert_eq!(pool.contributors, ids(&["a", "b"]));
        let shared = pool.entries.iter().find(|e| e.track_id == "t2").unwrap();
        assert_eq!(shared.owners.len(), 2);
    }

    #[tokio::test]
    async fn no_source_gives_an_empty_pool() {
        let pool = build_pool(&ids(&["a", "b"]), None, PoolMode::Library, 20).await;
        assert!(pool.entries.is_empty());
    }
}
