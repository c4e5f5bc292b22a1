use serde::Deserialize;

use crate::state::game::CandidateTrack;

const UNKNOWN_ARTIST: &str = "Unknown artist";

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: u64,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecentlyPlayedResponse {
    pub items: Vec<PlayHistoryItem>,
}

#[derive(Debug, Deserialize)]
pub struct PlayHistoryItem {
    pub track: TrackObject,
}

#[derive(Debug, Deserialize)]
pub struct SavedTracksResponse {
    pub items: Vec<SavedTrackItem>,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SavedTrackItem {
    pub track: TrackObject,
}

#[derive(Debug, Deserialize)]
pub struct TrackObject {
    /// Absent for local files.
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<ArtistObject>,
    #[serde(default)]
    pub album: Option<AlbumObject>,
}

#[derive(Debug, Deserialize)]
pub struct ArtistObject {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct AlbumObject {
    #[serde(default)]
    pub images: Vec<ImageObject>,
}

#[derive(Debug, Deserialize)]
pub struct ImageObject {
    pub url: String,
}

impl From<TrackObject> for CandidateTrack {
    fn from(value: TrackObject) -> Self {
        Self {
            id: value.id.unwrap_or_default(),
            name: value.name,
            artist: value
                .artists
                .into_iter()
                .next()
                .map(|artist| artist.name)
                .unwrap_or_else(|| UNKNOWN_ARTIST.to_string()),
            artwork_url: value
                .album
                .and_then(|album| album.images.into_iter().next())
                .map(|image| image.url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recently_played_payload_maps_to_candidates() {
        let payload = r#"{
            "items": [
                {"track": {"id": "t1", "name": "Song", "artists": [{"name": "A"}, {"name": "B"}],
                           "album": {"images": [{"url": "https://img/1"}]}}},
                {"track": {"id": null, "name": "Local file", "artists": []}}
            ],
            "cursors": {"after": "1"}
        }"#;

        let parsed: RecentlyPlayedResponse = serde_json::from_str(payload).unwrap();
        let tracks: Vec<CandidateTrack> = parsed
            .items
            .into_iter()
            .map(|item| item.track.into())
            .collect();

        assert_eq!(tracks[0].id, "t1");
        assert_eq!(tracks[0].artist, "A");
        assert_eq!(tracks[0].artwork_url.as_deref(), Some("https://img/1"));
        assert_eq!(tracks[1].id, "");
        assert_eq!(tracks[1].artist, UNKNOWN_ARTIST);
        assert!(tracks[1].artwork_url.is_none());
    }

    #[test]
    fn token_response_without_refresh_token() {
        let parsed: TokenResponse =
            serde_json::from_str(r#"{"access_token": "abc", "token_type": "Bearer", "expires_in": 3600}"#)
                .unwrap();
        assert_eq!(parsed.access_token, "abc");
        assert!(parsed.refresh_token.is_none());
    }
}
