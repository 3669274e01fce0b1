//! Spotify-style Web API catalog client.
//!
//! Search and collection calls use a 5 second timeout so that a slow
//! catalog degrades one query, never a whole tick.

use super::models::{AudioFeatures, CollectionSummary, TrackCandidate};
use super::service::{CatalogError, CatalogService};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

const SEARCH_TIMEOUT: Duration = Duration::from_secs(5);
const MUTATION_TIMEOUT: Duration = Duration::from_secs(15);

pub struct SpotifyCatalog {
    client: Client,
    base_url: String,
}

impl SpotifyCatalog {
    /// Create a client against a Spotify-compatible API base URL
    /// (e.g., "https://api.spotify.com").
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        token: &str,
        path_and_query: &str,
        timeout: Duration,
    ) -> Result<T, CatalogError> {
        let url = format!("{}{}", self.base_url, path_and_query);
        debug!(%url, "Catalog GET");

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .timeout(timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CatalogError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| CatalogError::Decode(e.to_string()))
    }

    /// Fetch audio features for a batch of track ids and merge them into
    /// the candidates. Missing features are left at their defaults.
    async fn merge_audio_features(
        &self,
        token: &str,
        candidates: &mut [TrackCandidate],
    ) -> Result<(), CatalogError> {
        if candidates.is_empty() {
            return Ok(());
        }
        let ids: Vec<&str> = candidates.iter().map(|c| c.id.as_str()).collect();
        let path = format!("/v1/audio-features?ids={}", ids.join(","));
        let response: ApiAudioFeaturesPage =
            self.get_json(token, &path, SEARCH_TIMEOUT).await?;

        for entry in response.audio_features.into_iter().flatten() {
            if let Some(candidate) = candidates.iter_mut().find(|c| c.id == entry.id) {
                candidate.features = AudioFeatures {
                    tempo: entry.tempo.unwrap_or_default(),
                    energy: entry.energy.unwrap_or_default(),
                    danceability: entry.danceability.unwrap_or_default(),
                    valence: entry.valence.unwrap_or_default(),
                    acousticness: entry.acousticness.unwrap_or_default(),
                };
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogService for SpotifyCatalog {
    async fn search_tracks(
        &self,
        token: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<TrackCandidate>, CatalogError> {
        let path = format!(
            "/v1/search?type=track&q={}&limit={}",
            urlencoding::encode(query),
            limit
        );
        let response: ApiTrackSearchResponse =
            self.get_json(token, &path, SEARCH_TIMEOUT).await?;

        let mut candidates: Vec<TrackCandidate> = response
            .tracks
            .map(|page| page.items)
            .unwrap_or_default()
            .into_iter()
            .flatten()
            .map(TrackCandidate::from)
            .collect();

        // Feature lookup failures degrade ranking quality, not the search.
        if let Err(e) = self.merge_audio_features(token, &mut candidates).await {
            debug!("Audio feature lookup failed: {}", e);
        }
        Ok(candidates)
    }

    async fn get_tracks(
        &self,
        token: &str,
        ids: &[String],
    ) -> Result<Vec<TrackCandidate>, CatalogError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let path = format!("/v1/tracks?ids={}", ids.join(","));
        let response: ApiTracksResponse = self.get_json(token, &path, SEARCH_TIMEOUT).await?;

        let mut candidates: Vec<TrackCandidate> = response
            .tracks
            .into_iter()
            .flatten()
            .map(TrackCandidate::from)
            .collect();
        if let Err(e) = self.merge_audio_features(token, &mut candidates).await {
            debug!("Audio feature lookup failed: {}", e);
        }
        Ok(candidates)
    }

    async fn search_collections(
        &self,
        token: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<CollectionSummary>, CatalogError> {
        let path = format!(
            "/v1/search?type=playlist&q={}&limit={}",
            urlencoding::encode(query),
            limit
        );
        let response: ApiPlaylistSearchResponse =
            self.get_json(token, &path, SEARCH_TIMEOUT).await?;

        Ok(response
            .playlists
            .map(|page| page.items)
            .unwrap_or_default()
            .into_iter()
            .flatten()
            .map(|p| CollectionSummary {
                id: p.id,
                name: p.name,
                owner: p.owner.and_then(|o| o.display_name),
                track_count: p.tracks.map(|t| t.total).unwrap_or(0),
            })
            .collect())
    }

    async fn collection_tracks(
        &self,
        token: &str,
        collection_id: &str,
        limit: usize,
    ) -> Result<Vec<TrackCandidate>, CatalogError> {
        let path = format!("/v1/playlists/{}/tracks?limit={}", collection_id, limit);
        let response: ApiPlaylistTracksResponse =
            self.get_json(token, &path, SEARCH_TIMEOUT).await?;

        let mut candidates: Vec<TrackCandidate> = response
            .items
            .into_iter()
            .filter_map(|item| item.track)
            .map(TrackCandidate::from)
            .collect();
        if let Err(e) = self.merge_audio_features(token, &mut candidates).await {
            debug!("Audio feature lookup failed: {}", e);
        }
        Ok(candidates)
    }

    async fn mutate_playlist(
        &self,
        token: &str,
        playlist_id: &str,
        add: &[String],
        remove: &[String],
    ) -> Result<(), CatalogError> {
        let url = format!("{}/v1/playlists/{}/tracks", self.base_url, playlist_id);

        if !remove.is_empty() {
            let body = json!({
                "tracks": remove
                    .iter()
                    .map(|id| json!({"uri": format!("spotify:track:{}", id)}))
                    .collect::<Vec<_>>(),
            });
            let response = self
                .client
                .delete(&url)
                .bearer_auth(token)
                .json(&body)
                .timeout(MUTATION_TIMEOUT)
                .send()
                .await
                .map_err(map_reqwest_error)?;
            check_status(response).await?;
        }

        if !add.is_empty() {
            let body = json!({
                "uris": add
                    .iter()
                    .map(|id| format!("spotify:track:{}", id))
                    .collect::<Vec<_>>(),
            });
            let response = self
                .client
                .post(&url)
                .bearer_auth(token)
                .json(&body)
                .timeout(MUTATION_TIMEOUT)
                .send()
                .await
                .map_err(map_reqwest_error)?;
            check_status(response).await?;
        }

        Ok(())
    }
}

fn map_reqwest_error(e: reqwest::Error) -> CatalogError {
    if e.is_timeout() {
        CatalogError::Timeout
    } else {
        CatalogError::Http(e.to_string())
    }
}

async fn check_status(response: reqwest::Response) -> Result<(), CatalogError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let message = response.text().await.unwrap_or_default();
    Err(CatalogError::Api {
        status: status.as_u16(),
        message,
    })
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Deserialize)]
struct ApiTrackSearchResponse {
    tracks: Option<ApiTrackPage>,
}

#[derive(Deserialize)]
struct ApiTrackPage {
    items: Vec<Option<ApiTrack>>,
}

#[derive(Deserialize)]
struct ApiTracksResponse {
    tracks: Vec<Option<ApiTrack>>,
}

#[derive(Deserialize)]
struct ApiPlaylistSearchResponse {
    playlists: Option<ApiPlaylistPage>,
}

#[derive(Deserialize)]
struct ApiPlaylistPage {
    items: Vec<Option<ApiPlaylist>>,
}

#[derive(Deserialize)]
struct ApiPlaylist {
    id: String,
    name: String,
    owner: Option<ApiOwner>,
    tracks: Option<ApiPlaylistTracksRef>,
}

#[derive(Deserialize)]
struct ApiOwner {
    display_name: Option<String>,
}

#[derive(Deserialize)]
struct ApiPlaylistTracksRef {
    total: u32,
}

#[derive(Deserialize)]
struct ApiPlaylistTracksResponse {
    items: Vec<ApiPlaylistTrackItem>,
}

#[derive(Deserialize)]
struct ApiPlaylistTrackItem {
    track: Option<ApiTrack>,
}

#[derive(Deserialize)]
struct ApiTrack {
    id: String,
    name: String,
    artists: Vec<ApiArtist>,
    album: Option<ApiAlbum>,
    duration_ms: Option<u32>,
    explicit: Option<bool>,
    popularity: Option<u8>,
}

#[derive(Deserialize)]
struct ApiArtist {
    name: String,
    genres: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct ApiAlbum {
    id: String,
    release_date: Option<String>,
}

#[derive(Deserialize)]
struct ApiAudioFeaturesPage {
    audio_features: Vec<Option<ApiAudioFeatures>>,
}

#[derive(Deserialize)]
struct ApiAudioFeatures {
    id: String,
    tempo: Option<f32>,
    energy: Option<f32>,
    danceability: Option<f32>,
    valence: Option<f32>,
    acousticness: Option<f32>,
}

impl From<ApiTrack> for TrackCandidate {
    fn from(track: ApiTrack) -> Self {
        let release_year = track
            .album
            .as_ref()
            .and_then(|a| a.release_date.as_deref())
            .and_then(|d| d.get(..4))
            .and_then(|y| y.parse().ok());
        let genres = track
            .artists
            .iter()
            .filter_map(|a| a.genres.clone())
            .flatten()
            .collect();

        TrackCandidate {
            id: track.id,
            title: track.name,
            artists: track.artists.into_iter().map(|a| a.name).collect(),
            album_id: track.album.map(|a| a.id),
            duration_ms: track.duration_ms.unwrap_or(0),
            explicit: track.explicit.unwrap_or(false),
            popularity: track.popularity.unwrap_or(0),
            features: AudioFeatures::default(),
            release_year,
            genres,
        }
    }
}
