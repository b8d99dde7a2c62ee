//! Contract between this crate and a node's REST interface.
//!
//! This crate does not issue HTTP requests itself. Hosts bring their own
//! client by implementing [`RestClient`], and receive a [`RestEndpoint`]
//! for the least-loaded node from [`Lavalink::best_rest_endpoint`]. Track
//! lookups resolve to one of the five [`LoadResult`] variants.
//!
//! [`Lavalink::best_rest_endpoint`]: crate::Lavalink::best_rest_endpoint

use crate::{error::SelectError, model::event::FriendlyException, Track};
use async_trait::async_trait;
use derivative::Derivative;
use serde::Deserialize;
use std::{error::Error as StdError, fmt};
use url::{ParseError, Url};

/// Address and credentials of one node's REST interface.
#[derive(Clone, Derivative, Eq, PartialEq)]
#[derivative(Debug)]
pub struct RestEndpoint {
    /// Name of the node serving this endpoint.
    pub node: String,
    /// Base URL, i.e., `http://host:port`.
    pub url: Url,
    /// Shared secret, to send as the `Authorization` header.
    #[derivative(Debug = "ignore")]
    pub password: String,
}

impl RestEndpoint {
    /// The URL of the track loading route for `identifier`.
    pub fn load_tracks_url(&self, identifier: &str) -> Result<Url, ParseError> {
        let mut url = self.url.join("loadtracks")?;
        url.query_pairs_mut().append_pair("identifier", identifier);
        Ok(url)
    }
}

/// A client for nodes' REST interfaces.
#[async_trait]
pub trait RestClient: Send + Sync {
    /// Error returned by failed requests.
    type Error: Send;

    /// Resolves `identifier` (a URL, or a search such as `ytsearch:...`)
    /// into tracks.
    async fn load_item(
        &self,
        endpoint: &RestEndpoint,
        identifier: &str,
    ) -> Result<LoadResult, Self::Error>;
}

/// Errors returned by [`Lavalink::load_item`].
///
/// [`Lavalink::load_item`]: crate::Lavalink::load_item
#[derive(Debug)]
#[non_exhaustive]
pub enum LoadError<E> {
    /// No node was available to serve the request.
    Select(SelectError),
    /// The REST client failed.
    Rest(E),
}

impl<E> From<SelectError> for LoadError<E> {
    fn from(e: SelectError) -> Self {
        LoadError::Select(e)
    }
}

impl<E: fmt::Display> fmt::Display for LoadError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to load item: ")?;
        match self {
            LoadError::Select(e) => write!(f, "{e}"),
            LoadError::Rest(e) => write!(f, "{e}"),
        }
    }
}

impl<E: StdError + 'static> StdError for LoadError<E> {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            LoadError::Select(e) => Some(e),
            LoadError::Rest(e) => Some(e),
        }
    }
}

/// An ordered list of tracks from a playlist.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Playlist {
    /// Name of the playlist.
    pub name: String,
    /// Index of the track the playlist link pointed at, if any.
    pub selected_track: Option<usize>,
    /// Tracks of the playlist, in order.
    pub tracks: Vec<Track>,
}

impl Playlist {
    /// The track the playlist link pointed at, if any.
    #[must_use]
    pub fn selected(&self) -> Option<&Track> {
        self.selected_track.and_then(|i| self.tracks.get(i))
    }
}

/// Outcome of a track lookup.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(try_from = "RawLoadResult")]
#[non_exhaustive]
pub enum LoadResult {
    /// A single track was found.
    Track(Track),
    /// A playlist was found.
    Playlist(Playlist),
    /// A search matched these tracks.
    Search(Vec<Track>),
    /// Nothing matched.
    Empty,
    /// The lookup failed.
    Failed(FriendlyException),
}

impl LoadResult {
    /// Passes this result to the matching method of `handler`.
    pub fn handle<H: LoadResultHandler + ?Sized>(self, handler: &mut H) {
        match self {
            LoadResult::Track(track) => handler.track_loaded(track),
            LoadResult::Playlist(playlist) => handler.playlist_loaded(playlist),
            LoadResult::Search(tracks) => handler.search_result_loaded(tracks),
            LoadResult::Empty => handler.no_matches(),
            LoadResult::Failed(e) => handler.load_failed(e),
        }
    }
}

/// Callbacks for each possible [`LoadResult`].
pub trait LoadResultHandler {
    /// A single track was found.
    fn track_loaded(&mut self, track: Track);
    /// A playlist was found.
    fn playlist_loaded(&mut self, playlist: Playlist);
    /// A search matched these tracks.
    fn search_result_loaded(&mut self, tracks: Vec<Track>);
    /// Nothing matched.
    fn no_matches(&mut self);
    /// The lookup failed.
    fn load_failed(&mut self, exception: FriendlyException);
}

#[derive(Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum LoadType {
    TrackLoaded,
    PlaylistLoaded,
    SearchResult,
    NoMatches,
    LoadFailed,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistInfo {
    #[serde(default)]
    name: String,
    #[serde(default)]
    selected_track: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLoadResult {
    load_type: LoadType,
    #[serde(default)]
    playlist_info: Option<PlaylistInfo>,
    #[serde(default)]
    tracks: Vec<Track>,
    #[serde(default)]
    exception: Option<FriendlyException>,
}

impl TryFrom<RawLoadResult> for LoadResult {
    type Error = &'static str;

    fn try_from(raw: RawLoadResult) -> Result<Self, Self::Error> {
        Ok(match raw.load_type {
            LoadType::TrackLoaded => LoadResult::Track(
                raw.tracks
                    .into_iter()
                    .next()
                    .ok_or("TRACK_LOADED result without a track")?,
            ),
            LoadType::PlaylistLoaded => {
                let info = raw.playlist_info.unwrap_or(PlaylistInfo {
                    name: String::new(),
                    selected_track: None,
                });

                LoadResult::Playlist(Playlist {
                    name: info.name,
                    selected_track: info.selected_track.and_then(|i| usize::try_from(i).ok()),
                    tracks: raw.tracks,
                })
            },
            LoadType::SearchResult => LoadResult::Search(raw.tracks),
            LoadType::NoMatches => LoadResult::Empty,
            LoadType::LoadFailed => {
                LoadResult::Failed(raw.exception.ok_or("LOAD_FAILED result without an exception")?)
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{event::Severity, track::tests::sample_info};

    const TRACK: &str = r#"{"track": "QAAA", "info": {
        "identifier": "dQw4w9WgXcQ", "isSeekable": true, "author": "RickAstleyVEVO",
        "length": 212000, "isStream": false, "position": 0,
        "title": "Rick Astley - Never Gonna Give You Up",
        "uri": "https://www.youtube.com/watch?v=dQw4w9WgXcQ", "sourceName": "youtube"
    }}"#;

    #[derive(Default)]
    struct Recorder(Vec<String>);

    impl LoadResultHandler for Recorder {
        fn track_loaded(&mut self, track: Track) {
            self.0.push(format!("track {}", track.encoded()));
        }

        fn playlist_loaded(&mut self, playlist: Playlist) {
            self.0.push(format!("playlist {}", playlist.name));
        }

        fn search_result_loaded(&mut self, tracks: Vec<Track>) {
            self.0.push(format!("search {}", tracks.len()));
        }

        fn no_matches(&mut self) {
            self.0.push("empty".into());
        }

        fn load_failed(&mut self, exception: FriendlyException) {
            self.0.push(format!("failed {:?}", exception.severity));
        }
    }

    fn load(json: &str) -> LoadResult {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn track_loaded_keeps_metadata() {
        let result = load(&format!(
            r#"{{"loadType": "TRACK_LOADED", "playlistInfo": {{}}, "tracks": [{TRACK}]}}"#
        ));

        match result {
            LoadResult::Track(track) => assert_eq!(track.info(), Some(&sample_info())),
            other => panic!("expected a track, got {other:?}"),
        }
    }

    #[test]
    fn playlist_selection_is_optional() {
        let result = load(&format!(
            r#"{{"loadType": "PLAYLIST_LOADED",
                "playlistInfo": {{"name": "Mix", "selectedTrack": -1}},
                "tracks": [{TRACK}, {TRACK}]}}"#
        ));

        match result {
            LoadResult::Playlist(playlist) => {
                assert_eq!(playlist.name, "Mix");
                assert_eq!(playlist.tracks.len(), 2);
                assert!(playlist.selected().is_none());
            },
            other => panic!("expected a playlist, got {other:?}"),
        }
    }

    #[test]
    fn results_dispatch_to_handler() {
        let mut recorder = Recorder::default();

        load(&format!(r#"{{"loadType": "SEARCH_RESULT", "tracks": [{TRACK}]}}"#))
            .handle(&mut recorder);
        load(r#"{"loadType": "NO_MATCHES", "tracks": []}"#).handle(&mut recorder);
        load(
            r#"{"loadType": "LOAD_FAILED", "tracks": [],
                "exception": {"message": "blocked", "severity": "COMMON"}}"#,
        )
        .handle(&mut recorder);

        assert_eq!(recorder.0, vec!["search 1", "empty", "failed Common"]);
    }

    #[test]
    fn inconsistent_results_are_rejected() {
        assert!(serde_json::from_str::<LoadResult>(r#"{"loadType": "TRACK_LOADED", "tracks": []}"#).is_err());
        assert!(serde_json::from_str::<LoadResult>(r#"{"loadType": "LOAD_FAILED"}"#).is_err());
        assert!(serde_json::from_str::<LoadResult>(r#"{"loadType": "SOMETHING_NEW"}"#).is_err());
    }

    #[test]
    fn failed_severity_is_decoded() {
        match load(r#"{"loadType": "LOAD_FAILED", "exception": {"severity": "FAULT"}}"#) {
            LoadResult::Failed(e) => assert_eq!(e.severity, Severity::Fault),
            other => panic!("expected a failure, got {other:?}"),
        }
    }

    #[test]
    fn load_tracks_url_escapes_identifier() {
        let endpoint = RestEndpoint {
            node: "a".into(),
            url: Url::parse("http://localhost:2333").unwrap(),
            password: "pass".into(),
        };

        assert_eq!(
            endpoint.load_tracks_url("ytsearch:never gonna").unwrap().as_str(),
            "http://localhost:2333/loadtracks?identifier=ytsearch%3Anever+gonna"
        );
    }
}
