//! Testing utilities and mock catalog implementations.
//!
//! The mocks implement the catalog traits so the resolver and the
//! orchestrator can be exercised end to end without network access.
//!
//! # Example
//!
//! ```rust,ignore
//! use crossfade_core::testing::{fixtures, MockDestinationCatalog, MockSourceCatalog};
//!
//! let source = MockSourceCatalog::new();
//! let destination = MockDestinationCatalog::new();
//!
//! source
//!     .add_playlist(fixtures::playlist("pl1", "Road Trip"), vec![/* tracks */])
//!     .await;
//! destination
//!     .add_search_result("isrc:GBAHS1700024", fixtures::track("am1", "Perfect", "Ed Sheeran", "÷"))
//!     .await;
//! ```

mod mock_destination;
mod mock_source;

pub use mock_destination::{MockDestinationCatalog, RecordedSearch};
pub use mock_source::MockSourceCatalog;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::collections::BTreeMap;

    use crate::catalog::{Playlist, Track};

    /// Create a destination-side track.
    pub fn track(id: &str, name: &str, artist: &str, album: &str) -> Track {
        let mut external_urls = BTreeMap::new();
        external_urls.insert(
            "apple_music".to_string(),
            format!("https://music.apple.com/us/song/{}", id),
        );
        Track {
            id: id.to_string(),
            name: name.to_string(),
            artist: artist.to_string(),
            album: album.to_string(),
            duration_ms: 240_000,
            isrc: None,
            preview_url: None,
            external_urls,
        }
    }

    /// Create a source-side track with album "Greatest Hits".
    pub fn source_track(id: &str, name: &str, artist: &str, isrc: Option<&str>) -> Track {
        let mut external_urls = BTreeMap::new();
        external_urls.insert(
            "spotify".to_string(),
            format!("https://open.spotify.com/track/{}", id),
        );
        Track {
            id: id.to_string(),
            name: name.to_string(),
            artist: artist.to_string(),
            album: "Greatest Hits".to_string(),
            duration_ms: 200_000,
            isrc: isrc.map(String::from),
            preview_url: None,
            external_urls,
        }
    }

    /// Create a playlist owned by "tester".
    pub fn playlist(id: &str, name: &str) -> Playlist {
        Playlist {
            id: id.to_string(),
            name: name.to_string(),
            description: Some(format!("{} description", name)),
            track_count: 0,
            owner: "tester".to_string(),
            public: true,
            collaborative: false,
            external_urls: BTreeMap::new(),
            images: Vec::new(),
        }
    }
}
