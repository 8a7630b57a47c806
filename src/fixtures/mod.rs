pub mod cache;
pub mod directory;
pub mod fetcher;
pub mod football_data;
pub mod source;

pub use cache::SnapshotCache;
pub use directory::TeamDirectory;
pub use fetcher::{FetchError, FixtureFetcher};
pub use football_data::FootballData;
pub use source::{FetchQuery, MatchSource, SourceError, TeamInfo};
