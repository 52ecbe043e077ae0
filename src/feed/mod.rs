mod fetch;
mod parse;

pub use fetch::{FetchOutcome, fetch_podcast, fetch_podcasts};
pub use parse::{Enclosure, Episode, Podcast, parse_feed};
