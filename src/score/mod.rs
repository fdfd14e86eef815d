//! Live score updates
//!
//! A [`ScoreListener`] keeps one connection per session to the score feed,
//! reconnecting with capped exponential backoff, and turns every update into
//! a fresh scoreboard frame through a [`ScoreRenderer`]. Frames are handed to
//! the overlay publisher over a `watch` channel; this module never writes
//! files.

pub mod backoff;
pub mod feed;
pub mod listener;
pub mod render;
pub mod update;

pub use backoff::Backoff;
pub use feed::{FeedError, ScoreFeed, UpdateStream, WebSocketScoreFeed};
pub use listener::ScoreListener;
pub use render::{HttpScoreRenderer, RenderError, ScoreRenderer};
pub use update::{Batter, Bowler, ScoreSummary, ScoreUpdate};
