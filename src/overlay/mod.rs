//! Scoreboard overlay publication
//!
//! The transcoder keeps re-reading one image file per session. This module
//! keeps that file current without ever exposing a partial write:
//!
//! ```text
//!  OverlaySource::fetch ──┐
//!                         ├──► OverlayPublisher ──► {scratch}/{id}_temp.png
//!  ScoreListener (watch) ─┘                              │ rename(2)
//!                                                        ▼
//!                                   transcoder ◄── {overlay_dir}/{id}.png
//! ```
//!
//! The publisher is the only writer of a session's files. Rendered frames
//! from the score listener reach it over a `watch` channel.

pub mod placeholder;
pub mod publisher;
pub mod slot;
pub mod source;

pub use placeholder::{blank_png, PLACEHOLDER_HEIGHT, PLACEHOLDER_WIDTH};
pub use publisher::OverlayPublisher;
pub use slot::OverlaySlot;
pub use source::{FetchError, HttpOverlaySource, OverlaySource};
