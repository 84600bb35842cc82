//! Dubwave - AI video dubbing service
//!
//! Accepts video uploads over HTTP and produces dubbed renditions: audio is
//! extracted and transcribed, translated, re-voiced with emotion-aware
//! synthesis, mixed back over the original score, lip-aligned, and muxed into
//! a downloadable video with subtitle tracks alongside.

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod emotion;
pub mod error;
pub mod job;
pub mod lipsync;
pub mod media;
pub mod payment;
pub mod pipeline;
pub mod separation;
pub mod storage;
pub mod subtitle;
pub mod synthesis;
pub mod transcribe;
pub mod translate;
