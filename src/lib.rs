//! Calliope: a text-to-audio synthesis engine
//!
//! Lines of Music Macro Language become timed scores ([`score`]),
//! scores become sample streams through oscillators and envelopes
//! ([`synth`]), and a [`venue::Venue`] serves those streams to an
//! audio callback one sample at a time.

pub mod pitch;
pub mod score;
pub mod synth;
pub mod venue;
pub mod wav;
