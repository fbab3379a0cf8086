//! # Audio Module
//!
//! Per-guild playback pipeline.
//!
//! Every guild gets one [`session::GuildSession`] from the
//! [`registry::SessionRegistry`], and every session is served by exactly two
//! long-lived tasks:
//!
//! ### [`downloader`] - Download Worker
//! - Resolves the media, picks the best audio format
//! - Stores the bytestream under `assets/guild_<id>/audio<n>.<ext>`
//! - Transcodes it to raw PCM and hands a [`session::PlayRequest`] over
//!
//! ### [`player`] - Playback Worker
//! - Loads the PCM in 20ms frames, joins the requester's voice channel
//! - Encodes and sends each frame, honoring skip, disconnect and loop
//! - Removes the on-disk artifacts when the track is done
//!
//! Skip and disconnect travel through [`signal::ControlSignal`] slots; the
//! play queue is bounded and rejects instead of blocking.
//!
//! ## Audio Format
//!
//! - **Sample Rate**: 48kHz
//! - **Bit Depth**: 16-bit signed integers, little endian
//! - **Channels**: Stereo (interleaved)
//! - **Frame**: 960 samples per channel (20ms)

pub mod artifacts;
pub mod downloader;
pub mod encoder;
pub mod frames;
pub mod player;
pub mod registry;
pub mod services;
pub mod session;
pub mod signal;
pub mod transcode;

pub const SAMPLE_RATE: u32 = 48_000;
pub const CHANNELS: usize = 2;
/// Muestras por canal en cada frame
pub const FRAME_SIZE: usize = 960;
/// Muestras intercaladas por frame
pub const FRAME_SAMPLES: usize = FRAME_SIZE * CHANNELS;
pub const FRAME_BYTES: usize = FRAME_SAMPLES * 2;

#[cfg(test)]
pub(crate) mod fakes;
