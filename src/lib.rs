// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Real-time sound effect playback for a falling-block puzzle game.
//!
//! The game thread loads sounds, starts voices and calls
//! [`AudioEngine::run_mixer`] once per frame. The device thread drains the
//! mixed audio from a ring buffer and never waits on the game.

pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod samples;
#[cfg(test)]
mod testutil;

pub use config::EngineConfig;
pub use engine::{AudioEngine, EngineStats};
pub use error::{EngineError, LoadError};
pub use samples::{SampleBuffer, SoundBank};
