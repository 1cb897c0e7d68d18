// Rust RTSP Playback
//
// Copyright (C) 2020-2021 Sebastian Dröge <sebastian@centricular.com>
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at
// <https://mozilla.org/MPL/2.0/>.
//
// SPDX-License-Identifier: MPL-2.0

//! Channels used between the host-facing controller, its task and the pipeline engine.

use std::error;
use std::fmt;

pub mod mpsc;
pub mod oneshot;

/// The receiving side of a channel is gone.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Disconnected;

impl error::Error for Disconnected {}

impl fmt::Display for Disconnected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Channel is disconnected")
    }
}
