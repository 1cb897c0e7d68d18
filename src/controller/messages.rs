// Rust RTSP Playback
//
// Copyright (C) 2020-2021 Sebastian Dröge <sebastian@centricular.com>
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at
// <https://mozilla.org/MPL/2.0/>.
//
// SPDX-License-Identifier: MPL-2.0

use std::time::Duration;

use crate::channel::oneshot;
use crate::pipeline::Signal;

/// Host commands and pipeline signals, sharing one queue so they are handled in arrival order.
#[derive(derivative::Derivative)]
#[derivative(Debug)]
pub(super) enum ControllerMessage {
    SetUri(String),
    Play,
    Pause,
    Seek(Duration),
    Destroy,
    Signal(Signal),
    /// Answered once all previously queued messages are handled.
    Sync(#[derivative(Debug = "ignore")] oneshot::Sender<()>),
}
