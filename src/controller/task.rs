// Rust RTSP Playback
//
// Copyright (C) 2020-2021 Sebastian Dröge <sebastian@centricular.com>
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at
// <https://mozilla.org/MPL/2.0/>.
//
// SPDX-License-Identifier: MPL-2.0

use futures::prelude::*;

use log::{debug, trace};

use async_std::task;

use crate::channel::mpsc;
use crate::pipeline::Pipeline;

use super::context::Context;
use super::messages::ControllerMessage;

async fn task_fn<P: Pipeline>(
    mut ctx: Context<P>,
    mut receiver: mpsc::Receiver<ControllerMessage>,
) {
    while let Some(msg) = receiver.next().await {
        match msg {
            ControllerMessage::Sync(ret) => {
                let _ = ret.send(());
            }
            ControllerMessage::Destroy => {
                debug!("Controller {}: Destroy requested, quitting", ctx.id);
                break;
            }
            msg if !ctx.shared.is_alive() => {
                trace!("Controller {}: Ignoring {:?} after destroy", ctx.id, msg);
            }
            ControllerMessage::SetUri(uri) => ctx.set_uri(&uri),
            ControllerMessage::Play => ctx.play(),
            ControllerMessage::Pause => ctx.pause(),
            ControllerMessage::Seek(position) => ctx.seek(position),
            ControllerMessage::Signal(signal) => ctx.signal(signal),
        }
    }

    debug!("Shutting down controller {}", ctx.id);
    receiver.close();
    ctx.shutdown();

    // Wake up everybody waiting for the queue to settle
    while let Some(msg) = receiver.next().await {
        match msg {
            ControllerMessage::Sync(ret) => {
                let _ = ret.send(());
            }
            msg => trace!("Controller {}: Discarding {:?}", ctx.id, msg),
        }
    }

    debug!("Controller {} shut down", ctx.id);
}

pub(super) fn spawn<P: Pipeline>(
    ctx: Context<P>,
    receiver: mpsc::Receiver<ControllerMessage>,
) -> task::JoinHandle<()> {
    task::spawn(task_fn(ctx, receiver))
}
