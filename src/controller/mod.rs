// Rust RTSP Playback
//
// Copyright (C) 2020-2021 Sebastian Dröge <sebastian@centricular.com>
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at
// <https://mozilla.org/MPL/2.0/>.
//
// SPDX-License-Identifier: MPL-2.0

//! Playback controller.
//!
//! A [`Controller`] owns one pipeline bound to one render target and drives it from a task.
//! Host commands never wait for the pipeline: they are queued together with the pipeline's
//! signals and handled in order, with the resulting events reported to the [`Observer`].
//!
//! ```no_run
//! # #[cfg(feature = "gstreamer")]
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//!
//! use rtsp_playback::controller::Controller;
//! use rtsp_playback::observer::NoopObserver;
//! use rtsp_playback::pipeline::gst::GstEngine;
//! use rtsp_playback::render::RenderTarget;
//! use rtsp_playback::transport::TransportMask;
//!
//! let controller = Controller::builder(
//!     Arc::new(GstEngine::new()),
//!     RenderTarget::from_raw(0x2a00_0001),
//!     Arc::new(NoopObserver),
//! )
//! .transports(TransportMask::TCP | TransportMask::TLS)
//! .build()?;
//!
//! controller.set_uri("rtsp://127.0.0.1:8554/stream");
//! controller.play();
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "gstreamer"))]
//! # fn main() {}
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::lock::Mutex;

use log::{debug, info, trace};

use crate::channel::{mpsc, oneshot};
use crate::error::InitError;
use crate::observer::Observer;
use crate::pipeline::Engine;
use crate::render::{self, RenderTarget};
use crate::runtime;
use crate::transport::{SessionTuning, TransportMask, TransportPolicy};

mod context;
mod messages;
mod state;
mod task;

pub use state::{PlaybackState, Status};

use context::{Context, Resources, Shared};
use messages::ControllerMessage;

/// Unique identifier for a specific controller
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id(uuid::Uuid);

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Id {
    pub fn new() -> Self {
        Id(uuid::Uuid::new_v4())
    }
}

impl Default for Id {
    fn default() -> Self {
        Id::new()
    }
}

/// Builder for a [`Controller`].
pub struct Builder<E: Engine> {
    engine: Arc<E>,
    target: RenderTarget,
    observer: Arc<dyn Observer>,
    mask: TransportMask,
    tuning: SessionTuning,
}

impl<E: Engine> Builder<E> {
    /// Permitted lower transports. Defaults to [`TransportMask::default`].
    pub fn transports(mut self, mask: TransportMask) -> Self {
        self.mask = mask;
        self
    }

    pub fn min_seek_step(mut self, min_seek_step: Duration) -> Self {
        self.tuning = SessionTuning::new(min_seek_step, self.tuning.latency());
        self
    }

    pub fn latency(mut self, latency: Duration) -> Self {
        self.tuning = SessionTuning::new(self.tuning.min_seek_step(), latency);
        self
    }

    pub fn tuning(mut self, tuning: SessionTuning) -> Self {
        self.tuning = tuning;
        self
    }

    /// Binds the render target and creates the pipeline.
    ///
    /// Fails with [`InitError::NoTransports`] if the transport mask is empty.
    /// Does not wait for anything to be prepared; the controller starts `Uninitialized`.
    pub fn build(self) -> Result<Controller, InitError> {
        let Builder {
            engine,
            target,
            observer,
            mask,
            tuning,
        } = self;

        if mask.is_empty() {
            return Err(InitError::NoTransports);
        }

        let binding = render::bind(target)?;
        let runtime = runtime::acquire(&engine)?;

        let (sender, receiver) = mpsc::channel();
        let signals = sender.clone().map(ControllerMessage::Signal);

        let policy = TransportPolicy::new(mask, tuning);
        let pipeline = engine.create_pipeline(binding.target(), &policy, signals)?;

        let id = Id::new();
        let engine_version = engine.version();
        info!(
            "Controller {}: Created for render target {} with {} {}, transports {}",
            id,
            target,
            engine.name(),
            engine_version,
            mask
        );

        let resources = Arc::new(std::sync::Mutex::new(Resources::new(
            id, pipeline, binding, runtime,
        )));
        let shared = Arc::new(Shared::new(context::teardown(&resources)));
        let ctx = Context::new(id, shared.clone(), resources, observer, tuning);
        let join_handle = task::spawn(ctx, receiver);

        Ok(Controller {
            id,
            sender,
            shared,
            engine_version,
            join_handle: Mutex::new(Some(join_handle)),
        })
    }
}

/// Drives one pipeline on behalf of the host.
///
/// Dropping the controller destroys it.
pub struct Controller {
    id: Id,
    sender: mpsc::Sender<ControllerMessage>,
    shared: Arc<Shared>,
    engine_version: String,
    join_handle: Mutex<Option<async_std::task::JoinHandle<()>>>,
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("id", &self.id)
            .field("status", &self.shared.status())
            .finish()
    }
}

impl Controller {
    pub fn builder<E: Engine>(
        engine: Arc<E>,
        target: RenderTarget,
        observer: Arc<dyn Observer>,
    ) -> Builder<E> {
        Builder {
            engine,
            target,
            observer,
            mask: TransportMask::default(),
            tuning: SessionTuning::default(),
        }
    }

    pub fn new<E: Engine>(
        engine: Arc<E>,
        target: RenderTarget,
        observer: Arc<dyn Observer>,
        mask: TransportMask,
        tuning: SessionTuning,
    ) -> Result<Controller, InitError> {
        Controller::builder(engine, target, observer)
            .transports(mask)
            .tuning(tuning)
            .build()
    }

    pub fn id(&self) -> Id {
        self.id
    }

    /// State as of the last handled message; see [`Controller::settled`].
    pub fn state(&self) -> PlaybackState {
        self.shared.status().state
    }

    pub fn is_buffering(&self) -> bool {
        self.shared.status().buffering
    }

    pub fn status(&self) -> Status {
        self.shared.status()
    }

    pub fn engine_version(&self) -> &str {
        &self.engine_version
    }

    fn send(&self, msg: ControllerMessage) {
        if !self.shared.is_alive() {
            debug!("Controller {}: Ignoring {:?} after destroy", self.id, msg);
            return;
        }

        trace!("Controller {}: Queueing {:?}", self.id, msg);
        if self.sender.send(msg).is_err() {
            debug!("Controller {}: Task already finished", self.id);
        }
    }

    /// Prepares a new source, stopping the current one first.
    ///
    /// Completion is reported through [`Observer::on_initialized`] or [`Observer::on_error`].
    pub fn set_uri(&self, uri: &str) {
        self.send(ControllerMessage::SetUri(String::from(uri)));
    }

    pub fn play(&self) {
        self.send(ControllerMessage::Play);
    }

    pub fn pause(&self) {
        self.send(ControllerMessage::Pause);
    }

    pub fn seek(&self, position: Duration) {
        self.send(ControllerMessage::Seek(position));
    }

    /// Tears down the pipeline and releases the render target before returning, so the
    /// target can be bound again right away.
    ///
    /// The state is `Destroyed` when this returns and no observer callbacks are dispatched
    /// afterwards. Calling this again does nothing.
    pub fn destroy(&self) {
        if !self.shared.kill() {
            return;
        }

        info!("Controller {}: Destroying", self.id);
        if self.sender.send(ControllerMessage::Destroy).is_err() {
            debug!("Controller {}: Task already finished", self.id);
        }
    }

    /// Waits until all commands and signals queued before this call are handled.
    pub async fn settled(&self) {
        let (sender, receiver) = oneshot::channel();
        if self.sender.send(ControllerMessage::Sync(sender)).is_err() {
            return;
        }

        let _ = receiver.await;
    }

    /// Waits until the controller task has shut down after [`Controller::destroy`].
    pub async fn finished(&self) {
        if let Some(join_handle) = self.join_handle.lock().await.take() {
            join_handle.await;
        }
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.destroy();
    }
}
