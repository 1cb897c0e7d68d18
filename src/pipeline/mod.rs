// Rust RTSP Playback
//
// Copyright (C) 2020-2021 Sebastian Dröge <sebastian@centricular.com>
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at
// <https://mozilla.org/MPL/2.0/>.
//
// SPDX-License-Identifier: MPL-2.0

//! Pipeline engine abstraction.
//!
//! An [`Engine`] performs process-wide setup once and creates [`Pipeline`] instances bound to a
//! render target. A pipeline reports asynchronous events by sending [`Signal`]s through the
//! [`SignalSender`] it was created with; the sender can be used from any thread and never
//! blocks.

use std::time::Duration;

use crate::channel::mpsc;
use crate::error::PipelineError;
use crate::render::RenderTarget;
use crate::transport::TransportPolicy;

#[cfg(feature = "gstreamer")]
pub mod gst;

/// Asynchronous events emitted by a pipeline, in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// The source set through [`Pipeline::set_uri`] is prepared.
    Ready,
    Error(PipelineError),
    BufferingStarted,
    BufferingFinished,
    /// Status text for the host, e.g. state changes or warnings.
    Message(String),
}

pub type SignalSender = mpsc::Sender<Signal>;

/// A decode/render pipeline instance.
///
/// All operations return as soon as the request is issued; completion is reported through
/// [`Signal`]s.
pub trait Pipeline: Send + 'static {
    /// Stops any current playback and prepares the given source.
    ///
    /// Emits [`Signal::Ready`] once the source is prepared.
    fn set_uri(&mut self, uri: &url::Url) -> Result<(), PipelineError>;

    fn start(&mut self) -> Result<(), PipelineError>;

    fn pause(&mut self) -> Result<(), PipelineError>;

    fn seek(&mut self, position: Duration) -> Result<(), PipelineError>;

    /// Releases all engine resources. Called exactly once; no signals may be sent afterwards.
    fn destroy(&mut self);
}

/// Factory for [`Pipeline`]s with process-wide setup and teardown.
pub trait Engine: Send + Sync + 'static {
    type Pipeline: Pipeline;

    /// Unique name of the engine, keying the process-wide runtime registry.
    fn name(&self) -> &'static str;

    fn version(&self) -> String;

    /// One-time global setup, called before the first pipeline of this engine is created.
    fn initialize(&self) -> Result<(), PipelineError>;

    /// Global teardown, called after the last controller using this engine is gone.
    fn release(&self) {}

    fn create_pipeline(
        &self,
        target: RenderTarget,
        policy: &TransportPolicy,
        signals: SignalSender,
    ) -> Result<Self::Pipeline, PipelineError>;
}
