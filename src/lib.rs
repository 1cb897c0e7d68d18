// Rust RTSP Playback
//
// Copyright (C) 2020-2021 Sebastian Dröge <sebastian@centricular.com>
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at
// <https://mozilla.org/MPL/2.0/>.
//
// SPDX-License-Identifier: MPL-2.0

//! # RTSP Playback Library
//!
//! ## Overview of the components
//!
//! ### `Controller`
//!
//! The [`controller::Controller`] is the type the host application creates for each video view.
//! It is bound to one [`render::RenderTarget`] and one [`observer::Observer`], owns a pipeline
//! created by an [`pipeline::Engine`] and drives it through the playback states
//! `Uninitialized`, `Initializing`, `Ready`, `Playing` and `Paused`, with buffering as an
//! overlay on the latter two. Failures move it into the `Error` state, from where only a new
//! URI or destruction are accepted.
//!
//! All commands are non-blocking. They are queued together with the asynchronous signals of the
//! pipeline and handled in order by the controller task.
//!
//! See the [`controller`] module for details.
//!
//! ### `Observer`
//!
//! An [`observer::Observer`] implementation receives the lifecycle and diagnostic events of a
//! controller. It is entirely passive. [`observer::channel`] provides an implementation that
//! forwards all events into a channel, e.g. for handling them on a UI thread.
//!
//! ### Pipeline Engines
//!
//! The [`pipeline::Engine`] and [`pipeline::Pipeline`] traits abstract the media pipeline. An
//! engine is initialized once per process when the first controller using it is created and
//! released again with the last one.
//!
//! With the `gstreamer` feature, [`pipeline::gst::GstEngine`] provides an implementation based
//! on `playbin` and `rtspsrc`.
//!
//! ### Transports and Errors
//!
//! [`transport::TransportMask`] selects the lower transports the RTSP source may use, the
//! attempt order is fixed to TLS, TCP, HTTP, UDP and UDP multicast. Pipeline errors are
//! translated into the small set of [`error::ErrorKind`]s reported to the host, keeping the
//! engine's diagnostic detail in the [`error::ErrorRecord`].
//!
//! [`uri::StreamUri`] builds stream URIs for sources reachable through a local port.

pub mod channel;
pub mod controller;
pub mod error;
pub mod observer;
pub mod pipeline;
pub mod render;
mod runtime;
pub mod transport;
pub mod uri;
mod utils;

pub use controller::{Controller, PlaybackState, Status};
pub use error::{ErrorKind, ErrorRecord, InitError, PipelineError};
pub use observer::{NoopObserver, Observer};
pub use render::RenderTarget;
pub use transport::{SessionTuning, TransportMask};
