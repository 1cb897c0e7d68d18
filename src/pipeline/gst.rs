// Rust RTSP Playback
//
// Copyright (C) 2020-2021 Sebastian Dröge <sebastian@centricular.com>
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at
// <https://mozilla.org/MPL/2.0/>.
//
// SPDX-License-Identifier: MPL-2.0

//! GStreamer implementation of [`Engine`] based on `playbin`.
//!
//! The transport policy is applied to `rtspsrc` from the `source-setup` signal, the render
//! target is handed to the video sink when it asks for a window handle. Bus messages are
//! handled synchronously on the posting thread and translated into [`Signal`]s.

use std::convert::TryFrom;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gst::glib;
use gst::glib::translate::IntoGlib;
use gst::prelude::*;
use gst_video::prelude::*;

use log::{debug, error, info, trace, warn};

use crate::error::{core_error, ErrorDomain, PipelineError};
use crate::render::RenderTarget;
use crate::transport::TransportPolicy;

use super::{Engine, Pipeline, Signal, SignalSender};

/// Raw code of a `GTlsError`, which is not wrapped by the GStreamer bindings.
#[derive(Debug, Copy, Clone)]
struct TlsErrorCode(i32);

impl glib::error::ErrorDomain for TlsErrorCode {
    fn domain() -> glib::Quark {
        glib::Quark::from_str("g-tls-error-quark")
    }

    fn code(self) -> i32 {
        self.0
    }

    fn from(code: i32) -> Option<Self> {
        Some(TlsErrorCode(code))
    }
}

/// Splits a `GError` into the domain and raw code used by the error mapping.
fn classify(err: &glib::Error) -> (ErrorDomain, i32) {
    if let Some(kind) = err.kind::<gst::ResourceError>() {
        (ErrorDomain::Resource, kind.into_glib())
    } else if let Some(kind) = err.kind::<TlsErrorCode>() {
        (ErrorDomain::Tls, kind.0)
    } else if let Some(kind) = err.kind::<gst::CoreError>() {
        (ErrorDomain::Core, kind.into_glib())
    } else if let Some(kind) = err.kind::<gst::StreamError>() {
        (ErrorDomain::Stream, kind.into_glib())
    } else if let Some(kind) = err.kind::<gst::LibraryError>() {
        (ErrorDomain::Library, kind.into_glib())
    } else {
        (ErrorDomain::Other, 0)
    }
}

fn pipeline_error(err: &glib::Error, debug: Option<&str>) -> PipelineError {
    let (domain, code) = classify(err);
    let pipeline_error = PipelineError::new(domain, code, err.message());
    match debug {
        Some(debug) => pipeline_error.with_debug(debug),
        None => pipeline_error,
    }
}

fn state_change_error(what: &str) -> PipelineError {
    PipelineError::new(
        ErrorDomain::Core,
        core_error::STATE_CHANGE,
        format!("Failed to {}", what),
    )
}

/// Engine creating `playbin` based pipelines.
#[derive(Debug, Default, Clone, Copy)]
pub struct GstEngine;

impl GstEngine {
    pub fn new() -> Self {
        GstEngine
    }
}

impl Engine for GstEngine {
    type Pipeline = GstPipeline;

    fn name(&self) -> &'static str {
        "gstreamer"
    }

    fn version(&self) -> String {
        gst::version_string().to_string()
    }

    fn initialize(&self) -> Result<(), PipelineError> {
        gst::init().map_err(|err| {
            PipelineError::new(
                ErrorDomain::Core,
                core_error::FAILED,
                format!("Failed to initialize GStreamer: {}", err),
            )
        })?;

        info!("Initialized {}", gst::version_string());

        Ok(())
    }

    // GStreamer can't be initialized again after deinit, so the library stays loaded.
    fn release(&self) {
        debug!("Last GStreamer pipeline released");
    }

    fn create_pipeline(
        &self,
        target: RenderTarget,
        policy: &TransportPolicy,
        signals: SignalSender,
    ) -> Result<GstPipeline, PipelineError> {
        let playbin = gst::ElementFactory::make("playbin").build().map_err(|err| {
            PipelineError::new(
                ErrorDomain::Core,
                core_error::MISSING_PLUGIN,
                format!("Failed to create playbin: {}", err),
            )
        })?;

        let protocols = policy.mask().to_string();
        let latency = u32::try_from(policy.tuning().latency().as_millis()).unwrap_or(u32::MAX);
        debug!(
            "Pipeline {}: Transports {:?}, latency {}ms",
            target,
            policy.attempt_order(),
            latency
        );

        playbin.connect("source-setup", false, move |values| {
            let source = match values.get(1).map(|value| value.get::<gst::Element>()) {
                Some(Ok(source)) => source,
                _ => return None,
            };

            if source.find_property("protocols").is_some() {
                trace!("Pipeline {}: Setting protocols {}", target, protocols);
                source.set_property_from_str("protocols", &protocols);
            }
            if source.find_property("latency").is_some() {
                source.set_property("latency", latency);
            }

            None
        });

        let bus = playbin.bus().ok_or_else(|| {
            PipelineError::new(ErrorDomain::Core, core_error::FAILED, "Pipeline has no bus")
        })?;

        let watch = Arc::new(BusWatch {
            target,
            pipeline: playbin.downgrade(),
            signals,
            playing: AtomicBool::new(false),
            live: AtomicBool::new(false),
            buffering: AtomicBool::new(false),
            prepared: AtomicBool::new(false),
        });

        // Nothing pops the bus, so every message is dropped after handling
        let watch_clone = watch.clone();
        bus.set_sync_handler(move |_bus, msg| {
            watch_clone.handle_message(msg);
            gst::BusSyncReply::Drop
        });

        Ok(GstPipeline {
            playbin,
            bus,
            watch,
            destroyed: false,
        })
    }
}

/// Bus state shared between the pipeline handle and the sync handler.
struct BusWatch {
    target: RenderTarget,
    pipeline: glib::WeakRef<gst::Element>,
    signals: SignalSender,
    /// Playing was requested by the controller.
    playing: AtomicBool,
    live: AtomicBool,
    buffering: AtomicBool,
    /// `Signal::Ready` was sent for the current URI.
    prepared: AtomicBool,
}

impl BusWatch {
    fn emit(&self, signal: Signal) {
        if let Err(err) = self.signals.send(signal) {
            trace!("Pipeline {}: Dropping signal: {}", self.target, err);
        }
    }

    fn handle_message(&self, msg: &gst::Message) {
        use gst::MessageView;

        if gst_video::is_video_overlay_prepare_window_handle_message(msg) {
            if let Some(overlay) = msg
                .src()
                .and_then(|src| src.dynamic_cast_ref::<gst_video::VideoOverlay>())
            {
                debug!("Pipeline {}: Setting window handle", self.target);
                unsafe {
                    overlay.set_window_handle(self.target.as_raw());
                }
            }
            return;
        }

        match msg.view() {
            MessageView::Error(err) => {
                let debug = err.debug();
                error!(
                    "Pipeline {}: Error from {:?}: {} ({:?})",
                    self.target,
                    err.src().map(|s| s.path_string()),
                    err.error(),
                    debug
                );
                self.emit(Signal::Error(pipeline_error(
                    &err.error(),
                    debug.as_ref().map(|d| d.as_str()),
                )));
            }
            MessageView::Warning(warning) => {
                warn!(
                    "Pipeline {}: Warning from {:?}: {}",
                    self.target,
                    warning.src().map(|s| s.path_string()),
                    warning.error()
                );
                self.emit(Signal::Message(warning.error().to_string()));
            }
            MessageView::Eos(_) => {
                self.emit(Signal::Message(String::from("End of stream")));
            }
            MessageView::StateChanged(state_changed) => {
                // Only the top-level pipeline has no parent
                if msg.src().map(|src| src.parent().is_some()).unwrap_or(true) {
                    return;
                }

                let (old, current) = (state_changed.old(), state_changed.current());
                trace!("Pipeline {}: {:?} -> {:?}", self.target, old, current);

                if old == gst::State::Ready
                    && current == gst::State::Paused
                    && !self.prepared.swap(true, Ordering::SeqCst)
                {
                    self.emit(Signal::Ready);
                }
                if old != current {
                    self.emit(Signal::Message(format!("{:?}", current)));
                }
            }
            MessageView::Buffering(buffering) => {
                let percent = buffering.percent();
                trace!("Pipeline {}: Buffering {}%", self.target, percent);

                let live = self.live.load(Ordering::SeqCst);
                if percent < 100 {
                    if !self.buffering.swap(true, Ordering::SeqCst) {
                        self.emit(Signal::BufferingStarted);
                        if !live {
                            let target = self.target;
                            self.call_async(move |pipeline| {
                                if let Err(err) = pipeline.set_state(gst::State::Paused) {
                                    warn!(
                                        "Pipeline {}: Failed to pause for buffering: {}",
                                        target, err
                                    );
                                }
                            });
                        }
                    }
                } else if self.buffering.swap(false, Ordering::SeqCst) {
                    self.emit(Signal::BufferingFinished);
                    if !live && self.playing.load(Ordering::SeqCst) {
                        let target = self.target;
                        self.call_async(move |pipeline| {
                            if let Err(err) = pipeline.set_state(gst::State::Playing) {
                                warn!(
                                    "Pipeline {}: Failed to resume after buffering: {}",
                                    target, err
                                );
                            }
                        });
                    }
                }
            }
            MessageView::ClockLost(_) => {
                let target = self.target;
                self.call_async(move |pipeline| {
                    let res = pipeline
                        .set_state(gst::State::Paused)
                        .and_then(|_| pipeline.set_state(gst::State::Playing));
                    if let Err(err) = res {
                        warn!("Pipeline {}: Failed to select a new clock: {}", target, err);
                    }
                });
            }
            MessageView::Latency(_) => {
                let target = self.target;
                self.call_async(move |pipeline| {
                    if let Err(err) = pipeline.recalculate_latency() {
                        warn!("Pipeline {}: Failed to recalculate latency: {}", target, err);
                    }
                });
            }
            _ => (),
        }
    }

    fn call_async<F: FnOnce(&gst::Element) + Send + 'static>(&self, func: F) {
        if let Some(pipeline) = self.pipeline.upgrade() {
            pipeline.call_async(func);
        }
    }
}

/// `playbin` bound to one render target.
pub struct GstPipeline {
    playbin: gst::Element,
    bus: gst::Bus,
    watch: Arc<BusWatch>,
    destroyed: bool,
}

impl GstPipeline {
    fn set_state(&self, state: gst::State) -> Result<gst::StateChangeSuccess, PipelineError> {
        self.playbin
            .set_state(state)
            .map_err(|_| state_change_error(&format!("change state to {:?}", state)))
    }
}

impl Pipeline for GstPipeline {
    fn set_uri(&mut self, uri: &url::Url) -> Result<(), PipelineError> {
        let target = self.watch.target;

        self.set_state(gst::State::Ready)?;

        self.watch.prepared.store(false, Ordering::SeqCst);
        self.watch.buffering.store(false, Ordering::SeqCst);
        self.watch.playing.store(false, Ordering::SeqCst);

        debug!("Pipeline {}: Setting URI {}", target, uri);
        self.playbin.set_property("uri", uri.as_str());

        let live = self.set_state(gst::State::Paused)? == gst::StateChangeSuccess::NoPreroll;
        debug!("Pipeline {}: Live {}", target, live);
        self.watch.live.store(live, Ordering::SeqCst);

        Ok(())
    }

    fn start(&mut self) -> Result<(), PipelineError> {
        self.watch.playing.store(true, Ordering::SeqCst);

        // Resumed once buffering is done
        if self.watch.buffering.load(Ordering::SeqCst) && !self.watch.live.load(Ordering::SeqCst)
        {
            return Ok(());
        }

        self.set_state(gst::State::Playing).map(|_| ())
    }

    fn pause(&mut self) -> Result<(), PipelineError> {
        self.watch.playing.store(false, Ordering::SeqCst);
        self.set_state(gst::State::Paused).map(|_| ())
    }

    fn seek(&mut self, position: Duration) -> Result<(), PipelineError> {
        let nseconds = u64::try_from(position.as_nanos())
            .unwrap_or(u64::MAX)
            .min(u64::MAX - 1);

        self.playbin
            .seek_simple(
                gst::SeekFlags::FLUSH | gst::SeekFlags::KEY_UNIT,
                gst::ClockTime::from_nseconds(nseconds),
            )
            .map_err(|err| {
                PipelineError::new(
                    ErrorDomain::Core,
                    core_error::SEEK,
                    format!("Failed to seek to {:?}: {}", position, err),
                )
            })
    }

    fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;

        debug!("Pipeline {}: Shutting down", self.watch.target);
        self.bus.unset_sync_handler();
        let _ = self.playbin.set_state(gst::State::Null);
    }
}

impl Drop for GstPipeline {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::{map_error_code, tls_error, ErrorKind};

    #[test]
    fn classifies_gstreamer_errors() {
        let err = glib::Error::new(gst::ResourceError::NotAuthorized, "Unauthorized");
        let pipeline_error = pipeline_error(&err, Some("401"));

        assert_eq!(pipeline_error.domain, ErrorDomain::Resource);
        assert_eq!(pipeline_error.kind(), ErrorKind::NotAuthorized);
        assert_eq!(pipeline_error.debug.as_deref(), Some("401"));

        let err = glib::Error::new(gst::ResourceError::OpenRead, "Could not open");
        assert_eq!(pipeline_error(&err, None).kind(), ErrorKind::NotFound);

        let err = glib::Error::new(gst::StreamError::Decode, "Broken stream");
        assert_eq!(pipeline_error(&err, None).kind(), ErrorKind::Other);
    }

    #[test]
    fn classifies_tls_errors() {
        let err = glib::Error::new(TlsErrorCode(tls_error::BAD_CERTIFICATE), "Bad certificate");
        assert_eq!(classify(&err), (ErrorDomain::Tls, tls_error::BAD_CERTIFICATE));
        assert_eq!(
            map_error_code(ErrorDomain::Tls, tls_error::BAD_CERTIFICATE),
            ErrorKind::WrongDomain
        );
    }
}
