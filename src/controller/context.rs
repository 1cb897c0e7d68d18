// Rust RTSP Playback
//
// Copyright (C) 2020-2021 Sebastian Dröge <sebastian@centricular.com>
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at
// <https://mozilla.org/MPL/2.0/>.
//
// SPDX-License-Identifier: MPL-2.0

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, error, info, trace, warn};

use crate::error::{ErrorKind, ErrorRecord, PipelineError};
use crate::observer::{Notification, Observer};
use crate::pipeline::{Pipeline, Signal};
use crate::render::TargetBinding;
use crate::runtime::RuntimeGuard;
use crate::transport::SessionTuning;
use crate::utils::RunOnDrop;

use super::state::{Decision, PlaybackState, StateMachine, Status};
use super::Id;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Everything the controller holds on to until it is destroyed.
pub(super) struct Resources<P: Pipeline> {
    id: Id,
    pipeline: Option<P>,
    binding: Option<TargetBinding>,
    runtime: Option<RuntimeGuard>,
}

impl<P: Pipeline> Resources<P> {
    pub(super) fn new(id: Id, pipeline: P, binding: TargetBinding, runtime: RuntimeGuard) -> Self {
        Resources {
            id,
            pipeline: Some(pipeline),
            binding: Some(binding),
            runtime: Some(runtime),
        }
    }

    /// Tears down the pipeline, then releases the render target and the engine.
    fn release(&mut self) {
        if let Some(mut pipeline) = self.pipeline.take() {
            debug!("Controller {}: Destroying pipeline", self.id);
            pipeline.destroy();
        }

        drop(self.binding.take());
        drop(self.runtime.take());
    }
}

/// Handle that releases the resources of a controller when dropped.
pub(super) fn teardown<P: Pipeline>(resources: &Arc<Mutex<Resources<P>>>) -> RunOnDrop {
    let resources = resources.clone();
    RunOnDrop::new(move || lock(&resources).release())
}

/// State visible from the host side of the controller.
#[derive(Debug)]
pub(super) struct Shared {
    status: Mutex<Status>,
    alive: AtomicBool,
    teardown: Mutex<Option<RunOnDrop>>,
}

impl Shared {
    pub(super) fn new(teardown: RunOnDrop) -> Self {
        Shared {
            status: Mutex::new(Status::default()),
            alive: AtomicBool::new(true),
            teardown: Mutex::new(Some(teardown)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Status> {
        lock(&self.status)
    }

    pub(super) fn status(&self) -> Status {
        *self.lock()
    }

    /// `Destroyed` is never overwritten.
    pub(super) fn publish(&self, status: Status) {
        let mut current = self.lock();
        if current.state != PlaybackState::Destroyed {
            *current = status;
        }
    }

    pub(super) fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Marks the controller destroyed and releases its resources before returning.
    ///
    /// Returns `false` if it already was destroyed.
    pub(super) fn kill(&self) -> bool {
        let was_alive = {
            let mut current = self.lock();
            current.state = PlaybackState::Destroyed;
            current.buffering = false;
            self.alive.swap(false, Ordering::SeqCst)
        };

        let teardown = lock(&self.teardown).take();
        drop(teardown);

        was_alive
    }
}

/// Execution state of the controller task.
pub(super) struct Context<P: Pipeline> {
    pub(super) id: Id,
    pub(super) shared: Arc<Shared>,
    machine: StateMachine,
    resources: Arc<Mutex<Resources<P>>>,
    observer: Arc<dyn Observer>,
    tuning: SessionTuning,
}

impl<P: Pipeline> Context<P> {
    pub(super) fn new(
        id: Id,
        shared: Arc<Shared>,
        resources: Arc<Mutex<Resources<P>>>,
        observer: Arc<dyn Observer>,
        tuning: SessionTuning,
    ) -> Self {
        Context {
            id,
            shared,
            machine: StateMachine::default(),
            resources,
            observer,
            tuning,
        }
    }

    /// Publishes the current status and dispatches `notification` unless destroyed.
    fn notify(&mut self, notification: Option<Notification>) {
        self.shared.publish(self.machine.status());

        if let Some(notification) = notification {
            if !self.shared.is_alive() {
                debug!(
                    "Controller {}: Not dispatching {:?} after destroy",
                    self.id, notification
                );
                return;
            }

            trace!("Controller {}: Dispatching {:?}", self.id, notification);
            notification.deliver(&*self.observer);
        }
    }

    fn fail(&mut self, record: ErrorRecord) {
        error!(
            "Controller {}: {} ({:?})",
            self.id,
            record,
            record.detail()
        );
        let notification = self.machine.fail(record);
        self.notify(notification);
    }

    fn forward<F: FnOnce(&mut P) -> Result<(), PipelineError>>(&mut self, what: &str, func: F) {
        self.shared.publish(self.machine.status());

        let res = match lock(&self.resources).pipeline {
            Some(ref mut pipeline) => func(pipeline),
            None => return,
        };

        if let Err(err) = res {
            debug!("Controller {}: Failed to {}", self.id, what);
            self.fail(err.into());
        }
    }

    fn rejected(&self, what: &str, decision: Decision) {
        let state = self.machine.state();
        match decision {
            Decision::NoOp => {
                debug!("Controller {}: Ignoring {} in state {}", self.id, what, state)
            }
            Decision::Invalid => warn!("Controller {}: Can't {} in state {}", self.id, what, state),
            Decision::Forward => (),
        }
    }

    pub(super) fn set_uri(&mut self, uri: &str) {
        let decision = self.machine.set_uri();
        if decision != Decision::Forward {
            self.rejected("set URI", decision);
            return;
        }

        let url = match url::Url::parse(uri) {
            Ok(url) => url,
            Err(err) => {
                self.fail(ErrorRecord::new(
                    ErrorKind::Other,
                    format!("Invalid URI '{}': {}", uri, err),
                ));
                return;
            }
        };

        info!("Controller {}: Setting URI {}", self.id, url);
        self.forward("set URI", |pipeline| pipeline.set_uri(&url));
    }

    pub(super) fn play(&mut self) {
        let decision = self.machine.play();
        if decision != Decision::Forward {
            self.rejected("play", decision);
            return;
        }

        debug!("Controller {}: Playing", self.id);
        self.forward("play", |pipeline| pipeline.start());
    }

    pub(super) fn pause(&mut self) {
        let decision = self.machine.pause();
        if decision != Decision::Forward {
            self.rejected("pause", decision);
            return;
        }

        debug!("Controller {}: Pausing", self.id);
        self.forward("pause", |pipeline| pipeline.pause());
    }

    pub(super) fn seek(&mut self, position: Duration) {
        let decision = self.machine.seek(position, self.tuning.min_seek_step());
        if decision != Decision::Forward {
            self.rejected("seek", decision);
            return;
        }

        debug!("Controller {}: Seeking to {:?}", self.id, position);
        self.forward("seek", |pipeline| pipeline.seek(position));
    }

    pub(super) fn signal(&mut self, signal: Signal) {
        trace!("Controller {}: Handling signal {:?}", self.id, signal);

        if let Signal::Error(ref err) = signal {
            if !self.machine.state().is_terminal() {
                error!("Controller {}: Pipeline error: {}", self.id, err);
            }
        }

        let state = self.machine.state();
        let description = format!("{:?}", signal);
        let notification = self.machine.signal(signal);
        if notification.is_none() {
            debug!(
                "Controller {}: Dropping signal {} in state {}",
                self.id, description, state
            );
        }

        self.notify(notification);
    }

    /// Tears down the pipeline and releases the render target unless `destroy()` already did.
    pub(super) fn shutdown(&mut self) {
        self.machine.destroy();
        self.shared.kill();
    }
}
