// Rust RTSP Playback
//
// Copyright (C) 2020-2021 Sebastian Dröge <sebastian@centricular.com>
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at
// <https://mozilla.org/MPL/2.0/>.
//
// SPDX-License-Identifier: MPL-2.0

//! Host-facing event contract.
//!
//! An [`Observer`] is passive: it only receives events and has no way to issue commands back to
//! the [`crate::controller::Controller`]. All callbacks are invoked from the controller task, so
//! implementations that need to touch UI state should re-dispatch, e.g. via [`channel`].

use log::{debug, error};

use crate::channel::mpsc;
use crate::error::ErrorRecord;
use crate::utils;

/// Receiver of playback lifecycle and diagnostic events.
///
/// Every method defaults to doing nothing.
pub trait Observer: Send + Sync + 'static {
    /// The pipeline finished preparing the stream set with the last `set_uri`.
    fn on_initialized(&self) {}

    /// A pipeline or command failure, already translated into the host taxonomy.
    fn on_error(&self, err: ErrorRecord) {
        let _ = err;
    }

    /// Playback stalled to accumulate data.
    fn on_buffering(&self) {}

    fn on_buffering_done(&self) {}

    /// Free-form status text suitable for display.
    fn on_ui_message(&self, text: &str) {
        let _ = text;
    }
}

/// Observer that ignores all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl Observer for NoopObserver {}

/// Owned form of an observer callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Initialized,
    Error(ErrorRecord),
    Buffering,
    BufferingDone,
    UiMessage(String),
}

/// Observer forwarding every callback as an [`Event`] into a channel.
#[derive(Debug, Clone)]
pub struct EventForwarder {
    sender: mpsc::Sender<Event>,
}

impl EventForwarder {
    fn forward(&self, event: Event) {
        if let Err(err) = self.sender.send(event) {
            debug!("Dropping event: {}", err);
        }
    }
}

impl Observer for EventForwarder {
    fn on_initialized(&self) {
        self.forward(Event::Initialized);
    }

    fn on_error(&self, err: ErrorRecord) {
        self.forward(Event::Error(err));
    }

    fn on_buffering(&self) {
        self.forward(Event::Buffering);
    }

    fn on_buffering_done(&self) {
        self.forward(Event::BufferingDone);
    }

    fn on_ui_message(&self, text: &str) {
        self.forward(Event::UiMessage(String::from(text)));
    }
}

/// Creates an [`EventForwarder`] and the receiving end of its events.
pub fn channel() -> (EventForwarder, mpsc::Receiver<Event>) {
    let (sender, receiver) = mpsc::channel();
    (EventForwarder { sender }, receiver)
}

/// Callback produced by a state transition, dispatched after the state lock is released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Notification {
    Initialized,
    Error(ErrorRecord),
    Buffering,
    BufferingDone,
    UiMessage(String),
}

impl Notification {
    /// Invokes the matching observer callback, containing any panic raised by the host.
    pub(crate) fn deliver(self, observer: &dyn Observer) {
        let name = self.name();
        let res = utils::catch_host_panic(|| match self {
            Notification::Initialized => observer.on_initialized(),
            Notification::Error(err) => observer.on_error(err),
            Notification::Buffering => observer.on_buffering(),
            Notification::BufferingDone => observer.on_buffering_done(),
            Notification::UiMessage(text) => observer.on_ui_message(&text),
        });

        if let Err(msg) = res {
            error!("Observer panicked in {}: {}", name, msg);
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Notification::Initialized => "on_initialized",
            Notification::Error(_) => "on_error",
            Notification::Buffering => "on_buffering",
            Notification::BufferingDone => "on_buffering_done",
            Notification::UiMessage(_) => "on_ui_message",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use futures::prelude::*;

    use crate::error::ErrorKind;

    struct Panicking;

    impl Observer for Panicking {
        fn on_buffering(&self) {
            panic!("host bug");
        }
    }

    #[test]
    fn forwarder_preserves_order() {
        let (forwarder, mut events) = channel();

        Notification::Initialized.deliver(&forwarder);
        Notification::Error(ErrorRecord::new(ErrorKind::NotFound, "404")).deliver(&forwarder);
        Notification::UiMessage(String::from("Playing")).deliver(&forwarder);

        let mut received = Vec::new();
        while let Some(Some(event)) = events.next().now_or_never() {
            received.push(event);
        }

        assert_eq!(
            received,
            vec![
                Event::Initialized,
                Event::Error(ErrorRecord::new(ErrorKind::NotFound, "404")),
                Event::UiMessage(String::from("Playing")),
            ]
        );
    }

    #[test]
    fn noop_and_panicking_observers_are_contained() {
        Notification::Buffering.deliver(&NoopObserver);
        Notification::Buffering.deliver(&Panicking);
        Notification::BufferingDone.deliver(&Panicking);
    }

    #[test]
    fn forwarding_to_closed_channel_is_silent() {
        let (forwarder, events) = channel();
        drop(events);

        forwarder.on_buffering_done();
    }
}
