// Rust RTSP Playback
//
// Copyright (C) 2020-2021 Sebastian Dröge <sebastian@centricular.com>
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at
// <https://mozilla.org/MPL/2.0/>.
//
// SPDX-License-Identifier: MPL-2.0

use std::fmt;
use std::time::Duration;

use crate::error::ErrorRecord;
use crate::observer::Notification;
use crate::pipeline::Signal;

/// Nominal playback state.
///
/// `Error` and `Destroyed` are terminal: pipeline signals and playback commands can't leave
/// them. From `Error` only a new `set_uri` or `destroy` is accepted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PlaybackState {
    Uninitialized,
    Initializing,
    Ready,
    Playing,
    Paused,
    Error,
    Destroyed,
}

impl PlaybackState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PlaybackState::Error | PlaybackState::Destroyed)
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Playback state plus the buffering overlay.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Status {
    pub state: PlaybackState,
    /// Only ever set while `Playing` or `Paused`.
    pub buffering: bool,
}

impl Default for Status {
    fn default() -> Self {
        Status {
            state: PlaybackState::Uninitialized,
            buffering: false,
        }
    }
}

/// Outcome of a host command.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Decision {
    /// State was updated, the command has to be forwarded to the pipeline.
    Forward,
    /// Already in the requested state.
    NoOp,
    /// Not valid in the current state.
    Invalid,
}

#[derive(Debug, Default)]
pub(crate) struct StateMachine {
    status: Status,
    last_seek: Option<Duration>,
}

impl StateMachine {
    pub(crate) fn status(&self) -> Status {
        self.status
    }

    pub(crate) fn state(&self) -> PlaybackState {
        self.status.state
    }

    fn enter(&mut self, state: PlaybackState) {
        self.status.state = state;
        if state != PlaybackState::Playing && state != PlaybackState::Paused {
            self.status.buffering = false;
        }
    }

    pub(crate) fn set_uri(&mut self) -> Decision {
        match self.status.state {
            PlaybackState::Uninitialized
            | PlaybackState::Ready
            | PlaybackState::Playing
            | PlaybackState::Paused
            | PlaybackState::Error => {
                self.enter(PlaybackState::Initializing);
                self.last_seek = None;
                Decision::Forward
            }
            PlaybackState::Initializing => Decision::Invalid,
            PlaybackState::Destroyed => Decision::NoOp,
        }
    }

    pub(crate) fn play(&mut self) -> Decision {
        match self.status.state {
            PlaybackState::Ready | PlaybackState::Paused => {
                self.enter(PlaybackState::Playing);
                Decision::Forward
            }
            PlaybackState::Playing | PlaybackState::Destroyed => Decision::NoOp,
            _ => Decision::Invalid,
        }
    }

    pub(crate) fn pause(&mut self) -> Decision {
        match self.status.state {
            PlaybackState::Playing => {
                self.enter(PlaybackState::Paused);
                Decision::Forward
            }
            PlaybackState::Paused | PlaybackState::Destroyed => Decision::NoOp,
            _ => Decision::Invalid,
        }
    }

    /// Seeks closer than `min_step` to the last forwarded target are coalesced.
    pub(crate) fn seek(&mut self, position: Duration, min_step: Duration) -> Decision {
        match self.status.state {
            PlaybackState::Ready | PlaybackState::Playing | PlaybackState::Paused => {
                if let Some(last) = self.last_seek {
                    let distance = if position > last {
                        position - last
                    } else {
                        last - position
                    };
                    if distance < min_step {
                        return Decision::NoOp;
                    }
                }
                self.last_seek = Some(position);
                Decision::Forward
            }
            PlaybackState::Destroyed => Decision::NoOp,
            _ => Decision::Invalid,
        }
    }

    /// Returns `false` if already destroyed.
    pub(crate) fn destroy(&mut self) -> bool {
        if self.status.state == PlaybackState::Destroyed {
            return false;
        }
        self.enter(PlaybackState::Destroyed);
        true
    }

    /// Enters `Error` unless already terminal.
    pub(crate) fn fail(&mut self, err: ErrorRecord) -> Option<Notification> {
        if self.status.state.is_terminal() {
            return None;
        }
        self.enter(PlaybackState::Error);
        Some(Notification::Error(err))
    }

    /// Applies a pipeline signal, returning the callback to dispatch.
    ///
    /// Signals whose precondition doesn't hold are dropped and return `None`.
    pub(crate) fn signal(&mut self, signal: Signal) -> Option<Notification> {
        let state = self.status.state;
        match signal {
            Signal::Ready if state == PlaybackState::Initializing => {
                self.enter(PlaybackState::Ready);
                Some(Notification::Initialized)
            }
            Signal::Error(err) => self.fail(err.into()),
            Signal::BufferingStarted
                if (state == PlaybackState::Playing || state == PlaybackState::Paused)
                    && !self.status.buffering =>
            {
                self.status.buffering = true;
                Some(Notification::Buffering)
            }
            Signal::BufferingFinished if self.status.buffering => {
                self.status.buffering = false;
                Some(Notification::BufferingDone)
            }
            Signal::Message(text) if !state.is_terminal() => Some(Notification::UiMessage(text)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::{resource_error, ErrorDomain, ErrorKind, PipelineError};

    const STEP: Duration = Duration::from_millis(500);

    const ALL_STATES: [PlaybackState; 7] = [
        PlaybackState::Uninitialized,
        PlaybackState::Initializing,
        PlaybackState::Ready,
        PlaybackState::Playing,
        PlaybackState::Paused,
        PlaybackState::Error,
        PlaybackState::Destroyed,
    ];

    fn in_state(state: PlaybackState) -> StateMachine {
        StateMachine {
            status: Status {
                state,
                buffering: false,
            },
            last_seek: None,
        }
    }

    fn unauthorized() -> Signal {
        Signal::Error(PipelineError::new(
            ErrorDomain::Resource,
            resource_error::NOT_AUTHORIZED,
            "401 Unauthorized",
        ))
    }

    #[test]
    fn initialization_cycle() {
        let mut machine = StateMachine::default();
        assert_eq!(machine.state(), PlaybackState::Uninitialized);

        assert_eq!(machine.signal(Signal::Ready), None);
        assert_eq!(machine.set_uri(), Decision::Forward);
        assert_eq!(machine.state(), PlaybackState::Initializing);
        assert_eq!(machine.set_uri(), Decision::Invalid);

        assert_eq!(machine.signal(Signal::Ready), Some(Notification::Initialized));
        assert_eq!(machine.state(), PlaybackState::Ready);
        assert_eq!(machine.signal(Signal::Ready), None);
    }

    #[test]
    fn play_pause() {
        let mut machine = in_state(PlaybackState::Ready);

        assert_eq!(machine.pause(), Decision::Invalid);
        assert_eq!(machine.play(), Decision::Forward);
        assert_eq!(machine.play(), Decision::NoOp);
        assert_eq!(machine.state(), PlaybackState::Playing);

        assert_eq!(machine.pause(), Decision::Forward);
        assert_eq!(machine.pause(), Decision::NoOp);
        assert_eq!(machine.state(), PlaybackState::Paused);

        assert_eq!(machine.play(), Decision::Forward);
        assert_eq!(machine.state(), PlaybackState::Playing);
    }

    #[test]
    fn commands_before_ready() {
        for state in &[PlaybackState::Uninitialized, PlaybackState::Initializing] {
            let mut machine = in_state(*state);
            assert_eq!(machine.play(), Decision::Invalid);
            assert_eq!(machine.pause(), Decision::Invalid);
            assert_eq!(machine.seek(Duration::from_secs(1), STEP), Decision::Invalid);
            assert_eq!(machine.state(), *state);
        }
    }

    #[test]
    fn buffering_overlay_is_coalesced() {
        let mut machine = in_state(PlaybackState::Playing);

        assert_eq!(
            machine.signal(Signal::BufferingStarted),
            Some(Notification::Buffering)
        );
        assert_eq!(machine.signal(Signal::BufferingStarted), None);
        assert!(machine.status().buffering);

        assert_eq!(machine.pause(), Decision::Forward);
        assert!(machine.status().buffering);

        assert_eq!(
            machine.signal(Signal::BufferingFinished),
            Some(Notification::BufferingDone)
        );
        assert_eq!(machine.signal(Signal::BufferingFinished), None);
        assert_eq!(
            machine.status(),
            Status {
                state: PlaybackState::Paused,
                buffering: false
            }
        );
    }

    #[test]
    fn buffering_outside_playback_is_dropped() {
        for state in &[
            PlaybackState::Uninitialized,
            PlaybackState::Initializing,
            PlaybackState::Ready,
            PlaybackState::Error,
            PlaybackState::Destroyed,
        ] {
            let mut machine = in_state(*state);
            assert_eq!(machine.signal(Signal::BufferingStarted), None);
            assert_eq!(machine.signal(Signal::BufferingFinished), None);
            assert!(!machine.status().buffering);
        }
    }

    #[test]
    fn error_is_absorbing() {
        let mut machine = in_state(PlaybackState::Initializing);

        match machine.signal(unauthorized()) {
            Some(Notification::Error(record)) => {
                assert_eq!(record.kind(), ErrorKind::NotAuthorized);
                assert_eq!(record.message(), "401 Unauthorized");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(machine.state(), PlaybackState::Error);

        assert_eq!(machine.signal(unauthorized()), None);
        assert_eq!(machine.signal(Signal::Ready), None);
        assert_eq!(machine.signal(Signal::Message(String::from("Paused"))), None);
        assert_eq!(machine.play(), Decision::Invalid);
        assert_eq!(machine.pause(), Decision::Invalid);
        assert_eq!(machine.state(), PlaybackState::Error);

        assert_eq!(machine.set_uri(), Decision::Forward);
        assert_eq!(machine.state(), PlaybackState::Initializing);
    }

    #[test]
    fn error_clears_overlay() {
        let mut machine = in_state(PlaybackState::Paused);
        machine.signal(Signal::BufferingStarted);

        assert!(machine.signal(unauthorized()).is_some());
        assert_eq!(
            machine.status(),
            Status {
                state: PlaybackState::Error,
                buffering: false
            }
        );
    }

    #[test]
    fn destroy_from_any_state() {
        for state in &ALL_STATES {
            let mut machine = in_state(*state);
            assert_eq!(machine.destroy(), *state != PlaybackState::Destroyed);
            assert_eq!(machine.state(), PlaybackState::Destroyed);
            assert!(!machine.destroy());

            assert_eq!(machine.set_uri(), Decision::NoOp);
            assert_eq!(machine.play(), Decision::NoOp);
            assert_eq!(machine.pause(), Decision::NoOp);
            assert_eq!(machine.signal(Signal::Ready), None);
            assert_eq!(machine.signal(unauthorized()), None);
            assert_eq!(machine.state(), PlaybackState::Destroyed);
        }
    }

    #[test]
    fn set_uri_restarts_playback() {
        let mut machine = in_state(PlaybackState::Playing);
        machine.signal(Signal::BufferingStarted);

        assert_eq!(machine.set_uri(), Decision::Forward);
        assert_eq!(
            machine.status(),
            Status {
                state: PlaybackState::Initializing,
                buffering: false
            }
        );
    }

    #[test]
    fn seek_coalescing() {
        let mut machine = in_state(PlaybackState::Playing);

        assert_eq!(machine.seek(Duration::from_secs(10), STEP), Decision::Forward);
        assert_eq!(
            machine.seek(Duration::from_millis(10_200), STEP),
            Decision::NoOp
        );
        assert_eq!(machine.seek(Duration::from_millis(9_800), STEP), Decision::NoOp);
        assert_eq!(
            machine.seek(Duration::from_millis(10_500), STEP),
            Decision::Forward
        );
        assert_eq!(machine.seek(Duration::from_secs(2), STEP), Decision::Forward);

        // A new source starts without a previous target
        machine.set_uri();
        machine.signal(Signal::Ready);
        assert_eq!(machine.seek(Duration::from_secs(2), STEP), Decision::Forward);
    }

    #[test]
    fn ui_messages_only_while_alive() {
        let mut machine = StateMachine::default();
        assert_eq!(
            machine.signal(Signal::Message(String::from("Ready"))),
            Some(Notification::UiMessage(String::from("Ready")))
        );
        assert_eq!(machine.state(), PlaybackState::Uninitialized);

        machine.destroy();
        assert_eq!(machine.signal(Signal::Message(String::from("Null"))), None);
    }
}
