// Rust RTSP Playback
//
// Copyright (C) 2020-2021 Sebastian Dröge <sebastian@centricular.com>
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at
// <https://mozilla.org/MPL/2.0/>.
//
// SPDX-License-Identifier: MPL-2.0

//! Process-wide engine setup: initialized by the first controller, released with the last.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, info};
use once_cell::sync::Lazy;

use crate::error::{core_error, ErrorDomain, PipelineError};
use crate::pipeline::Engine;
use crate::utils::RunOnDrop;

static RUNTIMES: Lazy<Mutex<HashMap<&'static str, usize>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn registry() -> MutexGuard<'static, HashMap<&'static str, usize>> {
    match RUNTIMES.lock() {
        Ok(runtimes) => runtimes,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Keeps an engine's global setup alive.
#[derive(Debug)]
pub(crate) struct RuntimeGuard(RunOnDrop);

/// Registers one user of `engine`, initializing it if this is the first one.
///
/// The lock is held while initializing so concurrent constructions can't initialize twice.
pub(crate) fn acquire<E: Engine>(engine: &Arc<E>) -> Result<RuntimeGuard, PipelineError> {
    let name = engine.name();

    let mut runtimes = registry();
    let users = runtimes.get(name).copied().unwrap_or(0);
    if users == 0 {
        engine.initialize()?;
        info!("Engine {} {} initialized", name, engine.version());
    }
    let users = users.checked_add(1).ok_or_else(|| {
        PipelineError::new(
            ErrorDomain::Core,
            core_error::FAILED,
            format!("Too many users of engine {}", name),
        )
    })?;
    runtimes.insert(name, users);
    debug!("Engine {} has {} users", name, users);
    drop(runtimes);

    let engine = engine.clone();
    Ok(RuntimeGuard(RunOnDrop::new(move || {
        let mut runtimes = registry();
        let last = match runtimes.get_mut(name) {
            Some(users) if *users > 1 => {
                *users -= 1;
                false
            }
            Some(_) => true,
            None => false,
        };

        if last {
            runtimes.remove(name);
            engine.release();
            info!("Engine {} released", name);
        }
    })))
}

#[cfg(test)]
pub(crate) fn users(name: &str) -> usize {
    registry().get(name).copied().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::pipeline::{Pipeline, SignalSender};
    use crate::render::RenderTarget;
    use crate::transport::TransportPolicy;

    struct NullPipeline;

    impl Pipeline for NullPipeline {
        fn set_uri(&mut self, _uri: &url::Url) -> Result<(), PipelineError> {
            Ok(())
        }

        fn start(&mut self) -> Result<(), PipelineError> {
            Ok(())
        }

        fn pause(&mut self) -> Result<(), PipelineError> {
            Ok(())
        }

        fn seek(&mut self, _position: std::time::Duration) -> Result<(), PipelineError> {
            Ok(())
        }

        fn destroy(&mut self) {}
    }

    struct CountingEngine {
        name: &'static str,
        fail: bool,
        initialized: AtomicUsize,
        released: AtomicUsize,
    }

    impl CountingEngine {
        fn new(name: &'static str, fail: bool) -> Arc<Self> {
            Arc::new(CountingEngine {
                name,
                fail,
                initialized: AtomicUsize::new(0),
                released: AtomicUsize::new(0),
            })
        }
    }

    impl Engine for CountingEngine {
        type Pipeline = NullPipeline;

        fn name(&self) -> &'static str {
            self.name
        }

        fn version(&self) -> String {
            String::from("1.0")
        }

        fn initialize(&self) -> Result<(), PipelineError> {
            if self.fail {
                return Err(PipelineError::new(
                    ErrorDomain::Core,
                    core_error::FAILED,
                    "no engine",
                ));
            }
            self.initialized.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn release(&self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }

        fn create_pipeline(
            &self,
            _target: RenderTarget,
            _policy: &TransportPolicy,
            _signals: SignalSender,
        ) -> Result<NullPipeline, PipelineError> {
            Ok(NullPipeline)
        }
    }

    #[test]
    fn init_once_release_on_last() {
        let engine = CountingEngine::new("runtime-test-counting", false);

        let first = acquire(&engine).unwrap();
        let second = acquire(&engine).unwrap();
        assert_eq!(engine.initialized.load(Ordering::SeqCst), 1);
        assert_eq!(users("runtime-test-counting"), 2);

        drop(first);
        assert_eq!(engine.released.load(Ordering::SeqCst), 0);

        drop(second);
        assert_eq!(engine.released.load(Ordering::SeqCst), 1);
        assert_eq!(users("runtime-test-counting"), 0);

        let third = acquire(&engine).unwrap();
        assert_eq!(engine.initialized.load(Ordering::SeqCst), 2);
        drop(third);
    }

    #[test]
    fn failed_initialization_leaves_no_user() {
        let engine = CountingEngine::new("runtime-test-failing", true);

        assert!(acquire(&engine).is_err());
        assert_eq!(users("runtime-test-failing"), 0);
        assert_eq!(engine.released.load(Ordering::SeqCst), 0);
    }
}
