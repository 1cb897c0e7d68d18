// Rust RTSP Playback
//
// Copyright (C) 2020-2021 Sebastian Dröge <sebastian@centricular.com>
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at
// <https://mozilla.org/MPL/2.0/>.
//
// SPDX-License-Identifier: MPL-2.0

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Runs the closure when dropped.
#[must_use]
pub struct RunOnDrop(Option<Box<dyn FnOnce() + Send>>);

impl RunOnDrop {
    pub fn new<F: FnOnce() + Send + 'static>(func: F) -> RunOnDrop {
        RunOnDrop(Some(Box::new(func)))
    }
}

impl std::fmt::Debug for RunOnDrop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("RunOnDrop")
            .field(&self.0.is_some())
            .finish()
    }
}

impl Drop for RunOnDrop {
    fn drop(&mut self) {
        if let Some(func) = self.0.take() {
            func();
        }
    }
}

/// Calls into host code, turning a panic into an `Err` carrying the panic message.
pub(crate) fn catch_host_panic<F: FnOnce()>(func: F) -> Result<(), String> {
    panic::catch_unwind(AssertUnwindSafe(func)).map_err(|payload| panic_message(&*payload))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        String::from(*s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("non-string panic payload")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn runs_on_drop() {
        let count = Arc::new(AtomicUsize::new(0));

        let count_clone = count.clone();
        let guard = RunOnDrop::new(move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(count.load(Ordering::SeqCst), 0);

        drop(guard);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panic_is_caught() {
        assert_eq!(catch_host_panic(|| ()), Ok(()));
        assert_eq!(
            catch_host_panic(|| panic!("observer failed")),
            Err(String::from("observer failed"))
        );
        let code = 7;
        assert_eq!(
            catch_host_panic(|| panic!("code {}", code)),
            Err(String::from("code 7"))
        );
    }
}
