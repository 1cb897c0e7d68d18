// Rust RTSP Playback
//
// Copyright (C) 2020-2021 Sebastian Dröge <sebastian@centricular.com>
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at
// <https://mozilla.org/MPL/2.0/>.
//
// SPDX-License-Identifier: MPL-2.0

//! Render targets and their process-wide binding registry.
//!
//! A render target is an opaque native window handle owned by the host. At most one
//! [`crate::controller::Controller`] may render into a given target at a time.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

use log::{debug, warn};
use once_cell::sync::Lazy;

use crate::error::InitError;
use crate::utils::RunOnDrop;

/// Opaque handle to a host-owned drawing surface.
///
/// The value is handed to the video sink unchanged. Zero is never a valid handle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct RenderTarget(usize);

impl RenderTarget {
    pub const fn from_raw(handle: usize) -> Self {
        RenderTarget(handle)
    }

    pub const fn as_raw(self) -> usize {
        self.0
    }

    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for RenderTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

static BOUND: Lazy<Mutex<HashSet<RenderTarget>>> = Lazy::new(|| Mutex::new(HashSet::new()));

fn registry() -> MutexGuard<'static, HashSet<RenderTarget>> {
    match BOUND.lock() {
        Ok(bound) => bound,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Exclusive binding of a render target, released on drop.
#[derive(Debug)]
pub(crate) struct TargetBinding {
    target: RenderTarget,
    _release: RunOnDrop,
}

impl TargetBinding {
    pub(crate) fn target(&self) -> RenderTarget {
        self.target
    }
}

pub(crate) fn bind(target: RenderTarget) -> Result<TargetBinding, InitError> {
    if !target.is_valid() {
        return Err(InitError::InvalidTarget);
    }

    let mut bound = registry();
    if !bound.insert(target) {
        warn!("Render target {} is already bound", target);
        return Err(InitError::TargetInUse(target));
    }
    drop(bound);

    debug!("Bound render target {}", target);

    Ok(TargetBinding {
        target,
        _release: RunOnDrop::new(move || {
            registry().remove(&target);
            debug!("Released render target {}", target);
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_invalid() {
        assert!(!RenderTarget::from_raw(0).is_valid());
        assert_eq!(
            bind(RenderTarget::from_raw(0)).unwrap_err(),
            InitError::InvalidTarget
        );
    }

    #[test]
    fn exclusive_until_dropped() {
        let target = RenderTarget::from_raw(0x5eed_0001);

        let binding = bind(target).unwrap();
        assert_eq!(binding.target(), target);
        assert_eq!(bind(target).unwrap_err(), InitError::TargetInUse(target));

        let other = bind(RenderTarget::from_raw(0x5eed_0002)).unwrap();

        drop(binding);
        let rebound = bind(target).unwrap();
        drop(rebound);
        drop(other);
    }
}
