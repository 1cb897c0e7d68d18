// Rust RTSP Playback
//
// Copyright (C) 2020-2021 Sebastian Dröge <sebastian@centricular.com>
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at
// <https://mozilla.org/MPL/2.0/>.
//
// SPDX-License-Identifier: MPL-2.0

use futures::channel::mpsc;
use futures::prelude::*;

use std::fmt;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use super::Disconnected;

/// MPSC Receiver.
///
/// The channel is unbounded: host commands and pipeline signals are never dropped because the
/// consuming task is busy.
pub struct Receiver<T>(mpsc::UnboundedReceiver<T>);

impl<T> fmt::Debug for Receiver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Receiver").finish()
    }
}

/// MPSC Sender.
///
/// Sending never blocks, which makes it usable from engine streaming threads and from the
/// host's calling context alike.
#[derive(Debug)]
pub struct Sender<T>(SenderInner<T>);

enum SenderInner<T> {
    Plain(mpsc::UnboundedSender<T>),
    Mapped(Box<dyn SendMap<T> + Send + Sync>),
}

impl<T: Send + 'static> Clone for Sender<T> {
    fn clone(&self) -> Self {
        match self.0 {
            SenderInner::Plain(ref sender) => Sender(SenderInner::Plain(sender.clone())),
            SenderInner::Mapped(ref sender) => Sender(SenderInner::Mapped(sender.clone_box())),
        }
    }
}

impl<T> fmt::Debug for SenderInner<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SenderInner::Plain(_) => f.debug_struct("Plain").finish(),
            SenderInner::Mapped(_) => f.debug_struct("Mapped").finish(),
        }
    }
}

pub fn channel<T: Send + 'static>() -> (Sender<T>, Receiver<T>) {
    let (sender, receiver) = mpsc::unbounded();

    (Sender(SenderInner::Plain(sender)), Receiver(receiver))
}

impl<T: Send + 'static> Sender<T> {
    /// Send an item without waiting.
    pub fn send(&self, msg: T) -> Result<(), Disconnected> {
        match self.0 {
            SenderInner::Plain(ref sender) => {
                sender.unbounded_send(msg).map_err(|_| Disconnected)
            }
            SenderInner::Mapped(ref sender) => sender.send(msg),
        }
    }

    /// Whether the receiving side is gone.
    pub fn is_closed(&self) -> bool {
        match self.0 {
            SenderInner::Plain(ref sender) => sender.is_closed(),
            SenderInner::Mapped(ref sender) => sender.is_closed(),
        }
    }

    /// Map a closure over all items sent through the returned sender.
    pub fn map<U: Send + 'static, F: Fn(U) -> T + Send + Sync + 'static>(
        self,
        func: F,
    ) -> Sender<U> {
        Sender(SenderInner::Mapped(Box::new(SenderMap {
            sender: self,
            func: Arc::new(func),
            phantom: PhantomData,
        })))
    }
}

impl<T: Send + 'static> Receiver<T> {
    /// Close the channel.
    ///
    /// Items already queued can still be received, new sends fail with [`Disconnected`].
    pub fn close(&mut self) {
        self.0.close();
    }
}

impl<T: Send + 'static> Stream for Receiver<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().0).poll_next(cx)
    }
}

trait SendMap<U: Send + 'static> {
    fn send(&self, msg: U) -> Result<(), Disconnected>;
    fn is_closed(&self) -> bool;

    fn clone_box(&self) -> Box<dyn SendMap<U> + Send + Sync>;
}

struct SenderMap<T, U, F: Fn(U) -> T + Send + Sync + 'static> {
    sender: Sender<T>,
    func: Arc<F>,
    phantom: PhantomData<fn(U)>,
}

impl<T: Send + 'static, U: Send + 'static, F: Fn(U) -> T + Send + Sync + 'static> SendMap<U>
    for SenderMap<T, U, F>
{
    fn send(&self, msg: U) -> Result<(), Disconnected> {
        self.sender.send((self.func)(msg))
    }

    fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    fn clone_box(&self) -> Box<dyn SendMap<U> + Send + Sync> {
        Box::new(SenderMap {
            sender: self.sender.clone(),
            func: self.func.clone(),
            phantom: PhantomData,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapped_sender_shares_queue_order() {
        let (sender, mut receiver) = channel::<(u8, u32)>();
        let mapped = sender.clone().map(|v: u32| (1, v));

        sender.send((0, 10)).unwrap();
        mapped.send(20).unwrap();
        sender.send((0, 30)).unwrap();

        let mut items = Vec::new();
        while let Some(Some(item)) = receiver.next().now_or_never() {
            items.push(item);
        }
        assert_eq!(items, vec![(0, 10), (1, 20), (0, 30)]);
    }

    #[test]
    fn send_after_close_fails() {
        let (sender, mut receiver) = channel::<u32>();
        let mapped = sender.clone().map(|v: u8| u32::from(v));

        receiver.close();

        assert!(sender.is_closed());
        assert!(mapped.is_closed());
        assert_eq!(sender.send(1), Err(Disconnected));
        assert_eq!(mapped.send(1), Err(Disconnected));
    }
}
