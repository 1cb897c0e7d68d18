// Rust RTSP Playback
//
// Copyright (C) 2020-2021 Sebastian Dröge <sebastian@centricular.com>
//
// This Source Code Form is subject to the terms of the Mozilla Public License, v2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at
// <https://mozilla.org/MPL/2.0/>.
//
// SPDX-License-Identifier: MPL-2.0

//! Lower-transport selection and session tuning for RTSP session setup.

use std::str::FromStr;
use std::time::Duration;
use std::{error, fmt, ops};

/// Lower transport carrying the RTSP session data.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum LowerTransport {
    Udp,
    UdpMulticast,
    Tcp,
    Http,
    Tls,
}

impl LowerTransport {
    /// Attempt order, most preferred first.
    pub const PREFERENCE: [LowerTransport; 5] = [
        LowerTransport::Tls,
        LowerTransport::Tcp,
        LowerTransport::Http,
        LowerTransport::Udp,
        LowerTransport::UdpMulticast,
    ];

    pub const fn bit(self) -> u32 {
        match self {
            LowerTransport::Udp => TransportMask::UDP.0,
            LowerTransport::UdpMulticast => TransportMask::UDP_MULTICAST.0,
            LowerTransport::Tcp => TransportMask::TCP.0,
            LowerTransport::Http => TransportMask::HTTP.0,
            LowerTransport::Tls => TransportMask::TLS.0,
        }
    }

    /// Nick as used by the `protocols` property of `rtspsrc`.
    pub const fn nick(self) -> &'static str {
        match self {
            LowerTransport::Udp => "udp",
            LowerTransport::UdpMulticast => "udp-mcast",
            LowerTransport::Tcp => "tcp",
            LowerTransport::Http => "http",
            LowerTransport::Tls => "tls",
        }
    }

    fn from_nick(nick: &str) -> Option<Self> {
        LowerTransport::PREFERENCE
            .iter()
            .copied()
            .find(|transport| transport.nick() == nick)
    }
}

impl fmt::Display for LowerTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.nick())
    }
}

/// Set of permitted lower transports.
///
/// Bit values are part of the external contract: UDP=1, UDP-multicast=2, TCP=4, HTTP=8,
/// TLS=16.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct TransportMask(u32);

impl TransportMask {
    pub const UDP: TransportMask = TransportMask(1 << 0);
    pub const UDP_MULTICAST: TransportMask = TransportMask(1 << 1);
    pub const TCP: TransportMask = TransportMask(1 << 2);
    pub const HTTP: TransportMask = TransportMask(1 << 3);
    pub const TLS: TransportMask = TransportMask(1 << 4);

    const ALL_BITS: u32 = 0b1_1111;

    pub const fn empty() -> Self {
        TransportMask(0)
    }

    pub const fn all() -> Self {
        TransportMask(Self::ALL_BITS)
    }

    /// Creates a mask from raw bits, rejecting bits outside the known transports.
    pub fn from_bits(bits: u32) -> Result<Self, InvalidTransportMask> {
        if bits & !Self::ALL_BITS != 0 {
            return Err(InvalidTransportMask::UnknownBits(bits & !Self::ALL_BITS));
        }

        Ok(TransportMask(bits))
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, transport: LowerTransport) -> bool {
        self.0 & transport.bit() != 0
    }

    /// The permitted transports in preference order.
    pub fn attempt_order(self) -> Vec<LowerTransport> {
        LowerTransport::PREFERENCE
            .iter()
            .copied()
            .filter(|transport| self.contains(*transport))
            .collect()
    }
}

/// Same default as `rtspsrc`: UDP unicast, UDP multicast and TCP.
impl Default for TransportMask {
    fn default() -> Self {
        TransportMask::UDP | TransportMask::UDP_MULTICAST | TransportMask::TCP
    }
}

impl ops::BitOr for TransportMask {
    type Output = TransportMask;

    fn bitor(self, rhs: Self) -> Self::Output {
        TransportMask(self.0 | rhs.0)
    }
}

impl ops::BitOrAssign for TransportMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl ops::BitAnd for TransportMask {
    type Output = TransportMask;

    fn bitand(self, rhs: Self) -> Self::Output {
        TransportMask(self.0 & rhs.0)
    }
}

impl From<LowerTransport> for TransportMask {
    fn from(transport: LowerTransport) -> Self {
        TransportMask(transport.bit())
    }
}

/// Formats as the `+`-joined nick list in preference order, e.g. `tls+tcp`.
impl fmt::Display for TransportMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for transport in self.attempt_order() {
            if !first {
                f.write_str("+")?;
            }
            first = false;
            f.write_str(transport.nick())?;
        }
        Ok(())
    }
}

impl fmt::Debug for TransportMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransportMask({:#x}: {})", self.0, self)
    }
}

impl FromStr for TransportMask {
    type Err = InvalidTransportMask;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut mask = TransportMask::empty();
        for nick in s.split(|c| c == '+' || c == '|' || c == ',') {
            let nick = nick.trim();
            if nick.is_empty() {
                continue;
            }

            let transport = LowerTransport::from_nick(&nick.to_ascii_lowercase())
                .ok_or_else(|| InvalidTransportMask::UnknownTransport(String::from(nick)))?;
            mask |= transport.into();
        }

        Ok(mask)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidTransportMask {
    UnknownBits(u32),
    UnknownTransport(String),
}

impl fmt::Display for InvalidTransportMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidTransportMask::UnknownBits(bits) => {
                write!(f, "Unknown transport bits {:#x}", bits)
            }
            InvalidTransportMask::UnknownTransport(nick) => {
                write!(f, "Unknown transport '{}'", nick)
            }
        }
    }
}

impl error::Error for InvalidTransportMask {}

/// Session parameters, immutable after construction.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SessionTuning {
    min_seek_step: Duration,
    latency: Duration,
}

impl SessionTuning {
    pub const DEFAULT_MIN_SEEK_STEP: Duration = Duration::from_millis(500);
    pub const DEFAULT_LATENCY: Duration = Duration::from_millis(200);

    pub const fn new(min_seek_step: Duration, latency: Duration) -> Self {
        SessionTuning {
            min_seek_step,
            latency,
        }
    }

    /// Seek requests closer than this to the previous seek target are coalesced.
    pub const fn min_seek_step(&self) -> Duration {
        self.min_seek_step
    }

    /// Time the source buffers before surfacing frames.
    pub const fn latency(&self) -> Duration {
        self.latency
    }
}

impl Default for SessionTuning {
    fn default() -> Self {
        SessionTuning::new(Self::DEFAULT_MIN_SEEK_STEP, Self::DEFAULT_LATENCY)
    }
}

/// Transport configuration handed to the pipeline engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportPolicy {
    mask: TransportMask,
    tuning: SessionTuning,
}

impl TransportPolicy {
    pub fn new(mask: TransportMask, tuning: SessionTuning) -> Self {
        TransportPolicy { mask, tuning }
    }

    pub fn mask(&self) -> TransportMask {
        self.mask
    }

    pub fn tuning(&self) -> &SessionTuning {
        &self.tuning
    }

    /// Transports the pipeline should attempt, in order.
    pub fn attempt_order(&self) -> Vec<LowerTransport> {
        self.mask.attempt_order()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tcp_and_tls_prefer_tls() {
        let mask = TransportMask::TCP | TransportMask::TLS;

        assert_eq!(
            mask.attempt_order(),
            vec![LowerTransport::Tls, LowerTransport::Tcp]
        );
        assert!(!mask.contains(LowerTransport::Http));
        assert!(!mask.contains(LowerTransport::Udp));
        assert!(!mask.contains(LowerTransport::UdpMulticast));
    }

    #[test]
    fn full_mask_follows_preference() {
        assert_eq!(
            TransportMask::all().attempt_order(),
            LowerTransport::PREFERENCE.to_vec()
        );
        assert!(TransportMask::empty().attempt_order().is_empty());
    }

    #[test]
    fn wire_bits() {
        assert_eq!(TransportMask::UDP.bits(), 1);
        assert_eq!(TransportMask::UDP_MULTICAST.bits(), 2);
        assert_eq!(TransportMask::TCP.bits(), 4);
        assert_eq!(TransportMask::HTTP.bits(), 8);
        assert_eq!(TransportMask::TLS.bits(), 16);
        assert_eq!(TransportMask::default().bits(), 7);
    }

    #[test]
    fn from_bits_validates_range() {
        assert_eq!(
            TransportMask::from_bits(4 | 16),
            Ok(TransportMask::TCP | TransportMask::TLS)
        );
        assert_eq!(TransportMask::from_bits(31), Ok(TransportMask::all()));
        assert_eq!(
            TransportMask::from_bits(32 | 1),
            Err(InvalidTransportMask::UnknownBits(32))
        );
    }

    #[test]
    fn nick_form() {
        let mask: TransportMask = "tcp+TLS".parse().unwrap();
        assert_eq!(mask, TransportMask::TCP | TransportMask::TLS);
        assert_eq!(mask.to_string(), "tls+tcp");

        assert_eq!(
            "udp | udp-mcast".parse::<TransportMask>(),
            Ok(TransportMask::UDP | TransportMask::UDP_MULTICAST)
        );
        assert_eq!(
            "tcp+quic".parse::<TransportMask>(),
            Err(InvalidTransportMask::UnknownTransport(String::from("quic")))
        );
        assert_eq!("".parse::<TransportMask>(), Ok(TransportMask::empty()));
    }

    #[test]
    fn tuning_defaults() {
        let tuning = SessionTuning::default();
        assert_eq!(tuning.min_seek_step(), Duration::from_millis(500));
        assert_eq!(tuning.latency(), Duration::from_millis(200));
    }
}
