// This file is part of ntp-probe.
// Copyright (c) 2019, Cloudflare. All rights reserved.
// See LICENSE for licensing information.

//! NTP fixed-point formats.
//!
//! An NTP timestamp is a 32.32 fixed-point count of seconds since 1900-01-01 and an NTP short
//! value is a 16.16 fixed-point interval. See RFC 5905 Figure 3.
//!
//! Converting timestamps through `f64` loses about ten fractional bits at present-day
//! magnitudes, so wall-clock time is carried as [`UnixTime`], which has the same 32-bit binary
//! fraction as the wire format.

use std::time::{SystemTime, UNIX_EPOCH};

/// These numbers are from RFC 5905
pub const UNIX_OFFSET: u64 = 2_208_988_800;
/// TWO_POW_32 is a floating point power of two (2**32)
pub const TWO_POW_32: f64 = 4294967296.0;
/// TWO_POW_16 is a floating point power of two (2**16)
pub const TWO_POW_16: f64 = 65536.0;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// A point in time relative to the Unix epoch with a resolution of 2^-32 seconds.
///
/// `seconds` is floored, so `fraction` is always the non-negative part:
/// -0.25 is `{ seconds: -1, fraction: 0xC000_0000 }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct UnixTime {
    pub seconds: i64,
    pub fraction: u32,
}

impl UnixTime {
    pub const EPOCH: UnixTime = UnixTime {
        seconds: 0,
        fraction: 0,
    };

    pub fn new(seconds: i64, fraction: u32) -> UnixTime {
        UnixTime { seconds, fraction }
    }

    /// Current wall-clock time.
    pub fn now() -> UnixTime {
        UnixTime::from(SystemTime::now())
    }

    /// Converts a real number of seconds, rounding to the nearest 2^-32 s.
    ///
    /// Multiplying by a power of two is exact in binary floating point, so the only rounding
    /// step is the final one. NaN maps to the epoch and infinities saturate.
    pub fn from_secs_f64(secs: f64) -> UnixTime {
        UnixTime::from_scaled((secs * TWO_POW_32).round() as i128)
    }

    /// Fractional part in nanoseconds, rounded to nearest and capped below one second.
    pub fn subsec_nanos(&self) -> u32 {
        let nanos = (u128::from(self.fraction) * NANOS_PER_SEC + (1 << 31)) >> 32;
        nanos.min(NANOS_PER_SEC - 1) as u32
    }

    fn scaled(&self) -> i128 {
        (i128::from(self.seconds) << 32) | i128::from(self.fraction)
    }

    fn from_scaled(scaled: i128) -> UnixTime {
        let seconds = scaled >> 32;
        let seconds = if seconds > i128::from(i64::MAX) {
            i64::MAX
        } else if seconds < i128::from(i64::MIN) {
            i64::MIN
        } else {
            seconds as i64
        };
        UnixTime {
            seconds,
            fraction: (scaled & 0xFFFF_FFFF) as u32,
        }
    }
}

impl From<SystemTime> for UnixTime {
    fn from(time: SystemTime) -> UnixTime {
        // Clocks set before 1970 are still representable, just on the other side of zero.
        let (negative, since) = match time.duration_since(UNIX_EPOCH) {
            Ok(since) => (false, since),
            Err(err) => (true, err.duration()),
        };
        let nanos = u128::from(since.as_secs()) * NANOS_PER_SEC + u128::from(since.subsec_nanos());
        let scaled = ((nanos << 32) + NANOS_PER_SEC / 2) / NANOS_PER_SEC;
        let scaled = scaled as i128;
        UnixTime::from_scaled(if negative { -scaled } else { scaled })
    }
}

/// Encodes a Unix time as an NTP timestamp.
///
/// Times after 2036-02-07 wrap into the next NTP era, as on the wire.
pub fn utc_to_ntp(time: UnixTime) -> u64 {
    let offset = i128::from(UNIX_OFFSET) << 32;
    (time.scaled() + offset) as u64
}

/// Decodes an NTP timestamp, assuming era 0 (1900-2036).
pub fn ntp_to_utc(value: u64) -> UnixTime {
    let offset = i128::from(UNIX_OFFSET) << 32;
    UnixTime::from_scaled(i128::from(value) - offset)
}

/// Decodes an NTP short value (16.16) into seconds.
pub fn short_to_real(value: u32) -> f64 {
    f64::from(value) / TWO_POW_16
}
