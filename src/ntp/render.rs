// This file is part of ntp-probe.
// Copyright (c) 2019, Cloudflare. All rights reserved.
// See LICENSE for licensing information.

//! Human-readable rendering of a decoded packet.

use chrono::{TimeZone, Utc};

use std::fmt;
use std::net::Ipv4Addr;

use super::protocol::NtpPacket;
use super::timestamp::{ntp_to_utc, short_to_real};

const TIMESTAMP_FORMAT: &str = "%a, %d %b %Y %H:%M:%S UTC";

/// Renders a poll or precision exponent as `2^(-exponent)` followed by the raw exponent.
pub fn exponent_to_string(exponent: i8) -> String {
    format!("{:.6} ({})", 2f64.powi(-i32::from(exponent)), exponent)
}

/// Renders an NTP timestamp as a UTC calendar date, to the second.
pub fn timestamp_to_string(value: u64) -> String {
    let time = ntp_to_utc(value);
    match Utc.timestamp_opt(time.seconds, time.subsec_nanos()).single() {
        Some(date) => date.format(TIMESTAMP_FORMAT).to_string(),
        // Only reachable for values chrono can't represent, which era 0 never produces.
        None => format!("{} s since 1970", time.seconds),
    }
}

/// Renders a reference id as an IPv4 address, whatever the stratum.
///
/// A reference id that isn't 4 bytes long can only come from a hand-built packet; it is shown
/// as hex bytes.
pub fn reference_id_to_string(ref_id: &[u8]) -> String {
    match ref_id {
        [a, b, c, d] => Ipv4Addr::new(*a, *b, *c, *d).to_string(),
        _ => {
            let hex: Vec<String> = ref_id.iter().map(|byte| format!("{:02x}", byte)).collect();
            format!("0x[{}]", hex.join(" "))
        }
    }
}

impl fmt::Display for NtpPacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Version: {}", self.version)?;
        writeln!(f, "Leap: {}", self.leap)?;
        writeln!(f, "Mode: {}", self.mode)?;
        writeln!(f, "Stratum: {}", self.stratum)?;
        writeln!(f, "Poll: {}", exponent_to_string(self.poll))?;
        writeln!(f, "Precision: {}", exponent_to_string(self.precision))?;
        writeln!(f, "Root delay: {:.6}", short_to_real(self.root_delay))?;
        writeln!(f, "Root dispersion: {:.6}", short_to_real(self.root_dispersion))?;
        writeln!(f, "Reference ID: {}", reference_id_to_string(&self.ref_id))?;
        writeln!(f, "Reference Timestamp: {}", timestamp_to_string(self.ref_time))?;
        writeln!(f, "Origin Timestamp: {}", timestamp_to_string(self.origin))?;
        writeln!(f, "Receive Timestamp: {}", timestamp_to_string(self.receive))?;
        write!(f, "Transmit Timestamp: {}", timestamp_to_string(self.transmit))
    }
}
