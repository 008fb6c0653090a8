// This file is part of ntp-probe.
// Copyright (c) 2019, Cloudflare. All rights reserved.
// See LICENSE for licensing information.

//! NTP packet header codec.

use byteorder::{BigEndian, ByteOrder};
use log::trace;

use std::error::Error;
use std::fmt;

use super::timestamp::{utc_to_ntp, UnixTime};

use self::LeapState::*;
use self::PacketMode::*;

pub const HEADER_SIZE: usize = 48;
pub const NTP_CURRENT_VERSION: u8 = 4;
/// Stratum 16 means unsynchronized.
pub const STRATUM_UNSYNCHRONIZED: u8 = 16;

const REF_ID_SIZE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeapState {
    NoLeap = 0,
    Positive = 1,
    Negative = 2,
    Unknown = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketMode {
    Reserved = 0,
    SymmetricActive = 1,
    SymmetricPassive = 2,
    Client = 3, // We send Mode 3 packets and recieve Mode 4. Check the errata on 5905!
    Server = 4,
    Broadcast = 5,
    Control = 6,
    Private = 7,
}

impl LeapState {
    pub fn from_bits(bits: u8) -> LeapState {
        match bits & 0x03 {
            0 => NoLeap,
            1 => Positive,
            2 => Negative,
            _ => Unknown,
        }
    }
}

impl PacketMode {
    pub fn from_bits(bits: u8) -> PacketMode {
        match bits & 0x07 {
            0 => Reserved,
            1 => SymmetricActive,
            2 => SymmetricPassive,
            3 => Client,
            4 => Server,
            5 => Broadcast,
            6 => Control,
            _ => Private,
        }
    }
}

/// Header of an NTP packet.
/// See RFC 5905 for meaning of these fields.
///
/// The bitpacked fields are kept as raw numbers so that every header received from the network
/// can be written back unchanged. Use [`NtpPacket::leap_state`] and [`NtpPacket::packet_mode`]
/// for the interpreted values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NtpPacket {
    pub leap: u8,
    pub version: u8,
    pub mode: u8,
    pub stratum: u8,
    pub poll: i8,
    pub precision: i8,
    /// NTP short format (16.16).
    pub root_delay: u32,
    /// NTP short format (16.16).
    pub root_dispersion: u32,
    /// Must be exactly 4 bytes to be encodable.
    pub ref_id: Vec<u8>,
    pub ref_time: u64,
    pub origin: u64,
    pub receive: u64,
    pub transmit: u64,
}

impl Default for NtpPacket {
    fn default() -> NtpPacket {
        NtpPacket {
            leap: NoLeap as u8,
            version: NTP_CURRENT_VERSION,
            mode: Client as u8,
            stratum: STRATUM_UNSYNCHRONIZED,
            poll: 0,
            precision: 0,
            root_delay: 0,
            root_dispersion: 0,
            ref_id: vec![0; REF_ID_SIZE],
            ref_time: 0,
            origin: 0,
            receive: 0,
            transmit: 0,
        }
    }
}

impl NtpPacket {
    pub fn leap_state(&self) -> LeapState {
        LeapState::from_bits(self.leap)
    }

    pub fn packet_mode(&self) -> PacketMode {
        PacketMode::from_bits(self.mode)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// The reference identifier has the given length instead of 4 bytes.
    ReferenceIdLength(usize),
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EncodeError::ReferenceIdLength(len) => write!(
                f,
                "reference id must be {} bytes long, got {}",
                REF_ID_SIZE, len
            ),
        }
    }
}

impl Error for EncodeError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The buffer is shorter than an NTP header.
    Truncated { length: usize },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DecodeError::Truncated { length } => write!(
                f,
                "packet too short: got {} bytes, an NTP header needs {}",
                length, HEADER_SIZE
            ),
        }
    }
}

impl Error for DecodeError {}

/// The first byte packs 3 fields in.
/// See RFC 5905 Figure 8.
fn create_first(leap: u8, version: u8, mode: u8) -> u8 {
    ((leap & 0x03) << 6) | ((version & 0x07) << 3) | (mode & 0x07)
}

fn parse_first(first: u8) -> (u8, u8, u8) {
    (first >> 6, (first >> 3) & 0x07, first & 0x07)
}

/// Serialize a packet into the 48-byte wire format.
pub fn encode(packet: &NtpPacket) -> Result<[u8; HEADER_SIZE], EncodeError> {
    if packet.ref_id.len() != REF_ID_SIZE {
        return Err(EncodeError::ReferenceIdLength(packet.ref_id.len()));
    }

    let mut buff = [0; HEADER_SIZE];
    buff[0] = create_first(packet.leap, packet.version, packet.mode);
    buff[1] = packet.stratum;
    buff[2] = packet.poll as u8;
    buff[3] = packet.precision as u8;
    BigEndian::write_u32(&mut buff[4..8], packet.root_delay);
    BigEndian::write_u32(&mut buff[8..12], packet.root_dispersion);
    buff[12..16].copy_from_slice(&packet.ref_id);
    BigEndian::write_u64(&mut buff[16..24], packet.ref_time);
    BigEndian::write_u64(&mut buff[24..32], packet.origin);
    BigEndian::write_u64(&mut buff[32..40], packet.receive);
    BigEndian::write_u64(&mut buff[40..48], packet.transmit);
    Ok(buff)
}

/// Extract an NTP packet from the start of `data`.
///
/// Anything after the first 48 bytes (extension fields, a legacy MAC) is ignored.
pub fn decode(data: &[u8]) -> Result<NtpPacket, DecodeError> {
    if data.len() < HEADER_SIZE {
        return Err(DecodeError::Truncated { length: data.len() });
    }
    if data.len() > HEADER_SIZE {
        trace!("ignoring {} bytes after the NTP header", data.len() - HEADER_SIZE);
    }

    let (leap, version, mode) = parse_first(data[0]);
    Ok(NtpPacket {
        leap,
        version,
        mode,
        stratum: data[1],
        poll: data[2] as i8,
        precision: data[3] as i8,
        root_delay: BigEndian::read_u32(&data[4..8]),
        root_dispersion: BigEndian::read_u32(&data[8..12]),
        ref_id: data[12..16].to_vec(),
        ref_time: BigEndian::read_u64(&data[16..24]),
        origin: BigEndian::read_u64(&data[24..32]),
        receive: BigEndian::read_u64(&data[32..40]),
        transmit: BigEndian::read_u64(&data[40..48]),
    })
}

/// Build a client request stamped with the current time.
pub fn build_request(version: u8) -> NtpPacket {
    build_request_at(version, UnixTime::now())
}

/// Build a client request stamped with `now`.
pub fn build_request_at(version: u8, now: UnixTime) -> NtpPacket {
    NtpPacket {
        version,
        mode: Client as u8,
        transmit: utc_to_ntp(now),
        ..NtpPacket::default()
    }
}
