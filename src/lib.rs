// This file is part of ntp-probe.
// Copyright (c) 2019, Cloudflare. All rights reserved.
// See LICENSE for licensing information.

pub mod cmd;
pub mod config;
pub mod ntp;

pub use self::config::ClientConfig;
pub use self::ntp::client::{run_ntp_client, ClientError};
pub use self::ntp::protocol::{build_request, decode, encode, NtpPacket};
