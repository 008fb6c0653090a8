// This file is part of ntp-probe.
// Copyright (c) 2019, Cloudflare. All rights reserved.
// See LICENSE for licensing information.

//! NTP wire format and client.

pub mod client;
pub mod protocol;
pub mod render;
pub mod timestamp;
