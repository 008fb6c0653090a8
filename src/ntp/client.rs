// This file is part of ntp-probe.
// Copyright (c) 2019, Cloudflare. All rights reserved.
// See LICENSE for licensing information.

//! One-shot NTP query over UDP.

use slog::{debug, warn};

use std::error::Error;
use std::fmt;
use std::io::{self, Write};
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::num::ParseIntError;
use std::time::Duration;

use super::protocol::{
    build_request, decode, encode, DecodeError, EncodeError, LeapState, NtpPacket, PacketMode,
};

use crate::config::ClientConfig;

use self::ClientError::*;

pub const DEFAULT_NTP_PORT: u16 = 123;
const BUFF_SIZE: usize = 64 * 1024;

#[derive(Debug)]
pub enum ClientError {
    NoIpv4AddrFound,
    /// No reply arrived within the per-attempt timeout.
    Timeout,
    /// Every attempt timed out.
    Exhausted { attempts: u32 },
    Encode(EncodeError),
    Decode(DecodeError),
    Io(io::Error),
}

impl Error for ClientError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Encode(err) => Some(err),
            Decode(err) => Some(err),
            Io(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NoIpv4AddrFound => write!(f, "IPv4 address of the server could not be resolved"),
            Timeout => write!(f, "timed out waiting for a reply"),
            Exhausted { attempts } => write!(f, "no reply after {} attempt(s)", attempts),
            Encode(err) => write!(f, "cannot encode request: {}", err),
            Decode(err) => write!(f, "cannot decode reply: {}", err),
            Io(err) => write!(f, "socket error: {}", err),
        }
    }
}

impl From<EncodeError> for ClientError {
    fn from(err: EncodeError) -> ClientError {
        Encode(err)
    }
}

impl From<DecodeError> for ClientError {
    fn from(err: DecodeError) -> ClientError {
        Decode(err)
    }
}

impl From<io::Error> for ClientError {
    fn from(err: io::Error) -> ClientError {
        match err.kind() {
            // Unix reports an expired read timeout as `WouldBlock`, Windows as `TimedOut`.
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => Timeout,
            _ => Io(err),
        }
    }
}

/// Split `host[:port]` into its parts. The port defaults to 123.
pub fn parse_source(source: &str) -> Result<(String, u16), ParseIntError> {
    let mut chunks = source.splitn(2, ':');
    let host = chunks.next().unwrap_or_default();
    let port = match chunks.next() {
        Some(port) => port.parse::<u16>()?,
        None => DEFAULT_NTP_PORT,
    };
    Ok((String::from(host), port))
}

/// Resolve the server to its first IPv4 address.
pub fn resolve_server(host: &str, port: u16) -> Result<SocketAddr, ClientError> {
    let mut ip_addrs = (host, port).to_socket_addrs()?;
    ip_addrs.find(|addr| addr.is_ipv4()).ok_or(NoIpv4AddrFound)
}

/// Send one request and wait for one reply.
///
/// The socket lives only for this exchange and is closed on every return path.
pub fn query_once(
    logger: &slog::Logger,
    addr: SocketAddr,
    request: &[u8],
    timeout: Duration,
) -> Result<NtpPacket, ClientError> {
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.set_read_timeout(Some(timeout))?;

    socket.send_to(request, addr)?;
    debug!(logger, "transmitting packet"; "server" => %addr, "bytes" => request.len());

    let mut buff = vec![0; BUFF_SIZE];
    let (size, origin) = socket.recv_from(&mut buff)?;
    debug!(logger, "received packet"; "from" => %origin, "bytes" => size);

    Ok(decode(&buff[..size])?)
}

fn check_reply(logger: &slog::Logger, packet: &NtpPacket) {
    if packet.packet_mode() != PacketMode::Server {
        warn!(logger, "reply is not in server mode"; "mode" => ?packet.packet_mode());
    }
    if packet.leap_state() == LeapState::Unknown {
        warn!(logger, "server clock is unsynchronized"; "stratum" => packet.stratum);
    }
}

/// Query the configured server, retrying on timeouts.
///
/// A line is written to `notices` for every attempt that times out. Any other failure ends the
/// query immediately; only a server that never answers yields `Exhausted`.
pub fn run_ntp_client<W: Write>(
    logger: &slog::Logger,
    config: &ClientConfig,
    notices: &mut W,
) -> Result<NtpPacket, ClientError> {
    let addr = resolve_server(&config.host, config.port)?;
    debug!(logger, "resolved server"; "host" => &config.host, "addr" => %addr);

    let request = encode(&build_request(config.version))?;

    for attempt in 1..=config.attempts {
        match query_once(logger, addr, &request, config.timeout) {
            Err(Timeout) => {
                warn!(logger, "no reply within timeout";
                      "attempt" => attempt, "timeout" => ?config.timeout);
                writeln!(notices, "Attempt {} failed", attempt)?;
            }
            Err(err) => return Err(err),
            Ok(packet) => {
                check_reply(logger, &packet);
                return Ok(packet);
            }
        }
    }

    Err(Exhausted {
        attempts: config.attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ntp::protocol::HEADER_SIZE;

    use std::thread;

    fn test_logger() -> slog::Logger {
        slog::Logger::root(slog::Discard, slog::o!())
    }

    fn config_for(addr: SocketAddr, attempts: u32) -> ClientConfig {
        ClientConfig {
            host: addr.ip().to_string(),
            port: addr.port(),
            version: 4,
            timeout: Duration::from_millis(200),
            attempts,
        }
    }

    /// Answers requests with a server-mode copy of the request. Requests numbered in `ignore`
    /// (counting from 1) are read and left unanswered.
    fn spawn_responder(
        ignore: Vec<usize>,
        reply_len: usize,
    ) -> (SocketAddr, thread::JoinHandle<usize>) {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        let addr = socket.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let mut seen = 0;
            let mut buff = [0; 512];
            while let Ok((size, peer)) = socket.recv_from(&mut buff) {
                seen += 1;
                if ignore.contains(&seen) {
                    continue;
                }
                let mut reply = decode(&buff[..size]).unwrap();
                reply.mode = PacketMode::Server as u8;
                reply.stratum = 2;
                reply.origin = reply.transmit;
                let mut wire = encode(&reply).unwrap().to_vec();
                wire.resize(reply_len, 0);
                socket.send_to(&wire, peer).unwrap();
                break;
            }
            seen
        });
        (addr, handle)
    }

    #[test]
    fn test_parse_source() {
        assert_eq!(parse_source("pool.ntp.org").unwrap(), (String::from("pool.ntp.org"), 123));
        assert_eq!(parse_source("127.0.0.1:1123").unwrap(), (String::from("127.0.0.1"), 1123));
        assert!(parse_source("127.0.0.1:ntp").is_err());
        assert!(parse_source("127.0.0.1:70000").is_err());
    }

    #[test]
    fn test_resolve_picks_ipv4() {
        let addr = resolve_server("127.0.0.1", 123).unwrap();
        assert_eq!(addr, "127.0.0.1:123".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn test_single_exchange() {
        let (addr, handle) = spawn_responder(vec![], HEADER_SIZE);
        let mut notices = Vec::new();
        let packet = run_ntp_client(&test_logger(), &config_for(addr, 1), &mut notices).unwrap();
        assert_eq!(handle.join().unwrap(), 1);
        assert!(notices.is_empty());
        assert_eq!(packet.version, 4);
        assert_eq!(packet.packet_mode(), PacketMode::Server);
        assert_eq!(packet.stratum, 2);
        assert_eq!(packet.origin, packet.transmit);
    }

    #[test]
    fn test_retry_after_timeout() {
        let (addr, handle) = spawn_responder(vec![1], HEADER_SIZE);
        let mut notices = Vec::new();
        let packet = run_ntp_client(&test_logger(), &config_for(addr, 3), &mut notices).unwrap();
        assert_eq!(handle.join().unwrap(), 2);
        assert_eq!(packet.stratum, 2);
        assert_eq!(String::from_utf8(notices).unwrap(), "Attempt 1 failed\n");
    }

    #[test]
    fn test_exhausted() {
        let (addr, handle) = spawn_responder(vec![1, 2], HEADER_SIZE);
        let mut notices = Vec::new();
        match run_ntp_client(&test_logger(), &config_for(addr, 2), &mut notices) {
            Err(Exhausted { attempts }) => assert_eq!(attempts, 2),
            other => panic!("expected exhaustion, got {:?}", other),
        }
        assert_eq!(
            String::from_utf8(notices).unwrap(),
            "Attempt 1 failed\nAttempt 2 failed\n"
        );
        drop(handle);
    }

    #[test]
    fn test_short_reply_is_not_retried() {
        let (addr, handle) = spawn_responder(vec![], 20);
        let mut notices = Vec::new();
        match run_ntp_client(&test_logger(), &config_for(addr, 3), &mut notices) {
            Err(Decode(DecodeError::Truncated { length })) => assert_eq!(length, 20),
            other => panic!("expected a decode error, got {:?}", other),
        }
        assert_eq!(handle.join().unwrap(), 1);
        assert!(notices.is_empty());
    }

    #[test]
    fn test_timeout_mapping() {
        let err = ClientError::from(io::Error::from(io::ErrorKind::WouldBlock));
        assert!(matches!(err, Timeout));
        let err = ClientError::from(io::Error::from(io::ErrorKind::ConnectionRefused));
        assert!(matches!(err, Io(_)));
    }
}
