// This file is part of ntp-probe.
// Copyright (c) 2019, Cloudflare. All rights reserved.
// See LICENSE for licensing information.

use slog::debug;
use sloggers::terminal::{Destination, TerminalLoggerBuilder};
use sloggers::types::Severity;
use sloggers::Build;

use std::io;
use std::process;

use ntp_probe::cmd::create_clap_command;
use ntp_probe::{run_ntp_client, ClientConfig, ClientError};

/// Exit status for a configuration that can't be used.
const EXIT_CONFIG: i32 = 2;

fn create_logger<'a>(matches: &clap::ArgMatches<'a>) -> slog::Logger {
    let mut builder = TerminalLoggerBuilder::new();
    builder.destination(Destination::Stderr);

    // If the debug flag is set, print all the debug messages.
    if matches.is_present("debug") {
        builder.level(Severity::Debug);
    } else {
        builder.level(Severity::Info);
    }

    // According to `sloggers-0.3.4` source code, the function doesn't return an error at all.
    // There should be no problem unwrapping here.
    builder
        .build()
        .expect("BUG: TerminalLoggerBuilder::build shouldn't return an error.")
}

fn main() {
    let matches = create_clap_command().get_matches();

    let logger = create_logger(&matches);
    // After calling this, slog_scope::logger() will return a clone of `logger`. The guard has
    // to stay alive until the end of `main`.
    let _scope_guard = slog_scope::set_global_logger(logger.clone());
    // Records emitted through the `log` crate go to the same place.
    if let Err(err) = slog_stdlog::init() {
        eprintln!("cannot forward `log` records: {}", err);
    }

    let config = match ClientConfig::from_matches(&matches) {
        Ok(val) => val,
        Err(err) => {
            eprintln!("{}", err);
            process::exit(EXIT_CONFIG);
        }
    };
    debug!(logger, "querying server"; "config" => ?config);

    match run_ntp_client(&logger, &config, &mut io::stdout()) {
        Ok(packet) => println!("{}", packet),
        // Not hearing back is an answer too; it isn't a failure of the program.
        Err(ClientError::Exhausted { .. }) => println!("Failed to receive packet"),
        Err(err) => {
            eprintln!("failure of client: {}", err);
            process::exit(1);
        }
    }
}
