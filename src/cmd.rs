// This file is part of ntp-probe.
// Copyright (c) 2019, Cloudflare. All rights reserved.
// See LICENSE for licensing information.

//! Command line argument definitions and validations.

use clap::{App, Arg};

/// Create the whole command-line configuration.
pub fn create_clap_command() -> App<'static, 'static> {
    let args = [
        // The server is always required and will immediately follow the program name.
        Arg::with_name("source").index(1).required(true)
            .help("Source server address, as host or host:port. The default port is 123."),

        // The rest will be passed as unrequired command-line options. Their defaults live in
        // the config module so that a configuration file can change them.
        //
        // `--version` belongs to clap, so the protocol version gets its own long name.
        Arg::with_name("ntp_version").long("ntp-version").short("v")
            .takes_value(true).value_name("N")
            .help("NTP version to be used (default 4)"),
        Arg::with_name("timeout").long("timeout").short("t")
            .takes_value(true).value_name("SECONDS")
            .help("Communication timeout in seconds (default 1)"),
        Arg::with_name("attempts").long("attempts").short("a")
            .takes_value(true).value_name("N")
            .help("Maximum communication attempts (default 1)"),
        Arg::with_name("configfile").long("file").short("f")
            .takes_value(true).value_name("PATH")
            .help("Specifies a path to a configuration file with defaults for the options \
                   above (keys: version, timeout, attempts)"),
        Arg::with_name("debug").long("debug").short("d")
            .help("Turns on debug logging"),
    ];

    App::new(env!("CARGO_PKG_NAME"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .args(&args)
}
