//! Command-line argument parsing for the client binary.
//!
//! Usage: `client <from_filename> <to_filename> <window_size> <buffer_size>
//! <error_rate> <remote_host> <remote_port> [-d]`

use std::net::{SocketAddr, ToSocketAddrs};

pub struct Cli {
    pub from_filename: String,
    pub to_filename: String,
    pub window_size: u32,
    pub buffer_size: u32,
    pub error_rate: f64,
    pub remote_addr: SocketAddr,
    pub debug: bool,
}

const USAGE: &str = "client <from_filename> <to_filename> <window_size> <buffer_size> <error_rate> <remote_host> <remote_port> [-d]";

pub fn parse_args() -> Result<Cli, String> {
    let mut args: Vec<String> = std::env::args().skip(1).collect();

    let debug = if let Some(pos) = args.iter().position(|a| a == "-d") {
        args.remove(pos);
        true
    } else {
        false
    };

    if args.len() != 7 {
        return Err(format!("usage: {USAGE}"));
    }

    let from_filename = args[0].clone();
    let to_filename = args[1].clone();
    let window_size: u32 = args[2].parse().map_err(|_| "window_size must be a positive integer".to_string())?;
    let buffer_size: u32 = args[3].parse().map_err(|_| "buffer_size must be a positive integer".to_string())?;
    let error_rate: f64 = args[4].parse().map_err(|_| "error_rate must be a number between 0 and 1".to_string())?;
    let remote_host = &args[5];
    let remote_port: u16 = args[6].parse().map_err(|_| "remote_port must be a 16-bit integer".to_string())?;

    let remote_addr = (remote_host.as_str(), remote_port)
        .to_socket_addrs()
        .map_err(|e| format!("could not resolve {remote_host}:{remote_port}: {e}"))?
        .next()
        .ok_or_else(|| format!("{remote_host}:{remote_port} resolved to no addresses"))?;

    Ok(Cli {
        from_filename,
        to_filename,
        window_size,
        buffer_size,
        error_rate,
        remote_addr,
        debug,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_string_lists_every_positional_argument() {
        assert!(USAGE.contains("from_filename"));
        assert!(USAGE.contains("remote_port"));
    }
}
