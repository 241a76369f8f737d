//! Command-line argument parsing for the server binary.
//!
//! Usage: `server <error_rate> [port] [-d]` — port 0 or omitted lets the
//! OS assign the parent listening port (logged on startup).

pub struct Cli {
    pub error_rate: f64,
    pub port: u16,
    pub debug: bool,
}

const USAGE: &str = "server <error_rate> [port] [-d]";

pub fn parse_args() -> Result<Cli, String> {
    let mut args: Vec<String> = std::env::args().skip(1).collect();

    let debug = if let Some(pos) = args.iter().position(|a| a == "-d") {
        args.remove(pos);
        true
    } else {
        false
    };

    if args.is_empty() || args.len() > 2 {
        return Err(format!("usage: {USAGE}"));
    }

    let error_rate: f64 = args[0]
        .parse()
        .map_err(|_| "error_rate must be a number between 0 and 1".to_string())?;

    let port: u16 = match args.get(1) {
        Some(raw) => raw.parse().map_err(|_| "port must be a 16-bit integer".to_string())?,
        None => 0,
    };

    Ok(Cli {
        error_rate,
        port,
        debug,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_string_mentions_error_rate() {
        assert!(USAGE.contains("error_rate"));
    }
}
