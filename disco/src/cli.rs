// disco/src/cli.rs

use clap::Parser;
use std::path::PathBuf;

/// Default agent configuration file, under the same well-known directory
/// the image build drops rule and schema files into.
pub const DEFAULT_CONF: &str = "/etc/disco/disco.conf";

#[derive(Parser)]
#[command(name = "disco")]
#[command(version)]
#[command(about = "Reactive container configuration agent", long_about = None)]
pub struct Cli {
    /// Log level filter (error, warn, info, debug, trace)
    #[arg(short = 'l', long = "log-level", default_value = "info")]
    pub log_level: String,

    /// Agent configuration file (YAML)
    #[arg(short = 'c', long = "conf", default_value = DEFAULT_CONF)]
    pub conf: PathBuf,

    /// Payload command the agent execs once the container is configured
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true, num_args = 1..)]
    pub cmd: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults() {
        let args = Cli::parse_from(["disco", "/usr/bin/myapp"]);
        assert_eq!(args.log_level, "info");
        assert_eq!(args.conf.to_string_lossy(), DEFAULT_CONF);
        assert_eq!(args.cmd, ["/usr/bin/myapp"]);
    }

    #[test]
    fn test_parse_payload_with_args() {
        let args = Cli::parse_from(["disco", "-l", "debug", "myapp", "--port", "8080"]);
        assert_eq!(args.log_level, "debug");
        assert_eq!(args.cmd, ["myapp", "--port", "8080"]);
    }

    #[test]
    fn test_parse_custom_conf() {
        let args = Cli::parse_from(["disco", "-c", "/tmp/agent.conf", "myapp"]);
        assert_eq!(args.conf.to_string_lossy(), "/tmp/agent.conf");
    }

    #[test]
    fn test_payload_command_is_required() {
        assert!(Cli::try_parse_from(["disco"]).is_err());
    }
}
