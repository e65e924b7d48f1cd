use std::path::PathBuf;
use clap::Parser;

/// Swipe-to-wake and swipe-to-sleep for Linux touchscreens.
#[derive(Parser, Debug)]
pub struct Args {
    #[clap(short, long, action = clap::ArgAction::Count, help = "Verbose output, repeat for more")]
    pub verbose: u8,
    #[clap(short, long, help = "Path to configuration file")]
    pub config_file: Option<PathBuf>,
    #[clap(short, long, help = "Touchscreen event device, detected when omitted")]
    pub device: Option<PathBuf>,
    #[clap(long = "set", value_name = "NAME=VALUE", value_parser = parse_override, help = "Override a tunable, e.g. --set s2w_enabled=1")]
    pub overrides: Vec<(String, String)>,
}

fn parse_override(s: &str) -> Result<(String, String), String> {
    let (name, value) = s.split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", s))?;
    Ok((name.trim().to_string(), value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_overrides_and_verbosity() {
        let args = Args::try_parse_from(["swiped", "-vv", "--set", "s2w_enabled=1", "--set", "pwrkey_duration = 80"]).unwrap();
        assert_eq!(args.verbose, 2);
        assert_eq!(args.overrides, vec![
            ("s2w_enabled".to_string(), "1".to_string()),
            ("pwrkey_duration".to_string(), "80".to_string()),
        ]);
    }

    #[test]
    fn rejects_override_without_value() {
        assert!(Args::try_parse_from(["swiped", "--set", "debug"]).is_err());
    }
}
