use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;
use arc_swap::ArcSwap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureConfig {
    pub wake_enabled: bool,
    pub sleep_enabled: bool,
    pub debug_logging: bool,
    pub key_hold_ms: u32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            wake_enabled: false,
            sleep_enabled: true,
            debug_logging: false,
            key_hold_ms: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tunable {
    WakeEnabled,
    SleepEnabled,
    Debug,
    PwrkeyDuration,
}

impl Tunable {
    pub const ALL: [Tunable; 4] = [Self::WakeEnabled, Self::SleepEnabled, Self::Debug, Self::PwrkeyDuration];

    pub fn name(&self) -> &'static str {
        match self {
            Self::WakeEnabled => "s2w_enabled",
            Self::SleepEnabled => "s2s_enabled",
            Self::Debug => "debug",
            Self::PwrkeyDuration => "pwrkey_duration",
        }
    }

    fn max_value(&self) -> u64 {
        match self {
            Self::WakeEnabled | Self::SleepEnabled | Self::Debug => 1,
            Self::PwrkeyDuration => u32::MAX as u64,
        }
    }

    fn read(&self, config: &GestureConfig) -> u64 {
        match self {
            Self::WakeEnabled => config.wake_enabled as u64,
            Self::SleepEnabled => config.sleep_enabled as u64,
            Self::Debug => config.debug_logging as u64,
            Self::PwrkeyDuration => config.key_hold_ms as u64,
        }
    }

    // `value` has already been range checked against `max_value`.
    fn write(&self, config: &mut GestureConfig, value: u64) {
        match self {
            Self::WakeEnabled => config.wake_enabled = value != 0,
            Self::SleepEnabled => config.sleep_enabled = value != 0,
            Self::Debug => config.debug_logging = value != 0,
            Self::PwrkeyDuration => config.key_hold_ms = value as u32,
        }
    }
}

impl FromStr for Tunable {
    type Err = TunableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| TunableError::UnknownSetting(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TunableError {
    UnknownSetting(String),
    Invalid { name: &'static str, value: String },
    OutOfRange { name: &'static str, value: u64, max: u64 },
}

impl Display for TunableError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownSetting(name) => write!(f, "Unknown setting '{}'", name),
            Self::Invalid { name, value } => write!(f, "Invalid value {:?} for '{}'", value, name),
            Self::OutOfRange { name, value, max } => write!(f, "Value {} for '{}' is out of range (max {})", value, name, max),
        }
    }
}

impl std::error::Error for TunableError {}

/// Parses an unsigned integer the way the kernel's base-0 parser does: `0x` prefix for hex,
/// leading `0` for octal, decimal otherwise. A single trailing newline is accepted.
pub fn parse_unsigned(text: &str) -> Option<u64> {
    let text = text.strip_suffix('\n').unwrap_or(text);
    let text = text.strip_prefix('+').unwrap_or(text);

    let (digits, radix) = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        (hex, 16)
    } else if text.len() > 1 && text.starts_with('0') {
        (&text[1..], 8)
    } else {
        (text, 10)
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    u64::from_str_radix(digits, radix).ok()
}

/// Named read/write access to the live [`GestureConfig`]. Readers take lock-free snapshots;
/// a successful write takes effect on the next classification pass.
#[derive(Debug)]
pub struct Tunables {
    current: ArcSwap<GestureConfig>,
}

impl Default for Tunables {
    fn default() -> Self {
        Self::new(GestureConfig::default())
    }
}

impl Tunables {
    pub fn new(initial: GestureConfig) -> Self {
        Self { current: ArcSwap::from_pointee(initial) }
    }

    pub fn snapshot(&self) -> Arc<GestureConfig> {
        self.current.load_full()
    }

    pub fn get(&self, name: &str) -> Result<String, TunableError> {
        let tunable = name.parse::<Tunable>()?;
        Ok(format!("{}\n", tunable.read(&self.current.load())))
    }

    /// Every tunable as `name=value`, in a fixed order.
    pub fn describe(&self) -> String {
        Tunable::ALL.iter()
            .filter_map(|t| self.get(t.name()).ok().map(|v| format!("{}={}", t.name(), v.trim_end())))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Rejected writes leave the previous value in place.
    pub fn set(&self, name: &str, text: &str) -> Result<(), TunableError> {
        let tunable = name.parse::<Tunable>()?;
        let value = parse_unsigned(text).ok_or_else(|| TunableError::Invalid {
            name: tunable.name(),
            value: text.to_string(),
        })?;
        if value > tunable.max_value() {
            return Err(TunableError::OutOfRange { name: tunable.name(), value, max: tunable.max_value() });
        }

        self.current.rcu(|config| {
            let mut next = **config;
            tunable.write(&mut next, value);
            next
        });
        log::debug!("Set {} = {}", tunable.name(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let tunables = Tunables::default();
        assert_eq!(tunables.get("s2w_enabled").unwrap(), "0\n");
        assert_eq!(tunables.get("s2s_enabled").unwrap(), "1\n");
        assert_eq!(tunables.get("debug").unwrap(), "0\n");
        assert_eq!(tunables.get("pwrkey_duration").unwrap(), "60\n");
    }

    #[test]
    fn describe_reads_every_setting_by_name() {
        let tunables = Tunables::default();
        assert_eq!(tunables.describe(), "s2w_enabled=0 s2s_enabled=1 debug=0 pwrkey_duration=60");

        tunables.set("debug", "1").unwrap();
        assert_eq!(tunables.describe(), "s2w_enabled=0 s2s_enabled=1 debug=1 pwrkey_duration=60");
    }

    #[test]
    fn set_updates_snapshot() {
        let tunables = Tunables::default();
        tunables.set("s2w_enabled", "1\n").unwrap();
        tunables.set("pwrkey_duration", "0x20").unwrap();

        let config = tunables.snapshot();
        assert!(config.wake_enabled);
        assert_eq!(config.key_hold_ms, 32);
    }

    #[test]
    fn rejected_writes_keep_previous_value() {
        let tunables = Tunables::default();

        assert_eq!(
            tunables.set("s2s_enabled", "2"),
            Err(TunableError::OutOfRange { name: "s2s_enabled", value: 2, max: 1 })
        );
        assert_eq!(
            tunables.set("pwrkey_duration", "fast"),
            Err(TunableError::Invalid { name: "pwrkey_duration", value: "fast".to_string() })
        );
        assert!(matches!(
            tunables.set("pwrkey_duration", "4294967296"),
            Err(TunableError::OutOfRange { .. })
        ));
        assert_eq!(
            tunables.set("doubletap", "1"),
            Err(TunableError::UnknownSetting("doubletap".to_string()))
        );

        assert_eq!(*tunables.snapshot(), GestureConfig::default());
    }

    #[test]
    fn parses_like_kernel_base_zero() {
        assert_eq!(parse_unsigned("60"), Some(60));
        assert_eq!(parse_unsigned("60\n"), Some(60));
        assert_eq!(parse_unsigned("0"), Some(0));
        assert_eq!(parse_unsigned("010"), Some(8));
        assert_eq!(parse_unsigned("0xff"), Some(255));
        assert_eq!(parse_unsigned("+5"), Some(5));
        assert_eq!(parse_unsigned(""), None);
        assert_eq!(parse_unsigned("-1"), None);
        assert_eq!(parse_unsigned("09"), None);
        assert_eq!(parse_unsigned("0x"), None);
        assert_eq!(parse_unsigned("1\n\n"), None);
    }
}
