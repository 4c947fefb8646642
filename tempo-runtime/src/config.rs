use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Unit that cumulative times are reported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeUnit {
    Nanos,
    Micros,
    #[default]
    Millis,
    Secs,
}

impl TimeUnit {
    /// Express `d` in this unit.
    pub fn convert(self, d: Duration) -> f64 {
        let nanos = d.as_nanos() as f64;
        match self {
            TimeUnit::Nanos => nanos,
            TimeUnit::Micros => nanos / 1_000.0,
            TimeUnit::Millis => nanos / 1_000_000.0,
            TimeUnit::Secs => nanos / 1_000_000_000.0,
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            TimeUnit::Nanos => "ns",
            TimeUnit::Micros => "us",
            TimeUnit::Millis => "ms",
            TimeUnit::Secs => "s",
        }
    }

    /// Render `d` with two decimals and the unit suffix, e.g. `12.50ms`.
    pub fn format(self, d: Duration) -> String {
        format!("{:.2}{}", self.convert(d), self.suffix())
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

impl FromStr for TimeUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ns" | "nanos" => Ok(TimeUnit::Nanos),
            "us" | "micros" => Ok(TimeUnit::Micros),
            "ms" | "millis" => Ok(TimeUnit::Millis),
            "s" | "secs" => Ok(TimeUnit::Secs),
            other => Err(format!("unknown time unit '{other}' (expected ns, us, ms or s)")),
        }
    }
}

/// Runtime switches consulted by the tracker on every enter/leave.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Config {
    /// Emit a trace line for every instrumented enter and leave.
    pub real_time_logging: bool,
    pub time_unit: TimeUnit,
}

impl Config {
    /// Defaults overlaid with `TEMPO_REAL_TIME` and `TEMPO_TIME_UNIT`.
    ///
    /// Unparseable values are ignored with a warning rather than failing, so a
    /// typo in the environment never prevents the instrumented program from
    /// starting.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(raw) = std::env::var("TEMPO_REAL_TIME") {
            match parse_flag(&raw) {
                Some(on) => self.real_time_logging = on,
                None => tracing::warn!(value = %raw, "ignoring unparseable TEMPO_REAL_TIME"),
            }
        }
        if let Ok(raw) = std::env::var("TEMPO_TIME_UNIT") {
            match raw.parse() {
                Ok(unit) => self.time_unit = unit,
                Err(e) => tracing::warn!("ignoring TEMPO_TIME_UNIT: {e}"),
            }
        }
        self
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
