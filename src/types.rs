use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

/// Which exits cause a unit to be relaunched.
///
/// - `Never`: a unit that exits is finished for this supervisor run.
/// - `AnyExit`: relaunch after every exit, including a clean exit with code
///   0. Units are expected to run until told to stop, so any exit counts.
/// - `NonZero`: relaunch only after a failed exit (non-zero code, signal, or
///   launch failure). Useful for one-shot units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum RestartMode {
    #[default]
    Never,
    AnyExit,
    NonZero,
}

impl FromStr for RestartMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "never" => Ok(RestartMode::Never),
            "any-exit" | "always" => Ok(RestartMode::AnyExit),
            "non-zero" | "on-failure" => Ok(RestartMode::NonZero),
            other => Err(format!(
                "invalid restart mode: {other} (expected \"never\", \"any-exit\" or \"non-zero\")"
            )),
        }
    }
}

/// Parse a simple duration string like `"5s"`, `"250ms"`, `"1m"`, `"2h"`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| format!("duration '{s}' missing unit suffix"))?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    let secs_per_unit = match unit.as_str() {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        _ => {
            return Err(format!(
                "unsupported duration unit '{}'; expected ms, s, m, or h",
                unit
            ))
        }
    };

    value
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{s}' is too large"))
}
