//! CPU, memory and battery readings.
//!
//! Dependency-free: everything comes from `/proc` and `/sys`, so the monitor
//! is only available where those exist.

use crate::error::{AssistantError, Result};
use crate::services::SystemMonitor;
use std::path::{Path, PathBuf};
use std::time::Duration;

const PROC_STAT: &str = "/proc/stat";
const PROC_MEMINFO: &str = "/proc/meminfo";
const POWER_SUPPLY: &str = "/sys/class/power_supply";

/// Sampling interval for CPU usage.
const CPU_SAMPLE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Battery {
    pub percent: u8,
    pub charging: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusReading {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub battery: Option<Battery>,
}

impl StatusReading {
    /// Spoken form of the reading.
    pub fn spoken(&self) -> String {
        let mut status = format!(
            "CPU usage is at {:.1} percent. Memory usage is at {:.1} percent.",
            self.cpu_percent, self.memory_percent
        );
        if let Some(battery) = self.battery {
            status.push_str(&format!(" Battery is at {} percent.", battery.percent));
            if battery.charging {
                status.push_str(" and charging.");
            }
        }
        status
    }
}

/// `/proc`-based monitor.
pub struct ProcSystemMonitor {
    power_supply: PathBuf,
}

impl ProcSystemMonitor {
    pub fn detect() -> Option<Self> {
        (Path::new(PROC_STAT).exists() && Path::new(PROC_MEMINFO).exists()).then(|| Self {
            power_supply: PathBuf::from(POWER_SUPPLY),
        })
    }

    fn read(&self) -> Result<StatusReading> {
        let before = parse_cpu_times(&std::fs::read_to_string(PROC_STAT)?)
            .ok_or_else(|| AssistantError::Service("unreadable /proc/stat".into()))?;
        std::thread::sleep(CPU_SAMPLE);
        let after = parse_cpu_times(&std::fs::read_to_string(PROC_STAT)?)
            .ok_or_else(|| AssistantError::Service("unreadable /proc/stat".into()))?;
        let memory_percent = parse_memory_percent(&std::fs::read_to_string(PROC_MEMINFO)?)
            .ok_or_else(|| AssistantError::Service("unreadable /proc/meminfo".into()))?;

        Ok(StatusReading {
            cpu_percent: cpu_percent(before, after),
            memory_percent,
            battery: read_battery(&self.power_supply),
        })
    }
}

impl SystemMonitor for ProcSystemMonitor {
    fn status_report(&self) -> Result<String> {
        self.read().map(|r| r.spoken())
    }
}

/// `(idle, total)` jiffies from the aggregate `cpu` line.
fn parse_cpu_times(stat: &str) -> Option<(u64, u64)> {
    let line = stat.lines().find(|l| l.starts_with("cpu "))?;
    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .filter_map(|f| f.parse().ok())
        .collect();
    if fields.len() < 4 {
        return None;
    }
    // idle + iowait
    let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
    Some((idle, fields.iter().sum()))
}

fn cpu_percent(before: (u64, u64), after: (u64, u64)) -> f64 {
    let total = after.1.saturating_sub(before.1);
    if total == 0 {
        return 0.0;
    }
    let idle = after.0.saturating_sub(before.0);
    #[allow(clippy::cast_precision_loss)]
    let busy = (total.saturating_sub(idle)) as f64 / total as f64;
    (busy * 1000.0).round() / 10.0
}

fn parse_memory_percent(meminfo: &str) -> Option<f64> {
    let field = |name: &str| -> Option<u64> {
        meminfo
            .lines()
            .find_map(|l| l.strip_prefix(name))
            .and_then(|rest| rest.split_whitespace().next())
            .and_then(|v| v.parse().ok())
    };
    let total = field("MemTotal:")?;
    let available = field("MemAvailable:")?;
    if total == 0 {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let used = total.saturating_sub(available) as f64 / total as f64;
    Some((used * 1000.0).round() / 10.0)
}

fn read_battery(power_supply: &Path) -> Option<Battery> {
    let entries = std::fs::read_dir(power_supply).ok()?;
    entries.flatten().find_map(|entry| {
        let dir = entry.path();
        let kind = std::fs::read_to_string(dir.join("type")).ok()?;
        if kind.trim() != "Battery" {
            return None;
        }
        let percent = std::fs::read_to_string(dir.join("capacity"))
            .ok()?
            .trim()
            .parse()
            .ok()?;
        let charging = std::fs::read_to_string(dir.join("status"))
            .map(|s| matches!(s.trim(), "Charging" | "Full"))
            .unwrap_or(false);
        Some(Battery { percent, charging })
    })
}
