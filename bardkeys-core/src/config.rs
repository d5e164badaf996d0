use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use bardkeys_types::{ArpPattern, ArpSettings, ChordQuality, MAX_ARP_OCTAVES, MAX_BPM, MIN_BPM};

use crate::error::ConfigError;
use crate::notation::{PLAYBACK_QUARTER_SECS, RECORD_QUARTER_SECS, TICKS_PER_QUARTER};
use crate::router::SessionSettings;

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

const DEFAULT_WINDOW_TITLES: [&str; 4] = [
    "The Lord of the Rings Online™",
    "The Lord of the Rings Online",
    "LOTRO",
    "Lord of the Rings Online",
];

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    output: OutputConfig,
    #[serde(default)]
    performance: PerformanceConfig,
    #[serde(default)]
    notation: NotationConfig,
    #[serde(default)]
    input: InputConfig,
}

#[derive(Deserialize, Default)]
struct OutputConfig {
    window_titles: Option<Vec<String>>,
    dry_run: Option<bool>,
}

#[derive(Deserialize, Default)]
struct PerformanceConfig {
    chord_quality: Option<String>,
    arp_enabled: Option<bool>,
    arp_pattern: Option<String>,
    arp_octaves: Option<u8>,
    bpm: Option<u32>,
}

#[derive(Deserialize, Default)]
struct NotationConfig {
    record_quarter_secs: Option<f64>,
    playback_quarter_secs: Option<f64>,
    ticks_per_quarter: Option<u16>,
}

#[derive(Deserialize, Default)]
struct InputConfig {
    preferred_port: Option<String>,
    countdown_secs: Option<u64>,
}

/// Notation timing after validation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NotationSettings {
    pub record_quarter_secs: f64,
    pub playback_quarter_secs: f64,
    pub ticks_per_quarter: u16,
}

pub struct Config {
    output: OutputConfig,
    performance: PerformanceConfig,
    notation: NotationConfig,
    input: InputConfig,
}

impl Config {
    /// Embedded defaults overlaid with the user's config file, if any.
    /// A broken user file is logged and skipped.
    pub fn load() -> Self {
        let mut base = embedded();

        if let Some(path) = user_config_path() {
            if path.exists() {
                match read_file(&path) {
                    Ok(user) => overlay(&mut base, user),
                    Err(e) => log::warn!(target: "config", "ignoring {}", e),
                }
            }
        }

        Self::from_file(base)
    }

    /// Embedded defaults overlaid with an explicitly chosen file, which must
    /// exist and parse.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut base = embedded();
        overlay(&mut base, read_file(path)?);
        log::info!(target: "config", "loaded {}", path.display());
        Ok(Self::from_file(base))
    }

    /// Defaults overlaid with TOML text.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let user = toml::from_str::<ConfigFile>(text).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        let mut base = embedded();
        overlay(&mut base, user);
        Ok(Self::from_file(base))
    }

    fn from_file(file: ConfigFile) -> Self {
        Config {
            output: file.output,
            performance: file.performance,
            notation: file.notation,
            input: file.input,
        }
    }

    pub fn window_titles(&self) -> Vec<String> {
        match &self.output.window_titles {
            Some(titles) if !titles.is_empty() => titles.clone(),
            _ => DEFAULT_WINDOW_TITLES.iter().map(|t| t.to_string()).collect(),
        }
    }

    pub fn dry_run(&self) -> bool {
        self.output.dry_run.unwrap_or(false)
    }

    /// Starting mode and arpeggiator settings. Unknown names and
    /// out-of-range numbers are errors rather than silent fallbacks.
    pub fn session_settings(&self) -> Result<SessionSettings, ConfigError> {
        let perf = &self.performance;
        let fallback = ArpSettings::default();

        let quality = match perf.chord_quality.as_deref() {
            Some(name) => name.parse::<ChordQuality>()?,
            None => ChordQuality::default(),
        };
        let pattern = match perf.arp_pattern.as_deref() {
            Some(name) => name.parse::<ArpPattern>()?,
            None => fallback.pattern,
        };

        let octaves = perf.arp_octaves.unwrap_or(fallback.octaves);
        if !(1..=MAX_ARP_OCTAVES).contains(&octaves) {
            return Err(ConfigError::OctavesOutOfRange {
                value: octaves,
                max: MAX_ARP_OCTAVES,
            });
        }

        let bpm = perf.bpm.unwrap_or(fallback.bpm);
        if !(MIN_BPM..=MAX_BPM).contains(&bpm) {
            return Err(ConfigError::BpmOutOfRange {
                value: bpm,
                min: MIN_BPM,
                max: MAX_BPM,
            });
        }

        Ok(SessionSettings {
            quality,
            arp_enabled: perf.arp_enabled.unwrap_or(false),
            arp: ArpSettings { pattern, octaves, bpm },
        })
    }

    pub fn notation_settings(&self) -> Result<NotationSettings, ConfigError> {
        let record = positive(
            "record_quarter_secs",
            self.notation.record_quarter_secs.unwrap_or(RECORD_QUARTER_SECS),
        )?;
        let playback = positive(
            "playback_quarter_secs",
            self.notation.playback_quarter_secs.unwrap_or(PLAYBACK_QUARTER_SECS),
        )?;
        let ticks = self.notation.ticks_per_quarter.unwrap_or(TICKS_PER_QUARTER);
        if ticks == 0 {
            return Err(ConfigError::NotPositive {
                field: "ticks_per_quarter",
                value: 0.0,
            });
        }
        Ok(NotationSettings {
            record_quarter_secs: record,
            playback_quarter_secs: playback,
            ticks_per_quarter: ticks,
        })
    }

    pub fn preferred_port(&self) -> &str {
        self.input.preferred_port.as_deref().unwrap_or("KONTROL")
    }

    /// Countdown before live input starts (capped at one minute).
    pub fn countdown(&self) -> Duration {
        Duration::from_secs(self.input.countdown_secs.unwrap_or(3).min(60))
    }
}

fn positive(field: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(value)
    } else {
        Err(ConfigError::NotPositive { field, value })
    }
}

fn embedded() -> ConfigFile {
    toml::from_str(DEFAULT_CONFIG).unwrap_or_else(|e| {
        log::error!(target: "config", "embedded config.toml is malformed: {}", e);
        ConfigFile::default()
    })
}

fn read_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("bardkeys").join("config.toml"))
}

fn overlay(base: &mut ConfigFile, user: ConfigFile) {
    merge_output(&mut base.output, user.output);
    merge_performance(&mut base.performance, user.performance);
    merge_notation(&mut base.notation, user.notation);
    merge_input(&mut base.input, user.input);
}

fn merge_output(base: &mut OutputConfig, user: OutputConfig) {
    if user.window_titles.is_some() {
        base.window_titles = user.window_titles;
    }
    if user.dry_run.is_some() {
        base.dry_run = user.dry_run;
    }
}

fn merge_performance(base: &mut PerformanceConfig, user: PerformanceConfig) {
    if user.chord_quality.is_some() {
        base.chord_quality = user.chord_quality;
    }
    if user.arp_enabled.is_some() {
        base.arp_enabled = user.arp_enabled;
    }
    if user.arp_pattern.is_some() {
        base.arp_pattern = user.arp_pattern;
    }
    if user.arp_octaves.is_some() {
        base.arp_octaves = user.arp_octaves;
    }
    if user.bpm.is_some() {
        base.bpm = user.bpm;
    }
}

fn merge_notation(base: &mut NotationConfig, user: NotationConfig) {
    if user.record_quarter_secs.is_some() {
        base.record_quarter_secs = user.record_quarter_secs;
    }
    if user.playback_quarter_secs.is_some() {
        base.playback_quarter_secs = user.playback_quarter_secs;
    }
    if user.ticks_per_quarter.is_some() {
        base.ticks_per_quarter = user.ticks_per_quarter;
    }
}

fn merge_input(base: &mut InputConfig, user: InputConfig) {
    if user.preferred_port.is_some() {
        base.preferred_port = user.preferred_port;
    }
    if user.countdown_secs.is_some() {
        base.countdown_secs = user.countdown_secs;
    }
}
