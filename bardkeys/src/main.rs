mod console;

use std::error::Error;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use bardkeys_core::config::Config;
use bardkeys_core::keymap::NoteActionMap;
use bardkeys_core::midi::{order_ports, MidiFilePlayer, MidiInputManager, MidiTimeline};
use bardkeys_core::notation::{self, NotationPlayer, PlaybackTiming};
use bardkeys_core::output::{DryRunSink, KeySink, KeystrokeOutput};
use bardkeys_core::router::{Command, EventRouter};

type Result<T> = std::result::Result<T, Box<dyn Error>>;

/// Longest quarter note `play-abc --quarter` accepts.
const MAX_QUARTER_SECS: f64 = 60.0;

#[derive(Parser)]
#[command(name = "bardkeys", version, about = "Play a MIDI keyboard into the game as keystrokes")]
struct Cli {
    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of the one in the user config directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log keystrokes instead of sending them
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List MIDI input ports
    Ports,
    /// Play live from a MIDI controller
    Live {
        /// Port name (or part of it); defaults to the preferred port
        #[arg(short, long)]
        port: Option<String>,
        /// Save recordings made with 'r' to this file
        #[arg(long)]
        record: Option<PathBuf>,
    },
    /// Play an ABC notation file
    PlayAbc {
        file: PathBuf,
        /// Seconds per quarter note
        #[arg(long)]
        quarter: Option<f64>,
    },
    /// Play a MIDI file as if it came from a controller
    PlayMidi {
        file: PathBuf,
        /// Playback speed multiplier
        #[arg(short, long, default_value_t = 1.0)]
        speed: f64,
    },
    /// Convert ABC notation to a MIDI file
    Abc2midi { input: PathBuf, output: PathBuf },
    /// Convert a MIDI file to ABC notation
    Midi2abc {
        input: PathBuf,
        /// Write here instead of stdout
        output: Option<PathBuf>,
    },
    /// Print the note to keystroke table
    Keymap {
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(verbose: bool) {
    use simplelog::{
        ColorChoice, CombinedLogger, LevelFilter, SharedLogger, TermLogger, TerminalMode, WriteLogger,
    };

    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };

    let log_path = dirs::config_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("bardkeys")
        .join("bardkeys.log");

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        log_level,
        simplelog::Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];
    match File::create(&log_path)
        .or_else(|_| File::create(std::env::temp_dir().join("bardkeys.log")))
    {
        Ok(file) => loggers.push(WriteLogger::new(log_level, simplelog::Config::default(), file)),
        Err(e) => eprintln!("bardkeys: no log file: {}", e),
    }

    if CombinedLogger::init(loggers).is_err() {
        eprintln!("bardkeys: logger already initialised");
    }

    log::info!("bardkeys starting (log level: {:?})", log_level);
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    };
    let dry_run = cli.dry_run || config.dry_run();

    match cli.command {
        Commands::Ports => list_ports(&config),
        Commands::Live { port, record } => live(&config, dry_run, port.as_deref(), record),
        Commands::PlayAbc { file, quarter } => play_abc(&config, dry_run, &file, quarter),
        Commands::PlayMidi { file, speed } => play_midi(&config, dry_run, &file, speed),
        Commands::Abc2midi { input, output } => {
            let ticks = config.notation_settings()?.ticks_per_quarter;
            notation::export_midi(&notation::load(&input)?, &output, ticks)?;
            println!("wrote {}", output.display());
            Ok(())
        }
        Commands::Midi2abc { input, output } => {
            let text = notation::import_midi_file(&input)?;
            match output {
                Some(path) => {
                    notation::save(&path, &text)?;
                    println!("wrote {}", path.display());
                }
                None => print!("{}", text),
            }
            Ok(())
        }
        Commands::Keymap { json } => print_keymap(json),
    }
}

fn make_output(config: &Config, dry_run: bool) -> Arc<KeystrokeOutput> {
    Arc::new(KeystrokeOutput::new(make_sink(config, dry_run)))
}

#[cfg(windows)]
fn make_sink(config: &Config, dry_run: bool) -> Box<dyn KeySink> {
    if dry_run {
        Box::new(DryRunSink::new())
    } else {
        Box::new(bardkeys_core::output::windows::WindowsSink::new(&config.window_titles()))
    }
}

#[cfg(not(windows))]
fn make_sink(config: &Config, dry_run: bool) -> Box<dyn KeySink> {
    if !dry_run {
        log::warn!(
            "keystroke injection needs Windows; logging keys instead of sending to {:?}",
            config.window_titles()
        );
    }
    Box::new(DryRunSink::new())
}

fn countdown(duration: Duration) {
    for remaining in (1..=duration.as_secs()).rev() {
        log::info!("starting in {}... click into the game window now", remaining);
        std::thread::sleep(Duration::from_secs(1));
    }
    log::info!("ready");
}

fn list_ports(config: &Config) -> Result<()> {
    let mut manager = MidiInputManager::new();
    manager.refresh_ports();
    let ports = order_ports(manager.list_ports(), config.preferred_port());
    if ports.is_empty() {
        println!("no MIDI input ports found");
    }
    for port in ports {
        println!("{:>2}: {}", port.index, port.name);
    }
    Ok(())
}

fn live(config: &Config, dry_run: bool, port: Option<&str>, record: Option<PathBuf>) -> Result<()> {
    let mut manager = MidiInputManager::new();
    manager.refresh_ports();
    let info = manager.select_port(port, config.preferred_port())?;

    let output = make_output(config, dry_run);
    let mut router = EventRouter::new(output, Arc::new(NoteActionMap::new()), config.session_settings()?)
        .with_record_quarter_secs(config.notation_settings()?.record_quarter_secs);
    if let Some(path) = record {
        router = router.with_record_path(path);
    }

    countdown(config.countdown());

    let (tx, rx) = crossbeam_channel::unbounded::<Command>();
    manager.connect(info.index, tx.clone())?;
    println!("{}", console::HELP);
    console::spawn(tx)?;

    router.run(rx);
    manager.disconnect();
    Ok(())
}

fn play_abc(config: &Config, dry_run: bool, file: &Path, quarter: Option<f64>) -> Result<()> {
    let text = notation::load(file)?;
    let quarter = match quarter {
        Some(q) => check_quarter(q)?,
        None => config.notation_settings()?.playback_quarter_secs,
    };

    let output = make_output(config, dry_run);
    countdown(config.countdown());
    let player = NotationPlayer::start(
        &text,
        Arc::clone(&output),
        Arc::new(NoteActionMap::new()),
        PlaybackTiming::with_quarter_secs(quarter),
    )?;
    let played = player.wait();
    output.release_all();
    println!("played {} notes", played);
    Ok(())
}

/// Seconds per quarter from the command line. Must be a positive finite
/// number so every note length converts to a `Duration`.
fn check_quarter(quarter: f64) -> Result<f64> {
    if quarter > 0.0 && quarter.is_finite() && quarter <= MAX_QUARTER_SECS {
        Ok(quarter)
    } else {
        Err(format!("quarter must be between 0 and {} seconds, got {}", MAX_QUARTER_SECS, quarter).into())
    }
}

fn play_midi(config: &Config, dry_run: bool, file: &Path, speed: f64) -> Result<()> {
    let timeline = MidiTimeline::load(file)?;
    log::info!(
        "{}: {} tracks, {} notes, {:.1}s",
        file.display(),
        timeline.tracks,
        timeline.note_count(),
        timeline.length.as_secs_f64()
    );

    let output = make_output(config, dry_run);
    let mut router = EventRouter::new(output, Arc::new(NoteActionMap::new()), config.session_settings()?);

    countdown(config.countdown());
    let (tx, rx) = crossbeam_channel::unbounded::<Command>();
    let player = MidiFilePlayer::start(timeline, speed, tx)?;
    router.run(rx);
    println!("played {} events", player.wait());
    Ok(())
}

fn print_keymap(json: bool) -> Result<()> {
    let entries = NoteActionMap::new().entries();
    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        for entry in entries {
            println!("{:>3}  {:<4}  {}", entry.note, entry.name, entry.keys);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quarter_must_be_finite_and_positive() {
        assert_eq!(check_quarter(0.4).unwrap(), 0.4);
        for bad in [0.0, -1.0, f64::INFINITY, f64::NAN, 1e300] {
            assert!(check_quarter(bad).is_err(), "{} accepted", bad);
        }
    }

    #[test]
    fn cli_parses_live_options() {
        let cli = Cli::try_parse_from(["bardkeys", "--dry-run", "live", "--port", "kontrol"]).unwrap();
        assert!(cli.dry_run);
        match cli.command {
            Commands::Live { port, record } => {
                assert_eq!(port.as_deref(), Some("kontrol"));
                assert!(record.is_none());
            }
            _ => panic!("expected live"),
        }
    }
}
