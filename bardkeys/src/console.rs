//! Line-based control console on stdin, standing in for global hotkeys.

use std::io::{self, BufRead};
use std::thread::{self, JoinHandle};

use bardkeys_core::router::Command;
use bardkeys_types::CycleDirection;
use crossbeam_channel::Sender;

pub const HELP: &str = "\
commands:
  n        next chord / pattern
  p        previous chord / pattern
  a        toggle arpeggiator
  c        chord mode
  r        start / stop recording
  t <bpm>  set arpeggiator tempo
  q        quit";

pub fn parse_line(line: &str) -> Result<Option<Command>, String> {
    let mut words = line.split_whitespace();
    let Some(word) = words.next() else {
        return Ok(None);
    };
    let command = match word.to_ascii_lowercase().as_str() {
        "n" | "next" => Command::CycleSelector(CycleDirection::Forward),
        "p" | "prev" => Command::CycleSelector(CycleDirection::Backward),
        "a" | "arp" => Command::ToggleArp,
        "c" | "chord" => Command::ChordMode,
        "r" | "rec" => Command::ToggleRecording,
        "t" | "tempo" => {
            let bpm = words
                .next()
                .ok_or("usage: t <bpm>")?
                .parse::<u32>()
                .map_err(|e| format!("bad tempo: {}", e))?;
            Command::SetBpm(bpm)
        }
        "q" | "quit" => Command::Shutdown,
        "h" | "help" | "?" => {
            println!("{}", HELP);
            return Ok(None);
        }
        other => return Err(format!("unknown command '{}', try 'h'", other)),
    };
    Ok(Some(command))
}

/// Forward commands read from `input` until `q`, end of input or the
/// router goes away. Running out of input ends the session too, otherwise a
/// piped stdin would leave the router waiting on the MIDI port forever.
pub fn pump(input: impl BufRead, tx: &Sender<Command>) {
    for line in input.lines() {
        let Ok(line) = line else {
            break;
        };
        match parse_line(&line) {
            Ok(Some(command)) => {
                let quit = command == Command::Shutdown;
                if tx.send(command).is_err() || quit {
                    return;
                }
            }
            Ok(None) => {}
            Err(msg) => eprintln!("{}", msg),
        }
    }
    log::info!("console input ended, closing session");
    let _ = tx.send(Command::Shutdown);
}

/// Run [`pump`] over stdin on its own thread.
pub fn spawn(tx: Sender<Command>) -> io::Result<JoinHandle<()>> {
    thread::Builder::new().name("console".into()).spawn(move || {
        pump(io::stdin().lock(), &tx);
        log::debug!("console closed");
    })
}
