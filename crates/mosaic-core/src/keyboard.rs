//! Line-based keyboard control on stdin

use crate::control::{ControlEvent, ControlSender};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;

/// Map one input line to a control event.
///
/// `1`-`9` select that many frames, `0` selects ten, `t <bpm>` sets the
/// tempo and `q` quits.
pub fn parse_line(line: &str) -> Option<ControlEvent> {
    let line = line.trim();
    let mut parts = line.split_whitespace();
    let head = parts.next()?;

    match head {
        "q" | "quit" => Some(ControlEvent::Quit),
        "t" | "tempo" => parts
            .next()
            .and_then(|bpm| bpm.parse::<f64>().ok())
            .map(ControlEvent::SetTempo),
        digit if digit.len() == 1 => match digit.chars().next()?.to_digit(10)? {
            0 => Some(ControlEvent::SetFrames(10)),
            n => Some(ControlEvent::SetFrames(n as usize)),
        },
        _ => None,
    }
}

/// Forward stdin lines as control events until stdin closes or the engine
/// goes away.
pub fn spawn_stdin_reader(tx: ControlSender) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    log::warn!("Keyboard input closed: {}", e);
                    break;
                }
            };
            match parse_line(&line) {
                Some(event) => {
                    if tx.send(event).is_err() {
                        break;
                    }
                }
                None => log::debug!("Ignoring input {:?}", line),
            }
        }
    })
}
