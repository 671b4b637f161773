use anyhow::{anyhow, Context, Result};
use std::io::BufRead;
use std::str::FromStr;
use tokio::sync::mpsc;

/// One line typed into the player.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// `t <secs>`
    Seek(f64),
    /// `g <gain>`
    Gain(f32),
    /// `p`
    TogglePause,
    /// `s`
    Stop,
    /// `l`
    ToggleLoop,
    /// `>`
    Next,
    /// `<`
    Previous,
    /// `?`
    Refresh,
    /// `q`
    Quit,
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut parts = line.split_whitespace();
        let name = parts.next().ok_or_else(|| anyhow!("empty command"))?;
        let arg = parts.next();

        let command = match name {
            "t" => Command::Seek(
                arg.ok_or_else(|| anyhow!("usage: t <seconds>"))?
                    .parse()
                    .context("seek target must be a number")?,
            ),
            "g" => Command::Gain(
                arg.ok_or_else(|| anyhow!("usage: g <gain>"))?
                    .parse()
                    .context("gain must be a number")?,
            ),
            "p" => Command::TogglePause,
            "s" => Command::Stop,
            "l" => Command::ToggleLoop,
            ">" => Command::Next,
            "<" => Command::Previous,
            "?" => Command::Refresh,
            "q" => Command::Quit,
            other => return Err(anyhow!("unknown command {other:?}")),
        };

        Ok(command)
    }
}

/// Read commands from stdin on a detached thread. The channel closes at end of input.
pub fn start() -> mpsc::UnboundedReceiver<Command> {
    let (tx, rx) = mpsc::unbounded_channel();

    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!("Failed to read stdin: {e}");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            match line.parse::<Command>() {
                Ok(command) => {
                    if tx.send(command).is_err() {
                        break;
                    }
                }
                Err(e) => warn!("{e}"),
            }
        }
    });

    rx
}
