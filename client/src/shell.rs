//! Line-oriented driver for a [`SessionController`].
//!
//! Each input line is one canvas or toolbar event, e.g. `down 10 20`,
//! `move 12 24`, `up`, `send`, `connect 127.0.0.1:6666`.

use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

use sketch_shared::{CanvasSize, TimedPoint};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::session::{SendOutcome, SessionController};
use crate::store::StrokeHandle;
use crate::transport::Transport;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Down(f64, f64),
    Move(f64, f64),
    Up,
    Undo,
    Clear,
    Send,
    Debug,
    Resize(f64, f64),
    Connect(String),
    Disconnect,
    Status,
    Quit,
}

#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("unknown command {0:?}")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
}

/// Parses one input line. Blank lines and `#` comments yield `None`.
pub fn parse_command(line: &str) -> Result<Option<Command>, CommandError> {
    let mut words = line.split_whitespace();
    let Some(name) = words.next() else {
        return Ok(None);
    };
    if name.starts_with('#') {
        return Ok(None);
    }
    let args = words.collect::<Vec<_>>();

    let command = match name {
        "down" => {
            let (x, y) = pair(&args, "down X Y")?;
            Command::Down(x, y)
        }
        "move" => {
            let (x, y) = pair(&args, "move X Y")?;
            Command::Move(x, y)
        }
        "resize" => match args.as_slice() {
            [width, height] => match (parse_dimension(width), parse_dimension(height)) {
                (Ok(width), Ok(height)) => Command::Resize(width, height),
                _ => return Err(CommandError::Usage("resize WIDTH HEIGHT")),
            },
            _ => return Err(CommandError::Usage("resize WIDTH HEIGHT")),
        },
        "connect" => match args.as_slice() {
            [address] => Command::Connect(address.to_string()),
            _ => return Err(CommandError::Usage("connect HOST:PORT")),
        },
        "up" => Command::Up,
        "undo" => Command::Undo,
        "clear" => Command::Clear,
        "send" => Command::Send,
        "debug" => Command::Debug,
        "disconnect" => Command::Disconnect,
        "status" => Command::Status,
        "quit" | "exit" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

fn pair(args: &[&str], usage: &'static str) -> Result<(f64, f64), CommandError> {
    let [a, b] = args else {
        return Err(CommandError::Usage(usage));
    };
    let parse = |value: &str| {
        value
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .ok_or(CommandError::Usage(usage))
    };
    Ok((parse(a)?, parse(b)?))
}

/// Canvas sides must be finite and positive to survive JSON encoding.
pub fn parse_dimension(value: &str) -> Result<f64, String> {
    match value.parse::<f64>() {
        Ok(side) if side.is_finite() && side > 0.0 => Ok(side),
        Ok(_) => Err(format!("{value} is not a finite positive size")),
        Err(error) => Err(error.to_string()),
    }
}

fn now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or_default()
}

pub async fn run_shell<T, R, W>(
    session: &mut SessionController<T>,
    input: R,
    mut output: W,
) -> std::io::Result<()>
where
    T: Transport,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    let mut current: Option<StrokeHandle> = None;
    let mut input_closed = false;
    // Lines that arrived while a connect was in flight, in arrival order.
    let mut backlog = VecDeque::new();

    loop {
        let line = match backlog.pop_front() {
            Some(line) => line,
            None if input_closed => break,
            None => match lines.next_line().await? {
                Some(line) => line,
                None => break,
            },
        };
        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(error) => {
                output.write_all(format!("error: {error}\n").as_bytes()).await?;
                continue;
            }
        };
        debug!(?command, "shell command");

        let reply = match command {
            Command::Down(x, y) => {
                current = Some(session.store_mut().begin_stroke(TimedPoint::new(x, y, now())));
                None
            }
            Command::Move(x, y) => {
                let point = TimedPoint::new(x, y, now());
                match current {
                    Some(handle) => session
                        .store_mut()
                        .append_to_current(handle, point)
                        .err()
                        .map(|error| format!("error: {error}")),
                    None => Some("error: no stroke in progress".to_string()),
                }
            }
            Command::Up => match current.take() {
                Some(handle) => match session.store_mut().commit_current(handle) {
                    Ok(index) => {
                        let points = session.store().strokes()[index].points.len();
                        Some(format!("stroke {index} committed with {points} points"))
                    }
                    Err(error) => Some(format!("error: {error}")),
                },
                None => Some("error: no stroke in progress".to_string()),
            },
            Command::Undo => Some(if session.undo() {
                "undone".to_string()
            } else {
                "nothing to undo".to_string()
            }),
            Command::Clear => {
                session.clear();
                current = None;
                Some("cleared".to_string())
            }
            Command::Send => Some(match session.send_pending().await {
                Ok(SendOutcome::Sent { strokes }) => format!("sent {strokes} strokes"),
                Ok(SendOutcome::NothingToSend) => "nothing to send".to_string(),
                Err(error) => format!("error: {error}"),
            }),
            Command::Debug => Some(format!(
                "debug markers {}",
                if session.toggle_debug_markers() { "on" } else { "off" }
            )),
            Command::Resize(width, height) => {
                session.set_canvas(CanvasSize { width, height });
                None
            }
            Command::Connect(address) => {
                let transport = session.transport();
                let connect = session.connect(&address);
                tokio::pin!(connect);
                let result = loop {
                    tokio::select! {
                        result = &mut connect => break result,
                        line = lines.next_line(), if !input_closed => match line {
                            Ok(Some(line)) if line.trim() == "disconnect" => transport.disconnect().await,
                            Ok(Some(line)) => backlog.push_back(line),
                            Ok(None) => input_closed = true,
                            Err(error) => {
                                warn!(%error, "input failed while connecting");
                                input_closed = true;
                            }
                        },
                    }
                };
                Some(match result {
                    Ok(()) => format!("connected to {address}"),
                    Err(error) => format!("error: {error}"),
                })
            }
            Command::Disconnect => {
                session.disconnect().await;
                Some("disconnected".to_string())
            }
            Command::Status => Some(status(session)),
            Command::Quit => break,
        };

        if let Some(reply) = reply {
            output.write_all(reply.as_bytes()).await?;
            output.write_all(b"\n").await?;
        }
    }

    output.flush().await?;
    session.disconnect().await;
    Ok(())
}

fn status<T: Transport>(session: &SessionController<T>) -> String {
    let store = session.store();
    let mut report = format!(
        "state={} strokes={} sent={} pending={} debug={}",
        session.connection_state(),
        store.strokes().len(),
        store.sent(),
        if session.has_pending() { "yes" } else { "no" },
        if session.debug_markers() { "on" } else { "off" },
    );
    if session.debug_markers() {
        for (index, stroke) in store.strokes().iter().enumerate() {
            let hue = store.marker_hue(index).unwrap_or_default();
            report.push_str(&format!(
                "\n  stroke {index}: {} points hue={hue:.2}",
                stroke.points.len()
            ));
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canvas_events() {
        assert_eq!(parse_command("down 1 2.5").unwrap(), Some(Command::Down(1.0, 2.5)));
        assert_eq!(parse_command("  move -3 4 ").unwrap(), Some(Command::Move(-3.0, 4.0)));
        assert_eq!(parse_command("up").unwrap(), Some(Command::Up));
        assert_eq!(
            parse_command("connect 127.0.0.1:6666").unwrap(),
            Some(Command::Connect("127.0.0.1:6666".to_string()))
        );
        assert_eq!(
            parse_command("resize 390 844").unwrap(),
            Some(Command::Resize(390.0, 844.0))
        );
    }

    #[test]
    fn skips_blank_lines_and_comments() {
        assert_eq!(parse_command("").unwrap(), None);
        assert_eq!(parse_command("   ").unwrap(), None);
        assert_eq!(parse_command("# a note").unwrap(), None);
    }

    #[test]
    fn reports_bad_lines() {
        assert_eq!(
            parse_command("draw 1 2"),
            Err(CommandError::Unknown("draw".to_string()))
        );
        assert_eq!(parse_command("down 1"), Err(CommandError::Usage("down X Y")));
        assert_eq!(parse_command("move 1 nan"), Err(CommandError::Usage("move X Y")));
        assert_eq!(
            parse_command("resize 0 10"),
            Err(CommandError::Usage("resize WIDTH HEIGHT"))
        );
        assert_eq!(parse_command("connect"), Err(CommandError::Usage("connect HOST:PORT")));
        assert_eq!(
            parse_command("resize inf 10"),
            Err(CommandError::Usage("resize WIDTH HEIGHT"))
        );
    }

    #[test]
    fn dimensions_must_be_finite_and_positive() {
        assert_eq!(parse_dimension("390"), Ok(390.0));
        assert_eq!(parse_dimension("0.5"), Ok(0.5));
        for value in ["0", "-10", "NaN", "inf", "-inf", "wide", ""] {
            assert!(parse_dimension(value).is_err(), "{value:?} should be rejected");
        }
    }

    #[tokio::test]
    async fn draws_and_reports_status() {
        let script = "down 0 0\nmove 5 0\nmove 10 0\nup\nbogus\ndebug\nstatus\nundo\nsend\n";
        let mut session = SessionController::new(CanvasSize::default());
        let mut output = Vec::new();
        run_shell(&mut session, script.as_bytes(), &mut output)
            .await
            .unwrap();
        let output = String::from_utf8(output).unwrap();
        let lines = output.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "stroke 0 committed with 2 points");
        assert_eq!(lines[1], "error: unknown command \"bogus\"");
        assert_eq!(lines[2], "debug markers on");
        assert_eq!(
            lines[3],
            "state=disconnected strokes=1 sent=0 pending=yes debug=on"
        );
        assert_eq!(lines[4], "  stroke 0: 2 points hue=0.00");
        assert_eq!(lines[5], "undone");
        assert_eq!(lines[6], "nothing to send");
    }
}
