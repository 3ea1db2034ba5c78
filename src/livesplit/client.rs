//! LiveSplit Server client.
//!
//! One command per `\r\n`-terminated line over a persistent TCP connection.
//! The server sends no acknowledgement for control commands, so nothing is read.

use anyhow::{anyhow, Result};
use std::fmt;
use std::io::Write;
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
/// A stalled server must not hold the worker's tick; a timed-out write drops the connection.
const WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// Commands understood by the timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerCommand {
    StartTimer,
    Split,
    Reset,
    Pause,
    Resume,
    /// Elapsed in-game time in whole seconds
    SetGameTime(u64),
}

impl fmt::Display for TimerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerCommand::StartTimer => write!(f, "starttimer"),
            TimerCommand::Split => write!(f, "split"),
            TimerCommand::Reset => write!(f, "reset"),
            TimerCommand::Pause => write!(f, "pause"),
            TimerCommand::Resume => write!(f, "resume"),
            TimerCommand::SetGameTime(seconds) => write!(f, "setgametime {}", seconds),
        }
    }
}

/// Sink for timer commands. Sending never fails the caller.
pub trait TimerClient {
    fn send(&mut self, command: TimerCommand);
    fn is_connected(&self) -> bool;
}

pub struct LiveSplitClient {
    host: String,
    port: u16,
    stream: Option<TcpStream>,
}

impl LiveSplitClient {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
            stream: None,
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Opens (or reopens) the connection.
    pub fn connect(&mut self) -> Result<()> {
        self.disconnect();

        let addr = (self.host.as_str(), self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| anyhow!("Could not resolve {}", self.address()))?;

        match TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT) {
            Ok(stream) => {
                let _ = stream.set_nodelay(true);
                stream.set_write_timeout(Some(WRITE_TIMEOUT))?;
                self.stream = Some(stream);
                crate::log(&format!("Connected to LiveSplit Server at {}", self.address()));
                Ok(())
            }
            Err(e) => {
                crate::log(&format!("Failed to connect to LiveSplit: {}", e));
                Err(anyhow!("Failed to connect to {}: {}", self.address(), e))
            }
        }
    }

    pub fn disconnect(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

impl TimerClient for LiveSplitClient {
    fn send(&mut self, command: TimerCommand) {
        let Some(stream) = self.stream.as_mut() else {
            return;
        };

        if !matches!(command, TimerCommand::SetGameTime(_)) {
            crate::log(&format!("[LiveSplit] {}", command));
        }

        let line = format!("{}\r\n", command);
        if let Err(e) = stream.write_all(line.as_bytes()) {
            crate::log(&format!("Error sending command '{}': {}", command, e));
            // Caller reconnects explicitly
            self.stream = None;
        }
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

/// In-memory client that records every command.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingClient {
    pub commands: Vec<TimerCommand>,
}

#[cfg(test)]
impl RecordingClient {
    pub fn count(&self, command: TimerCommand) -> usize {
        self.commands.iter().filter(|&&c| c == command).count()
    }
}

#[cfg(test)]
impl TimerClient for RecordingClient {
    fn send(&mut self, command: TimerCommand) {
        self.commands.push(command);
    }

    fn is_connected(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_command_wire_text() {
        assert_eq!(TimerCommand::StartTimer.to_string(), "starttimer");
        assert_eq!(TimerCommand::Split.to_string(), "split");
        assert_eq!(TimerCommand::Reset.to_string(), "reset");
        assert_eq!(TimerCommand::Pause.to_string(), "pause");
        assert_eq!(TimerCommand::Resume.to_string(), "resume");
        assert_eq!(TimerCommand::SetGameTime(125).to_string(), "setgametime 125");
    }

    #[test]
    fn test_send_while_disconnected_is_dropped() {
        let mut client = LiveSplitClient::new("127.0.0.1", 1);
        assert!(!client.is_connected());
        client.send(TimerCommand::Split);
        assert!(!client.is_connected());
    }

    #[test]
    fn test_connect_failure_reports_error() {
        // Bind then drop to get a port nothing listens on.
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let mut client = LiveSplitClient::new("127.0.0.1", port);
        assert!(client.connect().is_err());
        assert!(!client.is_connected());
    }

    #[test]
    fn test_commands_arrive_one_per_line() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            BufReader::new(stream)
                .lines()
                .map(|l| l.unwrap())
                .collect::<Vec<String>>()
        });

        let mut client = LiveSplitClient::new("127.0.0.1", port);
        client.connect().unwrap();
        assert!(client.is_connected());
        client.send(TimerCommand::StartTimer);
        client.send(TimerCommand::SetGameTime(0));
        client.send(TimerCommand::Split);
        client.disconnect();
        assert!(!client.is_connected());

        let lines = server.join().unwrap();
        assert_eq!(lines, vec!["starttimer", "setgametime 0", "split"]);
    }

    #[test]
    fn test_write_failure_drops_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            // Accept, then close the server side straight away.
            let (stream, _) = listener.accept().unwrap();
            drop(stream);
        });

        let mut client = LiveSplitClient::new("127.0.0.1", port);
        client.connect().unwrap();
        server.join().unwrap();

        // The first write after the peer closes may still be buffered; the reset surfaces later.
        for _ in 0..200 {
            if !client.is_connected() {
                break;
            }
            client.send(TimerCommand::Split);
            thread::sleep(Duration::from_millis(10));
        }
        assert!(!client.is_connected());

        // Further commands are dropped without touching the socket.
        client.send(TimerCommand::Reset);
        assert!(!client.is_connected());
    }
}
