//! Line-delimited JSON transport to the path-generation backend.

use std::io::{BufRead, BufReader, BufWriter, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;

use agvis::backend::{ClientCommand, ServerEvent};
use anyhow::{Context as _, Result};
use eframe::egui::Context;
use tracing::{debug, error, info, warn};

pub(super) struct Connection {
    address: String,
    inbound: Receiver<ServerEvent>,
    outbound: Sender<ClientCommand>,
    socket: TcpStream,
    connected: bool,
}

impl Connection {
    /// Connects and spawns one reader and one writer thread. The reader asks
    /// `ctx` for a repaint whenever an event arrives.
    pub(super) fn open(address: &str, ctx: Context) -> Result<Self> {
        let stream = TcpStream::connect(address)
            .with_context(|| format!("failed to connect to backend at {address}"))?;
        stream
            .set_nodelay(true)
            .context("failed to configure backend socket")?;
        let read_half = stream
            .try_clone()
            .context("failed to clone backend socket")?;
        let socket = stream
            .try_clone()
            .context("failed to clone backend socket")?;

        let (event_tx, event_rx) = mpsc::channel();
        let (command_tx, command_rx) = mpsc::channel();

        thread::Builder::new()
            .name("backend-reader".to_owned())
            .spawn(move || read_events(read_half, event_tx, ctx))
            .context("failed to spawn backend reader")?;
        thread::Builder::new()
            .name("backend-writer".to_owned())
            .spawn(move || {
                if let Err(err) = write_commands(stream, command_rx) {
                    error!(error = ?err, "backend writer stopped");
                }
            })
            .context("failed to spawn backend writer")?;

        info!(%address, "connected to backend");
        Ok(Self {
            address: address.to_owned(),
            inbound: event_rx,
            outbound: command_tx,
            socket,
            connected: true,
        })
    }

    pub(super) fn address(&self) -> &str {
        &self.address
    }

    pub(super) fn is_connected(&self) -> bool {
        self.connected
    }

    /// Every event received since the last call.
    pub(super) fn drain(&mut self) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        loop {
            match self.inbound.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if self.connected {
                        warn!(address = %self.address, "backend connection lost");
                    }
                    self.connected = false;
                    break;
                }
            }
        }
        events
    }

    pub(super) fn send(&mut self, command: ClientCommand) {
        if self.outbound.send(command).is_err() {
            self.connected = false;
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        // Unblocks the reader thread.
        let _ = self.socket.shutdown(Shutdown::Both);
    }
}

fn read_events(stream: TcpStream, events: Sender<ServerEvent>, ctx: Context) {
    for line in BufReader::new(stream).lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                warn!(error = %err, "backend read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<ServerEvent>(&line) {
            Ok(event) => {
                debug!(kind = event.kind(), "received backend event");
                if events.send(event).is_err() {
                    break;
                }
                ctx.request_repaint();
            }
            Err(err) => warn!(error = %err, "skipping undecodable backend message"),
        }
    }
    ctx.request_repaint();
}

fn write_commands(stream: TcpStream, commands: Receiver<ClientCommand>) -> Result<()> {
    let mut writer = BufWriter::new(stream);
    for command in commands {
        let line = serde_json::to_string(&command).context("failed to encode command")?;
        writeln!(writer, "{line}").context("failed to write command")?;
        writer.flush().context("failed to flush command")?;
    }
    Ok(())
}
