// src/hal/trigno.rs
//! Delsys Trigno base station client
//!
//! The base station exposes two TCP sockets: an ASCII command socket and a
//! data socket streaming interleaved little-endian `f32` samples for a fixed
//! number of channels. The client owns both sockets, drains the greeting the
//! command socket sends on connect, and delivers fixed-shape blocks of the
//! configured active channels.
//!
//! Delivery on the data socket arrives in bursts. A `recv` that times out
//! ends the block early and the remainder is zero-filled, which keeps the
//! worst-case latency of [`TrignoClient::read_block`] bounded by the socket
//! timeout.

use crate::config::constants::device;
use crate::hal::frame::{decode_interleaved, frame_len};
use crate::hal::traits::{BlockSource, Transport};
use crate::hal::types::{
    BlockFill, ChannelBlock, ChannelSelection, ProtocolError, ProtocolResult, ReadOutcome, Units,
};
use crate::utils::{current_timestamp_nanos, StopSignal};
use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Connection and decoding parameters for a Trigno base station
#[derive(Debug, Clone, PartialEq)]
pub struct TrignoSettings {
    /// Base station address
    pub host: String,
    /// ASCII command socket
    pub command_port: u16,
    /// EMG data socket
    pub data_port: u16,
    /// Channels present in every frame on the data socket
    pub total_channels: usize,
    /// Bound on connect and on every individual `recv`
    pub timeout: Duration,
    /// Rows kept from each frame
    pub selection: ChannelSelection,
    /// Unit conversion applied to kept rows
    pub units: Units,
    /// Extra gain applied to kept rows
    pub raw_signal_gain: f64,
    /// Device sampling rate
    pub sample_rate_hz: f64,
}

impl Default for TrignoSettings {
    fn default() -> Self {
        Self {
            host: device::DEFAULT_HOST.to_string(),
            command_port: device::COMMAND_PORT,
            data_port: device::EMG_DATA_PORT,
            total_channels: device::TOTAL_CHANNELS,
            timeout: Duration::from_millis(device::DEFAULT_TIMEOUT_MS),
            selection: ChannelSelection::from_active(
                &device::DEFAULT_ACTIVE_CHANNELS,
                device::TOTAL_CHANNELS,
            )
            .unwrap_or_else(|_| ChannelSelection::all(device::TOTAL_CHANNELS)),
            units: Units::Volts,
            raw_signal_gain: device::DEFAULT_RAW_SIGNAL_GAIN,
            sample_rate_hz: crate::config::constants::signal::DEFAULT_SAMPLE_RATE_HZ,
        }
    }
}

impl TrignoSettings {
    /// Combined multiplier applied to selected rows
    pub fn output_scale(&self) -> f64 {
        self.units.scale() * self.raw_signal_gain
    }
}

/// Response to an ASCII command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReply {
    /// Response text as received, lossily decoded
    pub text: String,
    /// Whether the acknowledgement token was present
    pub acknowledged: bool,
}

/// Raw bytes from the data socket
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawFrame {
    /// A frame of the requested length
    Filled {
        /// Interleaved sample bytes
        bytes: Vec<u8>,
        /// Whether the tail was zero-filled
        fill: BlockFill,
    },
    /// The stop flag was raised
    Cancelled,
}

/// Counters kept by the client for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientStats {
    /// Blocks returned by `read_block`
    pub blocks_read: u64,
    /// Blocks that needed zero padding
    pub zero_filled_blocks: u64,
    /// Bytes taken off the data socket
    pub bytes_received: u64,
    /// Commands answered without the acknowledgement token
    pub unacknowledged_commands: u64,
    /// Bytes dropped to get back in step with sample periods after a timeout
    pub bytes_discarded: u64,
}

/// Client for the Trigno command and data sockets
pub struct TrignoClient<T: Transport = TcpStream> {
    settings: TrignoSettings,
    command: Option<T>,
    data: Option<T>,
    stop: StopSignal,
    stats: ClientStats,
    /// Bytes of a cut-off sample period still owed by the data socket
    misalignment: usize,
}

impl TrignoClient<TcpStream> {
    /// Open both sockets and drain the command socket's greeting
    pub fn connect(settings: TrignoSettings, stop: StopSignal) -> ProtocolResult<Self> {
        let command = open_stream(&settings.host, settings.command_port, settings.timeout)?;
        let data = open_stream(&settings.host, settings.data_port, settings.timeout)?;
        let client = Self::from_transports(settings, command, data, stop)?;
        info!(
            host = %client.settings.host,
            command_port = client.settings.command_port,
            data_port = client.settings.data_port,
            "connected to Trigno base station"
        );
        Ok(client)
    }

    /// Drop both sockets and connect again
    pub fn reconnect(&mut self) -> ProtocolResult<()> {
        self.close();
        let command = open_stream(
            &self.settings.host,
            self.settings.command_port,
            self.settings.timeout,
        )?;
        let data = open_stream(&self.settings.host, self.settings.data_port, self.settings.timeout)?;
        self.attach(command, data)?;
        info!(host = %self.settings.host, "reconnected to Trigno base station");
        Ok(())
    }
}

impl<T: Transport> TrignoClient<T> {
    /// Build a client over already-open transports
    pub fn from_transports(
        settings: TrignoSettings,
        command: T,
        data: T,
        stop: StopSignal,
    ) -> ProtocolResult<Self> {
        let mut client = Self {
            settings,
            command: None,
            data: None,
            stop,
            stats: ClientStats::default(),
            misalignment: 0,
        };
        client.attach(command, data)?;
        Ok(client)
    }

    fn attach(&mut self, mut command: T, mut data: T) -> ProtocolResult<()> {
        let timeout = self.settings.timeout;
        command
            .apply_read_timeout(timeout)
            .map_err(|source| ProtocolError::Transport {
                operation: "configure command socket",
                source,
            })?;
        data.apply_read_timeout(timeout)
            .map_err(|source| ProtocolError::Transport {
                operation: "configure data socket",
                source,
            })?;

        let endpoint = format!("{}:{}", self.settings.host, self.settings.command_port);
        let mut greeting = [0u8; device::HANDSHAKE_MAX_BYTES];
        match command.read(&mut greeting) {
            Ok(0) => {
                return Err(ProtocolError::Handshake {
                    endpoint,
                    reason: "connection closed before greeting".to_string(),
                })
            }
            Ok(n) => debug!(
                greeting = %String::from_utf8_lossy(&greeting[..n]).trim(),
                "drained command greeting"
            ),
            Err(e) => {
                return Err(ProtocolError::Handshake {
                    endpoint,
                    reason: e.to_string(),
                })
            }
        }

        self.command = Some(command);
        self.data = Some(data);
        self.misalignment = 0;
        Ok(())
    }

    /// Send `START`
    pub fn start(&mut self) -> ProtocolResult<CommandReply> {
        self.send_command("START")
    }

    /// Send `STOP`
    pub fn stop(&mut self) -> ProtocolResult<CommandReply> {
        self.send_command("STOP")
    }

    /// Send `RESET`
    pub fn reset(&mut self) -> ProtocolResult<CommandReply> {
        self.send_command("RESET")
    }

    /// Send an ASCII command and read the reply
    ///
    /// A reply without the acknowledgement token, or no reply before the
    /// timeout, is logged and reported through [`CommandReply::acknowledged`].
    pub fn send_command(&mut self, command: &str) -> ProtocolResult<CommandReply> {
        let stream = self.command.as_mut().ok_or(ProtocolError::NotConnected)?;
        let wire = format!("{}{}", command, device::COMMAND_TERMINATOR);
        stream
            .write_all(wire.as_bytes())
            .and_then(|_| stream.flush())
            .map_err(|source| ProtocolError::Transport {
                operation: "send command",
                source,
            })?;

        let mut reply = [0u8; device::RESPONSE_MAX_BYTES];
        let text = match stream.read(&mut reply) {
            Ok(0) => return Err(ProtocolError::DeviceDisconnected { channel: "command" }),
            Ok(n) => String::from_utf8_lossy(&reply[..n]).into_owned(),
            Err(e) if is_timeout(&e) => String::new(),
            Err(source) => {
                return Err(ProtocolError::Transport {
                    operation: "read command reply",
                    source,
                })
            }
        };

        let acknowledged = text.contains(device::ACK_TOKEN);
        if !acknowledged {
            self.stats.unacknowledged_commands += 1;
            warn!(command, reply = %text.trim(), "command not acknowledged");
        }
        Ok(CommandReply { text, acknowledged })
    }

    /// Read one frame of `samples` sample periods from the data socket
    ///
    /// A timeout that cuts a sample period short zeroes that partial period,
    /// and the next read drops its remaining bytes so frames stay aligned.
    pub fn read_raw(&mut self, samples: usize) -> ProtocolResult<RawFrame> {
        let stride = frame_len(self.settings.total_channels, 1);
        let expected = frame_len(self.settings.total_channels, samples);
        if self.data.is_none() {
            return Err(ProtocolError::NotConnected);
        }
        let mut bytes = vec![0u8; expected];

        if self.misalignment > 0 {
            let mut stale = vec![0u8; self.misalignment];
            let mut dropped = 0;
            while dropped < stale.len() {
                match self.fill(&mut stale[dropped..])? {
                    Fill::Read(n) => {
                        dropped += n;
                        self.misalignment -= n;
                        self.stats.bytes_discarded += n as u64;
                    }
                    Fill::Cancelled => return Ok(RawFrame::Cancelled),
                    Fill::TimedOut => {
                        return Ok(RawFrame::Filled {
                            bytes,
                            fill: BlockFill::ZeroPadded { received_bytes: 0 },
                        })
                    }
                }
            }
            debug!(dropped, "realigned data stream to sample period");
        }

        let mut received = 0;
        while received < expected {
            match self.fill(&mut bytes[received..])? {
                Fill::Read(n) => received += n,
                Fill::Cancelled => return Ok(RawFrame::Cancelled),
                Fill::TimedOut => {
                    let partial = received % stride;
                    if partial != 0 {
                        bytes[received - partial..received].fill(0);
                        self.misalignment = stride - partial;
                    }
                    return Ok(RawFrame::Filled {
                        bytes,
                        fill: BlockFill::ZeroPadded {
                            received_bytes: received,
                        },
                    });
                }
            }
        }

        Ok(RawFrame::Filled {
            bytes,
            fill: BlockFill::Complete,
        })
    }

    /// One `recv` into `buf`, checking the stop flag first
    fn fill(&mut self, buf: &mut [u8]) -> ProtocolResult<Fill> {
        let stream = self.data.as_mut().ok_or(ProtocolError::NotConnected)?;
        loop {
            if self.stop.is_stop_requested() {
                return Ok(Fill::Cancelled);
            }
            match stream.read(buf) {
                Ok(0) => return Err(ProtocolError::DeviceDisconnected { channel: "data" }),
                Ok(n) => {
                    self.stats.bytes_received += n as u64;
                    return Ok(Fill::Read(n));
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if is_timeout(&e) => {
                    if self.stop.is_stop_requested() {
                        return Ok(Fill::Cancelled);
                    }
                    return Ok(Fill::TimedOut);
                }
                Err(source) => {
                    return Err(ProtocolError::Transport {
                        operation: "read data",
                        source,
                    })
                }
            }
        }
    }

    /// Read one block, keep the active rows and apply the output scale
    pub fn read_block(&mut self, samples: usize) -> ProtocolResult<ReadOutcome> {
        let (bytes, fill) = match self.read_raw(samples)? {
            RawFrame::Filled { bytes, fill } => (bytes, fill),
            RawFrame::Cancelled => return Ok(ReadOutcome::Cancelled),
        };

        let frame = decode_interleaved(&bytes, self.settings.total_channels, samples)?;
        let full = ChannelBlock::new(frame, self.settings.sample_rate_hz, current_timestamp_nanos());
        let block = full.select(&self.settings.selection, self.settings.output_scale())?;

        self.stats.blocks_read += 1;
        if matches!(fill, BlockFill::ZeroPadded { .. }) {
            self.stats.zero_filled_blocks += 1;
        }
        Ok(ReadOutcome::Block { block, fill })
    }

    /// Close both sockets. Safe to call more than once.
    pub fn close(&mut self) {
        for (name, stream) in [("command", self.command.take()), ("data", self.data.take())] {
            if let Some(mut stream) = stream {
                if let Err(e) = stream.close() {
                    debug!(socket = name, error = %e, "error while closing socket");
                }
            }
        }
    }

    /// Whether both sockets are open
    pub fn is_connected(&self) -> bool {
        self.command.is_some() && self.data.is_some()
    }

    /// Diagnostics counters
    pub fn stats(&self) -> ClientStats {
        self.stats
    }

    /// Connection settings
    pub fn settings(&self) -> &TrignoSettings {
        &self.settings
    }

    /// Handle to the stop flag checked by blocking reads
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }
}

impl<T: Transport> Drop for TrignoClient<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T: Transport> BlockSource for TrignoClient<T> {
    fn start(&mut self) -> ProtocolResult<()> {
        TrignoClient::start(self).map(|_| ())
    }

    fn read_block(&mut self, samples_per_block: usize) -> ProtocolResult<ReadOutcome> {
        TrignoClient::read_block(self, samples_per_block)
    }

    fn stop(&mut self) -> ProtocolResult<()> {
        TrignoClient::stop(self).map(|_| ())
    }

    fn channel_count(&self) -> usize {
        self.settings.selection.len()
    }

    fn sample_rate_hz(&self) -> f64 {
        self.settings.sample_rate_hz
    }
}

enum Fill {
    Read(usize),
    TimedOut,
    Cancelled,
}

fn is_timeout(error: &std::io::Error) -> bool {
    matches!(error.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

fn open_stream(host: &str, port: u16, timeout: Duration) -> ProtocolResult<TcpStream> {
    let endpoint = format!("{}:{}", host, port);
    let addrs = endpoint
        .to_socket_addrs()
        .map_err(|source| ProtocolError::Connection {
            endpoint: endpoint.clone(),
            source,
        })?;

    let mut last_error = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                if let Err(e) = stream.set_nodelay(true) {
                    debug!(error = %e, "could not disable Nagle on {}", endpoint);
                }
                return Ok(stream);
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(ProtocolError::Connection {
        source: last_error.unwrap_or_else(|| {
            std::io::Error::new(ErrorKind::AddrNotAvailable, "address did not resolve")
        }),
        endpoint,
    })
}
