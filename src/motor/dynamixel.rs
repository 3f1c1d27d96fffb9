// Dynamixel Protocol 2.0 serial transport
//
// Instruction packet: [0xFF, 0xFF, 0xFD, 0x00, ID, LEN_L, LEN_H, Instruction, Params..., CRC_L, CRC_H]
// Status packet:      [0xFF, 0xFF, 0xFD, 0x00, ID, LEN_L, LEN_H, 0x55, Error, Params..., CRC_L, CRC_H]

use serialport::{ClearBuffer, DataBits, Parity, SerialPort, StopBits};
use std::io::{Read, Write};
use std::time::Duration;
use tracing::{debug, warn};

use super::protocol::{BusError, Protocol, Result};
use crate::config::{BAUD_RATE, INTER_CHAR_TIMEOUT, RESPONSE_TIMEOUT};

/// Packet header bytes
const HEADER: [u8; 4] = [0xFF, 0xFF, 0xFD, 0x00];

/// Header + ID + LEN_L + LEN_H
const HEADER_LEN: usize = 7;

/// Instruction byte carried by every status packet
const STATUS_INSTRUCTION: u8 = 0x55;

/// Set in the error byte when the device has a latched hardware fault
const ALERT_BIT: u8 = 0x80;

/// Instruction set
#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum Instruction {
    Ping = 0x01,
    Read = 0x02,
    Write = 0x03,
}

/// Dynamixel bus - handles serial communication with motors
pub struct DynamixelBus {
    port: Box<dyn SerialPort>,
    timeout: Duration,
}

impl DynamixelBus {
    /// Open the bus at 57600 8N1 and drop anything already buffered
    pub fn open(port_name: &str) -> Result<Self> {
        let mut port = serialport::new(port_name, BAUD_RATE)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(RESPONSE_TIMEOUT)
            .open()?;
        port.clear(ClearBuffer::Input)?;

        Ok(Self {
            port,
            timeout: RESPONSE_TIMEOUT,
        })
    }

    /// CRC-16 (polynomial 0x8005) over everything before the CRC field
    fn crc(data: &[u8]) -> u16 {
        crc16::State::<crc16::BUYPASS>::calculate(data)
    }

    /// Insert 0xFD after every 0xFF 0xFF 0xFD run so the payload never looks like a header
    fn stuff(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(data.len() + 2);
        for &byte in data {
            out.push(byte);
            if out.ends_with(&HEADER[..3]) {
                out.push(0xFD);
            }
        }
        out
    }

    /// Undo `stuff`
    fn unstuff(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(data.len());
        let mut bytes = data.iter().copied().peekable();
        while let Some(byte) = bytes.next() {
            out.push(byte);
            if out.ends_with(&HEADER[..3]) && bytes.peek() == Some(&0xFD) {
                bytes.next();
            }
        }
        out
    }

    /// Build a packet with header, stuffed body and CRC
    fn build_packet(id: u8, instruction: Instruction, params: &[u8]) -> Vec<u8> {
        let mut body = Vec::with_capacity(params.len() + 1);
        body.push(instruction as u8);
        body.extend_from_slice(params);
        let body = Self::stuff(&body);

        let length = (body.len() + 2) as u16; // body + CRC
        let mut packet = Vec::with_capacity(HEADER_LEN + body.len() + 2);

        packet.extend_from_slice(&HEADER);
        packet.push(id);
        packet.extend_from_slice(&length.to_le_bytes());
        packet.extend_from_slice(&body);

        let crc = Self::crc(&packet);
        packet.extend_from_slice(&crc.to_le_bytes());

        packet
    }

    /// Validate a complete status packet and return its parameters
    fn parse_status(expected_id: u8, packet: &[u8]) -> Result<Vec<u8>> {
        let invalid = |reason: String| BusError::InvalidResponse {
            id: expected_id,
            reason,
        };

        // Header + instruction + error + CRC
        if packet.len() < HEADER_LEN + 4 {
            return Err(invalid(format!("Packet too short: {} bytes", packet.len())));
        }

        if packet[..4] != HEADER {
            return Err(invalid(format!("Invalid header: {:02X?}", &packet[..4])));
        }

        let id = packet[4];
        if id != expected_id {
            return Err(invalid(format!(
                "ID mismatch: expected {}, got {}",
                expected_id, id
            )));
        }

        let length = u16::from_le_bytes([packet[5], packet[6]]) as usize;
        if packet.len() != HEADER_LEN + length {
            return Err(invalid(format!(
                "Length mismatch: header says {}, got {}",
                length,
                packet.len() - HEADER_LEN
            )));
        }

        let end = packet.len();
        let received_crc = u16::from_le_bytes([packet[end - 2], packet[end - 1]]);
        if Self::crc(&packet[..end - 2]) != received_crc {
            return Err(BusError::ChecksumMismatch { id });
        }

        let body = Self::unstuff(&packet[HEADER_LEN..end - 2]);
        if body.len() < 2 || body[0] != STATUS_INSTRUCTION {
            return Err(invalid(format!("Not a status packet: {:02X?}", body)));
        }

        let error_status = body[1];
        if error_status & ALERT_BIT != 0 {
            warn!("Motor {} reports a hardware alert", id);
        }
        if error_status & !ALERT_BIT != 0 {
            return Err(BusError::DeviceError {
                id,
                status: error_status,
            });
        }

        Ok(body[2..].to_vec())
    }

    fn send_packet(&mut self, packet: &[u8]) -> Result<()> {
        debug!("TX {:02X?}", packet);
        self.port.write_all(packet)?;
        self.port.flush()?;
        Ok(())
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        if self.timeout != timeout {
            self.port.set_timeout(timeout)?;
            self.timeout = timeout;
        }
        Ok(())
    }

    fn read_exact(&mut self, id: u8, buf: &mut [u8]) -> Result<()> {
        self.port.read_exact(buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::TimedOut {
                BusError::Timeout { id }
            } else {
                BusError::Io(e)
            }
        })
    }

    /// Read a response packet
    fn read_response(&mut self, expected_id: u8) -> Result<Vec<u8>> {
        let mut packet = vec![0u8; HEADER_LEN];

        // The device gets the response timeout to start answering, then the
        // rest of the packet has to keep arriving within the inter-character timeout
        self.set_timeout(RESPONSE_TIMEOUT)?;
        self.read_exact(expected_id, &mut packet)?;

        if packet[..4] != HEADER {
            return Err(BusError::InvalidResponse {
                id: expected_id,
                reason: format!("Invalid header: {:02X?}", &packet[..4]),
            });
        }

        let length = u16::from_le_bytes([packet[5], packet[6]]) as usize;
        packet.resize(HEADER_LEN + length, 0);

        self.set_timeout(INTER_CHAR_TIMEOUT)?;
        self.read_exact(expected_id, &mut packet[HEADER_LEN..])?;
        debug!("RX {:02X?}", packet);

        Self::parse_status(expected_id, &packet)
    }
}

impl Protocol for DynamixelBus {
    fn ping(&mut self, id: u8) -> Result<()> {
        let packet = Self::build_packet(id, Instruction::Ping, &[]);
        self.send_packet(&packet)?;

        let _ = self.read_response(id)?;
        Ok(())
    }

    fn read_register(&mut self, id: u8, address: u16, len: u16) -> Result<Vec<u8>> {
        let [addr_l, addr_h] = address.to_le_bytes();
        let [len_l, len_h] = len.to_le_bytes();
        let packet = Self::build_packet(id, Instruction::Read, &[addr_l, addr_h, len_l, len_h]);
        debug!("Read from motor {}: addr={}, len={}", id, address, len);
        self.send_packet(&packet)?;

        let response = self.read_response(id)?;
        if response.len() != len as usize {
            return Err(BusError::InvalidResponse {
                id,
                reason: format!("Expected {} bytes, got {}", len, response.len()),
            });
        }
        Ok(response)
    }

    fn write_register(&mut self, id: u8, address: u16, data: &[u8]) -> Result<()> {
        let mut params = Vec::with_capacity(data.len() + 2);
        params.extend_from_slice(&address.to_le_bytes());
        params.extend_from_slice(data);
        let packet = Self::build_packet(id, Instruction::Write, &params);
        debug!("Write to motor {}: addr={}, data={:02X?}", id, address, data);
        self.send_packet(&packet)?;

        // Read status response
        let _ = self.read_response(id)?;
        Ok(())
    }
}
