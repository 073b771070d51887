//! Status frame layout and decoding.
//!
//! Layout of the 51-byte reply to a status request (all multi-byte fields
//! little-endian):
//!
//! | Offset      | Width | Field                                   |
//! |-------------|-------|-----------------------------------------|
//! | 0x00        | 2     | temperature, signed, 1/100 °C           |
//! | 0x02        | 2     | battery voltage, signed, mV             |
//! | 0x04        | 2     | charging current, signed, mA            |
//! | 0x06        | 2     | HV output current, signed, mA           |
//! | 0x08        | 2     | USB output current, signed, mA          |
//! | 0x0a        | 2     | HV output voltage, signed, mV           |
//! | 0x18..=0x21 | 10    | BQ24295 charger register shadow         |
//! | 0x22        | 1     | status flags                            |
//! | 0x23        | 1     | output flags                            |
//! | 0x24        | 4     | battery uptime, unsigned, seconds       |

use crate::error::{PowerbankError, Result};
use bitflags::bitflags;
use byteorder::{ByteOrder, LittleEndian};
use uom::si::electric_current::ampere;
use uom::si::electric_potential::volt;
use uom::si::f32::{ElectricCurrent, ElectricPotential, ThermodynamicTemperature};
use uom::si::thermodynamic_temperature::degree_celsius;

pub const FRAME_LEN: usize = 51;
pub const CHARGER_REGISTER_COUNT: usize = 10;

const TEMPERATURE_OFFSET: usize = 0x00;
const BATTERY_VOLTAGE_OFFSET: usize = 0x02;
const CHARGING_CURRENT_OFFSET: usize = 0x04;
const HV_OUTPUT_CURRENT_OFFSET: usize = 0x06;
const USB_OUTPUT_CURRENT_OFFSET: usize = 0x08;
const HV_OUTPUT_VOLTAGE_OFFSET: usize = 0x0a;
const CHARGER_REGISTERS_OFFSET: usize = 0x18;
const STATUS_FLAGS_OFFSET: usize = 0x22;
const OUTPUT_FLAGS_OFFSET: usize = 0x23;
const UPTIME_OFFSET: usize = 0x24;

const TEMPERATURE_DIVISOR: f32 = 100.0;
const MILLI_DIVISOR: f32 = 1000.0;

bitflags! {
    #[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
    pub struct StatusFlags: u8 {
        const AUTO_SEND = 1 << 7;
        const VIRTUAL_SERIAL_CONNECTED = 1 << 6;
        const CHARGING_PORT_PLUGGED_IN = 1 << 5;
        const WARNINGS_ENABLED = 1 << 4;
        const CHARGER_FAULT = 1 << 3;
        const BATTERY_OVERVOLTAGE = 1 << 2;
        const BATTERY_TOO_COLD = 1 << 1;
        const BATTERY_TOO_HOT = 1 << 0;
    }
}

bitflags! {
    #[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
    pub struct OutputFlags: u8 {
        const HV_OUTPUT_ON = 1 << 7;
        const USB_OUTPUT_ON = 1 << 6;
    }
}

/// Undecoded reply to a status request.
///
/// Holds whatever bytes were received; each accessor checks that the bytes
/// it needs are present and fails with `MalformedFrame` otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame(Vec<u8>);

impl RawFrame {
    #[must_use]
    pub const fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn field(&self, offset: usize, width: usize) -> Result<&[u8]> {
        offset
            .checked_add(width)
            .and_then(|end| self.0.get(offset..end))
            .ok_or(PowerbankError::MalformedFrame {
                offset,
                width,
                len: self.0.len(),
            })
    }

    fn read_i16(&self, offset: usize) -> Result<i16> {
        self.field(offset, 2).map(LittleEndian::read_i16)
    }

    pub fn temperature(&self) -> Result<ThermodynamicTemperature> {
        let raw = self.read_i16(TEMPERATURE_OFFSET)?;
        Ok(ThermodynamicTemperature::new::<degree_celsius>(
            raw as f32 / TEMPERATURE_DIVISOR,
        ))
    }

    /// Signed 16-bit milli-unit value at `offset`, scaled to whole units.
    pub fn milli(&self, offset: usize) -> Result<f32> {
        Ok(self.read_i16(offset)? as f32 / MILLI_DIVISOR)
    }

    pub fn battery_voltage(&self) -> Result<ElectricPotential> {
        Ok(ElectricPotential::new::<volt>(self.milli(BATTERY_VOLTAGE_OFFSET)?))
    }

    pub fn charging_current(&self) -> Result<ElectricCurrent> {
        Ok(ElectricCurrent::new::<ampere>(self.milli(CHARGING_CURRENT_OFFSET)?))
    }

    pub fn hv_output_current(&self) -> Result<ElectricCurrent> {
        Ok(ElectricCurrent::new::<ampere>(self.milli(HV_OUTPUT_CURRENT_OFFSET)?))
    }

    pub fn usb_output_current(&self) -> Result<ElectricCurrent> {
        Ok(ElectricCurrent::new::<ampere>(self.milli(USB_OUTPUT_CURRENT_OFFSET)?))
    }

    pub fn hv_output_voltage(&self) -> Result<ElectricPotential> {
        Ok(ElectricPotential::new::<volt>(self.milli(HV_OUTPUT_VOLTAGE_OFFSET)?))
    }

    pub fn charger_registers(&self) -> Result<[u8; CHARGER_REGISTER_COUNT]> {
        let mut registers = [0u8; CHARGER_REGISTER_COUNT];
        registers.copy_from_slice(self.field(CHARGER_REGISTERS_OFFSET, CHARGER_REGISTER_COUNT)?);
        Ok(registers)
    }

    pub fn status_flags(&self) -> Result<StatusFlags> {
        let raw = self.field(STATUS_FLAGS_OFFSET, 1)?[0];
        Ok(StatusFlags::from_bits_retain(raw))
    }

    pub fn output_flags(&self) -> Result<OutputFlags> {
        let raw = self.field(OUTPUT_FLAGS_OFFSET, 1)?[0];
        Ok(OutputFlags::from_bits_retain(raw))
    }

    /// Battery uptime in seconds.
    pub fn uptime(&self) -> Result<u32> {
        self.field(UPTIME_OFFSET, 4).map(LittleEndian::read_u32)
    }
}

/// Decoded snapshot of one status frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceState {
    pub temperature: ThermodynamicTemperature,
    pub battery_voltage: ElectricPotential,
    pub charging_current: ElectricCurrent,
    pub hv_output_current: ElectricCurrent,
    pub usb_output_current: ElectricCurrent,
    pub hv_output_voltage: ElectricPotential,
    pub charger_registers: [u8; CHARGER_REGISTER_COUNT],
    pub status: StatusFlags,
    pub outputs: OutputFlags,
    pub uptime_secs: u32,
}

impl DeviceState {
    pub fn decode(frame: &RawFrame) -> Result<Self> {
        Ok(Self {
            temperature: frame.temperature()?,
            battery_voltage: frame.battery_voltage()?,
            charging_current: frame.charging_current()?,
            hv_output_current: frame.hv_output_current()?,
            usb_output_current: frame.usb_output_current()?,
            hv_output_voltage: frame.hv_output_voltage()?,
            charger_registers: frame.charger_registers()?,
            status: frame.status_flags()?,
            outputs: frame.output_flags()?,
            uptime_secs: frame.uptime()?,
        })
    }

    pub fn auto_send(&self) -> bool {
        self.status.contains(StatusFlags::AUTO_SEND)
    }

    pub fn virtual_serial_connected(&self) -> bool {
        self.status.contains(StatusFlags::VIRTUAL_SERIAL_CONNECTED)
    }

    pub fn charging_port_plugged_in(&self) -> bool {
        self.status.contains(StatusFlags::CHARGING_PORT_PLUGGED_IN)
    }

    pub fn warnings_enabled(&self) -> bool {
        self.status.contains(StatusFlags::WARNINGS_ENABLED)
    }

    pub fn charger_fault(&self) -> bool {
        self.status.contains(StatusFlags::CHARGER_FAULT)
    }

    pub fn battery_overvoltage(&self) -> bool {
        self.status.contains(StatusFlags::BATTERY_OVERVOLTAGE)
    }

    pub fn battery_too_cold(&self) -> bool {
        self.status.contains(StatusFlags::BATTERY_TOO_COLD)
    }

    pub fn battery_too_hot(&self) -> bool {
        self.status.contains(StatusFlags::BATTERY_TOO_HOT)
    }

    pub fn hv_output_on(&self) -> bool {
        self.outputs.contains(OutputFlags::HV_OUTPUT_ON)
    }

    pub fn usb_output_on(&self) -> bool {
        self.outputs.contains(OutputFlags::USB_OUTPUT_ON)
    }
}

/// Decode the leading `len` bytes of a reply as a NUL-padded ASCII string.
///
/// Bytes past `len` belong to the protocol, not the string, and are ignored.
pub fn decode_padded_ascii(reply: &[u8], len: usize) -> Result<String> {
    let field = reply.get(..len).ok_or(PowerbankError::MalformedFrame {
        offset: 0,
        width: len,
        len: reply.len(),
    })?;
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    Ok(String::from_utf8_lossy(&field[..end]).into_owned())
}
