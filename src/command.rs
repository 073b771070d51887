use crate::error::{PowerbankError, Result};

/// Length of the name field, both in the set-name payload and the get-name reply
pub const NAME_LEN: usize = 16;

/// Number of charger-chip (BQ24295) register slots addressable by set-register
pub const CHARGER_REGISTER_SLOTS: i32 = 10;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum CommandCode {
    RequestName = 0x42,
    SetName = 0x43,
    RequestState = 0x70,
    SetChargerRegister = 0x71,
    IncrementHv = 0x73,
    DecrementHv = 0x74,
    UsbOn = 0x75,
    UsbOff = 0x76,
    HvOn = 0x77,
    HvOff = 0x78,
    RequestDescription = 0xFF,
}

impl CommandCode {
    /// Requests that the device answers with a reply.
    #[must_use]
    pub fn expects_reply(self) -> bool {
        matches!(
            self,
            CommandCode::RequestState | CommandCode::RequestName | CommandCode::RequestDescription
        )
    }
}

/// Write-only actuator commands. None of these are acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Step the HV rail up one of its 64 levels
    IncrementHv,
    /// Step the HV rail down one of its 64 levels
    DecrementHv,
    /// Switch the USB output
    UsbOutput(bool),
    /// Switch the HV output
    HvOutput(bool),
    /// Store a new device name, zero-padded
    SetName([u8; NAME_LEN]),
    /// Write a charger-chip register slot
    SetChargerRegister(RegisterWrite),
}

/// A validated charger register write; only `Command::set_charger_register`
/// builds one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterWrite {
    /// ASCII digit naming the slot
    slot: u8,
    value: u8,
}

impl RegisterWrite {
    pub fn index(&self) -> u8 {
        self.slot - b'0'
    }

    /// The byte actually sent, after truncation.
    pub fn value(&self) -> u8 {
        self.value
    }
}

impl Command {
    /// Parse an on/off parameter for the USB output.
    ///
    /// Only a case-insensitive "on" switches the output on; anything else
    /// switches it off.
    pub fn usb_output(parameter: Option<&str>) -> Result<Self> {
        parse_switch(parameter).map(Command::UsbOutput)
    }

    /// Parse an on/off parameter for the HV output.
    pub fn hv_output(parameter: Option<&str>) -> Result<Self> {
        parse_switch(parameter).map(Command::HvOutput)
    }

    pub fn set_name(name: &str) -> Result<Self> {
        let bytes = name.as_bytes();
        if bytes.len() > NAME_LEN {
            return Err(PowerbankError::NameTooLong {
                len: bytes.len(),
                max: NAME_LEN,
            });
        }

        let mut payload = [0u8; NAME_LEN];
        payload[..bytes.len()].copy_from_slice(bytes);
        Ok(Command::SetName(payload))
    }

    /// Build a charger register write.
    ///
    /// The value goes out as two hex-nibble characters; anything above 0xff
    /// loses its upper bits.
    pub fn set_charger_register(index: i32, value: Option<u32>) -> Result<Self> {
        let value = value.ok_or(PowerbankError::MissingParameter)?;

        if !(0..CHARGER_REGISTER_SLOTS).contains(&index) {
            return Err(PowerbankError::IndexOutOfRange(index));
        }
        let slot = char::from_digit(index as u32, 10)
            .ok_or(PowerbankError::IndexOutOfRange(index))? as u8;

        if value > 0xFF {
            tracing::warn!(
                "Register value {} does not fit in one byte, sending 0x{:02x}",
                value,
                value & 0xFF
            );
        }

        Ok(Command::SetChargerRegister(RegisterWrite {
            slot,
            value: (value & 0xFF) as u8,
        }))
    }

    pub const fn code(&self) -> CommandCode {
        match self {
            Command::IncrementHv => CommandCode::IncrementHv,
            Command::DecrementHv => CommandCode::DecrementHv,
            Command::UsbOutput(true) => CommandCode::UsbOn,
            Command::UsbOutput(false) => CommandCode::UsbOff,
            Command::HvOutput(true) => CommandCode::HvOn,
            Command::HvOutput(false) => CommandCode::HvOff,
            Command::SetName(_) => CommandCode::SetName,
            Command::SetChargerRegister(_) => CommandCode::SetChargerRegister,
        }
    }

    /// Bytes following the command code on the wire.
    pub fn payload(&self) -> Vec<u8> {
        match self {
            Command::SetName(name) => name.to_vec(),
            Command::SetChargerRegister(write) => vec![
                write.slot,
                hex_nibble(write.value >> 4),
                hex_nibble(write.value),
            ],
            _ => Vec::new(),
        }
    }

    /// Full wire encoding: command code followed by the payload.
    pub fn encode(&self) -> Vec<u8> {
        let payload = self.payload();
        let mut bytes = Vec::with_capacity(1 + payload.len());
        bytes.push(self.code() as u8);
        bytes.extend(payload);
        bytes
    }
}

fn parse_switch(parameter: Option<&str>) -> Result<bool> {
    let parameter = parameter.ok_or(PowerbankError::MissingParameter)?;
    Ok(parameter.eq_ignore_ascii_case("on"))
}

fn hex_nibble(v: u8) -> u8 {
    match v & 0x0F {
        n @ 0..=9 => b'0' + n,
        n => b'a' + n - 10,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_requests_expect_replies() {
        assert!(CommandCode::RequestState.expects_reply());
        assert!(CommandCode::RequestDescription.expects_reply());
        assert!(!CommandCode::HvOn.expects_reply());
        assert!(!CommandCode::SetName.expects_reply());
    }

    #[test]
    fn switch_parameter_is_case_insensitive() {
        assert_eq!(Command::hv_output(Some("ON")).unwrap().encode(), vec![0x77]);
        assert_eq!(Command::hv_output(Some("on")).unwrap().encode(), vec![0x77]);
        assert_eq!(Command::hv_output(Some("off")).unwrap().encode(), vec![0x78]);
        assert_eq!(Command::hv_output(Some("yes")).unwrap().encode(), vec![0x78]);
        assert_eq!(Command::usb_output(Some("On")).unwrap().encode(), vec![0x75]);
        assert_eq!(Command::usb_output(Some("")).unwrap().encode(), vec![0x76]);
    }

    #[test]
    fn switch_without_parameter_fails() {
        assert!(matches!(
            Command::usb_output(None),
            Err(PowerbankError::MissingParameter)
        ));
        assert!(matches!(
            Command::hv_output(None),
            Err(PowerbankError::MissingParameter)
        ));
    }

    #[test]
    fn hv_steps_are_single_bytes() {
        assert_eq!(Command::IncrementHv.encode(), vec![0x73]);
        assert_eq!(Command::DecrementHv.encode(), vec![0x74]);
    }

    #[test]
    fn name_is_zero_padded_to_sixteen_bytes() {
        let encoded = Command::set_name("bank").unwrap().encode();
        assert_eq!(encoded.len(), 1 + NAME_LEN);
        assert_eq!(encoded[0], 0x43);
        assert_eq!(&encoded[1..5], b"bank");
        assert!(encoded[5..].iter().all(|&b| b == 0));
    }

    #[test]
    fn name_of_exactly_sixteen_bytes_is_accepted() {
        let encoded = Command::set_name("0123456789abcdef").unwrap().encode();
        assert_eq!(&encoded[1..], b"0123456789abcdef");
    }

    #[test]
    fn empty_name_clears() {
        let encoded = Command::set_name("").unwrap().encode();
        assert_eq!(encoded, [&[0x43][..], &[0u8; NAME_LEN][..]].concat());
    }

    #[test]
    fn long_name_is_rejected() {
        assert!(matches!(
            Command::set_name("0123456789abcdefg"),
            Err(PowerbankError::NameTooLong { len: 17, max: 16 })
        ));
    }

    #[test]
    fn register_index_is_bounded() {
        assert!(matches!(
            Command::set_charger_register(10, Some(1)),
            Err(PowerbankError::IndexOutOfRange(10))
        ));
        assert!(matches!(
            Command::set_charger_register(-1, Some(1)),
            Err(PowerbankError::IndexOutOfRange(-1))
        ));
    }

    #[test]
    fn register_value_is_required() {
        assert!(matches!(
            Command::set_charger_register(0, None),
            Err(PowerbankError::MissingParameter)
        ));
    }

    #[test]
    fn register_write_encodes_digit_and_hex_nibbles() {
        let encoded = Command::set_charger_register(9, Some(255)).unwrap().encode();
        assert_eq!(encoded, vec![0x71, b'9', b'f', b'f']);

        let encoded = Command::set_charger_register(0, Some(0x3a)).unwrap().encode();
        assert_eq!(encoded, vec![0x71, b'0', b'3', b'a']);
    }

    #[test]
    fn register_value_is_truncated_to_a_byte() {
        let encoded = Command::set_charger_register(2, Some(0x1b7)).unwrap().encode();
        assert_eq!(encoded, vec![0x71, b'2', b'b', b'7']);
    }

    #[test]
    fn every_valid_slot_encodes_as_a_digit() {
        for index in 0..CHARGER_REGISTER_SLOTS {
            let command = Command::set_charger_register(index, Some(0xff)).unwrap();
            let Command::SetChargerRegister(write) = command else {
                panic!("unexpected command {command:?}");
            };
            assert_eq!(i32::from(write.index()), index);
            assert_eq!(write.value(), 0xff);
            assert!(command.payload()[0].is_ascii_digit());
        }
    }

    #[test]
    fn far_out_of_range_index_is_rejected() {
        for index in [12, 207, 230, i32::MAX, i32::MIN] {
            assert!(matches!(
                Command::set_charger_register(index, Some(0xff)),
                Err(PowerbankError::IndexOutOfRange(i)) if i == index
            ));
        }
    }
}
