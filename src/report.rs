use crate::frame::{CHARGER_REGISTER_COUNT, DeviceState};
use crate::protocol::DeviceInfo;
use serde::Serialize;
use std::fmt;
use uom::si::electric_current::ampere;
use uom::si::electric_potential::volt;
use uom::si::thermodynamic_temperature::degree_celsius;

/// Flattened view of one dump, in display units.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct StateReport {
    pub name: String,
    #[serde(rename = "descr")]
    pub description: String,
    pub temperature: f32,
    pub battery_voltage: f32,
    pub charging_current: f32,
    #[serde(rename = "HV-output-current")]
    pub hv_output_current: f32,
    #[serde(rename = "HV-output-voltage")]
    pub hv_output_voltage: f32,
    #[serde(rename = "USB-output-current")]
    pub usb_output_current: f32,
    pub battery_uptime: u32,
    pub bq24295_registers: [u8; CHARGER_REGISTER_COUNT],
    pub battery_overvoltage: bool,
    pub auto_send_statemachine: bool,
    pub virtual_serial_port_connected: bool,
    pub charging_port_plugged_in: bool,
    pub warnings_enabled: bool,
    pub charger_fault: bool,
    pub battery_too_cold: bool,
    pub battery_too_hot: bool,
    pub hv_output: bool,
    pub usb_output: bool,
}

impl StateReport {
    pub fn new(info: &DeviceInfo, state: &DeviceState) -> Self {
        Self {
            name: info.name.clone(),
            description: info.description.clone(),
            temperature: state.temperature.get::<degree_celsius>(),
            battery_voltage: state.battery_voltage.get::<volt>(),
            charging_current: state.charging_current.get::<ampere>(),
            hv_output_current: state.hv_output_current.get::<ampere>(),
            hv_output_voltage: state.hv_output_voltage.get::<volt>(),
            usb_output_current: state.usb_output_current.get::<ampere>(),
            battery_uptime: state.uptime_secs,
            bq24295_registers: state.charger_registers,
            battery_overvoltage: state.battery_overvoltage(),
            auto_send_statemachine: state.auto_send(),
            virtual_serial_port_connected: state.virtual_serial_connected(),
            charging_port_plugged_in: state.charging_port_plugged_in(),
            warnings_enabled: state.warnings_enabled(),
            charger_fault: state.charger_fault(),
            battery_too_cold: state.battery_too_cold(),
            battery_too_hot: state.battery_too_hot(),
            hv_output: state.hv_output_on(),
            usb_output: state.usb_output_on(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    fn notices(&self) -> impl Iterator<Item = &'static str> {
        [
            (self.battery_overvoltage, "Battery overvoltage!!"),
            (self.auto_send_statemachine, "Statemachine is in auto send mode"),
            (self.virtual_serial_port_connected, "Virtual serial port connected"),
            (self.charging_port_plugged_in, "Charging port plugged in"),
            (self.warnings_enabled, "Warnings enabled"),
            (self.charger_fault, "Charger fault"),
            (self.battery_too_cold, "Battery too cold!"),
            (self.battery_too_hot, "Battery too hot!!!"),
            (self.hv_output, "HV output on"),
            (self.usb_output, "USB output on"),
        ]
        .into_iter()
        .filter_map(|(set, text)| set.then_some(text))
    }
}

impl fmt::Display for StateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "name:\t{}", self.name)?;
        writeln!(f, "description:\t{}", self.description)?;
        writeln!(f, "temperature:\t{:.2} °C", self.temperature)?;
        writeln!(f, "battery voltage:\t{:.3} V", self.battery_voltage)?;
        writeln!(f, "charging current:\t{:.3} A", self.charging_current)?;
        writeln!(f, "HV output current:\t{:.3} A", self.hv_output_current)?;
        writeln!(f, "HV output voltage:\t{:.3} V", self.hv_output_voltage)?;
        writeln!(f, "USB output current:\t{:.3} A", self.usb_output_current)?;
        writeln!(f, "Battery uptime:\t{} seconds", self.battery_uptime)?;

        let registers: Vec<String> = self
            .bq24295_registers
            .iter()
            .map(|r| format!("{r:02x}"))
            .collect();
        writeln!(f, "BQ24295 registers:\t{}", registers.join(" "))?;

        for notice in self.notices() {
            writeln!(f, "{notice}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::RawFrame;
    use crate::mock::state_frame;

    fn report(flags: u8, outputs: u8) -> StateReport {
        let mut bytes = state_frame(flags);
        bytes[0..2].copy_from_slice(&2150i16.to_le_bytes());
        bytes[2..4].copy_from_slice(&3700i16.to_le_bytes());
        bytes[0x18] = 0x1f;
        bytes[0x21] = 0xa0;
        bytes[0x23] = outputs;
        bytes[0x24..0x28].copy_from_slice(&3600u32.to_le_bytes());
        let state = DeviceState::decode(&RawFrame::new(bytes)).unwrap();
        let info = DeviceInfo {
            name: "garage".to_string(),
            description: "PowerBank".to_string(),
        };
        StateReport::new(&info, &state)
    }

    #[test]
    fn json_uses_dump_field_names() {
        let json: serde_json::Value =
            serde_json::from_str(&report(0x20, 0x80).to_json().unwrap()).unwrap();

        assert_eq!(json["name"], "garage");
        assert_eq!(json["descr"], "PowerBank");
        assert_eq!(json["battery-uptime"], 3600);
        assert_eq!(json["charging-port-plugged-in"], true);
        assert_eq!(json["hv-output"], true);
        assert_eq!(json["usb-output"], false);
        assert_eq!(json["bq24295-registers"][0], 0x1f);
        assert_eq!(json["bq24295-registers"][9], 0xa0);
        assert!((json["battery-voltage"].as_f64().unwrap() - 3.7).abs() < 1e-4);
        assert!(json.get("HV-output-voltage").is_some());
        assert!(json.get("USB-output-current").is_some());
    }

    #[test]
    fn text_lists_only_set_flags() {
        let text = report(0x20 | 0x08, 0x40).to_string();

        assert!(text.contains("name:\tgarage\n"));
        assert!(text.contains("battery voltage:\t3.700 V\n"));
        assert!(text.contains("temperature:\t21.50 °C\n"));
        assert!(text.contains("Battery uptime:\t3600 seconds\n"));
        assert!(text.contains("BQ24295 registers:\t1f 00 00 00 00 00 00 00 00 a0\n"));
        assert!(text.contains("Charging port plugged in\n"));
        assert!(text.contains("Charger fault\n"));
        assert!(text.contains("USB output on\n"));
        assert!(!text.contains("HV output on"));
        assert!(!text.contains("Battery too hot"));
    }
}
