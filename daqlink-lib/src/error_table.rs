//! Device error codes.
//!
//! The chassis reports failed commands with an `Err<code>` response, where `<code>`
//! follows the SCPI error queue numbering. The table is provisional: it lists the
//! standard SCPI codes rather than a firmware-specific list, and unknown codes are
//! still reported, just without a description.

use crate::constants::DEVICE_ERROR_PREFIX;
use std::fmt;

const ERROR_TABLE: &[(i32, &str)] = &[
    (0, "No error"),
    (-100, "Command error"),
    (-101, "Invalid character"),
    (-102, "Syntax error"),
    (-103, "Invalid separator"),
    (-104, "Data type error"),
    (-108, "Parameter not allowed"),
    (-109, "Missing parameter"),
    (-110, "Command header error"),
    (-112, "Program mnemonic too long"),
    (-113, "Undefined header"),
    (-114, "Header suffix out of range"),
    (-120, "Numeric data error"),
    (-121, "Invalid character in number"),
    (-128, "Numeric data not allowed"),
    (-131, "Invalid suffix"),
    (-138, "Suffix not allowed"),
    (-141, "Invalid character data"),
    (-148, "Character data not allowed"),
    (-150, "String data error"),
    (-158, "String data not allowed"),
    (-200, "Execution error"),
    (-203, "Command protected"),
    (-211, "Trigger ignored"),
    (-213, "Init ignored"),
    (-220, "Parameter error"),
    (-221, "Settings conflict"),
    (-222, "Data out of range"),
    (-223, "Too much data"),
    (-224, "Illegal parameter value"),
    (-230, "Data corrupt or stale"),
    (-240, "Hardware error"),
    (-241, "Hardware missing"),
    (-250, "Mass storage error"),
    (-256, "File name not found"),
    (-300, "Device-specific error"),
    (-310, "System error"),
    (-321, "Out of memory"),
    (-350, "Queue overflow"),
    (-400, "Query error"),
    (-410, "Query interrupted"),
    (-420, "Query unterminated"),
    (-430, "Query deadlocked"),
];

/// Look up the description of a device error code.
pub fn describe(code: i32) -> Option<&'static str> {
    ERROR_TABLE
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, text)| *text)
}

/// An `Err<code>` response parsed from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceError {
    pub code: i32,
    pub description: Option<&'static str>,
}

impl DeviceError {
    /// Parse a response text. Returns `None` unless it starts with `Err`.
    ///
    /// A response starting with `Err` but carrying no readable number yields code 0
    /// with no description, so it is still reported.
    pub fn parse(response: &str) -> Option<Self> {
        let rest = response.strip_prefix(DEVICE_ERROR_PREFIX)?.trim_start();

        let digits_end = rest
            .char_indices()
            .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
            .map_or(rest.len(), |(i, _)| i);

        match rest[..digits_end].parse::<i32>() {
            Ok(code) => Some(Self {
                code,
                description: describe(code),
            }),
            Err(_) => Some(Self {
                code: 0,
                description: None,
            }),
        }
    }
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.description {
            Some(text) => write!(f, "device error {}: {}", self.code, text),
            None => write!(f, "device error {} (unknown code)", self.code),
        }
    }
}
