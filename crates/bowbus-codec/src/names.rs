use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use bowbus_frame::{command, device};

use crate::config::NameTableConfig;
use crate::error::{CodecError, Result};

/// Code-to-name lookup for one category (devices, commands, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameTable {
    names: BTreeMap<u8, String>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, code: u8, name: impl Into<String>) {
        self.names.insert(code, name.into());
    }

    pub fn get(&self, code: u8) -> Option<&str> {
        self.names.get(&code).map(String::as_str)
    }

    /// `NAME(0c)` when named, `0c` otherwise.
    pub fn label(&self, code: u8) -> String {
        match self.get(code) {
            Some(name) => format!("{name}({code:02x})"),
            None => format!("{code:02x}"),
        }
    }

    /// `NAME` when named, `0c` otherwise.
    pub fn name_or_hex(&self, code: u8) -> String {
        match self.get(code) {
            Some(name) => name.to_string(),
            None => format!("{code:02x}"),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, &str)> {
        self.names.iter().map(|(code, name)| (*code, name.as_str()))
    }

    fn extend(&mut self, other: NameTable) {
        self.names.extend(other.names);
    }
}

impl<S: Into<String>> FromIterator<(u8, S)> for NameTable {
    fn from_iter<I: IntoIterator<Item = (u8, S)>>(iter: I) -> Self {
        Self {
            names: iter
                .into_iter()
                .map(|(code, name)| (code, name.into()))
                .collect(),
        }
    }
}

/// All name tables used when rendering messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameTables {
    pub types: NameTable,
    pub devices: NameTable,
    pub data_ids: NameTable,
    pub commands: NameTable,
}

/// On-disk layout: `{"types": {"0x00": "HANDOFF"}, "devices": {...}, "dataIds": {...}, "commands": {...}}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct NameTablesFile {
    #[serde(default)]
    types: BTreeMap<String, String>,
    #[serde(default)]
    devices: BTreeMap<String, String>,
    #[serde(default)]
    data_ids: BTreeMap<String, String>,
    #[serde(default)]
    commands: BTreeMap<String, String>,
}

impl NameTables {
    /// Empty tables: everything renders as hex.
    pub fn new() -> Self {
        Self::default()
    }

    /// Names known without any configuration: message kinds, the four
    /// bus devices and the decoded commands.
    pub fn builtin() -> Self {
        Self {
            types: [
                (0x00, "HANDOFF"),
                (0x01, "REQ"),
                (0x02, "RSP"),
                (0x03, "PONG"),
                (0x04, "PING"),
            ]
            .into_iter()
            .collect(),
            devices: [
                device::MOTOR,
                device::BATTERY,
                device::PC,
                device::DISPLAY,
            ]
            .into_iter()
            .map(|id| (id, device::device_name(id)))
            .collect(),
            data_ids: NameTable::new(),
            commands: [
                (command::GET_DATA, "GET DATA"),
                (command::PUT_DATA, "PUT DATA"),
                (command::WAKE_UP, "WAKE UP"),
                (command::ERROR_CODE, "ERROR"),
                (command::SERIAL, "SERIAL"),
                (command::BUTTON_CHECK, "BUTTON CHECK"),
                (command::DISPLAY_UPDATE, "DISPLAY UPDATE"),
                (command::DISPLAY_UPDATE_ALT, "DISPLAY UPDATE"),
                (command::DISPLAY_STATE, "DISPLAY STATE"),
                (command::MODE_CHANGE, "MODE CHANGE"),
            ]
            .into_iter()
            .collect(),
        }
    }

    /// Parse tables from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Self::from_json_str_with_config(json, &NameTableConfig::default())
    }

    fn from_json_str_with_config(json: &str, config: &NameTableConfig) -> Result<Self> {
        let file: NameTablesFile = serde_json::from_str(json)?;
        Ok(Self {
            types: convert_table("types", file.types, config)?,
            devices: convert_table("devices", file.devices, config)?,
            data_ids: convert_table("dataIds", file.data_ids, config)?,
            commands: convert_table("commands", file.commands, config)?,
        })
    }

    /// Load tables from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::from_file_with_config(path, &NameTableConfig::default())
    }

    /// Load tables from a JSON file with explicit limits.
    pub fn from_file_with_config(path: &Path, config: &NameTableConfig) -> Result<Self> {
        let file = std::fs::File::open(path)
            .map_err(|err| CodecError::NameTable(format!("{}: {err}", path.display())))?;
        let metadata = file
            .metadata()
            .map_err(|err| CodecError::NameTable(format!("{}: {err}", path.display())))?;
        if !metadata.is_file() {
            return Err(CodecError::NameTable(format!(
                "not a regular file: {}",
                path.display()
            )));
        }
        if metadata.len() > config.max_file_size as u64 {
            return Err(CodecError::NameTable(format!(
                "name table file too large ({} bytes, max {}): {}",
                metadata.len(),
                config.max_file_size,
                path.display()
            )));
        }

        let read_limit = u64::try_from(config.max_file_size.saturating_add(1)).unwrap_or(u64::MAX);
        let mut content = String::new();
        file.take(read_limit)
            .read_to_string(&mut content)
            .map_err(|err| CodecError::NameTable(format!("{}: {err}", path.display())))?;
        if content.len() > config.max_file_size {
            return Err(CodecError::NameTable(format!(
                "name table file grew during load: {}",
                path.display()
            )));
        }

        let tables = Self::from_json_str_with_config(&content, config)?;
        debug!(
            ?path,
            devices = tables.devices.len(),
            commands = tables.commands.len(),
            data_ids = tables.data_ids.len(),
            "loaded name tables"
        );
        Ok(tables)
    }

    /// Add `other`'s entries, replacing names for codes present in both.
    pub fn overlay(&mut self, other: NameTables) {
        self.types.extend(other.types);
        self.devices.extend(other.devices);
        self.data_ids.extend(other.data_ids);
        self.commands.extend(other.commands);
    }
}

fn convert_table(
    table: &str,
    entries: BTreeMap<String, String>,
    config: &NameTableConfig,
) -> Result<NameTable> {
    let mut out = NameTable::new();
    for (key, name) in entries {
        let code = parse_code(&key).ok_or_else(|| {
            CodecError::NameTable(format!("{table}: invalid code '{key}' (expected 0..=255)"))
        })?;
        let name: String = name.chars().take(config.max_name_len).collect();
        out.insert(code, name);
    }
    Ok(out)
}

/// Parse a table key: `0x1f`, `0X1F`, `#1f`, octal `017`, or decimal `31`.
pub fn parse_code(key: &str) -> Option<u8> {
    let key = key.trim();
    let (digits, radix) = if let Some(rest) = key
        .strip_prefix("0x")
        .or_else(|| key.strip_prefix("0X"))
        .or_else(|| key.strip_prefix('#'))
    {
        (rest, 16)
    } else if key.len() > 1 && key.starts_with('0') {
        (&key[1..], 8)
    } else {
        (key, 10)
    };
    if digits.is_empty() || digits.starts_with(['+', '-']) {
        return None;
    }
    u8::from_str_radix(digits, radix).ok()
}
