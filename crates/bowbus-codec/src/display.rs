//! Fixed layouts of the display and mode-change commands.

use crate::error::{byte_at, take, Result};
use crate::format::hex;

/// Two-bit blink state of one display segment.
fn blink(name: &str, byte: u8, shift: u32) -> String {
    let state = match byte.rotate_right(shift) & 0x03 {
        0x01 => ":FST",
        0x02 => ":SLW",
        0x03 => ":SOL",
        _ => return String::new(),
    };
    format!("{name}{state} ")
}

/// Display update (`0x26` / `0x27`): segment blink states, battery
/// percentage, speed digits and distance digits.
pub fn render_update(payload: &[u8]) -> Result<String> {
    let segments = take(payload, 0, 3)?;
    let percent = byte_at(payload, 3)?;
    let speed = hex(take(payload, 4, 2)?);
    let distance = hex(take(payload, 6, 3)?);

    let mut out = String::from(": ");
    for (name, shift) in [("OFF", 0), ("ECO", 2), ("NRM", 4), ("POW", 6)] {
        out.push_str(&blink(name, segments[0], shift));
    }
    for (name, shift) in [("WRE", 0), ("TOT", 2), ("TRP", 4), ("LIG", 6)] {
        out.push_str(&blink(name, segments[1], shift));
    }
    for (name, shift) in [("BAR", 0), ("COM", 4), ("KM", 6)] {
        out.push_str(&blink(name, segments[2], shift));
    }

    out.push_str(&format!("{percent:02}% "));
    out.push_str(&format!("'{}.{}' ", &speed[1..3], &speed[3..]));

    // nibble 0xc is a blank digit, 0xa a dash
    let digits: String = distance[1..]
        .chars()
        .map(|c| match c {
            'c' => ' ',
            'a' => '-',
            other => other,
        })
        .collect();
    out.push_str(&format!("'{digits}' "));
    Ok(out)
}

/// Display state (`0x28`): screen, assist level, flags and trip counters.
pub fn render_state(payload: &[u8]) -> Result<String> {
    let header = take(payload, 0, 3)?;
    let speed = take(payload, 3, 2)?;
    let trip1 = take(payload, 5, 4)?;
    let trip2 = take(payload, 9, 4)?;

    let (screen, assist, flags) = (header[0], header[1], header[2]);
    let screen_name = match screen {
        0x00 | 0x03 => "MAIN",
        0x01 => "BAT+CHRG",
        0x02 => "BAT",
        _ => "???",
    };
    let assist_name = match assist {
        0x00 => "OFF",
        0x01 => "1",
        0x02 => "2",
        0x03 => "3",
        0x04 => "P",
        0x05 => "R",
        0x06 => "4",
        _ => "???",
    };

    let mut out = format!(": SCR:{screen_name}({screen}) ASS:{assist_name}({assist}) ");
    if flags & 0x08 != 0 {
        out.push_str("SCR:ON ");
    }
    if flags & 0x01 != 0 {
        out.push_str("LIGHT ");
    }
    if flags & 0x04 != 0 {
        out.push_str("RANGE_EXT ");
    }

    let speed = u16::from_be_bytes([speed[0], speed[1]]);
    let trip1 = u32::from_be_bytes([trip1[0], trip1[1], trip1[2], trip1[3]]);
    let trip2 = u32::from_be_bytes([trip2[0], trip2[1], trip2[2], trip2[3]]);
    out.push_str(&format!("speed:{speed} trip1:{trip1} trip2:{trip2} "));
    Ok(out)
}

/// Mode change (`0x34`): the selected assist mode.
pub fn render_mode_change(payload: &[u8]) -> Result<String> {
    let mode = byte_at(payload, 0)?;
    Ok(match mode {
        0x00 => String::new(),
        0x01 => " > ECO".to_string(),
        0x02 => " > NORMAL".to_string(),
        0x03 => " > POWER".to_string(),
        other => format!(" > ???({other})"),
    })
}
