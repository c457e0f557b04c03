use shared::{
    error::OutOfRange,
    grid::{Color, ControlEvent, ControlId, Indicator},
};

const NOTE_OFF: u8 = 0x80;
const NOTE_ON: u8 = 0x90;
const CONTROL_CHANGE: u8 = 0xB0;
const TOP_STRIP_FIRST_CONTROLLER: u8 = 104;
const ROW_END_COLUMN: usize = 8;

/// Turns every LED off and resets the double-buffering mode.
pub const RESET: [u8; 3] = [CONTROL_CHANGE, 0x00, 0x00];

/// Velocity byte for a color: `0x0C | red | green << 4`, both 0..=3, with
/// the copy and clear flags set.
pub fn velocity(color: Color) -> u8 {
    let (red, green) = match color {
        Color::Off => (0, 0),
        Color::DimRed => (1, 0),
        Color::BrightRed => (3, 0),
        Color::DimGreen => (0, 1),
        Color::BrightGreen => (0, 3),
        Color::DimAmber => (1, 1),
        Color::BrightAmber => (3, 3),
        Color::Yellow => (2, 3),
    };
    0x0C | red | (green << 4)
}

/// Positions outside the 8x8 grid and its strips are rejected; every
/// accepted position fits in a MIDI data byte.
pub fn encode_indicator(indicator: Indicator, color: Color) -> Result<[u8; 3], OutOfRange> {
    let velocity = velocity(color);
    let message = match indicator.validate()? {
        Indicator::Selector(index) => [
            CONTROL_CHANGE,
            TOP_STRIP_FIRST_CONTROLLER + index as u8,
            velocity,
        ],
        Indicator::Cell { row, col } => [NOTE_ON, pad_note(row, col), velocity],
        Indicator::RowEnd(row) => [NOTE_ON, pad_note(row, ROW_END_COLUMN), velocity],
    };
    Ok(message)
}

fn pad_note(row: usize, col: usize) -> u8 {
    (row * 16 + col) as u8
}

/// Incremental MIDI parser supporting running status. Only note and control
/// change messages produce events.
#[derive(Debug, Default)]
pub struct MidiDecoder {
    status: Option<u8>,
    data: [u8; 2],
    len: usize,
}

impl MidiDecoder {
    pub fn push(&mut self, byte: u8) -> Option<ControlEvent> {
        // realtime bytes may appear anywhere and leave running status intact
        if byte >= 0xF8 {
            return None;
        }
        if byte & 0x80 != 0 {
            self.status = (byte < 0xF0).then_some(byte);
            self.len = 0;
            return None;
        }

        let status = self.status?;
        self.data[self.len] = byte;
        self.len += 1;
        let needed = match status & 0xF0 {
            0xC0 | 0xD0 => 1,
            _ => 2,
        };
        if self.len < needed {
            return None;
        }
        self.len = 0;

        let [first, second] = self.data;
        match status & 0xF0 {
            NOTE_ON => Some(ControlEvent {
                id: ControlId::Pad(first),
                pressed: second > 0,
            }),
            NOTE_OFF => Some(ControlEvent::released(ControlId::Pad(first))),
            CONTROL_CHANGE => Some(ControlEvent {
                id: ControlId::Top(first),
                pressed: second > 0,
            }),
            _ => None,
        }
    }
}
