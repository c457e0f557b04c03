//! Launchpad Mini driver over a raw MIDI byte stream.
//!
//! Output uses note-on messages for the square pads (`row * 16 + col`, the
//! row-end pads sit at column 8) and control changes 104..=111 for the top
//! strip. Input is decoded into [`ControlEvent`]s on a dedicated thread.

use std::{
    fs::{File, OpenOptions},
    io::{Read, Write},
    path::Path,
    thread::{self, JoinHandle},
};

use shared::grid::{Color, ControlEvent, GridDevice, Indicator, GRID_SIZE};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub mod codec;

pub use codec::MidiDecoder;

#[derive(Debug, Error)]
pub enum MidiError {
    #[error("failed to open MIDI device '{path}': {source}")]
    Open {
        path: String,
        source: std::io::Error,
    },
    #[error("MIDI write failed: {0}")]
    Write(#[from] std::io::Error),
}

pub struct LaunchpadGrid<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> LaunchpadGrid<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn send(&mut self, message: [u8; 3]) -> Result<(), MidiError> {
        self.out.write_all(&message)?;
        self.out.flush()?;
        Ok(())
    }
}

impl LaunchpadGrid<File> {
    /// Opens a raw MIDI device node (e.g. `/dev/snd/midiC1D0`) and returns
    /// the grid plus a second handle on the same node for reading input.
    pub fn open(path: impl AsRef<Path>) -> Result<(Self, File), MidiError> {
        let path = path.as_ref();
        let open_error = |source| MidiError::Open {
            path: path.display().to_string(),
            source,
        };
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(open_error)?;
        let input = file.try_clone().map_err(open_error)?;
        Ok((Self::new(file), input))
    }
}

impl<W: Write + Send> GridDevice for LaunchpadGrid<W> {
    fn set_indicator(&mut self, indicator: Indicator, color: Color) -> anyhow::Result<()> {
        let message = codec::encode_indicator(indicator, color)?;
        Ok(self.send(message)?)
    }

    fn clear_row(&mut self, row: usize) -> anyhow::Result<()> {
        let row_end = Indicator::row_end(row)?;
        for col in 0..GRID_SIZE {
            self.set_indicator(Indicator::cell(row, col)?, Color::Off)?;
        }
        self.set_indicator(row_end, Color::Off)
    }

    fn reset(&mut self) -> anyhow::Result<()> {
        Ok(self.send(codec::RESET)?)
    }
}

/// Reads raw MIDI bytes from `input` until it fails, reaches end of stream
/// or `events` is closed.
pub fn spawn_reader<R>(mut input: R, events: mpsc::Sender<ControlEvent>) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut decoder = MidiDecoder::default();
        let mut buf = [0u8; 64];
        loop {
            let read = match input.read(&mut buf) {
                Ok(0) => {
                    debug!("MIDI input closed");
                    return;
                }
                Ok(read) => read,
                Err(error) if error.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(error) => {
                    warn!(%error, "MIDI input failed");
                    return;
                }
            };
            for byte in &buf[..read] {
                let Some(event) = decoder.push(*byte) else {
                    continue;
                };
                if events.blocking_send(event).is_err() {
                    debug!("control event receiver dropped; stopping MIDI reader");
                    return;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::grid::ControlId;
    use std::io::Cursor;

    fn pad_note(row: usize, col: usize) -> ControlId {
        ControlId::Pad((row * 16 + col) as u8)
    }

    #[test]
    fn clear_row_turns_off_cells_and_row_end() {
        let mut grid = LaunchpadGrid::new(Vec::new());
        grid.clear_row(2).expect("clear");

        let out = grid.into_inner();
        assert_eq!(out.len(), 9 * 3);
        assert_eq!(&out[..3], &[0x90, 32, 0x0C]);
        assert_eq!(&out[out.len() - 3..], &[0x90, 40, 0x0C]);
    }

    #[test]
    fn clear_row_rejects_rows_outside_grid() {
        let mut grid = LaunchpadGrid::new(Vec::new());
        assert!(grid.clear_row(GRID_SIZE).is_err());
        assert!(grid.into_inner().is_empty());
    }

    #[test]
    fn set_indicator_rejects_positions_outside_grid() {
        let mut grid = LaunchpadGrid::new(Vec::new());

        let err = grid
            .set_indicator(Indicator::Selector(200), Color::BrightAmber)
            .expect_err("selector 200");
        assert!(err.to_string().contains("selector index 200"));
        let err = grid
            .set_indicator(Indicator::Cell { row: 16, col: 1 }, Color::BrightGreen)
            .expect_err("row 16");
        assert!(err.to_string().contains("row index 16"));
        assert!(grid
            .set_indicator(Indicator::Cell { row: 1, col: 9 }, Color::BrightGreen)
            .is_err());

        assert!(grid.into_inner().is_empty());
    }

    #[test]
    fn set_indicator_writes_note_for_cell() {
        let mut grid = LaunchpadGrid::new(Vec::new());
        grid.set_indicator(Indicator::Cell { row: 1, col: 2 }, Color::Yellow)
            .expect("set");
        assert_eq!(grid.into_inner(), vec![0x90, 18, 62]);
    }

    #[test]
    fn reset_sends_control_change_zero() {
        let mut grid = LaunchpadGrid::new(Vec::new());
        grid.reset().expect("reset");
        assert_eq!(grid.into_inner(), vec![0xB0, 0x00, 0x00]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reader_forwards_decoded_presses_until_input_ends() {
        let bytes = vec![0xB0, 105, 127, 0x90, 0x12, 127, 0x12, 0];
        let (tx, mut rx) = mpsc::channel(8);
        let reader = spawn_reader(Cursor::new(bytes), tx);

        assert_eq!(
            rx.recv().await,
            Some(ControlEvent::pressed(ControlId::Top(105)))
        );
        assert_eq!(rx.recv().await, Some(ControlEvent::pressed(pad_note(1, 2))));
        assert_eq!(rx.recv().await, Some(ControlEvent::released(pad_note(1, 2))));
        assert_eq!(rx.recv().await, None);
        reader.join().expect("reader thread");
    }
}
