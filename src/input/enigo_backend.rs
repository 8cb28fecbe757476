//! Input injection through enigo

use enigo::{Coordinate, Direction, Enigo, Key, Keyboard, Mouse, Settings};

use super::InputBackend;
use crate::{Error, Result};

/// Injects keyboard and pointer events at the OS level
pub struct EnigoBackend {
    enigo: Enigo,
}

impl EnigoBackend {
    /// Connect to the OS input system
    ///
    /// # Errors
    ///
    /// Returns error if the input connection cannot be established
    pub fn new() -> Result<Self> {
        let enigo = Enigo::new(&Settings::default()).map_err(|e| Error::Input(e.to_string()))?;
        tracing::debug!("input backend initialized");
        Ok(Self { enigo })
    }
}

impl InputBackend for EnigoBackend {
    fn press(&mut self, key: char) -> Result<()> {
        self.enigo
            .key(Key::Unicode(key), Direction::Press)
            .map_err(|e| Error::Input(e.to_string()))
    }

    fn release(&mut self, key: char) -> Result<()> {
        self.enigo
            .key(Key::Unicode(key), Direction::Release)
            .map_err(|e| Error::Input(e.to_string()))
    }

    fn move_pointer(&mut self, dx: i32, dy: i32) -> Result<()> {
        self.enigo
            .move_mouse(dx, dy, Coordinate::Rel)
            .map_err(|e| Error::Input(e.to_string()))
    }
}
