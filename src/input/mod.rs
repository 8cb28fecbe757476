//! OS input injection
//!
//! The executor drives an [`InputBackend`]; the production backend is
//! [`EnigoBackend`].

mod enigo_backend;

pub use enigo_backend::EnigoBackend;

use std::sync::{Arc, Mutex, MutexGuard};

use crate::Result;

/// Input backend shared between the executor task and its owner
pub type SharedInput = Arc<Mutex<dyn InputBackend>>;

/// Wrap a backend for sharing with the executor
#[must_use]
pub fn shared(backend: impl InputBackend + 'static) -> SharedInput {
    Arc::new(Mutex::new(backend))
}

/// Lock a shared backend, recovering from a poisoned lock
pub(crate) fn lock(
    input: &Mutex<dyn InputBackend>,
) -> MutexGuard<'_, dyn InputBackend + 'static> {
    input.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Low-level input primitives injected into the focused window
pub trait InputBackend: Send {
    /// Press (and keep down) a key
    ///
    /// # Errors
    ///
    /// Returns error if the OS rejects the event
    fn press(&mut self, key: char) -> Result<()>;

    /// Release a previously pressed key
    ///
    /// # Errors
    ///
    /// Returns error if the OS rejects the event
    fn release(&mut self, key: char) -> Result<()>;

    /// Move the pointer relative to its current position
    ///
    /// # Errors
    ///
    /// Returns error if the OS rejects the event
    fn move_pointer(&mut self, dx: i32, dy: i32) -> Result<()>;
}

/// Direction of a pointer displacement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerDirection {
    Left,
    Right,
    Up,
    Down,
}

impl PointerDirection {
    /// Unit displacement `(dx, dy)` for one step in this direction
    #[must_use]
    pub const fn unit(self) -> (i32, i32) {
        match self {
            Self::Left => (-1, 0),
            Self::Right => (1, 0),
            Self::Up => (0, -1),
            Self::Down => (0, 1),
        }
    }
}
