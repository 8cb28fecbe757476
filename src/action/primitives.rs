//! Input primitives that actions are composed of
//!
//! Every primitive takes a `gate` that is consulted before each step; once
//! the gate closes (focus lost or stop requested) the primitive returns
//! early. A step that has already started (a key hold, a pointer pause)
//! always completes first.

use std::sync::Mutex;
use std::time::Duration;

use crate::Result;
use crate::input::{InputBackend, PointerDirection, lock};

/// Press `key`, hold it for `hold`, release it.
///
/// Returns `false` if the gate was closed and nothing was pressed.
///
/// # Errors
///
/// Returns error if the backend rejects an event
pub async fn hold_key(
    input: &Mutex<dyn InputBackend>,
    key: char,
    hold: Duration,
    gate: &(impl Fn() -> bool + Sync),
) -> Result<bool> {
    if !gate() {
        return Ok(false);
    }

    lock(input).press(key)?;
    let held = HeldKey {
        input,
        key,
        released: false,
    };
    tokio::time::sleep(hold).await;
    // Released even if the gate closed mid-hold, a stuck key would keep walking
    held.release()?;

    Ok(true)
}

/// A pressed key, released on drop if the hold is cancelled
struct HeldKey<'a> {
    input: &'a Mutex<dyn InputBackend>,
    key: char,
    released: bool,
}

impl HeldKey<'_> {
    fn release(mut self) -> Result<()> {
        self.released = true;
        lock(self.input).release(self.key)
    }
}

impl Drop for HeldKey<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        tracing::debug!(key = %self.key, "hold cancelled, releasing key");
        if let Err(e) = lock(self.input).release(self.key) {
            tracing::warn!(key = %self.key, error = %e, "failed to release key");
        }
    }
}

/// Move the pointer `distance` unit steps in `direction`, spreading the steps
/// evenly over `duration`.
///
/// Returns the number of unit steps actually issued. Partial motion is not
/// rolled back.
///
/// # Errors
///
/// Returns error if the backend rejects an event
pub async fn move_pointer_gradually(
    input: &Mutex<dyn InputBackend>,
    direction: PointerDirection,
    distance: u32,
    duration: Duration,
    gate: &(impl Fn() -> bool + Sync),
) -> Result<u32> {
    if distance == 0 {
        return Ok(0);
    }

    let pause = duration / distance;
    let (dx, dy) = direction.unit();
    let mut moved = 0;

    while moved < distance {
        if !gate() {
            tracing::trace!(moved, distance, "pointer motion interrupted");
            break;
        }

        lock(input).move_pointer(dx, dy)?;
        moved += 1;

        if !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
    }

    Ok(moved)
}
