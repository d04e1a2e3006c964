//! Per-sensor-pixel memory of the previous event.

use dvs_manifolds::so3::SO3;
use thiserror::Error;

/// Timestamp stored before a pixel has seen any event.
///
/// Slightly negative so that an event at `t = 0` still yields a positive
/// elapsed time.
pub const INITIAL_EVENT_TIME: f64 = -1e-6;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventMapError {
    #[error("pixel ({x}, {y}) is outside the {width}x{height} event map")]
    OutOfSensor {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },
}

/// Time and camera rotation of the last event seen at one sensor pixel.
///
/// `last_rotation` is `None` until an event arrives while a rotation is known.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventMapEntry {
    pub last_time: f64,
    pub last_rotation: Option<SO3>,
}

impl Default for EventMapEntry {
    fn default() -> Self {
        Self {
            last_time: INITIAL_EVENT_TIME,
            last_rotation: None,
        }
    }
}

/// Flat `height × width` arena of [`EventMapEntry`], indexed by `y * width + x`.
#[derive(Debug, Clone)]
pub struct EventMap {
    width: usize,
    height: usize,
    entries: Vec<EventMapEntry>,
}

impl EventMap {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            entries: vec![EventMapEntry::default(); width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn read(&self, x: usize, y: usize) -> Result<EventMapEntry, EventMapError> {
        let index = self.index(x, y)?;
        Ok(self.entries[index])
    }

    pub fn write(
        &mut self,
        x: usize,
        y: usize,
        time: f64,
        rotation: Option<SO3>,
    ) -> Result<(), EventMapError> {
        self.replace(x, y, time, rotation).map(|_| ())
    }

    /// Store a new entry and return the one it replaced.
    pub fn replace(
        &mut self,
        x: usize,
        y: usize,
        time: f64,
        rotation: Option<SO3>,
    ) -> Result<EventMapEntry, EventMapError> {
        let index = self.index(x, y)?;
        let previous = std::mem::replace(
            &mut self.entries[index],
            EventMapEntry {
                last_time: time,
                last_rotation: rotation,
            },
        );
        Ok(previous)
    }

    /// Number of pixels that have seen at least one event.
    pub fn touched_pixels(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.last_time != INITIAL_EVENT_TIME)
            .count()
    }

    fn index(&self, x: usize, y: usize) -> Result<usize, EventMapError> {
        if x >= self.width || y >= self.height {
            return Err(EventMapError::OutOfSensor {
                x,
                y,
                width: self.width,
                height: self.height,
            });
        }
        Ok(y * self.width + x)
    }
}
