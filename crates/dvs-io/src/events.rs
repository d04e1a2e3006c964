use crate::{IoError, TimeOrigin, data_fields, parse_field, parse_lines, with_mapped_text};
use std::fmt;
use std::path::Path;
use tracing::info;

/// Sign of the brightness change that triggered an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Polarity {
    Negative,
    Positive,
}

impl Polarity {
    /// -1.0 or +1.0.
    #[inline]
    pub fn sign(self) -> f64 {
        match self {
            Polarity::Negative => -1.0,
            Polarity::Positive => 1.0,
        }
    }

    /// Decode the on-disk flag (`0` negative, `1` positive).
    pub fn from_flag(flag: u8) -> Option<Self> {
        match flag {
            0 => Some(Polarity::Negative),
            1 => Some(Polarity::Positive),
            _ => None,
        }
    }
}

/// A single event: time in seconds since the [`TimeOrigin`], sensor pixel and polarity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Event {
    pub time: f64,
    pub x: u16,
    pub y: u16,
    pub polarity: Polarity,
}

impl Event {
    pub fn new(time: f64, x: u16, y: u16, polarity: Polarity) -> Self {
        Self {
            time,
            x,
            y,
            polarity,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = match self.polarity {
            Polarity::Positive => '+',
            Polarity::Negative => '-',
        };
        write!(f, "Event [ t: {:.9}, x: {}, y: {}, pol: {} ]", self.time, self.x, self.y, sign)
    }
}

/// Events of one recording with the origin their times are relative to.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecording {
    pub origin: TimeOrigin,
    pub events: Vec<Event>,
}

/// Loader for `sec nsec x y pol` event files.
pub struct EventLoader;

impl EventLoader {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<EventRecording, IoError> {
        let path = path.as_ref();
        let recording = with_mapped_text(path, Self::parse_content)?;
        info!(
            path = %path.display(),
            events = recording.events.len(),
            "loaded event stream"
        );
        Ok(recording)
    }

    /// Parse file contents. The first event defines the time origin.
    pub fn parse_content(content: &str) -> Result<EventRecording, IoError> {
        let raw = parse_lines(content, Self::parse_line)?;
        let Some(first) = raw.first() else {
            return Err(IoError::Empty("event stream".to_string()));
        };
        let origin = TimeOrigin::new(first.sec, first.nsec);

        let events = raw
            .iter()
            .map(|r| Event::new(origin.relative(r.sec, r.nsec), r.x, r.y, r.polarity))
            .collect();
        Ok(EventRecording { origin, events })
    }

    fn parse_line(line: &str, line_num: usize) -> Result<Option<RawEvent>, IoError> {
        let Some(parts) = data_fields(line) else {
            return Ok(None);
        };
        if parts.len() < 5 {
            return Err(IoError::MissingFields { line: line_num });
        }

        let sec = parse_field::<i64>(parts[0], line_num)?;
        let nsec = parse_field::<i64>(parts[1], line_num)?;
        let x = parse_field::<u16>(parts[2], line_num)?;
        let y = parse_field::<u16>(parts[3], line_num)?;
        let polarity = parts[4]
            .parse::<u8>()
            .ok()
            .and_then(Polarity::from_flag)
            .ok_or_else(|| IoError::InvalidPolarity {
                line: line_num,
                value: parts[4].to_string(),
            })?;

        Ok(Some(RawEvent {
            sec,
            nsec,
            x,
            y,
            polarity,
        }))
    }
}

/// Event line before conversion to relative time.
#[derive(Debug)]
struct RawEvent {
    sec: i64,
    nsec: i64,
    x: u16,
    y: u16,
    polarity: Polarity,
}
