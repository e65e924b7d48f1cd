use bitflags::bitflags;
use evdev::AbsoluteAxisCode;

bitflags! {
    /// Axes reported for the pending sample.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Axes: u8 {
        const X = 0b01;
        const Y = 0b10;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

/// Multi-touch events the tracker cares about. Everything else coming off the device is dropped
/// before it gets here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawAxisEvent {
    Position(Axis, i32),
    Slot(i32),
    TrackingId(i32),
}

impl RawAxisEvent {
    pub fn from_abs(code: AbsoluteAxisCode, value: i32) -> Option<Self> {
        match code {
            AbsoluteAxisCode::ABS_MT_POSITION_X => Some(Self::Position(Axis::X, value)),
            AbsoluteAxisCode::ABS_MT_POSITION_Y => Some(Self::Position(Axis::Y, value)),
            AbsoluteAxisCode::ABS_MT_SLOT => Some(Self::Slot(value)),
            AbsoluteAxisCode::ABS_MT_TRACKING_ID => Some(Self::TrackingId(value)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchSample {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerOutput {
    Sample(TouchSample),
    ContactReset,
}

#[derive(Debug, Default)]
pub struct CoordinateTracker {
    x: i32,
    y: i32,
    reported: Axes,
    contacts: u64,
}

impl CoordinateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_axis_event(&mut self, axis: Axis, value: i32) {
        match axis {
            Axis::X => {
                self.x = value;
                self.reported.insert(Axes::X);
            }
            Axis::Y => {
                self.y = value;
                self.reported.insert(Axes::Y);
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        self.reported.contains(Axes::all())
    }

    /// Hands out the latest pair and clears the reported axes, so each pair is delivered once.
    /// The coordinates themselves are kept; only a fresh report of both axes completes the next pair.
    pub fn take_sample(&mut self) -> TouchSample {
        self.reported = Axes::empty();
        TouchSample { x: self.x, y: self.y }
    }

    /// Marks the end of the current contact. A half-reported pair stays pending and completes
    /// with the next axis event of the new contact.
    pub fn reset_contact(&mut self) {
        self.contacts += 1;
        log::debug!("Contact #{} ended", self.contacts);
    }

    pub fn contacts(&self) -> u64 {
        self.contacts
    }

    pub fn feed(&mut self, event: RawAxisEvent) -> Option<TrackerOutput> {
        match event {
            RawAxisEvent::Slot(_) | RawAxisEvent::TrackingId(-1) => {
                self.reset_contact();
                Some(TrackerOutput::ContactReset)
            }
            RawAxisEvent::TrackingId(_) => None,
            RawAxisEvent::Position(axis, value) => {
                self.on_axis_event(axis, value);
                self.is_complete().then(|| TrackerOutput::Sample(self.take_sample()))
            }
        }
    }
}
