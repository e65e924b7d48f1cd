use std::path::Path;
use evdev::{AbsoluteAxisCode, AttributeSet, Device, EventStream, EventType, InputEvent, KeyCode};
use evdev::uinput::VirtualDevice;
use crate::dispatcher::KeySink;
use crate::session::SessionHandle;
use crate::tracker::{CoordinateTracker, RawAxisEvent, TrackerOutput};

const POWER_KEY_NAME: &str = "swiped-pwrkey";

fn is_touchscreen(device: &Device) -> bool {
    device.supported_events().contains(EventType::ABSOLUTE)
        && device.supported_absolute_axes().is_some_and(|axes| {
            axes.contains(AbsoluteAxisCode::ABS_MT_POSITION_X)
                && axes.contains(AbsoluteAxisCode::ABS_MT_POSITION_Y)
        })
}

pub fn get_touchscreen_device(path: Option<&Path>) -> Result<Device, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        let device = Device::open(path).map_err(|e| format!("Failed to open {:?}: {}", path, e))?;
        if !is_touchscreen(&device) {
            return Err(format!("{:?} does not report multi-touch positions", path).into());
        }
        return Ok(device);
    }

    evdev::enumerate()
        .map(|(_, device)| device)
        .find(is_touchscreen)
        .ok_or_else(|| "No touchscreen device found".into())
}

/// Maximum X and Y the device reports, zero when an axis has no range.
pub fn get_screen_size(device: &Device) -> Result<(i32, i32), Box<dyn std::error::Error>> {
    let mut width = 0;
    let mut height = 0;

    for (code, abs) in device.get_absinfo()? {
        match code {
            AbsoluteAxisCode::ABS_MT_POSITION_X => width = abs.maximum(),
            AbsoluteAxisCode::ABS_MT_POSITION_Y => height = abs.maximum(),
            _ => {}
        }
    }

    Ok((width, height))
}

/// Virtual device that only knows how to press the power key.
pub struct UinputPowerKey {
    device: VirtualDevice,
}

impl UinputPowerKey {
    pub fn create() -> std::io::Result<Self> {
        let device = VirtualDevice::builder()?
            .name(POWER_KEY_NAME)
            .with_keys(&AttributeSet::from_iter([KeyCode::KEY_POWER]))?
            .build()?;
        Ok(Self { device })
    }

    pub fn device_mut(&mut self) -> &mut VirtualDevice {
        &mut self.device
    }
}

impl KeySink for UinputPowerKey {
    fn press(&mut self, down: bool) -> std::io::Result<()> {
        // `emit` appends the SYN_REPORT.
        self.device.emit(&[InputEvent::new(EventType::KEY.0, KeyCode::KEY_POWER.0, down as i32)])
    }
}

/// Routes one raw event through the tracker. While the gesture family for the current screen
/// state is disabled positions are dropped, but contact resets always reach the session.
pub fn handle_raw_event(tracker: &mut CoordinateTracker, session: &SessionHandle, raw: RawAxisEvent) {
    if matches!(raw, RawAxisEvent::Position(..)) && !session.accepts_input() {
        return;
    }

    match tracker.feed(raw) {
        Some(TrackerOutput::Sample(sample)) => session.submit_sample(sample),
        Some(TrackerOutput::ContactReset) => session.on_contact_reset(),
        None => {}
    }
}

/// Feeds raw multi-touch events to the tracker and posts what it produces. Never blocks on the
/// session; returns when the device stream fails.
pub async fn pump_events(mut stream: EventStream, session: SessionHandle) -> std::io::Result<()> {
    let mut tracker = CoordinateTracker::new();

    loop {
        let event = stream.next_event().await?;
        if event.event_type() != EventType::ABSOLUTE {
            continue;
        }
        if let Some(raw) = RawAxisEvent::from_abs(AbsoluteAxisCode(event.code()), event.value()) {
            handle_raw_event(&mut tracker, &session, raw);
        }
    }
}
