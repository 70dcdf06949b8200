use crate::input::{DeviceInfo, InputEvent};

/// Default dead zone: axes are reported only beyond this magnitude
pub const DEFAULT_DEAD_ZONE: u16 = 30000;

/// Last axis that was actually reported, with the side of center it was pushed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AxisReportState {
    last: Option<(usize, usize, bool)>,
}

impl AxisReportState {
    pub fn last(&self) -> Option<(usize, usize, bool)> {
        self.last
    }
}

/// Turns input events into report lines
#[derive(Debug, Clone)]
pub struct EventFormatter {
    dead_zone: u16,
    axis_state: AxisReportState,
}

impl EventFormatter {
    pub fn new(dead_zone: u16) -> Self {
        Self {
            dead_zone,
            axis_state: AxisReportState::default(),
        }
    }

    pub fn axis_state(&self) -> AxisReportState {
        self.axis_state
    }

    /// Line describing `event`, or `None` when it is filtered out or not reportable.
    /// Quit requests are not handled here, see [`InputEvent::is_quit`].
    pub fn format(&mut self, event: &InputEvent) -> Option<String> {
        match *event {
            InputEvent::AxisMotion { device, axis, value } => self.format_axis(device, axis, value),
            InputEvent::BallMotion { device, ball, xrel, yrel } => {
                Some(format!("{}: Ball {} motion: {}, {}", device, ball, xrel, yrel))
            }
            InputEvent::HatMotion { device, hat, direction } => direction
                .cardinal_name()
                .map(|name| format!("{}: Hat {} moved to {}", device, hat, name)),
            InputEvent::ButtonDown { device, button } => {
                Some(format!("{}: Button {} pressed", device, button))
            }
            InputEvent::KeyPress { .. } | InputEvent::Quit | InputEvent::Other => None,
        }
    }

    fn format_axis(&mut self, device: usize, axis: usize, value: i16) -> Option<String> {
        let direction = value > 0;
        let key = (device, axis, direction);

        if self.axis_state.last == Some(key) {
            return None;
        }

        // Only report once pushed out of the dead zone
        if value.unsigned_abs() <= self.dead_zone {
            return None;
        }

        self.axis_state.last = Some(key);
        Some(format!("{}: Axis {} pushed to extreme: {}", device, axis, value))
    }
}

/// Startup listing of every opened device
pub fn device_banner(devices: &[DeviceInfo]) -> Vec<String> {
    let mut lines = vec![format!("{} joysticks:", devices.len())];
    for device in devices {
        lines.push(format!("\t#{}: '{}'", device.index, device.name));
        lines.push(format!("\t\taxes: {}", device.axes));
        lines.push(format!("\t\tbuttons: {}", device.buttons));
        lines.push(format!("\t\tballs: {}", device.balls));
        lines.push(format!("\t\thats: {}", device.hats));
    }
    lines
}

/// One line of current axis values for poll mode
pub fn axis_dump(device: usize, values: &[i16]) -> String {
    let mut line = format!("{}: axis states: ", device);
    for value in values {
        line.push_str(&format!("{:>7}", value));
    }
    line
}
