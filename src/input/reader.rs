use super::{DeviceInfo, DeviceSession, HatDirection, InputEvent};
use crate::error::Error;
use crossbeam_channel::{Receiver, Sender};
use gilrs::{Axis, Button, EventType, Gilrs, GilrsBuilder};
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[cfg(target_os = "linux")]
use super::evdev_reader::BallReader;
#[cfg(target_os = "linux")]
use std::collections::HashSet;
#[cfg(target_os = "linux")]
use std::path::PathBuf;

/// Longest single wait on gilrs before the side channel is checked again
const WAIT_SLICE: Duration = Duration::from_millis(20);

/// D-pad axes past this point count as pressed
const DPAD_AXIS_THRESHOLD: f32 = 0.5;

const AXIS_LIST: [Axis; 6] = [
    Axis::LeftStickX,
    Axis::LeftStickY,
    Axis::LeftZ,
    Axis::RightStickX,
    Axis::RightStickY,
    Axis::RightZ,
];

const BUTTON_LIST: [Button; 15] = [
    Button::South,
    Button::East,
    Button::North,
    Button::West,
    Button::C,
    Button::Z,
    Button::LeftTrigger,
    Button::LeftTrigger2,
    Button::RightTrigger,
    Button::RightTrigger2,
    Button::Select,
    Button::Start,
    Button::Mode,
    Button::LeftThumb,
    Button::RightThumb,
];

/// Scale a gilrs axis value (-1.0..=1.0) to the signed 16 bit range
pub fn scale_axis(value: f32) -> i16 {
    (value.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}

fn dpad_bit(button: Button) -> Option<u8> {
    match button {
        Button::DPadUp => Some(HatDirection::UP),
        Button::DPadRight => Some(HatDirection::RIGHT),
        Button::DPadDown => Some(HatDirection::DOWN),
        Button::DPadLeft => Some(HatDirection::LEFT),
        _ => None,
    }
}

/// Per-device numbering of axes and buttons plus the tracked hat and axis state
#[derive(Debug, Default)]
struct DeviceMap {
    axis_codes: Vec<u32>,
    axis_values: Vec<i16>,
    button_codes: Vec<u32>,
    hat: u8,
}

impl DeviceMap {
    /// Index of an axis code. Codes that were not enumerated get the next free index.
    fn axis_index(&mut self, code: u32) -> usize {
        if let Some(index) = self.axis_codes.iter().position(|c| *c == code) {
            return index;
        }
        self.axis_codes.push(code);
        self.axis_values.push(0);
        self.axis_codes.len() - 1
    }

    fn button_index(&mut self, code: u32) -> usize {
        if let Some(index) = self.button_codes.iter().position(|c| *c == code) {
            return index;
        }
        self.button_codes.push(code);
        self.button_codes.len() - 1
    }

    /// Store a new hat bitmask, returning the direction only if it changed
    fn set_hat(&mut self, bits: u8) -> Option<HatDirection> {
        if bits == self.hat {
            return None;
        }
        self.hat = bits;
        Some(HatDirection::from_bits(bits))
    }

    fn set_dpad_axis(&mut self, negative: u8, positive: u8, value: f32) -> Option<HatDirection> {
        let mut bits = self.hat & !(negative | positive);
        if value <= -DPAD_AXIS_THRESHOLD {
            bits |= negative;
        } else if value >= DPAD_AXIS_THRESHOLD {
            bits |= positive;
        }
        self.set_hat(bits)
    }
}

pub struct GilrsSession {
    gilrs: Gilrs,
    devices: Vec<DeviceInfo>,
    maps: HashMap<usize, DeviceMap>,
    side_sender: Sender<InputEvent>,
    side_receiver: Receiver<InputEvent>,
    #[cfg(target_os = "linux")]
    udev: Option<libudev::Context>,
    #[cfg(target_os = "linux")]
    ball_readers: Vec<BallReader>,
}

impl GilrsSession {
    pub fn new() -> Result<Self, Error> {
        // Our own dead zone is the only filter applied to axis values
        let gilrs = GilrsBuilder::new()
            .with_default_filters(false)
            .build()
            .map_err(|e| Error::Backend(e.to_string()))?;

        let (side_sender, side_receiver) = crossbeam_channel::unbounded();

        let mut session = Self {
            gilrs,
            devices: Vec::new(),
            maps: HashMap::new(),
            side_sender,
            side_receiver,
            #[cfg(target_os = "linux")]
            udev: match libudev::Context::new() {
                Ok(udev) => Some(udev),
                Err(e) => {
                    log::warn!("udev unavailable, balls will not be reported: {}", e);
                    None
                }
            },
            #[cfg(target_os = "linux")]
            ball_readers: Vec::new(),
        };

        session.open_devices();

        Ok(session)
    }

    /// Sender feeding the same queue as the joysticks, for other event sources
    pub fn sender(&self) -> Sender<InputEvent> {
        self.side_sender.clone()
    }

    fn open_devices(&mut self) {
        #[cfg(target_os = "linux")]
        let nodes = self
            .udev
            .as_ref()
            .and_then(scan_event_nodes)
            .unwrap_or_default();
        // Identical pads share ids, so each node may only be handed out once
        #[cfg(target_os = "linux")]
        let mut claimed = HashSet::new();

        for (id, gamepad) in self.gilrs.gamepads() {
            let index = usize::from(id);
            let mut map = DeviceMap::default();

            for axis in AXIS_LIST {
                if let Some(code) = gamepad.axis_code(axis) {
                    map.axis_codes.push(code.into_u32());
                    map.axis_values.push(scale_axis(gamepad.value(axis)));
                }
            }
            for button in BUTTON_LIST {
                if let Some(code) = gamepad.button_code(button) {
                    map.button_codes.push(code.into_u32());
                }
            }

            let has_dpad = gamepad.axis_code(Axis::DPadX).is_some()
                || gamepad.axis_code(Axis::DPadY).is_some()
                || gamepad.button_code(Button::DPadUp).is_some();

            #[allow(unused_mut)]
            let mut balls = 0;

            #[cfg(target_os = "linux")]
            if self.udev.is_some() {
                let path = select_device_node(
                    &nodes,
                    gamepad.vendor_id(),
                    gamepad.product_id(),
                    gamepad.os_name(),
                    &claimed,
                );
                if let Some(path) = path {
                    log::info!("Found evdev path for {}: {}", gamepad.name(), path.display());
                    claimed.insert(path.clone());
                    match BallReader::spawn(&path, index, self.side_sender.clone()) {
                        Ok(Some(reader)) => {
                            balls = reader.balls;
                            self.ball_readers.push(reader);
                        }
                        Ok(None) => {}
                        Err(e) => log::error!("Failed to open {} for ball motion: {}", path.display(), e),
                    }
                } else {
                    log::warn!("No evdev path found for {}", gamepad.name());
                }
            }

            let device = DeviceInfo {
                index,
                name: gamepad.name().to_string(),
                axes: map.axis_codes.len(),
                buttons: map.button_codes.len(),
                balls,
                hats: usize::from(has_dpad),
            };

            log::info!(
                "Found device #{}: {} ({} axes, {} buttons, {} balls, {} hats)",
                device.index, device.name, device.axes, device.buttons, device.balls, device.hats
            );

            self.maps.insert(index, map);
            self.devices.push(device);
        }

        self.devices.sort_by_key(|d| d.index);
    }

    fn translate(&mut self, event: gilrs::Event) -> InputEvent {
        let device = usize::from(event.id);
        let map = self.maps.entry(device).or_default();

        let hat_motion = |direction: Option<HatDirection>| match direction {
            Some(direction) => InputEvent::HatMotion { device, hat: 0, direction },
            None => InputEvent::Other,
        };

        match event.event {
            EventType::AxisChanged(Axis::DPadX, value, _) => {
                hat_motion(map.set_dpad_axis(HatDirection::LEFT, HatDirection::RIGHT, value))
            }
            // gilrs reports up as positive
            EventType::AxisChanged(Axis::DPadY, value, _) => {
                hat_motion(map.set_dpad_axis(HatDirection::DOWN, HatDirection::UP, value))
            }
            EventType::AxisChanged(_, value, code) => {
                let axis = map.axis_index(code.into_u32());
                let value = scale_axis(value);
                map.axis_values[axis] = value;
                InputEvent::AxisMotion { device, axis, value }
            }
            EventType::ButtonPressed(button, code) => match dpad_bit(button) {
                Some(bit) => {
                    let bits = map.hat | bit;
                    hat_motion(map.set_hat(bits))
                }
                None => InputEvent::ButtonDown {
                    device,
                    button: map.button_index(code.into_u32()),
                },
            },
            EventType::ButtonReleased(button, _) => match dpad_bit(button) {
                Some(bit) => {
                    let bits = map.hat & !bit;
                    hat_motion(map.set_hat(bits))
                }
                None => InputEvent::Other,
            },
            EventType::Disconnected => {
                log::debug!("Device #{} disconnected", device);
                InputEvent::Other
            }
            _ => InputEvent::Other,
        }
    }
}

impl DeviceSession for GilrsSession {
    fn devices(&self) -> &[DeviceInfo] {
        &self.devices
    }

    fn next_event(&mut self, timeout: Option<Duration>) -> Option<InputEvent> {
        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            if let Ok(event) = self.side_receiver.try_recv() {
                return Some(event);
            }

            let slice = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return None;
                    }
                    (deadline - now).min(WAIT_SLICE)
                }
                None => WAIT_SLICE,
            };

            if let Some(event) = self.gilrs.next_event_blocking(Some(slice)) {
                return Some(self.translate(event));
            }
        }
    }

    fn axis_states(&self, device: usize) -> Vec<i16> {
        self.maps
            .get(&device)
            .map(|map| map.axis_values.clone())
            .unwrap_or_default()
    }

    fn shutdown(&mut self) {
        log::debug!("Closing {} device(s)", self.devices.len());
        #[cfg(target_os = "linux")]
        self.ball_readers.clear();
        self.maps.clear();
        self.devices.clear();
    }
}

/// One `event*` node seen by udev
#[cfg(target_os = "linux")]
#[derive(Debug, Clone)]
struct NodeCandidate {
    devnode: PathBuf,
    vendor_id: Option<u16>,
    product_id: Option<u16>,
    /// `NAME` of the parent input device, without the surrounding quotes
    name: Option<String>,
}

#[cfg(target_os = "linux")]
fn scan_event_nodes(udev: &libudev::Context) -> Option<Vec<NodeCandidate>> {
    let mut enumerator = libudev::Enumerator::new(udev).ok()?;
    enumerator.match_subsystem("input").ok()?;

    let mut candidates = Vec::new();
    for device in enumerator.scan_devices().ok()? {
        let Some(devnode) = device.devnode() else {
            continue;
        };
        if !devnode.to_string_lossy().contains("event") {
            continue;
        }

        let vendor_id = device
            .property_value("ID_VENDOR_ID")
            .and_then(|s| s.to_str())
            .and_then(|s| u16::from_str_radix(s, 16).ok());

        let product_id = device
            .property_value("ID_PRODUCT_ID")
            .or(device.property_value("ID_MODEL_ID"))
            .and_then(|s| s.to_str())
            .and_then(|s| u16::from_str_radix(s, 16).ok());

        let name = device.parent().and_then(|parent| {
            parent
                .property_value("NAME")
                .and_then(|s| s.to_str())
                .map(|s| s.trim_matches('"').to_string())
        });

        log::debug!("Found udev node {} (vendor: {:?}, product: {:?}, name: {:?})",
            devnode.display(), vendor_id, product_id, name);

        candidates.push(NodeCandidate {
            devnode: devnode.to_path_buf(),
            vendor_id,
            product_id,
            name,
        });
    }

    Some(candidates)
}

/// First unclaimed node with the gamepad's ids, preferring one whose name matches too
#[cfg(target_os = "linux")]
fn select_device_node(
    candidates: &[NodeCandidate],
    vendor_id: Option<u16>,
    product_id: Option<u16>,
    os_name: &str,
    claimed: &HashSet<PathBuf>,
) -> Option<PathBuf> {
    let matching: Vec<&NodeCandidate> = candidates
        .iter()
        .filter(|c| c.vendor_id == vendor_id && c.product_id == product_id)
        .filter(|c| !claimed.contains(&c.devnode))
        .collect();

    matching
        .iter()
        .find(|c| c.name.as_deref() == Some(os_name))
        .or_else(|| matching.first())
        .map(|c| c.devnode.clone())
}
