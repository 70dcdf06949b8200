mod reader;
#[cfg(target_os = "linux")]
pub mod evdev_reader;
pub mod keyboard;

pub use reader::*;

use std::time::Duration;

/// One attached joystick as seen at startup
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceInfo {
    pub index: usize,
    pub name: String,
    pub axes: usize,
    pub buttons: usize,
    pub balls: usize,
    pub hats: usize,
}

/// Hat position, using the usual bitmask encoding (up=1, right=2, down=4, left=8)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HatDirection {
    Centered,
    Up,
    Right,
    Down,
    Left,
    RightUp,
    RightDown,
    LeftUp,
    LeftDown,
}

impl HatDirection {
    pub const UP: u8 = 0x01;
    pub const RIGHT: u8 = 0x02;
    pub const DOWN: u8 = 0x04;
    pub const LEFT: u8 = 0x08;

    /// Decode a hat bitmask. Opposing bits cancel each other out.
    pub fn from_bits(bits: u8) -> Self {
        let vertical = match (bits & Self::UP != 0, bits & Self::DOWN != 0) {
            (true, false) => Self::UP,
            (false, true) => Self::DOWN,
            _ => 0,
        };
        let horizontal = match (bits & Self::LEFT != 0, bits & Self::RIGHT != 0) {
            (true, false) => Self::LEFT,
            (false, true) => Self::RIGHT,
            _ => 0,
        };

        match vertical | horizontal {
            Self::UP => Self::Up,
            Self::RIGHT => Self::Right,
            Self::DOWN => Self::Down,
            Self::LEFT => Self::Left,
            b if b == Self::RIGHT | Self::UP => Self::RightUp,
            b if b == Self::RIGHT | Self::DOWN => Self::RightDown,
            b if b == Self::LEFT | Self::UP => Self::LeftUp,
            b if b == Self::LEFT | Self::DOWN => Self::LeftDown,
            _ => Self::Centered,
        }
    }

    /// Word printed for the four cardinal directions, `None` for everything else
    pub fn cardinal_name(&self) -> Option<&'static str> {
        match self {
            Self::Up => Some("UP"),
            Self::Down => Some("DOWN"),
            Self::Left => Some("LEFT"),
            Self::Right => Some("RIGHT"),
            _ => None,
        }
    }
}

/// Only escape means anything here, every other key is `Other`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Escape,
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    AxisMotion {
        device: usize,
        axis: usize,
        value: i16,
    },
    BallMotion {
        device: usize,
        ball: usize,
        xrel: i32,
        yrel: i32,
    },
    HatMotion {
        device: usize,
        hat: usize,
        direction: HatDirection,
    },
    ButtonDown {
        device: usize,
        button: usize,
    },
    KeyPress {
        key: Key,
    },
    Quit,
    /// Anything the report ignores (button releases, connection changes, ...)
    Other,
}

impl InputEvent {
    /// Quit request or escape key
    pub fn is_quit(&self) -> bool {
        matches!(
            self,
            InputEvent::Quit | InputEvent::KeyPress { key: Key::Escape }
        )
    }
}

/// Source of joystick events. Owns every opened device until `shutdown`.
pub trait DeviceSession {
    fn devices(&self) -> &[DeviceInfo];

    /// Wait for the next event. `None` once `timeout` has elapsed without one.
    fn next_event(&mut self, timeout: Option<Duration>) -> Option<InputEvent>;

    /// Current value of every axis on `device`, in axis index order
    fn axis_states(&self, device: usize) -> Vec<i16>;

    fn shutdown(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hat_bits_decode_cardinals_and_diagonals() {
        assert_eq!(HatDirection::from_bits(0), HatDirection::Centered);
        assert_eq!(HatDirection::from_bits(HatDirection::UP), HatDirection::Up);
        assert_eq!(HatDirection::from_bits(HatDirection::LEFT), HatDirection::Left);
        assert_eq!(
            HatDirection::from_bits(HatDirection::RIGHT | HatDirection::DOWN),
            HatDirection::RightDown
        );
        assert_eq!(
            HatDirection::from_bits(HatDirection::LEFT | HatDirection::UP),
            HatDirection::LeftUp
        );
    }

    #[test]
    fn opposing_hat_bits_cancel() {
        assert_eq!(
            HatDirection::from_bits(HatDirection::UP | HatDirection::DOWN),
            HatDirection::Centered
        );
        assert_eq!(
            HatDirection::from_bits(HatDirection::UP | HatDirection::LEFT | HatDirection::RIGHT),
            HatDirection::Up
        );
    }

    #[test]
    fn only_cardinals_have_names() {
        assert_eq!(HatDirection::Down.cardinal_name(), Some("DOWN"));
        assert_eq!(HatDirection::Centered.cardinal_name(), None);
        assert_eq!(HatDirection::LeftDown.cardinal_name(), None);
    }

    #[test]
    fn escape_and_quit_end_the_session() {
        assert!(InputEvent::Quit.is_quit());
        assert!(InputEvent::KeyPress { key: Key::Escape }.is_quit());
        assert!(!InputEvent::KeyPress { key: Key::Other }.is_quit());
        assert!(!InputEvent::ButtonDown { device: 0, button: 0 }.is_quit());
    }
}
