#![cfg(target_os = "linux")]
use super::InputEvent;
use crossbeam_channel::Sender;
use evdev::{Device, EventType, RelativeAxisCode, SynchronizationCode};
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Relative axis pairs reported as balls, in ball index order
const BALL_AXES: [(RelativeAxisCode, RelativeAxisCode); 2] = [
    (RelativeAxisCode::REL_X, RelativeAxisCode::REL_Y),
    (RelativeAxisCode::REL_RX, RelativeAxisCode::REL_RY),
];

/// Running deltas for each ball between two `SYN_REPORT`s
#[derive(Debug, Default)]
struct BallAccumulator {
    /// (axis pair index, x, y)
    pending: Vec<(usize, i32, i32)>,
}

impl BallAccumulator {
    fn add(&mut self, code: u16, value: i32) {
        for (pair, (x_axis, y_axis)) in BALL_AXES.iter().enumerate() {
            let (dx, dy) = if code == x_axis.0 {
                (value, 0)
            } else if code == y_axis.0 {
                (0, value)
            } else {
                continue;
            };

            match self.pending.iter_mut().find(|(p, _, _)| *p == pair) {
                Some((_, x, y)) => {
                    *x += dx;
                    *y += dy;
                }
                None => self.pending.push((pair, dx, dy)),
            }
            return;
        }
    }

    /// Ball motions for everything accumulated so far. `balls` maps a pair index to its ball number.
    fn drain(&mut self, device: usize, balls: &[Option<usize>]) -> Vec<InputEvent> {
        self.pending
            .drain(..)
            .filter_map(|(pair, xrel, yrel)| {
                balls[pair].map(|ball| InputEvent::BallMotion { device, ball, xrel, yrel })
            })
            .collect()
    }
}

/// (type, code, value) of one evdev event
type RawEvent = (EventType, u16, i32);

const IDLE_SLEEP: Duration = Duration::from_millis(10);

/// Forwards relative motion from one evdev node as ball events.
/// Dropping it stops the thread, which closes the node.
pub struct BallReader {
    pub balls: usize,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl BallReader {
    /// Start reading `path` on a background thread. `Ok(None)` when the device has no balls.
    pub fn spawn(path: &Path, device: usize, sender: Sender<InputEvent>) -> anyhow::Result<Option<Self>> {
        let mut evdev = Device::open(path)
            .map_err(|e| anyhow::anyhow!("Failed to open evdev device {}: {}", path.display(), e))?;

        let balls = match evdev.supported_relative_axes() {
            Some(axes) => ball_numbers(|code| axes.contains(code)),
            None => vec![None; BALL_AXES.len()],
        };
        let count = balls.iter().flatten().count();
        if count == 0 {
            return Ok(None);
        }

        // The running flag is only seen between reads
        evdev
            .set_nonblocking(true)
            .map_err(|e| anyhow::anyhow!("Failed to make {} non-blocking: {}", path.display(), e))?;

        let running = Arc::new(AtomicBool::new(true));
        let thread_running = running.clone();
        let path = path.to_path_buf();

        let thread_handle = thread::spawn(move || {
            let fetch = || {
                evdev
                    .fetch_events()
                    .map(|events| {
                        events
                            .map(|e| (e.event_type(), e.code(), e.value()))
                            .collect::<Vec<RawEvent>>()
                    })
            };
            if let Err(e) = read_loop(&thread_running, device, &balls, &sender, fetch) {
                log::error!("Failed to fetch evdev events from {}: {}", path.display(), e);
            }
        });

        Ok(Some(Self {
            balls: count,
            running,
            thread_handle: Some(thread_handle),
        }))
    }
}

impl Drop for BallReader {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

/// Read until stopped, the receiver goes away, or the device fails
fn read_loop(
    running: &AtomicBool,
    device: usize,
    balls: &[Option<usize>],
    sender: &Sender<InputEvent>,
    mut fetch: impl FnMut() -> io::Result<Vec<RawEvent>>,
) -> io::Result<()> {
    let mut accumulator = BallAccumulator::default();

    while running.load(Ordering::Relaxed) {
        match fetch() {
            Ok(events) => {
                let mut motions = Vec::new();
                for (event_type, code, value) in events {
                    if event_type == EventType::RELATIVE {
                        accumulator.add(code, value);
                    } else if event_type == EventType::SYNCHRONIZATION
                        && code == SynchronizationCode::SYN_REPORT.0
                    {
                        motions.extend(accumulator.drain(device, balls));
                    }
                }
                motions.extend(accumulator.drain(device, balls));

                for motion in motions {
                    if sender.send(motion).is_err() {
                        return Ok(());
                    }
                }
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(IDLE_SLEEP);
            }
            Err(e) => return Err(e),
        }
    }

    Ok(())
}

/// Number each supported axis pair consecutively
fn ball_numbers(supports: impl Fn(RelativeAxisCode) -> bool) -> Vec<Option<usize>> {
    let mut next = 0;
    BALL_AXES
        .iter()
        .map(|(x, y)| {
            if supports(*x) || supports(*y) {
                next += 1;
                Some(next - 1)
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deltas_accumulate_until_drained() {
        let mut acc = BallAccumulator::default();
        acc.add(RelativeAxisCode::REL_X.0, 3);
        acc.add(RelativeAxisCode::REL_Y.0, -2);
        acc.add(RelativeAxisCode::REL_X.0, 4);

        let events = acc.drain(1, &[Some(0), Some(1)]);
        assert_eq!(
            events,
            vec![InputEvent::BallMotion { device: 1, ball: 0, xrel: 7, yrel: -2 }]
        );
        assert!(acc.drain(1, &[Some(0), Some(1)]).is_empty());
    }

    #[test]
    fn second_pair_uses_its_own_ball_number() {
        let mut acc = BallAccumulator::default();
        acc.add(RelativeAxisCode::REL_RY.0, 5);
        acc.add(RelativeAxisCode::REL_WHEEL.0, 1);

        let events = acc.drain(0, &[None, Some(0)]);
        assert_eq!(
            events,
            vec![InputEvent::BallMotion { device: 0, ball: 0, xrel: 0, yrel: 5 }]
        );
    }

    #[test]
    fn balls_numbered_by_supported_pairs() {
        assert_eq!(ball_numbers(|_| true), vec![Some(0), Some(1)]);
        assert_eq!(
            ball_numbers(|code| code == RelativeAxisCode::REL_RX),
            vec![None, Some(0)]
        );
        assert_eq!(ball_numbers(|_| false), vec![None, None]);
    }

    fn report(xrel: i32, yrel: i32) -> Vec<RawEvent> {
        vec![
            (EventType::RELATIVE, RelativeAxisCode::REL_X.0, xrel),
            (EventType::RELATIVE, RelativeAxisCode::REL_Y.0, yrel),
            (EventType::SYNCHRONIZATION, SynchronizationCode::SYN_REPORT.0, 0),
        ]
    }

    #[test]
    fn read_loop_stops_when_flag_cleared() {
        let running = AtomicBool::new(true);
        let (sender, receiver) = crossbeam_channel::unbounded();
        let mut calls = 0;

        let result = read_loop(&running, 2, &[Some(0), None], &sender, || {
            calls += 1;
            match calls {
                1 => Ok(report(4, -1)),
                2 => {
                    running.store(false, Ordering::Relaxed);
                    Err(io::Error::from(io::ErrorKind::WouldBlock))
                }
                _ => panic!("kept reading after being stopped"),
            }
        });

        assert!(result.is_ok());
        assert_eq!(calls, 2);
        assert_eq!(
            receiver.try_iter().collect::<Vec<_>>(),
            vec![InputEvent::BallMotion { device: 2, ball: 0, xrel: 4, yrel: -1 }]
        );
    }

    #[test]
    fn read_loop_ends_when_receiver_is_gone() {
        let running = AtomicBool::new(true);
        let (sender, receiver) = crossbeam_channel::unbounded();
        drop(receiver);
        let mut calls = 0;

        let result = read_loop(&running, 0, &[Some(0), None], &sender, || {
            calls += 1;
            Ok(report(1, 1))
        });

        assert!(result.is_ok());
        assert_eq!(calls, 1);
    }

    #[test]
    fn read_loop_reports_device_errors() {
        let running = AtomicBool::new(true);
        let (sender, _receiver) = crossbeam_channel::unbounded();

        let result = read_loop(&running, 0, &[Some(0), None], &sender, || {
            Err(io::Error::from(io::ErrorKind::NotFound))
        });

        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::NotFound);
    }
}
