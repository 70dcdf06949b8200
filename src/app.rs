use crate::config::RunConfig;
use crate::error::Error;
use crate::input::{DeviceSession, InputEvent};
use crate::output::Output;
use crate::report::{axis_dump, device_banner, EventFormatter};
use std::time::{Duration, Instant};

pub struct JoyTestApp<S: DeviceSession> {
    session: S,
    formatter: EventFormatter,
    /// Dump all axis values periodically instead of reporting extremes
    poll_axes: bool,
    poll_interval: Duration,
}

impl<S: DeviceSession> JoyTestApp<S> {
    pub fn new(session: S, config: &RunConfig) -> Result<Self, Error> {
        if session.devices().is_empty() {
            return Err(Error::NoDevices);
        }

        Ok(Self {
            session,
            formatter: EventFormatter::new(config.dead_zone),
            poll_axes: config.poll_axes,
            poll_interval: config.poll_interval,
        })
    }

    /// Print the device banner, then report events until a quit request arrives
    pub fn run(&mut self, output: &mut Output) -> Result<(), Error> {
        let result = self.event_loop(output);
        log::debug!("Last reported axis: {:?}", self.formatter.axis_state().last());
        self.session.shutdown();
        result
    }

    fn event_loop(&mut self, output: &mut Output) -> Result<(), Error> {
        for line in device_banner(self.session.devices()) {
            output.line(&line)?;
        }

        let mut next_poll = Instant::now();

        loop {
            let timeout = if self.poll_axes {
                let now = Instant::now();
                if now >= next_poll {
                    self.dump_axes(output)?;
                    next_poll = now + self.poll_interval;
                }
                Some(next_poll.saturating_duration_since(Instant::now()))
            } else {
                None
            };

            let Some(event) = self.session.next_event(timeout) else {
                continue;
            };

            if event.is_quit() {
                log::debug!("Quit requested");
                return Ok(());
            }

            if self.poll_axes && matches!(event, InputEvent::AxisMotion { .. }) {
                continue;
            }

            if let Some(line) = self.formatter.format(&event) {
                output.line(&line)?;
            }
        }
    }

    fn dump_axes(&self, output: &mut Output) -> Result<(), Error> {
        for device in self.session.devices() {
            let values = self.session.axis_states(device.index);
            output.line(&axis_dump(device.index, &values))?;
        }
        Ok(())
    }
}
