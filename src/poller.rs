//! Cooperative scheduler driving the test sequence.
//!
//! Every [`Poller::tick`] checks three independent timers: battery
//! telemetry, button events, and the animation of the current LED test.
//! Bodies return promptly; the only wait is the transport's bounded read.

use crate::commands::ButtonEvent;
use crate::constants::*;
use crate::sequencer::{Sequencer, TestState};
use crate::transport::{SerialLink, Transport};
use crate::types::{BatteryReading, IdentificationReport, PollerConfig};
use chrono::Utc;
use log::{debug, info, warn};
use std::collections::VecDeque;
use std::sync::mpsc::Receiver;
use std::thread;
use std::time::{Duration, Instant};

/// Fixed-period timer re-armed only when it fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodicTimer {
    period: Duration,
    last: Duration,
}

impl PeriodicTimer {
    /// Timer whose first firing is one period after start
    pub fn new(period: Duration) -> Self {
        PeriodicTimer {
            period,
            last: Duration::ZERO,
        }
    }

    /// Restart the period from `now`
    pub fn rearm(&mut self, now: Duration) {
        self.last = now;
    }

    /// True once `period` has elapsed since the last firing
    pub fn fire(&mut self, now: Duration) -> bool {
        if now.saturating_sub(self.last) >= self.period {
            self.last = now;
            true
        } else {
            false
        }
    }
}

/// LED chase shown during `TEST_LED_1`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedChase {
    index: usize,
}

impl LedChase {
    /// Position of the bright LED in the next frame
    pub fn index(&self) -> usize {
        self.index
    }

    /// Gauge frame with the bright LED at `index` modulo the gauge size.
    /// The neighbours are dimmed only when they exist; the chase does not
    /// wrap visually.
    pub fn frame(index: usize) -> [u8; GAUGE_LED_COUNT] {
        let index = index % GAUGE_LED_COUNT;
        let mut leds = [0u8; GAUGE_LED_COUNT];
        leds[index] = LED_BRIGHT;
        if index + 1 < GAUGE_LED_COUNT {
            leds[index + 1] = LED_DIM;
        }
        if index > 0 {
            leds[index - 1] = LED_DIMMEST;
        }
        leds
    }

    /// Current frame, then move one position
    pub fn step(&mut self) -> [u8; GAUGE_LED_COUNT] {
        let leds = Self::frame(self.index);
        self.index = (self.index + 1) % GAUGE_LED_COUNT;
        leds
    }
}

/// Percentage sweep shown during `TEST_LED_2`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GaugeSweep {
    percentage: i32,
}

impl GaugeSweep {
    /// Percentage shown by the next step
    pub fn percentage(&self) -> i32 {
        self.percentage
    }

    /// Current percentage, then increment with wrap at 100
    pub fn step(&mut self) -> i32 {
        let percentage = self.percentage;
        self.percentage = (self.percentage + 1) % GAUGE_PERCENTAGE_WRAP;
        percentage
    }
}

/// Commands typed on the debug console
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Start the test sequence
    Begin,
    /// Stop [`Poller::run`]
    Quit,
}

impl ConsoleCommand {
    /// Parse one console line; `None` for unknown text
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim() {
            "begin" => Some(ConsoleCommand::Begin),
            "quit" | "exit" => Some(ConsoleCommand::Quit),
            _ => None,
        }
    }
}

/// Single-threaded scheduler owning the transport and the sequencer
pub struct Poller<S: SerialLink> {
    transport: Transport<S>,
    sequencer: Sequencer,
    battery_timer: PeriodicTimer,
    button_timer: PeriodicTimer,
    chase_timer: PeriodicTimer,
    sweep_timer: PeriodicTimer,
    chase: LedChase,
    sweep: GaugeSweep,
    observed: Option<TestState>,
    console: VecDeque<ConsoleCommand>,
    last_battery: Option<BatteryReading>,
    identification: Option<IdentificationReport>,
    quit: bool,
}

impl<S: SerialLink> Poller<S> {
    /// Scheduler in `STARTUP` with all timers starting at zero
    pub fn new(transport: Transport<S>, config: PollerConfig) -> Self {
        let sequencer = Sequencer::new();
        Poller {
            transport,
            observed: sequencer.current(),
            sequencer,
            battery_timer: PeriodicTimer::new(Duration::from_millis(config.battery_period_ms)),
            button_timer: PeriodicTimer::new(Duration::from_millis(config.button_period_ms)),
            chase_timer: PeriodicTimer::new(Duration::from_millis(config.led_chase_period_ms)),
            sweep_timer: PeriodicTimer::new(Duration::from_millis(config.led_gauge_period_ms)),
            chase: LedChase::default(),
            sweep: GaugeSweep::default(),
            console: VecDeque::new(),
            last_battery: None,
            identification: None,
            quit: false,
        }
    }

    /// Shared transport
    pub fn transport(&self) -> &Transport<S> {
        &self.transport
    }

    /// Mutable access to the shared transport
    pub fn transport_mut(&mut self) -> &mut Transport<S> {
        &mut self.transport
    }

    /// Owner of the current test state
    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    /// Most recent battery poll
    pub fn last_battery(&self) -> Option<&BatteryReading> {
        self.last_battery.as_ref()
    }

    /// Report produced by `begin`, once it has run
    pub fn identification(&self) -> Option<&IdentificationReport> {
        self.identification.as_ref()
    }

    /// State of the `TEST_LED_1` animation
    pub fn led_chase(&self) -> &LedChase {
        &self.chase
    }

    /// State of the `TEST_LED_2` animation
    pub fn gauge_sweep(&self) -> &GaugeSweep {
        &self.sweep
    }

    /// Queue a console command for the next tick
    pub fn submit(&mut self, command: ConsoleCommand) {
        self.console.push_back(command);
    }

    /// Run one scheduling pass. `now` is the time since the scheduler started.
    pub fn tick(&mut self, now: Duration) {
        if self.battery_timer.fire(now) {
            self.poll_battery();
        }

        if self.button_timer.fire(now) {
            self.poll_button();
        }

        let current = self.sequencer.current();
        if current != self.observed {
            self.observed = current;
            self.on_enter(current, now);
        }

        match current {
            Some(TestState::TestLed1) if self.chase_timer.fire(now) => {
                let leds = self.chase.step();
                if let Err(e) = self.transport.set_leds(&leds) {
                    warn!("LED update failed: {}", e);
                }
            }
            Some(TestState::TestLed2) if self.sweep_timer.fire(now) => {
                let percentage = self.sweep.step();
                if let Err(e) = self.transport.set_led_gauge(percentage) {
                    warn!("LED gauge update failed: {}", e);
                }
            }
            _ => {}
        }

        while let Some(command) = self.console.pop_front() {
            match command {
                ConsoleCommand::Begin => {
                    if let Some(report) = self.sequencer.begin(&mut self.transport) {
                        self.identification = Some(report);
                    }
                }
                ConsoleCommand::Quit => self.quit = true,
            }
        }
    }

    /// Tick in real time until `quit` is received or the sequence finishes.
    pub fn run(&mut self, console: &Receiver<ConsoleCommand>) {
        self.run_with(console, |_| {});
    }

    /// Like [`Poller::run`], calling `after_tick` once after every tick.
    pub fn run_with<F>(&mut self, console: &Receiver<ConsoleCommand>, mut after_tick: F)
    where
        F: FnMut(&mut Self),
    {
        let start = Instant::now();
        while !self.quit && !self.sequencer.is_finished() {
            for command in console.try_iter() {
                self.submit(command);
            }
            self.tick(start.elapsed());
            after_tick(self);
            thread::sleep(Duration::from_millis(TICK_INTERVAL_MS));
        }
        info!("Scheduler stopped.");
    }

    fn on_enter(&mut self, state: Option<TestState>, now: Duration) {
        match state {
            Some(TestState::TestLed1) => {
                self.chase = LedChase::default();
                self.chase_timer.rearm(now);
            }
            Some(TestState::TestLed2) => {
                self.sweep = GaugeSweep::default();
                self.sweep_timer.rearm(now);
            }
            _ => {}
        }
    }

    fn poll_battery(&mut self) {
        let voltage_mv = match self.transport.battery_voltage_mv() {
            Ok(voltage) => {
                info!("Batt voltage : {} mV", voltage);
                Some(voltage)
            }
            Err(e) => {
                warn!("Battery voltage poll failed: {}", e);
                None
            }
        };
        let percentage = match self.transport.battery_percentage() {
            Ok(percentage) => {
                info!("Batt percentage : {} %", percentage);
                Some(percentage)
            }
            Err(e) => {
                warn!("Battery percentage poll failed: {}", e);
                None
            }
        };
        self.last_battery = Some(BatteryReading {
            timestamp: Utc::now(),
            voltage_mv,
            percentage,
        });
    }

    fn poll_button(&mut self) {
        match self.transport.button_event() {
            Ok(ButtonEvent::Click) => {
                info!("Main button clicked.");
                self.sequencer.advance(&mut self.transport);
            }
            Ok(ButtonEvent::DoubleClick) => debug!("Double click ignored."),
            Ok(ButtonEvent::None) => {}
            Err(e) => warn!("Button poll failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn test_timer_fires_after_period_and_rearms() {
        let mut timer = PeriodicTimer::new(ms(200));
        assert!(!timer.fire(ms(0)));
        assert!(!timer.fire(ms(199)));
        assert!(timer.fire(ms(200)));
        assert!(!timer.fire(ms(350)));
        assert!(timer.fire(ms(430)));
    }

    #[test]
    fn test_timer_rearm() {
        let mut timer = PeriodicTimer::new(ms(100));
        timer.rearm(ms(1000));
        assert!(!timer.fire(ms(1050)));
        assert!(timer.fire(ms(1100)));
    }

    #[test]
    fn test_chase_frames() {
        assert_eq!(LedChase::frame(0), [4, 2, 0, 0, 0, 0]);
        assert_eq!(LedChase::frame(2), [0, 1, 4, 2, 0, 0]);
        assert_eq!(LedChase::frame(5), [0, 0, 0, 0, 1, 4]);
    }

    #[test]
    fn test_chase_frame_index_out_of_range() {
        assert_eq!(LedChase::frame(6), LedChase::frame(0));
        assert_eq!(LedChase::frame(13), LedChase::frame(1));
    }

    #[test]
    fn test_chase_wraps() {
        let mut chase = LedChase::default();
        for _ in 0..5 {
            chase.step();
        }
        assert_eq!(chase.index(), 5);
        assert_eq!(chase.step(), [0, 0, 0, 0, 1, 4]);
        assert_eq!(chase.index(), 0);
    }

    #[test]
    fn test_sweep_wraps_at_100() {
        let mut sweep = GaugeSweep::default();
        let values: Vec<i32> = (0..102).map(|_| sweep.step()).collect();
        assert_eq!(values[0], 0);
        assert_eq!(values[99], 99);
        assert_eq!(values[100], 0);
        assert_eq!(values[101], 1);
    }

    #[test]
    fn test_console_parse() {
        assert_eq!(ConsoleCommand::parse("begin\n"), Some(ConsoleCommand::Begin));
        assert_eq!(ConsoleCommand::parse(" quit "), Some(ConsoleCommand::Quit));
        assert_eq!(ConsoleCommand::parse("start"), None);
    }
}
