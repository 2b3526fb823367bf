//! Panel actions the supervisor takes between workers

use crate::config::DisplayConfig;
use crate::display::{self, DisplayError, Orientation, Panel, Rgb565, St7789};
use crate::hal::{Bus, Delay, GpioBackend};

/// What the supervisor can do to the panel on its own
pub trait RecoveryPanel {
    /// Pulse the reset line only; the relaunched worker runs the full init
    fn hardware_reset(&mut self) -> Result<(), DisplayError>;

    /// Reset, initialize and paint the whole frame in `color`
    fn show_alert(&mut self, color: Rgb565) -> Result<(), DisplayError>;
}

/// Opens the configured panel with its pins claimed
pub type PanelOpener = Box<dyn FnMut() -> Result<Panel, DisplayError>>;

/// Real panel, opened fresh for each action
///
/// The supervisor never holds the bus while a worker runs. Pins stay
/// exported after each action for the next worker; see
/// [`display::release_pins`] for handing them back.
pub struct HardwarePanel<F = PanelOpener> {
    open: F,
    orientation: Orientation,
}

impl HardwarePanel {
    pub fn new(config: DisplayConfig) -> Self {
        let orientation = config.orientation;
        Self::with_opener(orientation, Box::new(move || display::open(&config)))
    }
}

impl<F> HardwarePanel<F> {
    /// Panel opened through `open` and initialized in `orientation` for alerts
    pub fn with_opener(orientation: Orientation, open: F) -> Self {
        Self { open, orientation }
    }
}

impl<F, B, G, D> HardwarePanel<F>
where
    F: FnMut() -> Result<St7789<B, G, D>, DisplayError>,
    B: Bus,
    G: GpioBackend,
    D: Delay,
{
    /// Export and configure the control pins ahead of the first worker
    pub fn prepare(&mut self) -> Result<(), DisplayError> {
        (self.open)().map(drop)
    }
}

impl<F, B, G, D> RecoveryPanel for HardwarePanel<F>
where
    F: FnMut() -> Result<St7789<B, G, D>, DisplayError>,
    B: Bus,
    G: GpioBackend,
    D: Delay,
{
    fn hardware_reset(&mut self) -> Result<(), DisplayError> {
        (self.open)()?.hardware_reset()
    }

    fn show_alert(&mut self, color: Rgb565) -> Result<(), DisplayError> {
        let mut panel = (self.open)()?;
        panel.hardware_reset()?;
        panel.initialize(self.orientation)?;
        panel.fill(color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::ControlPins;
    use crate::hal::{BusError, Level};
    use crate::testing::{Event, EventLog, MockBus, MockDelay, MockGpio};

    const RESET: u8 = 24;

    type MockPanel = St7789<MockBus, MockGpio, MockDelay>;

    fn mock_panel(log: &EventLog, orientation: Orientation) -> HardwarePanel<impl FnMut() -> Result<MockPanel, DisplayError>> {
        let log = log.clone();
        HardwarePanel::with_opener(orientation, move || {
            let panel = St7789::new(
                MockBus::new(log.clone()),
                MockGpio::new(log.clone()),
                MockDelay::new(log.clone()),
                ControlPins {
                    reset: RESET,
                    backlight: None,
                },
            )
            .with_clear_on_init(false);
            Ok(panel)
        })
    }

    fn reset_pulse() -> Vec<Event> {
        vec![
            Event::Write { pin: RESET, level: Level::High },
            Event::Delay(10),
            Event::Write { pin: RESET, level: Level::Low },
            Event::Delay(50),
            Event::Write { pin: RESET, level: Level::High },
            Event::Delay(150),
        ]
    }

    fn reset_writes(log: &EventLog) -> usize {
        log.events()
            .iter()
            .filter(|e| matches!(e, Event::Write { pin: RESET, level: Level::Low }))
            .count()
    }

    #[test]
    fn test_recovery_reset_is_pulse_only() {
        let log = EventLog::new();
        let mut panel = mock_panel(&log, Orientation::Landscape);

        panel.hardware_reset().unwrap();

        assert_eq!(log.events(), reset_pulse());
        assert!(log.bus_events().is_empty());
    }

    #[test]
    fn test_alert_resets_initializes_and_fills() {
        let log = EventLog::new();
        let mut panel = mock_panel(&log, Orientation::Portrait);

        panel.show_alert(Rgb565::RED).unwrap();

        let events = log.events();
        assert_eq!(events[..6], reset_pulse()[..]);
        assert_eq!(reset_writes(&log), 1);

        assert_eq!(
            log.commands(),
            vec![0x01, 0x11, 0x36, 0x3A, 0x13, 0x21, 0x29, 0x2A, 0x2B, 0x2C]
        );
        let bus = log.bus_events();
        let madctl = bus.iter().position(|e| *e == Event::Command(0x36)).unwrap();
        assert_eq!(bus[madctl + 1], Event::Data(vec![0x00]));

        // Portrait frame: columns 0..=239, rows 0..=319
        let ramwr = bus.iter().position(|e| *e == Event::Command(0x2C)).unwrap();
        assert_eq!(bus[ramwr - 3], Event::Data(vec![0x00, 0x00, 0x00, 0xEF]));
        assert_eq!(bus[ramwr - 1], Event::Data(vec![0x00, 0x00, 0x01, 0x3F]));

        let pixels: Vec<u8> = bus[ramwr + 1..]
            .iter()
            .flat_map(|e| match e {
                Event::Data(bytes) => bytes.clone(),
                other => panic!("unexpected {:?} inside the pixel stream", other),
            })
            .collect();
        assert_eq!(pixels.len(), 240 * 320 * 2);
        assert!(pixels.chunks(2).all(|word| word == [0xF8, 0x00]));
    }

    #[test]
    fn test_open_failure_is_reported() {
        let mut panel = HardwarePanel::with_opener(Orientation::Landscape, || -> Result<MockPanel, DisplayError> {
            Err(DisplayError::Communication(BusError::ReadUnsupported))
        });
        assert!(panel.hardware_reset().is_err());
        assert!(panel.show_alert(Rgb565::RED).is_err());
        assert!(panel.prepare().is_err());
    }

    #[test]
    fn test_unavailable_bus_is_reported() {
        let mut panel = HardwarePanel::new(DisplayConfig::default().with_spi_device("/nonexistent/spidev9.9"));

        let err = panel.hardware_reset().unwrap_err();
        assert!(matches!(err, DisplayError::Communication(BusError::Open { .. })));
        assert!(panel.show_alert(Rgb565::RED).is_err());
        assert!(panel.prepare().is_err());
    }
}
