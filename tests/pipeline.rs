// tests/pipeline.rs

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;

use image::{DynamicImage, GrayImage, Luma};

use smart_walker::actions::{ActionDispatcher, AlertRecord, AlertSink, SpeechOutput, TelemetrySink};
use smart_walker::config::VisionConfig;
use smart_walker::decision::{DecisionEngine, DecisionPolicy, TickOutcome};
use smart_walker::error::{SensorError, SinkError, VisionError};
use smart_walker::queue::channel;
use smart_walker::sensor::{boxed, SensorAcquisition, SensorDriver, SensorDrivers};
use smart_walker::sensor_data::{GpsFix, Motion, Range, SensorSnapshot, SensorStatus, Vitals};
use smart_walker::vision::describe::SceneDescriber;
use smart_walker::vision::frame::{Frame, FrameSource};
use smart_walker::vision::{Poll, VisionDescriber};

struct Fixed<T>(T);

impl<T: Copy + Send> SensorDriver for Fixed<T> {
    type Output = T;

    fn read(&mut self) -> Result<Option<T>, SensorError> {
        Ok(Some(self.0))
    }
}

struct Broken;

impl SensorDriver for Broken {
    type Output = Range;

    fn read(&mut self) -> Result<Option<Range>, SensorError> {
        Err(SensorError::EchoTimeout)
    }
}

fn drivers(ultrasonic: Box<dyn SensorDriver<Output = Range>>) -> SensorDrivers {
    SensorDrivers {
        gps: Ok(boxed(Fixed(GpsFix { lat: 12.97, lon: 77.71 }))),
        imu: Ok(boxed(Fixed(Motion { g_magnitude: 1.02 }))),
        ultrasonic: Ok(ultrasonic),
        pulse_ox: Ok(boxed(Fixed(Vitals { hr: 84, spo2: 97 }))),
    }
}

struct OneFrame(Option<Frame>);

impl FrameSource for OneFrame {
    fn latest_frame(&mut self) -> Result<Option<Frame>, VisionError> {
        Ok(self.0.take())
    }
}

struct Says(&'static str);

impl SceneDescriber for Says {
    fn describe(&self, _jpeg: &[u8]) -> Result<Option<String>, VisionError> {
        Ok(Some(self.0.to_string()))
    }
}

fn frame() -> Frame {
    Frame {
        jpeg: Vec::new(),
        image: DynamicImage::ImageLuma8(GrayImage::from_pixel(64, 36, Luma([90]))),
    }
}

#[derive(Clone, Default)]
struct Recorded {
    telemetry: Arc<Mutex<Vec<SensorSnapshot>>>,
    alerts: Arc<Mutex<Vec<AlertRecord>>>,
    spoken: Arc<Mutex<Vec<String>>>,
}

impl TelemetrySink for Recorded {
    fn put_latest(&mut self, snapshot: &SensorSnapshot) -> Result<(), SinkError> {
        self.telemetry.lock().unwrap().push(snapshot.clone());
        Ok(())
    }
}

impl AlertSink for Recorded {
    fn push_alert(&mut self, alert: &AlertRecord) -> Result<(), SinkError> {
        self.alerts.lock().unwrap().push(alert.clone());
        Ok(())
    }
}

impl SpeechOutput for Recorded {
    fn say(&mut self, text: &str) -> Result<(), SinkError> {
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

/// Runs one sensor tick, one vision poll and one decision tick, with the
/// dispatcher on its own thread, and returns what reached the sinks.
fn run_once(ultrasonic: Box<dyn SensorDriver<Output = Range>>, description: Option<&'static str>) -> Recorded {
    let (snapshot_tx, snapshot_rx) = channel("snapshots", 5);
    let (observation_tx, observation_rx) = channel("observations", 5);
    let (command_tx, command_rx) = channel("commands", 5);

    let recorded = Recorded::default();
    let dispatcher = ActionDispatcher::new(
        Box::new(recorded.clone()),
        Box::new(recorded.clone()),
        Box::new(recorded.clone()),
    );
    let actions = thread::spawn(move || dispatcher.run(command_rx));

    let mut acquisition = SensorAcquisition::new(drivers(ultrasonic), snapshot_tx);
    assert!(acquisition.tick());

    let describer = description.map(|d| Box::new(Says(d)) as Box<dyn SceneDescriber>);
    let mut vision = VisionDescriber::new(
        Box::new(OneFrame(Some(frame()))),
        describer,
        &VisionConfig::default(),
        observation_tx,
    );
    assert_eq!(vision.poll(Instant::now).unwrap(), Poll::Emitted { queued: true });

    let mut engine = DecisionEngine::new(snapshot_rx, observation_rx, command_tx, DecisionPolicy::default());
    assert!(matches!(engine.tick(Instant::now()), TickOutcome::Paired { .. }));

    drop(engine);
    actions.join().unwrap();
    recorded
}

#[test]
fn fallback_distance_reports_telemetry_without_speech() {
    let recorded = run_once(Box::new(Broken), Some("a corridor"));

    let telemetry = recorded.telemetry.lock().unwrap();
    assert_eq!(telemetry.len(), 1);
    assert_eq!(telemetry[0].ultrasonic.status, SensorStatus::Simulated);
    assert_eq!(telemetry[0].ultrasonic.data.front_cm, 500.0);
    assert_eq!(telemetry[0].gps.status, SensorStatus::Ok);
    assert!(recorded.spoken.lock().unwrap().is_empty());
}

#[test]
fn close_described_obstacle_is_spoken() {
    let recorded = run_once(boxed(Fixed(Range { front_cm: 40.0 })), Some("a chair ahead"));

    assert_eq!(recorded.telemetry.lock().unwrap().len(), 1);
    assert_eq!(
        *recorded.spoken.lock().unwrap(),
        vec!["Warning! a chair ahead. Object very close at about 40 centimeters.".to_string()]
    );
    assert!(recorded.alerts.lock().unwrap().is_empty());
}

#[test]
fn close_obstacle_without_describer_is_generic() {
    let recorded = run_once(boxed(Fixed(Range { front_cm: 75.0 })), None);
    assert_eq!(*recorded.spoken.lock().unwrap(), vec!["Careful. Nearest object 75.0 cm.".to_string()]);
}

#[test]
fn saturated_snapshot_queue_drops_newest() {
    let (snapshot_tx, snapshot_rx) = channel("snapshots", 5);
    let mut acquisition =
        SensorAcquisition::new(drivers(boxed(Fixed(Range { front_cm: 120.0 }))), snapshot_tx);

    for _ in 0..5 {
        assert!(acquisition.tick());
    }
    assert!(!acquisition.tick());
    assert_eq!(snapshot_rx.len(), 5);

    // The oldest five survive; the sixth never entered the queue.
    let queued: Vec<_> = snapshot_rx.try_iter().collect();
    assert_eq!(queued.len(), 5);
    assert!(queued.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
}
