//! Unit tests for the monitor tick and worker lifecycle.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc;
use std::time::Instant;

use mockall::predicate::eq;
use rstest::{fixture, rstest};

use super::*;
use crate::power::{Engagement, LoggingPerfBackend, MockPerfBackend, PerfMode};

const THRESHOLD: u64 = 35 << 18;

fn settings() -> MonitorSettings {
    MonitorSettings {
        threshold: THRESHOLD,
        ack_ratio: AckRatio::new(3),
        tick: Duration::from_millis(5),
        idle_tick: Duration::from_millis(5),
    }
}

/// Replays a fixed counter sequence, repeating the final value.
struct ScriptedSampler {
    values: Mutex<VecDeque<u64>>,
}

impl ScriptedSampler {
    fn new(values: &[u64]) -> Arc<Self> {
        Arc::new(Self {
            values: Mutex::new(values.iter().copied().collect()),
        })
    }
}

impl CounterSampler for ScriptedSampler {
    fn sample(&self) -> u64 {
        let mut values = self.values.lock().expect("sampler lock");
        if values.len() > 1 {
            values.pop_front().unwrap_or_default()
        } else {
            values.front().copied().unwrap_or_default()
        }
    }
}

/// Grows by far more than the threshold on every sample.
#[derive(Default)]
struct SurgingSampler {
    total: AtomicU64,
}

impl CounterSampler for SurgingSampler {
    fn sample(&self) -> u64 {
        self.total.fetch_add(THRESHOLD * 4, Ordering::SeqCst) + THRESHOLD * 4
    }
}

/// Parks the first sample until the test releases it.
struct GatedSampler {
    gate: Mutex<Option<mpsc::Receiver<()>>>,
    entered: Mutex<mpsc::Sender<()>>,
}

impl CounterSampler for GatedSampler {
    fn sample(&self) -> u64 {
        let gate = self.gate.lock().expect("gate lock").take();
        if let Some(gate) = gate {
            let _ = self.entered.lock().expect("entered lock").send(());
            let _ = gate.recv();
        }
        0
    }
}

#[fixture]
fn power() -> Arc<PowerState> {
    Arc::new(PowerState::new(Arc::new(LoggingPerfBackend), true))
}

fn counting_perf(acquires: usize, releases: usize, ack_writes: usize) -> Arc<PowerState> {
    let mut perf = MockPerfBackend::new();
    perf.expect_acquire()
        .with(eq(PerfMode::LowPower))
        .times(acquires)
        .returning(|_| Ok(()));
    perf.expect_release()
        .with(eq(PerfMode::LowPower))
        .times(releases)
        .returning(|_| Ok(()));
    perf.expect_write_ack_ratio()
        .with(eq(Some(AckRatio::new(3))))
        .times(ack_writes)
        .returning(|_| Ok(()));
    perf.expect_write_ack_ratio()
        .with(eq(None))
        .times(releases)
        .returning(|_| Ok(()));
    Arc::new(PowerState::new(Arc::new(perf), true))
}

#[test]
fn surge_engages_once_and_sets_ack_once() {
    let power = counting_perf(1, 0, 1);
    let core = MonitorCore::new(
        ScriptedSampler::new(&[0, 100_000_000, 200_000_000]),
        Arc::clone(&power),
        settings(),
    );
    let mut window = SampleWindow::default();

    assert_eq!(core.tick(&mut window), TickOutcome::Steady);
    assert_eq!(
        core.tick(&mut window),
        TickOutcome::Engaged {
            bits_per_second: 800_000_000
        }
    );
    assert_eq!(core.tick(&mut window), TickOutcome::Steady);

    let snapshot = power.snapshot();
    assert_eq!(snapshot.low_power, Engagement::Engaged);
    assert_eq!(snapshot.ack_reduction, Some(AckRatio::new(3)));
}

#[test]
fn flat_counters_release_once() {
    let power = counting_perf(1, 1, 1);
    let core = MonitorCore::new(
        ScriptedSampler::new(&[0, 100_000_000, 100_000_000]),
        Arc::clone(&power),
        settings(),
    );
    let mut window = SampleWindow::default();
    core.tick(&mut window);
    core.tick(&mut window);

    assert_eq!(
        core.tick(&mut window),
        TickOutcome::Released { bits_per_second: 0 }
    );
    assert_eq!(core.tick(&mut window), TickOutcome::Steady);
    assert_eq!(core.tick(&mut window), TickOutcome::Steady);
    assert_eq!(power.snapshot().low_power, Engagement::NotEngaged);
}

#[rstest]
fn delta_at_threshold_does_not_engage(power: Arc<PowerState>) {
    let core = MonitorCore::new(ScriptedSampler::new(&[THRESHOLD]), Arc::clone(&power), settings());
    let mut window = SampleWindow::default();

    assert_eq!(core.tick(&mut window), TickOutcome::Steady);
    assert_eq!(power.snapshot().low_power, Engagement::NotEngaged);
}

#[rstest]
fn first_tick_measures_from_zero(power: Arc<PowerState>) {
    let core = MonitorCore::new(
        ScriptedSampler::new(&[THRESHOLD + 1]),
        Arc::clone(&power),
        settings(),
    );
    let mut window = SampleWindow::default();

    assert!(matches!(core.tick(&mut window), TickOutcome::Engaged { .. }));
}

#[rstest]
fn counter_reset_saturates_to_zero(power: Arc<PowerState>) {
    let core = MonitorCore::new(ScriptedSampler::new(&[500, 10]), Arc::clone(&power), settings());
    let mut window = SampleWindow { last: 1_000 };

    assert_eq!(core.tick(&mut window), TickOutcome::Steady);
    assert_eq!(window.last, 500);
}

#[rstest]
fn closed_gate_releases_and_keeps_window(power: Arc<PowerState>) {
    let core = MonitorCore::new(
        ScriptedSampler::new(&[100_000_000]),
        Arc::clone(&power),
        settings(),
    );
    let mut window = SampleWindow::default();
    core.tick(&mut window);
    assert_eq!(power.snapshot().low_power, Engagement::Engaged);

    power.set_test_sim(false);

    assert_eq!(core.tick(&mut window), TickOutcome::Gated);
    assert_eq!(window.last, 100_000_000);
    let snapshot = power.snapshot();
    assert_eq!(snapshot.low_power, Engagement::NotEngaged);
    assert_eq!(snapshot.ack_reduction, None);
}

#[rstest]
fn tether_mode_suppresses_engagement(power: Arc<PowerState>) {
    power.enter_tether().expect("tether");
    let core = MonitorCore::new(
        ScriptedSampler::new(&[100_000_000]),
        Arc::clone(&power),
        settings(),
    );

    assert_eq!(core.tick(&mut SampleWindow::default()), TickOutcome::Steady);
    assert_eq!(power.snapshot().low_power, Engagement::NotEngaged);
}

#[rstest]
fn stop_while_engaged_releases_power(power: Arc<PowerState>) {
    let monitor = ThroughputMonitor::new(
        Arc::new(SurgingSampler::default()),
        Arc::clone(&power),
        settings(),
    );
    monitor.start().expect("start");

    let deadline = Instant::now() + Duration::from_secs(5);
    while power.snapshot().low_power != Engagement::Engaged {
        assert!(Instant::now() < deadline, "monitor never engaged");
        thread::sleep(Duration::from_millis(2));
    }
    monitor.stop().expect("stop");

    assert!(!monitor.is_running());
    let snapshot = power.snapshot();
    assert_eq!(snapshot.low_power, Engagement::NotEngaged);
    assert_eq!(snapshot.ack_reduction, None);
}

#[rstest]
fn lifecycle_calls_are_tolerant_of_repeats(power: Arc<PowerState>) {
    let mut sampler = MockCounterSampler::new();
    sampler.expect_sample().returning(|| 0);
    let monitor = ThroughputMonitor::new(Arc::new(sampler), power, settings());

    monitor.stop().expect("stop while stopped");
    monitor.start().expect("start");
    monitor.start().expect("start while running");
    assert_eq!(monitor.status(), MonitorStatus::Running);
    monitor.stop().expect("stop");
    assert_eq!(monitor.status(), MonitorStatus::Stopped);
    monitor.start().expect("restart");
    monitor.stop().expect("stop again");
}

#[rstest]
fn stop_interrupts_a_long_wait(power: Arc<PowerState>) {
    let mut slow = settings();
    slow.tick = Duration::from_secs(3_600);
    let monitor = ThroughputMonitor::new(ScriptedSampler::new(&[0]), power, slow);
    monitor.start().expect("start");

    let begun = Instant::now();
    monitor.stop().expect("stop");

    assert!(begun.elapsed() < Duration::from_secs(5));
}

#[rstest]
fn start_waits_for_a_stop_in_progress(power: Arc<PowerState>) {
    let (release, gate) = mpsc::channel();
    let (entered_tx, entered) = mpsc::channel();
    let sampler = Arc::new(GatedSampler {
        gate: Mutex::new(Some(gate)),
        entered: Mutex::new(entered_tx),
    });
    let monitor = Arc::new(ThroughputMonitor::new(sampler, power, settings()));
    monitor.start().expect("start");
    entered
        .recv_timeout(Duration::from_secs(5))
        .expect("worker reached its first sample");

    let stopper = {
        let monitor = Arc::clone(&monitor);
        thread::spawn(move || monitor.stop())
    };
    let deadline = Instant::now() + Duration::from_secs(5);
    while monitor.task.try_lock().is_ok() {
        assert!(Instant::now() < deadline, "stop never claimed the task slot");
        thread::sleep(Duration::from_millis(1));
    }

    let restarted = Arc::new(AtomicBool::new(false));
    let starter = {
        let monitor = Arc::clone(&monitor);
        let restarted = Arc::clone(&restarted);
        thread::spawn(move || {
            let started = monitor.start();
            restarted.store(true, Ordering::SeqCst);
            started
        })
    };
    thread::sleep(Duration::from_millis(50));
    assert!(
        !restarted.load(Ordering::SeqCst),
        "start returned while the previous worker was still being joined"
    );

    release.send(()).expect("release parked worker");
    stopper.join().expect("stopper thread").expect("stop");
    starter.join().expect("starter thread").expect("start");

    assert!(monitor.is_running());
    monitor.stop().expect("final stop");
}
