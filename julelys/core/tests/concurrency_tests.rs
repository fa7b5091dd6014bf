//! Concurrency tests for the render pipeline
//!
//! These tests exercise the thread boundaries:
//! - Compositor swaps are atomic as seen by the transmission side
//! - Replacing the active set never waits for old sequences
//! - Stop requests are honored within one frame
//! - Concurrent reconfiguration leaves a consistent active set

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::seq::SliceRandom;
use rand::Rng;

use julelys_core::output::BYTES_PER_CELL;
use julelys_core::script::ScriptSequence;
use julelys_core::sequence::{FadeColor, TestColor};
use julelys_core::{
    ActiveSequence, ChannelOrderEncoder, Color, Controller, DeviceError, Frame, FrameCompositor,
    FrameWriter, MatrixSize, OutputDevice, OutputMode, ScriptEngine, ScriptError, Sequence,
    SequenceContext, SequenceRunner, TransmissionLoop,
};

fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(1));
    }
}

// =============================================================================
// Compositor swap atomicity
// =============================================================================

/// Distinct color for every commit number
fn sentinel(commit: u32) -> Color {
    let [r, g, b, w] = commit.to_be_bytes();
    Color::rgbw(r, g, b, w)
}

fn sentinel_value(color: Color) -> u32 {
    u32::from_be_bytes([color.red, color.green, color.blue, color.white])
}

#[test]
fn test_reader_never_sees_a_torn_frame() {
    const COMMITS: u32 = 3000;
    let size = MatrixSize::new(8, 55);
    let compositor = Arc::new(FrameCompositor::new(size));
    let done = Arc::new(AtomicBool::new(false));

    let writer = {
        let compositor = Arc::clone(&compositor);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut back = Frame::new(size);
            for commit in 1..=COMMITS {
                back.fill(sentinel(commit));
                compositor.swap(&mut back);
            }
            done.store(true, Ordering::SeqCst);
        })
    };

    let mut reads = 0;
    let mut last_seen = 0;
    let mut frame = Frame::new(size);
    while !done.load(Ordering::SeqCst) {
        compositor.copy_front_into(&mut frame);
        let first = frame.cells()[0];
        assert!(frame.is_filled_with(first), "torn frame after {reads} reads");
        let value = sentinel_value(first);
        assert!(value >= last_seen, "front buffer went backwards");
        last_seen = value;
        reads += 1;
    }
    writer.join().unwrap();
    assert_eq!(compositor.swap_count(), u64::from(COMMITS));
    assert_eq!(sentinel_value(compositor.snapshot_front().cells()[0]), COMMITS);
}

/// Records the first quad of every write and checks each buffer is uniform
struct UniformCheckDevice {
    frames: Arc<AtomicUsize>,
    torn: Arc<AtomicUsize>,
}

impl OutputDevice for UniformCheckDevice {
    fn write(&mut self, bytes: &[u8]) -> Result<(), DeviceError> {
        let first = &bytes[..BYTES_PER_CELL];
        if !bytes.chunks(BYTES_PER_CELL).all(|quad| quad == first) {
            self.torn.fetch_add(1, Ordering::SeqCst);
        }
        self.frames.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn test_transmission_sends_whole_frames_while_drawing() {
    let size = MatrixSize::new(4, 20);
    let compositor = Arc::new(FrameCompositor::new(size));
    let frames = Arc::new(AtomicUsize::new(0));
    let torn = Arc::new(AtomicUsize::new(0));

    let device = UniformCheckDevice {
        frames: Arc::clone(&frames),
        torn: Arc::clone(&torn),
    };
    let mut handle = TransmissionLoop::new(
        Arc::clone(&compositor),
        Box::new(device),
        Arc::new(ChannelOrderEncoder::default()),
        240,
    )
    .spawn()
    .unwrap();

    let runner = Arc::new(SequenceRunner::new(Duration::from_millis(1)));
    runner.replace_active_set(vec![ActiveSequence::new(
        "test",
        Sequence::TestColor(TestColor::new()),
    )]);
    let mut writer = FrameWriter::simulated(Arc::clone(&compositor));
    for _ in 0..200 {
        runner.run_pass(&mut writer);
    }

    wait_until("transmitted frames", || frames.load(Ordering::SeqCst) >= 5);
    handle.stop();
    assert_eq!(torn.load(Ordering::SeqCst), 0);
}

// =============================================================================
// Active-set replacement
// =============================================================================

/// Ignores its stop flag until released
struct StubbornEngine {
    release: Arc<AtomicBool>,
    entered: Arc<AtomicBool>,
}

impl ScriptEngine for StubbornEngine {
    fn run(&self, _code: &str, ctx: &mut SequenceContext<'_>) -> Result<(), ScriptError> {
        self.entered.store(true, Ordering::SeqCst);
        while !self.release.load(Ordering::SeqCst) {
            ctx.fill(Color::BLUE);
            ctx.commit_frame();
            thread::sleep(Duration::from_millis(1));
        }
        Ok(())
    }
}

#[test]
fn test_replacement_does_not_wait_for_old_sequences() {
    let size = MatrixSize::new(2, 3);
    let compositor = Arc::new(FrameCompositor::new(size));
    let runner = Arc::new(SequenceRunner::new(Duration::from_millis(1)));
    let release = Arc::new(AtomicBool::new(false));
    let entered = Arc::new(AtomicBool::new(false));

    let engine = Arc::new(StubbornEngine {
        release: Arc::clone(&release),
        entered: Arc::clone(&entered),
    });
    runner.replace_active_set(vec![ActiveSequence::new(
        "stubborn",
        Sequence::Script(ScriptSequence::new("stubborn", Arc::from(""), engine)),
    )]);

    let handle = {
        let runner = Arc::clone(&runner);
        let compositor = Arc::clone(&compositor);
        thread::spawn(move || {
            let mut writer = FrameWriter::new(compositor, Duration::ZERO);
            runner.run_forever(&mut writer);
        })
    };
    wait_until("stubborn script to start", || entered.load(Ordering::SeqCst));

    let started = Instant::now();
    runner.replace_active_set(vec![ActiveSequence::new(
        "fade",
        Sequence::FadeColor(FadeColor::new()),
    )]);
    assert!(started.elapsed() < Duration::from_millis(100));
    assert_eq!(runner.active_names(), vec!["fade"]);

    // Once the old body returns, the new set takes over the output
    release.store(true, Ordering::SeqCst);
    wait_until("fade frames", || {
        compositor.snapshot_front().cells()[1] == Color::GREEN
    });

    runner.shutdown();
    handle.join().unwrap();
}

#[test]
fn test_stop_is_honored_within_one_frame() {
    let size = MatrixSize::new(8, 55);
    let compositor = Arc::new(FrameCompositor::new(size));
    let runner = Arc::new(SequenceRunner::new(Duration::from_millis(1)));
    runner.replace_active_set(vec![ActiveSequence::new(
        "fade",
        Sequence::FadeColor(FadeColor::new()),
    )]);

    let handle = {
        let runner = Arc::clone(&runner);
        let compositor = Arc::clone(&compositor);
        thread::spawn(move || {
            let mut writer = FrameWriter::new(compositor, Duration::from_millis(2));
            runner.run_forever(&mut writer);
        })
    };
    wait_until("fade to start", || compositor.swap_count() > 2);

    let old = runner.snapshot();
    runner.replace_active_set(Vec::new());
    assert!(old[0].is_stop_requested());

    // The body returns at its next frame boundary, after which no more
    // frames are committed.
    thread::sleep(Duration::from_millis(20));
    let settled = compositor.swap_count();
    thread::sleep(Duration::from_millis(30));
    assert_eq!(compositor.swap_count(), settled);

    runner.shutdown();
    handle.join().unwrap();
}

#[test]
fn test_test_color_finishes_black_after_five_commits() {
    let size = MatrixSize::new(8, 55);
    let compositor = Arc::new(FrameCompositor::new(size));
    let runner = SequenceRunner::default();
    runner.replace_active_set(vec![ActiveSequence::new(
        "Test Color",
        Sequence::TestColor(TestColor::new()),
    )]);

    let mut writer = FrameWriter::simulated(Arc::clone(&compositor));
    assert_eq!(runner.run_pass(&mut writer), 1);

    assert_eq!(compositor.swap_count(), 5);
    assert!(compositor.snapshot_front().is_filled_with(Color::BLACK));
    assert_eq!(writer.elapsed(), Duration::from_secs(5));
}

// =============================================================================
// Concurrent reconfiguration
// =============================================================================

#[test]
fn test_concurrent_run_requests_leave_a_consistent_set() {
    let size = MatrixSize::new(4, 10);
    let compositor = Arc::new(FrameCompositor::new(size));
    let runner = Arc::new(SequenceRunner::new(Duration::from_millis(1)));
    let controller = Arc::new(Controller::new(size, OutputMode::Headless, Arc::clone(&runner)));
    let catalogue: Vec<String> = controller.sequences().into_iter().map(|s| s.name).collect();

    let runner_thread = {
        let runner = Arc::clone(&runner);
        let compositor = Arc::clone(&compositor);
        thread::spawn(move || {
            let mut writer = FrameWriter::new(compositor, Duration::ZERO);
            runner.run_forever(&mut writer);
        })
    };

    let snapshots = Arc::new(Mutex::new(Vec::new()));
    let clients: Vec<_> = (0..8)
        .map(|_| {
            let controller = Arc::clone(&controller);
            let catalogue = catalogue.clone();
            let snapshots = Arc::clone(&snapshots);
            thread::spawn(move || {
                let mut rng = rand::thread_rng();
                for _ in 0..25 {
                    let count = rng.gen_range(0..=3);
                    let mut names: Vec<String> =
                        catalogue.choose_multiple(&mut rng, count).cloned().collect();
                    if rng.gen_bool(0.2) {
                        names.push("DoesNotExist".to_string());
                    }
                    let outcome = controller.run_sequences(&names);
                    assert!(outcome.activated.len() <= count);
                    snapshots.lock().push(controller.runner().snapshot());
                }
            })
        })
        .collect();
    for client in clients {
        client.join().unwrap();
    }

    let current = runner.snapshot();
    for snapshot in snapshots.lock().iter() {
        if Arc::ptr_eq(snapshot, &current) {
            continue;
        }
        assert!(snapshot.iter().all(|sequence| sequence.is_stop_requested()));
    }

    // Names stay in registry order
    let active = runner.active_names();
    let positions: Vec<usize> = active
        .iter()
        .map(|name| catalogue.iter().position(|n| n == name).unwrap())
        .collect();
    assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));

    runner.shutdown();
    runner_thread.join().unwrap();
}
