mod common;

use ash::vk;
use common::*;
use log::{Level, Log, Metadata, Record};
use parking_lot::Mutex;
use std::sync::Once;
use std::thread::{self, ThreadId};
use triangle_renderer::error::{FrameOp, ObjectKind};
use triangle_renderer::logging::LIFECYCLE;
use triangle_renderer::{frame, GraphicsContext};

#[derive(Debug, Clone)]
struct Captured {
    thread: ThreadId,
    level: Level,
    target: String,
    message: String,
}

/// Records every log call; tests run in parallel so each one filters by thread
struct Capture {
    records: Mutex<Vec<Captured>>,
}

impl Log for Capture {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        self.records.lock().push(Captured {
            thread: thread::current().id(),
            level: record.level(),
            target: record.target().to_string(),
            message: record.args().to_string(),
        });
    }

    fn flush(&self) {}
}

static CAPTURE: Capture = Capture {
    records: parking_lot::const_mutex(Vec::new()),
};
static INSTALL: Once = Once::new();

fn install() {
    INSTALL.call_once(|| {
        log::set_logger(&CAPTURE).expect("no other logger in this test binary");
        log::set_max_level(log::LevelFilter::Trace);
    });
}

fn this_thread() -> Vec<Captured> {
    let me = thread::current().id();
    CAPTURE
        .records
        .lock()
        .iter()
        .filter(|r| r.thread == me)
        .cloned()
        .collect()
}

fn errors() -> Vec<String> {
    this_thread()
        .into_iter()
        .filter(|r| r.level == Level::Error)
        .map(|r| r.message)
        .collect()
}

fn bootstrap_error(name: &str, behaviour: Behaviour) {
    let (driver, _log) = RecordingDriver::new(behaviour);
    let window = ScriptedWindow::closing_after(0);
    let result = GraphicsContext::bootstrap(driver, &window, &test_config(name));
    assert!(result.is_err());
}

#[test]
fn missing_gpu_is_logged_once() {
    install();
    bootstrap_error(
        "log-no-gpu",
        Behaviour {
            physical_devices: 0,
            ..Default::default()
        },
    );

    assert_eq!(errors(), ["No Vulkan-capable GPU found"]);
    assert!(this_thread()
        .iter()
        .any(|r| r.target == LIFECYCLE && r.message.starts_with("Startup failed")));
}

#[test]
fn creation_failure_is_logged_once() {
    install();
    bootstrap_error(
        "log-render-pass",
        Behaviour {
            fail_create: Some((ObjectKind::RenderPass, vk::Result::ERROR_OUT_OF_DEVICE_MEMORY)),
            ..Default::default()
        },
    );

    let errors = errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("Failed to create render pass"));
}

#[test]
fn frame_failure_is_logged_once() {
    install();
    let (driver, _log) = RecordingDriver::new(Behaviour {
        fail_frame: Some((FrameOp::Present, 1, vk::Result::ERROR_OUT_OF_DATE_KHR)),
        ..Default::default()
    });
    let mut window = ScriptedWindow::closing_after(5);
    let mut ctx = GraphicsContext::bootstrap(driver, &window, &test_config("log-present"))
        .expect("bootstrap");

    assert!(frame::run(&mut ctx, &mut window).is_err());
    ctx.shutdown().expect("shutdown");

    let errors = errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("queue present failed"));
}
