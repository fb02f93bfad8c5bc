use std::{
    io,
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use device_sim::{feed_events, run_listener, DriverPeer, Keyboard, SessionSettings};
use driver_core::{Driver, DriverContext, Endpoints};
use shared::{
    domain::LedState,
    output::MemorySink,
    protocol::{RUNNING, TERMINATED},
};
use tokio::{io::duplex, sync::watch};
use transport::{ByteCell, ChannelNames, LocalCell, ShmCell};

const POLL: Duration = Duration::from_millis(20);
const DEADLINE: Duration = Duration::from_secs(10);

/// An in-process driver whose exit code is published on a watch channel.
struct TaskPeer {
    exit: watch::Receiver<Option<i32>>,
}

#[async_trait]
impl DriverPeer for TaskPeer {
    fn try_exit_code(&mut self) -> io::Result<Option<i32>> {
        Ok(*self.exit.borrow())
    }

    async fn wait_exit_code(&mut self) -> io::Result<i32> {
        let code = *self
            .exit
            .wait_for(Option::is_some)
            .await
            .map_err(io::Error::other)?;
        Ok(code.unwrap_or(-1))
    }

    fn request_stop(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn unique_names(dir: &std::path::Path, tag: &str) -> ChannelNames {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let pid = std::process::id();
    ChannelNames {
        fifo_dir: dir.to_path_buf(),
        led_shm: format!("/kbd_led_{tag}_{pid}_{suffix}"),
        terminate_shm: format!("/kbd_term_{tag}_{pid}_{suffix}"),
        ..ChannelNames::default()
    }
}

fn quick_settings() -> SessionSettings {
    SessionSettings {
        feed_delay: Duration::ZERO,
        shutdown_grace: Duration::from_secs(2),
        connect_retry: Duration::from_millis(5),
    }
}

#[tokio::test]
async fn in_memory_driver_and_listener_agree_on_the_led() {
    let (mut events, driver_events) = duplex(64);
    let (driver_commands, commands) = duplex(64);
    let (acks, driver_acks) = duplex(64);
    let leds = Arc::new(LocalCell::new(LedState::Off.as_byte()));
    let terminate = Arc::new(LocalCell::new(RUNNING));
    let output = MemorySink::new();
    let notices = MemorySink::new();

    let mut driver = Driver::start(DriverContext {
        endpoints: Endpoints {
            events: Box::new(driver_events),
            commands: Box::new(driver_commands),
            acks: Box::new(driver_acks),
        },
        leds: leds.clone(),
        terminate: terminate.clone(),
        output: Box::new(output.clone()),
    });
    let listener = tokio::spawn(run_listener(
        commands,
        acks,
        leds.clone(),
        LedState::Off,
        Box::new(notices.clone()),
    ));

    feed_events(&mut events, b"ab@cd&e", Duration::ZERO)
        .await
        .expect("feed");
    tokio::time::timeout(DEADLINE, driver.wait_terminated(POLL))
        .await
        .expect("driver terminated");
    let report = driver.close().await;
    let listened = listener.await.expect("listener join");

    assert_eq!(output.contents(), "abCDE");
    assert_eq!(notices.contents(), "ON ");
    assert_eq!(report.final_led, Some(LedState::On));
    assert_eq!(report.stats.handshakes, 1);
    assert_eq!(listened.acks, 1);
    assert_eq!(listened.transitions, vec![LedState::On]);
    assert_eq!(LedState::from_byte(leds.load()), LedState::On);
    assert_eq!(terminate.load(), TERMINATED);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn session_over_named_pipes_and_shared_memory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let names = unique_names(dir.path(), "session");
    let mut keyboard = Keyboard::create(&names, LedState::Off).expect("keyboard");

    let (exit_tx, exit_rx) = watch::channel(None);
    let output = MemorySink::new();
    let driver_names = names.clone();
    let driver_output = output.clone();
    let driver = tokio::spawn(async move {
        let code = match Driver::open(&driver_names, Box::new(driver_output)).await {
            Ok(mut driver) => {
                driver.wait_terminated(POLL).await;
                driver.close().await;
                0
            }
            Err(_) => 1,
        };
        let _ = exit_tx.send(Some(code));
    });

    let notices = MemorySink::new();
    let mut peer = TaskPeer { exit: exit_rx };
    let report = tokio::time::timeout(
        DEADLINE,
        keyboard.run(b"#@a&#", &mut peer, &quick_settings(), Box::new(notices.clone())),
    )
    .await
    .expect("session finished")
    .expect("session");
    driver.await.expect("driver join");

    assert_eq!(report.driver_exit, 0);
    assert!(report.feed_completed);
    assert_eq!(report.bytes_fed, 5);
    assert_eq!(report.listener.acks, 1);
    assert_eq!(report.listener.transitions, vec![LedState::On]);
    assert_eq!(output.contents(), "A");
    assert_eq!(notices.contents(), "ON ");
    assert_eq!(keyboard.led(), Some(LedState::On));

    keyboard.cleanup();
    for path in names.fifo_paths() {
        assert!(!path.exists(), "{} left behind", path.display());
    }
    assert!(ShmCell::open(&names.led_shm).is_err());
}

#[tokio::test]
async fn driver_that_never_connects_fails_the_session() {
    let dir = tempfile::tempdir().expect("tempdir");
    let names = unique_names(dir.path(), "no_driver");
    let mut keyboard = Keyboard::create(&names, LedState::Off).expect("keyboard");

    let (_exit_tx, exit_rx) = watch::channel(Some(1));
    let mut peer = TaskPeer { exit: exit_rx };
    let result = keyboard
        .run(b"abc", &mut peer, &quick_settings(), Box::new(MemorySink::new()))
        .await;

    assert!(result.is_err());
    let flag = ShmCell::open(&names.terminate_shm).expect("terminate cell");
    assert_eq!(flag.load(), TERMINATED);
}

#[test]
fn creation_failure_leaves_nothing_behind() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut names = unique_names(dir.path(), "bad_shm");
    names.led_shm = "no_leading_slash/and/more".into();

    assert!(Keyboard::create(&names, LedState::Off).is_err());
    for path in names.fifo_paths() {
        assert!(!path.exists(), "{} left behind", path.display());
    }
    assert!(ShmCell::open(&names.terminate_shm).is_err());
}
