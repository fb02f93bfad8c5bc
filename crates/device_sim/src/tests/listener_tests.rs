use super::*;

use shared::{output::MemorySink, protocol::LED_COMMAND};
use tokio::io::duplex;
use transport::LocalCell;

#[tokio::test]
async fn acknowledges_every_command_and_reports_only_changes() {
    let (mut driver_commands, commands) = duplex(16);
    let (acks, mut driver_acks) = duplex(16);
    let leds = Arc::new(LocalCell::new(LedState::Off.as_byte()));
    let notices = MemorySink::new();

    let listener = tokio::spawn(run_listener(
        commands,
        acks,
        leds.clone(),
        LedState::Off,
        Box::new(notices.clone()),
    ));

    for led in [LedState::On, LedState::On, LedState::Off] {
        leds.store(led.as_byte());
        driver_commands
            .write_all(&[LED_COMMAND])
            .await
            .expect("command");
        assert_eq!(driver_acks.read_u8().await.expect("ack"), LED_ACK);
    }
    drop(driver_commands);

    let report = listener.await.expect("join");
    assert_eq!(report.commands, 3);
    assert_eq!(report.acks, 3);
    assert_eq!(report.transitions, vec![LedState::On, LedState::Off]);
    assert_eq!(notices.contents(), "ON OFF ");
}

#[tokio::test]
async fn unknown_commands_are_counted_but_not_acknowledged() {
    let (mut driver_commands, commands) = duplex(16);
    let (acks, mut driver_acks) = duplex(16);
    let leds = Arc::new(LocalCell::new(LedState::Off.as_byte()));

    let listener = tokio::spawn(run_listener(
        commands,
        acks,
        leds,
        LedState::Off,
        Box::new(MemorySink::new()),
    ));

    driver_commands.write_all(b"xC").await.expect("commands");
    assert_eq!(driver_acks.read_u8().await.expect("ack"), LED_ACK);
    drop(driver_commands);

    let report = listener.await.expect("join");
    assert_eq!(report.commands, 2);
    assert_eq!(report.acks, 1);
    assert!(report.transitions.is_empty());
}

#[tokio::test]
async fn initial_state_suppresses_the_first_notice() {
    let (mut driver_commands, commands) = duplex(16);
    let (acks, mut driver_acks) = duplex(16);
    let leds = Arc::new(LocalCell::new(LedState::On.as_byte()));
    let notices = MemorySink::new();

    let listener = tokio::spawn(run_listener(
        commands,
        acks,
        leds,
        LedState::On,
        Box::new(notices.clone()),
    ));

    driver_commands.write_all(&[LED_COMMAND]).await.expect("command");
    driver_acks.read_u8().await.expect("ack");
    drop(driver_commands);

    let report = listener.await.expect("join");
    assert!(report.transitions.is_empty());
    assert_eq!(notices.contents(), "");
}
