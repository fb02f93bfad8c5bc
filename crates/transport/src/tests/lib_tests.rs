use super::*;

#[test]
fn default_names_match_the_rendezvous_points() {
    let names = ChannelNames::default();
    assert_eq!(names.event_path(), PathBuf::from("./int_pipe"));
    assert_eq!(names.command_path(), PathBuf::from("./ctrl_cmd_pipe"));
    assert_eq!(names.ack_path(), PathBuf::from("./ctrl_ack_pipe"));
    assert_eq!(names.led_shm, "/led_shm");
    assert_eq!(names.terminate_shm, "/terminate_shm");
}

#[test]
fn local_cell_round_trips_a_byte() {
    let cell = LocalCell::new(0);
    assert_eq!(cell.load(), 0);
    cell.store(1);
    assert_eq!(cell.load(), 1);
}
