//! Integration tests for output modes, the pulse scheduler and RGB batching

mod common;
use common::*;

use behavior_core::{ChannelId, OutputMode, Register};

#[test]
fn outputs_start_low_in_direct_mode() {
    let (mut device, wiring) = device();

    assert_eq!(read_u16(&mut device, Register::OutputsOut), 0);
    assert!(wiring.outputs.iter().all(|pin| !pin.level()));
    for id in ChannelId::ALL {
        assert_eq!(device.outputs().mode(id), OutputMode::Direct);
    }
}

#[test]
fn pulsed_poke_led_runs_for_configured_ticks() {
    let (mut device, wiring) = device();
    let led = ChannelId::Poke0Led;

    write_u8(&mut device, Register::ModePoke0Led, 1).unwrap();
    write_u16(&mut device, Register::PulsePoke0Led, 200).unwrap();
    write_u16(&mut device, Register::OutputsSet, led.bit()).unwrap();
    assert!(wiring.line(led).level());

    tick(&mut device, 200);
    assert!(wiring.line(led).level());
    assert_eq!(device.outputs().remaining_ticks(led), 1);

    tick(&mut device, 1);
    assert!(!wiring.line(led).level());
    assert_eq!(device.outputs().remaining_ticks(led), 0);
    assert_eq!(read_u16(&mut device, Register::OutputsOut) & led.bit(), 0);
}

#[test]
fn single_tick_pulse_is_high_for_exactly_one_tick() {
    let (mut device, wiring) = device();
    let valve = ChannelId::Poke2Valve;

    write_u8(&mut device, Register::ModePoke2Valve, 1).unwrap();
    write_u16(&mut device, Register::PulsePoke2Valve, 1).unwrap();
    write_u16(&mut device, Register::OutputsSet, valve.bit()).unwrap();

    tick(&mut device, 1);
    assert!(wiring.line(valve).level());
    tick(&mut device, 1);
    assert!(!wiring.line(valve).level());
}

#[test]
fn pulse_length_change_applies_to_next_activation() {
    let (mut device, wiring) = device();
    let led = ChannelId::Led0;

    write_u8(&mut device, Register::ModeLed0, 1).unwrap();
    write_u16(&mut device, Register::PulseLed0, 4).unwrap();
    write_u16(&mut device, Register::OutputsSet, led.bit()).unwrap();
    write_u16(&mut device, Register::PulseLed0, 100).unwrap();

    tick(&mut device, 5);
    assert!(!wiring.line(led).level());

    write_u16(&mut device, Register::OutputsSet, led.bit()).unwrap();
    assert_eq!(device.outputs().remaining_ticks(led), 101);
}

#[test]
fn direct_mode_output_stays_high() {
    let (mut device, wiring) = device();

    write_u16(&mut device, Register::OutputsSet, ChannelId::Poke1Valve.bit()).unwrap();
    tick(&mut device, 5_000);
    assert!(wiring.line(ChannelId::Poke1Valve).level());

    write_u16(&mut device, Register::OutputsClear, ChannelId::Poke1Valve.bit()).unwrap();
    assert!(!wiring.line(ChannelId::Poke1Valve).level());
}

#[test]
fn mode_write_does_not_change_level() {
    let (mut device, wiring) = device();

    write_u16(&mut device, Register::OutputsSet, ChannelId::Led1.bit()).unwrap();
    write_u8(&mut device, Register::ModeLed1, 1).unwrap();
    tick(&mut device, 1_000);
    assert!(wiring.line(ChannelId::Led1).level());
}

#[test]
fn toggle_on_inactive_pulsed_channel_starts_timed_pulse() {
    let (mut device, wiring) = device();
    let valve = ChannelId::Poke0Valve;

    write_u8(&mut device, Register::ModePoke0Valve, 1).unwrap();
    write_u16(&mut device, Register::OutputsToggle, valve.bit()).unwrap();
    assert!(wiring.line(valve).level());
    assert_eq!(device.outputs().remaining_ticks(valve), 16);

    tick(&mut device, 16);
    assert!(!wiring.line(valve).level());
}

#[test]
fn toggle_on_active_channel_deactivates() {
    let (mut device, wiring) = device();
    let valve = ChannelId::Poke0Valve;

    write_u8(&mut device, Register::ModePoke0Valve, 1).unwrap();
    write_u16(&mut device, Register::OutputsSet, valve.bit()).unwrap();
    tick(&mut device, 3);
    write_u16(&mut device, Register::OutputsToggle, valve.bit()).unwrap();

    assert!(!wiring.line(valve).level());
    assert_eq!(device.outputs().remaining_ticks(valve), 0);
}

#[test]
fn clear_cancels_running_pulse() {
    let (mut device, wiring) = device();
    let do0 = ChannelId::Do0;

    write_u8(&mut device, Register::ModeDo0, 1).unwrap();
    write_u16(&mut device, Register::OutputsSet, do0.bit()).unwrap();
    tick(&mut device, 10);
    write_u16(&mut device, Register::OutputsClear, do0.bit()).unwrap();

    assert!(!wiring.line(do0).level());
    assert_eq!(device.outputs().remaining_ticks(do0), 0);
}

#[test]
fn direct_write_keeps_running_pulse_and_clears_others() {
    let (mut device, wiring) = device();
    let valve = ChannelId::Poke0Valve;

    write_u8(&mut device, Register::ModePoke0Valve, 1).unwrap();
    write_u16(&mut device, Register::OutputsSet, valve.bit() | ChannelId::Led0.bit()).unwrap();
    tick(&mut device, 5);

    write_u16(
        &mut device,
        Register::OutputsOut,
        valve.bit() | ChannelId::Poke0Led.bit(),
    )
    .unwrap();

    assert_eq!(device.outputs().remaining_ticks(valve), 11);
    assert!(wiring.line(ChannelId::Poke0Led).level());
    assert!(!wiring.line(ChannelId::Led0).level());

    write_u16(&mut device, Register::OutputsOut, 0).unwrap();
    assert!(wiring.outputs.iter().all(|pin| !pin.level()));
}

#[test]
fn outputs_out_reads_back_line_levels() {
    let (mut device, wiring) = device();

    write_u16(&mut device, Register::OutputsSet, ChannelId::Do3.bit() | ChannelId::Rgb1.bit())
        .unwrap();
    assert_eq!(
        read_u16(&mut device, Register::OutputsOut),
        ChannelId::Do3.bit() | ChannelId::Rgb1.bit()
    );

    // A line pulled low outside the controller shows up on the next read
    wiring.line(ChannelId::Do3).drive_external(false);
    assert_eq!(read_u16(&mut device, Register::OutputsOut), ChannelId::Rgb1.bit());
}

#[test]
fn bits_above_last_channel_are_ignored() {
    let (mut device, wiring) = device();

    assert!(write_u16(&mut device, Register::OutputsSet, 0xC000).is_ok());
    assert!(wiring.outputs.iter().all(|pin| !pin.level()));
}

#[test]
fn output_commands_always_succeed_and_latch() {
    let (mut device, wiring) = device();

    for register in [Register::OutputsSet, Register::OutputsToggle, Register::OutputsClear] {
        assert_eq!(write_u16(&mut device, register, 0xFFFF), Ok(()));
        assert_eq!(read_u16(&mut device, register), 0xFFFF);
    }
    assert_eq!(write_u16(&mut device, Register::OutputsOut, 0xFFFF), Ok(()));
    assert!(wiring.outputs.iter().all(|pin| pin.level()));
    assert_eq!(read_u16(&mut device, Register::OutputsOut), 0x3FFF);
}

#[test]
fn boot_writes_one_blank_frame() {
    let (device, _) = device();
    assert_eq!(device.bus().frames(), [[0u8; 6]]);
}

#[test]
fn combined_colour_write_then_single_indicator_is_one_bus_write() {
    let (mut device, _) = device();

    write_bytes(&mut device, Register::Rgbs, &[1, 1, 1, 2, 2, 2]).unwrap();
    write_bytes(&mut device, Register::Rgbs, &[64, 16, 16, 16, 16, 64]).unwrap();
    write_u16(&mut device, Register::OutputsSet, ChannelId::Rgb0.bit()).unwrap();
    tick(&mut device, 1);

    let frames = device.bus().frames();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[1], [64, 16, 16, 0, 0, 0]);

    tick(&mut device, 10);
    assert_eq!(device.bus().frames().len(), 2);
}

#[test]
fn changes_within_one_tick_coalesce() {
    let (mut device, _) = device();

    write_u16(&mut device, Register::OutputsSet, ChannelId::Rgb0.bit()).unwrap();
    write_bytes(&mut device, Register::Rgb0, &[10, 20, 30]).unwrap();
    write_u16(&mut device, Register::OutputsSet, ChannelId::Rgb1.bit()).unwrap();
    write_bytes(&mut device, Register::Rgb1, &[40, 50, 60]).unwrap();
    tick(&mut device, 1);

    assert_eq!(device.bus().frames().len(), 2);
    assert_eq!(device.bus().last_frame(), Some([10, 20, 30, 40, 50, 60]));
}

#[test]
fn colour_change_of_dark_indicator_writes_nothing() {
    let (mut device, _) = device();

    write_bytes(&mut device, Register::Rgb1, &[99, 99, 99]).unwrap();
    tick(&mut device, 1);
    assert_eq!(device.bus().frames().len(), 1);
}

#[test]
fn colour_change_of_lit_indicator_writes_new_frame() {
    let (mut device, _) = device();

    write_u16(&mut device, Register::OutputsSet, ChannelId::Rgb1.bit()).unwrap();
    tick(&mut device, 1);
    write_bytes(&mut device, Register::Rgb1, &[5, 6, 7]).unwrap();
    tick(&mut device, 1);

    assert_eq!(
        device.bus().frames(),
        [[0; 6], [0, 0, 0, 16, 16, 64], [0, 0, 0, 5, 6, 7]]
    );
}

#[test]
fn rgb_pulse_expiry_blanks_indicator_in_one_write() {
    let (mut device, _) = device();

    write_u8(&mut device, Register::ModeRgb0, 1).unwrap();
    write_u16(&mut device, Register::PulseRgb0, 3).unwrap();
    write_u16(&mut device, Register::OutputsSet, ChannelId::Rgb0.bit()).unwrap();

    tick(&mut device, 4);
    assert_eq!(
        device.bus().frames(),
        [[0; 6], [64, 16, 16, 0, 0, 0], [0; 6]]
    );
    assert!(!device.outputs().is_active(ChannelId::Rgb0));
}
