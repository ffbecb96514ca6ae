//! Channel scan tests against the simulated board.

use std::time::Duration;

use tokio::time::Instant;
use vmc_driver::{
    BoardHandle, ErrorCode, PollOptions, ProbeOutcome, SimulatedBoard, VendingController,
};
use vmc_protocol::CMD_CHANNEL_EXISTS_BASE;

fn open_board(channels: std::ops::RangeInclusive<u8>) -> (VendingController<SimulatedBoard>, BoardHandle) {
    let board = SimulatedBoard::with_channels(channels);
    let handle = board.handle();
    let controller = VendingController::new(board);
    controller.open().unwrap();
    (controller, handle)
}

fn options(max_channel: i64) -> PollOptions {
    PollOptions {
        max_channel,
        ..PollOptions::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_scan_survives_silent_channel() {
    let (controller, handle) = open_board(1..=10);
    handle.silence(CMD_CHANNEL_EXISTS_BASE + 5);

    let started = Instant::now();
    let probes = controller.poll_channels(options(10)).await.unwrap();

    assert_eq!(probes.len(), 10);
    for (index, probe) in probes.iter().enumerate() {
        assert_eq!(probe.channel.number() as usize, index + 1);
    }

    let ok: Vec<_> = probes
        .iter()
        .filter(|probe| probe.outcome == ProbeOutcome::Ok)
        .collect();
    assert_eq!(ok.len(), 9);
    assert!(ok.iter().all(|probe| probe.exists && probe.error.is_none()));

    let silent = &probes[4];
    assert_eq!(silent.outcome, ProbeOutcome::Timeout);
    assert!(!silent.exists);
    assert_eq!(
        silent.error.as_ref().map(|report| report.code),
        Some(ErrorCode::CommTimeout)
    );

    // Nine pauses between ten probes, plus the one probe that ran out its timeout.
    assert!(started.elapsed() >= Duration::from_millis(9 * 50 + 1000));
    assert_eq!(handle.request_count(), 10);
}

#[tokio::test(start_paused = true)]
async fn test_scan_reports_unfitted_channels() {
    let (controller, _handle) = open_board(1..=3);

    let probes = controller.poll_channels(options(6)).await.unwrap();
    let fitted: Vec<u8> = probes
        .iter()
        .filter(|probe| probe.exists)
        .map(|probe| probe.channel.number())
        .collect();
    assert_eq!(fitted, vec![1, 2, 3]);
    assert!(probes.iter().all(|probe| probe.outcome == ProbeOutcome::Ok));
}

#[tokio::test(start_paused = true)]
async fn test_max_channel_clamped() {
    let (controller, handle) = open_board(1..=80);

    let probes = controller.poll_channels(options(500)).await.unwrap();
    assert_eq!(probes.len(), 80);
    assert_eq!(probes.last().map(|probe| probe.channel.number()), Some(80));

    let probes = controller.poll_channels(options(0)).await.unwrap();
    assert_eq!(probes.len(), 1);
    assert_eq!(handle.request_count(), 81);
}

#[tokio::test(start_paused = true)]
async fn test_pause_only_between_probes() {
    let (controller, _handle) = open_board(1..=5);
    let options = PollOptions {
        max_channel: 5,
        inter_channel_delay: Duration::from_millis(100),
        per_request_timeout: Duration::from_millis(1000),
    };

    let started = Instant::now();
    controller.poll_channels(options).await.unwrap();
    let waited = started.elapsed();
    assert!(waited >= Duration::from_millis(400));
    assert!(waited < Duration::from_millis(500));
}

#[tokio::test(start_paused = true)]
async fn test_zero_probe_timeout_rejected() {
    let (controller, handle) = open_board(1..=5);
    let options = PollOptions {
        per_request_timeout: Duration::ZERO,
        ..PollOptions::default()
    };

    let err = controller.poll_channels(options).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidArgument);
    assert_eq!(handle.request_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_closed_port_recorded_per_channel() {
    let controller = VendingController::new(SimulatedBoard::new());

    let probes = controller.poll_channels(options(3)).await.unwrap();
    assert_eq!(probes.len(), 3);
    for probe in &probes {
        assert_eq!(probe.outcome, ProbeOutcome::ProtocolError);
        assert_eq!(
            probe.error.as_ref().map(|report| report.code),
            Some(ErrorCode::PortNotOpen)
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_probe_serialization() {
    let (controller, handle) = open_board(1..=1);
    handle.silence(CMD_CHANNEL_EXISTS_BASE + 2);

    let probes = controller.poll_channels(options(2)).await.unwrap();
    let json = serde_json::to_value(&probes).unwrap();

    assert_eq!(json[0]["channel"], 1);
    assert_eq!(json[0]["exists"], true);
    assert_eq!(json[0]["outcome"], "ok");
    assert!(json[0].get("error").is_none());

    assert_eq!(json[1]["outcome"], "timeout");
    assert_eq!(json[1]["error"]["code"], "COMM_TIMEOUT");
}
