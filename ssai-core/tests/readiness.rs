mod support;

use ssai_core::encoding::PollPolicy;
use ssai_core::readiness::{ProbeError, ReadinessProber};
use tokio::time::Duration;

use support::FakeProbe;

fn manifests() -> Vec<String> {
    ["stream.m3u8", "video_240p_500000.m3u8", "audio_128000.m3u8"]
        .iter()
        .map(|name| format!("https://my-origin-bucket.s3.amazonaws.com/outputs/live/x1/{name}"))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn whole_round_must_succeed() {
    let urls = manifests();
    let probe = FakeProbe::failing(&urls[1], 2);
    let report = ReadinessProber::new(&probe, PollPolicy::new(Duration::from_secs(5), 24))
        .wait_until_ready(&urls)
        .await
        .unwrap();
    assert_eq!(report.rounds, 3);
    assert_eq!(report.checks, 9);
    assert_eq!(probe.checks(), 9);
}

#[tokio::test(start_paused = true)]
async fn ready_on_first_round() {
    let urls = manifests();
    let probe = FakeProbe::ready();
    let report = ReadinessProber::new(&probe, PollPolicy::from_timeout(2.0, 5))
        .wait_until_ready(&urls)
        .await
        .unwrap();
    assert_eq!(report.rounds, 1);
    assert_eq!(report.checks, 3);
}

#[tokio::test(start_paused = true)]
async fn timeout_lists_pending_manifests() {
    let urls = manifests();
    let probe = FakeProbe::failing(&urls[2], 100);
    let err = ReadinessProber::new(&probe, PollPolicy::new(Duration::from_secs(5), 3))
        .wait_until_ready(&urls)
        .await
        .unwrap_err();
    let ProbeError::ManifestNotReady { rounds, pending } = err;
    assert_eq!(rounds, 3);
    assert_eq!(pending, vec![urls[2].clone()]);
    assert_eq!(probe.checks(), 9);
}
