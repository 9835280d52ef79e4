mod support;

use ssai_core::adinsertion::AdInsertionError;
use ssai_core::config::{load_vod_config, VodConfig};
use ssai_core::encoding::model::Status;
use ssai_core::encoding::{EncodingError, ManifestFormat};
use ssai_core::resource::ResourceKind;
use ssai_core::workflow::VodWorkflow;
use ssai_core::Error;

use support::{fixture_path, inline, FakeAds, FakeEncoding, PINNED_AD_SERVER_ID};

const RUN_ID: &str = "run00001";
const ASSET: &str = "TOS-original-24fps-1080p";

fn vod_config() -> VodConfig {
    let mut config = load_vod_config(fixture_path("configs/vod.toml")).unwrap();
    config.output.access_key = inline("AKIAEXAMPLE");
    config.output.secret_key = inline("secret");
    config.polling.vod_interval_seconds = 1;
    config
}

#[tokio::test(start_paused = true)]
async fn vod_run_publishes_both_manifests_behind_ad_service() {
    let config = vod_config();
    let encoding = FakeEncoding::new().with_statuses(&[Status::Running, Status::Finished]);
    let ads = FakeAds::new();

    let report = VodWorkflow::new(&encoding, &ads, &config)
        .run(RUN_ID)
        .await
        .unwrap();

    assert_eq!(report.names.encoding_name, format!("{ASSET} - {RUN_ID}"));
    assert_eq!(report.polls, 2);
    assert_eq!(encoding.h264.lock().unwrap().len(), 5);
    assert_eq!(encoding.keyframes.lock().unwrap().len(), 3);
    assert_eq!(encoding.count("create_webvtt_configuration"), 0);

    let inputs = encoding.https_inputs.lock().unwrap();
    assert_eq!(inputs[0].host, "bpkioassets.s3-eu-west-1.amazonaws.com");
    let outputs = encoding.s3_outputs.lock().unwrap();
    assert_eq!(outputs[0].bucket_name, "my-origin-bucket");
    assert_eq!(outputs[0].access_key.as_deref(), Some("AKIAEXAMPLE"));

    let origin_base = "https://my-origin-bucket.s3.amazonaws.com/outputs/vod/";
    let catalogs = ads.catalogs.lock().unwrap();
    assert_eq!(catalogs.len(), 1);
    assert_eq!(catalogs[0].1.url, origin_base);
    assert_eq!(
        catalogs[0].1.asset_sample,
        format!("{ASSET}/{RUN_ID}/stream.m3u8")
    );

    let services = ads.services.lock().unwrap();
    assert_eq!(services.len(), 1);
    assert_eq!(
        services[0].1.name,
        format!("AVOD w/ encoding and Ad Proxy - {RUN_ID}")
    );
    assert_eq!(services[0].1.transcoding_profile.id, 1234);
    // The created service did not echo its source, so it was read back.
    assert_eq!(ads.count("get_service"), 1);

    assert_eq!(report.manifests.len(), 2);
    let hls = &report.manifests[0];
    assert_eq!(hls.format, ManifestFormat::Hls);
    assert_eq!(
        hls.origin_url,
        format!("{origin_base}{ASSET}/{RUN_ID}/stream.m3u8")
    );
    assert_eq!(
        hls.playback_url,
        format!(
            "https://stream.broadpeak.io/{}/{ASSET}/{RUN_ID}/stream.m3u8?bpkio_mids=69.91,257.91,588.4",
            report.service_id
        )
    );
    let dash = &report.manifests[1];
    assert_eq!(dash.format, ManifestFormat::Dash);
    assert!(dash.playback_url.contains(&format!("/{ASSET}/{RUN_ID}/stream.mpd?")));
}

#[tokio::test(start_paused = true)]
async fn pinned_resources_are_fetched_instead_of_created() {
    let mut config = vod_config();
    config.source.input_id = Some("pinned-input".into());
    config.ad_insertion.ad_server_id = Some(PINNED_AD_SERVER_ID);
    let encoding = FakeEncoding::new().with_statuses(&[Status::Finished]);
    let ads = FakeAds::new();

    let report = VodWorkflow::new(&encoding, &ads, &config)
        .run(RUN_ID)
        .await
        .unwrap();

    assert_eq!(report.ad_server_id, PINNED_AD_SERVER_ID);
    assert_eq!(ads.count("get_ad_server"), 1);
    assert_eq!(ads.count("create_ad_server"), 0);
    assert_eq!(encoding.count("get_https_input"), 1);
    assert_eq!(encoding.count("create_https_input"), 0);
}

#[tokio::test(start_paused = true)]
async fn unknown_pinned_input_fails_the_run() {
    let mut config = vod_config();
    config.source.input_id = Some("does-not-exist".into());
    let encoding = FakeEncoding::new();
    let ads = FakeAds::new();

    let err = VodWorkflow::new(&encoding, &ads, &config)
        .run(RUN_ID)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Encoding(EncodingError::ResourceNotFound {
            kind: ResourceKind::HttpsInput,
            ..
        })
    ));
    assert_eq!(encoding.count("create_encoding"), 0);
}

#[tokio::test]
async fn missing_transcoding_profile_stops_before_any_remote_call() {
    let mut config = vod_config();
    config.ad_insertion.transcoding_profile_id = None;
    let encoding = FakeEncoding::new();
    let ads = FakeAds::new();

    let err = VodWorkflow::new(&encoding, &ads, &config)
        .run(RUN_ID)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::AdInsertion(AdInsertionError::MissingTranscodingProfile)
    ));
    assert!(encoding.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_encoding_never_reaches_ad_insertion() {
    let config = vod_config();
    let encoding = FakeEncoding::new().with_statuses(&[Status::Error]);
    let ads = FakeAds::new();

    let err = VodWorkflow::new(&encoding, &ads, &config)
        .run(RUN_ID)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Encoding(EncodingError::JobFailed { .. })));
    assert_eq!(ads.count("create_ad_server"), 0);
    assert!(ads.services.lock().unwrap().is_empty());
}
