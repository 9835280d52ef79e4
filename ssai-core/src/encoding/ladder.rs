use tracing::info;

use crate::config::{AudioRendition, H264Profile, RenditionDescriptor, VideoRendition};

use super::api::EncodingApi;
use super::model::{
    AacAudioConfiguration, H264VideoConfiguration, PresetConfiguration, WebVttConfiguration,
    WeightedPredictionPFrames,
};
use super::EncodingResult;

/// A codec configuration created on the provider, tied back to the rung it
/// came from.
#[derive(Debug, Clone, PartialEq)]
pub enum CodecConfigHandle {
    Video {
        id: String,
        height: u32,
        bitrate: u64,
    },
    Audio {
        id: String,
        bitrate: u64,
    },
}

/// Applies the H.264 profile conformance rules. Content and ad segments only
/// splice cleanly when the encoder stays inside the declared profile.
pub fn apply_profile_constraints(config: &mut H264VideoConfiguration) {
    match config.profile {
        H264Profile::Baseline => {
            config.adaptive_spatial_transform = Some(false);
            config.bframes = Some(0);
            config.cabac = Some(false);
            config.weighted_prediction_p_frames = Some(WeightedPredictionPFrames::Disabled);
        }
        H264Profile::Main => {
            config.adaptive_spatial_transform = Some(false);
        }
        H264Profile::High => {
            config.adaptive_spatial_transform = Some(true);
        }
    }
}

pub fn h264_configuration(
    rung: &VideoRendition,
    rate: f64,
    preset: PresetConfiguration,
) -> H264VideoConfiguration {
    let mut config = H264VideoConfiguration {
        id: String::new(),
        name: format!(
            "H.264 {} {} Mbit/s",
            rung.height,
            rung.bitrate as f64 / 1_000_000.0
        ),
        preset_configuration: preset,
        height: rung.height,
        bitrate: rung.bitrate,
        rate,
        profile: rung.profile,
        level: rung.level.clone(),
        adaptive_spatial_transform: None,
        bframes: None,
        cabac: None,
        weighted_prediction_p_frames: None,
    };
    apply_profile_constraints(&mut config);
    config
}

pub fn aac_configuration(rung: &AudioRendition) -> AacAudioConfiguration {
    AacAudioConfiguration {
        id: String::new(),
        name: format!("AAC {} kbit/s", rung.bitrate as f64 / 1000.0),
        bitrate: rung.bitrate,
    }
}

/// Turns a rendition ladder into codec configurations on the provider, one
/// create per rung, in ladder order.
pub struct LadderExpander<'a> {
    api: &'a dyn EncodingApi,
    frame_rate: f64,
    preset: PresetConfiguration,
}

impl<'a> LadderExpander<'a> {
    pub fn new(api: &'a dyn EncodingApi, frame_rate: f64, preset: PresetConfiguration) -> Self {
        Self {
            api,
            frame_rate,
            preset,
        }
    }

    pub async fn expand(
        &self,
        ladder: &[RenditionDescriptor],
    ) -> EncodingResult<Vec<CodecConfigHandle>> {
        let mut handles = Vec::with_capacity(ladder.len());
        for rendition in ladder {
            let handle = match rendition {
                RenditionDescriptor::Video(rung) => {
                    let config = h264_configuration(rung, self.frame_rate, self.preset);
                    let created = self.api.create_h264_configuration(&config).await?;
                    CodecConfigHandle::Video {
                        id: created.id,
                        height: rung.height,
                        bitrate: rung.bitrate,
                    }
                }
                RenditionDescriptor::Audio(rung) => {
                    let created = self.api.create_aac_configuration(&aac_configuration(rung)).await?;
                    CodecConfigHandle::Audio {
                        id: created.id,
                        bitrate: rung.bitrate,
                    }
                }
            };
            handles.push(handle);
        }
        info!(
            configurations = handles.len(),
            preset = ?self.preset,
            "codec configurations created"
        );
        Ok(handles)
    }

    pub async fn subtitle_configuration(&self) -> EncodingResult<String> {
        let created = self
            .api
            .create_webvtt_configuration(&WebVttConfiguration {
                id: String::new(),
                name: "WebVTT subtitles".to_string(),
            })
            .await?;
        Ok(created.id)
    }
}
