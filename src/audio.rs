//! Sound cues and background music
//!
//! Clips are fetched and decoded by the browser; this module only decides
//! what plays and how loud.

use crate::settings::Settings;
use crate::sim::GameEvent;

/// Sound effect types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoundCue {
    /// Bonus note collected
    Bonus,
    /// Penalty note hit
    Penalty,
    /// Looping background track
    Music,
}

impl SoundCue {
    pub const ALL: [SoundCue; 3] = [SoundCue::Bonus, SoundCue::Penalty, SoundCue::Music];

    /// Clip volume before settings are applied
    pub fn base_volume(self) -> f32 {
        match self {
            SoundCue::Bonus => 0.5,
            SoundCue::Penalty => 0.7,
            SoundCue::Music => 0.15,
        }
    }

    pub fn path(self) -> &'static str {
        use crate::assets::paths;
        match self {
            SoundCue::Bonus => paths::BONUS_SOUND,
            SoundCue::Penalty => paths::PENALTY_SOUND,
            SoundCue::Music => paths::MUSIC,
        }
    }

    pub fn looping(self) -> bool {
        self == SoundCue::Music
    }

    /// Cue to play in reaction to a game event
    pub fn for_event(event: GameEvent) -> Option<Self> {
        match event {
            GameEvent::BonusCollected => Some(SoundCue::Bonus),
            GameEvent::PenaltyCollected => Some(SoundCue::Penalty),
            GameEvent::GameOver | GameEvent::Restarted => None,
        }
    }
}

/// Effective gain for a cue under the given settings
pub fn cue_gain(cue: SoundCue, settings: &Settings) -> f32 {
    if settings.muted {
        return 0.0;
    }
    let channel = match cue {
        SoundCue::Music => settings.music_volume,
        SoundCue::Bonus | SoundCue::Penalty => settings.sfx_volume,
    };
    (cue.base_volume() * settings.master_volume * channel).clamp(0.0, 1.0)
}

#[cfg(target_arch = "wasm32")]
pub use web::AudioManager;

#[cfg(target_arch = "wasm32")]
mod web {
    use wasm_bindgen::JsCast;
    use wasm_bindgen_futures::JsFuture;
    use web_sys::{AudioBuffer, AudioBufferSourceNode, AudioContext, GainNode};

    use super::{SoundCue, cue_gain};
    use crate::assets::{AssetError, AssetState};
    use crate::settings::Settings;

    /// Web Audio playback of the three clips
    pub struct AudioManager {
        ctx: Option<AudioContext>,
        bonus: AssetState<AudioBuffer>,
        penalty: AssetState<AudioBuffer>,
        music: AssetState<AudioBuffer>,
        music_gain: Option<GainNode>,
    }

    impl Default for AudioManager {
        fn default() -> Self {
            Self::new()
        }
    }

    impl AudioManager {
        pub fn new() -> Self {
            // May fail outside a secure context
            let ctx = AudioContext::new().ok();
            if ctx.is_none() {
                log::warn!("Failed to create AudioContext - audio disabled");
            }
            Self {
                ctx,
                bonus: AssetState::Pending,
                penalty: AssetState::Pending,
                music: AssetState::Pending,
                music_gain: None,
            }
        }

        pub fn context(&self) -> Option<AudioContext> {
            self.ctx.clone()
        }

        /// Resume audio context (required after user gesture)
        pub fn resume(&self) {
            if let Some(ctx) = &self.ctx {
                let _ = ctx.resume();
            }
        }

        fn slot_mut(&mut self, cue: SoundCue) -> &mut AssetState<AudioBuffer> {
            match cue {
                SoundCue::Bonus => &mut self.bonus,
                SoundCue::Penalty => &mut self.penalty,
                SoundCue::Music => &mut self.music,
            }
        }

        fn slot(&self, cue: SoundCue) -> &AssetState<AudioBuffer> {
            match cue {
                SoundCue::Bonus => &self.bonus,
                SoundCue::Penalty => &self.penalty,
                SoundCue::Music => &self.music,
            }
        }

        /// Store a finished load; music starts looping as soon as it is ready
        pub fn set_clip(
            &mut self,
            cue: SoundCue,
            result: Result<AudioBuffer, AssetError>,
            settings: &Settings,
        ) {
            *self.slot_mut(cue) = AssetState::from_result(cue.path(), result);
            if cue == SoundCue::Music {
                self.music_gain = self.start_source(cue, settings);
            }
        }

        /// Play a one-shot cue; skipped while its clip is not ready
        pub fn play(&self, cue: SoundCue, settings: &Settings) {
            if cue.looping() {
                return;
            }
            let _ = self.start_source(cue, settings);
        }

        /// Re-apply volume settings to the running music track
        pub fn apply_settings(&self, settings: &Settings) {
            if let Some(gain) = &self.music_gain {
                gain.gain().set_value(cue_gain(SoundCue::Music, settings));
            }
        }

        fn start_source(&self, cue: SoundCue, settings: &Settings) -> Option<GainNode> {
            let ctx = self.ctx.as_ref()?;
            let buffer = self.slot(cue).ready()?;

            if ctx.state() == web_sys::AudioContextState::Suspended {
                let _ = ctx.resume();
            }

            let source: AudioBufferSourceNode = ctx.create_buffer_source().ok()?;
            let gain = ctx.create_gain().ok()?;
            source.set_buffer(Some(buffer));
            source.set_loop(cue.looping());
            gain.gain().set_value(cue_gain(cue, settings));
            source.connect_with_audio_node(&gain).ok()?;
            gain.connect_with_audio_node(&ctx.destination()).ok()?;
            source.start().ok()?;
            Some(gain)
        }
    }

    /// Fetch and decode one clip
    pub async fn load_clip(ctx: Option<AudioContext>, cue: SoundCue) -> Result<AudioBuffer, AssetError> {
        let ctx = ctx.ok_or(AssetError::NoAudio)?;
        let url = cue.path();
        let bytes = crate::assets::web::fetch_array_buffer(url).await?;
        let decode_error = |e: wasm_bindgen::JsValue| AssetError::Decode {
            url: url.to_string(),
            reason: format!("{:?}", e),
        };
        let promise = ctx.decode_audio_data(&bytes).map_err(decode_error)?;
        let decoded = JsFuture::from(promise).await.map_err(decode_error)?;
        decoded.dyn_into::<AudioBuffer>().map_err(decode_error)
    }
}

#[cfg(target_arch = "wasm32")]
pub use web::load_clip;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_gains_match_clip_volumes() {
        let settings = Settings {
            master_volume: 1.0,
            sfx_volume: 1.0,
            music_volume: 1.0,
            ..Settings::default()
        };
        assert_eq!(cue_gain(SoundCue::Bonus, &settings), 0.5);
        assert_eq!(cue_gain(SoundCue::Penalty, &settings), 0.7);
        assert_eq!(cue_gain(SoundCue::Music, &settings), 0.15);
    }

    #[test]
    fn test_mute_silences_everything() {
        let settings = Settings {
            muted: true,
            ..Settings::default()
        };
        for cue in SoundCue::ALL {
            assert_eq!(cue_gain(cue, &settings), 0.0);
        }
    }

    #[test]
    fn test_channels_scale_independently() {
        let settings = Settings {
            master_volume: 1.0,
            sfx_volume: 0.5,
            music_volume: 0.0,
            ..Settings::default()
        };
        assert_eq!(cue_gain(SoundCue::Bonus, &settings), 0.25);
        assert_eq!(cue_gain(SoundCue::Music, &settings), 0.0);
    }

    #[test]
    fn test_event_cues() {
        assert_eq!(SoundCue::for_event(GameEvent::BonusCollected), Some(SoundCue::Bonus));
        assert_eq!(SoundCue::for_event(GameEvent::PenaltyCollected), Some(SoundCue::Penalty));
        assert_eq!(SoundCue::for_event(GameEvent::GameOver), None);
        assert!(SoundCue::Music.looping());
        assert!(!SoundCue::Bonus.looping());
    }
}
