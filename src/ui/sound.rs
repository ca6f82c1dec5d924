/// Sound engine: procedural 8-bit style sound effects via rodio.
///
/// Every effect is rendered once at init into an in-memory WAV buffer.
/// Playback is fire-and-forget (non-blocking) via rodio's Sink.
///
/// Compile with `--no-default-features` or without "sound" feature
/// to disable audio entirely (the stub SoundEngine does nothing).

use crate::sim::event::GameEvent;

/// One playable effect.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Sfx {
    Gem,
    Push,
    Blast,
    Crush,
    ExitOpen,
    Win,
}

impl Sfx {
    pub const ALL: [Sfx; 6] = [Sfx::Gem, Sfx::Push, Sfx::Blast, Sfx::Crush, Sfx::ExitOpen, Sfx::Win];

    /// Effect for a game event, if it has one. Only the bomb itself
    /// is heard, not each cell it clears.
    pub fn for_event(event: &GameEvent) -> Option<Sfx> {
        match event {
            GameEvent::GemCollected { .. } => Some(Sfx::Gem),
            GameEvent::RockPushed { .. } => Some(Sfx::Push),
            GameEvent::BombDetonated { .. } => Some(Sfx::Blast),
            GameEvent::PlayerCrushed { .. } => Some(Sfx::Crush),
            GameEvent::ExitOpened { .. } => Some(Sfx::ExitOpen),
            GameEvent::LevelWon => Some(Sfx::Win),
            GameEvent::CellBlasted { .. }
            | GameEvent::PlayerBlasted
            | GameEvent::LevelRestarted => None,
        }
    }
}

#[cfg(feature = "sound")]
mod inner {
    use std::io::Cursor;
    use std::sync::Arc;

    use rodio::{OutputStream, OutputStreamHandle, Sink};

    use super::Sfx;

    const SAMPLE_RATE: u32 = 22050;
    const TAU: f32 = std::f32::consts::TAU;

    pub struct SoundEngine {
        _stream: OutputStream,
        handle: OutputStreamHandle,
        /// Indexed by `Sfx as usize`.
        buffers: Vec<Arc<Vec<u8>>>,
    }

    impl SoundEngine {
        pub fn new() -> Option<Self> {
            let (stream, handle) = match OutputStream::try_default() {
                Ok(pair) => pair,
                Err(e) => {
                    log::warn!("[Sound] no output device: {e}");
                    return None;
                }
            };
            let buffers = Sfx::ALL.iter().map(|&s| Arc::new(make_wav(&render(s)))).collect();
            Some(SoundEngine { _stream: stream, handle, buffers })
        }

        pub fn play(&self, sfx: Sfx) {
            let buf = &self.buffers[sfx as usize];
            if let Ok(sink) = Sink::try_new(&self.handle) {
                let cursor = Cursor::new(buf.as_ref().clone());
                if let Ok(src) = rodio::Decoder::new(cursor) {
                    sink.append(src);
                    sink.detach(); // fire-and-forget
                }
            }
        }
    }

    fn render(sfx: Sfx) -> Vec<f32> {
        match sfx {
            // C6 → E6 → G6 sparkle
            Sfx::Gem => notes(&[(1047.0, 0.045), (1319.0, 0.045), (1568.0, 0.045)], 0.25, true),
            Sfx::Push => noise_sweep(0.09, 140.0, 80.0, 0.7, 0.3),
            Sfx::Blast => noise_sweep(0.45, 180.0, 40.0, 0.2, 0.45),
            // A4 → F#4 → Eb4 → C4
            Sfx::Crush => notes(&[(440.0, 0.12), (370.0, 0.12), (311.0, 0.12), (261.0, 0.12)], 0.3, false),
            // G5, C6 chime
            Sfx::ExitOpen => notes(&[(784.0, 0.08), (1047.0, 0.15)], 0.3, true),
            // C5 → E5 → G5 → C6, last note held
            Sfx::Win => notes(&[(523.0, 0.1), (659.0, 0.1), (784.0, 0.1), (1047.0, 0.35)], 0.3, true),
        }
    }

    /// Note sequence of (frequency, seconds). `bright` adds harmonics.
    fn notes(seq: &[(f32, f32)], volume: f32, bright: bool) -> Vec<f32> {
        let mut samples = Vec::new();
        for &(freq, dur) in seq {
            let n = (SAMPLE_RATE as f32 * dur) as usize;
            for i in 0..n {
                let t = i as f32 / SAMPLE_RATE as f32;
                let env = 1.0 - (i as f32 / n as f32).powf(0.5) * 0.8;
                let mut wave = (t * freq * TAU).sin();
                if bright {
                    wave = wave * 0.7 + (t * freq * 2.0 * TAU).sin() * 0.3;
                }
                samples.push(wave * env * volume);
            }
        }
        samples
    }

    /// Noise mixed with a tone gliding from `f0` to `f1`.
    /// `tone` is the tone share of the mix.
    fn noise_sweep(duration: f32, f0: f32, f1: f32, tone: f32, volume: f32) -> Vec<f32> {
        let n = (SAMPLE_RATE as f32 * duration) as usize;
        let mut rng: u32 = 12345;
        (0..n)
            .map(|i| {
                let p = i as f32 / n as f32;
                let freq = f0 + (f1 - f0) * p;
                let t = i as f32 / SAMPLE_RATE as f32;
                rng = rng.wrapping_mul(1103515245).wrapping_add(12345);
                let noise = (rng as f32 / u32::MAX as f32) * 2.0 - 1.0;
                let wave = (t * freq * TAU).sin() * tone + noise * (1.0 - tone);
                wave * (1.0 - p).powf(1.5) * volume
            })
            .collect()
    }

    /// Wrap mono f32 samples into a 16-bit PCM WAV buffer.
    pub(super) fn make_wav(samples: &[f32]) -> Vec<u8> {
        let data_size = samples.len() as u32 * 2;
        let mut buf = Vec::with_capacity(44 + data_size as usize);

        buf.extend_from_slice(b"RIFF");
        buf.extend_from_slice(&(36 + data_size).to_le_bytes());
        buf.extend_from_slice(b"WAVE");

        buf.extend_from_slice(b"fmt ");
        buf.extend_from_slice(&16u32.to_le_bytes());        // chunk size
        buf.extend_from_slice(&1u16.to_le_bytes());         // PCM
        buf.extend_from_slice(&1u16.to_le_bytes());         // mono
        buf.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
        buf.extend_from_slice(&(SAMPLE_RATE * 2).to_le_bytes()); // byte rate
        buf.extend_from_slice(&2u16.to_le_bytes());         // block align
        buf.extend_from_slice(&16u16.to_le_bytes());        // bits per sample

        buf.extend_from_slice(b"data");
        buf.extend_from_slice(&data_size.to_le_bytes());
        for &s in samples {
            let val = (s.clamp(-1.0, 1.0) * 32767.0) as i16;
            buf.extend_from_slice(&val.to_le_bytes());
        }

        buf
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn wav_header_sizes_match_payload() {
            let wav = make_wav(&[0.0, 1.0, -2.0]);
            assert_eq!(wav.len(), 44 + 6);
            assert_eq!(&wav[0..4], b"RIFF");
            assert_eq!(u32::from_le_bytes([wav[4], wav[5], wav[6], wav[7]]), 42);
            assert_eq!(u32::from_le_bytes([wav[40], wav[41], wav[42], wav[43]]), 6);
            // -2.0 clamps to full negative scale
            assert_eq!(i16::from_le_bytes([wav[48], wav[49]]), -32767);
        }

        #[test]
        fn every_effect_renders_audible_samples() {
            for sfx in Sfx::ALL {
                let samples = render(sfx);
                assert!(!samples.is_empty(), "{sfx:?}");
                assert!(samples.iter().all(|s| s.abs() <= 1.0), "{sfx:?}");
            }
        }
    }
}

// ════════════════════════════════════════════════════════════
//  Public API: compiles to no-ops when sound feature is off
// ════════════════════════════════════════════════════════════

#[cfg(feature = "sound")]
pub use inner::SoundEngine;

#[cfg(not(feature = "sound"))]
pub struct SoundEngine;

#[cfg(not(feature = "sound"))]
impl SoundEngine {
    pub fn new() -> Option<Self> { Some(SoundEngine) }
    pub fn play(&self, _sfx: Sfx) {}
}

/// Play the effect for each event, in order.
pub fn play_events(sound: Option<&SoundEngine>, events: &[GameEvent]) {
    let sfx = match sound {
        Some(s) => s,
        None => return,
    };
    for effect in events.iter().filter_map(Sfx::for_event) {
        sfx.play(effect);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blast_is_one_sound_not_one_per_cell() {
        let events = [
            GameEvent::BombDetonated { x: 1, y: 1 },
            GameEvent::CellBlasted { x: 0, y: 1 },
            GameEvent::CellBlasted { x: 2, y: 1 },
            GameEvent::PlayerBlasted,
        ];
        let effects: Vec<Sfx> = events.iter().filter_map(Sfx::for_event).collect();
        assert_eq!(effects, vec![Sfx::Blast]);
    }

    #[test]
    fn gem_that_opens_exit_plays_both() {
        let events = [GameEvent::GemCollected { x: 1, y: 0 }, GameEvent::ExitOpened { x: 3, y: 0 }];
        let effects: Vec<Sfx> = events.iter().filter_map(Sfx::for_event).collect();
        assert_eq!(effects, vec![Sfx::Gem, Sfx::ExitOpen]);
    }
}
