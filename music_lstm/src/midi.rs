// イベント列からStandard MIDI File（フォーマット0）を作る。
// 四分音符480ティック、テンポ120、全イベントをピアノの1チャンネルに置く。

use crate::error::{MusicError, Result};
use crate::score::ScoreEvent;
use midly::{
    num::{u15, u24, u28, u4, u7},
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
};
use std::path::Path;
use tracing::info;

/// 四分音符あたりのティック数
const TICKS_PER_QUARTER: u16 = 480;

/// テンポ（四分音符あたりのマイクロ秒、120 BPM）
const TEMPO_MICROSECONDS: u32 = 500_000;

/// 各音の長さ（四分音符単位）
const NOTE_LENGTH: f64 = 1.0;

const VELOCITY: u8 = 90;

const CHANNEL: u8 = 0;

/// ティック単位に展開した1音
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiNote {
    pub key: u8,
    pub start: u32,
    pub end: u32,
}

fn to_ticks(quarters: f64) -> u32 {
    (quarters * TICKS_PER_QUARTER as f64).round() as u32
}

/// イベント列を音の列に展開
///
/// 同じキーが鳴っている間に再び打鍵される場合は、前の音をそこで切る。
pub fn score_to_notes(events: &[ScoreEvent]) -> Vec<MidiNote> {
    let mut notes: Vec<MidiNote> = events
        .iter()
        .flat_map(|event| {
            let start = to_ticks(event.offset);
            let end = to_ticks(event.offset + NOTE_LENGTH);
            event
                .pitches
                .iter()
                .map(move |&key| MidiNote { key, start, end })
        })
        .collect();

    notes.sort_by_key(|n| (n.start, n.key));
    notes.dedup_by_key(|n| (n.start, n.key));

    for i in 0..notes.len() {
        let next_start = notes[i + 1..]
            .iter()
            .find(|n| n.key == notes[i].key)
            .map(|n| n.start);
        if let Some(next_start) = next_start {
            notes[i].end = notes[i].end.min(next_start);
        }
    }

    notes
}

/// イベント列をメモリ上のSMFに変換
pub fn score_to_smf(events: &[ScoreEvent]) -> Smf<'static> {
    let mut smf = Smf::new(Header::new(
        Format::SingleTrack,
        Timing::Metrical(u15::new(TICKS_PER_QUARTER)),
    ));

    let mut track: Track<'static> = Vec::new();
    let channel = u4::new(CHANNEL);

    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(TEMPO_MICROSECONDS))),
    });

    let program = events.first().map(|e| e.program).unwrap_or(0);
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Midi {
            channel,
            message: MidiMessage::ProgramChange {
                program: u7::new(program),
            },
        },
    });

    // (ティック, オフを先に並べるための順序, キー, ノートオンか)
    let mut messages: Vec<(u32, u8, u8, bool)> = Vec::new();
    for note in score_to_notes(events) {
        messages.push((note.start, 1, note.key, true));
        messages.push((note.end, 0, note.key, false));
    }
    messages.sort_unstable();

    let mut last_tick = 0;
    for (tick, _, key, on) in messages {
        let message = if on {
            MidiMessage::NoteOn {
                key: u7::new(key),
                vel: u7::new(VELOCITY),
            }
        } else {
            MidiMessage::NoteOff {
                key: u7::new(key),
                vel: u7::new(0),
            }
        };
        track.push(TrackEvent {
            delta: u28::new(tick - last_tick),
            kind: TrackEventKind::Midi { channel, message },
        });
        last_tick = tick;
    }

    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    smf.tracks.push(track);
    smf
}

/// イベント列をSMFのバイト列に変換
pub fn midi_bytes(events: &[ScoreEvent]) -> Result<Vec<u8>> {
    let smf = score_to_smf(events);
    let mut buf = Vec::new();
    smf.write(&mut buf)
        .map_err(|e| MusicError::Serialization(e.to_string()))?;
    Ok(buf)
}

/// イベント列をMIDIファイルに書き込む
pub fn write_midi(events: &[ScoreEvent], path: &Path) -> Result<()> {
    let buf = midi_bytes(events)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| MusicError::Serialization(format!("{}: {}", path.display(), e)))?;
    }
    std::fs::write(path, &buf)
        .map_err(|e| MusicError::Serialization(format!("{}: {}", path.display(), e)))?;

    info!("MIDIファイルを保存: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::{decode_tokens, PIANO_PROGRAM};

    fn events(items: &[&str]) -> Vec<ScoreEvent> {
        let tokens: Vec<String> = items.iter().map(|s| s.to_string()).collect();
        decode_tokens(&tokens).unwrap()
    }

    #[test]
    fn test_notes_start_every_eighth() {
        let notes = score_to_notes(&events(&["A4", "C4"]));
        assert_eq!(
            notes,
            vec![
                MidiNote { key: 69, start: 0, end: 480 },
                MidiNote { key: 60, start: 240, end: 720 },
            ]
        );
    }

    #[test]
    fn test_repeated_key_is_cut_at_next_attack() {
        let notes = score_to_notes(&events(&["A4", "A4", "0.4.7"]));
        assert_eq!(notes[0], MidiNote { key: 69, start: 0, end: 240 });
        assert_eq!(notes[1], MidiNote { key: 69, start: 240, end: 720 });
        assert_eq!(notes.len(), 5);
    }

    #[test]
    fn test_smf_roundtrip_through_parser() {
        let evs = events(&["A4", "0.4.7", "B4"]);
        let bytes = midi_bytes(&evs).unwrap();
        let smf = Smf::parse(&bytes).unwrap();
        assert_eq!(smf.tracks.len(), 1);

        let mut tick = 0u32;
        let mut note_ons = Vec::new();
        let mut program = None;
        for event in &smf.tracks[0] {
            tick += event.delta.as_int();
            if let TrackEventKind::Midi { message, .. } = event.kind {
                match message {
                    MidiMessage::NoteOn { key, .. } => note_ons.push((tick, key.as_int())),
                    MidiMessage::ProgramChange { program: p } => program = Some(p.as_int()),
                    _ => {}
                }
            }
        }

        assert_eq!(program, Some(PIANO_PROGRAM));
        assert_eq!(
            note_ons,
            vec![(0, 69), (240, 60), (240, 64), (240, 67), (480, 71)]
        );
    }

    #[test]
    fn test_write_to_bad_path_is_reported() {
        let dir = std::env::temp_dir().join("music_lstm_midi_blocker");
        std::fs::write(&dir, b"file, not a directory").unwrap();

        let result = write_midi(&events(&["A4"]), &dir.join("out.mid"));
        assert!(matches!(result, Err(MusicError::Serialization(_))));

        std::fs::remove_file(&dir).ok();
    }
}
