use crate::config::OFFSET_STEP;
use crate::error::{MusicError, Result};
use crate::pitch::parse_pitch_name;

/// アコースティックピアノ（General MIDIプログラム0）
pub const PIANO_PROGRAM: u8 = 0;

/// 和音構成音のピッチクラスを置くオクターブの基準（C4）
const CHORD_BASE: u8 = 60;

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    Note,
    Chord,
}

/// 再生用のイベント（単音または和音）
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreEvent {
    pub kind: EventKind,
    /// MIDIノート番号
    pub pitches: Vec<u8>,
    /// 開始位置（四分音符単位）
    pub offset: f64,
    pub program: u8,
}

/// トークンが和音か（"." を含む、または数字だけ）
pub fn is_chord_token(token: &str) -> bool {
    token.contains('.') || (!token.is_empty() && token.chars().all(|c| c.is_ascii_digit()))
}

/// 1トークンをノート番号列に変換
pub fn decode_token(token: &str) -> Result<(EventKind, Vec<u8>)> {
    if is_chord_token(token) {
        let pitches = token
            .split('.')
            .map(|part| {
                part.parse::<u8>()
                    .ok()
                    .filter(|&pc| pc < 12)
                    .map(|pc| CHORD_BASE + pc)
                    .ok_or_else(|| MusicError::InvalidToken(token.to_string()))
            })
            .collect::<Result<Vec<u8>>>()?;
        Ok((EventKind::Chord, pitches))
    } else {
        let pitch =
            parse_pitch_name(token).ok_or_else(|| MusicError::InvalidToken(token.to_string()))?;
        Ok((EventKind::Note, vec![pitch]))
    }
}

/// 生成トークン列をイベント列に変換
///
/// オフセットは0から始まり、1トークンごとに0.5ずつ進む。
pub fn decode_tokens(tokens: &[String]) -> Result<Vec<ScoreEvent>> {
    tokens
        .iter()
        .enumerate()
        .map(|(i, token)| {
            let (kind, pitches) = decode_token(token)?;
            Ok(ScoreEvent {
                kind,
                pitches,
                offset: i as f64 * OFFSET_STEP,
                program: PIANO_PROGRAM,
            })
        })
        .collect()
}
