use crate::config::MIDI_EXTENSIONS;
use crate::error::{CorpusError, Result};
use crate::pitch::{chord_token, pitch_name};
use midly::{MidiMessage, Smf, TrackEventKind};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// ドラム用チャンネル（0始まりで9）
const DRUM_CHANNEL: u8 = 9;

/// ディレクトリを再帰的に走査してMIDIファイルを列挙
///
/// 各ディレクトリ内はファイル名順に並べるので、列挙順は実行ごとに変わらない。
pub fn find_midi_files(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(CorpusError::MissingDirectory(root.to_path_buf()).into());
    }

    let mut files = Vec::new();
    walk(root, &mut files)?;
    Ok(files)
}

fn walk(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    entries.sort();

    for path in entries {
        if path.is_dir() {
            walk(&path, files)?;
        } else if is_midi_file(&path) {
            files.push(path);
        }
    }

    Ok(())
}

fn is_midi_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            MIDI_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// MIDIバイト列を音符・和音トークン列に変換
///
/// 音符を含むトラックが複数あれば最初のトラックだけを使う。
/// 同じティックで鳴り始める音はまとめて和音トークンにする。
pub fn extract_tokens(bytes: &[u8]) -> std::result::Result<Vec<String>, midly::Error> {
    let smf = Smf::parse(bytes)?;

    // トラックごとの (開始ティック, ノート番号)
    let onsets = smf
        .tracks
        .iter()
        .map(|track| {
            let mut tick: u64 = 0;
            let mut onsets = Vec::new();
            for event in track {
                tick += event.delta.as_int() as u64;
                if let TrackEventKind::Midi {
                    channel,
                    message: MidiMessage::NoteOn { key, vel },
                } = event.kind
                {
                    if vel.as_int() > 0 && channel.as_int() != DRUM_CHANNEL {
                        onsets.push((tick, key.as_int()));
                    }
                }
            }
            onsets
        })
        .find(|onsets| !onsets.is_empty())
        .unwrap_or_default();

    Ok(group_onsets(&onsets))
}

/// 同時に鳴り始める音をまとめてトークン化
fn group_onsets(onsets: &[(u64, u8)]) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < onsets.len() {
        let tick = onsets[i].0;
        let mut keys = Vec::new();
        while i < onsets.len() && onsets[i].0 == tick {
            if !keys.contains(&onsets[i].1) {
                keys.push(onsets[i].1);
            }
            i += 1;
        }

        if keys.len() == 1 {
            tokens.push(pitch_name(keys[0]));
        } else {
            tokens.push(chord_token(&keys));
        }
    }

    tokens
}

/// ファイル列から音符を抽出して連結
///
/// 解析に失敗したファイルは警告を出して読み飛ばす。
pub fn load_notes(files: &[PathBuf]) -> Vec<String> {
    let total = files.len();
    let mut notes = Vec::new();

    for (i, path) in files.iter().enumerate() {
        info!("ファイルを処理中 {}/{}: {}", i + 1, total, path.display());

        let result = fs::read(path)
            .map_err(|e| e.to_string())
            .and_then(|bytes| extract_tokens(&bytes).map_err(|e| e.to_string()));

        match result {
            Ok(tokens) => {
                debug!("{}: {}トークン", path.display(), tokens.len());
                notes.extend(tokens);
            }
            Err(reason) => {
                let err = CorpusError::Parse {
                    path: path.clone(),
                    reason,
                };
                warn!("{}", err);
            }
        }
    }

    notes
}

/// コーパスディレクトリから音符列を読み込む
///
/// `limit` を指定すると列挙順で先頭のファイルだけを使う。
/// ファイルが無い、または音符が一つも取れない場合はエラー。
pub fn load_corpus(root: &Path, limit: Option<usize>) -> Result<Vec<String>> {
    let mut files = find_midi_files(root)?;
    if let Some(limit) = limit {
        files.truncate(limit);
    }
    info!("MIDIファイル{}件を使用", files.len());

    let notes = load_notes(&files);
    info!("抽出した音符数: {}", notes.len());

    if notes.is_empty() {
        return Err(CorpusError::Empty { files: files.len() }.into());
    }

    Ok(notes)
}
