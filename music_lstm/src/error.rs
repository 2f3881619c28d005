use std::path::PathBuf;
use thiserror::Error;

/// コーパス読み込みのエラー
#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("コーパスディレクトリが見つかりません: {0}")]
    MissingDirectory(PathBuf),

    #[error("コーパスから音符を取り出せませんでした（MIDIファイル{files}件）")]
    Empty { files: usize },

    #[error("MIDIファイルを解析できません: {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
}

/// 学習済みバンドルのエラー
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("モデルバンドルが見つかりません: {0}")]
    Missing(PathBuf),

    #[error("バンドル情報を読み込めません: {0}")]
    Manifest(String),

    #[error("バンドル形式のバージョンが違います（期待: {expected}, 実際: {found}）")]
    Version { expected: u32, found: u32 },

    #[error("語彙が一致しません: {0}")]
    Vocabulary(String),

    #[error("モデル読み込みエラー: {0}")]
    Record(String),
}

#[derive(Debug, Error)]
pub enum MusicError {
    #[error(transparent)]
    Corpus(#[from] CorpusError),

    #[error("音符が足りません（音符数: {notes}, ウィンドウ長: {window}）。MIDIファイルを追加してください")]
    NotEnoughNotes { notes: usize, window: usize },

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error("解釈できないトークン: {0}")]
    InvalidToken(String),

    #[error("MIDIファイルを書き込めません: {0}")]
    Serialization(String),

    #[error("ファイルをちょうど{required}件選択してください（選択数: {selected}）")]
    Selection { required: usize, selected: usize },

    #[error("推論エラー: {0}")]
    Inference(String),

    #[error("未対応のバックエンド: {0}")]
    Backend(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MusicError>;
