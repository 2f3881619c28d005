// モデルハイパーパラメーター
pub const LSTM_UNITS: usize = 512; // 各LSTM層のユニット数
pub const DENSE_UNITS: usize = 256; // 中間全結合層の次元数
pub const DROPOUT: f64 = 0.3; // ドロップアウト率
pub const INPUT_FEATURES: usize = 1; // 1ステップあたりの入力次元（正規化済みID）
pub const SEQUENCE_LENGTH: usize = 100; // スライディングウィンドウ長

// 訓練設定
pub const LEARNING_RATE: f64 = 0.001; // 学習率（RMSProp）
pub const EPOCHS: usize = 3; // エポック数
pub const BATCH_SIZE: usize = 64; // バッチサイズ

// 生成設定
pub const GENERATE_LENGTH: usize = 500; // 生成するトークン数
pub const OFFSET_STEP: f64 = 0.5; // 1トークンごとのオフセット増分（四分音符単位）
pub const GENERATE_FILE_LIMIT: usize = 10; // 非対話生成で使うファイル数

// 入出力
pub const CORPUS_DIR: &str = "midi_songs";
pub const MODEL_DIR: &str = "models/music_lstm";
pub const OUTPUT_FILE: &str = "output.mid";
pub const MIDI_EXTENSIONS: [&str; 2] = ["mid", "midi"];

// Webフロントエンド
pub const FILES_PER_PAGE: usize = 10; // 1ページに表示するファイル数
pub const REQUIRED_SELECTIONS: usize = 3; // 生成に必要な選択ファイル数
pub const MAX_SESSIONS: usize = 1000; // 保持するセッション数の上限（古い順に破棄）

/// 訓練時に上書き可能な設定
#[derive(Debug, Clone)]
pub struct TrainSettings {
    pub window: usize,
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
}

impl Default for TrainSettings {
    fn default() -> Self {
        Self {
            window: SEQUENCE_LENGTH,
            epochs: EPOCHS,
            batch_size: BATCH_SIZE,
            learning_rate: LEARNING_RATE,
        }
    }
}

/// 生成時に上書き可能な設定
#[derive(Debug, Clone)]
pub struct GenerateSettings {
    pub length: usize,
    pub seed: Option<u64>,
}

impl Default for GenerateSettings {
    fn default() -> Self {
        Self {
            length: GENERATE_LENGTH,
            seed: None,
        }
    }
}
