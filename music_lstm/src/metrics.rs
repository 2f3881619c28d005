use crate::config;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// 訓練メトリクス
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TrainingMetrics {
    /// 訓練曲線（エポックごとの損失）
    pub loss_history: Vec<f32>,
    /// 最終損失
    pub final_loss: f32,
    /// エポック数
    pub epochs: usize,
    /// 学習率
    pub learning_rate: f64,
    /// バッチサイズ
    pub batch_size: usize,
    /// 訓練サンプル数
    pub samples: usize,
}

/// モデル設定
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ModelConfig {
    pub lstm_units: usize,
    pub lstm_layers: usize,
    pub dense_units: usize,
    pub dropout: f64,
    pub vocab_size: usize,
    pub sequence_length: usize,
}

impl ModelConfig {
    pub fn new(vocab_size: usize, sequence_length: usize) -> Self {
        Self {
            lstm_units: config::LSTM_UNITS,
            lstm_layers: 3,
            dense_units: config::DENSE_UNITS,
            dropout: config::DROPOUT,
            vocab_size,
            sequence_length,
        }
    }
}

/// メタデータ
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Metadata {
    pub crate_version: String,
    pub trained_at: String,
}

/// 統合メトリクスファイル
#[derive(Serialize, Deserialize, Debug)]
pub struct MetricsFile {
    pub model_config: ModelConfig,
    pub training: TrainingMetrics,
    pub metadata: Metadata,
}

/// メトリクスを保存
pub fn save_metrics(
    save_dir: &Path,
    model_config: &ModelConfig,
    training_metrics: &TrainingMetrics,
) -> Result<(), Box<dyn std::error::Error>> {
    fs::create_dir_all(save_dir)?;

    let metadata = Metadata {
        crate_version: env!("CARGO_PKG_VERSION").to_string(),
        trained_at: chrono::Local::now().to_rfc3339(),
    };

    // metrics.jsonを保存
    let metrics_file = MetricsFile {
        model_config: model_config.clone(),
        training: training_metrics.clone(),
        metadata: metadata.clone(),
    };

    let metrics_json = serde_json::to_string_pretty(&metrics_file)?;
    fs::write(save_dir.join("metrics.json"), metrics_json)?;
    info!("メトリクスを保存: {}", save_dir.join("metrics.json").display());

    // config.jsonを保存
    save_config(save_dir, model_config, training_metrics, &metadata)?;

    Ok(())
}

/// config.jsonを保存
fn save_config(
    save_dir: &Path,
    model_config: &ModelConfig,
    training_metrics: &TrainingMetrics,
    metadata: &Metadata,
) -> Result<(), Box<dyn std::error::Error>> {
    #[derive(Serialize)]
    struct ConfigFile {
        model: ModelConfig,
        training: TrainingConfig,
        metadata: Metadata,
    }

    #[derive(Serialize)]
    struct TrainingConfig {
        learning_rate: f64,
        epochs: usize,
        batch_size: usize,
        optimizer: String,
        loss: String,
    }

    let config_file = ConfigFile {
        model: model_config.clone(),
        training: TrainingConfig {
            learning_rate: training_metrics.learning_rate,
            epochs: training_metrics.epochs,
            batch_size: training_metrics.batch_size,
            optimizer: "RMSProp".to_string(),
            loss: "categorical_crossentropy".to_string(),
        },
        metadata: metadata.clone(),
    };

    let config_json = serde_json::to_string_pretty(&config_file)?;
    fs::write(save_dir.join("config.json"), config_json)?;
    info!("設定を保存: {}", save_dir.join("config.json").display());

    Ok(())
}
