use crate::checkpoint::save_bundle;
use crate::config::TrainSettings;
use crate::data::{one_hot, SequenceData};
use crate::error::{MusicError, Result};
use crate::metrics::{save_metrics, ModelConfig, TrainingMetrics};
use crate::model::{input_tensor, MusicLstm};
use crate::vocabulary::NoteVocabulary;
use burn::backend::ndarray::NdArray;
use burn::backend::wgpu::{Wgpu, WgpuDevice};
use burn::backend::Autodiff;
use burn::optim::{GradientsParams, Optimizer, RmsPropConfig};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::ElementConversion;
use std::path::Path;
use tracing::{info, warn};

/// 訓練結果（モデル・語彙・メトリクス）
pub struct TrainedModel<B: Backend> {
    pub model: MusicLstm<B>,
    pub vocab: NoteVocabulary,
    pub window: usize,
    pub metrics: TrainingMetrics,
}

/// 音符列から語彙とウィンドウを作って訓練する
pub fn train_from_notes<B: AutodiffBackend>(
    notes: &[String],
    settings: &TrainSettings,
    device: &B::Device,
) -> Result<TrainedModel<B>> {
    let vocab = NoteVocabulary::from_notes(notes);
    info!("語彙サイズ: {}", vocab.vocab_size());

    let ids = vocab.encode(notes).map_err(|unknown| {
        MusicError::InvalidToken(unknown.join(", "))
    })?;
    let data = SequenceData::from_ids(&ids, settings.window);
    info!("訓練サンプル数: {}", data.len());

    // サンプルが無ければ訓練しない
    data.ensure_not_empty()?;

    let model = MusicLstm::<B>::new(device, vocab.vocab_size());
    let (model, metrics) = train(model, &data, vocab.vocab_size(), settings, device)?;

    Ok(TrainedModel {
        model,
        vocab,
        window: settings.window,
        metrics,
    })
}

/// 訓練してバンドルとメトリクスを保存（ジェネリックBackend）
pub fn train_and_save<B: AutodiffBackend>(
    notes: &[String],
    settings: &TrainSettings,
    save_dir: &Path,
    device: &B::Device,
) -> Result<TrainingMetrics> {
    let trained = train_from_notes::<B>(notes, settings, device)?;

    save_bundle(&trained.model, &trained.vocab, trained.window, save_dir)?;

    // メトリクスは付随情報なので失敗しても訓練結果は残す
    let model_config = ModelConfig::new(trained.vocab.vocab_size(), trained.window);
    if let Err(e) = save_metrics(save_dir, &model_config, &trained.metrics) {
        warn!("メトリクスを保存できません: {}", e);
    }

    Ok(trained.metrics)
}

/// バックエンドを選択して訓練実行
pub fn run_training(
    backend_name: &str,
    notes: &[String],
    settings: &TrainSettings,
    save_dir: &Path,
) -> Result<TrainingMetrics> {
    match backend_name {
        "wgpu" => {
            let device = WgpuDevice::default();
            train_and_save::<Autodiff<Wgpu>>(notes, settings, save_dir, &device)
        }
        "ndarray" => {
            let device = Default::default();
            train_and_save::<Autodiff<NdArray>>(notes, settings, save_dir, &device)
        }
        _ => Err(MusicError::Backend(backend_name.to_string())),
    }
}

/// 訓練実行
pub fn train<B: AutodiffBackend>(
    model: MusicLstm<B>,
    training_data: &SequenceData,
    vocab_size: usize,
    settings: &TrainSettings,
    device: &B::Device,
) -> Result<(MusicLstm<B>, TrainingMetrics)> {
    training_data.ensure_not_empty()?;

    let mut optimizer = RmsPropConfig::new()
        .with_alpha(0.9)
        .with_epsilon(1e-7)
        .init();

    let mut model = model;
    let mut loss_history = Vec::new();

    info!("訓練開始: {}エポック", settings.epochs);

    for epoch in 0..settings.epochs {
        let mut total_loss = 0.0;
        let mut batch_count = 0;

        for (batch_inputs, batch_targets) in training_data.batches(settings.batch_size) {
            let batch_size = batch_inputs.len();

            // 入力テンソル作成 [batch, window, 1]
            let inputs = input_tensor::<B>(&batch_inputs, vocab_size, device);

            // ターゲットはone-hot [batch, vocab_size]
            let targets = Tensor::<B, 1>::from_floats(
                one_hot(&batch_targets, vocab_size).as_slice(),
                device,
            )
            .reshape([batch_size, vocab_size]);

            // フォワードパス
            let logits = model.forward(inputs);

            // 損失計算
            let loss = categorical_cross_entropy(logits, targets);

            // バックプロパゲーション
            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);

            // パラメータ更新
            model = optimizer.step(settings.learning_rate, model, grads);

            total_loss += loss.into_scalar().elem::<f32>();
            batch_count += 1;
        }

        let avg_loss = total_loss / batch_count.max(1) as f32;
        loss_history.push(avg_loss);

        info!(
            "Epoch {}/{}: Loss = {:.6}",
            epoch + 1,
            settings.epochs,
            avg_loss
        );
    }

    let metrics = TrainingMetrics {
        final_loss: *loss_history.last().unwrap_or(&0.0),
        loss_history,
        epochs: settings.epochs,
        learning_rate: settings.learning_rate,
        batch_size: settings.batch_size,
        samples: training_data.len(),
    };

    Ok((model, metrics))
}

/// カテゴリカル交差エントロピー（バッチ平均）
///
/// logits: [batch, vocab_size], targets: one-hot [batch, vocab_size]
pub fn categorical_cross_entropy<B: Backend>(
    logits: Tensor<B, 2>,
    targets: Tensor<B, 2>,
) -> Tensor<B, 1> {
    let log_probs = burn::tensor::activation::log_softmax(logits, 1);
    (targets * log_probs).sum_dim(1).mean().neg()
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestBackend = NdArray;

    #[test]
    fn test_cross_entropy_matches_manual_value() {
        let device = Default::default();
        // 一様なロジット → loss = ln(4)
        let logits = Tensor::<TestBackend, 2>::zeros([2, 4], &device);
        let targets = Tensor::<TestBackend, 1>::from_floats(
            one_hot(&[1, 3], 4).as_slice(),
            &device,
        )
        .reshape([2, 4]);

        let loss: f32 = categorical_cross_entropy(logits, targets)
            .into_scalar()
            .elem();
        assert!((loss - 4f32.ln()).abs() < 1e-5);
    }

    #[test]
    fn test_training_refuses_without_samples() {
        let device = Default::default();
        let notes: Vec<String> = ["A4", "B4", "C5"].iter().map(|s| s.to_string()).collect();
        let settings = TrainSettings {
            window: 3,
            ..TrainSettings::default()
        };

        let result = train_from_notes::<Autodiff<NdArray>>(&notes, &settings, &device);
        assert!(matches!(
            result,
            Err(MusicError::NotEnoughNotes { notes: 3, window: 3 })
        ));
    }
}
