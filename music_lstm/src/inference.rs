use crate::checkpoint::{check_compatibility, load_bundle};
use crate::config::GenerateSettings;
use crate::data::SequenceData;
use crate::error::{MusicError, Result};
use crate::generation::{Generator, LstmPredictor};
use crate::score::{decode_tokens, ScoreEvent};
use burn::backend::ndarray::NdArray;
use burn::backend::wgpu::{Wgpu, WgpuDevice};
use burn::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use tracing::{info, warn};

/// 生成結果
pub struct GeneratedMusic {
    pub tokens: Vec<String>,
    pub events: Vec<ScoreEvent>,
}

/// 乱数源（シード指定があれば再現可能）
pub fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// 保存済みバンドルとコーパスから曲を生成（ジェネリックBackend）
pub fn compose<B: Backend>(
    load_dir: &Path,
    notes: &[String],
    settings: &GenerateSettings,
    device: &B::Device,
) -> Result<GeneratedMusic> {
    let bundle = load_bundle::<B>(load_dir, device)?;
    let manifest = bundle.manifest;

    // 学習時の語彙でコーパスをID化（語彙外があれば中断）
    let ids = check_compatibility(&manifest, notes)?;
    let pool = SequenceData::from_ids(&ids, manifest.window);
    pool.ensure_not_empty()?;
    info!("生成用ウィンドウ数: {}", pool.len());

    let predictor = LstmPredictor::new(bundle.model, manifest.vocab_size, device);
    let mut rng = make_rng(settings.seed);

    let generator = Generator::seed(predictor, &manifest.vocabulary, &pool, &mut rng)?;
    let tokens = generator.generate(settings.length)?;
    info!("生成したトークン数: {}", tokens.len());

    let events = decode_tokens(&tokens)?;
    Ok(GeneratedMusic { tokens, events })
}

/// バックエンドを選択して生成実行
pub fn run_generation(
    backend_name: &str,
    load_dir: &Path,
    notes: &[String],
    settings: &GenerateSettings,
) -> Result<GeneratedMusic> {
    match backend_name {
        "wgpu" => {
            let device = WgpuDevice::default();
            compose::<Wgpu>(load_dir, notes, settings, &device)
        }
        "ndarray" => {
            let device = Default::default();
            compose::<NdArray>(load_dir, notes, settings, &device)
        }
        "auto" => {
            // autoの場合はWGPUを試し、失敗したらNdArrayにフォールバック
            info!("バックエンド: 自動選択中...");
            let wgpu_result = catch_unwind(AssertUnwindSafe(|| {
                let device = WgpuDevice::default();
                compose::<Wgpu>(load_dir, notes, settings, &device)
            }));

            match wgpu_result {
                Ok(result) => {
                    info!("バックエンド: WGPU（自動選択）");
                    result
                }
                Err(_) => {
                    warn!("バックエンド: NdArray（WGPU利用不可のためフォールバック）");
                    let device = Default::default();
                    compose::<NdArray>(load_dir, notes, settings, &device)
                }
            }
        }
        _ => Err(MusicError::Backend(backend_name.to_string())),
    }
}
