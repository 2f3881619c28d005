use crate::error::{ArtifactError, Result};
use crate::model::MusicLstm;
use crate::vocabulary::NoteVocabulary;
use burn::prelude::*;
use burn::record::{BinFileRecorder, FullPrecisionSettings, Recorder};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// バンドル形式のバージョン（重みと語彙の組を変えたら上げる）
pub const BUNDLE_VERSION: u32 = 1;

const MODEL_FILE: &str = "model";
const MANIFEST_FILE: &str = "bundle.json";

/// 重みと一緒に保存する語彙・ウィンドウ情報
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BundleManifest {
    pub version: u32,
    pub window: usize,
    pub vocab_size: usize,
    pub vocabulary: NoteVocabulary,
}

impl BundleManifest {
    pub fn new(vocabulary: &NoteVocabulary, window: usize) -> Self {
        Self {
            version: BUNDLE_VERSION,
            window,
            vocab_size: vocabulary.vocab_size(),
            vocabulary: vocabulary.clone(),
        }
    }

    /// 読み込んだマニフェストが現在の形式と一致するか検証
    pub fn validate(&self) -> Result<()> {
        if self.version != BUNDLE_VERSION {
            return Err(ArtifactError::Version {
                expected: BUNDLE_VERSION,
                found: self.version,
            }
            .into());
        }
        if self.vocab_size != self.vocabulary.vocab_size() || self.vocab_size == 0 {
            return Err(ArtifactError::Vocabulary(format!(
                "語彙サイズ {} と語彙の長さ {} が一致しません",
                self.vocab_size,
                self.vocabulary.vocab_size()
            ))
            .into());
        }
        Ok(())
    }
}

/// 読み込んだモデルとその語彙
pub struct ModelBundle<B: Backend> {
    pub model: MusicLstm<B>,
    pub manifest: BundleManifest,
}

/// モデルと語彙を一つのディレクトリに保存
pub fn save_bundle<B: Backend>(
    model: &MusicLstm<B>,
    vocabulary: &NoteVocabulary,
    window: usize,
    save_dir: &Path,
) -> Result<()> {
    fs::create_dir_all(save_dir)?;

    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    let model_path = save_dir.join(MODEL_FILE);

    model
        .clone()
        .save_file(model_path, &recorder)
        .map_err(|e| ArtifactError::Record(format!("{:?}", e)))?;

    let manifest = BundleManifest::new(vocabulary, window);
    let manifest_json = serde_json::to_string_pretty(&manifest)
        .map_err(|e| ArtifactError::Manifest(e.to_string()))?;
    fs::write(save_dir.join(MANIFEST_FILE), manifest_json)?;

    info!("モデルを保存: {}", save_dir.display());
    Ok(())
}

/// マニフェストだけを読み込んで検証
pub fn load_manifest(load_dir: &Path) -> Result<BundleManifest> {
    let manifest_path = load_dir.join(MANIFEST_FILE);
    let model_path = load_dir.join(format!("{}.bin", MODEL_FILE));
    if !manifest_path.exists() || !model_path.exists() {
        return Err(ArtifactError::Missing(load_dir.to_path_buf()).into());
    }

    let content = fs::read_to_string(&manifest_path)?;
    let manifest: BundleManifest =
        serde_json::from_str(&content).map_err(|e| ArtifactError::Manifest(e.to_string()))?;
    manifest.validate()?;

    Ok(manifest)
}

/// モデルを読み込み（ジェネリックBackend）
pub fn load_bundle<B: Backend>(load_dir: &Path, device: &B::Device) -> Result<ModelBundle<B>> {
    let manifest = load_manifest(load_dir)?;

    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    let model_path = load_dir.join(MODEL_FILE);

    // 語彙サイズに合わせた形で器を作ってから重みを流し込む
    let model = MusicLstm::<B>::new(device, manifest.vocab_size);
    let record = recorder
        .load(model_path, device)
        .map_err(|e| ArtifactError::Record(format!("{:?}", e)))?;

    info!(
        "モデルを読み込み（{}バックエンド）: {}",
        std::any::type_name::<B>(),
        load_dir.display()
    );

    Ok(ModelBundle {
        model: model.load_record(record),
        manifest,
    })
}

/// 生成用コーパスが保存済み語彙で表せるか確認
///
/// 語彙に無い音符が含まれていれば致命的な不一致として扱う。
pub fn check_compatibility(manifest: &BundleManifest, notes: &[String]) -> Result<Vec<usize>> {
    manifest.vocabulary.encode(notes).map_err(|unknown| {
        let preview: Vec<&str> = unknown.iter().take(5).map(|s| s.as_str()).collect();
        ArtifactError::Vocabulary(format!(
            "学習時の語彙に無い音符が{}種類あります（例: {}）",
            unknown.len(),
            preview.join(", ")
        ))
        .into()
    })
}
