#![recursion_limit = "256"]

use clap::{Parser, Subcommand};
use music_lstm::config::{
    self, GenerateSettings, TrainSettings, CORPUS_DIR, GENERATE_FILE_LIMIT, MODEL_DIR, OUTPUT_FILE,
};
use music_lstm::corpus::{find_midi_files, load_corpus};
use music_lstm::inference::run_generation;
use music_lstm::midi::write_midi;
use music_lstm::training::run_training;
use music_lstm::web::{serve, WebApp};
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// MIDIコーパスで学習するLSTM作曲モデル
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// バックエンドの選択（auto, wgpu, ndarray）
    #[arg(long, global = true, env = "MUSIC_LSTM_BACKEND", default_value = "auto")]
    backend: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// コーパス全体で訓練してバンドルを保存
    Train {
        /// MIDIファイルのディレクトリ
        #[arg(long, env = "MUSIC_LSTM_CORPUS", default_value = CORPUS_DIR)]
        corpus: PathBuf,

        /// モデルを保存するディレクトリ
        #[arg(long, env = "MUSIC_LSTM_MODEL", default_value = MODEL_DIR)]
        save: PathBuf,

        /// 入力ウィンドウ長
        #[arg(long, default_value_t = config::SEQUENCE_LENGTH)]
        window: usize,

        #[arg(long, default_value_t = config::EPOCHS)]
        epochs: usize,

        #[arg(long, default_value_t = config::BATCH_SIZE)]
        batch_size: usize,

        #[arg(long, default_value_t = config::LEARNING_RATE)]
        learning_rate: f64,

        /// 先頭から使うファイル数
        #[arg(long)]
        limit: Option<usize>,
    },

    /// 保存済みモデルで曲を生成してMIDIに書き出す
    Generate {
        /// モデルを読み込むディレクトリ
        #[arg(long, env = "MUSIC_LSTM_MODEL", default_value = MODEL_DIR)]
        load: PathBuf,

        /// シード用のMIDIファイルのディレクトリ
        #[arg(long, env = "MUSIC_LSTM_CORPUS", default_value = CORPUS_DIR)]
        corpus: PathBuf,

        /// 先頭から使うファイル数
        #[arg(long, default_value_t = GENERATE_FILE_LIMIT)]
        limit: usize,

        /// コーパスのファイルをすべて使う
        #[arg(long, conflicts_with = "limit")]
        all: bool,

        /// 出力MIDIファイル
        #[arg(long, default_value = OUTPUT_FILE)]
        output: PathBuf,

        /// 生成するトークン数
        #[arg(long, default_value_t = config::GENERATE_LENGTH)]
        length: usize,

        /// 乱数シード（指定すると再現可能）
        #[arg(long)]
        seed: Option<u64>,
    },

    /// ブラウザからファイルを選んで生成するWebフロントエンド
    Serve {
        #[arg(long, env = "MUSIC_LSTM_MODEL", default_value = MODEL_DIR)]
        load: PathBuf,

        #[arg(long, env = "MUSIC_LSTM_CORPUS", default_value = CORPUS_DIR)]
        corpus: PathBuf,

        /// 待ち受けアドレス
        #[arg(long, env = "MUSIC_LSTM_ADDR", default_value = "127.0.0.1:8501")]
        addr: String,

        #[arg(long, default_value = OUTPUT_FILE)]
        output: PathBuf,
    },
}

fn setup_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() {
    if let Err(e) = run() {
        eprintln!("エラー: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let start_time = Instant::now();

    let args = Args::parse();
    setup_tracing();

    match args.command {
        Command::Train {
            corpus,
            save,
            window,
            epochs,
            batch_size,
            learning_rate,
            limit,
        } => {
            println!("\n===== 訓練開始 =====");
            let notes = load_corpus(&corpus, limit)?;
            println!("音符数: {}", notes.len());

            let settings = TrainSettings {
                window,
                epochs,
                batch_size,
                learning_rate,
            };
            // 訓練は自動選択せずWGPUを既定にする
            let backend = if args.backend == "auto" {
                "wgpu"
            } else {
                args.backend.as_str()
            };
            let metrics = run_training(backend, &notes, &settings, &save)?;

            println!("訓練完了！ 最終損失: {:.6}", metrics.final_loss);
            println!("モデルを保存: {}", save.display());
        }

        Command::Generate {
            load,
            corpus,
            limit,
            all,
            output,
            length,
            seed,
        } => {
            println!("\n===== 生成 =====");
            let limit = if all { None } else { Some(limit) };
            let notes = load_corpus(&corpus, limit)?;

            let settings = GenerateSettings { length, seed };
            let music = run_generation(&args.backend, &load, &notes, &settings)?;
            write_midi(&music.events, &output)?;

            println!("生成トークン数: {}", music.tokens.len());
            println!("出力: {}", output.display());
        }

        Command::Serve {
            load,
            corpus,
            addr,
            output,
        } => {
            let files = find_midi_files(&corpus)?;
            println!("MIDIファイル: {}件", files.len());

            let app = WebApp::new(files, &load, &args.backend, GenerateSettings::default())
                .with_output(&output);
            serve(&addr, app)?;
        }
    }

    let duration = start_time.elapsed();
    println!("\n実行時間: {:.2}秒", duration.as_secs_f64());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generate_limit(args: &[&str]) -> (usize, bool) {
        let args = Args::try_parse_from(args).unwrap();
        match args.command {
            Command::Generate { limit, all, .. } => (limit, all),
            _ => panic!("generateサブコマンドになるべき"),
        }
    }

    #[test]
    fn test_generate_uses_first_ten_files_by_default() {
        assert_eq!(
            generate_limit(&["music_lstm", "generate"]),
            (GENERATE_FILE_LIMIT, false)
        );
        assert_eq!(
            generate_limit(&["music_lstm", "generate", "--limit", "3"]),
            (3, false)
        );
    }

    #[test]
    fn test_generate_all_files() {
        let (_, all) = generate_limit(&["music_lstm", "generate", "--all"]);
        assert!(all);
        assert!(Args::try_parse_from(["music_lstm", "generate", "--all", "--limit", "3"]).is_err());
    }
}
