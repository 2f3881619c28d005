use crate::config::{DENSE_UNITS, DROPOUT, INPUT_FEATURES, LSTM_UNITS};
use crate::data::normalize;
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig, Lstm, LstmConfig};
use burn::prelude::*;

/// 次の音符を予測する3層LSTM分類器
///
/// LSTM(512) → Dropout → LSTM(512) → Dropout → LSTM(512, 最終ステップのみ)
/// → Dense(256) → Dropout → Dense(語彙サイズ) → Softmax
#[derive(Module, Debug)]
pub struct MusicLstm<B: Backend> {
    lstm_1: Lstm<B>,
    lstm_2: Lstm<B>,
    lstm_3: Lstm<B>,
    dense: Linear<B>,
    output_projection: Linear<B>,
    dropout: Dropout,
}

impl<B: Backend> MusicLstm<B> {
    pub fn new(device: &B::Device, vocab_size: usize) -> Self {
        let lstm_1 = LstmConfig::new(INPUT_FEATURES, LSTM_UNITS, true).init(device);
        let lstm_2 = LstmConfig::new(LSTM_UNITS, LSTM_UNITS, true).init(device);
        let lstm_3 = LstmConfig::new(LSTM_UNITS, LSTM_UNITS, true).init(device);

        // 全結合層: [512] → [256] → [vocab_size]
        let dense = LinearConfig::new(LSTM_UNITS, DENSE_UNITS).init(device);
        let output_projection = LinearConfig::new(DENSE_UNITS, vocab_size).init(device);

        // Autodiffバックエンドのときだけ有効になる
        let dropout = DropoutConfig::new(DROPOUT).init();

        Self {
            lstm_1,
            lstm_2,
            lstm_3,
            dense,
            output_projection,
            dropout,
        }
    }

    /// input: [batch, seq_len, 1] → logits: [batch, vocab_size]
    pub fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 2> {
        let [batch_size, seq_len, _] = input.dims();

        // 1・2層目は全ステップの出力を次へ渡す
        let (x, _) = self.lstm_1.forward(input, None);
        let x = self.dropout.forward(x);
        let (x, _) = self.lstm_2.forward(x, None);
        let x = self.dropout.forward(x);

        // 3層目は最終ステップの出力だけを使う
        let (x, _) = self.lstm_3.forward(x, None);
        let last = x
            .slice([0..batch_size, seq_len - 1..seq_len, 0..LSTM_UNITS])
            .reshape([batch_size, LSTM_UNITS]);

        let hidden = self.dense.forward(last);
        let hidden = self.dropout.forward(hidden);
        self.output_projection.forward(hidden)
    }

    /// 次トークンの確率分布 [batch, vocab_size]
    pub fn predict(&self, input: Tensor<B, 3>) -> Tensor<B, 2> {
        burn::tensor::activation::softmax(self.forward(input), 1)
    }
}

/// ウィンドウ群を正規化済みの入力テンソル [batch, window, 1] に変換
pub fn input_tensor<B: Backend>(
    windows: &[Vec<usize>],
    vocab_size: usize,
    device: &B::Device,
) -> Tensor<B, 3> {
    let batch_size = windows.len();
    let window = windows.first().map(|w| w.len()).unwrap_or(0);

    let flattened: Vec<usize> = windows.iter().flatten().copied().collect();
    let normalized = normalize(&flattened, vocab_size);

    Tensor::<B, 1>::from_floats(normalized.as_slice(), device).reshape([
        batch_size,
        window,
        INPUT_FEATURES,
    ])
}
