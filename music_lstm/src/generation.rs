use crate::data::SequenceData;
use crate::error::{MusicError, Result};
use crate::model::{input_tensor, MusicLstm};
use crate::vocabulary::NoteVocabulary;
use burn::prelude::*;
use rand::Rng;
use std::collections::VecDeque;
use tracing::debug;

/// ウィンドウから次トークンの確率分布を返すもの
pub trait Predictor {
    fn predict(&mut self, window: &[usize]) -> Result<Vec<f32>>;
}

/// 学習済みLSTMによる予測
pub struct LstmPredictor<B: Backend> {
    model: MusicLstm<B>,
    vocab_size: usize,
    device: B::Device,
}

impl<B: Backend> LstmPredictor<B> {
    pub fn new(model: MusicLstm<B>, vocab_size: usize, device: &B::Device) -> Self {
        Self {
            model,
            vocab_size,
            device: device.clone(),
        }
    }
}

impl<B: Backend> Predictor for LstmPredictor<B> {
    fn predict(&mut self, window: &[usize]) -> Result<Vec<f32>> {
        // [1, window, 1] に整形して語彙サイズで正規化
        let input = input_tensor::<B>(&[window.to_vec()], self.vocab_size, &self.device);
        let probs = self.model.predict(input);

        probs
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| MusicError::Inference(format!("{:?}", e)))
    }
}

/// 最大確率のインデックス（同率なら小さいインデックス、NaNは選ばない）
pub fn argmax(probs: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;

    for (index, &p) in probs.iter().enumerate() {
        if p.is_nan() {
            continue;
        }
        match best {
            Some((_, best_p)) if p <= best_p => {}
            _ => best = Some((index, p)),
        }
    }

    best.map(|(index, _)| index)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorState {
    /// 開始ウィンドウを選んだ直後
    Seeded,
    /// 1トークンずつ予測中
    Advancing,
}

/// 自己回帰でトークンを生成する
pub struct Generator<'a, P: Predictor> {
    predictor: P,
    vocab: &'a NoteVocabulary,
    window: VecDeque<usize>,
    state: GeneratorState,
    output: Vec<String>,
}

impl<'a, P: Predictor> Generator<'a, P> {
    /// ウィンドウ群から一様ランダムに開始位置を選ぶ
    pub fn seed<R: Rng>(
        predictor: P,
        vocab: &'a NoteVocabulary,
        pool: &SequenceData,
        rng: &mut R,
    ) -> Result<Self> {
        pool.ensure_not_empty()?;

        let start = rng.gen_range(0..pool.len());
        debug!("開始ウィンドウ: {}/{}", start, pool.len());

        let window = pool.window_at(start).unwrap_or_default().to_vec();
        Ok(Self::from_window(predictor, vocab, window))
    }

    pub fn from_window(predictor: P, vocab: &'a NoteVocabulary, window: Vec<usize>) -> Self {
        Self {
            predictor,
            vocab,
            window: window.into(),
            state: GeneratorState::Seeded,
            output: Vec::new(),
        }
    }

    pub fn state(&self) -> GeneratorState {
        self.state
    }

    pub fn window(&self) -> Vec<usize> {
        self.window.iter().copied().collect()
    }

    pub fn output(&self) -> &[String] {
        &self.output
    }

    /// 1トークン予測してウィンドウを1つ進める
    ///
    /// 語彙に無いインデックスは出力に加えないが、ウィンドウには入れる。
    pub fn step(&mut self) -> Result<usize> {
        self.state = GeneratorState::Advancing;

        let probs = self.predictor.predict(self.window.make_contiguous())?;
        let index = argmax(&probs)
            .ok_or_else(|| MusicError::Inference("予測分布が空です".to_string()))?;

        match self.vocab.token_of(index) {
            Some(token) => self.output.push(token.to_string()),
            None => debug!("語彙に無いインデックスを読み飛ばし: {}", index),
        }

        // 長さを保ったまま末尾に追加し先頭を捨てる
        self.window.push_back(index);
        self.window.pop_front();

        Ok(index)
    }

    /// 指定回数だけ予測を繰り返し、生成トークン列を返す
    pub fn generate(mut self, count: usize) -> Result<Vec<String>> {
        for _ in 0..count {
            self.step()?;
        }
        Ok(self.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn vocab() -> NoteVocabulary {
        let notes: Vec<String> = ["A4", "B4", "C5"].iter().map(|s| s.to_string()).collect();
        NoteVocabulary::from_notes(&notes)
    }

    /// 決められた分布を順番に返す
    struct ScriptedPredictor {
        outputs: Vec<Vec<f32>>,
        calls: usize,
        seen: Vec<Vec<usize>>,
    }

    impl ScriptedPredictor {
        fn new(outputs: Vec<Vec<f32>>) -> Self {
            Self {
                outputs,
                calls: 0,
                seen: Vec::new(),
            }
        }
    }

    impl Predictor for ScriptedPredictor {
        fn predict(&mut self, window: &[usize]) -> Result<Vec<f32>> {
            self.seen.push(window.to_vec());
            let out = self.outputs[self.calls % self.outputs.len()].clone();
            self.calls += 1;
            Ok(out)
        }
    }

    /// 直前のトークンの次を予測する
    struct CyclePredictor {
        vocab_size: usize,
    }

    impl Predictor for CyclePredictor {
        fn predict(&mut self, window: &[usize]) -> Result<Vec<f32>> {
            let mut probs = vec![0.0; self.vocab_size];
            let last = *window.last().unwrap_or(&0);
            probs[(last + 1) % self.vocab_size] = 1.0;
            Ok(probs)
        }
    }

    #[test]
    fn test_argmax_ties_pick_lowest_index() {
        assert_eq!(argmax(&[0.1, 0.4, 0.4, 0.1]), Some(1));
        assert_eq!(argmax(&[0.25, 0.25, 0.25, 0.25]), Some(0));
        assert_eq!(argmax(&[f32::NAN, 0.2, 0.7]), Some(2));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_window_length_stays_constant() {
        let vocab = vocab();
        let mut generator =
            Generator::from_window(CyclePredictor { vocab_size: 3 }, &vocab, vec![0, 1, 2, 0]);
        assert_eq!(generator.state(), GeneratorState::Seeded);

        for _ in 0..500 {
            generator.step().unwrap();
            assert_eq!(generator.window().len(), 4);
        }
        assert_eq!(generator.state(), GeneratorState::Advancing);
        assert_eq!(generator.output().len(), 500);
    }

    #[test]
    fn test_generate_runs_exact_count() {
        let vocab = vocab();
        let generator =
            Generator::from_window(CyclePredictor { vocab_size: 3 }, &vocab, vec![0, 0, 0]);
        let output = generator.generate(5).unwrap();
        assert_eq!(output, vec!["B4", "C5", "A4", "B4", "C5"]);
    }

    #[test]
    fn test_window_slides_with_predicted_index() {
        let vocab = vocab();
        let predictor = ScriptedPredictor::new(vec![vec![0.0, 0.0, 1.0]]);
        let mut generator = Generator::from_window(predictor, &vocab, vec![0, 1, 1]);

        generator.step().unwrap();
        assert_eq!(generator.window(), vec![1, 1, 2]);
        generator.step().unwrap();
        assert_eq!(generator.window(), vec![1, 2, 2]);
        assert_eq!(generator.predictor.seen, vec![vec![0, 1, 1], vec![1, 1, 2]]);
    }

    #[test]
    fn test_unmapped_index_is_skipped_but_window_advances() {
        let vocab = vocab();
        // インデックス4は語彙（3種類）に無い
        let predictor = ScriptedPredictor::new(vec![
            vec![0.0, 0.0, 0.0, 0.0, 1.0],
            vec![0.0, 1.0, 0.0, 0.0, 0.0],
        ]);
        let mut generator = Generator::from_window(predictor, &vocab, vec![0, 0]);

        assert_eq!(generator.step().unwrap(), 4);
        assert!(generator.output().is_empty());
        assert_eq!(generator.window(), vec![0, 4]);

        generator.step().unwrap();
        assert_eq!(generator.output(), ["B4"]);
        assert_eq!(generator.window(), vec![4, 1]);
    }

    #[test]
    fn test_seed_is_reproducible_with_same_rng_seed() {
        let vocab = vocab();
        let ids: Vec<usize> = (0..50).map(|i| i % 3).collect();
        let pool = SequenceData::from_ids(&ids, 4);

        let first = Generator::seed(
            CyclePredictor { vocab_size: 3 },
            &vocab,
            &pool,
            &mut StdRng::seed_from_u64(7),
        )
        .unwrap();
        let second = Generator::seed(
            CyclePredictor { vocab_size: 3 },
            &vocab,
            &pool,
            &mut StdRng::seed_from_u64(7),
        )
        .unwrap();

        assert_eq!(first.window(), second.window());
        assert_eq!(first.window().len(), 4);
        assert_eq!(
            first.generate(20).unwrap(),
            second.generate(20).unwrap()
        );
    }

    #[test]
    fn test_seed_requires_windows() {
        let vocab = vocab();
        let pool = SequenceData::from_ids(&[0, 1], 100);
        let result = Generator::seed(
            CyclePredictor { vocab_size: 3 },
            &vocab,
            &pool,
            &mut StdRng::seed_from_u64(1),
        );
        assert!(matches!(
            result,
            Err(MusicError::NotEnoughNotes { notes: 2, window: 100 })
        ));
    }
}
