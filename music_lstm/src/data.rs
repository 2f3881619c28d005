use crate::error::{MusicError, Result};

pub struct SequenceData {
    pub notes: usize,
    pub window: usize,
    pub samples: Vec<(Vec<usize>, usize)>, // (入力ウィンドウ, 次のトークン)
}

impl SequenceData {
    /// ID列をストライド1でスライドさせて訓練サンプルを作る
    ///
    /// N個のIDからは N - window 個のサンプルができる。
    pub fn from_ids(ids: &[usize], window: usize) -> Self {
        let mut samples = Vec::new();

        if window > 0 && ids.len() > window {
            for i in 0..ids.len() - window {
                let input = ids[i..i + window].to_vec();
                let target = ids[i + window];
                samples.push((input, target));
            }
        }

        Self {
            notes: ids.len(),
            window,
            samples,
        }
    }

    /// サンプルが一つも無ければエラー（訓練・生成を始めない）
    pub fn ensure_not_empty(&self) -> Result<()> {
        if self.samples.is_empty() {
            return Err(MusicError::NotEnoughNotes {
                notes: self.notes,
                window: self.window,
            });
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// i番目の入力ウィンドウ
    pub fn window_at(&self, index: usize) -> Option<&[usize]> {
        self.samples.get(index).map(|(input, _)| input.as_slice())
    }

    /// バッチを生成
    pub fn batches(&self, batch_size: usize) -> Vec<(Vec<Vec<usize>>, Vec<usize>)> {
        let mut batches = Vec::new();

        for chunk in self.samples.chunks(batch_size.max(1)) {
            let batch_inputs = chunk.iter().map(|(input, _)| input.clone()).collect();
            let batch_targets = chunk.iter().map(|(_, target)| *target).collect();
            batches.push((batch_inputs, batch_targets));
        }

        batches
    }
}

/// ID列を [0, 1) に正規化（語彙サイズで割る）
pub fn normalize(ids: &[usize], vocab_size: usize) -> Vec<f32> {
    let scale = vocab_size.max(1) as f32;
    ids.iter().map(|&id| id as f32 / scale).collect()
}

/// ターゲットをone-hotに展開（[batch * vocab_size] の平坦な配列）
pub fn one_hot(targets: &[usize], vocab_size: usize) -> Vec<f32> {
    let mut encoded = vec![0.0; targets.len() * vocab_size];
    for (row, &target) in targets.iter().enumerate() {
        if target < vocab_size {
            encoded[row * vocab_size + target] = 1.0;
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocabulary::NoteVocabulary;

    #[test]
    fn test_window_count_is_n_minus_w() {
        let ids: Vec<usize> = (0..250).map(|i| i % 7).collect();
        for window in [1, 10, 100, 249] {
            let data = SequenceData::from_ids(&ids, window);
            assert_eq!(data.len(), ids.len() - window);
            assert!(data.samples.iter().all(|(input, _)| input.len() == window));
        }
    }

    #[test]
    fn test_window_not_smaller_than_corpus_gives_nothing() {
        let ids = vec![0, 1, 2];
        assert!(SequenceData::from_ids(&ids, 3).is_empty());
        assert!(SequenceData::from_ids(&ids, 10).is_empty());
        assert!(SequenceData::from_ids(&[], 100).is_empty());

        let err = SequenceData::from_ids(&ids, 3).ensure_not_empty().unwrap_err();
        assert!(matches!(
            err,
            MusicError::NotEnoughNotes { notes: 3, window: 3 }
        ));
    }

    #[test]
    fn test_scenario_windows() {
        let notes: Vec<String> = ["A4", "A4", "B4", "C5", "A4", "B4"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let vocab = NoteVocabulary::from_notes(&notes);
        let ids = vocab.encode(&notes).unwrap();
        let data = SequenceData::from_ids(&ids, 3);

        assert_eq!(
            data.samples,
            vec![(vec![0, 0, 1], 2), (vec![0, 1, 2], 0), (vec![1, 2, 0], 1)]
        );
        assert!(data.ensure_not_empty().is_ok());
    }

    #[test]
    fn test_batches_cover_all_samples() {
        let ids: Vec<usize> = (0..20).collect();
        let data = SequenceData::from_ids(&ids, 5);
        let batches = data.batches(4);
        assert_eq!(batches.len(), 4);
        assert_eq!(batches[3].0.len(), 3);
        assert_eq!(batches[0].1, vec![5, 6, 7, 8]);
    }

    #[test]
    fn test_normalize_and_one_hot() {
        assert_eq!(normalize(&[0, 1, 3], 4), vec![0.0, 0.25, 0.75]);
        assert_eq!(
            one_hot(&[2, 0], 3),
            vec![0.0, 0.0, 1.0, 1.0, 0.0, 0.0]
        );
    }
}
