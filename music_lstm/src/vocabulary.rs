use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// 音符トークンの語彙
///
/// トークン文字列を辞書順に並べ、その位置をIDとする。
/// 同じコーパスからは必ず同じ対応表ができる。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct NoteVocabulary {
    token_to_id: HashMap<String, usize>,
    id_to_token: Vec<String>,
}

impl NoteVocabulary {
    /// 音符列から語彙を構築
    pub fn from_notes(notes: &[String]) -> Self {
        let sorted: BTreeSet<&String> = notes.iter().collect();
        Self::from_sorted(sorted.into_iter().cloned().collect())
    }

    fn from_sorted(id_to_token: Vec<String>) -> Self {
        let token_to_id = id_to_token
            .iter()
            .enumerate()
            .map(|(id, token)| (token.clone(), id))
            .collect();

        NoteVocabulary {
            token_to_id,
            id_to_token,
        }
    }

    pub fn vocab_size(&self) -> usize {
        self.id_to_token.len()
    }

    pub fn id_of(&self, token: &str) -> Option<usize> {
        self.token_to_id.get(token).copied()
    }

    /// IDをトークンに変換（範囲外はNone）
    pub fn token_of(&self, id: usize) -> Option<&str> {
        self.id_to_token.get(id).map(|s| s.as_str())
    }

    pub fn tokens(&self) -> &[String] {
        &self.id_to_token
    }

    /// 音符列をID列に変換
    ///
    /// 語彙に無いトークンがあれば、その一覧をErrで返す。
    pub fn encode(&self, notes: &[String]) -> Result<Vec<usize>, Vec<String>> {
        let mut ids = Vec::with_capacity(notes.len());
        let mut unknown = BTreeSet::new();

        for note in notes {
            match self.id_of(note) {
                Some(id) => ids.push(id),
                None => {
                    unknown.insert(note.clone());
                }
            }
        }

        if unknown.is_empty() {
            Ok(ids)
        } else {
            Err(unknown.into_iter().collect())
        }
    }

    /// ID列をトークン列に変換（範囲外のIDは無視）
    pub fn decode(&self, ids: &[usize]) -> Vec<String> {
        ids.iter()
            .filter_map(|&id| self.token_of(id).map(|s| s.to_string()))
            .collect()
    }
}

impl From<Vec<String>> for NoteVocabulary {
    fn from(tokens: Vec<String>) -> Self {
        // 保存済みの並びをそのまま使う
        Self::from_sorted(tokens)
    }
}

impl From<NoteVocabulary> for Vec<String> {
    fn from(vocab: NoteVocabulary) -> Self {
        vocab.id_to_token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notes(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_vocabulary_is_alphabetical() {
        let vocab = NoteVocabulary::from_notes(&notes(&["A4", "A4", "B4", "C5", "A4", "B4"]));
        assert_eq!(vocab.vocab_size(), 3);
        assert_eq!(vocab.id_of("A4"), Some(0));
        assert_eq!(vocab.id_of("B4"), Some(1));
        assert_eq!(vocab.id_of("C5"), Some(2));
    }

    #[test]
    fn test_vocabulary_is_bijective() {
        let corpus = notes(&["E-4", "0.4.7", "C#3", "9.0.4", "G4", "0.4.7", "E-4"]);
        let vocab = NoteVocabulary::from_notes(&corpus);

        for token in &corpus {
            let id = vocab.id_of(token).unwrap();
            assert_eq!(vocab.token_of(id), Some(token.as_str()));
        }
        for id in 0..vocab.vocab_size() {
            let token = vocab.token_of(id).unwrap();
            assert_eq!(vocab.id_of(token), Some(id));
        }
        assert_eq!(vocab.token_of(vocab.vocab_size()), None);
    }

    #[test]
    fn test_encode_reports_unknown_tokens() {
        let vocab = NoteVocabulary::from_notes(&notes(&["A4", "B4"]));
        assert_eq!(vocab.encode(&notes(&["B4", "A4"])), Ok(vec![1, 0]));
        assert_eq!(
            vocab.encode(&notes(&["A4", "D4", "C4", "D4"])),
            Err(notes(&["C4", "D4"]))
        );
    }

    #[test]
    fn test_decode_skips_out_of_range() {
        let vocab = NoteVocabulary::from_notes(&notes(&["A4", "B4"]));
        assert_eq!(vocab.decode(&[1, 7, 0]), notes(&["B4", "A4"]));
    }

    #[test]
    fn test_serde_keeps_order() {
        let vocab = NoteVocabulary::from_notes(&notes(&["C5", "A4", "B4"]));
        let json = serde_json::to_string(&vocab).unwrap();
        assert_eq!(json, r#"["A4","B4","C5"]"#);
        let restored: NoteVocabulary = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, vocab);
    }
}
