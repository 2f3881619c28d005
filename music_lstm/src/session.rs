use crate::config::{FILES_PER_PAGE, REQUIRED_SELECTIONS};
use crate::error::{MusicError, Result};
use std::path::{Path, PathBuf};

/// Webフロントエンドの利用者ごとの状態
///
/// 表示位置・選択ファイル・ログ・直近の生成結果をまとめて持ち、
/// リクエストハンドラに明示的に渡す。
#[derive(Debug, Default)]
pub struct Session {
    start_index: usize,
    selected: Vec<PathBuf>,
    log: Vec<String>,
    last_output: Option<Vec<u8>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_index(&self) -> usize {
        self.start_index
    }

    /// 現在のページに表示するファイル
    pub fn page<'a>(&self, files: &'a [PathBuf]) -> &'a [PathBuf] {
        let start = self.start_index.min(files.len());
        let end = (start + FILES_PER_PAGE).min(files.len());
        &files[start..end]
    }

    /// 次のページへ（最後のページでは進まない）
    pub fn show_more(&mut self, total: usize) {
        if self.start_index + FILES_PER_PAGE < total {
            self.start_index += FILES_PER_PAGE;
        }
    }

    /// 選択を切り替える
    pub fn toggle(&mut self, path: &Path) {
        if let Some(pos) = self.selected.iter().position(|p| p == path) {
            self.selected.remove(pos);
        } else {
            self.selected.push(path.to_path_buf());
        }
    }

    pub fn is_selected(&self, path: &Path) -> bool {
        self.selected.iter().any(|p| p == path)
    }

    pub fn selected(&self) -> &[PathBuf] {
        &self.selected
    }

    /// 生成に使うファイル（ちょうど3件でなければエラー）
    pub fn selection_for_generation(&self) -> Result<Vec<PathBuf>> {
        if self.selected.len() != REQUIRED_SELECTIONS {
            return Err(MusicError::Selection {
                required: REQUIRED_SELECTIONS,
                selected: self.selected.len(),
            });
        }
        Ok(self.selected.clone())
    }

    pub fn record(&mut self, message: impl Into<String>) {
        self.log.push(message.into());
    }

    pub fn log(&self) -> &[String] {
        &self.log
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    pub fn set_output(&mut self, midi: Vec<u8>) {
        self.last_output = Some(midi);
    }

    pub fn last_output(&self) -> Option<&[u8]> {
        self.last_output.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(n: usize) -> Vec<PathBuf> {
        (0..n).map(|i| PathBuf::from(format!("song{:02}.mid", i))).collect()
    }

    #[test]
    fn test_paging_advances_by_ten() {
        let files = files(25);
        let mut session = Session::new();
        assert_eq!(session.page(&files).len(), 10);
        assert_eq!(session.page(&files)[0], files[0]);

        session.show_more(files.len());
        assert_eq!(session.page(&files)[0], files[10]);

        session.show_more(files.len());
        assert_eq!(session.page(&files).len(), 5);

        // 最終ページから先へは進まない
        session.show_more(files.len());
        assert_eq!(session.start_index(), 20);
    }

    #[test]
    fn test_sessions_are_independent() {
        let files = files(25);
        let mut first = Session::new();
        let second = Session::new();
        first.show_more(files.len());
        assert_eq!(first.start_index(), 10);
        assert_eq!(second.start_index(), 0);
    }

    #[test]
    fn test_generation_needs_exactly_three() {
        let files = files(5);
        let mut session = Session::new();
        session.toggle(&files[0]);
        session.toggle(&files[1]);
        assert!(matches!(
            session.selection_for_generation(),
            Err(MusicError::Selection { required: 3, selected: 2 })
        ));

        session.toggle(&files[2]);
        assert_eq!(
            session.selection_for_generation().unwrap(),
            files[0..3].to_vec()
        );

        session.toggle(&files[3]);
        assert!(session.selection_for_generation().is_err());

        // もう一度押すと選択解除
        session.toggle(&files[3]);
        assert!(!session.is_selected(&files[3]));
        assert!(session.selection_for_generation().is_ok());
    }
}
