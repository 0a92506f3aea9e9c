//! 配對比對器
//!
//! 掃描資料夾，找出同名的 RAW 檔與預覽圖（JPG/PNG），
//! 並將成對的 RAW 檔移動到 `RAW_Files` 子資料夾

use crate::config::ExtensionTable;
use anyhow::{Context, Result as AnyhowResult};
use log::{debug, info, warn};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 成對 RAW 檔的目標資料夾名稱
pub const RAW_FILES_FOLDER: &str = "RAW_Files";

/// 移動過程中發出的事件，由呼叫端逐一接收
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoverEvent {
    /// 一般訊息（逐檔記錄）
    Log(String),
    /// 進度百分比（0..=100），每處理一個檔案發出一次
    Progress(u8),
    /// 最終狀態訊息
    Status(String),
    /// 處理結束
    Finished,
}

/// 致命錯誤：發生時整批操作立即停止，不留下部分結果
#[derive(Debug, Error)]
pub enum MoveError {
    #[error("未提供資料夾路徑")]
    EmptyPath,
    #[error("找不到資料夾或無法讀取: {path}")]
    FolderNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("無法建立目標資料夾: {path}")]
    CreateDestination {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// 單一檔案移動失敗的紀錄（不會中斷整批操作）
#[derive(Debug, Clone)]
pub struct MoveFailure {
    pub file_name: String,
    pub reason: String,
}

/// 移動結果摘要
#[derive(Debug, Clone)]
pub struct MoveReport {
    /// 成功移動的 RAW 檔數量
    pub moved_count: usize,
    /// 跳過的檔案數（目標已存在）
    pub skipped: usize,
    /// 目標資料夾路徑
    pub destination: PathBuf,
    /// 逐檔失敗紀錄
    pub failures: Vec<MoveFailure>,
}

/// 移動操作的終點狀態
#[derive(Debug)]
pub enum MoveOutcome {
    /// 沒有任何成對檔案，未建立資料夾、未移動檔案
    NoPairsFound,
    Completed(MoveReport),
}

/// 單次掃描的快照，每次操作重新建立
#[derive(Debug, Clone, Default)]
pub struct PairScan {
    /// 小寫檔名（不含副檔名）→ 該名稱的 RAW 檔案列表（已排序）
    pub raw_index: BTreeMap<String, Vec<String>>,
    /// 預覽檔的小寫檔名集合
    pub preview_stems: BTreeSet<String>,
    /// 同時有 RAW 與預覽檔的名稱
    pub paired_stems: BTreeSet<String>,
}

impl PairScan {
    /// 掃描到的 RAW 檔總數
    #[must_use]
    pub fn total_raw_files(&self) -> usize {
        self.raw_index.values().map(Vec::len).sum()
    }

    /// 將被移動的 RAW 檔數量（成對名稱的所有變體）
    #[must_use]
    pub fn paired_file_count(&self) -> usize {
        self.paired_stems
            .iter()
            .filter_map(|stem| self.raw_index.get(stem))
            .map(Vec::len)
            .sum()
    }

    /// 沒有對應預覽圖的 RAW 檔數量（保留不動）
    #[must_use]
    pub fn unpaired_raw_count(&self) -> usize {
        self.total_raw_files() - self.paired_file_count()
    }
}

/// 配對比對器
///
/// 副檔名集合於建立時從設定載入一次，之後不再變動
pub struct PairMatcher {
    raw_extensions: HashSet<String>,
    preview_extensions: HashSet<String>,
}

impl PairMatcher {
    #[must_use]
    pub fn new(extension_table: &ExtensionTable) -> Self {
        Self {
            raw_extensions: extension_table.raw_extensions_set(),
            preview_extensions: extension_table.preview_extensions_set(),
        }
    }

    /// 掃描資料夾（單層，不遞迴），建立配對快照
    pub fn scan_pairs(&self, folder_path: &Path) -> Result<PairScan, MoveError> {
        if folder_path.as_os_str().is_empty() {
            return Err(MoveError::EmptyPath);
        }

        info!("開始掃描目錄: {}", folder_path.display());

        let entries = fs::read_dir(folder_path).map_err(|source| MoveError::FolderNotFound {
            path: folder_path.to_path_buf(),
            source,
        })?;

        let mut scan = PairScan::default();

        for entry in entries {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("讀取目錄項目失敗: {e}");
                    continue;
                }
            };

            // 跳過子資料夾（包含既有的目標資料夾）
            if entry.path().is_dir() {
                continue;
            }

            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                warn!("跳過非 UTF-8 檔名: {}", entry.path().display());
                continue;
            };

            // 跳過隱藏檔案
            if file_name.starts_with('.') {
                continue;
            }

            let name_path = Path::new(file_name);
            let Some(stem) = name_path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Some(extension) = name_path.extension().and_then(|e| e.to_str()) else {
                continue;
            };

            let stem = stem.to_lowercase();
            let extension = format!(".{}", extension.to_lowercase());

            if self.raw_extensions.contains(&extension) {
                scan.raw_index
                    .entry(stem)
                    .or_default()
                    .push(file_name.to_string());
            } else if self.preview_extensions.contains(&extension) {
                scan.preview_stems.insert(stem);
            }
        }

        // 同一名稱的變體排序，確保單次執行內的順序固定
        for variants in scan.raw_index.values_mut() {
            variants.sort();
        }

        scan.paired_stems = scan
            .raw_index
            .keys()
            .filter(|stem| scan.preview_stems.contains(*stem))
            .cloned()
            .collect();

        info!(
            "掃描完成 - RAW: {}, 預覽: {}, 成對: {}",
            scan.total_raw_files(),
            scan.preview_stems.len(),
            scan.paired_stems.len()
        );

        Ok(scan)
    }

    /// 一次完成掃描與移動
    ///
    /// 事件依序送入 `on_event`；致命錯誤（路徑為空、資料夾不存在）
    /// 在碰到任何檔案之前就回傳，不留下部分結果
    pub fn move_raws_for_paired_files(
        &self,
        folder_path: &Path,
        on_event: &mut dyn FnMut(MoverEvent),
    ) -> Result<MoveOutcome, MoveError> {
        if folder_path.as_os_str().is_empty() {
            return Err(MoveError::EmptyPath);
        }

        let scan = self.scan_pairs(folder_path)?;
        self.move_paired_raws(folder_path, &scan, on_event)
    }

    /// 依既有快照移動成對的 RAW 檔
    ///
    /// 逐檔移動，單一檔案失敗不會中斷整批；每處理一個檔案
    /// 發出一次進度事件，最後一個檔案處理完時進度恰為 100
    pub fn move_paired_raws(
        &self,
        folder_path: &Path,
        scan: &PairScan,
        on_event: &mut dyn FnMut(MoverEvent),
    ) -> Result<MoveOutcome, MoveError> {
        if folder_path.as_os_str().is_empty() {
            return Err(MoveError::EmptyPath);
        }

        on_event(MoverEvent::Log("開始移動 RAW 檔案...".to_string()));

        if scan.paired_stems.is_empty() {
            on_event(MoverEvent::Log("找不到成對的 RAW 與預覽檔案".to_string()));
            on_event(MoverEvent::Status("找不到成對的 RAW 與預覽檔案".to_string()));
            on_event(MoverEvent::Finished);
            return Ok(MoveOutcome::NoPairsFound);
        }

        let destination = folder_path.join(RAW_FILES_FOLDER);
        if !destination.exists() {
            fs::create_dir_all(&destination).map_err(|source| MoveError::CreateDestination {
                path: destination.clone(),
                source,
            })?;
            on_event(MoverEvent::Log(format!(
                "已建立資料夾: {}",
                destination.display()
            )));
        }

        let total = scan.paired_file_count();
        let mut processed = 0usize;
        let mut report = MoveReport {
            moved_count: 0,
            skipped: 0,
            destination: destination.clone(),
            failures: Vec::new(),
        };

        for stem in &scan.paired_stems {
            let Some(file_names) = scan.raw_index.get(stem) else {
                continue;
            };

            if file_names.len() > 1 {
                on_event(MoverEvent::Log(format!(
                    "{stem} 有 {} 個 RAW 變體，將全部移動",
                    file_names.len()
                )));
            }

            for file_name in file_names {
                let source_path = folder_path.join(file_name);
                let target_path = destination.join(file_name);

                if target_path.exists() {
                    debug!("跳過已存在的檔案: {}", target_path.display());
                    on_event(MoverEvent::Log(format!("跳過已存在的檔案: {file_name}")));
                    report.skipped += 1;
                } else {
                    match fs::rename(&source_path, &target_path) {
                        Ok(()) => {
                            debug!(
                                "移動檔案: {} -> {}",
                                source_path.display(),
                                target_path.display()
                            );
                            on_event(MoverEvent::Log(format!("已移動: {file_name}")));
                            report.moved_count += 1;
                        }
                        Err(e) => {
                            // 嘗試複製後刪除（跨檔案系統）
                            if let Err(copy_err) = Self::copy_and_delete(&source_path, &target_path)
                            {
                                let reason = format!("{copy_err:#} (原始錯誤: {e})");
                                warn!("移動檔案失敗 {}: {reason}", source_path.display());
                                on_event(MoverEvent::Log(format!(
                                    "移動 {file_name} 失敗: {reason}"
                                )));
                                report.failures.push(MoveFailure {
                                    file_name: file_name.clone(),
                                    reason,
                                });
                            } else {
                                on_event(MoverEvent::Log(format!("已移動: {file_name}")));
                                report.moved_count += 1;
                            }
                        }
                    }
                }

                processed += 1;
                on_event(MoverEvent::Progress((processed * 100 / total) as u8));
            }
        }

        on_event(MoverEvent::Status(format!(
            "已移動 {} 個 RAW 檔案到 '{}'",
            report.moved_count,
            destination.display()
        )));
        on_event(MoverEvent::Finished);

        Ok(MoveOutcome::Completed(report))
    }

    /// 複製檔案後刪除原檔案
    fn copy_and_delete(source: &Path, target: &Path) -> AnyhowResult<()> {
        fs::copy(source, target).with_context(|| {
            format!("複製檔案失敗: {} -> {}", source.display(), target.display())
        })?;

        fs::remove_file(source).with_context(|| format!("刪除原檔案失敗: {}", source.display()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_table() -> ExtensionTable {
        ExtensionTable {
            raw_file: vec![
                ".nef".to_string(),
                ".cr2".to_string(),
                ".arw".to_string(),
                ".dng".to_string(),
            ],
            preview_file: vec![".jpg".to_string(), ".jpeg".to_string(), ".png".to_string()],
        }
    }

    fn create_matcher() -> PairMatcher {
        PairMatcher::new(&test_table())
    }

    fn progress_values(events: &[MoverEvent]) -> Vec<u8> {
        events
            .iter()
            .filter_map(|e| match e {
                MoverEvent::Progress(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    fn moved_log_entries(events: &[MoverEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                MoverEvent::Log(m) => m.strip_prefix("已移動: ").map(str::to_string),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_scan_pairs_builds_index() {
        let temp_dir = TempDir::new().unwrap();
        let base_path = temp_dir.path();

        fs::write(base_path.join("a.nef"), "raw").unwrap();
        fs::write(base_path.join("a.jpg"), "preview").unwrap();
        fs::write(base_path.join("b.cr2"), "raw").unwrap();
        fs::write(base_path.join("c.jpg"), "preview").unwrap();
        fs::write(base_path.join("notes.txt"), "other").unwrap();

        let matcher = create_matcher();
        let scan = matcher.scan_pairs(base_path).unwrap();

        assert_eq!(scan.total_raw_files(), 2);
        assert_eq!(scan.preview_stems.len(), 2);
        assert_eq!(scan.paired_stems.len(), 1);
        assert!(scan.paired_stems.contains("a"));
        assert_eq!(scan.unpaired_raw_count(), 1);
    }

    #[test]
    fn test_move_paired_raws_basic() {
        let temp_dir = TempDir::new().unwrap();
        let base_path = temp_dir.path();

        // 成對的檔案
        fs::write(base_path.join("a.nef"), "raw a").unwrap();
        fs::write(base_path.join("a.jpg"), "preview a").unwrap();
        fs::write(base_path.join("b.cr2"), "raw b").unwrap();
        fs::write(base_path.join("b.png"), "preview b").unwrap();
        // 未成對的檔案
        fs::write(base_path.join("c.arw"), "raw alone").unwrap();
        fs::write(base_path.join("d.jpg"), "preview alone").unwrap();

        let matcher = create_matcher();
        let outcome = matcher
            .move_raws_for_paired_files(base_path, &mut |_| {})
            .unwrap();

        let MoveOutcome::Completed(report) = outcome else {
            panic!("應該回報完成結果");
        };
        assert_eq!(report.moved_count, 2);
        assert_eq!(report.skipped, 0);
        assert!(report.failures.is_empty());
        assert_eq!(report.destination, base_path.join(RAW_FILES_FOLDER));

        // 成對的 RAW 已移動
        assert!(base_path.join("RAW_Files/a.nef").exists());
        assert!(base_path.join("RAW_Files/b.cr2").exists());
        assert!(!base_path.join("a.nef").exists());
        assert!(!base_path.join("b.cr2").exists());

        // 預覽檔與未成對的 RAW 保持原位
        assert!(base_path.join("a.jpg").exists());
        assert!(base_path.join("b.png").exists());
        assert!(base_path.join("c.arw").exists());
        assert!(base_path.join("d.jpg").exists());
    }

    #[test]
    fn test_case_insensitive_pairing() {
        let temp_dir = TempDir::new().unwrap();
        let base_path = temp_dir.path();

        fs::write(base_path.join("a.CR2"), "raw").unwrap();
        fs::write(base_path.join("A.JPG"), "preview").unwrap();

        let matcher = create_matcher();
        let outcome = matcher
            .move_raws_for_paired_files(base_path, &mut |_| {})
            .unwrap();

        let MoveOutcome::Completed(report) = outcome else {
            panic!("應該回報完成結果");
        };
        assert_eq!(report.moved_count, 1);

        // 原始檔名保持不變
        assert!(base_path.join("RAW_Files/a.CR2").exists());
        assert!(!base_path.join("a.CR2").exists());
        assert!(base_path.join("A.JPG").exists());
    }

    #[test]
    fn test_empty_directory_reports_no_pairs() {
        let temp_dir = TempDir::new().unwrap();
        let base_path = temp_dir.path();

        let matcher = create_matcher();
        let mut events = Vec::new();
        let outcome = matcher
            .move_raws_for_paired_files(base_path, &mut |e| events.push(e))
            .unwrap();

        assert!(matches!(outcome, MoveOutcome::NoPairsFound));
        // 沒有成對檔案時不建立資料夾
        assert!(!base_path.join(RAW_FILES_FOLDER).exists());
        // 沒有進度事件，但仍通知結束
        assert!(progress_values(&events).is_empty());
        assert!(events.contains(&MoverEvent::Finished));
    }

    #[test]
    fn test_unmatched_files_report_no_pairs() {
        let temp_dir = TempDir::new().unwrap();
        let base_path = temp_dir.path();

        fs::write(base_path.join("c.arw"), "raw alone").unwrap();
        fs::write(base_path.join("d.jpg"), "preview alone").unwrap();

        let matcher = create_matcher();
        let outcome = matcher
            .move_raws_for_paired_files(base_path, &mut |_| {})
            .unwrap();

        assert!(matches!(outcome, MoveOutcome::NoPairsFound));
        assert!(!base_path.join(RAW_FILES_FOLDER).exists());
        assert!(base_path.join("c.arw").exists());
        assert!(base_path.join("d.jpg").exists());
    }

    #[test]
    fn test_second_run_reports_no_pairs() {
        let temp_dir = TempDir::new().unwrap();
        let base_path = temp_dir.path();

        fs::write(base_path.join("a.nef"), "raw").unwrap();
        fs::write(base_path.join("a.jpg"), "preview").unwrap();

        let matcher = create_matcher();
        let first = matcher
            .move_raws_for_paired_files(base_path, &mut |_| {})
            .unwrap();
        assert!(matches!(first, MoveOutcome::Completed(_)));

        // 第二次執行：RAW 已移走，不再有成對檔案
        let second = matcher
            .move_raws_for_paired_files(base_path, &mut |_| {})
            .unwrap();
        assert!(matches!(second, MoveOutcome::NoPairsFound));
        assert!(base_path.join("RAW_Files/a.nef").exists());
    }

    #[test]
    fn test_progress_sequence() {
        let temp_dir = TempDir::new().unwrap();
        let base_path = temp_dir.path();

        for stem in ["a", "b", "c"] {
            fs::write(base_path.join(format!("{stem}.nef")), "raw").unwrap();
            fs::write(base_path.join(format!("{stem}.jpg")), "preview").unwrap();
        }

        let matcher = create_matcher();
        let mut events = Vec::new();
        matcher
            .move_raws_for_paired_files(base_path, &mut |e| events.push(e))
            .unwrap();

        // 每個檔案恰發出一次進度，遞增且最後恰為 100
        let progress = progress_values(&events);
        assert_eq!(progress, vec![33, 66, 100]);
    }

    #[test]
    fn test_empty_path_is_fatal() {
        let matcher = create_matcher();
        let mut events = Vec::new();
        let result = matcher.move_raws_for_paired_files(Path::new(""), &mut |e| events.push(e));

        assert!(matches!(result, Err(MoveError::EmptyPath)));
        assert!(events.is_empty());
    }

    #[test]
    fn test_missing_folder_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing");

        let matcher = create_matcher();
        let mut events = Vec::new();
        let result = matcher.move_raws_for_paired_files(&missing, &mut |e| events.push(e));

        assert!(matches!(result, Err(MoveError::FolderNotFound { .. })));
        // 沒有任何檔案系統變動
        assert!(!missing.exists());
        assert!(events.is_empty());
    }

    #[test]
    fn test_failure_does_not_abort_batch() {
        let temp_dir = TempDir::new().unwrap();
        let base_path = temp_dir.path();

        for stem in ["a", "b", "c"] {
            fs::write(base_path.join(format!("{stem}.nef")), "raw").unwrap();
            fs::write(base_path.join(format!("{stem}.jpg")), "preview").unwrap();
        }

        let matcher = create_matcher();
        let scan = matcher.scan_pairs(base_path).unwrap();

        // 模擬檔案在快照後消失
        fs::remove_file(base_path.join("b.nef")).unwrap();

        let mut events = Vec::new();
        let outcome = matcher
            .move_paired_raws(base_path, &scan, &mut |e| events.push(e))
            .unwrap();

        let MoveOutcome::Completed(report) = outcome else {
            panic!("應該回報完成結果");
        };
        assert_eq!(report.moved_count, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].file_name, "b.nef");

        assert!(base_path.join("RAW_Files/a.nef").exists());
        assert!(base_path.join("RAW_Files/c.nef").exists());

        // 失敗的檔案也算進進度，最後仍到 100
        let progress = progress_values(&events);
        assert_eq!(progress.len(), 3);
        assert_eq!(*progress.last().unwrap(), 100);
    }

    #[test]
    fn test_multiple_raw_variants_all_moved() {
        let temp_dir = TempDir::new().unwrap();
        let base_path = temp_dir.path();

        fs::write(base_path.join("a.cr2"), "raw cr2").unwrap();
        fs::write(base_path.join("a.dng"), "raw dng").unwrap();
        fs::write(base_path.join("a.jpg"), "preview").unwrap();

        let matcher = create_matcher();
        let mut events = Vec::new();
        let outcome = matcher
            .move_raws_for_paired_files(base_path, &mut |e| events.push(e))
            .unwrap();

        let MoveOutcome::Completed(report) = outcome else {
            panic!("應該回報完成結果");
        };
        assert_eq!(report.moved_count, 2);
        assert!(base_path.join("RAW_Files/a.cr2").exists());
        assert!(base_path.join("RAW_Files/a.dng").exists());

        // 兩個變體各有一次進度
        assert_eq!(progress_values(&events), vec![50, 100]);
    }

    #[test]
    fn test_existing_target_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let base_path = temp_dir.path();

        fs::create_dir_all(base_path.join(RAW_FILES_FOLDER)).unwrap();
        fs::write(base_path.join("RAW_Files/a.nef"), "old").unwrap();
        fs::write(base_path.join("a.nef"), "new").unwrap();
        fs::write(base_path.join("a.jpg"), "preview").unwrap();

        let matcher = create_matcher();
        let outcome = matcher
            .move_raws_for_paired_files(base_path, &mut |_| {})
            .unwrap();

        let MoveOutcome::Completed(report) = outcome else {
            panic!("應該回報完成結果");
        };
        assert_eq!(report.moved_count, 0);
        assert_eq!(report.skipped, 1);

        // 不覆寫既有檔案，原檔保持原位
        assert_eq!(fs::read_to_string(base_path.join("RAW_Files/a.nef")).unwrap(), "old");
        assert_eq!(fs::read_to_string(base_path.join("a.nef")).unwrap(), "new");
    }

    #[test]
    fn test_move_order_is_sorted() {
        let temp_dir = TempDir::new().unwrap();
        let base_path = temp_dir.path();

        for stem in ["c", "a", "b"] {
            fs::write(base_path.join(format!("{stem}.nef")), "raw").unwrap();
            fs::write(base_path.join(format!("{stem}.jpg")), "preview").unwrap();
        }

        let matcher = create_matcher();
        let mut events = Vec::new();
        matcher
            .move_raws_for_paired_files(base_path, &mut |e| events.push(e))
            .unwrap();

        assert_eq!(moved_log_entries(&events), vec!["a.nef", "b.nef", "c.nef"]);
    }

    #[test]
    fn test_hidden_files_are_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let base_path = temp_dir.path();

        fs::write(base_path.join(".hidden.nef"), "raw").unwrap();
        fs::write(base_path.join(".hidden.jpg"), "preview").unwrap();
        fs::write(base_path.join(".DS_Store"), "macos").unwrap();

        let matcher = create_matcher();
        let outcome = matcher
            .move_raws_for_paired_files(base_path, &mut |_| {})
            .unwrap();

        assert!(matches!(outcome, MoveOutcome::NoPairsFound));
        assert!(base_path.join(".hidden.nef").exists());
    }
}
