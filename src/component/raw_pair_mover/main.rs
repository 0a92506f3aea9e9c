//! RAW 與預覽圖配對移動元件
//!
//! 掃描資料夾，找出同名的 RAW 檔與預覽圖，
//! 確認後將成對的 RAW 檔移動到 `RAW_Files` 子資料夾

use super::pair_matcher::{MoveOutcome, MoverEvent, PairMatcher, PairScan};
use crate::config::Config;
use crate::config::save::{add_recent_path, save_settings};
use crate::tools::validate_directory_exists;
use anyhow::Result;
use console::style;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Select};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// RAW 與預覽圖配對移動元件
pub struct RawPairMover {
    config: Config,
    shutdown_signal: Arc<AtomicBool>,
}

impl RawPairMover {
    pub const fn new(config: Config, shutdown_signal: Arc<AtomicBool>) -> Self {
        Self {
            config,
            shutdown_signal,
        }
    }

    pub fn run(&self) -> Result<()> {
        println!("{}", style("=== RAW 與預覽圖配對移動 ===").cyan().bold());

        // 取得輸入路徑
        let Some(input_path) = self.prompt_input_path()? else {
            return Ok(()); // ESC pressed
        };
        let directory = PathBuf::from(&input_path);

        validate_directory_exists(&directory)?;

        // 更新路徑歷史並儲存
        {
            let mut settings = self.config.settings.clone();
            add_recent_path(&mut settings, &input_path);
            if let Err(e) = save_settings(&settings) {
                warn!("無法儲存路徑歷史: {e}");
            }
        }

        let matcher = PairMatcher::new(&self.config.extension_table);

        // 掃描並配對
        println!("{}", style("掃描檔案中...").dim());
        let scan = matcher.scan_pairs(&directory)?;

        if scan.paired_stems.is_empty() {
            println!("{}", style("找不到成對的 RAW 與預覽檔案").yellow());
            return Ok(());
        }

        // 顯示配對摘要
        self.print_pair_summary(&scan);

        // 確認是否執行
        if !self.confirm_move()? {
            println!("{}", style("操作已取消").yellow());
            return Ok(());
        }

        // 檢查中斷訊號
        if self.shutdown_signal.load(Ordering::SeqCst) {
            warn!("收到中斷訊號，停止處理");
            return Ok(());
        }

        // 移動成對的 RAW 檔
        println!("{}", style("移動 RAW 檔案中...").cyan());
        let outcome = self.execute_move(&matcher, &directory, &scan)?;

        self.print_result(&outcome);

        Ok(())
    }

    fn prompt_input_path(&self) -> Result<Option<String>> {
        let recent_paths = &self.config.settings.recent_paths;

        // 如果沒有歷史路徑，直接輸入
        if recent_paths.is_empty() {
            let path: String = Input::new()
                .with_prompt("請輸入要整理的資料夾路徑")
                .interact_text()?;
            return Ok(Some(path.trim().to_string()));
        }

        // 建立選項清單：歷史路徑 + 輸入新路徑
        let mut options: Vec<String> = recent_paths
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let exists = Path::new(p).exists();
                let indicator = if exists { "✓" } else { "✗" };
                format!("{} [{}] {}", i + 1, indicator, p)
            })
            .collect();
        options.push("輸入新路徑...".to_string());

        println!("{}", style("(按 ESC 返回主選單)").dim());

        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt("請選擇路徑")
            .items(&options)
            .default(0)
            .interact_opt()?;

        match selection {
            None => Ok(None),
            Some(idx) if idx < recent_paths.len() => Ok(Some(recent_paths[idx].clone())),
            Some(_) => {
                let path: String = Input::new()
                    .with_prompt("請輸入要整理的資料夾路徑")
                    .interact_text()?;
                Ok(Some(path.trim().to_string()))
            }
        }
    }

    fn confirm_move(&self) -> Result<bool> {
        let confirm = Confirm::new()
            .with_prompt("確定要移動成對的 RAW 檔案嗎？")
            .default(true)
            .interact()?;
        Ok(confirm)
    }

    fn execute_move(
        &self,
        matcher: &PairMatcher,
        directory: &Path,
        scan: &PairScan,
    ) -> Result<MoveOutcome> {
        let progress_bar = ProgressBar::new(100);
        progress_bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")
                .expect("Invalid progress bar template")
                .progress_chars("#>-"),
        );

        let mut status_line = String::new();
        let outcome = matcher.move_paired_raws(directory, scan, &mut |event| match event {
            MoverEvent::Log(message) => progress_bar.println(message),
            MoverEvent::Progress(percent) => progress_bar.set_position(u64::from(percent)),
            MoverEvent::Status(message) => status_line = message,
            MoverEvent::Finished => progress_bar.finish_and_clear(),
        })?;

        if !status_line.is_empty() {
            println!("{}", style(&status_line).green());
        }

        Ok(outcome)
    }

    fn print_pair_summary(&self, scan: &PairScan) {
        println!();
        println!(
            "{}",
            style(format!(
                "掃描到 {} 個 RAW 檔案，{} 個預覽檔名",
                scan.total_raw_files(),
                scan.preview_stems.len()
            ))
            .green()
        );
        println!();

        println!(
            "{}",
            style(format!(
                "成對的檔案（將移動 RAW） - {} 組，{} 個檔案：",
                scan.paired_stems.len(),
                scan.paired_file_count()
            ))
            .cyan()
        );

        // 只顯示前 10 個
        let display_count = scan.paired_stems.len().min(10);
        for stem in scan.paired_stems.iter().take(display_count) {
            let extensions: Vec<String> = scan
                .raw_index
                .get(stem)
                .map(|files| {
                    files
                        .iter()
                        .filter_map(|f| Path::new(f).extension())
                        .map(|e| e.to_string_lossy().to_string())
                        .collect()
                })
                .unwrap_or_default();
            println!(
                "  {} {} ({})",
                style("✓").green(),
                stem,
                extensions.join(", ")
            );
        }
        if scan.paired_stems.len() > display_count {
            println!(
                "  {} ...還有 {} 組",
                style("⋯").dim(),
                scan.paired_stems.len() - display_count
            );
        }
        println!();

        if scan.unpaired_raw_count() > 0 {
            println!(
                "{}",
                style(format!(
                    "未成對的 RAW 檔案（保留） - {} 個",
                    scan.unpaired_raw_count()
                ))
                .yellow()
            );
            println!();
        }
    }

    fn print_result(&self, outcome: &MoveOutcome) {
        match outcome {
            MoveOutcome::NoPairsFound => {
                println!("{}", style("找不到成對的 RAW 與預覽檔案").yellow());
            }
            MoveOutcome::Completed(report) => {
                println!();
                println!("{}", style("=== 處理結果 ===").cyan().bold());
                println!(
                    "  成功移動: {} 個 RAW 檔案",
                    style(report.moved_count).green()
                );

                if report.skipped > 0 {
                    println!(
                        "  已跳過（目標已存在）: {} 個",
                        style(report.skipped).dim()
                    );
                }

                if !report.failures.is_empty() {
                    println!("  失敗: {} 個", style(report.failures.len()).red());
                    for failure in &report.failures {
                        println!(
                            "    {} {}: {}",
                            style("✗").red(),
                            failure.file_name,
                            failure.reason
                        );
                    }
                }

                println!("  目標資料夾: {}", report.destination.display());

                info!(
                    "配對移動完成 - 移動: {}, 跳過: {}, 失敗: {}",
                    report.moved_count,
                    report.skipped,
                    report.failures.len()
                );
            }
        }
    }
}
