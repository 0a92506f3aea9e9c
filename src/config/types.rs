use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

/// 路徑歷史保留上限
pub const MAX_RECENT_PATHS: usize = 5;

/// 副檔名對照表
///
/// 定義哪些副檔名屬於 RAW 檔、哪些屬於預覽圖（含前導點、小寫）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtensionTable {
    #[serde(rename = "RAW_FILE")]
    pub raw_file: Vec<String>,
    #[serde(rename = "PREVIEW_FILE")]
    pub preview_file: Vec<String>,
}

impl ExtensionTable {
    #[must_use]
    pub fn raw_extensions_set(&self) -> HashSet<String> {
        self.raw_file.iter().map(|ext| ext.to_lowercase()).collect()
    }

    #[must_use]
    pub fn preview_extensions_set(&self) -> HashSet<String> {
        self.preview_file
            .iter()
            .map(|ext| ext.to_lowercase())
            .collect()
    }

    #[must_use]
    pub fn is_raw_file(&self, path: &Path) -> bool {
        let raw_extensions = self.raw_extensions_set();
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| raw_extensions.contains(&format!(".{}", ext.to_lowercase())))
    }

    #[must_use]
    pub fn is_preview_file(&self, path: &Path) -> bool {
        let preview_extensions = self.preview_extensions_set();
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| preview_extensions.contains(&format!(".{}", ext.to_lowercase())))
    }
}

/// 介面語言
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Language {
    #[default]
    #[serde(rename = "en-US")]
    EnUs,
    #[serde(rename = "zh-TW")]
    ZhTw,
}

impl Language {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EnUs => "en-US",
            Self::ZhTw => "zh-TW",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::EnUs => "English",
            Self::ZhTw => "繁體中文",
        };
        write!(f, "{name}")
    }
}

/// 使用者設定（儲存於 settings.json）
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserSettings {
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub recent_paths: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub extension_table: ExtensionTable,
    pub settings: UserSettings,
}
