use env_logger::{Builder, Env};

/// 初始化日誌系統
///
/// 預設只輸出警告以上的訊息，避免干擾互動式選單，
/// 可透過 `RUST_LOG` 環境變數調整等級
pub fn init() {
    Builder::from_env(Env::default().default_filter_or("warn"))
        .format_timestamp_secs()
        .init();
}
