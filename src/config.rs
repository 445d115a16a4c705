//! 設定ファイル管理モジュール
//!
//! エミュレータの設定をJSON形式で永続化

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::apple2::{DEFAULT_POLL_INTERVAL, DEFAULT_REDRAW_INTERVAL};
use crate::nibble::DEFAULT_VOLUME;

/// 設定ファイルのデフォルトファイル名
pub const CONFIG_FILENAME: &str = "a2e_config.json";

/// 実行ファイルのディレクトリを取得
pub fn get_exe_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// ファイルパスを解決
///
/// そのまま存在すればそれを使い、相対パスで見つからなければ
/// 実行ファイルのディレクトリを探す。
pub fn resolve_path(relative: &str) -> PathBuf {
    let path = Path::new(relative);
    if path.is_absolute() || path.exists() {
        return path.to_path_buf();
    }
    let beside_exe = get_exe_dir().join(relative);
    if beside_exe.exists() {
        beside_exe
    } else {
        path.to_path_buf()
    }
}

/// 16進アドレスを解析（`$C600`、`0xC600`、`C600`のいずれも可）
pub fn parse_hex_address(text: &str) -> Result<u16, String> {
    let trimmed = text.trim();
    let digits = trimmed
        .strip_prefix('$')
        .or_else(|| trimmed.strip_prefix("0x"))
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    u16::from_str_radix(digits, 16).map_err(|e| format!("Invalid address '{}': {}", text, e))
}

/// エミュレータ設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// ROMイメージのパス
    #[serde(default = "default_rom_path")]
    pub rom_path: String,
    /// ドライブ1のディスクイメージ
    #[serde(default)]
    pub disk1: Option<String>,
    /// ドライブ2のディスクイメージ
    #[serde(default)]
    pub disk2: Option<String>,
    /// PCブレークポイント（16進文字列）
    #[serde(default)]
    pub breakpoints: Vec<String>,
    /// 命令トレース
    #[serde(default)]
    pub trace: bool,
    /// 実行サイクル数の上限（Noneなら無制限）
    #[serde(default)]
    pub max_cycles: Option<u64>,
    /// 再描画の間隔（サイクル）
    #[serde(default = "default_redraw_interval")]
    pub redraw_interval: u64,
    /// ポーリングの間隔（サイクル）
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
    /// ディスクのボリューム番号
    #[serde(default = "default_volume")]
    pub volume: u8,
    /// ディスクログの種類（"flow,state" など）
    #[serde(default)]
    pub disk_log: Option<String>,
}

fn default_rom_path() -> String { "APPLE2E.ROM".to_string() }
fn default_redraw_interval() -> u64 { DEFAULT_REDRAW_INTERVAL }
fn default_poll_interval() -> u64 { DEFAULT_POLL_INTERVAL }
fn default_volume() -> u8 { DEFAULT_VOLUME }

impl Default for Config {
    fn default() -> Self {
        Config {
            rom_path: default_rom_path(),
            disk1: None,
            disk2: None,
            breakpoints: Vec::new(),
            trace: false,
            max_cycles: None,
            redraw_interval: default_redraw_interval(),
            poll_interval: default_poll_interval(),
            volume: default_volume(),
            disk_log: None,
        }
    }
}

impl Config {
    /// 指定したパスから設定を読み込む（読めなければデフォルト）
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    log::warn!("Failed to parse config {:?}: {}, using defaults", path.as_ref(), e);
                    Config::default()
                }
            },
            Err(_) => Config::default(),
        }
    }

    /// 指定したパスに設定を保存する
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), String> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;
        fs::write(path, json)
            .map_err(|e| format!("Failed to write config: {}", e))?;
        Ok(())
    }

    /// ブレークポイントを数値に変換
    pub fn breakpoint_addresses(&self) -> Result<Vec<u16>, String> {
        self.breakpoints.iter().map(|bp| parse_hex_address(bp)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.rom_path, "APPLE2E.ROM");
        assert_eq!(config.redraw_interval, 17050 * 10);
        assert_eq!(config.poll_interval, 100);
        assert_eq!(config.volume, 0xFE);
        assert!(config.disk1.is_none());
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: Config = serde_json::from_str(r#"{"disk1": "dos33.dsk", "trace": true}"#).unwrap();
        assert_eq!(config.disk1.as_deref(), Some("dos33.dsk"));
        assert!(config.trace);
        assert_eq!(config.rom_path, "APPLE2E.ROM");
        assert_eq!(config.poll_interval, 100);
    }

    #[test]
    fn test_parse_hex_address() {
        assert_eq!(parse_hex_address("$C600"), Ok(0xC600));
        assert_eq!(parse_hex_address("0xfa62"), Ok(0xFA62));
        assert_eq!(parse_hex_address(" 300 "), Ok(0x0300));
        assert!(parse_hex_address("G00").is_err());
        assert!(parse_hex_address("12345").is_err());
    }

    #[test]
    fn test_breakpoint_addresses() {
        let config = Config {
            breakpoints: vec!["$C600".to_string(), "0801".to_string()],
            ..Config::default()
        };
        assert_eq!(config.breakpoint_addresses(), Ok(vec![0xC600, 0x0801]));
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("a2e_config_test_{}.json", std::process::id()));
        let config = Config {
            disk2: Some("work.dsk".to_string()),
            max_cycles: Some(1_000_000),
            disk_log: Some("flow".to_string()),
            ..Config::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path), config);
        let _ = fs::remove_file(&path);

        // 存在しないファイルはデフォルト
        assert_eq!(Config::load_from(path.with_extension("missing")), Config::default());
    }
}
