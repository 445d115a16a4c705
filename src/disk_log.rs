//! Disk II ログシステム
//!
//! 原則:
//! 1. 状態遷移のみ記録（毎回のI/Oは記録しない）
//! 2. レベル分離: FLOW / STATE / NIBBLE

use std::sync::atomic::{AtomicU32, Ordering};

bitflags::bitflags! {
    /// ログカテゴリ
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct DiskLogLevel: u32 {
        /// L1: 何が起きているか（人間向け）
        const FLOW   = 0b0001;
        /// L2: 状態遷移（開発者向け）
        const STATE  = 0b0010;
        /// L3: 生データ（短時間のみ）
        const NIBBLE = 0b0100;
    }
}

impl DiskLogLevel {
    /// "flow,state" 形式の文字列を解析
    pub fn parse(list: &str) -> Result<Self, String> {
        let mut level = DiskLogLevel::empty();
        for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            level |= match name.to_ascii_lowercase().as_str() {
                "flow" => DiskLogLevel::FLOW,
                "state" => DiskLogLevel::STATE,
                "nibble" => DiskLogLevel::NIBBLE,
                "all" => DiskLogLevel::all(),
                other => return Err(format!("Unknown disk log level: {}", other)),
            };
        }
        Ok(level)
    }
}

/// グローバルログレベル
static LOG_LEVEL: AtomicU32 = AtomicU32::new(0);

/// ログレベルを設定
pub fn set_log_level(level: DiskLogLevel) {
    LOG_LEVEL.store(level.bits(), Ordering::Relaxed);
}

/// 現在のログレベルを取得
pub fn get_log_level() -> DiskLogLevel {
    DiskLogLevel::from_bits_truncate(LOG_LEVEL.load(Ordering::Relaxed))
}

/// ログレベルが有効かチェック
#[inline]
pub fn is_enabled(flag: DiskLogLevel) -> bool {
    (LOG_LEVEL.load(Ordering::Relaxed) & flag.bits()) != 0
}

/// ニブルリングバッファ（最後のN個を保持）
#[derive(Debug, Clone)]
pub struct NibbleRing {
    buf: Vec<u8>,
    pos: usize,
    capacity: usize,
}

impl NibbleRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0; capacity],
            pos: 0,
            capacity,
        }
    }

    pub fn push(&mut self, nibble: u8) {
        self.buf[self.pos % self.capacity] = nibble;
        self.pos += 1;
    }

    /// 最新からN個を取得（古い順）
    pub fn last_n(&self, n: usize) -> Vec<u8> {
        let n = n.min(self.capacity).min(self.pos);
        (0..n)
            .map(|i| self.buf[(self.pos - n + i) % self.capacity])
            .collect()
    }

    /// ダンプ出力
    pub fn dump(&self, n: usize) {
        if !is_enabled(DiskLogLevel::NIBBLE) {
            return;
        }
        let data = self.last_n(n);
        println!("[DUMP] Last {} nibbles:", data.len());
        for line in data.chunks(16) {
            let hex: Vec<String> = line.iter().map(|b| format!("{:02X}", b)).collect();
            println!("{}", hex.join(" "));
        }
    }
}

impl Default for NibbleRing {
    fn default() -> Self {
        Self::new(256)
    }
}

// ============================================================
// ログ出力関数
// ============================================================

/// [FLOW] モーターON
pub fn log_motor_on(drive: usize) {
    if is_enabled(DiskLogLevel::FLOW) {
        println!("[DISK] Drive {} motor ON", drive + 1);
    }
}

/// [FLOW] モーターOFF
pub fn log_motor_off(drive: usize) {
    if is_enabled(DiskLogLevel::FLOW) {
        println!("[DISK] Drive {} motor OFF", drive + 1);
    }
}

/// [FLOW] ディスク挿入
pub fn log_insert(drive: usize, size: usize) {
    if is_enabled(DiskLogLevel::FLOW) {
        println!("[DISK] Drive {} inserted ({} bytes)", drive + 1, size);
    }
}

/// [FLOW] ディスク排出
pub fn log_eject(drive: usize) {
    if is_enabled(DiskLogLevel::FLOW) {
        println!("[DISK] Drive {} ejected", drive + 1);
    }
}

/// [STATE] トラック変更（ハーフトラック単位）
pub fn log_track_change(from: u8, to: u8) {
    if is_enabled(DiskLogLevel::STATE) {
        println!(
            "[STATE] Half-track {} -> {} (track {})",
            from,
            to,
            to / 2
        );
    }
}

/// [STATE] ステッパーフェーズ変更
pub fn log_phase(phase: u8, on: bool, position: u8) {
    if is_enabled(DiskLogLevel::STATE) {
        println!(
            "[STATE] Phase {} {} shaft={}",
            phase,
            if on { "ON" } else { "OFF" },
            position
        );
    }
}

/// [STATE] ドライブ選択
pub fn log_drive_select(drive: usize) {
    if is_enabled(DiskLogLevel::STATE) {
        println!("[STATE] Drive {} selected", drive + 1);
    }
}

/// [STATE] Q6/Q7ラッチ変更
pub fn log_latch(q6: bool, q7: bool) {
    if is_enabled(DiskLogLevel::STATE) {
        println!("[STATE] Q6={} Q7={}", q6 as u8, q7 as u8);
    }
}

/// [NIBBLE] セクタエンコード開始
pub fn log_sector_encode(track: u8, sector: u8) {
    if is_enabled(DiskLogLevel::NIBBLE) {
        println!("[NIBBLE] Encode T={} S={}", track, sector);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nibble_ring() {
        let mut ring = NibbleRing::new(8);
        for i in 0..10 {
            ring.push(i as u8);
        }
        let last4 = ring.last_n(4);
        assert_eq!(last4, vec![6, 7, 8, 9]);
        assert_eq!(ring.last_n(20).len(), 8);
    }

    #[test]
    fn test_log_level() {
        set_log_level(DiskLogLevel::FLOW | DiskLogLevel::STATE);
        assert!(is_enabled(DiskLogLevel::FLOW));
        assert!(is_enabled(DiskLogLevel::STATE));
        assert!(!is_enabled(DiskLogLevel::NIBBLE));
        assert_eq!(get_log_level(), DiskLogLevel::FLOW | DiskLogLevel::STATE);
        set_log_level(DiskLogLevel::empty());
    }

    #[test]
    fn test_parse_levels() {
        assert_eq!(
            DiskLogLevel::parse("flow, nibble").unwrap(),
            DiskLogLevel::FLOW | DiskLogLevel::NIBBLE
        );
        assert_eq!(DiskLogLevel::parse("ALL").unwrap(), DiskLogLevel::all());
        assert_eq!(DiskLogLevel::parse("").unwrap(), DiskLogLevel::empty());
        assert!(DiskLogLevel::parse("fast").is_err());
    }
}
