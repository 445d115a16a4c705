//! メモリ領域
//!
//! 16ビット絶対アドレスでアクセスする固定長のバイト配列。
//! ROM領域は読み取り専用フラグを持ち、書き込みは無視される。

/// 固定アドレス範囲を持つメモリ領域
#[derive(Debug, Clone)]
pub struct MemoryRegion {
    /// 開始アドレス
    start: u16,
    /// 終了アドレス（この値を含む）
    end: u16,
    /// データ
    data: Vec<u8>,
    /// 読み取り専用か
    read_only: bool,
}

impl MemoryRegion {
    /// `start..=end` の領域を0で初期化して作成
    pub fn new(start: u16, end: u16, read_only: bool) -> Self {
        assert!(start <= end, "region start ${:04X} after end ${:04X}", start, end);
        MemoryRegion {
            start,
            end,
            data: vec![0; (end - start) as usize + 1],
            read_only,
        }
    }

    pub fn start(&self) -> u16 {
        self.start
    }

    pub fn end(&self) -> u16 {
        self.end
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// 領域がアドレスを含むか
    pub fn contains(&self, address: u16) -> bool {
        address >= self.start && address <= self.end
    }

    /// 絶対アドレスを領域内オフセットに変換
    #[inline]
    fn offset(&self, address: u16) -> usize {
        assert!(
            self.contains(address),
            "address ${:04X} outside region ${:04X}-${:04X}",
            address,
            self.start,
            self.end
        );
        (address - self.start) as usize
    }

    /// 1バイト読み取り
    #[inline]
    pub fn read(&self, address: u16) -> u8 {
        self.data[self.offset(address)]
    }

    /// 1バイト書き込み（読み取り専用なら警告して無視）
    #[inline]
    pub fn write(&mut self, address: u16, value: u8) {
        let offset = self.offset(address);
        if self.read_only {
            log::warn!(
                "Ignored write ${:02X} to read-only ${:04X} (region ${:04X}-${:04X})",
                value,
                address,
                self.start,
                self.end
            );
            return;
        }
        self.data[offset] = value;
    }

    /// 領域全体の内容を置き換える（ROMロード用、読み取り専用でも可）
    pub fn set_data(&mut self, data: &[u8]) -> Result<(), &'static str> {
        if data.len() != self.data.len() {
            return Err("Region data size mismatch");
        }
        self.data.copy_from_slice(data);
        Ok(())
    }

    /// 生データへの参照（描画・セーブステート用）
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// 生データへの可変参照（セーブステート復元・初期化用）
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// 0クリア
    pub fn clear(&mut self) {
        self.data.fill(0);
    }
}
