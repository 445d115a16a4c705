//! ソフトスイッチ ($C000-$C0FF)
//!
//! アドレスへのアクセスそのものでフラグが切り替わるI/O領域。
//! デコードされないアドレスは通常のRAMとして値を保持する。

use crate::region::MemoryRegion;

/// ソフトスイッチ領域の開始アドレス
pub const SOFT_SWITCH_START: u16 = 0xC000;
/// ソフトスイッチ領域の終了アドレス
pub const SOFT_SWITCH_END: u16 = 0xC0FF;

/// ソフトスイッチの状態
#[derive(Debug, Clone)]
pub struct SoftSwitches {
    /// 80STORE: PAGE2で補助テキストページを選択
    pub store_80: bool,
    /// RAMRD: $0200-$BFFFの読み取りを補助RAMから
    pub ramrd: bool,
    /// RAMWRT: $0200-$BFFFの書き込みを補助RAMへ
    pub ramwrt: bool,
    /// ALTZP: ゼロページ/スタック/ランゲージカードを補助RAMに
    pub altzp: bool,
    /// ランゲージカードRAMの読み取り有効
    pub bank_read: bool,
    /// ランゲージカードRAMの書き込み有効
    pub bank_write: bool,
    /// $D000-$DFFFでバンク2を使用
    pub use_bank2: bool,
    /// $C100-$CFFFでスロットROMを使用
    pub slot_cx_rom: bool,
    /// スロット3 ROM
    pub slot_c3_rom: bool,
    pub text: bool,
    pub mixed: bool,
    pub page2: bool,
    pub hires: bool,
    pub alt_charset: bool,
    pub col_80: bool,
    /// 垂直帰線期間
    pub vbl: bool,
    /// キーボードデータ（下位7ビット）
    pub keyboard_data: u8,
    /// キーストローブ
    pub keyboard_strobe: bool,
    /// ランゲージカード書き込み有効化の前段（2回連続アクセスで有効）
    pub lc_prewrite: bool,
    /// デコードされないアドレス用の記憶領域
    storage: MemoryRegion,
}

impl Default for SoftSwitches {
    fn default() -> Self {
        SoftSwitches {
            store_80: false,
            ramrd: false,
            ramwrt: false,
            altzp: false,
            bank_read: false,
            bank_write: false,
            use_bank2: false,
            slot_cx_rom: false,
            slot_c3_rom: false,
            text: true, // 起動時はテキストモード
            mixed: false,
            page2: false,
            hires: false,
            alt_charset: false,
            col_80: false,
            vbl: false,
            keyboard_data: 0,
            keyboard_strobe: false,
            lc_prewrite: false,
            storage: MemoryRegion::new(SOFT_SWITCH_START, SOFT_SWITCH_END, false),
        }
    }
}

#[inline]
fn bit7(flag: bool) -> u8 {
    if flag { 0x80 } else { 0x00 }
}

impl SoftSwitches {
    pub fn new() -> Self {
        Self::default()
    }

    /// キー入力をラッチしてストローブを立てる
    pub fn set_key(&mut self, key: u8) {
        self.keyboard_data = key & 0x7F;
        self.keyboard_strobe = true;
    }

    /// キーストローブが有効か
    pub fn has_key_strobe(&self) -> bool {
        self.keyboard_strobe
    }

    /// 記憶領域への参照（セーブステート用）
    pub fn storage(&self) -> &MemoryRegion {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut MemoryRegion {
        &mut self.storage
    }

    /// $C011-$C01Fの状態フラグ
    fn status_flag(&self, address: u16) -> Option<bool> {
        let flag = match address {
            0xC011 => self.use_bank2,
            0xC012 => self.bank_read,
            0xC013 => self.ramrd,
            0xC014 => self.ramwrt,
            0xC015 => self.slot_cx_rom,
            0xC016 => self.altzp,
            0xC017 => self.slot_c3_rom,
            0xC018 => self.store_80,
            0xC019 => self.vbl,
            0xC01A => self.text,
            0xC01B => self.mixed,
            0xC01C => self.page2,
            0xC01D => self.hires,
            0xC01E => self.alt_charset,
            0xC01F => self.col_80,
            _ => return None,
        };
        Some(flag)
    }

    /// ソフトスイッチ読み取り
    pub fn read(&mut self, address: u16) -> u8 {
        match address {
            0xC000 => self.keyboard_data | bit7(self.keyboard_strobe),
            0xC010 => {
                // ANY KEY DOWN: ストローブを返してクリア
                let result = bit7(self.keyboard_strobe);
                self.keyboard_strobe = false;
                result
            }
            0xC011..=0xC01F => bit7(self.status_flag(address).unwrap_or(false)),
            // 読み取りでも切り替わる表示スイッチ
            0xC050..=0xC057 => {
                let state = self.toggle_display(address);
                state as u8
            }
            0xC080..=0xC08F => {
                self.handle_language_card(address as u8);
                0x00
            }
            _ => self.storage.read(address),
        }
    }

    /// 副作用なしの読み取り（逆アセンブラ・ダンプ用）
    pub fn peek(&self, address: u16) -> u8 {
        match address {
            0xC000 => self.keyboard_data | bit7(self.keyboard_strobe),
            0xC010 => bit7(self.keyboard_strobe),
            0xC011..=0xC01F => bit7(self.status_flag(address).unwrap_or(false)),
            0xC050..=0xC057 | 0xC080..=0xC08F => 0x00,
            _ => self.storage.read(address),
        }
    }

    /// ソフトスイッチ書き込み
    pub fn write(&mut self, address: u16, value: u8) {
        match address {
            0xC000 => self.store_80 = false,
            0xC001 => self.store_80 = true,
            0xC002 => self.ramrd = false,
            0xC003 => self.ramrd = true,
            0xC004 => self.ramwrt = false,
            0xC005 => self.ramwrt = true,
            // SLOTCXROMは逆向きのペア
            0xC006 => self.slot_cx_rom = true,
            0xC007 => self.slot_cx_rom = false,
            0xC008 => self.altzp = false,
            0xC009 => self.altzp = true,
            0xC00A => self.slot_c3_rom = false,
            0xC00B => self.slot_c3_rom = true,
            0xC00C => self.col_80 = false,
            0xC00D => self.col_80 = true,
            0xC00E => self.alt_charset = false,
            0xC00F => self.alt_charset = true,
            0xC010 => self.keyboard_strobe = false,
            0xC050..=0xC057 => {
                self.toggle_display(address);
            }
            0xC080..=0xC08F => self.handle_language_card(address as u8),
            _ => self.storage.write(address, value),
        }
    }

    /// $C050-$C057: TEXT/MIXED/PAGE2/HIRES の偶数=OFF、奇数=ON
    fn toggle_display(&mut self, address: u16) -> bool {
        let on = (address & 1) != 0;
        let flag = match address & 0x06 {
            0x00 => &mut self.text,
            0x02 => &mut self.mixed,
            0x04 => &mut self.page2,
            _ => &mut self.hires,
        };
        *flag = on;
        on
    }

    /// ランゲージカード ($C080-$C08F)
    ///
    /// bit3=0でバンク2。下位2ビット: 0=RAM読み/書込不可, 1=ROM読み/書込可,
    /// 2=ROM読み/書込不可, 3=RAM読み/書込可。書き込み有効化は奇数アドレスへの
    /// 2回連続アクセスが必要。
    fn handle_language_card(&mut self, addr: u8) {
        self.use_bank2 = (addr & 0x08) == 0;
        match addr & 0x03 {
            0x0 => {
                self.bank_read = true;
                self.bank_write = false;
                self.lc_prewrite = false;
            }
            0x1 => {
                self.bank_read = false;
                if self.lc_prewrite {
                    self.bank_write = true;
                }
                self.lc_prewrite = !self.lc_prewrite;
            }
            0x2 => {
                self.bank_read = false;
                self.bank_write = false;
                self.lc_prewrite = false;
            }
            _ => {
                self.bank_read = true;
                if self.lc_prewrite {
                    self.bank_write = true;
                }
                self.lc_prewrite = !self.lc_prewrite;
            }
        }
    }
}
