//! Apple IIe メモリサブシステム
//!
//! 64KBのアドレス空間を9つの領域に振り分けるバンク切り替えバス。
//! すべてのアクセスは `route` で領域を決定してから処理される。

use crate::cpu::MemoryBus;
use crate::disk::{DiskController, DISK_IO_END, DISK_IO_START};
use crate::region::MemoryRegion;
use crate::soft_switch::SoftSwitches;

/// ROMイメージのサイズ（APPLE2E.ROM）
pub const ROM_IMAGE_SIZE: usize = 0x8000;

/// ROMイメージ内の各ファームウェアの位置
const DISK_ROM_OFFSET: usize = 0x0600;
const DISK_ROM_LEN: usize = 0x0100;
const INTERNAL_ROM_OFFSET: usize = 0x4100;
const INTERNAL_ROM_LEN: usize = 0x0F00;
const MAIN_ROM_OFFSET: usize = 0x5000;
const MAIN_ROM_LEN: usize = 0x3000;

/// メモリ領域の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    /// メインRAM ($0000-$FFFF、$D000以降はランゲージカードのバンク1)
    MainRam,
    /// 補助RAM ($0000-$FFFF)
    AuxRam,
    /// メインのランゲージカードバンク2 ($D000-$DFFF)
    MainBank2,
    /// 補助のランゲージカードバンク2 ($D000-$DFFF)
    AuxBank2,
    /// モニタ/BASIC ROM ($D000-$FFFF)
    MainRom,
    /// 内部ファームウェアROM ($C100-$CFFF)
    InternalRom,
    /// スロットROM ($C100-$CFFF)
    SlotRoms,
    /// ソフトスイッチ ($C000-$C0FF、ディスクI/Oを除く)
    SoftSwitches,
    /// スロット1のディスクI/O ($C090-$C09F)
    SlotIo,
}

impl Region {
    pub const ALL: [Region; 9] = [
        Region::MainRam,
        Region::AuxRam,
        Region::MainBank2,
        Region::AuxBank2,
        Region::MainRom,
        Region::InternalRom,
        Region::SlotRoms,
        Region::SoftSwitches,
        Region::SlotIo,
    ];
}

/// アクセスの方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

/// Apple IIeのメモリ
pub struct Memory {
    main_ram: MemoryRegion,
    aux_ram: MemoryRegion,
    main_bank2: MemoryRegion,
    aux_bank2: MemoryRegion,
    main_rom: MemoryRegion,
    internal_rom: MemoryRegion,
    slot_roms: MemoryRegion,
    /// ソフトスイッチ
    pub switches: SoftSwitches,
    /// Disk IIコントローラ
    pub disk: DiskController,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory {
    pub fn new() -> Self {
        Memory {
            main_ram: MemoryRegion::new(0x0000, 0xFFFF, false),
            aux_ram: MemoryRegion::new(0x0000, 0xFFFF, false),
            main_bank2: MemoryRegion::new(0xD000, 0xDFFF, false),
            aux_bank2: MemoryRegion::new(0xD000, 0xDFFF, false),
            main_rom: MemoryRegion::new(0xD000, 0xFFFF, true),
            internal_rom: MemoryRegion::new(0xC100, 0xCFFF, true),
            slot_roms: MemoryRegion::new(0xC100, 0xCFFF, true),
            switches: SoftSwitches::new(),
            disk: DiskController::new(),
        }
    }

    /// 32KBのROMイメージを各ROM領域に配置
    pub fn load_rom(&mut self, rom: &[u8]) -> Result<(), &'static str> {
        if rom.len() != ROM_IMAGE_SIZE {
            log::warn!("ROM image is {} bytes, expected {}", rom.len(), ROM_IMAGE_SIZE);
            return Err("Invalid ROM size (expected 32KB APPLE2E.ROM)");
        }

        // スロット1のDisk IIファームウェアは$C100-$C1FFのみ
        let mut slots = vec![0u8; self.slot_roms.len()];
        slots[..DISK_ROM_LEN].copy_from_slice(&rom[DISK_ROM_OFFSET..DISK_ROM_OFFSET + DISK_ROM_LEN]);
        self.slot_roms.set_data(&slots)?;
        self.internal_rom
            .set_data(&rom[INTERNAL_ROM_OFFSET..INTERNAL_ROM_OFFSET + INTERNAL_ROM_LEN])?;
        self.main_rom
            .set_data(&rom[MAIN_ROM_OFFSET..MAIN_ROM_OFFSET + MAIN_ROM_LEN])?;

        log::info!(
            "ROM loaded: RESET vector ${:02X}{:02X}",
            self.main_rom.read(0xFFFD),
            self.main_rom.read(0xFFFC)
        );
        Ok(())
    }

    /// アドレスとアクセス方向から領域を決定
    pub fn route(&self, address: u16, access: Access) -> Region {
        let s = &self.switches;
        let aux_for_access = match access {
            Access::Read => s.ramrd,
            Access::Write => s.ramwrt,
        };
        let bank_enabled = match access {
            Access::Read => s.bank_read,
            Access::Write => s.bank_write,
        };

        match address >> 8 {
            // ゼロページとスタック
            0x00..=0x01 => {
                if s.altzp {
                    Region::AuxRam
                } else {
                    Region::MainRam
                }
            }
            // テキストページ1
            0x04..=0x07 => {
                if aux_for_access || (s.store_80 && s.page2) {
                    Region::AuxRam
                } else {
                    Region::MainRam
                }
            }
            0xC0 => {
                if (DISK_IO_START..=DISK_IO_END).contains(&address) {
                    Region::SlotIo
                } else {
                    Region::SoftSwitches
                }
            }
            0xC1..=0xCF => {
                if s.slot_cx_rom {
                    Region::SlotRoms
                } else {
                    Region::InternalRom
                }
            }
            0xD0..=0xDF => {
                if !bank_enabled {
                    Region::MainRom
                } else {
                    match (s.altzp, s.use_bank2) {
                        (true, true) => Region::AuxBank2,
                        (true, false) => Region::AuxRam,
                        (false, true) => Region::MainBank2,
                        (false, false) => Region::MainRam,
                    }
                }
            }
            0xE0..=0xFF => {
                if !bank_enabled {
                    Region::MainRom
                } else if s.altzp {
                    Region::AuxRam
                } else {
                    Region::MainRam
                }
            }
            _ => {
                if aux_for_access {
                    Region::AuxRam
                } else {
                    Region::MainRam
                }
            }
        }
    }

    /// 領域への参照（描画・ダンプ用）
    ///
    /// ディスクI/Oはバイト配列を持たないのでNone。
    pub fn region(&self, region: Region) -> Option<&MemoryRegion> {
        match region {
            Region::MainRam => Some(&self.main_ram),
            Region::AuxRam => Some(&self.aux_ram),
            Region::MainBank2 => Some(&self.main_bank2),
            Region::AuxBank2 => Some(&self.aux_bank2),
            Region::MainRom => Some(&self.main_rom),
            Region::InternalRom => Some(&self.internal_rom),
            Region::SlotRoms => Some(&self.slot_roms),
            Region::SoftSwitches => Some(self.switches.storage()),
            Region::SlotIo => None,
        }
    }

    /// 領域への可変参照（セーブステート復元用）
    pub fn region_mut(&mut self, region: Region) -> Option<&mut MemoryRegion> {
        match region {
            Region::MainRam => Some(&mut self.main_ram),
            Region::AuxRam => Some(&mut self.aux_ram),
            Region::MainBank2 => Some(&mut self.main_bank2),
            Region::AuxBank2 => Some(&mut self.aux_bank2),
            Region::MainRom => Some(&mut self.main_rom),
            Region::InternalRom => Some(&mut self.internal_rom),
            Region::SlotRoms => Some(&mut self.slot_roms),
            Region::SoftSwitches => Some(self.switches.storage_mut()),
            Region::SlotIo => None,
        }
    }

    /// 副作用なしの読み取り（逆アセンブラ・ダンプ用）
    pub fn peek(&self, address: u16) -> u8 {
        match self.route(address, Access::Read) {
            Region::SoftSwitches => self.switches.peek(address),
            Region::SlotIo => 0,
            region => self
                .region(region)
                .map(|r| r.read(address))
                .unwrap_or(0),
        }
    }

    /// キー入力
    pub fn set_key(&mut self, key: u8) {
        self.switches.set_key(key);
    }

    pub fn has_key_strobe(&self) -> bool {
        self.switches.has_key_strobe()
    }

    /// RAMとソフトスイッチを電源投入時の状態に戻す（ROMとディスクは保持）
    pub fn reset(&mut self) {
        self.main_ram.clear();
        self.aux_ram.clear();
        self.main_bank2.clear();
        self.aux_bank2.clear();
        self.switches = SoftSwitches::new();
        self.disk.reset();
    }
}

impl MemoryBus for Memory {
    fn read(&mut self, address: u16) -> u8 {
        match self.route(address, Access::Read) {
            Region::MainRam => self.main_ram.read(address),
            Region::AuxRam => self.aux_ram.read(address),
            Region::MainBank2 => self.main_bank2.read(address),
            Region::AuxBank2 => self.aux_bank2.read(address),
            Region::MainRom => self.main_rom.read(address),
            Region::InternalRom => self.internal_rom.read(address),
            Region::SlotRoms => self.slot_roms.read(address),
            Region::SoftSwitches => self.switches.read(address),
            Region::SlotIo => self.disk.io_read(address),
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        match self.route(address, Access::Write) {
            Region::MainRam => self.main_ram.write(address, value),
            Region::AuxRam => self.aux_ram.write(address, value),
            Region::MainBank2 => self.main_bank2.write(address, value),
            Region::AuxBank2 => self.aux_bank2.write(address, value),
            Region::MainRom => self.main_rom.write(address, value),
            Region::InternalRom => self.internal_rom.write(address, value),
            Region::SlotRoms => self.slot_roms.write(address, value),
            Region::SoftSwitches => self.switches.write(address, value),
            Region::SlotIo => self.disk.io_write(address, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nibble::DSK_SIZE;

    fn test_rom() -> Vec<u8> {
        let mut rom = vec![0u8; ROM_IMAGE_SIZE];
        rom[DISK_ROM_OFFSET] = 0xA2; // $C100
        rom[INTERNAL_ROM_OFFSET] = 0x4C; // $C100
        rom[INTERNAL_ROM_OFFSET + 0x0EFF] = 0x77; // $CFFF
        rom[MAIN_ROM_OFFSET] = 0x6F; // $D000
        rom[ROM_IMAGE_SIZE - 4] = 0x62; // $FFFC
        rom[ROM_IMAGE_SIZE - 3] = 0xFA; // $FFFD
        rom
    }

    /// 期待される領域（ルーティング表をそのまま書き下したもの）
    fn expected(address: u16, access: Access, f: [bool; 6]) -> Region {
        let [ramrd, ramwrt, altzp, bank_read, bank_write, bank2] = f;
        let aux = if access == Access::Read { ramrd } else { ramwrt };
        let bank = if access == Access::Read { bank_read } else { bank_write };
        match address {
            0x0000 => if altzp { Region::AuxRam } else { Region::MainRam },
            0x0500 => if aux { Region::AuxRam } else { Region::MainRam },
            0xC100 => Region::InternalRom,
            0xD000 => {
                if !bank {
                    Region::MainRom
                } else if altzp {
                    if bank2 { Region::AuxBank2 } else { Region::AuxRam }
                } else if bank2 {
                    Region::MainBank2
                } else {
                    Region::MainRam
                }
            }
            0xE000 => {
                if !bank {
                    Region::MainRom
                } else if altzp {
                    Region::AuxRam
                } else {
                    Region::MainRam
                }
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_routing_matrix() {
        let mut mem = Memory::new();
        for bits in 0..64u8 {
            let f = [
                bits & 1 != 0,
                bits & 2 != 0,
                bits & 4 != 0,
                bits & 8 != 0,
                bits & 16 != 0,
                bits & 32 != 0,
            ];
            mem.switches.ramrd = f[0];
            mem.switches.ramwrt = f[1];
            mem.switches.altzp = f[2];
            mem.switches.bank_read = f[3];
            mem.switches.bank_write = f[4];
            mem.switches.use_bank2 = f[5];
            for &address in [0x0000u16, 0x0500, 0xC100, 0xD000, 0xE000].iter() {
                for &access in [Access::Read, Access::Write].iter() {
                    assert_eq!(
                        mem.route(address, access),
                        expected(address, access, f),
                        "${:04X} {:?} flags {:06b}",
                        address,
                        access,
                        bits
                    );
                }
            }
        }
    }

    #[test]
    fn test_80store_page2_routes_text_page() {
        let mut mem = Memory::new();
        mem.switches.store_80 = true;
        mem.switches.page2 = true;
        assert_eq!(mem.route(0x0400, Access::Read), Region::AuxRam);
        assert_eq!(mem.route(0x07FF, Access::Write), Region::AuxRam);
        // ページ2以外には影響しない
        assert_eq!(mem.route(0x0800, Access::Read), Region::MainRam);
    }

    #[test]
    fn test_io_page_routing() {
        let mut mem = Memory::new();
        assert_eq!(mem.route(0xC000, Access::Read), Region::SoftSwitches);
        assert_eq!(mem.route(0xC08F, Access::Read), Region::SoftSwitches);
        assert_eq!(mem.route(0xC090, Access::Read), Region::SlotIo);
        assert_eq!(mem.route(0xC09F, Access::Write), Region::SlotIo);
        assert_eq!(mem.route(0xC0A0, Access::Read), Region::SoftSwitches);
        mem.switches.slot_cx_rom = true;
        assert_eq!(mem.route(0xC600, Access::Read), Region::SlotRoms);
    }

    #[test]
    fn test_load_rom_layout() {
        let mut mem = Memory::new();
        assert!(mem.load_rom(&[0u8; 100]).is_err());
        mem.load_rom(&test_rom()).unwrap();

        assert_eq!(mem.read(0xC100), 0x4C);
        assert_eq!(mem.read(0xCFFF), 0x77);
        assert_eq!(mem.read(0xD000), 0x6F);
        assert_eq!(mem.read(0xFFFC), 0x62);
        assert_eq!(mem.read(0xFFFD), 0xFA);

        // SLOTCXROM ON: $C006への書き込み
        mem.write(0xC006, 0);
        assert_eq!(mem.read(0xC100), 0xA2);
        assert_eq!(mem.read(0xC200), 0x00);
        mem.write(0xC007, 0);
        assert_eq!(mem.read(0xC100), 0x4C);
    }

    #[test]
    fn test_rom_write_ignored() {
        let mut mem = Memory::new();
        mem.load_rom(&test_rom()).unwrap();
        mem.write(0xD000, 0x00);
        mem.write(0xC100, 0x00);
        assert_eq!(mem.read(0xD000), 0x6F);
        assert_eq!(mem.read(0xC100), 0x4C);
        // 書き込みはRAMにも届かない
        assert_eq!(mem.region(Region::MainRam).unwrap().read(0xD000), 0);
    }

    #[test]
    fn test_language_card_through_bus() {
        let mut mem = Memory::new();
        mem.load_rom(&test_rom()).unwrap();

        // $C083 x2: バンク2 RAM読み書き
        mem.read(0xC083);
        mem.read(0xC083);
        mem.write(0xD000, 0x11);
        mem.write(0xE000, 0x22);
        assert_eq!(mem.read(0xD000), 0x11);
        assert_eq!(mem.region(Region::MainBank2).unwrap().read(0xD000), 0x11);
        assert_eq!(mem.region(Region::MainRam).unwrap().read(0xE000), 0x22);

        // $C08B x2: バンク1
        mem.read(0xC08B);
        mem.read(0xC08B);
        assert_eq!(mem.read(0xD000), 0x00);
        mem.write(0xD000, 0x33);
        assert_eq!(mem.region(Region::MainRam).unwrap().read(0xD000), 0x33);

        // $C082: ROMに戻る
        mem.read(0xC082);
        assert_eq!(mem.read(0xD000), 0x6F);
    }

    #[test]
    fn test_aux_memory_switches() {
        let mut mem = Memory::new();
        mem.write(0x2000, 0x11);
        mem.write(0xC005, 0); // RAMWRT ON
        mem.write(0x2000, 0x22);
        assert_eq!(mem.read(0x2000), 0x11);
        mem.write(0xC003, 0); // RAMRD ON
        assert_eq!(mem.read(0x2000), 0x22);
        assert_eq!(mem.read(0xC013), 0x80);

        mem.write(0x0010, 0x33);
        mem.write(0xC009, 0); // ALTZP ON
        assert_eq!(mem.read(0x0010), 0x00);
        mem.write(0x0010, 0x44);
        mem.write(0xC008, 0);
        assert_eq!(mem.read(0x0010), 0x33);
        assert_eq!(mem.region(Region::AuxRam).unwrap().read(0x0010), 0x44);
    }

    #[test]
    fn test_disk_ports_through_bus() {
        let mut mem = Memory::new();
        mem.disk.insert_disk(0, &vec![0u8; DSK_SIZE]).unwrap();
        mem.read(0xC098);
        assert!(mem.disk.drives[0].is_motor_on());
        assert_eq!(mem.read(0xC09C), 0xFF);
        assert_eq!(mem.read(0xC09D), 0x00);
        mem.write(0xC091, 0);
        assert!(mem.disk.drives[0].phases()[0]);
    }

    #[test]
    fn test_peek_has_no_side_effects() {
        let mut mem = Memory::new();
        mem.set_key(b'Q');
        assert_eq!(mem.peek(0xC010), 0x80);
        assert_eq!(mem.peek(0xC050), 0x00);
        assert!(mem.switches.text);
        assert!(mem.has_key_strobe());
        mem.write(0x0300, 0xEA);
        assert_eq!(mem.peek(0x0300), 0xEA);
    }
}
