//! セーブステート機能
//!
//! エミュレータの状態を保存・復元する

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::disk::{DiskController, DiskDrive, PHASES};
use crate::nibble::DSK_SIZE;
use crate::soft_switch::SoftSwitches;

/// CPUレジスタの状態（セーブ用）
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CpuState {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub sp: u8,
    pub pc: u16,
    pub status: u8,
    pub total_cycles: u64,
}

/// ソフトスイッチの状態（セーブ用）
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SwitchState {
    // バンク切り替え
    pub store_80: bool,
    pub ramrd: bool,
    pub ramwrt: bool,
    pub altzp: bool,
    pub slot_cx_rom: bool,
    pub slot_c3_rom: bool,

    // ランゲージカード
    pub bank_read: bool,
    pub bank_write: bool,
    pub use_bank2: bool,
    pub lc_prewrite: bool,

    // ビデオモード
    pub text: bool,
    pub mixed: bool,
    pub page2: bool,
    pub hires: bool,
    pub alt_charset: bool,
    pub col_80: bool,

    // キーボード
    pub keyboard_data: u8,
    pub keyboard_strobe: bool,
}

impl SwitchState {
    pub fn capture(switches: &SoftSwitches) -> Self {
        SwitchState {
            store_80: switches.store_80,
            ramrd: switches.ramrd,
            ramwrt: switches.ramwrt,
            altzp: switches.altzp,
            slot_cx_rom: switches.slot_cx_rom,
            slot_c3_rom: switches.slot_c3_rom,
            bank_read: switches.bank_read,
            bank_write: switches.bank_write,
            use_bank2: switches.use_bank2,
            lc_prewrite: switches.lc_prewrite,
            text: switches.text,
            mixed: switches.mixed,
            page2: switches.page2,
            hires: switches.hires,
            alt_charset: switches.alt_charset,
            col_80: switches.col_80,
            keyboard_data: switches.keyboard_data,
            keyboard_strobe: switches.keyboard_strobe,
        }
    }

    pub fn apply(&self, switches: &mut SoftSwitches) {
        switches.store_80 = self.store_80;
        switches.ramrd = self.ramrd;
        switches.ramwrt = self.ramwrt;
        switches.altzp = self.altzp;
        switches.slot_cx_rom = self.slot_cx_rom;
        switches.slot_c3_rom = self.slot_c3_rom;
        switches.bank_read = self.bank_read;
        switches.bank_write = self.bank_write;
        switches.use_bank2 = self.use_bank2;
        switches.lc_prewrite = self.lc_prewrite;
        switches.text = self.text;
        switches.mixed = self.mixed;
        switches.page2 = self.page2;
        switches.hires = self.hires;
        switches.alt_charset = self.alt_charset;
        switches.col_80 = self.col_80;
        switches.keyboard_data = self.keyboard_data;
        switches.keyboard_strobe = self.keyboard_strobe;
    }
}

/// メモリの状態（セーブ用）
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MemoryState {
    pub main_ram: Vec<u8>,   // メインRAM (64KB)
    pub aux_ram: Vec<u8>,    // 補助RAM (64KB)
    pub main_bank2: Vec<u8>, // ランゲージカード Bank2 (4KB)
    pub aux_bank2: Vec<u8>,  // 補助側 Bank2 (4KB)
    pub switches: SwitchState,
}

/// ディスクドライブの状態（セーブ用）
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct DiskDriveState {
    pub image: Option<Vec<u8>>,
    pub phases: [bool; PHASES],
    pub shaft_position: u8,
    pub half_track: u8,
    pub sector: u8,
    pub byte_offset: usize,
    pub motor_on: bool,
    pub volume: u8,
}

impl DiskDriveState {
    /// 復元前にイメージサイズを確認
    pub fn validate(&self) -> Result<(), &'static str> {
        match &self.image {
            Some(image) if image.len() != DSK_SIZE => Err("Invalid DSK size in save state"),
            _ => Ok(()),
        }
    }

    pub fn capture(drive: &DiskDrive) -> Self {
        DiskDriveState {
            image: drive.image().map(|image| image.to_vec()),
            phases: drive.phases(),
            shaft_position: drive.shaft_position(),
            half_track: drive.half_track(),
            sector: drive.sector(),
            byte_offset: drive.byte_offset(),
            motor_on: drive.is_motor_on(),
            volume: drive.volume(),
        }
    }

    pub fn apply(&self, drive: &mut DiskDrive) -> Result<(), &'static str> {
        match &self.image {
            Some(image) => drive.insert(image)?,
            None => drive.eject(),
        }
        drive.set_volume(self.volume);
        drive.restore_position(
            self.phases,
            self.shaft_position,
            self.half_track,
            self.sector,
            self.byte_offset,
            self.motor_on,
        );
        Ok(())
    }
}

/// Disk IIコントローラの状態（セーブ用）
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct DiskState {
    pub curr_drive: usize,
    pub q6: bool,
    pub q7: bool,
    pub drives: [DiskDriveState; 2],
}

impl DiskState {
    pub fn capture(disk: &DiskController) -> Self {
        DiskState {
            curr_drive: disk.current_drive(),
            q6: disk.q6(),
            q7: disk.q7(),
            drives: [
                DiskDriveState::capture(&disk.drives[0]),
                DiskDriveState::capture(&disk.drives[1]),
            ],
        }
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        self.drives.iter().try_for_each(DiskDriveState::validate)
    }

    pub fn apply(&self, disk: &mut DiskController) -> Result<(), &'static str> {
        self.validate()?;
        for (state, drive) in self.drives.iter().zip(disk.drives.iter_mut()) {
            state.apply(drive)?;
        }
        disk.restore_latches(self.curr_drive, self.q6, self.q7);
        Ok(())
    }
}

/// 完全なエミュレータ状態
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SaveState {
    pub version: u32, // セーブフォーマットのバージョン
    pub cpu: CpuState,
    pub memory: MemoryState,
    pub disk: DiskState,
}

impl SaveState {
    pub const CURRENT_VERSION: u32 = 1;

    pub fn to_json(&self) -> Result<String, String> {
        serde_json::to_string(self).map_err(|e| format!("Failed to serialize save state: {}", e))
    }

    pub fn from_json(json: &str) -> Result<Self, String> {
        serde_json::from_str(json).map_err(|e| format!("Failed to parse save state: {}", e))
    }

    /// ファイルに保存
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), String> {
        let path = path.as_ref();
        let json = self.to_json()?;
        fs::write(path, json).map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
        log::info!("Saved state to {}", path.display());
        Ok(())
    }

    /// ファイルから読み込み
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_switch_state_roundtrip() {
        let mut switches = SoftSwitches::new();
        switches.ramrd = true;
        switches.use_bank2 = true;
        switches.text = false;
        switches.set_key(0xC1);

        let state = SwitchState::capture(&switches);
        let mut restored = SoftSwitches::new();
        state.apply(&mut restored);
        assert!(restored.ramrd);
        assert!(restored.use_bank2);
        assert!(!restored.text);
        assert_eq!(restored.keyboard_data, switches.keyboard_data);
        assert!(restored.keyboard_strobe);
    }

    #[test]
    fn test_drive_state_restores_position() {
        let mut drive = DiskDrive::new(0);
        drive.insert(&vec![0x11; DSK_SIZE]).unwrap();
        drive.phase_on(1);
        drive.phase_off(1);
        drive.phase_on(2);
        for _ in 0..10 {
            drive.read_next_byte();
        }

        let state = DiskDriveState::capture(&drive);
        let mut restored = DiskDrive::new(0);
        state.apply(&mut restored).unwrap();
        assert_eq!(restored.half_track(), drive.half_track());
        assert_eq!(restored.shaft_position(), drive.shaft_position());
        assert_eq!(restored.phases(), drive.phases());
        assert_eq!(restored.byte_offset(), 10);
        assert_eq!(restored.read_next_byte(), drive.clone().read_next_byte());
    }

    #[test]
    fn test_bad_image_leaves_drives_untouched() {
        let mut disk = DiskController::new();
        disk.insert_disk(0, &vec![0x22; DSK_SIZE]).unwrap();

        let mut state = DiskState::capture(&DiskController::new());
        state.drives[0].image = Some(vec![0x33; DSK_SIZE]);
        state.drives[1].image = Some(vec![0; 100]);
        assert!(state.validate().is_err());
        assert!(state.apply(&mut disk).is_err());
        assert_eq!(disk.drives[0].image().map(|image| image[0]), Some(0x22));
    }

    #[test]
    fn test_json_roundtrip_and_bad_input() {
        let state = SaveState {
            version: SaveState::CURRENT_VERSION,
            cpu: CpuState { a: 1, x: 2, y: 3, sp: 0xFD, pc: 0xC600, status: 0x24, total_cycles: 99 },
            memory: MemoryState {
                main_ram: vec![0; 16],
                aux_ram: vec![1; 16],
                main_bank2: vec![],
                aux_bank2: vec![],
                switches: SwitchState::capture(&SoftSwitches::new()),
            },
            disk: DiskState::capture(&DiskController::new()),
        };
        let json = state.to_json().unwrap();
        assert_eq!(SaveState::from_json(&json).unwrap(), state);
        assert!(SaveState::from_json("{not json").is_err());
    }
}
