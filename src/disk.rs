//! Apple II Disk II ドライブエミュレーション
//!
//! Disk II hardware emulation based on "Beneath Apple DOS" documentation
//! 4相ステッパーモーターとDSK形式のディスクイメージをサポート

use crate::disk_log::{
    is_enabled, log_drive_select, log_eject, log_insert, log_latch, log_motor_off, log_motor_on,
    log_phase, log_sector_encode, log_track_change, DiskLogLevel, NibbleRing,
};
use crate::nibble::{build_image_sector, DEFAULT_VOLUME, DSK_SIZE, RAW_SECTOR_LEN, SECTORS_PER_TRACK};

/// フェーズ数
pub const PHASES: usize = 4;

/// シャフト位置の数（マグネット位置 + 中間位置）
pub const SHAFT_POSITIONS: u8 = 8;

/// 最大ハーフトラック
pub const MAX_HALF_TRACK: u8 = 79;

/// Disk IIのI/Oポート範囲（スロット1）
pub const DISK_IO_START: u16 = 0xC090;
pub const DISK_IO_END: u16 = 0xC09F;

/// フロッピードライブの状態
#[derive(Clone)]
pub struct DiskDrive {
    /// ドライブ番号（0または1、ログ用）
    index: usize,
    /// マグネット（フェーズ）の状態
    phases: [bool; PHASES],
    /// シャフト位置（0-7、偶数はマグネットと一致）
    shaft_position: u8,
    previous_shaft_position: u8,
    /// ヘッド位置（0-79、ハーフトラック単位）
    half_track: u8,
    /// 現在のセクタ（0-15）
    sector: u8,
    /// エンコード済みセクタ内の読み取り位置
    byte_offset: usize,
    motor_on: bool,
    volume: u8,
    /// ディスクイメージ（DSK形式）
    image: Option<Vec<u8>>,
    /// 現在のセクタのニブル列
    buffer: Vec<u8>,
    /// 最近読み出したニブル（NIBBLEログ用）
    recent: NibbleRing,
}

impl Default for DiskDrive {
    fn default() -> Self {
        Self::new(0)
    }
}

impl DiskDrive {
    pub fn new(index: usize) -> Self {
        DiskDrive {
            index,
            phases: [false; PHASES],
            shaft_position: 0,
            previous_shaft_position: 0,
            half_track: 0,
            sector: 0,
            byte_offset: 0,
            motor_on: false,
            volume: DEFAULT_VOLUME,
            image: None,
            buffer: Vec::new(),
            recent: NibbleRing::default(),
        }
    }

    /// ヘッドとセクタ位置を初期化（イメージとマグネットは保持）
    pub fn reset(&mut self) {
        self.half_track = 0;
        self.sector = 0;
        self.byte_offset = 0;
        self.rebuild_buffer();
    }

    /// ディスクイメージを挿入
    pub fn insert(&mut self, data: &[u8]) -> Result<(), &'static str> {
        if data.len() != DSK_SIZE {
            log::warn!(
                "Rejected disk image for drive {}: {} bytes (expected {})",
                self.index + 1,
                data.len(),
                DSK_SIZE
            );
            return Err("Invalid DSK file size");
        }
        self.image = Some(data.to_vec());
        self.sector = 0;
        self.byte_offset = 0;
        self.rebuild_buffer();
        log_insert(self.index, data.len());
        Ok(())
    }

    /// ディスクをイジェクト
    pub fn eject(&mut self) {
        self.image = None;
        self.buffer.clear();
        self.byte_offset = 0;
        log_eject(self.index);
    }

    pub fn has_disk(&self) -> bool {
        self.image.is_some()
    }

    pub fn image(&self) -> Option<&[u8]> {
        self.image.as_deref()
    }

    pub fn phases(&self) -> [bool; PHASES] {
        self.phases
    }

    pub fn shaft_position(&self) -> u8 {
        self.shaft_position
    }

    pub fn half_track(&self) -> u8 {
        self.half_track
    }

    /// 現在のトラック番号（ハーフトラック / 2）
    pub fn track(&self) -> u8 {
        self.half_track / 2
    }

    pub fn sector(&self) -> u8 {
        self.sector
    }

    pub fn byte_offset(&self) -> usize {
        self.byte_offset
    }

    pub fn is_motor_on(&self) -> bool {
        self.motor_on
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn set_volume(&mut self, volume: u8) {
        self.volume = volume;
        self.rebuild_buffer();
    }

    /// 最近読み出したニブル
    pub fn recent_nibbles(&self) -> &NibbleRing {
        &self.recent
    }

    /// セーブステートからヘッド位置を復元
    pub fn restore_position(
        &mut self,
        phases: [bool; PHASES],
        shaft_position: u8,
        half_track: u8,
        sector: u8,
        byte_offset: usize,
        motor_on: bool,
    ) {
        self.phases = phases;
        self.shaft_position = shaft_position % SHAFT_POSITIONS;
        self.previous_shaft_position = self.shaft_position;
        self.half_track = half_track.min(MAX_HALF_TRACK);
        self.sector = sector % SECTORS_PER_TRACK as u8;
        self.motor_on = motor_on;
        self.rebuild_buffer();
        self.byte_offset = if byte_offset < self.buffer.len() { byte_offset } else { 0 };
    }

    pub fn motor_on(&mut self) {
        if !self.motor_on {
            log_motor_on(self.index);
        }
        self.motor_on = true;
    }

    pub fn motor_off(&mut self) {
        if self.motor_on {
            log_motor_off(self.index);
            self.recent.dump(32);
        }
        self.motor_on = false;
    }

    pub fn phase_on(&mut self, phase: usize) {
        self.change_phase(phase, true);
    }

    pub fn phase_off(&mut self, phase: usize) {
        self.change_phase(phase, false);
    }

    /// マグネットをON/OFFしてシャフト位置を再計算
    pub fn change_phase(&mut self, phase: usize, on: bool) {
        assert!(phase < PHASES, "invalid stepper phase {}", phase);
        self.phases[phase] = on;
        log_phase(phase as u8, on, self.shaft_position);

        if self.update_shaft_position() {
            self.update_head_track();
        }
    }

    /// シャフト位置を更新、動いたらtrue
    ///
    /// 偶数位置はマグネット（位置/2）と一致、奇数位置は2つのマグネットの中間。
    fn update_shaft_position(&mut self) -> bool {
        self.previous_shaft_position = self.shaft_position;

        let position = self.shaft_position as i8;
        let magnet = position / 2;
        let (left, right) = if position % 2 == 0 {
            ((magnet - 1).rem_euclid(4), (magnet + 1) % 4)
        } else {
            ((position - 1) / 2, ((position + 1) / 2) % 4)
        };
        let left_on = self.phases[left as usize];
        let right_on = self.phases[right as usize];
        let aligned_on = position % 2 == 0 && self.phases[magnet as usize];

        let target = if aligned_on {
            // 現在のマグネットがONなら中間位置までしか動かない
            match (left_on, right_on) {
                (true, false) => Some(left * 2 + 1),
                (false, true) => Some(right * 2 - 1),
                _ => None,
            }
        } else {
            match (left_on, right_on) {
                (true, true) => Some(left * 2 + 1),
                (true, false) => Some(left * 2),
                (false, true) => Some(right * 2),
                (false, false) => None,
            }
        };

        if let Some(target) = target {
            self.shaft_position = target.rem_euclid(SHAFT_POSITIONS as i8) as u8;
        }
        self.shaft_position != self.previous_shaft_position
    }

    /// シャフトの回転に合わせてヘッドを移動
    fn update_head_track(&mut self) {
        let new = self.shaft_position;
        let old = self.previous_shaft_position;
        let previous = self.half_track;

        if new < old {
            if new == 0 && old >= 6 {
                // 時計回りで一周
                self.half_track = self.half_track.saturating_add(1);
            } else if new % 2 == 0 {
                self.half_track = self.half_track.saturating_sub(1);
            }
        } else if new > old {
            if new == 6 && old == 0 {
                // 反時計回りで一周（0->7は奇数位置なので動かない）
                self.half_track = self.half_track.saturating_sub(1);
            } else if new % 2 == 0 {
                self.half_track = self.half_track.saturating_add(1);
            }
        }
        self.half_track = self.half_track.min(MAX_HALF_TRACK);

        if self.half_track != previous {
            log_track_change(previous, self.half_track);
            if self.half_track / 2 != previous / 2 {
                self.rebuild_buffer();
            }
        }
    }

    /// 次のニブルを読み取る（ディスクなしは0xFF）
    pub fn read_next_byte(&mut self) -> u8 {
        if self.image.is_none() {
            return 0xFF;
        }
        if self.buffer.is_empty() {
            self.rebuild_buffer();
        }

        let byte = self.buffer[self.byte_offset];
        self.byte_offset += 1;
        if is_enabled(DiskLogLevel::NIBBLE) {
            self.recent.push(byte);
        }

        if self.byte_offset >= self.buffer.len() {
            self.byte_offset = 0;
            self.sector = (self.sector + 1) % SECTORS_PER_TRACK as u8;
            self.rebuild_buffer();
        }
        byte
    }

    /// 現在のトラック/セクタのニブル列を再構築
    fn rebuild_buffer(&mut self) {
        let Some(image) = self.image.as_deref() else {
            self.buffer.clear();
            return;
        };
        let track = self.half_track / 2;
        log_sector_encode(track, self.sector);
        self.buffer = build_image_sector(image, track, self.sector, self.volume);
        debug_assert_eq!(self.buffer.len(), RAW_SECTOR_LEN);
        if self.byte_offset >= self.buffer.len() {
            self.byte_offset = 0;
        }
    }
}

/// Disk IIコントローラ（$C090-$C09F）
#[derive(Clone)]
pub struct DiskController {
    /// ドライブ0と1
    pub drives: [DiskDrive; 2],
    /// 選択中のドライブ
    curr_drive: usize,
    q6: bool,
    q7: bool,
}

impl Default for DiskController {
    fn default() -> Self {
        Self::new()
    }
}

impl DiskController {
    pub fn new() -> Self {
        DiskController {
            drives: [DiskDrive::new(0), DiskDrive::new(1)],
            curr_drive: 0,
            q6: false,
            q7: false,
        }
    }

    /// リセット
    pub fn reset(&mut self) {
        for drive in self.drives.iter_mut() {
            drive.motor_off();
            drive.reset();
        }
        self.curr_drive = 0;
        self.q6 = false;
        self.q7 = false;
    }

    /// ディスクをロード
    pub fn insert_disk(&mut self, drive: usize, data: &[u8]) -> Result<(), &'static str> {
        self.drives
            .get_mut(drive)
            .ok_or("Invalid drive number")?
            .insert(data)
    }

    /// ディスクをイジェクト
    pub fn eject_disk(&mut self, drive: usize) {
        if let Some(d) = self.drives.get_mut(drive) {
            d.eject();
        }
    }

    pub fn current_drive(&self) -> usize {
        self.curr_drive
    }

    pub fn q6(&self) -> bool {
        self.q6
    }

    pub fn q7(&self) -> bool {
        self.q7
    }

    /// ラッチ状態を復元
    pub fn restore_latches(&mut self, curr_drive: usize, q6: bool, q7: bool) {
        self.curr_drive = curr_drive.min(1);
        self.q6 = q6;
        self.q7 = q7;
    }

    /// I/O読み取り ($C090-$C09F)
    pub fn io_read(&mut self, address: u16) -> u8 {
        let reg = (address & 0x0F) as u8;
        self.control(reg);

        // Q6Lで読み取りモードならシフトレジスタのデータ
        if reg == 0x0C && !self.q7 {
            self.drives[self.curr_drive].read_next_byte()
        } else {
            0
        }
    }

    /// I/O書き込み ($C090-$C09F)
    ///
    /// 読み取りと同じ副作用を持つが、データはイメージに書き込まない。
    pub fn io_write(&mut self, address: u16, _value: u8) {
        let reg = (address & 0x0F) as u8;
        self.control(reg);
    }

    /// アドレスアクセスによる共通の副作用
    fn control(&mut self, reg: u8) {
        match reg {
            // Phase 0-3 ステッパーモーター制御
            0x00..=0x07 => {
                let phase = (reg >> 1) as usize;
                self.drives[self.curr_drive].change_phase(phase, reg & 1 != 0);
            }
            0x08 => self.drives[self.curr_drive].motor_on(),
            0x09 => self.drives[self.curr_drive].motor_off(),
            0x0A => self.enable_drive(0),
            0x0B => self.enable_drive(1),
            0x0C => self.set_latch(false, self.q7),
            0x0D => self.set_latch(true, self.q7),
            0x0E => self.set_latch(self.q6, false),
            0x0F => self.set_latch(self.q6, true),
            _ => {}
        }
    }

    /// ドライブ選択
    fn enable_drive(&mut self, drive: usize) {
        if drive != self.curr_drive {
            log::debug!("Disk drive {} selected", drive + 1);
            log_drive_select(drive);
        }
        self.curr_drive = drive;
    }

    fn set_latch(&mut self, q6: bool, q7: bool) {
        if q6 != self.q6 || q7 != self.q7 {
            log_latch(q6, q7);
        }
        self.q6 = q6;
        self.q7 = q7;
    }
}
