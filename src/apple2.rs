//! Apple IIe エミュレータ
//!
//! CPU、メモリ、ディスクを統合し、実行ループとブレークポイントを提供する。
//! 画面描画やキー入力は`Frontend`トレイトの実装側が担当する。

use std::collections::{BTreeSet, VecDeque};

use crate::cpu::{Cpu, STACK_BASE};
use crate::disasm;
use crate::memory::{Memory, Region};
use crate::savestate::{CpuState, DiskState, MemoryState, SaveState, SwitchState};

/// NTSC: 262スキャンライン × 65サイクル/ライン
pub const CYCLES_PER_FRAME: u64 = 17030;
const CYCLES_PER_SCANLINE: u64 = 65;
/// 表示期間のスキャンライン数（以降はVBL）
const VISIBLE_SCANLINES: u64 = 192;

/// 1.023MHz / 60Hz の10フレームごとに再描画
pub const DEFAULT_REDRAW_INTERVAL: u64 = 17050 * 10;
/// イベントポーリングの間隔
pub const DEFAULT_POLL_INTERVAL: u64 = 100;

/// 実行ループが止まった理由
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// ブレークポイントに到達（命令の実行前）
    Breakpoint(u16),
    /// 指定サイクル数を消化
    CycleLimit,
    /// フロントエンドが終了を要求
    Quit,
}

/// フロントエンドからの応答
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontendEvent {
    Continue,
    Quit,
}

/// 画面描画と入力を担当する外部コンポーネント
pub trait Frontend {
    /// 画面の再描画（`Memory::region`とソフトスイッチを参照する）
    fn redraw(&mut self, memory: &Memory);
    /// 入力のポーリング（キー入力は`Memory::set_key`で渡す）
    fn poll(&mut self, memory: &mut Memory) -> FrontendEvent;
}

/// 何もしないフロントエンド（ヘッドレス実行用）
#[derive(Debug, Default)]
pub struct Headless;

impl Frontend for Headless {
    fn redraw(&mut self, _memory: &Memory) {}

    fn poll(&mut self, _memory: &mut Memory) -> FrontendEvent {
        FrontendEvent::Continue
    }
}

/// 文字列をキー入力として順に流し込むフロントエンド
///
/// ストローブがクリアされる（プログラムがキーを読んだ）たびに次の文字を送る。
#[derive(Debug, Default)]
pub struct KeyScript {
    pending: VecDeque<u8>,
}

impl KeyScript {
    /// `\n`はReturn（$0D）に変換し、英字は大文字にする
    pub fn new(text: &str) -> Self {
        let pending = text
            .bytes()
            .map(|b| if b == b'\n' { 0x0D } else { b.to_ascii_uppercase() })
            .collect();
        KeyScript { pending }
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl Frontend for KeyScript {
    fn redraw(&mut self, _memory: &Memory) {}

    fn poll(&mut self, memory: &mut Memory) -> FrontendEvent {
        if !memory.has_key_strobe() {
            if let Some(key) = self.pending.pop_front() {
                memory.set_key(key);
            }
        }
        FrontendEvent::Continue
    }
}

/// Apple IIeエミュレータのメイン構造体
pub struct Apple2 {
    /// 65C02 CPU
    pub cpu: Cpu,
    /// メモリシステム（ソフトスイッチとDisk IIを含む）
    pub memory: Memory,
    /// PCブレークポイント（到達すると解除される）
    breakpoints: BTreeSet<u16>,
    /// 命令トレース（log::trace!に出力）
    pub trace: bool,
    /// 再描画の間隔（サイクル）
    pub redraw_interval: u64,
    /// ポーリングの間隔（サイクル）
    pub poll_interval: u64,
}

impl Default for Apple2 {
    fn default() -> Self {
        Self::new()
    }
}

impl Apple2 {
    /// 新しいエミュレータインスタンスを作成
    pub fn new() -> Self {
        Apple2 {
            cpu: Cpu::new(),
            memory: Memory::new(),
            breakpoints: BTreeSet::new(),
            trace: false,
            redraw_interval: DEFAULT_REDRAW_INTERVAL,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// ROMをロード（APPLE2E.ROM、32KB）
    pub fn load_rom(&mut self, rom_data: &[u8]) -> Result<(), &'static str> {
        self.memory.load_rom(rom_data)
    }

    /// ディスクイメージをロード
    pub fn load_disk(&mut self, drive: usize, data: &[u8]) -> Result<(), &'static str> {
        if drive > 1 {
            return Err("Invalid drive number");
        }
        self.memory.disk.insert_disk(drive, data)?;
        log::info!("Disk inserted into drive {} ({} bytes)", drive + 1, data.len());
        Ok(())
    }

    /// ディスクをイジェクト
    pub fn eject_disk(&mut self, drive: usize) {
        self.memory.disk.eject_disk(drive);
    }

    /// 電源投入時の状態にリセット（PCはブートストラップアドレス）
    pub fn reset(&mut self) {
        self.memory.reset();
        self.cpu.reset(&mut self.memory);
        self.cpu.total_cycles = 0;
    }

    /// キー入力を処理
    pub fn key_down(&mut self, key: u8) {
        self.memory.set_key(key);
    }

    /// キーストローブが有効かどうかを確認
    pub fn has_key_strobe(&self) -> bool {
        self.memory.has_key_strobe()
    }

    //--------------------------------------------------
    // ブレークポイント
    //--------------------------------------------------

    pub fn add_breakpoint(&mut self, address: u16) {
        self.breakpoints.insert(address);
    }

    pub fn remove_breakpoint(&mut self, address: u16) -> bool {
        self.breakpoints.remove(&address)
    }

    pub fn clear_breakpoints(&mut self) {
        self.breakpoints.clear();
    }

    pub fn breakpoints(&self) -> impl Iterator<Item = u16> + '_ {
        self.breakpoints.iter().copied()
    }

    //--------------------------------------------------
    // 実行
    //--------------------------------------------------

    /// 1命令を実行
    pub fn step(&mut self) -> u32 {
        self.update_vbl();

        if self.trace {
            let line = disasm::disassemble(&self.memory, self.cpu.regs.pc, &self.cpu.regs);
            log::trace!("{}", line);
        }

        self.cpu.step(&mut self.memory)
    }

    /// ブレークポイント、サイクル上限、終了要求のいずれかまで実行
    ///
    /// `limit`はこの呼び出しで消費するサイクル数の上限。
    pub fn run<F: Frontend>(&mut self, frontend: &mut F, limit: Option<u64>) -> StopReason {
        let start = self.cpu.total_cycles;
        let redraw_interval = self.redraw_interval.max(1);
        let poll_interval = self.poll_interval.max(1);
        let mut next_redraw = start + redraw_interval;
        let mut next_poll = start + poll_interval;

        loop {
            let pc = self.cpu.regs.pc;
            if self.breakpoints.remove(&pc) {
                log::info!("Breakpoint on PC(${:04X})", pc);
                return StopReason::Breakpoint(pc);
            }

            if let Some(limit) = limit {
                if self.cpu.total_cycles - start >= limit {
                    return StopReason::CycleLimit;
                }
            }

            self.step();
            let now = self.cpu.total_cycles;

            if now >= next_redraw {
                frontend.redraw(&self.memory);
                next_redraw = now + redraw_interval;
            }

            if now >= next_poll {
                next_poll = now + poll_interval;
                if frontend.poll(&mut self.memory) == FrontendEvent::Quit {
                    log::info!("Quit requested at PC ${:04X}", self.cpu.regs.pc);
                    return StopReason::Quit;
                }
            }
        }
    }

    /// スタックトップの戻りアドレスに戻るまで実行
    ///
    /// JSRが積んだアドレスを仮定するので、スタックに別の値があると止まらない。
    pub fn run_until_return<F: Frontend>(&mut self, frontend: &mut F, limit: Option<u64>) -> StopReason {
        let target = self.return_address();
        log::debug!("Executing until PC == {:04X}", target);
        self.add_breakpoint(target);
        self.run(frontend, limit)
    }

    /// スタックトップのアドレス+1
    pub fn return_address(&self) -> u16 {
        let sp = self.cpu.regs.sp;
        let low = self.memory.peek(STACK_BASE | sp.wrapping_add(1) as u16);
        let high = self.memory.peek(STACK_BASE | sp.wrapping_add(2) as u16);
        u16::from_le_bytes([low, high]).wrapping_add(1)
    }

    /// サイクル数からVBL期間かどうかを更新
    fn update_vbl(&mut self) {
        let frame_cycles = self.cpu.total_cycles % CYCLES_PER_FRAME;
        let scanline = frame_cycles / CYCLES_PER_SCANLINE;
        self.memory.switches.vbl = scanline >= VISIBLE_SCANLINES;
    }

    //--------------------------------------------------
    // セーブステート
    //--------------------------------------------------

    fn region_bytes(&self, region: Region) -> Vec<u8> {
        self.memory
            .region(region)
            .map(|r| r.data().to_vec())
            .unwrap_or_default()
    }

    fn restore_region(&mut self, region: Region, data: &[u8]) -> Result<(), &'static str> {
        match self.memory.region_mut(region) {
            Some(r) => r.set_data(data),
            None => Err("Region has no backing storage"),
        }
    }

    /// 現在の状態をセーブステートとして取得
    pub fn save_state(&self) -> SaveState {
        let regs = &self.cpu.regs;
        SaveState {
            version: SaveState::CURRENT_VERSION,
            cpu: CpuState {
                a: regs.a,
                x: regs.x,
                y: regs.y,
                sp: regs.sp,
                pc: regs.pc,
                status: regs.status,
                total_cycles: self.cpu.total_cycles,
            },
            memory: MemoryState {
                main_ram: self.region_bytes(Region::MainRam),
                aux_ram: self.region_bytes(Region::AuxRam),
                main_bank2: self.region_bytes(Region::MainBank2),
                aux_bank2: self.region_bytes(Region::AuxBank2),
                switches: SwitchState::capture(&self.memory.switches),
            },
            disk: DiskState::capture(&self.memory.disk),
        }
    }

    /// セーブステートから状態を復元
    pub fn load_state(&mut self, state: &SaveState) -> Result<(), &'static str> {
        if state.version != SaveState::CURRENT_VERSION {
            return Err("Incompatible save state version");
        }

        let regions = [
            (Region::MainRam, &state.memory.main_ram),
            (Region::AuxRam, &state.memory.aux_ram),
            (Region::MainBank2, &state.memory.main_bank2),
            (Region::AuxBank2, &state.memory.aux_bank2),
        ];

        // 何も変更しないうちにサイズを確認
        for (region, data) in regions.iter() {
            if self.memory.region(*region).map(|r| r.len()) != Some(data.len()) {
                return Err("Save state memory size mismatch");
            }
        }
        state.disk.validate()?;

        // メモリ状態を復元
        for (region, data) in regions.iter() {
            self.restore_region(*region, data)?;
        }
        state.memory.switches.apply(&mut self.memory.switches);

        // ディスク状態を復元
        state.disk.apply(&mut self.memory.disk)?;

        // CPU状態を復元
        let regs = &mut self.cpu.regs;
        regs.a = state.cpu.a;
        regs.x = state.cpu.x;
        regs.y = state.cpu.y;
        regs.sp = state.cpu.sp;
        regs.pc = state.cpu.pc;
        regs.status = state.cpu.status;
        self.cpu.total_cycles = state.cpu.total_cycles;

        log::info!("State restored (PC=${:04X})", state.cpu.pc);
        Ok(())
    }
}
