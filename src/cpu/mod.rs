//! WDC 65C02 CPU Emulator
//!
//! Apple IIeで使用される65C02プロセッサのエミュレーション実装
//! 256エントリの命令テーブルでフェッチ・デコード・実行を行う

pub mod addressing;
mod opcodes;
pub mod table;

pub use addressing::{AddressingMode, Operand};
pub use table::{Instruction, Op, OPCODES};

/// CPUのステータスレジスタのフラグビット
pub mod flags {
    pub const CARRY: u8 = 0b0000_0001;      // C: キャリーフラグ
    pub const ZERO: u8 = 0b0000_0010;       // Z: ゼロフラグ
    pub const IRQ_DISABLE: u8 = 0b0000_0100; // I: 割り込み禁止フラグ
    pub const DECIMAL: u8 = 0b0000_1000;    // D: BCDモードフラグ
    pub const BREAK: u8 = 0b0001_0000;      // B: ブレークフラグ
    pub const UNUSED: u8 = 0b0010_0000;     // 未使用（プッシュ時は1）
    pub const OVERFLOW: u8 = 0b0100_0000;   // V: オーバーフローフラグ
    pub const NEGATIVE: u8 = 0b1000_0000;   // N: 負数フラグ
}

/// 電源投入時のブートストラップアドレス
pub const BOOT_ADDRESS: u16 = 0xFA62;

/// 割り込みベクター
pub const RESET_VECTOR: u16 = 0xFFFC;
pub const IRQ_VECTOR: u16 = 0xFFFE;

/// スタックページ
pub const STACK_BASE: u16 = 0x0100;

/// CPUレジスタの状態
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registers {
    /// アキュムレータ（A）
    pub a: u8,
    /// Xインデックスレジスタ
    pub x: u8,
    /// Yインデックスレジスタ
    pub y: u8,
    /// スタックポインタ（$0100からのオフセット）
    pub sp: u8,
    /// プログラムカウンタ
    pub pc: u16,
    /// ステータスレジスタ（プロセッサフラグ）
    pub status: u8,
}

impl Default for Registers {
    fn default() -> Self {
        Registers {
            a: 0,
            x: 0,
            y: 0,
            sp: 0xFF,
            pc: BOOT_ADDRESS,
            status: 0,
        }
    }
}

impl Registers {
    /// フラグをセット
    pub fn set_flag(&mut self, flag: u8, value: bool) {
        if value {
            self.status |= flag;
        } else {
            self.status &= !flag;
        }
    }

    /// フラグを取得
    pub fn get_flag(&self, flag: u8) -> bool {
        (self.status & flag) != 0
    }

    /// ゼロフラグと負数フラグを値に基づいて更新
    pub fn update_zero_negative_flags(&mut self, value: u8) {
        self.set_flag(flags::ZERO, value == 0);
        self.set_flag(flags::NEGATIVE, (value & 0x80) != 0);
    }
}

/// メモリバスインターフェース
/// CPUがメモリにアクセスするために必要なトレイト
pub trait MemoryBus {
    /// メモリから1バイト読み取り（ソフトスイッチ等の副作用あり）
    fn read(&mut self, address: u16) -> u8;
    /// メモリに1バイト書き込み
    fn write(&mut self, address: u16, value: u8);
}

/// 65C02 CPUエミュレータ
#[derive(Debug, Clone)]
pub struct Cpu {
    /// CPUレジスタ
    pub regs: Registers,
    /// 累積サイクル数
    pub total_cycles: u64,
    /// 直前の命令で消費したサイクル
    pub cycles: u32,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu {
    /// 新しいCPUインスタンスを作成
    pub fn new() -> Self {
        Cpu {
            regs: Registers::default(),
            total_cycles: 0,
            cycles: 0,
        }
    }

    /// 電源投入時の状態に戻す（PCはブートストラップアドレス）
    pub fn reset<M: MemoryBus>(&mut self, _memory: &mut M) {
        self.regs = Registers::default();
        self.cycles = 0;
    }

    /// RESETラインと同様にリセットベクター（$FFFC-$FFFD）からPCを読み込む
    pub fn reset_from_vector<M: MemoryBus>(&mut self, memory: &mut M) {
        self.regs = Registers::default();
        self.regs.pc = self.read_word(memory, RESET_VECTOR);
        self.cycles = 7;
        self.total_cycles += 7;
    }

    /// 1命令を実行し、消費したサイクル数を返す
    pub fn step<M: MemoryBus>(&mut self, memory: &mut M) -> u32 {
        let pc = self.regs.pc;
        let opcode = memory.read(pc);
        let instr = &OPCODES[opcode as usize];
        assert!(
            (1..=3).contains(&instr.len),
            "bad instruction length {} for ${:02X}",
            instr.len,
            opcode
        );

        // オペランドを読んでPCを命令の次へ進める
        let mut bytes = [0u8; 2];
        for (i, byte) in bytes.iter_mut().take(instr.len as usize - 1).enumerate() {
            *byte = memory.read(pc.wrapping_add(1 + i as u16));
        }
        self.regs.pc = pc.wrapping_add(instr.len as u16);

        let operand = self.resolve(memory, instr.mode, bytes);
        self.execute(memory, instr.op, instr.mode, operand);

        self.cycles = instr.cycles as u32;
        self.total_cycles += self.cycles as u64;
        self.cycles
    }

    /// 次に実行する命令
    pub fn next_instruction<M: MemoryBus>(&self, memory: &mut M) -> &'static Instruction {
        &OPCODES[memory.read(self.regs.pc) as usize]
    }

    /// リトルエンディアンで2バイト読み取り
    pub(crate) fn read_word<M: MemoryBus>(&self, memory: &mut M, address: u16) -> u16 {
        let low = memory.read(address) as u16;
        let high = memory.read(address.wrapping_add(1)) as u16;
        (high << 8) | low
    }

    /// スタックに1バイトプッシュ
    fn push_byte<M: MemoryBus>(&mut self, memory: &mut M, value: u8) {
        memory.write(STACK_BASE | self.regs.sp as u16, value);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
    }

    /// スタックから1バイトポップ
    fn pop_byte<M: MemoryBus>(&mut self, memory: &mut M) -> u8 {
        self.regs.sp = self.regs.sp.wrapping_add(1);
        memory.read(STACK_BASE | self.regs.sp as u16)
    }

    /// スタックに2バイトプッシュ（上位バイト先）
    fn push_word<M: MemoryBus>(&mut self, memory: &mut M, value: u16) {
        self.push_byte(memory, (value >> 8) as u8);
        self.push_byte(memory, value as u8);
    }

    /// スタックから2バイトポップ
    fn pop_word<M: MemoryBus>(&mut self, memory: &mut M) -> u16 {
        let low = self.pop_byte(memory) as u16;
        let high = self.pop_byte(memory) as u16;
        (high << 8) | low
    }
}

/// パックドBCDを2進数に変換
pub fn from_bcd(value: u8) -> u8 {
    (value >> 4) * 10 + (value & 0x0F)
}

/// 0-99の2進数をパックドBCDに変換
pub fn to_bcd(value: u8) -> u8 {
    ((value / 10) << 4) | (value % 10)
}
