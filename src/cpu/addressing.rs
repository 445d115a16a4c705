//! アドレッシングモードの実装
//!
//! 65C02のアドレッシングモードを定義し、オペランドバイトから
//! 実効アドレス（または値）を求める

use super::{Cpu, MemoryBus};

/// アドレッシングモードの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingMode {
    /// 暗黙的
    Implied,
    /// アキュムレータ - A
    Accumulator,
    /// 即値（Immediate） - #$nn
    Immediate,
    /// ゼロページ - $nn
    ZeroPage,
    /// ゼロページ,X - $nn,X
    ZeroPageX,
    /// ゼロページ,Y - $nn,Y
    ZeroPageY,
    /// 絶対 - $nnnn
    Absolute,
    /// 絶対,X - $nnnn,X
    AbsoluteX,
    /// 絶対,Y - $nnnn,Y
    AbsoluteY,
    /// 間接 - ($nnnn)（JMPのみ）
    Indirect,
    /// 間接,X（プリインデックス） - ($nn,X)
    IndirectX,
    /// 間接,Y（ポストインデックス） - ($nn),Y
    IndirectY,
    /// 間接（ゼロページ、65C02のみ） - ($nn)
    IndirectZeroPage,
    /// 絶対間接,X（65C02のJMPのみ） - ($nnnn,X)
    AbsoluteIndirectX,
    /// 相対（ブランチ命令用） - $nn
    Relative,
    /// ゼロページ + 相対（BBR/BBS用） - $nn,$rr
    ZeroPageRelative,
}

/// 解決済みのオペランド
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    None,
    Accumulator,
    Immediate(u8),
    /// 実効アドレス（ブランチ・ジャンプでは飛び先）
    Address(u16),
    /// BBR/BBS: テストするゼロページアドレスと飛び先
    ZeroPageBranch { address: u16, target: u16 },
}

impl Cpu {
    //--------------------------------------------------
    // アドレッシングモードのヘルパー関数
    //--------------------------------------------------

    /// アドレッシングモードをオペランドに解決
    ///
    /// 呼び出し時点でPCは命令の次を指している。
    pub(super) fn resolve<M: MemoryBus>(
        &self,
        memory: &mut M,
        mode: AddressingMode,
        bytes: [u8; 2],
    ) -> Operand {
        let word = u16::from_le_bytes(bytes);
        match mode {
            AddressingMode::Implied => Operand::None,
            AddressingMode::Accumulator => Operand::Accumulator,
            AddressingMode::Immediate => Operand::Immediate(bytes[0]),
            AddressingMode::ZeroPage => Operand::Address(bytes[0] as u16),
            AddressingMode::ZeroPageX => Operand::Address(self.get_zeropage_indexed_addr(bytes[0], self.regs.x)),
            AddressingMode::ZeroPageY => Operand::Address(self.get_zeropage_indexed_addr(bytes[0], self.regs.y)),
            AddressingMode::Absolute => Operand::Address(word),
            AddressingMode::AbsoluteX => Operand::Address(word.wrapping_add(self.regs.x as u16)),
            AddressingMode::AbsoluteY => Operand::Address(word.wrapping_add(self.regs.y as u16)),
            AddressingMode::Indirect => Operand::Address(self.get_indirect_addr(memory, word)),
            AddressingMode::IndirectX => Operand::Address(self.get_indirect_x_addr(memory, bytes[0])),
            AddressingMode::IndirectY => Operand::Address(self.get_indirect_y_addr(memory, bytes[0])),
            AddressingMode::IndirectZeroPage => Operand::Address(self.get_indirect_zp_addr(memory, bytes[0])),
            AddressingMode::AbsoluteIndirectX => {
                let ptr = word.wrapping_add(self.regs.x as u16);
                Operand::Address(self.read_word(memory, ptr))
            }
            AddressingMode::Relative => Operand::Address(self.get_relative_addr(bytes[0])),
            AddressingMode::ZeroPageRelative => Operand::ZeroPageBranch {
                address: bytes[0] as u16,
                target: self.get_relative_addr(bytes[1]),
            },
        }
    }

    /// ゼロページ,X / ゼロページ,Y（ページ0内で折り返す）
    pub(super) fn get_zeropage_indexed_addr(&self, base: u8, index: u8) -> u16 {
        base.wrapping_add(index) as u16
    }

    /// ゼロページ上のポインタを読む（上位バイトも$00-$FFで折り返す）
    fn read_zeropage_pointer<M: MemoryBus>(&self, memory: &mut M, ptr: u8) -> u16 {
        let low = memory.read(ptr as u16) as u16;
        let high = memory.read(ptr.wrapping_add(1) as u16) as u16;
        (high << 8) | low
    }

    /// 間接アドレス（JMP専用）
    ///
    /// ($xxFF)は上位バイトを$xx00から読むNMOSのバグを再現する。
    pub(super) fn get_indirect_addr<M: MemoryBus>(&self, memory: &mut M, ptr: u16) -> u16 {
        let low = memory.read(ptr) as u16;
        let high_addr = (ptr & 0xFF00) | (ptr.wrapping_add(1) & 0x00FF);
        let high = memory.read(high_addr) as u16;
        (high << 8) | low
    }

    /// 間接,Xアドレスを取得
    pub(super) fn get_indirect_x_addr<M: MemoryBus>(&self, memory: &mut M, base: u8) -> u16 {
        self.read_zeropage_pointer(memory, base.wrapping_add(self.regs.x))
    }

    /// 間接,Yアドレスを取得
    pub(super) fn get_indirect_y_addr<M: MemoryBus>(&self, memory: &mut M, ptr: u8) -> u16 {
        self.read_zeropage_pointer(memory, ptr)
            .wrapping_add(self.regs.y as u16)
    }

    /// 間接アドレス（ゼロページ、65C02用）
    pub(super) fn get_indirect_zp_addr<M: MemoryBus>(&self, memory: &mut M, ptr: u8) -> u16 {
        self.read_zeropage_pointer(memory, ptr)
    }

    /// 相対アドレス（ブランチ用）
    pub(super) fn get_relative_addr(&self, offset: u8) -> u16 {
        self.regs.pc.wrapping_add(offset as i8 as u16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FlatMemory(Vec<u8>);

    impl MemoryBus for FlatMemory {
        fn read(&mut self, address: u16) -> u8 {
            self.0[address as usize]
        }

        fn write(&mut self, address: u16, value: u8) {
            self.0[address as usize] = value;
        }
    }

    #[test]
    fn test_resolve_modes() {
        let mut mem = FlatMemory(vec![0; 0x10000]);
        mem.0[0x0010] = 0x00;
        mem.0[0x0011] = 0x20;
        let mut cpu = Cpu::new();
        cpu.regs.pc = 0x0300;
        cpu.regs.x = 0x05;
        cpu.regs.y = 0x10;

        assert_eq!(
            cpu.resolve(&mut mem, AddressingMode::ZeroPageX, [0xFE, 0]),
            Operand::Address(0x0003)
        );
        assert_eq!(
            cpu.resolve(&mut mem, AddressingMode::AbsoluteY, [0xF8, 0xFF]),
            Operand::Address(0x0008)
        );
        assert_eq!(
            cpu.resolve(&mut mem, AddressingMode::IndirectY, [0x10, 0]),
            Operand::Address(0x2010)
        );
        assert_eq!(
            cpu.resolve(&mut mem, AddressingMode::IndirectZeroPage, [0x10, 0]),
            Operand::Address(0x2000)
        );
        assert_eq!(
            cpu.resolve(&mut mem, AddressingMode::Relative, [0x80, 0]),
            Operand::Address(0x0280)
        );
        assert_eq!(
            cpu.resolve(&mut mem, AddressingMode::ZeroPageRelative, [0x10, 0x05]),
            Operand::ZeroPageBranch { address: 0x0010, target: 0x0305 }
        );
    }

    #[test]
    fn test_indirect_page_wrap() {
        let mut mem = FlatMemory(vec![0; 0x10000]);
        mem.0[0x02FF] = 0x00;
        mem.0[0x0200] = 0x40;
        mem.0[0x0300] = 0x80;
        let cpu = Cpu::new();
        assert_eq!(cpu.get_indirect_addr(&mut mem, 0x02FF), 0x4000);
    }

    #[test]
    fn test_zeropage_pointer_wrap() {
        let mut mem = FlatMemory(vec![0; 0x10000]);
        mem.0[0x00FF] = 0x34;
        mem.0[0x0000] = 0x12;
        let cpu = Cpu::new();
        assert_eq!(cpu.get_indirect_zp_addr(&mut mem, 0xFF), 0x1234);
    }
}
