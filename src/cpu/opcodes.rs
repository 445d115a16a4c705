//! オペコードの実装
//!
//! 命令テーブルで解決済みのオペランドに対して各命令を実行する

use super::addressing::{AddressingMode, Operand};
use super::table::Op;
use super::{flags, from_bcd, to_bcd, Cpu, MemoryBus, IRQ_VECTOR};

impl Cpu {
    /// 1命令を実行（PCは既に次の命令を指している）
    pub(super) fn execute<M: MemoryBus>(
        &mut self,
        memory: &mut M,
        op: Op,
        mode: AddressingMode,
        operand: Operand,
    ) {
        match op {
            //--------------------------------------------------
            // Load / Store
            //--------------------------------------------------
            Op::Lda => {
                self.regs.a = self.load(memory, operand);
                self.regs.update_zero_negative_flags(self.regs.a);
            }
            Op::Ldx => {
                self.regs.x = self.load(memory, operand);
                self.regs.update_zero_negative_flags(self.regs.x);
            }
            Op::Ldy => {
                self.regs.y = self.load(memory, operand);
                self.regs.update_zero_negative_flags(self.regs.y);
            }
            Op::Sta => self.store(memory, operand, self.regs.a),
            Op::Stx => self.store(memory, operand, self.regs.x),
            Op::Sty => self.store(memory, operand, self.regs.y),
            Op::Stz => self.store(memory, operand, 0),

            //--------------------------------------------------
            // Transfer
            //--------------------------------------------------
            Op::Tax => {
                self.regs.x = self.regs.a;
                self.regs.update_zero_negative_flags(self.regs.x);
            }
            Op::Txa => {
                self.regs.a = self.regs.x;
                self.regs.update_zero_negative_flags(self.regs.a);
            }
            Op::Tay => {
                self.regs.y = self.regs.a;
                self.regs.update_zero_negative_flags(self.regs.y);
            }
            Op::Tya => {
                self.regs.a = self.regs.y;
                self.regs.update_zero_negative_flags(self.regs.a);
            }
            Op::Tsx => {
                self.regs.x = self.regs.sp;
                self.regs.update_zero_negative_flags(self.regs.x);
            }
            // TXSはフラグを変えない
            Op::Txs => self.regs.sp = self.regs.x,

            //--------------------------------------------------
            // Stack
            //--------------------------------------------------
            Op::Pha => self.push_byte(memory, self.regs.a),
            Op::Phx => self.push_byte(memory, self.regs.x),
            Op::Phy => self.push_byte(memory, self.regs.y),
            Op::Php => {
                let status = self.regs.status | flags::BREAK | flags::UNUSED;
                self.push_byte(memory, status);
            }
            Op::Pla => {
                self.regs.a = self.pop_byte(memory);
                self.regs.update_zero_negative_flags(self.regs.a);
            }
            Op::Plx => {
                self.regs.x = self.pop_byte(memory);
                self.regs.update_zero_negative_flags(self.regs.x);
            }
            Op::Ply => {
                self.regs.y = self.pop_byte(memory);
                self.regs.update_zero_negative_flags(self.regs.y);
            }
            Op::Plp => {
                let status = self.pop_byte(memory);
                self.restore_status(status);
            }

            //--------------------------------------------------
            // ADC / SBC - Add / Subtract with Carry
            //--------------------------------------------------
            Op::Adc => {
                let value = self.load(memory, operand);
                self.do_adc(value);
            }
            Op::Sbc => {
                let value = self.load(memory, operand);
                self.do_sbc(value);
            }

            //--------------------------------------------------
            // CMP / CPX / CPY - Compare
            //--------------------------------------------------
            Op::Cmp => {
                let value = self.load(memory, operand);
                self.compare(self.regs.a, value);
            }
            Op::Cpx => {
                let value = self.load(memory, operand);
                self.compare(self.regs.x, value);
            }
            Op::Cpy => {
                let value = self.load(memory, operand);
                self.compare(self.regs.y, value);
            }

            //--------------------------------------------------
            // INC / DEC - Increment / Decrement
            //--------------------------------------------------
            Op::Inc => {
                self.modify(memory, operand, |_, value| value.wrapping_add(1));
            }
            Op::Dec => {
                self.modify(memory, operand, |_, value| value.wrapping_sub(1));
            }
            Op::Inx => {
                self.regs.x = self.regs.x.wrapping_add(1);
                self.regs.update_zero_negative_flags(self.regs.x);
            }
            Op::Iny => {
                self.regs.y = self.regs.y.wrapping_add(1);
                self.regs.update_zero_negative_flags(self.regs.y);
            }
            Op::Dex => {
                self.regs.x = self.regs.x.wrapping_sub(1);
                self.regs.update_zero_negative_flags(self.regs.x);
            }
            Op::Dey => {
                self.regs.y = self.regs.y.wrapping_sub(1);
                self.regs.update_zero_negative_flags(self.regs.y);
            }

            //--------------------------------------------------
            // AND / ORA / EOR - Logical
            //--------------------------------------------------
            Op::And => {
                self.regs.a &= self.load(memory, operand);
                self.regs.update_zero_negative_flags(self.regs.a);
            }
            Op::Ora => {
                self.regs.a |= self.load(memory, operand);
                self.regs.update_zero_negative_flags(self.regs.a);
            }
            Op::Eor => {
                self.regs.a ^= self.load(memory, operand);
                self.regs.update_zero_negative_flags(self.regs.a);
            }

            //--------------------------------------------------
            // BIT - Bit Test
            //--------------------------------------------------
            Op::Bit => {
                let value = self.load(memory, operand);
                self.regs.set_flag(flags::ZERO, (self.regs.a & value) == 0);
                // 即値モードはZのみ
                if mode != AddressingMode::Immediate {
                    self.regs.set_flag(flags::OVERFLOW, (value & 0x40) != 0);
                    self.regs.set_flag(flags::NEGATIVE, (value & 0x80) != 0);
                }
            }

            //--------------------------------------------------
            // TSB / TRB - Test and Set / Reset Bits
            //--------------------------------------------------
            Op::Tsb => {
                let value = self.load(memory, operand);
                self.regs.set_flag(flags::ZERO, (self.regs.a & value) == 0);
                self.store(memory, operand, value | self.regs.a);
            }
            Op::Trb => {
                let value = self.load(memory, operand);
                self.regs.set_flag(flags::ZERO, (self.regs.a & value) == 0);
                self.store(memory, operand, value & !self.regs.a);
            }

            //--------------------------------------------------
            // ASL / LSR / ROL / ROR - Shift and Rotate
            //--------------------------------------------------
            Op::Asl => {
                self.modify(memory, operand, |cpu, value| {
                    cpu.regs.set_flag(flags::CARRY, (value & 0x80) != 0);
                    value << 1
                });
            }
            Op::Lsr => {
                self.modify(memory, operand, |cpu, value| {
                    cpu.regs.set_flag(flags::CARRY, (value & 0x01) != 0);
                    value >> 1
                });
            }
            Op::Rol => {
                self.modify(memory, operand, |cpu, value| {
                    let carry_in = cpu.regs.get_flag(flags::CARRY) as u8;
                    cpu.regs.set_flag(flags::CARRY, (value & 0x80) != 0);
                    (value << 1) | carry_in
                });
            }
            Op::Ror => {
                self.modify(memory, operand, |cpu, value| {
                    let carry_in = (cpu.regs.get_flag(flags::CARRY) as u8) << 7;
                    cpu.regs.set_flag(flags::CARRY, (value & 0x01) != 0);
                    (value >> 1) | carry_in
                });
            }

            //--------------------------------------------------
            // Branch
            //--------------------------------------------------
            Op::Bpl => self.branch(!self.regs.get_flag(flags::NEGATIVE), operand),
            Op::Bmi => self.branch(self.regs.get_flag(flags::NEGATIVE), operand),
            Op::Bvc => self.branch(!self.regs.get_flag(flags::OVERFLOW), operand),
            Op::Bvs => self.branch(self.regs.get_flag(flags::OVERFLOW), operand),
            Op::Bcc => self.branch(!self.regs.get_flag(flags::CARRY), operand),
            Op::Bcs => self.branch(self.regs.get_flag(flags::CARRY), operand),
            Op::Bne => self.branch(!self.regs.get_flag(flags::ZERO), operand),
            Op::Beq => self.branch(self.regs.get_flag(flags::ZERO), operand),
            Op::Bra => self.branch(true, operand),

            //--------------------------------------------------
            // JMP / JSR / RTS
            //--------------------------------------------------
            Op::Jmp => {
                if let Operand::Address(target) = operand {
                    self.regs.pc = target;
                }
            }
            Op::Jsr => {
                if let Operand::Address(target) = operand {
                    // 戻りアドレス-1を積む
                    self.push_word(memory, self.regs.pc.wrapping_sub(1));
                    self.regs.pc = target;
                }
            }
            Op::Rts => {
                self.regs.pc = self.pop_word(memory).wrapping_add(1);
            }

            //--------------------------------------------------
            // BRK / RTI
            //--------------------------------------------------
            Op::Brk => {
                // シグネチャバイトを飛ばしたアドレスを積む
                self.push_word(memory, self.regs.pc.wrapping_add(1));
                let status = self.regs.status | flags::BREAK | flags::UNUSED;
                self.push_byte(memory, status);
                self.regs.set_flag(flags::IRQ_DISABLE, true);
                // 65C02はBRKでDフラグをクリア
                self.regs.set_flag(flags::DECIMAL, false);
                self.regs.pc = self.read_word(memory, IRQ_VECTOR);
            }
            Op::Rti => {
                let status = self.pop_byte(memory);
                self.restore_status(status);
                self.regs.pc = self.pop_word(memory);
            }

            //--------------------------------------------------
            // Flag
            //--------------------------------------------------
            Op::Clc => self.regs.set_flag(flags::CARRY, false),
            Op::Sec => self.regs.set_flag(flags::CARRY, true),
            Op::Cli => self.regs.set_flag(flags::IRQ_DISABLE, false),
            Op::Sei => self.regs.set_flag(flags::IRQ_DISABLE, true),
            Op::Clv => self.regs.set_flag(flags::OVERFLOW, false),
            Op::Cld => self.regs.set_flag(flags::DECIMAL, false),
            Op::Sed => self.regs.set_flag(flags::DECIMAL, true),

            //--------------------------------------------------
            // RMB / SMB / BBR / BBS (65C02)
            //--------------------------------------------------
            Op::Rmb(bit) => {
                self.modify_quiet(memory, operand, |value| value & !(1 << bit));
            }
            Op::Smb(bit) => {
                self.modify_quiet(memory, operand, |value| value | (1 << bit));
            }
            Op::Bbr(bit) => {
                if let Operand::ZeroPageBranch { address, target } = operand {
                    if memory.read(address) & (1 << bit) == 0 {
                        self.regs.pc = target;
                    }
                }
            }
            Op::Bbs(bit) => {
                if let Operand::ZeroPageBranch { address, target } = operand {
                    if memory.read(address) & (1 << bit) != 0 {
                        self.regs.pc = target;
                    }
                }
            }

            // 未定義オペコードもここに来る（オペランドは読み飛ばし済み）
            Op::Nop => {}
        }
    }

    /// オペランドの値を読む
    fn load<M: MemoryBus>(&self, memory: &mut M, operand: Operand) -> u8 {
        match operand {
            Operand::Accumulator => self.regs.a,
            Operand::Immediate(value) => value,
            Operand::Address(addr) => memory.read(addr),
            Operand::ZeroPageBranch { address, .. } => memory.read(address),
            Operand::None => 0,
        }
    }

    /// オペランドに値を書く
    fn store<M: MemoryBus>(&mut self, memory: &mut M, operand: Operand, value: u8) {
        match operand {
            Operand::Accumulator => self.regs.a = value,
            Operand::Address(addr) => memory.write(addr, value),
            _ => {}
        }
    }

    /// リードモディファイライト（結果でZ/Nを更新）
    fn modify<M, F>(&mut self, memory: &mut M, operand: Operand, f: F)
    where
        M: MemoryBus,
        F: FnOnce(&mut Self, u8) -> u8,
    {
        let value = self.load(memory, operand);
        let result = f(self, value);
        self.regs.update_zero_negative_flags(result);
        self.store(memory, operand, result);
    }

    /// フラグを変えないリードモディファイライト
    fn modify_quiet<M, F>(&mut self, memory: &mut M, operand: Operand, f: F)
    where
        M: MemoryBus,
        F: FnOnce(u8) -> u8,
    {
        let value = self.load(memory, operand);
        self.store(memory, operand, f(value));
    }

    fn branch(&mut self, condition: bool, operand: Operand) {
        if !condition {
            return;
        }
        if let Operand::Address(target) = operand {
            self.regs.pc = target;
        }
    }

    fn compare(&mut self, register: u8, value: u8) {
        let result = register.wrapping_sub(value);
        self.regs.set_flag(flags::CARRY, register >= value);
        self.regs.update_zero_negative_flags(result);
    }

    /// PLP/RTIで取り出したステータスを反映（Bは保持しない）
    fn restore_status(&mut self, status: u8) {
        self.regs.status = (status & !flags::BREAK) | flags::UNUSED;
    }

    //--------------------------------------------------
    // ADC - Add with Carry
    //--------------------------------------------------
    fn do_adc(&mut self, value: u8) {
        let a = self.regs.a;
        let carry = self.regs.get_flag(flags::CARRY) as u16;

        // Vは10進モードでも2進の加算結果から求める
        let binary = a as u16 + value as u16 + carry;
        let binary8 = binary as u8;
        self.regs.set_flag(
            flags::OVERFLOW,
            ((a ^ binary8) & (value ^ binary8) & 0x80) != 0,
        );

        let result = if self.regs.get_flag(flags::DECIMAL) {
            let sum = from_bcd(a) as u16 + from_bcd(value) as u16 + carry;
            self.regs.set_flag(flags::CARRY, sum > 99);
            to_bcd((sum % 100) as u8)
        } else {
            self.regs.set_flag(flags::CARRY, binary > 0xFF);
            binary8
        };

        self.regs.a = result;
        self.regs.update_zero_negative_flags(result);
    }

    //--------------------------------------------------
    // SBC - Subtract with Carry
    //--------------------------------------------------
    fn do_sbc(&mut self, value: u8) {
        if !self.regs.get_flag(flags::DECIMAL) {
            // 2進モードは補数の加算
            self.do_adc(!value);
            return;
        }

        let a = self.regs.a;
        let carry = self.regs.get_flag(flags::CARRY) as u16;

        let binary = a as u16 + (!value) as u16 + carry;
        let binary8 = binary as u8;
        self.regs.set_flag(
            flags::OVERFLOW,
            ((a ^ binary8) & (!value ^ binary8) & 0x80) != 0,
        );

        let borrow = 1 - carry as i16;
        let diff = from_bcd(a) as i16 - from_bcd(value) as i16 - borrow;
        self.regs.set_flag(flags::CARRY, diff >= 0);
        let result = to_bcd(diff.rem_euclid(100) as u8);

        self.regs.a = result;
        self.regs.update_zero_negative_flags(result);
    }
}
