//! 逆アセンブラとデバッグ表示
//!
//! 命令テーブルを使って1命令ずつテキストに変換する。
//! メモリは`Memory::peek`で読むため、ソフトスイッチの副作用は起きない。

use std::fmt;

use crate::cpu::{flags, AddressingMode, Instruction, Op, Registers, OPCODES, STACK_BASE};
use crate::memory::Memory;

/// ステータスフラグの表示文字（ビット0から）
const FLAG_LETTERS: [char; 8] = ['c', 'z', 'i', 'd', 'b', 'p', 'v', 'n'];

/// モニタROMの主なサブルーチン
const MONITOR_SUBROUTINES: &[(&str, u16)] = &[
    ("BELL", 0xFF3A),
    ("BELL1", 0xFBDD),
    ("CLREOL", 0xFC9C),
    ("CLEOLZ", 0xFC9E),
    ("CLREOP", 0xFC42),
    ("CLRSCR", 0xF832),
    ("CLRTOP", 0xF836),
    ("COUT", 0xFDED),
    ("COUT1", 0xFDF0),
    ("CROUT", 0xFD8E),
    ("CROUT1", 0xFD8B),
    ("GETLNZ", 0xFD67),
    ("GETLN", 0xFD6A),
    ("GETLN1", 0xFD6F),
    ("HLINE", 0xF819),
    ("HOME", 0xFC58),
    ("IOREST", 0xFF3F),
    ("IOSAVE", 0xFF4A),
    ("KEYIN", 0xFD1B),
    ("MOVE", 0xFE2C),
    ("NEXTCOL", 0xF85F),
    ("PLOT", 0xF800),
    ("PRBLNK", 0xF948),
    ("PRBL2", 0xF94A),
    ("PRBYTE", 0xFDDA),
    ("PREAD", 0xFB1E),
    ("PRERR", 0xFF2D),
    ("PRHEX", 0xFDE3),
    ("PRNTAX", 0xF941),
    ("RDCHAR", 0xFD35),
    ("RDKEY", 0xFD0C),
    ("READ", 0xFEFD),
    ("SCRN", 0xF871),
    ("SETCOL", 0xF864),
    ("SETINV", 0xFE80),
    ("SETNORM", 0xFE84),
    ("VERIFY", 0xFE36),
    ("VLINE", 0xF828),
    ("WAIT", 0xFCA8),
    ("WRITE", 0xFECD),
];

/// アドレスに対応するモニタサブルーチン名
pub fn monitor_subroutine(address: u16) -> Option<&'static str> {
    MONITOR_SUBROUTINES
        .iter()
        .find(|(_, addr)| *addr == address)
        .map(|(name, _)| *name)
}

/// 逆アセンブルした1行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub address: u16,
    pub bytes: Vec<u8>,
    /// ニーモニックとオペランド（注釈を含む）
    pub text: String,
}

impl Line {
    /// 命令長
    pub fn len(&self) -> u16 {
        self.bytes.len() as u16
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// 次の命令のアドレス
    pub fn next_address(&self) -> u16 {
        self.address.wrapping_add(self.len())
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut columns = String::new();
        for i in 0..3 {
            if i > 0 {
                columns.push(' ');
            }
            match self.bytes.get(i) {
                Some(byte) => columns.push_str(&format!("{:02X}", byte)),
                None => columns.push_str("  "),
            }
        }
        write!(f, "{:04X}  {}  {}", self.address, columns, self.text)
    }
}

/// 1命令を逆アセンブル
///
/// `regs`は条件分岐の成立判定（`[taken]` / `[not taken]`）に使う。
pub fn disassemble(memory: &Memory, address: u16, regs: &Registers) -> Line {
    let opcode = memory.peek(address);
    let instr: &Instruction = &OPCODES[opcode as usize];
    let bytes: Vec<u8> = (0..instr.len as u16)
        .map(|i| memory.peek(address.wrapping_add(i)))
        .collect();
    let b1 = bytes.get(1).copied().unwrap_or(0);
    let b2 = bytes.get(2).copied().unwrap_or(0);
    let word = u16::from_le_bytes([b1, b2]);
    let next = address.wrapping_add(instr.len as u16);

    let mut text = match format_operand(instr.mode, b1, b2) {
        Some(operand) => format!("{} {}", instr.mnemonic, operand),
        None => instr.mnemonic.to_string(),
    };

    match instr.mode {
        AddressingMode::Relative => {
            let target = next.wrapping_add(b1 as i8 as u16);
            text.push_str(&format!("  (${:04X})", target));
        }
        AddressingMode::ZeroPageRelative => {
            let target = next.wrapping_add(b2 as i8 as u16);
            text.push_str(&format!("  (${:04X})", target));
        }
        _ => {}
    }

    if let Some(taken) = branch_taken(memory, instr.op, b1, regs) {
        text.push_str(if taken { " [taken]" } else { " [not taken]" });
    }

    if matches!(instr.op, Op::Jsr | Op::Jmp) && instr.mode == AddressingMode::Absolute {
        if let Some(name) = monitor_subroutine(word) {
            text.push_str(&format!(" ; {}", name));
        }
    }

    Line { address, bytes, text }
}

/// `count`命令ぶん逆アセンブル
pub fn disassemble_range(memory: &Memory, address: u16, count: usize, regs: &Registers) -> Vec<Line> {
    let mut lines = Vec::with_capacity(count);
    let mut addr = address;
    for _ in 0..count {
        let line = disassemble(memory, addr, regs);
        addr = line.next_address();
        lines.push(line);
    }
    lines
}

fn format_operand(mode: AddressingMode, b1: u8, b2: u8) -> Option<String> {
    let word = u16::from_le_bytes([b1, b2]);
    let operand = match mode {
        AddressingMode::Implied => return None,
        AddressingMode::Accumulator => "A".to_string(),
        AddressingMode::Immediate => format!("#${:02X}", b1),
        AddressingMode::ZeroPage | AddressingMode::Relative => format!("${:02X}", b1),
        AddressingMode::ZeroPageX => format!("${:02X},X", b1),
        AddressingMode::ZeroPageY => format!("${:02X},Y", b1),
        AddressingMode::Absolute => format!("${:04X}", word),
        AddressingMode::AbsoluteX => format!("${:04X},X", word),
        AddressingMode::AbsoluteY => format!("${:04X},Y", word),
        AddressingMode::Indirect => format!("(${:04X})", word),
        AddressingMode::IndirectX => format!("(${:02X},X)", b1),
        AddressingMode::IndirectY => format!("(${:02X}),Y", b1),
        AddressingMode::IndirectZeroPage => format!("(${:02X})", b1),
        AddressingMode::AbsoluteIndirectX => format!("(${:04X},X)", word),
        AddressingMode::ZeroPageRelative => format!("${:02X},${:02X}", b1, b2),
    };
    Some(operand)
}

/// 分岐命令が成立するか（分岐命令でなければNone）
fn branch_taken(memory: &Memory, op: Op, zp: u8, regs: &Registers) -> Option<bool> {
    let taken = match op {
        Op::Bpl => !regs.get_flag(flags::NEGATIVE),
        Op::Bmi => regs.get_flag(flags::NEGATIVE),
        Op::Bvc => !regs.get_flag(flags::OVERFLOW),
        Op::Bvs => regs.get_flag(flags::OVERFLOW),
        Op::Bcc => !regs.get_flag(flags::CARRY),
        Op::Bcs => regs.get_flag(flags::CARRY),
        Op::Bne => !regs.get_flag(flags::ZERO),
        Op::Beq => regs.get_flag(flags::ZERO),
        Op::Bra => true,
        Op::Bbr(bit) => memory.peek(zp as u16) & (1 << bit) == 0,
        Op::Bbs(bit) => memory.peek(zp as u16) & (1 << bit) != 0,
        _ => return None,
    };
    Some(taken)
}

/// ステータスレジスタを"czidbpvn"形式で表示（クリアされたビットは空白）
pub fn format_flags(status: u8) -> String {
    FLAG_LETTERS
        .iter()
        .enumerate()
        .map(|(bit, &letter)| if status & (1 << bit) != 0 { letter } else { ' ' })
        .collect()
}

/// レジスタ一覧
pub fn format_registers(regs: &Registers) -> String {
    let mut out = String::from("[ Registers ]\n");
    for (name, value) in [("A ", regs.a), ("X ", regs.x), ("Y ", regs.y), ("SP", regs.sp)] {
        out.push_str(&format!("{} : ${:02X} (S{}  U{})\n", name, value, value as i8, value));
    }
    out.push_str(&format!("PC : ${:04X}\n", regs.pc));
    out.push_str(&format!("PSW: ${:02X}  [{}]", regs.status, format_flags(regs.status)));
    out
}

/// スタックトップから`len`バイトを表示
pub fn dump_stack(memory: &Memory, sp: u8, len: usize) -> Vec<String> {
    (0..len)
        .map(|i| {
            let offset = (i + 1) as u8;
            let address = STACK_BASE | sp.wrapping_add(offset) as u16;
            format!("{:04X} (sp+{}): {:02X}", address, i + 1, memory.peek(address))
        })
        .collect()
}

/// 16バイト単位のHEX + ASCIIダンプ
pub fn dump_memory(memory: &Memory, address: u16, len: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut remaining = len;
    let mut offset = address;

    while remaining > 0 {
        let count = remaining.min(16);
        let row: Vec<u8> = (0..count as u16)
            .map(|i| memory.peek(offset.wrapping_add(i)))
            .collect();

        let hex: Vec<String> = row.iter().map(|b| format!("{:02X}", b)).collect();
        let ascii: String = row
            .iter()
            .map(|&b| {
                // Apple IIの文字は上位ビットが立っていることが多い
                let c = b & 0x7F;
                if (0x20..0x7F).contains(&c) { c as char } else { '.' }
            })
            .collect();

        lines.push(format!("{:04X}  {:<47}   {}", offset, hex.join(" "), ascii));
        offset = offset.wrapping_add(16);
        remaining -= count;
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::MemoryBus;

    fn memory_with(address: u16, program: &[u8]) -> Memory {
        let mut memory = Memory::new();
        for (i, &byte) in program.iter().enumerate() {
            memory.write(address + i as u16, byte);
        }
        memory
    }

    #[test]
    fn test_line_format() {
        let memory = memory_with(0x0300, &[0xA9, 0x01, 0x8D, 0x00, 0x04, 0xEA]);
        let regs = Registers::default();
        let lines = disassemble_range(&memory, 0x0300, 3, &regs);
        assert_eq!(lines[0].to_string(), "0300  A9 01     LDA #$01");
        assert_eq!(lines[1].to_string(), "0302  8D 00 04  STA $0400");
        assert_eq!(lines[2].to_string(), "0305  EA        NOP");
        assert_eq!(lines[2].next_address(), 0x0306);
    }

    #[test]
    fn test_branch_annotations() {
        // BNE -2; BEQ +4
        let memory = memory_with(0x0300, &[0xD0, 0xFE, 0xF0, 0x04]);
        let mut regs = Registers::default();
        regs.set_flag(flags::ZERO, true);

        let bne = disassemble(&memory, 0x0300, &regs);
        assert_eq!(bne.text, "BNE $FE  ($0300) [not taken]");
        let beq = disassemble(&memory, 0x0302, &regs);
        assert_eq!(beq.text, "BEQ $04  ($0308) [taken]");
    }

    #[test]
    fn test_bbs_uses_zero_page() {
        // BBS0 $10,+2
        let mut memory = memory_with(0x0300, &[0x8F, 0x10, 0x02]);
        memory.write(0x0010, 0x01);
        let line = disassemble(&memory, 0x0300, &Registers::default());
        assert_eq!(line.text, "BBS0 $10,$02  ($0305) [taken]");
    }

    #[test]
    fn test_monitor_names() {
        let memory = memory_with(0x0300, &[0x20, 0xED, 0xFD, 0x4C, 0x58, 0xFC, 0x20, 0x00, 0x03]);
        let regs = Registers::default();
        assert_eq!(disassemble(&memory, 0x0300, &regs).text, "JSR $FDED ; COUT");
        assert_eq!(disassemble(&memory, 0x0303, &regs).text, "JMP $FC58 ; HOME");
        assert_eq!(disassemble(&memory, 0x0306, &regs).text, "JSR $0300");
        assert_eq!(monitor_subroutine(0xFF3A), Some("BELL"));
        assert_eq!(monitor_subroutine(0x1234), None);
    }

    #[test]
    fn test_operand_formats() {
        let memory = memory_with(
            0x0300,
            &[0x6C, 0x00, 0x10, 0x7C, 0x00, 0x10, 0xB1, 0x20, 0xB2, 0x20, 0x0A, 0x03],
        );
        let regs = Registers::default();
        let texts: Vec<String> = disassemble_range(&memory, 0x0300, 6, &regs)
            .into_iter()
            .map(|l| l.text)
            .collect();
        assert_eq!(
            texts,
            vec!["JMP ($1000)", "JMP ($1000,X)", "LDA ($20),Y", "LDA ($20)", "ASL A", "???"]
        );
    }

    #[test]
    fn test_format_flags() {
        assert_eq!(format_flags(0x00), "        ");
        assert_eq!(format_flags(flags::CARRY | flags::NEGATIVE), "c      n");
        assert_eq!(format_flags(0xFF), "czidbpvn");
    }

    #[test]
    fn test_format_registers() {
        let regs = Registers { a: 0xFF, x: 1, y: 2, sp: 0xFD, pc: 0xFA62, status: flags::ZERO };
        let text = format_registers(&regs);
        assert!(text.contains("A  : $FF (S-1  U255)"));
        assert!(text.contains("PC : $FA62"));
        assert!(text.contains("PSW: $02  [ z      ]"));
    }

    #[test]
    fn test_dump_stack_and_memory() {
        let mut memory = memory_with(0x01FE, &[0x34, 0x12]);
        memory.write(0x0400, b'H' | 0x80);
        memory.write(0x0401, b'I' | 0x80);

        let stack = dump_stack(&memory, 0xFD, 2);
        assert_eq!(stack, vec!["01FE (sp+1): 34", "01FF (sp+2): 12"]);

        let dump = dump_memory(&memory, 0x0400, 20);
        assert_eq!(dump.len(), 2);
        assert!(dump[0].starts_with("0400  C8 C9 00"));
        assert!(dump[0].ends_with("HI.............."));
        assert!(dump[1].starts_with("0410  00 00 00 00"));
    }
}
