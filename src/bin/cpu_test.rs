//! Klaus2m5 6502/65C02機能テストランナー
//!
//! 使用方法: cargo run --release --bin cpu_test [テストバイナリ...]
//!
//! 引数がなければ既定の場所にあるテストバイナリを順に実行する。

use std::fs;
use std::process;
use std::time::Instant;

use a2e::cpu::{Cpu, MemoryBus, OPCODES};

/// 既定のテストバイナリ
const DEFAULT_TESTS: [(&str, &str); 2] = [
    (
        "6502 Functional Test",
        "tests/6502_65C02_functional_tests-master/bin_files/6502_functional_test.bin",
    ),
    (
        "65C02 Extended Opcodes Test",
        "tests/6502_65C02_functional_tests-master/bin_files/65C02_extended_opcodes_test.bin",
    ),
];

/// テストの開始アドレス
const START_ADDRESS: u16 = 0x0400;
/// 成功時に自己ループするアドレス
const SUCCESS_ADDRESSES: [u16; 2] = [0x3469, 0x24F1];
/// これ以上かかったら打ち切る
const MAX_CYCLES: u64 = 200_000_000;

/// テスト用メモリ（64KB フラットメモリ）
struct TestMemory {
    ram: Vec<u8>,
}

impl TestMemory {
    fn new() -> Self {
        TestMemory { ram: vec![0; 0x10000] }
    }

    fn load(&mut self, data: &[u8]) {
        let len = data.len().min(self.ram.len());
        self.ram[..len].copy_from_slice(&data[..len]);
    }
}

impl MemoryBus for TestMemory {
    fn read(&mut self, address: u16) -> u8 {
        self.ram[address as usize]
    }

    fn write(&mut self, address: u16, value: u8) {
        self.ram[address as usize] = value;
    }
}

/// テスト結果
enum Outcome {
    Passed,
    Trapped(u16),
    Timeout(u16),
}

fn main() {
    env_logger::init();

    println!("===========================================");
    println!("  Klaus2m5 6502/65C02 Functional Test Runner");
    println!("===========================================\n");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let tests: Vec<(String, String)> = if args.is_empty() {
        DEFAULT_TESTS
            .iter()
            .map(|(name, path)| (name.to_string(), path.to_string()))
            .collect()
    } else {
        args.iter().map(|path| (path.clone(), path.clone())).collect()
    };

    let mut failed = false;
    for (name, path) in &tests {
        println!("----------------------------------------");
        println!("Test: {}", name);
        println!("File: {}", path);
        println!("----------------------------------------");

        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) => {
                println!("Error loading test file: {}", e);
                println!("Skipping...\n");
                continue;
            }
        };

        match run_test(&data) {
            Outcome::Passed => println!("\n*** TEST PASSED! ***\n"),
            Outcome::Trapped(pc) => {
                println!("\n*** TEST FAILED ***");
                println!("Trap at ${:04X}", pc);
                println!("Check the listing file to identify the failed test.\n");
                failed = true;
            }
            Outcome::Timeout(pc) => {
                println!("\n*** TEST INCOMPLETE ***");
                println!("Last PC: ${:04X}\n", pc);
                failed = true;
            }
        }
    }

    if failed {
        process::exit(1);
    }
}

fn run_test(data: &[u8]) -> Outcome {
    let mut memory = TestMemory::new();
    let mut cpu = Cpu::new();

    // テストバイナリは$0000からの64KBイメージ
    memory.load(data);
    cpu.regs.pc = START_ADDRESS;

    println!("Starting at ${:04X}", cpu.regs.pc);
    let start_time = Instant::now();
    let mut next_progress = 10_000_000u64;

    loop {
        let pc = cpu.regs.pc;

        // 最初の数命令をトレース
        if cpu.total_cycles < 20 {
            let opcode = memory.read(pc);
            log::debug!(
                "[{:8}] PC=${:04X} A=${:02X} X=${:02X} Y=${:02X} SP=${:02X} P=${:02X} | {}",
                cpu.total_cycles,
                pc,
                cpu.regs.a,
                cpu.regs.x,
                cpu.regs.y,
                cpu.regs.sp,
                cpu.regs.status,
                OPCODES[opcode as usize].mnemonic
            );
        }

        cpu.step(&mut memory);

        // 同じPCに留まる（JMP * / BNE *）ならテスト終了
        if cpu.regs.pc == pc {
            let elapsed = start_time.elapsed();
            let mhz = cpu.total_cycles as f64 / elapsed.as_secs_f64() / 1_000_000.0;
            println!("Loop detected at ${:04X}", pc);
            println!("Total cycles: {}", cpu.total_cycles);
            println!("Elapsed: {:?} ({:.2} MHz)", elapsed, mhz);

            if SUCCESS_ADDRESSES.contains(&pc) {
                return Outcome::Passed;
            }
            dump_memory(&memory, pc);
            return Outcome::Trapped(pc);
        }

        if cpu.total_cycles >= MAX_CYCLES {
            return Outcome::Timeout(cpu.regs.pc);
        }

        if cpu.total_cycles >= next_progress {
            println!("  Progress: {} million cycles, PC=${:04X}", cpu.total_cycles / 1_000_000, cpu.regs.pc);
            next_progress += 10_000_000;
        }
    }
}

fn dump_memory(memory: &TestMemory, addr: u16) {
    println!("\nMemory dump around ${:04X}:", addr);
    let start = (addr as usize).saturating_sub(16) & 0xFFF0;
    for row in 0..4 {
        let row_addr = start + row * 16;
        print!("  ${:04X}: ", row_addr);
        for col in 0..16 {
            let a = (row_addr + col) & 0xFFFF;
            print!("{:02X} ", memory.ram[a]);
        }
        println!();
    }
}
