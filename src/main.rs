//! A2E - Apple IIe Emulator core in Rust
//!
//! ROMとディスクイメージを読み込み、ヘッドレスで実行する。
//! 停止したときはレジスタ、スタック、次の命令を表示する。
//!
//! # 使用方法
//! ```text
//! a2e --rom APPLE2E.ROM -1 dos33.dsk -b C65C --cycles 5000000
//! ```

use a2e::apple2::{Apple2, Frontend, FrontendEvent, Headless, KeyScript, StopReason};
use a2e::config::{self, parse_hex_address, Config, CONFIG_FILENAME};
use a2e::disasm;
use a2e::disk_log::{self, DiskLogLevel};
use a2e::memory::Memory;
use a2e::savestate::SaveState;
use clap::Parser;
use std::fs;
use std::process;

/// A2E - Apple IIe Emulator core in Rust
#[derive(Parser, Debug)]
#[command(name = "a2e")]
#[command(author = "A2E Project")]
#[command(version = "0.1.0")]
#[command(about = "A2E - Apple IIe emulator core (65C02 + Disk II)", long_about = None)]
struct Args {
    /// ROMファイル（32KB APPLE2E.ROM）
    #[arg(short, long)]
    rom: Option<String>,

    /// ディスクイメージファイル（ドライブ1）
    #[arg(short = '1', long)]
    disk1: Option<String>,

    /// ディスクイメージファイル（ドライブ2）
    #[arg(short = '2', long)]
    disk2: Option<String>,

    /// PCブレークポイント（16進、複数指定可）
    #[arg(short = 'b', long = "break")]
    breakpoints: Vec<String>,

    /// 実行するサイクル数の上限
    #[arg(long)]
    cycles: Option<u64>,

    /// 命令トレース（RUST_LOG=traceで表示）
    #[arg(long)]
    trace: bool,

    /// キーボードに順に入力する文字列
    #[arg(long)]
    keys: Option<String>,

    /// 指定アドレスから16命令を逆アセンブルして終了
    #[arg(long, value_name = "HEX")]
    disasm: Option<String>,

    /// 設定ファイル
    #[arg(long)]
    config: Option<String>,

    /// 現在の設定を設定ファイルに保存
    #[arg(long)]
    save_config: bool,

    /// 停止時に状態を保存するファイル
    #[arg(long)]
    save_state: Option<String>,

    /// 起動時に復元するセーブステート
    #[arg(long)]
    load_state: Option<String>,

    /// ディスクログレベル: flow, state, nibble, all
    /// 複数指定可: flow,state
    #[arg(long)]
    disk_log: Option<String>,
}

/// 設定ファイルの内容にコマンドライン引数を上書き
fn merge_args(config: &mut Config, args: &Args) {
    if let Some(rom) = &args.rom {
        config.rom_path = rom.clone();
    }
    if args.disk1.is_some() {
        config.disk1 = args.disk1.clone();
    }
    if args.disk2.is_some() {
        config.disk2 = args.disk2.clone();
    }
    if !args.breakpoints.is_empty() {
        config.breakpoints = args.breakpoints.clone();
    }
    if args.cycles.is_some() {
        config.max_cycles = args.cycles;
    }
    if args.trace {
        config.trace = true;
    }
    if args.disk_log.is_some() {
        config.disk_log = args.disk_log.clone();
    }
}

/// 失敗したらメッセージを表示して終了
fn exit_on_error<T>(result: Result<T, String>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn load_disk(emu: &mut Apple2, drive: usize, path: &str) -> Result<(), String> {
    let data = fs::read(config::resolve_path(path))
        .map_err(|e| format!("Failed to read disk {} {}: {}", drive + 1, path, e))?;
    emu.load_disk(drive, &data)
        .map_err(|e| format!("Failed to load disk {}: {}", drive + 1, e))?;
    log::info!("Loaded disk {}: {}", drive + 1, path);
    Ok(())
}

/// エミュレータを設定に従って組み立てる
fn build_machine(config: &Config) -> Result<Apple2, String> {
    let mut emu = Apple2::new();

    let rom_path = config::resolve_path(&config.rom_path);
    let rom = fs::read(&rom_path)
        .map_err(|e| format!("Failed to load ROM {}: {}", rom_path.display(), e))?;
    emu.load_rom(&rom)?;

    for drive in emu.memory.disk.drives.iter_mut() {
        drive.set_volume(config.volume);
    }
    if let Some(path) = &config.disk1 {
        load_disk(&mut emu, 0, path)?;
    }
    if let Some(path) = &config.disk2 {
        load_disk(&mut emu, 1, path)?;
    }

    emu.reset();
    emu.trace = config.trace;
    emu.redraw_interval = config.redraw_interval;
    emu.poll_interval = config.poll_interval;
    for address in config.breakpoint_addresses()? {
        emu.add_breakpoint(address);
    }
    Ok(emu)
}

/// 停止時の状態表示
fn print_stop_report(emu: &Apple2, reason: StopReason) {
    match reason {
        StopReason::Breakpoint(pc) => println!("Breakpoint on PC(${:04X})", pc),
        StopReason::CycleLimit => println!("Cycle limit reached ({} cycles)", emu.cpu.total_cycles),
        StopReason::Quit => println!("Quit"),
    }
    println!("{}", disasm::format_registers(&emu.cpu.regs));
    println!("[ Stack ]");
    for line in disasm::dump_stack(&emu.memory, emu.cpu.regs.sp, 8) {
        println!("{}", line);
    }
    println!("[ Next ]");
    println!("{}", disasm::disassemble(&emu.memory, emu.cpu.regs.pc, &emu.cpu.regs));
}

/// `--keys`の有無で切り替えるフロントエンド
enum Input {
    Idle(Headless),
    Script(KeyScript),
}

impl Frontend for Input {
    fn redraw(&mut self, memory: &Memory) {
        log::debug!(
            "redraw: text={} hires={} page2={}",
            memory.switches.text,
            memory.switches.hires,
            memory.switches.page2
        );
    }

    fn poll(&mut self, memory: &mut Memory) -> FrontendEvent {
        match self {
            Input::Idle(frontend) => frontend.poll(memory),
            Input::Script(frontend) => frontend.poll(memory),
        }
    }
}

fn main() {
    env_logger::init();

    let args = Args::parse();

    // 設定ファイルを読み込み、引数で上書き
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config::get_exe_dir().join(CONFIG_FILENAME).display().to_string());
    let mut config = Config::load_from(&config_path);
    merge_args(&mut config, &args);

    if args.save_config {
        exit_on_error(config.save_to(&config_path));
        println!("Saved config to {}", config_path);
    }

    // ディスクログレベルを設定
    if let Some(list) = &config.disk_log {
        let level = exit_on_error(DiskLogLevel::parse(list));
        disk_log::set_log_level(level);
    }

    println!("A2E - Apple IIe Emulator v0.1");

    let mut emu = exit_on_error(build_machine(&config));

    if let Some(path) = &args.load_state {
        let state = exit_on_error(SaveState::load_from(path));
        exit_on_error(emu.load_state(&state).map_err(|e| e.to_string()));
    }

    // 逆アセンブルのみ
    if let Some(address) = &args.disasm {
        let address = exit_on_error(parse_hex_address(address));
        for line in disasm::disassemble_range(&emu.memory, address, 16, &emu.cpu.regs) {
            println!("{}", line);
        }
        return;
    }

    let mut input = match &args.keys {
        Some(text) => Input::Script(KeyScript::new(text)),
        None => Input::Idle(Headless),
    };

    let reason = emu.run(&mut input, config.max_cycles);
    print_stop_report(&emu, reason);

    if let Some(path) = &args.save_state {
        exit_on_error(emu.save_state().save_to(path));
    }
}
