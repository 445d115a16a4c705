//! A2E - Apple IIe Emulator core in Rust
//!
//! Apple IIeのエミュレーションコア:
//! - 256エントリの命令テーブルで動く65C02
//! - ソフトスイッチで9つの領域を切り替えるメモリバス
//! - ステッピングモーターと6-and-2エンコードを再現するDisk II
//! - 逆アセンブラ、ブレークポイント、セーブステート

pub mod apple2;
pub mod config;
pub mod cpu;
pub mod disasm;
pub mod disk;
pub mod disk_log;
pub mod memory;
pub mod nibble;
pub mod region;
pub mod savestate;
pub mod soft_switch;
