//! # Register Alias Tests
//!
//! Tests for register spelling lookup and the x86-64 partial-write rules.

use proptest::prelude::*;
use rstest::rstest;
use x86sim_core::common::{Gpr, RegAlias, Width};
use x86sim_core::config::CpuConfig;
use x86sim_core::core::CpuState;
use x86sim_core::core::arch::{RegisterFile, RegisterFormat};

#[test]
fn test_register_formats() {
    let mut regs = RegisterFile::new();
    regs.write(Gpr::Rbx, 42);
    assert_eq!(regs.format(Gpr::Rbx, RegisterFormat::Hex), "0x000000000000002a");
    assert_eq!(regs.format(Gpr::Rbx, RegisterFormat::Decimal), "42");
    assert_eq!(regs.format(Gpr::Rbx, RegisterFormat::Binary), "0b101010");
    assert_eq!(RegisterFormat::default(), RegisterFormat::Hex);
}

#[rstest]
#[case("%rax", Gpr::Rax, Width::Qword, false)]
#[case("eax", Gpr::Rax, Width::Dword, false)]
#[case("%AX", Gpr::Rax, Width::Word, false)]
#[case("al", Gpr::Rax, Width::Byte, false)]
#[case("%ah", Gpr::Rax, Width::Byte, true)]
#[case("%dil", Gpr::Rdi, Width::Byte, false)]
#[case("%spl", Gpr::Rsp, Width::Byte, false)]
#[case("r9d", Gpr::R9, Width::Dword, false)]
#[case("%R15W", Gpr::R15, Width::Word, false)]
#[case("r10b", Gpr::R10, Width::Byte, false)]
fn test_alias_lookup(
    #[case] name: &str,
    #[case] gpr: Gpr,
    #[case] width: Width,
    #[case] high: bool,
) {
    let alias = RegAlias::lookup(name).unwrap();
    assert_eq!(alias.gpr, gpr);
    assert_eq!(alias.width, width);
    assert_eq!(alias.high, high);
}

#[rstest]
#[case("%xmm0")]
#[case("rip")]
#[case("%eflags")]
#[case("")]
#[case("%r16")]
fn test_alias_lookup_rejects_unknown(#[case] name: &str) {
    assert!(RegAlias::lookup(name).is_none());
}

#[test]
fn test_high_byte_write_preserves_low_byte() {
    let mut regs = RegisterFile::new();
    regs.write(Gpr::Rax, 0x1122_3344_5566_7788);
    regs.write_alias(RegAlias::lookup("ah").unwrap(), 0xAB);
    assert_eq!(regs.read(Gpr::Rax), 0x1122_3344_5566_AB88);
    assert_eq!(regs.read_alias(RegAlias::lookup("al").unwrap()), 0x88);
}

#[test]
fn test_dword_write_zero_extends() {
    let mut cpu = CpuState::new(&CpuConfig::default());
    cpu.set_register("rbx", u64::MAX).unwrap();
    cpu.set_register("%ebx", 0x1234_5678).unwrap();
    assert_eq!(cpu.get_register("rbx").unwrap(), 0x1234_5678);
}

#[test]
fn test_unknown_register_is_an_error() {
    let cpu = CpuState::new(&CpuConfig::default());
    assert!(cpu.get_register("%foo").is_err());
}

#[test]
fn test_width_sign_extend() {
    assert_eq!(Width::Dword.sign_extend(0x8000_0000), -0x8000_0000);
    assert_eq!(Width::Byte.sign_extend(0x7f), 0x7f);
    assert_eq!(Width::Word.sign_extend(0xffff), -1);
}

fn any_alias() -> impl Strategy<Value = RegAlias> {
    prop::sample::select(vec![
        "eax", "ax", "al", "ah", "ebx", "bx", "bl", "bh", "ecx", "cx", "cl", "ch", "edx", "dx",
        "dl", "dh", "esi", "si", "sil", "edi", "di", "dil", "ebp", "bp", "bpl", "r8d", "r8w",
        "r8b", "r11d", "r11w", "r11b", "r15d", "r15w", "r15b",
    ])
    .prop_map(|name| RegAlias::lookup(name).unwrap())
}

proptest! {
    #[test]
    fn prop_partial_writes_follow_x86_rules(
        alias in any_alias(),
        before in any::<u64>(),
        value in any::<u64>()
    ) {
        let mut regs = RegisterFile::new();
        regs.write(alias.gpr, before);
        regs.write_alias(alias, value);
        let after = regs.read(alias.gpr);

        match alias.width {
            Width::Dword => prop_assert_eq!(after, value & 0xFFFF_FFFF),
            _ => {
                let field = alias.width.mask() << alias.shift();
                prop_assert_eq!(after & !field, before & !field);
                prop_assert_eq!((after & field) >> alias.shift(), value & alias.width.mask());
            }
        }
        prop_assert_eq!(regs.read_alias(alias), value & alias.width.mask());
    }

    #[test]
    fn prop_other_registers_untouched(alias in any_alias(), value in any::<u64>()) {
        let mut regs = RegisterFile::new();
        for reg in Gpr::ALL {
            regs.write(reg, 0x5A5A_5A5A_5A5A_5A5A);
        }
        regs.write_alias(alias, value);
        for reg in Gpr::ALL.into_iter().filter(|&r| r != alias.gpr) {
            prop_assert_eq!(regs.read(reg), 0x5A5A_5A5A_5A5A_5A5A);
        }
    }
}
