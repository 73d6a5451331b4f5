//! Builders for disassembly listings.

/// Address of the first instruction produced by `radare2`.
pub const BASE: u64 = 0x1000;

/// Distance between consecutive instructions produced by `radare2`.
pub const STRIDE: u64 = 4;

/// Address of the `index`-th instruction in a `radare2` listing.
pub const fn addr(index: usize) -> u64 {
    BASE + index as u64 * STRIDE
}

/// Builds a radare2-style listing with a function header and a graph gutter.
///
/// Instruction `i` is placed at `BASE + i * STRIDE`. Text after `;` becomes the comment.
pub fn radare2(instructions: &[&str]) -> String {
    let mut out = String::from(concat!(
        "            ; CODE XREF from entry0 @ 0x1040\n",
        "┌ 64: int main (int argc, char **argv);\n",
    ));
    for (i, text) in instructions.iter().enumerate() {
        out.push_str(&format!("│           0x{:08x}      {}\n", addr(i), text));
    }
    out
}

/// Builds an objdump-style listing from `(offset, bytes, instruction)` rows.
pub fn objdump(rows: &[(u64, &str, &str)]) -> String {
    let mut out = String::from(concat!(
        "\nmain.o:     file format elf64-x86-64\n\n\n",
        "Disassembly of section .text:\n\n",
        "0000000000000000 <main>:\n",
    ));
    for (offset, bytes, text) in rows {
        out.push_str(&format!("  {offset:x}:\t{bytes:<21}\t{text}\n"));
    }
    out
}
