use super::Line;

/// Generate listing line from a decoded item and its memory address
///
/// E.g. `0x8000  20 06 80  JSR $8006`
pub fn generate_line(line: &Line) -> String {
    let bytes_str = line
        .bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<String>>()
        .join(" ");

    format!("0x{:04x}  {:<8}  {}\n", line.address, bytes_str, line.decoded)
}

#[tracing::instrument(skip(code))]
pub fn generate(code: &[Line]) -> String {
    let mut str = String::new();
    str.push_str(" Addr   Hexdump   Instructions\n");
    str.push_str("-------------------------------\n");

    for line in code {
        str.push_str(&generate_line(line));
    }

    str
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assembler::codegen::opcode::{Cpu, OpcodeTable},
        disassembler::disassemble_code,
    };

    use pretty_assertions::assert_eq;

    #[test]
    fn test_listing() {
        let bytes = [
            0x20, 0x06, 0x80, 0xA9, 0x01, 0xAD, 0x00, 0x02, 0xBD, 0x00, 0x02, 0xF0, 0xF3, 0x02,
        ];
        let code = disassemble_code(&bytes, 0x8000, OpcodeTable::for_cpu(Cpu::Mos6502));
        let expected = " Addr   Hexdump   Instructions
-------------------------------
0x8000  20 06 80  JSR $8006
0x8003  a9 01     LDA #$01
0x8005  ad 00 02  LDA $0200
0x8008  bd 00 02  LDA $0200,X
0x800b  f0 f3     BEQ $8000
0x800d  02        .byte $02
";

        assert_eq!(generate(&code), expected);
    }
}
