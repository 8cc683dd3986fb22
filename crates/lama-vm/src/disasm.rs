//! Static listing of a module, without executing it.

use std::io::Write;

use lama_common_core::{Decoder, Instruction, Module};

use crate::vm::VmError;

/// Print the header, the public symbols and the code up to the terminal
/// opcode or the end of the code segment.
pub fn dump<W: Write>(module: &Module, out: &mut W) -> Result<(), VmError> {
    writeln!(out, "String table size       : {}", module.string_table().len())?;
    writeln!(out, "Global area size        : {}", module.global_area_size())?;
    writeln!(out, "Number of public symbols: {}", module.public_count())?;
    writeln!(out, "Public symbols          :")?;
    for i in 0..module.public_count() {
        if let Some((name, offset)) = module.public_symbol(i) {
            writeln!(out, "   0x{:08x}: {}", offset, String::from_utf8_lossy(name))?;
        }
    }

    writeln!(out, "Code:")?;
    let mut decoder = Decoder::new(module.code(), 0);
    while !decoder.at_end() {
        let offset = decoder.pos();
        let inst = decoder.next_instruction()?;
        if inst == Instruction::Stop {
            break;
        }
        writeln!(out, "0x{:08x}:\t{}", offset, inst.display_with(module))?;
    }
    writeln!(out, "<end>")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lama_common_core::{ModuleBuilder, Var, VarKind};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_dump_listing() {
        let mut b = ModuleBuilder::new();
        b.globals(1);
        b.public("main", 0);
        b.emit(Instruction::Begin { args: 2, locals: 0 });
        b.emit(Instruction::Ld(Var::new(VarKind::Global, 0)));
        b.emit(Instruction::End);
        b.emit(Instruction::Stop);
        b.emit(Instruction::Drop);
        let module = b.build().unwrap();

        let mut out = Vec::new();
        dump(&module, &mut out).unwrap();
        let expected = "\
String table size       : 5
Global area size        : 1
Number of public symbols: 1
Public symbols          :
   0x00000000: main
Code:
0x00000000:\tBEGIN\t2 0
0x00000009:\tLD\tG(0)
0x0000000e:\tEND
<end>
";
        assert_eq!(String::from_utf8(out).unwrap(), expected);
    }

    #[test]
    fn test_dump_reports_bad_opcode() {
        let mut b = ModuleBuilder::new();
        b.raw(&[0x1f]);
        let module = b.build().unwrap();
        assert!(matches!(
            dump(&module, &mut Vec::new()),
            Err(VmError::InvalidOpcode { high: 1, low: 15 })
        ));
    }
}
