//! Instruction trace observers.

use std::io::Write;

use lama_common_core::{Instruction, Module, Value};

/// Observer notified by the dispatch loop. All hooks default to no-ops.
pub trait Tracer {
    /// Called after decoding and before executing the instruction at `offset`.
    fn on_instruction(&mut self, _offset: usize, _inst: &Instruction, _module: &Module) {}

    fn on_halt(&mut self, _result: Value) {}
}

/// Writes one `0x%08x:\t<mnemonic>` line per executed instruction.
pub struct WriterTracer<W: Write> {
    out: W,
}

impl<W: Write> WriterTracer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Tracer for WriterTracer<W> {
    fn on_instruction(&mut self, offset: usize, inst: &Instruction, module: &Module) {
        // Tracing is best effort; a closed stream must not stop the program.
        let _ = writeln!(self.out, "0x{:08x}:\t{}", offset, inst.display_with(module));
    }

    fn on_halt(&mut self, _result: Value) {
        let _ = self.out.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lama_common_core::ModuleBuilder;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_writer_format() {
        let mut b = ModuleBuilder::new();
        let s = b.string("hi");
        let module = b.build().unwrap();
        let mut t = WriterTracer::new(Vec::new());
        t.on_instruction(0, &Instruction::Const(5), &module);
        t.on_instruction(5, &Instruction::String(s), &module);
        t.on_halt(Value::from_int(0));
        let text = String::from_utf8(t.into_inner()).unwrap();
        assert_eq!(text, "0x00000000:\tCONST\t5\n0x00000005:\tSTRING\thi\n");
    }
}
