//! Disassemble a module.

use std::io::Write;
use std::path::Path;

use lama_common_core::Module;
use lama_vm::disasm;

pub fn run<W: Write>(path: &Path, out: &mut W) -> Result<(), Box<dyn std::error::Error>> {
    let module = Module::from_file(path)?;
    disasm::dump(&module, out)?;
    Ok(())
}
