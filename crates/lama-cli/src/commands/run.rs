//! Execute a module.

use std::io;
use std::path::Path;

use lama_common_core::Module;
use lama_runtime::Heap;
use lama_vm::{Vm, VmConfig, WriterTracer};
use tracing::{debug, info};

/// Load `path` and run it against stdin/stdout. With `trace`, every
/// executed instruction is listed on stderr.
pub fn run(path: &Path, config: VmConfig, trace: bool) -> Result<(), Box<dyn std::error::Error>> {
    let module = Module::from_file(path)?;
    debug!(
        path = %path.display(),
        code = module.code().len(),
        globals = module.global_area_size(),
        publics = module.public_count(),
        "module loaded"
    );

    let mut vm = Vm::with_config(&module, Heap::stdio(), config);
    if trace {
        vm.set_tracer(WriterTracer::new(io::stderr()));
    }
    let result = vm.run()?;
    info!(?result, steps = vm.steps(), "finished");
    Ok(())
}
