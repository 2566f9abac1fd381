//! Assembly text emission.
//!
//! Renders a colored program as MIPS assembly:
//!
//! ```text
//! .data
//! m1:	.word 6
//!
//! .text
//! main:
//! 	la $t0, m1
//! 	lw $t1, 0($t0)
//! 	jr $ra
//! ```

use super::error::CompileResult;
use super::ir::{InstId, Program, VarId, VarKind};
use super::register_file::RegisterPalette;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Instruction appended after the last program instruction.
pub const EPILOGUE: &str = "jr $ra";

/// Emission switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitOptions {
    /// Start the document with `.globl <entry>`.
    pub globl: bool,
}

/// Writes a program as assembly text.
pub struct Emitter<'a> {
    program: &'a Program,
    palette: &'a RegisterPalette,
    options: EmitOptions,
}

impl<'a> Emitter<'a> {
    pub fn new(program: &'a Program, palette: &'a RegisterPalette) -> Self {
        Self {
            program,
            palette,
            options: EmitOptions::default(),
        }
    }

    pub fn with_options(mut self, options: EmitOptions) -> Self {
        self.options = options;
        self
    }

    /// Text form of one operand.
    ///
    /// Registers without an assignment fall back to their symbolic name so
    /// unallocated programs can still be printed for diagnostics.
    pub fn operand(&self, id: VarId) -> String {
        let var = self.program.var(id);
        match var.kind() {
            VarKind::Register => var
                .assignment()
                .and_then(|reg| self.palette.render(reg))
                .unwrap_or_else(|| var.name().to_string()),
            VarKind::Constant => var.value().to_string(),
            VarKind::Label | VarKind::Memory | VarKind::Untyped => var.name().to_string(),
        }
    }

    /// Instruction text without label or indentation.
    pub fn instruction_body(&self, id: InstId) -> String {
        let inst = self.program.instr(id);
        let Some(opcode) = inst.opcode() else {
            return String::new();
        };

        let template = opcode.info().template;
        let mut operands = inst.dst().iter().chain(inst.src());
        let mut out = String::with_capacity(template.len() + 8);
        let mut chars = template.chars();
        while let Some(ch) = chars.next() {
            if ch == '\'' {
                // Skip the slot kind letter.
                chars.next();
                if let Some(&op) = operands.next() {
                    out.push_str(&self.operand(op));
                }
            } else {
                out.push(ch);
            }
        }
        out
    }

    /// Full text of one instruction as it appears in the `.text` section.
    /// May span two lines when an ordinary instruction carries a label.
    pub fn instruction(&self, id: InstId) -> String {
        let inst = self.program.instr(id);
        let body = self.instruction_body(id);
        match inst.label() {
            Some(label) if inst.is_entry() => format!("{}:", self.operand(label)),
            Some(label) => format!("{}:\n\t{}", self.operand(label), body),
            None => format!("\t{body}"),
        }
    }

    /// Write the whole document.
    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        if self.options.globl {
            if let Some(label) = self.program.entry().and_then(|e| self.program.instr(e).label()) {
                writeln!(out, ".globl {}", self.operand(label))?;
                writeln!(out)?;
            }
        }

        writeln!(out, ".data")?;
        for &mem in self.program.memory_vars() {
            let var = self.program.var(mem);
            writeln!(out, "{}:\t.word {}", var.name(), var.value())?;
        }
        writeln!(out)?;

        writeln!(out, ".text")?;
        for id in self.program.inst_ids() {
            writeln!(out, "{}", self.instruction(id))?;
        }
        write!(out, "\t{EPILOGUE}")?;
        Ok(())
    }

    pub fn to_text(&self) -> String {
        let mut buf = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = self.write_to(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Create `path` and write the document into it.
    pub fn write_file(&self, path: impl AsRef<Path>) -> CompileResult<()> {
        let path = path.as_ref();
        let file = File::create(path)?;
        let mut out = BufWriter::new(file);
        self.write_to(&mut out)?;
        out.flush()?;
        log::info!("Wrote {}", path.display());
        Ok(())
    }
}
