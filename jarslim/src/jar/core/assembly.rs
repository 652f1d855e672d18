use krakatau2::lib::{
    assemble, classfile, classfile::parse::Class, DisassemblerOptions, AssemblerOptions,
    ParserOptions,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReasmError {
    #[error("Assemble error: {0}")]
    Assemble(String),
    #[error("Disassemble error: {0}")]
    Disassemble(std::io::Error),
    #[error("Source parse error: {0}")]
    SourceParse(#[from] std::str::Utf8Error),
    #[error("Assembler produced no class")]
    Empty,
}

/// Parses class bytes the same way everywhere: long code attributes are
/// never read as the short pre-1.0 form.
pub fn parse_class(bytes: &[u8]) -> Result<Class<'_>, String> {
    classfile::parse(
        bytes,
        ParserOptions {
            no_short_code_attr: true,
        },
    )
    .map_err(|err| format!("{:?}", err))
}

/// Reassemble a class by disassembling to source and then assembling back to bytecode.
///
/// Roundtrip mode pins every constant pool index, so a class that was only
/// re-pointed at new pool entries comes back with the same layout.
pub fn reasm(class: &Class<'_>) -> Result<Vec<u8>, ReasmError> {
    let mut out = Vec::new();

    krakatau2::lib::disassemble::disassemble(
        &mut out,
        class,
        DisassemblerOptions { roundtrip: true },
    )
    .map_err(ReasmError::Disassemble)?;

    let source = std::str::from_utf8(&out)?;
    let mut assembled = assemble(source, AssemblerOptions {})
        .map_err(|err| ReasmError::Assemble(format!("{:?}", err)))?;
    let (_name, data) = assembled.pop().ok_or(ReasmError::Empty)?;

    Ok(data)
}
