//! VM instruction writer.
use std::io::{self, Write};

/// Named virtual memory regions of the target VM.
///
/// `Constant` is a pseudo segment; pushing from it pushes the index
/// itself as a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Argument,
    Constant,
    Local,
    Pointer,
    Static,
    Temp,
    That,
    This,
}

impl Segment {
    #[rustfmt::skip]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Argument => "argument",
            Self::Constant => "constant",
            Self::Local    => "local",
            Self::Pointer  => "pointer",
            Self::Static   => "static",
            Self::Temp     => "temp",
            Self::That     => "that",
            Self::This     => "this",
        }
    }
}

/// Arithmetic and logic commands of the target VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Add,
    Sub,
    Neg,
    Eq,
    Gt,
    Lt,
    And,
    Or,
    Not,
}

impl Command {
    #[rustfmt::skip]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Neg => "neg",
            Self::Eq  => "eq",
            Self::Gt  => "gt",
            Self::Lt  => "lt",
            Self::And => "and",
            Self::Or  => "or",
            Self::Not => "not",
        }
    }
}

/// Formats VM instructions onto a byte sink, one per line.
///
/// The writer performs no validation; callers are responsible for
/// legal operand choice.
pub struct VmWriter<W> {
    out: W,
}

impl<W: Write> VmWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn write_push(&mut self, segment: Segment, index: u16) -> io::Result<()> {
        writeln!(self.out, "push {} {}", segment.as_str(), index)
    }

    pub fn write_pop(&mut self, segment: Segment, index: u16) -> io::Result<()> {
        writeln!(self.out, "pop {} {}", segment.as_str(), index)
    }

    pub fn write_arithmetic(&mut self, command: Command) -> io::Result<()> {
        writeln!(self.out, "{}", command.as_str())
    }

    pub fn write_label(&mut self, label: &str) -> io::Result<()> {
        writeln!(self.out, "label {}", label)
    }

    pub fn write_goto(&mut self, label: &str) -> io::Result<()> {
        writeln!(self.out, "goto {}", label)
    }

    pub fn write_if_goto(&mut self, label: &str) -> io::Result<()> {
        writeln!(self.out, "if-goto {}", label)
    }

    pub fn write_call(&mut self, name: &str, n_args: u16) -> io::Result<()> {
        writeln!(self.out, "call {} {}", name, n_args)
    }

    pub fn write_function(&mut self, name: &str, n_locals: u16) -> io::Result<()> {
        writeln!(self.out, "function {} {}", name, n_locals)
    }

    pub fn write_return(&mut self) -> io::Result<()> {
        writeln!(self.out, "return")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn written(write: impl FnOnce(&mut VmWriter<&mut Vec<u8>>) -> io::Result<()>) -> String {
        let mut buffer = Vec::new();
        let mut writer = VmWriter::new(&mut buffer);
        write(&mut writer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_push_pop() {
        assert_eq!(
            written(|w| w.write_push(Segment::Constant, 7)),
            "push constant 7\n"
        );
        assert_eq!(
            written(|w| w.write_pop(Segment::Argument, 2)),
            "pop argument 2\n"
        );
        assert_eq!(written(|w| w.write_push(Segment::That, 0)), "push that 0\n");
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(written(|w| w.write_arithmetic(Command::Add)), "add\n");
        assert_eq!(written(|w| w.write_arithmetic(Command::Not)), "not\n");
        assert_eq!(written(|w| w.write_arithmetic(Command::Lt)), "lt\n");
    }

    #[test]
    fn test_flow() {
        assert_eq!(written(|w| w.write_label("WHILE_EXP0")), "label WHILE_EXP0\n");
        assert_eq!(written(|w| w.write_goto("IF_END1")), "goto IF_END1\n");
        assert_eq!(written(|w| w.write_if_goto("IF_TRUE0")), "if-goto IF_TRUE0\n");
    }

    #[test]
    fn test_subroutine_linkage() {
        assert_eq!(
            written(|w| w.write_function("Main.main", 2)),
            "function Main.main 2\n"
        );
        assert_eq!(
            written(|w| w.write_call("Math.multiply", 2)),
            "call Math.multiply 2\n"
        );
        assert_eq!(written(|w| w.write_return()), "return\n");
    }
}
