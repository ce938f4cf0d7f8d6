//! RV32IM opcode catalog
//!
//! Every mnemonic the generator can pick, grouped by category, plus the text
//! templates used to print their operands.

use crate::config::Extensions;
use crate::consts::rv32::{REGISTER_COUNT, REGISTER_NAMES};
use enum_iterator::{Sequence, all};
use serde::Serialize;
use std::fmt;

/// One RV32IM mnemonic. The declaration order is the selection order used by
/// the stream driver and must not be changed without changing seeded output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Sequence)]
pub enum Opcode {
    Lui,
    Auipc,
    Jal,
    Jalr,
    Beq,
    Bne,
    Blt,
    Bge,
    Bltu,
    Bgeu,
    Lb,
    Lh,
    Lw,
    Lbu,
    Lhu,
    Sb,
    Sh,
    Sw,
    Addi,
    Slti,
    Sltiu,
    Xori,
    Ori,
    Andi,
    Slli,
    Srli,
    Srai,
    Add,
    Sub,
    Sll,
    Slt,
    Sltu,
    Xor,
    Srl,
    Sra,
    Or,
    And,
    Fence,
    Ecall,
    Ebreak,
    Mul,
    Mulh,
    Mulhsu,
    Mulhu,
    Div,
    Divu,
    Rem,
    Remu,
}

/// Operand shape / behaviour class of an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Category {
    /// `rd, imm20`
    UpperImmediate,
    /// `rd, rs1, imm12`
    ImmediateAlu,
    /// `rd, rs1, shamt`
    ShiftImmediate,
    /// `rd, rs2, rs1`
    RegisterAlu,
    Branch,
    Jump,
    JumpRegister,
    Load,
    Store,
    /// M extension, same shape as `RegisterAlu`
    MulDiv,
    Barrier,
    Trap,
}

impl Category {
    /// Categories whose instructions may be used as basic-block filler.
    pub fn is_filler(self) -> bool {
        matches!(
            self,
            Category::UpperImmediate
                | Category::ImmediateAlu
                | Category::ShiftImmediate
                | Category::RegisterAlu
                | Category::MulDiv
        )
    }
}

/// Width of a load/store access, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessWidth {
    Byte = 1,
    Half = 2,
    Word = 4,
}

impl AccessWidth {
    pub fn bytes(self) -> i32 {
        self as i32
    }
}

impl Opcode {
    pub const COUNT: usize = <Opcode as Sequence>::CARDINALITY;

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Lui => "LUI",
            Opcode::Auipc => "AUIPC",
            Opcode::Jal => "JAL",
            Opcode::Jalr => "JALR",
            Opcode::Beq => "BEQ",
            Opcode::Bne => "BNE",
            Opcode::Blt => "BLT",
            Opcode::Bge => "BGE",
            Opcode::Bltu => "BLTU",
            Opcode::Bgeu => "BGEU",
            Opcode::Lb => "LB",
            Opcode::Lh => "LH",
            Opcode::Lw => "LW",
            Opcode::Lbu => "LBU",
            Opcode::Lhu => "LHU",
            Opcode::Sb => "SB",
            Opcode::Sh => "SH",
            Opcode::Sw => "SW",
            Opcode::Addi => "ADDI",
            Opcode::Slti => "SLTI",
            Opcode::Sltiu => "SLTIU",
            Opcode::Xori => "XORI",
            Opcode::Ori => "ORI",
            Opcode::Andi => "ANDI",
            Opcode::Slli => "SLLI",
            Opcode::Srli => "SRLI",
            Opcode::Srai => "SRAI",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Sll => "SLL",
            Opcode::Slt => "SLT",
            Opcode::Sltu => "SLTU",
            Opcode::Xor => "XOR",
            Opcode::Srl => "SRL",
            Opcode::Sra => "SRA",
            Opcode::Or => "OR",
            Opcode::And => "AND",
            Opcode::Fence => "FENCE",
            Opcode::Ecall => "ECALL",
            Opcode::Ebreak => "EBREAK",
            Opcode::Mul => "MUL",
            Opcode::Mulh => "MULH",
            Opcode::Mulhsu => "MULHSU",
            Opcode::Mulhu => "MULHU",
            Opcode::Div => "DIV",
            Opcode::Divu => "DIVU",
            Opcode::Rem => "REM",
            Opcode::Remu => "REMU",
        }
    }

    pub fn category(self) -> Category {
        match self {
            Opcode::Lui | Opcode::Auipc => Category::UpperImmediate,
            Opcode::Jal => Category::Jump,
            Opcode::Jalr => Category::JumpRegister,
            Opcode::Beq
            | Opcode::Bne
            | Opcode::Blt
            | Opcode::Bge
            | Opcode::Bltu
            | Opcode::Bgeu => Category::Branch,
            Opcode::Lb | Opcode::Lh | Opcode::Lw | Opcode::Lbu | Opcode::Lhu => Category::Load,
            Opcode::Sb | Opcode::Sh | Opcode::Sw => Category::Store,
            Opcode::Addi
            | Opcode::Slti
            | Opcode::Sltiu
            | Opcode::Xori
            | Opcode::Ori
            | Opcode::Andi => Category::ImmediateAlu,
            Opcode::Slli | Opcode::Srli | Opcode::Srai => Category::ShiftImmediate,
            Opcode::Add
            | Opcode::Sub
            | Opcode::Sll
            | Opcode::Slt
            | Opcode::Sltu
            | Opcode::Xor
            | Opcode::Srl
            | Opcode::Sra
            | Opcode::Or
            | Opcode::And => Category::RegisterAlu,
            Opcode::Fence => Category::Barrier,
            Opcode::Ecall | Opcode::Ebreak => Category::Trap,
            Opcode::Mul
            | Opcode::Mulh
            | Opcode::Mulhsu
            | Opcode::Mulhu
            | Opcode::Div
            | Opcode::Divu
            | Opcode::Rem
            | Opcode::Remu => Category::MulDiv,
        }
    }

    pub fn requires_mul_div(self) -> bool {
        self.category() == Category::MulDiv
    }

    /// Access width for loads and stores, `None` for everything else.
    pub fn access_width(self) -> Option<AccessWidth> {
        match self {
            Opcode::Lb | Opcode::Lbu | Opcode::Sb => Some(AccessWidth::Byte),
            Opcode::Lh | Opcode::Lhu | Opcode::Sh => Some(AccessWidth::Half),
            Opcode::Lw | Opcode::Sw => Some(AccessWidth::Word),
            _ => None,
        }
    }

    /// Look an opcode up by its position in the catalog.
    pub fn from_index(index: usize) -> Option<Opcode> {
        all::<Opcode>().nth(index)
    }

    pub fn from_mnemonic(mnemonic: &str) -> Option<Opcode> {
        all::<Opcode>().find(|op| op.mnemonic().eq_ignore_ascii_case(mnemonic))
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Opcodes usable as basic-block filler under the given extensions.
pub fn filler_opcodes(extensions: &Extensions) -> Vec<Opcode> {
    all::<Opcode>()
        .filter(|op| op.category().is_filler())
        .filter(|op| !op.requires_mul_div() || extensions.has_mul_div())
        .collect()
}

/// An integer register x0..x31.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Register(u8);

impl Register {
    pub const ZERO: Register = Register(0);

    /// Build a register from its index. Indices above 31 are rejected.
    pub fn new(index: u32) -> Option<Register> {
        (index < REGISTER_COUNT).then_some(Register(index as u8))
    }

    /// Register `index mod 32`, for indices drawn from `[0, 32)`.
    pub(crate) fn wrapping(index: u32) -> Register {
        Register((index % REGISTER_COUNT) as u8)
    }

    pub fn index(self) -> u32 {
        u32::from(self.0)
    }

    pub fn name(self) -> &'static str {
        REGISTER_NAMES[self.0 as usize]
    }

    pub fn from_name(name: &str) -> Option<Register> {
        REGISTER_NAMES
            .iter()
            .position(|&n| n == name)
            .map(|i| Register(i as u8))
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// `MNEMONIC<pad>\toperands`, the mnemonic padded/truncated to 6 columns.
pub fn instruction(mnemonic: &str, operands: &str) -> String {
    if operands.is_empty() {
        return mnemonic.to_string();
    }
    format!("{:<6.6}\t{}", mnemonic, operands)
}

/// `LUI/AUIPC rd, imm20`, immediate in hex.
pub fn format_upper(op: Opcode, rd: Register, imm20: u32) -> String {
    instruction(op.mnemonic(), &format!("{},0x{:x}", rd, imm20))
}

/// `ALU-imm rd, rs1, imm12`, immediate in signed decimal.
pub fn format_alu_imm(op: Opcode, rd: Register, rs1: Register, imm: i32) -> String {
    instruction(op.mnemonic(), &format!("{},{},{}", rd, rs1, imm))
}

/// `ALU-reg rd, rs2, rs1`. The second source is printed before the first.
pub fn format_alu_reg(op: Opcode, rd: Register, rs2: Register, rs1: Register) -> String {
    instruction(op.mnemonic(), &format!("{},{},{}", rd, rs2, rs1))
}

/// `shift-imm rd, rs1, shamt`
pub fn format_shift_imm(op: Opcode, rd: Register, rs1: Register, shamt: u32) -> String {
    instruction(op.mnemonic(), &format!("{},{},{}", rd, rs1, shamt))
}

/// Load or store: `OP data,offset(base)`.
pub fn format_memory(op: Opcode, data: Register, offset: i32, base: Register) -> String {
    instruction(op.mnemonic(), &format!("{},{}({})", data, offset, base))
}
