// ABI names of the RV32 integer registers, indexed by register number
pub const REGISTER_NAMES: [&str; 32] = [
    "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2", // x0 - x7
    "s0", "s1", "a0", "a1", "a2", "a3", "a4", "a5", // x8 - x15
    "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7", // x16 - x23
    "s8", "s9", "s10", "s11", "t3", "t4", "t5", "t6", // x24 - x31
];

pub const REGISTER_COUNT: u32 = 32;

/// Tool version written into the listing header.
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_INSTRUCTION_COUNT: u32 = 512;
pub const DEFAULT_MARCH: &str = "imc";
pub const DEFAULT_BASE_ADDRESS: u32 = 0x1000;

/// Largest magnitude used for signed 12-bit offsets, so that base +/- offset
/// stays inside [base - 2047, base + 2047].
pub const MAX_OFFSET: i32 = 2047;
/// Smallest base address for which every negative offset stays non-negative.
pub const MIN_BASE_ADDRESS: u32 = 2048;

/// Upper bound (exclusive) of the magnitude of an ALU immediate.
pub const ALU_IMMEDIATE_SPAN: u32 = 2047;
/// Upper bound (exclusive) of a LUI/AUIPC immediate.
pub const UPPER_IMMEDIATE_SPAN: u32 = 1 << 20;
/// Upper bound (exclusive) of a shift amount.
pub const SHAMT_SPAN: u32 = 32;

pub const ENTRY_LABEL: &str = "main";
pub const ENTRY_COMMENT: &str = "# Start Pseudo Random Instruction Test";
pub const HALT_LINE: &str = "\t\tebreak  # End of Test";
