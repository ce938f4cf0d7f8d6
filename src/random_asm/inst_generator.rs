use crate::config::GeneratorConfig;
use crate::consts::rv32::{
    ALU_IMMEDIATE_SPAN, MAX_OFFSET, REGISTER_COUNT, SHAMT_SPAN, UPPER_IMMEDIATE_SPAN,
};
use crate::random_asm::catalog::{
    AccessWidth, Category, Opcode, Register, filler_opcodes, format_alu_imm, format_alu_reg,
    format_memory, format_shift_imm, format_upper, instruction,
};
use crate::random_asm::labels::{Label, LabelAllocator, LabelKind};
use crate::random_asm::sampler::Sampler;
use log::trace;

/// A contiguous run of listing lines produced by one constructor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    pub lines: Vec<String>,
    /// Real instructions among `lines`; labels and comments are not counted
    pub instructions: u32,
}

impl Fragment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unlabelled instruction line.
    fn inst(&mut self, body: impl AsRef<str>) {
        self.lines.push(format!("\t\t{}", body.as_ref()));
        self.instructions += 1;
    }

    /// Instruction line carrying a label definition.
    fn at(&mut self, label: Label, body: impl AsRef<str>) {
        self.lines.push(format!("{}:\t{}", label, body.as_ref()));
        self.instructions += 1;
    }

    /// Comment line, never counted.
    pub fn comment(&mut self, text: impl AsRef<str>) {
        self.lines.push(format!("# {}", text.as_ref()));
    }

    pub fn single(body: impl AsRef<str>) -> Self {
        let mut fragment = Self::new();
        fragment.inst(body);
        fragment
    }
}

/// Round `offset` toward zero to a multiple of the access width, so the
/// result keeps both its alignment and its [-2047, 2047] bound.
pub fn align_offset(offset: i32, width: AccessWidth) -> i32 {
    let mask = !(width.bytes() - 1);
    if offset >= 0 {
        offset & mask
    } else {
        -((-offset) & mask)
    }
}

fn jump(target: Label) -> String {
    instruction("J", &target.to_string())
}

/// Generation context for one run: sampler, label counter and the enabled
/// filler set. Every constructor draws from here and nowhere else.
#[derive(Debug)]
pub struct AsmGenerator {
    sampler: Sampler,
    labels: LabelAllocator,
    fillers: Vec<Opcode>,
    base_address: u32,
}

impl AsmGenerator {
    pub fn new(config: &GeneratorConfig, seed: u64) -> Self {
        Self {
            sampler: Sampler::new(seed),
            labels: LabelAllocator::new(),
            fillers: filler_opcodes(&config.extensions()),
            base_address: config.base_address,
        }
    }

    pub fn sampler(&mut self) -> &mut Sampler {
        &mut self.sampler
    }

    pub fn labels_allocated(&self) -> u32 {
        self.labels.allocated()
    }

    pub fn random_register(&mut self) -> Register {
        Register::wrapping(self.sampler.sample(REGISTER_COUNT))
    }

    /// Register for holding a link or base address; x0 is redrawn.
    pub fn nonzero_register(&mut self) -> Register {
        loop {
            let reg = self.random_register();
            if !reg.is_zero() {
                return reg;
            }
        }
    }

    /// One non-control-flow, non-memory instruction. The destination is
    /// never `exclude`; sources are unconstrained.
    pub fn basic_block(&mut self, exclude: Option<Register>) -> String {
        let rs1 = self.random_register();
        let rs2 = self.random_register();
        let rd = loop {
            let reg = self.random_register();
            if Some(reg) != exclude {
                break reg;
            }
        };

        let op = *self.sampler.choose(&self.fillers);
        match op.category() {
            Category::UpperImmediate => {
                format_upper(op, rd, self.sampler.sample(UPPER_IMMEDIATE_SPAN))
            }
            Category::ImmediateAlu => {
                let negative = self.sampler.coin();
                let magnitude = self.sampler.sample(ALU_IMMEDIATE_SPAN) as i32;
                let imm = if negative { -magnitude } else { magnitude };
                format_alu_imm(op, rd, rs1, imm)
            }
            Category::ShiftImmediate => {
                format_shift_imm(op, rd, rs1, self.sampler.sample(SHAMT_SPAN))
            }
            Category::RegisterAlu | Category::MulDiv => format_alu_reg(op, rd, rs2, rs1),
            other => unreachable!("{:?} opcode {} in filler set", other, op),
        }
    }

    /// Conditional branch test, backward (6 instructions) or forward (4).
    ///
    /// ```text
    ///         J    jf0            |          XOR  gp,t1,s11
    /// jb0:    <bb>                |          BEQ  a5,a4,jf0
    ///         J    js0            |          <bb>
    /// jf0:    <bb>                | jf0:     <bb>
    ///         BEQ  a5,a4,jb0      |
    /// js0:    <bb>                |
    /// ```
    pub fn branch(&mut self, op: Opcode) -> Fragment {
        let id = self.labels.allocate();
        let forward = id.label(LabelKind::Forward);
        let mut fragment = Fragment::new();

        if self.sampler.coin() {
            let backward = id.label(LabelKind::Backward);
            let skip = id.label(LabelKind::Skip);
            fragment.inst(jump(forward));
            fragment.at(backward, self.basic_block(None));
            fragment.inst(jump(skip));
            fragment.at(forward, self.basic_block(None));
            let (rs1, rs2) = (self.random_register(), self.random_register());
            fragment.inst(format!(
                "{}\t# Test jump backwards",
                instruction(op.mnemonic(), &format!("{},{},{}", rs1, rs2, backward))
            ));
            fragment.at(skip, self.basic_block(None));
        } else {
            fragment.inst(self.basic_block(None));
            let (rs1, rs2) = (self.random_register(), self.random_register());
            fragment.inst(format!(
                "{}\t# Test jump forwards",
                instruction(op.mnemonic(), &format!("{},{},{}", rs1, rs2, forward))
            ));
            fragment.inst(self.basic_block(None));
            fragment.at(forward, self.basic_block(None));
        }

        trace!("{} construct {} -> {} instructions", op, id.value(), fragment.instructions);
        fragment
    }

    /// JAL test, forward (5 instructions) or backward (4). The target is a
    /// `JALR link` that returns right behind the JAL.
    pub fn jump_and_link(&mut self) -> Fragment {
        let link = self.nonzero_register();
        let id = self.labels.allocate();
        let forward = id.label(LabelKind::Forward);
        let mut fragment = Fragment::new();
        let jal = |target: Label, comment: &str| {
            format!(
                "{}\t# {}",
                instruction("JAL", &format!("{},{}", link, target)),
                comment
            )
        };
        let ret = instruction("JALR", link.name());

        if self.sampler.coin() {
            let skip = id.label(LabelKind::Skip);
            fragment.inst(jal(forward, "Test jump forwards"));
            fragment.inst(self.basic_block(Some(link)));
            fragment.inst(jump(skip));
            fragment.at(forward, ret);
            fragment.at(skip, self.basic_block(None));
        } else {
            let backward = id.label(LabelKind::Backward);
            fragment.inst(jump(forward));
            fragment.at(backward, ret);
            fragment.at(forward, self.basic_block(Some(link)));
            fragment.inst(jal(backward, "Test jump backwards"));
        }

        trace!("JAL construct {} link {} -> {} instructions", id.value(), link, fragment.instructions);
        fragment
    }

    /// JALR test, forward (7 instructions) or backward (10).
    ///
    /// The link register is loaded with `target + offset` through
    /// AUIPC/ADDI/ADDI, then `JALR link,-offset(link)` lands on the target.
    pub fn jump_and_link_register(&mut self) -> Fragment {
        let link = self.nonzero_register();
        let offset = self.sampler.signed(MAX_OFFSET);
        let id = self.labels.allocate();
        let anchor = id.label(LabelKind::Address);
        let forward = id.label(LabelKind::Forward);
        let mut fragment = Fragment::new();

        let setup = |fragment: &mut Fragment, target: Label| {
            fragment.at(
                anchor,
                instruction("AUIPC", &format!("{},%pcrel_hi({})", link, target)),
            );
            fragment.inst(instruction(
                "ADDI",
                &format!("{},{},%pcrel_lo({})", link, link, anchor),
            ));
            fragment.inst(instruction("ADDI", &format!("{},{},{}", link, link, offset)));
        };
        let jalr = |comment: &str| {
            format!(
                "{} # {}",
                instruction(
                    "JALR",
                    &format!("{},{}({})", link, offset.wrapping_neg(), link)
                ),
                comment
            )
        };

        if self.sampler.coin() {
            setup(&mut fragment, forward);
            fragment.inst(self.basic_block(Some(link)));
            fragment.inst(jalr("Jump Forward"));
            fragment.inst(self.basic_block(None));
            fragment.at(forward, self.basic_block(None));
        } else {
            let backward = id.label(LabelKind::Backward);
            let skip = id.label(LabelKind::Skip);
            setup(&mut fragment, backward);
            fragment.inst(jump(forward));
            fragment.at(backward, self.basic_block(None));
            fragment.inst(jump(skip));
            fragment.at(forward, self.basic_block(Some(link)));
            fragment.inst(jalr("Jump Backwards"));
            fragment.inst(self.basic_block(None));
            fragment.at(skip, self.basic_block(None));
        }

        trace!(
            "JALR construct {} link {} offset {} -> {} instructions",
            id.value(),
            link,
            offset,
            fragment.instructions
        );
        fragment
    }

    /// Load/store around the configured base address: LUI of the base into a
    /// non-zero register, one filler that leaves it intact, then the access
    /// with an offset aligned to the access width.
    pub fn memory_access(&mut self, op: Opcode) -> Fragment {
        let width = op.access_width().unwrap_or(AccessWidth::Byte);
        let base = self.nonzero_register();
        let offset = align_offset(self.sampler.signed(MAX_OFFSET), width);

        let mut fragment = Fragment::new();
        fragment.inst(format!(
            "{}\t# Load/Store base address",
            instruction("LUI", &format!("{},0x{:x}", base, self.base_address >> 12))
        ));
        fragment.inst(self.basic_block(Some(base)));
        let data = self.random_register();
        fragment.inst(format_memory(op, data, offset, base));
        fragment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::listing::check_fragment_labels;

    fn generator(march: &str, seed: u64) -> AsmGenerator {
        let config = GeneratorConfig {
            march: march.to_string(),
            ..GeneratorConfig::default()
        };
        AsmGenerator::new(&config, seed)
    }

    fn destination(body: &str) -> &str {
        body.split('\t')
            .nth(1)
            .and_then(|ops| ops.split(',').next())
            .unwrap_or("")
    }

    #[test]
    fn test_align_offset() {
        assert_eq!(align_offset(-2047, AccessWidth::Word), -2044);
        assert_eq!(align_offset(2047, AccessWidth::Word), 2044);
        assert_eq!(align_offset(-3, AccessWidth::Half), -2);
        assert_eq!(align_offset(-3, AccessWidth::Byte), -3);
        assert_eq!(align_offset(0, AccessWidth::Word), 0);
    }

    #[test]
    fn test_basic_block_respects_exclusion() {
        let mut g = generator("imc", 11);
        let a0 = Register::from_name("a0").unwrap();
        for _ in 0..2_000 {
            let body = g.basic_block(Some(a0));
            assert_ne!(destination(&body), "a0", "{}", body);
        }
    }

    #[test]
    fn test_basic_block_never_branches_or_touches_memory() {
        let mut g = generator("imc", 5);
        for _ in 0..2_000 {
            let body = g.basic_block(None);
            let mnemonic = body.split_whitespace().next().unwrap();
            let op = Opcode::from_mnemonic(mnemonic).unwrap();
            assert!(op.category().is_filler(), "{}", body);
        }
    }

    #[test]
    fn test_basic_block_extension_gating() {
        let mut g = generator("ic", 8);
        for _ in 0..5_000 {
            let body = g.basic_block(None);
            let mnemonic = body.split_whitespace().next().unwrap();
            assert!(!Opcode::from_mnemonic(mnemonic).unwrap().requires_mul_div());
        }

        let mut g = generator("im", 8);
        let found = (0..5_000).any(|_| {
            let body = g.basic_block(None);
            let mnemonic = body.split_whitespace().next().unwrap();
            Opcode::from_mnemonic(mnemonic).unwrap().requires_mul_div()
        });
        assert!(found);
    }

    #[test]
    fn test_branch_counts_and_labels() {
        let mut g = generator("imc", 21);
        let mut seen = std::collections::BTreeSet::new();
        for _ in 0..200 {
            let fragment = g.branch(Opcode::Bltu);
            assert!(matches!(fragment.instructions, 4 | 6));
            assert_eq!(
                fragment.lines.iter().filter(|l| !l.starts_with('#')).count() as u32,
                fragment.instructions
            );
            check_fragment_labels(&fragment.lines).unwrap();
            seen.insert(fragment.instructions);
        }
        assert_eq!(seen.len(), 2);
    }

    /// Instruction text of a listing line, without indentation or label.
    fn body(line: &str) -> &str {
        line.split_once(":\t")
            .map_or(line.trim_start(), |(_, rest)| rest)
    }

    #[test]
    fn test_jal_protects_link_register() {
        let mut g = generator("imc", 4);
        for _ in 0..2_000 {
            let fragment = g.jump_and_link();
            assert!(matches!(fragment.instructions, 4 | 5));
            check_fragment_labels(&fragment.lines).unwrap();
            let at = fragment.lines.iter().position(|l| l.contains("JAL ")).unwrap();
            let link = destination(body(&fragment.lines[at]));
            assert_ne!(link, "zero", "{}", fragment.lines[at]);

            // forward: the filler right after the JAL; backward: the jf filler before it
            let filler = if fragment.instructions == 5 { at + 1 } else { at - 1 };
            let filler = body(&fragment.lines[filler]);
            assert_ne!(destination(filler), link, "{:?}", fragment.lines);
        }
    }

    #[test]
    fn test_jalr_protects_link_register() {
        let mut g = generator("imc", 31);
        for _ in 0..2_000 {
            let fragment = g.jump_and_link_register();
            let at = fragment.lines.iter().position(|l| l.contains("JALR")).unwrap();
            let link = destination(body(&fragment.lines[at]));
            assert_eq!(destination(body(&fragment.lines[0])), link);

            let filler = body(&fragment.lines[at - 1]);
            assert!(!filler.starts_with("J "), "{:?}", fragment.lines);
            assert_ne!(destination(filler), link, "{:?}", fragment.lines);
        }
    }

    #[test]
    fn test_jalr_offsets_cancel() {
        let mut g = generator("imc", 77);
        for _ in 0..300 {
            let fragment = g.jump_and_link_register();
            assert!(matches!(fragment.instructions, 7 | 10));
            check_fragment_labels(&fragment.lines).unwrap();

            let add = fragment.lines[2].rsplit(',').next().unwrap();
            let add: i32 = add.trim().parse().unwrap();
            assert!((-MAX_OFFSET..=MAX_OFFSET).contains(&add));

            let jalr = fragment.lines.iter().find(|l| l.contains("JALR")).unwrap();
            let operand = jalr.split(',').nth(1).unwrap();
            let sub: i32 = operand[..operand.find('(').unwrap()].parse().unwrap();
            assert_eq!(add.wrapping_add(sub), 0, "{}", jalr);
            assert!(!jalr.contains("\tzero,"));
        }
    }

    #[test]
    fn test_memory_access_shape() {
        let mut g = generator("i", 99);
        for op in [Opcode::Lw, Opcode::Sh, Opcode::Lbu] {
            for _ in 0..300 {
                let fragment = g.memory_access(op);
                assert_eq!(fragment.instructions, 3);
                assert!(fragment.lines[0].contains("LUI"));
                assert!(fragment.lines[0].contains(",0x1\t"));
                assert!(!fragment.lines[0].contains("\tzero,"));

                let access = &fragment.lines[2];
                let operand = access.split(',').nth(1).unwrap();
                let (offset, base) = operand.split_once('(').unwrap();
                let offset: i32 = offset.parse().unwrap();
                let width = op.access_width().unwrap().bytes();
                assert_eq!(offset % width, 0, "{}", access);
                assert!((-MAX_OFFSET..=MAX_OFFSET).contains(&offset));
                assert_ne!(base.trim_end_matches(')'), "zero");

                let filler_dest = destination(fragment.lines[1].trim_start());
                assert_ne!(filler_dest, base.trim_end_matches(')'));
            }
        }
    }

    #[test]
    fn test_labels_are_unique_across_constructs() {
        let mut g = generator("imc", 1);
        let mut lines = Vec::new();
        for _ in 0..50 {
            lines.extend(g.branch(Opcode::Beq).lines);
            lines.extend(g.jump_and_link().lines);
            lines.extend(g.jump_and_link_register().lines);
        }
        assert_eq!(g.labels_allocated(), 150);
        check_fragment_labels(&lines).unwrap();
    }
}
