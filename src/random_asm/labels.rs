use std::fmt;

/// Role of a label inside one control-flow construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelKind {
    /// Target defined after the jump that references it
    Forward,
    /// Target defined before the jump that references it
    Backward,
    /// Landing point used to hop over a block that must not run twice
    Skip,
    /// Anchor of an AUIPC/ADDI address computation
    Address,
}

impl LabelKind {
    pub fn prefix(self) -> &'static str {
        match self {
            LabelKind::Forward => "jf",
            LabelKind::Backward => "jb",
            LabelKind::Skip => "js",
            LabelKind::Address => "ja",
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<LabelKind> {
        match prefix {
            "jf" => Some(LabelKind::Forward),
            "jb" => Some(LabelKind::Backward),
            "js" => Some(LabelKind::Skip),
            "ja" => Some(LabelKind::Address),
            _ => None,
        }
    }
}

/// Identifier shared by all labels of one construct invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabelId(u32);

impl LabelId {
    pub fn value(self) -> u32 {
        self.0
    }

    pub fn label(self, kind: LabelKind) -> Label {
        Label { id: self, kind }
    }
}

/// A concrete label name such as `jf12`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label {
    pub id: LabelId,
    pub kind: LabelKind,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.prefix(), self.id.0)
    }
}

/// Hands out strictly increasing label ids for the whole run.
#[derive(Debug, Default)]
pub struct LabelAllocator {
    next: u32,
}

impl LabelAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> LabelId {
        let id = LabelId(self.next);
        self.next += 1;
        id
    }

    /// Number of ids handed out so far.
    pub fn allocated(&self) -> u32 {
        self.next
    }
}
