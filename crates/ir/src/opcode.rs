use std::fmt;

/// Shape of an instruction's payload. Every opcode maps to exactly one kind,
/// which dictates how its operands are interpreted and stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstKind {
    TwoInput,
    OneInput,
    Jump,
    Phi,
    Parameter,
    Constant,
    Call,
    NoInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Add,
    Sub,
    Mul,
    Div,
    Shr,
    Shl,
    Xor,
    Cmp,
    CheckEq,
    Not,
    Mov,
    Cast,
    Ret,
    CheckEqZero,
    Jmp,
    Ja,
    JmpEq,
    JmpNe,
    JmpLt,
    JmpLe,
    JmpGt,
    JmpGe,
    RetVoid,
    Throw,
    Catch,
    Parameter,
    Constant,
    Phi,
    CallStatic,
}

impl Opcode {
    pub fn kind(self) -> InstKind {
        use Opcode::*;
        match self {
            Add | Sub | Mul | Div | Shr | Shl | Xor | Cmp | CheckEq => InstKind::TwoInput,
            Not | Mov | Cast | Ret | CheckEqZero => InstKind::OneInput,
            Jmp | Ja | JmpEq | JmpNe | JmpLt | JmpLe | JmpGt | JmpGe => InstKind::Jump,
            RetVoid | Throw | Catch => InstKind::NoInput,
            Parameter => InstKind::Parameter,
            Constant => InstKind::Constant,
            Phi => InstKind::Phi,
            CallStatic => InstKind::Call,
        }
    }

    pub fn is_jump(self) -> bool {
        self.kind() == InstKind::Jump
    }

    /// Opcode of the branch with inverted polarity. Swapping a block's
    /// successor pair together with this keeps the branch semantics intact.
    /// `Ja` carries no comparison, so it inverts to itself.
    pub fn inverted(self) -> Opcode {
        use Opcode::*;
        match self {
            JmpEq => JmpNe,
            JmpNe => JmpEq,
            JmpLt => JmpGe,
            JmpLe => JmpGt,
            JmpGe => JmpLt,
            JmpGt => JmpLe,
            Ja => Ja,
            _ => {
                debug_assert!(false, "`{self}` is not an invertible branch");
                self
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        use Opcode::*;
        match self {
            Add => "add",
            Sub => "sub",
            Mul => "mul",
            Div => "div",
            Shr => "shr",
            Shl => "shl",
            Xor => "xor",
            Cmp => "cmp",
            CheckEq => "check_eq",
            Not => "not",
            Mov => "mov",
            Cast => "cast",
            Ret => "ret",
            CheckEqZero => "check_eq_zero",
            Jmp => "jmp",
            Ja => "ja",
            JmpEq => "jmp_eq",
            JmpNe => "jmp_ne",
            JmpLt => "jmp_lt",
            JmpLe => "jmp_le",
            JmpGt => "jmp_gt",
            JmpGe => "jmp_ge",
            RetVoid => "ret_void",
            Throw => "throw",
            Catch => "catch",
            Parameter => "parameter",
            Constant => "constant",
            Phi => "phi",
            CallStatic => "call_static",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_inversion_is_an_involution() {
        for op in [
            Opcode::JmpEq,
            Opcode::JmpNe,
            Opcode::JmpLt,
            Opcode::JmpLe,
            Opcode::JmpGt,
            Opcode::JmpGe,
            Opcode::Ja,
        ] {
            assert_eq!(op.inverted().inverted(), op);
            assert!(op.is_jump());
        }
    }

    #[test]
    fn kinds() {
        assert_eq!(Opcode::Sub.kind(), InstKind::TwoInput);
        assert_eq!(Opcode::Not.kind(), InstKind::OneInput);
        assert_eq!(Opcode::Jmp.kind(), InstKind::Jump);
        assert_eq!(Opcode::Throw.kind(), InstKind::NoInput);
        assert_eq!(Opcode::CallStatic.kind(), InstKind::Call);
    }
}
