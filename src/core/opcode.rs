// This module defines the opcode set of the triple IR together with the static
// metadata table the two back-end passes consult. Every opcode maps to an OpInfo
// record: its printable name, the kind of value it produces (none, full value,
// integer, Boolean, code address), whether that value is an address-of-value,
// whether the opcode may appear in Boolean context, whether it carries negated
// sense (the N-forms of the relational and logical operators), and whether the
// allocator must skip it because the code generator never materialises it.
// The Boolean lowering engine reads the negated/boolean bits; the temporary
// allocator reads the value kind and mv_addr bits to pick a temp class.

//! Opcodes and their static metadata.

/// Kind of result an opcode produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// No result.
    None,
    /// Full dynamically-typed value.
    Mval,
    /// Machine integer.
    Mint,
    /// Boolean, held as an integer.
    Bool,
    /// Code address.
    CodeAddr,
}

/// Static description of an opcode.
#[derive(Debug, Clone, Copy)]
pub struct OpInfo {
    pub name: &'static str,
    pub value: ValueKind,
    /// Result is the address of a value rather than the value.
    pub mv_addr: bool,
    /// May appear in Boolean context.
    pub boolean: bool,
    /// NOT-family: the Boolean sense is inverted.
    pub negated: bool,
    /// Never materialised by the code generator, so never gets a temp.
    pub cg_skip: bool,
}

impl OpInfo {
    const fn new(name: &'static str, value: ValueKind) -> Self {
        Self { name, value, mv_addr: false, boolean: false, negated: false, cg_skip: false }
    }

    const fn addr(mut self) -> Self {
        self.mv_addr = true;
        self
    }

    const fn boolean(mut self) -> Self {
        self.boolean = true;
        self
    }

    const fn negated(mut self) -> Self {
        self.negated = true;
        self
    }

    const fn skip(mut self) -> Self {
        self.cg_skip = true;
        self
    }

    /// Whether the opcode produces any value.
    pub const fn is_value(&self) -> bool {
        !matches!(self.value, ValueKind::None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Noop,
    Parameter,
    LineStart,
    LineFetch,
    Fetch,
    Ilit,
    Lit,
    Var,
    Sto,
    StoLit,
    PassThru,
    GvSavTarg,
    GvRecTarg,
    CdAddr,
    GetTruth,
    CoBool,
    SCoBool,
    Com,
    Equ,
    NEqu,
    Pattern,
    NPattern,
    Follow,
    NFollow,
    SortsAfter,
    NSortsAfter,
    Contain,
    NContain,
    Gt,
    NGt,
    Lt,
    NLt,
    NumCmp,
    And,
    NAnd,
    Or,
    NOr,
    SAnd,
    SNAnd,
    SOr,
    SNOr,
    Jmp,
    JmpEqu,
    JmpNeq,
    JmpGtr,
    JmpLeq,
    JmpLss,
    JmpGeq,
    JmpTSet,
    JmpTClr,
    Add,
    Sub,
    Mul,
    Cat,
    Neg,
    SrchIndx,
    PutIndx,
    FnLength,
    Write,
    Ret,
    RetArg,
}

impl Opcode {
    pub const ALL: &'static [Opcode] = &[
        Opcode::Noop,
        Opcode::Parameter,
        Opcode::LineStart,
        Opcode::LineFetch,
        Opcode::Fetch,
        Opcode::Ilit,
        Opcode::Lit,
        Opcode::Var,
        Opcode::Sto,
        Opcode::StoLit,
        Opcode::PassThru,
        Opcode::GvSavTarg,
        Opcode::GvRecTarg,
        Opcode::CdAddr,
        Opcode::GetTruth,
        Opcode::CoBool,
        Opcode::SCoBool,
        Opcode::Com,
        Opcode::Equ,
        Opcode::NEqu,
        Opcode::Pattern,
        Opcode::NPattern,
        Opcode::Follow,
        Opcode::NFollow,
        Opcode::SortsAfter,
        Opcode::NSortsAfter,
        Opcode::Contain,
        Opcode::NContain,
        Opcode::Gt,
        Opcode::NGt,
        Opcode::Lt,
        Opcode::NLt,
        Opcode::NumCmp,
        Opcode::And,
        Opcode::NAnd,
        Opcode::Or,
        Opcode::NOr,
        Opcode::SAnd,
        Opcode::SNAnd,
        Opcode::SOr,
        Opcode::SNOr,
        Opcode::Jmp,
        Opcode::JmpEqu,
        Opcode::JmpNeq,
        Opcode::JmpGtr,
        Opcode::JmpLeq,
        Opcode::JmpLss,
        Opcode::JmpGeq,
        Opcode::JmpTSet,
        Opcode::JmpTClr,
        Opcode::Add,
        Opcode::Sub,
        Opcode::Mul,
        Opcode::Cat,
        Opcode::Neg,
        Opcode::SrchIndx,
        Opcode::PutIndx,
        Opcode::FnLength,
        Opcode::Write,
        Opcode::Ret,
        Opcode::RetArg,
    ];

    pub const fn info(self) -> OpInfo {
        use Opcode::*;
        use ValueKind as V;
        match self {
            Noop => OpInfo::new("noop", V::None),
            Parameter => OpInfo::new("parameter", V::None),
            LineStart => OpInfo::new("linestart", V::None),
            LineFetch => OpInfo::new("linefetch", V::None),
            Fetch => OpInfo::new("fetch", V::None),
            Ilit => OpInfo::new("ilit", V::Mint).skip(),
            Lit => OpInfo::new("lit", V::Mval).skip(),
            Var => OpInfo::new("var", V::Mval).addr().skip(),
            Sto => OpInfo::new("sto", V::None),
            StoLit => OpInfo::new("stolit", V::None),
            PassThru => OpInfo::new("passthru", V::None),
            GvSavTarg => OpInfo::new("gvsavtarg", V::Mval),
            GvRecTarg => OpInfo::new("gvrectarg", V::None),
            CdAddr => OpInfo::new("cdaddr", V::CodeAddr),
            GetTruth => OpInfo::new("gettruth", V::Mval),
            CoBool => OpInfo::new("cobool", V::Bool).boolean(),
            SCoBool => OpInfo::new("scobool", V::Bool).boolean(),
            Com => OpInfo::new("com", V::Bool).boolean(),
            Equ => OpInfo::new("equ", V::Bool).boolean(),
            NEqu => OpInfo::new("nequ", V::Bool).boolean().negated(),
            Pattern => OpInfo::new("pattern", V::Bool).boolean(),
            NPattern => OpInfo::new("npattern", V::Bool).boolean().negated(),
            Follow => OpInfo::new("follow", V::Bool).boolean(),
            NFollow => OpInfo::new("nfollow", V::Bool).boolean().negated(),
            SortsAfter => OpInfo::new("sortsafter", V::Bool).boolean(),
            NSortsAfter => OpInfo::new("nsortsafter", V::Bool).boolean().negated(),
            Contain => OpInfo::new("contain", V::Bool).boolean(),
            NContain => OpInfo::new("ncontain", V::Bool).boolean().negated(),
            Gt => OpInfo::new("gt", V::Bool).boolean(),
            NGt => OpInfo::new("ngt", V::Bool).boolean().negated(),
            Lt => OpInfo::new("lt", V::Bool).boolean(),
            NLt => OpInfo::new("nlt", V::Bool).boolean().negated(),
            NumCmp => OpInfo::new("numcmp", V::None),
            And => OpInfo::new("and", V::Bool).boolean(),
            NAnd => OpInfo::new("nand", V::Bool).boolean().negated(),
            Or => OpInfo::new("or", V::Bool).boolean(),
            NOr => OpInfo::new("nor", V::Bool).boolean().negated(),
            SAnd => OpInfo::new("sand", V::Bool).boolean(),
            SNAnd => OpInfo::new("snand", V::Bool).boolean().negated(),
            SOr => OpInfo::new("sor", V::Bool).boolean(),
            SNOr => OpInfo::new("snor", V::Bool).boolean().negated(),
            Jmp => OpInfo::new("jmp", V::None),
            JmpEqu => OpInfo::new("jmpequ", V::None),
            JmpNeq => OpInfo::new("jmpneq", V::None),
            JmpGtr => OpInfo::new("jmpgtr", V::None),
            JmpLeq => OpInfo::new("jmpleq", V::None),
            JmpLss => OpInfo::new("jmplss", V::None),
            JmpGeq => OpInfo::new("jmpgeq", V::None),
            JmpTSet => OpInfo::new("jmptset", V::None),
            JmpTClr => OpInfo::new("jmptclr", V::None),
            Add => OpInfo::new("add", V::Mval),
            Sub => OpInfo::new("sub", V::Mval),
            Mul => OpInfo::new("mul", V::Mval),
            Cat => OpInfo::new("cat", V::Mval),
            Neg => OpInfo::new("neg", V::Mval),
            SrchIndx => OpInfo::new("srchindx", V::Mval).addr(),
            PutIndx => OpInfo::new("putindx", V::Mval).addr(),
            FnLength => OpInfo::new("fnlength", V::Mint),
            Write => OpInfo::new("write", V::None),
            Ret => OpInfo::new("ret", V::None),
            RetArg => OpInfo::new("retarg", V::None),
        }
    }

    pub fn name(self) -> &'static str {
        self.info().name
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.name() == s)
    }

    /// Conditional or unconditional jump.
    pub fn is_jump(self) -> bool {
        use Opcode::*;
        matches!(
            self,
            Jmp | JmpEqu | JmpNeq | JmpGtr | JmpLeq | JmpLss | JmpGeq | JmpTSet | JmpTClr
        )
    }

    /// Side-effect (full evaluation) form of a short-circuit connective.
    pub fn to_full_eval(self) -> Option<Self> {
        use Opcode::*;
        match self {
            And => Some(SAnd),
            NAnd => Some(SNAnd),
            Or => Some(SOr),
            NOr => Some(SNOr),
            _ => None,
        }
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
