//! Language-neutral syntax tree.
//!
//! The engine never parses source code itself. An external parser lowers its
//! own AST into this model: a tree of byte ranges where only the nodes that
//! matter for control flow are distinguished. Everything else is either a
//! [`Stmt::Simple`] carrying its sub-expressions (so function literals can be
//! found) or a [`Stmt::Unknown`] leaf.
//!
//! All offsets are byte offsets into the file content. `end` offsets are
//! exclusive.
//!
//! The model is serde-friendly so trees can be handed over as JSON:
//!
//! ```json
//! {"decls": [{"kind": "func", "name": "main",
//!             "span": {"start": 0, "end": 30},
//!             "body": {"lbrace": 12, "rbrace": 29, "stmts": []}}]}
//! ```

use serde::{Deserialize, Serialize};

/// A half-open byte range `[start, end)`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// A parsed source file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyntaxFile {
    #[serde(default)]
    pub decls: Vec<Decl>,
}

/// A top-level declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Decl {
    Func(FuncDecl),
    /// Any other declaration. Its expressions are searched for function literals.
    Other {
        span: Span,
        #[serde(default)]
        exprs: Vec<Expr>,
    },
}

/// A named function or method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuncDecl {
    /// From the start of the declaration (including any keyword) to the closing brace
    pub span: Span,
    pub name: String,
    /// Receiver or owner type name for methods
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
    /// Absent for declarations without a body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<BlockStmt>,
}

/// A braced statement list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockStmt {
    /// Offset of `{`
    pub lbrace: usize,
    /// Offset of `}`
    pub rbrace: usize,
    #[serde(default)]
    pub stmts: Vec<Stmt>,
}

impl BlockStmt {
    pub fn span(&self) -> Span {
        Span::new(self.lbrace, self.rbrace + 1)
    }
}

/// A statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Stmt {
    Block(BlockStmt),
    If(IfStmt),
    For(ForStmt),
    Range(RangeStmt),
    Switch(SwitchStmt),
    Select(SelectStmt),
    Labeled(LabeledStmt),
    Branch(BranchStmt),
    Return(SimpleStmt),
    /// An expression used as a statement, typically a call
    Expr(SimpleStmt),
    /// Assignments, declarations, sends, increments and the like
    Simple(SimpleStmt),
    Empty {
        span: Span,
    },
    /// A node the producer could not classify
    Unknown {
        span: Span,
        #[serde(default)]
        name: String,
    },
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Block(b) => b.span(),
            Stmt::If(s) => s.span,
            Stmt::For(s) => s.span,
            Stmt::Range(s) => s.span,
            Stmt::Switch(s) => s.span,
            Stmt::Select(s) => s.span,
            Stmt::Labeled(s) => s.span,
            Stmt::Branch(s) => s.span,
            Stmt::Return(s) | Stmt::Expr(s) | Stmt::Simple(s) => s.span,
            Stmt::Empty { span } | Stmt::Unknown { span, .. } => *span,
        }
    }

    pub fn pos(&self) -> usize {
        self.span().start
    }

    pub fn end(&self) -> usize {
        self.span().end
    }

    /// Short node name used in diagnostics
    pub fn kind_name(&self) -> &str {
        match self {
            Stmt::Block(_) => "block",
            Stmt::If(_) => "if",
            Stmt::For(_) => "for",
            Stmt::Range(_) => "range",
            Stmt::Switch(_) => "switch",
            Stmt::Select(_) => "select",
            Stmt::Labeled(_) => "labeled",
            Stmt::Branch(_) => "branch",
            Stmt::Return(_) => "return",
            Stmt::Expr(_) => "expr",
            Stmt::Simple(_) => "simple",
            Stmt::Empty { .. } => "empty",
            Stmt::Unknown { name, .. } if !name.is_empty() => name.as_str(),
            Stmt::Unknown { .. } => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfStmt {
    pub span: Span,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init: Option<Box<Stmt>>,
    pub cond: Expr,
    pub body: BlockStmt,
    #[serde(rename = "else", default, skip_serializing_if = "Option::is_none")]
    pub else_branch: Option<Box<ElseBranch>>,
}

/// The statement following `else`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ElseBranch {
    If(IfStmt),
    Block(BlockStmt),
}

impl ElseBranch {
    pub fn span(&self) -> Span {
        match self {
            ElseBranch::If(s) => s.span,
            ElseBranch::Block(b) => b.span(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForStmt {
    pub span: Span,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init: Option<Box<Stmt>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cond: Option<Expr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post: Option<Box<Stmt>>,
    pub body: BlockStmt,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeStmt {
    pub span: Span,
    pub expr: Expr,
    pub body: BlockStmt,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchStmt {
    pub span: Span,
    /// Type switches only consult `init` when looking for a block boundary
    #[serde(default)]
    pub type_switch: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init: Option<Box<Stmt>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<Expr>,
    pub body: ClauseList,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectStmt {
    pub span: Span,
    pub body: ClauseList,
}

/// The braced clause list of a switch or select
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClauseList {
    pub lbrace: usize,
    pub rbrace: usize,
    #[serde(default)]
    pub clauses: Vec<CaseClause>,
}

/// A `case`/`default` clause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseClause {
    /// Ends after the last body statement, or right after the colon when empty
    pub span: Span,
    /// Offset of the `:` ending the clause header
    pub colon: usize,
    #[serde(default)]
    pub exprs: Vec<Expr>,
    /// Communication statement of a select clause
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comm: Option<Box<Stmt>>,
    #[serde(default)]
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledStmt {
    pub span: Span,
    pub label: String,
    pub stmt: Box<Stmt>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchKind {
    Break,
    Continue,
    Goto,
    Fallthrough,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchStmt {
    pub span: Span,
    pub branch: BranchKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimpleStmt {
    pub span: Span,
    #[serde(default)]
    pub exprs: Vec<Expr>,
}

/// An expression. Only calls and function literals are distinguished.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
    Call {
        span: Span,
        /// Plain identifier of the callee, when it is one
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        /// Callee expression when it is not a plain identifier
        #[serde(default, skip_serializing_if = "Option::is_none")]
        callee: Option<Box<Expr>>,
        #[serde(default)]
        args: Vec<Expr>,
    },
    FuncLit {
        span: Span,
        body: BlockStmt,
    },
    Other {
        span: Span,
        #[serde(default)]
        children: Vec<Expr>,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Call { span, .. } | Expr::FuncLit { span, .. } | Expr::Other { span, .. } => {
                *span
            }
        }
    }

    /// A leaf expression with no children
    pub fn leaf(start: usize, end: usize) -> Self {
        Expr::Other {
            span: Span::new(start, end),
            children: Vec::new(),
        }
    }

    /// Offset of the body of the first function literal found in pre-order
    pub fn first_func_lit(&self) -> Option<usize> {
        match self {
            Expr::FuncLit { body, .. } => Some(body.lbrace),
            Expr::Call { callee, args, .. } => callee
                .as_deref()
                .and_then(Expr::first_func_lit)
                .or_else(|| args.iter().find_map(Expr::first_func_lit)),
            Expr::Other { children, .. } => children.iter().find_map(Expr::first_func_lit),
        }
    }

    /// Whether this is a call to the builtin `panic` with a single argument
    pub fn is_panic_call(&self) -> bool {
        matches!(self, Expr::Call { name: Some(name), args, .. } if name == "panic" && args.len() == 1)
    }
}

/// Offset of the first function literal body anywhere inside a statement
pub fn first_func_lit_in_stmt(stmt: &Stmt) -> Option<usize> {
    let opt_stmt = |s: &Option<Box<Stmt>>| s.as_deref().and_then(first_func_lit_in_stmt);
    let block = |b: &BlockStmt| b.stmts.iter().find_map(first_func_lit_in_stmt);
    match stmt {
        Stmt::Block(b) => block(b),
        Stmt::If(s) => first_func_lit_in_if(s),
        Stmt::For(s) => opt_stmt(&s.init)
            .or_else(|| s.cond.as_ref().and_then(Expr::first_func_lit))
            .or_else(|| opt_stmt(&s.post))
            .or_else(|| block(&s.body)),
        Stmt::Range(s) => s.expr.first_func_lit().or_else(|| block(&s.body)),
        Stmt::Switch(s) => opt_stmt(&s.init)
            .or_else(|| s.tag.as_ref().and_then(Expr::first_func_lit))
            .or_else(|| first_func_lit_in_clauses(&s.body)),
        Stmt::Select(s) => first_func_lit_in_clauses(&s.body),
        Stmt::Labeled(s) => first_func_lit_in_stmt(&s.stmt),
        Stmt::Return(s) | Stmt::Expr(s) | Stmt::Simple(s) => {
            s.exprs.iter().find_map(Expr::first_func_lit)
        }
        Stmt::Branch(_) | Stmt::Empty { .. } | Stmt::Unknown { .. } => None,
    }
}

fn first_func_lit_in_if(s: &IfStmt) -> Option<usize> {
    s.init
        .as_deref()
        .and_then(first_func_lit_in_stmt)
        .or_else(|| s.cond.first_func_lit())
        .or_else(|| s.body.stmts.iter().find_map(first_func_lit_in_stmt))
        .or_else(|| match s.else_branch.as_deref() {
            Some(ElseBranch::If(inner)) => first_func_lit_in_if(inner),
            Some(ElseBranch::Block(b)) => b.stmts.iter().find_map(first_func_lit_in_stmt),
            None => None,
        })
}

fn first_func_lit_in_clauses(list: &ClauseList) -> Option<usize> {
    list.clauses.iter().find_map(|c| {
        c.exprs
            .iter()
            .find_map(Expr::first_func_lit)
            .or_else(|| c.comm.as_deref().and_then(first_func_lit_in_stmt))
            .or_else(|| c.body.iter().find_map(first_func_lit_in_stmt))
    })
}

/// Maps byte offsets to 1-based line and column numbers
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(content: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            content
                .bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self { line_starts }
    }

    /// 1-based `(line, column)` of a byte offset. Columns count bytes.
    pub fn position(&self, offset: usize) -> (u32, u32) {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        let col = offset - self.line_starts[line] + 1;
        (line as u32 + 1, col as u32)
    }

    /// Byte offset of a 1-based `(line, column)`, if the line exists
    pub fn offset(&self, line: u32, col: u32) -> Option<usize> {
        let start = *self.line_starts.get((line as usize).checked_sub(1)?)?;
        Some(start + (col as usize).checked_sub(1)?)
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}
