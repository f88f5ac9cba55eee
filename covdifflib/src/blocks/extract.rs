//! Basic block extraction.
//!
//! Walks every statement list of a [`SyntaxFile`] and splits it into basic
//! blocks: maximal straight-line runs ended by a control statement, a branch,
//! a `return`, a `panic(x)` call or a statement holding a function literal.
//! Nested statement lists (bodies, clauses, literal bodies) are visited on
//! their own, so blocks never overlap.
//!
//! ```rust
//! use covdifflib::{extract_blocks, BlockStmt, Decl, FuncDecl, Span, SyntaxFile};
//!
//! // func f() {}
//! let content = "func f() {}";
//! let file = SyntaxFile {
//!     decls: vec![Decl::Func(FuncDecl {
//!         span: Span::new(0, 11),
//!         name: "f".to_string(),
//!         receiver: None,
//!         body: Some(BlockStmt { lbrace: 9, rbrace: 10, stmts: vec![] }),
//!     })],
//! };
//! let blocks = extract_blocks(&file, content).unwrap();
//! assert_eq!(blocks.len(), 1);
//! assert_eq!(blocks[0].start_line, 1);
//! ```

use crate::blocks::model::Block;
use crate::error::CovdiffError;
use crate::source::tree::{
    first_func_lit_in_stmt, BlockStmt, ClauseList, Decl, ElseBranch, Expr, IfStmt, LineIndex,
    Span, Stmt, SyntaxFile,
};
use crate::Result;

/// One basic block as seen by a [`BlockVisitor`]. Offsets are bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicBlock {
    /// Where a counter statement would be inserted
    pub insert_pos: usize,
    pub start: usize,
    pub end: usize,
    pub num_stmts: usize,
    /// Statements belonging to the block, clipped to `end`
    pub stmts: Vec<Span>,
}

/// Receives blocks in emission order.
pub trait BlockVisitor {
    fn on_block(&mut self, block: &BasicBlock);

    /// An `else` branch needs braces at `lbrace` and `rbrace` to hold its own counter.
    /// Read-only consumers can ignore this.
    fn on_wrap_else(&mut self, _lbrace: usize, _rbrace: usize) {}
}

impl<F: FnMut(&BasicBlock)> BlockVisitor for F {
    fn on_block(&mut self, block: &BasicBlock) {
        self(block)
    }
}

/// Options for block extraction
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractOptions {
    /// Fail on [`Stmt::Unknown`] instead of treating it as a plain statement
    pub strict: bool,
}

impl ExtractOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

/// Walk `file` and report every basic block to `visitor`.
pub fn visit<V: BlockVisitor + ?Sized>(
    file: &SyntaxFile,
    content: &str,
    options: ExtractOptions,
    visitor: &mut V,
) -> Result<()> {
    let mut walker = Walker {
        content: content.as_bytes(),
        strict: options.strict,
        visitor,
    };
    for decl in &file.decls {
        match decl {
            Decl::Func(func) => {
                if let Some(body) = &func.body {
                    walker.walk_block(body)?;
                }
            }
            Decl::Other { exprs, .. } => {
                for expr in exprs {
                    walker.walk_expr(expr)?;
                }
            }
        }
    }
    Ok(())
}

/// Basic blocks of a file, in emission order.
pub fn extract_blocks(file: &SyntaxFile, content: &str) -> Result<Vec<Block>> {
    let index = LineIndex::new(content);
    let mut blocks = Vec::new();
    visit(file, content, ExtractOptions::new(), &mut |b: &BasicBlock| {
        blocks.push(to_block(&index, b));
    })?;
    Ok(blocks)
}

/// Basic blocks paired with their textual signature.
///
/// The signature is the text of the block's statements with whitespace runs
/// collapsed, so reformatting does not change it.
pub fn block_signatures(file: &SyntaxFile, content: &str) -> Result<Vec<(Block, String)>> {
    let index = LineIndex::new(content);
    let mut out = Vec::new();
    visit(file, content, ExtractOptions::new(), &mut |b: &BasicBlock| {
        let text: Vec<String> = b
            .stmts
            .iter()
            .map(|span| normalize_whitespace(content.get(span.start..span.end).unwrap_or("")))
            .collect();
        out.push((to_block(&index, b), text.join(";")));
    })?;
    Ok(out)
}

/// Signature of the text a block covers, for callers that only know block
/// positions (such as a coverage profile) and not the syntax tree.
pub fn range_signature(content: &str, index: &LineIndex, block: &Block) -> String {
    let start = index.offset(block.start_line, block.start_col);
    let end = index.offset(block.end_line, block.end_col);
    match (start, end) {
        (Some(start), Some(end)) if start <= end => {
            normalize_whitespace(content.get(start..end).unwrap_or(""))
        }
        _ => String::new(),
    }
}

/// Collapse every whitespace run to one space and trim the ends
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn to_block(index: &LineIndex, b: &BasicBlock) -> Block {
    let (start_line, start_col) = index.position(b.start);
    let (end_line, end_col) = index.position(b.end);
    Block::new(start_line, start_col, end_line, end_col)
}

/// A statement in a list being split, or a label detached from its statement
#[derive(Clone, Copy)]
enum Item<'t> {
    Stmt(&'t Stmt),
    Label { start: usize, end: usize },
}

impl Item<'_> {
    fn pos(&self) -> usize {
        match self {
            Item::Stmt(s) => s.pos(),
            Item::Label { start, .. } => *start,
        }
    }

    fn end(&self) -> usize {
        match self {
            Item::Stmt(s) => s.end(),
            Item::Label { end, .. } => *end,
        }
    }
}

struct Walker<'a, V: ?Sized> {
    content: &'a [u8],
    strict: bool,
    visitor: &'a mut V,
}

impl<V: BlockVisitor + ?Sized> Walker<'_, V> {
    fn walk_block(&mut self, block: &BlockStmt) -> Result<()> {
        self.walk_list(block.lbrace, block.rbrace + 1, &block.stmts)
    }

    /// Visit a braced list whose opening brace sits at `lbrace`
    fn walk_list(&mut self, lbrace: usize, block_end: usize, stmts: &[Stmt]) -> Result<()> {
        let items: Vec<Item<'_>> = stmts.iter().map(Item::Stmt).collect();
        self.add_counters(lbrace, lbrace + 1, block_end, items, true)?;
        for stmt in stmts {
            self.walk_stmt(stmt)?;
        }
        Ok(())
    }

    fn walk_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Block(b) => self.walk_block(b),
            Stmt::If(s) => self.walk_if(s),
            Stmt::For(s) => {
                self.walk_opt_stmt(s.init.as_deref())?;
                if let Some(cond) = &s.cond {
                    self.walk_expr(cond)?;
                }
                self.walk_opt_stmt(s.post.as_deref())?;
                self.walk_block(&s.body)
            }
            Stmt::Range(s) => {
                self.walk_expr(&s.expr)?;
                self.walk_block(&s.body)
            }
            Stmt::Switch(s) => {
                self.walk_opt_stmt(s.init.as_deref())?;
                if let Some(tag) = &s.tag {
                    self.walk_expr(tag)?;
                }
                // An empty switch gets no counter of its own
                if s.body.clauses.is_empty() {
                    return Ok(());
                }
                self.walk_clauses(&s.body)
            }
            Stmt::Select(s) => {
                if s.body.clauses.is_empty() {
                    return Ok(());
                }
                self.walk_clauses(&s.body)
            }
            Stmt::Labeled(s) => self.walk_stmt(&s.stmt),
            Stmt::Return(s) | Stmt::Expr(s) | Stmt::Simple(s) => {
                for expr in &s.exprs {
                    self.walk_expr(expr)?;
                }
                Ok(())
            }
            Stmt::Unknown { .. } if self.strict => Err(unhandled(stmt)),
            Stmt::Branch(_) | Stmt::Empty { .. } | Stmt::Unknown { .. } => Ok(()),
        }
    }

    fn walk_opt_stmt(&mut self, stmt: Option<&Stmt>) -> Result<()> {
        match stmt {
            Some(s) => self.walk_stmt(s),
            None => Ok(()),
        }
    }

    fn walk_expr(&mut self, expr: &Expr) -> Result<()> {
        match expr {
            Expr::FuncLit { body, .. } => self.walk_block(body),
            Expr::Call { callee, args, .. } => {
                if let Some(callee) = callee {
                    self.walk_expr(callee)?;
                }
                for arg in args {
                    self.walk_expr(arg)?;
                }
                Ok(())
            }
            Expr::Other { children, .. } => {
                for child in children {
                    self.walk_expr(child)?;
                }
                Ok(())
            }
        }
    }

    fn walk_clauses(&mut self, list: &ClauseList) -> Result<()> {
        for clause in &list.clauses {
            let items: Vec<Item<'_>> = clause.body.iter().map(Item::Stmt).collect();
            self.add_counters(
                clause.colon + 1,
                clause.colon + 1,
                clause.span.end,
                items,
                false,
            )?;
        }
        for clause in &list.clauses {
            for expr in &clause.exprs {
                self.walk_expr(expr)?;
            }
            self.walk_opt_stmt(clause.comm.as_deref())?;
            for stmt in &clause.body {
                self.walk_stmt(stmt)?;
            }
        }
        Ok(())
    }

    fn walk_if(&mut self, s: &IfStmt) -> Result<()> {
        self.walk_opt_stmt(s.init.as_deref())?;
        self.walk_expr(&s.cond)?;
        self.walk_block(&s.body)?;

        let Some(else_branch) = s.else_branch.as_deref() else {
            return Ok(());
        };

        // `else if` gets a hidden block so the inner `if` has a place for its counter
        let body_end = s.body.rbrace + 1;
        let else_offset = self
            .find_text(body_end, b"else")
            .ok_or(CovdiffError::LostElse(body_end))?;
        let pos = else_offset + 4;
        self.visitor.on_wrap_else(pos, else_branch.span().end);

        match else_branch {
            ElseBranch::If(inner) => {
                let stmt = Stmt::If(inner.clone());
                self.add_counters(pos, pos + 1, inner.span.end + 1, vec![Item::Stmt(&stmt)], true)?;
                self.walk_if(inner)
            }
            ElseBranch::Block(b) => self.walk_list(pos, b.rbrace + 1, &b.stmts),
        }
    }

    /// Split a statement list into basic blocks and report each one.
    fn add_counters(
        &mut self,
        mut pos: usize,
        mut insert_pos: usize,
        block_end: usize,
        mut list: Vec<Item<'_>>,
        mut extend_to_closing_brace: bool,
    ) -> Result<()> {
        if list.is_empty() {
            self.visitor.on_block(&BasicBlock {
                insert_pos,
                start: insert_pos,
                end: block_end,
                num_stmts: 0,
                stmts: Vec::new(),
            });
            return Ok(());
        }

        let mut first = 0;
        loop {
            let mut last = first;
            let mut end = block_end;
            let mut basic: Vec<Span> = Vec::new();
            while last < list.len() {
                let item = list[last];
                end = self.statement_boundary(item)?;
                if self.ends_basic_block(item) {
                    if let Item::Stmt(Stmt::Labeled(label)) = item {
                        if !is_control(&label.stmt) {
                            // `L: stmt` becomes `L: ; stmt` so a goto to L is counted
                            end = label.span.start;
                            list[last] = Item::Label {
                                start: label.span.start,
                                end: label.stmt.pos(),
                            };
                            list.insert(last + 1, Item::Stmt(&label.stmt));
                        }
                    }
                    basic.push(clip(list[last], end));
                    last += 1;
                    extend_to_closing_brace = false;
                    break;
                }
                basic.push(clip(item, end));
                last += 1;
            }
            if extend_to_closing_brace {
                end = block_end;
            }
            if pos != end {
                self.visitor.on_block(&BasicBlock {
                    insert_pos,
                    start: pos,
                    end,
                    num_stmts: last - first,
                    stmts: basic,
                });
            }
            first = last;
            if first >= list.len() {
                return Ok(());
            }
            pos = list[first].pos();
            insert_pos = pos;
        }
    }

    /// Where the current basic block ends if `item` is its last statement
    fn statement_boundary(&self, item: Item<'_>) -> Result<usize> {
        let Item::Stmt(stmt) = item else {
            return Ok(item.end());
        };
        let init = |s: &Option<Box<Stmt>>| s.as_deref().and_then(first_func_lit_in_stmt);
        let boundary = match stmt {
            Stmt::Block(b) => b.lbrace,
            Stmt::If(s) => init(&s.init)
                .or_else(|| s.cond.first_func_lit())
                .unwrap_or(s.body.lbrace),
            Stmt::For(s) => init(&s.init)
                .or_else(|| s.cond.as_ref().and_then(Expr::first_func_lit))
                .or_else(|| init(&s.post))
                .unwrap_or(s.body.lbrace),
            Stmt::Labeled(s) => return self.statement_boundary(Item::Stmt(&s.stmt)),
            Stmt::Range(s) => s.expr.first_func_lit().unwrap_or(s.body.lbrace),
            Stmt::Switch(s) if s.type_switch => init(&s.init).unwrap_or(s.body.lbrace),
            Stmt::Switch(s) => init(&s.init)
                .or_else(|| s.tag.as_ref().and_then(Expr::first_func_lit))
                .unwrap_or(s.body.lbrace),
            Stmt::Select(s) => s.body.lbrace,
            Stmt::Unknown { .. } if self.strict => return Err(unhandled(stmt)),
            other => first_func_lit_in_stmt(other).unwrap_or(other.end()),
        };
        Ok(boundary)
    }

    /// Whether `item` changes the flow of control
    fn ends_basic_block(&self, item: Item<'_>) -> bool {
        let Item::Stmt(stmt) = item else {
            return true;
        };
        match stmt {
            Stmt::Block(_)
            | Stmt::Branch(_)
            | Stmt::Return(_)
            | Stmt::For(_)
            | Stmt::If(_)
            | Stmt::Labeled(_)
            | Stmt::Range(_)
            | Stmt::Switch(_)
            | Stmt::Select(_) => true,
            Stmt::Expr(s) if s.exprs.len() == 1 && s.exprs[0].is_panic_call() => true,
            other => first_func_lit_in_stmt(other).is_some(),
        }
    }

    /// Byte offset of `text` at or after `start`, skipping comments
    fn find_text(&self, start: usize, text: &[u8]) -> Option<usize> {
        let s = self.content;
        let mut i = start;
        while i < s.len() {
            if s[i..].starts_with(text) {
                return Some(i);
            }
            if s[i..].starts_with(b"//") {
                while i < s.len() && s[i] != b'\n' {
                    i += 1;
                }
                continue;
            }
            if s[i..].starts_with(b"/*") {
                i += 2;
                loop {
                    if i + 2 > s.len() {
                        return None;
                    }
                    if s[i..].starts_with(b"*/") {
                        i += 2;
                        break;
                    }
                    i += 1;
                }
                continue;
            }
            i += 1;
        }
        None
    }
}

/// Statements that cannot be separated from their label
fn is_control(stmt: &Stmt) -> bool {
    matches!(
        stmt,
        Stmt::For(_) | Stmt::Range(_) | Stmt::Switch(_) | Stmt::Select(_)
    )
}

fn unhandled(stmt: &Stmt) -> CovdiffError {
    CovdiffError::UnhandledNode {
        kind: stmt.kind_name().to_string(),
        offset: stmt.pos(),
    }
}

fn clip(item: Item<'_>, end: usize) -> Span {
    let start = item.pos();
    Span::new(start, item.end().min(end).max(start))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::tree::{
        BranchKind, BranchStmt, CaseClause, FuncDecl, LabeledStmt, SimpleStmt, SwitchStmt,
    };

    fn simple(start: usize, end: usize) -> Stmt {
        Stmt::Simple(SimpleStmt {
            span: Span::new(start, end),
            exprs: Vec::new(),
        })
    }

    fn func_file(content: &str, stmts: Vec<Stmt>) -> SyntaxFile {
        let lbrace = content.find('{').unwrap();
        let rbrace = content.rfind('}').unwrap();
        SyntaxFile {
            decls: vec![Decl::Func(FuncDecl {
                span: Span::new(0, rbrace + 1),
                name: "f".to_string(),
                receiver: None,
                body: Some(BlockStmt {
                    lbrace,
                    rbrace,
                    stmts,
                }),
            })],
        }
    }

    fn offset_of(content: &str, needle: &str) -> usize {
        content.find(needle).unwrap()
    }

    fn collect(file: &SyntaxFile, content: &str) -> Vec<BasicBlock> {
        let mut out = Vec::new();
        visit(file, content, ExtractOptions::new(), &mut |b: &BasicBlock| {
            out.push(b.clone())
        })
        .unwrap();
        out
    }

    #[test]
    fn test_straight_line_is_one_block() {
        let content = "func f() {\n\ta := 1\n\tb := 2\n}\n";
        let a = offset_of(content, "a :=");
        let b = offset_of(content, "b :=");
        let file = func_file(content, vec![simple(a, a + 6), simple(b, b + 6)]);

        let blocks = extract_blocks(&file, content).unwrap();
        assert_eq!(blocks, vec![Block::new(1, 10, 4, 2)]);

        let raw = collect(&file, content);
        assert_eq!(raw[0].num_stmts, 2);
        assert_eq!(raw[0].stmts.len(), 2);
    }

    #[test]
    fn test_empty_if_body_yields_zero_statement_block() {
        let content = "func f() {\n\tif x {}\n}\n";
        let if_pos = offset_of(content, "if x");
        let lbrace = offset_of(content, "{}");
        let stmt = Stmt::If(IfStmt {
            span: Span::new(if_pos, lbrace + 2),
            init: None,
            cond: Expr::leaf(if_pos + 3, if_pos + 4),
            body: BlockStmt {
                lbrace,
                rbrace: lbrace + 1,
                stmts: Vec::new(),
            },
            else_branch: None,
        });
        let file = func_file(content, vec![stmt]);
        let raw = collect(&file, content);

        let empty: Vec<_> = raw.iter().filter(|b| b.num_stmts == 0).collect();
        assert_eq!(empty.len(), 1);
        assert_eq!(empty[0].start, lbrace + 1);
        assert_eq!(empty[0].end, lbrace + 2);
    }

    #[test]
    fn test_if_terminates_block() {
        let content = "func f() {\n\ta := 1\n\tif a > 0 {\n\t\tb()\n\t}\n\tc()\n}\n";
        let a = offset_of(content, "a := 1");
        let if_pos = offset_of(content, "if a");
        let body_l = offset_of(content, "{\n\t\tb");
        let b = offset_of(content, "b()");
        let body_r = offset_of(content, "}\n\tc");
        let c = offset_of(content, "c()");
        let stmts = vec![
            simple(a, a + 6),
            Stmt::If(IfStmt {
                span: Span::new(if_pos, body_r + 1),
                init: None,
                cond: Expr::leaf(if_pos + 3, if_pos + 8),
                body: BlockStmt {
                    lbrace: body_l,
                    rbrace: body_r,
                    stmts: vec![simple(b, b + 3)],
                },
                else_branch: None,
            }),
            simple(c, c + 3),
        ];
        let file = func_file(content, stmts);
        let blocks = extract_blocks(&file, content).unwrap();

        // outer head up to the if body, tail after the if, then the if body
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0], Block::new(1, 10, 3, 11));
        assert_eq!(blocks[1], Block::new(6, 2, 6, 5));
        assert_eq!(blocks[2], Block::new(3, 11, 5, 3));
    }

    #[test]
    fn test_return_and_branch_end_block() {
        let content = "func f() {\n\ta()\n\treturn\n\tb()\n}\n";
        let a = offset_of(content, "a()");
        let r = offset_of(content, "return");
        let b = offset_of(content, "b()");
        let stmts = vec![
            simple(a, a + 3),
            Stmt::Return(SimpleStmt {
                span: Span::new(r, r + 6),
                exprs: Vec::new(),
            }),
            simple(b, b + 3),
        ];
        let file = func_file(content, stmts);
        let raw = collect(&file, content);
        assert_eq!(raw.len(), 2);
        assert_eq!(raw[0].num_stmts, 2);
        assert_eq!(raw[0].end, r + 6);
        assert_eq!(raw[1].start, b);
        assert_eq!(raw[1].num_stmts, 1);

        let content = "func f() {\n\tbreak\n\tb()\n}\n";
        let br = offset_of(content, "break");
        let b = offset_of(content, "b()");
        let stmts = vec![
            Stmt::Branch(BranchStmt {
                span: Span::new(br, br + 5),
                branch: BranchKind::Break,
                label: None,
            }),
            simple(b, b + 3),
        ];
        let file = func_file(content, stmts);
        assert_eq!(collect(&file, content).len(), 2);
    }

    #[test]
    fn test_panic_call_ends_block() {
        let content = "func f() {\n\tpanic(e)\n\tb()\n}\n";
        let p = offset_of(content, "panic");
        let b = offset_of(content, "b()");
        let panic_stmt = Stmt::Expr(SimpleStmt {
            span: Span::new(p, p + 8),
            exprs: vec![Expr::Call {
                span: Span::new(p, p + 8),
                name: Some("panic".to_string()),
                callee: None,
                args: vec![Expr::leaf(p + 6, p + 7)],
            }],
        });
        let file = func_file(content, vec![panic_stmt, simple(b, b + 3)]);
        assert_eq!(collect(&file, content).len(), 2);
    }

    #[test]
    fn test_func_literal_forces_boundary_and_own_block() {
        let content = "func f() {\n\tg := func() {\n\t\tx()\n\t}\n\tg()\n}\n";
        let g = offset_of(content, "g :=");
        let lit = offset_of(content, "func() {");
        let lit_l = lit + "func() ".len();
        let x = offset_of(content, "x()");
        let lit_r = offset_of(content, "}\n\tg()");
        let call = offset_of(content, "g()");
        let stmts = vec![
            Stmt::Simple(SimpleStmt {
                span: Span::new(g, lit_r + 1),
                exprs: vec![Expr::FuncLit {
                    span: Span::new(lit, lit_r + 1),
                    body: BlockStmt {
                        lbrace: lit_l,
                        rbrace: lit_r,
                        stmts: vec![simple(x, x + 3)],
                    },
                }],
            }),
            simple(call, call + 3),
        ];
        let file = func_file(content, stmts);
        let raw = collect(&file, content);
        assert_eq!(raw.len(), 3);
        assert_eq!(raw[0].end, lit_l);
        assert_eq!(raw[1].start, call);
        assert_eq!(raw[2].start, lit_l);
    }

    #[test]
    fn test_labeled_statement_is_split_from_label() {
        let content = "func f() {\n\ta()\nL:\n\tb()\n}\n";
        let a = offset_of(content, "a()");
        let l = offset_of(content, "L:");
        let b = offset_of(content, "b()");
        let stmts = vec![
            simple(a, a + 3),
            Stmt::Labeled(LabeledStmt {
                span: Span::new(l, b + 3),
                label: "L".to_string(),
                stmt: Box::new(simple(b, b + 3)),
            }),
        ];
        let file = func_file(content, stmts);
        let raw = collect(&file, content);
        assert_eq!(raw.len(), 2);
        // the first block stops before the label and counts the detached label
        assert_eq!(raw[0].end, l);
        assert_eq!(raw[0].num_stmts, 2);
        // the labeled statement starts its own block
        assert_eq!(raw[1].start, b);
        assert_eq!(raw[1].num_stmts, 1);
    }

    #[test]
    fn test_else_if_is_wrapped() {
        let content = "func f() {\n\tif a {\n\t} else if b {\n\t}\n}\n";
        let if1 = offset_of(content, "if a");
        let l1 = offset_of(content, "{\n\t} else");
        let r1 = l1 + 3;
        let if2 = offset_of(content, "if b");
        let l2 = offset_of(content, "{\n\t}\n}");
        let r2 = l2 + 3;
        let inner = IfStmt {
            span: Span::new(if2, r2 + 1),
            init: None,
            cond: Expr::leaf(if2 + 3, if2 + 4),
            body: BlockStmt {
                lbrace: l2,
                rbrace: r2,
                stmts: Vec::new(),
            },
            else_branch: None,
        };
        let outer = Stmt::If(IfStmt {
            span: Span::new(if1, r2 + 1),
            init: None,
            cond: Expr::leaf(if1 + 3, if1 + 4),
            body: BlockStmt {
                lbrace: l1,
                rbrace: r1,
                stmts: Vec::new(),
            },
            else_branch: Some(Box::new(ElseBranch::If(inner))),
        });
        let file = func_file(content, vec![outer]);

        struct Recorder {
            blocks: Vec<BasicBlock>,
            wraps: Vec<(usize, usize)>,
        }
        impl BlockVisitor for Recorder {
            fn on_block(&mut self, block: &BasicBlock) {
                self.blocks.push(block.clone());
            }
            fn on_wrap_else(&mut self, lbrace: usize, rbrace: usize) {
                self.wraps.push((lbrace, rbrace));
            }
        }
        let mut rec = Recorder {
            blocks: Vec::new(),
            wraps: Vec::new(),
        };
        visit(&file, content, ExtractOptions::new(), &mut rec).unwrap();

        let else_pos = offset_of(content, "else") + 4;
        assert_eq!(rec.wraps, vec![(else_pos, r2 + 1)]);
        // the hidden block covers `else if b` up to the inner body
        assert!(rec.blocks.iter().any(|b| b.start == else_pos && b.end == l2));
    }

    #[test]
    fn test_switch_clauses_are_blocks() {
        let content = "func f() {\n\tswitch x {\n\tcase 1:\n\t\ta()\n\tdefault:\n\t}\n}\n";
        let sw = offset_of(content, "switch");
        let body_l = offset_of(content, "{\n\tcase");
        let c1 = offset_of(content, "case 1");
        let colon1 = c1 + 6;
        let a = offset_of(content, "a()");
        let d = offset_of(content, "default");
        let colon2 = d + 7;
        let body_r = offset_of(content, "}\n}");
        let stmt = Stmt::Switch(SwitchStmt {
            span: Span::new(sw, body_r + 1),
            type_switch: false,
            init: None,
            tag: Some(Expr::leaf(sw + 7, sw + 8)),
            body: ClauseList {
                lbrace: body_l,
                rbrace: body_r,
                clauses: vec![
                    CaseClause {
                        span: Span::new(c1, a + 3),
                        colon: colon1,
                        exprs: vec![Expr::leaf(c1 + 5, c1 + 6)],
                        comm: None,
                        body: vec![simple(a, a + 3)],
                    },
                    CaseClause {
                        span: Span::new(d, colon2 + 1),
                        colon: colon2,
                        exprs: Vec::new(),
                        comm: None,
                        body: Vec::new(),
                    },
                ],
            },
        });
        let file = func_file(content, vec![stmt]);
        let raw = collect(&file, content);
        // function head up to the switch body, then one block per clause
        assert_eq!(raw.len(), 3);
        assert_eq!(raw[1].start, colon1 + 1);
        assert_eq!(raw[1].end, a + 3);
        assert_eq!(raw[2].num_stmts, 0);
        assert_eq!(raw[2].start, colon2 + 1);
    }

    #[test]
    fn test_empty_switch_not_annotated_but_tag_walked() {
        let content = "func f() {\n\tswitch g(func() {}) {\n\t}\n}\n";
        let sw = offset_of(content, "switch");
        let lit = offset_of(content, "func() {}");
        let lit_l = lit + 7;
        let body_l = offset_of(content, "{\n\t}");
        let stmt = Stmt::Switch(SwitchStmt {
            span: Span::new(sw, body_l + 4),
            type_switch: false,
            init: None,
            tag: Some(Expr::Call {
                span: Span::new(sw + 7, lit + 10),
                name: Some("g".to_string()),
                callee: None,
                args: vec![Expr::FuncLit {
                    span: Span::new(lit, lit + 9),
                    body: BlockStmt {
                        lbrace: lit_l,
                        rbrace: lit_l + 1,
                        stmts: Vec::new(),
                    },
                }],
            }),
            body: ClauseList {
                lbrace: body_l,
                rbrace: body_l + 3,
                clauses: Vec::new(),
            },
        });
        let file = func_file(content, vec![stmt]);
        let raw = collect(&file, content);
        // function head block and the literal body, nothing for the switch itself
        assert_eq!(raw.len(), 2);
        assert!(raw.iter().any(|b| b.start == lit_l + 1 && b.num_stmts == 0));
    }

    #[test]
    fn test_strict_mode_rejects_unknown_nodes() {
        let content = "func f() {\n\t???\n}\n";
        let q = offset_of(content, "???");
        let stmts = vec![Stmt::Unknown {
            span: Span::new(q, q + 3),
            name: "asm".to_string(),
        }];
        let file = func_file(content, stmts);

        assert_eq!(collect(&file, content).len(), 1);

        let mut sink = |_: &BasicBlock| {};
        let err = visit(&file, content, ExtractOptions::new().strict(true), &mut sink).unwrap_err();
        assert!(matches!(err, CovdiffError::UnhandledNode { ref kind, .. } if kind == "asm"));
    }

    #[test]
    fn test_signatures_ignore_reformatting() {
        let a = "func f() {\n\tx :=   1\n}\n";
        let b = "func f() {\n\n\n\tx := 1\n}\n";
        let xa = offset_of(a, "x");
        let xb = offset_of(b, "x");
        let fa = func_file(a, vec![simple(xa, xa + 8)]);
        let fb = func_file(b, vec![simple(xb, xb + 6)]);
        let sa = block_signatures(&fa, a).unwrap();
        let sb = block_signatures(&fb, b).unwrap();
        assert_eq!(sa[0].1, "x := 1");
        assert_eq!(sa[0].1, sb[0].1);
        assert_ne!(sa[0].0, sb[0].0);
    }
}
