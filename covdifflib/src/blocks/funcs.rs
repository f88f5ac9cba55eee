//! Function and closure discovery.

use serde::{Deserialize, Serialize};

use crate::blocks::model::Block;
use crate::source::tree::{
    ClauseList, Decl, ElseBranch, Expr, IfStmt, LineIndex, Span, Stmt, SyntaxFile,
};

/// A function or closure found in a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuncInfo {
    pub block: Block,
    /// Empty for closures
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_type: Option<String>,
    pub closure: bool,
}

/// Every named function and function literal of a file, in source pre-order.
pub fn collect_funcs(file: &SyntaxFile, content: &str) -> Vec<FuncInfo> {
    let mut finder = FuncFinder {
        index: LineIndex::new(content),
        funcs: Vec::new(),
    };
    for decl in &file.decls {
        match decl {
            Decl::Func(func) => {
                finder.push(func.span, func.name.clone(), func.receiver.clone(), false);
                if let Some(body) = &func.body {
                    finder.stmts(&body.stmts);
                }
            }
            Decl::Other { exprs, .. } => exprs.iter().for_each(|e| finder.expr(e)),
        }
    }
    finder.funcs
}

struct FuncFinder {
    index: LineIndex,
    funcs: Vec<FuncInfo>,
}

impl FuncFinder {
    fn push(&mut self, span: Span, name: String, owner_type: Option<String>, closure: bool) {
        let (start_line, start_col) = self.index.position(span.start);
        let (end_line, end_col) = self.index.position(span.end);
        self.funcs.push(FuncInfo {
            block: Block::new(start_line, start_col, end_line, end_col),
            name,
            owner_type,
            closure,
        });
    }

    fn stmts(&mut self, stmts: &[Stmt]) {
        stmts.iter().for_each(|s| self.stmt(s));
    }

    fn opt_stmt(&mut self, stmt: &Option<Box<Stmt>>) {
        if let Some(s) = stmt {
            self.stmt(s);
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block(b) => self.stmts(&b.stmts),
            Stmt::If(s) => self.if_stmt(s),
            Stmt::For(s) => {
                self.opt_stmt(&s.init);
                if let Some(cond) = &s.cond {
                    self.expr(cond);
                }
                self.opt_stmt(&s.post);
                self.stmts(&s.body.stmts);
            }
            Stmt::Range(s) => {
                self.expr(&s.expr);
                self.stmts(&s.body.stmts);
            }
            Stmt::Switch(s) => {
                self.opt_stmt(&s.init);
                if let Some(tag) = &s.tag {
                    self.expr(tag);
                }
                self.clauses(&s.body);
            }
            Stmt::Select(s) => self.clauses(&s.body),
            Stmt::Labeled(s) => self.stmt(&s.stmt),
            Stmt::Return(s) | Stmt::Expr(s) | Stmt::Simple(s) => {
                s.exprs.iter().for_each(|e| self.expr(e))
            }
            Stmt::Branch(_) | Stmt::Empty { .. } | Stmt::Unknown { .. } => {}
        }
    }

    fn if_stmt(&mut self, s: &IfStmt) {
        self.opt_stmt(&s.init);
        self.expr(&s.cond);
        self.stmts(&s.body.stmts);
        match s.else_branch.as_deref() {
            Some(ElseBranch::If(inner)) => self.if_stmt(inner),
            Some(ElseBranch::Block(b)) => self.stmts(&b.stmts),
            None => {}
        }
    }

    fn clauses(&mut self, list: &ClauseList) {
        for clause in &list.clauses {
            clause.exprs.iter().for_each(|e| self.expr(e));
            self.opt_stmt(&clause.comm);
            self.stmts(&clause.body);
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::FuncLit { span, body } => {
                self.push(*span, String::new(), None, true);
                self.stmts(&body.stmts);
            }
            Expr::Call { callee, args, .. } => {
                if let Some(callee) = callee {
                    self.expr(callee);
                }
                args.iter().for_each(|a| self.expr(a));
            }
            Expr::Other { children, .. } => children.iter().for_each(|c| self.expr(c)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::tree::{BlockStmt, FuncDecl, SimpleStmt};

    #[test]
    fn test_collects_methods_and_closures() {
        let content = "func (s *S) Run() {\n\tgo func() {\n\t}()\n}\n";
        let lit = content.find("func() {").unwrap();
        let lit_l = lit + 7;
        let lit_r = content.find("}()").unwrap();
        let rbrace = content.rfind('}').unwrap();
        let file = SyntaxFile {
            decls: vec![Decl::Func(FuncDecl {
                span: Span::new(0, rbrace + 1),
                name: "Run".to_string(),
                receiver: Some("S".to_string()),
                body: Some(BlockStmt {
                    lbrace: 18,
                    rbrace,
                    stmts: vec![Stmt::Simple(SimpleStmt {
                        span: Span::new(lit - 3, lit_r + 3),
                        exprs: vec![Expr::Call {
                            span: Span::new(lit, lit_r + 3),
                            name: None,
                            callee: Some(Box::new(Expr::FuncLit {
                                span: Span::new(lit, lit_r + 1),
                                body: BlockStmt {
                                    lbrace: lit_l,
                                    rbrace: lit_r,
                                    stmts: Vec::new(),
                                },
                            })),
                            args: Vec::new(),
                        }],
                    })],
                }),
            })],
        };

        let funcs = collect_funcs(&file, content);
        assert_eq!(funcs.len(), 2);
        assert_eq!(funcs[0].name, "Run");
        assert_eq!(funcs[0].owner_type.as_deref(), Some("S"));
        assert!(!funcs[0].closure);
        assert_eq!(funcs[0].block, Block::new(1, 1, 4, 2));
        assert!(funcs[1].closure);
        assert_eq!(funcs[1].block.start_line, 2);
        assert_eq!(funcs[1].block.end_line, 3);
    }
}
