// ABOUTME: Textual LLVM IR emission for the statically typed subset

use std::collections::HashMap;
use std::fmt::Write;

use crate::ast::{Node, NodeKind};
use crate::types::Type;

/// The emitted subset: literals, arithmetic, comparisons, `if`, `let`,
/// `do`, top-level `def`-bound functions with concrete types, calls among
/// them, and `print`. Everything else is skipped with a comment — the tree
/// walker remains the reference semantics.
pub struct CodegenOpts {
    pub module_name: String,
    pub for_exe: bool,
}

pub fn emit_ir(program: &'static Node, opts: &CodegenOpts) -> String {
    let mut em = Emitter {
        consts: String::new(),
        funcs: String::new(),
        fn_sigs: HashMap::new(),
        globals: HashMap::new(),
        nconst: 0,
    };
    let forms = program.as_list().unwrap_or(&[]);

    // First pass: signatures and globals, so calls and references can be
    // emitted in any order.
    for &form in forms {
        if let Some((name, ty, expr)) = as_def(form) {
            match &ty {
                Type::Func { params, ret } if is_fn_form(expr) => {
                    em.fn_sigs.insert(name.to_string(), (params.clone(), (**ret).clone()));
                }
                _ => {
                    em.globals.insert(name.to_string(), ty);
                }
            }
        }
    }

    // Second pass: function bodies, then the main statement stream.
    let mut main_ctx = FnCtx::new();
    for &form in forms {
        match as_def(form) {
            Some((name, _, expr)) if em.fn_sigs.contains_key(name) => {
                em.emit_function(name, expr);
            }
            Some((name, ty, expr)) => {
                let (v, _) = em.emit_expr(&mut main_ctx, expr);
                if let Some(llty) = map_first_class(&ty) {
                    if !v.is_empty() {
                        let _ = writeln!(
                            main_ctx.body,
                            "  store {} {}, {}* @\"g.{}\"",
                            llty, v, llty, name
                        );
                    }
                }
            }
            None => {
                em.emit_expr(&mut main_ctx, form);
            }
        }
    }

    let mut out = String::new();
    let _ = writeln!(out, "; ModuleID = '{}'", opts.module_name);
    out.push('\n');
    out.push_str(RUNTIME_DECLS);
    out.push('\n');
    out.push_str(&em.consts);
    for (name, ty) in &em.globals {
        if let Some(llty) = map_first_class(ty) {
            let _ = writeln!(out, "@\"g.{}\" = internal global {} zeroinitializer", name, llty);
        }
    }
    out.push('\n');
    out.push_str(&em.funcs);
    if opts.for_exe {
        out.push_str("define i32 @main() {\nentry:\n");
        out.push_str(&main_ctx.body);
        match em.fn_sigs.get("main") {
            Some((params, Type::Int)) if params.is_empty() => {
                out.push_str("  %ret = call i64 @\"sq.main\"()\n");
                out.push_str("  %code = trunc i64 %ret to i32\n");
                out.push_str("  ret i32 %code\n");
            }
            _ => out.push_str("  ret i32 0\n"),
        }
        out.push_str("}\n");
    }
    out
}

const RUNTIME_DECLS: &str = "\
declare void @sq_print_i64(i64)
declare void @sq_print_f64(double)
declare void @sq_print_bool(i1)
declare void @sq_print_str(i8*)
declare i8* @sq_alloc(i64)
declare i8* @sq_alloc_closure(i8*, i8*)
declare i8* @sq_string_new(i8*, i64)
declare i64 @sq_string_len(i8*)
declare i8* @sq_string_concat(i8*, i8*)
";

// [def name : Type expr]
fn as_def(form: &'static Node) -> Option<(&'static str, Type, &'static Node)> {
    let items = form.as_list()?;
    if items.len() < 5 || !items[0].is_sym("def") || !items[2].is_sym(":") {
        return None;
    }
    let name = items[1].as_symbol()?;
    Some((name, Type::from_node(items[3]), items[4]))
}

fn is_fn_form(n: &Node) -> bool {
    n.as_list().and_then(|items| items.first().copied()).is_some_and(|h| h.is_sym("fn"))
}

/// SQALE type to LLVM type; `Unit` has no first-class mapping.
fn map_ty(ty: &Type) -> &'static str {
    match ty {
        Type::Int => "i64",
        Type::Float => "double",
        Type::Bool => "i1",
        Type::Str => "i8*",
        Type::Unit => "void",
        _ => "i8*",
    }
}

fn map_first_class(ty: &Type) -> Option<&'static str> {
    match ty {
        Type::Unit => None,
        other => Some(map_ty(other)),
    }
}

fn zero_value(llty: &str) -> &'static str {
    match llty {
        "double" => "0.0",
        "i8*" => "null",
        _ => "0",
    }
}

struct Emitter {
    consts: String,
    funcs: String,
    fn_sigs: HashMap<String, (Vec<Type>, Type)>,
    globals: HashMap<String, Type>,
    nconst: usize,
}

struct FnCtx {
    body: String,
    tmp: usize,
    cur_block: String,
    scopes: Vec<HashMap<String, (String, Type)>>,
}

impl FnCtx {
    fn new() -> Self {
        FnCtx {
            body: String::new(),
            tmp: 0,
            cur_block: "entry".to_string(),
            scopes: vec![HashMap::new()],
        }
    }

    fn fresh(&mut self) -> String {
        self.tmp += 1;
        format!("%t{}", self.tmp)
    }

    fn fresh_label(&mut self, base: &str) -> String {
        self.tmp += 1;
        format!("{}{}", base, self.tmp)
    }

    fn start_block(&mut self, label: &str) {
        let _ = writeln!(self.body, "{}:", label);
        self.cur_block = label.to_string();
    }

    fn lookup(&self, name: &str) -> Option<(String, Type)> {
        self.scopes.iter().rev().find_map(|s| s.get(name).cloned())
    }
}

impl Emitter {
    fn emit_function(&mut self, name: &str, fn_form: &'static Node) {
        let (param_tys, ret) = match self.fn_sigs.get(name) {
            Some(sig) => sig.clone(),
            None => return,
        };
        let items = match fn_form.as_list() {
            Some(items) if items.len() >= 2 => items,
            _ => return,
        };
        let params = items[1].as_list().unwrap_or(&[]);
        let mut ctx = FnCtx::new();
        let sig_params: Vec<String> = param_tys
            .iter()
            .enumerate()
            .map(|(i, ty)| format!("{} %p{}", map_ty(ty), i))
            .collect();
        let mut header = format!(
            "define {} @\"sq.{}\"({}) {{\nentry:\n",
            map_ty(&ret),
            name,
            sig_params.join(", ")
        );
        // Spill each parameter to a stack slot so the body can treat every
        // name uniformly as a pointer.
        for (i, p) in params.iter().enumerate().take(param_tys.len()) {
            let pname = match p.as_list().and_then(|s| s.first().copied()).and_then(|n| n.as_symbol()) {
                Some(n) => n,
                None => continue,
            };
            let llty = match map_first_class(&param_tys[i]) {
                Some(t) => t,
                None => continue,
            };
            let ptr = format!("%\"{}.addr\"", pname);
            let _ = writeln!(header, "  {} = alloca {}", ptr, llty);
            let _ = writeln!(header, "  store {} %p{}, {}* {}", llty, i, llty, ptr);
            ctx.scopes[0].insert(pname.to_string(), (ptr, param_tys[i].clone()));
        }
        let mut body_start = 2;
        if items.get(2).is_some_and(|n| n.is_sym(":")) {
            body_start = 4;
        }
        let mut last = (String::new(), Type::Unit);
        for &body in items.get(body_start..).unwrap_or(&[]) {
            last = self.emit_expr(&mut ctx, body);
        }
        match map_first_class(&ret) {
            Some(llty) if !last.0.is_empty() => {
                let _ = writeln!(ctx.body, "  ret {} {}", llty, last.0);
            }
            Some(llty) => {
                let _ = writeln!(ctx.body, "  ret {} {}", llty, zero_value(llty));
            }
            None => {
                let _ = writeln!(ctx.body, "  ret void");
            }
        }
        self.funcs.push_str(&header);
        self.funcs.push_str(&ctx.body);
        self.funcs.push_str("}\n\n");
    }

    /// Emit one expression; returns its SSA operand and SQALE type. Unit
    /// expressions return an empty operand that is never referenced.
    fn emit_expr(&mut self, ctx: &mut FnCtx, n: &'static Node) -> (String, Type) {
        match &n.kind {
            NodeKind::Int(v) => (v.to_string(), Type::Int),
            NodeKind::Float(v) => (format!("0x{:016X}", v.to_bits()), Type::Float),
            NodeKind::Bool(b) => ((*b as u8).to_string(), Type::Bool),
            NodeKind::Str(s) => self.emit_str_const(ctx, s),
            NodeKind::Symbol(name) => self.emit_symbol(ctx, name),
            NodeKind::List(items) => self.emit_list(ctx, items),
        }
    }

    fn emit_symbol(&mut self, ctx: &mut FnCtx, name: &str) -> (String, Type) {
        if let Some((ptr, ty)) = ctx.lookup(name) {
            match map_first_class(&ty) {
                Some(llty) => {
                    let tmp = ctx.fresh();
                    let _ = writeln!(ctx.body, "  {} = load {}, {}* {}", tmp, llty, llty, ptr);
                    (tmp, ty)
                }
                None => (String::new(), Type::Unit),
            }
        } else if let Some(ty) = self.globals.get(name).cloned() {
            match map_first_class(&ty) {
                Some(llty) => {
                    let tmp = ctx.fresh();
                    let _ =
                        writeln!(ctx.body, "  {} = load {}, {}* @\"g.{}\"", tmp, llty, llty, name);
                    (tmp, ty)
                }
                None => (String::new(), Type::Unit),
            }
        } else {
            let _ = writeln!(ctx.body, "  ; unsupported symbol {}", name);
            (String::new(), Type::Unit)
        }
    }

    fn emit_str_const(&mut self, ctx: &mut FnCtx, s: &str) -> (String, Type) {
        let label = format!("@.str.{}", self.nconst);
        self.nconst += 1;
        let bytes = s.as_bytes();
        let len = bytes.len() + 1;
        let _ = writeln!(
            self.consts,
            "{} = private unnamed_addr constant [{} x i8] c\"{}\\00\"",
            label,
            len,
            escape_ir(bytes)
        );
        let tmp = ctx.fresh();
        let _ = writeln!(
            ctx.body,
            "  {} = getelementptr inbounds [{} x i8], [{} x i8]* {}, i64 0, i64 0",
            tmp, len, len, label
        );
        (tmp, Type::Str)
    }

    fn emit_list(&mut self, ctx: &mut FnCtx, items: &[&'static Node]) -> (String, Type) {
        if items.is_empty() {
            return (String::new(), Type::Unit);
        }
        let head = match items[0].as_symbol() {
            Some(h) => h,
            None => {
                let _ = writeln!(ctx.body, "  ; unsupported call head");
                return (String::new(), Type::Unit);
            }
        };
        match head {
            "+" | "-" | "*" | "/" | "mod" | "%" if items.len() == 3 => {
                self.emit_arith(ctx, head, items)
            }
            "=" | "!=" | "<" | ">" | "<=" | ">=" if items.len() == 3 => {
                self.emit_cmp(ctx, head, items)
            }
            "if" if items.len() == 4 => self.emit_if(ctx, items),
            "let" => self.emit_let(ctx, items),
            "do" => {
                let mut last = (String::new(), Type::Unit);
                for &item in &items[1..] {
                    last = self.emit_expr(ctx, item);
                }
                last
            }
            "print" if items.len() == 2 => {
                let (v, ty) = self.emit_expr(ctx, items[1]);
                let callee = match ty {
                    Type::Int => "sq_print_i64",
                    Type::Float => "sq_print_f64",
                    Type::Bool => "sq_print_bool",
                    Type::Str => "sq_print_str",
                    _ => {
                        let _ = writeln!(ctx.body, "  ; unsupported print operand");
                        return (String::new(), Type::Unit);
                    }
                };
                let _ = writeln!(ctx.body, "  call void @{}({} {})", callee, map_ty(&ty), v);
                (String::new(), Type::Unit)
            }
            name if self.fn_sigs.contains_key(name) => self.emit_call(ctx, name, items),
            other => {
                let _ = writeln!(ctx.body, "  ; unsupported form {}", other);
                (String::new(), Type::Unit)
            }
        }
    }

    fn emit_arith(&mut self, ctx: &mut FnCtx, op: &str, items: &[&'static Node]) -> (String, Type) {
        let (a, ta) = self.emit_expr(ctx, items[1]);
        let (b, tb) = self.emit_expr(ctx, items[2]);
        if a.is_empty() || b.is_empty() {
            return (String::new(), Type::Unit);
        }
        let (instr, ty) = match (&ta, &tb) {
            (Type::Int, Type::Int) => (
                match op {
                    "+" => "add",
                    "-" => "sub",
                    "*" => "mul",
                    "/" => "sdiv",
                    _ => "srem",
                },
                Type::Int,
            ),
            (Type::Float, Type::Float) => (
                match op {
                    "+" => "fadd",
                    "-" => "fsub",
                    "*" => "fmul",
                    "/" => "fdiv",
                    _ => "frem",
                },
                Type::Float,
            ),
            _ => {
                let _ = writeln!(ctx.body, "  ; unsupported operand kinds for {}", op);
                return (String::new(), Type::Unit);
            }
        };
        let tmp = ctx.fresh();
        let _ = writeln!(ctx.body, "  {} = {} {} {}, {}", tmp, instr, map_ty(&ty), a, b);
        (tmp, ty)
    }

    fn emit_cmp(&mut self, ctx: &mut FnCtx, op: &str, items: &[&'static Node]) -> (String, Type) {
        let (a, ta) = self.emit_expr(ctx, items[1]);
        let (b, tb) = self.emit_expr(ctx, items[2]);
        if a.is_empty() || b.is_empty() {
            return (String::new(), Type::Unit);
        }
        let tmp = ctx.fresh();
        match (&ta, &tb) {
            (Type::Float, Type::Float) => {
                let cc = match op {
                    "=" => "oeq",
                    "!=" => "one",
                    "<" => "olt",
                    ">" => "ogt",
                    "<=" => "ole",
                    _ => "oge",
                };
                let _ = writeln!(ctx.body, "  {} = fcmp {} double {}, {}", tmp, cc, a, b);
            }
            _ => {
                let cc = match op {
                    "=" => "eq",
                    "!=" => "ne",
                    "<" => "slt",
                    ">" => "sgt",
                    "<=" => "sle",
                    _ => "sge",
                };
                let llty = map_ty(&ta);
                let _ = writeln!(ctx.body, "  {} = icmp {} {} {}, {}", tmp, cc, llty, a, b);
            }
        }
        (tmp, Type::Bool)
    }

    fn emit_if(&mut self, ctx: &mut FnCtx, items: &[&'static Node]) -> (String, Type) {
        let (cond, _) = self.emit_expr(ctx, items[1]);
        let then_l = ctx.fresh_label("then");
        let else_l = ctx.fresh_label("else");
        let merge_l = ctx.fresh_label("merge");
        let _ = writeln!(ctx.body, "  br i1 {}, label %{}, label %{}", cond, then_l, else_l);

        ctx.start_block(&then_l);
        let (v1, t1) = self.emit_expr(ctx, items[2]);
        let then_end = ctx.cur_block.clone();
        let _ = writeln!(ctx.body, "  br label %{}", merge_l);

        ctx.start_block(&else_l);
        let (v2, _) = self.emit_expr(ctx, items[3]);
        let else_end = ctx.cur_block.clone();
        let _ = writeln!(ctx.body, "  br label %{}", merge_l);

        ctx.start_block(&merge_l);
        match map_first_class(&t1) {
            Some(llty) if !v1.is_empty() && !v2.is_empty() => {
                let tmp = ctx.fresh();
                let _ = writeln!(
                    ctx.body,
                    "  {} = phi {} [ {}, %{} ], [ {}, %{} ]",
                    tmp, llty, v1, then_end, v2, else_end
                );
                (tmp, t1)
            }
            _ => (String::new(), Type::Unit),
        }
    }

    fn emit_let(&mut self, ctx: &mut FnCtx, items: &[&'static Node]) -> (String, Type) {
        if items.len() < 3 {
            return (String::new(), Type::Unit);
        }
        let binds = match items[1].as_list() {
            Some(b) => b,
            None => return (String::new(), Type::Unit),
        };
        ctx.scopes.push(HashMap::new());
        for bind in binds {
            let pair = match bind.as_list() {
                Some(p) if p.len() >= 2 => p,
                _ => continue,
            };
            let name = match pair[0].as_symbol() {
                Some(n) => n,
                None => continue,
            };
            let expr = if pair.len() >= 4 && pair[1].is_sym(":") { pair[3] } else { pair[1] };
            let (v, ty) = self.emit_expr(ctx, expr);
            if let Some(llty) = map_first_class(&ty) {
                let ptr = format!("%\"{}.addr{}\"", name, ctx.tmp);
                let _ = writeln!(ctx.body, "  {} = alloca {}", ptr, llty);
                let _ = writeln!(ctx.body, "  store {} {}, {}* {}", llty, v, llty, ptr);
                let top = ctx.scopes.len() - 1;
                ctx.scopes[top].insert(name.to_string(), (ptr, ty));
            }
        }
        let mut last = (String::new(), Type::Unit);
        for &body in &items[2..] {
            last = self.emit_expr(ctx, body);
        }
        ctx.scopes.pop();
        last
    }

    fn emit_call(&mut self, ctx: &mut FnCtx, name: &str, items: &[&'static Node]) -> (String, Type) {
        let (param_tys, ret) = match self.fn_sigs.get(name) {
            Some(sig) => sig.clone(),
            None => return (String::new(), Type::Unit),
        };
        let mut ops = Vec::new();
        for (i, &arg) in items[1..].iter().enumerate() {
            let (v, ty) = self.emit_expr(ctx, arg);
            let declared = param_tys.get(i).unwrap_or(&ty);
            ops.push(format!("{} {}", map_ty(declared), v));
        }
        match map_first_class(&ret) {
            Some(llty) => {
                let tmp = ctx.fresh();
                let _ = writeln!(
                    ctx.body,
                    "  {} = call {} @\"sq.{}\"({})",
                    tmp,
                    llty,
                    name,
                    ops.join(", ")
                );
                (tmp, ret)
            }
            None => {
                let _ = writeln!(ctx.body, "  call void @\"sq.{}\"({})", name, ops.join(", "));
                (String::new(), Type::Unit)
            }
        }
    }
}

fn escape_ir(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        match b {
            b'"' | b'\\' => {
                let _ = write!(out, "\\{:02X}", b);
            }
            0x20..=0x7e => out.push(b as char),
            _ => {
                let _ = write!(out, "\\{:02X}", b);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::parser::Parser;

    fn emit(src: &str, for_exe: bool) -> String {
        let arena = Arena::new().leak();
        let program = Parser::new(arena, src).parse_toplevel();
        emit_ir(program, &CodegenOpts { module_name: "test".into(), for_exe })
    }

    #[test]
    fn test_function_definition_and_call() {
        let ir = emit(
            "[def add : [Int Int -> Int] [fn [[a : Int] [b : Int]] : Int [+ a b]]] \
             [print [add 1 2]]",
            true,
        );
        assert!(ir.contains("define i64 @\"sq.add\"(i64 %p0, i64 %p1)"));
        assert!(ir.contains("add i64"));
        assert!(ir.contains("call i64 @\"sq.add\"(i64 1, i64 2)"));
        assert!(ir.contains("call void @sq_print_i64"));
        assert!(ir.contains("define i32 @main()"));
    }

    #[test]
    fn test_runtime_header_is_declared() {
        let ir = emit("[print 1]", false);
        for decl in ["sq_print_i64", "sq_alloc", "sq_alloc_closure", "sq_string_new"] {
            assert!(ir.contains(decl), "missing runtime declaration {}", decl);
        }
    }

    #[test]
    fn test_type_mapping() {
        let ir = emit(
            "[def f : [Float Bool Str -> Float] \
               [fn [[x : Float] [b : Bool] [s : Str]] : Float x]]",
            false,
        );
        assert!(ir.contains("define double @\"sq.f\"(double %p0, i1 %p1, i8* %p2)"));
    }

    #[test]
    fn test_if_emits_phi() {
        let ir = emit(
            "[def pick : [Bool -> Int] [fn [[b : Bool]] : Int [if b 1 2]]]",
            false,
        );
        assert!(ir.contains("br i1"));
        assert!(ir.contains("phi i64"));
    }

    #[test]
    fn test_string_literals_become_private_constants() {
        let ir = emit("[print \"hi\"]", true);
        assert!(ir.contains("@.str.0 = private unnamed_addr constant [3 x i8] c\"hi\\00\""));
        assert!(ir.contains("call void @sq_print_str"));
    }

    #[test]
    fn test_user_main_becomes_exit_code() {
        let ir = emit("[def main : [-> Int] [fn [] : Int 7]]", true);
        assert!(ir.contains("call i64 @\"sq.main\"()"));
        assert!(ir.contains("trunc i64"));
    }

    #[test]
    fn test_toplevel_def_becomes_global() {
        let ir = emit("[def x : Int 41] [print x]", true);
        assert!(ir.contains("@\"g.x\" = internal global i64 zeroinitializer"));
        assert!(ir.contains("store i64 41, i64* @\"g.x\""));
    }
}
