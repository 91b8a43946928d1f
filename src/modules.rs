// ABOUTME: Module resolution, import cache, and the load pipeline

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::arena::Arena;
use crate::config;
use crate::error::SqaleError;
use crate::eval::Vm;
use crate::gc::Roots;
use crate::macros::{self, MacroEnv};
use crate::parser::Parser;

/// Parse a compilation unit and run the macro pipeline over it: core
/// rewriters, the unit's own `defmacro` definitions (collected into a fresh
/// macro-time VM), then expansion to a fixed point.
pub fn parse_and_expand(arena: &'static Arena, src: &str) -> &'static crate::ast::Node {
    let raw = Parser::new(arena, src).parse_toplevel();
    let mut menv = MacroEnv::with_core();
    let mvm = Vm::new();
    macros::collect_user_macros(arena, &mut menv, &mvm, raw);
    macros::expand_all(arena, &menv, raw)
}

/// `[import X]`. Failures warn on stderr and evaluation continues; a module
/// that resolves to an already-imported path is skipped.
pub fn import(vm: &Arc<Vm>, roots: &mut Roots, name: &str) {
    let path = match resolve(name) {
        Some(p) => p,
        None => {
            eprintln!("import: module not found: {}", name);
            return;
        }
    };
    let key = path.to_string_lossy().into_owned();
    if vm.already_imported(&key) {
        return;
    }
    // Marked before loading so import cycles terminate.
    vm.mark_imported(&key);
    if let Err(e) = load_file(vm, roots, &path) {
        eprintln!("import: failed to load {}: {}", path.display(), e);
    }
}

/// Search order: a literal path when the name contains `/` or ends in
/// `.sq`; otherwise dots become slashes and the base directories are tried
/// in order, then each entry of `SQALE_PATH`.
fn resolve(name: &str) -> Option<PathBuf> {
    if name.contains('/') || name.ends_with(config::SOURCE_EXT) {
        let p = PathBuf::from(name);
        if p.is_file() {
            return Some(p);
        }
    }
    let rel = format!("{}{}", name.replace('.', "/"), config::SOURCE_EXT);
    for base in config::MODULE_SEARCH_BASES {
        let candidate = Path::new(base).join(&rel);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    if let Ok(sp) = std::env::var(config::MODULE_PATH_VAR) {
        for dir in sp.split(':').filter(|d| !d.is_empty()) {
            let candidate = Path::new(dir).join(&rel);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

/// Read, parse, expand, check and evaluate one file into the VM. The
/// module gets a fresh arena, leaked to process lifetime so its AST (and
/// any closures built from it) outlive the import call.
pub fn load_file(vm: &Arc<Vm>, roots: &mut Roots, path: &Path) -> Result<(), SqaleError> {
    let src = std::fs::read_to_string(path)?;
    let arena = Arena::new().leak();
    let program = parse_and_expand(arena, &src);
    vm.run_program(roots, program)
}
