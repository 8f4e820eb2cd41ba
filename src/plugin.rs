//! Plugin hook interface (§6)
//!
//! Defines the hook surface a plugin *implements*; loading plugins
//! (dynamic libraries, subprocess, scripting-language embeddings) is an
//! external concern, same as the parser. `HookRegistry` only needs to know
//! how to call whatever hook objects the front-end has already constructed
//! and registered, in a fixed, documented order.

use std::collections::HashMap;

use crate::context::ExecContext;
use crate::config::EnvConfig;
use crate::failure::ScriptFailure;
use crate::token::Token;

/// One plugin's hook surface. Every method has a no-op default so a plugin
/// only overrides what it cares about.
pub trait Hooks {
    fn init(&mut self, _cfg: &EnvConfig) {}
    fn parse_input_file(&mut self, _path: &str) {}
    fn plugin_settings(&mut self, _settings: &HashMap<String, String>) {}
    fn plugin_comment(&mut self, _comment: &str) {}
    fn pushdata(&mut self, _data: &[u8]) {}
    /// Called before the engine's own handling of `token`. Returning `true`
    /// claims the opcode: the engine skips its built-in semantics entirely
    /// for this step.
    fn pre_opcode(&mut self, _ctx: &ExecContext, _token: &Token) -> bool {
        false
    }
    fn post_opcode(&mut self, _ctx: &ExecContext, _token: &Token) {}
    fn pre_finalize(&mut self, _ctx: &ExecContext) {}
    fn post_finalize(&mut self, _ctx: &ExecContext) {}
    fn script_failure(&mut self, _failure: &ScriptFailure) {}
    fn report_start(&mut self) {}
    fn report_end(&mut self) {}
}

/// An ordered collection of plugins, dispatched in registration order.
#[derive(Default)]
pub struct HookRegistry {
    hooks: Vec<Box<dyn Hooks>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, hook: Box<dyn Hooks>) {
        self.hooks.push(hook);
    }

    pub fn init(&mut self, cfg: &EnvConfig) {
        for h in &mut self.hooks {
            h.init(cfg);
        }
    }

    pub fn parse_input_file(&mut self, path: &str) {
        for h in &mut self.hooks {
            h.parse_input_file(path);
        }
    }

    pub fn plugin_settings(&mut self, settings: &HashMap<String, String>) {
        for h in &mut self.hooks {
            h.plugin_settings(settings);
        }
    }

    pub fn plugin_comment(&mut self, comment: &str) {
        for h in &mut self.hooks {
            h.plugin_comment(comment);
        }
    }

    pub fn pushdata(&mut self, data: &[u8]) {
        for h in &mut self.hooks {
            h.pushdata(data);
        }
    }

    /// Returns `true` as soon as one hook claims the opcode; later hooks in
    /// the registry are not consulted for this step.
    pub fn pre_opcode(&mut self, ctx: &ExecContext, token: &Token) -> bool {
        for h in &mut self.hooks {
            if h.pre_opcode(ctx, token) {
                return true;
            }
        }
        false
    }

    pub fn post_opcode(&mut self, ctx: &ExecContext, token: &Token) {
        for h in &mut self.hooks {
            h.post_opcode(ctx, token);
        }
    }

    pub fn pre_finalize(&mut self, ctx: &ExecContext) {
        for h in &mut self.hooks {
            h.pre_finalize(ctx);
        }
    }

    pub fn post_finalize(&mut self, ctx: &ExecContext) {
        for h in &mut self.hooks {
            h.post_finalize(ctx);
        }
    }

    pub fn script_failure(&mut self, failure: &ScriptFailure) {
        for h in &mut self.hooks {
            h.script_failure(failure);
        }
    }

    pub fn report_start(&mut self) {
        for h in &mut self.hooks {
            h.report_start();
        }
    }

    pub fn report_end(&mut self) {
        for h in &mut self.hooks {
            h.report_end();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Spy {
        log: Rc<RefCell<Vec<&'static str>>>,
        claims: bool,
    }

    impl Hooks for Spy {
        fn init(&mut self, _cfg: &EnvConfig) {
            self.log.borrow_mut().push("init");
        }
        fn pre_opcode(&mut self, _ctx: &ExecContext, _token: &Token) -> bool {
            self.log.borrow_mut().push("pre_opcode");
            self.claims
        }
        fn post_opcode(&mut self, _ctx: &ExecContext, _token: &Token) {
            self.log.borrow_mut().push("post_opcode");
        }
    }

    #[test]
    fn hooks_fire_in_registration_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = HookRegistry::new();
        registry.register(Box::new(Spy { log: log.clone(), claims: false }));
        registry.init(&EnvConfig::default());
        assert_eq!(*log.borrow(), vec!["init"]);
    }

    #[test]
    fn pre_opcode_short_circuits_on_first_claim() {
        let log_a = Rc::new(RefCell::new(Vec::new()));
        let log_b = Rc::new(RefCell::new(Vec::new()));
        let mut registry = HookRegistry::new();
        registry.register(Box::new(Spy { log: log_a.clone(), claims: true }));
        registry.register(Box::new(Spy { log: log_b.clone(), claims: false }));
        let ctx = ExecContext::new();
        let claimed = registry.pre_opcode(&ctx, &Token::Op(crate::token::OpCode::Dup));
        assert!(claimed);
        assert_eq!(*log_a.borrow(), vec!["pre_opcode"]);
        assert!(log_b.borrow().is_empty());
    }
}
