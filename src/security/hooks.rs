//! Audit hooks. Observers registered here see every permission decision after it is made.
//! Hooks must not panic; persistence is up to the hook.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use super::resolver::CheckResult;
use crate::identity::PrincipalId;

#[derive(Debug, Clone, Serialize)]
pub struct AuthEvent {
    pub principal: PrincipalId,
    pub principal_name: String,
    pub operation: &'static str,
    pub path: String,
    pub required: String,
    pub result: CheckResult,
    pub request_id: Option<String>,
}

pub trait PostAuthHook: Send + Sync {
    fn on_post_auth(&self, _ev: &AuthEvent) {}
}

#[derive(Default)]
pub struct HookRegistry {
    post_auth: Vec<Arc<dyn PostAuthHook>>,
}

impl HookRegistry {
    pub fn register(&mut self, hook: Arc<dyn PostAuthHook>) { self.post_auth.push(hook); }

    pub fn emit(&self, ev: &AuthEvent) {
        for h in self.post_auth.iter() {
            h.on_post_auth(ev);
        }
    }

    pub fn len(&self) -> usize { self.post_auth.len() }

    pub fn is_empty(&self) -> bool { self.post_auth.is_empty() }
}

// Process-local registry
static REG: Lazy<RwLock<HookRegistry>> = Lazy::new(|| RwLock::new(HookRegistry::default()));

pub fn register_post_auth(h: Arc<dyn PostAuthHook>) {
    REG.write().register(h);
}

pub fn emit_post_auth(ev: &AuthEvent) {
    REG.read().emit(ev);
}

/// Writes each decision as a compact JSON line to the `vfsguard::audit` tracing target.
pub struct TracingAuditHook;

impl PostAuthHook for TracingAuditHook {
    fn on_post_auth(&self, ev: &AuthEvent) {
        let ts = chrono::Utc::now().timestamp_millis();
        let obj = serde_json::json!({
            "ts": ts,
            "principal": ev.principal_name,
            "operation": ev.operation,
            "path": ev.path,
            "required": ev.required,
            "result": ev.result,
            "request_id": ev.request_id,
        });
        info!(target: "vfsguard::audit", "{}", obj);
    }
}

/// Convenience: route audit events to tracing.
pub fn register_tracing_audit() {
    register_post_auth(Arc::new(TracingAuditHook));
}
