// src/kernel/mod.rs
// Component Kernel (SPEC_FULL §4.F): dependency-ordered start/stop with
// rollback on partial failure. No single direct analogue in the teacher;
// this follows the general shape of `cli/serve.rs::init_server_context`'s
// staged setup (pools, then embeddings, then background workers, each
// depending on what came before) generalized into an explicit, reusable
// ordering/rollback mechanism instead of one hand-written function.

use std::collections::HashSet;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::error::{AppError, Result};

/// A named, dependency-aware lifecycle participant.
#[async_trait]
pub trait Component: Send + Sync {
    fn name(&self) -> &str;
    fn dependencies(&self) -> &[String];
    async fn initialize(&self) -> Result<()>;
    async fn shutdown(&self) -> Result<()>;
    fn is_initialized(&self) -> bool;
}

struct Entry {
    component: Box<dyn Component>,
}

/// Registers components and brings them up/down in dependency order.
#[derive(Default)]
pub struct ComponentKernel {
    entries: Vec<Entry>,
}

impl ComponentKernel {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn register(&mut self, component: Box<dyn Component>) -> Result<()> {
        let name = component.name().to_string();
        if self.entries.iter().any(|e| e.component.name() == name) {
            return Err(AppError::ConfigInvalid(format!("duplicate component name '{name}'")));
        }
        self.entries.push(Entry { component });
        Ok(())
    }

    /// Returns a human-readable list of missing-dependency problems, if any.
    pub fn validate(&self) -> Vec<String> {
        self.missing_deps()
            .into_iter()
            .map(|(name, dep)| format!("Component '{name}' depends on '{dep}' which is not registered"))
            .collect()
    }

    fn missing_deps(&self) -> Vec<(String, String)> {
        let names: HashSet<&str> = self.entries.iter().map(|e| e.component.name()).collect();
        let mut problems = Vec::new();
        for entry in &self.entries {
            for dep in entry.component.dependencies() {
                if !names.contains(dep.as_str()) {
                    problems.push((entry.component.name().to_string(), dep.clone()));
                }
            }
        }
        problems
    }

    /// Compute a topological init order and initialize each component in
    /// turn, rolling back everything already initialized if a later one
    /// fails. Fails fast with [`AppError::ComponentCycle`] if no progress
    /// can be made despite components remaining.
    pub async fn initialize_all(&self) -> Result<()> {
        let missing = self.missing_deps();
        if !missing.is_empty() {
            for (name, dep) in &missing {
                error!("Component '{name}' depends on '{dep}' which is not registered");
            }
            let (name, dep) = missing[0].clone();
            return Err(AppError::ComponentMissingDep { name, dep });
        }

        let order = self.topological_order()?;
        let mut rollback_stack: Vec<&str> = Vec::new();

        for name in &order {
            let entry = self.entries.iter().find(|e| e.component.name() == *name).expect("name from order exists");
            info!(component = name.as_str(), "initializing component");
            match entry.component.initialize().await {
                Ok(()) if entry.component.is_initialized() => {
                    rollback_stack.push(name.as_str());
                }
                Ok(()) => {
                    error!(component = name.as_str(), "initialize() returned Ok but is_initialized() is false");
                    self.rollback(&rollback_stack).await;
                    return Err(AppError::ComponentInitFailed {
                        name: name.clone(),
                        reason: "component did not report initialized after initialize()".into(),
                    });
                }
                Err(e) => {
                    error!(component = name.as_str(), error = %e, "component failed to initialize");
                    self.rollback(&rollback_stack).await;
                    return Err(AppError::ComponentInitFailed { name: name.clone(), reason: e.to_string() });
                }
            }
        }
        Ok(())
    }

    pub async fn shutdown_all(&self) {
        let order = match self.topological_order() {
            Ok(order) => order,
            Err(_) => self.entries.iter().map(|e| e.component.name().to_string()).collect(),
        };
        let names: Vec<&str> = order.iter().map(String::as_str).collect();
        self.rollback(&names).await;
    }

    async fn rollback(&self, names_in_init_order: &[&str]) {
        for name in names_in_init_order.iter().rev() {
            if let Some(entry) = self.entries.iter().find(|e| e.component.name() == *name) {
                info!(component = *name, "shutting down component");
                if let Err(e) = entry.component.shutdown().await {
                    warn!(component = *name, error = %e, "component shutdown failed; continuing rollback");
                }
            }
        }
    }

    fn topological_order(&self) -> Result<Vec<String>> {
        let mut remaining: Vec<&Entry> = self.entries.iter().collect();
        let mut done: HashSet<&str> = HashSet::new();
        let mut order = Vec::with_capacity(self.entries.len());

        while !remaining.is_empty() {
            let idx = remaining
                .iter()
                .position(|e| e.component.dependencies().iter().all(|d| done.contains(d.as_str())));
            match idx {
                Some(idx) => {
                    let entry = remaining.remove(idx);
                    done.insert(entry.component.name());
                    order.push(entry.component.name().to_string());
                }
                None => {
                    let stuck: Vec<String> = remaining.iter().map(|e| e.component.name().to_string()).collect();
                    return Err(AppError::ComponentCycle(stuck));
                }
            }
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct TestComponent {
        name: String,
        deps: Vec<String>,
        initialized: Arc<AtomicBool>,
        fail_init: bool,
        log: Arc<tokio::sync::Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Component for TestComponent {
        fn name(&self) -> &str {
            &self.name
        }
        fn dependencies(&self) -> &[String] {
            &self.deps
        }
        async fn initialize(&self) -> Result<()> {
            self.log.lock().await.push(format!("init:{}", self.name));
            if self.fail_init {
                return Err(AppError::internal("boom"));
            }
            self.initialized.store(true, Ordering::SeqCst);
            Ok(())
        }
        async fn shutdown(&self) -> Result<()> {
            self.log.lock().await.push(format!("shutdown:{}", self.name));
            self.initialized.store(false, Ordering::SeqCst);
            Ok(())
        }
        fn is_initialized(&self) -> bool {
            self.initialized.load(Ordering::SeqCst)
        }
    }

    fn make(name: &str, deps: &[&str], fail: bool, log: Arc<tokio::sync::Mutex<Vec<String>>>) -> Box<dyn Component> {
        Box::new(TestComponent {
            name: name.to_string(),
            deps: deps.iter().map(|s| s.to_string()).collect(),
            initialized: Arc::new(AtomicBool::new(false)),
            fail_init: fail,
            log,
        })
    }

    #[tokio::test]
    async fn initializes_in_dependency_order() {
        let log = Arc::new(tokio::sync::Mutex::new(Vec::new()));
        let mut kernel = ComponentKernel::new();
        kernel.register(make("b", &["a"], false, log.clone())).unwrap();
        kernel.register(make("a", &[], false, log.clone())).unwrap();

        kernel.initialize_all().await.unwrap();
        let entries = log.lock().await.clone();
        assert_eq!(entries, vec!["init:a", "init:b"]);
    }

    #[tokio::test]
    async fn missing_dependency_fails_before_initializing_anything() {
        let log = Arc::new(tokio::sync::Mutex::new(Vec::new()));
        let mut kernel = ComponentKernel::new();
        kernel.register(make("b", &["missing"], false, log.clone())).unwrap();

        let err = kernel.initialize_all().await.unwrap_err();
        assert!(matches!(err, AppError::ComponentMissingDep { ref name, ref dep } if name == "b" && dep == "missing"));
        assert!(log.lock().await.is_empty());
    }

    #[tokio::test]
    async fn cycle_is_detected_and_nothing_initializes() {
        let log = Arc::new(tokio::sync::Mutex::new(Vec::new()));
        let mut kernel = ComponentKernel::new();
        kernel.register(make("a", &["b"], false, log.clone())).unwrap();
        kernel.register(make("b", &["a"], false, log.clone())).unwrap();

        let err = kernel.initialize_all().await.unwrap_err();
        assert!(matches!(err, AppError::ComponentCycle(_)));
    }

    #[tokio::test]
    async fn failure_rolls_back_previously_initialized_components() {
        let log = Arc::new(tokio::sync::Mutex::new(Vec::new()));
        let mut kernel = ComponentKernel::new();
        kernel.register(make("a", &[], false, log.clone())).unwrap();
        kernel.register(make("b", &["a"], true, log.clone())).unwrap();

        let err = kernel.initialize_all().await.unwrap_err();
        assert!(matches!(err, AppError::ComponentInitFailed { .. }));
        let entries = log.lock().await.clone();
        assert_eq!(entries, vec!["init:a", "init:b", "shutdown:a"]);
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let log = Arc::new(tokio::sync::Mutex::new(Vec::new()));
        let mut kernel = ComponentKernel::new();
        kernel.register(make("a", &[], false, log.clone())).unwrap();
        let err = kernel.register(make("a", &[], false, log)).unwrap_err();
        assert!(matches!(err, AppError::ConfigInvalid(_)));
    }

    #[tokio::test]
    async fn shutdown_all_runs_in_reverse_init_order() {
        let log = Arc::new(tokio::sync::Mutex::new(Vec::new()));
        let mut kernel = ComponentKernel::new();
        kernel.register(make("a", &[], false, log.clone())).unwrap();
        kernel.register(make("b", &["a"], false, log.clone())).unwrap();

        kernel.initialize_all().await.unwrap();
        log.lock().await.clear();
        kernel.shutdown_all().await;
        let entries = log.lock().await.clone();
        assert_eq!(entries, vec!["shutdown:b", "shutdown:a"]);
    }
}
