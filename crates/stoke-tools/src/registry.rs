use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock;

use crate::error::RegistryError;
use crate::schema::ToolSchema;
use crate::tool::Tool;

/// Injective `name -> Tool` mapping (spec §3/§4.5). Registration happens
/// up front; a turn sees a stable view of the registry (spec §3: "cannot
/// be removed during a turn").
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        let mut tools = self.tools.write().unwrap_or_else(|e| e.into_inner());
        if tools.contains_key(&name) {
            return Err(RegistryError::DuplicateName(name));
        }
        tools.insert(name, tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        let tools = self.tools.read().unwrap_or_else(|e| e.into_inner());
        tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        let tools = self.tools.read().unwrap_or_else(|e| e.into_inner());
        tools.contains_key(name)
    }

    /// Snapshot of the currently registered tools; order is not
    /// guaranteed (spec §4.5: "`list()` yields current tools").
    pub fn list(&self) -> Vec<Arc<dyn Tool>> {
        let tools = self.tools.read().unwrap_or_else(|e| e.into_inner());
        tools.values().cloned().collect()
    }

    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.list()
            .into_iter()
            .map(|tool| ToolSchema {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                input_schema: tool.input_schema(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToolError;
    use crate::tool::ExecutionContext;
    use async_trait::async_trait;

    struct Stub(&'static str);

    #[async_trait]
    impl Tool for Stub {
        fn name(&self) -> &str {
            self.0
        }
        fn description(&self) -> &str {
            "stub"
        }
        fn input_schema(&self) -> crate::schema::InputSchema {
            crate::schema::InputSchema::empty_object()
        }
        async fn execute(&self, _args: &str, _ctx: &ExecutionContext) -> Result<String, ToolError> {
            Ok("ok".to_string())
        }
    }

    #[test]
    fn register_and_get() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(Stub("a"))).unwrap();
        assert!(registry.get("a").is_some());
        assert!(registry.get("b").is_none());
    }

    #[test]
    fn rejects_empty_name() {
        let registry = ToolRegistry::new();
        assert_eq!(
            registry.register(Arc::new(Stub(""))).unwrap_err(),
            RegistryError::EmptyName
        );
    }

    #[test]
    fn rejects_duplicate_name() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(Stub("a"))).unwrap();
        assert_eq!(
            registry.register(Arc::new(Stub("a"))).unwrap_err(),
            RegistryError::DuplicateName("a".to_string())
        );
    }

    #[test]
    fn list_and_schemas_reflect_registrations() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(Stub("a"))).unwrap();
        registry.register(Arc::new(Stub("b"))).unwrap();
        assert_eq!(registry.list().len(), 2);
        assert_eq!(registry.schemas().len(), 2);
    }
}
