use sqlmap_core::{BatchDispatcher, JobRegistry, JobRunner, ToolInvocation};

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: BatchDispatcher,
    pub registry: JobRegistry,
}

impl AppState {
    pub fn new(tool: ToolInvocation) -> Self {
        // 注册表在进程内只创建一次，分发器和请求处理共享同一个句柄
        let registry = JobRegistry::new();
        let dispatcher = BatchDispatcher::new(registry.clone(), JobRunner::new(tool));

        Self {
            dispatcher,
            registry,
        }
    }
}
