#![deny(unsafe_code)]
#![doc = r#"
# spark-bootstrap

## 设计动机（Why）
- **定位**：该 crate 是分布式 RPC 运行时的生命周期协调层——持有一个
  进程要发布的服务端端点（导出）与要获取的客户端代理（引用），保证
  它们的启动、缓存与拆除在并发应用调用和异步进程退出信号之下依然
  安全；
- **架构角色**：字段校验、注解装配、线缆协议、集群策略与注册发现全部
  是外部协作方，本层只经由 `export`/`refer`/`unexport`/`destroy` 四个
  窄契约调用它们；
- **设计理念**：装配走链式 API，编排在协调器锁下完全串行，生命周期
  幂等性由启动闩锁与钩子闩锁兜底。

## 核心契约（What）
- **输入条件**：导出/引用单元实现
  [`Exportable`](contract::Exportable) /
  [`Referenceable`](contract::Referenceable)，以
  [`BootstrapContext`](contract::BootstrapContext) 快照读取全局配置；
- **输出保障**：
  - 语义等价的引用（接口/分组/版本/端点集相同，端点顺序无关）复用
    同一个客户端句柄，并发首访恰好解析一次；
  - 停机的破坏性动作跨“显式 `stop()`”与“宿主退出通知”两条路径恰好
    执行一次；
- **前置约束**：批量操作遇到首个失败即中止并上抛，已完成条目不回滚。

## 实现策略（How）
- 协调器锁用 `parking_lot::Mutex`，引用缓存用 `dashmap` 的分片写锁
  承载键粒度的“检查-创建”原子性；
- 进程级外部配置用 `arc-swap` 做无锁读取；
- 宿主退出机制抽象为 [`ExitHookTable`](hook::ExitHookTable) 注入点，
  生产宿主把 [`InProcessExitTable::fire_all`](hook::InProcessExitTable::fire_all)
  接到自己的信号处理上，测试换成隔离实例或记录桩。

## 风险与考量（Trade-offs）
- 协调器锁在批量迭代期间持有，协作方的阻塞直接体现为编排调用的排队；
- 钩子的破坏性例程是一次性的：`stop()` 之后重启协调器不会复活它，
  跨重启需要钩子保护时应注入新钩子。
"#]

pub mod cache;
pub mod config;
pub mod contract;
pub mod coordinator;
pub mod environment;
pub mod error;
pub mod hook;

pub use cache::{CacheKey, ReferenceCache};
pub use config::{
    ApplicationConfig, ConsumerConfig, ModuleConfig, MonitorConfig, ProtocolConfig, ProviderConfig,
    RegistryConfig,
};
pub use contract::{
    BootstrapContext, Exportable, ReferenceHandle, ReferenceIdentity, Referenceable,
};
pub use coordinator::{BootstrapBuilder, BootstrapCoordinator};
pub use environment::Environment;
pub use error::{BootstrapError, HookRemovalError};
pub use hook::{ExitHookTable, HookState, InProcessExitTable, ShutdownHook};
