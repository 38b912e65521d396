//! # coordinator 模块说明
//!
//! ## 核心意图（Why）
//! - 一个逻辑应用实例的全部导出与引用在此集中装配、按序编排：
//!   `start()` 先安置退出钩子、再导出、后引用；`stop()` 逆序拆除；
//! - 启动/停止与批量操作可能被多个应用线程并发调用，还要与宿主退出
//!   通知赛跑，本模块把这些竞态收敛为两层同步：协调器锁（列表迭代的
//!   互斥）与启动闩锁/钩子闩锁（生命周期的幂等）。
//!
//! ## 行为契约（What）
//! - 注册与配置走链式 API（返回 `&Self`），重复注册同一单元是允许的，
//!   会被独立导出/引用；
//! - 批量迭代按注册顺序进行，首个失败立即上抛并中止剩余条目，已完成
//!   的条目不回滚——需要全有或全无语义的调用方自行补偿；
//! - `stop()` 幂等且可重入（退出钩子的拆除例程会回调进来）；顺序恒为
//!   unexport → unrefer（排空缓存）→ 钩子拆除 → 钩子摘除。
//!
//! ## 风险提示（Trade-offs）
//! - 重复 `start()` 被显式拒绝而非静默复制状态；`stop()` 之后允许再次
//!   启动，但同一把钩子的破坏性例程是一次性的，
//!   跨重启需要钩子保护的调用方应经 [`BootstrapBuilder`] 注入新钩子。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;

use crate::cache::ReferenceCache;
use crate::config::{
    ApplicationConfig, ConsumerConfig, ModuleConfig, MonitorConfig, ProtocolConfig, ProviderConfig,
    RegistryConfig,
};
use crate::contract::{BootstrapContext, Exportable, ReferenceHandle, Referenceable};
use crate::environment::Environment;
use crate::error::BootstrapError;
use crate::hook::{ExitHookTable, InProcessExitTable, ShutdownHook};

/// 协调器锁保护的装配状态：配置、两张登记表与缓存引用。
struct Inner {
    application: Option<ApplicationConfig>,
    registries: Vec<RegistryConfig>,
    protocols: Vec<ProtocolConfig>,
    consumer: Option<ConsumerConfig>,
    provider: Option<ProviderConfig>,
    monitor: Option<MonitorConfig>,
    module: Option<ModuleConfig>,
    exports: Vec<Arc<dyn Exportable>>,
    references: Vec<Arc<dyn Referenceable>>,
    cache: Arc<ReferenceCache>,
}

impl Inner {
    /// 在锁内构建下发给协作方的配置快照。
    fn context(&self) -> BootstrapContext {
        BootstrapContext::new(
            self.application.clone(),
            self.registries.clone(),
            self.protocols.clone(),
            self.consumer.clone(),
            self.provider.clone(),
            self.monitor.clone(),
            self.module.clone(),
        )
    }
}

/// 导出/引用生命周期协调器。
///
/// # 教案式注释
/// - **意图 (Why)**：应用代码需要一个单点来回答“这个进程发布了什么、
///   引用了什么、什么时候拆干净”；本类型把装配（链式注册）、编排
///   （start/stop 与批量操作）与兜底（退出钩子）捏合在一起；
/// - **契约 (What)**：
///   - 所有批量操作（`export_all`/`refer_all`/`unexport_all`/
///     `unrefer_all`，以及经由它们的 `start`/`stop`）在同一把协调器锁
///     下完全串行，迭代期间列表不可能被并发改写；
///   - 缓存的键粒度原子性独立于协调器锁，不同键的并发 `refer` 不在
///     本层互斥；
///   - `start()` 失败时已完成的导出/引用保持存活，由显式 `stop()`
///     或已安置的钩子负责清理；
/// - **风险 (Trade-offs)**：锁在整个批量迭代期间持有，协作方的
///   `export`/`refer` 阻塞多久，其他编排调用就排队多久——换来的是
///   迭代期间状态的完全一致。
pub struct BootstrapCoordinator {
    inner: Mutex<Inner>,
    hook: Arc<ShutdownHook>,
    register_hook_on_start: AtomicBool,
    started: AtomicBool,
}

impl BootstrapCoordinator {
    /// 进入构造器，注入钩子、退出表或缓存。
    pub fn builder() -> BootstrapBuilder {
        BootstrapBuilder::new()
    }

    /// 进程级共享实例：默认自管钩子、默认退出表、共享缓存。
    pub fn shared() -> Arc<BootstrapCoordinator> {
        static SHARED: OnceLock<Arc<BootstrapCoordinator>> = OnceLock::new();
        Arc::clone(SHARED.get_or_init(|| BootstrapBuilder::new().build()))
    }

    // ---- 链式装配 ----

    /// 设置应用配置。
    pub fn application(&self, config: ApplicationConfig) -> &Self {
        self.inner.lock().application = Some(config);
        self
    }

    /// 追加一个注册中心。
    pub fn registry(&self, config: RegistryConfig) -> &Self {
        self.inner.lock().registries.push(config);
        self
    }

    /// 整体替换注册中心集合。
    pub fn registries(&self, configs: Vec<RegistryConfig>) -> &Self {
        self.inner.lock().registries = configs;
        self
    }

    /// 追加一个协议。
    pub fn protocol(&self, config: ProtocolConfig) -> &Self {
        self.inner.lock().protocols.push(config);
        self
    }

    /// 整体替换协议集合。
    pub fn protocols(&self, configs: Vec<ProtocolConfig>) -> &Self {
        self.inner.lock().protocols = configs;
        self
    }

    /// 设置消费者默认配置。
    pub fn consumer(&self, config: ConsumerConfig) -> &Self {
        self.inner.lock().consumer = Some(config);
        self
    }

    /// 设置提供者默认配置。
    pub fn provider(&self, config: ProviderConfig) -> &Self {
        self.inner.lock().provider = Some(config);
        self
    }

    /// 设置监控配置。
    pub fn monitor(&self, config: MonitorConfig) -> &Self {
        self.inner.lock().monitor = Some(config);
        self
    }

    /// 设置模块配置。
    pub fn module(&self, config: ModuleConfig) -> &Self {
        self.inner.lock().module = Some(config);
        self
    }

    /// 替换引用缓存；与其他协调器共享同一实例时，缓存生命周期超出
    /// 单个协调器。
    pub fn reference_cache(&self, cache: Arc<ReferenceCache>) -> &Self {
        self.inner.lock().cache = cache;
        self
    }

    /// 登记一个导出单元；不查重，重复登记会被独立导出。
    pub fn register_export(&self, unit: Arc<dyn Exportable>) -> &Self {
        self.inner.lock().exports.push(unit);
        self
    }

    /// 登记一个引用单元；不查重。
    pub fn register_reference(&self, unit: Arc<dyn Referenceable>) -> &Self {
        self.inner.lock().references.push(unit);
        self
    }

    /// 调整“启动时是否自管退出钩子”的开关。
    pub fn set_register_hook_on_start(&self, register: bool) -> &Self {
        self.register_hook_on_start.store(register, Ordering::SeqCst);
        self
    }

    /// 将进程级覆盖属性转发到环境存储；空映射为 no-op。
    pub fn set_external_configuration(&self, properties: HashMap<String, String>) -> &Self {
        Environment::global().set_external_configuration(properties);
        self
    }

    /// 当前配置快照（等价于协作方在回调中看到的内容）。
    pub fn context(&self) -> BootstrapContext {
        self.inner.lock().context()
    }

    /// 协调器当前使用的引用缓存。
    pub fn cache(&self) -> Arc<ReferenceCache> {
        Arc::clone(&self.inner.lock().cache)
    }

    /// 协调器绑定的退出钩子。
    pub fn shutdown_hook(&self) -> Arc<ShutdownHook> {
        Arc::clone(&self.hook)
    }

    /// 协调器是否处于已启动状态。
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    // ---- 编排 ----

    /// 启动：安置（或摘除）退出钩子，随后批量导出、批量引用。
    ///
    /// # 教案式注释
    /// - **意图 (Why)**：钩子必须先于任何导出就位——部分完成的启动
    ///   也要留下一个能清理“已成功部分”的钩子；不自管钩子时则反向
    ///   摘除此前可能安置的钩子，防止双重执行；
    /// - **契约 (What)**：
    ///   - 未经 `stop()` 的重复启动返回
    ///     [`BootstrapError::AlreadyStarted`]；
    ///   - 任一单元失败立即上抛，剩余单元不再处理；此时协调器仍视为
    ///     已启动，清理交给显式 `stop()` 或钩子；
    /// - **风险 (Trade-offs)**：启动闩锁在入口处落下而非成功后落下，
    ///   代价是失败后必须 `stop()` 才能重试，换来的是失败路径与钩子
    ///   路径共用同一套清理语义。
    pub fn start(&self) -> Result<(), BootstrapError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(BootstrapError::AlreadyStarted);
        }
        if self.register_hook_on_start.load(Ordering::SeqCst) {
            self.hook.register();
        } else {
            self.hook.remove();
        }
        tracing::info!("bootstrap coordinator starting");
        self.export_all()?;
        self.refer_all()?;
        tracing::info!("bootstrap coordinator started");
        Ok(())
    }

    /// 停止：unexport → unrefer（排空缓存）→ 钩子拆除 → 钩子摘除。
    ///
    /// 幂等且可重入：启动闩锁未落下（或已被本方法抬起）时直接返回；
    /// 钩子的拆除例程回调本方法时命中同一闩锁，不会二次拆除。
    pub fn stop(&self) {
        if !self.started.swap(false, Ordering::SeqCst) {
            return;
        }
        tracing::info!("bootstrap coordinator stopping");
        self.unexport_all();
        self.unrefer_all();
        self.hook.destroy_all();
        if self.register_hook_on_start.load(Ordering::SeqCst) {
            self.hook.remove();
        }
        tracing::info!("bootstrap coordinator stopped");
    }

    /// 批量导出：按注册顺序直接导出，不做去重。
    pub fn export_all(&self) -> Result<(), BootstrapError> {
        let inner = self.inner.lock();
        let ctx = inner.context();
        for unit in &inner.exports {
            unit.export(&ctx)?;
        }
        Ok(())
    }

    /// 导出单个单元（与批量操作互斥）。
    pub fn export(&self, unit: &dyn Exportable) -> Result<(), BootstrapError> {
        let inner = self.inner.lock();
        let ctx = inner.context();
        unit.export(&ctx)
    }

    /// 批量引用：默认走缓存去重。
    pub fn refer_all(&self) -> Result<(), BootstrapError> {
        self.refer_all_with_cache(true)
    }

    /// 批量引用，`use_cache = false` 时逐个强制新鲜解析。
    pub fn refer_all_with_cache(&self, use_cache: bool) -> Result<(), BootstrapError> {
        let inner = self.inner.lock();
        let ctx = inner.context();
        for unit in &inner.references {
            if use_cache {
                inner.cache.get(unit.as_ref(), &ctx)?;
            } else {
                unit.refer(&ctx)?;
            }
        }
        Ok(())
    }

    /// 引用单个单元（走缓存）。
    pub fn refer(
        &self,
        unit: &dyn Referenceable,
    ) -> Result<Arc<dyn ReferenceHandle>, BootstrapError> {
        self.refer_with_cache(unit, true)
    }

    /// 引用单个单元，可选绕过缓存强制新鲜解析。
    pub fn refer_with_cache(
        &self,
        unit: &dyn Referenceable,
        use_cache: bool,
    ) -> Result<Arc<dyn ReferenceHandle>, BootstrapError> {
        let inner = self.inner.lock();
        let ctx = inner.context();
        if use_cache {
            inner.cache.get(unit, &ctx)
        } else {
            unit.refer(&ctx)
        }
    }

    /// 批量撤销导出；拆除路径不产生错误。
    pub fn unexport_all(&self) {
        let inner = self.inner.lock();
        let ctx = inner.context();
        for unit in &inner.exports {
            unit.unexport(&ctx);
        }
    }

    /// 撤销单个单元的导出。
    pub fn unexport(&self, unit: &dyn Exportable) {
        let inner = self.inner.lock();
        let ctx = inner.context();
        unit.unexport(&ctx);
    }

    /// 排空引用缓存（销毁全部句柄）。
    pub fn unrefer_all(&self) {
        let inner = self.inner.lock();
        inner.cache.destroy_all();
    }

    /// 销毁单个单元身份对应的缓存条目。
    pub fn unrefer(&self, unit: &dyn Referenceable) {
        let inner = self.inner.lock();
        inner.cache.destroy(unit);
    }
}

impl std::fmt::Debug for BootstrapCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("BootstrapCoordinator")
            .field("exports", &inner.exports.len())
            .field("references", &inner.references.len())
            .field("started", &self.is_started())
            .finish_non_exhaustive()
    }
}

/// 协调器构造器：钩子、退出表与缓存的注入点。
///
/// # 教案式注释
/// - **意图 (Why)**：进程级单例与测试用全新实例共用同一条构造路径
///   （显式工厂），宿主退出机制以协作方身份注入而非硬编码全局；
/// - **契约 (What)**：
///   - 未注入钩子时，构造器生成的默认钩子经 `Weak` 回边执行协调器自身
///     的 `stop()`——进程在部分完成的启动后退出，也能清理已成功的
///     部分；
///   - 未注入缓存时使用进程级共享缓存，多个协调器默认汇聚到同一份
///     去重视图；
/// - **风险 (Trade-offs)**：注入自定义钩子即放弃默认的自清理回边，
///   拆除内容完全由注入方定义。
pub struct BootstrapBuilder {
    register_hook_on_start: bool,
    exit_table: Arc<dyn ExitHookTable>,
    hook: Option<Arc<ShutdownHook>>,
    cache: Option<Arc<ReferenceCache>>,
}

impl BootstrapBuilder {
    /// 默认配置：自管钩子 + 进程级退出表 + 共享缓存。
    pub fn new() -> Self {
        Self {
            register_hook_on_start: true,
            exit_table: InProcessExitTable::global(),
            hook: None,
            cache: None,
        }
    }

    /// 设置启动时是否自管退出钩子。
    pub fn register_hook_on_start(mut self, register: bool) -> Self {
        self.register_hook_on_start = register;
        self
    }

    /// 注入退出表（默认钩子将挂到这张表上）。
    pub fn exit_table(mut self, table: Arc<dyn ExitHookTable>) -> Self {
        self.exit_table = table;
        self
    }

    /// 注入自定义钩子（放弃默认的自清理回边）。
    pub fn shutdown_hook(mut self, hook: Arc<ShutdownHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    /// 注入引用缓存。
    pub fn reference_cache(mut self, cache: Arc<ReferenceCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// 构造协调器。
    pub fn build(self) -> Arc<BootstrapCoordinator> {
        let cache = self.cache.unwrap_or_else(ReferenceCache::shared);
        let exit_table = self.exit_table;
        let injected_hook = self.hook;
        Arc::new_cyclic(|weak: &Weak<BootstrapCoordinator>| {
            let hook = injected_hook.unwrap_or_else(|| {
                let coordinator = weak.clone();
                ShutdownHook::new(exit_table, move || {
                    if let Some(coordinator) = coordinator.upgrade() {
                        coordinator.stop();
                    }
                })
            });
            BootstrapCoordinator {
                inner: Mutex::new(Inner {
                    application: None,
                    registries: Vec::new(),
                    protocols: Vec::new(),
                    consumer: None,
                    provider: None,
                    monitor: None,
                    module: None,
                    exports: Vec::new(),
                    references: Vec::new(),
                    cache,
                }),
                hook,
                register_hook_on_start: AtomicBool::new(self.register_hook_on_start),
                started: AtomicBool::new(false),
            }
        })
    }
}

impl Default for BootstrapBuilder {
    fn default() -> Self {
        Self::new()
    }
}
