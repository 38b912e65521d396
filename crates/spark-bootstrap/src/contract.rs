//! # contract 模块说明
//!
//! ## 角色定位（Why）
//! - 定义协调器唯一依赖的两条协作方契约：可导出单元（`export`/`unexport`）
//!   与可引用单元（`refer` → 句柄）；传输、编解码、集群策略与注册发现
//!   全部藏在这两条窄接口之后；
//! - 以显式的上下文参数 [`BootstrapContext`] 取代“单元持有协调器反向
//!   指针”的环状结构：单元在回调期间能读到共享配置，却不再与协调器
//!   形成所有权循环。
//!
//! ## 行为契约（What）
//! - `export`/`refer` 是阻塞语义的不透明调用，失败以
//!   [`BootstrapError`] 同步上抛；
//! - `unexport` 与句柄销毁不返回错误：拆除路径必须是全量可执行的，
//!   内部故障由协作方自行记录；
//! - [`ReferenceIdentity`] 暴露推导缓存键所需的不可变身份字段。
//!
//! ## 风险提示（Trade-offs）
//! - 上下文是注册期配置的一次性克隆快照，回调期间协调器配置的并发
//!   变更不会反映进来；这是换取无锁读取与无环所有权的代价。

use std::sync::Arc;

use crate::config::{
    ApplicationConfig, ConsumerConfig, ModuleConfig, MonitorConfig, ProtocolConfig, ProviderConfig,
    RegistryConfig,
};
use crate::error::BootstrapError;

/// 协调器在每次 `export`/`refer`/`unexport` 回调时下发的配置快照。
///
/// # 教案式注释
/// - **意图 (Why)**：原设计里单元通过存储的协调器指针回读全局配置，
///   形成 `unit ↔ coordinator` 循环引用；改为按调用传参后，单元只在
///   回调栈帧内短暂借用快照，生命周期清晰且可独立测试；
/// - **契约 (What)**：快照在协调器锁内构建，字段与构建时刻的注册状态
///   一致；`Clone` 成本与配置体量成正比，均为小对象；
/// - **风险 (Trade-offs)**：快照不追踪后续配置变更，需要动态视图的
///   协作方应自行订阅外部配置源。
#[derive(Clone, Debug, Default)]
pub struct BootstrapContext {
    application: Option<ApplicationConfig>,
    registries: Vec<RegistryConfig>,
    protocols: Vec<ProtocolConfig>,
    consumer: Option<ConsumerConfig>,
    provider: Option<ProviderConfig>,
    monitor: Option<MonitorConfig>,
    module: Option<ModuleConfig>,
}

impl BootstrapContext {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        application: Option<ApplicationConfig>,
        registries: Vec<RegistryConfig>,
        protocols: Vec<ProtocolConfig>,
        consumer: Option<ConsumerConfig>,
        provider: Option<ProviderConfig>,
        monitor: Option<MonitorConfig>,
        module: Option<ModuleConfig>,
    ) -> Self {
        Self {
            application,
            registries,
            protocols,
            consumer,
            provider,
            monitor,
            module,
        }
    }

    /// 应用配置。
    pub fn application(&self) -> Option<&ApplicationConfig> {
        self.application.as_ref()
    }

    /// 注册中心集合（注册顺序）。
    pub fn registries(&self) -> &[RegistryConfig] {
        &self.registries
    }

    /// 协议集合（注册顺序）。
    pub fn protocols(&self) -> &[ProtocolConfig] {
        &self.protocols
    }

    /// 消费者默认配置。
    pub fn consumer(&self) -> Option<&ConsumerConfig> {
        self.consumer.as_ref()
    }

    /// 提供者默认配置。
    pub fn provider(&self) -> Option<&ProviderConfig> {
        self.provider.as_ref()
    }

    /// 监控配置。
    pub fn monitor(&self) -> Option<&MonitorConfig> {
        self.monitor.as_ref()
    }

    /// 模块配置。
    pub fn module(&self) -> Option<&ModuleConfig> {
        self.module.as_ref()
    }
}

/// 引用单元的不可变身份字段，缓存键由此推导。
///
/// # 教案式注释
/// - **意图 (Why)**：两个语义上指向同一远端服务的引用必须复用同一个
///   客户端句柄；身份字段是判定“同一远端”的唯一依据；
/// - **契约 (What)**：
///   - `interface` 必填，`group`/`version` 可选；
///   - `endpoints` 为注册中心/协议端点地址列表，**语义上是集合**——
///     推导缓存键时列表顺序与重复项都会被归一化掉；
/// - **风险 (Trade-offs)**：身份字段以值语义克隆进缓存键，地址条目
///   很多时会有一次复制成本，换来的是键的完全自包含。
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReferenceIdentity {
    interface: String,
    group: Option<String>,
    version: Option<String>,
    endpoints: Vec<String>,
}

impl ReferenceIdentity {
    /// 以目标接口名构造身份。
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            group: None,
            version: None,
            endpoints: Vec::new(),
        }
    }

    /// 设置服务分组。
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// 设置服务版本。
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// 追加一个注册中心/协议端点地址。
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoints.push(endpoint.into());
        self
    }

    /// 批量追加端点地址。
    pub fn with_endpoints<I, S>(mut self, endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.endpoints.extend(endpoints.into_iter().map(Into::into));
        self
    }

    /// 目标接口名。
    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// 服务分组。
    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    /// 服务版本。
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// 端点地址（保留登记顺序，仅缓存键推导做归一化）。
    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }
}

/// 可导出单元：服务端端点的发布与撤销。
///
/// # 教案式注释
/// - **意图 (Why)**：协调器只负责“何时、以何顺序”发布端点，“如何发布”
///   完全由实现方（协议/注册层）决定；
/// - **契约 (What)**：
///   - `export` 同步阻塞直至发布完成或失败；失败时上抛
///     [`BootstrapError`] 并由协调器中止本次批量迭代；
///   - `unexport` 撤销此前的发布，必须可安全地重复调用（包括从未
///     导出时调用）；
/// - **风险 (Trade-offs)**：导出不做去重——同一单元注册两次就会发布
///   两次，这是注册方的责任。
pub trait Exportable: Send + Sync {
    /// 发布端点。
    fn export(&self, ctx: &BootstrapContext) -> Result<(), BootstrapError>;

    /// 撤销端点发布；拆除路径不返回错误。
    fn unexport(&self, ctx: &BootstrapContext);
}

/// 可引用单元：针对远端服务身份解析客户端句柄。
pub trait Referenceable: Send + Sync {
    /// 返回推导缓存键所需的不可变身份字段。
    fn identity(&self) -> ReferenceIdentity;

    /// 解析出一个存活的客户端句柄。
    ///
    /// 走缓存路径时本方法对同一身份至多被调用一次（并发首次访问也
    /// 只解析一次）；绕过缓存时每次调用都会产生新句柄。
    fn refer(&self, ctx: &BootstrapContext) -> Result<Arc<dyn ReferenceHandle>, BootstrapError>;
}

/// 已解析引用的存活句柄（如一条连接池）。
///
/// `destroy` 是拆除入口，由缓存在条目被移除时调用；实现方自行保证
/// 其幂等性与线程安全。
pub trait ReferenceHandle: Send + Sync {
    /// 关闭并释放句柄背后的客户端资源。
    fn destroy(&self);
}

impl std::fmt::Debug for dyn ReferenceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn ReferenceHandle")
    }
}
