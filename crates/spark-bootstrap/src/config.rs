//! # config 模块说明
//!
//! ## 角色定位（Why）
//! - 承载一个逻辑应用实例的七类全局配置（应用、注册中心、消费者、
//!   提供者、协议、监控、模块），供协调器在导出/引用时以快照形式下发；
//! - 字段级校验、注解解析与环境变量装载都属于外部协作方职责，本模块
//!   只定义“不透明载荷”的数据形状。
//!
//! ## 设计要求（What）
//! - 所有配置类型 `Clone + Default + serde`，可直接进入
//!   [`crate::contract::BootstrapContext`] 快照并跨线程传递；
//! - 构造走 `new` + `with_*` 流式写法，与协调器的链式注册风格保持一致。
//!
//! ## 风险提示（Trade-offs）
//! - 字段刻意保持最小集合（身份与寻址相关），不追求覆盖所有调优参数；
//!   协作方需要更多配置时应自带而不是反向膨胀本模块。

use serde::{Deserialize, Serialize};

/// 应用级配置：标识“这是哪一个逻辑应用”。
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    name: String,
    owner: Option<String>,
}

impl ApplicationConfig {
    /// 以应用名构造配置。
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner: None,
        }
    }

    /// 设置负责人标识。
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// 应用名。
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 负责人标识。
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }
}

/// 注册中心配置：一个可被引用身份纳入的发现端点。
///
/// # 教案式注释
/// - **意图 (Why)**：注册中心地址参与引用身份（CacheKey）的推导，是
///   本模块中唯一影响核心语义的字段；
/// - **契约 (What)**：`address` 必填；`protocol`/`timeout_ms` 仅透传给
///   协作方，协调器不读取。
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    address: String,
    protocol: Option<String>,
    timeout_ms: Option<u64>,
}

impl RegistryConfig {
    /// 以注册中心地址构造配置。
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            protocol: None,
            timeout_ms: None,
        }
    }

    /// 设置注册协议（如 `zookeeper`、`nacos`）。
    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }

    /// 设置注册操作超时（毫秒）。
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// 注册中心地址。
    pub fn address(&self) -> &str {
        &self.address
    }

    /// 注册协议。
    pub fn protocol(&self) -> Option<&str> {
        self.protocol.as_deref()
    }

    /// 注册操作超时（毫秒）。
    pub fn timeout_ms(&self) -> Option<u64> {
        self.timeout_ms
    }
}

/// 协议配置：服务端以何种协议、在哪个端口发布端点。
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    name: String,
    host: Option<String>,
    port: Option<u16>,
}

impl ProtocolConfig {
    /// 以协议名构造配置。
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: None,
            port: None,
        }
    }

    /// 设置绑定主机。
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// 设置监听端口。
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// 协议名。
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 绑定主机。
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// 监听端口。
    pub fn port(&self) -> Option<u16> {
        self.port
    }
}

/// 消费者侧默认值（引用单元的兜底参数）。
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ConsumerConfig {
    timeout_ms: Option<u64>,
    retries: Option<u32>,
}

impl ConsumerConfig {
    /// 构造空配置。
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置调用超时（毫秒）。
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// 设置失败重试次数。
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    /// 调用超时（毫秒）。
    pub fn timeout_ms(&self) -> Option<u64> {
        self.timeout_ms
    }

    /// 失败重试次数。
    pub fn retries(&self) -> Option<u32> {
        self.retries
    }
}

/// 提供者侧默认值（导出单元的兜底参数）。
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    timeout_ms: Option<u64>,
    threads: Option<usize>,
}

impl ProviderConfig {
    /// 构造空配置。
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置服务端处理超时（毫秒）。
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// 设置业务线程数。
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// 服务端处理超时（毫秒）。
    pub fn timeout_ms(&self) -> Option<u64> {
        self.timeout_ms
    }

    /// 业务线程数。
    pub fn threads(&self) -> Option<usize> {
        self.threads
    }
}

/// 监控上报配置。
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    address: Option<String>,
    protocol: Option<String>,
}

impl MonitorConfig {
    /// 构造空配置。
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置监控中心地址。
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// 设置上报协议。
    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }

    /// 监控中心地址。
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    /// 上报协议。
    pub fn protocol(&self) -> Option<&str> {
        self.protocol.as_deref()
    }
}

/// 模块级配置：应用内部再划分的逻辑单元。
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ModuleConfig {
    name: String,
    version: Option<String>,
}

impl ModuleConfig {
    /// 以模块名构造配置。
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
        }
    }

    /// 设置模块版本。
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// 模块名。
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 模块版本。
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }
}
