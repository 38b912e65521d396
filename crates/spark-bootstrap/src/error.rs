//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 集中定义生命周期协调层对外暴露的错误语义，保持稳定错误码供日志、
//!   指标与告警系统做自动化分类；
//! - 区分“必须上抛”的装配失败与“必须吞掉”的停机竞态，避免调用方对
//!   两类语义产生混淆。
//!
//! ## 设计要求（What）
//! - 所有错误类型实现 `thiserror::Error`，兼容 `std::error::Error` 生态；
//! - 每个变体映射到 [`codes`] 中遵循 `<域>.<语义>` 约定的稳定码值；
//! - 错误不做内部重试，也不在本层做静默降级（钩子移除竞态除外，见
//!   [`HookRemovalError`]）。
//!
//! ## 扩展建议（How）
//! - 新增变体时同步补充 [`codes`] 常量与 [`BootstrapError::code`] 分支；
//! - 协作方（导出单元/引用单元）产生的失败统一收敛到 `Configuration` 或
//!   `Resolution`，保持协调器对外的错误面最小。

use thiserror::Error;

/// 稳定错误码命名空间。
///
/// # 教案式注释
/// - **意图 (Why)**：错误码是跨进程、跨语言排障的最小公共语言，字符串
///   一经发布即视为契约，不允许随版本漂移；
/// - **契约 (What)**：全部常量为 `'static` 字符串，遵循 `bootstrap.<语义>`
///   的两段式命名；
/// - **风险 (Trade-offs)**：常量与枚举变体需人工保持一一对应，新增变体
///   时由 `code()` 的穷尽匹配兜底提醒。
pub mod codes {
    /// 引用/导出单元在装配期缺失必填身份字段。
    pub const CONFIGURATION: &str = "bootstrap.configuration";
    /// 协调器在未经 `stop()` 的情况下被再次启动。
    pub const ALREADY_STARTED: &str = "bootstrap.already_started";
    /// 解析引用（建立客户端句柄）过程中协作方报告失败。
    pub const RESOLUTION: &str = "bootstrap.resolution";
    /// 宿主已进入终止序列时移除退出钩子（该错误永远被吞掉）。
    pub const HOOK_REMOVAL_RACE: &str = "bootstrap.hook_removal_race";
}

/// 生命周期协调层的核心错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：批量导出/引用的失败必须立即上抛并中止剩余迭代，
///   调用方据此决定是否触发补偿逻辑；本枚举承载这条传播链上的全部语义。
/// - **契约 (What)**：
///   - 所有变体 `Send + Sync + 'static`，可安全跨线程传播；
///   - 变体可克隆、可比较，方便测试直接断言；
///   - [`Self::code`] 返回稳定错误码，供结构化日志使用。
/// - **风险 (Trade-offs)**：上下文以 `String` 承载，牺牲少量堆分配换取
///   自然语言可读性；如需零分配可引入 `Cow<'static, str>` 版本。
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum BootstrapError {
    /// 单元身份字段不完整，无法导出或引用。
    ///
    /// - **意图 (Why)**：字段校验委托给协作方，本层只负责把失败原样
    ///   呈递给批量操作的调用者；
    /// - **契约 (What)**：`target` 为受影响单元的标识（通常是接口名），
    ///   `reason` 面向排障人员描述缺失项。
    #[error("configuration for `{target}` is incomplete: {reason}")]
    Configuration { target: String, reason: String },

    /// 协调器已处于启动状态，拒绝重复 `start()`。
    ///
    /// - **意图 (Why)**：放任重复启动会把同一端点重复发布、把引用重复
    ///   解析，这里选择显式拒绝而非静默复制状态；
    /// - **契约 (What)**：先调用 `stop()` 释放启动闩锁后方可再次启动。
    #[error("coordinator is already started; call `stop()` before starting again")]
    AlreadyStarted,

    /// 解析引用句柄时协作方报告失败。
    ///
    /// - **契约 (What)**：缓存未命中路径上出现该错误时，缓存保证不会
    ///   残留任何半成品条目。
    #[error("failed to resolve reference `{target}`: {reason}")]
    Resolution { target: String, reason: String },
}

impl BootstrapError {
    /// 构造装配失败错误的便捷入口。
    pub fn configuration(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            target: target.into(),
            reason: reason.into(),
        }
    }

    /// 构造引用解析失败错误的便捷入口。
    pub fn resolution(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Resolution {
            target: target.into(),
            reason: reason.into(),
        }
    }

    /// 返回与变体对应的稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => codes::CONFIGURATION,
            Self::AlreadyStarted => codes::ALREADY_STARTED,
            Self::Resolution { .. } => codes::RESOLUTION,
        }
    }
}

/// 退出钩子移除阶段特有的失败。
///
/// # 教案式说明
/// - **意图 (Why)**：宿主一旦进入终止序列，“从退出表中摘除钩子”便失去
///   意义——钩子要么正在执行、要么即将执行，摘除失败不是故障；
/// - **契约 (What)**：该错误只会出现在 [`crate::hook::ExitHookTable::uninstall`]
///   的返回值里，并由 [`crate::hook::ShutdownHook::remove`] 吞掉，永远不会
///   传播到应用代码；
/// - **风险 (Trade-offs)**：吞掉错误意味着排障只能依赖 `tracing` 事件，
///   该路径因此必须保留结构化日志。
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum HookRemovalError {
    /// 宿主已开始终止，退出表不再接受变更。
    #[error("host process is already in its termination sequence")]
    HostTerminating,
}
