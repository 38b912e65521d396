//! # hook 模块说明
//!
//! ## 核心意图（Why）
//! - 停机有两条触发路径：应用线程显式 `stop()`，以及宿主进程的退出
//!   通知线程；两条路径可能并发，破坏性动作却必须恰好执行一次；
//! - 钩子内部的一次性闩锁是化解这场竞态的唯一同步点——两条路径之间
//!   不需要、也不应该共享协调器级别的锁。
//!
//! ## 行为契约（What）
//! - [`ShutdownHook::destroy_all`]：首次调用执行注入的拆除例程，之后
//!   的任何调用（无论来自哪条路径）都是安全的 no-op；
//! - [`ShutdownHook::register`] / [`ShutdownHook::remove`]：向注入的
//!   [`ExitHookTable`] 安装/摘除自身；宿主已进入终止序列时的摘除失败
//!   被吞掉（此时摘除已无意义，不构成错误）；
//! - [`HookState`] 三态机：未注册 → 已注册 → 已耗尽，耗尽态不可逆。
//!
//! ## 架构定位（Where）
//! - 退出表以 trait 注入而非硬编码全局：生产宿主把
//!   [`InProcessExitTable::fire_all`] 接到自己的信号处理上，测试则换成
//!   全新实例甚至记录桩。

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::error::{HookRemovalError, codes};

const STATE_NOT_REGISTERED: u8 = 0;
const STATE_REGISTERED: u8 = 1;
const STATE_SPENT: u8 = 2;

/// 钩子的注册生命周期三态。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HookState {
    /// 尚未挂入退出表。
    NotRegistered,
    /// 已挂入退出表，等待触发或显式摘除。
    Registered,
    /// 已耗尽：宿主终止期间摘除失败后进入，不再参与任何登记。
    Spent,
}

/// 宿主进程退出通知表的注入契约。
///
/// # 教案式注释
/// - **意图 (Why)**：核心只依赖 `install`/`uninstall` 两个语义，不绑定
///   任何具体运行时机制，测试得以用记录桩替换；
/// - **契约 (What)**：`uninstall` 在宿主已经开始终止时返回
///   [`HookRemovalError::HostTerminating`]，其余情况下对不存在的钩子
///   静默成功。
pub trait ExitHookTable: Send + Sync {
    /// 安装钩子；重复安装同一实例应为 no-op。
    fn install(&self, hook: Arc<ShutdownHook>);

    /// 摘除钩子。
    fn uninstall(&self, hook: &ShutdownHook) -> Result<(), HookRemovalError>;
}

/// 一次性、可重入安全的停机钩子。
///
/// # 教案式注释
/// - **意图 (Why)**：显式 `stop()` 与退出通知线程可能同时踩进来，
///   拆除例程的恰好一次执行由内部 CAS 闩锁保证；
/// - **契约 (What)**：
///   - 拆除例程在构造时注入，`destroy_all` 的首个调用者在自己的线程
///     上同步执行它；
///   - `register` 在 [`HookState::NotRegistered`] 之外的状态下是
///     no-op，天然防止重复挂表；
/// - **风险 (Trade-offs)**：拆除例程执行多久，首个调用者就阻塞多久；
///   例程内部若再次触发 `destroy_all` 会命中闩锁直接返回，不会死锁。
pub struct ShutdownHook {
    table: Arc<dyn ExitHookTable>,
    teardown: Box<dyn Fn() + Send + Sync>,
    state: AtomicU8,
    fired: AtomicBool,
}

impl ShutdownHook {
    /// 以退出表与拆除例程构造钩子。
    pub fn new(
        table: Arc<dyn ExitHookTable>,
        teardown: impl Fn() + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            table,
            teardown: Box::new(teardown),
            state: AtomicU8::new(STATE_NOT_REGISTERED),
            fired: AtomicBool::new(false),
        })
    }

    /// 当前注册状态。
    pub fn state(&self) -> HookState {
        match self.state.load(Ordering::Acquire) {
            STATE_REGISTERED => HookState::Registered,
            STATE_SPENT => HookState::Spent,
            _ => HookState::NotRegistered,
        }
    }

    /// 拆除例程是否已经执行过。
    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// 执行破坏性拆除，跨两条触发路径恰好一次。
    pub fn destroy_all(&self) {
        if self.fired.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::info!("shutdown hook teardown executing");
        (self.teardown)();
    }

    /// 将自身挂入退出表；已注册或已耗尽时为 no-op。
    pub fn register(self: &Arc<Self>) {
        if self
            .state
            .compare_exchange(
                STATE_NOT_REGISTERED,
                STATE_REGISTERED,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
        {
            self.table.install(Arc::clone(self));
        }
    }

    /// 从退出表摘除自身。
    ///
    /// 宿主已进入终止序列时摘除注定失败，该失败被吞掉并把钩子置为
    /// [`HookState::Spent`]；未注册状态下调用是 no-op。
    pub fn remove(&self) {
        if self
            .state
            .compare_exchange(
                STATE_REGISTERED,
                STATE_NOT_REGISTERED,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return;
        }
        if let Err(HookRemovalError::HostTerminating) = self.table.uninstall(self) {
            self.state.store(STATE_SPENT, Ordering::Release);
            tracing::trace!(
                code = codes::HOOK_REMOVAL_RACE,
                "hook removal raced with host termination, swallowed"
            );
        }
    }
}

impl fmt::Debug for ShutdownHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownHook")
            .field("state", &self.state())
            .field("fired", &self.has_fired())
            .finish_non_exhaustive()
    }
}

/// 进程内退出表的默认实现。
///
/// # 教案式注释
/// - **意图 (Why)**：为嵌入式宿主提供一个开箱即用的钩子登记簿；宿主在
///   自己的信号处理（或等价的退出路径）里调用一次 [`Self::fire_all`]
///   即可触发全部已安装钩子；
/// - **契约 (What)**：
///   - `fire_all` 先落下终止闩锁再排空钩子表，因此与它并发的
///     `uninstall` 会观测到 [`HookRemovalError::HostTerminating`]；
///   - 终止后到达的 `install` 被丢弃——此时新钩子已无触发机会；
/// - **风险 (Trade-offs)**：钩子按安装顺序串行触发，单个拆除例程的
///   耗时会顺延后续钩子。
#[derive(Debug, Default)]
pub struct InProcessExitTable {
    hooks: Mutex<Vec<Arc<ShutdownHook>>>,
    terminating: AtomicBool,
}

impl InProcessExitTable {
    /// 构造调用方自有的空退出表。
    pub fn new() -> Self {
        Self::default()
    }

    /// 进程级共享退出表（懒初始化）。
    pub fn global() -> Arc<InProcessExitTable> {
        static GLOBAL: OnceLock<Arc<InProcessExitTable>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(InProcessExitTable::new())))
    }

    /// 宿主退出路径的入口：落下终止闩锁并触发全部已安装钩子。
    pub fn fire_all(&self) {
        self.terminating.store(true, Ordering::SeqCst);
        let hooks: Vec<Arc<ShutdownHook>> = std::mem::take(&mut *self.hooks.lock());
        for hook in hooks {
            hook.destroy_all();
        }
    }

    /// 当前已安装的钩子数，供测试观测。
    pub fn installed(&self) -> usize {
        self.hooks.lock().len()
    }

    /// 宿主是否已进入终止序列。
    pub fn is_terminating(&self) -> bool {
        self.terminating.load(Ordering::SeqCst)
    }
}

impl ExitHookTable for InProcessExitTable {
    fn install(&self, hook: Arc<ShutdownHook>) {
        if self.is_terminating() {
            tracing::trace!("hook install ignored, host already terminating");
            return;
        }
        let mut hooks = self.hooks.lock();
        if hooks
            .iter()
            .any(|existing| std::ptr::eq(Arc::as_ptr(existing), Arc::as_ptr(&hook)))
        {
            return;
        }
        hooks.push(hook);
    }

    fn uninstall(&self, hook: &ShutdownHook) -> Result<(), HookRemovalError> {
        if self.is_terminating() {
            return Err(HookRemovalError::HostTerminating);
        }
        self.hooks
            .lock()
            .retain(|existing| !std::ptr::eq(Arc::as_ptr(existing), hook));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    fn counting_hook(table: Arc<InProcessExitTable>) -> (Arc<ShutdownHook>, Arc<AtomicUsize>) {
        let fired = Arc::new(AtomicUsize::new(0));
        let probe = Arc::clone(&fired);
        let hook = ShutdownHook::new(table, move || {
            probe.fetch_add(1, Ordering::SeqCst);
        });
        (hook, fired)
    }

    #[test]
    fn destroy_all_runs_teardown_exactly_once() {
        let (hook, fired) = counting_hook(Arc::new(InProcessExitTable::new()));
        for _ in 0..5 {
            hook.destroy_all();
        }
        assert_eq!(fired.load(Ordering::SeqCst), 1, "重复触发必须收敛为一次拆除");
    }

    #[test]
    fn register_and_remove_walk_the_state_machine() {
        let table = Arc::new(InProcessExitTable::new());
        let (hook, _) = counting_hook(Arc::clone(&table));

        assert_eq!(hook.state(), HookState::NotRegistered);
        hook.register();
        assert_eq!(hook.state(), HookState::Registered);
        assert_eq!(table.installed(), 1);

        // 重复注册不产生第二份登记。
        hook.register();
        assert_eq!(table.installed(), 1);

        hook.remove();
        assert_eq!(hook.state(), HookState::NotRegistered);
        assert_eq!(table.installed(), 0);
    }

    #[test]
    fn removal_race_with_termination_is_swallowed() {
        let table = Arc::new(InProcessExitTable::new());
        let (hook, fired) = counting_hook(Arc::clone(&table));
        hook.register();

        table.fire_all();
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // 终止序列已开始：摘除失败被吞掉，钩子进入耗尽态。
        hook.remove();
        assert_eq!(hook.state(), HookState::Spent);
    }

    #[test]
    fn fire_all_drains_hooks_and_latches_termination() {
        let table = Arc::new(InProcessExitTable::new());
        let (first, first_fired) = counting_hook(Arc::clone(&table));
        let (second, second_fired) = counting_hook(Arc::clone(&table));
        first.register();
        second.register();

        table.fire_all();
        assert_eq!(first_fired.load(Ordering::SeqCst), 1);
        assert_eq!(second_fired.load(Ordering::SeqCst), 1);
        assert_eq!(table.installed(), 0);
        assert!(table.is_terminating());

        // 终止后的安装无触发机会，直接丢弃。
        let (late, _) = counting_hook(Arc::clone(&table));
        late.register();
        assert_eq!(table.installed(), 0);
    }
}
