//! 生命周期编排测试套件。
//!
//! # 教案级导览
//!
//! - **Why**：协调器的价值在于顺序与幂等——导出按注册顺序、失败即中止、
//!   停机两条路径收敛为一次拆除；本套件用记录桩把这些时序固化为断言。
//! - **How**：导出/引用单元与退出表都替换为向共享流水账写条目的桩，
//!   断言阶段检查条目的存在性与相对顺序；并发场景用 `std::thread` +
//!   `Barrier` 重建真实竞争路径。
//! - **What**：覆盖批量导出的顺序与失败传播、stop 的完整次序、重复
//!   start 的拒绝策略、stop 幂等性以及宿主退出通知路径的自清理。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use spark_bootstrap::{
    BootstrapContext, BootstrapCoordinator, BootstrapError, ExitHookTable, Exportable,
    HookRemovalError, InProcessExitTable, ReferenceCache, ReferenceHandle, ReferenceIdentity,
    Referenceable, ShutdownHook,
};

type Journal = Arc<Mutex<Vec<String>>>;

fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

fn record(journal: &Journal, entry: impl Into<String>) {
    journal.lock().expect("流水账锁不应中毒").push(entry.into());
}

fn entries(journal: &Journal) -> Vec<String> {
    journal.lock().expect("流水账锁不应中毒").clone()
}

fn position(journal: &Journal, entry: &str) -> usize {
    entries(journal)
        .iter()
        .position(|recorded| recorded == entry)
        .unwrap_or_else(|| panic!("流水账中缺少条目 `{entry}`"))
}

struct RecordingExport {
    label: &'static str,
    fail: bool,
    journal: Journal,
}

impl RecordingExport {
    fn new(label: &'static str, journal: &Journal) -> Arc<Self> {
        Arc::new(Self {
            label,
            fail: false,
            journal: Arc::clone(journal),
        })
    }

    fn failing(label: &'static str, journal: &Journal) -> Arc<Self> {
        Arc::new(Self {
            label,
            fail: true,
            journal: Arc::clone(journal),
        })
    }
}

impl Exportable for RecordingExport {
    fn export(&self, _ctx: &BootstrapContext) -> Result<(), BootstrapError> {
        if self.fail {
            record(&self.journal, format!("export_failed:{}", self.label));
            return Err(BootstrapError::configuration(self.label, "interface missing"));
        }
        record(&self.journal, format!("export:{}", self.label));
        Ok(())
    }

    fn unexport(&self, _ctx: &BootstrapContext) {
        record(&self.journal, format!("unexport:{}", self.label));
    }
}

struct RecordingHandle {
    label: &'static str,
    journal: Journal,
}

impl ReferenceHandle for RecordingHandle {
    fn destroy(&self) {
        record(&self.journal, format!("destroy_handle:{}", self.label));
    }
}

struct RecordingReference {
    label: &'static str,
    journal: Journal,
    resolutions: Arc<AtomicUsize>,
}

impl RecordingReference {
    fn new(label: &'static str, journal: &Journal) -> Arc<Self> {
        Arc::new(Self {
            label,
            journal: Arc::clone(journal),
            resolutions: Arc::new(AtomicUsize::new(0)),
        })
    }
}

impl Referenceable for RecordingReference {
    fn identity(&self) -> ReferenceIdentity {
        ReferenceIdentity::new(self.label).with_endpoint("zk://127.0.0.1:2181")
    }

    fn refer(&self, _ctx: &BootstrapContext) -> Result<Arc<dyn ReferenceHandle>, BootstrapError> {
        self.resolutions.fetch_add(1, Ordering::SeqCst);
        record(&self.journal, format!("refer:{}", self.label));
        Ok(Arc::new(RecordingHandle {
            label: self.label,
            journal: Arc::clone(&self.journal),
        }))
    }
}

/// 把安装/摘除也写进流水账的退出表桩。
struct RecordingTable {
    journal: Journal,
}

impl ExitHookTable for RecordingTable {
    fn install(&self, _hook: Arc<ShutdownHook>) {
        record(&self.journal, "hook:installed");
    }

    fn uninstall(&self, _hook: &ShutdownHook) -> Result<(), HookRemovalError> {
        record(&self.journal, "hook:removed");
        Ok(())
    }
}

fn isolated_coordinator(journal: &Journal) -> Arc<BootstrapCoordinator> {
    let table = Arc::new(RecordingTable {
        journal: Arc::clone(journal),
    });
    let teardown_journal = Arc::clone(journal);
    let hook = ShutdownHook::new(table.clone(), move || {
        record(&teardown_journal, "hook:teardown");
    });
    BootstrapCoordinator::builder()
        .exit_table(table)
        .shutdown_hook(hook)
        .reference_cache(Arc::new(ReferenceCache::new()))
        .build()
}

/// ## 批量导出：顺序与失败传播
///
/// - **意图 (Why)**：注册 [X, Y, Z] 且 Y 失败时，Z 永远不被导出、错误
///   原样抵达 `start()` 调用方、X 保持已导出。
/// - **契约 (What)**：失败后的协调器仍处于已启动状态，显式 `stop()`
///   负责把已成功的部分清理掉。
#[test]
fn bulk_export_aborts_at_first_failure_and_propagates() {
    let journal = journal();
    let coordinator = isolated_coordinator(&journal);
    coordinator
        .register_export(RecordingExport::new("X", &journal))
        .register_export(RecordingExport::failing("Y", &journal))
        .register_export(RecordingExport::new("Z", &journal));

    let err = coordinator.start().expect_err("Y 的失败必须抵达 start 调用方");
    assert!(matches!(err, BootstrapError::Configuration { .. }));
    assert_eq!(err.code(), "bootstrap.configuration");

    let log = entries(&journal);
    assert!(log.contains(&"export:X".to_owned()), "X 应保持已导出");
    assert!(log.contains(&"export_failed:Y".to_owned()));
    assert!(!log.contains(&"export:Z".to_owned()), "Z 不得被导出");

    // 失败的启动留给显式 stop() 清理。
    assert!(coordinator.is_started());
    coordinator.stop();
    assert!(entries(&journal).contains(&"unexport:X".to_owned()));
}

/// ## stop 的完整次序
///
/// unexport 必须先于缓存排空，缓存排空先于钩子拆除，钩子拆除先于
/// 钩子摘除——通过流水账中条目的相对位置验证。
#[test]
fn stop_orders_unexport_before_unrefer_before_hook_paths() {
    let journal = journal();
    let coordinator = isolated_coordinator(&journal);
    coordinator
        .register_export(RecordingExport::new("E", &journal))
        .register_reference(RecordingReference::new("R", &journal));

    coordinator.start().expect("装配齐全的启动应当成功");
    assert_eq!(position(&journal, "hook:installed"), 0, "钩子先于任何导出就位");

    coordinator.stop();

    let unexport = position(&journal, "unexport:E");
    let destroy = position(&journal, "destroy_handle:R");
    let teardown = position(&journal, "hook:teardown");
    let removed = position(&journal, "hook:removed");
    assert!(unexport < destroy, "unexport 必须先于缓存排空");
    assert!(destroy < teardown, "缓存排空必须先于钩子拆除");
    assert!(teardown < removed, "钩子拆除必须先于摘除");
}

/// ## 重复 start 的拒绝策略
///
/// 未经 `stop()` 的第二次 `start()` 返回 `bootstrap.already_started`；
/// `stop()` 之后允许重新启动。
#[test]
fn second_start_without_stop_is_rejected() {
    let journal = journal();
    let coordinator = isolated_coordinator(&journal);
    coordinator.register_export(RecordingExport::new("E", &journal));

    coordinator.start().expect("首次启动应当成功");
    let err = coordinator.start().expect_err("重复启动必须被拒绝");
    assert_eq!(err, BootstrapError::AlreadyStarted);
    assert_eq!(err.code(), "bootstrap.already_started");

    coordinator.stop();
    coordinator.start().expect("stop 之后允许再次启动");
}

/// ## stop 幂等
#[test]
fn repeated_stop_tears_down_once() {
    let journal = journal();
    let coordinator = isolated_coordinator(&journal);
    coordinator.register_export(RecordingExport::new("E", &journal));

    coordinator.start().expect("启动应当成功");
    coordinator.stop();
    coordinator.stop();

    let unexports = entries(&journal)
        .iter()
        .filter(|entry| entry.as_str() == "unexport:E")
        .count();
    assert_eq!(unexports, 1, "第二次 stop 必须是 no-op");
}

/// ## 并发 stop 收敛为一次拆除
///
/// 两个线程同时调用 `stop()`：启动闩锁保证拆除序列只走一遍。
#[test]
fn concurrent_stops_converge_to_one_teardown() {
    let journal = journal();
    let coordinator = isolated_coordinator(&journal);
    coordinator.register_export(RecordingExport::new("E", &journal));
    coordinator.start().expect("启动应当成功");

    let barrier = Arc::new(Barrier::new(2));
    let workers: Vec<_> = (0..2)
        .map(|_| {
            let coordinator = Arc::clone(&coordinator);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                coordinator.stop();
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("stop 线程必须平稳退出");
    }

    let unexports = entries(&journal)
        .iter()
        .filter(|entry| entry.as_str() == "unexport:E")
        .count();
    assert_eq!(unexports, 1);
}

/// ## 宿主退出通知路径的自清理
///
/// 默认钩子经 `Weak` 回边执行协调器的 `stop()`：`fire_all` 之后导出
/// 被撤销、缓存被排空，随后的显式 `stop()` 是 no-op。
#[test]
fn process_exit_notification_triggers_emergency_stop() {
    let journal = journal();
    let table = Arc::new(InProcessExitTable::new());
    let cache = Arc::new(ReferenceCache::new());
    let coordinator = BootstrapCoordinator::builder()
        .exit_table(table.clone())
        .reference_cache(Arc::clone(&cache))
        .build();
    coordinator
        .register_export(RecordingExport::new("E", &journal))
        .register_reference(RecordingReference::new("R", &journal));

    coordinator.start().expect("启动应当成功");
    assert_eq!(table.installed(), 1, "自管模式下钩子应已挂表");

    table.fire_all();

    let log = entries(&journal);
    assert!(log.contains(&"unexport:E".to_owned()), "退出通知必须撤销导出");
    assert!(log.contains(&"destroy_handle:R".to_owned()), "退出通知必须排空缓存");
    assert!(cache.is_empty());
    assert!(!coordinator.is_started());

    // 与退出通知赛跑的显式 stop 是安全的 no-op。
    coordinator.stop();
    let unexports = entries(&journal)
        .iter()
        .filter(|entry| entry.as_str() == "unexport:E")
        .count();
    assert_eq!(unexports, 1);
}

/// ## 不自管钩子时启动会摘除既有安装
#[test]
fn start_without_self_managed_hook_removes_previous_installation() {
    let journal = journal();
    let table = Arc::new(InProcessExitTable::new());
    let coordinator = BootstrapCoordinator::builder()
        .exit_table(table.clone())
        .reference_cache(Arc::new(ReferenceCache::new()))
        .build();
    coordinator.register_export(RecordingExport::new("E", &journal));

    // 此前某处安置过钩子。
    coordinator.shutdown_hook().register();
    assert_eq!(table.installed(), 1);

    coordinator.set_register_hook_on_start(false);
    coordinator.start().expect("启动应当成功");
    assert_eq!(table.installed(), 0, "不自管时必须主动摘除既有钩子");
}

/// ## 重复注册同一单元会被独立导出
#[test]
fn duplicate_registration_exports_twice() {
    let journal = journal();
    let coordinator = isolated_coordinator(&journal);
    let unit = RecordingExport::new("E", &journal);
    coordinator
        .register_export(Arc::<RecordingExport>::clone(&unit))
        .register_export(unit);

    coordinator.start().expect("启动应当成功");
    let exports = entries(&journal)
        .iter()
        .filter(|entry| entry.as_str() == "export:E")
        .count();
    assert_eq!(exports, 2, "登记不查重，重复条目独立导出");
}
