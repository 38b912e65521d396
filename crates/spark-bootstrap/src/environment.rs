//! # environment 模块说明
//!
//! ## 角色定位（Why）
//! - 承接协调器 `set_external_configuration` 转发来的进程级覆盖属性，
//!   供属性装载等外部协作方读取；
//! - 读远多于写（启动期写一次、运行期反复读），因此用 `ArcSwap` 获得
//!   无锁读取。
//!
//! ## 行为契约（What）
//! - `set_external_configuration`：整体替换覆盖映射；空映射为显式
//!   no-op，不会清空既有内容；
//! - `global()` 返回进程级懒初始化单例；测试可用 [`Environment::new`]
//!   构造完全隔离的实例。
//!
//! ## 风险提示（Trade-offs）
//! - 采用替换语义而非合并语义：调用方若需增量更新，应先
//!   读快照、合并后再整体写回。

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use arc_swap::ArcSwap;

/// 进程范围的外部配置存储。
#[derive(Debug)]
pub struct Environment {
    external: ArcSwap<HashMap<String, String>>,
}

impl Environment {
    /// 构造空的、调用方自有的配置存储。
    pub fn new() -> Self {
        Self {
            external: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    /// 进程级共享实例（懒初始化）。
    pub fn global() -> &'static Environment {
        static GLOBAL: OnceLock<Environment> = OnceLock::new();
        GLOBAL.get_or_init(Environment::new)
    }

    /// 原子替换外部覆盖属性；空映射时不做任何事。
    pub fn set_external_configuration(&self, properties: HashMap<String, String>) {
        if properties.is_empty() {
            return;
        }
        tracing::debug!(entries = properties.len(), "external configuration replaced");
        self.external.store(Arc::new(properties));
    }

    /// 读取单个覆盖属性。
    pub fn external_value(&self, key: &str) -> Option<String> {
        self.external.load().get(key).cloned()
    }

    /// 取当前覆盖映射的共享快照。
    pub fn external_snapshot(&self) -> Arc<HashMap<String, String>> {
        self.external.load_full()
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
