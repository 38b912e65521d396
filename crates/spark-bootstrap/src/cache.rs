//! # cache 模块说明
//!
//! ## 核心意图（Why）
//! - 语义上指向同一远端服务的引用不应重复建立客户端资源（连接池、
//!   序列化器等）；本模块以“身份 → 句柄”的键控单例仓储完成去重；
//! - 并发首次访问同一身份时必须恰好解析一次，且所有调用方拿到同一个
//!   句柄实例。
//!
//! ## 行为契约（What）
//! - [`CacheKey`]：由身份字段推导的、端点顺序无关的归一化键；
//! - [`ReferenceCache::get`]：命中即返回，未命中则在同一原子步骤内
//!   解析并安装；解析失败不留下任何条目；
//! - [`ReferenceCache::destroy`] / [`ReferenceCache::destroy_all`]：
//!   移除并销毁句柄，目标不存在时为 no-op。
//!
//! ## 风险提示（Trade-offs）
//! - “检查-创建”的原子性依托 `DashMap` 分片写锁：首次解析期间会占住
//!   所在分片，同分片的其他键短暂排队——用少量尾延迟换取恰好一次的
//!   解析保证；
//! - 未提供过期策略，条目只在显式 `destroy` 或 `destroy_all` 时回收。

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::contract::{BootstrapContext, ReferenceHandle, Referenceable, ReferenceIdentity};
use crate::error::BootstrapError;

/// 引用身份的归一化缓存键。
///
/// # 教案式注释
/// - **意图 (Why)**：`["r1", "r2"]` 与 `["r2", "r1"]` 指向同一组注册
///   中心，必须落到同一个键上，否则去重失效、客户端资源翻倍；
/// - **契约 (What)**：端点列表收敛为 `BTreeSet`（去重 + 排序），其余
///   身份字段原样纳入；两个语义等价的身份推导出的键满足 `Eq + Hash`
///   相等；
/// - **风险 (Trade-offs)**：键持有字段的独立拷贝，完全自包含，代价是
///   推导时的一次克隆。
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    interface: String,
    group: Option<String>,
    version: Option<String>,
    endpoints: BTreeSet<String>,
}

impl CacheKey {
    /// 由身份字段推导键；端点顺序与重复项在此被归一化。
    pub fn from_identity(identity: &ReferenceIdentity) -> Self {
        Self {
            interface: identity.interface().to_owned(),
            group: identity.group().map(str::to_owned),
            version: identity.version().map(str::to_owned),
            endpoints: identity.endpoints().iter().cloned().collect(),
        }
    }

    /// 目标接口名。
    pub fn interface(&self) -> &str {
        &self.interface
    }
}

impl fmt::Display for CacheKey {
    /// 以 `group/interface:version` 的惯用形式渲染，供日志使用。
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(group) = &self.group {
            write!(f, "{group}/")?;
        }
        write!(f, "{}", self.interface)?;
        if let Some(version) = &self.version {
            write!(f, ":{version}")?;
        }
        Ok(())
    }
}

/// 键控单例仓储：每个缓存键至多对应一个存活句柄。
///
/// # 教案式注释
/// - **意图 (Why)**：把“是否已有句柄”的判定与“解析新句柄”合并为
///   键粒度的原子步骤，使 50 路并发首访也只触发一次解析；
/// - **契约 (What)**：
///   - `get` 返回的 `Arc` 与缓存内条目共享同一实例，调用方可用
///     `Arc::ptr_eq` 验证复用；
///   - 解析失败时条目不安装，错误原样上抛；
///   - 不同键之间无互斥（分片粒度以内），吞吐随键分布扩展；
/// - **风险 (Trade-offs)**：`destroy_all` 逐条目调用 `destroy`，句柄
///   实现阻塞多久，排空就耗时多久。
#[derive(Default)]
pub struct ReferenceCache {
    entries: DashMap<CacheKey, Arc<dyn ReferenceHandle>>,
}

impl std::fmt::Debug for ReferenceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceCache")
            .field("entries", &self.entries.len())
            .finish_non_exhaustive()
    }
}

impl ReferenceCache {
    /// 构造调用方自有的空缓存。
    pub fn new() -> Self {
        Self::default()
    }

    /// 进程级共享缓存（懒初始化）；多个协调器默认汇聚到这里。
    pub fn shared() -> Arc<ReferenceCache> {
        static SHARED: OnceLock<Arc<ReferenceCache>> = OnceLock::new();
        Arc::clone(SHARED.get_or_init(|| Arc::new(ReferenceCache::new())))
    }

    /// 按身份取句柄：命中即返回，未命中则原子地解析并安装。
    ///
    /// 解析在 `Entry` 守卫（分片写锁）之内执行，因此同键的并发首访
    /// 只会有一个赢家真正调用 `refer`，其余调用方在命中分支等到同一个
    /// 句柄；解析失败时守卫原样丢弃，键上不留条目。
    pub fn get(
        &self,
        unit: &dyn Referenceable,
        ctx: &BootstrapContext,
    ) -> Result<Arc<dyn ReferenceHandle>, BootstrapError> {
        let key = CacheKey::from_identity(&unit.identity());
        match self.entries.entry(key.clone()) {
            Entry::Occupied(occupied) => Ok(Arc::clone(occupied.get())),
            Entry::Vacant(vacant) => {
                tracing::debug!(key = %key, "reference cache miss, resolving");
                let handle = unit.refer(ctx)?;
                vacant.insert(Arc::clone(&handle));
                Ok(handle)
            }
        }
    }

    /// 移除并销毁该单元身份对应的条目；不存在时为 no-op。
    pub fn destroy(&self, unit: &dyn Referenceable) {
        let key = CacheKey::from_identity(&unit.identity());
        if let Some((_, handle)) = self.entries.remove(&key) {
            tracing::debug!(key = %key, "reference cache entry destroyed");
            handle.destroy();
        }
    }

    /// 排空缓存，逐条目销毁句柄；空缓存上调用是安全的。
    pub fn destroy_all(&self) {
        self.entries.retain(|key, handle| {
            tracing::debug!(key = %key, "reference cache entry destroyed");
            handle.destroy();
            false
        });
    }

    /// 当前存活条目数。
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 缓存是否为空。
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
