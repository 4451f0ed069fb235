use std::collections::{HashMap, HashSet};

use serde::Serialize;

use super::tab::TabLayout;
use crate::error::{Error, Result};

/// 祖先链允许的最大层数，超过即视为数据损坏
pub const MAX_DEPTH: usize = 100;

/// 解析层级所需的栏目字段
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct TabNode {
    pub id: i32,
    pub parent: Option<i32>,
    pub name: String,
    pub layout: TabLayout,
    pub url: String,
}

/// 祖先记录
///
/// `level` 为距被查询栏目的父级步数：父栏目为 1，依次递增；被查询栏目自身为 0。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ancestor {
    pub id: i32,
    pub parent: Option<i32>,
    pub name: String,
    pub layout: TabLayout,
    pub url: String,
    pub level: usize,
}

impl Ancestor {
    fn from_node(node: &TabNode, level: usize) -> Self {
        Self {
            id: node.id,
            parent: node.parent,
            name: node.name.clone(),
            layout: node.layout,
            url: node.url.clone(),
            level,
        }
    }
}

/// 按 id 批量读取栏目
///
/// 不存在的 id 直接忽略，不返回错误。
pub trait TabSource: Send + Sync {
    fn fetch_nodes(
        &self,
        ids: &[i32],
    ) -> impl std::future::Future<Output = Result<Vec<TabNode>>> + Send;
}

/// 一次解析的结果
///
/// 保存解析过程中读到的所有栏目，多个被查询栏目共享的祖先只读取、只记录一次。
#[derive(Debug, Default)]
pub struct Ancestry {
    nodes: HashMap<i32, TabNode>,
    /// 祖先 id -> 距任一被查询栏目的最小层数
    levels: HashMap<i32, usize>,
    queried: Vec<i32>,
}

impl Ancestry {
    /// 解析一组栏目的祖先
    ///
    /// 按层向上读取父栏目，每层一次查询。已经读到的栏目直接复用，不会重复查询。
    /// 链中出现环或深度超过 [`MAX_DEPTH`] 时返回 [`Error::Integrity`]。
    pub async fn resolve<S: TabSource>(source: &S, ids: &[i32]) -> Result<Self> {
        let mut queried = ids.to_vec();
        queried.sort_unstable();
        queried.dedup();

        let mut ancestry = Self {
            queried,
            ..Default::default()
        };
        if ancestry.queried.is_empty() {
            return Ok(ancestry);
        }

        for node in source.fetch_nodes(&ancestry.queried).await? {
            ancestry.nodes.insert(node.id, node);
        }

        let mut frontier = Vec::new();
        for id in &ancestry.queried {
            if let Some(parent) = ancestry.nodes.get(id).and_then(|n| n.parent) {
                push_unique(&mut frontier, parent);
            }
        }

        let mut depth = 0;
        while !frontier.is_empty() {
            depth += 1;
            if depth > MAX_DEPTH {
                return Err(Error::Integrity(format!(
                    "ancestor chain deeper than {MAX_DEPTH} levels"
                )));
            }

            let missing: Vec<i32> = frontier
                .iter()
                .copied()
                .filter(|id| !ancestry.nodes.contains_key(id))
                .collect();
            if !missing.is_empty() {
                for node in source.fetch_nodes(&missing).await? {
                    ancestry.nodes.insert(node.id, node);
                }
            }

            let mut next = Vec::new();
            for id in frontier {
                if ancestry.levels.contains_key(&id) {
                    continue;
                }
                let Some(node) = ancestry.nodes.get(&id) else {
                    tracing::warn!(tab = id, "parent tab does not exist, chain ends here");
                    continue;
                };
                ancestry.levels.insert(id, depth);
                if let Some(parent) = node.parent {
                    if !ancestry.levels.contains_key(&parent) {
                        push_unique(&mut next, parent);
                    }
                }
            }
            frontier = next;
        }

        for id in ancestry.queried.clone() {
            ancestry.chain_ids(id)?;
        }

        Ok(ancestry)
    }

    /// 沿父指针走到根，返回祖先 id（不含自身），最近的在前
    fn chain_ids(&self, id: i32) -> Result<Vec<i32>> {
        let mut chain = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut current = self.nodes.get(&id).and_then(|n| n.parent);

        while let Some(parent) = current {
            if !seen.insert(parent) {
                return Err(Error::Integrity(format!(
                    "tab {id} has a cyclic parent chain through tab {parent}"
                )));
            }
            if chain.len() >= MAX_DEPTH {
                return Err(Error::Integrity(format!(
                    "tab {id} has an ancestor chain deeper than {MAX_DEPTH} levels"
                )));
            }
            let Some(node) = self.nodes.get(&parent) else {
                break;
            };
            chain.push(parent);
            current = node.parent;
        }
        Ok(chain)
    }

    /// 某个栏目的祖先链，最近的祖先在前，根在最后
    ///
    /// 根栏目或不存在的栏目返回空。`id` 不在解析范围内时，已读到的节点里若有环
    /// 同样返回 [`Error::Integrity`]。
    pub fn chain(&self, id: i32) -> Result<Vec<Ancestor>> {
        let chain = self
            .chain_ids(id)?
            .into_iter()
            .enumerate()
            .filter_map(|(i, ancestor)| {
                self.nodes
                    .get(&ancestor)
                    .map(|node| Ancestor::from_node(node, i + 1))
            })
            .collect();
        Ok(chain)
    }

    /// 栏目自身（level 0）加上它的祖先链
    pub fn lineage(&self, id: i32) -> Result<Vec<Ancestor>> {
        let Some(node) = self.nodes.get(&id) else {
            return Ok(Vec::new());
        };
        let mut lineage = vec![Ancestor::from_node(node, 0)];
        lineage.extend(self.chain(id)?);
        Ok(lineage)
    }

    /// 合并后的祖先列表
    ///
    /// 每个祖先只出现一次，`level` 取最小值，按 `(level, id)` 排序。
    pub fn merged(&self) -> Vec<Ancestor> {
        let mut merged: Vec<Ancestor> = self
            .levels
            .iter()
            .filter_map(|(id, level)| self.nodes.get(id).map(|n| Ancestor::from_node(n, *level)))
            .collect();
        merged.sort_by_key(|a| (a.level, a.id));
        merged
    }

    pub fn queried(&self) -> &[i32] {
        &self.queried
    }
}

fn push_unique(ids: &mut Vec<i32>, id: i32) {
    if !ids.contains(&id) {
        ids.push(id);
    }
}

/// 解析单个栏目的祖先链，最近的祖先在前
pub async fn ancestors_of<S: TabSource>(source: &S, id: i32) -> Result<Vec<Ancestor>> {
    Ancestry::resolve(source, &[id]).await?.chain(id)
}
