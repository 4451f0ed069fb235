use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Local};
use sqlx::{Postgres, QueryBuilder};

use super::Db;
use crate::{
    content::{
        Ancestry, Tab, TabField, TabInput, TabNode, TabPatch, TabSource, tab::check_reparent,
    },
    error::{Error, Result},
};

/// 修改父栏目时持有的事务级 advisory lock 键
///
/// 所有改父栏目的更新在这把锁上串行，成环检查读到的总是已提交的树。
const REPARENT_LOCK: i64 = 0x7461_6273;

/// 栏目的数据库操作接口
pub trait TabRepository: Send + Sync {
    /// 全部栏目，按 `(parent, sort, id)` 排序，根栏目在前
    fn list_tabs(&self) -> impl Future<Output = Result<Vec<Tab>>> + Send;

    fn get_tab(&self, id: i32) -> impl Future<Output = Result<Option<Tab>>> + Send;

    /// 直接子栏目，按 `(sort, id)` 排序
    fn child_tabs(&self, parent: i32) -> impl Future<Output = Result<Vec<Tab>>> + Send;

    fn create_tab(
        &self,
        input: &TabInput,
        now: DateTime<Local>,
    ) -> impl Future<Output = Result<Tab>> + Send;

    /// 部分更新，栏目不存在时返回 `None`
    ///
    /// 修改父栏目时，成环检查与更新在同一事务内完成，并与其他改父栏目的更新串行。
    fn update_tab(
        &self,
        id: i32,
        patch: &TabPatch,
        now: DateTime<Local>,
    ) -> impl Future<Output = Result<Option<Tab>>> + Send;

    /// 删除栏目，规则见 [`Tab::check_deletable`]
    fn delete_tab(&self, id: i32) -> impl Future<Output = Result<()>> + Send;

    /// 批量设置排序值
    ///
    /// 在一个事务中完成：任意 id 不存在时整批回滚，返回 [`Error::UnknownTabs`]。
    fn sort_tabs(
        &self,
        order: &BTreeMap<i32, i32>,
        now: DateTime<Local>,
    ) -> impl Future<Output = Result<u64>> + Send;
}

impl TabRepository for Db {
    async fn list_tabs(&self) -> Result<Vec<Tab>> {
        let tabs = sqlx::query_as::<_, Tab>(
            r#"
            SELECT *
            FROM tabs
            ORDER BY parent NULLS FIRST, sort, id
            "#,
        )
        .fetch_all(self)
        .await?;
        Ok(tabs)
    }

    async fn get_tab(&self, id: i32) -> Result<Option<Tab>> {
        let tab = sqlx::query_as::<_, Tab>("SELECT * FROM tabs WHERE id = $1")
            .bind(id)
            .fetch_optional(self)
            .await?;
        Ok(tab)
    }

    async fn child_tabs(&self, parent: i32) -> Result<Vec<Tab>> {
        let tabs = sqlx::query_as::<_, Tab>(
            r#"
            SELECT *
            FROM tabs
            WHERE parent = $1
            ORDER BY sort, id
            "#,
        )
        .bind(parent)
        .fetch_all(self)
        .await?;
        Ok(tabs)
    }

    async fn create_tab(&self, input: &TabInput, now: DateTime<Local>) -> Result<Tab> {
        let meta = if input.meta.is_null() {
            serde_json::Value::Object(Default::default())
        } else {
            input.meta.clone()
        };

        let tab = sqlx::query_as::<_, Tab>(
            r#"
            INSERT INTO tabs
                (parent, name, url, layout, enabled, sort, logo, icon, meta, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            RETURNING *
            "#,
        )
        .bind(input.parent)
        .bind(input.name.trim())
        .bind(input.url.trim())
        .bind(input.layout)
        .bind(input.enabled)
        .bind(input.sort)
        .bind(&input.logo)
        .bind(&input.icon)
        .bind(meta)
        .bind(now)
        .fetch_one(self)
        .await?;
        Ok(tab)
    }

    async fn update_tab(
        &self,
        id: i32,
        patch: &TabPatch,
        now: DateTime<Local>,
    ) -> Result<Option<Tab>> {
        let mut tx = self.begin().await?;

        if patch.changed().contains(&TabField::Parent) {
            sqlx::query("SELECT pg_advisory_xact_lock($1)")
                .bind(REPARENT_LOCK)
                .execute(tx.as_mut())
                .await?;
            // 锁在提交时释放，上一个持有者的修改此时已提交，可以从连接池读取
            let lineage = match patch.tab.parent {
                Some(parent) => Ancestry::resolve(self, &[parent]).await?.lineage(parent)?,
                None => Vec::new(),
            };
            check_reparent(id, patch.tab.parent, &lineage)?;
        }

        let mut builder = update_tab_query(id, patch, now);
        let tab = builder
            .build_query_as::<Tab>()
            .fetch_optional(tx.as_mut())
            .await?;

        tx.commit().await?;
        Ok(tab)
    }

    async fn delete_tab(&self, id: i32) -> Result<()> {
        let mut tx = self.begin().await?;

        let tab = sqlx::query_as::<_, Tab>("SELECT * FROM tabs WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(tx.as_mut())
            .await?
            .ok_or(Error::NotFound("tab"))?;

        let has_children: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM tabs WHERE parent = $1)")
                .bind(id)
                .fetch_one(tx.as_mut())
                .await?;

        // 文章写入先锁定栏目行，这里持有行锁后的实时统计不会再变化
        let articles: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM articles
            WHERE tab_id = $1 OR tab_id2 = $1 OR tab_id3 = $1
            "#,
        )
        .bind(id)
        .fetch_one(tx.as_mut())
        .await?;

        tab.check_deletable(articles, has_children)?;

        sqlx::query("DELETE FROM tabs WHERE id = $1")
            .bind(id)
            .execute(tx.as_mut())
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn sort_tabs(&self, order: &BTreeMap<i32, i32>, now: DateTime<Local>) -> Result<u64> {
        if order.is_empty() {
            return Ok(0);
        }
        let ids: Vec<i32> = order.keys().copied().collect();
        let sorts: Vec<i32> = order.values().copied().collect();

        let mut tx = self.begin().await?;

        let existing: Vec<i32> =
            sqlx::query_scalar("SELECT id FROM tabs WHERE id = ANY($1) ORDER BY id FOR UPDATE")
                .bind(&ids)
                .fetch_all(tx.as_mut())
                .await?;

        let missing = unknown_ids(&ids, &existing);
        if !missing.is_empty() {
            tx.rollback().await?;
            return Err(Error::UnknownTabs(missing));
        }

        let result = sqlx::query(
            r#"
            UPDATE tabs
            SET sort = v.sort, updated_at = $3
            FROM UNNEST($1::INT4[], $2::INT4[]) AS v(id, sort)
            WHERE tabs.id = v.id
            "#,
        )
        .bind(&ids)
        .bind(&sorts)
        .bind(now)
        .execute(tx.as_mut())
        .await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }
}

impl TabSource for Db {
    async fn fetch_nodes(&self, ids: &[i32]) -> Result<Vec<TabNode>> {
        let nodes = sqlx::query_as::<_, TabNode>(
            "SELECT id, parent, name, layout, url FROM tabs WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(self)
        .await?;
        Ok(nodes)
    }
}

/// 生成部分更新语句，只包含 `patch` 中列出的字段
pub fn update_tab_query(
    id: i32,
    patch: &TabPatch,
    now: DateTime<Local>,
) -> QueryBuilder<'static, Postgres> {
    let tab = &patch.tab;
    let mut builder = QueryBuilder::new("UPDATE tabs SET ");

    let mut set = builder.separated(", ");
    for field in patch.changed() {
        match field {
            TabField::Parent => {
                set.push("parent = ").push_bind_unseparated(tab.parent);
            }
            TabField::Name => {
                set.push("name = ")
                    .push_bind_unseparated(tab.name.trim().to_string());
            }
            TabField::Url => {
                set.push("url = ")
                    .push_bind_unseparated(tab.url.trim().to_string());
            }
            TabField::Layout => {
                set.push("layout = ").push_bind_unseparated(tab.layout);
            }
            TabField::Enabled => {
                set.push("enabled = ").push_bind_unseparated(tab.enabled);
            }
            TabField::Sort => {
                set.push("sort = ").push_bind_unseparated(tab.sort);
            }
            TabField::Logo => {
                set.push("logo = ").push_bind_unseparated(tab.logo.clone());
            }
            TabField::Icon => {
                set.push("icon = ").push_bind_unseparated(tab.icon.clone());
            }
            TabField::Meta => {
                set.push("meta = ").push_bind_unseparated(tab.meta.clone());
            }
        }
    }
    set.push("updated_at = ").push_bind_unseparated(now);

    builder.push(" WHERE id = ").push_bind(id);
    builder.push(" RETURNING *");
    builder
}

/// `requested` 中不在 `existing` 里的 id，升序
fn unknown_ids(requested: &[i32], existing: &[i32]) -> Vec<i32> {
    let existing: BTreeSet<i32> = existing.iter().copied().collect();
    let missing: BTreeSet<i32> = requested
        .iter()
        .copied()
        .filter(|id| !existing.contains(id))
        .collect();
    missing.into_iter().collect()
}
