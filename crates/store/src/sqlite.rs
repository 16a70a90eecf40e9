use async_trait::async_trait;
use candleflow_core::sink::entity::{FeatureGroup, FeatureRecord};
use candleflow_core::sink::error::SinkError;
use candleflow_core::sink::port::FeatureStore;
use chrono::Utc;
use dashmap::DashMap;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// 特征库文件名
const FEATURE_DB: &str = "features.db";

fn db_err(e: impl std::fmt::Display) -> SinkError {
    SinkError::Write(e.to_string())
}

/// FeatureStore 的 SQLite 实现，"一组一表"。
///
/// # Summary
/// 每个特征组 (名称 + 版本) 对应一张在线表，按主键 upsert；
/// 要求离线物化时，同一批次额外追加到 `<表名>_offline` 历史表。
///
/// # Invariants
/// * 在线表以拼接后的主键为 PRIMARY KEY，重复推送同一批次不产生重复行。
/// * 一个批次在单个事务中写入，全有或全无。
/// * 已初始化的表名被缓存，避免重复执行 DDL。
pub struct SqliteFeatureStore {
    pool: SqlitePool,
    db_path: PathBuf,
    tables: DashMap<String, ()>,
}

impl SqliteFeatureStore {
    /// 在配置的数据根目录下的 `features` 子目录中打开特征库。
    pub async fn new() -> Result<Self, SinkError> {
        Self::open_in(crate::config::root_dir().join("features")).await
    }

    /// # Summary
    /// 在指定目录中打开 (或创建) 特征库。
    ///
    /// # Logic
    /// 1. 确保目录存在。
    /// 2. 以 WAL 模式和 busy timeout 打开连接池，允许多个分片并发写入。
    pub async fn open_in(dir: impl AsRef<Path>) -> Result<Self, SinkError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(db_err)?;
        let db_path = dir.join(FEATURE_DB);

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .map_err(db_err)?;

        info!(path = %db_path.display(), "Feature store opened");
        Ok(Self {
            pool,
            db_path,
            tables: DashMap::new(),
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    async fn ensure_tables(&self, target: &FeatureGroup) -> Result<String, SinkError> {
        let table = target.table_name();
        if self.tables.contains_key(&table) {
            return Ok(table);
        }

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS "{table}" (
                pk TEXT PRIMARY KEY,
                event_time INTEGER NOT NULL,
                payload TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS "{table}_offline" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                pk TEXT NOT NULL,
                event_time INTEGER NOT NULL,
                payload TEXT NOT NULL,
                materialized_at INTEGER NOT NULL
            );
            "#
        ))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        debug!(table = %table, "Feature group tables ready");
        self.tables.insert(table.clone(), ());
        Ok(table)
    }

    /// # Summary
    /// 读取特征组在线表中的全部记录，按事件时间、主键排序。
    pub async fn load_features(
        &self,
        target: &FeatureGroup,
    ) -> Result<Vec<FeatureRecord>, SinkError> {
        let table = self.ensure_tables(target).await?;
        let rows = sqlx::query_as::<_, (String,)>(&format!(
            r#"SELECT payload FROM "{table}" ORDER BY event_time ASC, pk ASC"#
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter()
            .map(|(payload,)| serde_json::from_str(&payload).map_err(db_err))
            .collect()
    }

    /// 读取离线历史表的全部记录，按写入顺序排列
    pub async fn load_offline_features(
        &self,
        target: &FeatureGroup,
    ) -> Result<Vec<FeatureRecord>, SinkError> {
        let table = self.ensure_tables(target).await?;
        let rows = sqlx::query_as::<_, (String,)>(&format!(
            r#"SELECT payload FROM "{table}_offline" ORDER BY id ASC"#
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter()
            .map(|(payload,)| serde_json::from_str(&payload).map_err(db_err))
            .collect()
    }
}

#[async_trait]
impl FeatureStore for SqliteFeatureStore {
    /// # Summary
    /// 批量 upsert 特征记录。
    ///
    /// # Logic
    /// 1. 先为全部记录计算主键、事件时间与载荷，任一缺字段则整批失败且不写入。
    /// 2. 在单个事务中对在线表执行 `INSERT OR REPLACE`。
    /// 3. 若要求离线物化，同一事务内追加到离线表。
    async fn push(
        &self,
        records: &[FeatureRecord],
        target: &FeatureGroup,
        start_offline_materialization: bool,
    ) -> Result<(), SinkError> {
        if records.is_empty() {
            return Ok(());
        }
        let table = self.ensure_tables(target).await?;

        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            let pk = target.primary_key_of(record)?;
            let event_time = target.event_time_of(record)?;
            let payload = serde_json::to_string(record).map_err(db_err)?;
            rows.push((pk, event_time, payload));
        }

        let now = Utc::now().timestamp_millis();
        let upsert = format!(
            r#"INSERT OR REPLACE INTO "{table}" (pk, event_time, payload, updated_at) VALUES (?, ?, ?, ?)"#
        );
        let append = format!(
            r#"INSERT INTO "{table}_offline" (pk, event_time, payload, materialized_at) VALUES (?, ?, ?, ?)"#
        );

        let mut tx = self.pool.begin().await.map_err(db_err)?;
        for (pk, event_time, payload) in &rows {
            sqlx::query(&upsert)
                .bind(pk)
                .bind(event_time)
                .bind(payload)
                .bind(now)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
            if start_offline_materialization {
                sqlx::query(&append)
                    .bind(pk)
                    .bind(event_time)
                    .bind(payload)
                    .bind(now)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;
            }
        }
        tx.commit().await.map_err(db_err)?;

        debug!(table = %table, records = rows.len(), "Features upserted");
        Ok(())
    }
}
